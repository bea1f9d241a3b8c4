//! Minimal DER/ASN.1 reader
//!
//! Just enough of X.690 to walk a certificate and pull the Subject common
//! name and organizational unit out of it. Values are borrowed from the
//! input; only decoded strings allocate.

use crate::error::DerError;
use crate::models::CertificateSubject;

const TAG_OID: u32 = 0x06;
const TAG_UTF8_STRING: u32 = 0x0c;
const TAG_SEQUENCE: u32 = 0x10;
const TAG_SET: u32 = 0x11;
const TAG_PRINTABLE_STRING: u32 = 0x13;
const TAG_TELETEX_STRING: u32 = 0x14;
const TAG_UTC_TIME: u32 = 0x17;
const TAG_GENERALIZED_TIME: u32 = 0x18;

/// id-at-commonName
const OID_COMMON_NAME: [u32; 4] = [2, 5, 4, 3];
/// id-at-organizationalUnitName
const OID_ORGANIZATIONAL_UNIT: [u32; 4] = [2, 5, 4, 11];

/// Longest definite length we accept (three length octets).
const MAX_LENGTH: usize = 0xff_ffff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagClass {
    Universal,
    Application,
    Context,
    Private,
}

impl TagClass {
    fn from_bits(bits: u8) -> Self {
        match bits {
            0 => TagClass::Universal,
            1 => TagClass::Application,
            2 => TagClass::Context,
            _ => TagClass::Private,
        }
    }
}

/// One decoded Tag-Length-Value. `value` borrows the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    pub class: TagClass,
    pub constructed: bool,
    pub number: u32,
    pub value: &'a [u8],
    /// Encoded size of the whole TLV, header included.
    pub size: usize,
}

impl<'a> Tlv<'a> {
    fn is_universal(&self, number: u32) -> bool {
        self.class == TagClass::Universal && self.number == number
    }

    /// SEQUENCE, SET and every context-specific tag are walked into.
    pub fn has_substructure(&self) -> bool {
        self.is_universal(TAG_SEQUENCE)
            || self.is_universal(TAG_SET)
            || self.class == TagClass::Context
    }

    fn header_len(&self) -> usize {
        self.size - self.value.len()
    }
}

/// Decodes exactly one TLV at the start of `buffer`.
pub fn parse_der_tlv(buffer: &[u8]) -> Result<Tlv<'_>, DerError> {
    let mut pos = 0;
    let tag = *buffer
        .get(pos)
        .ok_or(DerError::MalformedEncoding("missing tag"))?;
    pos += 1;

    let class = TagClass::from_bits(tag >> 6);
    let constructed = tag & 0x20 != 0;
    let mut number = u32::from(tag & 0x1f);
    if number == 0x1f {
        number = 0;
        loop {
            let byte = *buffer
                .get(pos)
                .ok_or(DerError::MalformedEncoding("truncated tag number"))?;
            pos += 1;
            if number > u32::MAX >> 7 {
                return Err(DerError::MalformedEncoding("tag number too large"));
            }
            number = (number << 7) | u32::from(byte & 0x7f);
            if byte & 0x80 == 0 {
                break;
            }
        }
    }

    let first = *buffer
        .get(pos)
        .ok_or(DerError::MalformedEncoding("missing length"))?;
    pos += 1;
    let length = if first & 0x80 == 0 {
        usize::from(first)
    } else {
        let count = usize::from(first & 0x7f);
        if count == 0 {
            return Err(DerError::MalformedEncoding("indefinite length"));
        }
        if count > 3 {
            return Err(DerError::MalformedEncoding("length too large"));
        }
        let octets = buffer
            .get(pos..pos + count)
            .ok_or(DerError::MalformedEncoding("truncated length"))?;
        pos += count;
        if octets[0] == 0 {
            return Err(DerError::MalformedEncoding("non-minimal length"));
        }
        let length = octets
            .iter()
            .fold(0usize, |acc, &b| (acc << 8) | usize::from(b));
        if length < 0x80 {
            return Err(DerError::MalformedEncoding("non-minimal length"));
        }
        debug_assert!(length <= MAX_LENGTH);
        length
    };

    let value = buffer
        .get(pos..pos + length)
        .ok_or(DerError::MalformedEncoding("truncated value"))?;

    Ok(Tlv {
        class,
        constructed,
        number,
        value,
        size: pos + length,
    })
}

/// A TLV together with its position in the traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlvEvent<'a> {
    pub tlv: Tlv<'a>,
    pub depth: usize,
    /// Absolute offset of the TLV's first byte.
    pub offset: usize,
}

#[derive(Debug)]
struct Frame<'a> {
    data: &'a [u8],
    offset: usize,
    depth: usize,
}

/// Depth-first, pre-order walk over a DER buffer.
///
/// Single forward pass; the walk stops after the first error.
#[derive(Debug)]
pub struct TlvWalker<'a> {
    stack: Vec<Frame<'a>>,
}

impl<'a> TlvWalker<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_origin(data, 0, 0)
    }

    /// Walks `data` as if it sat at `offset` and `depth` in a larger buffer.
    pub fn with_origin(data: &'a [u8], depth: usize, offset: usize) -> Self {
        Self {
            stack: vec![Frame {
                data,
                offset,
                depth,
            }],
        }
    }
}

impl<'a> Iterator for TlvWalker<'a> {
    type Item = Result<TlvEvent<'a>, DerError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            if frame.data.is_empty() {
                self.stack.pop();
                continue;
            }

            let data = frame.data;
            let tlv = match parse_der_tlv(data) {
                Ok(tlv) => tlv,
                Err(e) => {
                    self.stack.clear();
                    return Some(Err(e));
                }
            };
            let event = TlvEvent {
                tlv,
                depth: frame.depth,
                offset: frame.offset,
            };
            frame.data = &data[tlv.size..];
            frame.offset += tlv.size;

            if tlv.has_substructure() {
                self.stack.push(Frame {
                    data: tlv.value,
                    offset: event.offset + tlv.header_len(),
                    depth: event.depth + 1,
                });
            }
            return Some(Ok(event));
        }
    }
}

/// Visitor form of [`TlvWalker`]: calls `visit(tlv, depth, offset)` for every TLV.
pub fn parse_der_tlvs<F>(data: &[u8], mut visit: F) -> Result<(), DerError>
where
    F: FnMut(&Tlv<'_>, usize, usize),
{
    for event in TlvWalker::new(data) {
        let event = event?;
        visit(&event.tlv, event.depth, event.offset);
    }
    Ok(())
}

/// Decodes an OBJECT IDENTIFIER, or `None` when `tlv` is something else.
pub fn parse_oid(tlv: &Tlv<'_>) -> Option<Vec<u32>> {
    if !tlv.is_universal(TAG_OID) {
        return None;
    }
    let (&first, rest) = match tlv.value.split_first() {
        Some(split) => split,
        None => return Some(Vec::new()),
    };

    let mut arcs = vec![u32::from(first / 40), u32::from(first % 40)];
    let mut acc = 0u32;
    for &byte in rest {
        acc = acc.wrapping_shl(7) | u32::from(byte & 0x7f);
        if byte & 0x80 == 0 {
            arcs.push(acc);
            acc = 0;
        }
    }
    Some(arcs)
}

/// Decodes a DirectoryString (UTF8String, PrintableString or TeletexString).
pub fn parse_directory_string(tlv: &Tlv<'_>) -> Result<String, DerError> {
    if tlv.class != TagClass::Universal {
        return Err(DerError::UnsupportedStringType(tlv.number));
    }
    match tlv.number {
        TAG_UTF8_STRING | TAG_PRINTABLE_STRING => {
            Ok(String::from_utf8_lossy(tlv.value).into_owned())
        }
        TAG_TELETEX_STRING => {
            if let Some(&bad) = tlv.value.iter().find(|b| !(0x20..=0x7e).contains(*b)) {
                return Err(DerError::UnsupportedCharacter(bad));
            }
            Ok(tlv.value.iter().map(|&b| char::from(b)).collect())
        }
        other => Err(DerError::UnsupportedStringType(other)),
    }
}

enum SubjectState {
    /// Looking for the Validity times, then the Subject that follows them.
    Seeking { validity_depth: Option<usize> },
    /// Inside the Subject RDN sequence.
    InSubject {
        validity_depth: usize,
        pending_oid: Option<Vec<u32>>,
    },
}

/// Extracts the Subject CN and OU of a DER certificate.
///
/// The Subject is the SEQUENCE that follows Validity at the same depth, and
/// it ends where the walk returns to that depth (subjectPublicKeyInfo).
pub fn parse_certificate(der: &[u8]) -> Result<CertificateSubject, DerError> {
    let mut subject = CertificateSubject::default();
    let mut state = SubjectState::Seeking {
        validity_depth: None,
    };

    for event in TlvWalker::new(der) {
        let TlvEvent { tlv, depth, .. } = event?;
        let next = match &mut state {
            SubjectState::Seeking { validity_depth } => {
                if tlv.is_universal(TAG_UTC_TIME) || tlv.is_universal(TAG_GENERALIZED_TIME) {
                    *validity_depth = depth.checked_sub(1);
                    None
                } else if *validity_depth == Some(depth) && tlv.is_universal(TAG_SEQUENCE) {
                    Some(SubjectState::InSubject {
                        validity_depth: depth,
                        pending_oid: None,
                    })
                } else {
                    None
                }
            }
            SubjectState::InSubject {
                validity_depth,
                pending_oid,
            } => {
                if depth == *validity_depth {
                    return Ok(subject);
                }
                if let Some(oid) = parse_oid(&tlv) {
                    *pending_oid = Some(oid);
                } else if let Some(oid) = pending_oid.take() {
                    if oid == OID_COMMON_NAME {
                        subject.common_name = Some(parse_directory_string(&tlv)?);
                    } else if oid == OID_ORGANIZATIONAL_UNIT {
                        subject.organizational_unit = Some(parse_directory_string(&tlv)?);
                    }
                }
                None
            }
        };
        if let Some(next) = next {
            state = next;
        }
    }

    Err(DerError::SubjectNotFound)
}
