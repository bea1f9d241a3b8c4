//! Minimal CBOR reader for Mozilla's COSE add-on signatures
//!
//! Only the subset used by `META-INF/cose.sig` is understood: integers up to
//! 32 bits, byte and text strings, definite arrays and maps, tags and null.
//! Decoding is schema-driven: callers state what they expect next.

use crate::error::CborError;

/// COSE_Sign tag
const COSE_SIGN_TAG: u64 = 98;
/// COSE header label "kid"
const COSE_KID_LABEL: u32 = 4;
const SIMPLE_NULL: u8 = 22;
/// Nesting allowed when skipping unknown header values.
const MAX_SKIP_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MajorType {
    UnsignedInteger = 0,
    NegativeInteger = 1,
    ByteString = 2,
    TextString = 3,
    Array = 4,
    Map = 5,
    Tag = 6,
    Simple = 7,
}

impl MajorType {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => MajorType::UnsignedInteger,
            1 => MajorType::NegativeInteger,
            2 => MajorType::ByteString,
            3 => MajorType::TextString,
            4 => MajorType::Array,
            5 => MajorType::Map,
            6 => MajorType::Tag,
            _ => MajorType::Simple,
        }
    }
}

/// One decoded item. Arrays, maps and tags carry only their argument; their
/// contents follow in the remaining input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CborValue<'a> {
    Unsigned(u32),
    Negative(i64),
    Bytes(&'a [u8]),
    Text(&'a str),
    Array(u32),
    Map(u32),
    Tag(u32),
    Null,
}

impl<'a> CborValue<'a> {
    /// The raw argument of the initial byte: integer value, length, item
    /// count, tag number, or simple value.
    pub fn argument(&self) -> u64 {
        match *self {
            CborValue::Unsigned(n) | CborValue::Array(n) | CborValue::Map(n) | CborValue::Tag(n) => {
                u64::from(n)
            }
            CborValue::Negative(n) => (-1 - n) as u64,
            CborValue::Bytes(b) => b.len() as u64,
            CborValue::Text(s) => s.len() as u64,
            CborValue::Null => u64::from(SIMPLE_NULL),
        }
    }
}

fn take(input: &[u8], len: usize) -> Result<(&[u8], &[u8]), CborError> {
    if input.len() < len {
        return Err(CborError::TruncatedBuffer {
            needed: len,
            available: input.len(),
        });
    }
    Ok(input.split_at(len))
}

/// Decodes the initial byte of one item, its argument, and string content.
pub fn decode_initial(input: &[u8]) -> Result<(MajorType, CborValue<'_>, &[u8]), CborError> {
    let (head, rest) = take(input, 1)?;
    let major = MajorType::from_bits(head[0] >> 5);
    let info = head[0] & 0x1f;

    match info {
        27 => return Err(CborError::UnsupportedEncoding("64-bit arguments")),
        28..=30 => return Err(CborError::ReservedAdditionalInfo(info)),
        _ => {}
    }
    if major == MajorType::Simple {
        return if info == SIMPLE_NULL {
            Ok((major, CborValue::Null, rest))
        } else {
            Err(CborError::UnsupportedSimpleType(info))
        };
    }

    let (argument, rest) = match info {
        0..=23 => (u32::from(info), rest),
        24 | 25 | 26 => {
            let width = 1 << (info - 24);
            let (field, rest) = take(rest, width)?;
            let value = field.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
            (value, rest)
        }
        _ => return Err(CborError::UnsupportedEncoding("indefinite lengths")),
    };

    let (value, rest) = match major {
        MajorType::UnsignedInteger => (CborValue::Unsigned(argument), rest),
        MajorType::NegativeInteger => (CborValue::Negative(-1 - i64::from(argument)), rest),
        MajorType::ByteString => {
            let (content, rest) = take(rest, argument as usize)?;
            (CborValue::Bytes(content), rest)
        }
        MajorType::TextString => {
            let (content, rest) = take(rest, argument as usize)?;
            let text = std::str::from_utf8(content)
                .map_err(|_| CborError::MalformedEncoding("text string is not UTF-8"))?;
            (CborValue::Text(text), rest)
        }
        MajorType::Array => (CborValue::Array(argument), rest),
        MajorType::Map => (CborValue::Map(argument), rest),
        MajorType::Tag => (CborValue::Tag(argument), rest),
        MajorType::Simple => return Err(CborError::UnsupportedSimpleType(info)),
    };
    Ok((major, value, rest))
}

/// Decodes one item, requiring its major type and optionally its argument.
pub fn decode_value(
    input: &[u8],
    expected: MajorType,
    expected_value: Option<u64>,
) -> Result<(CborValue<'_>, &[u8]), CborError> {
    let (major, value, rest) = decode_initial(input)?;
    if major != expected {
        return Err(CborError::UnexpectedType {
            expected: expected as u8,
            actual: major as u8,
        });
    }
    if let Some(expected_value) = expected_value {
        if value.argument() != expected_value {
            return Err(CborError::UnexpectedValue {
                expected: expected_value,
                actual: value.argument(),
            });
        }
    }
    Ok((value, rest))
}

fn skip_item(input: &[u8], depth: usize) -> Result<&[u8], CborError> {
    if depth > MAX_SKIP_DEPTH {
        return Err(CborError::UnsupportedEncoding("deeply nested header value"));
    }
    let (_, value, mut rest) = decode_initial(input)?;
    match value {
        CborValue::Array(n) => {
            for _ in 0..n {
                rest = skip_item(rest, depth + 1)?;
            }
        }
        CborValue::Map(n) => {
            for _ in 0..u64::from(n) * 2 {
                rest = skip_item(rest, depth + 1)?;
            }
        }
        CborValue::Tag(_) => rest = skip_item(rest, depth + 1)?,
        _ => {}
    }
    Ok(rest)
}

/// Looks up the "kid" label in a serialized protected header map.
fn find_kid(protected: &[u8]) -> Result<Option<&[u8]>, CborError> {
    // An empty protected bstr stands for an empty map
    if protected.is_empty() {
        return Ok(None);
    }
    let (header, mut rest) = decode_value(protected, MajorType::Map, None)?;
    for _ in 0..header.argument() {
        let (_, label, after_label) = decode_initial(rest)?;
        if label == CborValue::Unsigned(COSE_KID_LABEL) {
            let (kid, _) = decode_value(after_label, MajorType::ByteString, None)?;
            if let CborValue::Bytes(certificate) = kid {
                return Ok(Some(certificate));
            }
        }
        rest = skip_item(after_label, 1)?;
    }
    Ok(None)
}

/// Returns the DER signing certificate embedded in a Mozilla COSE_Sign envelope.
///
/// Shape: `98([protected, {}, null, [[protected, {}, signature], ...]])`. The
/// certificate is the kid of the first signature whose protected header has one.
pub fn parse_moz_cose(data: &[u8]) -> Result<&[u8], CborError> {
    let (_, rest) = decode_value(data, MajorType::Tag, Some(COSE_SIGN_TAG))?;
    let (_, rest) = decode_value(rest, MajorType::Array, Some(4))?;
    let (_, rest) = decode_value(rest, MajorType::ByteString, None)?;
    let (_, rest) = decode_value(rest, MajorType::Map, Some(0))?;
    let (_, rest) = decode_value(rest, MajorType::Simple, None)?;
    let (signatures, mut rest) = decode_value(rest, MajorType::Array, None)?;

    for index in 0..signatures.argument() {
        let (_, r) = decode_value(rest, MajorType::Array, Some(3))?;
        let (protected, r) = decode_value(r, MajorType::ByteString, None)?;
        let (_, r) = decode_value(r, MajorType::Map, Some(0))?;
        let (_, r) = decode_value(r, MajorType::ByteString, None)?;
        rest = r;

        if let CborValue::Bytes(protected) = protected {
            if let Some(certificate) = find_kid(protected)? {
                tracing::debug!(index, size = certificate.len(), "Found COSE signing certificate");
                return Ok(certificate);
            }
        }
    }

    Err(CborError::CertificateNotFound)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use test_case::test_case;

    fn bstr(content: &[u8]) -> Vec<u8> {
        let mut out = if content.len() < 24 {
            vec![0x40 | content.len() as u8]
        } else if content.len() < 256 {
            vec![0x58, content.len() as u8]
        } else {
            vec![0x59, (content.len() >> 8) as u8, content.len() as u8]
        };
        out.extend_from_slice(content);
        out
    }

    /// Builds `98([h'', {}, null, [signatures...]])`.
    pub(crate) fn cose_sign(signature_headers: &[Vec<u8>]) -> Vec<u8> {
        let mut out = vec![0xd8, 0x62, 0x84, 0x40, 0xa0, 0xf6];
        out.push(0x80 | signature_headers.len() as u8);
        for protected in signature_headers {
            out.push(0x83);
            out.extend(bstr(protected));
            out.push(0xa0);
            out.extend(bstr(&[0xde, 0xad]));
        }
        out
    }

    /// Protected header `{1: -37, 4: h'<certificate>'}`.
    pub(crate) fn protected_with_kid(certificate: &[u8]) -> Vec<u8> {
        let mut out = vec![0xa2, 0x01, 0x38, 0x24, 0x04];
        out.extend(bstr(certificate));
        out
    }

    #[test]
    fn test_decode_small_values() {
        assert_eq!(
            decode_initial(&[0x17]).unwrap(),
            (MajorType::UnsignedInteger, CborValue::Unsigned(23), &[][..])
        );
        assert_eq!(
            decode_initial(&[0x18, 0xff, 0x01]).unwrap(),
            (MajorType::UnsignedInteger, CborValue::Unsigned(255), &[0x01][..])
        );
        assert_eq!(
            decode_initial(&[0x1a, 0x00, 0x01, 0x00, 0x00]).unwrap().1,
            CborValue::Unsigned(65536)
        );
        assert_eq!(decode_initial(&[0x38, 0x24]).unwrap().1, CborValue::Negative(-37));
        assert_eq!(decode_initial(&[0x20]).unwrap().1, CborValue::Negative(-1));
        assert_eq!(decode_initial(&[0xf6]).unwrap().1, CborValue::Null);
    }

    #[test]
    fn test_decode_strings() {
        let (major, value, rest) = decode_initial(&[0x43, 1, 2, 3, 9]).unwrap();
        assert_eq!(major, MajorType::ByteString);
        assert_eq!(value, CborValue::Bytes(&[1, 2, 3]));
        assert_eq!(rest, &[9]);

        let (_, value, _) = decode_initial(&[0x62, b'o', b'k']).unwrap();
        assert_eq!(value, CborValue::Text("ok"));
    }

    #[test_case(&[0x1b, 0, 0, 0, 0, 0, 0, 0, 1], CborError::UnsupportedEncoding("64-bit arguments") ; "eight byte argument")]
    #[test_case(&[0x1c], CborError::ReservedAdditionalInfo(28) ; "reserved 28")]
    #[test_case(&[0x1e], CborError::ReservedAdditionalInfo(30) ; "reserved 30")]
    #[test_case(&[0x5f], CborError::UnsupportedEncoding("indefinite lengths") ; "indefinite byte string")]
    #[test_case(&[0xf5], CborError::UnsupportedSimpleType(21) ; "true")]
    #[test_case(&[0xff], CborError::UnsupportedSimpleType(31) ; "break")]
    #[test_case(&[0x19, 0x01], CborError::TruncatedBuffer { needed: 2, available: 1 } ; "short argument")]
    #[test_case(&[0x45, 1, 2], CborError::TruncatedBuffer { needed: 5, available: 2 } ; "short string")]
    #[test_case(&[], CborError::TruncatedBuffer { needed: 1, available: 0 } ; "empty")]
    #[test_case(&[0x62, 0xff, 0xfe], CborError::MalformedEncoding("text string is not UTF-8") ; "bad utf8")]
    fn test_decode_initial_errors(input: &[u8], expected: CborError) {
        assert_eq!(decode_initial(input).unwrap_err(), expected);
    }

    #[test]
    fn test_decode_value_assertions() {
        assert_eq!(
            decode_value(&[0x84], MajorType::Array, Some(4)).unwrap().0,
            CborValue::Array(4)
        );
        assert_eq!(
            decode_value(&[0x84], MajorType::Map, None).unwrap_err(),
            CborError::UnexpectedType { expected: 5, actual: 4 }
        );
        assert_eq!(
            decode_value(&[0x83], MajorType::Array, Some(4)).unwrap_err(),
            CborError::UnexpectedValue { expected: 4, actual: 3 }
        );
    }

    #[test]
    fn test_parse_moz_cose_returns_kid() {
        let certificate: Vec<u8> = (0u8..10).collect();
        let envelope = cose_sign(&[protected_with_kid(&certificate)]);
        assert_eq!(parse_moz_cose(&envelope).unwrap(), &certificate[..]);
    }

    #[test]
    fn test_parse_moz_cose_uses_first_signature_with_kid() {
        let envelope = cose_sign(&[vec![0xa1, 0x01, 0x26], protected_with_kid(b"second")]);
        assert_eq!(parse_moz_cose(&envelope).unwrap(), b"second");
    }

    #[test]
    fn test_parse_moz_cose_skips_structured_header_values() {
        // {3: [1, 2], 4: h'cert'}
        let mut protected = vec![0xa2, 0x03, 0x82, 0x01, 0x02, 0x04];
        protected.extend(bstr(b"cert"));
        let envelope = cose_sign(&[protected]);
        assert_eq!(parse_moz_cose(&envelope).unwrap(), b"cert");
    }

    #[test]
    fn test_parse_moz_cose_without_signatures() {
        let envelope = cose_sign(&[]);
        assert_eq!(parse_moz_cose(&envelope), Err(CborError::CertificateNotFound));
    }

    #[test]
    fn test_parse_moz_cose_wrong_tag() {
        let mut envelope = cose_sign(&[]);
        envelope[1] = 0x61;
        assert_eq!(
            parse_moz_cose(&envelope),
            Err(CborError::UnexpectedValue { expected: 98, actual: 97 })
        );
    }
}
