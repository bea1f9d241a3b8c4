//! Signer inspection for Mozilla-signed add-ons
//!
//! `META-INF/cose.sig` is a COSE_Sign envelope whose signature carries the
//! end-entity certificate as its kid. That certificate's Subject names the
//! add-on (CN) and the signing environment (OU).

use crate::error::SignatureError;
use crate::models::{CertificateSubject, SignatureInfo, SignatureKind};
use crate::packager::PackageArchive;
use crate::parser::{parse_certificate, parse_moz_cose};

pub const COSE_SIGNATURE_PATH: &str = "META-INF/cose.sig";
pub const PKCS7_SIGNATURE_PATH: &str = "META-INF/mozilla.rsa";

/// Subject of the certificate embedded in a `cose.sig` file.
pub fn cose_signer(cose: &[u8]) -> Result<(CertificateSubject, usize), SignatureError> {
    let certificate = parse_moz_cose(cose)?;
    let subject = parse_certificate(certificate)?;
    Ok((subject, certificate.len()))
}

pub fn inspect_signature(archive: &mut PackageArchive) -> Result<SignatureInfo, SignatureError> {
    if archive.contains(COSE_SIGNATURE_PATH) {
        let cose = archive.read(COSE_SIGNATURE_PATH)?;
        let (subject, certificate_size) = cose_signer(&cose)?;
        tracing::debug!(?subject, "Read COSE signer");
        return Ok(SignatureInfo {
            kind: SignatureKind::Cose,
            subject: Some(subject),
            certificate_size: Some(certificate_size),
        });
    }

    let kind = if archive.contains(PKCS7_SIGNATURE_PATH) {
        SignatureKind::Pkcs7Only
    } else {
        SignatureKind::Unsigned
    };
    Ok(SignatureInfo {
        kind,
        subject: None,
        certificate_size: None,
    })
}
