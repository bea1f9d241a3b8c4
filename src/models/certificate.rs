//! Signer certificate data

use serde::Serialize;

/// Subject fields of a signing certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CertificateSubject {
    #[serde(rename = "CN", skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
    #[serde(rename = "OU", skip_serializing_if = "Option::is_none")]
    pub organizational_unit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureKind {
    /// `META-INF/cose.sig` is present.
    Cose,
    /// Only the legacy `META-INF/mozilla.rsa` PKCS#7 signature is present.
    Pkcs7Only,
    Unsigned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureInfo {
    pub kind: SignatureKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<CertificateSubject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_size: Option<usize>,
}

impl SignatureInfo {
    /// Mozilla signs release add-ons with OU "Production".
    pub fn is_production(&self) -> bool {
        self.subject
            .as_ref()
            .and_then(|s| s.organizational_unit.as_deref())
            == Some("Production")
    }
}
