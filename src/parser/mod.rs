//! Byte-level readers: integer primitives, DER, CBOR/COSE and manifest.json

pub mod primitives;
pub mod der;
pub mod cbor;
pub mod manifest;

pub use primitives::{read_fixed_le, read_proto_varint};
pub use der::{parse_certificate, parse_der_tlv, parse_der_tlvs, Tlv, TlvWalker};
pub use cbor::{decode_initial, decode_value, parse_moz_cose, CborValue, MajorType};
pub use manifest::parse_manifest;
