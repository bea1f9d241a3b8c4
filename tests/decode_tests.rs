//! End-to-end decoding of synthetic CRX2, CRX3 and nested packages

use bytes::Bytes;
use crxviewer::packager::identity::crx_id_of;
use crxviewer::packager::PackageArchive;
use crxviewer::{
    decode_container, decode_container_with, inspect_package, public_key_to_extension_id,
    ContainerFormat, CrxError, DecodeOptions, DecodeWarning,
};
use pretty_assertions::assert_eq;
use std::io::{Cursor, Write};
use test_case::test_case;
use zip::write::{FileOptions, ZipWriter};

const MANIFEST: &str = r#"{
    "manifest_version": 3,
    "name": "Sample",
    "version": "1.2.3"
}"#;

fn zip_with(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in files {
        zip.start_file(*name, FileOptions::default()).unwrap();
        zip.write_all(content).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn sample_zip() -> Vec<u8> {
    zip_with(&[
        ("manifest.json", MANIFEST.as_bytes()),
        ("background.js", b"console.log('hi');"),
    ])
}

fn varint(mut value: u32) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}

fn field(key: u32, value: &[u8]) -> Vec<u8> {
    let mut out = varint(key);
    out.extend(varint(value.len() as u32));
    out.extend_from_slice(value);
    out
}

fn crx2(public_key: &[u8], payload: &[u8]) -> Vec<u8> {
    let signature = b"signature";
    let mut out = b"Cr24".to_vec();
    out.extend(2u32.to_le_bytes());
    out.extend((public_key.len() as u32).to_le_bytes());
    out.extend((signature.len() as u32).to_le_bytes());
    out.extend_from_slice(public_key);
    out.extend_from_slice(signature);
    out.extend_from_slice(payload);
    out
}

fn crx3(public_key: &[u8], payload: &[u8]) -> Vec<u8> {
    let proof = [field(0x0a, public_key), field(0x12, b"signature")].concat();
    let header = [
        field(0x12, &proof),
        field(80002, &field(0x0a, &crx_id_of(public_key))),
    ]
    .concat();
    let mut out = b"Cr24".to_vec();
    out.extend(3u32.to_le_bytes());
    out.extend((header.len() as u32).to_le_bytes());
    out.extend(header);
    out.extend_from_slice(payload);
    out
}

#[test]
fn test_plain_zip_passes_through() {
    let zip = sample_zip();
    let package = decode_container(Bytes::from(zip.clone())).unwrap();
    assert_eq!(package.format, ContainerFormat::Zip);
    assert_eq!(package.payload.as_ref(), zip.as_slice());
    assert_eq!(package.public_key, None);
    assert!(package.original.is_none());
    assert!(package.warnings.is_empty());
}

#[test]
fn test_crx2_payload_and_identity() {
    let zip = sample_zip();
    let package = decode_container(Bytes::from(crx2(b"crx2 key", &zip))).unwrap();

    assert_eq!(package.format, ContainerFormat::Crx2);
    assert_eq!(package.payload.as_ref(), zip.as_slice());
    assert_eq!(package.mime_type, "application/zip");
    assert_eq!(package.public_key_bytes().as_deref(), Some(&b"crx2 key"[..]));

    let from_base64 = public_key_to_extension_id(package.public_key.as_deref().unwrap()).unwrap();
    assert_eq!(package.extension_id(), Some(from_base64));
}

#[test]
fn test_crx3_payload_and_identity() {
    let zip = sample_zip();
    let package = decode_container(Bytes::from(crx3(b"crx3 key", &zip))).unwrap();

    assert_eq!(package.format, ContainerFormat::Crx3);
    assert_eq!(package.payload.as_ref(), zip.as_slice());
    assert!(package.payload.starts_with(b"PK\x03\x04"));
    assert_eq!(package.public_key_bytes().as_deref(), Some(&b"crx3 key"[..]));
    assert_eq!(package.nesting_depth, 0);
    assert!(!package.is_nested());
}

#[test]
fn test_nested_crx3_keeps_original_and_outer_key() {
    let zip = sample_zip();
    let inner = crx3(b"inner key", &zip);
    let outer = crx3(b"outer key", &inner);

    let package = decode_container(Bytes::from(outer.clone())).unwrap();
    assert_eq!(package.payload.as_ref(), zip.as_slice());
    assert_eq!(package.original.as_deref(), Some(outer.as_slice()));
    assert_eq!(package.nesting_depth, 1);
    assert_eq!(package.public_key_bytes().as_deref(), Some(&b"outer key"[..]));
    assert_eq!(package.warnings, vec![DecodeWarning::NestedKeyMismatch { depth: 1 }]);
}

#[test]
fn test_nested_same_key_has_no_warning() {
    let zip = sample_zip();
    let outer = crx3(b"key", &crx3(b"key", &crx3(b"key", &zip)));
    let package = decode_container(Bytes::from(outer)).unwrap();
    assert_eq!(package.nesting_depth, 2);
    assert!(package.warnings.is_empty());
}

#[test]
fn test_decoding_payload_again_is_stable() {
    let zip = sample_zip();
    let first = decode_container(Bytes::from(crx3(b"key", &zip))).unwrap();
    let second = decode_container(first.payload.clone()).unwrap();
    assert_eq!(second.format, ContainerFormat::Zip);
    assert_eq!(second.payload, first.payload);
}

#[test]
fn test_nesting_limit() {
    let zip = sample_zip();
    let mut data = zip;
    for _ in 0..4 {
        data = crx3(b"key", &data);
    }
    let options = DecodeOptions {
        max_nesting_depth: 2,
        ..DecodeOptions::default()
    };
    assert_eq!(
        decode_container_with(Bytes::from(data.clone()), &options).unwrap_err(),
        CrxError::TooDeeplyNested { limit: 2 }
    );
    assert_eq!(decode_container(Bytes::from(data)).unwrap().nesting_depth, 3);
}

#[test_case(b"Cr24" ; "magic only")]
#[test_case(b"Cr24\x03\x00\x00\x00" ; "version without header length")]
#[test_case(b"Cr24\x02\x00\x00\x00\x10\x00\x00\x00" ; "crx2 without signature length")]
fn test_truncated_headers(input: &'static [u8]) {
    assert!(matches!(
        decode_container(Bytes::from_static(input)),
        Err(CrxError::TruncatedBuffer { .. })
    ));
}

#[test]
fn test_zip_without_leading_magic() {
    let mut data = b"junk before the archive".to_vec();
    data.extend(sample_zip());
    let package = decode_container(Bytes::from(data.clone())).unwrap();
    assert_eq!(package.format, ContainerFormat::Zip);
    assert_eq!(package.payload.len(), data.len());
    assert_eq!(package.warnings, vec![DecodeWarning::ZipWithoutMagic]);
}

#[test]
fn test_strict_rejects_unknown_field() {
    let zip = sample_zip();
    let key = b"key";
    let proof = [field(0x0a, key), field(0x12, b"sig")].concat();
    let header = [
        field(0x12, &proof),
        field(80002, &field(0x0a, &crx_id_of(key))),
        field(0x2a, b"future field"),
    ]
    .concat();
    let mut data = b"Cr24".to_vec();
    data.extend(3u32.to_le_bytes());
    data.extend((header.len() as u32).to_le_bytes());
    data.extend(header);
    data.extend(zip);

    let lenient = decode_container(Bytes::from(data.clone())).unwrap();
    assert_eq!(
        lenient.warnings,
        vec![DecodeWarning::UnknownHeaderField { key: 0x2a, length: 12 }]
    );
    assert_eq!(
        decode_container_with(Bytes::from(data), &DecodeOptions::strict()).unwrap_err(),
        CrxError::UnexpectedHeaderField { key: 0x2a }
    );
}

#[test]
fn test_archive_listing_and_report() {
    let package = decode_container(Bytes::from(crx3(b"key", &sample_zip()))).unwrap();

    let mut archive = PackageArchive::open(&package).unwrap();
    let names: Vec<_> = archive.entries().iter().map(|e| e.path.as_str()).collect();
    assert_eq!(names, vec!["manifest.json", "background.js"]);
    assert_eq!(archive.read("background.js").unwrap(), b"console.log('hi');");

    let report = inspect_package(&package).unwrap();
    assert_eq!(report.file_count, 2);
    assert_eq!(report.name.as_deref(), Some("Sample"));
    assert_eq!(report.version.as_deref(), Some("1.2.3"));
    assert_eq!(report.summary.extension_id, package.extension_id().map(|id| id.to_string()));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["format"], "crx3");
    assert_eq!(json["signature"]["kind"], "unsigned");
}
