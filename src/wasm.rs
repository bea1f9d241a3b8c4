//! WebAssembly bindings for the package viewer

use bytes::Bytes;
use wasm_bindgen::prelude::*;

use crate::config::DecodeOptions;
use crate::models::DecodedPackage;
use crate::packager::crx::decode_container_with;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    fn log(s: &str);
}

macro_rules! console_log {
    ($($t:tt)*) => (log(&format_args!($($t)*).to_string()))
}

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

fn options(strict: bool) -> DecodeOptions {
    if strict {
        DecodeOptions::strict()
    } else {
        DecodeOptions::default()
    }
}

fn decode(data: &[u8], strict: bool) -> Result<DecodedPackage, JsValue> {
    let package = decode_container_with(Bytes::copy_from_slice(data), &options(strict))
        .map_err(|e| JsValue::from_str(&format!("Failed to decode package: {}", e)))?;
    for warning in &package.warnings {
        web_sys::console::warn_1(&JsValue::from_str(&warning.to_string()));
    }
    Ok(package)
}

/// Decode a CRX/ZIP/XPI and return its report as JSON
#[wasm_bindgen]
pub fn decode_package(data: &[u8], strict: bool) -> Result<String, JsValue> {
    let package = decode(data, strict)?;
    console_log!("Decoded {} package, {} byte payload", package.format, package.payload.len());

    let report = crate::inspect_package(&package)
        .map_err(|e| JsValue::from_str(&format!("Failed to inspect package: {:#}", e)))?;

    serde_json::to_string_pretty(&report)
        .map_err(|e| JsValue::from_str(&format!("Failed to serialize report: {}", e)))
}

/// Return the inner ZIP archive of a package
#[wasm_bindgen]
pub fn extract_zip(data: &[u8]) -> Result<Vec<u8>, JsValue> {
    Ok(decode(data, false)?.payload.to_vec())
}

/// Return the outer container when it wrapped a nested CRX, otherwise undefined
#[wasm_bindgen]
pub fn extract_original(data: &[u8]) -> Result<Option<js_sys::Uint8Array>, JsValue> {
    let package = decode(data, false)?;
    Ok(package.original.map(|original| js_sys::Uint8Array::from(original.as_ref())))
}

/// Compute the extension ID of a base64 encoded public key
#[wasm_bindgen]
pub fn extension_id(public_key: &str) -> Result<String, JsValue> {
    crate::packager::public_key_to_extension_id(public_key)
        .map(|id| id.to_string())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Read the signer of an XPI from its COSE signature, as JSON
#[wasm_bindgen]
pub fn signer(data: &[u8]) -> Result<String, JsValue> {
    let package = decode(data, false)?;
    let mut archive = crate::packager::PackageArchive::open(&package)
        .map_err(|e| JsValue::from_str(&format!("Failed to open archive: {:#}", e)))?;
    let info = crate::signing::inspect_signature(&mut archive)
        .map_err(|e| JsValue::from_str(&format!("Failed to read signature: {}", e)))?;

    serde_json::to_string_pretty(&info)
        .map_err(|e| JsValue::from_str(&format!("Failed to serialize signer: {}", e)))
}
