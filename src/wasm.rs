use crate::specmap::SpecMap;
use futures::executor::block_on;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub fn convert_sb2_to_sb3(bytes: &[u8]) -> Result<Vec<u8>, JsValue> {
    block_on(crate::convert_sb2_bytes(bytes, &SpecMap::builtin()))
        .map_err(|e| JsValue::from_str(&format!("{:#}", e)))
}

#[wasm_bindgen]
pub fn convert_sb2_to_project_json(bytes: &[u8]) -> Result<String, JsValue> {
    block_on(crate::convert_sb2_bytes_to_json(bytes, &SpecMap::builtin()))
        .map_err(|e| JsValue::from_str(&format!("{:#}", e)))
}

#[wasm_bindgen]
pub fn convert_sb2_with_spec_map(bytes: &[u8], spec_map_json: &str) -> Result<Vec<u8>, JsValue> {
    let mut spec_map = SpecMap::builtin();
    let overrides =
        SpecMap::from_json_str(spec_map_json).map_err(|e| JsValue::from_str(&e.to_string()))?;
    spec_map.extend(overrides);
    block_on(crate::convert_sb2_bytes(bytes, &spec_map))
        .map_err(|e| JsValue::from_str(&format!("{:#}", e)))
}
