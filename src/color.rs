use serde_json::Value;

pub const OBSCURED_COLOUR: &str = "#990000";

/// Converts a legacy decimal ARGB color into `#rrggbb` text. Alpha is dropped.
pub fn decimal_to_hex(decimal: i64) -> String {
    let (r, g, b) = decimal_to_rgb(decimal);
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

pub fn decimal_to_rgb(decimal: i64) -> (u8, u8, u8) {
    let value = decimal as u32;
    (
        ((value >> 16) & 0xFF) as u8,
        ((value >> 8) & 0xFF) as u8,
        (value & 0xFF) as u8,
    )
}

pub fn value_to_hex(value: &Value) -> String {
    let decimal = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_default(),
        Value::String(s) => {
            if s.starts_with('#') {
                return s.to_lowercase();
            }
            s.trim().parse::<f64>().map(|f| f as i64).unwrap_or_default()
        }
        _ => 0,
    };
    decimal_to_hex(decimal)
}
