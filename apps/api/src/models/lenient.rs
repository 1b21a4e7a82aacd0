//! Lenient numeric deserializers for question timing fields.
//!
//! The editor posts whatever the input boxes hold: numbers, numeric strings,
//! empty strings or null. Anything that is not a usable non-negative number
//! becomes zero instead of rejecting the whole payload.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Clamps a value to a usable duration component. NaN, infinities and
/// negatives become zero.
pub fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn value_to_f64(value: &Value) -> f64 {
    let raw = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    sanitize(raw)
}

pub fn f64_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(value_to_f64).unwrap_or(0.0))
}

pub fn u32_or_zero<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let n = value.as_ref().map(value_to_f64).unwrap_or(0.0);
    Ok(n.trunc().min(u32::MAX as f64) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Timing {
        #[serde(default, deserialize_with = "f64_or_zero")]
        minutes: f64,
        #[serde(default, deserialize_with = "u32_or_zero")]
        count: u32,
    }

    fn timing(json: &str) -> Timing {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_accepts_numbers_and_numeric_strings() {
        let p = timing(r#"{"minutes": 2.5, "count": "7"}"#);
        assert_eq!(p.minutes, 2.5);
        assert_eq!(p.count, 7);
    }

    #[test]
    fn test_garbage_and_null_become_zero() {
        let p = timing(r#"{"minutes": "abc", "count": null}"#);
        assert_eq!(p.minutes, 0.0);
        assert_eq!(p.count, 0);
    }

    #[test]
    fn test_missing_fields_default_to_zero() {
        let p = timing("{}");
        assert_eq!(p.minutes, 0.0);
        assert_eq!(p.count, 0);
    }

    #[test]
    fn test_negative_values_clamp_to_zero() {
        let p = timing(r#"{"minutes": -4, "count": -1}"#);
        assert_eq!(p.minutes, 0.0);
        assert_eq!(p.count, 0);
    }

    #[test]
    fn test_sanitize_rejects_non_finite() {
        assert_eq!(sanitize(f64::NAN), 0.0);
        assert_eq!(sanitize(f64::INFINITY), 0.0);
        assert_eq!(sanitize(3.0), 3.0);
    }
}
