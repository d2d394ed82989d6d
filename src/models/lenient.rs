// Lenient numeric decoding: the statistics API sends some numbers as JSON strings
// (e.g. "bandwidth": "1048576.5") and occasionally as null.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
    Null(()),
}

/// Decodes a number, a numeric string or null (as 0.0).
pub(crate) fn f64_lenient<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => Ok(n),
        NumberOrText::Text(s) if s.trim().is_empty() => Ok(0.0),
        NumberOrText::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid number {s:?}: {e}"))),
        NumberOrText::Null(()) => Ok(0.0),
    }
}

/// Decodes a non-negative count; fractional or negative values are rejected.
pub(crate) fn u64_lenient<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let n = f64_lenient(deserializer)?;
    if !n.is_finite() || n < 0.0 || n.fract() != 0.0 {
        return Err(serde::de::Error::custom(format!(
            "expected a non-negative integer count, got {n}"
        )));
    }
    Ok(n as u64)
}
