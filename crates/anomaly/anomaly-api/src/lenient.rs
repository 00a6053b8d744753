//! Lenient deserializers for integer settings.
//!
//! Settings files written by hand or by other tools often carry whole
//! numbers as floats (`"window_size": 16.0`). These accept any
//! non-negative JSON number and truncate the fractional part.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Number;

fn whole<E: serde::de::Error>(number: &Number) -> Result<u64, E> {
    if let Some(n) = number.as_u64() {
        return Ok(n);
    }
    match number.as_f64() {
        Some(f) if f.is_finite() && f >= 0.0 && f < u64::MAX as f64 => Ok(f.trunc() as u64),
        _ => Err(E::custom(format!(
            "expected a non-negative whole number, got {}",
            number
        ))),
    }
}

pub(crate) fn whole_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Number::deserialize(deserializer)?;
    whole(&number)
}

pub(crate) fn whole_usize<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let n = whole_u64(deserializer)?;
    usize::try_from(n).map_err(D::Error::custom)
}

pub(crate) fn optional_whole_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Number>::deserialize(deserializer)? {
        Some(number) => whole(&number).map(Some),
        None => Ok(None),
    }
}
