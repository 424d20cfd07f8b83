//! Decoding helpers for JSON fields whose shape varies between responses.
//!
//! Remote APIs are not consistent about scalar encodings: a version arrives as
//! `1` in one package and `"1"` in the next, a list field collapses to a bare
//! string when it has one element. These types accept every observed shape and
//! defer interpretation to the caller.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An integer encoded either as a JSON number or as a numeric string.
///
/// Decoding fails only when neither form parses. Always serialises as a number.
///
/// ```
/// use upstream_core::json::FlexInt;
///
/// let a: FlexInt = serde_json::from_str("1").unwrap();
/// let b: FlexInt = serde_json::from_str("\"1\"").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.get(), 1);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlexInt(pub i64);

impl FlexInt {
    /// Returns the decoded value.
    #[must_use]
    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for FlexInt {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for FlexInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for FlexInt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> Deserialize<'de> for FlexInt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FlexIntVisitor)
    }
}

struct FlexIntVisitor;

impl Visitor<'_> for FlexIntVisitor {
    type Value = FlexInt;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer or a string containing an integer")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<FlexInt, E> {
        Ok(FlexInt(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<FlexInt, E> {
        i64::try_from(value)
            .map(FlexInt)
            .map_err(|_| E::custom(format!("integer {value} out of range")))
    }

    #[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
    fn visit_f64<E: de::Error>(self, value: f64) -> Result<FlexInt, E> {
        let truncated = value.trunc();
        if truncated == value && value.is_finite() && value.abs() < 9.0e15 {
            Ok(FlexInt(truncated as i64))
        } else {
            Err(E::invalid_value(de::Unexpected::Float(value), &self))
        }
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<FlexInt, E> {
        value
            .trim()
            .parse::<i64>()
            .map(FlexInt)
            .map_err(|_| E::invalid_value(de::Unexpected::Str(value), &self))
    }
}

/// A field that arrives either as a single value or as a list of values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// Bare value.
    One(T),
    /// List of values.
    Many(Vec<T>),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    /// Returns the values as a slice, whichever shape was received.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        }
    }

    /// Converts into a `Vec`.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }

    /// Returns true when no values were received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

/// A scalar that arrives either as a JSON number or as a string.
///
/// Strings are kept verbatim; [`as_f64`](Self::as_f64) parses them on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberOrText {
    /// Numeric encoding.
    Number(f64),
    /// Textual encoding (may or may not be numeric).
    Text(String),
}

impl NumberOrText {
    /// Returns the numeric value, parsing text when it holds a number.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(text) => text.trim().parse().ok(),
        }
    }

    /// Returns the text when the value was encoded as a non-numeric string.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) if text.trim().parse::<f64>().is_err() => Some(text),
            _ => None,
        }
    }
}

/// Deserialises `null` as `T::default()`.
///
/// For use with `#[serde(default, deserialize_with = "...")]` on list fields the
/// remote sends as `null` when empty.
///
/// # Errors
///
/// Propagates the inner deserialiser's error.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Strips a leading UTF-8 byte order mark.
#[must_use]
pub fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_flex_int_number_and_string_agree() {
        let from_number: FlexInt = serde_json::from_str("1").unwrap();
        let from_string: FlexInt = serde_json::from_str("\"1\"").unwrap();
        assert_eq!(from_number, FlexInt(1));
        assert_eq!(from_string, FlexInt(1));
    }

    #[test]
    fn test_flex_int_accepts_whitespace_and_negative() {
        let value: FlexInt = serde_json::from_str("\" -12 \"").unwrap();
        assert_eq!(value.get(), -12);
    }

    #[test]
    fn test_flex_int_accepts_integral_float() {
        let value: FlexInt = serde_json::from_str("3.0").unwrap();
        assert_eq!(value.get(), 3);
    }

    #[test]
    fn test_flex_int_rejects_non_numeric() {
        assert!(serde_json::from_str::<FlexInt>("\"one\"").is_err());
        assert!(serde_json::from_str::<FlexInt>("1.5").is_err());
        assert!(serde_json::from_str::<FlexInt>("true").is_err());
        assert!(serde_json::from_str::<FlexInt>("null").is_err());
    }

    #[test]
    fn test_flex_int_serialises_as_number() {
        assert_eq!(serde_json::to_string(&FlexInt(7)).unwrap(), "7");
    }

    #[test]
    fn test_one_or_many_both_shapes() {
        let one: OneOrMany<String> = serde_json::from_str("\"iframe\"").unwrap();
        let many: OneOrMany<String> = serde_json::from_str("[\"div\",\"iframe\"]").unwrap();
        assert_eq!(one.as_slice(), ["iframe".to_string()]);
        assert_eq!(many.into_vec(), vec!["div".to_string(), "iframe".to_string()]);
        assert!(OneOrMany::<String>::default().is_empty());
    }

    #[test]
    fn test_number_or_text_lazy_interpretation() {
        let number: NumberOrText = serde_json::from_str("0.42").unwrap();
        let numeric_text: NumberOrText = serde_json::from_str("\"0.42\"").unwrap();
        let label: NumberOrText = serde_json::from_str("\"HIGH\"").unwrap();

        assert_eq!(number.as_f64(), Some(0.42));
        assert_eq!(numeric_text.as_f64(), Some(0.42));
        assert_eq!(label.as_f64(), None);
        assert_eq!(label.as_text(), Some("HIGH"));
        assert_eq!(numeric_text.as_text(), None);
    }

    #[test]
    fn test_null_as_default() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(default, deserialize_with = "null_as_default")]
            items: Vec<i64>,
        }
        let null: Holder = serde_json::from_str(r#"{"items": null}"#).unwrap();
        let missing: Holder = serde_json::from_str("{}").unwrap();
        let present: Holder = serde_json::from_str(r#"{"items": [1, 2]}"#).unwrap();
        assert!(null.items.is_empty());
        assert!(missing.items.is_empty());
        assert_eq!(present.items, vec![1, 2]);
    }

    #[test]
    fn test_strip_bom() {
        assert_eq!(strip_bom(b"\xEF\xBB\xBF{}"), b"{}");
        assert_eq!(strip_bom(b"{}"), b"{}");
    }
}
