//! JSON codec policies: key naming, date representation and binary data
//! representation, settable separately for decoding and encoding.
//!
//! # Design
//! Key strategies rewrite object keys on a `serde_json::Value` between the
//! wire and the model, so models keep plain snake_case field names. Dates and
//! bytes cannot be recognised structurally, so model fields opt in with
//! `#[serde(with = "resonance_core::codec::date")]` or
//! `#[serde(with = "resonance_core::codec::bytes")]`; those helpers read the
//! policy of the decoder or encoder that is currently running on this thread.

use std::cell::RefCell;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// How object keys are spelled on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStrategy {
    /// Keys are used exactly as the model spells them.
    #[default]
    UseDefaultKeys,
    /// The wire uses camelCase: decoding converts keys to snake_case,
    /// encoding converts them back to camelCase.
    CamelCase,
}

/// How `chrono::DateTime<Utc>` fields marked with [`date`] are represented.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DateStrategy {
    /// RFC 3339 strings.
    #[default]
    Iso8601,
    SecondsSince1970,
    MillisecondsSince1970,
    /// A `chrono` format string, interpreted as UTC.
    Formatted(String),
}

/// How `Vec<u8>` fields marked with [`bytes`] are represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BytesStrategy {
    /// Standard base64 strings.
    #[default]
    Base64,
    /// JSON arrays of numbers.
    Array,
}

/// Optional policy fields. Unset fields leave whatever they are applied to
/// unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodecOverrides {
    pub keys: Option<KeyStrategy>,
    pub dates: Option<DateStrategy>,
    pub bytes: Option<BytesStrategy>,
}

/// Fully resolved policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodecPolicy {
    pub keys: KeyStrategy,
    pub dates: DateStrategy,
    pub bytes: BytesStrategy,
}

impl CodecPolicy {
    /// Copy every field that `overrides` sets.
    pub fn apply(&mut self, overrides: &CodecOverrides) {
        if let Some(keys) = overrides.keys {
            self.keys = keys;
        }
        if let Some(dates) = &overrides.dates {
            self.dates = dates.clone();
        }
        if let Some(bytes) = overrides.bytes {
            self.bytes = bytes;
        }
    }
}

/// Decodes JSON bytes into models.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonDecoder {
    pub policy: CodecPolicy,
}

impl JsonDecoder {
    pub fn new(policy: CodecPolicy) -> Self {
        Self { policy }
    }

    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, serde_json::Error> {
        let value: Value = serde_json::from_slice(bytes)?;
        let value = match self.policy.keys {
            KeyStrategy::UseDefaultKeys => value,
            KeyStrategy::CamelCase => rewrite_keys(value, &to_snake_case),
        };
        with_policy(&self.policy, || serde_json::from_value(value))
    }
}

/// Encodes models into JSON bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonEncoder {
    pub policy: CodecPolicy,
}

impl JsonEncoder {
    pub fn new(policy: CodecPolicy) -> Self {
        Self { policy }
    }

    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, serde_json::Error> {
        let value = with_policy(&self.policy, || serde_json::to_value(value))?;
        let value = match self.policy.keys {
            KeyStrategy::UseDefaultKeys => value,
            KeyStrategy::CamelCase => rewrite_keys(value, &to_camel_case),
        };
        serde_json::to_vec(&value)
    }
}

thread_local! {
    static ACTIVE: RefCell<Option<CodecPolicy>> = const { RefCell::new(None) };
}

fn with_policy<R>(policy: &CodecPolicy, f: impl FnOnce() -> R) -> R {
    let previous = ACTIVE.with(|active| active.replace(Some(policy.clone())));
    let result = f();
    ACTIVE.with(|active| active.replace(previous));
    result
}

fn active_policy() -> CodecPolicy {
    ACTIVE.with(|active| active.borrow().clone().unwrap_or_default())
}

fn rewrite_keys(value: Value, rename: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(object) => Value::Object(
            object
                .into_iter()
                .map(|(key, value)| (rename(&key), rewrite_keys(value, rename)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|item| rewrite_keys(item, rename)).collect())
        }
        other => other,
    }
}

fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (index, ch) in key.char_indices() {
        if ch.is_uppercase() {
            if index > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn to_camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for ch in key.chars() {
        if ch == '_' && !out.is_empty() {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// `#[serde(with)]` helper for `DateTime<Utc>` fields following the active
/// [`DateStrategy`].
pub mod date {
    use std::fmt::Write;

    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{active_policy, DateStrategy};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        match active_policy().dates {
            DateStrategy::Iso8601 => serializer.serialize_str(&value.to_rfc3339()),
            DateStrategy::SecondsSince1970 => serializer.serialize_i64(value.timestamp()),
            DateStrategy::MillisecondsSince1970 => serializer.serialize_i64(value.timestamp_millis()),
            DateStrategy::Formatted(format) => {
                let mut out = String::new();
                write!(out, "{}", value.format(&format))
                    .map_err(|_| S::Error::custom(format!("invalid date format `{format}`")))?;
                serializer.serialize_str(&out)
            }
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        match active_policy().dates {
            DateStrategy::Iso8601 => {
                let text = String::deserialize(deserializer)?;
                DateTime::parse_from_rfc3339(&text)
                    .map(|date| date.with_timezone(&Utc))
                    .map_err(D::Error::custom)
            }
            DateStrategy::SecondsSince1970 => {
                let seconds = f64::deserialize(deserializer)?;
                from_millis((seconds * 1000.0).round() as i64)
            }
            DateStrategy::MillisecondsSince1970 => {
                let millis = f64::deserialize(deserializer)?;
                from_millis(millis.round() as i64)
            }
            DateStrategy::Formatted(format) => {
                let text = String::deserialize(deserializer)?;
                NaiveDateTime::parse_from_str(&text, &format)
                    .map(|naive| Utc.from_utc_datetime(&naive))
                    .map_err(D::Error::custom)
            }
        }
    }

    fn from_millis<E: serde::de::Error>(millis: i64) -> Result<DateTime<Utc>, E> {
        Utc.timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| E::custom(format!("timestamp {millis}ms is out of range")))
    }
}

/// `#[serde(with)]` helper for `Vec<u8>` fields following the active
/// [`BytesStrategy`].
pub mod bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{active_policy, BytesStrategy};

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        match active_policy().bytes {
            BytesStrategy::Base64 => serializer.serialize_str(&STANDARD.encode(value)),
            BytesStrategy::Array => serializer.collect_seq(value),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match active_policy().bytes {
            BytesStrategy::Base64 => {
                let text = String::deserialize(deserializer)?;
                STANDARD.decode(text).map_err(D::Error::custom)
            }
            BytesStrategy::Array => Vec::<u8>::deserialize(deserializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Profile {
        user_name: String,
        home_address: Address,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Address {
        street_line: String,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Stamped {
        #[serde(with = "date")]
        at: DateTime<Utc>,
        #[serde(with = "bytes")]
        blob: Vec<u8>,
    }

    fn policy(keys: KeyStrategy, dates: DateStrategy, bytes: BytesStrategy) -> CodecPolicy {
        CodecPolicy { keys, dates, bytes }
    }

    fn stamped() -> Stamped {
        Stamped {
            at: Utc.with_ymd_and_hms(2020, 5, 20, 12, 30, 0).unwrap(),
            blob: vec![1, 2, 3],
        }
    }

    #[test]
    fn camel_case_keys_decode_into_snake_case_fields() {
        let decoder = JsonDecoder::new(policy(
            KeyStrategy::CamelCase,
            DateStrategy::default(),
            BytesStrategy::default(),
        ));
        let body = br#"{"userName":"ada","homeAddress":{"streetLine":"1 Loop"}}"#;
        let profile: Profile = decoder.decode(body).unwrap();
        assert_eq!(profile.user_name, "ada");
        assert_eq!(profile.home_address.street_line, "1 Loop");
    }

    #[test]
    fn camel_case_keys_encode_from_snake_case_fields() {
        let encoder = JsonEncoder::new(policy(
            KeyStrategy::CamelCase,
            DateStrategy::default(),
            BytesStrategy::default(),
        ));
        let profile = Profile {
            user_name: "ada".into(),
            home_address: Address {
                street_line: "1 Loop".into(),
            },
        };
        let value: Value = serde_json::from_slice(&encoder.encode(&profile).unwrap()).unwrap();
        assert_eq!(value, json!({"userName": "ada", "homeAddress": {"streetLine": "1 Loop"}}));
    }

    #[test]
    fn default_keys_are_left_alone() {
        let decoder = JsonDecoder::default();
        let result: Result<Profile, _> = decoder.decode(br#"{"userName":"ada","homeAddress":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn key_conversions() {
        assert_eq!(to_snake_case("userId"), "user_id");
        assert_eq!(to_snake_case("URL"), "u_r_l");
        assert_eq!(to_snake_case("plain"), "plain");
        assert_eq!(to_camel_case("user_id"), "userId");
        assert_eq!(to_camel_case("_private"), "_private");
    }

    #[test]
    fn iso8601_and_base64_are_the_defaults() {
        let encoded = JsonEncoder::default().encode(&stamped()).unwrap();
        let value: Value = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(value, json!({"at": "2020-05-20T12:30:00+00:00", "blob": "AQID"}));
        let back: Stamped = JsonDecoder::default().decode(&encoded).unwrap();
        assert_eq!(back, stamped());
    }

    #[test]
    fn epoch_dates_and_array_bytes() {
        let seconds = policy(
            KeyStrategy::UseDefaultKeys,
            DateStrategy::SecondsSince1970,
            BytesStrategy::Array,
        );
        let encoded = JsonEncoder::new(seconds.clone()).encode(&stamped()).unwrap();
        let value: Value = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(value, json!({"at": 1589977800, "blob": [1, 2, 3]}));

        let millis = policy(
            KeyStrategy::UseDefaultKeys,
            DateStrategy::MillisecondsSince1970,
            BytesStrategy::Array,
        );
        let decoded: Stamped = JsonDecoder::new(millis)
            .decode(br#"{"at": 1589977800000, "blob": [1, 2, 3]}"#)
            .unwrap();
        assert_eq!(decoded, stamped());
    }

    #[test]
    fn formatted_dates() {
        let formatted = policy(
            KeyStrategy::UseDefaultKeys,
            DateStrategy::Formatted("%Y-%m-%d %H:%M:%S".into()),
            BytesStrategy::Base64,
        );
        let decoded: Stamped = JsonDecoder::new(formatted)
            .decode(br#"{"at": "2020-05-20 12:30:00", "blob": "AQID"}"#)
            .unwrap();
        assert_eq!(decoded, stamped());
    }

    #[test]
    fn overrides_only_touch_set_fields() {
        let mut resolved = CodecPolicy::default();
        resolved.apply(&CodecOverrides {
            dates: Some(DateStrategy::SecondsSince1970),
            ..CodecOverrides::default()
        });
        assert_eq!(resolved.keys, KeyStrategy::UseDefaultKeys);
        assert_eq!(resolved.dates, DateStrategy::SecondsSince1970);
        assert_eq!(resolved.bytes, BytesStrategy::Base64);
    }
}
