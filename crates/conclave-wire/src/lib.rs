//! Response envelope shared by every HTTP surface the gateway exposes.
//!
//! Every response body is either `{success: true, data, meta}` or
//! `{success: false, error: {code, message, details}, meta}` — never a bare
//! payload. `Envelope` is the serialization boundary; call sites build one
//! with `ok()`/`err()` rather than constructing the JSON by hand.

use chrono::{DateTime, Utc};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

mod events;

pub use events::{StreamEvent, StreamEventKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeMeta {
    pub trace_id: String,
    pub request_id: String,
    /// Request duration in milliseconds, filled in once the handler returns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    pub timestamp: DateTime<Utc>,
}

impl EnvelopeMeta {
    pub fn new(trace_id: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            request_id: request_id.into(),
            duration_ms: None,
            pagination: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_duration(mut self, duration_ms: i64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Clone)]
pub enum Envelope<T> {
    Ok { data: T, meta: EnvelopeMeta },
    Err { error: ErrorBody, meta: EnvelopeMeta },
}

impl<T> Envelope<T> {
    pub fn ok(data: T, trace_id: impl Into<String>, request_id: impl Into<String>) -> Self {
        Envelope::Ok {
            data,
            meta: EnvelopeMeta::new(trace_id, request_id),
        }
    }

    pub fn err(
        code: impl Into<String>,
        message: impl Into<String>,
        trace_id: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Envelope::Err {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
                details: None,
            },
            meta: EnvelopeMeta::new(trace_id, request_id),
        }
    }

    pub fn err_with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
        trace_id: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Envelope::Err {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
            meta: EnvelopeMeta::new(trace_id, request_id),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Envelope::Ok { .. })
    }

    pub fn meta_mut(&mut self) -> &mut EnvelopeMeta {
        match self {
            Envelope::Ok { meta, .. } => meta,
            Envelope::Err { meta, .. } => meta,
        }
    }
}

impl<T: Serialize> Serialize for Envelope<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Envelope::Ok { data, meta } => {
                let mut s = serializer.serialize_struct("Envelope", 3)?;
                s.serialize_field("success", &true)?;
                s.serialize_field("data", data)?;
                s.serialize_field("meta", meta)?;
                s.end()
            }
            Envelope::Err { error, meta } => {
                let mut s = serializer.serialize_struct("Envelope", 3)?;
                s.serialize_field("success", &false)?;
                s.serialize_field("error", error)?;
                s.serialize_field("meta", meta)?;
                s.end()
            }
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Envelope<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EnvelopeVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for EnvelopeVisitor<T> {
            type Value = Envelope<T>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an envelope object with a `success` field")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut success: Option<bool> = None;
                let mut data: Option<Value> = None;
                let mut error: Option<ErrorBody> = None;
                let mut meta: Option<EnvelopeMeta> = None;

                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "success" => success = Some(map.next_value()?),
                        "data" => data = Some(map.next_value()?),
                        "error" => error = Some(map.next_value()?),
                        "meta" => meta = Some(map.next_value()?),
                        _ => {
                            let _: de::IgnoredAny = map.next_value()?;
                        }
                    }
                }

                let success = success.ok_or_else(|| de::Error::missing_field("success"))?;
                let meta = meta.ok_or_else(|| de::Error::missing_field("meta"))?;

                if success {
                    let data = data.ok_or_else(|| de::Error::missing_field("data"))?;
                    let data: T = serde_json::from_value(data).map_err(de::Error::custom)?;
                    Ok(Envelope::Ok { data, meta })
                } else {
                    let error = error.ok_or_else(|| de::Error::missing_field("error"))?;
                    Ok(Envelope::Err { error, meta })
                }
            }
        }

        deserializer.deserialize_map(EnvelopeVisitor(PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_envelope_serializes_to_success_true() {
        let envelope = Envelope::ok(serde_json::json!({"count": 3}), "trace-1", "req-1");
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["data"]["count"], 3);
        assert_eq!(value["meta"]["trace_id"], "trace-1");
        assert_eq!(value["meta"]["request_id"], "req-1");
    }

    #[test]
    fn err_envelope_carries_code_and_message() {
        let envelope: Envelope<()> = Envelope::err("not_found", "task missing", "trace-2", "req-2");
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "not_found");
        assert_eq!(value["error"]["message"], "task missing");
    }

    #[test]
    fn ok_envelope_round_trips() {
        let envelope = Envelope::ok(42u32, "trace-3", "req-3");
        let value = serde_json::to_value(&envelope).unwrap();
        let parsed: Envelope<u32> = serde_json::from_value(value).unwrap();
        match parsed {
            Envelope::Ok { data, .. } => assert_eq!(data, 42),
            Envelope::Err { .. } => panic!("expected Ok variant"),
        }
    }

    #[test]
    fn meta_mut_allows_setting_duration_after_construction() {
        let mut envelope = Envelope::ok((), "trace-4", "req-4");
        envelope.meta_mut().duration_ms = Some(12);
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["meta"]["duration_ms"], 12);
    }
}
