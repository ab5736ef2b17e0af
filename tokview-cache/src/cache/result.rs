//! Results returned to callers of the cache service
//!
//! Every `get_*` call ends in a [`ResourceResult`]: either the resource
//! payload (flagged fresh or stale) or a [`FailureEnvelope`] with `code: -1`.

use crate::cache::entry::{CACHED_AT_FIELD, IS_STALE_FIELD};
use crate::cache::types::Payload;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Code carried by every failure envelope
pub const FAILURE_CODE: i64 = -1;

/// Message returned when upstream fails and no shadow entry exists
pub const NO_STALE_DATA_MSG: &str =
    "Failed to fetch data and no stale data available. Please try again later.";

/// Where a served payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    /// Primary key hit
    Cache,

    /// Fetched from upstream and written to the store
    Upstream,

    /// Fetched from upstream while the store was failing; not written
    Direct,

    /// Shadow key served after an upstream failure
    Stale,
}

/// Structured failure returned instead of an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEnvelope {
    pub code: i64,
    pub msg: String,
}

impl FailureEnvelope {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            code: FAILURE_CODE,
            msg: msg.into(),
        }
    }

    /// Upstream failed and there was nothing to fall back on
    pub fn no_stale_data() -> Self {
        Self::new(NO_STALE_DATA_MSG)
    }
}

/// A payload served to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResource {
    /// Resource fields, including `cached_at` and `is_stale`
    pub payload: Payload,
    pub source: ResultSource,
}

impl CachedResource {
    pub fn is_stale(&self) -> bool {
        self.payload
            .get(IS_STALE_FIELD)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn cached_at(&self) -> Option<&str> {
        self.payload.get(CACHED_AT_FIELD).and_then(Value::as_str)
    }
}

/// Outcome of a cache service lookup
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceResult {
    Resource(CachedResource),
    Failure(FailureEnvelope),
}

impl ResourceResult {
    pub(crate) fn served(mut payload: Payload, source: ResultSource) -> Self {
        let is_stale = source == ResultSource::Stale;
        payload.insert(IS_STALE_FIELD.to_string(), Value::Bool(is_stale));
        ResourceResult::Resource(CachedResource { payload, source })
    }

    pub(crate) fn failure(msg: impl Into<String>) -> Self {
        ResourceResult::Failure(FailureEnvelope::new(msg))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ResourceResult::Failure(_))
    }

    /// Whether the payload came from a shadow key
    pub fn is_stale(&self) -> bool {
        match self {
            ResourceResult::Resource(resource) => resource.is_stale(),
            ResourceResult::Failure(_) => false,
        }
    }

    pub fn source(&self) -> Option<ResultSource> {
        match self {
            ResourceResult::Resource(resource) => Some(resource.source),
            ResourceResult::Failure(_) => None,
        }
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            ResourceResult::Resource(resource) => Some(&resource.payload),
            ResourceResult::Failure(_) => None,
        }
    }

    /// The flat mapping the presentation layer renders
    pub fn to_value(&self) -> Value {
        match self {
            ResourceResult::Resource(resource) => Value::Object(resource.payload.clone()),
            ResourceResult::Failure(failure) => serde_json::json!({
                "code": failure.code,
                "msg": failure.msg,
            }),
        }
    }
}

impl From<ResourceResult> for Value {
    fn from(result: ResourceResult) -> Self {
        match result {
            ResourceResult::Resource(resource) => Value::Object(resource.payload),
            failure => failure.to_value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_served_sets_stale_flag_from_source() {
        let fresh = ResourceResult::served(payload(json!({"is_stale": true})), ResultSource::Cache);
        assert!(!fresh.is_stale());

        let stale = ResourceResult::served(payload(json!({"is_stale": false})), ResultSource::Stale);
        assert!(stale.is_stale());
        assert_eq!(stale.source(), Some(ResultSource::Stale));
    }

    #[test]
    fn test_failure_envelope_value() {
        let result = ResourceResult::Failure(FailureEnvelope::no_stale_data());
        assert!(result.is_failure());
        assert!(result.payload().is_none());
        assert_eq!(
            result.to_value(),
            json!({"code": -1, "msg": NO_STALE_DATA_MSG})
        );
    }

    #[test]
    fn test_resource_value_is_flat_payload() {
        let result = ResourceResult::served(
            payload(json!({"code": 0, "nickname": "Alice", "cached_at": "2024-01-01T00:00:00+00:00"})),
            ResultSource::Upstream,
        );
        let value: Value = result.into();
        assert_eq!(value["nickname"], "Alice");
        assert_eq!(value["is_stale"], false);
        assert_eq!(value["code"], 0);
    }
}
