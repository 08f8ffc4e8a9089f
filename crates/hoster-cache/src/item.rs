//! Cached response items
//!
//! Every response is stored as a small JSON envelope around the payload:
//!
//! ```json
//! {
//!   "data": { ... },
//!   "links": { "next": "..." },
//!   "lastFetched": "Wed, 10 03 2021 12:00:00 GMT",
//!   "entityTag": "\"abc\"",
//!   "fromWebhook": false
//! }
//! ```
//!
//! `entityTag` and `links` are kept as written so items stored by other
//! clients of the same backend survive a round trip. Once a webhook reports a
//! change, `fromWebhook` is set and readers treat the payload as stale.

use crate::error::{CacheError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Timestamp layout of `lastFetched`
pub const LAST_FETCHED_FORMAT: &str = "%a, %d %m %Y %H:%M:%S GMT";

/// A validated cache entry value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheItem {
    /// Response payload
    pub data: Value,

    /// Pagination links (rel -> url)
    pub links: Map<String, Value>,

    /// When the payload was fetched from the hoster
    #[serde(with = "last_fetched_format")]
    pub last_fetched: DateTime<Utc>,

    /// ETag header of the response, if the hoster sent one
    pub entity_tag: Option<String>,

    /// Whether the entry was last touched by a webhook rather than a fetch
    pub from_webhook: bool,
}

impl Default for CacheItem {
    fn default() -> Self {
        Self::new(Value::Object(Map::new()))
    }
}

impl CacheItem {
    /// Wrap a freshly fetched payload
    pub fn new(data: Value) -> Self {
        Self {
            data,
            links: Map::new(),
            last_fetched: now_truncated(),
            entity_tag: None,
            from_webhook: false,
        }
    }

    pub fn with_entity_tag(mut self, entity_tag: impl Into<String>) -> Self {
        self.entity_tag = Some(entity_tag.into());
        self
    }

    pub fn with_links(mut self, links: Map<String, Value>) -> Self {
        self.links = links;
        self
    }

    pub fn with_last_fetched(mut self, last_fetched: DateTime<Utc>) -> Self {
        self.last_fetched = last_fetched;
        self
    }

    /// Check a raw JSON value and turn it into an item.
    ///
    /// Missing fields get their defaults and unknown fields are dropped.
    /// Fields of the wrong type yield [`CacheError::InvalidType`], a
    /// `lastFetched` string that does not parse yields
    /// [`CacheError::InvalidValue`].
    pub fn validate(raw: Value) -> Result<Self> {
        let mut fields = match raw {
            Value::Object(fields) => fields,
            other => {
                return Err(CacheError::InvalidType {
                    field: "item",
                    expected: "an object",
                    found: json_type(&other).to_string(),
                })
            }
        };

        let data = fields
            .remove("data")
            .unwrap_or_else(|| Value::Object(Map::new()));

        let links = match fields.remove("links") {
            None => Map::new(),
            Some(Value::Object(links)) => links,
            Some(other) => {
                return Err(CacheError::InvalidType {
                    field: "links",
                    expected: "an object",
                    found: json_type(&other).to_string(),
                })
            }
        };

        let last_fetched = match fields.remove("lastFetched") {
            None => now_truncated(),
            Some(Value::String(s)) => parse_last_fetched(&s)?,
            Some(other) => {
                return Err(CacheError::InvalidType {
                    field: "lastFetched",
                    expected: "a string",
                    found: json_type(&other).to_string(),
                })
            }
        };

        let entity_tag = match fields.remove("entityTag") {
            None | Some(Value::Null) => None,
            Some(Value::String(tag)) => Some(tag),
            Some(other) => {
                return Err(CacheError::InvalidType {
                    field: "entityTag",
                    expected: "a string or null",
                    found: json_type(&other).to_string(),
                })
            }
        };

        let from_webhook = match fields.remove("fromWebhook") {
            None => false,
            Some(Value::Bool(flag)) => flag,
            Some(other) => {
                return Err(CacheError::InvalidType {
                    field: "fromWebhook",
                    expected: "a bool",
                    found: json_type(&other).to_string(),
                })
            }
        };

        Ok(Self {
            data,
            links,
            last_fetched,
            entity_tag,
            from_webhook,
        })
    }

    /// Decode and validate a stored JSON string
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        Self::validate(value)
    }

    /// Encode for storage in a backend
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Partial item used by [`crate::ResponseCache::update`]
///
/// Every field that is `Some` replaces the stored one; the rest is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheItemPatch {
    pub data: Option<Value>,
    pub links: Option<Map<String, Value>>,
    pub last_fetched: Option<DateTime<Utc>>,
    pub entity_tag: Option<Option<String>>,
    pub from_webhook: Option<bool>,
}

impl CacheItemPatch {
    /// Patch recording that a webhook for this resource arrived at `received_at`
    pub fn webhook_received(received_at: DateTime<Utc>) -> Self {
        Self {
            last_fetched: Some(received_at),
            from_webhook: Some(true),
            ..Self::default()
        }
    }

    /// Overlay this patch on top of `base`
    pub fn apply(self, base: CacheItem) -> CacheItem {
        CacheItem {
            data: self.data.unwrap_or(base.data),
            links: self.links.unwrap_or(base.links),
            last_fetched: self.last_fetched.unwrap_or(base.last_fetched),
            entity_tag: self.entity_tag.unwrap_or(base.entity_tag),
            from_webhook: self.from_webhook.unwrap_or(base.from_webhook),
        }
    }
}

/// `LAST_FETCHED_FORMAT` without the weekday
const LAST_FETCHED_DATE_FORMAT: &str = "%d %m %Y %H:%M:%S GMT";

/// Parse a `lastFetched` value
///
/// The weekday is not checked against the date, other writers of the same
/// store are not always consistent about it.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let date = raw.split_once(", ").map_or(raw, |(_, date)| date);
    NaiveDateTime::parse_from_str(date, LAST_FETCHED_DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

fn parse_last_fetched(raw: &str) -> Result<DateTime<Utc>> {
    parse_timestamp(raw).ok_or_else(|| CacheError::InvalidValue {
        field: "lastFetched",
        value: raw.to_string(),
    })
}

// The stored format has second precision, so keep in-memory items comparable
// with their decoded form.
fn now_truncated() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

mod last_fetched_format {
    use super::{parse_timestamp, LAST_FETCHED_FORMAT};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&value.format(LAST_FETCHED_FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid lastFetched '{}'", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_validate_fills_defaults() {
        let item = CacheItem::validate(json!({})).unwrap();
        assert_eq!(item.data, json!({}));
        assert!(item.links.is_empty());
        assert_eq!(item.entity_tag, None);
        assert!(!item.from_webhook);
    }

    #[test]
    fn test_validate_drops_unknown_fields() {
        let item = CacheItem::validate(json!({"data": [1, 2], "extra": "nope"})).unwrap();
        let encoded: Value = serde_json::from_str(&item.to_json().unwrap()).unwrap();
        assert!(encoded.get("extra").is_none());
        assert_eq!(encoded["data"], json!([1, 2]));
    }

    #[test]
    fn test_validate_rejects_entity_tag_type() {
        let err = CacheItem::validate(json!({"entityTag": 10})).unwrap_err();
        assert!(matches!(
            err,
            CacheError::InvalidType {
                field: "entityTag",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_rejects_links_type() {
        let err = CacheItem::validate(json!({"links": 10})).unwrap_err();
        assert!(matches!(err, CacheError::InvalidType { field: "links", .. }));
    }

    #[test]
    fn test_validate_last_fetched() {
        let err = CacheItem::validate(json!({"lastFetched": "Tue, 10 March 2021"})).unwrap_err();
        assert!(matches!(
            err,
            CacheError::InvalidValue {
                field: "lastFetched",
                ..
            }
        ));

        let err = CacheItem::validate(json!({"lastFetched": null})).unwrap_err();
        assert!(matches!(
            err,
            CacheError::InvalidType {
                field: "lastFetched",
                ..
            }
        ));

        let item = CacheItem::validate(json!({"lastFetched": "Wed, 10 03 2021 12:30:00 GMT"}))
            .unwrap();
        assert_eq!(
            item.last_fetched,
            Utc.with_ymd_and_hms(2021, 3, 10, 12, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_validate_ignores_weekday_mismatch() {
        // 10 March 2021 was a Wednesday
        let item = CacheItem::validate(json!({"lastFetched": "Mon, 10 03 2021 12:30:00 GMT"}))
            .unwrap();
        assert_eq!(
            item.last_fetched,
            Utc.with_ymd_and_hms(2021, 3, 10, 12, 30, 0).unwrap()
        );

        let stored = r#"{"data":1,"lastFetched":"Fri, 10 03 2021 12:30:00 GMT"}"#;
        assert_eq!(CacheItem::from_json(stored).unwrap().data, json!(1));
    }

    #[test]
    fn test_validate_rejects_from_webhook_type() {
        let err = CacheItem::validate(json!({"fromWebhook": null})).unwrap_err();
        assert!(matches!(
            err,
            CacheError::InvalidType {
                field: "fromWebhook",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_rejects_non_object() {
        assert!(CacheItem::validate(json!("just a string")).is_err());
    }

    #[test]
    fn test_json_encoding_keeps_item() {
        let item = CacheItem::new(json!({"id": 7}))
            .with_entity_tag("W/\"abc\"")
            .with_last_fetched(Utc.with_ymd_and_hms(2021, 3, 10, 12, 30, 0).unwrap());

        let encoded = item.to_json().unwrap();
        assert!(encoded.contains("\"lastFetched\":\"Wed, 10 03 2021 12:30:00 GMT\""));
        assert_eq!(CacheItem::from_json(&encoded).unwrap(), item);
    }

    #[test]
    fn test_webhook_patch_keeps_data() {
        let base = CacheItem::new(json!({"title": "bug"})).with_entity_tag("etag");
        let received = Utc.with_ymd_and_hms(2022, 1, 2, 3, 4, 5).unwrap();

        let patched = CacheItemPatch::webhook_received(received).apply(base);

        assert_eq!(patched.data, json!({"title": "bug"}));
        assert_eq!(patched.entity_tag.as_deref(), Some("etag"));
        assert_eq!(patched.last_fetched, received);
        assert!(patched.from_webhook);
        assert_eq!(
            patched.to_json().unwrap(),
            r#"{"data":{"title":"bug"},"links":{},"lastFetched":"Sun, 02 01 2022 03:04:05 GMT","entityTag":"etag","fromWebhook":true}"#
        );
    }
}
