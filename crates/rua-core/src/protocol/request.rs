//! Request and response shapes.
//!
//! # Wire format
//!
//! A single request:
//!
//! ```json
//! {"action": "exceptions.add", "data": {"pattern": "*://intranet/*"}}
//! ```
//!
//! A batch is a JSON array of requests.  The answer is an array of the same
//! length whose N-th slot answers the N-th request:
//!
//! ```json
//! [{"action": "settings.getEnabled"}, {"action": "useragent.get"}]
//! → [true, "Mozilla/5.0 ..."]
//! ```
//!
//! A slot whose request could not be resolved holds no value (`None` in Rust,
//! `null` on the wire).
//!
//! # Why keep batch elements as raw JSON?
//!
//! One malformed element must not poison its siblings.  [`Inbound::Batch`]
//! therefore carries raw [`Value`]s and each element is parsed on its own by
//! [`parse_request`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The reserved action used to receive a configuration exported elsewhere.
pub const SETTINGS_ACTION: &str = "settings";

/// The answer to one request.  `None` means "no value" (unknown action,
/// malformed request, or a handler that returned nothing).
pub type Response = Option<Value>;

/// One parsed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// `"settings"` or a dotted `"namespace.method"` name.
    pub action: String,
    /// Handler arguments.  Absent or non-object data is treated as empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

/// How a request should be routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// The reserved one-shot settings import channel.
    SettingsImport,
    /// A registered handler addressed as `namespace.method`.
    Method { namespace: &'a str, method: &'a str },
    /// The action has no `.` separator or an empty side.
    Invalid,
}

impl Request {
    /// Creates a request without data.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            data: None,
        }
    }

    /// Creates a request carrying `data`.  Non-object data is dropped.
    pub fn with_data(action: impl Into<String>, data: Value) -> Self {
        Self {
            action: action.into(),
            data: match data {
                Value::Object(map) => Some(map),
                _ => None,
            },
        }
    }

    /// Splits the action into its routing target.
    pub fn route(&self) -> Route<'_> {
        if self.action == SETTINGS_ACTION {
            return Route::SettingsImport;
        }
        match self.action.split_once('.') {
            Some((namespace, method)) if !namespace.is_empty() && !method.is_empty() => {
                Route::Method { namespace, method }
            }
            _ => Route::Invalid,
        }
    }

    /// Returns the handler arguments, defaulting to an empty mapping.
    pub fn params(&self) -> Map<String, Value> {
        self.data.clone().unwrap_or_default()
    }

    /// Converts the request to its wire representation.
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("action".to_string(), Value::String(self.action.clone()));
        if let Some(data) = &self.data {
            obj.insert("data".to_string(), Value::Object(data.clone()));
        }
        Value::Object(obj)
    }
}

/// Parses one raw request.
///
/// Returns `None` for malformed input: anything that is not an object with a
/// string `action` field.  A `data` field that is not an object is ignored.
pub fn parse_request(value: &Value) -> Option<Request> {
    let obj = value.as_object()?;
    let action = obj.get("action")?.as_str()?;
    let data = obj.get("data").and_then(Value::as_object).cloned();
    Some(Request {
        action: action.to_string(),
        data,
    })
}

/// An inbound message: one request or an ordered batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Single(Value),
    Batch(Vec<Value>),
}

impl Inbound {
    /// Classifies a raw message.  JSON arrays are batches.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => Inbound::Batch(items),
            other => Inbound::Single(other),
        }
    }

    /// Builds a batch from typed requests.
    pub fn batch(requests: &[Request]) -> Self {
        Inbound::Batch(requests.iter().map(Request::to_value).collect())
    }

    /// Number of requests carried.
    pub fn len(&self) -> usize {
        match self {
            Inbound::Single(_) => 1,
            Inbound::Batch(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Request> for Inbound {
    fn from(request: Request) -> Self {
        Inbound::Single(request.to_value())
    }
}

/// The answer to an [`Inbound`] message, shaped like the input.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Single(Response),
    Batch(Vec<Response>),
}

impl Outbound {
    /// Converts to the wire representation (`None` becomes `null`).
    pub fn into_value(self) -> Value {
        match self {
            Outbound::Single(response) => response.unwrap_or(Value::Null),
            Outbound::Batch(responses) => Value::Array(
                responses
                    .into_iter()
                    .map(|r| r.unwrap_or(Value::Null))
                    .collect(),
            ),
        }
    }

    /// Returns the batch slots, or the single response as a one-element vector.
    pub fn into_responses(self) -> Vec<Response> {
        match self {
            Outbound::Single(response) => vec![response],
            Outbound::Batch(responses) => responses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_route_splits_namespace_and_method() {
        let req = Request::new("exceptions.uriMatch");
        assert_eq!(
            req.route(),
            Route::Method {
                namespace: "exceptions",
                method: "uriMatch"
            }
        );
    }

    #[test]
    fn test_route_recognises_settings_channel() {
        assert_eq!(Request::new("settings").route(), Route::SettingsImport);
    }

    #[test]
    fn test_route_rejects_actions_without_both_parts() {
        assert_eq!(Request::new("useragent").route(), Route::Invalid);
        assert_eq!(Request::new(".get").route(), Route::Invalid);
        assert_eq!(Request::new("useragent.").route(), Route::Invalid);
    }

    #[test]
    fn test_parse_request_requires_string_action() {
        assert!(parse_request(&json!({ "action": 3 })).is_none());
        assert!(parse_request(&json!({ "data": {} })).is_none());
        assert!(parse_request(&json!("settings.getEnabled")).is_none());
        assert!(parse_request(&json!(null)).is_none());
    }

    #[test]
    fn test_parse_request_drops_non_object_data() {
        // Arrange / Act
        let req = parse_request(&json!({ "action": "a.b", "data": [1, 2] })).unwrap();

        // Assert
        assert_eq!(req.data, None);
        assert!(req.params().is_empty());
    }

    #[test]
    fn test_parse_request_keeps_object_data() {
        let req = parse_request(&json!({ "action": "a.b", "data": { "uri": "x" } })).unwrap();
        assert_eq!(req.params().get("uri"), Some(&json!("x")));
    }

    #[test]
    fn test_inbound_from_array_is_batch() {
        let inbound = Inbound::from_value(json!([{ "action": "a.b" }, 7]));
        assert_eq!(inbound.len(), 2);
        assert!(matches!(inbound, Inbound::Batch(_)));
    }

    #[test]
    fn test_outbound_batch_serializes_missing_slots_as_null() {
        let out = Outbound::Batch(vec![Some(json!(1)), None, Some(json!(3))]);
        assert_eq!(out.into_value(), json!([1, null, 3]));
    }

    #[test]
    fn test_request_to_value_parses_back() {
        let req = Request::with_data("exceptions.add", json!({ "pattern": "*" }));
        assert_eq!(parse_request(&req.to_value()), Some(req));
    }
}
