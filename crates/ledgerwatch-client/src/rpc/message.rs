//! Typed request and inbound message shapes
//!
//! Outgoing requests are built with [`Request`] and validated before they
//! reach the wire. Inbound frames are decoded once into [`Inbound`], which
//! separates responses (correlated by id) from server-pushed events.

use std::fmt;

use ledgerwatch_config::CommandField;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ClientError;

/// `type` value that marks an inbound message as a response
pub const RESPONSE_TYPE: &str = "response";

/// Prefix of identifiers generated by the correlator
///
/// Keeps generated ids apart from the plain strings or numbers that callers
/// usually pick for their own requests.
pub const AUTO_ID_PREFIX: &str = "__auto_";

const RESERVED_KEYS: [&str; 3] = ["id", "command", "method"];

/// Identifier that ties a response to the request it answers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    Text(String),
}

impl RequestId {
    /// Identifier generated for the `n`th request without a caller id
    pub fn auto(n: u64) -> Self {
        Self::Text(format!("{AUTO_ID_PREFIX}{n}"))
    }

    fn from_value(value: Value) -> Result<Self, ClientError> {
        match value {
            Value::String(text) => Ok(Self::Text(text)),
            Value::Number(ref number) => number
                .as_u64()
                .map(Self::Number)
                .ok_or_else(|| ClientError::invalid(format!("unsupported id {}", value))),
            other => Err(ClientError::invalid(format!("unsupported id {}", other))),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Number(n) => Value::from(*n),
            Self::Text(text) => Value::from(text.as_str()),
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<u64> for RequestId {
    fn from(value: u64) -> Self {
        Self::Number(value)
    }
}

/// An outgoing API call
///
/// # Example
///
/// ```ignore
/// let request = Request::new("account_info")
///     .param("account", "rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe")
///     .param("ledger_index", "validated");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    command: String,
    id: Option<RequestId>,
    params: Map<String, Value>,
}

impl Request {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            id: None,
            params: Map::new(),
        }
    }

    /// Use a caller-chosen identifier instead of a generated one
    pub fn with_id(mut self, id: impl Into<RequestId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add or replace a named parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Decode a request from a JSON object
    ///
    /// The command may be given as either `command` or `method`. An `id`
    /// field, if present, must be a string or an unsigned integer. Every
    /// other field becomes a parameter.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidRequest` if the value is not an object,
    /// has no command, or fails [`Request::validate`].
    pub fn from_value(value: Value) -> Result<Self, ClientError> {
        let Value::Object(mut fields) = value else {
            return Err(ClientError::invalid("request must be a JSON object"));
        };

        let command = match (fields.remove("command"), fields.remove("method")) {
            (Some(command), Some(method)) if command != method => {
                return Err(ClientError::invalid(
                    "request has both `command` and `method` with different values",
                ));
            }
            (Some(command), _) | (None, Some(command)) => command,
            (None, None) => return Err(ClientError::invalid("request is missing `command`")),
        };
        let Value::String(command) = command else {
            return Err(ClientError::invalid("`command` must be a string"));
        };

        let id = fields.remove("id").map(RequestId::from_value).transpose()?;

        let request = Self {
            command,
            id,
            params: fields,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn id(&self) -> Option<&RequestId> {
        self.id.as_ref()
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    pub(crate) fn set_id(&mut self, id: RequestId) {
        self.id = Some(id);
    }

    /// Check the request's shape before it is sent
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidRequest` if the command is empty or
    /// contains whitespace, if a parameter uses a reserved key, or if the
    /// id falls in the generated `__auto_` namespace.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.command.is_empty() {
            return Err(ClientError::invalid("command must not be empty"));
        }
        if self.command.chars().any(char::is_whitespace) {
            return Err(ClientError::invalid(format!(
                "command '{}' must not contain whitespace",
                self.command
            )));
        }
        if let Some(RequestId::Text(id)) = &self.id {
            if id.starts_with(AUTO_ID_PREFIX) {
                return Err(ClientError::invalid(format!(
                    "request id '{}' uses the reserved prefix '{}'",
                    id, AUTO_ID_PREFIX
                )));
            }
        }
        if let Some(key) = RESERVED_KEYS.iter().find(|k| self.params.contains_key(**k)) {
            return Err(ClientError::invalid(format!(
                "parameter '{}' is reserved",
                key
            )));
        }
        Ok(())
    }

    /// Wire form of the request with the command under `field`
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidRequest` if no id has been assigned yet.
    pub fn to_wire(&self, field: CommandField) -> Result<Value, ClientError> {
        let id = self
            .id
            .as_ref()
            .ok_or_else(|| ClientError::invalid("request has no id"))?;

        let mut wire = self.params.clone();
        wire.insert(field.as_str().to_string(), Value::from(self.command.as_str()));
        wire.insert("id".to_string(), id.to_value());
        Ok(Value::Object(wire))
    }
}

/// Outcome reported by a response's `status` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseStatus {
    Success,
    /// Anything other than `"success"`, with the raw status text
    Failure(String),
}

/// A decoded message tagged `type: "response"`
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMessage {
    id: Option<RequestId>,
    status: ResponseStatus,
    message: Map<String, Value>,
}

impl ResponseMessage {
    pub fn id(&self) -> Option<&RequestId> {
        self.id.as_ref()
    }

    pub fn status(&self) -> &ResponseStatus {
        &self.status
    }

    /// The full message as received
    pub fn into_raw(self) -> Value {
        Value::Object(self.message)
    }

    /// The message with the `status` field removed
    pub fn into_payload(mut self) -> Value {
        self.message.remove("status");
        Value::Object(self.message)
    }
}

/// A server-pushed message such as `ledgerClosed` or `transaction`
#[derive(Debug, Clone, PartialEq)]
pub struct EventMessage {
    kind: String,
    payload: Value,
}

impl EventMessage {
    /// The event's `type` field
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }
}

/// Any message read from the socket
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Response(ResponseMessage),
    Event(EventMessage),
    /// Not an object, or an object without a string `type`
    Untyped(Value),
}

impl Inbound {
    pub fn from_value(value: Value) -> Self {
        let message = match value {
            Value::Object(message) => message,
            other => return Self::Untyped(other),
        };

        let kind = match message.get("type").and_then(Value::as_str) {
            Some(kind) => kind.to_string(),
            None => return Self::Untyped(Value::Object(message)),
        };

        if kind != RESPONSE_TYPE {
            return Self::Event(EventMessage {
                kind,
                payload: Value::Object(message),
            });
        }

        let status = match message.get("status").and_then(Value::as_str) {
            Some("success") => ResponseStatus::Success,
            Some(other) => ResponseStatus::Failure(other.to_string()),
            None => ResponseStatus::Failure("<missing>".to_string()),
        };
        let id = message
            .get("id")
            .cloned()
            .and_then(|id| RequestId::from_value(id).ok());

        Self::Response(ResponseMessage {
            id,
            status,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_auto_id_format() {
        assert_eq!(RequestId::auto(0), RequestId::Text("__auto_0".to_string()));
        assert_eq!(RequestId::auto(12).to_string(), "__auto_12");
    }

    #[test]
    fn test_request_id_serializes_untagged() {
        assert_eq!(serde_json::to_value(RequestId::from(7)).unwrap(), json!(7));
        assert_eq!(serde_json::to_value(RequestId::from("abc")).unwrap(), json!("abc"));
    }

    #[test]
    fn test_from_value_with_command() {
        let request = Request::from_value(json!({
            "command": "account_info",
            "account": "rX",
            "ledger_index": "validated"
        }))
        .unwrap();

        assert_eq!(request.command(), "account_info");
        assert_eq!(request.id(), None);
        assert_eq!(request.params().len(), 2);
        assert_eq!(request.params()["account"], json!("rX"));
    }

    #[test]
    fn test_from_value_accepts_method_and_id() {
        let request = Request::from_value(json!({"method": "server_info", "id": 4})).unwrap();

        assert_eq!(request.command(), "server_info");
        assert_eq!(request.id(), Some(&RequestId::Number(4)));
        assert!(request.params().is_empty());
    }

    #[test]
    fn test_from_value_rejects_conflicting_command_and_method() {
        let result = Request::from_value(json!({"command": "a", "method": "b"}));
        assert!(matches!(result, Err(ClientError::InvalidRequest { .. })));

        let same = Request::from_value(json!({"command": "ping", "method": "ping"})).unwrap();
        assert_eq!(same.command(), "ping");
    }

    #[test]
    fn test_from_value_rejects_bad_shapes() {
        for value in [
            json!(["command", "ping"]),
            json!({"account": "rX"}),
            json!({"command": 5}),
            json!({"command": "ping", "id": -1}),
            json!({"command": "ping", "id": {"nested": true}}),
            json!({"command": ""}),
            json!({"command": "account info"}),
        ] {
            let result = Request::from_value(value.clone());
            assert!(
                matches!(result, Err(ClientError::InvalidRequest { .. })),
                "expected InvalidRequest for {}, got {:?}",
                value,
                result
            );
        }
    }

    #[test]
    fn test_validate_rejects_generated_id_namespace() {
        let request = Request::new("server_info").with_id("__auto_0");
        match request.validate() {
            Err(ClientError::InvalidRequest { reason }) => assert!(reason.contains("__auto_")),
            other => panic!("Expected InvalidRequest, got: {:?}", other),
        }

        let decoded = Request::from_value(json!({"command": "ping", "id": "__auto_7"}));
        assert!(matches!(decoded, Err(ClientError::InvalidRequest { .. })));

        // Only the exact prefix is reserved
        assert!(Request::new("ping").with_id("auto_0").validate().is_ok());
        assert!(Request::new("ping").with_id("_auto_0").validate().is_ok());
        assert!(Request::new("ping").with_id(0).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_reserved_param() {
        let request = Request::new("ping").param("method", "other");
        match request.validate() {
            Err(ClientError::InvalidRequest { reason }) => assert!(reason.contains("method")),
            other => panic!("Expected InvalidRequest, got: {:?}", other),
        }
    }

    #[test]
    fn test_to_wire_uses_configured_field() {
        let request = Request::new("account_info")
            .param("account", "rX")
            .with_id("__auto_0");

        assert_eq!(
            request.to_wire(CommandField::Method).unwrap(),
            json!({"method": "account_info", "account": "rX", "id": "__auto_0"})
        );
        assert_eq!(
            request.to_wire(CommandField::Command).unwrap(),
            json!({"command": "account_info", "account": "rX", "id": "__auto_0"})
        );
    }

    #[test]
    fn test_to_wire_requires_id() {
        let result = Request::new("ping").to_wire(CommandField::Command);
        assert!(matches!(result, Err(ClientError::InvalidRequest { .. })));
    }

    #[test]
    fn test_inbound_success_response() {
        let inbound = Inbound::from_value(json!({
            "type": "response",
            "status": "success",
            "id": "__auto_0",
            "result": {"ok": true}
        }));

        let Inbound::Response(response) = inbound else {
            panic!("Expected response");
        };
        assert_eq!(response.id(), Some(&RequestId::auto(0)));
        assert_eq!(response.status(), &ResponseStatus::Success);
        assert_eq!(
            response.into_payload(),
            json!({"type": "response", "id": "__auto_0", "result": {"ok": true}})
        );
    }

    #[test]
    fn test_inbound_failure_response_keeps_raw_status() {
        let raw = json!({
            "type": "response",
            "status": "error",
            "error": "actNotFound",
            "id": 3
        });

        let Inbound::Response(response) = Inbound::from_value(raw.clone()) else {
            panic!("Expected response");
        };
        assert_eq!(response.id(), Some(&RequestId::Number(3)));
        assert_eq!(response.status(), &ResponseStatus::Failure("error".to_string()));
        assert_eq!(response.into_raw(), raw);
    }

    #[test]
    fn test_inbound_response_without_status_is_failure() {
        let Inbound::Response(response) =
            Inbound::from_value(json!({"type": "response", "id": "x"}))
        else {
            panic!("Expected response");
        };
        assert!(matches!(response.status(), ResponseStatus::Failure(_)));
    }

    #[test]
    fn test_inbound_event_keeps_full_payload() {
        let raw = json!({"type": "ledgerClosed", "ledger_index": 42, "ledger_hash": "ABC"});

        let Inbound::Event(event) = Inbound::from_value(raw.clone()) else {
            panic!("Expected event");
        };
        assert_eq!(event.kind(), "ledgerClosed");
        assert_eq!(event.payload(), &raw);
    }

    #[test]
    fn test_inbound_untyped() {
        assert!(matches!(Inbound::from_value(json!([1, 2])), Inbound::Untyped(_)));
        assert!(matches!(Inbound::from_value(json!({"result": {}})), Inbound::Untyped(_)));
        assert!(matches!(Inbound::from_value(json!({"type": 5})), Inbound::Untyped(_)));
    }
}
