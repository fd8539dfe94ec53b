use std::collections::BTreeMap;

/// Extra Bot API parameters supplied by the caller. `Null` means "unset".
pub type ExtraPayload = BTreeMap<String, serde_json::Value>;

/// Bot API method invoked by a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiMethod {
    SendMessage,
    SendDocument,
}

impl ApiMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiMethod::SendMessage => "sendMessage",
            ApiMethod::SendDocument => "sendDocument",
        }
    }
}

/// File attached to a `sendDocument` call (multipart field `document`).
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentPart {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// One outbound Bot API call.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    pub method: ApiMethod,
    /// Form fields in insertion order; unset parameters are already omitted.
    pub fields: Vec<(String, String)>,
    pub document: Option<DocumentPart>,
}

impl ApiRequest {
    pub fn new(method: ApiMethod) -> Self {
        Self {
            method,
            fields: Vec::new(),
            document: None,
        }
    }

    /// Value of a form field, if present.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set a field, replacing an earlier value with the same name.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    pub fn unset(&mut self, name: &str) {
        self.fields.retain(|(k, _)| k != name);
    }

    /// Merge extras over the current fields. `Null` removes a field.
    pub fn merge(&mut self, extra: &ExtraPayload) {
        for (k, v) in extra {
            match form_value(v) {
                Some(s) => self.set(k, s),
                None => self.unset(k),
            }
        }
    }
}

/// Encode a JSON value as a form value. Objects/arrays (e.g. `reply_markup`)
/// are sent as JSON text.
fn form_value(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Raw Bot API response, inspected once and dropped.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    pub raw_body: String,
    /// Decoded JSON body; `Null` when the body is not JSON.
    pub decoded: serde_json::Value,
    pub http_ok: bool,
}

impl ApiResponse {
    pub fn from_body(http_ok: bool, raw_body: impl Into<String>) -> Self {
        let raw_body = raw_body.into();
        let decoded = serde_json::from_str(&raw_body).unwrap_or(serde_json::Value::Null);
        Self {
            raw_body,
            decoded,
            http_ok,
        }
    }
}
