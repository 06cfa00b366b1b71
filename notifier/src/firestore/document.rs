use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A typed field value in the Firestore REST JSON encoding, e.g. `{"stringValue": "hi"}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    // 64-bit integers travel as decimal strings
    IntegerValue(String),
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(LatLng),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default)]
    pub values: Vec<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::StringValue(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::StringValue(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::StringValue(s)
    }
}

/// A document as returned by the REST API.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name: `projects/{p}/databases/{db}/documents/{collection}/{id}`
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Document {
    /// The value of `key` if it is present and holds a string.
    pub fn string_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// The name relative to the database root, e.g. `notification_requests/abc`.
    pub fn relative_path(&self) -> &str {
        relative_path(&self.name)
    }

    pub fn collection_id(&self) -> Option<&str> {
        let mut segments = self.relative_path().rsplit('/');
        segments.next()?;
        segments.next().filter(|s| !s.is_empty())
    }

    pub fn document_id(&self) -> Option<&str> {
        self.relative_path().rsplit('/').next().filter(|s| !s.is_empty())
    }
}

pub(crate) fn relative_path(name: &str) -> &str {
    match name.split_once("/documents/") {
        Some((_, path)) => path,
        None => name,
    }
}

/// Payload of a document-created event. Other event fields, such as
/// `oldValue` on update events, are ignored.
#[derive(Clone, Debug, Deserialize)]
pub struct DocumentEvent {
    pub value: Document,
}

/// A partial update of one document.
///
/// Fields listed in `server_timestamps` are set to the commit time by the
/// store itself.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldUpdate {
    pub fields: BTreeMap<String, Value>,
    pub server_timestamps: Vec<String>,
}

impl FieldUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_owned(), value.into());
        self
    }

    pub fn server_timestamp(mut self, key: &str) -> Self {
        self.server_timestamps.push(key.to_owned());
        self
    }

    pub fn string_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}
