//! Typed view over raw watch records
//!
//! The watch engine delivers plain [`serde_json::Value`]s; callers that want a
//! little structure can convert with [`WatchEvent::from_value`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Watch notification type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WatchEventType {
    /// Object was created
    Added,
    /// Object was changed
    Modified,
    /// Object was removed
    Deleted,
    /// Progress marker carrying only a `resourceVersion`
    Bookmark,
    /// Server-side watch failure; `object` is a `Status`
    Error,
    /// Any type this client does not know
    #[serde(other)]
    Unknown,
}

/// One change notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchEvent {
    /// Notification type
    #[serde(rename = "type")]
    pub event_type: WatchEventType,
    /// Affected object, or a `Status` for [`WatchEventType::Error`]
    #[serde(default)]
    pub object: Value,
}

impl WatchEvent {
    /// Interpret a raw record
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// `object.kind`, if present
    pub fn kind(&self) -> Option<&str> {
        self.object.get("kind").and_then(Value::as_str)
    }

    /// `object.metadata.name`, if present
    pub fn name(&self) -> Option<&str> {
        self.object.pointer("/metadata/name").and_then(Value::as_str)
    }

    /// `object.metadata.resourceVersion`, if present
    pub fn resource_version(&self) -> Option<&str> {
        resource_version(&self.object)
    }
}

/// `metadata.resourceVersion` of a Kubernetes object or list
pub(crate) fn resource_version(object: &Value) -> Option<&str> {
    object
        .pointer("/metadata/resourceVersion")
        .and_then(Value::as_str)
}
