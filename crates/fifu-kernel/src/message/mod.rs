//! The envelope that travels between protocol plugins and the router.

use crate::uri::Uri;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Metadata key carrying the session retention flag.
pub const KEEP_SESSION_KEY: &str = "KeepSession";
/// Metadata key carrying the [`MessageKind`].
pub const MESSAGE_TYPE_KEY: &str = "MessageType";

const TRUE: &str = "True";
const FALSE: &str = "False";

/// Direction of a message as labelled by the plugin that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// No label, or a label this gateway does not understand.
    Unknown,
    Request,
    Response,
    Indication,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Unknown => "unknown",
            MessageKind::Request => "request",
            MessageKind::Response => "response",
            MessageKind::Indication => "indication",
        }
    }

    fn from_label(label: &str) -> Self {
        match label {
            "request" => MessageKind::Request,
            "response" => MessageKind::Response,
            "indication" => MessageKind::Indication,
            _ => MessageKind::Unknown,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource request, response or indication together with its content.
///
/// Envelopes are owned by exactly one holder at a time and are moved through
/// queues, never shared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaMessage {
    pub uri: Uri,
    pub metadata: HashMap<String, String>,
    /// Declared content type; empty when the producer did not know it.
    pub content_type: String,
    pub content_data: Vec<u8>,
}

impl MetaMessage {
    pub fn new(uri: Uri) -> Self {
        Self {
            uri,
            ..Self::default()
        }
    }

    pub fn request(uri: Uri) -> Self {
        Self::new(uri).with_kind(MessageKind::Request)
    }

    pub fn response(uri: Uri, content_type: &str, content: Vec<u8>) -> Self {
        Self::new(uri)
            .with_kind(MessageKind::Response)
            .with_content(content_type, content)
    }

    pub fn with_content(mut self, content_type: &str, content: Vec<u8>) -> Self {
        self.content_type = content_type.to_string();
        self.content_data = content;
        self
    }

    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.set_kind(kind);
        self
    }

    pub fn with_keep_session(mut self, keep: bool) -> Self {
        self.set_keep_session(keep);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// Whether the correlation entry answered by this message should be
    /// retained for further responses. Absent means `false`.
    pub fn keep_session(&self) -> bool {
        self.metadata
            .get(KEEP_SESSION_KEY)
            .is_some_and(|v| v == TRUE)
    }

    pub fn set_keep_session(&mut self, keep: bool) {
        let value = if keep { TRUE } else { FALSE };
        self.metadata
            .insert(KEEP_SESSION_KEY.to_string(), value.to_string());
    }

    pub fn kind(&self) -> MessageKind {
        self.metadata
            .get(MESSAGE_TYPE_KEY)
            .map_or(MessageKind::Unknown, |v| MessageKind::from_label(v))
    }

    /// Label the message. [`MessageKind::Unknown`] removes the label.
    pub fn set_kind(&mut self, kind: MessageKind) {
        if kind == MessageKind::Unknown {
            self.metadata.remove(MESSAGE_TYPE_KEY);
        } else {
            self.metadata
                .insert(MESSAGE_TYPE_KEY.to_string(), kind.as_str().to_string());
        }
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}
