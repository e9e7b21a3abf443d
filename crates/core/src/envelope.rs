//! Inbound notification envelopes and the upload events they carry.
//!
//! Upload notifications arrive wrapped twice: the queue delivers an envelope
//! whose body is a JSON document holding an optional `Records` list of
//! object-created descriptors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// A message as delivered by the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Delivery identifier, when the transport provides one.
    #[serde(default)]
    pub message_id: Option<String>,
    /// Raw message body (JSON text).
    pub body: String,
}

impl Envelope {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            message_id: None,
            body: body.into(),
        }
    }

    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Parses the body and returns the embedded event descriptors.
    ///
    /// A body without a `Records` list (e.g. a storage test event) yields no
    /// descriptors. Descriptors are returned unparsed so that each one can
    /// fail independently.
    pub fn upload_descriptors(&self) -> Result<Vec<Value>> {
        let body: NotificationBody = serde_json::from_str(&self.body)
            .map_err(|e| Error::envelope(format!("envelope body is not valid JSON: {}", e)))?;
        Ok(body.records)
    }
}

#[derive(Debug, Deserialize)]
struct NotificationBody {
    #[serde(rename = "Records", default)]
    records: Vec<Value>,
}

/// A single object-upload event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadEvent {
    pub bucket: String,
    pub key: String,
    pub size: u64,
}

impl UploadEvent {
    /// Extracts bucket, key, and size from an object-created descriptor.
    pub fn from_descriptor(descriptor: &Value) -> Result<Self> {
        let parsed: S3Descriptor = serde_json::from_value(descriptor.clone())
            .map_err(|e| Error::envelope(format!("malformed upload event: {}", e)))?;

        Ok(Self {
            bucket: parsed.s3.bucket.name,
            key: decode_object_key(&parsed.s3.object.key),
            size: parsed.s3.object.size,
        })
    }

    /// Basename of the object key without its final extension.
    pub fn stem(&self) -> &str {
        let file_name = self.key.rsplit('/').next().unwrap_or(&self.key);
        match file_name.rsplit_once('.') {
            Some((stem, _)) => stem,
            None => file_name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct S3Descriptor {
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: S3Bucket,
    object: S3Object,
}

#[derive(Debug, Deserialize)]
struct S3Bucket {
    name: String,
}

#[derive(Debug, Deserialize)]
struct S3Object {
    key: String,
    size: u64,
}

/// Decodes a form-encoded object key (`+` for space, percent escapes).
///
/// Keys that do not decode to a single token are returned unchanged.
pub fn decode_object_key(raw: &str) -> String {
    let mut pairs = url::form_urlencoded::parse(raw.as_bytes());
    match (pairs.next(), pairs.next()) {
        (Some((key, value)), None) if value.is_empty() && !raw.contains('=') => key.into_owned(),
        _ => raw.to_string(),
    }
}
