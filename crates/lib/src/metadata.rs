//! Private metadata codec: state a step attaches to a modal view and reads back on submission.
//!
//! Slack round-trips `view.private_metadata` untouched, so it is the only place state lives
//! between an opener and its closer. The blob is a JSON object holding the step's state fields,
//! a schema version (`v`) and, when a [`MetadataRouter`] adds one, a routing tag under
//! [`ROUTING_KEY`]. Decoding strips both reserved keys before deserializing the typed state.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::Organization;

/// Slack's limit on `private_metadata` length.
pub const PRIVATE_METADATA_MAX_CHARS: usize = 3000;

/// Reserved key holding the chatops proxy routing tag.
pub const ROUTING_KEY: &str = "chatops_proxy";

const VERSION_KEY: &str = "v";
const SCHEMA_VERSION: u64 = 1;

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("private state could not be serialized: {0}")]
    Json(#[from] serde_json::Error),
    #[error("private state must serialize to a json object")]
    NotAnObject,
    #[error("private state uses reserved key `{0}`")]
    ReservedKey(String),
    #[error("private metadata is {len} chars, limit is {max}")]
    TooLarge { len: usize, max: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("view carries no private metadata")]
    Missing,
    #[error("private metadata is not valid json: {0}")]
    Json(#[source] serde_json::Error),
    #[error("private metadata is not a json object")]
    NotAnObject,
    #[error("private metadata has no schema version")]
    MissingVersion,
    #[error("unsupported private metadata version {0}")]
    UnsupportedVersion(u64),
    #[error("private metadata does not match the expected state: {0}")]
    Schema(#[source] serde_json::Error),
}

/// Transform applied to outgoing metadata so the chatops proxy can route the submission back
/// to the right stack.
pub trait MetadataRouter: Send + Sync {
    /// Routing tag stored under [`ROUTING_KEY`], or `None` to leave the blob untagged.
    fn routing_tag(&self, organization: &Organization) -> Option<Value>;
}

/// Tags metadata with the organization's stack and id.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProxyRouting;

impl MetadataRouter for ProxyRouting {
    fn routing_tag(&self, organization: &Organization) -> Option<Value> {
        Some(serde_json::json!({
            "stack_id": organization.stack_id,
            "org_id": organization.id,
        }))
    }
}

/// Identity transform.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRouting;

impl MetadataRouter for NoRouting {
    fn routing_tag(&self, _organization: &Organization) -> Option<Value> {
        None
    }
}

/// Serialize `state` into a private metadata blob for `organization`.
pub fn encode<T: Serialize>(
    state: &T,
    router: &dyn MetadataRouter,
    organization: &Organization,
) -> Result<String, EncodeError> {
    let Value::Object(fields) = serde_json::to_value(state)? else {
        return Err(EncodeError::NotAnObject);
    };
    let mut out = Map::new();
    out.insert(VERSION_KEY.to_string(), Value::from(SCHEMA_VERSION));
    for (key, value) in fields {
        if key == VERSION_KEY || key == ROUTING_KEY {
            return Err(EncodeError::ReservedKey(key));
        }
        out.insert(key, value);
    }
    if let Some(tag) = router.routing_tag(organization) {
        out.insert(ROUTING_KEY.to_string(), tag);
    }
    let blob = serde_json::to_string(&Value::Object(out))?;
    let len = blob.chars().count();
    if len > PRIVATE_METADATA_MAX_CHARS {
        return Err(EncodeError::TooLarge {
            len,
            max: PRIVATE_METADATA_MAX_CHARS,
        });
    }
    Ok(blob)
}

/// Parse a blob produced by [`encode`] back into the typed state.
pub fn decode<T: DeserializeOwned>(blob: &str) -> Result<T, DecodeError> {
    let value: Value = serde_json::from_str(blob).map_err(DecodeError::Json)?;
    let Value::Object(mut fields) = value else {
        return Err(DecodeError::NotAnObject);
    };
    match fields.remove(VERSION_KEY) {
        None => return Err(DecodeError::MissingVersion),
        Some(v) => match v.as_u64() {
            Some(SCHEMA_VERSION) => {}
            Some(other) => return Err(DecodeError::UnsupportedVersion(other)),
            None => return Err(DecodeError::MissingVersion),
        },
    }
    fields.remove(ROUTING_KEY);
    serde_json::from_value(Value::Object(fields)).map_err(DecodeError::Schema)
}
