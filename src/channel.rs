//! Host method-channel surface
//!
//! The hosting plugin layer delivers method calls on a named channel;
//! this module answers them against a [`TexturePipeline`]. The only
//! implemented method is `get_texture`, which returns the ordered list
//! of per-slot texture identifiers.

use frame_portal_core::{RenderBackend, TextureRegistry};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::pipeline::TexturePipeline;

/// Channel this plugin answers on
pub const CHANNEL: &str = "frame-portal/texture";

/// Method returning the per-slot texture identifiers
pub const METHOD_GET_TEXTURE: &str = "get_texture";

/// Error code reported when initialization fails
pub const ERROR_CODE_GL: &str = "gl-error";

/// Incoming method call envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub args: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            args: Value::Null,
        }
    }
}

/// Outgoing response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MethodResponse {
    Success { value: Value },
    Error {
        code: String,
        message: String,
        details: Value,
    },
    NotImplemented,
}

impl MethodResponse {
    pub fn success(value: Value) -> Self {
        MethodResponse::Success { value }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        MethodResponse::Error {
            code: code.into(),
            message: message.into(),
            details: Value::Null,
        }
    }
}

/// Dispatch one host method call against the pipeline.
///
/// `get_texture` responds with the ordered identifier list, or a single
/// `gl-error` failure when any underlying resource cannot be allocated;
/// there is no partial-success response. Unknown methods get a
/// not-implemented response.
pub fn handle_method_call<B, R>(
    pipeline: &TexturePipeline<B, R>,
    call: &MethodCall,
) -> MethodResponse
where
    B: RenderBackend,
    R: TextureRegistry,
{
    match call.method.as_str() {
        METHOD_GET_TEXTURE => match pipeline.acquire_textures() {
            Ok(textures) => {
                let ids: Vec<i64> = textures.iter().map(|id| id.as_i64()).collect();
                MethodResponse::success(json!(ids))
            }
            Err(err) => {
                debug!(%err, "get_texture failed");
                MethodResponse::error(ERROR_CODE_GL, "Failed to initialize")
            }
        },
        other => {
            debug!(method = other, "unimplemented method");
            MethodResponse::NotImplemented
        }
    }
}
