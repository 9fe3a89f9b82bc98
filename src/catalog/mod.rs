//! Bound tool catalogue types.
//!
//! A namespace binding hands the proxy a batch of transformed tools,
//! each owned by a downstream connection. Connections are borrowed
//! handles resolved by an external connection manager; the catalogue
//! never owns them.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use rmcp::model::{CallToolRequestParam, CallToolResult, Tool};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ProxyResult;

/// Unique catalogue key: `server_name::original_name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToolKey {
    pub server_name: String,
    pub original_name: String,
}

impl ToolKey {
    pub fn new(server_name: impl Into<String>, original_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            original_name: original_name.into(),
        }
    }

    /// Parse from "server::name" format.
    pub fn parse(s: &str) -> Option<Self> {
        let (server, name) = s.split_once("::")?;
        Some(Self::new(server, name))
    }
}

impl fmt::Display for ToolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.server_name, self.original_name)
    }
}

/// A downstream tool connection handle.
///
/// Errors are opaque to the proxy and propagated to the client
/// untouched.
#[async_trait]
pub trait ToolConnection: Send + Sync {
    async fn call_tool(&self, request: CallToolRequestParam) -> ProxyResult<CallToolResult>;
}

/// One catalogue entry, produced upstream by the transform pipeline.
#[derive(Clone)]
pub struct BoundTool {
    pub key: ToolKey,
    /// Post-transform descriptor (name, description, input schema).
    pub descriptor: Tool,
    /// Owning connection, valid for the lifetime of the binding.
    pub connection: Arc<dyn ToolConnection>,
    /// Stable identifier from the catalogue store; joins the in-memory
    /// entry to its persisted embedding rows.
    pub tool_uuid: Uuid,
}

impl BoundTool {
    pub fn new(
        server_name: impl Into<String>,
        original_name: impl Into<String>,
        descriptor: Tool,
        connection: Arc<dyn ToolConnection>,
        tool_uuid: Uuid,
    ) -> Self {
        Self {
            key: ToolKey::new(server_name, original_name),
            descriptor,
            connection,
            tool_uuid,
        }
    }

    pub fn server_name(&self) -> &str {
        &self.key.server_name
    }

    pub fn original_name(&self) -> &str {
        &self.key.original_name
    }

    pub fn description(&self) -> &str {
        self.descriptor.description.as_deref().unwrap_or_default()
    }
}

impl fmt::Debug for BoundTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundTool")
            .field("key", &self.key)
            .field("tool_uuid", &self.tool_uuid)
            .finish()
    }
}

/// Wire shape of one `discover` result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub tool_id: String,
    pub method: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

impl ToolDescriptor {
    pub fn from_bound(tool: &BoundTool) -> Self {
        Self {
            tool_id: tool.key.server_name.clone(),
            method: tool.key.original_name.clone(),
            description: tool.description().to_string(),
            input_schema: serde_json::Value::Object((*tool.descriptor.input_schema).clone()),
        }
    }
}

/// Newline-joined descriptions of a tool's input-schema properties.
///
/// serde_json object iteration is deterministic, so this text is stable
/// for a given descriptor.
pub fn parameter_descriptions(schema: &serde_json::Map<String, serde_json::Value>) -> String {
    let Some(props) = schema.get("properties").and_then(|p| p.as_object()) else {
        return String::new();
    };

    props
        .values()
        .filter_map(|prop| prop.get("description").and_then(|d| d.as_str()))
        .collect::<Vec<_>>()
        .join("\n")
}
