//! Tool schema types.

use serde::{Deserialize, Serialize};

/// A tool as advertised by one server, before qualification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

impl From<rmcp::model::Tool> for ToolSchema {
    fn from(tool: rmcp::model::Tool) -> Self {
        Self {
            name: tool.name.to_string(),
            description: tool.description.map(|d| d.to_string()),
            input_schema: serde_json::Value::Object((*tool.input_schema).clone()),
        }
    }
}

/// A server's tool, tagged with the server that owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub server: String,
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

impl ToolDescriptor {
    pub fn from_schema(server: impl Into<String>, schema: ToolSchema) -> Self {
        let description = schema
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("Tool: {}", schema.name));
        Self {
            server: server.into(),
            name: schema.name,
            description,
            input_schema: normalize_input_schema(schema.input_schema),
        }
    }
}

/// Models require an object schema; anything else becomes an empty object schema.
fn normalize_input_schema(schema: serde_json::Value) -> serde_json::Value {
    match schema {
        serde_json::Value::Object(map) if !map.is_empty() => serde_json::Value::Object(map),
        _ => serde_json::json!({ "type": "object", "properties": {} }),
    }
}

/// Builder for the object schemas served tools advertise.
#[derive(Default)]
pub struct SchemaBuilder {
    properties: serde_json::Map<String, serde_json::Value>,
    required: Vec<String>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property(
        mut self,
        name: impl Into<String>,
        schema: serde_json::Value,
        required: bool,
    ) -> Self {
        let name = name.into();
        self.properties.insert(name.clone(), schema);
        if required {
            self.required.push(name);
        }
        self
    }

    /// Shorthand for a string property.
    pub fn string(self, name: impl Into<String>, description: &str, required: bool) -> Self {
        self.property(
            name,
            serde_json::json!({ "type": "string", "description": description }),
            required,
        )
    }

    pub fn build(self) -> serde_json::Value {
        let mut schema = serde_json::json!({
            "type": "object",
            "properties": self.properties,
        });
        if !self.required.is_empty() {
            schema["required"] = serde_json::json!(self.required);
        }
        schema
    }
}
