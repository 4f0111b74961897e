use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A tool the model may call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool type (always "function")
    #[serde(rename = "type", default = "function_type")]
    pub tool_type: String,
    /// Function definition
    pub function: FunctionDefinition,
}

fn function_type() -> String {
    "function".to_owned()
}

/// Function signature exposed to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Function name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the function parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl FunctionDefinition {
    /// Parameter schema, defaulting to an empty object schema
    ///
    /// Vendors reject function declarations without a schema, so a
    /// missing one is sent as `{"type":"object","properties":{}}`.
    pub fn parameters_or_empty(&self) -> Value {
        match &self.parameters {
            Some(Value::Object(map)) if !map.is_empty() => Value::Object(map.clone()),
            _ => json!({"type": "object", "properties": {}}),
        }
    }
}

impl ToolDefinition {
    /// Build a function tool
    pub fn function(name: impl Into<String>, description: Option<String>, parameters: Option<Value>) -> Self {
        Self {
            tool_type: function_type(),
            function: FunctionDefinition {
                name: name.into(),
                description,
                parameters,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_parameters_default_to_empty_object_schema() {
        let tool = ToolDefinition::function("noop", None, None);
        assert_eq!(
            tool.function.parameters_or_empty(),
            json!({"type": "object", "properties": {}})
        );
    }

    #[test]
    fn explicit_parameters_are_kept() {
        let schema = json!({"type": "object", "properties": {"city": {"type": "string"}}});
        let tool = ToolDefinition::function("weather", Some("Look up weather".to_owned()), Some(schema.clone()));
        assert_eq!(tool.function.parameters_or_empty(), schema);
    }

    #[test]
    fn type_defaults_to_function() {
        let tool: ToolDefinition = serde_json::from_value(json!({"function": {"name": "f"}})).unwrap();
        assert_eq!(tool.tool_type, "function");
    }
}
