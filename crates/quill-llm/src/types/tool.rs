use serde_json::Value;

/// Function the model may call during an agent request
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    /// Function name
    pub name: String,
    /// What the function does
    pub description: Option<String>,
    /// JSON Schema of the parameters
    pub parameters: Option<Value>,
}

impl ToolDefinition {
    /// Create a tool with just a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters: None,
        }
    }

    /// Attach a description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach a JSON Schema for the parameters
    #[must_use]
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }
}
