use crate::errors::ToolError;
use crate::services::logger::Logger;
use crate::services::validation::{input_schema, prepare_args, ParamSpec, ToolArgs};
use crate::utils::suggest::suggest;
use async_trait::async_trait;
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Runs one or more registered tools. `tool` tells a multi-tool handler which one.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, tool: &str, args: &ToolArgs) -> Result<Value, ToolError>;
}

#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
}

impl ToolSpec {
    pub fn new(name: &str, description: &str, params: Vec<ParamSpec>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            params,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

struct RegisteredTool {
    spec: ToolSpec,
    schema: Value,
    validator: JSONSchema,
    handler: Arc<dyn ToolHandler>,
}

pub struct ToolRegistry {
    logger: Logger,
    tools: HashMap<String, RegisteredTool>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger: logger.child("registry"),
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn register(&mut self, spec: ToolSpec, handler: Arc<dyn ToolHandler>) -> Result<(), ToolError> {
        if self.tools.contains_key(&spec.name) {
            return Err(ToolError::internal(format!(
                "tool '{}' is already registered",
                spec.name
            )));
        }
        let schema = input_schema(&spec.params);
        let validator = JSONSchema::compile(&schema).map_err(|err| {
            ToolError::internal(format!("invalid input schema for '{}': {}", spec.name, err))
        })?;
        self.order.push(spec.name.clone());
        self.tools.insert(
            spec.name.clone(),
            RegisteredTool {
                spec,
                schema,
                validator,
                handler,
            },
        );
        Ok(())
    }

    /// Registered tools in registration order.
    pub fn list(&self) -> Vec<ToolDef> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolDef {
                name: tool.spec.name.clone(),
                description: tool.spec.description.clone(),
                input_schema: tool.schema.clone(),
            })
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub async fn invoke(&self, name: &str, raw: Value) -> Result<Value, ToolError> {
        let Some(tool) = self.tools.get(name) else {
            let suggestions = suggest(name, self.order.iter().map(String::as_str), 5);
            let hint = if suggestions.is_empty() {
                "Call tools/list to see the available tools".to_string()
            } else {
                format!("Did you mean: {}", suggestions.join(", "))
            };
            return Err(ToolError::unknown_tool(name).with_hint(hint));
        };

        let trace_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        let result = match prepare_args(&tool.spec.params, &tool.validator, raw) {
            Ok(args) => {
                self.logger.debug(
                    "tool call",
                    Some(&serde_json::json!({
                        "trace_id": trace_id,
                        "tool": name,
                        "args": args.to_value(),
                    })),
                );
                tool.handler.handle(name, &args).await
            }
            Err(err) => Err(err),
        };
        let result = result.map_err(|err| err.with_tool(name));

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => self.logger.info(
                "tool call completed",
                Some(&serde_json::json!({
                    "trace_id": trace_id,
                    "tool": name,
                    "outcome": "ok",
                    "duration_ms": duration_ms,
                })),
            ),
            Err(err) => self.logger.warn(
                "tool call failed",
                Some(&serde_json::json!({
                    "trace_id": trace_id,
                    "tool": name,
                    "outcome": err.code,
                    "message": err.message,
                    "duration_ms": duration_ms,
                })),
            ),
        }
        result
    }
}
