//! Typed tool parameters: declaration, coercion and schema checks.

use crate::errors::ToolError;
use crate::utils::suggest::suggest;
use jsonschema::error::ValidationErrorKind;
use jsonschema::JSONSchema;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Boolean,
}

impl ParamType {
    pub fn schema_name(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
        }
    }

    /// Converts a caller-supplied value into this type.
    pub fn coerce(self, field: &str, value: Value) -> Result<Value, ToolError> {
        match (self, value) {
            (ParamType::String, Value::String(text)) => Ok(Value::String(text)),
            (ParamType::Integer, Value::Number(number)) => {
                if let Some(int) = number.as_i64() {
                    return Ok(Value::from(int));
                }
                match number.as_f64() {
                    Some(float) if float.fract() == 0.0 && float.abs() < i64::MAX as f64 => {
                        Ok(Value::from(float as i64))
                    }
                    _ => Err(ToolError::invalid_parameter(
                        field,
                        format!("expected an integer, got {}", number),
                    )),
                }
            }
            (ParamType::Integer, Value::String(text)) => text
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| {
                    ToolError::invalid_parameter(
                        field,
                        format!("expected an integer, got '{}'", text),
                    )
                }),
            (ParamType::Boolean, Value::Bool(flag)) => Ok(Value::Bool(flag)),
            (ParamType::Boolean, Value::String(text)) => {
                match text.trim().to_lowercase().as_str() {
                    "true" | "1" | "yes" => Ok(Value::Bool(true)),
                    "false" | "0" | "no" => Ok(Value::Bool(false)),
                    _ => Err(ToolError::invalid_parameter(
                        field,
                        format!("expected a boolean, got '{}'", text),
                    )),
                }
            }
            (kind, other) => Err(ToolError::invalid_parameter(
                field,
                format!("expected {}, got {}", kind.schema_name(), value_type_name(&other)),
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamType,
    pub required: bool,
    pub default: Option<Value>,
    pub description: String,
    /// Extra JSON Schema keywords (`enum`, `minimum`, `maximum`, ...).
    pub constraints: Map<String, Value>,
}

impl ParamSpec {
    fn new(name: &str, kind: ParamType) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: false,
            default: None,
            description: String::new(),
            constraints: Map::new(),
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, ParamType::String)
    }

    pub fn integer(name: &str) -> Self {
        Self::new(name, ParamType::Integer)
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, ParamType::Boolean)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        if self.kind == ParamType::String {
            self.constraints
                .insert("minLength".to_string(), Value::from(1));
        }
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn describe(mut self, text: &str) -> Self {
        self.description = text.to_string();
        self
    }

    pub fn range(mut self, min: i64, max: i64) -> Self {
        self.constraints
            .insert("minimum".to_string(), Value::from(min));
        self.constraints
            .insert("maximum".to_string(), Value::from(max));
        self
    }

    pub fn at_least(mut self, min: i64) -> Self {
        self.constraints
            .insert("minimum".to_string(), Value::from(min));
        self
    }

    pub fn one_of(mut self, options: &[&str]) -> Self {
        self.constraints.insert(
            "enum".to_string(),
            Value::Array(options.iter().map(|o| Value::from(*o)).collect()),
        );
        self
    }

    fn property_schema(&self) -> Value {
        let mut property = Map::new();
        property.insert(
            "type".to_string(),
            Value::from(self.kind.schema_name()),
        );
        if !self.description.is_empty() {
            property.insert(
                "description".to_string(),
                Value::String(self.description.clone()),
            );
        }
        if let Some(default) = &self.default {
            property.insert("default".to_string(), default.clone());
        }
        for (key, value) in &self.constraints {
            property.insert(key.clone(), value.clone());
        }
        Value::Object(property)
    }
}

/// Builds the `inputSchema` object advertised for a parameter list.
pub fn input_schema(params: &[ParamSpec]) -> Value {
    let properties: Map<String, Value> = params
        .iter()
        .map(|param| (param.name.clone(), param.property_schema()))
        .collect();
    let required: Vec<Value> = params
        .iter()
        .filter(|param| param.required)
        .map(|param| Value::String(param.name.clone()))
        .collect();
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

/// Validated, coerced arguments with defaults applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs {
    values: Map<String, Value>,
}

impl ToolArgs {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).filter(|value| !value.is_null())
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn require_str(&self, name: &str) -> Result<&str, ToolError> {
        self.str(name)
            .ok_or_else(|| ToolError::invalid_parameter(name, "is required"))
    }

    pub fn require_int(&self, name: &str) -> Result<i64, ToolError> {
        self.int(name)
            .ok_or_else(|| ToolError::invalid_parameter(name, "is required"))
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

/// Turns raw call arguments into `ToolArgs`.
///
/// Checks run in order: object shape, unknown fields, required fields, type
/// coercion with defaults, then the compiled schema (`enum`, bounds).
pub fn prepare_args(
    params: &[ParamSpec],
    validator: &JSONSchema,
    raw: Value,
) -> Result<ToolArgs, ToolError> {
    let mut input = match raw {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        other => {
            return Err(ToolError::invalid_parameter(
                "arguments",
                format!("expected an object, got {}", value_type_name(&other)),
            ))
        }
    };

    let known: Vec<&str> = params.iter().map(|param| param.name.as_str()).collect();
    for key in input.keys() {
        if !known.contains(&key.as_str()) {
            let mut err = ToolError::invalid_parameter(key, "unknown field");
            let suggestions = suggest(key, known.iter().copied(), 3);
            if !suggestions.is_empty() {
                err = err.with_hint(format!("Did you mean: {}", suggestions.join(", ")));
            }
            return Err(err);
        }
    }

    input.retain(|_, value| !value.is_null());
    if let Some(missing) = params
        .iter()
        .find(|param| param.required && !input.contains_key(&param.name))
    {
        return Err(ToolError::invalid_parameter(&missing.name, "is required"));
    }

    let mut values = Map::new();
    for param in params {
        match input.remove(&param.name) {
            Some(value) => {
                values.insert(param.name.clone(), param.kind.coerce(&param.name, value)?);
            }
            None => {
                if let Some(default) = &param.default {
                    values.insert(param.name.clone(), default.clone());
                }
            }
        }
    }

    let instance = Value::Object(values);
    if let Err(errors) = validator.validate(&instance) {
        let mut problems: Vec<(String, String, Option<String>)> = Vec::new();
        for err in errors.take(10) {
            let pointer = err.instance_path.to_string();
            let field = pointer.trim_start_matches('/').to_string();
            let field = if field.is_empty() { "arguments".to_string() } else { field };
            let (reason, hint) = match &err.kind {
                ValidationErrorKind::Enum { options } => {
                    let allowed: Vec<String> = options
                        .as_array()
                        .map(|items| {
                            items
                                .iter()
                                .map(|item| {
                                    item.as_str()
                                        .map(|s| s.to_string())
                                        .unwrap_or_else(|| item.to_string())
                                })
                                .collect()
                        })
                        .unwrap_or_default();
                    let received = instance
                        .get(field.as_str())
                        .and_then(Value::as_str)
                        .unwrap_or("");
                    let suggestions = suggest(received, allowed.iter().map(String::as_str), 3);
                    let hint = (!suggestions.is_empty())
                        .then(|| format!("Did you mean: {}", suggestions.join(", ")));
                    (format!("expected one of {}", allowed.join(", ")), hint)
                }
                _ => (err.to_string(), None),
            };
            problems.push((field, reason, hint));
        }
        if let Some((field, reason, hint)) = problems.first().cloned() {
            let mut error = ToolError::invalid_parameter(&field, reason);
            if problems.len() > 1 {
                let all: Vec<Value> = problems
                    .iter()
                    .map(|(field, reason, _)| serde_json::json!({ "field": field, "reason": reason }))
                    .collect();
                if let Some(Value::Object(details)) = error.details.as_mut() {
                    details.insert("errors".to_string(), Value::Array(all));
                }
            }
            if let Some(hint) = hint {
                error = error.with_hint(hint);
            }
            return Err(error);
        }
    }

    match instance {
        Value::Object(values) => Ok(ToolArgs::new(values)),
        _ => Ok(ToolArgs::default()),
    }
}

pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ToolErrorKind;

    fn search_params() -> Vec<ParamSpec> {
        vec![
            ParamSpec::string("query").required(),
            ParamSpec::string("search_type")
                .default_value("track")
                .one_of(&["track", "artist", "album", "playlist"]),
            ParamSpec::integer("limit").default_value(5).range(1, 50),
            ParamSpec::boolean("public").default_value(true),
        ]
    }

    fn prepare(raw: Value) -> Result<ToolArgs, ToolError> {
        let params = search_params();
        let schema = input_schema(&params);
        let validator = JSONSchema::compile(&schema).expect("schema");
        prepare_args(&params, &validator, raw)
    }

    fn field_of(err: &ToolError) -> String {
        err.details.as_ref().unwrap()["field"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn defaults_are_applied() {
        let args = prepare(serde_json::json!({"query": "daft punk"})).unwrap();
        assert_eq!(args.str("search_type"), Some("track"));
        assert_eq!(args.int("limit"), Some(5));
        assert_eq!(args.bool("public"), Some(true));
    }

    #[test]
    fn strings_coerce_to_integers_and_booleans() {
        let args = prepare(serde_json::json!({"query": "x", "limit": "7", "public": "no"})).unwrap();
        assert_eq!(args.int("limit"), Some(7));
        assert_eq!(args.bool("public"), Some(false));
    }

    #[test]
    fn null_counts_as_omitted() {
        let args = prepare(serde_json::json!({"query": "x", "limit": null})).unwrap();
        assert_eq!(args.int("limit"), Some(5));
        let err = prepare(serde_json::json!({"query": null})).unwrap_err();
        assert_eq!(field_of(&err), "query");
    }

    #[test]
    fn wrong_type_is_rejected() {
        let err = prepare(serde_json::json!({"query": "x", "limit": "many"})).unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::InvalidParameter);
        assert_eq!(field_of(&err), "limit");

        let err = prepare(serde_json::json!({"query": 42})).unwrap_err();
        assert_eq!(field_of(&err), "query");
    }

    #[test]
    fn out_of_range_is_rejected() {
        let err = prepare(serde_json::json!({"query": "x", "limit": 500})).unwrap_err();
        assert_eq!(field_of(&err), "limit");
    }

    #[test]
    fn enum_mismatch_suggests_closest_option() {
        let err = prepare(serde_json::json!({"query": "x", "search_type": "tracks"})).unwrap_err();
        assert_eq!(field_of(&err), "search_type");
        assert!(err.hint.unwrap().contains("track"));
    }

    #[test]
    fn unknown_field_suggests_known_one() {
        let err = prepare(serde_json::json!({"query": "x", "limt": 3})).unwrap_err();
        assert_eq!(field_of(&err), "limt");
        assert!(err.hint.unwrap().contains("limit"));
    }

    #[test]
    fn non_object_arguments_are_rejected() {
        let err = prepare(serde_json::json!(["query"])).unwrap_err();
        assert_eq!(field_of(&err), "arguments");
    }

    #[test]
    fn required_string_must_not_be_empty() {
        let err = prepare(serde_json::json!({"query": ""})).unwrap_err();
        assert_eq!(field_of(&err), "query");
    }

    #[test]
    fn schema_lists_required_and_disallows_extras() {
        let schema = input_schema(&search_params());
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], serde_json::json!(["query"]));
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(schema["properties"]["limit"]["maximum"], 50);
    }
}
