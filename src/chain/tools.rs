use serde_json::{Map, Value};

/// Declared type of a function parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Integer,
    Number,
    String,
    Boolean,
    Object,
    Array,
    /// No declared type; values are passed through unchanged.
    Any,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::String => "string",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
            ParamType::Any => "any",
        }
    }

    /// Best-effort conversion of `value` to this type.
    ///
    /// Values that cannot be converted are returned unchanged.
    pub fn cast(&self, value: Value) -> Value {
        match (self, value) {
            (ParamType::Integer, Value::String(raw)) => match raw.trim().parse::<i64>() {
                Ok(number) => Value::from(number),
                Err(_) => match raw.trim().parse::<f64>().ok().and_then(exact_i64) {
                    Some(number) => Value::from(number),
                    None => Value::String(raw),
                },
            },
            (ParamType::Integer, Value::Number(number)) if number.is_f64() => {
                match number.as_f64().and_then(exact_i64) {
                    Some(integer) => Value::from(integer),
                    None => Value::Number(number),
                }
            }
            (ParamType::Number, Value::String(raw)) => match raw.trim().parse::<f64>() {
                Ok(number) => serde_json::Number::from_f64(number)
                    .map(Value::Number)
                    .unwrap_or(Value::String(raw)),
                Err(_) => Value::String(raw),
            },
            (ParamType::Boolean, Value::String(raw)) => {
                match raw.trim().to_ascii_lowercase().as_str() {
                    "true" | "yes" => Value::Bool(true),
                    "false" | "no" => Value::Bool(false),
                    _ => Value::String(raw),
                }
            }
            (ParamType::String, Value::Number(number)) => Value::String(number.to_string()),
            (ParamType::String, Value::Bool(flag)) => Value::String(flag.to_string()),
            (ParamType::Object, Value::String(raw)) => match serde_json::from_str(&raw) {
                Ok(Value::Object(map)) => Value::Object(map),
                _ => Value::String(raw),
            },
            (ParamType::Array, Value::String(raw)) => match serde_json::from_str(&raw) {
                Ok(Value::Array(items)) => Value::Array(items),
                _ => Value::String(raw),
            },
            (_, value) => value,
        }
    }
}

/// `float` as an integer, when it is whole and fits in `i64`.
fn exact_i64(float: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is out of range.
    let in_range = float >= i64::MIN as f64 && float < i64::MAX as f64;
    (float.is_finite() && in_range && float.fract() == 0.0).then(|| float as i64)
}

/// One function parameter definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionParam {
    pub name: String,
    pub kind: ParamType,
    /// Value used when the model leaves the parameter out.
    pub default: Option<Value>,
    pub description: Option<String>,
}

impl FunctionParam {
    pub fn new(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            description: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Metadata describing a caller-supplied callable the model may pick.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub params: Vec<FunctionParam>,
}

impl FunctionDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            params: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Appends one parameter definition.
    pub fn with_param(mut self, param: FunctionParam) -> Self {
        self.params.push(param);
        self
    }

    /// Shorthand for an undocumented parameter without default.
    pub fn param(self, name: impl Into<String>, kind: ParamType) -> Self {
        self.with_param(FunctionParam::new(name, kind))
    }

    pub fn find_param(&self, name: &str) -> Option<&FunctionParam> {
        self.params.iter().find(|param| param.name == name)
    }

    fn to_schema(&self) -> Value {
        let mut params = Map::new();
        for param in &self.params {
            let mut param_def = Map::new();
            param_def.insert(
                "type".to_string(),
                Value::String(param.kind.as_str().to_string()),
            );
            param_def.insert(
                "default value".to_string(),
                param
                    .default
                    .clone()
                    .unwrap_or_else(|| Value::String("None".to_string())),
            );
            param_def.insert(
                "description".to_string(),
                Value::String(param.description.clone().unwrap_or_else(|| "None".to_string())),
            );
            params.insert(param.name.clone(), Value::Object(param_def));
        }

        let mut schema = Map::new();
        schema.insert(
            "description".to_string(),
            Value::String(self.description.clone().unwrap_or_else(|| "None".to_string())),
        );
        schema.insert("parameters".to_string(), Value::Object(params));
        Value::Object(schema)
    }
}

/// Serializes the candidate list into the JSON text block inserted into the prompt.
pub fn render_schema(functions: &[FunctionDescriptor]) -> String {
    let mut schema = Map::new();
    for function in functions {
        schema.insert(function.name.clone(), function.to_schema());
    }
    Value::Object(schema).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn distance() -> FunctionDescriptor {
        FunctionDescriptor::new("get_distance")
            .with_description("Calculates the distance between two points.")
            .with_param(
                FunctionParam::new("lat1", ParamType::Number).with_description("latitude of point 1"),
            )
            .with_param(FunctionParam::new("unit", ParamType::String).with_default("km"))
    }

    #[test]
    fn schema_lists_functions_in_declaration_order() {
        let rendered = render_schema(&[
            FunctionDescriptor::new("get_time"),
            distance(),
        ]);
        let value: Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(
            value["get_time"],
            json!({"description": "None", "parameters": {}})
        );
        assert_eq!(
            value["get_distance"]["parameters"]["lat1"],
            json!({"type": "number", "default value": "None", "description": "latitude of point 1"})
        );
        assert_eq!(
            value["get_distance"]["parameters"]["unit"]["default value"],
            json!("km")
        );
        assert!(rendered.find("get_time").unwrap() < rendered.find("get_distance").unwrap());
    }

    #[test]
    fn integer_cast_accepts_numeric_strings() {
        assert_eq!(ParamType::Integer.cast(json!("500")), json!(500));
        assert_eq!(ParamType::Integer.cast(json!("7.0")), json!(7));
        assert_eq!(ParamType::Integer.cast(json!(3.0)), json!(3));
        assert_eq!(ParamType::Integer.cast(json!("many")), json!("many"));
    }

    #[test]
    fn integer_cast_keeps_values_outside_i64() {
        assert_eq!(ParamType::Integer.cast(json!("1e30")), json!("1e30"));
        assert_eq!(
            ParamType::Integer.cast(json!("99999999999999999999")),
            json!("99999999999999999999")
        );
        assert_eq!(ParamType::Integer.cast(json!(1e30)), json!(1e30));
        assert_eq!(ParamType::Integer.cast(json!("-1e3")), json!(-1000));
        assert_eq!(ParamType::Integer.cast(json!(u64::MAX)), json!(u64::MAX));
        assert_eq!(ParamType::Integer.cast(json!("NaN")), json!("NaN"));
    }

    #[test]
    fn other_casts_are_best_effort() {
        assert_eq!(ParamType::Number.cast(json!("2.5")), json!(2.5));
        assert_eq!(ParamType::Boolean.cast(json!("True")), json!(true));
        assert_eq!(ParamType::String.cast(json!(42)), json!("42"));
        assert_eq!(ParamType::Array.cast(json!("[1,2]")), json!([1, 2]));
        assert_eq!(ParamType::Object.cast(json!("nope")), json!("nope"));
        assert_eq!(ParamType::Any.cast(json!({"a": 1})), json!({"a": 1}));
    }

    #[test]
    fn find_param_by_name() {
        let function = distance();
        assert_eq!(function.find_param("unit").unwrap().kind, ParamType::String);
        assert!(function.find_param("lon1").is_none());
    }
}
