use serde_json::Value;

use super::error::DispatchError;
use super::schema::{ParamType, ToolSchema};

const TRUE_LITERALS: &[&str] = &["true", "True", "TRUE", "1", "yes", "Yes", "YES", "on", "On", "ON"];
const FALSE_LITERALS: &[&str] =
    &["false", "False", "FALSE", "0", "no", "No", "NO", "off", "Off", "OFF"];

/// `nil`, empty string, empty array, or empty typed slice for any
/// required key fails validation.
pub fn validate_required(schema: &ToolSchema, args: &Value) -> Result<(), DispatchError> {
    for key in schema.required {
        match args.get(key) {
            None | Some(Value::Null) => {
                return Err(DispatchError::Validation(format!("missing required argument: {key}")))
            }
            Some(Value::String(s)) if s.is_empty() => {
                return Err(DispatchError::Validation(format!("required argument is empty: {key}")))
            }
            Some(Value::Array(a)) if a.is_empty() => {
                return Err(DispatchError::Validation(format!("required argument is empty: {key}")))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Coerces every declared parameter present in `args` to its schema
/// type, returning the coerced object. Keys with no declared type pass
/// through unchanged.
pub fn coerce_args(schema: &ToolSchema, args: &Value) -> Result<Value, DispatchError> {
    let obj = args.as_object().ok_or_else(|| DispatchError::Validation("arguments must be a JSON object".into()))?;
    let mut out = serde_json::Map::new();

    for (key, value) in obj {
        let coerced = match schema.param_type(key) {
            Some(ParamType::Bool) => Value::Bool(coerce_bool(value)?),
            Some(ParamType::Int) => Value::Number(coerce_int(value)?.into()),
            Some(ParamType::Float) => {
                serde_json::Number::from_f64(coerce_float(value)?).map(Value::Number).unwrap_or(Value::Null)
            }
            Some(ParamType::String) => Value::String(coerce_string(value)),
            Some(ParamType::StringArray) => Value::Array(
                coerce_string_array(value)?.into_iter().map(Value::String).collect(),
            ),
            None => value.clone(),
        };
        out.insert(key.clone(), coerced);
    }

    Ok(Value::Object(out))
}

fn coerce_bool(value: &Value) -> Result<bool, DispatchError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().unwrap_or(0.0) != 0.0),
        Value::String(s) if TRUE_LITERALS.contains(&s.as_str()) => Ok(true),
        Value::String(s) if FALSE_LITERALS.contains(&s.as_str()) => Ok(false),
        other => Err(DispatchError::Validation(format!("cannot coerce {other} to bool"))),
    }
}

fn coerce_int(value: &Value) -> Result<i64, DispatchError> {
    match value {
        Value::Number(n) if n.is_i64() => Ok(n.as_i64().unwrap()),
        Value::Number(n) if n.is_u64() => Ok(n.as_u64().unwrap() as i64),
        Value::Number(n) => Ok(n.as_f64().unwrap_or(0.0).trunc() as i64),
        Value::String(s) => s
            .parse::<f64>()
            .map(|f| f.trunc() as i64)
            .map_err(|_| DispatchError::Validation(format!("cannot coerce \"{s}\" to int"))),
        other => Err(DispatchError::Validation(format!("cannot coerce {other} to int"))),
    }
}

fn coerce_float(value: &Value) -> Result<f64, DispatchError> {
    match value {
        Value::Number(n) => Ok(n.as_f64().unwrap_or(0.0)),
        Value::String(s) => {
            s.parse::<f64>().map_err(|_| DispatchError::Validation(format!("cannot coerce \"{s}\" to float")))
        }
        other => Err(DispatchError::Validation(format!("cannot coerce {other} to float"))),
    }
}

fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Coerces any array to a string array, dropping elements that stringify
/// to an empty string.
fn coerce_string_array(value: &Value) -> Result<Vec<String>, DispatchError> {
    let arr = value
        .as_array()
        .ok_or_else(|| DispatchError::Validation("expected a JSON array".into()))?;
    Ok(arr
        .iter()
        .map(coerce_string)
        .filter(|s| !s.is_empty())
        .collect())
}
