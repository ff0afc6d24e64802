//! Checks raw condition/task parameters against a small declarative schema.

use regex::Regex;
use serde_json::Value;

use oscbridge_core::Parameters;

use crate::error::ParamError;

/// Accepted shape of a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Int,
    Float,
    Bool,
    List,
    Map,
}

impl ParamKind {
    fn of(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(n) if n.is_i64() || n.is_u64() => "int",
            Value::Number(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "list",
            Value::Object(_) => "map",
        }
    }

    fn name(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Int => "int",
            ParamKind::Float => "float",
            ParamKind::Bool => "bool",
            ParamKind::List => "list",
            ParamKind::Map => "map",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Int => value.is_i64() || value.is_u64(),
            ParamKind::Float => value.is_number(),
            ParamKind::Bool => value.is_boolean(),
            ParamKind::List => value.is_array(),
            ParamKind::Map => value.is_object(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParameterDefinition {
    pub name: &'static str,
    pub optional: bool,
    /// Used when an optional parameter is absent.
    pub default: Option<Value>,
    /// Must match string values when set.
    pub pattern: Option<&'static str>,
    pub kinds: &'static [ParamKind],
}

impl ParameterDefinition {
    pub fn required(name: &'static str, kinds: &'static [ParamKind]) -> Self {
        Self {
            name,
            optional: false,
            default: None,
            pattern: None,
            kinds,
        }
    }

    pub fn optional(name: &'static str, kinds: &'static [ParamKind], default: Option<Value>) -> Self {
        Self {
            name,
            optional: true,
            default,
            pattern: None,
            kinds,
        }
    }

    pub fn with_pattern(mut self, pattern: &'static str) -> Self {
        self.pattern = Some(pattern);
        self
    }
}

/// Parameters that passed [`sanitize`]; only declared names are present.
#[derive(Debug, Clone, Default)]
pub struct Sanitized(Parameters);

impl Sanitized {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    fn wrong_type(&self, name: &str, expected: &str) -> ParamError {
        ParamError::WrongType {
            name: name.to_string(),
            found: self.get(name).map_or("null", ParamKind::of).to_string(),
            expected: expected.to_string(),
        }
    }

    pub fn string(&self, name: &str) -> Result<String, ParamError> {
        self.get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| self.wrong_type(name, "string"))
    }

    pub fn opt_string(&self, name: &str) -> Result<Option<String>, ParamError> {
        match self.get(name) {
            None => Ok(None),
            Some(_) => self.string(name).map(Some),
        }
    }

    pub fn bool(&self, name: &str) -> Result<bool, ParamError> {
        self.get(name)
            .and_then(Value::as_bool)
            .ok_or_else(|| self.wrong_type(name, "bool"))
    }

    pub fn int(&self, name: &str) -> Result<i64, ParamError> {
        self.get(name)
            .and_then(Value::as_i64)
            .ok_or_else(|| self.wrong_type(name, "int"))
    }

    pub fn uint(&self, name: &str) -> Result<u64, ParamError> {
        self.get(name)
            .and_then(Value::as_u64)
            .ok_or_else(|| self.wrong_type(name, "non-negative int"))
    }

    /// A list parameter; absent optional lists read as empty.
    pub fn list(&self, name: &str) -> Result<&[Value], ParamError> {
        match self.get(name) {
            None => Ok(&[]),
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(self.wrong_type(name, "list")),
        }
    }

    /// String list where scalar items are stringified.
    pub fn string_list(&self, name: &str) -> Result<Vec<String>, ParamError> {
        self.list(name)?
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                Value::Bool(b) => Ok(b.to_string()),
                _ => Err(ParamError::WrongType {
                    name: name.to_string(),
                    found: ParamKind::of(item).to_string(),
                    expected: "list of scalars".to_string(),
                }),
            })
            .collect()
    }
}

/// Verify `parameters` against `definitions` and fill in defaults.
pub fn sanitize(
    parameters: &Parameters,
    definitions: &[ParameterDefinition],
) -> Result<Sanitized, ParamError> {
    let mut sanitized = Parameters::new();

    for def in definitions {
        let Some(value) = parameters.get(def.name).filter(|v| !v.is_null()) else {
            if !def.optional {
                return Err(ParamError::Missing {
                    name: def.name.to_string(),
                });
            }
            sanitized.insert(def.name.to_string(), def.default.clone().unwrap_or(Value::Null));
            continue;
        };

        if !def.kinds.iter().any(|kind| kind.accepts(value)) {
            let expected: Vec<&str> = def.kinds.iter().map(|k| k.name()).collect();
            return Err(ParamError::WrongType {
                name: def.name.to_string(),
                found: ParamKind::of(value).to_string(),
                expected: expected.join(", "),
            });
        }

        if let (Some(pattern), Some(text)) = (def.pattern, value.as_str()) {
            let re = Regex::new(pattern).map_err(|_| ParamError::BadPattern {
                name: def.name.to_string(),
                pattern: pattern.to_string(),
            })?;
            if !re.is_match(text) {
                return Err(ParamError::Mismatch {
                    name: def.name.to_string(),
                    pattern: pattern.to_string(),
                });
            }
        }

        sanitized.insert(def.name.to_string(), value.clone());
    }

    Ok(Sanitized(sanitized))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Parameters {
        match value {
            Value::Object(map) => map,
            _ => panic!("test parameters must be an object"),
        }
    }

    fn defs() -> Vec<ParameterDefinition> {
        vec![
            ParameterDefinition::required("address", &[ParamKind::String]),
            ParameterDefinition::optional("mode", &[ParamKind::String], Some(json!("eq")))
                .with_pattern("^(eq|regexp)$"),
            ParameterDefinition::optional("count", &[ParamKind::Int], None),
        ]
    }

    #[test]
    fn fills_defaults_and_drops_unknown_keys() {
        let sanitized = sanitize(&params(json!({"address": "/a", "extra": 1})), &defs()).unwrap();
        assert_eq!(sanitized.string("address").unwrap(), "/a");
        assert_eq!(sanitized.string("mode").unwrap(), "eq");
        assert!(sanitized.get("count").is_none());
        assert!(sanitized.get("extra").is_none());
    }

    #[test]
    fn missing_required_parameter() {
        let err = sanitize(&Parameters::new(), &defs()).unwrap_err();
        assert_eq!(err.to_string(), "parameter 'address' is not specified");
    }

    #[test]
    fn wrong_type_is_reported_with_allowed_types() {
        let err = sanitize(&params(json!({"address": 5})), &defs()).unwrap_err();
        assert_eq!(
            err,
            ParamError::WrongType {
                name: "address".into(),
                found: "int".into(),
                expected: "string".into(),
            }
        );
    }

    #[test]
    fn pattern_must_match() {
        let err = sanitize(&params(json!({"address": "/a", "mode": "fuzzy"})), &defs()).unwrap_err();
        assert!(matches!(err, ParamError::Mismatch { .. }));
    }

    #[test]
    fn floats_are_not_ints() {
        let err = sanitize(&params(json!({"address": "/a", "count": 1.5})), &defs()).unwrap_err();
        assert!(matches!(err, ParamError::WrongType { .. }));

        let ok = sanitize(&params(json!({"address": "/a", "count": 3})), &defs()).unwrap();
        assert_eq!(ok.int("count").unwrap(), 3);
    }

    #[test]
    fn string_lists_accept_scalars() {
        let defs = [ParameterDefinition::optional("args", &[ParamKind::List], None)];
        let sanitized = sanitize(&params(json!({"args": ["-l", 2, true]})), &defs).unwrap();
        assert_eq!(sanitized.string_list("args").unwrap(), vec!["-l", "2", "true"]);

        let empty = sanitize(&Parameters::new(), &defs).unwrap();
        assert!(empty.string_list("args").unwrap().is_empty());
    }
}
