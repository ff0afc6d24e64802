//! The `osc_match` leaf: looks a message up in the store and checks its
//! arguments.
//!
//! Argument values are compared as strings. `<`, `<=`, `>` and `>=` are
//! lexicographic, so `"9" > "10"`.

use std::fmt;

use regex::Regex;
use serde_json::{json, Value};

use oscbridge_core::{EvaluationContext, Message, Parameters};

use super::Condition;
use crate::error::{EvaluationError, ParamError, ValidationError};
use crate::params::{sanitize, ParamKind, ParameterDefinition, Sanitized};
use crate::tracker::ConditionTracker;

const ADDRESS_KEY: &str = "address";
const ADDRESS_MATCH_TYPE_KEY: &str = "address_match_type";
const TRIGGER_ON_CHANGE_KEY: &str = "trigger_on_change";
const ARGUMENTS_KEY: &str = "arguments";

const ARG_INDEX_KEY: &str = "index";
const ARG_TYPE_KEY: &str = "type";
const ARG_VALUE_KEY: &str = "value";
const ARG_VALUE_MATCH_TYPE_KEY: &str = "value_match_type";

/// How a stored argument value is compared with the expected one.
#[derive(Debug, Clone)]
pub enum ValueMatch {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Regexp(Regex),
}

impl ValueMatch {
    fn parse(op: &str, expected: &str) -> Result<Self, String> {
        Ok(match op {
            "=" => ValueMatch::Eq,
            "!=" => ValueMatch::NotEq,
            "<" => ValueMatch::Lt,
            "<=" => ValueMatch::Lte,
            ">" => ValueMatch::Gt,
            ">=" => ValueMatch::Gte,
            "regexp" => ValueMatch::Regexp(Regex::new(expected).map_err(|e| {
                format!("failed to compile value regexp: {}: {}", expected, e)
            })?),
            other => return Err(format!("unknown value match type '{}'", other)),
        })
    }

    fn symbol(&self) -> &'static str {
        match self {
            ValueMatch::Eq => "=",
            ValueMatch::NotEq => "!=",
            ValueMatch::Lt => "<",
            ValueMatch::Lte => "<=",
            ValueMatch::Gt => ">",
            ValueMatch::Gte => ">=",
            ValueMatch::Regexp(_) => "regexp",
        }
    }

    pub fn matches(&self, actual: &str, expected: &str) -> bool {
        match self {
            ValueMatch::Eq => actual == expected,
            ValueMatch::NotEq => actual != expected,
            ValueMatch::Lt => actual < expected,
            ValueMatch::Lte => actual <= expected,
            ValueMatch::Gt => actual > expected,
            ValueMatch::Gte => actual >= expected,
            ValueMatch::Regexp(re) => re.is_match(actual),
        }
    }
}

/// Expectation on a single argument of the matched message.
#[derive(Debug, Clone)]
pub struct ArgumentCondition {
    pub index: usize,
    pub kind: String,
    pub value: String,
    pub value_match: ValueMatch,
}

impl ArgumentCondition {
    /// Missing arguments and type mismatches never match.
    pub fn matches(&self, message: &Message) -> bool {
        match message.argument(self.index) {
            Some(arg) if arg.kind == self.kind => self.value_match.matches(&arg.value, &self.value),
            _ => false,
        }
    }
}

impl fmt::Display for ArgumentCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ArgumentCondition(type: {}, value: {}, matchType: {})",
            self.kind,
            self.value,
            self.value_match.symbol()
        )
    }
}

#[derive(Debug, Clone)]
enum AddressMatch {
    Exact(String),
    Regexp(Regex),
}

impl AddressMatch {
    fn pattern(&self) -> &str {
        match self {
            AddressMatch::Exact(address) => address,
            AddressMatch::Regexp(re) => re.as_str(),
        }
    }
}

#[derive(Debug, Clone)]
struct MatchParams {
    address: AddressMatch,
    trigger_on_change: bool,
    arguments: Vec<ArgumentCondition>,
}

/// Matches when a record exists for the configured address (exact or regexp)
/// and all argument conditions hold.
#[derive(Debug)]
pub struct MatchCondition {
    path: String,
    params: Option<Result<MatchParams, ValidationError>>,
    children: usize,
    tracker: ConditionTracker,
}

fn definitions() -> Vec<ParameterDefinition> {
    vec![
        ParameterDefinition::required(ADDRESS_KEY, &[ParamKind::String]),
        ParameterDefinition::optional(ADDRESS_MATCH_TYPE_KEY, &[ParamKind::String], Some(json!("eq")))
            .with_pattern("^(eq|regexp)$"),
        ParameterDefinition::optional(TRIGGER_ON_CHANGE_KEY, &[ParamKind::Bool], Some(json!(true))),
        ParameterDefinition::optional(ARGUMENTS_KEY, &[ParamKind::List], None),
    ]
}

fn argument_definitions() -> Vec<ParameterDefinition> {
    vec![
        ParameterDefinition::required(ARG_INDEX_KEY, &[ParamKind::Int]),
        ParameterDefinition::required(ARG_TYPE_KEY, &[ParamKind::String])
            .with_pattern("^(string|int|float|bool)$"),
        ParameterDefinition::required(ARG_VALUE_KEY, &[ParamKind::String]),
        ParameterDefinition::optional(ARG_VALUE_MATCH_TYPE_KEY, &[ParamKind::String], Some(json!("=")))
            .with_pattern("^(=|!=|<|<=|>|>=|regexp)$"),
    ]
}

impl MatchCondition {
    pub fn new(path: String, tracker: ConditionTracker) -> Self {
        Self {
            path,
            params: None,
            children: 0,
            tracker,
        }
    }

    fn param_error(&self, source: ParamError) -> ValidationError {
        ValidationError::Parameter {
            path: self.path.clone(),
            source,
        }
    }

    fn invalid(&self, reason: String) -> ValidationError {
        ValidationError::Invalid {
            path: self.path.clone(),
            reason,
        }
    }

    fn parse(&self, parameters: &Parameters) -> Result<MatchParams, ValidationError> {
        let sanitized = sanitize(parameters, &definitions()).map_err(|e| self.param_error(e))?;

        let address = sanitized.string(ADDRESS_KEY).map_err(|e| self.param_error(e))?;
        let address = match sanitized
            .string(ADDRESS_MATCH_TYPE_KEY)
            .map_err(|e| self.param_error(e))?
            .as_str()
        {
            "regexp" => AddressMatch::Regexp(Regex::new(&address).map_err(|e| {
                self.invalid(format!("{} is not a valid regexp: {}", ADDRESS_KEY, e))
            })?),
            _ => AddressMatch::Exact(address),
        };

        let trigger_on_change = sanitized
            .bool(TRIGGER_ON_CHANGE_KEY)
            .map_err(|e| self.param_error(e))?;

        let arguments = sanitized
            .list(ARGUMENTS_KEY)
            .map_err(|e| self.param_error(e))?
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                self.parse_argument(raw)
                    .map_err(|reason| self.invalid(format!("argument[{}]: {}", i, reason)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MatchParams {
            address,
            trigger_on_change,
            arguments,
        })
    }

    fn parse_argument(&self, raw: &Value) -> Result<ArgumentCondition, String> {
        let Value::Object(map) = raw else {
            return Err("failed to cast supplied arguments".to_string());
        };
        let sanitized: Sanitized =
            sanitize(map, &argument_definitions()).map_err(|e| e.to_string())?;

        let index = sanitized.uint(ARG_INDEX_KEY).map_err(|e| e.to_string())?;
        let index = usize::try_from(index).map_err(|e| e.to_string())?;
        let kind = sanitized.string(ARG_TYPE_KEY).map_err(|e| e.to_string())?;
        let value = sanitized.string(ARG_VALUE_KEY).map_err(|e| e.to_string())?;
        let op = sanitized
            .string(ARG_VALUE_MATCH_TYPE_KEY)
            .map_err(|e| e.to_string())?;
        let value_match = ValueMatch::parse(&op, &value)?;

        Ok(ArgumentCondition {
            index,
            kind,
            value,
            value_match,
        })
    }
}

impl Condition for MatchCondition {
    fn kind(&self) -> &'static str {
        "MATCH"
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn set_parameters(&mut self, parameters: &Parameters) {
        self.params = Some(self.parse(parameters));
    }

    fn add_child(&mut self, _child: Box<dyn Condition>) {
        self.children += 1;
    }

    fn evaluate(&self, ctx: &EvaluationContext) -> Result<bool, EvaluationError> {
        let Some(Ok(params)) = &self.params else {
            return Err(EvaluationError::Condition {
                path: self.path.clone(),
                reason: "node is not configured".to_string(),
            });
        };

        let record = match &params.address {
            AddressMatch::Exact(address) => ctx.get_record(address, params.trigger_on_change),
            AddressMatch::Regexp(re) => ctx.find_one_matching(re, params.trigger_on_change),
        };
        let Some(record) = record else {
            let how = match params.address {
                AddressMatch::Exact(_) => "exact match",
                AddressMatch::Regexp(_) => "regexp",
            };
            return Ok(self.tracker.result(
                false,
                &self.path,
                format_args!("record not found by {} on address: {}", how, params.address.pattern()),
            ));
        };

        for (i, argument) in params.arguments.iter().enumerate() {
            if !argument.matches(record.message()) {
                return Ok(self.tracker.result(
                    false,
                    &self.path,
                    format_args!("argument {} did not match '{}'", i, argument),
                ));
            }
        }

        Ok(self.tracker.result(true, &self.path, "all checks passed"))
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.children > 0 {
            return Err(ValidationError::UnexpectedChildren {
                path: self.path.clone(),
            });
        }
        match &self.params {
            None => Err(ValidationError::Unconfigured {
                path: self.path.clone(),
            }),
            Some(Err(e)) => Err(e.clone()),
            Some(Ok(_)) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oscbridge_core::{Argument, FactStore};

    fn node(params: Value) -> MatchCondition {
        let mut node = MatchCondition::new("a/osc_match:0".into(), ConditionTracker::new(true));
        let Value::Object(map) = params else {
            panic!("parameters must be an object");
        };
        node.set_parameters(&map);
        node
    }

    fn ctx_watching(messages: &[Message], watched: &Message) -> EvaluationContext {
        let store = FactStore::new();
        for m in messages {
            store.set_record(m.clone());
        }
        EvaluationContext::watching(store, watched.clone())
    }

    fn string_arg(address: &str, value: &str) -> Message {
        Message::new(address, vec![Argument::string(value)])
    }

    #[test]
    fn exact_address_match_counts_watched_access() {
        let m = Message::new("/ch/01/mix/on", vec![Argument::int(0)]);
        let ctx = ctx_watching(&[m.clone()], &m);

        let cond = node(json!({"address": "/ch/01/mix/on"}));
        assert!(cond.validate().is_ok());
        assert!(cond.evaluate(&ctx).unwrap());
        assert_eq!(ctx.watched_record_accesses(), 1);
    }

    #[test]
    fn missing_record_is_false_not_error() {
        let ctx = ctx_watching(&[], &string_arg("/x", "1"));
        let cond = node(json!({"address": "/nothing/here"}));
        assert!(!cond.evaluate(&ctx).unwrap());
    }

    #[test]
    fn trigger_on_change_false_does_not_track() {
        let m = string_arg("/a", "1");
        let ctx = ctx_watching(&[m.clone()], &m);
        let cond = node(json!({"address": "/a", "trigger_on_change": false}));
        assert!(cond.evaluate(&ctx).unwrap());
        assert_eq!(ctx.watched_record_accesses(), 0);
    }

    #[test]
    fn regexp_address_match() {
        let m = string_arg("/ch/07/mix/on", "1");
        let ctx = ctx_watching(&[m.clone()], &m);
        let cond = node(json!({"address": r"^/ch/\d+/mix/on$", "address_match_type": "regexp"}));
        assert!(cond.evaluate(&ctx).unwrap());
        assert_eq!(ctx.watched_record_accesses(), 1);
    }

    #[test]
    fn relational_comparisons_are_lexicographic() {
        let m = string_arg("/v", "9");
        let ctx = ctx_watching(&[m.clone()], &m);

        let lte = node(json!({"address": "/v", "arguments": [
            {"index": 0, "type": "string", "value": "10", "value_match_type": "<="}
        ]}));
        assert!(!lte.evaluate(&ctx).unwrap());

        let gt = node(json!({"address": "/v", "arguments": [
            {"index": 0, "type": "string", "value": "10", "value_match_type": ">"}
        ]}));
        assert!(gt.evaluate(&ctx).unwrap());
    }

    #[test]
    fn every_operator() {
        let cases = [
            ("=", "b", true),
            ("=", "a", false),
            ("!=", "a", true),
            ("!=", "b", false),
            ("<", "c", true),
            ("<", "b", false),
            ("<=", "b", true),
            ("<=", "a", false),
            (">", "a", true),
            (">", "b", false),
            (">=", "b", true),
            (">=", "c", false),
            ("regexp", "^[a-c]$", true),
            ("regexp", "^z", false),
        ];
        let m = string_arg("/v", "b");
        let ctx = ctx_watching(&[m.clone()], &m);
        for (op, expected, result) in cases {
            let cond = node(json!({"address": "/v", "arguments": [
                {"index": 0, "type": "string", "value": expected, "value_match_type": op}
            ]}));
            assert_eq!(cond.evaluate(&ctx).unwrap(), result, "{} {}", op, expected);
        }
    }

    #[test]
    fn missing_index_or_wrong_type_does_not_match() {
        let m = Message::new("/v", vec![Argument::int(1)]);
        let ctx = ctx_watching(&[m.clone()], &m);

        let out_of_range = node(json!({"address": "/v", "arguments": [
            {"index": 1, "type": "int", "value": "1"}
        ]}));
        assert!(!out_of_range.evaluate(&ctx).unwrap());

        let wrong_type = node(json!({"address": "/v", "arguments": [
            {"index": 0, "type": "string", "value": "1"}
        ]}));
        assert!(!wrong_type.evaluate(&ctx).unwrap());

        let right = node(json!({"address": "/v", "arguments": [
            {"index": 0, "type": "int", "value": "1"}
        ]}));
        assert!(right.evaluate(&ctx).unwrap());
    }

    #[test]
    fn bad_parameters_surface_in_validate() {
        let missing = node(json!({}));
        assert!(matches!(missing.validate(), Err(ValidationError::Parameter { .. })));

        let bad_regexp = node(json!({"address": "(", "address_match_type": "regexp"}));
        assert!(matches!(bad_regexp.validate(), Err(ValidationError::Invalid { .. })));

        let bad_op = node(json!({"address": "/a", "arguments": [
            {"index": 0, "type": "string", "value": "x", "value_match_type": "~"}
        ]}));
        assert!(bad_op.validate().is_err());

        let bad_type = node(json!({"address": "/a", "arguments": [
            {"index": 0, "type": "blob", "value": "x"}
        ]}));
        assert!(bad_type.validate().is_err());

        let bad_value_regexp = node(json!({"address": "/a", "arguments": [
            {"index": 0, "type": "string", "value": "[", "value_match_type": "regexp"}
        ]}));
        let err = bad_value_regexp.validate().unwrap_err();
        assert!(err.to_string().contains("argument[0]"));
    }

    #[test]
    fn unconfigured_and_children_are_rejected() {
        let bare = MatchCondition::new("p".into(), ConditionTracker::default());
        assert!(matches!(bare.validate(), Err(ValidationError::Unconfigured { .. })));

        let mut parent = node(json!({"address": "/a"}));
        parent.add_child(Box::new(node(json!({"address": "/b"}))));
        assert!(matches!(parent.validate(), Err(ValidationError::UnexpectedChildren { .. })));
    }
}
