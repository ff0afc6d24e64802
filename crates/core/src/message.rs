use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

pub const ARG_TYPE_STRING: &str = "string";
pub const ARG_TYPE_INT: &str = "int";
pub const ARG_TYPE_FLOAT: &str = "float";
pub const ARG_TYPE_BOOL: &str = "bool";

/// A single typed argument. Values stay string-encoded; the type tag travels
/// beside them and comparisons never coerce to numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Argument {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(deserialize_with = "scalar_as_string")]
    pub value: String,
}

/// Config files often carry unquoted numbers or booleans as argument values.
/// Unquoted floats are encoded like [`Argument::float`]; quoted values are kept as written.
fn scalar_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(s) => s,
        Scalar::Int(i) => i.to_string(),
        Scalar::Float(f) => format_float(f),
        Scalar::Bool(b) => b.to_string(),
    })
}

fn format_float(value: f64) -> String {
    format!("{value:.6}")
}

impl Argument {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ARG_TYPE_STRING, value)
    }

    pub fn int(value: i64) -> Self {
        Self::new(ARG_TYPE_INT, value.to_string())
    }

    pub fn float(value: f64) -> Self {
        Self::new(ARG_TYPE_FLOAT, format_float(value))
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ARG_TYPE_BOOL, value.to_string())
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Argument({}:{})", self.kind, self.value)
    }
}

/// An addressed message. Equality is structural: same address and the same
/// ordered (type, value) pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    pub address: String,
    #[serde(default)]
    pub arguments: Vec<Argument>,
}

impl Message {
    pub fn new(address: impl Into<String>, arguments: Vec<Argument>) -> Self {
        Self {
            address: address.into(),
            arguments,
        }
    }

    /// Return this message as seen through a source prefix.
    ///
    /// An empty prefix leaves the address untouched, otherwise the effective
    /// address is `"{prefix}/{address}"`.
    pub fn with_prefix(self, prefix: &str) -> Self {
        if prefix.is_empty() {
            return self;
        }
        Self {
            address: format!("{}/{}", prefix, self.address),
            arguments: self.arguments,
        }
    }

    pub fn argument(&self, index: usize) -> Option<&Argument> {
        self.arguments.get(index)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self.arguments.iter().map(ToString::to_string).collect();
        write!(
            f,
            "Message(address: {}, arguments: [{}])",
            self.address,
            args.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_structural() {
        let a = Message::new("/ch/01/mix/on", vec![Argument::int(1)]);
        let b = Message::new("/ch/01/mix/on", vec![Argument::new("int", "1")]);
        assert_eq!(a, b);

        let other_type = Message::new("/ch/01/mix/on", vec![Argument::string("1")]);
        assert_ne!(a, other_type);

        let extra_arg = Message::new("/ch/01/mix/on", vec![Argument::int(1), Argument::int(2)]);
        assert_ne!(a, extra_arg);
    }

    #[test]
    fn prefix_is_applied_with_slash() {
        let msg = Message::new("/ch/01", vec![]).with_prefix("x32");
        assert_eq!(msg.address, "x32//ch/01");

        let unprefixed = Message::new("/ch/01", vec![]).with_prefix("");
        assert_eq!(unprefixed.address, "/ch/01");
    }

    #[test]
    fn unquoted_values_deserialize_as_strings() {
        let args: Vec<Argument> =
            serde_json::from_str(r#"[{"type":"int","value":7},{"type":"bool","value":true}]"#)
                .unwrap();
        assert_eq!(args, vec![Argument::int(7), Argument::bool(true)]);
    }

    #[test]
    fn unquoted_floats_match_constructed_floats() {
        let args: Vec<Argument> =
            serde_json::from_str(r#"[{"type":"float","value":0.5},{"type":"float","value":1.0}]"#)
                .unwrap();
        assert_eq!(args, vec![Argument::float(0.5), Argument::float(1.0)]);
        assert_eq!(args[1].value, "1.000000");

        let yaml: Vec<Argument> = serde_yaml::from_str("- {type: float, value: 0.75}").unwrap();
        assert_eq!(yaml, vec![Argument::float(0.75)]);
    }

    #[test]
    fn display_lists_arguments() {
        let msg = Message::new("/a", vec![Argument::string("x"), Argument::bool(true)]);
        assert_eq!(
            msg.to_string(),
            "Message(address: /a, arguments: [Argument(string:x), Argument(bool:true)])"
        );
    }
}
