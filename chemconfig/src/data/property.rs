use std::{collections::BTreeSet, fmt, str::FromStr};

use serde_json::Value;

use crate::data::schema::SchemaError;

/// JSON value types a schema can allow for a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeTag {
    /// `null`
    Null,
    /// `boolean`
    Boolean,
    /// `integer`, a number without fractional part.
    Integer,
    /// `number`
    Number,
    /// `string`
    String,
    /// `array`
    Array,
    /// `object`
    Object,
}

impl TypeTag {
    /// Schema keyword for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Null => "null",
            TypeTag::Boolean => "boolean",
            TypeTag::Integer => "integer",
            TypeTag::Number => "number",
            TypeTag::String => "string",
            TypeTag::Array => "array",
            TypeTag::Object => "object",
        }
    }

    /// The most specific tag describing `value`.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => TypeTag::Null,
            Value::Bool(_) => TypeTag::Boolean,
            Value::Number(n) if is_integral(n) => TypeTag::Integer,
            Value::Number(_) => TypeTag::Number,
            Value::String(_) => TypeTag::String,
            Value::Array(_) => TypeTag::Array,
            Value::Object(_) => TypeTag::Object,
        }
    }

    /// Whether `value` is an instance of this type.
    ///
    /// Follows JSON Schema: every integer is also a `number`, and a float
    /// with zero fractional part counts as an `integer`.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (TypeTag::Null, Value::Null) => true,
            (TypeTag::Boolean, Value::Bool(_)) => true,
            (TypeTag::Integer, Value::Number(n)) => is_integral(n),
            (TypeTag::Number, Value::Number(_)) => true,
            (TypeTag::String, Value::String(_)) => true,
            (TypeTag::Array, Value::Array(_)) => true,
            (TypeTag::Object, Value::Object(_)) => true,
            _ => false,
        }
    }

    /// Read the `type` keyword of a schema node.
    ///
    /// Accepts a single type name or an array of names; unknown names are skipped.
    /// A node without `type` yields an empty set, meaning unconstrained.
    pub fn set_from_schema(node: &Value) -> BTreeSet<TypeTag> {
        match node.get("type") {
            Some(Value::String(s)) => s.parse::<TypeTag>().into_iter().collect(),
            Some(Value::Array(arr)) => arr
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|s| s.parse::<TypeTag>().ok())
                .collect(),
            _ => BTreeSet::new(),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeTag {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = match s {
            "null" => TypeTag::Null,
            "boolean" => TypeTag::Boolean,
            "integer" => TypeTag::Integer,
            "number" => TypeTag::Number,
            "string" => TypeTag::String,
            "array" => TypeTag::Array,
            "object" => TypeTag::Object,
            other => return Err(SchemaError::Invalid(format!("unknown type {other:?}"))),
        };
        Ok(tag)
    }
}

fn is_integral(n: &serde_json::Number) -> bool {
    n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
}

/// Check `value` against an allowed-types set and an optional `enum` list.
///
/// An empty type set accepts any value.
pub fn check_value(
    types: &BTreeSet<TypeTag>,
    choices: Option<&[Value]>,
    value: &Value,
    path: &str,
) -> Result<(), SchemaError> {
    if !types.is_empty() && !types.iter().any(|t| t.accepts(value)) {
        return Err(SchemaError::TypeMismatch {
            path: path.to_string(),
            expected: join_types(types),
            actual: format!("{} {}", TypeTag::of(value), value),
        });
    }

    if let Some(choices) = choices
        && !choices.contains(value)
    {
        return Err(SchemaError::TypeMismatch {
            path: path.to_string(),
            expected: format!("one of: {}", Value::Array(choices.to_vec())),
            actual: format!("{}", value),
        });
    }

    Ok(())
}

/// Empty value used when a section's default is `null` but `null` is not allowed.
///
/// Checks `string`, then `object`, then `array`. Returns `None` when `null` is
/// allowed or none of those types applies.
pub fn empty_value_for(types: &BTreeSet<TypeTag>) -> Option<Value> {
    if types.contains(&TypeTag::Null) {
        return None;
    }
    if types.contains(&TypeTag::String) {
        Some(Value::String(String::new()))
    } else if types.contains(&TypeTag::Object) {
        Some(Value::Object(serde_json::Map::new()))
    } else if types.contains(&TypeTag::Array) {
        Some(Value::Array(Vec::new()))
    } else {
        None
    }
}

fn join_types(types: &BTreeSet<TypeTag>) -> String {
    types
        .iter()
        .map(TypeTag::as_str)
        .collect::<Vec<_>>()
        .join(" | ")
}
