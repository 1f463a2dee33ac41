//! Common utilities and helper functions.
//!
//! Conversion of command-line text into typed values and the colored
//! rendering of sections.

use std::collections::BTreeSet;

use chemconfig::{
    Value,
    data::{TypeTag, format::format_scalar, format::parse_scalar},
};
use colored::Colorize;

/// Turns command-line text into a value that fits `types`.
///
/// The text is read as a native-format scalar first. When that reading does
/// not fit the allowed types but a string would, the raw text is kept as a
/// string, so `--value 1024` on a string property stays `"1024"`.
pub fn value_for_types(types: &BTreeSet<TypeTag>, text: &str) -> Value {
    let parsed = parse_scalar(text);
    if types.is_empty() || types.iter().any(|t| t.accepts(&parsed)) {
        return parsed;
    }
    if types.contains(&TypeTag::String) {
        return Value::String(text.to_string());
    }
    parsed
}

/// Formats one property line.
///
/// Substituted properties are highlighted and tagged.
pub fn property_line(key: &str, value: &Value, substituted: bool) -> String {
    let value = format_scalar(value);
    if substituted {
        format!(
            "   {}={} {}",
            key.yellow(),
            value.yellow(),
            "(substituted)".dimmed()
        )
    } else {
        format!("   {}={}", key.cyan(), value)
    }
}

/// Formats a section header.
pub fn section_header(name: &str, at_defaults: Option<bool>) -> String {
    let header = format!("&{name}").green().bold().to_string();
    match at_defaults {
        Some(true) => format!("{header} {}", "(defaults)".dimmed()),
        Some(false) => format!("{header} {}", "(modified)".purple()),
        None => header,
    }
}

/// Formats a list of choices, marking the current one.
pub fn choice_lines(choices: &[Value], current: Option<&Value>) -> Vec<String> {
    choices
        .iter()
        .map(|c| {
            let text = match c {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if Some(c) == current {
                format!("* {}", text.green().bold())
            } else {
                format!("  {text}")
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn types(tags: &[TypeTag]) -> BTreeSet<TypeTag> {
        tags.iter().copied().collect()
    }

    #[test]
    fn test_value_follows_types() {
        assert_eq!(value_for_types(&types(&[TypeTag::Integer]), "8"), json!(8));
        assert_eq!(
            value_for_types(&types(&[TypeTag::String]), "1024"),
            json!("1024")
        );
        assert_eq!(
            value_for_types(&types(&[TypeTag::Integer, TypeTag::Null]), "None"),
            Value::Null
        );
        assert_eq!(
            value_for_types(&types(&[TypeTag::Array]), "[1, 2]"),
            json!([1, 2])
        );
    }

    #[test]
    fn test_unconstrained_value_is_parsed() {
        assert_eq!(value_for_types(&BTreeSet::new(), "true"), json!(true));
        assert_eq!(value_for_types(&BTreeSet::new(), "sto-3g"), json!("sto-3g"));
    }

    #[test]
    fn test_mismatch_is_left_for_the_schema_check() {
        assert_eq!(
            value_for_types(&types(&[TypeTag::Integer]), "many"),
            json!("many")
        );
    }

    #[test]
    fn test_choice_lines_mark_current() {
        colored::control::set_override(false);
        let lines = choice_lines(&[json!("VQE"), json!("QPE")], Some(&json!("QPE")));
        assert_eq!(lines, vec!["  VQE".to_string(), "* QPE".to_string()]);
    }

    #[test]
    fn test_property_line_tags_substitution() {
        colored::control::set_override(false);
        assert_eq!(property_line("shots", &json!(1024), false), "   shots=1024");
        assert_eq!(
            property_line("qubit_mapping", &json!("parity"), true),
            "   qubit_mapping=parity (substituted)"
        );
    }
}
