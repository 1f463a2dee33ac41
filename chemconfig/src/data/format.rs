//! On-disk formats of an input document.
//!
//! The native format is a sequence of sections:
//!
//! ```text
//! &problem
//!    name=energy
//!    random_seed=null
//! &end
//!
//! &psi4
//! molecule h2 {
//!   H 0.0 0.0 0.0
//!   H 0.0 0.0 0.735
//! }
//! &end
//! ```
//!
//! Structured sections hold `key=value` lines. Text sections keep their lines
//! verbatim, except that a line starting with `&` or `\` after any indentation
//! is written with a leading `\`, which is stripped again on read. Which of
//! the two a section is comes from the schema.

use std::path::Path;

use serde_json::{Map, Value};

use crate::{
    data::{
        document::{Section, SectionBody},
        property::TypeTag,
        schema::SchemaCatalog,
    },
    error::{ConfigError, Result},
};

/// Serialization format of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Dictionary form: a JSON object of section name to contents.
    Json,
    /// `&section ... &end` blocks.
    Native,
}

impl DocumentFormat {
    /// Pick the format from a file extension; anything but `.json` is native.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Native,
        }
    }
}

/// Parse one `value` of a `key=value` line.
///
/// JSON literals keep their type, `None`/`True`/`False` are accepted as
/// aliases, and anything else is taken as a bare string.
pub fn parse_scalar(text: &str) -> Value {
    let t = text.trim();
    match t {
        "" => Value::String(String::new()),
        "None" => Value::Null,
        "True" => Value::Bool(true),
        "False" => Value::Bool(false),
        _ => serde_json::from_str(t).unwrap_or_else(|_| Value::String(t.to_string())),
    }
}

/// Format a property value so that [`parse_scalar`] reads it back unchanged.
pub fn format_scalar(value: &Value) -> String {
    match value {
        Value::String(s) if !s.contains(['\n', '\r']) && parse_scalar(s) == *value => s.clone(),
        other => other.to_string(),
    }
}

type Lines<'a> = Vec<(usize, &'a str)>;

const ESCAPE: char = '\\';

fn needs_escape(line: &str) -> bool {
    line.trim_start().starts_with(['&', ESCAPE])
}

fn escape_text_line(line: &str) -> String {
    if needs_escape(line) {
        format!("{ESCAPE}{line}")
    } else {
        line.to_string()
    }
}

fn unescape_text_line(line: &str) -> &str {
    line.strip_prefix(ESCAPE).unwrap_or(line)
}

/// Parse native content into ordered sections.
pub(crate) fn parse_native(
    content: &str,
    catalog: &SchemaCatalog,
    source_name: &str,
) -> Result<Vec<Section>> {
    let mut sections = Vec::new();
    let mut current: Option<(String, usize, Lines<'_>)> = None;

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw.trim();

        if let Some(tag) = trimmed.strip_prefix('&') {
            let tag = tag.trim();
            match current.take() {
                None if tag.eq_ignore_ascii_case("end") => {
                    return Err(ConfigError::parse(
                        source_name,
                        line_no,
                        "&end without an open section",
                    ));
                }
                None if tag.is_empty() => {
                    return Err(ConfigError::parse(source_name, line_no, "missing section name"));
                }
                None => current = Some((tag.to_string(), line_no, Vec::new())),
                Some((name, _, lines)) if tag.eq_ignore_ascii_case("end") => {
                    let body = parse_body(catalog, &name, &lines, source_name)?;
                    sections.push(Section { name, body });
                }
                Some((name, start, _)) => {
                    return Err(ConfigError::parse(
                        source_name,
                        line_no,
                        format!("section {name:?} opened at line {start} is not closed before &{tag}"),
                    ));
                }
            }
            continue;
        }

        match &mut current {
            Some((_, _, lines)) => lines.push((line_no, raw)),
            None if trimmed.is_empty() || trimmed.starts_with('#') => {}
            None => {
                return Err(ConfigError::parse(
                    source_name,
                    line_no,
                    "content outside of a section",
                ));
            }
        }
    }

    if let Some((name, start, _)) = current {
        return Err(ConfigError::parse(
            source_name,
            start,
            format!("section {name:?} is not closed with &end"),
        ));
    }

    Ok(sections)
}

fn looks_structured(lines: &Lines<'_>) -> bool {
    let mut meaningful = lines
        .iter()
        .map(|(_, l)| l.trim())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .peekable();
    meaningful.peek().is_some() && meaningful.all(|l| l.contains('='))
}

fn parse_body(
    catalog: &SchemaCatalog,
    name: &str,
    lines: &Lines<'_>,
    source_name: &str,
) -> Result<SectionBody> {
    let text = if catalog.is_declared(name) {
        catalog.section_is_text(name)
    } else {
        !looks_structured(lines)
    };

    if text {
        let Some(&(first_line, _)) = lines.first() else {
            return Ok(SectionBody::Data(Value::Null));
        };
        let payload = lines
            .iter()
            .map(|(_, l)| unescape_text_line(l))
            .collect::<Vec<_>>()
            .join("\n");
        let types = catalog.section_types(name);
        if types.is_empty() || types.contains(&TypeTag::String) {
            return Ok(SectionBody::Data(Value::String(payload)));
        }
        return serde_json::from_str(&payload)
            .map(SectionBody::Data)
            .map_err(|e| {
                ConfigError::parse(source_name, first_line + e.line().saturating_sub(1), e.to_string())
            });
    }

    let mut properties = Map::new();
    for &(line_no, raw) in lines {
        let t = raw.trim();
        if t.is_empty() || t.starts_with('#') {
            continue;
        }
        let Some((key, value)) = t.split_once('=') else {
            return Err(ConfigError::parse(
                source_name,
                line_no,
                format!("expected key=value in section {name:?}"),
            ));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::parse(source_name, line_no, "empty property name"));
        }
        properties.insert(key.to_string(), parse_scalar(value));
    }
    Ok(SectionBody::Properties(properties))
}

/// Render sections in the native format.
pub(crate) fn write_native<'a>(sections: impl IntoIterator<Item = &'a Section>) -> String {
    let mut out = String::new();
    for section in sections {
        out.push_str(&format!("&{}\n", section.name));
        match &section.body {
            SectionBody::Properties(props) => {
                for (key, value) in props {
                    out.push_str(&format!("   {key}={}\n", format_scalar(value)));
                }
            }
            SectionBody::Data(Value::Null) => {}
            SectionBody::Data(Value::String(s)) => {
                for line in s.split('\n') {
                    out.push_str(&escape_text_line(line));
                    out.push('\n');
                }
            }
            SectionBody::Data(other) => {
                out.push_str(&format!("{other}\n"));
            }
        }
        out.push_str("&end\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_scalar_types() {
        assert_eq!(parse_scalar(" 1024 "), json!(1024));
        assert_eq!(parse_scalar("True"), json!(true));
        assert_eq!(parse_scalar("None"), Value::Null);
        assert_eq!(parse_scalar("[0.1, 0.2]"), json!([0.1, 0.2]));
        assert_eq!(parse_scalar("sto-3g"), json!("sto-3g"));
        assert_eq!(
            parse_scalar("H 0.0 0.0 0.0; H 0.0 0.0 0.735"),
            json!("H 0.0 0.0 0.0; H 0.0 0.0 0.735")
        );
    }

    #[test]
    fn test_format_scalar_quotes_ambiguous_strings() {
        assert_eq!(format_scalar(&json!("parity")), "parity");
        assert_eq!(format_scalar(&json!("1024")), "\"1024\"");
        assert_eq!(format_scalar(&json!("None")), "\"None\"");
        assert_eq!(format_scalar(&json!(" padded")), "\" padded\"");
        for v in [json!("1024"), json!("a\nb"), json!(""), json!(null), json!({"a": [1]})] {
            assert_eq!(parse_scalar(&format_scalar(&v)), v);
        }
    }

    #[test]
    fn test_parse_native_sections() {
        let catalog = SchemaCatalog::builtin().unwrap();
        let content = "# experiment\n&problem\n   name=energy\n   random_seed=None\n&end\n\n&psi4\nmolecule h2 {\n  H 0 0 0\n}\n&end\n";
        let sections = parse_native(content, &catalog, "test").unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].name, "problem");
        assert_eq!(
            sections[0].body,
            SectionBody::Properties(
                json!({"name": "energy", "random_seed": null})
                    .as_object()
                    .cloned()
                    .unwrap()
            )
        );
        assert_eq!(
            sections[1].body,
            SectionBody::Data(json!("molecule h2 {\n  H 0 0 0\n}"))
        );
    }

    #[test]
    fn test_parse_native_errors_carry_line() {
        let catalog = SchemaCatalog::builtin().unwrap();
        let err = parse_native("&problem\nname energy\n&end\n", &catalog, "in.txt").unwrap_err();
        match err {
            ConfigError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(parse_native("&problem\nname=energy\n", &catalog, "in.txt").is_err());
        assert!(parse_native("name=energy\n", &catalog, "in.txt").is_err());
        assert!(parse_native("&problem\n&driver\n&end\n", &catalog, "in.txt").is_err());
    }

    #[test]
    fn test_text_lines_that_look_like_markers_survive() {
        let catalog = SchemaCatalog::builtin().unwrap();
        let text = "molecule {\n&geometry\n  &end\n  \\ back\n\\raw\n}";
        let section = Section {
            name: "psi4".to_string(),
            body: SectionBody::Data(json!(text)),
        };
        let rendered = write_native([&section]);
        assert!(rendered.contains("\n\\&geometry\n"));
        assert!(rendered.contains("\n\\  &end\n"));
        assert!(rendered.contains("\n\\\\raw\n"));

        let sections = parse_native(&rendered, &catalog, "test").unwrap();
        assert_eq!(sections, vec![section]);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.JSON")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(Path::new("a.txt")), DocumentFormat::Native);
        assert_eq!(DocumentFormat::from_path(Path::new("input")), DocumentFormat::Native);
    }
}
