//! Line parser for package key manifests.
//!
//! A single entry point dispatches on the shape of the line: lines that open
//! with `name="` are quoted records, anything else must be a plain
//! identifier/value pair.

use std::sync::OnceLock;

use regex_lite::Regex;

use crate::record::{KeyRecord, PlainRecord, PlainSeparator, QuotedRecord};

/// Why a line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    /// A quoted field was not of the form `key="value"`.
    BadField(String),
    /// A quoted-looking line that does not start with the `name` field.
    MissingName,
    /// A plain line with no value after the identifier.
    MissingValue,
}

fn field_regex() -> &'static Regex {
    static FIELD: OnceLock<Regex> = OnceLock::new();
    FIELD.get_or_init(|| {
        Regex::new(r#"^([A-Za-z_][A-Za-z0-9_]*)="([^"]*)""#).expect("field pattern is valid")
    })
}

/// Parse one non-blank manifest line.
pub fn parse_line(line: &str) -> Result<KeyRecord, LineError> {
    let line = line.trim();
    if line.starts_with("name=\"") {
        parse_quoted(line).map(KeyRecord::Quoted)
    } else if line.contains("=\"") {
        Err(LineError::MissingName)
    } else {
        parse_plain(line).map(KeyRecord::Plain)
    }
}

fn parse_quoted(line: &str) -> Result<QuotedRecord, LineError> {
    let mut rest = line;
    let mut name = None;
    let mut fields = Vec::new();

    while !rest.is_empty() {
        let caps = field_regex()
            .captures(rest)
            .ok_or_else(|| LineError::BadField(rest.to_string()))?;
        let whole = caps.get(0).map_or(0, |m| m.end());
        let key = caps.get(1).map_or("", |m| m.as_str()).to_string();
        let value = caps.get(2).map_or("", |m| m.as_str()).to_string();

        if name.is_none() {
            name = Some(value);
        } else {
            fields.push((key, value));
        }

        rest = &rest[whole..];
        let trimmed = rest.trim_start();
        // Fields must be whitespace separated.
        if !trimmed.is_empty() && trimmed.len() == rest.len() {
            return Err(LineError::BadField(rest.to_string()));
        }
        rest = trimmed;
    }

    let name = name.ok_or(LineError::MissingName)?;
    Ok(QuotedRecord { name, fields })
}

fn parse_plain(line: &str) -> Result<PlainRecord, LineError> {
    let mut tokens = line.split_whitespace();
    let first = tokens.next().ok_or(LineError::MissingValue)?;
    let rest: Vec<String> = tokens.map(str::to_string).collect();

    if !rest.is_empty() {
        return Ok(PlainRecord {
            name: first.to_string(),
            values: rest,
            separator: PlainSeparator::Whitespace,
        });
    }

    match first.split_once('=') {
        Some((name, value)) if !name.is_empty() && !value.is_empty() => Ok(PlainRecord {
            name: name.to_string(),
            values: vec![value.to_string()],
            separator: PlainSeparator::Equals,
        }),
        _ => Err(LineError::MissingValue),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_apexkeys_line() {
        let line = r#"name="com.android.runtime.apex" public_key="runtime.avbpubkey" private_key="runtime.pem" container_certificate="runtime.x509.pem" container_private_key="runtime.pk8""#;
        let record = parse_line(line).unwrap();
        assert_eq!(record.name(), "com.android.runtime.apex");
        assert_eq!(record.field("private_key"), Some("runtime.pem"));
        assert_eq!(record.to_string(), line);
    }

    #[test]
    fn test_parse_apkcerts_line_with_empty_values() {
        let line = r#"name="Prebuilt.apk" certificate="PRESIGNED" private_key="""#;
        let record = parse_line(line).unwrap();
        assert_eq!(record.field("certificate"), Some("PRESIGNED"));
        assert_eq!(record.field("private_key"), Some(""));
    }

    #[test]
    fn test_parse_quoted_tolerates_extra_whitespace() {
        let record = parse_line(r#"  name="A.apk"    certificate="a.pem"  "#).unwrap();
        assert_eq!(record.to_string(), r#"name="A.apk" certificate="a.pem""#);
    }

    #[test]
    fn test_parse_plain_whitespace() {
        let record = parse_line("com.android.tzdata keys/tzdata.pem").unwrap();
        assert_eq!(record.name(), "com.android.tzdata");
        assert!(matches!(
            record,
            KeyRecord::Plain(PlainRecord { separator: PlainSeparator::Whitespace, .. })
        ));
    }

    #[test]
    fn test_parse_plain_equals() {
        let record = parse_line("com.android.tzdata=keys/tzdata.pem").unwrap();
        assert_eq!(record.name(), "com.android.tzdata");
        assert_eq!(record.to_string(), "com.android.tzdata=keys/tzdata.pem");
    }

    #[test]
    fn test_rejects_bad_lines() {
        assert_eq!(parse_line("lonely"), Err(LineError::MissingValue));
        assert_eq!(parse_line("name="), Err(LineError::MissingValue));
        assert_eq!(
            parse_line(r#"certificate="a.pem" name="A.apk""#),
            Err(LineError::MissingName)
        );
        assert!(matches!(
            parse_line(r#"name="A.apk" certificate=a.pem"#),
            Err(LineError::BadField(_))
        ));
        assert!(matches!(
            parse_line(r#"name="A.apk"certificate="a.pem""#),
            Err(LineError::BadField(_))
        ));
    }
}
