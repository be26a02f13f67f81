//! Manifest record types.

use std::fmt;

/// How a plain record separates its identifier from its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlainSeparator {
    /// `com.android.foo /path/to/key`
    Whitespace,
    /// `com.android.foo=/path/to/key`
    Equals,
}

/// A quoted multi-field record, as written by the build into `apexkeys.txt`
/// and `apkcerts.txt`.
///
/// The `name` field always comes first; the remaining fields keep their
/// input order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuotedRecord {
    pub name: String,
    pub fields: Vec<(String, String)>,
}

/// An identifier followed by one or more bare values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlainRecord {
    pub name: String,
    pub values: Vec<String>,
    pub separator: PlainSeparator,
}

/// One line of a package key manifest.
///
/// Equality covers the identifier and the full value tuple, so two records
/// are the same only if every field matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyRecord {
    Quoted(QuotedRecord),
    Plain(PlainRecord),
}

impl KeyRecord {
    /// Package identifier this record is keyed by.
    pub fn name(&self) -> &str {
        match self {
            KeyRecord::Quoted(r) => &r.name,
            KeyRecord::Plain(r) => &r.name,
        }
    }

    /// Look up a quoted field by key. Plain records have no named fields.
    pub fn field(&self, key: &str) -> Option<&str> {
        match self {
            KeyRecord::Quoted(r) => {
                if key == "name" {
                    return Some(&r.name);
                }
                r.fields
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.as_str())
            }
            KeyRecord::Plain(_) => None,
        }
    }

    /// The `partition="..."` tag, if the record carries one.
    pub fn partition(&self) -> Option<&str> {
        self.field("partition")
    }
}

impl fmt::Display for KeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRecord::Quoted(r) => {
                write!(f, "name=\"{}\"", r.name)?;
                for (key, value) in &r.fields {
                    write!(f, " {}=\"{}\"", key, value)?;
                }
                Ok(())
            }
            KeyRecord::Plain(r) => {
                let sep = match r.separator {
                    PlainSeparator::Whitespace => " ",
                    PlainSeparator::Equals => "=",
                };
                write!(f, "{}{}{}", r.name, sep, r.values.join(" "))
            }
        }
    }
}
