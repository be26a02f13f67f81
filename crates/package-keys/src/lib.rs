//! Signing-key manifests of a target-files tree.
//!
//! `META/apexkeys.txt` and `META/apkcerts.txt` list, per package, the keys
//! the package is signed with. This crate parses both syntaxes into
//! [`KeyRecord`]s keyed by package identifier, and merges two manifests
//! while refusing to silently pick between disagreeing records.

mod error;
mod parser;
mod record;

pub use error::KeysError;
pub use parser::{parse_line, LineError};
pub use record::{KeyRecord, PlainRecord, PlainSeparator, QuotedRecord};

use std::collections::BTreeMap;

/// What to do when both manifests declare a package with different records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Fail with [`KeysError::Conflict`].
    #[default]
    Fail,
    /// Keep the record from the first manifest and report the identifier.
    KeepFirst,
}

/// Result of a merge under [`ConflictPolicy::KeepFirst`].
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub manifest: KeyManifest,
    /// Identifiers whose second-side record was dropped.
    pub overridden: Vec<String>,
}

/// Parsed manifest, keyed and ordered by package identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyManifest {
    records: BTreeMap<String, KeyRecord>,
}

impl KeyManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse manifest text. Blank lines are skipped; every other line must be
    /// a record, and each identifier may appear only once.
    pub fn parse(text: &str) -> Result<Self, KeysError> {
        let mut manifest = Self::new();

        for (index, line) in text.lines().enumerate() {
            let line_number = index + 1;
            if line.trim().is_empty() {
                continue;
            }

            let record = parse_line(line).map_err(|reason| KeysError::Malformed {
                line_number,
                line: line.to_string(),
                reason,
            })?;

            let name = record.name().to_string();
            if manifest.records.contains_key(&name) {
                return Err(KeysError::DuplicateRecord { line_number, name });
            }
            manifest.records.insert(name, record);
        }

        Ok(manifest)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record by package identifier
    pub fn get(&self, name: &str) -> Option<&KeyRecord> {
        self.records.get(name)
    }

    /// Records in identifier order
    pub fn records(&self) -> impl Iterator<Item = &KeyRecord> {
        self.records.values()
    }

    /// Keep only records whose partition tag satisfies `keep`.
    ///
    /// Every record must carry a partition tag; the first untagged record
    /// aborts the filter and leaves the manifest unchanged.
    pub fn retain_partitions<F>(&mut self, keep: F) -> Result<(), KeysError>
    where
        F: Fn(&str) -> bool,
    {
        if let Some(untagged) = self.records.values().find(|r| r.partition().is_none()) {
            return Err(KeysError::MissingPartition {
                name: untagged.name().to_string(),
            });
        }

        self.records
            .retain(|_, record| record.partition().is_some_and(|p| keep(p)));
        Ok(())
    }

    /// Union of two manifests. Identical records collapse into one; differing
    /// records for the same identifier are a [`KeysError::Conflict`].
    pub fn merge(&self, other: &KeyManifest) -> Result<KeyManifest, KeysError> {
        self.merge_with(other, ConflictPolicy::Fail)
            .map(|outcome| outcome.manifest)
    }

    /// Union of two manifests under an explicit conflict policy.
    pub fn merge_with(
        &self,
        other: &KeyManifest,
        policy: ConflictPolicy,
    ) -> Result<MergeOutcome, KeysError> {
        let mut merged = self.records.clone();
        let mut overridden = Vec::new();

        for (name, record) in &other.records {
            match merged.get(name) {
                Some(existing) if existing == record => {}
                Some(existing) => match policy {
                    ConflictPolicy::Fail => {
                        return Err(KeysError::Conflict {
                            name: name.clone(),
                            first: existing.to_string(),
                            second: record.to_string(),
                        });
                    }
                    ConflictPolicy::KeepFirst => overridden.push(name.clone()),
                },
                None => {
                    merged.insert(name.clone(), record.clone());
                }
            }
        }

        Ok(MergeOutcome {
            manifest: KeyManifest { records: merged },
            overridden,
        })
    }

    /// Render one record per line, sorted, each line newline-terminated.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for record in self.records.values() {
            out.push_str(&record.to_string());
            out.push('\n');
        }
        out
    }
}
