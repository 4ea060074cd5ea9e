//! [`AliasTable`] – static coordinate → device-name mapping.
//!
//! Keys come in four granularities, all built from the same tokens as the
//! raw external id `node/class/label/index`:
//!
//! | Key | Resolves to |
//! |---|---|
//! | `node/class/label/index` | the alias itself |
//! | `node/class/label` | `alias/index` |
//! | `node/class` | `alias/label/index` |
//! | `node` | `alias/class/label/index` |
//!
//! A value with no matching key resolves to its raw coordinate string, so
//! every value point is addressable even with an empty table.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;
use zwxpl_types::{BridgeError, MeshValue};

/// Immutable (after load) alias lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AliasTable {
    entries: HashMap<String, String>,
}

impl AliasTable {
    /// An empty table; every lookup falls back to raw coordinates.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Load a table from `source`, which is either a path to an existing file
    /// or the table itself inline.
    ///
    /// `.json` files (and inline text starting with `{`) hold a JSON object;
    /// everything else uses `key=value` entries separated by commas or
    /// newlines.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Io`] when the file cannot be read and
    /// [`BridgeError::AliasTable`] when its content cannot be parsed.
    pub fn load(source: &str) -> Result<Self, BridgeError> {
        let path = Path::new(source);
        if path.is_file() {
            let raw = fs::read_to_string(path)?;
            let is_json = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            let table = if is_json {
                Self::parse_json(&raw)?
            } else {
                Self::parse_pairs(&raw)?
            };
            debug!(path = %path.display(), entries = table.len(), "alias table loaded from file");
            return Ok(table);
        }

        let table = if source.trim_start().starts_with('{') {
            Self::parse_json(source)?
        } else {
            Self::parse_pairs(source)?
        };
        debug!(entries = table.len(), "inline alias table loaded");
        Ok(table)
    }

    /// Parse a JSON object whose values are strings or numbers.
    pub fn parse_json(raw: &str) -> Result<Self, BridgeError> {
        let json: Value = serde_json::from_str(raw)
            .map_err(|e| BridgeError::AliasTable(format!("invalid JSON alias table: {e}")))?;
        let Value::Object(map) = json else {
            return Err(BridgeError::AliasTable(
                "alias table must be a JSON object".to_string(),
            ));
        };

        let mut entries = HashMap::with_capacity(map.len());
        for (key, value) in map {
            let alias = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                other => {
                    return Err(BridgeError::AliasTable(format!(
                        "alias for '{key}' must be a string, got {other}"
                    )));
                }
            };
            entries.insert(key.trim().to_string(), alias.trim().to_string());
        }
        Ok(Self { entries })
    }

    /// Parse `key=value` entries separated by commas or newlines. Blank
    /// entries are skipped and `#` starts a comment line.
    pub fn parse_pairs(raw: &str) -> Result<Self, BridgeError> {
        let mut entries = HashMap::new();
        for line in raw.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            for item in line.split(',') {
                let item = item.trim();
                if item.is_empty() {
                    continue;
                }
                let Some((key, alias)) = item.split_once('=') else {
                    return Err(BridgeError::AliasTable(format!(
                        "expected key=value, got '{item}'"
                    )));
                };
                let (key, alias) = (key.trim(), alias.trim());
                if key.is_empty() || alias.is_empty() {
                    return Err(BridgeError::AliasTable(format!(
                        "empty key or alias in '{item}'"
                    )));
                }
                entries.insert(key.to_string(), alias.to_string());
            }
        }
        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Alias registered for a whole node, if any.
    pub fn node_alias(&self, node_id: u8) -> Option<&str> {
        self.get(&node_id.to_string())
    }

    /// Resolve a value point to its external device id, most specific key
    /// first. `label` is the label token (see
    /// [`MeshValue::label_token`]).
    pub fn resolve(&self, node_id: u8, class_id: u8, index: u16, label: &str) -> String {
        let raw = format!("{node_id}/{class_id}/{label}/{index}");
        if let Some(alias) = self.get(&raw) {
            return alias.to_string();
        }
        if let Some(alias) = self.get(&format!("{node_id}/{class_id}/{label}")) {
            return format!("{alias}/{index}");
        }
        if let Some(alias) = self.get(&format!("{node_id}/{class_id}")) {
            return format!("{alias}/{label}/{index}");
        }
        if let Some(alias) = self.node_alias(node_id) {
            return format!("{alias}/{class_id}/{label}/{index}");
        }
        raw
    }

    /// [`resolve`][Self::resolve] for a reported value.
    pub fn resolve_value(&self, value: &MeshValue) -> String {
        self.resolve(
            value.node_id,
            value.class_id,
            value.index,
            &value.label_token(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn level_value() -> MeshValue {
        MeshValue {
            node_id: 5,
            class_id: 38,
            instance: 1,
            index: 0,
            label: "Level".to_string(),
            ..MeshValue::default()
        }
    }

    #[test]
    fn empty_table_yields_raw_coordinates() {
        let table = AliasTable::new();
        assert_eq!(table.resolve_value(&level_value()), "5/38/Level/0");
    }

    #[test]
    fn raw_coordinates_use_instance_when_not_first() {
        let table = AliasTable::new();
        let mut value = level_value();
        value.instance = 2;
        assert_eq!(table.resolve_value(&value), "5/38/2/0");
    }

    #[test]
    fn exact_key_wins_over_every_other_level() {
        let table = AliasTable::from_pairs([
            ("5/38/Level/0", "salon/volet"),
            ("5/38/Level", "salon/level"),
            ("5/38", "salon/dimmer"),
            ("5", "salon"),
        ]);
        assert_eq!(table.resolve_value(&level_value()), "salon/volet");
    }

    #[test]
    fn label_level_appends_index() {
        let table = AliasTable::from_pairs([("5/38/Level", "salon/level"), ("5", "salon")]);
        assert_eq!(table.resolve_value(&level_value()), "salon/level/0");
    }

    #[test]
    fn class_level_appends_label_and_index() {
        let table = AliasTable::from_pairs([("5/38", "salon/dimmer"), ("5", "salon")]);
        assert_eq!(table.resolve_value(&level_value()), "salon/dimmer/Level/0");
    }

    #[test]
    fn node_level_appends_full_suffix() {
        let table = AliasTable::from_pairs([("5", "salon")]);
        assert_eq!(table.resolve_value(&level_value()), "salon/38/Level/0");
    }

    #[test]
    fn aliases_for_other_nodes_do_not_match() {
        let table = AliasTable::from_pairs([("6", "cuisine"), ("5/37", "salon/switch")]);
        assert_eq!(table.resolve_value(&level_value()), "5/38/Level/0");
    }

    #[test]
    fn parse_pairs_accepts_commas_newlines_and_comments() {
        let table = AliasTable::parse_pairs("# aliases\n5=salon, 6/38 = cuisine/volet\n\n7=garage,")
            .unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get("6/38"), Some("cuisine/volet"));
        assert_eq!(table.node_alias(7), Some("garage"));
    }

    #[test]
    fn parse_pairs_rejects_entries_without_separator() {
        let result = AliasTable::parse_pairs("5=salon,garage");
        assert!(matches!(result, Err(BridgeError::AliasTable(_))));
    }

    #[test]
    fn parse_json_accepts_numbers_and_rejects_arrays() {
        let table = AliasTable::parse_json(r#"{"5":"salon","6":12}"#).unwrap();
        assert_eq!(table.get("6"), Some("12"));
        assert!(AliasTable::parse_json("[1,2]").is_err());
    }

    #[test]
    fn load_reads_json_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("aliases.json");
        let mut file = std::fs::File::create(&path).expect("create");
        file.write_all(br#"{"5/38": "salon/volet"}"#).expect("write");

        let table = AliasTable::load(&path.to_string_lossy()).unwrap();
        assert_eq!(table.get("5/38"), Some("salon/volet"));
    }

    #[test]
    fn load_reads_pair_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("aliases.txt");
        std::fs::write(&path, "5=salon\n9=chaudiere\n").expect("write");

        let table = AliasTable::load(&path.to_string_lossy()).unwrap();
        assert_eq!(table.node_alias(9), Some("chaudiere"));
    }

    #[test]
    fn load_falls_back_to_inline_text() {
        let table = AliasTable::load("5=salon,6=cuisine").unwrap();
        assert_eq!(table.len(), 2);

        let table = AliasTable::load(r#"{"5":"salon"}"#).unwrap();
        assert_eq!(table.node_alias(5), Some("salon"));
    }
}
