//! [`AddressResolver`] – external ids in both directions.
//!
//! Forward resolution delegates to the [`AliasTable`].  Reverse resolution
//! uses the external keys remembered every time a value is seen, so an
//! inbound command always lands on the most recent value point announced
//! under that id.

use std::collections::HashMap;

use zwxpl_types::{MeshValue, ValueId};

use crate::alias::AliasTable;

/// Write target behind an external device id.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalTarget {
    pub node_id: u8,
    pub class_id: u8,
    pub value: MeshValue,
}

impl ExternalTarget {
    pub fn new(node_id: u8, class_id: u8, value: MeshValue) -> Self {
        Self {
            node_id,
            class_id,
            value,
        }
    }

    pub fn value_id(&self) -> ValueId {
        ValueId::new(
            self.node_id,
            self.class_id,
            self.value.instance,
            self.value.index,
        )
    }
}

#[derive(Debug, Default)]
pub struct AddressResolver {
    aliases: AliasTable,
    keys: HashMap<String, ExternalTarget>,
}

impl AddressResolver {
    pub fn new(aliases: AliasTable) -> Self {
        Self {
            aliases,
            keys: HashMap::new(),
        }
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// External id for a reported value.
    pub fn forward(&self, value: &MeshValue) -> String {
        self.aliases.resolve_value(value)
    }

    /// Base name of a node's emulated devices: its node alias or its id.
    pub fn node_base(&self, node_id: u8) -> String {
        self.aliases
            .node_alias(node_id)
            .map_or_else(|| node_id.to_string(), str::to_string)
    }

    /// Point `external_id` at `target`, replacing any previous entry.
    pub fn remember(&mut self, external_id: impl Into<String>, target: ExternalTarget) {
        self.keys.insert(external_id.into(), target);
    }

    pub fn lookup(&self, external_id: &str) -> Option<&ExternalTarget> {
        self.keys.get(external_id)
    }

    /// Resolve an inbound device to its write target: first the id as given,
    /// then `id/command`. Returns the key that matched with its target.
    pub fn reverse(&self, device: &str, command: &str) -> Option<(String, &ExternalTarget)> {
        if let Some(target) = self.keys.get(device) {
            return Some((device.to_string(), target));
        }
        let with_command = format!("{device}/{command}");
        self.keys
            .get(&with_command)
            .map(|target| (with_command, target))
    }

    pub fn known_devices(&self) -> usize {
        self.keys.len()
    }
}

/// Parse the raw addressing literal `prefix/node-class-instance-index`.
///
/// The prefix must be non-empty and contain no `/`; the four coordinates
/// must be unsigned integers in range.  Anything else is not a literal.
pub fn parse_raw_literal(device: &str) -> Option<ValueId> {
    let (prefix, coordinates) = device.split_once('/')?;
    if prefix.is_empty() {
        return None;
    }
    let mut parts = coordinates.split('-');
    let node_id = parts.next()?.parse::<u8>().ok()?;
    let class_id = parts.next()?.parse::<u8>().ok()?;
    let instance = parts.next()?.parse::<u8>().ok()?;
    let index = parts.next()?.parse::<u16>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(ValueId::new(node_id, class_id, instance, index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(node_id: u8) -> MeshValue {
        MeshValue {
            node_id,
            class_id: 38,
            instance: 1,
            index: 0,
            label: "Level".to_string(),
            ..MeshValue::default()
        }
    }

    #[test]
    fn forward_uses_alias_table() {
        let resolver = AddressResolver::new(AliasTable::from_pairs([("5", "salon")]));
        assert_eq!(resolver.forward(&level(5)), "salon/38/Level/0");
        assert_eq!(resolver.forward(&level(6)), "6/38/Level/0");
    }

    #[test]
    fn node_base_prefers_alias() {
        let resolver = AddressResolver::new(AliasTable::from_pairs([("5", "salon")]));
        assert_eq!(resolver.node_base(5), "salon");
        assert_eq!(resolver.node_base(7), "7");
    }

    #[test]
    fn reverse_tries_plain_id_first() {
        let mut resolver = AddressResolver::default();
        resolver.remember("salon/volet", ExternalTarget::new(5, 38, level(5)));
        resolver.remember("salon/volet/target", ExternalTarget::new(6, 38, level(6)));

        let (key, target) = resolver.reverse("salon/volet", "target").unwrap();
        assert_eq!(key, "salon/volet");
        assert_eq!(target.node_id, 5);
    }

    #[test]
    fn reverse_falls_back_to_command_suffix() {
        let mut resolver = AddressResolver::default();
        resolver.remember("5/target", ExternalTarget::new(5, 38, level(5)));

        let (key, target) = resolver.reverse("5", "target").unwrap();
        assert_eq!(key, "5/target");
        assert_eq!(target.value_id(), ValueId::new(5, 38, 1, 0));
    }

    #[test]
    fn reverse_fails_when_neither_form_is_known() {
        let mut resolver = AddressResolver::default();
        resolver.remember("5/state", ExternalTarget::new(5, 38, level(5)));
        assert!(resolver.reverse("5", "target").is_none());
        assert!(resolver.reverse("garage", "status").is_none());
    }

    #[test]
    fn remember_overwrites_with_latest_value() {
        let mut resolver = AddressResolver::default();
        let mut first = level(5);
        first.value = zwxpl_types::ZValue::Int(10);
        let mut second = level(5);
        second.value = zwxpl_types::ZValue::Int(80);

        resolver.remember("5/38/Level/0", ExternalTarget::new(5, 38, first));
        resolver.remember("5/38/Level/0", ExternalTarget::new(5, 38, second));

        assert_eq!(resolver.known_devices(), 1);
        assert_eq!(
            resolver.lookup("5/38/Level/0").unwrap().value.value,
            zwxpl_types::ZValue::Int(80)
        );
    }

    #[test]
    fn raw_literal_parses_four_coordinates() {
        assert_eq!(
            parse_raw_literal("zwave/9-112-1-52"),
            Some(ValueId::new(9, 112, 1, 52))
        );
        assert_eq!(
            parse_raw_literal("any/5-38-1-0"),
            Some(ValueId::new(5, 38, 1, 0))
        );
    }

    #[test]
    fn malformed_raw_literals_are_rejected() {
        for device in [
            "zwave/9-112-1",
            "zwave/9-112-1-52-3",
            "zwave/9-112-x-52",
            "/9-112-1-52",
            "9-112-1-52",
            "zwave/sub/9-112-1-52",
            "zwave/300-112-1-52",
            "salon/volet",
        ] {
            assert_eq!(parse_raw_literal(device), None, "{device} must not parse");
        }
    }
}
