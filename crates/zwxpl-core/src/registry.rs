//! [`DeviceRegistry`] – in-memory mirror of the mesh topology.
//!
//! Nodes appear as placeholders on `node-added`, collect value points as the
//! driver reports them, and become ready once their interview completes.
//! Nodes are never removed for the lifetime of the process.

use std::collections::BTreeMap;

use zwxpl_types::{MeshValue, NodeInfo, ValueId, ZValue};

/// `COMMAND_CLASS_SWITCH_BINARY`
pub const COMMAND_CLASS_SWITCH_BINARY: u8 = 0x25;
/// `COMMAND_CLASS_SWITCH_MULTILEVEL`
pub const COMMAND_CLASS_SWITCH_MULTILEVEL: u8 = 0x26;

/// Command classes that need active polling to report their state.
pub const POLLED_CLASSES: &[u8] = &[COMMAND_CLASS_SWITCH_MULTILEVEL];

/// Poll intensity requested for every class in [`POLLED_CLASSES`].
pub const POLL_INTENSITY: u8 = 2;

/// A mesh node and every value point it has reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    pub id: u8,
    pub info: NodeInfo,
    pub ready: bool,
    /// class id → (instance, index) → value
    values: BTreeMap<u8, BTreeMap<(u8, u16), MeshValue>>,
}

impl Node {
    pub fn new(id: u8) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn value(&self, class_id: u8, instance: u8, index: u16) -> Option<&MeshValue> {
        self.values.get(&class_id)?.get(&(instance, index))
    }

    /// Command classes this node has reported values for, ascending.
    pub fn classes(&self) -> impl Iterator<Item = u8> + '_ {
        self.values.keys().copied()
    }

    /// Values reported under `class_id`, ordered by instance then index.
    pub fn class_values(&self, class_id: u8) -> impl Iterator<Item = &MeshValue> {
        self.values.get(&class_id).into_iter().flat_map(|m| m.values())
    }

    pub fn value_count(&self) -> usize {
        self.values.values().map(BTreeMap::len).sum()
    }

    fn store(&mut self, class_id: u8, value: MeshValue) -> Option<MeshValue> {
        self.values
            .entry(class_id)
            .or_default()
            .insert((value.instance, value.index), value)
    }
}

/// Per-node, per-value state mirror.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    nodes: BTreeMap<u8, Node>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or reset) the placeholder entry for `node_id`.
    pub fn on_node_added(&mut self, node_id: u8) {
        self.nodes.insert(node_id, Node::new(node_id));
    }

    /// Record node metadata and mark it ready.
    ///
    /// Returns the node's command classes that must have polling enabled.
    pub fn on_node_ready(&mut self, node_id: u8, info: NodeInfo) -> Vec<u8> {
        let node = self.node_entry(node_id);
        node.info = info;
        node.ready = true;
        node.classes()
            .filter(|class_id| POLLED_CLASSES.contains(class_id))
            .collect()
    }

    pub fn on_value_added(&mut self, node_id: u8, class_id: u8, value: MeshValue) {
        self.node_entry(node_id).store(class_id, value);
    }

    /// Store the new reading and return the previous one for the same
    /// identity, if there was one.
    pub fn on_value_changed(&mut self, node_id: u8, class_id: u8, value: MeshValue) -> Option<ZValue> {
        self.node_entry(node_id)
            .store(class_id, value)
            .map(|previous| previous.value)
    }

    /// Remove every instance of `index` under `class_id`. Returns how many
    /// value points were dropped.
    pub fn on_value_removed(&mut self, node_id: u8, class_id: u8, index: u16) -> usize {
        let Some(values) = self
            .nodes
            .get_mut(&node_id)
            .and_then(|node| node.values.get_mut(&class_id))
        else {
            return 0;
        };
        let before = values.len();
        values.retain(|&(_, idx), _| idx != index);
        before - values.len()
    }

    pub fn node(&self, node_id: u8) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub fn is_ready(&self, node_id: u8) -> bool {
        self.nodes.get(&node_id).is_some_and(|node| node.ready)
    }

    pub fn value(&self, id: ValueId) -> Option<&MeshValue> {
        self.nodes
            .get(&id.node_id)?
            .value(id.class_id, id.instance, id.index)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // Value events can arrive for nodes the driver never announced.
    fn node_entry(&mut self, node_id: u8) -> &mut Node {
        self.nodes
            .entry(node_id)
            .or_insert_with(|| Node::new(node_id))
    }
}
