use crate::sequence::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Index of a tool (extruder) in the printer configuration.
pub type ToolId = usize;

/// A tool taking over printing, with the markers delimiting its work in one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolChangeInfo {
    pub tool_id: ToolId,
    /// The TOOLCHANGE token that loaded the tool.
    pub tool_change: NodeId,
    pub block_start: Option<NodeId>,
    pub block_end: Option<NodeId>,
}

impl ToolChangeInfo {
    pub fn new(tool_id: ToolId, tool_change: NodeId) -> Self {
        Self {
            tool_id,
            tool_change,
            block_start: None,
            block_end: None,
        }
    }

    /// Same tool, carried into a new layer.
    ///
    /// The block start is cleared. The last block end stays as the inject
    /// point until the tool closes a block in the new layer.
    pub fn continuation(&self) -> Self {
        Self {
            block_start: None,
            ..self.clone()
        }
    }

    /// Record a block start; later markers replace earlier ones.
    pub fn mark_block_start(&mut self, marker: NodeId) {
        self.block_start = Some(marker);
    }

    /// Record a block end; later markers replace earlier ones.
    pub fn mark_block_end(&mut self, marker: NodeId) {
        self.block_end = Some(marker);
    }
}

/// One prime tower layer and the tool bookkeeping needed to print it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub layer_num: usize,
    pub layer_z: f64,
    pub layer_height: f64,
    /// The AFTER_LAYER_CHANGE token opening the layer.
    pub layer_start: Option<NodeId>,
    /// The BEFORE_LAYER_CHANGE token closing the layer.
    pub layer_end: Option<NodeId>,
    /// Tool still loaded from the previous layer, if any.
    pub continuing: Option<ToolChangeInfo>,
    /// Tool changes in chronological order.
    pub tool_change_seq: Vec<ToolChangeInfo>,
    pub tools_active: BTreeSet<ToolId>,
    pub tools_idle: BTreeSet<ToolId>,
    pub tools_disabled: BTreeSet<ToolId>,
}

impl Layer {
    pub fn new(layer_num: usize) -> Self {
        Self {
            layer_num,
            ..Self::default()
        }
    }

    /// Tools printing in this layer in order: the continuing tool, then every change.
    pub fn tools_sequence(&self) -> impl Iterator<Item = &ToolChangeInfo> {
        self.continuing.iter().chain(self.tool_change_seq.iter())
    }

    /// The record block markers are currently attributed to.
    pub fn current_tool_mut(&mut self) -> Option<&mut ToolChangeInfo> {
        match self.tool_change_seq.last_mut() {
            Some(tool) => Some(tool),
            None => self.continuing.as_mut(),
        }
    }

    /// Tool ids touched by this layer's tool changes.
    pub fn tool_change_ids(&self) -> BTreeSet<ToolId> {
        self.tool_change_seq.iter().map(|tc| tc.tool_id).collect()
    }

    /// Tool ids that get tower rings in this layer, continuing tool included.
    pub fn sequence_tool_ids(&self) -> BTreeSet<ToolId> {
        self.tools_sequence().map(|tc| tc.tool_id).collect()
    }

    /// A single tool printing and nothing waiting: no tower needed from here on.
    pub fn is_terminal(&self) -> bool {
        self.tools_active.len() == 1 && self.tools_idle.is_empty()
    }

    pub(crate) fn reset_status(&mut self) {
        self.tools_active.clear();
        self.tools_idle.clear();
        self.tools_disabled.clear();
    }
}
