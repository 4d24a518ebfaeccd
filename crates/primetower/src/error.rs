use crate::layer::ToolId;
use crate::sequence::NodeId;
use thiserror::Error;

/// Result type alias for prime tower operations.
pub type Result<T> = std::result::Result<T, PrimeTowerError>;

/// Failures raised while analysing a stream or injecting tower code.
///
/// Every variant is fatal for the run: the transform is deterministic, so
/// re-running on the same input reproduces the same error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PrimeTowerError {
    /// A tower shape was requested for a tool that is not printing in the layer.
    #[error("Tool T{tool} not in active set of prime tower layer #{layer_num}")]
    UnsupportedTool { tool: ToolId, layer_num: usize },

    /// A TOOL_BLOCK_START/END annotation names a different tool than the one loaded.
    #[error("Tool id {tool} from {label} doesn't match last active tool in layer ({expected})")]
    BlockMarkerMismatch {
        label: String,
        tool: i64,
        expected: String,
    },

    /// Layer height outside the range supported by its toolset.
    #[error("Layer #{layer_num} height {height:.4} outside [{min:.4}, {max:.4}] allowed for the toolset {tools}")]
    LayerHeight {
        layer_num: usize,
        height: f64,
        min: f64,
        max: f64,
        tools: String,
    },

    /// A move-out was requested at a point without a known Z.
    #[error("Malformed GCode - injecting prime tower move-out code where Z is not set (layer #{layer_num})")]
    MalformedPosition { layer_num: usize },

    #[error("Tool T{tool} is not configured")]
    UnknownTool { tool: ToolId },

    #[error("No prime tower bands computed for tool T{tool}")]
    MissingBands { tool: ToolId },

    #[error("No inject point for T{tool} in prime tower layer #{layer_num}")]
    MissingInjectPoint { layer_num: usize, tool: ToolId },

    #[error("Marker {marker} does not belong to the instruction list")]
    InvalidMarker { marker: NodeId },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}
