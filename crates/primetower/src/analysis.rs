//! Tool status dataflow over the layer list.
//!
//! A forward pass marks the tools printing in each layer; a backward pass
//! derives which parked tools are still needed later (idle) and which are
//! done for the rest of the print (disabled).

use crate::layer::{Layer, ToolId};
use std::collections::BTreeSet;

/// Fill `tools_active`, `tools_idle` and `tools_disabled` for every layer.
///
/// Statuses are reset first, so running this again on an unchanged list
/// reproduces the same assignment.
pub fn analyze_tool_status(layers: &mut [Layer]) {
    let enabled_tools = mark_active_tools(layers);
    mark_idle_and_disabled_tools(layers, &enabled_tools);
}

/// Forward pass: returns the union of all tools that ever print.
fn mark_active_tools(layers: &mut [Layer]) -> BTreeSet<ToolId> {
    let mut current_tool: Option<ToolId> = None;
    let mut enabled_tools = BTreeSet::new();

    for layer in layers.iter_mut() {
        layer.reset_status();

        if let Some(continuing) = &layer.continuing {
            current_tool = Some(continuing.tool_id);
        }
        if let Some(tool) = current_tool {
            layer.tools_active.insert(tool);
        }
        for tool_change in &layer.tool_change_seq {
            current_tool = Some(tool_change.tool_id);
            layer.tools_active.insert(tool_change.tool_id);
        }

        enabled_tools.extend(layer.tools_active.iter().copied());
    }

    enabled_tools
}

/// Backward pass, seeded by the last layer.
fn mark_idle_and_disabled_tools(layers: &mut [Layer], enabled_tools: &BTreeSet<ToolId>) {
    let mut next: Option<(BTreeSet<ToolId>, BTreeSet<ToolId>)> = None;

    for layer in layers.iter_mut().rev() {
        match &next {
            None => {
                layer.tools_idle = BTreeSet::new();
                layer.tools_disabled = enabled_tools - &layer.tools_active;
            }
            Some((upcoming, next_disabled)) => {
                layer.tools_idle = upcoming - &layer.tools_active;
                layer.tools_disabled = next_disabled - &layer.tools_active;
            }
        }

        // idle ∪ active of this layer is what the layer before it still waits for
        let upcoming = &layer.tools_idle | &layer.tools_active;
        next = Some((upcoming, layer.tools_disabled.clone()));
    }
}
