use crate::analysis::analyze_tool_status;
use crate::config::TowerConfig;
use crate::error::Result;
use crate::layer::{Layer, ToolId};
use log::debug;
use std::collections::BTreeSet;

/// Squash adjacent tower layers where possible.
///
/// A layer is folded into the running output layer when its tool changes
/// load none of the tools already printing there (continuing tool included)
/// and the combined height fits the limits of the
/// merged toolset. Layers from the first one needing no tower onward are
/// dropped. Tool statuses are recomputed afterwards.
pub fn optimize_layers(layers: Vec<Layer>, config: &TowerConfig) -> Result<Vec<Layer>> {
    let mut input = layers.into_iter();
    let Some(mut current) = input.next() else {
        return Ok(Vec::new());
    };
    let mut optimized = Vec::new();

    for mut candidate in input {
        if candidate.is_terminal() {
            if config.debug {
                debug!(
                    "Prime tower layer #{} has one active tool and nothing idle, stopping",
                    candidate.layer_num
                );
            }
            break;
        }

        if try_merge(&mut current, &candidate, config)? {
            continue;
        }

        candidate.layer_num = optimized.len() + 1;
        optimized.push(std::mem::replace(&mut current, candidate));
    }
    optimized.push(current);

    analyze_tool_status(&mut optimized);
    Ok(optimized)
}

/// Fold `candidate` into `current` if allowed; returns whether it was merged.
fn try_merge(current: &mut Layer, candidate: &Layer, config: &TowerConfig) -> Result<bool> {
    let candidate_changes = candidate.tool_change_ids();
    if !current.sequence_tool_ids().is_disjoint(&candidate_changes) {
        return Ok(false);
    }

    let merged_height = current.layer_height + candidate.layer_height;
    let merged_active: BTreeSet<ToolId> = current
        .tools_active
        .union(&candidate_changes)
        .copied()
        .collect();

    let min = config.min_layer_height(&merged_active)?;
    let max = config.max_layer_height(&merged_active)?;
    if merged_height < min || merged_height > max {
        return Ok(false);
    }

    if config.debug {
        debug!(
            "Optimized layer height {:.2} within [{:.2},{:.2}] for tools [{}]",
            merged_height,
            min,
            max,
            merged_active
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",")
        );
        debug!(
            "Prime tower layer #{} can be combined with previous layer, squashing...",
            candidate.layer_num
        );
    }

    current
        .tool_change_seq
        .extend(candidate.tool_change_seq.iter().cloned());
    current.tools_active = merged_active;
    current.layer_z = candidate.layer_z;
    current.layer_height = (merged_height * 100.0).round() / 100.0;
    current.layer_end = candidate.layer_end;
    Ok(true)
}
