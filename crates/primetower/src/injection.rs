//! Splices prime tower G-code into the instruction stream.
//!
//! Every tool printing in a tower layer gets its rings injected right after
//! one marker token. The injected block travels in, prints, and travels back
//! so that the machine state after the block matches the state the original
//! stream expects at the marker.

use crate::bands::BandLayout;
use crate::config::TowerConfig;
use crate::error::{PrimeTowerError, Result};
use crate::geometry::ring;
use crate::layer::{Layer, ToolChangeInfo, ToolId};
use crate::sequence::{InstructionList, NodeId};
use crate::types::{GCodeCommand, Retraction, Token, BEFORE_LAYER_CHANGE};
use kurbo::Point;
use log::{debug, warn};
use std::collections::BTreeSet;

/// Inject tower code for one layer. Returns the number of blocks spliced in.
pub fn inject_layer(
    layer: &Layer,
    bands: &BandLayout,
    tokens: &mut InstructionList,
    config: &TowerConfig,
) -> Result<usize> {
    if layer.is_terminal() {
        if config.debug {
            debug!("One tool ACTIVE and no more IDLE tools - can stop generating prime tower");
        }
        return Ok(0);
    }

    let mut filled_idle_gaps = false;
    let mut injected = 0;
    let mut printed = BTreeSet::new();

    for (index, tool_change) in layer.tools_sequence().enumerate() {
        let tool = tool_change.tool_id;
        if !printed.insert(tool) {
            // rings of this tool are already in the layer
            if config.debug {
                debug!(
                    "T{} comes back in prime tower layer #{}, band already printed",
                    tool, layer.layer_num
                );
            }
            continue;
        }
        let inject_point = inject_point(layer, index, tool_change).ok_or(
            PrimeTowerError::MissingInjectPoint {
                layer_num: layer.layer_num,
                tool,
            },
        )?;
        let point = tokens
            .get(inject_point)
            .cloned()
            .ok_or(PrimeTowerError::InvalidMarker {
                marker: inject_point,
            })?;

        let mut block = band_gcode(layer, bands, tool, config)?;
        if config.debug {
            debug!(
                "Generated prime tower band for layer #{} for T{}",
                layer.layer_num, tool
            );
        }

        let idle = if !filled_idle_gaps && !layer.tools_idle.is_empty() {
            filled_idle_gaps = true;
            if config.debug {
                debug!(
                    "Generated prime tower idle tools infill for layer #{} with T{}",
                    layer.layer_num, tool
                );
            }
            Some(idle_tool_bands(layer, bands, tool, config)?)
        } else {
            None
        };

        inject_move_in(layer, &point, &mut block, config)?;
        if let Some(idle) = idle {
            block.append(idle);
        }
        inject_move_out(layer, &point, &mut block, config)?;

        tokens.splice_after(inject_point, block)?;
        injected += 1;
    }

    Ok(injected)
}

/// Where the `index`-th tool of the layer gets its rings.
fn inject_point(layer: &Layer, index: usize, tool_change: &ToolChangeInfo) -> Option<NodeId> {
    match index {
        0 if layer.layer_num == 0 => layer.layer_start,
        0 if layer.tool_change_seq.is_empty() => layer.layer_end,
        // de-prime into the gap with the filament already loaded
        0 => tool_change.block_end,
        _ => tool_change.block_start,
    }
}

fn g1() -> GCodeCommand {
    GCodeCommand::g1()
}

fn command(command: GCodeCommand) -> Token {
    Token::command(command)
}

/// Closed shape through `vertices`, entered with a travel to the first vertex.
fn print_shape(
    layer: &Layer,
    vertices: &[Point],
    tool: ToolId,
    config: &TowerConfig,
) -> Result<InstructionList> {
    if !layer.tools_active.contains(&tool) {
        return Err(PrimeTowerError::UnsupportedTool {
            tool,
            layer_num: layer.layer_num,
        });
    }

    let mut tokens = InstructionList::new();
    let Some(first) = vertices.first() else {
        return Ok(tokens);
    };

    tokens.push_back(command(g1().with('X', first.x).with('Y', first.y)));
    tokens.push_back(command(g1().with('F', config.prime_tower_print_speed)));

    let closing = [*first];
    let path = vertices.iter().chain(closing.iter());
    for (from, to) in vertices.iter().zip(path.skip(1)) {
        let e = config.calculate_e(tool, layer.layer_height, from.distance(*to))?;
        tokens.push_back(command(g1().with('X', to.x).with('Y', to.y).with('E', e)));
    }

    Ok(tokens)
}

fn comment_ends(tokens: &mut InstructionList, start: String, end: String) {
    if let Some(token) = tokens.front().and_then(|id| tokens.get_mut(id)) {
        token.comment = Some(start);
    }
    if let Some(token) = tokens.back().and_then(|id| tokens.get_mut(id)) {
        token.comment = Some(end);
    }
}

/// Rings of `tool` for this layer, each starting at a seam rotated by the layer number.
pub fn band_gcode(
    layer: &Layer,
    bands: &BandLayout,
    tool: ToolId,
    config: &TowerConfig,
) -> Result<InstructionList> {
    let center = Point::new(config.prime_tower_x, config.prime_tower_y);
    let mut tokens = InstructionList::new();

    for &radius in bands.bands(layer.layer_num, tool)? {
        let mut vertices = ring(center, radius, config.prime_tower_band_num_faces);
        if !vertices.is_empty() {
            let shift = layer.layer_num % vertices.len();
            vertices.rotate_right(shift);
        }
        tokens.append(print_shape(layer, &vertices, tool, config)?);
    }

    if config.gcode_verbose {
        comment_ends(
            &mut tokens,
            format!("TC-PSPP - T{tool} - Pillar - Start"),
            format!("TC-PSPP - T{tool} - Pillar - End"),
        );
    }

    Ok(tokens)
}

/// Rings of every idle tool, printed by `tool` so parked tools leave no gap.
pub fn idle_tool_bands(
    layer: &Layer,
    bands: &BandLayout,
    tool: ToolId,
    config: &TowerConfig,
) -> Result<InstructionList> {
    let center = Point::new(config.prime_tower_x, config.prime_tower_y);
    let mut tokens = InstructionList::new();

    for &idle_tool in &layer.tools_idle {
        let mut band = InstructionList::new();
        for &radius in bands.bands(layer.layer_num, idle_tool)? {
            let vertices = ring(center, radius, config.prime_tower_band_num_faces);
            band.append(print_shape(layer, &vertices, tool, config)?);
        }

        // travel to the first ring retracted
        if let Some(head) = band.front() {
            band.insert_after(head, command(GCodeCommand::detract()))?;
            band.insert_before(head, command(GCodeCommand::retract()))?;
        }
        tokens.append(band);
    }

    if config.gcode_verbose {
        let layer_num = layer.layer_num;
        comment_ends(
            &mut tokens,
            format!("TC-PSPP - Prime tower idle tool infill for layer #{layer_num} - start"),
            format!("TC-PSPP - Prime tower idle tool infill for layer #{layer_num} - end"),
        );
    }

    Ok(tokens)
}

/// Wrap the first move of `block` with the travel from the inject point.
///
/// Emits `[Z] [G10] F <first move> [G11] [Z]`. The tower Z move goes before
/// the first XY move when climbing (or when the current Z is unknown) and
/// after it when descending.
pub fn inject_move_in(
    layer: &Layer,
    point: &Token,
    block: &mut InstructionList,
    config: &TowerConfig,
) -> Result<()> {
    let state = &point.state_post;
    let tower_z = layer.layer_z;
    let z_before = state.z.map_or(true, |z| z < tower_z);
    let z_after = state.z.map_or(false, |z| z > tower_z);

    let mut before = Vec::new();
    if z_before {
        before.push(command(g1().with('Z', tower_z)));
    }
    if state.retraction == Retraction::Unretracted {
        before.push(command(GCodeCommand::retract()).with_comment("move-in retract"));
    }
    before.push(command(g1().with('F', config.prime_tower_move_speed)));

    let mut after = Vec::new();
    if matches!(
        state.retraction,
        Retraction::Retracted | Retraction::Unretracted
    ) {
        after.push(command(GCodeCommand::detract()).with_comment("move-in detract"));
    }
    if z_after {
        after.push(command(g1().with('Z', tower_z)));
    }

    match block.front() {
        Some(head) => {
            for token in before {
                block.insert_before(head, token)?;
            }
            let mut cursor = head;
            for token in after {
                cursor = block.insert_after(cursor, token)?;
            }
        }
        None => {
            for token in before.into_iter().chain(after) {
                block.push_back(token);
            }
        }
    }

    Ok(())
}

/// Append the travel from the tower back to the inject point.
pub fn inject_move_out(
    layer: &Layer,
    point: &Token,
    block: &mut InstructionList,
    config: &TowerConfig,
) -> Result<()> {
    let state = &point.state_post;
    let Some(z) = state.z else {
        return Err(PrimeTowerError::MalformedPosition {
            layer_num: layer.layer_num,
        });
    };

    // The layer change that follows moves on its own and expects an unretracted tool
    if point.is_label(BEFORE_LAYER_CHANGE) {
        if state.retraction == Retraction::Retracted {
            block.push_back(command(GCodeCommand::retract()).with_comment("move-out retract"));
        }
        return Ok(());
    }

    block.push_back(command(GCodeCommand::retract()).with_comment("move-out retract"));

    match state.xy() {
        Some((x, y)) => {
            let tower_z = layer.layer_z;
            let xy = command(g1().with('X', x).with('Y', y));
            let z_move = command(g1().with('Z', z));

            block.push_back(command(g1().with('F', config.prime_tower_move_speed)));
            if z < tower_z {
                block.push_back(xy);
                block.push_back(z_move);
            } else if z > tower_z {
                block.push_back(z_move);
                block.push_back(xy);
            } else {
                block.push_back(xy);
            }
            block.push_back(command(g1().with('F', state.feed_rate)));
        }
        None => {
            warn!(
                "X/Y position state not present at prime tower layer #{}; if this appears more than once the G-code is malformed",
                layer.layer_num
            );
        }
    }

    if state.retraction == Retraction::Unretracted {
        block.push_back(command(GCodeCommand::detract()).with_comment("move-out detract"));
    }

    Ok(())
}
