use crate::config::TowerConfig;
use crate::error::{PrimeTowerError, Result};
use crate::layer::{Layer, ToolId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Concentric ring radii each tool prints, per tower zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BandLayout {
    /// Steady-state rings, used from `brim_height` upward.
    pub band_radiuses: BTreeMap<ToolId, Vec<f64>>,
    /// Anchoring rings, used below `brim_height`.
    pub brim_radiuses: BTreeMap<ToolId, Vec<f64>>,
    pub brim_height: usize,
}

impl BandLayout {
    /// Size the brim and band rings from the first layer's deposition order.
    pub fn generate(layers: &[Layer], config: &TowerConfig) -> Result<Self> {
        let mut layout = BandLayout {
            brim_height: config.brim_height,
            ..Self::default()
        };
        let Some(first) = layers.first() else {
            return Ok(layout);
        };

        // Enabled tools in sequence, then the parked ones in id order
        let mut order: Vec<ToolId> = first.tools_sequence().map(|tc| tc.tool_id).collect();
        order.extend(first.tools_idle.iter().copied());

        layout.brim_radiuses = outward_rings(&order, config.brim_width, config)?;
        if let Some(last) = order.last() {
            let anchor = inward_rings(config)?;
            if let Some(rings) = layout.brim_radiuses.get_mut(last) {
                let outward = std::mem::take(rings);
                *rings = anchor.into_iter().chain(outward).collect();
            }
        }

        layout.band_radiuses = outward_rings(&order, config.prime_tower_band_width, config)?;
        Ok(layout)
    }

    /// Rings for `tool` at `layer_num`: brim below the brim height, band above.
    pub fn bands(&self, layer_num: usize, tool: ToolId) -> Result<&[f64]> {
        let table = if layer_num < self.brim_height {
            &self.brim_radiuses
        } else {
            &self.band_radiuses
        };
        table
            .get(&tool)
            .map(Vec::as_slice)
            .ok_or(PrimeTowerError::MissingBands { tool })
    }
}

/// Step outward from the nominal radius, half a nozzle at a time, `width` rings per tool.
fn outward_rings(
    order: &[ToolId],
    width: usize,
    config: &TowerConfig,
) -> Result<BTreeMap<ToolId, Vec<f64>>> {
    let mut rings = BTreeMap::new();
    let mut current_r = config.prime_tower_r;

    for &tool in order {
        let half = config.nozzle_diameter(tool)? / 2.0;
        let tool_rings: &mut Vec<f64> = rings.entry(tool).or_default();
        tool_rings.clear();
        for _ in 0..width {
            current_r += half;
            tool_rings.push(current_r);
            current_r += half;
        }
    }

    Ok(rings)
}

/// Rings filling the tower core down to 1.5 nozzle diameters, innermost first.
fn inward_rings(config: &TowerConfig) -> Result<Vec<f64>> {
    let nozzle = config.nozzle_diameter(0)?;
    let mut current_r = config.prime_tower_r;
    let mut rings = Vec::new();

    while current_r > 1.5 * nozzle {
        current_r -= nozzle / 2.0;
        rings.push(current_r);
        current_r -= nozzle / 2.0;
    }

    rings.reverse();
    Ok(rings)
}
