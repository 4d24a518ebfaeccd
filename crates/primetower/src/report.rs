use crate::layer::Layer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Summary of the generated tower: how many layers, grouped by height.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimeTowerReport {
    pub num_layers: usize,
    /// Layer count keyed by height in mm, formatted with 2 decimals.
    pub layers_by_height: BTreeMap<String, usize>,
}

impl PrimeTowerReport {
    pub fn from_layers(layers: &[Layer]) -> Self {
        let mut layers_by_height = BTreeMap::new();
        for layer in layers {
            *layers_by_height
                .entry(format!("{:.2}", layer.layer_height))
                .or_insert(0) += 1;
        }
        Self {
            num_layers: layers.len(),
            layers_by_height,
        }
    }
}

impl fmt::Display for PrimeTowerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Prime Tower Info :")?;
        writeln!(f, " - num layers : {}", self.num_layers)?;
        for (height, count) in &self.layers_by_height {
            writeln!(f, "   - {height}mm : {count} layers")?;
        }
        Ok(())
    }
}
