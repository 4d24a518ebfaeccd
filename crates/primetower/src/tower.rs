use crate::analysis::analyze_tool_status;
use crate::bands::BandLayout;
use crate::config::TowerConfig;
use crate::error::{PrimeTowerError, Result};
use crate::injection::inject_layer;
use crate::layer::{Layer, ToolChangeInfo, ToolId};
use crate::optimizer::optimize_layers;
use crate::report::PrimeTowerReport;
use crate::sequence::{InstructionList, NodeId};
use crate::types::{
    TokenKind, AFTER_LAYER_CHANGE, BEFORE_LAYER_CHANGE, TOOL_BLOCK_END, TOOL_BLOCK_START,
};
use log::{debug, info};
use std::time::Instant;

/// Prime tower plan for one print: its layers and the ring radii per tool.
#[derive(Debug, Clone, Default)]
pub struct PrimeTower {
    pub layers: Vec<Layer>,
    pub bands: BandLayout,
}

impl PrimeTower {
    /// Scan the annotated stream and build the tower layers.
    pub fn analyze(tokens: &InstructionList, config: &TowerConfig) -> Result<Self> {
        let started = Instant::now();
        let mut scan = StreamScan::new(config);

        for (id, token) in tokens.iter() {
            match &token.kind {
                TokenKind::Params { label, params } => match label.as_str() {
                    AFTER_LAYER_CHANGE => scan.after_layer_change(id, params),
                    BEFORE_LAYER_CHANGE => scan.before_layer_change(id)?,
                    TOOL_BLOCK_START | TOOL_BLOCK_END => scan.tool_block(id, label, params)?,
                    _ => {}
                },
                TokenKind::ToolChange { next_tool } => scan.tool_change(id, *next_tool),
                TokenKind::Move(_) => {}
            }
        }

        let mut layers = scan.layers;
        analyze_tool_status(&mut layers);
        let bands = BandLayout::generate(&layers, config)?;

        if config.perf_info {
            info!(
                "PrimeTower: analysis done [elapsed: {:.2}s]",
                started.elapsed().as_secs_f64()
            );
        }

        Ok(Self { layers, bands })
    }

    /// Merge compatible adjacent layers and refresh the tool statuses.
    pub fn optimize_layers(&mut self, config: &TowerConfig) -> Result<()> {
        let started = Instant::now();
        let layers = std::mem::take(&mut self.layers);
        self.layers = optimize_layers(layers, config)?;

        if config.perf_info {
            info!(
                "PrimeTower: layer optimization done [elapsed: {:.2}s]",
                started.elapsed().as_secs_f64()
            );
        }
        Ok(())
    }

    /// Splice the tower code of every layer into `tokens`.
    pub fn inject(&self, tokens: &mut InstructionList, config: &TowerConfig) -> Result<usize> {
        let started = Instant::now();
        let mut injected = 0;
        for layer in &self.layers {
            injected += inject_layer(layer, &self.bands, tokens, config)?;
        }

        if config.perf_info {
            info!(
                "PrimeTower: injection done [elapsed: {:.2}s]",
                started.elapsed().as_secs_f64()
            );
        }
        Ok(injected)
    }

    pub fn report(&self) -> PrimeTowerReport {
        PrimeTowerReport::from_layers(&self.layers)
    }
}

/// State of the single forward scan over the token stream.
struct StreamScan<'a> {
    config: &'a TowerConfig,
    layers: Vec<Layer>,
}

impl<'a> StreamScan<'a> {
    fn new(config: &'a TowerConfig) -> Self {
        Self {
            config,
            layers: vec![Layer::new(0)],
        }
    }

    fn layer_mut(&mut self) -> &mut Layer {
        if self.layers.is_empty() {
            self.layers.push(Layer::new(0));
        }
        let last = self.layers.len() - 1;
        &mut self.layers[last]
    }

    fn after_layer_change(&mut self, id: NodeId, params: &[f64]) {
        let layer_num = params.first().copied().unwrap_or(0.0).max(0.0) as usize;
        let layer_z = params.get(1).copied().unwrap_or(0.0);

        // the loaded tool is the last record of the layer being closed
        let continuing = self
            .layer_mut()
            .current_tool_mut()
            .map(|record| record.continuation());

        let previous_z = if layer_num != 0 {
            let previous_z = self.layer_mut().layer_z;
            self.layers.push(Layer::new(layer_num));
            previous_z
        } else {
            0.0
        };

        let layer = self.layer_mut();
        layer.layer_num = layer_num;
        layer.layer_z = layer_z;
        layer.layer_height = layer_z - previous_z;
        layer.layer_start = Some(id);
        // changes made before the first layer collapse into the loaded tool
        layer.tool_change_seq.clear();
        layer.continuing = continuing;
    }

    fn before_layer_change(&mut self, id: NodeId) -> Result<()> {
        let config = self.config;
        let layer = self.layer_mut();
        layer.layer_end = Some(id);

        let toolset: Vec<ToolId> = layer.tools_sequence().map(|tc| tc.tool_id).collect();
        let max = config.max_layer_height(&toolset)?;
        if layer.layer_height > max {
            return Err(PrimeTowerError::LayerHeight {
                layer_num: layer.layer_num,
                height: layer.layer_height,
                min: config.min_layer_height(&toolset)?,
                max,
                tools: toolset
                    .iter()
                    .map(|tool| format!("T{tool}"))
                    .collect::<Vec<_>>()
                    .join(","),
            });
        }
        Ok(())
    }

    fn tool_change(&mut self, id: NodeId, next_tool: i64) {
        if next_tool < 0 {
            return;
        }
        let info = ToolChangeInfo::new(next_tool as ToolId, id);
        let debug_enabled = self.config.debug;
        let layer = self.layer_mut();
        if debug_enabled {
            debug!(
                "PrimeTower - Added tool T{} to layer #{}",
                next_tool, layer.layer_num
            );
        }
        layer.tool_change_seq.push(info);
    }

    fn tool_block(&mut self, id: NodeId, label: &str, params: &[f64]) -> Result<()> {
        let tool = params.first().copied().unwrap_or(-1.0) as i64;
        if tool == -1 {
            return Ok(());
        }

        let mismatch = |expected: String| PrimeTowerError::BlockMarkerMismatch {
            label: label.to_string(),
            tool,
            expected,
        };
        let layer = self.layer_mut();
        let record = layer
            .current_tool_mut()
            .ok_or_else(|| mismatch("no tool".to_string()))?;
        if record.tool_id as i64 != tool {
            return Err(mismatch(format!("T{}", record.tool_id)));
        }
        if label == TOOL_BLOCK_START {
            record.mark_block_start(id);
        } else {
            record.mark_block_end(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamBuilder;
    use approx::assert_relative_eq;
    use std::collections::BTreeSet;

    fn config() -> TowerConfig {
        TowerConfig::default()
    }

    #[test]
    fn test_layers_and_heights() {
        let mut b = StreamBuilder::new();
        b.tool_change(0);
        for (n, z) in [(0, 0.2), (1, 0.4), (2, 0.55)] {
            b.layer(n, z, |b| {
                b.tool_block(0, |b| {
                    b.extrude_to(1.0, 1.0, 0.1);
                });
            });
        }
        let tokens = b.finish();

        let tower = PrimeTower::analyze(&tokens, &config()).unwrap();
        assert_eq!(tower.layers.len(), 3);
        assert_relative_eq!(tower.layers[0].layer_height, 0.2);
        assert_relative_eq!(tower.layers[1].layer_height, 0.2, epsilon = 1e-9);
        assert_relative_eq!(tower.layers[2].layer_height, 0.15, epsilon = 1e-9);
        assert!(tower.layers.iter().all(|l| l.layer_start.is_some() && l.layer_end.is_some()));
    }

    #[test]
    fn test_pre_layer_tool_becomes_continuing() {
        let mut b = StreamBuilder::new();
        b.tool_change(1);
        b.layer(0, 0.2, |b| {
            b.tool_block(1, |b| {
                b.extrude_to(1.0, 1.0, 0.1);
            });
        });
        let tokens = b.finish();

        let tower = PrimeTower::analyze(&tokens, &config()).unwrap();
        let layer = &tower.layers[0];
        assert!(layer.tool_change_seq.is_empty());
        let continuing = layer.continuing.as_ref().unwrap();
        assert_eq!(continuing.tool_id, 1);
        assert!(continuing.block_start.is_some());
        assert!(continuing.block_end.is_some());
        assert_eq!(layer.tools_active, BTreeSet::from([1]));
    }

    #[test]
    fn test_block_markers_recorded_per_layer() {
        let mut b = StreamBuilder::new();
        b.tool_change(0);
        b.layer(0, 0.2, |b| {
            b.tool_block(0, |b| {
                b.extrude_to(1.0, 1.0, 0.1);
            });
        });
        b.layer(1, 0.4, |b| {
            b.tool_block(0, |b| {
                b.extrude_to(2.0, 1.0, 0.1);
            });
            b.tool_change(1);
            b.tool_block(1, |b| {
                b.extrude_to(2.0, 2.0, 0.1);
            });
        });
        let tokens = b.finish();

        let tower = PrimeTower::analyze(&tokens, &config()).unwrap();
        let first = tower.layers[0].continuing.as_ref().unwrap();
        let second = tower.layers[1].continuing.as_ref().unwrap();
        assert_ne!(first.block_end, second.block_end);
        assert!(second.block_end.unwrap() > first.block_end.unwrap());
        assert_eq!(tower.layers[1].tool_change_seq.len(), 1);
        assert!(tower.layers[1].tool_change_seq[0].block_start.is_some());
    }

    #[test]
    fn test_layer_opening_with_tool_change_keeps_previous_block_end() {
        let mut b = StreamBuilder::new();
        b.tool_change(0);
        let mut t1_end = None;
        b.layer(0, 0.2, |b| {
            b.tool_block(0, |b| {
                b.extrude_to(1.0, 1.0, 0.1);
            });
            b.tool_change(1);
            b.tool_block_start(1);
            b.extrude_to(2.0, 1.0, 0.1);
            t1_end = Some(b.tool_block_end(1));
        });
        b.layer(1, 0.4, |b| {
            b.tool_change(0);
            b.tool_block(0, |b| {
                b.extrude_to(2.0, 2.0, 0.1);
            });
        });
        let tokens = b.finish();

        let tower = PrimeTower::analyze(&tokens, &config()).unwrap();
        let continuing = tower.layers[1].continuing.as_ref().unwrap();
        assert_eq!(continuing.tool_id, 1);
        assert_eq!(continuing.block_start, None);
        assert_eq!(continuing.block_end, t1_end);
    }

    #[test]
    fn test_no_op_tool_change_ignored() {
        let mut b = StreamBuilder::new();
        b.tool_change(0);
        b.layer(0, 0.2, |b| {
            b.tool_change(-1);
            b.tool_block(-1, |b| {
                b.extrude_to(1.0, 1.0, 0.1);
            });
        });
        let tokens = b.finish();

        let tower = PrimeTower::analyze(&tokens, &config()).unwrap();
        assert!(tower.layers[0].tool_change_seq.is_empty());
    }

    #[test]
    fn test_block_marker_mismatch() {
        let mut b = StreamBuilder::new();
        b.tool_change(0);
        b.layer(0, 0.2, |b| {
            b.tool_block(1, |b| {
                b.extrude_to(1.0, 1.0, 0.1);
            });
        });
        let tokens = b.finish();

        let err = PrimeTower::analyze(&tokens, &config()).unwrap_err();
        assert!(matches!(
            err,
            PrimeTowerError::BlockMarkerMismatch { tool: 1, .. }
        ));
    }

    #[test]
    fn test_layer_height_violation() {
        let mut b = StreamBuilder::new();
        b.tool_change(0);
        b.layer(0, 0.2, |_| {});
        b.layer(1, 0.8, |_| {});
        let tokens = b.finish();

        let err = PrimeTower::analyze(&tokens, &config()).unwrap_err();
        match err {
            PrimeTowerError::LayerHeight { layer_num, height, .. } => {
                assert_eq!(layer_num, 1);
                assert_relative_eq!(height, 0.6, epsilon = 1e-9);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_bands_sized_after_analysis() {
        let mut b = StreamBuilder::new();
        b.tool_change(0);
        b.layer(0, 0.2, |b| {
            b.tool_block(0, |b| {
                b.extrude_to(1.0, 1.0, 0.1);
            });
        });
        b.layer(1, 0.4, |b| {
            b.tool_change(1);
            b.tool_block(1, |b| {
                b.extrude_to(1.0, 2.0, 0.1);
            });
        });
        let tokens = b.finish();

        let tower = PrimeTower::analyze(&tokens, &config()).unwrap();
        assert!(tower.bands.band_radiuses.contains_key(&0));
        // T1 only prints on layer 1 so it is idle on layer 0
        assert!(tower.bands.band_radiuses.contains_key(&1));
    }
}
