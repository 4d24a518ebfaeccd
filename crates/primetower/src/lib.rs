mod analysis;
mod bands;
mod config;
mod error;
mod geometry;
mod injection;
mod layer;
mod optimizer;
mod postprocessor;
mod report;
mod sequence;
mod stream;
mod tower;
mod types;

pub use analysis::analyze_tool_status;
pub use bands::BandLayout;
pub use config::*;
pub use error::{PrimeTowerError, Result};
pub use geometry::{ladder, ring};
pub use injection::{band_gcode, idle_tool_bands, inject_layer, inject_move_in, inject_move_out};
pub use layer::*;
pub use optimizer::optimize_layers;
pub use postprocessor::{render_gcode, render_token};
pub use report::PrimeTowerReport;
pub use sequence::*;
pub use stream::StreamBuilder;
pub use tower::PrimeTower;
pub use types::*;

/// High-level function: analyze → optimize (optional) → inject.
///
/// Mutates `tokens` in place and returns the summary of the tower that was
/// spliced in. On error the list may be partially injected.
pub fn process(
    tokens: &mut InstructionList,
    config: &TowerConfig,
    optimize: bool,
) -> Result<PrimeTowerReport> {
    let mut tower = PrimeTower::analyze(tokens, config)?;
    if optimize {
        tower.optimize_layers(config)?;
    }
    tower.inject(tokens, config)?;
    Ok(tower.report())
}
