use crate::error::{PrimeTowerError, Result};
use crate::layer::ToolId;
use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

/// Per-tool printing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub nozzle_diameter: f64,
    pub filament_diameter: f64,
    /// Flow multiplier applied to every extrusion, e.g. 0.95 for 95%.
    #[serde(default = "default_multiplier")]
    pub extrusion_multiplier: f64,
    pub min_layer_height: f64,
    pub max_layer_height: f64,
}

fn default_multiplier() -> f64 {
    1.0
}

impl ToolSpec {
    /// A tool with common 1.75mm filament and layer limits derived from the nozzle.
    pub fn with_nozzle(nozzle_diameter: f64) -> Self {
        Self {
            nozzle_diameter,
            filament_diameter: 1.75,
            extrusion_multiplier: 1.0,
            min_layer_height: 0.05,
            max_layer_height: nozzle_diameter * 0.75,
        }
    }
}

/// Printer and prime tower configuration shared (read-only) by every stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TowerConfig {
    /// Tools indexed by tool id.
    pub tools: Vec<ToolSpec>,
    /// Extrusion width as a multiple of the nozzle diameter.
    pub extrusion_width_ratio: f64,

    pub prime_tower_x: f64,
    pub prime_tower_y: f64,
    /// Nominal radius the brim and bands grow outward from.
    pub prime_tower_r: f64,
    /// Number of rings each tool prints per layer once past the brim.
    pub prime_tower_band_width: usize,
    pub prime_tower_band_num_faces: usize,
    /// Number of brim rings each tool prints per layer.
    pub brim_width: usize,
    /// Layers (counted from 0) that print the brim instead of the band.
    pub brim_height: usize,

    /// Extrusion feed rate inside the tower (mm/min).
    pub prime_tower_print_speed: f64,
    /// Travel feed rate to and from the tower (mm/min).
    pub prime_tower_move_speed: f64,

    /// Layer limits for an empty toolset.
    pub default_min_layer_height: f64,
    pub default_max_layer_height: f64,

    pub debug: bool,
    pub gcode_verbose: bool,
    pub perf_info: bool,
}

impl Default for TowerConfig {
    fn default() -> Self {
        Self {
            tools: vec![ToolSpec::with_nozzle(0.4), ToolSpec::with_nozzle(0.4)],
            extrusion_width_ratio: 1.125,
            prime_tower_x: 100.0,
            prime_tower_y: 100.0,
            prime_tower_r: 5.0,
            prime_tower_band_width: 2,
            prime_tower_band_num_faces: 36,
            brim_width: 3,
            brim_height: 1,
            prime_tower_print_speed: 1800.0,
            prime_tower_move_speed: 9000.0,
            default_min_layer_height: 0.05,
            default_max_layer_height: 0.3,
            debug: false,
            gcode_verbose: false,
            perf_info: false,
        }
    }
}

impl TowerConfig {
    /// Load a configuration from the provided path. Missing files yield the defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let data = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
        let config: TowerConfig =
            serde_json::from_slice(&data).context("deserialize prime tower config")?;
        config
            .validate()
            .with_context(|| format!("validate config {}", path.display()))?;
        Ok(config)
    }

    /// Persist the configuration to the provided path, ensuring the directory exists.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create config directory {}", parent.display()))?;
        }

        let data = serde_json::to_vec_pretty(self).context("serialize config to JSON bytes")?;
        fs::write(path, data).with_context(|| format!("write config {}", path.display()))
    }

    /// Resolve the default config path (`~/.primetower/config.json`).
    pub fn default_config_path() -> anyhow::Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("could not determine home directory"))?;
        Ok(home.join(".primetower").join("config.json"))
    }

    /// Check that the numbers make sense before running the pipeline.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(PrimeTowerError::InvalidConfig { reason });

        if self.prime_tower_band_num_faces == 0 {
            return invalid("prime_tower_band_num_faces must be at least 1".into());
        }
        if self.prime_tower_r <= 0.0 {
            return invalid(format!("prime_tower_r must be positive, got {}", self.prime_tower_r));
        }
        for (id, tool) in self.tools.iter().enumerate() {
            if tool.nozzle_diameter <= 0.0 || tool.filament_diameter <= 0.0 {
                return invalid(format!("T{id}: diameters must be positive"));
            }
            if tool.min_layer_height > tool.max_layer_height {
                return invalid(format!(
                    "T{id}: min_layer_height {} above max_layer_height {}",
                    tool.min_layer_height, tool.max_layer_height
                ));
            }
        }
        Ok(())
    }

    pub fn tool(&self, tool: ToolId) -> Result<&ToolSpec> {
        self.tools
            .get(tool)
            .ok_or(PrimeTowerError::UnknownTool { tool })
    }

    pub fn nozzle_diameter(&self, tool: ToolId) -> Result<f64> {
        Ok(self.tool(tool)?.nozzle_diameter)
    }

    /// Filament length to feed for an extrusion of `distance` at `layer_height`.
    ///
    /// Uses the rounded-rectangle cross-section `h * (w - h * (1 - pi/4))`.
    pub fn calculate_e(&self, tool: ToolId, layer_height: f64, distance: f64) -> Result<f64> {
        let spec = self.tool(tool)?;
        let width = spec.nozzle_diameter * self.extrusion_width_ratio;
        let section = layer_height * (width - layer_height * (1.0 - PI / 4.0));
        let filament_area = PI * (spec.filament_diameter / 2.0).powi(2);
        let e = section.max(0.0) * distance / filament_area * spec.extrusion_multiplier;
        Ok((e * 100_000.0).round() / 100_000.0)
    }

    /// Smallest layer height every tool of the set can print.
    pub fn min_layer_height<'a, I>(&self, tools: I) -> Result<f64>
    where
        I: IntoIterator<Item = &'a ToolId>,
    {
        let mut result: Option<f64> = None;
        for tool in tools {
            let min = self.tool(*tool)?.min_layer_height;
            result = Some(result.map_or(min, |current| current.max(min)));
        }
        Ok(result.unwrap_or(self.default_min_layer_height))
    }

    /// Largest layer height every tool of the set can print.
    pub fn max_layer_height<'a, I>(&self, tools: I) -> Result<f64>
    where
        I: IntoIterator<Item = &'a ToolId>,
    {
        let mut result: Option<f64> = None;
        for tool in tools {
            let max = self.tool(*tool)?.max_layer_height;
            result = Some(result.map_or(max, |current| current.min(max)));
        }
        Ok(result.unwrap_or(self.default_max_layer_height))
    }
}
