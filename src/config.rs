use anyhow::{anyhow, ensure, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub generation: Option<GenerationConfig>,
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// Order table to (re)write.
    pub output: PathBuf,
    pub regions: Vec<RegionConfig>,
    #[serde(default = "default_points_per_region")]
    pub points_per_region: usize,
    #[serde(default = "default_true")]
    pub with_hotspots: bool,
    pub seed: Option<u64>,
    /// Fail the run when any region comes up short instead of warning.
    #[serde(default)]
    pub strict: bool,
    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,
    #[serde(default = "default_end_date")]
    pub end_date: NaiveDate,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegionConfig {
    pub name: String,
    /// GeoJSON file holding the region's polygon(s).
    pub polygon: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Order table to serve.
    pub data: PathBuf,
    pub static_dir: Option<PathBuf>,
    #[serde(default = "default_heatmap_cell")]
    pub heatmap_cell_deg: f64,
    #[serde(default = "default_cluster_cell")]
    pub cluster_cell_deg: f64,
}

fn default_points_per_region() -> usize {
    10_000
}

fn default_true() -> bool {
    true
}

fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn default_end_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or(NaiveDate::MAX)
}

fn default_heatmap_cell() -> f64 {
    0.005
}

fn default_cluster_cell() -> f64 {
    0.01
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn generation(&self) -> Result<&GenerationConfig> {
        self.generation
            .as_ref()
            .ok_or_else(|| anyhow!("Config has no [generation] section"))
    }

    pub fn server(&self) -> Result<&ServerConfig> {
        self.server
            .as_ref()
            .ok_or_else(|| anyhow!("Config has no [server] section"))
    }

    fn validate(&self) -> Result<()> {
        if let Some(generation) = &self.generation {
            ensure!(!generation.regions.is_empty(), "[generation] lists no regions");
            ensure!(
                generation.start_date < generation.end_date,
                "start_date {} must precede end_date {}",
                generation.start_date,
                generation.end_date
            );
        }
        if let Some(server) = &self.server {
            for (key, value) in [
                ("heatmap_cell_deg", server.heatmap_cell_deg),
                ("cluster_cell_deg", server.cluster_cell_deg),
            ] {
                ensure!(value.is_finite() && value > 0.0, "{} must be positive, got {}", key, value);
            }
        }
        Ok(())
    }
}
