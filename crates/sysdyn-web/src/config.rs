//! Configuration loading.
//! Reads sysdyn.toml from the current directory or the path in the
//! SYSDYN_CONFIG env var; a missing file yields the defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;

use sysdyn_common::error::{Result, SdError};
use sysdyn_engine::Method;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 3001 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Integration method: "euler" or "rk4".
    #[serde(default)]
    pub method: Method,
    #[serde(default = "default_max_loops")]
    pub max_loops: usize,
}

fn default_max_loops() -> usize { 1000 }

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { method: Method::default(), max_loops: default_max_loops() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_plot_width")]
    pub plot_width: u32,
    #[serde(default = "default_plot_height")]
    pub plot_height: u32,
    #[serde(default = "default_diagram_width")]
    pub diagram_width: u32,
    #[serde(default = "default_diagram_height")]
    pub diagram_height: u32,
}

fn default_plot_width() -> u32 { 900 }
fn default_plot_height() -> u32 { 600 }
fn default_diagram_width() -> u32 { 900 }
fn default_diagram_height() -> u32 { 700 }

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            plot_width: default_plot_width(),
            plot_height: default_plot_height(),
            diagram_width: default_diagram_width(),
            diagram_height: default_diagram_height(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_max_bytes() -> usize { 2 * 1024 * 1024 }

impl Default for UploadConfig {
    fn default() -> Self {
        Self { max_bytes: default_max_bytes() }
    }
}

impl Config {
    /// Load from SYSDYN_CONFIG or ./sysdyn.toml; defaults when absent.
    pub fn load() -> Result<Self> {
        let path = std::env::var("SYSDYN_CONFIG").unwrap_or_else(|_| "sysdyn.toml".to_string());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| SdError::Config(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_file_missing() {
        let config = Config::load_from(Path::new("/nonexistent/sysdyn.toml")).unwrap();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.simulation.method, Method::Euler);
        assert_eq!(config.upload.max_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 8080\n\n[simulation]\nmethod = \"rk4\"").unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.simulation.method, Method::Rk4);
        assert_eq!(config.render.plot_width, 900);
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server = \"not a table\"").unwrap();
        assert!(matches!(
            Config::load_from(file.path()),
            Err(SdError::Config(_))
        ));
    }
}
