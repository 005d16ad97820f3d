//! Command-line arguments for the server binary.

use std::path::PathBuf;

use clap::Parser;
use motion_shared::config::ServerConfig;

/// Server command-line arguments.
///
/// CLI values override settings loaded from the config file.
#[derive(Parser, Debug, Default)]
#[command(name = "server", about = "Authoritative entity motion server")]
pub struct CliArgs {
    /// Path to a JSON config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Simulation ticks per second.
    #[arg(long)]
    pub tick_hz: Option<u32>,

    /// Chunks loaded around the origin at startup.
    #[arg(long)]
    pub spawn_radius: Option<i32>,

    /// World border diameter of the default instance.
    #[arg(long)]
    pub border_diameter: Option<f64>,

    /// `tracing` filter, e.g. `info` or `motion_shared=trace`.
    #[arg(long)]
    pub log_filter: Option<String>,
}

impl CliArgs {
    /// Loads the config file if one was given, then applies CLI overrides.
    pub fn resolve_config(&self) -> anyhow::Result<ServerConfig> {
        let mut cfg = match self.config {
            Some(ref path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        self.apply_overrides(&mut cfg);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_overrides(&self, cfg: &mut ServerConfig) {
        if let Some(hz) = self.tick_hz {
            cfg.tick_hz = hz;
        }
        if let Some(r) = self.spawn_radius {
            cfg.spawn_chunk_radius = r;
        }
        if let Some(d) = self.border_diameter {
            cfg.border.diameter = d;
        }
        if let Some(ref filter) = self.log_filter {
            cfg.log_filter = filter.clone();
        }
    }
}
