//! Configuration system.
//!
//! Loads server configuration from JSON strings/files. The tick rate is read
//! once at startup and handed out as a [`TickRate`] value; nothing mutates it
//! afterwards.

use std::path::Path;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::{border::WorldBorder, physics::PhysicsConfig};

/// Simulation ticks per second. Always non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickRate(u32);

impl TickRate {
    pub fn new(ticks_per_second: u32) -> anyhow::Result<Self> {
        if ticks_per_second == 0 {
            bail!("tick rate must be at least 1 tick per second");
        }
        Ok(Self(ticks_per_second))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64
    }

    /// Wall-clock length of one tick.
    pub fn interval(self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.as_f64())
    }
}

/// Root server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Fixed simulation tick rate.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    /// Playable region of the default instance.
    #[serde(default)]
    pub border: WorldBorder,
    #[serde(default)]
    pub physics: PhysicsConfig,
    /// Chunks loaded around the origin at startup, as a square radius.
    #[serde(default = "default_spawn_chunk_radius")]
    pub spawn_chunk_radius: i32,
    /// Committed poses kept per entity for observer smoothing.
    #[serde(default = "default_pose_history")]
    pub pose_history: usize,
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_tick_hz() -> u32 {
    20
}

fn default_spawn_chunk_radius() -> i32 {
    4
}

fn default_pose_history() -> usize {
    8
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
            border: WorldBorder::default(),
            physics: PhysicsConfig::default(),
            spawn_chunk_radius: default_spawn_chunk_radius(),
            pose_history: default_pose_history(),
            log_filter: default_log_filter(),
        }
    }
}

impl ServerConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn tick_rate(&self) -> anyhow::Result<TickRate> {
        TickRate::new(self.tick_hz)
    }

    /// Checks values serde cannot.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.tick_rate()?;
        if !(self.border.diameter.is_finite() && self.border.diameter > 0.0) {
            bail!("border diameter must be positive, got {}", self.border.diameter);
        }
        if !(self.border.center_x.is_finite() && self.border.center_z.is_finite()) {
            bail!("border center must be finite");
        }
        if !self.physics.gravity.is_finite() {
            bail!("gravity must be finite");
        }
        Ok(())
    }
}
