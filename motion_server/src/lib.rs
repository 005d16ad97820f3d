//! `motion_server`
//!
//! Host for per-tick motion resolution:
//! - Fixed timestep simulation loop
//! - Entity and instance management
//! - Gravity for server-driven entities
//! - Client position reports for socket-controlled entities
//! - Operator console

pub mod cli;
pub mod server;

pub use server::{ServerState, SimulationServer, TickStats};
