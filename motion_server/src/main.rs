//! Standalone server binary.
//!
//! Usage:
//!   cargo run -p motion_server -- [--config motion.json] [--tick-hz 20] [--spawn-radius 4]
//!
//! Console commands:
//!   spawn <kind> x y z [vx vy vz] [--remote] [--nogravity] [--nophysics]
//!   velocity <id> vx vy vz
//!   report <id> x y z [yaw pitch]
//!   chunk load|unload cx cz
//!   floor <y>
//!   border <diameter> [cx cz]
//!   status         - Show server status
//!   quit           - Shutdown server

use std::io::{BufRead, Write};

use anyhow::Context;
use clap::Parser;
use motion_server::{cli::CliArgs, ServerState, SimulationServer};
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let cfg = args.resolve_config().context("load config")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cfg.log_filter.as_str().into()),
        )
        .init();

    info!(
        tick_hz = cfg.tick_hz,
        spawn_radius = cfg.spawn_chunk_radius,
        border = cfg.border.diameter,
        "Starting server"
    );

    let mut server = SimulationServer::new(cfg).context("create server")?;

    let (console_tx, console_rx) = mpsc::channel::<String>(32);
    server.set_console_input(console_rx);

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Server ready. Type 'help' for commands, 'status' for info, 'quit' to exit.");
    println!();

    let tick_interval = server.rate().interval();
    let mut next_tick = tokio::time::Instant::now();

    while *server.state() == ServerState::Running {
        server.step()?;
        next_tick += tick_interval;
        tokio::time::sleep_until(next_tick).await;
    }

    info!(tick = server.tick(), "Server stopped");
    Ok(())
}
