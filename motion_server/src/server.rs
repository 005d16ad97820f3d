//! Server implementation.
//!
//! An authoritative fixed-timestep loop. Each tick:
//! - drains operator console input
//! - applies gravity to airborne server-driven entities
//! - resolves every entity against its instance (read-only pass)
//! - commits every outcome (write pass)
//! - carries passengers along with their vehicles
//!
//! Determinism notes:
//! - Keep simulation in a fixed timestep.
//! - Resolution never reads wall-clock time.
//! - Entities are visited in ascending id order.

use std::collections::{BTreeMap, HashMap};

use anyhow::{bail, Context};
use motion_shared::{
    authority::Verdict,
    border::WorldBorder,
    chunk::ChunkPos,
    config::{ServerConfig, TickRate},
    console::{Console, CvarFlags, CvarValue},
    ecs::{ClientId, Entity, EntityFlags, EntityId, EntityKind, EntityStore, InstanceId},
    error::KinematicError,
    instance::Instance,
    interp::PoseBuffer,
    math::Vec3,
    motion::{MotionResolver, TickOutcome},
    physics::{BlockCollision, PhysicsConfig},
    pose::Pose,
};
use tokio::{sync::mpsc, time::Instant};
use tracing::{debug, info, warn};

/// Instance every entity spawns into unless told otherwise.
pub const DEFAULT_INSTANCE: InstanceId = InstanceId(0);

/// Server lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerState {
    /// Ticking.
    Running,
    /// `quit` was issued; the host loop should exit.
    Stopping,
}

/// Per-tick resolution counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Computed pose applied.
    pub committed: usize,
    /// Pose kept by policy (rest, no displacement, deferral, ...).
    pub kept: usize,
    /// Pose kept because the destination chunk was not resident.
    pub vetoed: usize,
    /// Invalid kinematic state; entity left untouched.
    pub rejected: usize,
}

impl TickStats {
    fn record(&mut self, outcome: &TickOutcome) {
        match outcome.verdict() {
            _ if outcome.committed() => self.committed += 1,
            Verdict::ChunkNotLoaded(_) => self.vetoed += 1,
            _ => self.kept += 1,
        }
    }
}

/// Simulation server.
pub struct SimulationServer {
    pub cfg: ServerConfig,
    pub console: Console,
    rate: TickRate,
    physics: PhysicsConfig,
    resolver: MotionResolver,
    instances: BTreeMap<InstanceId, Instance>,
    entities: EntityStore,
    history: HashMap<EntityId, PoseBuffer>,

    tick: u64,
    state: ServerState,
    last_stats: TickStats,

    /// Channel for console commands from stdin.
    console_rx: Option<mpsc::Receiver<String>>,
}

impl SimulationServer {
    /// Creates a server with one default instance and its spawn chunks loaded.
    pub fn new(cfg: ServerConfig) -> anyhow::Result<Self> {
        cfg.validate().context("validate config")?;
        let rate = cfg.tick_rate()?;

        let mut console = Console::new();
        Self::register_cvars(&mut console, &cfg, rate);

        let mut instance = Instance::new(DEFAULT_INSTANCE, cfg.border);
        let loaded = instance
            .chunks_mut()
            .load_square(ChunkPos::new(0, 0), cfg.spawn_chunk_radius);
        info!(instance = ?DEFAULT_INSTANCE, chunks = loaded, "Spawn chunks loaded");

        let mut instances = BTreeMap::new();
        instances.insert(DEFAULT_INSTANCE, instance);

        Ok(Self {
            physics: cfg.physics,
            resolver: MotionResolver::new(rate, Box::new(BlockCollision)),
            cfg,
            console,
            rate,
            instances,
            entities: EntityStore::default(),
            history: HashMap::new(),
            tick: 0,
            state: ServerState::Running,
            last_stats: TickStats::default(),
            console_rx: None,
        })
    }

    fn register_cvars(console: &mut Console, cfg: &ServerConfig, rate: TickRate) {
        console.register_cvar(
            "sv_tickrate",
            CvarValue::Int(i64::from(rate.get())),
            "Simulation ticks per second",
            CvarFlags::READ_ONLY,
        );
        console.register_cvar(
            "sv_gravity",
            CvarValue::Float(cfg.physics.gravity.y),
            "Vertical gravity in blocks/s^2",
            CvarFlags::SIMULATION,
        );
        console.register_cvar(
            "sv_terminal_speed",
            CvarValue::Float(cfg.physics.terminal_speed),
            "Fastest fall speed from gravity in blocks/s",
            CvarFlags::SIMULATION,
        );
    }

    /// Sets the console input receiver.
    pub fn set_console_input(&mut self, rx: mpsc::Receiver<String>) {
        self.console_rx = Some(rx);
    }

    pub fn state(&self) -> &ServerState {
        &self.state
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn rate(&self) -> TickRate {
        self.rate
    }

    /// Counters from the most recent tick.
    pub fn last_stats(&self) -> TickStats {
        self.last_stats
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn instance(&self, id: InstanceId) -> Option<&Instance> {
        self.instances.get(&id)
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
        self.instances.get_mut(&id)
    }

    /// Spawns an entity into the default instance.
    pub fn spawn(&mut self, kind: EntityKind, pose: Pose, velocity: Vec3, flags: EntityFlags) -> EntityId {
        let id = self.entities.spawn(|id| {
            Entity::new(id, kind, DEFAULT_INSTANCE, pose)
                .with_velocity(velocity)
                .with_flags(flags)
        });
        let mut buf = PoseBuffer::new(self.cfg.pose_history);
        buf.push(self.tick, pose);
        self.history.insert(id, buf);
        debug!(entity = ?id, ?kind, ?pose, "Spawned entity");
        id
    }

    /// Spawns an entity whose position is reported by a socket client.
    pub fn spawn_remote(
        &mut self,
        kind: EntityKind,
        pose: Pose,
        velocity: Vec3,
        flags: EntityFlags,
    ) -> (EntityId, ClientId) {
        let client = ClientId::new_unique();
        let id = self.spawn(kind, pose, velocity, flags);
        if let Some(e) = self.entities.get_mut(id) {
            e.set_controller(Some(client));
        }
        info!(entity = ?id, client = ?client, "Remote-controlled entity spawned");
        (id, client)
    }

    /// Removes an entity. Its passengers are dismounted.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.history.remove(&id);
        let removed = self.entities.remove(id)?;
        for e in self.entities.iter_mut() {
            if e.vehicle() == Some(id) {
                e.dismount();
                debug!(entity = ?e.id(), vehicle = ?id, "Passenger dismounted from removed vehicle");
            }
        }
        Some(removed)
    }

    /// Seats `passenger` on `vehicle`. Refuses a vehicle whose own chain of
    /// vehicles leads back to the passenger.
    pub fn mount(&mut self, passenger: EntityId, vehicle: EntityId) -> anyhow::Result<()> {
        if self.entities.get(passenger).is_none() {
            bail!("entity {:?} not found", passenger);
        }
        let mut link = Some(vehicle);
        let mut hops = 0;
        while let Some(current) = link {
            if current == passenger {
                bail!("{:?} already carries {:?}", passenger, vehicle);
            }
            let Some(e) = self.entities.get(current) else {
                bail!("vehicle {:?} not found", current);
            };
            hops += 1;
            if hops > self.entities.len() {
                bail!("vehicle chain of {:?} does not terminate", vehicle);
            }
            link = e.vehicle();
        }
        self.entities
            .get_mut(passenger)
            .context("entity not found")?
            .mount(vehicle);
        Ok(())
    }

    /// Applies a client position report to a socket-controlled entity.
    pub fn apply_client_report(&mut self, id: EntityId, position: Vec3, yaw: f32, pitch: f32) -> anyhow::Result<()> {
        let pose = Pose::try_new(position, yaw, pitch)?;
        let entity = self.entities.get_mut(id).context("entity not found")?;
        if !entity.is_remote_controlled() {
            bail!("entity {:?} is not controlled by a client", id);
        }
        entity.apply_report(pose);
        Ok(())
    }

    /// Smoothed pose between the two most recent commits.
    pub fn observed_pose(&self, id: EntityId, alpha: f64) -> Option<Pose> {
        self.history.get(&id).and_then(|h| h.interpolated(alpha))
    }

    /// Runs the server for a number of ticks at the configured rate.
    pub async fn run_for_ticks(&mut self, ticks: u32) -> anyhow::Result<()> {
        let dt = self.rate.interval();
        let mut next = Instant::now();

        for _ in 0..ticks {
            next += dt;
            self.step()?;
            tokio::time::sleep_until(next).await;
        }
        Ok(())
    }

    /// Executes one fixed simulation step.
    pub fn step(&mut self) -> anyhow::Result<()> {
        self.process_console_commands()?;
        self.sync_physics_cvars();
        self.apply_gravity();
        self.last_stats = self.resolve_and_commit();
        self.carry_passengers();
        self.tick += 1;

        if self.tick % (u64::from(self.rate.get()) * 10) == 0 {
            let s = self.last_stats;
            debug!(
                tick = self.tick,
                entities = self.entities.len(),
                committed = s.committed,
                kept = s.kept,
                vetoed = s.vetoed,
                rejected = s.rejected,
                "Tick summary"
            );
        }
        Ok(())
    }

    fn process_console_commands(&mut self) -> anyhow::Result<()> {
        let lines: Vec<String> = if let Some(ref mut rx) = self.console_rx {
            let mut collected = Vec::new();
            while let Ok(line) = rx.try_recv() {
                collected.push(line);
            }
            collected
        } else {
            Vec::new()
        };

        for line in lines {
            match self.exec_console(&line) {
                Ok(output) => {
                    for out in output {
                        info!("{}", out);
                    }
                }
                Err(e) => warn!(command = %line, error = %e, "Console command failed"),
            }
        }
        Ok(())
    }

    fn sync_physics_cvars(&mut self) {
        if let Some(g) = self.console.get_cvar("sv_gravity").and_then(CvarValue::as_float) {
            if g.is_finite() {
                self.physics.gravity = self.physics.gravity.with_y(g);
            }
        }
        if let Some(t) = self.console.get_cvar("sv_terminal_speed").and_then(CvarValue::as_float) {
            if t.is_finite() && t >= 0.0 {
                self.physics.terminal_speed = t;
            }
        }
    }

    /// Gravity for entities the server moves. Socket clients simulate their
    /// own fall and report the result.
    fn apply_gravity(&mut self) {
        let physics = self.physics;
        let rate = self.rate;
        for e in self.entities.iter_mut() {
            let driven = !e.has_no_gravity()
                && e.vehicle().is_none()
                && !e.is_on_ground()
                && (!e.is_remote_controlled() || e.kind().is_always_authoritative());
            if driven {
                let v = physics.apply_gravity(e.velocity(), rate);
                e.accelerate(v - e.velocity());
            }
        }
    }

    fn resolve_and_commit(&mut self) -> TickStats {
        let mut stats = TickStats::default();

        // Read pass: every outcome is computed before anything is written.
        let outcomes: Vec<(EntityId, Result<TickOutcome, KinematicError>)> = self
            .entities
            .iter()
            .filter_map(|e| match self.instances.get(&e.instance()) {
                Some(instance) => Some((e.id(), self.resolver.resolve_tick(e, instance))),
                None => {
                    warn!(entity = ?e.id(), instance = ?e.instance(), "Entity in unknown instance");
                    None
                }
            })
            .collect();

        // Write pass.
        for (id, outcome) in outcomes {
            let Some(entity) = self.entities.get_mut(id) else {
                continue;
            };
            match outcome {
                Ok(outcome) => {
                    entity.commit(&outcome);
                    stats.record(&outcome);
                    if outcome.committed() {
                        if let Some(h) = self.history.get_mut(&id) {
                            h.push(self.tick, outcome.pose());
                        }
                    }
                }
                Err(e) => {
                    stats.rejected += 1;
                    warn!(entity = ?id, error = %e, "Rejected invalid kinematic state");
                }
            }
        }
        stats
    }

    fn carry_passengers(&mut self) {
        let moves: Vec<(EntityId, Vec3)> = self
            .entities
            .iter()
            .filter_map(|e| {
                let vehicle = self.entities.get(e.vehicle()?)?;
                Some((e.id(), vehicle.pose().position))
            })
            .collect();
        for (id, position) in moves {
            if let Some(e) = self.entities.get_mut(id) {
                e.carry_to(position);
            }
        }
    }

    /// Executes a console command.
    pub fn exec_console(&mut self, line: &str) -> anyhow::Result<Vec<String>> {
        let line = line.trim();
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = tokens.first() else {
            return Ok(Vec::new());
        };
        let args = &tokens[1..];

        match command {
            "status" => Ok(self.status_lines()),
            "spawn" => self.cmd_spawn(args),
            "velocity" => {
                if args.len() < 4 {
                    bail!("usage: velocity <id> <vx> <vy> <vz>");
                }
                let id = parse_id(args[0])?;
                let v = parse_vec3(&args[1..4])?;
                let e = self.entities.get_mut(id).context("entity not found")?;
                e.set_velocity(v);
                Ok(vec![format!("{:?} velocity = {:?}", id, v)])
            }
            "report" => {
                if args.len() < 4 {
                    bail!("usage: report <id> <x> <y> <z> [yaw pitch]");
                }
                let id = parse_id(args[0])?;
                let p = parse_vec3(&args[1..4])?;
                let yaw = args.get(4).map(|s| parse_f32(s)).transpose()?.unwrap_or(0.0);
                let pitch = args.get(5).map(|s| parse_f32(s)).transpose()?.unwrap_or(0.0);
                self.apply_client_report(id, p, yaw, pitch)?;
                Ok(vec![format!("{:?} reported at {:?}", id, p)])
            }
            "mount" => {
                if args.len() < 2 {
                    bail!("usage: mount <passenger> <vehicle>");
                }
                let (passenger, vehicle) = (parse_id(args[0])?, parse_id(args[1])?);
                self.mount(passenger, vehicle)?;
                Ok(vec![format!("{:?} now rides {:?}", passenger, vehicle)])
            }
            "dismount" => {
                let id = parse_id(args.first().context("usage: dismount <id>")?)?;
                self.entities.get_mut(id).context("entity not found")?.dismount();
                Ok(vec![format!("{:?} dismounted", id)])
            }
            "remove" => {
                let id = parse_id(args.first().context("usage: remove <id>")?)?;
                self.remove(id).context("entity not found")?;
                Ok(vec![format!("{:?} removed", id)])
            }
            "chunk" => self.cmd_chunk(args),
            "floor" => {
                let y: i32 = args
                    .first()
                    .context("usage: floor <y>")?
                    .parse()
                    .context("parse y")?;
                let placed = self.default_instance_mut()?.fill_layer(y);
                Ok(vec![format!("Placed {} blocks at y={}", placed, y)])
            }
            "border" => {
                let diameter = parse_f64(args.first().context("usage: border <diameter> [cx cz]")?)?;
                let cx = args.get(1).map(|s| parse_f64(s)).transpose()?.unwrap_or(0.0);
                let cz = args.get(2).map(|s| parse_f64(s)).transpose()?.unwrap_or(0.0);
                if !(diameter.is_finite() && diameter > 0.0) {
                    bail!("diameter must be positive");
                }
                let border = WorldBorder::new(cx, cz, diameter);
                self.default_instance_mut()?.set_border(border);
                Ok(vec![format!("Border: {:?}", border)])
            }
            "observe" => {
                if args.len() < 2 {
                    bail!("usage: observe <id> <alpha>");
                }
                let id = parse_id(args[0])?;
                let alpha = parse_f64(args[1])?;
                let pose = self.observed_pose(id, alpha).context("no pose history")?;
                Ok(vec![format!("{:?} observed at {:?}", id, pose)])
            }
            "help" => {
                let mut out = vec![
                    "Server commands: status, spawn, velocity, report, mount, dismount, remove, chunk, floor, border, observe, quit"
                        .to_string(),
                ];
                out.push(format!("Console commands: {}", self.console.command_names().join(", ")));
                Ok(out)
            }
            "quit" | "exit" => {
                info!("Server shutting down");
                self.state = ServerState::Stopping;
                Ok(vec!["Stopping".to_string()])
            }
            _ => self.console.exec(line),
        }
    }

    fn default_instance_mut(&mut self) -> anyhow::Result<&mut Instance> {
        self.instances
            .get_mut(&DEFAULT_INSTANCE)
            .context("default instance missing")
    }

    fn cmd_spawn(&mut self, args: &[&str]) -> anyhow::Result<Vec<String>> {
        let (flags_args, positional): (Vec<&str>, Vec<&str>) =
            args.iter().copied().partition(|a| a.starts_with("--"));
        if positional.len() != 4 && positional.len() != 7 {
            bail!("usage: spawn <kind> <x> <y> <z> [vx vy vz] [--remote] [--nogravity] [--nophysics]");
        }
        let kind = EntityKind::parse(positional[0])
            .with_context(|| format!("unknown entity kind '{}'", positional[0]))?;
        let position = parse_vec3(&positional[1..4])?;
        let velocity = if positional.len() == 7 {
            parse_vec3(&positional[4..7])?
        } else {
            Vec3::ZERO
        };

        let mut flags = EntityFlags::PHYSICS;
        let mut remote = false;
        for f in flags_args {
            match f {
                "--remote" => remote = true,
                "--nogravity" => flags |= EntityFlags::NO_GRAVITY,
                "--nophysics" => flags.remove(EntityFlags::PHYSICS),
                other => bail!("unknown flag {}", other),
            }
        }

        let pose = Pose::try_new(position, 0.0, 0.0)?;
        if remote {
            let (id, client) = self.spawn_remote(kind, pose, velocity, flags);
            Ok(vec![format!("Spawned {:?} {:?} for {:?}", kind, id, client)])
        } else {
            let id = self.spawn(kind, pose, velocity, flags);
            Ok(vec![format!("Spawned {:?} {:?}", kind, id)])
        }
    }

    fn cmd_chunk(&mut self, args: &[&str]) -> anyhow::Result<Vec<String>> {
        if args.len() < 3 {
            bail!("usage: chunk <load|unload> <cx> <cz>");
        }
        let cx: i32 = args[1].parse().context("parse cx")?;
        let cz: i32 = args[2].parse().context("parse cz")?;
        let chunk = ChunkPos::new(cx, cz);
        let instance = self.default_instance_mut()?;
        let changed = match args[0] {
            "load" => instance.chunks_mut().load(chunk),
            "unload" => instance.unload_chunk(chunk),
            other => bail!("unknown chunk action '{}'", other),
        };
        Ok(vec![format!("chunk {} {:?}: {}", args[0], chunk, if changed { "ok" } else { "no change" })])
    }

    fn status_lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        out.push(format!("Server state: {:?}", self.state));
        out.push(format!("Tick: {} @ {} Hz", self.tick, self.rate.get()));
        for inst in self.instances.values() {
            out.push(format!(
                "Instance {:?}: {} chunks, {} solid blocks, border {:?}",
                inst.id(),
                inst.chunks().len(),
                inst.solid_count(),
                inst.border()
            ));
        }
        let s = self.last_stats;
        out.push(format!(
            "Last tick: committed={} kept={} vetoed={} rejected={}",
            s.committed, s.kept, s.vetoed, s.rejected
        ));
        out.push(format!("Entities: {}", self.entities.len()));
        for e in self.entities.iter() {
            out.push(format!(
                "  {:?} {:?} pos={:?} vel={:?} ground={} remote={}",
                e.id(),
                e.kind(),
                e.pose().position,
                e.velocity(),
                e.is_on_ground(),
                e.is_remote_controlled()
            ));
        }
        out
    }
}

fn parse_id(s: &str) -> anyhow::Result<EntityId> {
    let raw = s.trim_start_matches('#');
    Ok(EntityId(raw.parse().with_context(|| format!("parse entity id '{}'", s))?))
}

fn parse_f64(s: &str) -> anyhow::Result<f64> {
    s.parse().with_context(|| format!("parse number '{}'", s))
}

fn parse_f32(s: &str) -> anyhow::Result<f32> {
    s.parse().with_context(|| format!("parse angle '{}'", s))
}

fn parse_vec3(parts: &[&str]) -> anyhow::Result<Vec3> {
    Ok(Vec3::new(parse_f64(parts[0])?, parse_f64(parts[1])?, parse_f64(parts[2])?))
}
