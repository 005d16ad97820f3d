//! Operator console.
//!
//! Provides:
//! - Console variables (cvars) with typed values and flags
//! - Command registration and execution
//! - Command history
//!
//! Host-specific commands (spawning, chunk control, ...) are handled by the
//! host before a line reaches [`Console::exec`].

use std::collections::{BTreeMap, HashMap, VecDeque};

use anyhow::{bail, Context};

/// Console variable value.
#[derive(Debug, Clone, PartialEq)]
pub enum CvarValue {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
}

impl CvarValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            CvarValue::Int(v) => Some(*v),
            CvarValue::Float(v) => Some(*v as i64),
            CvarValue::Bool(v) => Some(i64::from(*v)),
            CvarValue::String(s) => s.parse().ok(),
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            CvarValue::Float(v) => Some(*v),
            CvarValue::Int(v) => Some(*v as f64),
            CvarValue::String(s) => s.parse().ok(),
            CvarValue::Bool(_) => None,
        }
    }

    /// Parses user input: int, then float, then bool, then string.
    pub fn parse(input: &str) -> Self {
        if let Ok(v) = input.parse::<i64>() {
            CvarValue::Int(v)
        } else if let Ok(v) = input.parse::<f64>() {
            CvarValue::Float(v)
        } else if input == "true" {
            CvarValue::Bool(true)
        } else if input == "false" {
            CvarValue::Bool(false)
        } else {
            CvarValue::String(input.trim_matches('"').to_string())
        }
    }
}

impl std::fmt::Display for CvarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CvarValue::Int(v) => write!(f, "{}", v),
            CvarValue::Float(v) => write!(f, "{}", v),
            CvarValue::String(v) => write!(f, "\"{}\"", v),
            CvarValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

bitflags::bitflags! {
    /// Cvar flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CvarFlags: u32 {
        const NONE = 0;
        /// Fixed at startup; `set` refuses to change it.
        const READ_ONLY = 1 << 0;
        /// Change takes effect on the next tick.
        const SIMULATION = 1 << 1;
    }
}

/// Console variable metadata.
#[derive(Debug, Clone)]
pub struct Cvar {
    pub value: CvarValue,
    pub default: CvarValue,
    pub description: String,
    pub flags: CvarFlags,
}

/// Command handler function type.
pub type CommandHandler = Box<dyn Fn(&[&str], &mut ConsoleContext<'_>) -> anyhow::Result<()> + Send + Sync>;

/// Context passed to command handlers.
pub struct ConsoleContext<'a> {
    /// Output buffer for command responses.
    pub output: Vec<String>,
    cvars: &'a mut BTreeMap<String, Cvar>,
}

impl ConsoleContext<'_> {
    pub fn print(&mut self, msg: impl Into<String>) {
        self.output.push(msg.into());
    }

    pub fn cvars(&self) -> impl Iterator<Item = (&String, &Cvar)> {
        self.cvars.iter()
    }

    pub fn set_cvar(&mut self, name: &str, value: CvarValue) -> anyhow::Result<()> {
        set_in(self.cvars, name, value)
    }
}

fn set_in(cvars: &mut BTreeMap<String, Cvar>, name: &str, value: CvarValue) -> anyhow::Result<()> {
    let Some(cvar) = cvars.get_mut(name) else {
        bail!("unknown cvar: {}", name);
    };
    if cvar.flags.contains(CvarFlags::READ_ONLY) {
        bail!("{} is read-only", name);
    }
    cvar.value = value;
    Ok(())
}

/// The console.
pub struct Console {
    cvars: BTreeMap<String, Cvar>,
    commands: HashMap<String, CommandHandler>,
    history: VecDeque<String>,
    max_history: usize,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub fn new() -> Self {
        let mut console = Self {
            cvars: BTreeMap::new(),
            commands: HashMap::new(),
            history: VecDeque::new(),
            max_history: 100,
        };
        console.register_builtin_commands();
        console
    }

    fn register_builtin_commands(&mut self) {
        self.register_command("cvarlist", |_args, ctx| {
            let lines: Vec<String> = ctx
                .cvars()
                .map(|(name, cvar)| {
                    format!(
                        "  {} = {} (default: {}) - {}",
                        name, cvar.value, cvar.default, cvar.description
                    )
                })
                .collect();
            for line in lines {
                ctx.print(line);
            }
            Ok(())
        });

        self.register_command("set", |args, ctx| {
            if args.len() < 2 {
                bail!("usage: set <cvar> <value>");
            }
            let value = CvarValue::parse(&args[1..].join(" "));
            ctx.print(format!("{} = {}", args[0], value));
            ctx.set_cvar(args[0], value)
        });
    }

    /// Registers a console variable.
    pub fn register_cvar(&mut self, name: &str, default: CvarValue, description: &str, flags: CvarFlags) {
        self.cvars.insert(
            name.to_string(),
            Cvar {
                value: default.clone(),
                default,
                description: description.to_string(),
                flags,
            },
        );
    }

    /// Registers a command.
    pub fn register_command<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(&[&str], &mut ConsoleContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.commands.insert(name.to_string(), Box::new(handler));
    }

    /// Names of registered commands, sorted.
    pub fn command_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Executes a console command line.
    pub fn exec(&mut self, line: &str) -> anyhow::Result<Vec<String>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            return Ok(Vec::new());
        }

        self.history.push_back(line.to_string());
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }

        let tokens = parse_command_line(line);
        let Some((name, rest)) = tokens.split_first() else {
            return Ok(Vec::new());
        };
        let args: Vec<&str> = rest.iter().map(String::as_str).collect();

        // Bare cvar name queries it; name plus value sets it.
        if !self.commands.contains_key(name.as_str()) {
            if let Some(cvar) = self.cvars.get(name.as_str()) {
                if args.is_empty() {
                    return Ok(vec![format!(
                        "{} = {} (default: {})",
                        name, cvar.value, cvar.default
                    )]);
                }
                let value = CvarValue::parse(&args.join(" "));
                let shown = format!("{} = {}", name, value);
                set_in(&mut self.cvars, name, value)?;
                return Ok(vec![shown]);
            }
        }

        let mut ctx = ConsoleContext {
            output: Vec::new(),
            cvars: &mut self.cvars,
        };
        match self.commands.get(name.as_str()) {
            Some(handler) => handler(&args, &mut ctx).with_context(|| format!("command '{}'", name))?,
            None => ctx.print(format!("Unknown command: {}", name)),
        }
        Ok(ctx.output)
    }

    /// Gets a cvar value.
    pub fn get_cvar(&self, name: &str) -> Option<&CvarValue> {
        self.cvars.get(name).map(|c| &c.value)
    }

    /// Sets a cvar value.
    pub fn set_cvar(&mut self, name: &str, value: CvarValue) -> anyhow::Result<()> {
        set_in(&mut self.cvars, name, value)
    }

    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }
}

/// Splits a command line into tokens, keeping quoted runs together.
pub fn parse_command_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_cvar_roundtrip() {
        let mut console = Console::new();
        console.register_cvar("sv_gravity", CvarValue::Float(-9.81), "Gravity", CvarFlags::SIMULATION);

        assert_eq!(console.get_cvar("sv_gravity"), Some(&CvarValue::Float(-9.81)));

        console.exec("set sv_gravity -20").unwrap();
        assert_eq!(console.get_cvar("sv_gravity"), Some(&CvarValue::Int(-20)));

        console.exec("sv_gravity -4.5").unwrap();
        assert_eq!(console.get_cvar("sv_gravity").and_then(CvarValue::as_float), Some(-4.5));
    }

    #[test]
    fn read_only_cvar_cannot_be_set() {
        let mut console = Console::new();
        console.register_cvar("sv_tickrate", CvarValue::Int(20), "Ticks per second", CvarFlags::READ_ONLY);
        assert!(console.exec("set sv_tickrate 64").is_err());
        assert!(console.exec("sv_tickrate 64").is_err());
        assert_eq!(console.get_cvar("sv_tickrate"), Some(&CvarValue::Int(20)));

        let out = console.exec("sv_tickrate").unwrap();
        assert_eq!(out, vec!["sv_tickrate = 20 (default: 20)".to_string()]);
    }

    #[test]
    fn unknown_command_is_reported() {
        let mut console = Console::new();
        let out = console.exec("warp 9").unwrap();
        assert_eq!(out, vec!["Unknown command: warp".to_string()]);
        assert_eq!(console.history().collect::<Vec<_>>(), vec!["warp 9"]);
    }

    #[test]
    fn parse_quoted_args() {
        let tokens = parse_command_line(r#"say "hello world" test"#);
        assert_eq!(tokens, vec!["say", "hello world", "test"]);
    }
}
