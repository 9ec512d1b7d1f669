//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use uuid::Uuid;

use crate::util::rate_limit::INTENT_RATE_LIMIT;
use crate::util::time::DEFAULT_TPS;
use crate::world::{BlockPos, Region, Vec3, SECTION_SIZE};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed origin for the status surface, `*` for any
    pub client_origin: String,

    /// Simulation ticks per second
    pub tick_rate: u32,
    pub finalize_ticks: u32,
    pub start_countdown_ticks: u32,
    /// Players needed on each side before Waiting starts a round (0 = never)
    pub auto_start_players: usize,

    /// Privilege catalog
    pub operators: Vec<Uuid>,

    /// Where competitive play is legal
    pub arena_region: Region,
    pub lobby_spawn: Vec3,
    pub freeze_tolerance: f64,

    pub world_seed: u64,
    pub world_min_y: i32,
    pub world_height: i32,
    /// Grass level of the generated terrain
    pub surface_y: i32,

    /// Gameplay intents per player per second
    pub intent_rate_limit: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        let tick_rate: u32 = parse_or(&lookup, "TICK_RATE", DEFAULT_TPS)?;
        if !(1..=200).contains(&tick_rate) {
            return Err(ConfigError::invalid("TICK_RATE", tick_rate));
        }

        let world_height: i32 = parse_or(&lookup, "WORLD_HEIGHT", 384)?;
        if world_height <= 0 || world_height % SECTION_SIZE != 0 {
            return Err(ConfigError::invalid("WORLD_HEIGHT", world_height));
        }

        let freeze_tolerance: f64 = parse_or(&lookup, "FREEZE_TOLERANCE", 0.5)?;
        if !freeze_tolerance.is_finite() || freeze_tolerance < 0.0 {
            return Err(ConfigError::invalid("FREEZE_TOLERANCE", freeze_tolerance));
        }

        let arena_min = parse_with(&lookup, "ARENA_MIN", BlockPos::new(-32, 0, -32), parse_block_pos)?;
        let arena_max = parse_with(&lookup, "ARENA_MAX", BlockPos::new(32, 64, 32), parse_block_pos)?;

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress(server_addr.clone()))?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origin: lookup("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),

            tick_rate,
            finalize_ticks: parse_or(&lookup, "FINALIZE_TICKS", 100)?,
            start_countdown_ticks: parse_or(&lookup, "START_COUNTDOWN_TICKS", 100)?,
            auto_start_players: parse_or(&lookup, "AUTO_START_PLAYERS", 0)?,

            operators: parse_with(&lookup, "OPERATORS", Vec::new(), parse_operators)?,

            arena_region: Region::new(arena_min, arena_max),
            lobby_spawn: parse_with(&lookup, "LOBBY_SPAWN", Vec3::new(0.5, 65.0, 0.5), parse_vec3)?,
            freeze_tolerance,

            world_seed: parse_or(&lookup, "WORLD_SEED", 0)?,
            world_min_y: parse_or(&lookup, "WORLD_MIN_Y", -64)?,
            world_height,
            surface_y: parse_or(&lookup, "SURFACE_Y", 64)?,

            intent_rate_limit: parse_or(&lookup, "INTENT_RATE_LIMIT", INTENT_RATE_LIMIT)?,
        })
    }

    /// Interval between simulation ticks
    pub fn tick_interval(&self) -> std::time::Duration {
        crate::util::time::tick_duration(self.tick_rate)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    parse_with(lookup, key, default, |raw| raw.trim().parse().ok())
}

fn parse_with<F, T, P>(lookup: &F, key: &'static str, default: T, parse: P) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Option<T>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => parse(&raw).ok_or(ConfigError::Invalid { key, value: raw }),
    }
}

fn parse_triple<T: FromStr>(raw: &str) -> Option<(T, T, T)> {
    let mut parts = raw.split(',').map(|p| p.trim().parse::<T>());
    let triple = (parts.next()?.ok()?, parts.next()?.ok()?, parts.next()?.ok()?);
    match parts.next() {
        None => Some(triple),
        Some(_) => None,
    }
}

fn parse_block_pos(raw: &str) -> Option<BlockPos> {
    parse_triple::<i32>(raw).map(|(x, y, z)| BlockPos::new(x, y, z))
}

fn parse_vec3(raw: &str) -> Option<Vec3> {
    parse_triple::<f64>(raw)
        .filter(|(x, y, z)| x.is_finite() && y.is_finite() && z.is_finite())
        .map(|(x, y, z)| Vec3::new(x, y, z))
}

fn parse_operators(raw: &str) -> Option<Vec<Uuid>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Uuid::parse_str(s).ok())
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("Invalid server address: {0}")]
    InvalidAddress(String),
}

impl ConfigError {
    fn invalid(key: &'static str, value: impl ToString) -> Self {
        ConfigError::Invalid {
            key,
            value: value.to_string(),
        }
    }
}
