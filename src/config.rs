use serde::Deserialize;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 4020;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid value for {key}: {value}")]
    InvalidOverride { key: String, value: String },
    #[error("unexpected argument '{0}'")]
    UnexpectedArgument(String),
    #[error("expected a value after '{0}'")]
    MissingValue(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "ListenerConfig::default_bind_address")]
    pub bind_address: IpAddr,
    #[serde(default = "ListenerConfig::default_port")]
    pub port: u16,
    #[serde(default = "ListenerConfig::default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,
    #[serde(default = "ListenerConfig::default_max_datagram_bytes")]
    pub max_datagram_bytes: usize,
}

impl ListenerConfig {
    const fn default_bind_address() -> IpAddr {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    }

    const fn default_port() -> u16 {
        DEFAULT_PORT
    }

    const fn default_receive_timeout_ms() -> u64 {
        10
    }

    const fn default_max_datagram_bytes() -> usize {
        65_507
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms.max(1))
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: Self::default_bind_address(),
            port: Self::default_port(),
            receive_timeout_ms: Self::default_receive_timeout_ms(),
            max_datagram_bytes: Self::default_max_datagram_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "EngineConfig::default_tick_rate_hz")]
    pub tick_rate_hz: f32,
    /// Ticks to keep the stopped view up after a scene or skybox switch.
    #[serde(default = "EngineConfig::default_scene_load_delay_ticks")]
    pub scene_load_delay_ticks: u32,
    #[serde(default)]
    pub max_frames: Option<u64>,
}

impl EngineConfig {
    const fn default_tick_rate_hz() -> f32 {
        60.0
    }

    const fn default_scene_load_delay_ticks() -> u32 {
        1
    }

    /// Falls back to the default rate when `tick_rate_hz` gives no usable period.
    pub fn target_frame_time(&self) -> Duration {
        Duration::try_from_secs_f32(1.0 / self.tick_rate_hz)
            .ok()
            .filter(|period| !period.is_zero())
            .unwrap_or_else(|| Duration::from_secs_f32(1.0 / Self::default_tick_rate_hz()))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: Self::default_tick_rate_hz(),
            scene_load_delay_ticks: Self::default_scene_load_delay_ticks(),
            max_frames: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RigConfig {
    #[serde(default)]
    pub listener: ListenerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl RigConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies `VRMATE_*` overrides. `lookup` is normally `std::env::var(..).ok()`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("VRMATE_PORT") {
            self.listener.port = parse_override("VRMATE_PORT", &value)?;
        }
        if let Some(value) = lookup("VRMATE_BIND") {
            self.listener.bind_address = parse_override("VRMATE_BIND", &value)?;
        }
        if let Some(value) = lookup("VRMATE_TICK_RATE") {
            self.engine.tick_rate_hz = parse_override("VRMATE_TICK_RATE", &value)?;
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(port) = overrides.port {
            self.listener.port = port;
        }
        if let Some(frames) = overrides.frames {
            self.engine.max_frames = Some(frames);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub port: Option<u16>,
    pub frames: Option<u64>,
}

impl CliOverrides {
    pub fn parse<I, S>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut iter = args.into_iter();
        let _ = iter.next();
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            match flag {
                "--config" => {
                    overrides.config_path = Some(PathBuf::from(next_value(&mut iter, flag)?));
                }
                "--port" => {
                    let value = next_value(&mut iter, flag)?;
                    overrides.port = Some(parse_override(flag, &value)?);
                }
                "--frames" => {
                    let value = next_value(&mut iter, flag)?;
                    overrides.frames = Some(parse_override(flag, &value)?);
                }
                _ => return Err(ConfigError::UnexpectedArgument(flag.to_string())),
            }
        }
        Ok(overrides)
    }
}

fn next_value<I, S>(iter: &mut I, flag: &str) -> Result<String, ConfigError>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    iter.next()
        .map(|value| value.as_ref().to_string())
        .ok_or_else(|| ConfigError::MissingValue(flag.to_string()))
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidOverride {
            key: key.to_string(),
            value: value.to_string(),
        })
}
