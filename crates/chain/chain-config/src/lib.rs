mod config;

pub use config::{ChainConfig, ConfigError, SimConfig};
