use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct ChainConfig {
    #[serde(default = "defaults::log_file")]
    pub log_file: String,
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
    /// Gateway host. When unset the default network gateway is used.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "defaults::port")]
    pub port: u16,
    #[serde(default = "defaults::client_id")]
    pub client_id: i32,
    #[serde(default = "defaults::exchange")]
    pub exchange: String,
    #[serde(default = "defaults::currency")]
    pub currency: String,
    /// 1 live, 2 frozen, 3 delayed, 4 delayed frozen
    #[serde(default = "defaults::market_data_type")]
    pub market_data_type: i32,
    #[serde(default = "defaults::supported_symbols")]
    pub supported_symbols: Vec<String>,
    #[serde(default = "defaults::supported_expiries")]
    pub supported_expiries: Vec<String>,
    #[serde(default)]
    pub sim: SimConfig,
}

/// Parameters of the simulated gateway.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SimConfig {
    #[serde(default = "defaults::underlying_price")]
    pub underlying_price: f64,
    #[serde(default = "defaults::strike_step")]
    pub strike_step: f64,
    #[serde(default = "defaults::strike_count")]
    pub strike_count: usize,
    #[serde(default = "defaults::tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "defaults::contract_id")]
    pub contract_id: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

mod defaults {
    pub fn log_file() -> String {
        "chainview.log".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }

    pub fn port() -> u16 {
        7497
    }

    pub fn client_id() -> i32 {
        1
    }

    pub fn exchange() -> String {
        "CME".into()
    }

    pub fn currency() -> String {
        "USD".into()
    }

    pub fn market_data_type() -> i32 {
        3 // delayed
    }

    pub fn supported_symbols() -> Vec<String> {
        vec!["ES".into(), "NQ".into()]
    }

    pub fn supported_expiries() -> Vec<String> {
        vec!["20241220".into(), "20250321".into()]
    }

    pub fn underlying_price() -> f64 {
        5000.0
    }

    pub fn strike_step() -> f64 {
        5.0
    }

    pub fn strike_count() -> usize {
        80
    }

    pub fn tick_interval_ms() -> u64 {
        250
    }

    pub fn contract_id() -> i64 {
        500_000
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            underlying_price: defaults::underlying_price(),
            strike_step: defaults::strike_step(),
            strike_count: defaults::strike_count(),
            tick_interval_ms: defaults::tick_interval_ms(),
            contract_id: defaults::contract_id(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            log_file: defaults::log_file(),
            log_level: defaults::log_level(),
            host: None,
            port: defaults::port(),
            client_id: defaults::client_id(),
            exchange: defaults::exchange(),
            currency: defaults::currency(),
            market_data_type: defaults::market_data_type(),
            supported_symbols: defaults::supported_symbols(),
            supported_expiries: defaults::supported_expiries(),
            sim: SimConfig::default(),
        }
    }
}

impl ChainConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let toml_to_str = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&toml_to_str)
    }

    /// Like [`ChainConfig::load`] but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        if !path.as_ref().exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let chain_config: ChainConfig = toml::from_str(s)?;
        chain_config.validate()?;
        Ok(chain_config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.supported_symbols.is_empty() {
            return Err(ConfigError::Invalid("supported_symbols is empty".into()));
        }
        if self.supported_expiries.is_empty() {
            return Err(ConfigError::Invalid("supported_expiries is empty".into()));
        }
        if !(1..=4).contains(&self.market_data_type) {
            return Err(ConfigError::Invalid(format!(
                "market_data_type {} not in 1..=4",
                self.market_data_type
            )));
        }
        if self.sim.strike_count == 0 || self.sim.strike_step <= 0.0 {
            return Err(ConfigError::Invalid(
                "sim needs a positive strike_count and strike_step".into(),
            ));
        }
        Ok(())
    }

    /// Case-insensitive lookup in the enumerated symbol set.
    pub fn match_symbol(&self, input: &str) -> Option<&str> {
        let wanted = input.trim().to_ascii_uppercase();
        self.supported_symbols
            .iter()
            .find(|s| s.eq_ignore_ascii_case(&wanted))
            .map(String::as_str)
    }

    pub fn match_expiry(&self, input: &str) -> Option<&str> {
        let wanted = input.trim();
        self.supported_expiries
            .iter()
            .find(|e| e.as_str() == wanted)
            .map(String::as_str)
    }
}
