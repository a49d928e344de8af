pub mod config;

pub use config::{
    AccountConfig, Config, ConfigError, LoggingConfig, ProxyConfig, config_path, load_config,
    load_config_from, load_config_from_str,
};
