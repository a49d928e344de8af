use jid::FullJid;
use thiserror::Error;

use rookery_core::{AccountConfig, Config, ProxyConfig};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid JID {jid:?}: {message}")]
    InvalidJid { jid: String, message: String },

    #[error("unknown TLS mode {0:?}")]
    UnknownTlsMode(String),

    #[error("invalid proxy descriptor: {0}")]
    InvalidProxy(String),
}

/// How the transport negotiates TLS with the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMode {
    Disabled,
    #[default]
    Required,
    IfPossible,
}

impl TlsMode {
    fn parse(value: &str) -> Result<Self, SettingsError> {
        match value {
            "disabled" => Ok(TlsMode::Disabled),
            "required" => Ok(TlsMode::Required),
            "if-possible" => Ok(TlsMode::IfPossible),
            other => Err(SettingsError::UnknownTlsMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Proxy {
    #[default]
    None,
    Http {
        host: String,
        port: u16,
    },
    Socks5 {
        host: String,
        port: u16,
        username: Option<String>,
        password: Option<String>,
    },
}

impl Proxy {
    fn from_config(proxy: &ProxyConfig) -> Result<Self, SettingsError> {
        if proxy.kind == "none" {
            return Ok(Proxy::None);
        }

        let host = proxy
            .host
            .clone()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| SettingsError::InvalidProxy("proxy host is missing".to_string()))?;
        let port = proxy
            .port
            .ok_or_else(|| SettingsError::InvalidProxy("proxy port is missing".to_string()))?;

        match proxy.kind.as_str() {
            "http" => Ok(Proxy::Http { host, port }),
            "socks5" => Ok(Proxy::Socks5 {
                host,
                port,
                username: proxy.username.clone(),
                password: proxy.password.clone(),
            }),
            other => Err(SettingsError::InvalidProxy(format!(
                "unknown proxy kind {other:?}"
            ))),
        }
    }
}

/// Connection options for one account.
///
/// Owned exclusively by that account's supervisor; after construction only
/// the password may change (applied through
/// [`ConnectionSupervisor::on_password_changed`](crate::supervisor::ConnectionSupervisor::on_password_changed)).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    jid: FullJid,
    password: String,
    /// Manual endpoint; `None` means DNS discovery from the JID domain.
    pub host: Option<String>,
    pub port: Option<u16>,
    pub sasl_enabled: bool,
    pub tls_mode: TlsMode,
    pub compression: bool,
    pub proxy: Proxy,
}

impl ConnectionSettings {
    pub fn new(jid: FullJid, password: impl Into<String>) -> Self {
        Self {
            jid,
            password: password.into(),
            host: None,
            port: None,
            sasl_enabled: true,
            tls_mode: TlsMode::default(),
            compression: false,
            proxy: Proxy::default(),
        }
    }

    /// The account identity this connection authenticates as.
    pub fn account(&self) -> &FullJid {
        &self.jid
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub(crate) fn set_password(&mut self, password: impl Into<String>) {
        self.password = password.into();
    }
}

fn parse_account_jid(account: &AccountConfig) -> Result<FullJid, SettingsError> {
    let full = if account.jid.contains('/') {
        account.jid.clone()
    } else {
        format!("{}/{}", account.jid, account.resource)
    };

    full.parse::<FullJid>().map_err(|error| SettingsError::InvalidJid {
        jid: full,
        message: error.to_string(),
    })
}

impl TryFrom<&Config> for ConnectionSettings {
    type Error = SettingsError;

    fn try_from(config: &Config) -> Result<Self, Self::Error> {
        let jid = parse_account_jid(&config.account)?;

        Ok(Self {
            jid,
            password: config.account.password.clone(),
            host: config.account.server.clone(),
            port: config.account.port,
            sasl_enabled: true,
            tls_mode: TlsMode::parse(&config.account.tls)?,
            compression: config.account.compression,
            proxy: Proxy::from_config(&config.proxy)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(toml: &str) -> Config {
        rookery_core::load_config_from_str(toml).expect("config should parse")
    }

    #[test]
    fn builds_settings_from_minimal_config() {
        let config = config(
            r#"
[account]
jid = "finch@rookery.im"
password = "secret"
"#,
        );
        let settings = ConnectionSettings::try_from(&config).unwrap();

        assert_eq!(settings.account().to_string(), "finch@rookery.im/rookery");
        assert_eq!(settings.password(), "secret");
        assert!(settings.host.is_none());
        assert_eq!(settings.tls_mode, TlsMode::Required);
        assert!(!settings.compression);
        assert_eq!(settings.proxy, Proxy::None);
    }

    #[test]
    fn explicit_resource_in_jid_wins_over_config_resource() {
        let config = config(
            r#"
[account]
jid = "finch@rookery.im/mobile"
password = "secret"
resource = "desktop"
"#,
        );
        let settings = ConnectionSettings::try_from(&config).unwrap();
        assert_eq!(settings.account().to_string(), "finch@rookery.im/mobile");
    }

    #[test]
    fn maps_tls_modes() {
        for (value, expected) in [
            ("disabled", TlsMode::Disabled),
            ("required", TlsMode::Required),
            ("if-possible", TlsMode::IfPossible),
        ] {
            let config = config(&format!(
                r#"
[account]
jid = "finch@rookery.im"
password = "secret"
tls = "{value}"
"#
            ));
            let settings = ConnectionSettings::try_from(&config).unwrap();
            assert_eq!(settings.tls_mode, expected);
        }
    }

    #[test]
    fn maps_socks5_proxy_with_credentials() {
        let config = config(
            r#"
[account]
jid = "finch@rookery.im"
password = "secret"

[proxy]
kind = "socks5"
host = "proxy.internal"
port = 1080
username = "proxyuser"
password = "proxypass"
"#,
        );
        let settings = ConnectionSettings::try_from(&config).unwrap();
        assert_eq!(
            settings.proxy,
            Proxy::Socks5 {
                host: "proxy.internal".to_string(),
                port: 1080,
                username: Some("proxyuser".to_string()),
                password: Some("proxypass".to_string()),
            }
        );
    }

    #[test]
    fn rejects_malformed_jid() {
        let config = config(
            r#"
[account]
jid = "not a jid"
password = "secret"
"#,
        );
        let error = ConnectionSettings::try_from(&config).unwrap_err();
        assert!(matches!(error, SettingsError::InvalidJid { .. }));
    }

    #[test]
    fn password_update_replaces_credential_only() {
        let jid = "finch@rookery.im/rookery".parse::<FullJid>().unwrap();
        let mut settings = ConnectionSettings::new(jid.clone(), "old");
        settings.set_password("new");

        assert_eq!(settings.password(), "new");
        assert_eq!(settings.account(), &jid);
    }
}
