//! Configuration types for the VNC client.

use crate::errors::RfbClientError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Complete VNC client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Connection settings.
    pub connection: ConnectionConfig,
    /// Display settings.
    pub display: DisplayConfig,
    /// Security settings.
    pub security: SecurityConfig,
    /// Input settings.
    pub input: InputConfig,
    /// Reconnection settings.
    pub reconnect: ReconnectConfig,
}

/// Connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Server hostname or IP address.
    pub host: String,
    /// Server port (typically 5900 + display number).
    pub port: u16,
    /// Username, used by Plain/MSLogonII/ARD/Tight-UnixLogon authentication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// VNC password (if required).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// XVP/ARD "target" identifier (the host to act on, distinct from the VNC server
    /// itself when connecting through a management proxy).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// UltraVNC repeater ID to send in response to an `RFB 000.000\n` probe. Empty
    /// unless connecting through a repeater.
    #[serde(default)]
    pub repeater_id: String,
    /// Whether to request a shared session (`false` disconnects other clients).
    #[serde(default = "default_true")]
    pub shared: bool,
    /// Connection timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl ConnectionConfig {
    /// Builds the [`Credentials`](rfb_protocol::handshake::Credentials) the security
    /// handshake needs from whatever this configuration has available.
    #[must_use]
    pub fn credentials(&self) -> rfb_protocol::handshake::Credentials {
        rfb_protocol::handshake::Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
            target: self.target.clone(),
        }
    }
}

/// Display configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Preferred encodings in priority order.
    #[serde(default = "default_encodings")]
    pub encodings: Vec<i32>,
    /// JPEG quality (0-9), if applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    /// Compression level (0-9), if applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<u8>,
}

fn default_encodings() -> Vec<i32> {
    // Minimal, known-good baseline encodings: Raw(0), CopyRect(1), ZRLE(16)
    vec![
        rfb_encodings::ENCODING_RAW,
        rfb_encodings::ENCODING_COPY_RECT,
        rfb_encodings::ENCODING_ZRLE,
    ]
}

/// Security configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// TLS configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
    /// View-only mode (no input sent to server).
    #[serde(default)]
    pub view_only: bool,
}

/// TLS configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Enable TLS encryption.
    pub enabled: bool,
    /// Server name for certificate validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    /// Path to CA certificate file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<PathBuf>,
    /// Skip certificate validation (DANGEROUS - use only for testing).
    #[serde(default)]
    pub danger_accept_invalid_certs: bool,
}

/// Input configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Pointer event rate limit in Hz.
    #[serde(default = "default_pointer_rate_hz")]
    pub pointer_rate_hz: u32,
    /// Enable pointer event throttling.
    #[serde(default = "default_true")]
    pub pointer_throttle: bool,
}

fn default_pointer_rate_hz() -> u32 {
    60
}

fn default_true() -> bool {
    true
}

/// Reconnection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Enable automatic reconnection.
    #[serde(default)]
    pub enabled: bool,
    /// Maximum number of retry attempts (0 = infinite).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Initial backoff duration in milliseconds.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Maximum backoff duration in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Jitter factor (0.0-1.0) for backoff randomization.
    #[serde(default = "default_jitter")]
    pub jitter: f32,
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_jitter() -> f32 {
    0.1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig {
                host: String::new(),
                port: 5900,
                username: None,
                password: None,
                target: None,
                repeater_id: String::new(),
                shared: default_true(),
                timeout_ms: default_timeout_ms(),
            },
            display: DisplayConfig {
                encodings: default_encodings(),
                quality: None,
                compression: None,
            },
            security: SecurityConfig {
                tls: None,
                view_only: false,
            },
            input: InputConfig {
                pointer_rate_hz: default_pointer_rate_hz(),
                pointer_throttle: default_true(),
            },
            reconnect: ReconnectConfig {
                enabled: false,
                max_retries: default_max_retries(),
                backoff_ms: default_backoff_ms(),
                max_backoff_ms: default_max_backoff_ms(),
                jitter: default_jitter(),
            },
        }
    }
}

impl Config {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), RfbClientError> {
        // Validate host
        if self.connection.host.is_empty() {
            return Err(RfbClientError::Config("Host cannot be empty".to_string()));
        }

        // Validate port
        if self.connection.port == 0 {
            return Err(RfbClientError::Config("Port cannot be 0".to_string()));
        }

        // Validate encodings
        if self.display.encodings.is_empty() {
            return Err(RfbClientError::Config(
                "At least one encoding must be specified".to_string(),
            ));
        }

        // Validate jitter
        if !(0.0..=1.0).contains(&self.reconnect.jitter) {
            return Err(RfbClientError::Config(
                "Jitter must be between 0.0 and 1.0".to_string(),
            ));
        }

        Ok(())
    }

    /// Returns the connection timeout duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.connection.timeout_ms)
    }
    
    /// Returns the complete encodings list to advertise in `SetEncodings`,
    /// in server preference order.
    ///
    /// CopyRect first; at depth 24 then Tight, TightPNG, ZRLE, Hextile, RRE;
    /// Raw last (Tight's embedded Jpeg sub-mode covers the "JPEG" preference
    /// slot since there is no standalone JPEG rectangle encoding on the
    /// wire). Followed by the quality/compression pseudo-encodings and the
    /// remaining capability pseudo-encodings.
    #[must_use]
    pub fn effective_encodings(&self) -> Vec<i32> {
        use rfb_protocol::messages::types::*;

        let mut encodings = vec![ENCODING_COPYRECT];
        if self.connection_depth() == 24 {
            encodings.push(ENCODING_TIGHT);
            encodings.push(PSEUDO_ENCODING_TIGHT_PNG);
            encodings.push(ENCODING_ZRLE);
            encodings.push(ENCODING_HEXTILE);
            encodings.push(ENCODING_RRE);
        }
        encodings.push(ENCODING_RAW);

        if let Some(q) = self.display.quality {
            encodings.push(PSEUDO_ENCODING_QUALITY_LEVEL_0 + i32::from(q.min(9)));
        }
        if let Some(c) = self.display.compression {
            encodings.push(PSEUDO_ENCODING_COMPRESS_LEVEL_0 + i32::from(c.min(9)));
        }

        encodings.push(PSEUDO_ENCODING_DESKTOP_SIZE);
        encodings.push(PSEUDO_ENCODING_LAST_RECT);
        encodings.push(PSEUDO_ENCODING_QEMU_EXTENDED_KEY_EVENT);
        encodings.push(PSEUDO_ENCODING_EXTENDED_DESKTOP_SIZE);
        encodings.push(PSEUDO_ENCODING_XVP);
        encodings.push(PSEUDO_ENCODING_FENCE);
        encodings.push(PSEUDO_ENCODING_CONTINUOUS_UPDATES);
        encodings.push(PSEUDO_ENCODING_DESKTOP_NAME);
        encodings.push(PSEUDO_ENCODING_EXTENDED_CLIPBOARD);

        if self.connection_depth() == 24 {
            encodings.push(PSEUDO_ENCODING_VMWARE_CURSOR);
            encodings.push(PSEUDO_ENCODING_CURSOR);
        }

        encodings
    }

    /// The pixel depth this client will request during ClientInitialisation:
    /// 24 unless overridden, matching the Tight-mode depth-8 AMT KVM exception
    /// handled separately in the handshake.
    fn connection_depth(&self) -> u8 {
        24
    }
}

/// Builder for creating a `Config`.
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Sets the server hostname or IP address.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.connection.host = host.into();
        self
    }

    /// Sets the server port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.connection.port = port;
        self
    }

    /// Sets the username (Plain/MSLogonII/ARD/Tight-UnixLogon authentication).
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.connection.username = Some(username.into());
        self
    }

    /// Sets the VNC password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.connection.password = Some(password.into());
        self
    }

    /// Sets the XVP/ARD target identifier.
    #[must_use]
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.config.connection.target = Some(target.into());
        self
    }

    /// Sets the UltraVNC repeater ID to answer an `RFB 000.000\n` probe with.
    #[must_use]
    pub fn repeater_id(mut self, repeater_id: impl Into<String>) -> Self {
        self.config.connection.repeater_id = repeater_id.into();
        self
    }

    /// Sets whether to request a shared session (default `true`).
    #[must_use]
    pub fn shared(mut self, shared: bool) -> Self {
        self.config.connection.shared = shared;
        self
    }

    /// Enables TLS, optionally overriding the server name used for SNI/certificate
    /// verification.
    #[must_use]
    pub fn tls(mut self, server_name: Option<String>) -> Self {
        self.config.security.tls = Some(TlsConfig {
            enabled: true,
            server_name,
            ca_file: None,
            danger_accept_invalid_certs: false,
        });
        self
    }

    /// Sets the CA certificate file for an already-enabled TLS configuration. Has no
    /// effect unless [`Self::tls`] is called first.
    #[must_use]
    pub fn tls_ca_file(mut self, ca_file: impl Into<PathBuf>) -> Self {
        if let Some(tls) = &mut self.config.security.tls {
            tls.ca_file = Some(ca_file.into());
        }
        self
    }

    /// Disables TLS certificate verification. Dangerous; only for testing.
    #[must_use]
    pub fn tls_danger_accept_invalid_certs(mut self, danger: bool) -> Self {
        if let Some(tls) = &mut self.config.security.tls {
            tls.danger_accept_invalid_certs = danger;
        }
        self
    }

    /// Sets view-only mode: input events are never sent to the server.
    #[must_use]
    pub fn view_only(mut self, view_only: bool) -> Self {
        self.config.security.view_only = view_only;
        self
    }

    /// Overrides the preferred encodings list.
    #[must_use]
    pub fn encodings(mut self, encodings: Vec<i32>) -> Self {
        self.config.display.encodings = encodings;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> Result<Config, RfbClientError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = Config::builder()
            .host("localhost")
            .port(5900)
            .build()
            .unwrap();

        assert_eq!(config.connection.host, "localhost");
        assert_eq!(config.connection.port, 5900);
    }

    #[test]
    fn test_config_validation_empty_host() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_port() {
        let mut config = Config::default();
        config.connection.host = "localhost".to_string();
        config.connection.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_jitter() {
        let mut config = Config::default();
        config.connection.host = "localhost".to_string();
        config.reconnect.jitter = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_encodings_preference_order() {
        use rfb_protocol::messages::types::*;

        let config = Config::default();
        let encodings = config.effective_encodings();

        // CopyRect must come first.
        assert_eq!(encodings[0], ENCODING_COPYRECT);
        // Raw is the last of the core rectangle encodings.
        let raw_pos = encodings.iter().position(|&e| e == ENCODING_RAW).unwrap();
        let tight_pos = encodings.iter().position(|&e| e == ENCODING_TIGHT).unwrap();
        assert!(tight_pos < raw_pos);

        assert!(encodings.contains(&PSEUDO_ENCODING_TIGHT_PNG));
        assert!(encodings.contains(&PSEUDO_ENCODING_DESKTOP_SIZE));
        assert!(encodings.contains(&PSEUDO_ENCODING_LAST_RECT));
        assert!(encodings.contains(&PSEUDO_ENCODING_EXTENDED_CLIPBOARD));
    }

    #[test]
    fn test_effective_encodings_quality_and_compression() {
        use rfb_protocol::messages::types::PSEUDO_ENCODING_QUALITY_LEVEL_0;
        let mut config = Config::default();
        config.display.quality = Some(5);
        let encodings = config.effective_encodings();
        assert!(encodings.contains(&(PSEUDO_ENCODING_QUALITY_LEVEL_0 + 5)));
    }
}
