//! Configuration loading via `ortho-config`.
//!
//! [`MirrorConfig`] merges defaults, `ftp-mirror.toml` discovered in the
//! usual locations, and `FTP_MIRROR_*` environment variables. Nothing about
//! the endpoint or the credentials is compiled into the binary.

use std::fmt;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::paths::RemoteRoot;
use crate::session::Endpoint;

/// Default FTP control port.
pub const DEFAULT_PORT: u16 = 21;

/// Default remote root: the directory the server logs the user into.
pub const DEFAULT_REMOTE_ROOT: &str = ".";

/// Default local root, relative to the working directory.
pub const DEFAULT_LOCAL_ROOT: &str = "dist";

/// Default bound on connecting, in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

const ENV_PREFIX: &str = "FTP_MIRROR_";
const CONFIG_FILE_NAME: &str = "ftp-mirror.toml";

/// Connection, credential and path settings for one mirror run.
#[derive(Clone, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "FTP_MIRROR",
    discovery(
        app_name = "ftp-mirror",
        env_var = "FTP_MIRROR_CONFIG_PATH",
        config_file_name = "ftp-mirror.toml",
        dotfile_name = ".ftp-mirror.toml",
        project_file_name = "ftp-mirror.toml"
    )
)]
pub struct MirrorConfig {
    /// Host name or address of the FTP server.
    pub host: String,
    /// Control connection port.
    #[ortho_config(default = DEFAULT_PORT)]
    pub port: u16,
    /// Account used to log in.
    pub username: String,
    /// Password for `username`.
    pub password: String,
    /// Remote directory receiving the tree. Relative values start from the
    /// login directory; absolute values from the server's `/`.
    #[ortho_config(default = DEFAULT_REMOTE_ROOT.to_owned())]
    pub remote_root: String,
    /// Local directory whose contents are uploaded.
    #[ortho_config(default = DEFAULT_LOCAL_ROOT.to_owned())]
    pub local_root: String,
    /// Seconds to wait for the connection and for each socket operation.
    #[ortho_config(default = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout_secs: u64,
    /// Whether to use passive data connections. Most servers behind NAT
    /// need this. Set through the file or environment only, as a CLI
    /// switch could only ever turn it off.
    #[ortho_config(default = true, skip_cli)]
    pub passive_mode: bool,
}

impl fmt::Debug for MirrorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("remote_root", &self.remote_root)
            .field("local_root", &self.local_root)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("passive_mode", &self.passive_mode)
            .finish()
    }
}

impl MirrorConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails, for example when
    /// a required value such as the host is not set anywhere.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("ftp-mirror")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Checks that every value is usable. Error messages name the environment
    /// variable and configuration key to fix.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required value is blank
    /// and [`ConfigError::Invalid`] when a value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_value(&self.host, "host")?;
        require_value(&self.username, "username")?;
        require_value(&self.password, "password")?;
        require_value(&self.remote_root, "remote_root")?;
        require_value(&self.local_root, "local_root")?;

        if self.port == 0 {
            return Err(ConfigError::Invalid {
                field: String::from("port"),
                message: String::from("port must be between 1 and 65535"),
            });
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: String::from("connect_timeout_secs"),
                message: String::from("timeout must be at least one second"),
            });
        }
        self.parsed_remote_root()?;
        Ok(())
    }

    /// Returns the normalised remote root.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the root is blank or climbs with
    /// `..`.
    pub fn parsed_remote_root(&self) -> Result<RemoteRoot, ConfigError> {
        RemoteRoot::parse(&self.remote_root).map_err(|err| ConfigError::Invalid {
            field: String::from("remote_root"),
            message: err.to_string(),
        })
    }

    /// Returns the local root as a path.
    #[must_use]
    pub fn local_root_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(self.local_root.trim())
    }

    /// Returns the connection timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Builds the endpoint description handed to the session connector.
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.host.trim().to_owned(),
            port: self.port,
            timeout: self.connect_timeout(),
            passive: self.passive_mode,
        }
    }
}

fn require_value(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField {
            field: field.to_owned(),
        });
    }
    Ok(())
}

/// Errors raised during configuration loading and validation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Raised when a required value is empty or missing.
    #[error(
        "missing {field}: set {prefix}{env_suffix} or add {field} to {file}",
        prefix = ENV_PREFIX,
        env_suffix = field.to_uppercase(),
        file = CONFIG_FILE_NAME
    )]
    MissingField {
        /// Configuration field that failed validation.
        field: String,
    },
    /// Raised when a value is present but unusable.
    #[error("invalid {field}: {message}")]
    Invalid {
        /// Configuration field that failed validation.
        field: String,
        /// Why the value was rejected.
        message: String,
    },
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::EnvGuard;
    use rstest::{fixture, rstest};

    fn sample_config() -> MirrorConfig {
        MirrorConfig {
            host: String::from("ftp.example.test"),
            port: DEFAULT_PORT,
            username: String::from("deploy"),
            password: String::from("secret"),
            remote_root: String::from("www"),
            local_root: String::from("dist"),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            passive_mode: true,
        }
    }

    #[fixture]
    fn base_config() -> MirrorConfig {
        sample_config()
    }

    /// Asserts validation rejects empty or whitespace values for a field.
    fn assert_validation_rejects_field<F>(mut cfg: MirrorConfig, field_name: &str, set_field: F)
    where
        F: Fn(&mut MirrorConfig, String),
    {
        for invalid in ["", "  "] {
            set_field(&mut cfg, invalid.to_owned());
            let Err(err) = cfg.validate() else {
                panic!("{field_name} '{invalid}' should fail");
            };
            let ConfigError::MissingField { ref field } = err else {
                panic!("expected MissingField for {field_name}, got {err:?}");
            };
            assert_eq!(field, field_name, "expected invalid field {field_name}");
        }
    }

    #[rstest]
    fn validate_accepts_complete_config(base_config: MirrorConfig) {
        assert!(base_config.validate().is_ok());
    }

    #[rstest]
    fn validate_rejects_blank_host(base_config: MirrorConfig) {
        assert_validation_rejects_field(base_config, "host", |cfg, val| cfg.host = val);
    }

    #[rstest]
    fn validate_rejects_blank_username(base_config: MirrorConfig) {
        assert_validation_rejects_field(base_config, "username", |cfg, val| cfg.username = val);
    }

    #[rstest]
    fn validate_rejects_blank_password(base_config: MirrorConfig) {
        assert_validation_rejects_field(base_config, "password", |cfg, val| cfg.password = val);
    }

    #[rstest]
    fn validate_rejects_blank_roots(base_config: MirrorConfig) {
        assert_validation_rejects_field(base_config.clone(), "remote_root", |cfg, val| {
            cfg.remote_root = val;
        });
        assert_validation_rejects_field(base_config, "local_root", |cfg, val| {
            cfg.local_root = val;
        });
    }

    #[rstest]
    #[case::port(MirrorConfig { port: 0, ..sample_config() }, "port")]
    #[case::timeout(MirrorConfig { connect_timeout_secs: 0, ..sample_config() }, "connect_timeout_secs")]
    #[case::escaping_root(MirrorConfig { remote_root: String::from("../etc"), ..sample_config() }, "remote_root")]
    fn validate_rejects_out_of_range_values(#[case] cfg: MirrorConfig, #[case] expected: &str) {
        let err = cfg.validate().expect_err("value should be rejected");
        let ConfigError::Invalid { ref field, .. } = err else {
            panic!("expected Invalid, got {err:?}");
        };
        assert_eq!(field, expected);
    }

    #[rstest]
    fn missing_field_message_is_actionable(base_config: MirrorConfig) {
        let cfg = MirrorConfig {
            password: String::new(),
            ..base_config
        };
        let message = cfg.validate().expect_err("blank password").to_string();
        assert!(
            message.contains("FTP_MIRROR_PASSWORD"),
            "error should mention env var: {message}"
        );
        assert!(
            message.contains("ftp-mirror.toml"),
            "error should mention config file: {message}"
        );
    }

    #[rstest]
    fn endpoint_carries_connection_settings(base_config: MirrorConfig) {
        let cfg = MirrorConfig {
            host: String::from(" ftp.example.test "),
            port: 2121,
            connect_timeout_secs: 45,
            passive_mode: false,
            ..base_config
        };

        let endpoint = cfg.endpoint();

        assert_eq!(endpoint.host, "ftp.example.test");
        assert_eq!(endpoint.port, 2121);
        assert_eq!(endpoint.timeout, Duration::from_secs(45));
        assert!(!endpoint.passive);
        assert_eq!(endpoint.address(), "ftp.example.test:2121");
    }

    #[rstest]
    fn debug_output_redacts_password(base_config: MirrorConfig) {
        let rendered = format!("{base_config:?}");
        assert!(!rendered.contains("secret"), "password leaked: {rendered}");
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn load_merges_environment_with_defaults() {
        let _guard = EnvGuard::set_vars(&[
            ("FTP_MIRROR_HOST", "ftp.example.test"),
            ("FTP_MIRROR_USERNAME", "deploy"),
            ("FTP_MIRROR_PASSWORD", "secret"),
        ]);

        let cfg = MirrorConfig::load_without_cli_args()
            .expect("config should load from the environment");

        assert_eq!(cfg.host, "ftp.example.test");
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.remote_root, DEFAULT_REMOTE_ROOT);
        assert_eq!(cfg.local_root, DEFAULT_LOCAL_ROOT);
        assert_eq!(cfg.connect_timeout_secs, DEFAULT_CONNECT_TIMEOUT_SECS);
        assert!(cfg.passive_mode);
    }

    #[test]
    fn environment_can_switch_to_active_mode() {
        let _guard = EnvGuard::set_vars(&[
            ("FTP_MIRROR_HOST", "ftp.example.test"),
            ("FTP_MIRROR_USERNAME", "deploy"),
            ("FTP_MIRROR_PASSWORD", "secret"),
            ("FTP_MIRROR_PASSIVE_MODE", "false"),
        ]);

        let cfg = MirrorConfig::load_without_cli_args()
            .expect("config should load from the environment");

        assert!(!cfg.passive_mode);
        assert!(!cfg.endpoint().passive);
    }
}
