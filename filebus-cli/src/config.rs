use filebus_core::{FilebusError, Result};
use serde::{Deserialize, Serialize};

/// Settings shared by every subcommand, loaded from an optional config file
/// plus `FILEBUS_`-prefixed environment variables. CLI flags override both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_bus_url")]
    pub bus_url: String,
    #[serde(default = "default_bus_channel")]
    pub bus_channel: String,
    /// Skip the encrypted-transport check on the bus connection.
    #[serde(default)]
    pub trust_key: bool,
    /// How long client commands wait for a broker reply; 0 waits forever.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub s3: S3Settings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct S3Settings {
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

fn default_bus_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_bus_channel() -> String {
    "filebus".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bus_url: default_bus_url(),
            bus_channel: default_bus_channel(),
            trust_key: false,
            timeout_secs: default_timeout_secs(),
            s3: S3Settings::default(),
        }
    }
}

impl Settings {
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::with_name(path));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix("FILEBUS").separator("__"),
        );

        let settings = builder
            .build()
            .map_err(|e| FilebusError::Config(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| FilebusError::Config(e.to_string()))
    }

    pub fn timeout(&self) -> Option<std::time::Duration> {
        (self.timeout_secs > 0).then(|| std::time::Duration::from_secs(self.timeout_secs))
    }
}
