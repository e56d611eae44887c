//! Where configuration comes from.
//!
//! The runner only ever sees a finished [`TesterConfig`]. Each
//! [`ConfigSource`] refines the configuration produced by the layer below it,
//! so the binaries can stack built-in values, a TOML file, the environment,
//! CLI flags and interactive prompts in whatever order they need.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use tracing::debug;

use crate::config::{ConfigOverrides, TesterConfig};
use crate::error::ConfigError;

/// Environment variable holding the backend URL.
pub const ENV_BASE_URL: &str = "ESP32_TESTER_URL";
/// Environment variable holding the access key.
pub const ENV_API_KEY: &str = "ESP32_TESTER_API_KEY";
/// Environment variable holding the device identifier.
pub const ENV_DEVICE_ID: &str = "ESP32_TESTER_DEVICE_ID";
/// Environment variable holding the zone identifier.
pub const ENV_ZONE_ID: &str = "ESP32_TESTER_ZONE_ID";
/// Environment variable holding the per-request timeout in seconds.
pub const ENV_TIMEOUT: &str = "ESP32_TESTER_TIMEOUT";

/// A layer of configuration.
pub trait ConfigSource {
    /// Short human-readable name, used in logs.
    fn describe(&self) -> String;

    /// Refine `base` with the values this source provides.
    fn layer(&self, base: TesterConfig) -> Result<TesterConfig, ConfigError>;
}

/// Fold `sources` over `base`, in order.
pub fn resolve(
    base: TesterConfig,
    sources: &[&dyn ConfigSource],
) -> Result<TesterConfig, ConfigError> {
    sources.iter().try_fold(base, |config, source| {
        debug!(target: "esp32.tester", source = %source.describe(), "Applying config source");
        source.layer(config)
    })
}

/// A complete configuration compiled into the binary or built in code.
#[derive(Debug, Clone)]
pub struct FixedSource(pub TesterConfig);

impl ConfigSource for FixedSource {
    fn describe(&self) -> String {
        "fixed values".to_string()
    }

    fn layer(&self, _base: TesterConfig) -> Result<TesterConfig, ConfigError> {
        Ok(self.0.clone())
    }
}

/// Sparse overrides read from a TOML file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigSource for FileSource {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    fn layer(&self, mut base: TesterConfig) -> Result<TesterConfig, ConfigError> {
        ConfigOverrides::load(&self.path)?.apply(&mut base);
        Ok(base)
    }
}

/// Values set explicitly, typically from CLI flags.
impl ConfigSource for ConfigOverrides {
    fn describe(&self) -> String {
        "command line".to_string()
    }

    fn layer(&self, mut base: TesterConfig) -> Result<TesterConfig, ConfigError> {
        self.apply(&mut base);
        Ok(base)
    }
}

/// Values read from `ESP32_TESTER_*` environment variables.
///
/// The variable lookup is injectable so tests never touch the process
/// environment.
pub struct EnvSource {
    lookup: Box<dyn Fn(&str) -> Option<String>>,
}

impl EnvSource {
    /// Read from the process environment.
    pub fn new() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    /// Read through a custom lookup function.
    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + 'static) -> Self {
        Self {
            lookup: Box::new(lookup),
        }
    }

    fn var(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|value| !value.trim().is_empty())
    }
}

impl Default for EnvSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigSource for EnvSource {
    fn describe(&self) -> String {
        "environment".to_string()
    }

    fn layer(&self, mut base: TesterConfig) -> Result<TesterConfig, ConfigError> {
        let timeout_secs = match self.var(ENV_TIMEOUT) {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|e| {
                ConfigError::InvalidEnv {
                    var: ENV_TIMEOUT.to_string(),
                    message: e.to_string(),
                }
            })?),
            None => None,
        };
        let overrides = ConfigOverrides {
            base_url: self.var(ENV_BASE_URL),
            api_key: self.var(ENV_API_KEY),
            device_id: self.var(ENV_DEVICE_ID),
            zone_id: self.var(ENV_ZONE_ID),
            timeout_secs,
            ..ConfigOverrides::default()
        };
        overrides.apply(&mut base);
        Ok(base)
    }
}

/// Asks for the backend URL and access key when they are still unset.
///
/// Generic over the reader and writer so it can be driven from tests. Set
/// `hidden_key` to read the key without echo from the controlling terminal.
pub struct PromptSource<R, W> {
    input: std::cell::RefCell<R>,
    output: std::cell::RefCell<W>,
    hidden_key: bool,
}

impl PromptSource<std::io::StdinLock<'static>, std::io::Stdout> {
    /// Prompt on the process's stdin/stdout, reading the key without echo.
    pub fn stdio() -> Self {
        Self {
            input: std::cell::RefCell::new(std::io::stdin().lock()),
            output: std::cell::RefCell::new(std::io::stdout()),
            hidden_key: true,
        }
    }
}

impl<R: BufRead, W: Write> PromptSource<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: std::cell::RefCell::new(input),
            output: std::cell::RefCell::new(output),
            hidden_key: false,
        }
    }

    /// Hand the writer back, e.g. to inspect what was printed.
    pub fn into_output(self) -> W {
        self.output.into_inner()
    }

    fn ask(&self, field: &'static str, prompt: &str) -> Result<String, ConfigError> {
        let prompt_err = |source| ConfigError::Prompt { field, source };

        let mut output = self.output.borrow_mut();
        write!(output, "{prompt}").map_err(prompt_err)?;
        output.flush().map_err(prompt_err)?;

        let mut line = String::new();
        self.input
            .borrow_mut()
            .read_line(&mut line)
            .map_err(prompt_err)?;
        let value = line.trim().to_string();
        if value.is_empty() {
            return Err(ConfigError::MissingInput { field });
        }
        Ok(value)
    }

    fn ask_secret(&self, field: &'static str, prompt: &str) -> Result<String, ConfigError> {
        if !self.hidden_key {
            return self.ask(field, prompt);
        }
        let value = rpassword::prompt_password(prompt)
            .map_err(|source| ConfigError::Prompt { field, source })?;
        let value = value.trim().to_string();
        if value.is_empty() {
            return Err(ConfigError::MissingInput { field });
        }
        Ok(value)
    }
}

impl<R: BufRead, W: Write> ConfigSource for PromptSource<R, W> {
    fn describe(&self) -> String {
        "interactive prompt".to_string()
    }

    fn layer(&self, mut base: TesterConfig) -> Result<TesterConfig, ConfigError> {
        if base.base_url.is_empty() {
            base.base_url = self.ask("Backend URL", "Enter your Supabase project URL: ")?;
        }
        if base.api_key.is_empty() {
            base.api_key = self.ask_secret("Anon key", "Enter your Supabase anon key: ")?;
        }
        base.normalize();
        Ok(base)
    }
}
