//! Runtime configuration.
//!
//! Precedence: built-in defaults, then the TOML file, then `BLIPSUB_*`
//! environment variables. The project id is never read from the file; it
//! must come from `GOOGLE_CLOUD_PROJECT`.

use serde::Deserialize;
use std::num::NonZeroU64;
use std::path::Path;
use std::{env, fs, io};
use thiserror::Error;

use crate::core::error::PubSubError;

pub const PROJECT_ENV: &str = "GOOGLE_CLOUD_PROJECT";
pub const CONFIG_PATH_ENV: &str = "BLIPSUB_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "blipsub.toml";

pub const DEFAULT_TOPIC: &str = "my-topic";
pub const DEFAULT_SUBSCRIPTION: &str = "my-sub";
pub const DEFAULT_PAYLOAD: &str = "hello world!";
pub const DEFAULT_THRESHOLD: NonZeroU64 = match NonZeroU64::new(10) {
    Some(n) => n,
    None => panic!("threshold must be non-zero"),
};
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_PAGE_SIZE: usize = 2;
pub const DEFAULT_BACKLOG: usize = 15;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("config parse error: {0}")]
    Parse(String),
}

/// Names and payload used by the `run` walkthrough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoConfig {
    pub topic: String,
    pub subscription: String,
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    pub threshold: NonZeroU64,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    pub name: String,
    #[serde(default)]
    pub subscriptions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatorConfig {
    pub workers: usize,
    pub page_size: usize,
    pub backlog: usize,
    pub topics: Vec<TopicSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub demo: DemoConfig,
    pub consumer: ConsumerConfig,
    pub emulator: EmulatorConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
struct FileDemo {
    topic: Option<String>,
    subscription: Option<String>,
    payload: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
struct FileConsumer {
    threshold: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
struct FileEmulator {
    workers: Option<usize>,
    page_size: Option<usize>,
    backlog: Option<usize>,
    topics: Option<Vec<TopicSpec>>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    demo: FileDemo,
    #[serde(default)]
    consumer: FileConsumer,
    #[serde(default)]
    emulator: FileEmulator,
}

fn default_topics() -> Vec<TopicSpec> {
    vec![TopicSpec {
        name: DEFAULT_TOPIC.to_string(),
        subscriptions: vec![DEFAULT_SUBSCRIPTION.to_string()],
    }]
}

impl Default for Config {
    fn default() -> Self {
        Config {
            demo: DemoConfig {
                topic: DEFAULT_TOPIC.to_string(),
                subscription: DEFAULT_SUBSCRIPTION.to_string(),
                payload: DEFAULT_PAYLOAD.to_string(),
            },
            consumer: ConsumerConfig {
                threshold: DEFAULT_THRESHOLD,
            },
            emulator: EmulatorConfig {
                workers: DEFAULT_WORKERS,
                page_size: DEFAULT_PAGE_SIZE,
                backlog: DEFAULT_BACKLOG,
                topics: default_topics(),
            },
        }
    }
}

impl Config {
    /// Loads configuration from `path`, else `$BLIPSUB_CONFIG`, else
    /// `blipsub.toml` if present, then applies environment overrides.
    ///
    /// An explicitly named file that cannot be read is an error; a missing
    /// default file just means defaults.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let explicit = path
            .map(str::to_owned)
            .or_else(|| env::var(CONFIG_PATH_ENV).ok());

        let file = match explicit {
            Some(p) => Self::load_file(p)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::load_file(DEFAULT_CONFIG_PATH)?
            }
            None => FileConfig::default(),
        };

        Self::resolve(file, |key| env::var(key).ok())
    }

    /// Parses TOML text with no environment overrides.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Self::resolve(toml::from_str(raw)?, |_| None)
    }

    fn load_file<P: AsRef<Path>>(path: P) -> Result<FileConfig, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    fn resolve<E>(file: FileConfig, env: E) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let mut topic = file.demo.topic.unwrap_or_else(|| DEFAULT_TOPIC.to_string());
        let mut subscription = file
            .demo
            .subscription
            .unwrap_or_else(|| DEFAULT_SUBSCRIPTION.to_string());
        let payload = file
            .demo
            .payload
            .unwrap_or_else(|| DEFAULT_PAYLOAD.to_string());
        let mut threshold = file
            .consumer
            .threshold
            .unwrap_or(DEFAULT_THRESHOLD.get());
        let mut workers = file.emulator.workers.unwrap_or(DEFAULT_WORKERS);
        let page_size = file.emulator.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        let backlog = file.emulator.backlog.unwrap_or(DEFAULT_BACKLOG);
        let topics = file.emulator.topics.unwrap_or_else(default_topics);

        // Env overrides.
        if let Some(v) = env("BLIPSUB_TOPIC") {
            topic = v;
        }

        if let Some(v) = env("BLIPSUB_SUBSCRIPTION") {
            subscription = v;
        }

        if let Some(v) = env("BLIPSUB_THRESHOLD") {
            threshold = v
                .parse()
                .map_err(|e| ConfigError::Parse(format!("BLIPSUB_THRESHOLD: {e}")))?;
        }

        if let Some(v) = env("BLIPSUB_WORKERS") {
            workers = v
                .parse()
                .map_err(|e| ConfigError::Parse(format!("BLIPSUB_WORKERS: {e}")))?;
        }

        let threshold = NonZeroU64::new(threshold)
            .ok_or_else(|| ConfigError::Parse("consumer.threshold must be at least 1".into()))?;
        if workers == 0 {
            return Err(ConfigError::Parse("emulator.workers must be at least 1".into()));
        }
        if page_size == 0 {
            return Err(ConfigError::Parse("emulator.page_size must be at least 1".into()));
        }

        Ok(Config {
            demo: DemoConfig {
                topic,
                subscription,
                payload,
            },
            consumer: ConsumerConfig { threshold },
            emulator: EmulatorConfig {
                workers,
                page_size,
                backlog,
                topics,
            },
        })
    }
}

/// Reads the project id from `GOOGLE_CLOUD_PROJECT`.
///
/// # Errors
/// `ConfigMissing` if the variable is unset or empty.
pub fn project_from_env() -> Result<String, PubSubError> {
    project_from(|key| env::var(key).ok())
}

fn project_from<E>(env: E) -> Result<String, PubSubError>
where
    E: Fn(&str) -> Option<String>,
{
    env(PROJECT_ENV)
        .filter(|p| !p.trim().is_empty())
        .ok_or(PubSubError::ConfigMissing(PROJECT_ENV))
}
