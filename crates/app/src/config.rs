use std::fmt;
use std::path::{Path, PathBuf};

use academy_core::model::LearnerId;
use academy_core::policy::{LedgerPolicy, RetakePolicy};
use chrono::Duration;

pub const DEFAULT_DB_URL: &str = "sqlite://academy.sqlite3";

#[derive(Debug)]
pub enum ConfigError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    Invalid { key: &'static str, raw: String },
    MissingLearner,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ConfigError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ConfigError::Invalid { key, raw } => write!(f, "invalid {key} value: {raw}"),
            ConfigError::MissingLearner => {
                write!(f, "a learner id is required (--learner or ACADEMY_LEARNER_ID)")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Runtime settings: `.env`, then the environment, then command-line flags.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_url: String,
    pub curriculum_path: Option<PathBuf>,
    pub learner_id: Option<LearnerId>,
    pub policy: LedgerPolicy,
    pub rust_log: String,
}

impl Config {
    /// Read settings from `.env` (if present) and the `ACADEMY_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let db_url = std::env::var("ACADEMY_DB_URL")
            .ok()
            .map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url);
        let curriculum_path = std::env::var("ACADEMY_CURRICULUM").ok().map(PathBuf::from);
        let learner_id = std::env::var("ACADEMY_LEARNER_ID")
            .ok()
            .map(|raw| parse_learner(&raw))
            .transpose()?;

        let mut policy = LedgerPolicy::default();
        if let Ok(raw) = std::env::var("ACADEMY_COOLDOWN_SECS") {
            policy.cooldown = parse_cooldown("ACADEMY_COOLDOWN_SECS", &raw)?;
        }
        if let Ok(raw) = std::env::var("ACADEMY_RETAKE_POLICY") {
            policy.retake = parse_retake("ACADEMY_RETAKE_POLICY", &raw)?;
        }
        if let Ok(raw) = std::env::var("ACADEMY_ALLOW_PASSED_RETAKE") {
            policy.allow_passed_retake = parse_bool("ACADEMY_ALLOW_PASSED_RETAKE", &raw)?;
        }

        let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            db_url,
            curriculum_path,
            learner_id,
            policy,
            rust_log,
        })
    }

    /// Apply command-line flags on top of the environment. Returns positional arguments.
    pub fn apply_args(
        &mut self,
        args: &mut impl Iterator<Item = String>,
    ) -> Result<Vec<String>, ConfigError> {
        let mut positional = Vec::new();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ConfigError::Invalid {
                            key: "--db",
                            raw: value,
                        });
                    }
                    self.db_url = normalize_sqlite_url(value);
                }
                "--curriculum" => {
                    self.curriculum_path = Some(PathBuf::from(require_value(args, "--curriculum")?));
                }
                "--learner" => {
                    self.learner_id = Some(parse_learner(&require_value(args, "--learner")?)?);
                }
                "--cooldown-secs" => {
                    let value = require_value(args, "--cooldown-secs")?;
                    self.policy.cooldown = parse_cooldown("--cooldown-secs", &value)?;
                }
                "--retake" => {
                    let value = require_value(args, "--retake")?;
                    self.policy.retake = parse_retake("--retake", &value)?;
                }
                flag if flag.starts_with("--") => return Err(ConfigError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }
        Ok(positional)
    }

    pub fn require_learner(&self) -> Result<LearnerId, ConfigError> {
        self.learner_id.ok_or(ConfigError::MissingLearner)
    }
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ConfigError> {
    args.next().ok_or(ConfigError::MissingValue { flag })
}

fn parse_learner(raw: &str) -> Result<LearnerId, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key: "learner id",
        raw: raw.to_string(),
    })
}

fn parse_cooldown(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|secs| *secs >= 0)
        .and_then(Duration::try_seconds)
        .ok_or_else(|| ConfigError::Invalid {
            key,
            raw: raw.to_string(),
        })
}

fn parse_retake(key: &'static str, raw: &str) -> Result<RetakePolicy, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Invalid {
        key,
        raw: raw.to_string(),
    })
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            raw: raw.to_string(),
        }),
    }
}

pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Create the database file (and its directory) so `SQLite` can open it.
pub fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ConfigError::Invalid {
            key: "database url",
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ConfigError::Invalid {
            key: "database url",
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}
