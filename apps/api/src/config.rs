use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::generation::reveal::RevealScheduler;
use crate::question_set::draft::QuestionDefaults;
use crate::session::RoundDefaults;

/// Where generation requests go.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationBackend {
    /// External duplex generation service.
    WebSocket { url: String },
    /// The model, called in-process through `LlmClient`.
    Llm { api_key: String },
}

/// Tunables of the question-set engine, shared by the handlers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    /// Delay between revealed characters; zero applies generated text at once.
    pub reveal_cadence: Duration,
    pub library_batch_size: usize,
    /// Parallel assessment upserts during submit; 1 is strictly sequential.
    pub fanout_concurrency: usize,
    pub default_prepare_seconds: f64,
    pub default_answer_minutes: f64,
    /// Editing sessions untouched for this long are closed by the sweeper.
    pub session_idle: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            reveal_cadence: Duration::from_millis(15),
            library_batch_size: 10,
            fanout_concurrency: 4,
            default_prepare_seconds: 10.0,
            default_answer_minutes: 2.0,
            session_idle: Duration::from_secs(60 * 60),
        }
    }
}

impl EngineSettings {
    pub fn reveal(&self) -> RevealScheduler {
        RevealScheduler::new(self.reveal_cadence)
    }

    pub fn round_defaults(&self) -> RoundDefaults {
        RoundDefaults::uniform(QuestionDefaults {
            prepare_time_seconds: self.default_prepare_seconds,
            answer_time_minutes: self.default_answer_minutes,
        })
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub generation: GenerationBackend,
    pub port: u16,
    pub rust_log: String,
    pub settings: EngineSettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| {
            lookup(key).with_context(|| format!("Required environment variable '{key}' is not set"))
        };

        let generation = match (lookup("GENERATION_WS_URL"), lookup("ANTHROPIC_API_KEY")) {
            (Some(url), _) => GenerationBackend::WebSocket { url },
            (None, Some(api_key)) => GenerationBackend::Llm { api_key },
            (None, None) => {
                bail!("Set GENERATION_WS_URL or ANTHROPIC_API_KEY to enable question generation")
            }
        };

        let defaults = EngineSettings::default();
        let idle_minutes: u64 = parse_or(
            &lookup,
            "SESSION_IDLE_MINUTES",
            defaults.session_idle.as_secs() / 60,
        )?
        .max(1);
        let settings = EngineSettings {
            reveal_cadence: Duration::from_millis(parse_or(
                &lookup,
                "REVEAL_CADENCE_MS",
                defaults.reveal_cadence.as_millis() as u64,
            )?),
            library_batch_size: parse_or(&lookup, "LIBRARY_BATCH_SIZE", defaults.library_batch_size)?,
            fanout_concurrency: parse_or(&lookup, "FANOUT_CONCURRENCY", defaults.fanout_concurrency)?
                .max(1),
            default_prepare_seconds: parse_or(
                &lookup,
                "DEFAULT_PREPARE_SECONDS",
                defaults.default_prepare_seconds,
            )?,
            default_answer_minutes: parse_or(
                &lookup,
                "DEFAULT_ANSWER_MINUTES",
                defaults.default_answer_minutes,
            )?,
            session_idle: Duration::from_secs(idle_minutes * 60),
        };

        Ok(Config {
            database_url: require("DATABASE_URL")?,
            s3_bucket: require("S3_BUCKET")?,
            s3_endpoint: require("S3_ENDPOINT")?,
            aws_access_key_id: require("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require("AWS_SECRET_ACCESS_KEY")?,
            generation,
            port: parse_or(&lookup, "PORT", 8080u16).context("PORT must be a valid port number")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            settings,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Environment variable '{key}' has invalid value '{raw}'")),
        None => Ok(default),
    }
}
