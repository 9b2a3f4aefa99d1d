use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, Context, Result};

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";
pub const STAGE_CADENCE: Duration = Duration::from_millis(800);
pub const REVEAL_DELAY: Duration = Duration::from_millis(200);
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const APP_DIR_NAME: &str = "captcha-solver";

#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub api_base: String,
    pub data_dir: PathBuf,
    pub request_timeout: Duration,
    pub stage_cadence: Duration,
    pub reveal_delay: Duration,
    pub debug: bool,
}

impl SolverConfig {
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            data_dir,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            stage_cadence: STAGE_CADENCE,
            reveal_delay: REVEAL_DELAY,
            debug: false,
        }
    }

    /// Reads `CAPTCHA_SOLVER_*` variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = match lookup("CAPTCHA_SOLVER_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };
        let mut config = Self::with_data_dir(data_dir);

        if let Some(base) = lookup("CAPTCHA_SOLVER_API_BASE") {
            config.api_base = base;
        }
        if let Some(raw) = lookup("CAPTCHA_SOLVER_TIMEOUT_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid CAPTCHA_SOLVER_TIMEOUT_SECS '{raw}'"))?;
            config.request_timeout = Duration::from_secs(secs);
        }
        config.debug = lookup("CAPTCHA_SOLVER_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(config)
    }
}

fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| anyhow!("could not find a data directory; set CAPTCHA_SOLVER_DATA_DIR"))
}
