use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::pattern::CheckTiming;
use crate::pool::Parameters;

#[derive(Parser, Debug)]
#[command(name = "abtest-pool")]
#[command(version)]
#[command(about = "Inspect and exercise a persisted A/B pattern assignment")]
pub struct Args {
    /// SQLite database holding persisted patterns
    #[arg(long, default_value = "abtest.sqlite3")]
    pub db: PathBuf,

    /// Optional TOML file with [experiments.<name>] sections
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the configured check timing
    #[arg(long, value_enum)]
    pub timing: Option<TimingArg>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "abtest_pool=info")]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the resolved pattern (persisting it under `once` timing)
    Show,
    /// Forget the persisted pattern and decide a new one
    Reset,
    /// Register the demo tests and execute them
    Run {
        /// Parameter passed to parameterized tests, as key=value (repeatable)
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, serde_json::Value)>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TimingArg {
    Once,
    EveryTime,
}

impl From<TimingArg> for CheckTiming {
    fn from(t: TimingArg) -> Self {
        match t {
            TimingArg::Once      => CheckTiming::Once,
            TimingArg::EveryTime => CheckTiming::EveryTime,
        }
    }
}

/// `key=value`; the value is read as JSON when it parses, otherwise as a string.
pub fn parse_param(s: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty parameter name in '{}'", s));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

pub fn collect_params(pairs: &[(String, serde_json::Value)]) -> Parameters {
    pairs.iter().cloned().collect()
}
