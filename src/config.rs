use std::io::ErrorKind;
use std::path::PathBuf;
use std::str::FromStr;
use std::{env, fs, io};

use serde::Deserialize;

use crate::new_post::DEFAULT_NEW_POST_TEMPLATE;
use crate::post::{ParserConfig, DEFAULT_MORE_MARKER};
use crate::sync::ConflictPolicy;

pub const CFG_FILE_NAME: &str = "syncpress.toml";
pub const ENV_DB: &str = "SYNCPRESS_DB";
pub const ENV_LOG: &str = "SYNCPRESS_LOG";

#[derive(Deserialize, Default, Debug)]
#[serde(default)]
pub struct Store {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct Posts {
    pub more_marker: String,
    pub new_post_template: String,
}

impl Default for Posts {
    fn default() -> Self {
        Posts {
            more_marker: DEFAULT_MORE_MARKER.to_string(),
            new_post_template: DEFAULT_NEW_POST_TEMPLATE.to_string(),
        }
    }
}

#[derive(Deserialize, Default, Debug)]
#[serde(default)]
pub struct Sync {
    pub conflict_policy: ConflictPolicy,
}

#[derive(Deserialize, Debug)]
pub struct Log {
    pub level: LogLevel,
    pub log_to_console: bool,
    pub location: Option<PathBuf>,
}

#[derive(Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Critical = 0,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(LogLevel::Critical),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("Unknown log level {}", other)),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct Feed {
    pub title: String,
    pub site_url: String,
    pub description: String,
    pub page_size: u32,
}

impl Default for Feed {
    fn default() -> Self {
        Feed {
            title: "Blog posts".to_string(),
            site_url: "http://localhost".to_string(),
            description: "Latest posts".to_string(),
            page_size: 10,
        }
    }
}

#[derive(Deserialize, Default, Debug)]
#[serde(default)]
pub struct Config {
    pub store: Store,
    pub posts: Posts,
    pub sync: Sync,
    pub log: Option<Log>,
    pub feed: Feed,
    /// Console level when no `[log]` section is configured
    #[serde(skip)]
    pub console_level: Option<LogLevel>,
}

impl Config {
    pub fn parser_config(&self) -> ParserConfig {
        ParserConfig {
            more_marker: self.posts.more_marker.clone(),
        }
    }

    pub fn store_path(&self) -> PathBuf {
        if let Some(ref path) = self.store.path {
            return path.clone();
        }
        match dirs::data_dir() {
            Some(dir) => dir.join("syncpress").join("syncpress.db"),
            None => PathBuf::from("syncpress.db"),
        }
    }

    /// Applies `SYNCPRESS_DB` and `SYNCPRESS_LOG`. `lookup` is `env::var` outside of tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), String>
        where F: Fn(&str) -> Option<String>
    {
        if let Some(db) = lookup(ENV_DB).filter(|v| !v.is_empty()) {
            self.store.path = Some(PathBuf::from(db));
        }

        if let Some(level) = lookup(ENV_LOG).filter(|v| !v.is_empty()) {
            let level = LogLevel::from_str(&level)?;
            match self.log {
                Some(ref mut log) => log.level = level,
                None => self.console_level = Some(level),
            }
        }

        Ok(())
    }
}

fn parse_path(path: PathBuf) -> PathBuf {
    if !path.starts_with("${exe_dir}") {
        return path;
    }

    let exe_dir = env::current_exe().ok()
        .and_then(|exe| exe.parent().map(|dir| dir.to_path_buf()));
    match (exe_dir, path.strip_prefix("${exe_dir}")) {
        (Some(exe_dir), Ok(rest)) => exe_dir.join(rest),
        _ => path,
    }
}

pub fn read_config(cfg_path: &PathBuf) -> io::Result<Config> {
    let cfg_content = match fs::read_to_string(cfg_path) {
        Ok(content) => content,
        Err(e) => return Err(io::Error::new(e.kind(), format!("Error opening configuration file {}: {}", cfg_path.display(), e))),
    };

    parse_config(&cfg_content)
}

pub fn parse_config(cfg_content: &str) -> io::Result<Config> {
    let mut cfg: Config = match toml::from_str::<Config>(cfg_content) {
        Ok(cfg) => cfg,
        Err(e) => return Err(io::Error::new(
            ErrorKind::InvalidData, format!("Error parsing configuration file: {}", e))),
    };

    cfg.store.path = cfg.store.path.map(parse_path);
    if let Some(ref mut log) = cfg.log {
        log.location = log.location.take().map(parse_path);
    }

    Ok(cfg)
}

fn find_config_path() -> Option<PathBuf> {
    let mut candidates = vec![];
    if let Some(exe_dir) = env::current_exe().ok().and_then(|exe| exe.parent().map(|d| d.to_path_buf())) {
        candidates.push(exe_dir.join(CFG_FILE_NAME));
    }
    if let Ok(cur_dir) = env::current_dir() {
        candidates.push(cur_dir.join(CFG_FILE_NAME));
    }
    if let Some(cfg_dir) = dirs::config_dir() {
        candidates.push(cfg_dir.join("syncpress").join(CFG_FILE_NAME));
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Reads `cfg_path`, or the first config file found, or falls back to the defaults.
/// Environment variables win over the file.
pub fn open_config(cfg_path: Option<PathBuf>) -> io::Result<Config> {
    let mut config = match cfg_path.or_else(find_config_path) {
        Some(path) => read_config(&path)?,
        None => Config::default(),
    };

    config.apply_env(|key| env::var(key).ok())
        .map_err(|e| io::Error::new(ErrorKind::InvalidInput, e))?;

    if let Some(ref mut log) = config.log {
        if log.location.is_none() {
            log.location = dirs::cache_dir().map(|dir| dir.join("syncpress").join("log").join("syncpress.log"));
        }
    }

    Ok(config)
}
