use std::path::PathBuf;

pub const APP_DIR_NAME: &str = "taskboard";
pub const DATA_DIR_ENV: &str = "TASKBOARD_DATA_DIR";
pub const LOG_ENV: &str = "TASKBOARD_LOG";

/// Where data lives and how loud logging is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub log_spec: String,
}

impl Config {
    /// Resolves from the `--data-dir` flag, then the environment, then platform defaults.
    pub fn resolve(data_dir_flag: Option<PathBuf>) -> Self {
        Self::from_sources(
            data_dir_flag,
            env_value(DATA_DIR_ENV),
            env_value(LOG_ENV).or_else(|| env_value("RUST_LOG")),
            dirs::data_dir(),
        )
    }

    fn from_sources(
        flag: Option<PathBuf>,
        env_dir: Option<String>,
        env_log: Option<String>,
        platform_dir: Option<PathBuf>,
    ) -> Self {
        let data_dir = flag
            .or_else(|| env_dir.map(PathBuf::from))
            .or_else(|| platform_dir.map(|dir| dir.join(APP_DIR_NAME)))
            .unwrap_or_else(|| PathBuf::from(".").join(format!(".{APP_DIR_NAME}")));
        Self {
            data_dir,
            log_spec: env_log.unwrap_or_else(|| default_log_spec().to_string()),
        }
    }
}

/// Dependencies stay at WARN; the library is chattier in debug builds.
pub fn default_log_spec() -> &'static str {
    if cfg!(debug_assertions) {
        "warn,taskboard_lib=debug,taskboard=debug"
    } else {
        "warn,taskboard_lib=info,taskboard=info"
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
