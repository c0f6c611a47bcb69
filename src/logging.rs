use std::collections::HashMap;
use log::{debug, info, LevelFilter};
use serde::{Deserialize, Serialize};
use env_logger::{Builder, Target, WriteStyle};
use std::io::Write;

/// Available logging subsystems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoggingSubsystem {
    /// Main application logging
    #[serde(rename = "main")]
    Main,
    /// Connection pool, watcher, dispatcher and command executor
    #[serde(rename = "players")]
    Players,
    /// Bus wiring and MQTT transport
    #[serde(rename = "bridge")]
    Bridge,
    /// Configuration loading and parsing
    #[serde(rename = "config")]
    Config,
    /// Third-party dependencies
    #[serde(rename = "deps")]
    Dependencies,
}

impl LoggingSubsystem {
    /// Get the module prefixes for this subsystem
    pub fn module_prefix(&self) -> &'static str {
        match self {
            LoggingSubsystem::Main => "mpdbridge",
            LoggingSubsystem::Players => "mpdbridge::players",
            LoggingSubsystem::Bridge => "mpdbridge::bridge",
            LoggingSubsystem::Config => "mpdbridge::config",
            LoggingSubsystem::Dependencies => "mpd,rumqttc",
        }
    }

    pub fn all() -> Vec<LoggingSubsystem> {
        vec![
            LoggingSubsystem::Main,
            LoggingSubsystem::Players,
            LoggingSubsystem::Bridge,
            LoggingSubsystem::Config,
            LoggingSubsystem::Dependencies,
        ]
    }

    /// Parse subsystem name to enum
    pub fn parse(name: &str) -> Option<LoggingSubsystem> {
        match name.to_lowercase().as_str() {
            "main" => Some(LoggingSubsystem::Main),
            "players" => Some(LoggingSubsystem::Players),
            "bridge" | "mqtt" => Some(LoggingSubsystem::Bridge),
            "config" => Some(LoggingSubsystem::Config),
            "deps" | "dependencies" => Some(LoggingSubsystem::Dependencies),
            _ => None,
        }
    }
}

/// Logging configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Global log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Target for log output (stdout, stderr)
    #[serde(default = "default_target")]
    pub target: String,

    /// Whether to include timestamps
    #[serde(default = "default_timestamps")]
    pub timestamps: bool,

    /// Whether to use colored output
    #[serde(default = "default_colors")]
    pub colors: bool,

    /// Subsystem-specific log levels
    #[serde(default)]
    pub subsystems: HashMap<String, String>,

    /// Whether to include module paths in log output
    #[serde(default)]
    pub include_module_path: bool,

    /// Whether to include line numbers in log output
    #[serde(default)]
    pub include_line_numbers: bool,

    /// Custom environment variable overrides
    #[serde(default)]
    pub env_overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_target() -> String {
    "stdout".to_string()
}

fn default_timestamps() -> bool {
    true
}

fn default_colors() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            target: default_target(),
            timestamps: default_timestamps(),
            colors: default_colors(),
            subsystems: HashMap::new(),
            include_module_path: false,
            include_line_numbers: false,
            env_overrides: HashMap::new(),
        }
    }
}

impl LoggingConfig {
    /// Convert string log level to LevelFilter
    fn parse_log_level(level: &str) -> LevelFilter {
        match level.to_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            _ => {
                eprintln!("Warning: Unknown log level '{}', defaulting to 'info'", level);
                LevelFilter::Info
            }
        }
    }

    /// Module/level pairs for every configured subsystem
    fn module_filters(&self) -> Vec<(String, String)> {
        let mut filters = Vec::new();
        for (subsystem_name, level) in &self.subsystems {
            if let Some(subsystem) = LoggingSubsystem::parse(subsystem_name) {
                for prefix in subsystem.module_prefix().split(',') {
                    filters.push((prefix.trim().to_string(), level.clone()));
                }
            } else {
                // Custom module path
                filters.push((subsystem_name.clone(), level.clone()));
            }
        }
        filters.sort();
        filters
    }

    /// Build the filter string in env_logger syntax
    pub fn build_filter_string(&self) -> String {
        let mut filter_parts = vec![self.level.clone()];
        for (module, level) in self.module_filters() {
            filter_parts.push(format!("{}={}", module, level));
        }
        filter_parts.join(",")
    }

    /// Initialize the logger with this configuration
    pub fn initialize_logger(&self) -> Result<(), String> {
        for (key, value) in &self.env_overrides {
            std::env::set_var(key, value);
        }

        let filter_string = self.build_filter_string();
        debug!("Using logging filter: {}", filter_string);

        let mut builder = Builder::new();
        builder.parse_env("RUST_LOG");
        builder.filter(None, Self::parse_log_level(&self.level));
        for (module, level) in self.module_filters() {
            builder.filter(Some(&module), Self::parse_log_level(&level));
        }

        let write_style = if self.colors {
            WriteStyle::Auto
        } else {
            WriteStyle::Never
        };
        builder.write_style(write_style);

        match self.target.to_lowercase().as_str() {
            "stdout" => {
                builder.target(Target::Stdout);
            }
            "stderr" => {
                builder.target(Target::Stderr);
            }
            _ => {
                return Err(format!("Unknown logging target: {}", self.target));
            }
        }

        let include_module_path = self.include_module_path;
        let include_line_numbers = self.include_line_numbers;
        let timestamps = self.timestamps;

        builder.format(move |buf, record| {
            let mut output = String::new();

            if timestamps {
                output.push_str(&format!("[{}] ", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")));
            }

            output.push_str(&format!("[{}] ", record.level()));

            if include_module_path {
                if let Some(module) = record.module_path() {
                    output.push_str(&format!("[{}] ", module));
                }
            }

            if include_line_numbers {
                if let (Some(file), Some(line)) = (record.file(), record.line()) {
                    output.push_str(&format!("[{}:{}] ", file, line));
                }
            }

            output.push_str(&format!("{}", record.args()));

            writeln!(buf, "{}", output)
        });

        builder.try_init()
            .map_err(|e| format!("Failed to initialize logger: {}", e))?;

        info!("Logging initialized with filter: {}", filter_string);
        Ok(())
    }

    /// Create a sample configuration
    pub fn create_sample_config() -> Self {
        let mut config = LoggingConfig::default();
        config.subsystems.insert("players".to_string(), "debug".to_string());
        config.subsystems.insert("deps".to_string(), "warn".to_string());
        config.env_overrides.insert("RUST_BACKTRACE".to_string(), "1".to_string());
        config
    }
}

/// Initialize logging from the configured settings and command line flags
///
/// `--debug` and `--verbose` both raise the global level to debug.
pub fn initialize_logging(config: &LoggingConfig, debug_mode: bool, verbose_mode: bool) -> Result<(), String> {
    let mut config = config.clone();
    if debug_mode || verbose_mode {
        config.level = "debug".to_string();
    }
    config.initialize_logger()
}
