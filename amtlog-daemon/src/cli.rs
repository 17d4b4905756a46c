//! CLI argument definitions for amtlog-daemon.

use std::path::PathBuf;

use clap::Parser;

/// Amatsukaze transcoding log collector daemon.
///
/// Watches the log directory for `(txt, json)` pairs, classifies each task
/// and delivers it to Vector and syslog exactly once.
#[derive(Parser, Debug)]
#[command(name = "amtlog-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to amtlog.toml configuration file.
    #[arg(short, long, default_value = "/etc/amtlog/amtlog.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Override the watched log directory.
    #[arg(long)]
    pub log_directory: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,
}

impl DaemonCli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut amtlog_core::config::AmtlogConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
        if let Some(dir) = &self.log_directory {
            config.watcher.log_directory.clone_from(dir);
        }
        if let Some(pid_file) = &self.pid_file {
            config.general.pid_file.clone_from(pid_file);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amtlog_core::config::AmtlogConfig;

    #[test]
    fn defaults_point_at_etc() {
        let cli = DaemonCli::parse_from(["amtlog-daemon"]);
        assert_eq!(cli.config, PathBuf::from("/etc/amtlog/amtlog.toml"));
        assert!(!cli.validate);
    }

    #[test]
    fn overrides_win_over_config() {
        let cli = DaemonCli::parse_from([
            "amtlog-daemon",
            "--log-level",
            "debug",
            "--log-directory",
            "/srv/logs",
            "--pid-file",
            "/run/amtlog.pid",
        ]);
        let mut config = AmtlogConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.watcher.log_directory, "/srv/logs");
        assert_eq!(config.general.pid_file, "/run/amtlog.pid");
    }
}
