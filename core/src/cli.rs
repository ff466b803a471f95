use clap::Parser;

use crate::config::{ConfigPathManager, TEST_MODE_ENV_VAR};

/// The kernel's own CLI surface. A binary built on top of `lynx-core`
/// parses this once at process start and calls [`Cli::apply`] before
/// constructing an `Application` — the flag itself never reaches the
/// config loader directly, it goes through the `ConfigPathManager`
/// singleton so library tests can bypass parsing entirely.
#[derive(Debug, Parser)]
#[command(name = "lynx", about = "Plug-in microservice framework kernel")]
pub struct Cli {
    /// Bootstrap configuration root. Overrides `LYNX_CONFIG_PATH`.
    #[arg(long = "conf", env = "LYNX_CONFIG_PATH")]
    pub conf: Option<String>,

    #[arg(long = "log-level", default_value = "info")]
    pub log_level: String,

    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,

    #[arg(short = 'v', long = "verbose", conflicts_with = "quiet")]
    pub verbose: bool,
}

impl Cli {
    /// Parses `std::env::args`, skipping entirely when the test-mode
    /// escape hatch is set — unit tests that build an `Application`
    /// in-process never want to parse the host test runner's own argv.
    pub fn parse_unless_test_mode() -> Option<Self> {
        if std::env::var(TEST_MODE_ENV_VAR).is_ok() {
            return None;
        }
        Some(Self::parse())
    }

    /// Resolves the effective log level, folding `--quiet`/`--verbose`
    /// into the base `--log-level` the way the bootstrap's logger setup
    /// expects.
    pub fn effective_log_level(&self) -> &str {
        if self.quiet {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }

    /// Installs the parsed `--conf` path into the process-wide manager so
    /// `load_bootstrap_config_default` picks it up ahead of the
    /// `LYNX_CONFIG_PATH` env var.
    pub fn apply(&self) {
        if let Some(conf) = &self.conf {
            ConfigPathManager::global().set_config_path(conf.clone());
        }
    }
}
