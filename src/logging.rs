//! tracing subscriber setup.
//!
//! The `--log` flag picks where records go; `RUST_LOG` overrides the level
//! chosen by `--verbose`.

use anyhow::Result;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Destination for log records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Off,
    Stdout,
    Stderr,
    /// Append to a file, without ANSI colors.
    File(PathBuf),
}

impl LogTarget {
    /// Parse `0`/`off`, `1`/`stdout`, `2`/`stderr`, or anything else as a filename.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "0" | "off" => LogTarget::Off,
            "1" | "stdout" => LogTarget::Stdout,
            "2" | "stderr" | "" => LogTarget::Stderr,
            filename => LogTarget::File(PathBuf::from(filename)),
        }
    }

    /// Place a relative log file under `log_dir`.
    pub fn under(self, log_dir: &Path) -> Self {
        match self {
            LogTarget::File(path) if path.is_relative() => LogTarget::File(log_dir.join(path)),
            other => other,
        }
    }
}

/// Default filter directive for the given verbosity.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "onboard_tracker=debug,tower_http=debug,info"
    } else {
        "info"
    }
}

fn build_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

/// Install the global subscriber. Call once at startup.
///
/// Relative log file names land in `log_dir`.
pub fn init(log: &str, verbose: bool, log_dir: &Path) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(build_filter(verbose));

    match LogTarget::parse(log).under(log_dir) {
        LogTarget::Off => {}
        LogTarget::Stdout => {
            tracing::subscriber::set_global_default(builder.with_writer(std::io::stdout).finish())?;
        }
        LogTarget::Stderr => {
            tracing::subscriber::set_global_default(builder.with_writer(std::io::stderr).finish())?;
        }
        LogTarget::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            let subscriber = builder
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_targets() {
        assert_eq!(LogTarget::parse("0"), LogTarget::Off);
        assert_eq!(LogTarget::parse("off"), LogTarget::Off);
        assert_eq!(LogTarget::parse("1"), LogTarget::Stdout);
        assert_eq!(LogTarget::parse("stderr"), LogTarget::Stderr);
        assert_eq!(
            LogTarget::parse("logs/server.log"),
            LogTarget::File(PathBuf::from("logs/server.log"))
        );
    }

    #[test]
    fn relative_files_go_under_log_dir() {
        let dir = Path::new("/var/log/onboarding");
        assert_eq!(
            LogTarget::parse("server.log").under(dir),
            LogTarget::File(dir.join("server.log"))
        );
        assert_eq!(
            LogTarget::parse("/tmp/server.log").under(dir),
            LogTarget::File(PathBuf::from("/tmp/server.log"))
        );
        assert_eq!(LogTarget::parse("stderr").under(dir), LogTarget::Stderr);
    }

    #[test]
    fn verbose_raises_crate_level() {
        assert!(default_directive(true).contains("onboard_tracker=debug"));
        assert_eq!(default_directive(false), "info");
    }
}
