//! Export subcommand.
//!
//! Writes the database as a JSON snapshot suitable for backups and diffing.

use crate::export::EXPORTED_TABLES;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the export subcommand
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output file path (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Force gzip compression (auto-detected from .gz extension otherwise)
    #[arg(long)]
    pub gzip: bool,

    /// Comma-separated list of tables to export
    ///
    /// Available tables: admin_users, customers, tasks, customer_progress,
    /// task_comments, task_files, reports
    #[arg(long, value_name = "LIST", value_delimiter = ',')]
    pub tables: Option<Vec<String>>,

    /// Leave out the task_comments table
    #[arg(long)]
    pub no_comments: bool,

    /// Automatically compress if output exceeds this size
    ///
    /// Accepts human-readable sizes: 100KB, 1MB, etc.
    #[arg(long, value_name = "SIZE")]
    pub compress_threshold: Option<String>,
}

impl ExportArgs {
    /// Tables to export, or None for all of them.
    pub fn tables_to_export(&self) -> Option<Vec<String>> {
        if !self.no_comments {
            return self.tables.clone();
        }
        let base: Vec<String> = match &self.tables {
            Some(tables) => tables.clone(),
            None => EXPORTED_TABLES.iter().map(|t| t.to_string()).collect(),
        };
        Some(base.into_iter().filter(|t| t != "task_comments").collect())
    }

    pub fn compress_threshold_bytes(&self) -> Option<u64> {
        self.compress_threshold.as_ref().and_then(|s| parse_size(s))
    }

    /// Whether output should be gzipped, given the uncompressed size if known.
    pub fn should_compress(&self, output_size: Option<u64>) -> bool {
        if self.gzip {
            return true;
        }

        if let Some(ref path) = self.output
            && path.extension().is_some_and(|ext| ext == "gz")
        {
            return true;
        }

        if let (Some(threshold), Some(size)) = (self.compress_threshold_bytes(), output_size) {
            return size > threshold;
        }

        false
    }
}

/// Parse a size like `512`, `100KB` or `2MB` into bytes.
fn parse_size(s: &str) -> Option<u64> {
    let s = s.trim().to_uppercase();
    let (digits, multiplier) = [("GB", 1u64 << 30), ("MB", 1 << 20), ("KB", 1 << 10), ("B", 1)]
        .into_iter()
        .find_map(|(suffix, mult)| s.strip_suffix(suffix).map(|n| (n.trim().to_string(), mult)))
        .unwrap_or((s.clone(), 1));
    digits.parse::<u64>().ok().map(|n| n * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ExportArgs {
        ExportArgs {
            output: None,
            gzip: false,
            tables: None,
            no_comments: false,
            compress_threshold: None,
        }
    }

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_size("100"), Some(100));
        assert_eq!(parse_size("100B"), Some(100));
        assert_eq!(parse_size("2kb"), Some(2048));
        assert_eq!(parse_size("1MB"), Some(1024 * 1024));
        assert_eq!(parse_size("1GB"), Some(1024 * 1024 * 1024));
        assert_eq!(parse_size("lots"), None);
    }

    #[test]
    fn no_comments_drops_comment_table() {
        let all = ExportArgs {
            no_comments: true,
            ..args()
        };
        let tables = all.tables_to_export().unwrap();
        assert!(!tables.contains(&"task_comments".to_string()));
        assert!(tables.contains(&"customer_progress".to_string()));

        let picked = ExportArgs {
            no_comments: true,
            tables: Some(vec!["customers".into(), "task_comments".into()]),
            ..args()
        };
        assert_eq!(picked.tables_to_export().unwrap(), vec!["customers".to_string()]);

        assert!(args().tables_to_export().is_none());
    }

    #[test]
    fn compression_decision() {
        assert!(ExportArgs { gzip: true, ..args() }.should_compress(None));
        assert!(
            ExportArgs {
                output: Some(PathBuf::from("backup.json.gz")),
                ..args()
            }
            .should_compress(None)
        );

        let threshold = ExportArgs {
            compress_threshold: Some("100KB".into()),
            ..args()
        };
        assert!(!threshold.should_compress(Some(50 * 1024)));
        assert!(threshold.should_compress(Some(150 * 1024)));
        assert!(!args().should_compress(Some(u64::MAX)));
    }
}
