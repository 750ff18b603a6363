//! Options passed through to the transfer engine.

use globset::Glob;
use serde::{Deserialize, Serialize};

use crate::errors::{OrchestratorError, OrchestratorResult};

const DEFAULT_PARALLEL_TRANSFERS: u32 = 4;
const DEFAULT_PARALLEL_CHECKERS: u32 = 8;

/// Recognized transfer flags. Their effect is defined by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransferFlags {
    pub dry_run: bool,
    pub verbose: bool,
    pub bandwidth_limit: Option<String>,
    pub parallel_transfers: u32,
    pub parallel_checkers: u32,
    pub delete_excluded: bool,
    pub include_pattern: Option<String>,
    pub exclude_pattern: Option<String>,
    pub no_traverse: bool,
    pub size_only: bool,
    pub checksum: bool,
}

impl Default for TransferFlags {
    fn default() -> Self {
        Self {
            dry_run: false,
            verbose: false,
            bandwidth_limit: None,
            parallel_transfers: DEFAULT_PARALLEL_TRANSFERS,
            parallel_checkers: DEFAULT_PARALLEL_CHECKERS,
            delete_excluded: false,
            include_pattern: None,
            exclude_pattern: None,
            no_traverse: false,
            size_only: false,
            checksum: false,
        }
    }
}

impl TransferFlags {
    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.parallel_transfers == 0 {
            return Err(OrchestratorError::InvalidFlags(
                "parallel transfers must be at least 1".into(),
            ));
        }
        if self.parallel_checkers == 0 {
            return Err(OrchestratorError::InvalidFlags(
                "parallel checkers must be at least 1".into(),
            ));
        }
        if let Some(limit) = &self.bandwidth_limit {
            if limit.trim().is_empty() {
                return Err(OrchestratorError::InvalidFlags(
                    "bandwidth limit cannot be blank".into(),
                ));
            }
        }
        for pattern in [&self.include_pattern, &self.exclude_pattern].into_iter().flatten() {
            validate_glob_pattern(pattern)?;
        }
        Ok(())
    }

    /// Renders the flags as rclone-style command-line arguments.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.dry_run {
            args.push("--dry-run".to_string());
        }
        if self.verbose {
            args.push("-v".to_string());
        }
        if let Some(limit) = &self.bandwidth_limit {
            args.push("--bwlimit".to_string());
            args.push(limit.trim().to_string());
        }
        args.push("--transfers".to_string());
        args.push(self.parallel_transfers.to_string());
        args.push("--checkers".to_string());
        args.push(self.parallel_checkers.to_string());
        if self.delete_excluded {
            args.push("--delete-excluded".to_string());
        }
        if let Some(pattern) = &self.include_pattern {
            args.push("--include".to_string());
            args.push(pattern.clone());
        }
        if let Some(pattern) = &self.exclude_pattern {
            args.push("--exclude".to_string());
            args.push(pattern.clone());
        }
        if self.no_traverse {
            args.push("--no-traverse".to_string());
        }
        if self.size_only {
            args.push("--size-only".to_string());
        }
        if self.checksum {
            args.push("--checksum".to_string());
        }
        args
    }
}

/// Checks that `pattern` is a usable include/exclude glob.
pub fn validate_glob_pattern(pattern: &str) -> OrchestratorResult<()> {
    if pattern.trim().is_empty() {
        return Err(OrchestratorError::InvalidFlags("pattern cannot be empty".into()));
    }

    match Glob::new(pattern) {
        Ok(_) => Ok(()),
        Err(e) => match Glob::new(&format!("**/{}", pattern)) {
            Ok(_) => Ok(()),
            Err(_) => Err(OrchestratorError::InvalidFlags(format!(
                "invalid glob pattern '{}': {}",
                pattern, e
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let flags = TransferFlags::default();
        assert!(flags.validate().is_ok());
        assert_eq!(flags.to_args(), vec!["--transfers", "4", "--checkers", "8"]);
    }

    #[test]
    fn test_all_flags_render_in_order() {
        let flags = TransferFlags {
            dry_run: true,
            verbose: true,
            bandwidth_limit: Some(" 10M ".into()),
            parallel_transfers: 2,
            parallel_checkers: 16,
            delete_excluded: true,
            include_pattern: Some("*.jpg".into()),
            exclude_pattern: Some("*.tmp".into()),
            no_traverse: true,
            size_only: true,
            checksum: true,
        };
        assert!(flags.validate().is_ok());
        assert_eq!(
            flags.to_args(),
            vec![
                "--dry-run", "-v", "--bwlimit", "10M", "--transfers", "2", "--checkers", "16",
                "--delete-excluded", "--include", "*.jpg", "--exclude", "*.tmp", "--no-traverse",
                "--size-only", "--checksum",
            ]
        );
    }

    #[test]
    fn test_zero_parallelism_rejected() {
        let flags = TransferFlags {
            parallel_transfers: 0,
            ..TransferFlags::default()
        };
        assert!(matches!(flags.validate(), Err(OrchestratorError::InvalidFlags(_))));

        let flags = TransferFlags {
            parallel_checkers: 0,
            ..TransferFlags::default()
        };
        assert!(matches!(flags.validate(), Err(OrchestratorError::InvalidFlags(_))));
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        assert!(validate_glob_pattern("").is_err());
        assert!(validate_glob_pattern("a[").is_err());
        assert!(validate_glob_pattern("photos/**/*.png").is_ok());

        let flags = TransferFlags {
            exclude_pattern: Some("{unclosed".into()),
            ..TransferFlags::default()
        };
        assert!(flags.validate().is_err());
    }

    #[test]
    fn test_blank_bandwidth_rejected() {
        let flags = TransferFlags {
            bandwidth_limit: Some("  ".into()),
            ..TransferFlags::default()
        };
        assert!(flags.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let flags: TransferFlags = serde_json::from_str(r#"{"dryRun": true, "parallelCheckers": 2}"#).unwrap();
        assert!(flags.dry_run);
        assert_eq!(flags.parallel_transfers, 4);
        assert_eq!(flags.parallel_checkers, 2);
    }
}
