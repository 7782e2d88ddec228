use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::{DiagnosticError, Result};
use crate::models::format_test_id;

pub const DATA_PATH_ENV: &str = "DIAGNOSTIC_DATA";
pub const DEFAULT_DATA_PATH: &str = "jee_mains_diagnostic_data.csv";

/// `--csv` wins, then `DIAGNOSTIC_DATA`, then the default file name.
pub fn resolve_data_path(cli_value: Option<PathBuf>) -> PathBuf {
    cli_value
        .or_else(|| std::env::var(DATA_PATH_ENV).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH))
}

/// Early and late test windows used for the improvement feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowConfig {
    pub early: BTreeSet<String>,
    pub late: BTreeSet<String>,
}

impl WindowConfig {
    pub fn new<I, J, S, T>(early: I, late: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            early: early.into_iter().map(Into::into).collect(),
            late: late.into_iter().map(Into::into).collect(),
        }
    }

    /// First `size` and last `size` tests out of `GT_01..GT_{total}`.
    pub fn edges(total_tests: u32, size: u32) -> Self {
        let size = size.min(total_tests / 2).max(1);
        let early = (1..=size).map(format_test_id);
        let late = (total_tests.saturating_sub(size) + 1..=total_tests).map(format_test_id);
        Self::new(early, late)
    }

    pub fn validate(&self) -> Result<()> {
        if self.early.is_empty() || self.late.is_empty() {
            return Err(DiagnosticError::InvalidConfig(
                "improvement windows must not be empty".to_string(),
            ));
        }
        if let Some(shared) = self.early.intersection(&self.late).next() {
            return Err(DiagnosticError::InvalidConfig(format!(
                "test {shared} is in both the early and late window"
            )));
        }
        Ok(())
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self::edges(10, 3)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SplitConfig {
    /// Fraction of each label's students held out for evaluation.
    pub eval_fraction: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            eval_fraction: 0.2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 12,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineConfig {
    pub window: WindowConfig,
    pub split: SplitConfig,
    pub forest: ForestConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.window.validate()?;
        if !(self.split.eval_fraction > 0.0 && self.split.eval_fraction < 1.0) {
            return Err(DiagnosticError::InvalidConfig(format!(
                "evaluation fraction must be in (0, 1), got {}",
                self.split.eval_fraction
            )));
        }
        if self.forest.n_trees == 0 {
            return Err(DiagnosticError::InvalidConfig(
                "forest needs at least one tree".to_string(),
            ));
        }
        if self.forest.max_depth == 0 {
            return Err(DiagnosticError::InvalidConfig(
                "max depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_windows_cover_first_and_last_three_tests() {
        let window = WindowConfig::default();
        let early: Vec<&str> = window.early.iter().map(String::as_str).collect();
        let late: Vec<&str> = window.late.iter().map(String::as_str).collect();
        assert_eq!(early, vec!["GT_01", "GT_02", "GT_03"]);
        assert_eq!(late, vec!["GT_08", "GT_09", "GT_10"]);
    }

    #[test]
    fn edges_clamp_to_half_the_tests() {
        let window = WindowConfig::edges(4, 5);
        assert_eq!(window.early.len(), 2);
        assert_eq!(window.late.len(), 2);
        assert!(window.validate().is_ok());
    }

    #[test]
    fn overlapping_windows_are_rejected() {
        let window = WindowConfig::new(["GT_01", "GT_02"], ["GT_02", "GT_03"]);
        assert!(window.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_fraction() {
        let mut config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        config.split.eval_fraction = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn cli_path_overrides_default() {
        let path = resolve_data_path(Some(PathBuf::from("custom.csv")));
        assert_eq!(path, PathBuf::from("custom.csv"));
    }
}
