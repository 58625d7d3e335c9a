// ⚙️ Run configuration - everything one pipeline run needs to know

use crate::error::EtlError;
use crate::master::DedupPolicy;
use crate::matcher::DEFAULT_SCORE_CUTOFF;
use anyhow::{bail, Result};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input_root: PathBuf,
    pub output_dir: PathBuf,
    pub taxonomy_path: PathBuf,

    /// File name of the master CSV inside `output_dir`
    pub master_file: String,

    /// JSON special rules replacing the built-ins
    pub rules_path: Option<PathBuf>,
    pub dedup_policy: DedupPolicy,
    pub score_cutoff: f64,

    /// Worker threads; 0 = one per core
    pub jobs: usize,
    pub sqlite_path: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn new(
        input_root: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        taxonomy_path: impl Into<PathBuf>,
        master_file: impl Into<String>,
    ) -> Self {
        PipelineConfig {
            input_root: input_root.into(),
            output_dir: output_dir.into(),
            taxonomy_path: taxonomy_path.into(),
            master_file: master_file.into(),
            rules_path: None,
            dedup_policy: DedupPolicy::default(),
            score_cutoff: DEFAULT_SCORE_CUTOFF,
            jobs: 0,
            sqlite_path: None,
        }
    }

    pub fn with_rules(mut self, path: impl Into<PathBuf>) -> Self {
        self.rules_path = Some(path.into());
        self
    }

    pub fn with_dedup_policy(mut self, policy: DedupPolicy) -> Self {
        self.dedup_policy = policy;
        self
    }

    pub fn with_score_cutoff(mut self, cutoff: f64) -> Self {
        self.score_cutoff = cutoff;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_sqlite(mut self, path: impl Into<PathBuf>) -> Self {
        self.sqlite_path = Some(path.into());
        self
    }

    pub fn master_path(&self) -> PathBuf {
        self.output_dir.join(&self.master_file)
    }

    /// Fail fast on configuration errors before any file is read
    pub fn validate(&self) -> Result<()> {
        if !self.taxonomy_path.is_file() {
            return Err(EtlError::MissingTaxonomyFile(self.taxonomy_path.clone()).into());
        }
        if !self.input_root.is_dir() {
            return Err(EtlError::MissingInputRoot(self.input_root.clone()).into());
        }
        if let Some(rules) = &self.rules_path {
            if !rules.is_file() {
                bail!("rules file not found: {:?}", rules);
            }
        }
        if self.master_file.trim().is_empty() || self.master_file.contains(['/', '\\']) {
            bail!("master must be a plain file name, got {:?}", self.master_file);
        }
        if !(0.0..=100.0).contains(&self.score_cutoff) {
            bail!("score cutoff must be within 0..=100, got {}", self.score_cutoff);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn create_test_config(dir: &std::path::Path) -> PipelineConfig {
        let input = dir.join("input");
        fs::create_dir_all(&input).unwrap();
        let taxonomy = dir.join("taxonomy.csv");
        fs::write(&taxonomy, "code,label,group\n1,Aktivlər,ASSETS\n").unwrap();
        PipelineConfig::new(input, dir.join("out"), taxonomy, "master.csv")
    }

    #[test]
    fn test_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = create_test_config(dir.path());

        assert_eq!(config.dedup_policy, DedupPolicy::LastByAmount);
        assert_eq!(config.score_cutoff, 70.0);
        assert_eq!(config.master_path(), dir.path().join("out").join("master.csv"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_taxonomy_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = create_test_config(dir.path());
        config.taxonomy_path = dir.path().join("nope.csv");

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EtlError>(),
            Some(EtlError::MissingTaxonomyFile(_))
        ));
    }

    #[test]
    fn test_missing_input_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = create_test_config(dir.path());
        config.input_root = dir.path().join("missing");

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EtlError>(),
            Some(EtlError::MissingInputRoot(_))
        ));
    }

    #[test]
    fn test_rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        assert!(create_test_config(dir.path())
            .with_score_cutoff(120.0)
            .validate()
            .is_err());

        let mut config = create_test_config(dir.path());
        config.master_file = "../master.csv".to_string();
        assert!(config.validate().is_err());

        assert!(create_test_config(dir.path())
            .with_rules(dir.path().join("rules.json"))
            .validate()
            .is_err());
    }
}
