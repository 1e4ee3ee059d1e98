//! Job provisioning
//!
//! Builds the static definitions of the two jobs this pipeline owns.

use sluice_core::domain::job::{JobDefinition, JobKind};
use std::collections::BTreeMap;

use crate::config::Config;

/// Parameter carrying the changed landing object into the transform job
pub const MODIFIED_FILE_PARAM: &str = "modified_file";

/// The transform and catalog definitions owned by one pipeline
#[derive(Debug, Clone)]
pub struct PipelineJobs {
    pub transform: JobDefinition,
    pub catalog: JobDefinition,
}

impl PipelineJobs {
    pub fn from_config(config: &Config) -> Self {
        Self {
            transform: transform_job(config),
            catalog: catalog_job(config),
        }
    }
}

fn transform_job(config: &Config) -> JobDefinition {
    let default_parameters = BTreeMap::from([
        (
            "temp_dir".to_string(),
            format!("{}/temp/", config.temp_bucket),
        ),
        ("source_bucket".to_string(), config.landing_bucket.clone()),
        ("target_bucket".to_string(), config.processed_bucket.clone()),
        ("database_name".to_string(), config.database_name.clone()),
        ("table_name".to_string(), config.table_name.clone()),
        (MODIFIED_FILE_PARAM.to_string(), String::new()),
    ]);

    JobDefinition {
        name: config.transform_job_name.clone(),
        kind: JobKind::Job,
        description: Some("Converts landing data into processed data".to_string()),
        default_parameters,
        script_location: config.transform_script.clone(),
        worker_type: "Standard".to_string(),
        number_of_workers: 2,
        max_retries: 0,
        max_concurrent_runs: 1,
    }
}

fn catalog_job(config: &Config) -> JobDefinition {
    // The crawler scans the processed dataset as a whole, never a single file.
    let default_parameters = BTreeMap::from([
        (
            "target_path".to_string(),
            format!("{}/{}", config.processed_bucket, config.dataset_prefix),
        ),
        ("database_name".to_string(), config.database_name.clone()),
        (
            "update_behavior".to_string(),
            "UPDATE_IN_DATABASE".to_string(),
        ),
        ("delete_behavior".to_string(), "LOG".to_string()),
    ]);

    JobDefinition {
        name: config.catalog_job_name.clone(),
        kind: JobKind::Crawler,
        description: Some("Crawls processed energy market data for querying".to_string()),
        default_parameters,
        script_location: config.catalog_script.clone(),
        worker_type: "Standard".to_string(),
        number_of_workers: 1,
        max_retries: 0,
        max_concurrent_runs: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_job_never_retries() {
        let jobs = PipelineJobs::from_config(&Config::default());
        assert_eq!(jobs.transform.max_retries, 0);
        assert_eq!(jobs.transform.default_parameters[MODIFIED_FILE_PARAM], "");
        assert_eq!(
            jobs.transform.default_parameters["target_bucket"],
            "data-processed-zone"
        );
    }

    #[test]
    fn test_catalog_targets_processed_dataset() {
        let jobs = PipelineJobs::from_config(&Config::default());
        assert_eq!(jobs.catalog.kind, JobKind::Crawler);
        assert_eq!(
            jobs.catalog.default_parameters["target_path"],
            "data-processed-zone/daa_market/"
        );
        assert!(!jobs.catalog.default_parameters.contains_key(MODIFIED_FILE_PARAM));
    }
}
