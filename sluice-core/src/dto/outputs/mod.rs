//! Operator-facing identifiers
//!
//! Informational only; nothing in the pipeline reads these back.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outputs {
    pub landing_bucket: String,
    pub processed_bucket: String,
    pub temp_bucket: String,
    pub transform_job_name: String,
    pub catalog_job_name: String,
    pub workflow_id: String,
    pub dispatch_rule_id: String,
}
