//! Test-execution records consumed by the linker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a test execution: one test, in one run, under one configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestExecutionKey {
    pub test_run_id: String,
    pub test_id: String,
    pub test_configuration_id: String,
}

impl TestExecutionKey {
    pub fn new(
        test_run_id: impl Into<String>,
        test_id: impl Into<String>,
        test_configuration_id: impl Into<String>,
    ) -> Self {
        Self {
            test_run_id: test_run_id.into(),
            test_id: test_id.into(),
            test_configuration_id: test_configuration_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestExecutionRow {
    pub test_run_id: String,
    pub test_id: String,
    pub test_configuration_id: String,
    /// Set once the result exists; never changes afterwards
    pub test_result_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TestExecutionRow {
    pub fn key(&self) -> TestExecutionKey {
        TestExecutionKey::new(
            self.test_run_id.clone(),
            self.test_id.clone(),
            self.test_configuration_id.clone(),
        )
    }
}
