// src/result.rs

//! Test result records exchanged between fragment bodies, the execution
//! backends and the running-status aggregator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of a single test result.
///
/// The declaration order is the display order used in status snapshots and
/// summaries, so keep it stable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    Pass,
    Fail,
    XFail,
    XPass,
    Verify,
    Skip,
    NotApplicable,
    Error,
}

impl TestStatus {
    /// Whether this status counts as a failure for the circuit breaker.
    pub fn is_failure(self) -> bool {
        matches!(self, TestStatus::Fail | TestStatus::Error)
    }

    /// Upper-case name, as printed in status snapshots.
    pub fn name(self) -> &'static str {
        match self {
            TestStatus::Pass => "PASS",
            TestStatus::Fail => "FAIL",
            TestStatus::XFail => "XFAIL",
            TestStatus::XPass => "XPASS",
            TestStatus::Verify => "VERIFY",
            TestStatus::Skip => "SKIP",
            TestStatus::NotApplicable => "NOT_APPLICABLE",
            TestStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One test result produced by a fragment body.
///
/// The scheduler core does not interpret these beyond the status kind; they
/// flow through the collection callback into whatever reporting sink the
/// caller uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Result identifier, unique within one run.
    pub id: String,

    pub status: TestStatus,

    /// Optional one-line explanation for the status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Free-form execution log.
    #[serde(default)]
    pub log: String,
}

impl ResultRecord {
    pub fn new(id: impl Into<String>, status: TestStatus) -> Self {
        Self {
            id: id.into(),
            status,
            message: None,
            log: String::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_log(mut self, log: impl Into<String>) -> Self {
        self.log = log.into();
        self
    }

    /// Build the error result that replaces the output of a fragment whose
    /// execution aborted (body panic, dead worker process, unreadable
    /// exchange artifact).
    ///
    /// The id gets a suffix derived from the worker index so that several
    /// aborted executions of related fragments never collide in the report.
    pub fn synthetic_failure(uid: &str, index: u64, log: impl Into<String>) -> Self {
        Self {
            id: format!("{uid}__except{index}"),
            status: TestStatus::Error,
            message: Some("fragment execution aborted".to_string()),
            log: log.into(),
        }
    }
}
