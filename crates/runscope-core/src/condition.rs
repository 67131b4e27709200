//! Condition classification for runs and task runs.
//!
//! Every observed resource reports its health as a list of conditions. Only the
//! `Succeeded` condition matters for display; when it is missing the resource is
//! treated as pending, never as an error.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Condition type that represents overall success or failure.
pub const SUCCEEDED: &str = "Succeeded";

/// Tri-state status carried by a condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum ConditionStatus {
    True,
    False,
    /// Also used for any status string the backend invents.
    #[default]
    Unknown,
}

impl From<String> for ConditionStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "True" => Self::True,
            "False" => Self::False,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::True => "True",
            Self::False => "False",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// A timestamped status record attached to a run or task run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,

    #[serde(default)]
    pub status: ConditionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl Condition {
    /// Create a condition with the given type and status.
    pub fn new(condition_type: impl Into<String>, status: ConditionStatus) -> Self {
        Self {
            condition_type: condition_type.into(),
            status,
            reason: None,
            message: None,
            last_transition_time: None,
        }
    }

    /// Builder method to set the reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Builder method to set the message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Anything that exposes a condition list.
pub trait Conditioned {
    fn conditions(&self) -> &[Condition];
}

impl Conditioned for [Condition] {
    fn conditions(&self) -> &[Condition] {
        self
    }
}

impl Conditioned for Vec<Condition> {
    fn conditions(&self) -> &[Condition] {
        self
    }
}

/// Normalized view of a resource's `Succeeded` condition.
///
/// All fields are `None` when the condition is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub status: Option<ConditionStatus>,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl StatusSummary {
    pub fn is_failed(&self) -> bool {
        self.status == Some(ConditionStatus::False)
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == Some(ConditionStatus::True)
    }

    /// True while no verdict has been reached yet.
    pub fn is_pending(&self) -> bool {
        matches!(self.status, None | Some(ConditionStatus::Unknown))
    }

    /// Coarse phase for headers and list rows.
    pub fn phase(&self) -> RunPhase {
        match self.status {
            Some(ConditionStatus::True) => RunPhase::Succeeded,
            Some(ConditionStatus::False) => RunPhase::Failed,
            Some(ConditionStatus::Unknown) => RunPhase::Running,
            None => RunPhase::Pending,
        }
    }
}

/// Display phase derived from a [`StatusSummary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RunPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl RunPhase {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
        }
    }
}

/// Classify a resource by its `Succeeded` condition.
pub fn classify<R: Conditioned + ?Sized>(resource: &R) -> StatusSummary {
    resource
        .conditions()
        .iter()
        .find(|c| c.condition_type == SUCCEEDED)
        .map(|c| StatusSummary {
            status: Some(c.status),
            reason: c.reason.clone(),
            message: c.message.clone(),
            last_transition_time: c.last_transition_time,
        })
        .unwrap_or_default()
}

/// Decode a condition list, dropping entries that do not parse.
///
/// A missing, `null` or non-array value yields an empty list.
pub(crate) fn deserialize_conditions<'de, D>(deserializer: D) -> Result<Vec<Condition>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    let conditions = match raw {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    };
    Ok(conditions)
}
