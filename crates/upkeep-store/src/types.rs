use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cadence tag governing cycle boundary computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Monthly,
    Quarterly,
    Yearly,
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Monthly => write!(f, "monthly"),
            Self::Quarterly => write!(f, "quarterly"),
            Self::Yearly => write!(f, "yearly"),
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "yearly" => Ok(Self::Yearly),
            other => Err(format!("unsupported frequency: {other}")),
        }
    }
}

/// Lifecycle state of a task instance. Pending on creation; status
/// transitions are the only mutation after that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Pending,
    Completed,
    Skipped,
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for InstanceStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "skipped" => Ok(Self::Skipped),
            other => Err(format!("unknown instance status: {other}")),
        }
    }
}

/// A client company whose maintenance obligations are tracked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    /// UUID v4 string — primary key.
    pub id: String,
    /// Unique display name.
    pub name: String,
    pub address: Option<String>,
    pub point_of_contact: Option<String>,
    /// ISO-8601 timestamp of the last metadata update.
    pub last_updated: String,
    pub last_updated_by: Option<String>,
}

/// Template-level definition of a maintenance task
/// (e.g. "Check backup logs"). Not tied to any company by itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    /// Unique display name.
    pub name: String,
    pub description: Option<String>,
    pub documentation_link: Option<String>,
    pub last_updated: String,
    pub last_updated_by: Option<String>,
}

/// Durable link stating a company must perform a task every cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    pub company_id: String,
    pub task_id: String,
    pub created_at: String,
}

/// A calendar-aligned period during which a company's assigned tasks
/// must be completed once. (start, end) is a pure function of the
/// frequency and the reference instant, which is what makes the
/// (company, frequency, start, end) uniqueness check safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceCycle {
    pub id: String,
    pub company_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub frequency: Frequency,
}

/// One occurrence of an assignment's task within one specific cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInstance {
    pub id: String,
    pub assignment_id: String,
    pub cycle_id: String,
    /// Denormalised copy of the assignment's task id.
    pub task_id: String,
    pub status: InstanceStatus,
    pub notes: Option<String>,
    pub completed_at: Option<String>,
    pub skipped_at: Option<String>,
    pub last_updated: String,
    pub last_updated_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_roundtrip() {
        for tag in ["monthly", "quarterly", "yearly"] {
            let f: Frequency = tag.parse().expect("parse failed");
            assert_eq!(f.to_string(), tag);
        }
    }

    #[test]
    fn unsupported_frequency_tag_is_rejected() {
        assert!("weekly".parse::<Frequency>().is_err());
        assert!("".parse::<Frequency>().is_err());
        assert!("Monthly".parse::<Frequency>().is_err());
    }

    #[test]
    fn status_roundtrip() {
        for tag in ["pending", "completed", "skipped"] {
            let s: InstanceStatus = tag.parse().expect("parse failed");
            assert_eq!(s.to_string(), tag);
        }
        assert!("done".parse::<InstanceStatus>().is_err());
    }
}
