//! Draft lifecycle states.

use serde::{Deserialize, Serialize};

/// Status of a draft as it moves through scheduling and publishing.
///
/// `Scheduled` requires a schedule time and time zone on the record.
/// A draft enters `Progress` only from `Scheduled` (when a worker picks it
/// up) and reaches `Published` or `Failed` only from `Progress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftStatus {
    Saved,
    Scheduled,
    Progress,
    Published,
    Failed,
}

impl DraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftStatus::Saved => "saved",
            DraftStatus::Scheduled => "scheduled",
            DraftStatus::Progress => "progress",
            DraftStatus::Published => "published",
            DraftStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DraftStatus::Published | DraftStatus::Failed)
    }

    /// Whether the status machine permits moving to `next`.
    pub fn can_transition_to(&self, next: DraftStatus) -> bool {
        use DraftStatus::*;
        match (self, next) {
            // Scheduling supersedes anything, including a re-schedule of a
            // draft that is mid-publish or already published.
            (_, Scheduled) => true,
            (Scheduled, Saved) => true,
            (Scheduled, Progress) => true,
            (Progress, Published) => true,
            (Progress, Failed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DraftStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "saved" => Ok(DraftStatus::Saved),
            "scheduled" => Ok(DraftStatus::Scheduled),
            "progress" => Ok(DraftStatus::Progress),
            "published" => Ok(DraftStatus::Published),
            "failed" => Ok(DraftStatus::Failed),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown draft status: {other}"
            ))),
        }
    }
}
