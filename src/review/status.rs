//! Review status values

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::errors::ValidationError;

/// Workflow status of a record.
///
/// Every value except `Pending` is terminal for the pending queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ReviewStatus {
    /// Awaiting review
    #[default]
    Pending,
    /// Classification confirmed
    Ok,
    /// Generic negative
    Ko,
    /// Negative with a mandatory sub-reason
    KoMym,
    /// Negative attributed to the agent
    KoAgente,
    /// Uncertain, needs a second look
    Duda,
    /// Deferred or out of scope
    Fds,
}

impl ReviewStatus {
    /// All statuses a reviewer may submit
    pub const TERMINAL: [ReviewStatus; 6] = [
        ReviewStatus::Ok,
        ReviewStatus::Ko,
        ReviewStatus::KoMym,
        ReviewStatus::KoAgente,
        ReviewStatus::Duda,
        ReviewStatus::Fds,
    ];

    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "Pending",
            ReviewStatus::Ok => "OK",
            ReviewStatus::Ko => "KO",
            ReviewStatus::KoMym => "KO MYM",
            ReviewStatus::KoAgente => "KO AGENTE",
            ReviewStatus::Duda => "DUDA",
            ReviewStatus::Fds => "FDS",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReviewStatus::Pending)
    }

    /// KO family (every status whose wire form starts with `KO`)
    pub fn is_ko(&self) -> bool {
        matches!(
            self,
            ReviewStatus::Ko | ReviewStatus::KoMym | ReviewStatus::KoAgente
        )
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "PENDING" | "PENDIENTE" | "" => Ok(ReviewStatus::Pending),
            "OK" => Ok(ReviewStatus::Ok),
            "KO" => Ok(ReviewStatus::Ko),
            "KO MYM" => Ok(ReviewStatus::KoMym),
            "KO AGENTE" => Ok(ReviewStatus::KoAgente),
            "DUDA" => Ok(ReviewStatus::Duda),
            "FDS" => Ok(ReviewStatus::Fds),
            _ => Err(ValidationError::UnknownStatus(s.to_string())),
        }
    }
}

impl Serialize for ReviewStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ReviewStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
