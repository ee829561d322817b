use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier assigned by the store when a training is published.
    TrainingId
);
string_id!(
    /// Identifier of the single enrollment record kept per (employee, training) pair.
    EnrollmentId
);
string_id!(
    /// Employee identity issued by the external authentication layer.
    EmployeeId
);
string_id!(
    /// Trainer identity issued by the external authentication layer.
    TrainerId
);

/// Maximum number of concurrently active enrollments for a training. Always at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SeatLimit(u32);

impl SeatLimit {
    pub fn new(value: u32) -> Option<Self> {
        (value >= 1).then_some(Self(value))
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl<'de> Deserialize<'de> for SeatLimit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = u32::deserialize(deserializer)?;
        SeatLimit::new(raw).ok_or_else(|| serde::de::Error::custom("seat limit must be at least 1"))
    }
}

impl fmt::Display for SeatLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A published training owned by a single trainer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Training {
    pub id: TrainingId,
    pub title: String,
    pub description: String,
    pub seat_limit: SeatLimit,
    pub trainer_id: TrainerId,
    pub created_at: DateTime<Utc>,
}

impl Training {
    pub fn is_owned_by(&self, trainer: &TrainerId) -> bool {
        &self.trainer_id == trainer
    }
}

/// Lifecycle state of an enrollment record. Cancellation is a state, never a deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    #[serde(alias = "ENROLLED")]
    Active,
    Cancelled,
}

impl EnrollmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "ACTIVE",
            EnrollmentStatus::Cancelled => "CANCELLED",
        }
    }

    pub const fn counts_against_capacity(self) -> bool {
        matches!(self, EnrollmentStatus::Active)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub employee_id: EmployeeId,
    pub training_id: TrainingId,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn is_active(&self) -> bool {
        self.status.counts_against_capacity()
    }
}

/// Trainer supplied fields for publishing a training.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTraining {
    pub title: String,
    pub description: String,
    pub seat_limit: u32,
}

/// Partial update of a training; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingChanges {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub seat_limit: Option<u32>,
}

impl TrainingChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.seat_limit.is_none()
    }
}

/// Validated form of [`NewTraining`] handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingDraft {
    pub title: String,
    pub description: String,
    pub seat_limit: SeatLimit,
    pub trainer_id: TrainerId,
    pub created_at: DateTime<Utc>,
}
