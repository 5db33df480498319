use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RecordError, StatsError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoreType {
    Exam,
    Quiz,
    Homework,
    /// Anything else the data-entry side wrote. Kept so imports round-trip,
    /// never counted by the aggregation.
    Other(String),
}

impl ScoreType {
    pub fn as_str(&self) -> &str {
        match self {
            ScoreType::Exam => "exam",
            ScoreType::Quiz => "quiz",
            ScoreType::Homework => "homework",
            ScoreType::Other(value) => value,
        }
    }
}

impl From<&str> for ScoreType {
    fn from(value: &str) -> Self {
        match value {
            "exam" => ScoreType::Exam,
            "quiz" => ScoreType::Quiz,
            "homework" => ScoreType::Homework,
            other => ScoreType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ScoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreEntry {
    pub score_type: ScoreType,
    pub score: f64,
}

impl ScoreEntry {
    pub fn new(score_type: impl Into<ScoreType>, score: f64) -> Self {
        Self {
            score_type: score_type.into(),
            score,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub student_id: i32,
    pub class_id: i32,
    pub scores: Vec<ScoreEntry>,
}

impl ScoreRecord {
    /// Checks the constraints the `grades` table enforces.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.student_id < 0 {
            return Err(RecordError::NegativeStudentId(self.student_id));
        }
        if !(ClassId::MIN..=ClassId::MAX).contains(&self.class_id) {
            return Err(RecordError::ClassIdOutOfRange(self.class_id));
        }
        Ok(())
    }
}

/// A class identifier known to be inside `[0, 300]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassId(i32);

impl ClassId {
    pub const MIN: i32 = 0;
    pub const MAX: i32 = 300;

    pub fn get(self) -> i32 {
        self.0
    }
}

impl TryFrom<i32> for ClassId {
    type Error = StatsError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(ClassId(value))
        } else {
            Err(StatsError::InvalidClassId {
                input: value.to_string(),
            })
        }
    }
}

impl FromStr for ClassId {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i32 = s.parse().map_err(|_| StatsError::InvalidClassId {
            input: s.to_string(),
        })?;
        ClassId::try_from(value).map_err(|_| StatsError::InvalidClassId {
            input: s.to_string(),
        })
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsScope {
    All,
    Class(ClassId),
}

impl StatsScope {
    pub fn class_id(self) -> Option<i32> {
        match self {
            StatsScope::All => None,
            StatsScope::Class(class_id) => Some(class_id.get()),
        }
    }

    pub fn includes(self, record: &ScoreRecord) -> bool {
        self.class_id().map_or(true, |id| id == record.class_id)
    }
}

impl fmt::Display for StatsScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatsScope::All => f.write_str("all classes"),
            StatsScope::Class(class_id) => write!(f, "class {class_id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedAverage {
    pub learner_id: i32,
    pub avg: f64,
}

/// Response payload. Field names on the wire are the ones existing API
/// consumers already read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsReport {
    #[serde(rename = "totalLeaners")]
    pub total_learners: usize,
    #[serde(rename = "learnersAbove70")]
    pub learners_above_threshold: usize,
    #[serde(rename = "percentageAbove70")]
    pub percentage_above_threshold: f64,
}

impl StatisticsReport {
    /// An empty scope reports 0% instead of dividing by zero.
    pub fn new(total_learners: usize, learners_above_threshold: usize) -> Self {
        let percentage_above_threshold = if total_learners == 0 {
            0.0
        } else {
            learners_above_threshold as f64 / total_learners as f64 * 100.0
        };

        Self {
            total_learners,
            learners_above_threshold,
            percentage_above_threshold,
        }
    }
}
