use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;

use crate::error::StatsError;
use crate::import;
use crate::models::{ClassId, ScoreRecord, StatsScope};

/// Read access to score records. Implementations only need a scan filtered
/// by scope and a distinct-student lookup.
#[async_trait]
pub trait GradeStore: Send + Sync {
    async fn fetch_records(&self, scope: StatsScope) -> Result<Vec<ScoreRecord>, StatsError>;

    /// Distinct student ids in scope, including students whose records hold
    /// no scores.
    async fn distinct_student_ids(&self, scope: StatsScope) -> Result<Vec<i32>, StatsError>;

    async fn class_ids(&self) -> Result<Vec<ClassId>, StatsError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    records: Vec<ScoreRecord>,
}

impl MemoryStore {
    pub fn new(records: Vec<ScoreRecord>) -> Self {
        Self { records }
    }

    pub fn from_csv(csv_path: &Path) -> anyhow::Result<Self> {
        let records = import::validated(import::read_csv(csv_path)?)
            .into_iter()
            .map(|keyed| keyed.record)
            .collect();
        Ok(Self::new(records))
    }

    fn in_scope(&self, scope: StatsScope) -> impl Iterator<Item = &ScoreRecord> {
        self.records.iter().filter(move |record| scope.includes(record))
    }
}

#[async_trait]
impl GradeStore for MemoryStore {
    async fn fetch_records(&self, scope: StatsScope) -> Result<Vec<ScoreRecord>, StatsError> {
        Ok(self.in_scope(scope).cloned().collect())
    }

    async fn distinct_student_ids(&self, scope: StatsScope) -> Result<Vec<i32>, StatsError> {
        let ids: BTreeSet<i32> = self.in_scope(scope).map(|record| record.student_id).collect();
        Ok(ids.into_iter().collect())
    }

    async fn class_ids(&self) -> Result<Vec<ClassId>, StatsError> {
        let ids: BTreeSet<i32> = self.records.iter().map(|record| record.class_id).collect();
        ids.into_iter().map(ClassId::try_from).collect()
    }
}
