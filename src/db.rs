use std::path::Path;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::StatsError;
use crate::import::{self, KeyedRecord};
use crate::models::{ClassId, ScoreEntry, ScoreRecord, StatsScope};
use crate::store::GradeStore;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let samples: Vec<(&str, i32, i32, Vec<(&str, f64)>)> = vec![
        (
            "seed-001",
            101,
            5,
            vec![("exam", 88.5), ("quiz", 92.0), ("homework", 79.0), ("homework", 85.0)],
        ),
        (
            "seed-002",
            102,
            5,
            vec![("exam", 64.0), ("quiz", 71.5), ("homework", 90.0)],
        ),
        // Exams only: weighted average tops out at 50.
        ("seed-003", 103, 5, vec![("exam", 100.0), ("exam", 96.0)]),
        (
            "seed-004",
            101,
            12,
            vec![("exam", 74.0), ("quiz", 68.0), ("homework", 100.0)],
        ),
        (
            "seed-005",
            104,
            12,
            vec![("exam", 81.0), ("quiz", 77.0), ("bonus", 10.0), ("homework", 93.5)],
        ),
        ("seed-006", 105, 12, vec![]),
    ];

    let mut inserted = 0usize;
    for (source_key, student_id, class_id, scores) in samples {
        let keyed = KeyedRecord {
            source_key: source_key.to_string(),
            record: ScoreRecord {
                student_id,
                class_id,
                scores: scores
                    .into_iter()
                    .map(|(score_type, score)| ScoreEntry::new(score_type, score))
                    .collect(),
            },
        };
        if insert_record(pool, &keyed).await? {
            inserted += 1;
        }
    }

    Ok(inserted)
}

pub async fn import_csv(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let records = import::validated(import::read_csv(csv_path)?);
    let mut inserted = 0usize;

    for keyed in &records {
        if insert_record(pool, keyed).await? {
            inserted += 1;
        } else {
            warn!(source_key = %keyed.source_key, "record already imported");
        }
    }

    info!(inserted, candidates = records.len(), "csv import finished");
    Ok(inserted)
}

/// Inserts a record and its scores; returns false when the source key is
/// already present.
async fn insert_record(pool: &PgPool, keyed: &KeyedRecord) -> anyhow::Result<bool> {
    let mut tx = pool.begin().await?;

    let grade_id: Option<Uuid> = sqlx::query(
        r#"
        INSERT INTO grade_stats.grades (id, student_id, class_id, source_key)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (source_key) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(keyed.record.student_id)
    .bind(keyed.record.class_id)
    .bind(&keyed.source_key)
    .fetch_optional(&mut *tx)
    .await?
    .map(|row| row.get("id"));

    let Some(grade_id) = grade_id else {
        tx.rollback().await?;
        return Ok(false);
    };

    for (position, entry) in keyed.record.scores.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO grade_stats.grade_scores (grade_id, position, score_type, score)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(grade_id)
        .bind(i32::try_from(position)?)
        .bind(entry.score_type.as_str())
        .bind(entry.score)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(true)
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GradeStore for PgStore {
    async fn fetch_records(&self, scope: StatsScope) -> Result<Vec<ScoreRecord>, StatsError> {
        let mut query = String::from(
            "SELECT g.id, g.student_id, g.class_id, s.score_type, s.score \
             FROM grade_stats.grades g \
             LEFT JOIN grade_stats.grade_scores s ON s.grade_id = g.id",
        );
        if scope.class_id().is_some() {
            query.push_str(" WHERE g.class_id = $1");
        }
        query.push_str(" ORDER BY g.created_at, g.id, s.position");

        let mut rows = sqlx::query(&query);
        if let Some(class_id) = scope.class_id() {
            rows = rows.bind(class_id);
        }

        let mut records: Vec<ScoreRecord> = Vec::new();
        let mut current: Option<Uuid> = None;

        for row in rows.fetch_all(&self.pool).await? {
            let grade_id: Uuid = row.try_get("id")?;
            if current != Some(grade_id) {
                current = Some(grade_id);
                records.push(ScoreRecord {
                    student_id: row.try_get("student_id")?,
                    class_id: row.try_get("class_id")?,
                    scores: Vec::new(),
                });
            }

            let score_type: Option<String> = row.try_get("score_type")?;
            let score: Option<f64> = row.try_get("score")?;
            if let (Some(score_type), Some(score), Some(record)) =
                (score_type, score, records.last_mut())
            {
                record.scores.push(ScoreEntry::new(score_type.as_str(), score));
            }
        }

        Ok(records)
    }

    async fn distinct_student_ids(&self, scope: StatsScope) -> Result<Vec<i32>, StatsError> {
        let mut query = String::from("SELECT DISTINCT student_id FROM grade_stats.grades");
        if scope.class_id().is_some() {
            query.push_str(" WHERE class_id = $1");
        }
        query.push_str(" ORDER BY student_id");

        let mut rows = sqlx::query_scalar::<_, i32>(&query);
        if let Some(class_id) = scope.class_id() {
            rows = rows.bind(class_id);
        }

        Ok(rows.fetch_all(&self.pool).await?)
    }

    async fn class_ids(&self) -> Result<Vec<ClassId>, StatsError> {
        let ids: Vec<i32> =
            sqlx::query_scalar("SELECT DISTINCT class_id FROM grade_stats.grades ORDER BY class_id")
                .fetch_all(&self.pool)
                .await?;

        Ok(ids
            .into_iter()
            .filter_map(|id| match ClassId::try_from(id) {
                Ok(class_id) => Some(class_id),
                Err(err) => {
                    warn!("ignoring stored row: {err}");
                    None
                }
            })
            .collect())
    }
}
