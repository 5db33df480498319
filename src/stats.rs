use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::StatsError;
use crate::models::{ClassId, ScoreRecord, ScoreType, StatisticsReport, StatsScope, WeightedAverage};
use crate::store::GradeStore;

pub const EXAM_WEIGHT: f64 = 0.5;
pub const QUIZ_WEIGHT: f64 = 0.3;
pub const HOMEWORK_WEIGHT: f64 = 0.2;
pub const PASSING_THRESHOLD: f64 = 70.0;

#[derive(Debug, Default)]
struct ScoreBuckets {
    exam: Vec<f64>,
    quiz: Vec<f64>,
    homework: Vec<f64>,
}

impl ScoreBuckets {
    fn push(&mut self, score_type: &ScoreType, score: f64) {
        match score_type {
            ScoreType::Exam => self.exam.push(score),
            ScoreType::Quiz => self.quiz.push(score),
            ScoreType::Homework => self.homework.push(score),
            ScoreType::Other(_) => {}
        }
    }

    // Weights are not renormalized: a missing category adds 0.
    fn weighted_average(&self) -> f64 {
        mean(&self.exam) * EXAM_WEIGHT
            + mean(&self.quiz) * QUIZ_WEIGHT
            + mean(&self.homework) * HOMEWORK_WEIGHT
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// One weighted average per student that has at least one score entry,
/// ordered by student id. Scores from every record of a student are pooled.
pub fn weighted_averages(records: &[ScoreRecord]) -> Vec<WeightedAverage> {
    let mut by_student: BTreeMap<i32, ScoreBuckets> = BTreeMap::new();

    for record in records {
        for entry in &record.scores {
            by_student
                .entry(record.student_id)
                .or_default()
                .push(&entry.score_type, entry.score);
        }
    }

    by_student
        .into_iter()
        .map(|(learner_id, buckets)| WeightedAverage {
            learner_id,
            avg: buckets.weighted_average(),
        })
        .collect()
}

pub fn passing(averages: Vec<WeightedAverage>) -> Vec<WeightedAverage> {
    averages
        .into_iter()
        .filter(|average| average.avg >= PASSING_THRESHOLD)
        .collect()
}

#[derive(Clone)]
pub struct GradeStatistics {
    store: Arc<dyn GradeStore>,
}

impl GradeStatistics {
    pub fn new(store: Arc<dyn GradeStore>) -> Self {
        Self { store }
    }

    pub async fn global(&self) -> Result<StatisticsReport, StatsError> {
        self.compute(StatsScope::All).await
    }

    /// `raw_class_id` comes straight from the caller and is validated before
    /// the store is touched.
    pub async fn for_class(&self, raw_class_id: &str) -> Result<StatisticsReport, StatsError> {
        let class_id: ClassId = raw_class_id.parse()?;
        self.compute(StatsScope::Class(class_id)).await
    }

    pub async fn compute(&self, scope: StatsScope) -> Result<StatisticsReport, StatsError> {
        let above = self.passing_learners(scope).await?;
        let total_learners = self.store.distinct_student_ids(scope).await?.len();
        let report = StatisticsReport::new(total_learners, above.len());

        info!(
            %scope,
            total_learners = report.total_learners,
            learners_above_threshold = report.learners_above_threshold,
            "computed grade statistics"
        );
        Ok(report)
    }

    pub async fn passing_learners(&self, scope: StatsScope) -> Result<Vec<WeightedAverage>, StatsError> {
        let records = self.store.fetch_records(scope).await?;
        let above = passing(weighted_averages(&records));
        debug!(%scope, ?above, "learners at or above threshold");
        Ok(above)
    }

    pub async fn class_breakdown(&self) -> Result<Vec<(ClassId, StatisticsReport)>, StatsError> {
        let mut reports = Vec::new();
        for class_id in self.store.class_ids().await? {
            reports.push((class_id, self.compute(StatsScope::Class(class_id)).await?));
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScoreEntry;
    use crate::store::MemoryStore;

    fn record(student_id: i32, class_id: i32, scores: &[(&str, f64)]) -> ScoreRecord {
        ScoreRecord {
            student_id,
            class_id,
            scores: scores
                .iter()
                .map(|(score_type, score)| ScoreEntry::new(*score_type, *score))
                .collect(),
        }
    }

    fn average_of(records: &[ScoreRecord], student_id: i32) -> f64 {
        weighted_averages(records)
            .into_iter()
            .find(|average| average.learner_id == student_id)
            .map(|average| average.avg)
            .unwrap()
    }

    fn service(records: Vec<ScoreRecord>) -> GradeStatistics {
        GradeStatistics::new(Arc::new(MemoryStore::new(records)))
    }

    #[test]
    fn perfect_scores_average_to_one_hundred() {
        let records = vec![record(
            1,
            5,
            &[("exam", 100.0), ("exam", 100.0), ("quiz", 100.0), ("homework", 100.0)],
        )];
        assert!((average_of(&records, 1) - 100.0).abs() < 1e-9);
        assert_eq!(passing(weighted_averages(&records)).len(), 1);
    }

    #[test]
    fn uniform_scores_average_to_themselves() {
        let records = vec![record(1, 5, &[("exam", 80.0), ("quiz", 80.0), ("homework", 80.0)])];
        assert!((average_of(&records, 1) - 80.0).abs() < 1e-9);
    }

    #[test]
    fn missing_categories_contribute_zero() {
        let records = vec![record(1, 5, &[("exam", 100.0), ("exam", 100.0)])];
        assert!((average_of(&records, 1) - 50.0).abs() < 1e-9);
        assert!(passing(weighted_averages(&records)).is_empty());
    }

    #[test]
    fn unrecognized_types_are_ignored() {
        let plain = vec![record(1, 5, &[("exam", 90.0), ("quiz", 70.0), ("homework", 60.0)])];
        let with_bonus = vec![record(
            1,
            5,
            &[("exam", 90.0), ("bonus", 1000.0), ("quiz", 70.0), ("homework", 60.0)],
        )];
        assert_eq!(average_of(&plain, 1), average_of(&with_bonus, 1));
    }

    #[test]
    fn threshold_is_inclusive() {
        let averages = vec![
            WeightedAverage { learner_id: 1, avg: 70.0 },
            WeightedAverage { learner_id: 2, avg: 69.99 },
        ];
        let above = passing(averages);
        assert_eq!(above.len(), 1);
        assert_eq!(above[0].learner_id, 1);
    }

    #[test]
    fn scores_pool_across_records_of_one_student() {
        let records = vec![
            record(1, 5, &[("exam", 100.0)]),
            record(1, 6, &[("exam", 60.0), ("quiz", 90.0)]),
        ];
        let averages = weighted_averages(&records);
        assert_eq!(averages.len(), 1);
        let expected = 80.0 * EXAM_WEIGHT + 90.0 * QUIZ_WEIGHT;
        assert!((averages[0].avg - expected).abs() < 1e-9);
    }

    #[test]
    fn averages_are_ordered_by_student() {
        let records = vec![
            record(30, 5, &[("exam", 1.0)]),
            record(2, 5, &[("exam", 1.0)]),
            record(11, 5, &[("exam", 1.0)]),
        ];
        let ids: Vec<i32> = weighted_averages(&records)
            .into_iter()
            .map(|average| average.learner_id)
            .collect();
        assert_eq!(ids, vec![2, 11, 30]);
    }

    #[tokio::test]
    async fn global_report_counts_every_distinct_student() {
        let stats = service(vec![
            record(1, 5, &[("exam", 90.0), ("quiz", 90.0), ("homework", 90.0)]),
            record(2, 5, &[("exam", 100.0), ("exam", 100.0)]),
            record(3, 7, &[]),
            record(4, 7, &[("exam", 75.0), ("quiz", 75.0), ("homework", 75.0)]),
        ]);

        let report = stats.global().await.unwrap();
        assert_eq!(report.total_learners, 4);
        assert_eq!(report.learners_above_threshold, 2);
        assert!((report.percentage_above_threshold - 50.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn class_report_ignores_other_classes() {
        let stats = service(vec![
            record(1, 5, &[("exam", 40.0), ("quiz", 40.0), ("homework", 40.0)]),
            record(1, 6, &[("exam", 100.0), ("quiz", 100.0), ("homework", 100.0)]),
            record(2, 6, &[("exam", 95.0), ("quiz", 95.0), ("homework", 95.0)]),
        ]);

        let report = stats.for_class("5").await.unwrap();
        assert_eq!(report.total_learners, 1);
        assert_eq!(report.learners_above_threshold, 0);
        assert_eq!(report.percentage_above_threshold, 0.0);

        let report = stats.for_class("6").await.unwrap();
        assert_eq!(report.total_learners, 2);
        assert_eq!(report.learners_above_threshold, 2);
        assert!((report.percentage_above_threshold - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_scopes_report_zero() {
        let stats = service(Vec::new());
        let report = stats.global().await.unwrap();
        assert_eq!(report, StatisticsReport::new(0, 0));
        assert_eq!(report.percentage_above_threshold, 0.0);

        let stats = service(vec![record(1, 5, &[("exam", 90.0)])]);
        let report = stats.for_class("200").await.unwrap();
        assert_eq!(report.total_learners, 0);
        assert_eq!(report.learners_above_threshold, 0);
        assert_eq!(report.percentage_above_threshold, 0.0);
    }

    #[tokio::test]
    async fn invalid_class_id_is_rejected() {
        let stats = service(Vec::new());
        for input in ["abc", "-4", "301"] {
            assert!(matches!(
                stats.for_class(input).await,
                Err(StatsError::InvalidClassId { .. })
            ));
        }
    }

    #[tokio::test]
    async fn percentage_matches_ratio_and_stays_in_range() {
        let mut records = Vec::new();
        for student_id in 0..7 {
            let score = 50.0 + student_id as f64 * 7.0;
            records.push(record(
                student_id,
                student_id % 3,
                &[("exam", score), ("quiz", score), ("homework", score)],
            ));
        }
        let stats = service(records);

        let mut reports = vec![stats.global().await.unwrap()];
        reports.extend(stats.class_breakdown().await.unwrap().into_iter().map(|(_, r)| r));
        assert_eq!(reports.len(), 4);

        for report in reports {
            assert!(report.total_learners > 0);
            let expected =
                report.learners_above_threshold as f64 / report.total_learners as f64 * 100.0;
            assert!((report.percentage_above_threshold - expected).abs() < 1e-9);
            assert!((0.0..=100.0).contains(&report.percentage_above_threshold));
        }
    }
}
