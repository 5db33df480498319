use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{ClassId, StatisticsReport, WeightedAverage};
use crate::stats::PASSING_THRESHOLD;

pub fn build_report(
    generated_at: DateTime<Utc>,
    overall: &StatisticsReport,
    classes: &[(ClassId, StatisticsReport)],
    passing: &[WeightedAverage],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Grade Statistics Report");
    let _ = writeln!(
        output,
        "Generated {} (passing threshold {:.0})",
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        PASSING_THRESHOLD
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## All Classes");
    let _ = writeln!(output, "- {}", summary_line(overall));

    let _ = writeln!(output);
    let _ = writeln!(output, "## By Class");

    if classes.is_empty() {
        let _ = writeln!(output, "No classes recorded.");
    } else {
        for (class_id, report) in classes {
            let _ = writeln!(output, "- Class {}: {}", class_id, summary_line(report));
        }
    }

    let mut ranked = passing.to_vec();
    ranked.sort_by(|a, b| b.avg.partial_cmp(&a.avg).unwrap_or(std::cmp::Ordering::Equal));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Passing Learners");

    if ranked.is_empty() {
        let _ = writeln!(output, "No learners at or above the threshold.");
    } else {
        for learner in ranked.iter().take(10) {
            let _ = writeln!(
                output,
                "- Learner {}: weighted average {:.2}",
                learner.learner_id, learner.avg
            );
        }
    }

    output
}

fn summary_line(report: &StatisticsReport) -> String {
    format!(
        "{} of {} learners passing ({:.1}%)",
        report.learners_above_threshold, report.total_learners, report.percentage_above_threshold
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn report_lists_classes_and_ranks_learners() {
        let generated_at = Utc.with_ymd_and_hms(2026, 2, 3, 9, 30, 0).unwrap();
        let classes = vec![
            (ClassId::try_from(5).unwrap(), StatisticsReport::new(3, 1)),
            (ClassId::try_from(12).unwrap(), StatisticsReport::new(2, 2)),
        ];
        let passing = vec![
            WeightedAverage { learner_id: 101, avg: 74.25 },
            WeightedAverage { learner_id: 104, avg: 82.1 },
        ];

        let report = build_report(generated_at, &StatisticsReport::new(4, 2), &classes, &passing);

        assert!(report.contains("Generated 2026-02-03 09:30 UTC"));
        assert!(report.contains("- 2 of 4 learners passing (50.0%)"));
        assert!(report.contains("- Class 5: 1 of 3 learners passing (33.3%)"));
        assert!(report.contains("- Class 12: 2 of 2 learners passing (100.0%)"));

        let first = report.find("Learner 104").unwrap();
        let second = report.find("Learner 101").unwrap();
        assert!(first < second);
    }

    #[test]
    fn empty_report_says_so() {
        let report = build_report(Utc::now(), &StatisticsReport::new(0, 0), &[], &[]);
        assert!(report.contains("- 0 of 0 learners passing (0.0%)"));
        assert!(report.contains("No classes recorded."));
        assert!(report.contains("No learners at or above the threshold."));
    }
}
