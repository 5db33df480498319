use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use anyhow::Context;
use tracing::warn;

use crate::models::{ScoreEntry, ScoreRecord};

/// A record together with the key that makes its import idempotent.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedRecord {
    pub source_key: String,
    pub record: ScoreRecord,
}

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    source_key: String,
    student_id: i32,
    class_id: i32,
    score_type: String,
    score: f64,
}

pub fn read_csv(csv_path: &Path) -> anyhow::Result<Vec<KeyedRecord>> {
    let reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    collect_records(reader)
}

/// Rows sharing a `source_key` become one record, scores kept in file order.
/// A key that reappears with a different student or class is an error.
pub fn collect_records<R: Read>(mut reader: csv::Reader<R>) -> anyhow::Result<Vec<KeyedRecord>> {
    let mut records: Vec<KeyedRecord> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("malformed CSV row {}", line + 1))?;
        let entry = ScoreEntry::new(row.score_type.as_str(), row.score);

        match positions.get(&row.source_key) {
            Some(&index) => {
                let keyed = &mut records[index];
                anyhow::ensure!(
                    keyed.record.student_id == row.student_id
                        && keyed.record.class_id == row.class_id,
                    "source_key {} maps to more than one student/class",
                    row.source_key
                );
                keyed.record.scores.push(entry);
            }
            None => {
                positions.insert(row.source_key.clone(), records.len());
                records.push(KeyedRecord {
                    source_key: row.source_key,
                    record: ScoreRecord {
                        student_id: row.student_id,
                        class_id: row.class_id,
                        scores: vec![entry],
                    },
                });
            }
        }
    }

    Ok(records)
}

/// Drops records that violate the schema, warning about each one.
pub fn validated(records: Vec<KeyedRecord>) -> Vec<KeyedRecord> {
    records
        .into_iter()
        .filter(|keyed| match keyed.record.validate() {
            Ok(()) => true,
            Err(err) => {
                warn!(source_key = %keyed.source_key, "skipping record: {err}");
                false
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScoreType;

    fn reader(data: &str) -> csv::Reader<&[u8]> {
        csv::Reader::from_reader(data.as_bytes())
    }

    #[test]
    fn rows_group_by_source_key_in_order() {
        let data = "\
source_key,student_id,class_id,score_type,score
a,1,5,exam,90
b,2,5,quiz,60
a,1,5,quiz,80
a,1,5,bonus,5
";
        let records = collect_records(reader(data)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].source_key, "a");
        let types: Vec<&ScoreType> = records[0]
            .record
            .scores
            .iter()
            .map(|entry| &entry.score_type)
            .collect();
        assert_eq!(
            types,
            vec![
                &ScoreType::Exam,
                &ScoreType::Quiz,
                &ScoreType::Other("bonus".to_string())
            ]
        );
        assert_eq!(records[1].record.student_id, 2);
    }

    #[test]
    fn conflicting_source_key_is_rejected() {
        let data = "\
source_key,student_id,class_id,score_type,score
a,1,5,exam,90
a,2,5,quiz,80
";
        assert!(collect_records(reader(data)).is_err());
    }

    #[test]
    fn invalid_records_are_skipped() {
        let data = "\
source_key,student_id,class_id,score_type,score
ok,1,5,exam,90
bad-class,2,301,exam,90
bad-student,-3,5,exam,90
";
        let records = validated(collect_records(reader(data)).unwrap());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source_key, "ok");
    }
}
