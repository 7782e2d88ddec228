use std::path::Path;

use tracing::{debug, info};

use crate::error::{DiagnosticError, Result};
use crate::models::Attempt;

pub const COLUMNS: [&str; 9] = [
    "Student_ID",
    "Test_ID",
    "Subject",
    "Topic",
    "Q_Type",
    "Q_Format",
    "Difficulty",
    "Time_Spent",
    "Correct",
];

pub fn load_attempts(csv_path: &Path) -> Result<Vec<Attempt>> {
    if !csv_path.is_file() {
        return Err(DiagnosticError::MissingInput(csv_path.to_path_buf()));
    }

    let reader = csv::Reader::from_path(csv_path)?;
    let attempts = read_attempts(reader)?;
    info!(path = %csv_path.display(), rows = attempts.len(), "loaded event log");
    Ok(attempts)
}

pub fn read_attempts<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Vec<Attempt>> {
    let headers = reader.headers()?.clone();
    if headers.iter().ne(COLUMNS.iter().copied()) {
        return Err(DiagnosticError::UnexpectedHeader {
            expected: COLUMNS.join(", "),
            found: headers.iter().collect::<Vec<_>>().join(", "),
        });
    }

    let mut attempts = Vec::new();
    for (index, result) in reader.deserialize::<Attempt>().enumerate() {
        let row = index + 1;
        let attempt = result.map_err(|err| DiagnosticError::MalformedRow {
            row,
            reason: err.to_string(),
        })?;
        validate_attempt(row, &attempt)?;
        attempts.push(attempt);
    }

    debug!(rows = attempts.len(), "parsed attempts");
    Ok(attempts)
}

fn validate_attempt(row: usize, attempt: &Attempt) -> Result<()> {
    if attempt.student_id.trim().is_empty() {
        return Err(DiagnosticError::MalformedRow {
            row,
            reason: "empty Student_ID".to_string(),
        });
    }
    if attempt.correct > 1 {
        return Err(DiagnosticError::MalformedRow {
            row,
            reason: format!("Correct must be 0 or 1, got {}", attempt.correct),
        });
    }
    if attempt.time_spent == 0 {
        return Err(DiagnosticError::MalformedRow {
            row,
            reason: "Time_Spent must be positive".to_string(),
        });
    }
    Ok(())
}

pub fn write_attempts(csv_path: &Path, attempts: &[Attempt]) -> Result<()> {
    let mut writer = csv::Writer::from_path(csv_path)?;
    for attempt in attempts {
        writer.serialize(attempt)?;
    }
    writer.flush()?;
    info!(path = %csv_path.display(), rows = attempts.len(), "wrote event log");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Difficulty, QuestionFormat, QuestionType};

    const HEADER: &str =
        "Student_ID,Test_ID,Subject,Topic,Q_Type,Q_Format,Difficulty,Time_Spent,Correct\n";

    fn reader(body: &str) -> csv::Reader<&[u8]> {
        csv::Reader::from_reader(body.as_bytes())
    }

    #[test]
    fn parses_typed_rows() {
        let body = format!(
            "{HEADER}S01,GT_01,Physics,Kinematics,Formula-based,Integer,Hard,75,1\n\
             S01,GT_02,Maths,Algebra,Conceptual,MCQ,Easy,120,0\n"
        );
        let attempts = read_attempts(reader(&body)).unwrap();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].question_type, QuestionType::FormulaBased);
        assert_eq!(attempts[0].question_format, QuestionFormat::Integer);
        assert_eq!(attempts[0].difficulty, Difficulty::Hard);
        assert!(attempts[0].is_correct());
        assert_eq!(attempts[1].question_format, QuestionFormat::Mcq);
        assert_eq!(attempts[1].time_spent, 120);
    }

    #[test]
    fn unknown_enum_value_is_malformed() {
        let body = format!("{HEADER}S01,GT_01,Physics,Units,Essay,MCQ,Easy,60,1\n");
        let err = read_attempts(reader(&body)).unwrap_err();
        assert!(matches!(err, DiagnosticError::MalformedRow { row: 1, .. }));
    }

    #[test]
    fn correct_outside_binary_is_malformed() {
        let body = format!(
            "{HEADER}S01,GT_01,Physics,Units,Conceptual,MCQ,Easy,60,1\n\
             S01,GT_01,Physics,Units,Conceptual,MCQ,Easy,60,2\n"
        );
        let err = read_attempts(reader(&body)).unwrap_err();
        assert!(matches!(err, DiagnosticError::MalformedRow { row: 2, .. }));
    }

    #[test]
    fn zero_time_spent_is_malformed() {
        let body = format!("{HEADER}S01,GT_01,Physics,Units,Conceptual,MCQ,Easy,0,1\n");
        let err = read_attempts(reader(&body)).unwrap_err();
        match err {
            DiagnosticError::MalformedRow { row, reason } => {
                assert_eq!(row, 1);
                assert!(reason.contains("Time_Spent"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_numeric_correct_is_malformed() {
        let body = format!(
            "{HEADER}S01,GT_01,Physics,Units,Conceptual,MCQ,Easy,60,1\n\
             S01,GT_02,Physics,Units,Conceptual,MCQ,Easy,60,1\n\
             S01,GT_03,Physics,Units,Conceptual,MCQ,Easy,60,yes\n"
        );
        let err = read_attempts(reader(&body)).unwrap_err();
        assert!(matches!(err, DiagnosticError::MalformedRow { row: 3, .. }));
    }

    #[test]
    fn wrong_header_is_rejected() {
        let body = "student,test\nS01,GT_01\n";
        let err = read_attempts(reader(body)).unwrap_err();
        assert!(matches!(err, DiagnosticError::UnexpectedHeader { .. }));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.csv");
        let err = load_attempts(&path).unwrap_err();
        assert!(matches!(err, DiagnosticError::MissingInput(_)));
    }

    #[test]
    fn written_log_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let attempts = vec![Attempt {
            student_id: "S07".to_string(),
            test_id: "GT_04".to_string(),
            subject: "Chemistry".to_string(),
            topic: "Bonding".to_string(),
            question_type: QuestionType::Conceptual,
            question_format: QuestionFormat::Mcq,
            difficulty: Difficulty::Medium,
            time_spent: 90,
            correct: 0,
        }];

        write_attempts(&path, &attempts).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with(HEADER));
        assert_eq!(load_attempts(&path).unwrap(), attempts);
    }
}
