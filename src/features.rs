use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::WindowConfig;
use crate::models::{
    Attempt, Difficulty, FeatureVector, QuestionFormat, QuestionType, StudentFeatures,
};

/// Running mean of the `Correct` column over one partition.
#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    correct: u32,
    total: u32,
}

impl Tally {
    fn record(&mut self, attempt: &Attempt) {
        self.total += 1;
        if attempt.is_correct() {
            self.correct += 1;
        }
    }

    fn mean(self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.correct as f64 / self.total as f64)
        }
    }
}

/// Mean `Correct` over a slice of attempts, `None` when empty.
pub fn accuracy<'a, I>(attempts: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a Attempt>,
{
    let mut tally = Tally::default();
    for attempt in attempts {
        tally.record(attempt);
    }
    tally.mean()
}

/// Reduces one student's attempts to a feature vector in a single pass.
pub fn extract(attempts: &[Attempt], window: &WindowConfig) -> FeatureVector {
    let mut formula = Tally::default();
    let mut concept = Tally::default();
    let mut hard = Tally::default();
    let mut integer = Tally::default();
    let mut early = Tally::default();
    let mut late = Tally::default();

    for attempt in attempts {
        match attempt.question_type {
            QuestionType::FormulaBased => formula.record(attempt),
            QuestionType::Conceptual => concept.record(attempt),
        }
        if attempt.difficulty == Difficulty::Hard {
            hard.record(attempt);
        }
        if attempt.question_format == QuestionFormat::Integer {
            integer.record(attempt);
        }
        if window.early.contains(&attempt.test_id) {
            early.record(attempt);
        }
        if window.late.contains(&attempt.test_id) {
            late.record(attempt);
        }
    }

    let improvement = match (late.mean(), early.mean()) {
        (Some(late), Some(early)) => Some(late - early),
        _ => None,
    };

    FeatureVector {
        formula_accuracy: formula.mean(),
        concept_accuracy: concept.mean(),
        hard_accuracy: hard.mean(),
        integer_accuracy: integer.mean(),
        improvement,
    }
}

/// Groups attempts by student in first-appearance order.
pub fn group_by_student(attempts: &[Attempt]) -> Vec<(String, Vec<Attempt>)> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<Attempt>)> = Vec::new();

    for attempt in attempts {
        let slot = *positions.entry(attempt.student_id.as_str()).or_insert_with(|| {
            groups.push((attempt.student_id.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(attempt.clone());
    }

    groups
}

pub fn extract_all(attempts: &[Attempt], window: &WindowConfig) -> Vec<StudentFeatures> {
    let table: Vec<StudentFeatures> = group_by_student(attempts)
        .into_iter()
        .map(|(student_id, rows)| {
            let features = extract(&rows, window);
            let missing = features.missing_fields();
            if !missing.is_empty() {
                warn!(student = %student_id, ?missing, "student has empty partitions");
            }
            StudentFeatures {
                student_id,
                features,
            }
        })
        .collect();

    debug!(students = table.len(), "built feature table");
    table
}
