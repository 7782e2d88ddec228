use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::NaiveDate;
use serde::Serialize;

use crate::classifier::TrainedModel;
use crate::config::WindowConfig;
use crate::error::{DiagnosticError, Result};
use crate::features::{accuracy, extract};
use crate::labeler::{style_lean, StyleLean};
use crate::models::{compare_test_ids, Attempt, Difficulty, FeatureVector, Persona, StudentFeatures};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestAccuracy {
    pub test_id: String,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicAccuracy {
    pub topic: String,
    pub accuracy: f64,
    pub attempts: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DifficultyAccuracy {
    pub difficulty: Difficulty,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentDiagnosis {
    pub student_id: String,
    pub overall_accuracy: Option<f64>,
    pub improvement: Option<f64>,
    pub avg_time_spent: Option<f64>,
    pub trend: Vec<TestAccuracy>,
    /// Ascending accuracy; weakest first
    pub weak_topics: Vec<TopicAccuracy>,
    pub style: StyleLean,
    pub by_difficulty: Vec<DifficultyAccuracy>,
}

pub fn trend_by_test(attempts: &[Attempt]) -> Vec<TestAccuracy> {
    let mut tests: Vec<&str> = attempts.iter().map(|a| a.test_id.as_str()).collect();
    tests.sort_by(|a, b| compare_test_ids(a, b));
    tests.dedup();

    tests
        .into_iter()
        .filter_map(|test_id| {
            let acc = accuracy(attempts.iter().filter(|a| a.test_id == test_id))?;
            Some(TestAccuracy {
                test_id: test_id.to_string(),
                accuracy: acc,
            })
        })
        .collect()
}

pub fn rank_topics(attempts: &[Attempt]) -> Vec<TopicAccuracy> {
    let mut grouped: BTreeMap<&str, Vec<&Attempt>> = BTreeMap::new();
    for attempt in attempts {
        grouped.entry(attempt.topic.as_str()).or_default().push(attempt);
    }

    let mut topics: Vec<TopicAccuracy> = grouped
        .into_iter()
        .filter_map(|(topic, rows)| {
            Some(TopicAccuracy {
                topic: topic.to_string(),
                accuracy: accuracy(rows.iter().copied())?,
                attempts: rows.len(),
            })
        })
        .collect();

    // stable sort keeps topic names alphabetical within equal accuracy
    topics.sort_by(|a, b| a.accuracy.total_cmp(&b.accuracy));
    topics
}

pub fn accuracy_by_difficulty(attempts: &[Attempt]) -> Vec<DifficultyAccuracy> {
    Difficulty::ALL
        .iter()
        .filter_map(|&difficulty| {
            let acc = accuracy(attempts.iter().filter(|a| a.difficulty == difficulty))?;
            Some(DifficultyAccuracy {
                difficulty,
                accuracy: acc,
            })
        })
        .collect()
}

pub fn diagnose_student(
    attempts: &[Attempt],
    student_id: &str,
    window: &WindowConfig,
) -> Result<StudentDiagnosis> {
    let rows: Vec<Attempt> = attempts
        .iter()
        .filter(|a| a.student_id == student_id)
        .cloned()
        .collect();
    if rows.is_empty() {
        return Err(DiagnosticError::UnknownStudent(student_id.to_string()));
    }

    let features = extract(&rows, window);
    let avg_time_spent =
        Some(rows.iter().map(|a| a.time_spent as f64).sum::<f64>() / rows.len() as f64);

    Ok(StudentDiagnosis {
        student_id: student_id.to_string(),
        overall_accuracy: accuracy(&rows),
        improvement: features.improvement,
        avg_time_spent,
        trend: trend_by_test(&rows),
        weak_topics: rank_topics(&rows),
        style: style_lean(features.formula_accuracy, features.concept_accuracy),
        by_difficulty: accuracy_by_difficulty(&rows),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortOverview {
    pub distribution: BTreeMap<Persona, usize>,
    /// Students predicted `Conceptual_Thinker`
    pub needs_concept_help: Vec<StudentFeatures>,
}

pub fn build_cohort(table: &[StudentFeatures], model: &TrainedModel) -> Result<CohortOverview> {
    let predictions = model.predict_cohort(table)?;

    let mut distribution: BTreeMap<Persona, usize> = BTreeMap::new();
    let mut needs_concept_help = Vec::new();
    for (row, (_, prediction)) in table.iter().zip(&predictions) {
        *distribution.entry(prediction.label).or_insert(0) += 1;
        if prediction.label == Persona::ConceptualThinker {
            needs_concept_help.push(row.clone());
        }
    }

    Ok(CohortOverview {
        distribution,
        needs_concept_help,
    })
}

fn percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}%", v * 100.0),
        None => "n/a".to_string(),
    }
}

fn signed_percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:+.1}%", v * 100.0),
        None => "n/a".to_string(),
    }
}

fn style_advice(style: StyleLean) -> &'static str {
    match style {
        StyleLean::FormulaReliant => "High formula reliance. Re-read theory.",
        StyleLean::ConceptStrength => "Conceptual strength. Practice numerical speed.",
        StyleLean::Balanced => "Balanced preparation.",
    }
}

pub fn render_student(output: &mut String, diagnosis: &StudentDiagnosis) {
    let _ = writeln!(output, "## Performance Analysis: {}", diagnosis.student_id);
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "- Overall accuracy: {}",
        percent(diagnosis.overall_accuracy)
    );
    let _ = writeln!(
        output,
        "- Improvement slope: {}",
        signed_percent(diagnosis.improvement)
    );
    match diagnosis.avg_time_spent {
        Some(secs) => {
            let _ = writeln!(output, "- Avg time/question: {}s", secs as u64);
        }
        None => {
            let _ = writeln!(output, "- Avg time/question: n/a");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "### Progress Across Tests");
    for point in &diagnosis.trend {
        let _ = writeln!(output, "- {}: {}", point.test_id, percent(Some(point.accuracy)));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "### Weak Area Diagnosis");
    if diagnosis.weak_topics.is_empty() {
        let _ = writeln!(output, "No topics attempted.");
    } else {
        for topic in diagnosis.weak_topics.iter().take(3) {
            let _ = writeln!(
                output,
                "- {}: {} accuracy across {} questions",
                topic.topic,
                percent(Some(topic.accuracy)),
                topic.attempts
            );
        }
    }
    let _ = writeln!(
        output,
        "- Preparation style: {} ({})",
        diagnosis.style,
        style_advice(diagnosis.style)
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "### Performance by Difficulty");
    for row in &diagnosis.by_difficulty {
        let _ = writeln!(output, "- {}: {}", row.difficulty, percent(Some(row.accuracy)));
    }
}

pub fn render_cohort(output: &mut String, cohort: &CohortOverview) {
    let total: usize = cohort.distribution.values().sum();

    let _ = writeln!(output, "## Class-wide Diagnosis");
    let _ = writeln!(output);
    let _ = writeln!(output, "### Class Strength Distribution");
    if total == 0 {
        let _ = writeln!(output, "No students in this cohort.");
    } else {
        for (persona, count) in &cohort.distribution {
            let share = *count as f64 / total as f64;
            let _ = writeln!(output, "- {}: {} ({})", persona, count, percent(Some(share)));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "### Students Needing Conceptual Help");
    if cohort.needs_concept_help.is_empty() {
        let _ = writeln!(output, "No students flagged.");
    } else {
        let _ = writeln!(
            output,
            "| Student | Formula | Concept | Hard | Integer | Improvement |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|");
        for row in &cohort.needs_concept_help {
            let fv: &FeatureVector = &row.features;
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} | {} |",
                row.student_id,
                percent(fv.formula_accuracy),
                percent(fv.concept_accuracy),
                percent(fv.hard_accuracy),
                percent(fv.integer_accuracy),
                signed_percent(fv.improvement)
            );
        }
    }
}

pub fn build_report(
    generated_on: NaiveDate,
    diagnosis: Option<&StudentDiagnosis>,
    cohort: Option<&CohortOverview>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Exam Diagnostic Report");
    let _ = writeln!(output, "Generated on {}", generated_on);
    let _ = writeln!(output);

    if let Some(diagnosis) = diagnosis {
        render_student(&mut output, diagnosis);
        let _ = writeln!(output);
    }
    if let Some(cohort) = cohort {
        render_cohort(&mut output, cohort);
    }

    output
}
