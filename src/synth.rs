//! Synthetic exam-attempt generator.
//!
//! Produces a fixture event log where each student follows a hidden growth
//! pattern, so the auto-labeler has something to find.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::models::{format_test_id, Attempt, Difficulty, QuestionFormat, QuestionType};

pub const SUBJECTS: [(&str, [&str; 5]); 3] = [
    (
        "Physics",
        ["Rotational", "Solids", "Units", "Thermodynamics", "Kinematics"],
    ),
    (
        "Chemistry",
        ["Organic", "Inorganic", "Physical", "Equilibrium", "Bonding"],
    ),
    (
        "Maths",
        ["Calculus", "Algebra", "Vectors", "Trigonometry", "Probability"],
    ),
];

const QUESTION_TYPES: [QuestionType; 2] = [QuestionType::Conceptual, QuestionType::FormulaBased];
const QUESTION_FORMATS: [QuestionFormat; 2] = [QuestionFormat::Mcq, QuestionFormat::Integer];

/// Hidden pattern a synthetic student follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthPattern {
    ConceptImprover,
    FormulaSpecialist,
    StaticAverage,
}

impl GrowthPattern {
    const ALL: [GrowthPattern; 3] = [
        GrowthPattern::ConceptImprover,
        GrowthPattern::FormulaSpecialist,
        GrowthPattern::StaticAverage,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthConfig {
    pub students: u32,
    pub tests: u32,
    pub questions_per_subject: u32,
    pub seed: u64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            students: 50,
            tests: 10,
            questions_per_subject: 30,
            seed: 42,
        }
    }
}

/// Probability of a correct answer. `progress` runs from 0 at the first
/// test to 1 at the last.
pub fn success_probability(
    pattern: GrowthPattern,
    question_type: QuestionType,
    question_format: QuestionFormat,
    difficulty: Difficulty,
    progress: f64,
) -> f64 {
    let mut p = match (pattern, question_type) {
        (GrowthPattern::ConceptImprover, QuestionType::Conceptual) => {
            let base = 0.3 + 0.4 * progress;
            if difficulty == Difficulty::Hard {
                base - 0.2
            } else {
                base
            }
        }
        (GrowthPattern::ConceptImprover, QuestionType::FormulaBased) => 0.6,
        (GrowthPattern::FormulaSpecialist, QuestionType::FormulaBased) => 0.8,
        (GrowthPattern::FormulaSpecialist, QuestionType::Conceptual) => 0.2,
        (GrowthPattern::StaticAverage, _) => 0.4,
    };

    // no options to guess from
    if question_format == QuestionFormat::Integer {
        p -= 0.1;
    }

    p.max(0.1)
}

pub fn generate(config: &SynthConfig) -> Vec<Attempt> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let per_student = config.tests * config.questions_per_subject * SUBJECTS.len() as u32;
    let mut attempts = Vec::with_capacity((config.students * per_student) as usize);

    for s in 1..=config.students {
        let student_id = format!("S{s:02}");
        let pattern = GrowthPattern::ALL[rng.gen_range(0..GrowthPattern::ALL.len())];

        for t in 1..=config.tests {
            let test_id = format_test_id(t);
            let progress = if config.tests > 1 {
                (t - 1) as f64 / (config.tests - 1) as f64
            } else {
                0.0
            };

            for (subject, topics) in SUBJECTS.iter() {
                for _ in 0..config.questions_per_subject {
                    let topic = topics[rng.gen_range(0..topics.len())];
                    let question_type = QUESTION_TYPES[rng.gen_range(0..QUESTION_TYPES.len())];
                    let question_format =
                        QUESTION_FORMATS[rng.gen_range(0..QUESTION_FORMATS.len())];
                    let difficulty = Difficulty::ALL[rng.gen_range(0..Difficulty::ALL.len())];

                    let p = success_probability(
                        pattern,
                        question_type,
                        question_format,
                        difficulty,
                        progress,
                    );
                    let correct = u8::from(rng.gen::<f64>() < p);

                    attempts.push(Attempt {
                        student_id: student_id.clone(),
                        test_id: test_id.clone(),
                        subject: subject.to_string(),
                        topic: topic.to_string(),
                        question_type,
                        question_format,
                        difficulty,
                        time_spent: rng.gen_range(40..200),
                        correct,
                    });
                }
            }
        }
    }

    info!(rows = attempts.len(), students = config.students, "generated synthetic log");
    attempts
}
