use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DiagnosticError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionType {
    Conceptual,
    #[serde(rename = "Formula-based")]
    FormulaBased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionFormat {
    #[serde(rename = "MCQ")]
    Mcq,
    Integer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        };
        f.write_str(name)
    }
}

/// One logged question response. Column names follow the event log header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    #[serde(rename = "Student_ID")]
    pub student_id: String,
    #[serde(rename = "Test_ID")]
    pub test_id: String,
    #[serde(rename = "Subject")]
    pub subject: String,
    #[serde(rename = "Topic")]
    pub topic: String,
    #[serde(rename = "Q_Type")]
    pub question_type: QuestionType,
    #[serde(rename = "Q_Format")]
    pub question_format: QuestionFormat,
    #[serde(rename = "Difficulty")]
    pub difficulty: Difficulty,
    #[serde(rename = "Time_Spent")]
    pub time_spent: u32,
    #[serde(rename = "Correct")]
    pub correct: u8,
}

impl Attempt {
    pub fn is_correct(&self) -> bool {
        self.correct == 1
    }
}

/// Sequence number embedded in a test id such as `GT_07`.
pub fn test_sequence(test_id: &str) -> Option<u32> {
    let prefix_len = test_id.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    test_id[prefix_len..].parse().ok()
}

/// Orders test ids by embedded sequence number, falling back to the raw
/// string for ids without one.
pub fn compare_test_ids(a: &str, b: &str) -> Ordering {
    match (test_sequence(a), test_sequence(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

pub fn format_test_id(sequence: u32) -> String {
    format!("GT_{sequence:02}")
}

/// Per-student summary statistics. Accuracy fields are `None` when the
/// student never attempted a question in that partition; `improvement` is
/// `None` when either test window is empty.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    pub formula_accuracy: Option<f64>,
    pub concept_accuracy: Option<f64>,
    pub hard_accuracy: Option<f64>,
    pub integer_accuracy: Option<f64>,
    pub improvement: Option<f64>,
}

impl FeatureVector {
    pub const DIMENSION: usize = 5;

    pub const FEATURE_NAMES: [&'static str; 5] = [
        "formula_accuracy",
        "concept_accuracy",
        "hard_accuracy",
        "integer_accuracy",
        "improvement",
    ];

    /// Builds a fully populated vector from the five summary values,
    /// rejecting anything outside the valid range of its field.
    pub fn from_values(values: &[f64]) -> Result<Self> {
        if values.len() != Self::DIMENSION {
            return Err(DiagnosticError::DimensionMismatch {
                expected: Self::DIMENSION,
                got: values.len(),
            });
        }

        for (name, &value) in Self::FEATURE_NAMES.iter().zip(values) {
            Self::check_field(name, value)?;
        }

        Ok(Self {
            formula_accuracy: Some(values[0]),
            concept_accuracy: Some(values[1]),
            hard_accuracy: Some(values[2]),
            integer_accuracy: Some(values[3]),
            improvement: Some(values[4]),
        })
    }

    /// Rejects non-finite values and values outside the field's range:
    /// `[-1, 1]` for `improvement`, `[0, 1]` for the accuracies.
    pub fn check_field(name: &str, value: f64) -> Result<f64> {
        let (low, high) = if name == "improvement" { (-1.0, 1.0) } else { (0.0, 1.0) };
        if !value.is_finite() {
            return Err(DiagnosticError::InvalidFeature {
                name: name.to_string(),
                value,
                reason: "value is not finite".to_string(),
            });
        }
        if value < low || value > high {
            return Err(DiagnosticError::InvalidFeature {
                name: name.to_string(),
                value,
                reason: format!("expected a value in [{low}, {high}]"),
            });
        }
        Ok(value)
    }

    pub fn fields(&self) -> [Option<f64>; 5] {
        [
            self.formula_accuracy,
            self.concept_accuracy,
            self.hard_accuracy,
            self.integer_accuracy,
            self.improvement,
        ]
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        Self::FEATURE_NAMES
            .iter()
            .zip(self.fields())
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect()
    }
}

/// Learning persona assigned to a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Persona {
    #[serde(rename = "Formula_Specialist")]
    FormulaSpecialist,
    #[serde(rename = "Conceptual_Thinker")]
    ConceptualThinker,
    Improver,
    #[serde(rename = "Hard_Ceiling")]
    HardCeiling,
    Balanced,
}

impl Persona {
    pub const ALL: [Persona; 5] = [
        Persona::FormulaSpecialist,
        Persona::ConceptualThinker,
        Persona::Improver,
        Persona::HardCeiling,
        Persona::Balanced,
    ];

    pub fn index(self) -> usize {
        match self {
            Persona::FormulaSpecialist => 0,
            Persona::ConceptualThinker => 1,
            Persona::Improver => 2,
            Persona::HardCeiling => 3,
            Persona::Balanced => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Persona::FormulaSpecialist => "Formula_Specialist",
            Persona::ConceptualThinker => "Conceptual_Thinker",
            Persona::Improver => "Improver",
            Persona::HardCeiling => "Hard_Ceiling",
            Persona::Balanced => "Balanced",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentFeatures {
    pub student_id: String,
    pub features: FeatureVector,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledStudent {
    pub student_id: String,
    pub features: FeatureVector,
    pub label: Persona,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_order_by_sequence_number() {
        let mut ids = vec!["GT_10", "GT_02", "GT_01", "GT_09"];
        ids.sort_by(|a, b| compare_test_ids(a, b));
        assert_eq!(ids, vec!["GT_01", "GT_02", "GT_09", "GT_10"]);
    }

    #[test]
    fn test_sequence_handles_missing_digits() {
        assert_eq!(test_sequence("GT_07"), Some(7));
        assert_eq!(test_sequence("mock"), None);
        assert_eq!(format_test_id(3), "GT_03");
    }

    #[test]
    fn from_values_rejects_wrong_dimension() {
        let err = FeatureVector::from_values(&[0.5, 0.5, 0.5]).unwrap_err();
        assert!(matches!(
            err,
            DiagnosticError::DimensionMismatch { expected: 5, got: 3 }
        ));
    }

    #[test]
    fn from_values_rejects_out_of_range_and_nan() {
        assert!(FeatureVector::from_values(&[1.2, 0.5, 0.5, 0.5, 0.0]).is_err());
        assert!(FeatureVector::from_values(&[0.5, 0.5, 0.5, 0.5, -1.5]).is_err());
        assert!(FeatureVector::from_values(&[0.5, f64::NAN, 0.5, 0.5, 0.0]).is_err());
        let fv = FeatureVector::from_values(&[0.5, 0.5, 0.5, 0.5, -0.4]).unwrap();
        assert_eq!(fv.improvement, Some(-0.4));
        assert!(fv.missing_fields().is_empty());
    }

    #[test]
    fn persona_names_match_label_set() {
        let names: Vec<String> = Persona::ALL.iter().map(|p| p.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "Formula_Specialist",
                "Conceptual_Thinker",
                "Improver",
                "Hard_Ceiling",
                "Balanced"
            ]
        );
        for (i, persona) in Persona::ALL.iter().enumerate() {
            assert_eq!(persona.index(), i);
        }
    }
}
