//! Heuristic persona rules.
//!
//! The same accuracy-gap rule drives both the training labels and the
//! preparation style shown in student reports.

use serde::Serialize;

use crate::models::{FeatureVector, Persona};

/// Minimum formula/concept accuracy gap that counts as a lean.
pub const STYLE_MARGIN: f64 = 0.20;
/// Late-minus-early accuracy above which a student counts as improving.
pub const IMPROVEMENT_THRESHOLD: f64 = 0.15;
/// Hard-question accuracy below which a student hits a ceiling.
pub const HARD_CEILING_THRESHOLD: f64 = 0.25;

/// Which question type a student leans on, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StyleLean {
    #[serde(rename = "Formula_reliant")]
    FormulaReliant,
    #[serde(rename = "Concept_strength")]
    ConceptStrength,
    Balanced,
}

impl StyleLean {
    pub fn as_str(self) -> &'static str {
        match self {
            StyleLean::FormulaReliant => "Formula_reliant",
            StyleLean::ConceptStrength => "Concept_strength",
            StyleLean::Balanced => "Balanced",
        }
    }
}

impl std::fmt::Display for StyleLean {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compares formula and concept accuracy against [`STYLE_MARGIN`]. A
/// missing side never produces a lean.
pub fn style_lean(formula_accuracy: Option<f64>, concept_accuracy: Option<f64>) -> StyleLean {
    match (formula_accuracy, concept_accuracy) {
        (Some(formula), Some(concept)) if formula - concept > STYLE_MARGIN => {
            StyleLean::FormulaReliant
        }
        (Some(formula), Some(concept)) if concept - formula > STYLE_MARGIN => {
            StyleLean::ConceptStrength
        }
        _ => StyleLean::Balanced,
    }
}

/// First matching rule wins. Comparisons against a missing field are
/// false, so the rule is skipped.
pub fn label(fv: &FeatureVector) -> Persona {
    match style_lean(fv.formula_accuracy, fv.concept_accuracy) {
        StyleLean::FormulaReliant => return Persona::FormulaSpecialist,
        StyleLean::ConceptStrength => return Persona::ConceptualThinker,
        StyleLean::Balanced => {}
    }

    if fv.improvement.is_some_and(|impv| impv > IMPROVEMENT_THRESHOLD) {
        Persona::Improver
    } else if fv.hard_accuracy.is_some_and(|hard| hard < HARD_CEILING_THRESHOLD) {
        Persona::HardCeiling
    } else {
        Persona::Balanced
    }
}
