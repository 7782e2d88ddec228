use std::fmt;

use serde::Serialize;

use crate::models::Persona;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: Persona,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Held-out quality of a trained model. Reporting only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
    pub support: usize,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn f1_score(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

fn weighted(classes: &[ClassMetrics], support: usize, value: impl Fn(&ClassMetrics) -> f64) -> f64 {
    if support == 0 {
        return 0.0;
    }
    let total: f64 = classes.iter().map(|c| value(c) * c.support as f64).sum();
    total / support as f64
}

/// Per-class precision/recall/F1 over every label present in either the
/// truth or the predictions. Undefined ratios are reported as 0.
pub fn classification_report(truth: &[Persona], predicted: &[Persona]) -> EvaluationReport {
    let pairs: Vec<(Persona, Persona)> = truth
        .iter()
        .copied()
        .zip(predicted.iter().copied())
        .collect();
    let support = pairs.len();

    let classes: Vec<ClassMetrics> = Persona::ALL
        .iter()
        .copied()
        .filter(|label| pairs.iter().any(|(t, p)| t == label || p == label))
        .map(|label| {
            let true_positive = pairs.iter().filter(|(t, p)| *t == label && *p == label).count();
            let predicted_count = pairs.iter().filter(|(_, p)| *p == label).count();
            let actual_count = pairs.iter().filter(|(t, _)| *t == label).count();

            let precision = ratio(true_positive, predicted_count);
            let recall = ratio(true_positive, actual_count);
            ClassMetrics {
                label,
                precision,
                recall,
                f1: f1_score(precision, recall),
                support: actual_count,
            }
        })
        .collect();

    let correct = pairs.iter().filter(|(t, p)| t == p).count();
    let n_classes = classes.len().max(1) as f64;

    let macro_avg = AverageMetrics {
        precision: classes.iter().map(|c| c.precision).sum::<f64>() / n_classes,
        recall: classes.iter().map(|c| c.recall).sum::<f64>() / n_classes,
        f1: classes.iter().map(|c| c.f1).sum::<f64>() / n_classes,
    };

    let weighted_avg = AverageMetrics {
        precision: weighted(&classes, support, |c| c.precision),
        recall: weighted(&classes, support, |c| c.recall),
        f1: weighted(&classes, support, |c| c.f1),
    };

    EvaluationReport {
        classes,
        accuracy: ratio(correct, support),
        macro_avg,
        weighted_avg,
        support,
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>20} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for class in &self.classes {
            writeln!(
                f,
                "{:>20} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                class.label.as_str(),
                class.precision,
                class.recall,
                class.f1,
                class.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>20} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy", "", "", self.accuracy, self.support
        )?;
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>20} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                name, avg.precision, avg.recall, avg.f1, self.support
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Persona::*;

    #[test]
    fn perfect_predictions_score_one() {
        let truth = vec![FormulaSpecialist, Balanced, Balanced];
        let report = classification_report(&truth, &truth);
        assert_eq!(report.accuracy, 1.0);
        assert_eq!(report.classes.len(), 2);
        assert!(report.classes.iter().all(|c| c.f1 == 1.0));
        assert_eq!(report.weighted_avg.f1, 1.0);
    }

    #[test]
    fn mixed_predictions_follow_counts() {
        let truth = vec![FormulaSpecialist, FormulaSpecialist, Improver, Balanced];
        let predicted = vec![FormulaSpecialist, Improver, Improver, Balanced];
        let report = classification_report(&truth, &predicted);

        assert_eq!(report.support, 4);
        assert!((report.accuracy - 0.75).abs() < 1e-12);

        let formula = &report.classes[0];
        assert_eq!(formula.label, FormulaSpecialist);
        assert_eq!(formula.precision, 1.0);
        assert_eq!(formula.recall, 0.5);
        assert!((formula.f1 - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(formula.support, 2);

        let improver = &report.classes[1];
        assert_eq!(improver.precision, 0.5);
        assert_eq!(improver.recall, 1.0);
    }

    #[test]
    fn predicted_only_class_has_zero_support() {
        let report = classification_report(&[Balanced], &[HardCeiling]);
        let hard = report.classes.iter().find(|c| c.label == HardCeiling).unwrap();
        assert_eq!(hard.support, 0);
        assert_eq!(hard.precision, 0.0);
        assert_eq!(hard.recall, 0.0);
        assert_eq!(report.accuracy, 0.0);
    }

    #[test]
    fn empty_report_is_all_zero() {
        let report = classification_report(&[], &[]);
        assert!(report.classes.is_empty());
        assert_eq!(report.accuracy, 0.0);
        assert_eq!(report.weighted_avg.precision, 0.0);
    }

    #[test]
    fn renders_a_row_per_class() {
        let report = classification_report(&[Balanced, Improver], &[Balanced, Balanced]);
        let text = report.to_string();
        assert!(text.contains("Balanced"));
        assert!(text.contains("Improver"));
        assert!(text.contains("accuracy"));
        assert!(text.contains("weighted avg"));
    }
}
