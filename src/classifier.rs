use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{ForestConfig, SplitConfig};
use crate::error::{DiagnosticError, Result};
use crate::forest::{argmax, RandomForest};
use crate::labeler;
use crate::metrics::{classification_report, EvaluationReport};
use crate::models::{FeatureVector, LabeledStudent, Persona, StudentFeatures};

/// Encoding of an empty partition in the model's input space. Lies outside
/// every field's valid range so trees can split on it.
pub const MISSING_VALUE: f64 = -2.0;

/// Each label needs one student in each subset.
pub const MIN_CLASS_EXAMPLES: usize = 2;

pub fn label_students(table: &[StudentFeatures]) -> Vec<LabeledStudent> {
    table
        .iter()
        .map(|row| LabeledStudent {
            student_id: row.student_id.clone(),
            features: row.features,
            label: labeler::label(&row.features),
        })
        .collect()
}

/// Student indices assigned to training and held-out evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoldoutSplit {
    pub train: Vec<usize>,
    pub eval: Vec<usize>,
}

/// Stratified, seeded split: every label contributes
/// `round(n * eval_fraction)` students (at least one, never all) to the
/// evaluation subset.
pub fn stratified_split(labels: &[Persona], config: &SplitConfig) -> Result<HoldoutSplit> {
    if labels.is_empty() {
        return Err(DiagnosticError::EmptyInput);
    }

    let mut by_label: BTreeMap<Persona, Vec<usize>> = BTreeMap::new();
    for (index, label) in labels.iter().enumerate() {
        by_label.entry(*label).or_default().push(index);
    }

    for (label, members) in &by_label {
        if members.len() < MIN_CLASS_EXAMPLES {
            return Err(DiagnosticError::InsufficientClass {
                label: *label,
                count: members.len(),
                required: MIN_CLASS_EXAMPLES,
            });
        }
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut train = Vec::new();
    let mut eval = Vec::new();

    for members in by_label.values_mut() {
        members.shuffle(&mut rng);
        let n = members.len();
        let n_eval = ((n as f64 * config.eval_fraction).round() as usize).clamp(1, n - 1);
        eval.extend_from_slice(&members[..n_eval]);
        train.extend_from_slice(&members[n_eval..]);
    }

    train.sort_unstable();
    eval.sort_unstable();
    Ok(HoldoutSplit { train, eval })
}

fn encode(fv: &FeatureVector) -> Result<Vec<f64>> {
    FeatureVector::FEATURE_NAMES
        .iter()
        .zip(fv.fields())
        .map(|(name, value)| match value {
            None => Ok(MISSING_VALUE),
            Some(v) => FeatureVector::check_field(name, v),
        })
        .collect()
}

/// Class probabilities for one feature vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: Persona,
    /// Probability for every persona; sums to 1
    pub confidence: BTreeMap<Persona, f64>,
}

/// Fitted persona classifier. Read-only once built.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    forest: RandomForest,
    classes_seen: Vec<Persona>,
}

impl TrainedModel {
    /// Fit a forest on every given student.
    pub fn fit(students: &[&LabeledStudent], config: &ForestConfig) -> Result<Self> {
        if students.is_empty() {
            return Err(DiagnosticError::EmptyInput);
        }
        if config.n_trees == 0 {
            return Err(DiagnosticError::InvalidConfig(
                "forest needs at least one tree".to_string(),
            ));
        }

        let x = students
            .iter()
            .map(|s| encode(&s.features))
            .collect::<Result<Vec<_>>>()?;
        let y: Vec<usize> = students.iter().map(|s| s.label.index()).collect();

        let mut forest = RandomForest::from_config(config);
        forest.fit(&x, &y, Persona::ALL.len());

        let mut classes_seen: Vec<Persona> = students.iter().map(|s| s.label).collect();
        classes_seen.sort();
        classes_seen.dedup();

        debug!(students = students.len(), trees = forest.n_trees(), "fitted persona classifier");
        Ok(Self {
            forest,
            classes_seen,
        })
    }

    pub fn predict(&self, fv: &FeatureVector) -> Result<Prediction> {
        let encoded = encode(fv)?;
        if encoded.len() != self.forest.n_features() {
            return Err(DiagnosticError::DimensionMismatch {
                expected: self.forest.n_features(),
                got: encoded.len(),
            });
        }

        let proba = self
            .forest
            .predict_proba(&encoded)
            .ok_or(DiagnosticError::UntrainedModel)?;
        let best = argmax(&proba).ok_or(DiagnosticError::UntrainedModel)?;

        Ok(Prediction {
            label: Persona::ALL[best],
            confidence: Persona::ALL.iter().copied().zip(proba).collect(),
        })
    }

    /// Predict from the five raw summary values, in `FEATURE_NAMES` order.
    pub fn predict_values(&self, values: &[f64]) -> Result<Prediction> {
        self.predict(&FeatureVector::from_values(values)?)
    }

    pub fn predict_cohort(&self, table: &[StudentFeatures]) -> Result<Vec<(String, Prediction)>> {
        table
            .iter()
            .map(|row| Ok((row.student_id.clone(), self.predict(&row.features)?)))
            .collect()
    }

    pub fn classes_seen(&self) -> &[Persona] {
        &self.classes_seen
    }

    pub fn feature_importances(&self) -> BTreeMap<&'static str, f64> {
        FeatureVector::FEATURE_NAMES
            .iter()
            .copied()
            .zip(self.forest.feature_importances())
            .collect()
    }
}

/// Result of one training run: the model, the split it was fit on, and
/// its held-out evaluation.
#[derive(Debug, Clone)]
pub struct TrainingRun {
    pub model: TrainedModel,
    pub split: HoldoutSplit,
    pub train_students: Vec<String>,
    pub eval_students: Vec<String>,
    pub evaluation: EvaluationReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub generated_at: DateTime<Utc>,
    pub train_students: Vec<String>,
    pub eval_students: Vec<String>,
    pub classes_seen: Vec<Persona>,
    pub feature_importances: BTreeMap<&'static str, f64>,
    pub evaluation: EvaluationReport,
}

pub fn train(
    students: &[LabeledStudent],
    split_config: &SplitConfig,
    forest_config: &ForestConfig,
) -> Result<TrainingRun> {
    let labels: Vec<Persona> = students.iter().map(|s| s.label).collect();
    let split = stratified_split(&labels, split_config)?;
    info!(
        train = split.train.len(),
        eval = split.eval.len(),
        seed = split_config.seed,
        "split students"
    );

    let train_rows: Vec<&LabeledStudent> = split.train.iter().map(|&i| &students[i]).collect();
    let model = TrainedModel::fit(&train_rows, forest_config)?;
    let evaluation = evaluate(&model, split.eval.iter().map(|&i| &students[i]))?;
    info!(accuracy = evaluation.accuracy, "evaluated on held-out students");

    let ids = |indices: &[usize]| -> Vec<String> {
        indices.iter().map(|&i| students[i].student_id.clone()).collect()
    };
    Ok(TrainingRun {
        model,
        train_students: ids(&split.train),
        eval_students: ids(&split.eval),
        split,
        evaluation,
    })
}

pub fn evaluate<'a, I>(model: &TrainedModel, students: I) -> Result<EvaluationReport>
where
    I: IntoIterator<Item = &'a LabeledStudent>,
{
    let mut truth = Vec::new();
    let mut predicted = Vec::new();
    for student in students {
        truth.push(student.label);
        predicted.push(model.predict(&student.features)?.label);
    }
    Ok(classification_report(&truth, &predicted))
}

impl TrainingRun {
    pub fn summary(&self) -> TrainingSummary {
        TrainingSummary {
            generated_at: Utc::now(),
            train_students: self.train_students.clone(),
            eval_students: self.eval_students.clone(),
            classes_seen: self.model.classes_seen().to_vec(),
            feature_importances: self.model.feature_importances(),
            evaluation: self.evaluation.clone(),
        }
    }
}
