use serde::{Deserialize, Serialize};

/// Outcome for a single evaluated record.
///
/// `predicted` is `None` when the model produced no usable answer; such
/// predictions are retained and count as incorrect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionResult {
    pub record_id: String,
    pub predicted: Option<u8>,
    pub true_label: u8,
}

/// Derived evaluation summary for one experiment branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub accuracy: f64,
    /// Weighted F1 over both classes; absent when no prediction carries a label
    pub weighted_f1: Option<f64>,
}

/// Computes accuracy and weighted F1 over a sequence of predictions.
///
/// Accuracy is correct / total, with unknown predictions always counted as
/// incorrect. Weighted F1 averages the per-class F1 scores with weights
/// proportional to each class's true-label frequency; unknown predictions
/// contribute to no predicted class and so depress recall.
pub fn summarize(predictions: &[PredictionResult]) -> MetricsSummary {
    if predictions.is_empty() {
        return MetricsSummary {
            accuracy: 0.0,
            weighted_f1: None,
        };
    }

    let total = predictions.len();
    let correct = predictions
        .iter()
        .filter(|p| p.predicted == Some(p.true_label))
        .count();
    let accuracy = correct as f64 / total as f64;

    if predictions.iter().all(|p| p.predicted.is_none()) {
        return MetricsSummary {
            accuracy,
            weighted_f1: None,
        };
    }

    let mut weighted_f1 = 0.0;
    for class in [0u8, 1u8] {
        let support = predictions.iter().filter(|p| p.true_label == class).count();
        if support == 0 {
            continue;
        }
        let predicted_as = predictions
            .iter()
            .filter(|p| p.predicted == Some(class))
            .count();
        let true_positive = predictions
            .iter()
            .filter(|p| p.true_label == class && p.predicted == Some(class))
            .count();

        let precision = if predicted_as > 0 {
            true_positive as f64 / predicted_as as f64
        } else {
            0.0
        };
        let recall = true_positive as f64 / support as f64;
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        weighted_f1 += f1 * support as f64 / total as f64;
    }

    MetricsSummary {
        accuracy,
        weighted_f1: Some(weighted_f1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pred(id: usize, predicted: Option<u8>, true_label: u8) -> PredictionResult {
        PredictionResult {
            record_id: format!("r{}", id),
            predicted,
            true_label,
        }
    }

    #[test]
    fn test_perfect_predictions() {
        let predictions = vec![
            pred(0, Some(0), 0),
            pred(1, Some(1), 1),
            pred(2, Some(0), 0),
            pred(3, Some(1), 1),
        ];
        let summary = summarize(&predictions);
        assert!((summary.accuracy - 1.0).abs() < 1e-9);
        assert!((summary.weighted_f1.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_counts_as_incorrect() {
        // 10 predictions, 4 correct, the rest unknown: accuracy is 0.40.
        let mut predictions = Vec::new();
        for i in 0..4 {
            predictions.push(pred(i, Some(0), 0));
        }
        for i in 4..10 {
            predictions.push(pred(i, None, 0));
        }
        let summary = summarize(&predictions);
        assert!((summary.accuracy - 0.40).abs() < 1e-9);
    }

    #[test]
    fn test_all_unknown_has_no_f1() {
        let predictions = vec![pred(0, None, 0), pred(1, None, 1)];
        let summary = summarize(&predictions);
        assert!((summary.accuracy - 0.0).abs() < 1e-9);
        assert!(summary.weighted_f1.is_none());
    }

    #[test]
    fn test_weighted_f1_respects_class_frequency() {
        // Class 1 carries 3 of 4 records. Every record is predicted 1, so
        // class 1 gets precision 3/4 and recall 1 while class 0 gets F1 0;
        // the weighted score is 0.75 * f1(class 1).
        let predictions = vec![
            pred(0, Some(1), 1),
            pred(1, Some(1), 1),
            pred(2, Some(1), 1),
            pred(3, Some(1), 0),
        ];
        let summary = summarize(&predictions);
        assert!((summary.accuracy - 0.75).abs() < 1e-9);
        let f1_class1 = 2.0 * (3.0 / 4.0) * 1.0 / (3.0 / 4.0 + 1.0);
        let expected = 0.75 * f1_class1;
        assert!((summary.weighted_f1.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_empty_predictions() {
        let summary = summarize(&[]);
        assert_eq!(summary.accuracy, 0.0);
        assert!(summary.weighted_f1.is_none());
    }
}
