//! Per-claim scoring output

use serde::{Deserialize, Serialize};

/// Binary fraud decision derived from a probability and a threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FraudLabel {
    Legit,
    Fraud,
}

impl FraudLabel {
    /// Probabilities at or above the threshold are labelled fraud.
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        if probability >= threshold {
            FraudLabel::Fraud
        } else {
            FraudLabel::Legit
        }
    }
}

/// Scoring result for one claim record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimPrediction {
    /// Probability of fraud in [0, 1]
    pub fraud_probability: f64,
    /// Thresholded decision
    pub label: FraudLabel,
}

impl ClaimPrediction {
    pub fn new(fraud_probability: f64, threshold: f64) -> Self {
        Self {
            fraud_probability,
            label: FraudLabel::from_probability(fraud_probability, threshold),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_from_probability() {
        assert_eq!(FraudLabel::from_probability(0.49, 0.5), FraudLabel::Legit);
        assert_eq!(FraudLabel::from_probability(0.5, 0.5), FraudLabel::Fraud);
        assert_eq!(FraudLabel::from_probability(0.97, 0.5), FraudLabel::Fraud);
    }

    #[test]
    fn test_prediction_serialization() {
        let prediction = ClaimPrediction::new(0.81, 0.5);
        let json = serde_json::to_string(&prediction).unwrap();
        assert!(json.contains("\"label\":\"fraud\""));

        let back: ClaimPrediction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, prediction);
    }
}
