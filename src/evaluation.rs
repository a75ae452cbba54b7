//! Evaluation - regression metrics and ad ratio metrics
//!
//! Ratio metrics fail with [`EvaluationError::DivisionByZero`] on a zero
//! denominator. An ad with no clicks has no CPC; callers decide what that
//! means for them (aggregates in [`crate::analytics`] skip such rows).

use crate::data::AdRecord;
use crate::error::EvaluationError;
use serde::{Deserialize, Serialize};

/// Standard regression metrics over paired true/predicted values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl std::fmt::Display for RegressionMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MSE {:.6} | RMSE {:.6} | MAE {:.6} | R² {:.4}",
            self.mse, self.rmse, self.mae, self.r2
        )
    }
}

/// MSE, RMSE, MAE and R².
///
/// R² is `1 - SS_res / SS_tot`. When `y_true` is constant (`SS_tot == 0`)
/// it is 1.0 for a perfect prediction and 0.0 otherwise.
pub fn evaluate_model(y_true: &[f64], y_pred: &[f64]) -> Result<RegressionMetrics, EvaluationError> {
    if y_true.len() != y_pred.len() {
        return Err(EvaluationError::ShapeMismatch {
            expected: y_true.len(),
            actual: y_pred.len(),
        });
    }
    if y_true.is_empty() {
        return Err(EvaluationError::EmptyInput);
    }

    let n = y_true.len() as f64;
    let (mut ss_res, mut abs_sum) = (0.0, 0.0);
    for (t, p) in y_true.iter().zip(y_pred) {
        let err = t - p;
        ss_res += err * err;
        abs_sum += err.abs();
    }
    let mean = y_true.iter().sum::<f64>() / n;
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();

    let mse = ss_res / n;
    let r2 = if ss_tot == 0.0 {
        if ss_res == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    };

    Ok(RegressionMetrics {
        mse,
        rmse: mse.sqrt(),
        mae: abs_sum / n,
        r2,
    })
}

fn ratio(metric: &'static str, numerator: f64, denominator: f64) -> Result<f64, EvaluationError> {
    if denominator == 0.0 {
        return Err(EvaluationError::DivisionByZero { metric });
    }
    Ok(numerator / denominator)
}

/// Return on ad spend: `revenue / spend`
pub fn calculate_roas(revenue: f64, spend: f64) -> Result<f64, EvaluationError> {
    ratio("roas", revenue, spend)
}

/// Cost per click: `spend / clicks`
pub fn calculate_cpc(spend: f64, clicks: f64) -> Result<f64, EvaluationError> {
    ratio("cpc", spend, clicks)
}

/// Cost per acquisition: `spend / conversions`
pub fn calculate_cpa(spend: f64, conversions: f64) -> Result<f64, EvaluationError> {
    ratio("cpa", spend, conversions)
}

/// Click-through rate: `clicks / impressions`
pub fn calculate_ctr(clicks: f64, impressions: f64) -> Result<f64, EvaluationError> {
    ratio("ctr", clicks, impressions)
}

/// Conversion rate: `conversions / clicks`
pub fn calculate_cvr(conversions: f64, clicks: f64) -> Result<f64, EvaluationError> {
    ratio("cvr", conversions, clicks)
}

impl AdRecord {
    pub fn roas(&self) -> Option<f64> {
        calculate_roas(self.revenue, self.spend).ok()
    }

    pub fn cpc(&self) -> Option<f64> {
        calculate_cpc(self.spend, self.clicks).ok()
    }

    pub fn cpa(&self) -> Option<f64> {
        calculate_cpa(self.spend, self.conversions).ok()
    }

    pub fn ctr(&self) -> Option<f64> {
        calculate_ctr(self.clicks, self.impressions).ok()
    }

    pub fn cvr(&self) -> Option<f64> {
        calculate_cvr(self.conversions, self.clicks).ok()
    }
}
