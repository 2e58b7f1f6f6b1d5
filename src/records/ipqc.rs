//! In-process quality control statistics: mean, standard deviation and
//! process capability against spec limits.
//!
//! Pure computation; results feed COA spec lines and are not stored on
//! their own.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Fewer readings than this and no meaningful capability can be claimed.
pub const MIN_READINGS: usize = 3;

/// Cpk reported when every reading is identical. Sidesteps the zero
/// division while still reading as a comfortably capable process.
pub const ZERO_VARIANCE_CPK: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecLimits {
    pub lsl: f64,
    pub usl: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Pass,
    Marginal,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub readings: Vec<f64>,
    pub mean: f64,
    pub sd: f64,
    pub cpk: f64,
    pub verdict: Verdict,
}

pub fn mean(readings: &[f64]) -> f64 {
    readings.iter().sum::<f64>() / readings.len() as f64
}

/// Population standard deviation.
pub fn std_dev(readings: &[f64]) -> f64 {
    let m = mean(readings);
    let avg_sq_diff = readings.iter().map(|r| (r - m).powi(2)).sum::<f64>() / readings.len() as f64;
    avg_sq_diff.sqrt()
}

pub fn cpk(mean: f64, sd: f64, limits: &SpecLimits) -> f64 {
    if sd == 0.0 {
        return ZERO_VARIANCE_CPK;
    }
    f64::min(
        (limits.usl - mean) / (3.0 * sd),
        (mean - limits.lsl) / (3.0 * sd),
    )
}

/// Evaluate a run of readings against its spec limits. Any reading outside
/// the limits fails outright; a capable-but-tight process (Cpk below 1.0)
/// is marginal.
pub fn evaluate(readings: &[f64], limits: &SpecLimits) -> Result<Assessment> {
    if readings.len() < MIN_READINGS {
        return Err(Error::validation(format!(
            "at least {MIN_READINGS} readings required for IPC verification"
        )));
    }
    if limits.usl <= limits.lsl {
        return Err(Error::validation("upper spec limit must exceed lower"));
    }

    let mean = mean(readings);
    let sd = std_dev(readings);
    let cpk = cpk(mean, sd, limits);
    let out_of_spec = readings.iter().any(|r| *r < limits.lsl || *r > limits.usl);
    let verdict = if out_of_spec {
        Verdict::Fail
    } else if cpk < 1.0 {
        Verdict::Marginal
    } else {
        Verdict::Pass
    };

    Ok(Assessment { readings: readings.to_vec(), mean, sd, cpk, verdict })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> SpecLimits {
        SpecLimits { lsl: 475.0, usl: 525.0, unit: "mg".into() }
    }

    #[test]
    fn too_few_readings_are_refused() {
        let err = evaluate(&[500.0, 501.0], &limits()).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn identical_readings_hit_the_zero_variance_sentinel() {
        let assessment = evaluate(&[500.0, 500.0, 500.0], &limits()).unwrap();
        assert_eq!(assessment.sd, 0.0);
        assert_eq!(assessment.cpk, ZERO_VARIANCE_CPK);
        assert_eq!(assessment.verdict, Verdict::Pass);
    }

    #[test]
    fn centered_tight_process_passes() {
        let readings = [498.0, 502.0, 499.0, 501.0, 497.0, 503.0, 500.0, 499.0, 501.0, 498.0];
        let assessment = evaluate(&readings, &limits()).unwrap();
        assert!((assessment.mean - 499.8).abs() < 1e-9);
        assert!(assessment.cpk > 1.0);
        assert_eq!(assessment.verdict, Verdict::Pass);
    }

    #[test]
    fn reading_outside_limits_fails_regardless_of_cpk() {
        let assessment = evaluate(&[500.0, 501.0, 530.0], &limits()).unwrap();
        assert_eq!(assessment.verdict, Verdict::Fail);
    }

    #[test]
    fn wide_scatter_inside_limits_is_marginal() {
        let assessment = evaluate(&[480.0, 500.0, 520.0], &limits()).unwrap();
        assert!(assessment.cpk < 1.0);
        assert_eq!(assessment.verdict, Verdict::Marginal);
    }

    #[test]
    fn inverted_limits_are_refused() {
        let bad = SpecLimits { lsl: 525.0, usl: 475.0, unit: "mg".into() };
        assert!(evaluate(&[500.0, 500.0, 500.0], &bad).is_err());
    }
}
