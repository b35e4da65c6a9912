//! Baseline comparison within a tolerance band

use serde::Serialize;

use crate::model::MetricSnapshot;

/// Default fractional deviation allowed from the baseline
pub const DEFAULT_TOLERANCE: f64 = 0.2;

/// A metric outside its allowed band
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{field} = {measured} breaches threshold {threshold}")]
pub struct BaselineViolation {
    pub field: &'static str,
    pub measured: f64,
    pub threshold: f64,
}

/// Compares live metrics against a captured baseline
#[derive(Debug, Clone, Copy)]
pub struct BaselineValidator {
    tolerance: f64,
}

impl BaselineValidator {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Check `current` against `baseline`, failing on the first breach.
    ///
    /// Error rate and response time may rise to `baseline * (1 + tolerance)`,
    /// availability may fall to `baseline * (1 - tolerance)`. Values exactly
    /// on a threshold pass.
    pub fn validate(
        &self,
        current: &MetricSnapshot,
        baseline: &MetricSnapshot,
    ) -> Result<(), BaselineViolation> {
        let upper = 1.0 + self.tolerance;
        let lower = 1.0 - self.tolerance;

        let ceilings = [
            ("errorRate", current.error_rate, baseline.error_rate * upper),
            ("responseTime", current.response_time, baseline.response_time * upper),
        ];
        for (field, measured, threshold) in ceilings {
            if measured > threshold {
                return Err(BaselineViolation {
                    field,
                    measured,
                    threshold,
                });
            }
        }

        let threshold = baseline.availability * lower;
        if current.availability < threshold {
            return Err(BaselineViolation {
                field: "availability",
                measured: current.availability,
                threshold,
            });
        }

        Ok(())
    }
}

impl Default for BaselineValidator {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(error_rate: f64, response_time: f64, availability: f64) -> MetricSnapshot {
        MetricSnapshot {
            error_rate,
            response_time,
            availability,
            ..Default::default()
        }
    }

    #[test]
    fn test_error_rate_tolerance_band() {
        let validator = BaselineValidator::default();
        let baseline = snapshot(1.0, 200.0, 99.0);

        assert!(validator.validate(&snapshot(1.1, 200.0, 99.0), &baseline).is_ok());
        // Boundary passes
        assert!(validator.validate(&snapshot(1.2, 200.0, 99.0), &baseline).is_ok());

        let violation = validator
            .validate(&snapshot(1.21, 200.0, 99.0), &baseline)
            .unwrap_err();
        assert_eq!(violation.field, "errorRate");
        assert_eq!(violation.measured, 1.21);
        assert_eq!(violation.threshold, 1.2);

        let message = violation.to_string();
        assert!(message.contains("errorRate"));
        assert!(message.contains("1.21"));
        assert!(message.contains("1.2"));
    }

    #[test]
    fn test_response_time_ceiling() {
        let validator = BaselineValidator::default();
        let baseline = snapshot(1.0, 200.0, 99.0);

        assert!(validator.validate(&snapshot(1.0, 240.0, 99.0), &baseline).is_ok());
        let violation = validator
            .validate(&snapshot(1.0, 241.0, 99.0), &baseline)
            .unwrap_err();
        assert_eq!(violation.field, "responseTime");
        assert_eq!(violation.threshold, 240.0);
    }

    #[test]
    fn test_availability_floor() {
        let validator = BaselineValidator::new(0.5);
        let baseline = snapshot(1.0, 200.0, 100.0);

        assert!(validator.validate(&snapshot(1.0, 200.0, 50.0), &baseline).is_ok());
        let violation = validator
            .validate(&snapshot(1.0, 200.0, 49.9), &baseline)
            .unwrap_err();
        assert_eq!(violation.field, "availability");
        assert_eq!(violation.threshold, 50.0);
    }

    #[test]
    fn test_first_breach_reported() {
        let validator = BaselineValidator::default();
        let baseline = snapshot(1.0, 200.0, 99.0);

        let violation = validator
            .validate(&snapshot(5.0, 900.0, 10.0), &baseline)
            .unwrap_err();
        assert_eq!(violation.field, "errorRate");
    }
}
