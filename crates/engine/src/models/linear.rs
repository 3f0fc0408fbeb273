//! Ordinary least squares trend line

use super::{check_inputs, FitError};
use serde::{Deserialize, Serialize};

/// `y = mean_y + slope * (x - mean_x)`
///
/// Stored in centred form: ordinals sit around 7.4e5, so fitting against raw
/// x would square large numbers and lose precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearTrend {
    slope: f64,
    mean_x: f64,
    mean_y: f64,
}

impl LinearTrend {
    pub fn fit(xs: &[f64], ys: &[f64]) -> Result<Self, FitError> {
        check_inputs(xs, ys, 2)?;

        let n = xs.len() as f64;
        let mean_x = xs.iter().sum::<f64>() / n;
        let mean_y = ys.iter().sum::<f64>() / n;

        let (sxy, sxx) = xs
            .iter()
            .zip(ys)
            .fold((0.0, 0.0), |(sxy, sxx), (&x, &y)| {
                let dx = x - mean_x;
                (sxy + dx * (y - mean_y), sxx + dx * dx)
            });

        if sxx <= f64::EPSILON {
            return Err(FitError::Degenerate);
        }

        Ok(Self {
            slope: sxy / sxx,
            mean_x,
            mean_y,
        })
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.mean_y + self.slope * (x - self.mean_x)
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    /// Value of the line at x = 0
    pub fn intercept(&self) -> f64 {
        self.mean_y - self.slope * self.mean_x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_line_recovered() {
        let xs: Vec<f64> = (0..50).map(|i| 738_000.0 + i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 3.0 * (x - 738_000.0) + 12.0).collect();

        let model = LinearTrend::fit(&xs, &ys).unwrap();
        assert!((model.slope() - 3.0).abs() < 1e-9);
        assert!((model.predict(738_100.0) - 312.0).abs() < 1e-6);
    }

    #[test]
    fn test_least_squares_on_noisy_points() {
        // y = 2x + 1 with symmetric noise
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [1.5, 2.5, 5.5, 6.5];
        let model = LinearTrend::fit(&xs, &ys).unwrap();
        assert!((model.slope() - 1.8).abs() < 1e-12);
        assert!((model.intercept() - 1.3).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(
            LinearTrend::fit(&[1.0], &[2.0]),
            Err(FitError::TooFewSamples { needed: 2, got: 1 })
        );
        assert_eq!(
            LinearTrend::fit(&[5.0, 5.0, 5.0], &[1.0, 2.0, 3.0]),
            Err(FitError::Degenerate)
        );
        assert_eq!(
            LinearTrend::fit(&[1.0, 2.0], &[1.0]),
            Err(FitError::LengthMismatch {
                features: 2,
                targets: 1
            })
        );
        assert_eq!(
            LinearTrend::fit(&[1.0, 2.0], &[1.0, f64::NAN]),
            Err(FitError::NonFinite)
        );
    }
}
