//! Per-column standardization of node features.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrafficError};

/// Columns whose standard deviation is at or below this are only centered.
const MIN_STD: f64 = 1e-10;

/// Standardizes columns to zero mean and unit variance.
///
/// Uses the population standard deviation. Data is row-major with a fixed
/// number of columns. Statistics and outputs are `f64`; callers narrow after
/// transforming.
///
/// ```
/// use traffic_gnn::data::StandardScaler;
///
/// let mut scaler = StandardScaler::new();
/// let data = [1.0, 10.0, 3.0, 10.0];
/// let scaled = scaler.fit_transform(&data, 2).unwrap();
/// assert_eq!(scaled, vec![-1.0, 0.0, 1.0, 0.0]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Option<Vec<f64>>,
    std: Option<Vec<f64>>,
}

impl StandardScaler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-column mean, once fitted.
    #[must_use]
    pub fn mean(&self) -> Option<&[f64]> {
        self.mean.as_deref()
    }

    /// Per-column population standard deviation, once fitted.
    #[must_use]
    pub fn std(&self) -> Option<&[f64]> {
        self.std.as_deref()
    }

    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.mean.is_some()
    }

    /// Compute column statistics.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::DimensionMismatch`] if `data` is empty or not a
    /// whole number of rows.
    pub fn fit(&mut self, data: &[f64], n_cols: usize) -> Result<()> {
        let n_rows = check_shape(data, n_cols)?;
        if n_rows == 0 {
            return Err(TrafficError::DimensionMismatch {
                expected: "at least one row".to_string(),
                actual: "0 rows".to_string(),
            });
        }

        let mut mean = vec![0.0f64; n_cols];
        for row in data.chunks(n_cols) {
            for (m, &v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut mean {
            *m /= n_rows as f64;
        }

        let mut var = vec![0.0f64; n_cols];
        for row in data.chunks(n_cols) {
            for ((s, &v), &m) in var.iter_mut().zip(row).zip(&mean) {
                *s += (v - m).powi(2);
            }
        }

        self.std = Some(var.iter().map(|&s| (s / n_rows as f64).sqrt()).collect());
        self.mean = Some(mean);
        Ok(())
    }

    /// Apply the fitted standardization.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::NotFitted`] before `fit`, or
    /// [`TrafficError::DimensionMismatch`] on a column-count mismatch.
    pub fn transform(&self, data: &[f64], n_cols: usize) -> Result<Vec<f64>> {
        let (mean, std) = self.stats(n_cols)?;
        check_shape(data, n_cols)?;

        let mut out = data.to_vec();
        for row in out.chunks_mut(n_cols) {
            for ((v, &m), &s) in row.iter_mut().zip(mean).zip(std) {
                *v -= m;
                if s > MIN_STD {
                    *v /= s;
                }
            }
        }
        Ok(out)
    }

    /// Fit then transform.
    ///
    /// # Errors
    ///
    /// See [`StandardScaler::fit`].
    pub fn fit_transform(&mut self, data: &[f64], n_cols: usize) -> Result<Vec<f64>> {
        self.fit(data, n_cols)?;
        self.transform(data, n_cols)
    }

    /// Map standardized values back to the original scale.
    ///
    /// # Errors
    ///
    /// Same conditions as [`StandardScaler::transform`].
    pub fn inverse_transform(&self, data: &[f64], n_cols: usize) -> Result<Vec<f64>> {
        let (mean, std) = self.stats(n_cols)?;
        check_shape(data, n_cols)?;

        let mut out = data.to_vec();
        for row in out.chunks_mut(n_cols) {
            for ((v, &m), &s) in row.iter_mut().zip(mean).zip(std) {
                if s > MIN_STD {
                    *v *= s;
                }
                *v += m;
            }
        }
        Ok(out)
    }

    fn stats(&self, n_cols: usize) -> Result<(&[f64], &[f64])> {
        let (Some(mean), Some(std)) = (self.mean.as_deref(), self.std.as_deref()) else {
            return Err(TrafficError::NotFitted("StandardScaler".to_string()));
        };
        if mean.len() != n_cols {
            return Err(TrafficError::DimensionMismatch {
                expected: format!("{} columns", mean.len()),
                actual: format!("{n_cols} columns"),
            });
        }
        Ok((mean, std))
    }
}

fn check_shape(data: &[f64], n_cols: usize) -> Result<usize> {
    if n_cols == 0 || data.len() % n_cols != 0 {
        return Err(TrafficError::DimensionMismatch {
            expected: format!("rows of {n_cols} columns"),
            actual: format!("{} values", data.len()),
        });
    }
    Ok(data.len() / n_cols)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_statistics() {
        let mut scaler = StandardScaler::new();
        scaler.fit(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2).expect("fit");
        assert_eq!(scaler.mean(), Some(&[3.0, 4.0][..]));
        let std = scaler.std().expect("fitted");
        let expected = (8.0f64 / 3.0).sqrt();
        assert!((std[0] - expected).abs() < 1e-12);
        assert!((std[1] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_zero_variance_column_is_centered_only() {
        let mut scaler = StandardScaler::new();
        let out = scaler.fit_transform(&[5.0, 1.0, 5.0, 3.0], 2).expect("fit");
        assert_eq!(out, vec![0.0, -1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_inverse_transform_restores_input() {
        let data = [2.0, -1.0, 7.5, 4.0, 0.5, 9.0];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&data, 3).expect("fit");
        let restored = scaler.inverse_transform(&scaled, 3).expect("inverse");
        for (a, b) in restored.iter().zip(&data) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_transform_before_fit() {
        let scaler = StandardScaler::new();
        assert!(matches!(
            scaler.transform(&[1.0], 1),
            Err(TrafficError::NotFitted(_))
        ));
    }

    #[test]
    fn test_column_mismatch() {
        let mut scaler = StandardScaler::new();
        scaler.fit(&[1.0, 2.0], 2).expect("fit");
        assert!(matches!(
            scaler.transform(&[1.0, 2.0, 3.0], 3),
            Err(TrafficError::DimensionMismatch { .. })
        ));
        assert!(scaler.fit(&[1.0, 2.0, 3.0], 2).is_err());
    }

    #[test]
    fn test_narrow_column_far_from_zero_is_centered() {
        let data = [-73.99, 40.73, -73.98, 40.74, -73.97, 40.75];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&data, 2).expect("fit");
        for col in 0..2 {
            let mean: f64 = scaled.iter().skip(col).step_by(2).sum::<f64>() / 3.0;
            assert!(mean.abs() < 1e-12, "column {col} mean {mean}");
        }
        assert!((scaled[0] + scaled[4]).abs() < 1e-9);
    }
}
