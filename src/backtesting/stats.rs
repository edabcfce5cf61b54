// Shared numeric helpers for window statistics

use ndarray::{s, Array1, ArrayView1};

/// Periods per year used to annualize daily-style statistics.
pub const ANNUALIZATION_PERIODS: f64 = 365.0;

/// Calendar days per year used for CAGR.
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Simple step returns `v[i] / v[i-1] - 1`. Empty when fewer than two values.
pub fn simple_returns(values: ArrayView1<'_, f64>) -> Array1<f64> {
    if values.len() < 2 {
        return Array1::zeros(0);
    }
    &values.slice(s![1..]) / &values.slice(s![..-1]) - 1.0
}

/// Sample standard deviation (n - 1 denominator). `None` below two values.
pub fn sample_std(values: ArrayView1<'_, f64>) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    Some(values.std(1.0))
}

pub fn mean(values: ArrayView1<'_, f64>) -> Option<f64> {
    values.mean()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_simple_returns() {
        let prices = array![100.0, 110.0, 99.0];
        let returns = simple_returns(prices.view());
        assert_eq!(returns.len(), 2);
        assert_relative_eq!(returns[0], 0.1, epsilon = 1e-12);
        assert_relative_eq!(returns[1], -0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_simple_returns_short_input() {
        assert!(simple_returns(array![5.0].view()).is_empty());
        assert!(simple_returns(Array1::<f64>::zeros(0).view()).is_empty());
    }

    #[test]
    fn test_sample_std_uses_n_minus_one() {
        let values = array![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        // Population std is 2.0; sample std is sqrt(32 / 7).
        assert_relative_eq!(
            sample_std(values.view()).unwrap(),
            (32.0_f64 / 7.0).sqrt(),
            epsilon = 1e-12
        );
        assert_eq!(sample_std(array![1.0].view()), None);
    }
}
