//! Pure statistical primitives. None of these touch wall-clock time or
//! mutable state — see `stats::window` for the time-bounded sequence these
//! operate over.

use crate::types::LvrHealth;

/// Asymptotic consistency constant that makes MAD comparable to standard
/// deviation under a normal distribution. Part of the contract; must not be
/// altered (spec.md §4.2).
pub const MAD_SCALE: f64 = 1.4826;

/// Standard statistical median. On even-length input, the average of the
/// two middle elements.
pub fn median(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// `median(|xᵢ − median(xs)|)`. Returns `0` for empty input.
pub fn mad(xs: &[f64]) -> f64 {
    let Some(m) = median(xs) else {
        return 0.0;
    };
    let deviations: Vec<f64> = xs.iter().map(|x| (x - m).abs()).collect();
    median(&deviations).unwrap_or(0.0)
}

/// `(current − median(xs)) / (1.4826 × mad(xs))`, or `None` if `xs` is
/// empty or `mad(xs) = 0`.
pub fn z_score(current: f64, xs: &[f64]) -> Option<f64> {
    let m = median(xs)?;
    let deviation = mad(xs);
    if deviation == 0.0 {
        return None;
    }
    Some((current - m) / (MAD_SCALE * deviation))
}

/// Liquidity-to-volume ratio. `None` if either input is absent or
/// `liquidity <= 0` (zero/negative liquidity is rejected, not clamped).
pub fn lvr(volume_24h: Option<f64>, liquidity: Option<f64>) -> Option<f64> {
    let volume_24h = volume_24h?;
    let liquidity = liquidity?;
    if liquidity <= 0.0 {
        return None;
    }
    Some(volume_24h / liquidity)
}

/// Classifies an LVR value into one of three health bands. Boundaries are
/// closed-below, open-above (spec.md §4.2).
pub fn classify_lvr(lvr: f64) -> LvrHealth {
    if lvr < 2.0 {
        LvrHealth::Healthy
    } else if lvr < 10.0 {
        LvrHealth::Elevated
    } else {
        LvrHealth::HighRisk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn mad_of_identical_values_is_zero() {
        assert_eq!(mad(&[3.0, 3.0, 3.0, 3.0, 3.0]), 0.0);
    }

    #[test]
    fn mad_outlier_example() {
        // spec.md §8 scenario 4: [1, 2, 3, 4, 100] -> median 3, mad 1
        let xs = [1.0, 2.0, 3.0, 4.0, 100.0];
        assert_eq!(median(&xs), Some(3.0));
        assert_eq!(mad(&xs), 1.0);
        let ratio = (100.0 - median(&xs).unwrap()).abs() / mad(&xs);
        assert!((ratio - 97.0).abs() < 1e-9);
    }

    #[test]
    fn z_score_undefined_on_zero_mad() {
        let xs = [3.0, 3.0, 3.0, 3.0, 3.0];
        assert_eq!(z_score(3.0, &xs), None);
    }

    #[test]
    fn z_score_empty_is_none() {
        assert_eq!(z_score(1.0, &[]), None);
    }

    #[test]
    fn lvr_rejects_nonpositive_liquidity() {
        assert_eq!(lvr(Some(10.0), Some(0.0)), None);
        assert_eq!(lvr(Some(10.0), Some(-5.0)), None);
        assert_eq!(lvr(None, Some(5.0)), None);
        assert_eq!(lvr(Some(10.0), None), None);
    }

    #[test]
    fn lvr_happy_path_is_deterministic() {
        let a = lvr(Some(20.0), Some(10.0));
        let b = lvr(Some(20.0), Some(10.0));
        assert_eq!(a, b);
        assert_eq!(a, Some(2.0));
    }

    #[test]
    fn classify_lvr_boundaries() {
        assert_eq!(classify_lvr(1.999), LvrHealth::Healthy);
        assert_eq!(classify_lvr(2.0), LvrHealth::Elevated);
        assert_eq!(classify_lvr(9.999), LvrHealth::Elevated);
        assert_eq!(classify_lvr(10.0), LvrHealth::HighRisk);
    }
}
