//! Small descriptive statistics over f64 samples.

/// Arithmetic mean, `None` for an empty sample.
pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1), zero for fewer than two values.
pub(crate) fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    if values.len() < 2 { return Some(0.0) }
    let ss = values.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Median, averaging the two middle values for even-length samples.
pub(crate) fn median(values: &[f64]) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    median_sorted(&sorted)
}

fn median_sorted(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2]),
        _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
    }
}

/// Highest-density interval: the narrowest interval containing `mass` of the sample.
/// Ties between equally narrow windows go to the lowest one.
fn hdi_sorted(sorted: &[f64], mass: f64) -> Option<(f64, f64)> {
    let n = sorted.len();
    if n == 0 { return None }

    let window = ((mass * n as f64).ceil() as usize).clamp(1, n);
    (0..=n - window)
        .map(|i| (sorted[i], sorted[i + window - 1]))
        .reduce(|best, next| if next.1 - next.0 < best.1 - best.0 { next } else { best })
}

/// Mean, median and highest-density interval of a sample in one sort.
pub(crate) fn describe(values: &[f64], mass: f64) -> Option<(f64, f64, f64, f64)> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let (lower, upper) = hdi_sorted(&sorted, mass)?;
    Some((mean(&sorted)?, median_sorted(&sorted)?, lower, upper))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hdi(values: &[f64], mass: f64) -> Option<(f64, f64)> {
        describe(values, mass).map(|(_, _, lower, upper)| (lower, upper))
    }

    #[test]
    fn median_of_odd_and_even_samples() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn mean_and_std_dev() {
        assert_eq!(mean(&[1.0, 2.0, 3.0]), Some(2.0));
        assert_eq!(std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).map(|s| (s * 1e6).round() / 1e6), Some(2.13809));
        assert_eq!(std_dev(&[5.0]), Some(0.0));
        assert_eq!(std_dev(&[]), None);
    }

    #[test]
    fn hdi_picks_narrowest_window() {
        // 80% of 10 values = 8 values; the dense cluster is at the bottom.
        let values = [0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 5.0, 10.0];
        assert_eq!(hdi(&values, 0.8), Some((0.0, 0.7)));
    }

    #[test]
    fn hdi_of_constant_sample_has_zero_width() {
        assert_eq!(hdi(&[0.14; 20], 0.94), Some((0.14, 0.14)));
    }

    #[test]
    fn hdi_of_skewed_sample_differs_from_equal_tailed() {
        let values = (0..100).map(|i| (i as f64 / 10.0).exp()).collect::<Vec<_>>();
        let (lower, upper) = hdi(&values, 0.9).unwrap();
        // The narrowest 90% window of an exponential ramp starts at the bottom.
        assert_eq!(lower, values[0]);
        assert_eq!(upper, values[89]);
    }

    #[test]
    fn describe_matches_parts() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(describe(&values, 1.0), Some((2.5, 2.5, 1.0, 4.0)));
        assert_eq!(describe(&[], 0.9), None);
    }
}
