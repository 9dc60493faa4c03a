//! Median split into low/high regimes

/// A sample partitioned around its median
#[derive(Debug, Clone, PartialEq)]
pub struct RegimeSplit {
    /// Median of the full sample
    pub median: f64,
    /// Values `<= median`, in sample order
    pub low: Vec<f64>,
    /// Values `>= median`, in sample order
    pub high: Vec<f64>,
}

/// Standard median: middle element for odd counts, mean of the two middle
/// elements for even counts. `None` for an empty sample.
pub fn median(sample: &[f64]) -> Option<f64> {
    if sample.is_empty() {
        return None;
    }
    let mut sorted = sample.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Partition `sample` around `median`.
///
/// Values equal to the median land in both halves.
pub fn split(sample: &[f64], median: f64) -> (Vec<f64>, Vec<f64>) {
    let low = sample.iter().copied().filter(|&v| v <= median).collect();
    let high = sample.iter().copied().filter(|&v| v >= median).collect();
    (low, high)
}

/// Compute the median of `sample` and split around it
pub fn split_at_median(sample: &[f64]) -> Option<RegimeSplit> {
    let median = median(sample)?;
    let (low, high) = split(sample, median);
    Some(RegimeSplit { median, low, high })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[7.0]), Some(7.0));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_median_value_appears_in_both_halves() {
        let sample = [5.0, 1.0, 3.0, 3.0, 9.0];
        let m = median(&sample).unwrap();
        assert_eq!(m, 3.0);

        let (low, high) = split(&sample, m);
        assert_eq!(low, vec![1.0, 3.0, 3.0]);
        assert_eq!(high, vec![5.0, 3.0, 3.0, 9.0]);
        assert!(low.contains(&m) && high.contains(&m));
    }

    #[test]
    fn test_split_covers_every_value() {
        let sample = [10.0, 2.0, 8.0, 4.0, 6.0, 6.0, 1.0];
        let s = split_at_median(&sample).unwrap();

        assert!(s.low.iter().all(|&v| v <= s.median));
        assert!(s.high.iter().all(|&v| v >= s.median));
        for v in sample {
            assert!(s.low.contains(&v) || s.high.contains(&v));
        }
        let ties = sample.iter().filter(|&&v| v == s.median).count();
        assert_eq!(s.low.len() + s.high.len(), sample.len() + ties);
    }

    #[test]
    fn test_even_sample_median_not_in_data() {
        let s = split_at_median(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(s.median, 2.5);
        assert_eq!(s.low, vec![1.0, 2.0]);
        assert_eq!(s.high, vec![3.0, 4.0]);
    }

    #[test]
    fn test_split_empty() {
        assert!(split_at_median(&[]).is_none());
    }
}
