//! Nearest-sample lookup on a sorted sample sequence.
//!
//! Distances are absolute differences in x. When two samples are equally
//! close the one with the lower index wins.

/// Index of the sample nearest to `target_x`, or `None` for an empty slice.
///
/// `samples` must be sorted ascending by x. A non-finite target resolves to
/// the first sample, matching a scan where no distance is ever smaller.
pub fn nearest_index(target_x: f64, samples: &[[f64; 2]]) -> Option<usize> {
    if samples.is_empty() {
        return None;
    }
    if !target_x.is_finite() {
        return Some(0);
    }

    // First sample with x >= target.
    let upper = samples.partition_point(|s| s[0] < target_x);
    if upper == 0 {
        return Some(0);
    }

    // Walk back to the first sample of the run sharing the lower candidate's x.
    let mut lower = upper - 1;
    let lower_x = samples[lower][0];
    while lower > 0 && samples[lower - 1][0] == lower_x {
        lower -= 1;
    }

    if upper == samples.len() {
        return Some(lower);
    }

    let below = (target_x - samples[lower][0]).abs();
    let above = (samples[upper][0] - target_x).abs();
    // Lower index keeps ties.
    if above < below {
        Some(upper)
    } else {
        Some(lower)
    }
}

/// The sample nearest to `target_x`.
pub fn nearest(target_x: f64, samples: &[[f64; 2]]) -> Option<[f64; 2]> {
    nearest_index(target_x, samples).map(|i| samples[i])
}

/// Snap `x` to the nearest sample's x when enabled and samples exist.
pub fn snap_x(x: f64, samples: &[[f64; 2]], enabled: bool) -> Option<f64> {
    if enabled {
        nearest(x, samples).map(|s| s[0])
    } else if x.is_finite() {
        Some(x)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(target_x: f64, samples: &[[f64; 2]]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, s) in samples.iter().enumerate() {
            let d = (s[0] - target_x).abs();
            match best {
                Some((_, bd)) if !(d < bd) => {}
                _ => best = Some((i, d)),
            }
        }
        best.map(|(i, _)| i)
    }

    #[test]
    fn tie_prefers_lower_sample() {
        let samples = [[4.0, 1.0], [6.0, 2.0]];
        assert_eq!(nearest(5.0, &samples), Some([4.0, 1.0]));
    }

    #[test]
    fn empty_has_no_nearest() {
        assert_eq!(nearest(1.0, &[]), None);
    }

    #[test]
    fn clamps_outside_range() {
        let samples = [[1.0, 0.0], [2.0, 0.0], [3.0, 0.0]];
        assert_eq!(nearest_index(-100.0, &samples), Some(0));
        assert_eq!(nearest_index(100.0, &samples), Some(2));
        assert_eq!(nearest_index(2.0, &samples), Some(1));
    }

    #[test]
    fn agrees_with_linear_scan() {
        let samples: Vec<[f64; 2]> = [0.0, 0.5, 1.0, 1.0, 3.0, 7.0, 7.5, 10.0]
            .iter()
            .map(|&x| [x, x * 2.0])
            .collect();
        let mut t = -2.0;
        while t <= 12.0 {
            assert_eq!(nearest_index(t, &samples), scan(t, &samples), "target {t}");
            t += 0.125;
        }
    }

    #[test]
    fn non_finite_targets_match_linear_scan() {
        let samples = [[1.0, 0.0], [2.0, 0.0], [3.0, 0.0]];
        for t in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            assert_eq!(nearest_index(t, &samples), scan(t, &samples), "target {t}");
        }
        assert_eq!(nearest_index(f64::INFINITY, &samples), Some(0));
    }

    #[test]
    fn snap_x_respects_toggle() {
        let samples = [[1.0, 0.0], [3.0, 0.0]];
        assert_eq!(snap_x(1.4, &samples, true), Some(1.0));
        assert_eq!(snap_x(1.4, &samples, false), Some(1.4));
        assert_eq!(snap_x(1.4, &[], true), None);
    }
}
