//! Y bounds for the visible part of a sample sequence.

pub const DEFAULT_PADDING: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YBounds {
    pub min: f64,
    pub max: f64,
}

/// Y bounds of the samples inside a visible window given as percentages of
/// the sample index range.
///
/// Returns `None` when the window covers no finite y value; callers should
/// leave the axis as it is.
pub fn compute_y_bounds(
    samples: &[[f64; 2]],
    visible_start: f64,
    visible_end: f64,
    padding: f64,
) -> Option<YBounds> {
    if samples.is_empty() || visible_start.is_nan() || visible_end.is_nan() {
        return None;
    }

    let last = samples.len() - 1;
    let start = visible_start.clamp(0.0, 100.0) / 100.0;
    let end = visible_end.clamp(0.0, 100.0) / 100.0;
    let lo = (start * last as f64).floor() as usize;
    let hi = ((end * last as f64).ceil() as usize).min(last);
    if lo > hi {
        return None;
    }

    let (min, max) = samples[lo..=hi]
        .iter()
        .map(|s| s[1])
        .filter(|y| y.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, y| match acc {
            Some((mn, mx)) => Some((mn.min(y), mx.max(y))),
            None => Some((y, y)),
        })?;

    let pad = if max == min {
        if min == 0.0 {
            padding
        } else {
            padding * min.abs()
        }
    } else {
        padding * (max - min)
    };

    Some(YBounds {
        min: min - pad,
        max: max + pad,
    })
}

/// The visible x window `[x_min, x_max]` as a percentage range over sample
/// indices, widened by one sample on each side.
///
/// Returns `None` when the window misses the samples entirely.
pub fn visible_percent_range(samples: &[[f64; 2]], x_min: f64, x_max: f64) -> Option<(f64, f64)> {
    let n = samples.len();
    if n == 0 || !(x_min <= x_max) {
        return None;
    }
    if n == 1 {
        let x = samples[0][0];
        return (x >= x_min && x <= x_max).then_some((0.0, 100.0));
    }

    let first_inside = samples.partition_point(|s| s[0] < x_min);
    let past_inside = samples.partition_point(|s| s[0] <= x_max);
    if first_inside >= n || past_inside == 0 {
        return None;
    }

    let lo = first_inside.saturating_sub(1);
    let hi = past_inside.min(n - 1);
    let last = (n - 1) as f64;
    Some((lo as f64 / last * 100.0, hi as f64 / last * 100.0))
}
