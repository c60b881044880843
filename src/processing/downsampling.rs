/// Largest-Triangle-Three-Buckets (LTTB) downsampling.
/// Takes sorted `[x, y]` samples and a target number of output points.
pub fn lttb_downsample(points: &[[f64; 2]], target: usize) -> Vec<[f64; 2]> {
    let n = points.len();
    if n <= target || target < 3 {
        return points.to_vec();
    }

    let mut out = Vec::with_capacity(target);

    // Always keep the first point
    out.push(points[0]);

    let bucket_size = (n - 2) as f64 / (target - 2) as f64;
    let mut prev = points[0];

    for i in 0..(target - 2) {
        let bucket_start = (i as f64 * bucket_size) as usize + 1;
        let bucket_end = (((i as f64 + 1.0) * bucket_size) as usize + 1).min(n - 1);

        // Average of the next bucket is the third triangle vertex
        let next_start = bucket_end;
        let next_end = (((i as f64 + 2.0) * bucket_size) as usize + 1).min(n);
        let next = &points[next_start..next_end.max(next_start)];
        let (avg_x, avg_y) = if next.is_empty() {
            (points[n - 1][0], points[n - 1][1])
        } else {
            let (sx, sy) = next.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p[0], sy + p[1]));
            (sx / next.len() as f64, sy / next.len() as f64)
        };

        let mut max_area = -1.0f64;
        let mut best = points[bucket_start.min(n - 1)];
        for p in &points[bucket_start.min(bucket_end)..bucket_end] {
            // Doubled area; only compared
            let area = ((prev[0] - avg_x) * (p[1] - prev[1]) - (prev[0] - p[0]) * (avg_y - prev[1])).abs();
            if area > max_area {
                max_area = area;
                best = *p;
            }
        }

        out.push(best);
        prev = best;
    }

    // Always keep the last point
    out.push(points[n - 1]);
    out
}

/// Points inside `[view_min, view_max]` plus one neighbor on each side for
/// line continuity, decimated with LTTB above `max_points`.
pub fn downsample_for_view(points: &[[f64; 2]], view_min: f64, view_max: f64, max_points: usize) -> Vec<[f64; 2]> {
    if points.is_empty() {
        return Vec::new();
    }
    let start = points.partition_point(|p| p[0] < view_min).saturating_sub(1);
    let end = (points.partition_point(|p| p[0] <= view_max) + 1).min(points.len());
    if start >= end {
        return Vec::new();
    }
    lttb_downsample(&points[start..end], max_points)
}
