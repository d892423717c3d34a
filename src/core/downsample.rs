// Visual downsampling for transport

use serde::Serialize;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DownsampleMethod {
    #[default]
    Auto,
    None,
    Lttb,
    MinMax,
}

impl FromStr for DownsampleMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(DownsampleMethod::Auto),
            "none" => Ok(DownsampleMethod::None),
            "lttb" => Ok(DownsampleMethod::Lttb),
            "minmax" => Ok(DownsampleMethod::MinMax),
            other => Err(format!("unknown downsample method: {other}")),
        }
    }
}

impl DownsampleMethod {
    /// Whether a window of `points` samples should be reduced for `target`.
    pub fn applies(&self, points: usize, target: usize) -> bool {
        match self {
            DownsampleMethod::Auto => points > target.saturating_mul(2),
            DownsampleMethod::Lttb | DownsampleMethod::MinMax => points > target,
            DownsampleMethod::None => false,
        }
    }
}

/// Largest-Triangle-Three-Buckets.
///
/// Returns the input unchanged when it already fits or `target < 3`.
pub fn downsample_lttb(times: &[f32], values: &[f64], target: usize) -> (Vec<f32>, Vec<f64>) {
    let n = times.len().min(values.len());
    if n <= target || target < 3 {
        return (times[..n].to_vec(), values[..n].to_vec());
    }

    let mut out_t = Vec::with_capacity(target);
    let mut out_y = Vec::with_capacity(target);
    out_t.push(times[0]);
    out_y.push(values[0]);

    let bucket_size = (n - 2) as f64 / (target - 2) as f64;
    let mut selected = 0usize;

    for i in 0..target - 2 {
        let avg_start = ((i + 1) as f64 * bucket_size) as usize + 1;
        let avg_end = (((i + 2) as f64 * bucket_size) as usize + 1).min(n);

        let (mut avg_x, mut avg_y) = (0.0f64, 0.0f64);
        let count = avg_end.saturating_sub(avg_start);
        if count > 0 {
            for j in avg_start..avg_end {
                avg_x += times[j] as f64;
                avg_y += values[j];
            }
            avg_x /= count as f64;
            avg_y /= count as f64;
        }

        let range_start = (i as f64 * bucket_size) as usize + 1;
        let range_end = avg_start.min(n);

        let last_x = times[selected] as f64;
        let last_y = values[selected];
        let mut max_area = -1.0f64;
        let mut max_idx = range_start;

        for j in range_start..range_end {
            let area = ((last_x - avg_x) * (values[j] - last_y)
                - (last_x - times[j] as f64) * (avg_y - last_y))
                .abs()
                * 0.5;
            if area > max_area {
                max_area = area;
                max_idx = j;
            }
        }

        out_t.push(times[max_idx]);
        out_y.push(values[max_idx]);
        selected = max_idx;
    }

    out_t.push(times[n - 1]);
    out_y.push(values[n - 1]);
    (out_t, out_y)
}

/// Keeps the minimum and maximum of each bucket, plus first and last samples.
///
/// Returns the input unchanged when it already fits or `target < 4`.
pub fn downsample_minmax(times: &[f32], values: &[f64], target: usize) -> (Vec<f32>, Vec<f64>) {
    let n = times.len().min(values.len());
    if n <= target || target < 4 {
        return (times[..n].to_vec(), values[..n].to_vec());
    }

    let buckets = (target - 2) / 2;
    let interior = n - 2;
    let mut keep = Vec::with_capacity(target);
    keep.push(0);

    for b in 0..buckets {
        let start = 1 + b * interior / buckets;
        let end = 1 + (b + 1) * interior / buckets;
        if start >= end {
            continue;
        }
        let (mut lo, mut hi) = (start, start);
        for j in start..end {
            if values[j] < values[lo] {
                lo = j;
            }
            if values[j] > values[hi] {
                hi = j;
            }
        }
        keep.push(lo.min(hi));
        if lo != hi {
            keep.push(lo.max(hi));
        }
    }
    keep.push(n - 1);

    keep.iter().map(|&i| (times[i], values[i])).unzip()
}

/// Keeps the first and last samples and every sample that differs from a neighbour.
pub fn downsample_digital(times: &[f32], states: &[u8]) -> (Vec<f32>, Vec<u8>) {
    let n = times.len().min(states.len());
    if n <= 2 {
        return (times[..n].to_vec(), states[..n].to_vec());
    }

    let mut out_t = vec![times[0]];
    let mut out_y = vec![states[0]];
    for i in 1..n - 1 {
        if states[i] != states[i - 1] || states[i] != states[i + 1] {
            out_t.push(times[i]);
            out_y.push(states[i]);
        }
    }
    out_t.push(times[n - 1]);
    out_y.push(states[n - 1]);
    (out_t, out_y)
}
