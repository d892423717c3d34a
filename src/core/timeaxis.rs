// Sample-index to time reconstruction

use crate::core::constants::*;
use crate::core::format::Metadata;

fn effective_rate(rate: f64) -> f64 {
    if rate > 0.0 {
        rate
    } else {
        DEFAULT_SAMPLE_RATE
    }
}

/// Builds one time value per sample, in microseconds.
///
/// With a sample-rate table the times come from the declared segments and
/// `timestamps` is ignored; the last segment's rate covers any samples past
/// the final `last_sample_num`. Without one, each raw timestamp is scaled by
/// the time multiplier. If fewer timestamps than `sample_count` are given,
/// the tail repeats the last available time.
pub fn compute_time_axis(meta: &Metadata, timestamps: &[i32], sample_count: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(sample_count);

    if meta.rates_count > 0 && !meta.sample_rates.is_empty() {
        let mut elapsed = 0.0f64;
        let mut prev = 0usize;
        for segment in &meta.sample_rates {
            if prev >= sample_count {
                break;
            }
            let end = segment.last_sample_num.min(sample_count).max(prev);
            let rate = effective_rate(segment.rate);
            for i in prev..end {
                out.push((elapsed + (i - prev) as f64 / rate * MICROS_PER_SECOND) as f32);
            }
            elapsed += (end - prev) as f64 / rate * MICROS_PER_SECOND;
            prev = end;
        }

        if prev < sample_count {
            let rate = meta
                .sample_rates
                .last()
                .map(|s| effective_rate(s.rate))
                .unwrap_or(DEFAULT_SAMPLE_RATE);
            for i in prev..sample_count {
                out.push((elapsed + (i - prev) as f64 / rate * MICROS_PER_SECOND) as f32);
            }
        }
    } else {
        let multiplier = if meta.time_multiplier == 0.0 {
            DEFAULT_TIME_MULTIPLIER
        } else {
            meta.time_multiplier
        };
        out.extend(
            timestamps
                .iter()
                .take(sample_count)
                .map(|ts| (*ts as f64 * multiplier) as f32),
        );
        let last = out.last().copied().unwrap_or(0.0);
        out.resize(sample_count, last);
    }

    out
}
