// Example usage of the COMTRADE reader

use comtrade_reader::{
    compute_time_axis, downsample_digital, downsample_lttb, read_comtrade_files, Result,
};
use tracing::{info, Level};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();

    let mut args = std::env::args().skip(1);
    let cfg_path = args.next().unwrap_or_else(|| "data/recording.cfg".to_string());
    let dat_path = args.next().unwrap_or_else(|| cfg_path.replace(".cfg", ".dat"));

    let (meta, data) = read_comtrade_files(&cfg_path, &dat_path)?;

    info!("Station: {} / {}", meta.station, meta.device);
    info!(
        "Revision {}, {} file, {} analog + {} digital channels",
        meta.revision.as_str(),
        meta.data_file_type.as_str(),
        meta.analog_count,
        meta.digital_count
    );
    if let (Some(start), Some(end)) = (meta.start_time, meta.end_time) {
        info!("Recorded {} .. {}", start, end);
    }
    for rate in &meta.sample_rates {
        info!("  {} Hz up to sample {}", rate.rate, rate.last_sample_num);
    }

    let times = compute_time_axis(&meta, &data.timestamps, data.len());
    info!("Total samples: {}", data.len());
    if let (Some(first), Some(last)) = (times.first(), times.last()) {
        info!("Time span: {} us .. {} us", first, last);
    }

    // Sample columns are keyed by position in the configuration, from 1.
    for (i, ch) in meta.analog_channels.iter().enumerate() {
        let Some(samples) = data.analog.get(&(i as u32 + 1)) else {
            continue;
        };
        let values = samples.scaled(ch.multiplier, ch.offset);
        let (t, y) = downsample_lttb(&times, &values, 500);
        let peak = values.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
        info!(
            "  [A{}] {} ({}) peak={:.3}, {} -> {} points",
            ch.number,
            ch.name,
            ch.unit,
            peak,
            values.len(),
            t.len().min(y.len())
        );
    }

    for (i, ch) in meta.digital_channels.iter().enumerate() {
        let Some(states) = data.digital.get(&(i as u32 + 1)) else {
            continue;
        };
        let (t, _) = downsample_digital(&times, states);
        info!("  [D{}] {}: {} transitions kept", ch.number, ch.name, t.len());
    }

    Ok(())
}
