// Waveform and canvas payloads built from a cached dataset

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::core::cache::Dataset;
use crate::core::constants::{DEFAULT_WINDOW_DIVISOR, DEFAULT_WINDOW_SAMPLES};
use crate::core::downsample::*;
use crate::core::format::AnalogSamples;
use crate::core::timeaxis::compute_time_axis;

/// Query string of the waveform endpoint. Values are parsed leniently:
/// unparsable numbers fall back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WaveformQuery {
    #[serde(rename = "A")]
    pub analog: Option<String>,
    #[serde(rename = "D")]
    pub digital: Option<String>,
    #[serde(rename = "startTime")]
    pub start_time: Option<String>,
    #[serde(rename = "endTime")]
    pub end_time: Option<String>,
    pub downsample: Option<String>,
    #[serde(rename = "targetPoints")]
    pub target_points: Option<String>,
}

#[derive(Error, Debug, PartialEq)]
pub enum QueryError {
    #[error("dataset has no samples")]
    NoData,

    #[error("no channel specified")]
    NoChannels,

    #[error("{0}")]
    BadMethod(String),
}

impl QueryError {
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::NoData => "NO_DATA",
            QueryError::NoChannels => "NO_CHANNELS_SPECIFIED",
            QueryError::BadMethod(_) => "BAD_DOWNSAMPLE_METHOD",
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Series {
    Analog {
        channel: u32,
        name: String,
        unit: String,
        times: Vec<f32>,
        y: Vec<f64>,
    },
    Digital {
        channel: u32,
        name: String,
        times: Vec<f32>,
        y: Vec<u8>,
    },
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct TimeSpan {
    pub start: f32,
    pub end: f32,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DownsampleInfo {
    pub method: DownsampleMethod,
    pub target_points: usize,
    pub original_points: usize,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WaveformResponse {
    pub series: Vec<Series>,
    pub window: TimeSpan,
    pub time_range: TimeSpan,
    pub downsample: DownsampleInfo,
}

/// Comma-separated channel list; unparsable tokens are skipped.
fn parse_channel_list(raw: Option<&str>) -> Vec<u32> {
    let mut out: Vec<u32> = raw
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}

fn parse_opt<T: std::str::FromStr>(raw: Option<&str>) -> Option<T> {
    raw.and_then(|s| s.trim().parse().ok())
}

pub fn build_waveforms(
    dataset: &Dataset,
    query: &WaveformQuery,
    default_target: usize,
) -> Result<WaveformResponse, QueryError> {
    let meta = &dataset.metadata;
    let data = &dataset.data;
    if data.is_empty() {
        return Err(QueryError::NoData);
    }

    let analog = parse_channel_list(query.analog.as_deref());
    let digital = parse_channel_list(query.digital.as_deref());
    if analog.is_empty() && digital.is_empty() {
        return Err(QueryError::NoChannels);
    }

    let target = parse_opt::<usize>(query.target_points.as_deref())
        .filter(|v| *v > 0)
        .unwrap_or(default_target);
    let method: DownsampleMethod = match query.downsample.as_deref() {
        Some(raw) => raw.parse().map_err(QueryError::BadMethod)?,
        None => DownsampleMethod::default(),
    };

    let times = compute_time_axis(meta, &data.timestamps, data.len());
    let n = times.len();

    let default_end = DEFAULT_WINDOW_SAMPLES.max(n / DEFAULT_WINDOW_DIVISOR).min(n - 1);
    let start = parse_opt::<f32>(query.start_time.as_deref()).unwrap_or(times[0]);
    let end = parse_opt::<f32>(query.end_time.as_deref()).unwrap_or(times[default_end]);

    let indices: Vec<usize> = if (start != 0.0 || end != 0.0) && start < end {
        (0..n).filter(|&i| times[i] >= start && times[i] <= end).collect()
    } else {
        (0..n).collect()
    };
    let window_times: Vec<f32> = indices.iter().map(|&i| times[i]).collect();
    let reduce = method.applies(window_times.len(), target);
    debug!(
        "waveform window {}..{}: {} of {} points, downsample={}",
        start,
        end,
        window_times.len(),
        n,
        reduce
    );

    let mut series = Vec::with_capacity(analog.len() + digital.len());

    for ch in analog {
        let Some(samples) = data.analog.get(&ch) else {
            continue;
        };
        let descriptor = meta.analog_channel(ch);
        let (multiplier, offset) = descriptor
            .map(|d| (d.multiplier, d.offset))
            .unwrap_or((1.0, 0.0));
        let scaled = samples.scaled(multiplier, offset);
        let y: Vec<f64> = indices.iter().map(|&i| scaled[i]).collect();

        let (times, y) = match (reduce, method) {
            (false, _) => (window_times.clone(), y),
            (true, DownsampleMethod::MinMax) => downsample_minmax(&window_times, &y, target),
            (true, _) => downsample_lttb(&window_times, &y, target),
        };
        series.push(Series::Analog {
            channel: ch,
            name: descriptor.map(|d| d.name.clone()).unwrap_or_default(),
            unit: descriptor.map(|d| d.unit.clone()).unwrap_or_default(),
            times,
            y,
        });
    }

    for ch in digital {
        let Some(states) = data.digital.get(&ch) else {
            continue;
        };
        let y: Vec<u8> = indices.iter().map(|&i| states[i]).collect();
        let (times, y) = if reduce {
            downsample_digital(&window_times, &y)
        } else {
            (window_times.clone(), y)
        };
        series.push(Series::Digital {
            channel: ch,
            name: meta
                .digital_channel(ch)
                .map(|d| d.name.clone())
                .unwrap_or_default(),
            times,
            y,
        });
    }

    Ok(WaveformResponse {
        series,
        window: TimeSpan {
            start: times[0],
            end: times[n - 1],
        },
        time_range: TimeSpan { start, end },
        downsample: DownsampleInfo {
            method,
            target_points: target,
            original_points: n,
        },
    })
}

#[derive(Debug, Serialize)]
pub struct CanvasRate {
    pub samp: f64,
    pub endsamp: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasSelector<'a> {
    pub channel: u32,
    pub group_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<&'a str>,
    #[serde(rename = "AD")]
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CanvasValues<'a> {
    Analog(&'a AnalogSamples),
    Digital(&'a [u8]),
}

#[derive(Debug, Serialize)]
pub struct CanvasChannel<'a> {
    pub name: &'a str,
    pub uu: &'a str,
    pub a: f64,
    pub b: f64,
    pub ptct: f64,
    pub ps: &'a str,
    pub max: f64,
    pub min: f64,
    pub analyse: u8,
    pub y: CanvasValues<'a>,
    pub skew: f64,
}

/// Raw export for canvas-style viewers: unscaled samples plus scaling fields.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasResponse<'a> {
    pub begin_time: Option<NaiveDateTime>,
    pub sample_info: Vec<CanvasRate>,
    pub ts: &'a [i32],
    pub all_selector: Vec<CanvasSelector<'a>>,
    pub chns: Vec<CanvasChannel<'a>>,
}

pub fn build_canvas(dataset: &Dataset) -> CanvasResponse<'_> {
    let meta = &dataset.metadata;
    let data = &dataset.data;
    let mut selectors = Vec::new();
    let mut channels = Vec::new();

    for (i, ch) in meta.analog_channels.iter().enumerate() {
        selectors.push(CanvasSelector {
            channel: ch.number,
            group_name: &ch.name,
            phase: Some(ch.phase.as_str()),
            kind: "A",
        });
        let y = match data.analog.get(&(i as u32 + 1)) {
            Some(samples) => CanvasValues::Analog(samples),
            None => CanvasValues::Digital(&[]),
        };
        channels.push(CanvasChannel {
            name: &ch.name,
            uu: &ch.unit,
            a: ch.multiplier,
            b: ch.offset,
            ptct: ch.ratio(),
            ps: &ch.ps_flag,
            max: ch.max,
            min: ch.min,
            analyse: 1,
            y,
            skew: ch.skew,
        });
    }

    for (i, ch) in meta.digital_channels.iter().enumerate() {
        selectors.push(CanvasSelector {
            channel: ch.number,
            group_name: &ch.name,
            phase: None,
            kind: "D",
        });
        let states = data
            .digital
            .get(&(i as u32 + 1))
            .map(Vec::as_slice)
            .unwrap_or_default();
        channels.push(CanvasChannel {
            name: &ch.name,
            uu: "",
            a: 0.0,
            b: 0.0,
            ptct: 0.0,
            ps: "",
            max: 1.0,
            min: 1.0,
            analyse: 0,
            y: CanvasValues::Digital(states),
            skew: 0.0,
        });
    }

    CanvasResponse {
        begin_time: meta.start_time,
        sample_info: meta
            .sample_rates
            .iter()
            .map(|s| CanvasRate {
                samp: s.rate,
                endsamp: s.last_sample_num,
            })
            .collect(),
        ts: &data.timestamps,
        all_selector: selectors,
        chns: channels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::format::*;

    /// 1 kHz recording: analog ramp (raw i) scaled by 0.5 + 1, square-wave digital.
    fn dataset(n: usize) -> Dataset {
        let metadata = Metadata {
            analog_count: 1,
            digital_count: 1,
            analog_channels: vec![AnalogChannel {
                number: 1,
                name: "Ia".into(),
                unit: "A".into(),
                multiplier: 0.5,
                offset: 1.0,
                primary: 600.0,
                secondary: 5.0,
                ..Default::default()
            }],
            digital_channels: vec![DigitalChannel {
                number: 1,
                name: "Trip".into(),
                ..Default::default()
            }],
            rates_count: 1,
            sample_rates: vec![SampleRate {
                rate: 1000.0,
                last_sample_num: n,
            }],
            time_multiplier: 1.0,
            data_file_type: DataFileType::Binary,
            is_complete: true,
            ..Default::default()
        };
        let mut data = ChannelData {
            timestamps: (0..n as i32).map(|i| i * 1000).collect(),
            ..Default::default()
        };
        data.analog
            .insert(1, AnalogSamples::Int((0..n as i32).collect()));
        data.digital
            .insert(1, (0..n).map(|i| u8::from((i / 100) % 2 == 1)).collect());
        Dataset { metadata, data }
    }

    fn query(a: &str, d: &str) -> WaveformQuery {
        WaveformQuery {
            analog: Some(a.into()),
            digital: Some(d.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_requires_channels_and_data() {
        let ds = dataset(10);
        assert_eq!(
            build_waveforms(&ds, &query("", "x"), 5000).unwrap_err(),
            QueryError::NoChannels
        );
        let empty = dataset(0);
        assert_eq!(
            build_waveforms(&empty, &query("1", ""), 5000).unwrap_err(),
            QueryError::NoData
        );
    }

    #[test]
    fn test_scaling_and_window() {
        let ds = dataset(100);
        let mut q = query("1", "1");
        q.start_time = Some("10000".into());
        q.end_time = Some("12000".into());
        let resp = build_waveforms(&ds, &q, 5000).unwrap();

        assert_eq!(resp.window, TimeSpan { start: 0.0, end: 99_000.0 });
        assert_eq!(resp.time_range, TimeSpan { start: 10_000.0, end: 12_000.0 });
        match &resp.series[0] {
            Series::Analog { name, unit, times, y, .. } => {
                assert_eq!(name, "Ia");
                assert_eq!(unit, "A");
                assert_eq!(times, &vec![10_000.0, 11_000.0, 12_000.0]);
                assert_eq!(y, &vec![6.0, 6.5, 7.0]);
            }
            other => panic!("expected analog series, got {other:?}"),
        }
        assert!(matches!(resp.series[1], Series::Digital { channel: 1, .. }));
    }

    #[test]
    fn test_default_window_and_auto_downsample() {
        let ds = dataset(200_000);
        let mut q = query("1", "1");
        q.target_points = Some("1000".into());
        let resp = build_waveforms(&ds, &q, 5000).unwrap();

        // max(5000, 200000 / 20) = 10000
        assert_eq!(resp.time_range.end, 10_000_000.0);
        assert_eq!(resp.downsample.original_points, 200_000);
        assert_eq!(resp.downsample.method, DownsampleMethod::Auto);
        for s in &resp.series {
            match s {
                Series::Analog { times, y, .. } => {
                    assert!(times.len() <= 1000);
                    assert_eq!(times.len(), y.len());
                }
                Series::Digital { times, y, .. } => {
                    // 10001 points, edges every 100 samples
                    assert!(times.len() < 500);
                    assert_eq!(times.len(), y.len());
                }
            }
        }
    }

    #[test]
    fn test_none_keeps_everything_and_bad_method_fails() {
        let ds = dataset(1000);
        let mut q = query("1", "");
        q.downsample = Some("none".into());
        q.target_points = Some("10".into());
        let resp = build_waveforms(&ds, &q, 5000).unwrap();
        match &resp.series[0] {
            Series::Analog { times, .. } => assert_eq!(times.len(), 1000),
            other => panic!("unexpected {other:?}"),
        }

        q.downsample = Some("median".into());
        let err = build_waveforms(&ds, &q, 5000).unwrap_err();
        assert_eq!(err.code(), "BAD_DOWNSAMPLE_METHOD");
    }

    #[test]
    fn test_unknown_channels_are_skipped() {
        let ds = dataset(10);
        let resp = build_waveforms(&ds, &query("1,7,abc", "9"), 5000).unwrap();
        assert_eq!(resp.series.len(), 1);
    }

    #[test]
    fn test_response_json_shape() {
        let ds = dataset(10);
        let resp = build_waveforms(&ds, &query("1", "1"), 5000).unwrap();
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["series"][0]["type"], "analog");
        assert_eq!(json["series"][1]["type"], "digital");
        assert_eq!(json["downsample"]["method"], "auto");
        assert_eq!(json["downsample"]["targetPoints"], 5000);
        assert!(json["timeRange"]["start"].is_number());
    }

    #[test]
    fn test_canvas_payload() {
        let ds = dataset(4);
        let json = serde_json::to_value(build_canvas(&ds)).unwrap();
        assert_eq!(json["ts"], serde_json::json!([0, 1000, 2000, 3000]));
        assert_eq!(json["allSelector"][0]["AD"], "A");
        assert_eq!(json["allSelector"][1]["AD"], "D");
        assert!(json["allSelector"][1].get("phase").is_none());
        assert_eq!(json["chns"][0]["ptct"], 120.0);
        assert_eq!(json["chns"][0]["y"], serde_json::json!([0, 1, 2, 3]));
        assert_eq!(json["chns"][1]["analyse"], 0);
        assert_eq!(json["sampleInfo"][0]["endsamp"], 4);
    }
}
