// Sample (.dat) decoder

use crate::core::constants::*;
use crate::core::error::{ComtradeError, Result};
use crate::core::format::*;
use tracing::warn;

/// What to do with bytes left over after the last complete binary record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EofPolicy {
    /// Drop the partial record and keep everything before it.
    #[default]
    Tolerant,
    /// Fail with [`ComtradeError::TruncatedRecord`].
    Strict,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    pub eof: EofPolicy,
}

pub fn parse_dat(data: &[u8], meta: &Metadata, options: DecodeOptions) -> Result<ChannelData> {
    match &meta.data_file_type {
        DataFileType::Ascii => parse_ascii(data, meta),
        DataFileType::Binary | DataFileType::Binary32 | DataFileType::Float32 => {
            parse_binary(data, meta, options)
        }
        DataFileType::Other(kind) => Err(ComtradeError::UnsupportedDataFileType(kind.clone())),
    }
}

/// Per-channel accumulators, moved into a [`ChannelData`] once decoding ends.
struct Columns {
    timestamps: Vec<i32>,
    analog_int: Vec<Vec<i32>>,
    analog_float: Vec<Vec<f32>>,
    digital: Vec<Vec<u8>>,
}

impl Columns {
    fn new(analog: usize, digital: usize, float: bool, capacity: usize) -> Self {
        let (int_cols, float_cols) = if float { (0, analog) } else { (analog, 0) };
        Self {
            timestamps: Vec::with_capacity(capacity),
            analog_int: (0..int_cols).map(|_| Vec::with_capacity(capacity)).collect(),
            analog_float: (0..float_cols).map(|_| Vec::with_capacity(capacity)).collect(),
            digital: (0..digital).map(|_| Vec::with_capacity(capacity)).collect(),
        }
    }

    fn into_channel_data(self) -> ChannelData {
        let mut out = ChannelData {
            timestamps: self.timestamps,
            ..Default::default()
        };
        if out.timestamps.is_empty() {
            return out;
        }
        for (i, v) in self.analog_int.into_iter().enumerate() {
            out.analog.insert(i as u32 + 1, AnalogSamples::Int(v));
        }
        for (i, v) in self.analog_float.into_iter().enumerate() {
            out.analog.insert(i as u32 + 1, AnalogSamples::Float(v));
        }
        for (i, v) in self.digital.into_iter().enumerate() {
            out.digital.insert(i as u32 + 1, v);
        }
        out
    }
}

fn parse_ascii(data: &[u8], meta: &Metadata) -> Result<ChannelData> {
    let na = meta.analog_count;
    let nd = meta.digital_count;
    let text = String::from_utf8_lossy(data);
    let mut cols = Columns::new(na, nd, true, 0);

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        if parts.len() < 2 + na + nd {
            return Err(ComtradeError::Sample {
                line: line_no,
                message: format!("expected at least {} fields, got {}", 2 + na + nd, parts.len()),
            });
        }

        let bad = |what: String, raw: &str| ComtradeError::Sample {
            line: line_no,
            message: format!("parse {what}: {raw:?}"),
        };

        parts[0]
            .parse::<u32>()
            .map_err(|_| bad("sample index".into(), parts[0]))?;
        let ts = parts[1]
            .parse::<i32>()
            .map_err(|_| bad("timestamp".into(), parts[1]))?;

        // Parse the whole line before committing anything.
        let mut analog = Vec::with_capacity(na);
        for i in 0..na {
            let raw = parts[2 + i];
            let value = raw
                .parse::<f64>()
                .map_err(|_| bad(format!("analog ch {}", i + 1), raw))?;
            analog.push(value as f32);
        }
        let mut digital = Vec::with_capacity(nd);
        for i in 0..nd {
            let raw = parts[2 + na + i];
            let value = raw
                .parse::<i64>()
                .map_err(|_| bad(format!("digital ch {}", i + 1), raw))?;
            digital.push(u8::from(value != 0));
        }

        cols.timestamps.push(ts);
        for (col, v) in cols.analog_float.iter_mut().zip(analog) {
            col.push(v);
        }
        for (col, v) in cols.digital.iter_mut().zip(digital) {
            col.push(v);
        }
    }

    Ok(cols.into_channel_data())
}

/// Byte size of one binary record for the given metadata.
pub fn binary_record_size(meta: &Metadata) -> Option<usize> {
    let width = meta.data_file_type.analog_width()?;
    Some(
        RECORD_PREFIX_SIZE
            + meta.analog_count * width
            + digital_word_count(meta.digital_count) * DIGITAL_WORD_SIZE,
    )
}

pub fn digital_word_count(digital_count: usize) -> usize {
    digital_count.div_ceil(DIGITAL_BITS_PER_WORD)
}

fn parse_binary(data: &[u8], meta: &Metadata, options: DecodeOptions) -> Result<ChannelData> {
    let kind = &meta.data_file_type;
    let record_size = binary_record_size(meta)
        .ok_or_else(|| ComtradeError::UnsupportedDataFileType(kind.as_str().to_string()))?;
    let na = meta.analog_count;
    let nd = meta.digital_count;
    let words = digital_word_count(nd);

    let records = data.len() / record_size;
    let leftover = data.len() % record_size;
    if leftover > 0 {
        match options.eof {
            EofPolicy::Strict => {
                return Err(ComtradeError::TruncatedRecord {
                    record: records + 1,
                    expected: record_size,
                    available: leftover,
                })
            }
            EofPolicy::Tolerant => warn!(
                "discarding partial record {} ({} of {} bytes)",
                records + 1,
                leftover,
                record_size
            ),
        }
    }

    let float = *kind == DataFileType::Float32;
    let mut cols = Columns::new(na, nd, float, records);
    let mut packed = vec![0u16; words];

    for record in data.chunks_exact(record_size) {
        let mut cur = RecordCursor::new(record);
        let _sample_index = cur.u32();
        cols.timestamps.push(cur.i32());

        for ch in 0..na {
            match kind {
                DataFileType::Binary => cols.analog_int[ch].push(cur.i16() as i32),
                DataFileType::Binary32 => cols.analog_int[ch].push(cur.i32()),
                _ => cols.analog_float[ch].push(cur.f32()),
            }
        }

        for word in packed.iter_mut() {
            *word = cur.u16();
        }
        for (d, col) in cols.digital.iter_mut().enumerate() {
            let word = packed[d / DIGITAL_BITS_PER_WORD];
            let bit = (word >> (d % DIGITAL_BITS_PER_WORD)) & 1;
            col.push(bit as u8);
        }
    }

    Ok(cols.into_channel_data())
}

/// Little-endian reader over one complete record.
struct RecordCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> RecordCursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    fn i16(&mut self) -> i16 {
        i16::from_le_bytes(self.take())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take())
    }

    fn f32(&mut self) -> f32 {
        f32::from_le_bytes(self.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(kind: DataFileType, na: usize, nd: usize) -> Metadata {
        Metadata {
            revision: Revision::Rev1999,
            analog_count: na,
            digital_count: nd,
            data_file_type: kind,
            ..Default::default()
        }
    }

    /// Assembles one binary record; `analog` is written with the file type's width.
    fn record(kind: &DataFileType, n: u32, ts: i32, analog: &[f64], digital: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&n.to_le_bytes());
        out.extend_from_slice(&ts.to_le_bytes());
        for v in analog {
            match kind {
                DataFileType::Binary => out.extend_from_slice(&(*v as i16).to_le_bytes()),
                DataFileType::Binary32 => out.extend_from_slice(&(*v as i32).to_le_bytes()),
                _ => out.extend_from_slice(&(*v as f32).to_le_bytes()),
            }
        }
        let mut words = vec![0u16; digital_word_count(digital.len())];
        for (d, state) in digital.iter().enumerate() {
            if *state != 0 {
                words[d / 16] |= 1 << (d % 16);
            }
        }
        for w in words {
            out.extend_from_slice(&w.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_binary_variants_reproduce_values() {
        let rows: [(&[f64], &[u8]); 3] = [
            (&[100.0, -200.0], &[1, 0, 1]),
            (&[-32768.0, 32767.0], &[0, 0, 0]),
            (&[7.0, 0.0], &[1, 1, 0]),
        ];
        for kind in [DataFileType::Binary, DataFileType::Binary32, DataFileType::Float32] {
            let m = meta(kind.clone(), 2, 3);
            let mut bytes = Vec::new();
            for (i, (a, d)) in rows.iter().enumerate() {
                bytes.extend(record(&kind, i as u32 + 1, i as i32 * 250, a, d));
            }

            let data = parse_dat(&bytes, &m, DecodeOptions::default()).unwrap();
            assert_eq!(data.timestamps, vec![0, 250, 500]);
            for ch in 1..=2u32 {
                let expected: Vec<f64> = rows.iter().map(|(a, _)| a[ch as usize - 1]).collect();
                let got: Vec<f64> = (0..3).map(|i| data.analog[&ch].get(i).unwrap()).collect();
                assert_eq!(got, expected, "{kind:?} ch {ch}");
            }
            assert_eq!(data.digital[&1], vec![1, 0, 1]);
            assert_eq!(data.digital[&2], vec![0, 0, 1]);
            assert_eq!(data.digital[&3], vec![1, 0, 0]);
            match (&kind, &data.analog[&1]) {
                (DataFileType::Float32, AnalogSamples::Float(_)) => {}
                (DataFileType::Binary | DataFileType::Binary32, AnalogSamples::Int(_)) => {}
                other => panic!("unexpected sample kind {other:?}"),
            }
        }
    }

    #[test]
    fn test_twenty_digital_channels_use_two_words() {
        let kind = DataFileType::Binary;
        let m = meta(kind.clone(), 0, 20);
        assert_eq!(binary_record_size(&m), Some(8 + 2 * 2));

        let mut states = [0u8; 20];
        states[17] = 1;
        let bytes = record(&kind, 1, 0, &[], &states);
        assert_eq!(bytes.len(), 12);
        // word 1, bit 1
        assert_eq!(u16::from_le_bytes([bytes[10], bytes[11]]), 0b10);

        let data = parse_dat(&bytes, &m, DecodeOptions::default()).unwrap();
        for d in 1..=20u32 {
            let expected = u8::from(d == 18);
            assert_eq!(data.digital[&d], vec![expected], "channel {d}");
        }
    }

    #[test]
    fn test_partial_record_tolerant_and_strict() {
        let kind = DataFileType::Binary32;
        let m = meta(kind.clone(), 2, 0);
        let mut bytes = record(&kind, 1, 10, &[1.0, 2.0], &[]);
        bytes.extend(record(&kind, 2, 20, &[3.0, 4.0], &[]));
        // index, timestamp and half of the analog fields
        bytes.extend(&record(&kind, 3, 30, &[5.0, 6.0], &[])[..12]);

        let data = parse_dat(&bytes, &m, DecodeOptions::default()).unwrap();
        assert_eq!(data.timestamps, vec![10, 20]);
        assert_eq!(data.analog[&1], AnalogSamples::Int(vec![1, 3]));
        assert_eq!(data.analog[&2], AnalogSamples::Int(vec![2, 4]));

        let strict = DecodeOptions { eof: EofPolicy::Strict };
        let err = parse_dat(&bytes, &m, strict).unwrap_err();
        assert!(matches!(
            err,
            ComtradeError::TruncatedRecord { record: 3, expected: 16, available: 12 }
        ));
    }

    #[test]
    fn test_empty_file_has_no_channels() {
        let m = meta(DataFileType::Binary, 2, 1);
        let data = parse_dat(&[], &m, DecodeOptions::default()).unwrap();
        assert!(data.is_empty());
        assert!(data.analog.is_empty());
        assert!(data.digital.is_empty());
    }

    #[test]
    fn test_ascii() {
        let m = meta(DataFileType::Ascii, 2, 2);
        let text = "1,0,1.5,-2,0,1\n\n2, 1000 , 3.25,4e1,5,0\r\n";
        let data = parse_dat(text.as_bytes(), &m, DecodeOptions::default()).unwrap();
        assert_eq!(data.timestamps, vec![0, 1000]);
        assert_eq!(data.analog[&1], AnalogSamples::Float(vec![1.5, 3.25]));
        assert_eq!(data.analog[&2], AnalogSamples::Float(vec![-2.0, 40.0]));
        assert_eq!(data.digital[&1], vec![0, 1]);
        assert_eq!(data.digital[&2], vec![1, 0]);
    }

    #[test]
    fn test_ascii_short_line_fails() {
        let m = meta(DataFileType::Ascii, 2, 1);
        let err = parse_dat(b"1,0,1.0,2.0,0\n2,1,1.0\n", &m, DecodeOptions::default()).unwrap_err();
        assert!(matches!(err, ComtradeError::Sample { line: 2, .. }));
    }

    #[test]
    fn test_ascii_bad_value_fails() {
        let m = meta(DataFileType::Ascii, 1, 0);
        let err = parse_dat(b"1,0,x\n", &m, DecodeOptions::default()).unwrap_err();
        assert!(err.to_string().contains("analog ch 1"));
    }

    #[test]
    fn test_unsupported_type() {
        let m = meta(DataFileType::Other("hex".into()), 1, 0);
        let err = parse_dat(b"", &m, DecodeOptions::default()).unwrap_err();
        assert!(matches!(err, ComtradeError::UnsupportedDataFileType(ref t) if t == "hex"));
    }
}
