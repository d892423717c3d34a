// Configuration (.cfg) parser
//
// Lines are consumed by an explicit state machine. Channel states whose
// declared count is zero are jumped over when the count line is read.

use crate::core::constants::*;
use crate::core::error::{ComtradeError, Result};
use crate::core::format::*;
use chrono::NaiveDateTime;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CfgState {
    Station,
    ChannelCount,
    AnalogChannel,
    DigitalChannel,
    Frequency,
    RatesCount,
    SampleRate,
    StartTime,
    EndTime,
    DataFileType,
    TimeMultiplier,
    Done,
}

pub struct CfgParser {
    meta: Metadata,
    state: CfgState,
    line_no: usize,
}

impl Default for CfgParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CfgParser {
    pub fn new() -> Self {
        Self {
            meta: Metadata::default(),
            state: CfgState::Station,
            line_no: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == CfgState::Done
    }

    /// Feeds one line. Whitespace-only lines are skipped.
    pub fn feed_line(&mut self, line: &str) -> Result<()> {
        self.line_no += 1;
        if line.trim().is_empty() {
            return Ok(());
        }
        let parts = split_and_trim(line);

        self.state = match self.state {
            CfgState::Station => self.station(line, &parts)?,
            CfgState::ChannelCount => self.channel_count(line, &parts)?,
            CfgState::AnalogChannel => self.analog_channel(line, &parts)?,
            CfgState::DigitalChannel => self.digital_channel(line, &parts)?,
            CfgState::Frequency => {
                self.meta.frequency = self.field(&parts, 0, "frequency")?;
                CfgState::RatesCount
            }
            CfgState::RatesCount => {
                self.meta.rates_count = self.field(&parts, 0, "rates count")?;
                CfgState::SampleRate
            }
            CfgState::SampleRate => self.sample_rate(line, &parts)?,
            CfgState::StartTime => {
                self.meta.start_time = Some(self.timestamp(line, &parts, "start time")?);
                CfgState::EndTime
            }
            CfgState::EndTime => {
                self.meta.end_time = Some(self.timestamp(line, &parts, "end time")?);
                CfgState::DataFileType
            }
            CfgState::DataFileType => {
                self.meta.data_file_type = DataFileType::parse(parts[0]);
                CfgState::TimeMultiplier
            }
            CfgState::TimeMultiplier => {
                self.meta.time_multiplier = self.field(&parts, 0, "time multiplier")?;
                CfgState::Done
            }
            CfgState::Done => {
                return Err(ComtradeError::UnexpectedTrailingLine {
                    line: self.line_no,
                    text: line.to_string(),
                })
            }
        };
        Ok(())
    }

    pub fn finish(mut self) -> Metadata {
        self.meta.is_complete = self.is_complete();
        self.meta
    }

    /// Like [`CfgParser::finish`], but input that stopped short is a format error.
    pub fn finish_complete(self) -> Result<Metadata> {
        if !self.is_complete() {
            return Err(ComtradeError::Format {
                line: self.line_no + 1,
                what: "configuration",
                text: format!("input ended while expecting {:?}", self.state),
            });
        }
        Ok(self.finish())
    }

    fn station(&mut self, line: &str, parts: &[&str]) -> Result<CfgState> {
        if parts.len() < STATION_FIELDS {
            return Err(ComtradeError::format(self.line_no, "station line", line));
        }
        self.meta.station = parts[0].to_string();
        self.meta.device = parts[1].to_string();

        let tag = match parts[2] {
            "" => SUPPORTED_REVISIONS[0],
            tag => tag,
        };
        self.meta.revision = Revision::from_tag(tag)
            .ok_or_else(|| ComtradeError::UnsupportedRevision(tag.to_string()))?;
        Ok(CfgState::ChannelCount)
    }

    fn channel_count(&mut self, line: &str, parts: &[&str]) -> Result<CfgState> {
        if parts.len() < CHANNEL_COUNT_FIELDS {
            return Err(ComtradeError::format(self.line_no, "channel count line", line));
        }
        self.meta.total_channels = self.field(parts, 0, "total channel count")?;
        self.meta.analog_count = self.suffixed_count(parts[1], 'A', "analog channel count")?;
        self.meta.digital_count = self.suffixed_count(parts[2], 'D', "digital channel count")?;

        Ok(self.first_channel_state())
    }

    fn analog_channel(&mut self, line: &str, parts: &[&str]) -> Result<CfgState> {
        if parts.len() < ANALOG_CHANNEL_FIELDS {
            return Err(ComtradeError::format(self.line_no, "analog channel line", line));
        }
        let channel = AnalogChannel {
            number: self.field(parts, 0, "analog channel number")?,
            name: parts[1].to_string(),
            phase: parts[2].to_string(),
            circuit: parts[3].to_string(),
            unit: parts[4].to_string(),
            multiplier: self.field(parts, 5, "analog multiplier")?,
            offset: self.field(parts, 6, "analog offset")?,
            skew: self.field(parts, 7, "analog skew")?,
            min: self.field(parts, 8, "analog min value")?,
            max: self.field(parts, 9, "analog max value")?,
            primary: self.field(parts, 10, "analog primary")?,
            secondary: self.field(parts, 11, "analog secondary")?,
            ps_flag: parts[12].to_string(),
        };
        self.meta.analog_channels.push(channel);

        if self.meta.analog_channels.len() < self.meta.analog_count {
            Ok(CfgState::AnalogChannel)
        } else {
            Ok(self.digital_or_frequency())
        }
    }

    fn digital_channel(&mut self, line: &str, parts: &[&str]) -> Result<CfgState> {
        if parts.len() < DIGITAL_CHANNEL_FIELDS {
            return Err(ComtradeError::format(self.line_no, "digital channel line", line));
        }
        let channel = DigitalChannel {
            number: self.field(parts, 0, "digital channel number")?,
            name: parts[1].to_string(),
            phase: parts[2].to_string(),
            circuit: parts[3].to_string(),
            normal_state: self.field(parts, 4, "digital normal state")?,
        };
        self.meta.digital_channels.push(channel);

        if self.meta.digital_channels.len() < self.meta.digital_count {
            Ok(CfgState::DigitalChannel)
        } else {
            Ok(CfgState::Frequency)
        }
    }

    // A zero rates count still carries one `0,endsamp` line.
    fn sample_rate(&mut self, line: &str, parts: &[&str]) -> Result<CfgState> {
        if parts.len() < SAMPLE_RATE_FIELDS {
            return Err(ComtradeError::format(self.line_no, "sample rate line", line));
        }
        let segment = SampleRate {
            rate: self.field(parts, 0, "sample rate")?,
            last_sample_num: self.field(parts, 1, "last sample number")?,
        };
        if let Some(prev) = self.meta.sample_rates.last() {
            if segment.last_sample_num < prev.last_sample_num {
                return Err(ComtradeError::format(
                    self.line_no,
                    "last sample number (decreasing)",
                    line,
                ));
            }
        }
        self.meta.sample_rates.push(segment);

        if self.meta.sample_rates.len() < self.meta.rates_count.max(1) {
            Ok(CfgState::SampleRate)
        } else {
            Ok(CfgState::StartTime)
        }
    }

    fn first_channel_state(&self) -> CfgState {
        if self.meta.analog_count > 0 {
            CfgState::AnalogChannel
        } else {
            self.digital_or_frequency()
        }
    }

    fn digital_or_frequency(&self) -> CfgState {
        if self.meta.digital_count > 0 {
            CfgState::DigitalChannel
        } else {
            CfgState::Frequency
        }
    }

    fn field<T: FromStr>(&self, parts: &[&str], index: usize, what: &'static str) -> Result<T> {
        let raw = parts.get(index).copied().unwrap_or_default();
        raw.parse()
            .map_err(|_| ComtradeError::format(self.line_no, what, raw))
    }

    fn suffixed_count(&self, raw: &str, suffix: char, what: &'static str) -> Result<usize> {
        raw.strip_suffix(suffix)
            .or_else(|| raw.strip_suffix(suffix.to_ascii_lowercase()))
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| ComtradeError::format(self.line_no, what, raw))
    }

    fn timestamp(&self, line: &str, parts: &[&str], what: &'static str) -> Result<NaiveDateTime> {
        if parts.len() < 2 {
            return Err(ComtradeError::format(self.line_no, what, line));
        }
        let joined = format!("{},{}", parts[0], parts[1]);
        NaiveDateTime::parse_from_str(&joined, TIMESTAMP_FORMAT)
            .map_err(|_| ComtradeError::format(self.line_no, what, line))
    }
}

fn split_and_trim(line: &str) -> Vec<&str> {
    line.split(',').map(str::trim).collect()
}

/// Parses decoded configuration text.
///
/// Input that stops before the time-multiplier line still succeeds; check
/// [`Metadata::is_complete`].
pub fn parse_cfg(text: &str) -> Result<Metadata> {
    let mut parser = CfgParser::new();
    for line in text.lines() {
        parser.feed_line(line)?;
    }
    Ok(parser.finish())
}

/// Parses decoded configuration text that must run through the time-multiplier line.
pub fn parse_complete_cfg(text: &str) -> Result<Metadata> {
    let mut parser = CfgParser::new();
    for line in text.lines() {
        parser.feed_line(line)?;
    }
    parser.finish_complete()
}
