// Data structures for COMTRADE recordings

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Revision {
    #[default]
    #[serde(rename = "1991")]
    Rev1991,
    #[serde(rename = "1999")]
    Rev1999,
    #[serde(rename = "2013")]
    Rev2013,
}

impl Revision {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "1991" => Some(Revision::Rev1991),
            "1999" => Some(Revision::Rev1999),
            "2013" => Some(Revision::Rev2013),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Revision::Rev1991 => "1991",
            Revision::Rev1999 => "1999",
            Revision::Rev2013 => "2013",
        }
    }
}

/// Sample file layout named on the data-file-type line.
///
/// Unknown tokens are kept as `Other` so the configuration still loads;
/// the sample decoder rejects them. A configuration that never reaches the
/// data-file-type line leaves it as an empty `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataFileType {
    Ascii,
    Binary,
    Binary32,
    Float32,
    Other(String),
}

impl Default for DataFileType {
    fn default() -> Self {
        DataFileType::Other(String::new())
    }
}

impl DataFileType {
    pub fn parse(token: &str) -> Self {
        let token = token.to_lowercase();
        match token.as_str() {
            "ascii" => DataFileType::Ascii,
            "binary" => DataFileType::Binary,
            "binary32" => DataFileType::Binary32,
            "float32" => DataFileType::Float32,
            _ => DataFileType::Other(token),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DataFileType::Ascii => "ascii",
            DataFileType::Binary => "binary",
            DataFileType::Binary32 => "binary32",
            DataFileType::Float32 => "float32",
            DataFileType::Other(s) => s,
        }
    }

    /// Width in bytes of one analog value, `None` for ascii and unknown types.
    pub fn analog_width(&self) -> Option<usize> {
        match self {
            DataFileType::Binary => Some(2),
            DataFileType::Binary32 | DataFileType::Float32 => Some(4),
            DataFileType::Ascii | DataFileType::Other(_) => None,
        }
    }
}

impl Serialize for DataFileType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalogChannel {
    #[serde(rename = "id")]
    pub number: u32,
    pub name: String,
    pub phase: String,
    #[serde(rename = "ccbm")]
    pub circuit: String,
    pub unit: String,
    pub multiplier: f64,
    pub offset: f64,
    pub skew: f64,
    #[serde(rename = "minValue")]
    pub min: f64,
    #[serde(rename = "maxValue")]
    pub max: f64,
    pub primary: f64,
    pub secondary: f64,
    #[serde(rename = "ps")]
    pub ps_flag: String,
}

impl AnalogChannel {
    /// Primary/secondary ratio, zero when the secondary is unset.
    pub fn ratio(&self) -> f64 {
        if self.secondary == 0.0 {
            0.0
        } else {
            self.primary / self.secondary
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DigitalChannel {
    #[serde(rename = "id")]
    pub number: u32,
    pub name: String,
    pub phase: String,
    #[serde(rename = "ccbm")]
    pub circuit: String,
    #[serde(rename = "y")]
    pub normal_state: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleRate {
    #[serde(rename = "sampRate")]
    pub rate: f64,
    pub last_sample_num: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub station: String,
    #[serde(rename = "relay")]
    pub device: String,
    #[serde(rename = "version")]
    pub revision: Revision,
    #[serde(rename = "totalChannelNum")]
    pub total_channels: usize,
    #[serde(rename = "analogChannelNum")]
    pub analog_count: usize,
    #[serde(rename = "digitalChannelNum")]
    pub digital_count: usize,
    pub analog_channels: Vec<AnalogChannel>,
    pub digital_channels: Vec<DigitalChannel>,
    pub frequency: f64,
    #[serde(rename = "ratesNum")]
    pub rates_count: usize,
    pub sample_rates: Vec<SampleRate>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub data_file_type: DataFileType,
    pub time_multiplier: f64,
    /// False when the configuration ended before the time-multiplier line.
    pub is_complete: bool,
}

impl Metadata {
    pub fn analog_channel(&self, number: u32) -> Option<&AnalogChannel> {
        self.analog_channels.get((number as usize).checked_sub(1)?)
    }

    pub fn digital_channel(&self, number: u32) -> Option<&DigitalChannel> {
        self.digital_channels.get((number as usize).checked_sub(1)?)
    }
}

/// Raw values of one analog channel, integer or float depending on the file type.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalogSamples {
    Int(Vec<i32>),
    Float(Vec<f32>),
}

impl AnalogSamples {
    pub fn len(&self) -> usize {
        match self {
            AnalogSamples::Int(v) => v.len(),
            AnalogSamples::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> Option<f64> {
        match self {
            AnalogSamples::Int(v) => v.get(i).map(|x| *x as f64),
            AnalogSamples::Float(v) => v.get(i).map(|x| *x as f64),
        }
    }

    /// Engineering values `raw * multiplier + offset`.
    pub fn scaled(&self, multiplier: f64, offset: f64) -> Vec<f64> {
        match self {
            AnalogSamples::Int(v) => v.iter().map(|x| *x as f64 * multiplier + offset).collect(),
            AnalogSamples::Float(v) => v.iter().map(|x| *x as f64 * multiplier + offset).collect(),
        }
    }
}

impl Serialize for AnalogSamples {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            AnalogSamples::Int(v) => v.serialize(serializer),
            AnalogSamples::Float(v) => v.serialize(serializer),
        }
    }
}

/// Decoded sample file, keyed by 1-based channel index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelData {
    pub timestamps: Vec<i32>,
    pub analog: BTreeMap<u32, AnalogSamples>,
    pub digital: BTreeMap<u32, Vec<u8>>,
}

impl ChannelData {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}
