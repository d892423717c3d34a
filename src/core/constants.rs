// Format constants for COMTRADE

/// Revision tags accepted on the station line, oldest first.
pub const SUPPORTED_REVISIONS: [&str; 3] = ["1991", "1999", "2013"];

/// Bytes inspected when sniffing the configuration file encoding.
pub const ENCODING_SNIFF_LEN: usize = 128;

// Start/end time layout: dd/mm/yyyy,hh:mm:ss.ffffff
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y,%H:%M:%S%.f";

// Field counts per configuration line
pub const STATION_FIELDS: usize = 3;
pub const CHANNEL_COUNT_FIELDS: usize = 3;
pub const ANALOG_CHANNEL_FIELDS: usize = 13;
pub const DIGITAL_CHANNEL_FIELDS: usize = 5;
pub const SAMPLE_RATE_FIELDS: usize = 2;

// Binary record prefix: sample index(u32) timestamp(i32)
pub const RECORD_PREFIX_SIZE: usize = 4 + 4;

// Digital states are packed 16 per u16 word
pub const DIGITAL_BITS_PER_WORD: usize = 16;
pub const DIGITAL_WORD_SIZE: usize = 2;

/// Substituted for non-positive sample rates.
pub const DEFAULT_SAMPLE_RATE: f64 = 50.0;

/// Substituted for a zero time multiplier.
pub const DEFAULT_TIME_MULTIPLIER: f64 = 1.0;

pub const MICROS_PER_SECOND: f64 = 1e6;

pub const DEFAULT_TARGET_POINTS: usize = 5000;

// Default viewport ends at sample max(DEFAULT_WINDOW_SAMPLES, n / DEFAULT_WINDOW_DIVISOR)
pub const DEFAULT_WINDOW_SAMPLES: usize = 5000;
pub const DEFAULT_WINDOW_DIVISOR: usize = 20;
