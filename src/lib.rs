// COMTRADE reader
// Main library entry point

pub mod core;

// Re-export main types
pub use core::cache::{Dataset, DatasetCache};
pub use core::dat::{DecodeOptions, EofPolicy};
pub use core::data_handle::{build_canvas, build_waveforms, QueryError, WaveformQuery};
pub use core::downsample::{downsample_digital, downsample_lttb, downsample_minmax, DownsampleMethod};
pub use core::error::{ComtradeError, Result, Stage};
pub use core::format::{AnalogSamples, ChannelData, DataFileType, Metadata, Revision};
pub use core::reader::{parse_comtrade, parse_complete_metadata, parse_metadata, parse_samples, parse_samples_with, read_comtrade_files};
pub use core::timeaxis::compute_time_axis;

#[cfg(test)]
mod tests {
    #[test]
    fn test_constants() {
        use crate::core::constants::*;
        assert_eq!(SUPPORTED_REVISIONS, ["1991", "1999", "2013"]);
        assert_eq!(RECORD_PREFIX_SIZE, 8);
    }
}
