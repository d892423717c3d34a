// Parsing pipeline entry points

use crate::core::cfg::{parse_cfg, parse_complete_cfg};
use crate::core::dat::{parse_dat, DecodeOptions};
use crate::core::encoding::decode_text;
use crate::core::error::{Result, Stage};
use crate::core::format::{ChannelData, Metadata};
use tracing::{debug, warn};

/// Parses configuration file bytes in either UTF-8 or GBK.
pub fn parse_metadata(cfg_bytes: &[u8]) -> Result<Metadata> {
    let (text, encoding) = decode_text(cfg_bytes);
    debug!("cfg decoded as {:?}", encoding);
    let meta = parse_cfg(&text)?;
    if !meta.is_complete {
        warn!("configuration ended before the time multiplier line");
    }
    Ok(meta)
}

/// Like [`parse_metadata`], but a configuration that stops short is an error.
pub fn parse_complete_metadata(cfg_bytes: &[u8]) -> Result<Metadata> {
    let (text, encoding) = decode_text(cfg_bytes);
    debug!("cfg decoded as {:?}", encoding);
    parse_complete_cfg(&text)
}

pub fn parse_samples(dat_bytes: &[u8], meta: &Metadata) -> Result<ChannelData> {
    parse_samples_with(dat_bytes, meta, DecodeOptions::default())
}

pub fn parse_samples_with(
    dat_bytes: &[u8],
    meta: &Metadata,
    options: DecodeOptions,
) -> Result<ChannelData> {
    let data = parse_dat(dat_bytes, meta, options)?;
    debug!(
        "decoded {} samples ({} analog, {} digital channels)",
        data.len(),
        data.analog.len(),
        data.digital.len()
    );
    Ok(data)
}

/// Parses both files. Errors are tagged with the file they came from.
///
/// Samples are only decoded against a complete configuration.
pub fn parse_comtrade(cfg_bytes: &[u8], dat_bytes: &[u8]) -> Result<(Metadata, ChannelData)> {
    let meta = parse_complete_metadata(cfg_bytes).map_err(|e| e.in_stage(Stage::Cfg))?;
    let data = parse_samples(dat_bytes, &meta).map_err(|e| e.in_stage(Stage::Dat))?;
    Ok((meta, data))
}

/// Convenience wrapper reading both files from disk.
pub fn read_comtrade_files<P: AsRef<std::path::Path>>(
    cfg_path: P,
    dat_path: P,
) -> Result<(Metadata, ChannelData)> {
    let cfg = std::fs::read(cfg_path)?;
    let dat = std::fs::read(dat_path)?;
    parse_comtrade(&cfg, &dat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::format::AnalogSamples;
    use encoding_rs::GBK;

    const CFG: &str = "变电站,DEV,1999\n2,1A,1D\n1,保护电流A相,,,A,0.5,1.0,0,-100,100,1,1,P\n1,总启动,,,0\n50.0\n1\n1000.0,10\n01/01/2024,00:00:00.000000\n01/01/2024,00:00:00.010000\nASCII\n1.0\n";

    #[test]
    fn test_gbk_cfg_with_ascii_dat() {
        let (cfg, _, _) = GBK.encode(CFG);
        let dat = b"1,0,10,1\n2,1000,20,0\n";
        let (meta, data) = parse_comtrade(&cfg, dat).unwrap();
        assert_eq!(meta.station, "变电站");
        assert_eq!(meta.analog_channels[0].name, "保护电流A相");
        assert_eq!(meta.digital_channels[0].name, "总启动");
        assert_eq!(data.analog[&1], AnalogSamples::Float(vec![10.0, 20.0]));
        assert_eq!(data.digital[&1], vec![1, 0]);
    }

    #[test]
    fn test_columns_keyed_by_position_not_channel_number() {
        let cfg = CFG.replace("1,保护电流A相", "7,保护电流A相").replace("1,总启动", "0,总启动");
        let (meta, data) = parse_comtrade(cfg.as_bytes(), b"1,0,10,1\n").unwrap();
        assert_eq!(meta.analog_channels[0].number, 7);
        assert_eq!(meta.digital_channels[0].number, 0);
        assert_eq!(data.analog.keys().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(data.digital.keys().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_errors_are_tagged_by_file() {
        let err = parse_comtrade(b"S,D,1850\n", b"").unwrap_err();
        assert_eq!(err.code(), "VERSION_UNSUPPORTED");

        let err = parse_comtrade(CFG.as_bytes(), b"1,0\n").unwrap_err();
        assert_eq!(err.code(), "DAT_PARSE_FAILED");

        let err = parse_comtrade(b"S,D,1999\n1,zA,0D\n", b"").unwrap_err();
        assert_eq!(err.code(), "CFG_PARSE_FAILED");
    }

    #[test]
    fn test_truncated_cfg_does_not_decode_samples() {
        let truncated: String = CFG.lines().take(3).map(|l| format!("{l}\n")).collect();
        let (cfg, _, _) = GBK.encode(&truncated);
        assert!(!parse_metadata(&cfg).unwrap().is_complete);

        let err = parse_comtrade(&cfg, b"1,0,5,0\n2,1,6,1\n").unwrap_err();
        assert_eq!(err.code(), "CFG_PARSE_FAILED");
        assert!(err.to_string().starts_with("failed to parse CFG data"));

        let err = parse_comtrade(b"S,D,1999\n1,20000000A,0D\n", b"").unwrap_err();
        assert_eq!(err.code(), "CFG_PARSE_FAILED");
    }
}
