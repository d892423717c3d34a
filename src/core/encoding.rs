// Text encoding detection for configuration files

use crate::core::constants::ENCODING_SNIFF_LEN;
use encoding_rs::{GBK, UTF_8};
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Gbk,
}

/// Guesses the encoding from the first bytes of the input.
///
/// A multi-byte sequence cut off by the sniff window still counts as UTF-8.
pub fn detect_encoding(data: &[u8]) -> TextEncoding {
    let sample = &data[..data.len().min(ENCODING_SNIFF_LEN)];
    match std::str::from_utf8(sample) {
        Ok(_) => TextEncoding::Utf8,
        Err(e) if e.error_len().is_none() => TextEncoding::Utf8,
        Err(_) => TextEncoding::Gbk,
    }
}

/// Decodes the whole buffer using the sniffed encoding. A leading BOM is stripped.
pub fn decode_text(data: &[u8]) -> (Cow<'_, str>, TextEncoding) {
    let encoding = detect_encoding(data);
    let decoder = match encoding {
        TextEncoding::Utf8 => UTF_8,
        TextEncoding::Gbk => GBK,
    };
    let (text, _, _) = decoder.decode(data);
    (text, encoding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_utf8() {
        let (text, enc) = decode_text("站名,DEV,1999\n".as_bytes());
        assert_eq!(enc, TextEncoding::Utf8);
        assert_eq!(text, "站名,DEV,1999\n");
    }

    #[test]
    fn test_detects_gbk() {
        let (bytes, _, _) = GBK.encode("保护电流A相,,,A\n");
        assert_eq!(detect_encoding(&bytes), TextEncoding::Gbk);

        let (text, enc) = decode_text(&bytes);
        assert_eq!(enc, TextEncoding::Gbk);
        assert_eq!(text, "保护电流A相,,,A\n");
    }

    #[test]
    fn test_split_sequence_at_window_edge_is_utf8() {
        // Differs from a strict validity check of the window, which would
        // route this input to GBK and garble an otherwise valid UTF-8 file.
        let mut data = vec![b'a'; ENCODING_SNIFF_LEN - 1];
        data.extend_from_slice("相".as_bytes());
        assert_eq!(detect_encoding(&data), TextEncoding::Utf8);

        // An invalid byte inside the window still selects GBK.
        let mut data = vec![b'a'; ENCODING_SNIFF_LEN - 2];
        data.extend_from_slice(&[0xB1, 0xA3]);
        assert_eq!(detect_encoding(&data), TextEncoding::Gbk);
    }

    #[test]
    fn test_strips_bom() {
        let mut data = vec![0xEF, 0xBB, 0xBF];
        data.extend_from_slice(b"STN,DEV,1999");
        let (text, _) = decode_text(&data);
        assert_eq!(text, "STN,DEV,1999");
    }
}
