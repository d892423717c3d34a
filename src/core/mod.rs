pub mod cache;
pub mod cfg;
pub mod constants;
pub mod dat;
pub mod data_handle;
pub mod downsample;
pub mod encoding;
pub mod error;
pub mod format;
pub mod reader;
pub mod timeaxis;
