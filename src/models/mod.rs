pub mod config_model;
pub mod dataset_model;
