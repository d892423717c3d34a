pub mod auth;
pub mod data_routes;
pub mod info_routes;
