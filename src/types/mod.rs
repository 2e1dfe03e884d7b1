pub mod api;
pub mod manifest;
pub mod models;
pub mod timestamp;
