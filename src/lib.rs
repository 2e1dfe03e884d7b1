//! Hosting and distribution service for game modpacks.

pub mod cli;
pub mod config;
pub mod endpoints;
pub mod extractors;
pub mod hashing;
pub mod integration;
pub mod jobs;
pub mod logging;
pub mod modpack_zip;
pub mod modpacks;
pub mod store;
pub mod types;

#[cfg(test)]
mod test_support;

pub use config::AppData;
