use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::timestamp;

/// One entry of the repository-wide metadata file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModpackRecord {
    pub id: String,
    pub name: String,
    pub version: String,
    pub mc_versions: Vec<String>,
    pub author: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modloader: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub download_count: u64,
    #[serde(default)]
    pub mod_count: usize,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub file_hash: String,
    #[serde(default)]
    pub download_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

/// What a freshly uploaded or built archive declares about itself.
#[derive(Debug, Clone)]
pub struct Release {
    pub id: String,
    pub name: String,
    pub version: String,
    pub mc_versions: Vec<String>,
    pub author: String,
    pub description: String,
    pub modloader: Option<String>,
    pub mod_count: usize,
}

impl ModpackRecord {
    pub fn create(release: Release, now: DateTime<Utc>) -> ModpackRecord {
        ModpackRecord {
            id: release.id,
            name: release.name,
            version: release.version,
            mc_versions: release.mc_versions,
            author: release.author,
            description: release.description,
            modloader: release.modloader,
            created_at: now,
            updated_at: now,
            download_count: 0,
            mod_count: release.mod_count,
            file_size: 0,
            file_hash: String::new(),
            download_url: String::new(),
            icon_url: None,
        }
    }

    /// Refreshes the fields a new release of an existing modpack may change.
    pub fn apply_release(&mut self, release: Release, now: DateTime<Utc>) {
        self.version = release.version;
        self.mc_versions = release.mc_versions;
        self.updated_at = now;
        self.mod_count = release.mod_count;
    }
}

pub fn download_url(id: &str) -> String {
    format!("/api/modpacks/{id}/download")
}

pub fn icon_url(id: &str) -> String {
    format!("/api/modpacks/{id}/icon")
}
