use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the manifest document at the root of every modpack archive.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Keys an archive manifest must declare, in the order they are checked.
pub const REQUIRED_FIELDS: [&str; 6] = [
    "id",
    "name",
    "version",
    "mc_versions",
    "author",
    "description",
];

// Identifiers double as directory names under the storage root.
static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("identifier pattern is valid"));

pub fn is_valid_identifier(id: &str) -> bool {
    IDENTIFIER.is_match(id)
}

/// Returns the first of `fields` that `object` does not contain.
pub fn first_missing_field(object: &Map<String, Value>, fields: &[&'static str]) -> Option<&'static str> {
    fields.iter().copied().find(|field| !object.contains_key(*field))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub id: String,
    pub name: String,
    pub version: String,
    pub mc_versions: Vec<String>,
    pub author: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modloader: Option<String>,
    #[serde(default)]
    pub mods: Vec<ManifestMod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_packs: Option<Vec<String>>,
}

/// One mod shipped inside a modpack.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestMod {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub mc_versions: Vec<String>,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}
