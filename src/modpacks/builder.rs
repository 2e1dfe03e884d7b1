//! Assembles a modpack archive from a JSON draft and fetched mod files.
//!
//! Every mod must resolve: the first one that cannot be fetched aborts the
//! build. The archive is assembled in scratch space and only installed under
//! the storage root once complete.

use std::path::{Component, Path};

use image::ImageFormat;
use serde::Deserialize;
use serde_json::Value;
use tokio::task;

use super::{ModpackError, ModpackService};
use crate::integration::modrinth::SearchError;
use crate::modpack_zip::{pack_directory, ARCHIVE_EXTENSION};
use crate::types::manifest::{
    first_missing_field, is_valid_identifier, Manifest, ManifestMod, MANIFEST_FILE,
};
use crate::types::models::modpack::Release;

pub const DRAFT_REQUIRED_FIELDS: [&str; 8] = [
    "id",
    "name",
    "version",
    "mc_versions",
    "author",
    "description",
    "mods",
    "modloader",
];

pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

const MODS_DIR: &str = "mods";

#[derive(Debug, Clone, Deserialize)]
pub struct ModpackDraft {
    pub id: String,
    pub name: String,
    pub version: String,
    pub mc_versions: Vec<String>,
    pub author: String,
    pub description: String,
    pub modloader: String,
    pub mods: Vec<ModReference>,
}

/// A mod requested for a build: a project, optionally pinned to one release.
#[derive(Debug, Clone, Deserialize)]
pub struct ModReference {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version_id: Option<String>,
}

/// Uploaded modpack logo.
pub struct Logo {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl ModpackDraft {
    pub fn parse(data: &str) -> Result<ModpackDraft, ModpackError> {
        let value: Value =
            serde_json::from_str(data).map_err(|e| ModpackError::InvalidData(e.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| ModpackError::InvalidData("expected a JSON object".into()))?;
        if let Some(field) = first_missing_field(object, &DRAFT_REQUIRED_FIELDS) {
            return Err(ModpackError::MissingField(field));
        }

        let draft: ModpackDraft =
            serde_json::from_value(value).map_err(|e| ModpackError::InvalidData(e.to_string()))?;
        if !is_valid_identifier(&draft.id) {
            return Err(ModpackError::InvalidIdentifier(draft.id));
        }
        if draft.mods.is_empty() {
            return Err(ModpackError::EmptyModList);
        }

        Ok(draft)
    }

    fn modloader(&self) -> Option<&str> {
        Some(self.modloader.as_str()).filter(|l| !l.is_empty())
    }

    fn release(&self, mod_count: usize) -> Release {
        Release {
            id: self.id.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
            mc_versions: self.mc_versions.clone(),
            author: self.author.clone(),
            description: self.description.clone(),
            modloader: Some(self.modloader.clone()),
            mod_count,
        }
    }
}

impl Logo {
    /// Checks the extension and that the bytes decode as that format.
    /// Returns the lowercased extension.
    fn validate(&self) -> Result<String, ModpackError> {
        let extension = Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .filter(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
            .ok_or(ModpackError::UnsupportedImageType)?;
        let format =
            ImageFormat::from_extension(&extension).ok_or(ModpackError::UnsupportedImageType)?;

        image::load_from_memory_with_format(&self.bytes, format).map_err(|e| {
            log::warn!("Rejected logo {}: {}", self.filename, e);
            ModpackError::UnsupportedImageType
        })?;

        Ok(extension)
    }
}

impl ModpackService {
    /// Builds and installs a modpack from the JSON `data` description.
    pub async fn build(&self, data: &str, logo: Option<Logo>) -> Result<String, ModpackError> {
        let draft = ModpackDraft::parse(data)?;
        let logo = match logo {
            Some(logo) => Some(
                task::spawn_blocking(move || {
                    let extension = logo.validate()?;
                    Ok::<_, ModpackError>((logo, extension))
                })
                .await??,
            ),
            None => None,
        };
        log::info!(
            "Building modpack '{}' ({}) with {} mods",
            draft.name,
            draft.id,
            draft.mods.len()
        );

        let scratch = tempfile::Builder::new()
            .prefix("modpack-build-")
            .tempdir()?;
        let root = scratch.path().join("pack");
        let mods_dir = root.join(MODS_DIR);
        tokio::fs::create_dir_all(&mods_dir).await?;

        let icon = match logo {
            Some((logo, extension)) => {
                let path = root.join(format!("icon.{}", extension));
                tokio::fs::write(&path, &logo.bytes).await?;
                Some(path)
            }
            None => None,
        };

        let mut mods = Vec::with_capacity(draft.mods.len());
        for reference in &draft.mods {
            let entry = self
                .fetch_mod(reference, &draft, &mods_dir)
                .await
                .map_err(|source| {
                    log::error!("Aborting build of {}: mod {} failed: {}", draft.id, reference.id, source);
                    ModpackError::ModFetch {
                        mod_id: reference.id.clone(),
                        source,
                    }
                })?;
            mods.push(entry);
        }

        let manifest = Manifest {
            id: draft.id.clone(),
            name: draft.name.clone(),
            version: draft.version.clone(),
            mc_versions: draft.mc_versions.clone(),
            author: draft.author.clone(),
            description: draft.description.clone(),
            modloader: Some(draft.modloader.clone()),
            mods,
            icon_path: icon
                .as_deref()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned()),
            config_files: None,
            resource_packs: None,
        };
        tokio::fs::write(root.join(MANIFEST_FILE), serde_json::to_vec_pretty(&manifest)?).await?;

        let archive = scratch
            .path()
            .join(format!("{}.{}", draft.id, ARCHIVE_EXTENSION));
        let (source, destination) = (root.clone(), archive.clone());
        task::spawn_blocking(move || pack_directory(&source, &destination)).await??;

        let id = self
            .publish(draft.release(manifest.mods.len()), &archive, icon.as_deref())
            .await?;
        log::info!("Built modpack '{}' ({})", draft.name, id);
        Ok(id)
    }

    async fn fetch_mod(
        &self,
        reference: &ModReference,
        draft: &ModpackDraft,
        mods_dir: &Path,
    ) -> Result<ManifestMod, SearchError> {
        log::info!(
            "Processing mod {} ({})",
            reference.name.as_deref().unwrap_or("unknown"),
            reference.id
        );

        let version = match &reference.version_id {
            Some(version_id) => self.mods.version(version_id).await?,
            None => {
                self.mods
                    .latest_version(&reference.id, &draft.mc_versions, draft.modloader())
                    .await?
            }
        };

        let file = version
            .primary_file()
            .ok_or_else(|| SearchError::NoFiles(version.id.clone()))?;
        let file_name = plain_file_name(&file.filename)
            .ok_or_else(|| SearchError::InvalidReference(file.filename.clone()))?;
        self.mods.download(&file.url, &mods_dir.join(&file_name)).await?;

        Ok(ManifestMod {
            id: reference.id.clone(),
            name: reference
                .name
                .clone()
                .unwrap_or_else(|| version.name.clone()),
            version: version.version_number.clone(),
            mc_versions: version.game_versions.clone(),
            file_name,
            dependencies: version.required_projects(),
        })
    }
}

fn plain_file_name(name: &str) -> Option<String> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(n)), None) => Some(n.to_string_lossy().into_owned()),
        _ => None,
    }
}
