use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use serde_json::Value;
use tempfile::TempDir;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::types::manifest::{
    first_missing_field, is_valid_identifier, Manifest, MANIFEST_FILE, REQUIRED_FIELDS,
};
use crate::types::models::modpack::Release;

/// Extension (and storage naming suffix) of modpack archives.
pub const ARCHIVE_EXTENSION: &str = "zip";

#[derive(thiserror::Error, Debug)]
pub enum ArchiveError {
    #[error("No manifest.json found in modpack")]
    ManifestMissing,
    #[error("Invalid manifest.json: {0}")]
    ManifestInvalid(String),
    #[error("Missing required field: {0}")]
    ManifestFieldMissing(&'static str),
    #[error("Invalid modpack ID '{0}': only letters, numbers, underscores or hyphens are allowed")]
    InvalidIdentifier(String),
    #[error("Invalid modpack archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Failed to unpack modpack: {0}")]
    Io(#[from] io::Error),
}

/// A validated archive, still extracted in its scratch directory.
///
/// The scratch directory is removed when this value is dropped, so anything
/// referenced by [`InspectedArchive::icon`] has to be copied out first.
pub struct InspectedArchive {
    pub manifest: Manifest,
    icon: Option<PathBuf>,
    _scratch: TempDir,
}

impl InspectedArchive {
    pub fn icon(&self) -> Option<&Path> {
        self.icon.as_deref()
    }

    pub fn mod_count(&self) -> usize {
        self.manifest.mods.len()
    }

    pub fn release(&self) -> Release {
        let m = &self.manifest;
        Release {
            id: m.id.clone(),
            name: m.name.clone(),
            version: m.version.clone(),
            mc_versions: m.mc_versions.clone(),
            author: m.author.clone(),
            description: m.description.clone(),
            modloader: m.modloader.clone(),
            mod_count: self.mod_count(),
        }
    }
}

/// Extracts `archive` to scratch space and validates its manifest.
pub fn inspect(archive: &Path) -> Result<InspectedArchive, ArchiveError> {
    let scratch = tempfile::Builder::new()
        .prefix("modpack-extract-")
        .tempdir()?;

    let file = File::open(archive)?;
    ZipArchive::new(file)
        .inspect_err(|e| log::warn!("Failed to open {}: {}", archive.display(), e))?
        .extract(scratch.path())?;

    let manifest_path = scratch.path().join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        return Err(ArchiveError::ManifestMissing);
    }

    let value: Value = serde_json::from_slice(&fs::read(&manifest_path)?)
        .map_err(|e| ArchiveError::ManifestInvalid(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| ArchiveError::ManifestInvalid("expected a JSON object".into()))?;
    if let Some(field) = first_missing_field(object, &REQUIRED_FIELDS) {
        return Err(ArchiveError::ManifestFieldMissing(field));
    }

    let manifest: Manifest = serde_json::from_value(value)
        .map_err(|e| ArchiveError::ManifestInvalid(e.to_string()))?;
    if !is_valid_identifier(&manifest.id) {
        return Err(ArchiveError::InvalidIdentifier(manifest.id));
    }

    let icon = match manifest.icon_path.as_deref() {
        Some(relative) => confined_file(scratch.path(), relative)?,
        None => None,
    };

    Ok(InspectedArchive {
        manifest,
        icon,
        _scratch: scratch,
    })
}

/// Zips every file under `source` into `destination`, paths relative to `source`.
pub fn pack_directory(source: &Path, destination: &Path) -> Result<(), ArchiveError> {
    let mut writer = ZipWriter::new(File::create(destination)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(io::Error::other)?;
        let name = entry_name(relative);

        if entry.file_type().is_dir() {
            writer.add_directory(name, options)?;
        } else {
            writer.start_file(name, options)?;
            let mut file = File::open(entry.path())?;
            io::copy(&mut file, &mut writer)?;
        }
    }

    writer.finish()?;
    Ok(())
}

fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

// A regular file under `root`, after resolving any links the archive unpacked.
fn confined_file(root: &Path, relative: &str) -> io::Result<Option<PathBuf>> {
    let relative = Path::new(relative);
    if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
        return Ok(None);
    }

    let resolved = match root.join(relative).canonicalize() {
        Ok(path) => path,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    if resolved.starts_with(root.canonicalize()?) && resolved.is_file() {
        Ok(Some(resolved))
    } else {
        log::warn!("Ignoring icon path {} outside the archive", relative.display());
        Ok(None)
    }
}
