//! Writes a small uploadable modpack, handy for smoke-testing a deployment.

use std::fs;
use std::path::Path;

use anyhow::Context;

use crate::modpack_zip::pack_directory;
use crate::types::manifest::{Manifest, ManifestMod, MANIFEST_FILE};

const GAME_VERSIONS: [&str; 2] = ["1.19.4", "1.20.1"];
const CONFIG_FILE: &str = "config/example.cfg";
const SAMPLE_CONFIG: &str = "# This is a sample configuration file\n\
setting1 = true\n\
setting2 = 42\n\
setting3 = \"Hello, World!\"\n";

pub fn manifest() -> Manifest {
    let game_versions: Vec<String> = GAME_VERSIONS.iter().map(|v| v.to_string()).collect();
    let mod_entry = |id: &str, name: &str, version: &str, dependencies: Vec<String>| ManifestMod {
        id: id.to_string(),
        name: name.to_string(),
        version: version.to_string(),
        mc_versions: game_versions.clone(),
        file_name: format!("{}-{}.jar", id, version),
        dependencies,
    };

    Manifest {
        id: "test_modpack".into(),
        name: "Test Modpack".into(),
        version: "1.0.0".into(),
        mc_versions: game_versions.clone(),
        author: "Modpack Index".into(),
        description: "A simple test modpack to verify the server is working correctly.".into(),
        modloader: None,
        mods: vec![
            mod_entry("mod1", "Example Mod 1", "1.2.3", vec![]),
            mod_entry("mod2", "Example Mod 2", "2.0.1", vec!["mod1".into()]),
        ],
        icon_path: None,
        config_files: Some(vec![CONFIG_FILE.into()]),
        resource_packs: Some(vec![]),
    }
}

pub fn create(output: &Path) -> anyhow::Result<()> {
    let scratch = tempfile::tempdir().context("Failed to create scratch directory")?;
    let root = scratch.path();
    let manifest = manifest();

    fs::create_dir_all(root.join("mods"))?;
    fs::create_dir_all(root.join("config"))?;
    fs::write(
        root.join(MANIFEST_FILE),
        serde_json::to_vec_pretty(&manifest)?,
    )?;
    fs::write(root.join(CONFIG_FILE), SAMPLE_CONFIG)?;
    for (i, entry) in manifest.mods.iter().enumerate() {
        let placeholder = match i {
            0 => "This is a placeholder for a mod file",
            _ => "This is another placeholder for a mod file",
        };
        fs::write(root.join("mods").join(&entry.file_name), placeholder)?;
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    pack_directory(root, output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    log::info!("Sample modpack written to {}", output.display());
    Ok(())
}
