//! Fixtures shared by the unit tests.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::{json, Value};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub fn manifest_json(id: &str) -> Value {
    json!({
        "id": id,
        "name": "Test Modpack",
        "version": "1.0.0",
        "mc_versions": ["1.19.4", "1.20.1"],
        "author": "Pack Author",
        "description": "A simple test modpack",
        "mods": [
            {
                "id": "mod1",
                "name": "Example Mod 1",
                "version": "1.2.3",
                "mc_versions": ["1.19.4", "1.20.1"],
                "file_name": "mod1-1.2.3.jar",
                "dependencies": []
            },
            {
                "id": "mod2",
                "name": "Example Mod 2",
                "version": "2.0.1",
                "mc_versions": ["1.19.4", "1.20.1"],
                "file_name": "mod2-2.0.1.jar",
                "dependencies": ["mod1"]
            }
        ],
        "config_files": ["config/example.cfg"],
        "resource_packs": []
    })
}

pub fn zip_fixture(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in entries {
        writer
            .start_file(name.to_string(), SimpleFileOptions::default())
            .unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Archive with a manifest for `id`, two placeholder jars and an optional icon.
pub fn modpack_fixture(id: &str, icon: Option<&[u8]>) -> Vec<u8> {
    let mut manifest = manifest_json(id);
    if icon.is_some() {
        manifest["icon_path"] = json!("icon.png");
    }
    let manifest = manifest.to_string();
    let mut entries: Vec<(&str, &[u8])> = vec![
        ("manifest.json", manifest.as_bytes()),
        ("mods/mod1-1.2.3.jar", &b"placeholder one"[..]),
        ("mods/mod2-2.0.1.jar", &b"placeholder two"[..]),
    ];
    if let Some(icon) = icon {
        entries.push(("icon.png", icon));
    }
    zip_fixture(&entries)
}

pub fn png_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::new(4, 4))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}
