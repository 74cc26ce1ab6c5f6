//! Candidate locations of the user's builds directory
//!
//! The engine keeps builds under `<Documents>/<user folder>/Builds`. On
//! Windows the documents folder may have been moved into OneDrive, so every
//! known documents root is tried. A `buildPath` saved in the engine's
//! `Settings.xml` points at a custom location.

use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use tracing::debug;

use crate::ConfigError;

pub const BUILDS_DIR: &str = "Builds";
pub const SETTINGS_FILE: &str = "Settings.xml";

/// Documents roots for this platform, in search order, without duplicates
pub fn documents_dirs() -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = Vec::new();
    if let Some(documents) = dirs::document_dir() {
        roots.push(documents);
    }

    #[cfg(target_os = "windows")]
    {
        let var = |key: &str| std::env::var_os(key).map(PathBuf::from);
        if let Some(profile) = var("USERPROFILE") {
            roots.push(profile.join("Documents"));
        }
        for key in ["OneDrive", "OneDriveConsumer"] {
            if let Some(root) = var(key) {
                roots.push(root.join("Documents"));
            }
        }
        if let Some(profile) = var("USERPROFILE") {
            roots.push(profile.join("OneDrive").join("Documents"));
        }
    }

    #[cfg(not(target_os = "windows"))]
    {
        if let Some(home) = dirs::home_dir() {
            roots.push(home.join("Documents"));
        }
    }

    let mut unique: Vec<PathBuf> = Vec::with_capacity(roots.len());
    for dir in roots {
        if !unique.contains(&dir) {
            unique.push(dir);
        }
    }
    unique
}

/// `<documents>/<user folder>/Builds` for every documents root
pub fn default_build_dirs(user_folder: &str) -> Vec<PathBuf> {
    documents_dirs()
        .into_iter()
        .map(|d| d.join(user_folder).join(BUILDS_DIR))
        .collect()
}

/// `<documents>/<user folder>/Settings.xml` for every documents root
pub fn settings_files(user_folder: &str) -> Vec<PathBuf> {
    documents_dirs()
        .into_iter()
        .map(|d| d.join(user_folder).join(SETTINGS_FILE))
        .collect()
}

/// Read the `buildPath` attribute of the `<Misc>` element of a settings file
pub fn settings_build_path(path: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let xml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let build_path = parse_build_path(&xml).map_err(|message| ConfigError::Settings {
        path: path.to_path_buf(),
        message,
    })?;
    if let Some(ref p) = build_path {
        debug!("Settings file {} names build path {}", path.display(), p);
    }
    Ok(build_path.map(PathBuf::from))
}

fn parse_build_path(xml: &str) -> Result<Option<String>, String> {
    let mut reader = XmlReader::from_str(xml);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) if e.name().as_ref() == b"Misc" => {
                let attr = e.try_get_attribute("buildPath").map_err(|e| e.to_string())?;
                let Some(attr) = attr else {
                    return Ok(None);
                };
                let value = attr.unescape_value().map_err(|e| e.to_string())?;
                let value = value.trim();
                return Ok((!value.is_empty()).then(|| value.to_string()));
            }
            Ok(Event::Eof) => return Ok(None),
            Ok(_) => {}
            Err(err) => return Err(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_build_path_from_misc() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<PathOfBuilding2>
    <Mode mode="LIST"/>
    <Misc buildPath="D:/PoB/My Builds/" showThousandsSeparators="true"/>
</PathOfBuilding2>"#;
        assert_eq!(
            parse_build_path(xml),
            Ok(Some("D:/PoB/My Builds/".to_string()))
        );
    }

    #[test]
    fn test_parse_build_path_absent() {
        let xml = r#"<PathOfBuilding2><Misc showThousandsSeparators="true"/></PathOfBuilding2>"#;
        assert_eq!(parse_build_path(xml), Ok(None));

        let xml = r#"<PathOfBuilding2><Misc buildPath=""/></PathOfBuilding2>"#;
        assert_eq!(parse_build_path(xml), Ok(None));

        assert_eq!(parse_build_path("<PathOfBuilding2/>"), Ok(None));
    }

    #[test]
    fn test_parse_build_path_unescapes() {
        let xml = r#"<PathOfBuilding2><Misc buildPath="C:/Builds &amp; Co"/></PathOfBuilding2>"#;
        assert_eq!(parse_build_path(xml), Ok(Some("C:/Builds & Co".to_string())));
    }

    #[test]
    fn test_settings_build_path_reads_file() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let path = temp_dir.path().join(SETTINGS_FILE);
        let xml = r#"<PathOfBuilding2><Misc buildPath="/srv/builds"/></PathOfBuilding2>"#;
        assert!(std::fs::write(&path, xml).is_ok());
        assert!(settings_build_path(&path).is_ok_and(|p| p == Some(PathBuf::from("/srv/builds"))));

        let missing = temp_dir.path().join("missing.xml");
        assert!(matches!(
            settings_build_path(&missing),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_default_build_dirs_end_with_builds() {
        for dir in default_build_dirs("Path of Building (PoE2)") {
            assert!(dir.ends_with("Path of Building (PoE2)/Builds"));
        }
    }
}
