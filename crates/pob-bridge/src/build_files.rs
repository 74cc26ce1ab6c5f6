//! Build files on disk: listing and header metadata

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use serde::Serialize;
use tracing::debug;

use crate::paths::PathResolver;

pub const BUILD_EXTENSION: &str = "xml";

/// Level reported for files whose header cannot be read
const UNKNOWN_LEVEL: u32 = 1;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuildFileInfo {
    /// Path relative to the builds directory, usable with `load_build_file`
    pub id: String,
    pub name: String,
    pub file_name: String,
    pub full_path: String,
    pub level: u32,
    pub class_name: Option<String>,
    pub ascend_class_name: Option<String>,
    /// Modification time, RFC 3339 in UTC
    pub modified: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FolderInfo {
    pub name: String,
    pub full_path: String,
}

/// Header attributes of a build file's `<Build>` element
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildMetadata {
    pub level: Option<u32>,
    pub class_name: Option<String>,
    pub ascend_class_name: Option<String>,
}

pub fn read_metadata(xml: &str) -> Result<BuildMetadata, String> {
    let mut reader = XmlReader::from_str(xml);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) if e.name().as_ref() == b"Build" => {
                let attribute = |name: &str| -> Result<Option<String>, String> {
                    let Some(attr) = e.try_get_attribute(name).map_err(|e| e.to_string())? else {
                        return Ok(None);
                    };
                    let value = attr.unescape_value().map_err(|e| e.to_string())?;
                    let value = value.trim();
                    Ok((!value.is_empty()).then(|| value.to_string()))
                };
                return Ok(BuildMetadata {
                    level: attribute("level")?.and_then(|l| l.parse().ok()),
                    class_name: attribute("className")?,
                    ascend_class_name: attribute("ascendClassName")?
                        .filter(|a| a != "None"),
                });
            }
            Ok(Event::Eof) => return Ok(BuildMetadata::default()),
            Ok(_) => {}
            Err(err) => return Err(err.to_string()),
        }
    }
}

pub fn is_build_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(BUILD_EXTENSION))
}

/// Append the build extension unless `name` already carries it
pub fn with_extension(name: &str) -> String {
    if is_build_file(Path::new(name)) {
        name.to_string()
    } else {
        format!("{}.{}", name, BUILD_EXTENSION)
    }
}

fn modified(path: &Path) -> Option<String> {
    let time = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn build_file_info(paths: &PathResolver, path: &Path) -> BuildFileInfo {
    let metadata = match fs::read_to_string(path).map_err(|e| e.to_string()).and_then(|xml| read_metadata(&xml)) {
        Ok(metadata) => metadata,
        Err(e) => {
            debug!("Could not read build header of {}: {}", path.display(), e);
            BuildMetadata::default()
        }
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = path
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    BuildFileInfo {
        id: paths.relative(path),
        name,
        file_name,
        full_path: paths.display(path),
        level: metadata.level.unwrap_or(UNKNOWN_LEVEL),
        class_name: metadata.class_name,
        ascend_class_name: metadata.ascend_class_name,
        modified: modified(path),
    }
}

/// Build files and sub-folders of `dir`, each sorted by name
pub fn list_directory(
    paths: &PathResolver,
    dir: &Path,
) -> io::Result<(Vec<BuildFileInfo>, Vec<FolderInfo>)> {
    let mut builds = Vec::new();
    let mut folders = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            folders.push(FolderInfo {
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                full_path: paths.display(&path),
            });
        } else if path.is_file() && is_build_file(&path) {
            builds.push(build_file_info(paths, &path));
        }
    }
    builds.sort_by_key(|b| b.name.to_lowercase());
    folders.sort_by_key(|f| f.name.to_lowercase());
    Ok((builds, folders))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_metadata() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<PathOfBuilding2>
    <Build level="92" className="Ranger" ascendClassName="Deadeye" mainSocketGroup="1">
        <PlayerStat stat="Life" value="3000"/>
    </Build>
</PathOfBuilding2>"#;
        assert_eq!(
            read_metadata(xml),
            Ok(BuildMetadata {
                level: Some(92),
                class_name: Some("Ranger".to_string()),
                ascend_class_name: Some("Deadeye".to_string()),
            })
        );
        let unascended = r#"<PathOfBuilding2><Build level="1" className="Witch" ascendClassName="None"/></PathOfBuilding2>"#;
        assert_eq!(read_metadata(unascended).ok().and_then(|m| m.ascend_class_name), None);
        assert_eq!(read_metadata("<PathOfBuilding2/>"), Ok(BuildMetadata::default()));
        assert!(read_metadata("<a></b>").is_err());
    }

    #[test]
    fn test_with_extension() {
        assert_eq!(with_extension("Deadeye"), "Deadeye.xml");
        assert_eq!(with_extension("Deadeye.XML"), "Deadeye.XML");
    }

    #[test]
    fn test_list_directory() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let root = temp_dir.path();
        let written = fs::write(root.join("b.xml"), r#"<PathOfBuilding2><Build level="40" className="Monk"/></PathOfBuilding2>"#).is_ok()
            && fs::write(root.join("A.xml"), "not xml at all <").is_ok()
            && fs::write(root.join("notes.txt"), "ignored").is_ok()
            && fs::create_dir_all(root.join("Zeta")).is_ok()
            && fs::create_dir_all(root.join("alpha")).is_ok();
        assert!(written);

        let paths = PathResolver::new(&root.to_string_lossy(), "/");
        let Ok((builds, folders)) = list_directory(&paths, root) else {
            panic!("directory should list");
        };
        let names: Vec<_> = builds.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["A", "b"]);
        assert_eq!(builds[0].level, UNKNOWN_LEVEL);
        assert_eq!(builds[1].level, 40);
        assert_eq!(builds[1].class_name.as_deref(), Some("Monk"));
        assert_eq!(builds[1].id, "b.xml");
        assert!(builds[1].modified.is_some());
        let folder_names: Vec<_> = folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(folder_names, vec!["alpha", "Zeta"]);
    }
}
