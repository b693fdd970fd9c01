//! Package identity.
//!
//! A [`PackId`] is the `(group, name, version)` triple of a content package plus
//! the installation path the server stores it under. Identities are resolved
//! from the `META-INF/vault/properties.xml` entry of a package archive, from a
//! flat property map, or from a legacy `/etc/packages/...` storage path.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{PackmanError, PackmanResult};
use crate::utils::properties::parse_properties_xml;

/// Archive entry holding the package properties
pub const PROPERTIES_ENTRY: &str = "META-INF/vault/properties.xml";
pub const PROP_GROUP: &str = "group";
pub const PROP_NAME: &str = "name";
pub const PROP_VERSION: &str = "version";
pub const PROP_PATH: &str = "path";

/// Root of the server's package storage
pub const ETC_PACKAGES: &str = "/etc/packages";
pub const ETC_PACKAGES_PREFIX: &str = "/etc/packages/";

/// Canonical identity of a content package
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PackId {
    group: String,
    name: String,
    version: String,
    installation_path: String,
}

impl PackId {
    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version string, empty when the package is unversioned
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Storage path on the server, without the `.zip` suffix
    pub fn installation_path(&self) -> &str {
        &self.installation_path
    }

    /// Create an identity from explicit coordinates.
    ///
    /// Returns `None` unless both `group` and `name` are longer than one character.
    /// A missing version is treated as the empty version.
    pub fn from_parts(group: &str, name: &str, version: Option<&str>) -> Option<Self> {
        if group.chars().count() > 1 && name.chars().count() > 1 {
            Some(Self::assemble(
                normalize_group(group),
                name.to_string(),
                version.unwrap_or_default().to_string(),
            ))
        } else {
            None
        }
    }

    /// Resolve an identity from a package property set.
    ///
    /// `group`/`name`/`version` win; otherwise a legacy `path` property under
    /// `/etc/packages/` is used.
    pub fn from_properties(props: &HashMap<String, String>) -> Option<Self> {
        let group = props.get(PROP_GROUP).map(String::as_str).unwrap_or_default();
        let name = props.get(PROP_NAME).map(String::as_str).unwrap_or_default();
        let version = props.get(PROP_VERSION).map(String::as_str);

        if let Some(id) = Self::from_parts(group, name, version) {
            return Some(id);
        }

        match props.get(PROP_PATH) {
            Some(path) if path.starts_with(ETC_PACKAGES_PREFIX) => {
                Some(Self::from_installation_path(path))
            }
            _ => None,
        }
    }

    /// Interpret a storage path such as `/etc/packages/my_group/my-pack-1.0.zip`.
    ///
    /// The last path segment is split into name and version: trailing
    /// dash-separated segments that look like version parts become the version.
    pub fn from_installation_path(path: &str) -> Self {
        let (parent, mut file_name) = match path.rfind('/') {
            Some(0) => ("/", &path[1..]),
            Some(idx) => (&path[..idx], &path[idx + 1..]),
            None => ("", path),
        };
        if let Some(stripped) = file_name.strip_suffix(".zip") {
            file_name = stripped;
        }

        let (name, version) = split_version(file_name);
        Self::assemble(normalize_group(parent), name, version)
    }

    /// Identify the package archive at `path`.
    ///
    /// Falls back to the archive's file name when it carries no usable metadata.
    pub fn identify_package(path: &Path) -> PackmanResult<Self> {
        let file = File::open(path)
            .map_err(|e| PackmanError::io(format!("Failed to open package {}", path.display()), e))?;
        let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned());

        Self::identify_reader(BufReader::new(file), file_name.as_deref())
    }

    /// Identify a package archive from any seekable reader
    pub fn identify_reader<R: Read + Seek>(reader: R, file_name: Option<&str>) -> PackmanResult<Self> {
        let mut archive = ZipArchive::new(reader).map_err(|e| {
            PackmanError::archive(
                format!("Failed to read zip archive {}", file_name.unwrap_or("<memory>")),
                e,
            )
        })?;

        let from_metadata = match archive.by_name(PROPERTIES_ENTRY) {
            Ok(mut entry) => {
                let mut xml = String::new();
                entry.read_to_string(&mut xml).map_err(|e| {
                    PackmanError::io(format!("Failed to read {}", PROPERTIES_ENTRY), e)
                })?;
                Self::from_properties(&parse_properties_xml(&xml)?)
            }
            Err(ZipError::FileNotFound) => None,
            Err(e) => {
                return Err(PackmanError::archive(
                    format!("Failed to open {}", PROPERTIES_ENTRY),
                    e,
                ))
            }
        };

        if let Some(id) = from_metadata {
            return Ok(id);
        }

        match file_name {
            Some(name) if !name.is_empty() => {
                debug!("No package metadata in {}, identifying by file name", name);
                Ok(Self::from_installation_path(&format!("{}{}", ETC_PACKAGES_PREFIX, name)))
            }
            _ => Err(PackmanError::PackageNotFound {
                name: file_name.unwrap_or_default().to_string(),
            }),
        }
    }

    fn assemble(group: String, name: String, version: String) -> Self {
        let mut installation_path = String::from(ETC_PACKAGES_PREFIX);
        if !group.is_empty() {
            installation_path.push_str(&group);
            installation_path.push('/');
        }
        installation_path.push_str(&name);
        if !version.is_empty() {
            installation_path.push('-');
            installation_path.push_str(&version);
        }

        Self {
            group,
            name,
            version,
            installation_path,
        }
    }
}

impl fmt::Display for PackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)?;
        if !self.version.is_empty() {
            write!(f, ":{}", self.version)?;
        }
        Ok(())
    }
}

impl FromStr for PackId {
    type Err = PackmanError;

    /// Parse `group:name[:version]` or an `/etc/packages/...` path
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with(ETC_PACKAGES_PREFIX) {
            return Ok(Self::from_installation_path(s));
        }

        let mut parts = s.splitn(3, ':');
        let group = parts.next().unwrap_or_default();
        let name = parts.next().unwrap_or_default();
        let version = parts.next();

        Self::from_parts(group, name, version).ok_or_else(|| PackmanError::PackageNotFound {
            name: s.to_string(),
        })
    }
}

fn normalize_group(group: &str) -> String {
    if group == ETC_PACKAGES {
        String::new()
    } else if let Some(rest) = group.strip_prefix(ETC_PACKAGES_PREFIX) {
        rest.to_string()
    } else if let Some(rest) = group.strip_prefix('/') {
        rest.to_string()
    } else {
        group.to_string()
    }
}

/// Split `my-pack-1.0-SNAPSHOT` into (`my-pack`, `1.0-SNAPSHOT`).
///
/// Walks the dash-separated segments from the end; a segment ends the version
/// when it is a number >= 1000, or starts with a letter that is not followed by
/// a digit (except `SNAPSHOT`). The first segment always belongs to the name.
fn split_version(file_name: &str) -> (String, String) {
    let segs: Vec<&str> = file_name.split('-').filter(|s| !s.is_empty()).collect();
    if segs.is_empty() {
        return (file_name.to_string(), String::new());
    }

    let mut i = segs.len() - 1;
    while i > 0 {
        let seg = segs[i];
        if let Ok(n) = seg.parse::<i32>() {
            if n >= 1000 {
                break;
            }
        }
        let mut chars = seg.chars();
        if let Some(first) = chars.next() {
            if is_identifier_start(first) {
                let second_is_digit = chars.next().is_some_and(|c| c.is_ascii_digit());
                if seg.chars().count() == 1 || (!second_is_digit && seg != "SNAPSHOT") {
                    break;
                }
            }
        }
        i -= 1;
    }

    if i == segs.len() - 1 {
        (segs.join("-"), String::new())
    } else {
        (segs[..=i].join("-"), segs[i + 1..].join("-"))
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}
