//! Reader for the relational layer of Microsoft Installer (MSI) files.
//!
//! An MSI file is an MS-CFB compound document whose streams hold a small
//! relational database: a shared string pool plus column-major tables of
//! `u16` cells, behind obfuscated stream names. This module decodes just
//! enough of that database to map the logical file keys found in the
//! accompanying cabinets to their final install paths, and to learn which
//! cabinets the installation references.

mod name;
mod strings;
mod tables;

pub use name::decode_name;
pub use strings::decode_strings;
pub use tables::{ComponentRow, DirectoryRow, FileRow, MediaRow};

use std::collections::HashMap;
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};

/// The file-placement information extracted from one MSI database.
pub struct Msi {
    /// Logical file key (the name used inside a cabinet) to the final
    /// install path, POSIX-joined.
    pub file_map: HashMap<String, String>,
    /// Cabinets referenced by the media table, in table order, without
    /// duplicates.
    pub cab_files: Vec<String>,
}

impl Msi {
    /// Parses the installer database out of an MS-CFB document.
    pub fn parse<R: Read + Seek>(reader: R) -> io::Result<Msi> {
        let mut doc = cfb::CompoundFile::open(reader)?;
        let streams: Vec<(String, PathBuf)> = doc
            .walk()
            .filter(|entry| entry.is_stream())
            .map(|entry| (decode_name(entry.name()), entry.path().to_path_buf()))
            .collect();

        let mut string_pool = Vec::new();
        let mut string_data = Vec::new();
        let mut raw_tables: HashMap<String, Vec<u16>> = HashMap::new();
        for (name, path) in &streams {
            if name == "!_StringPool" {
                string_pool = read_stream(&mut doc, path)?;
            } else if name == "!_StringData" {
                string_data = read_stream(&mut doc, path)?;
            } else if let Some(table) = name.strip_prefix('!') {
                // Streams named `!Xyz` are user tables; `!_Xyz` ones are
                // database metadata this reader does not need.
                if !table.starts_with('_') {
                    let raw = read_stream(&mut doc, path)?;
                    raw_tables.insert(table.to_string(), u16_array(&raw));
                }
            }
        }
        let strings = decode_strings(&string_data, &string_pool)?;

        let dirs = tables::parse_directory_table(
            raw_table(&raw_tables, "Directory"),
            &strings,
        )?;
        let dir_paths = directory_paths(&dirs)?;

        let components = tables::parse_component_table(
            raw_table(&raw_tables, "Component"),
            &strings,
        )?;
        let mut component_dirs: HashMap<&str, String> = HashMap::new();
        for component in &components {
            let dir =
                dir_paths.get(&component.directory).cloned().unwrap_or_default();
            component_dirs.insert(component.component.as_str(), dir);
        }

        let files = tables::parse_file_table(
            raw_table(&raw_tables, "File"),
            &strings,
        )?;
        let mut file_map = HashMap::new();
        for file in &files {
            let dir = component_dirs
                .get(file.component.as_str())
                .map(String::as_str)
                .unwrap_or("");
            file_map
                .insert(file.file.clone(), join_under(dir, long_name(&file.file_name)));
        }

        let media = tables::parse_media_table(
            raw_table(&raw_tables, "Media"),
            &strings,
        )?;
        let mut cab_files = Vec::new();
        for row in &media {
            if row.cabinet.is_empty() || cab_files.contains(&row.cabinet) {
                continue;
            }
            cab_files.push(row.cabinet.clone());
        }

        Ok(Msi { file_map, cab_files })
    }
}

/// Returns the long half of a short-name/long-name pair (`"8DOT3|Long"` →
/// `"Long"`); names without a separator pass through unchanged.
pub fn long_name(name: &str) -> &str {
    match name.split_once('|') {
        Some((_, long)) => long,
        None => name,
    }
}

fn read_stream<F: Read + Seek>(
    doc: &mut cfb::CompoundFile<F>,
    path: &Path,
) -> io::Result<Vec<u8>> {
    let mut data = Vec::new();
    doc.open_stream(path)?.read_to_end(&mut data)?;
    Ok(data)
}

// A table stream with an odd byte count is malformed; the trailing byte is
// dropped.
fn u16_array(raw: &[u8]) -> Vec<u16> {
    raw.chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

fn raw_table<'a>(
    tables: &'a HashMap<String, Vec<u16>>,
    name: &str,
) -> &'a [u16] {
    tables.get(name).map(Vec::as_slice).unwrap_or(&[])
}

/// Resolves every directory key to its virtual path by walking parent
/// links up to the root. `TARGETDIR` anchors the tree and always maps to
/// `"."` regardless of its recorded default name.
fn directory_paths(
    dirs: &[DirectoryRow],
) -> io::Result<HashMap<String, String>> {
    let mut dir_map: HashMap<&str, (&str, &str)> = HashMap::new();
    for dir in dirs {
        let default_dir = if dir.directory == "TARGETDIR" {
            "."
        } else {
            dir.default_dir.as_str()
        };
        dir_map.insert(dir.directory.as_str(), (dir.parent.as_str(), default_dir));
    }
    let mut paths = HashMap::new();
    for dir in dirs {
        let (mut parent, default_dir) = dir_map[dir.directory.as_str()];
        let mut parts = vec![long_name(default_dir)];
        let mut steps = 0;
        while !parent.is_empty() {
            let Some(&(next_parent, parent_default)) = dir_map.get(parent)
            else {
                // Dangling parent reference; treat what we have as the root.
                break;
            };
            parts.push(long_name(parent_default));
            parent = next_parent;
            steps += 1;
            if steps > dirs.len() {
                invalid_data!(
                    "Directory table contains a parent cycle at {:?}",
                    dir.directory
                );
            }
        }
        parts.reverse();
        paths.insert(dir.directory.clone(), join_parts(&parts));
    }
    Ok(paths)
}

fn join_parts(parts: &[&str]) -> String {
    let kept: Vec<&str> = parts
        .iter()
        .copied()
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();
    kept.join("/")
}

fn join_under(dir: &str, file_name: &str) -> String {
    if dir.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", dir, file_name)
    }
}
