//! Extraction of the Windows SDK from its MSI/CAB payload set.
//!
//! The SDK package ships dozens of MSI databases plus the cabinets holding
//! the actual files. Phase one parses every MSI and keeps the cabinets of
//! those that install headers or import libraries; phase two walks the
//! selected cabinets and routes each file to the install path its MSI
//! assigns it.

use std::collections::HashMap;
use std::io::{self, Cursor};

use anyhow::Context;
use regex::Regex;

use crate::arch::{self, Arch};
use crate::cab::Cabinet;
use crate::fetch::Fetch;
use crate::manifest::InstallerManifest;
use crate::msi::Msi;
use crate::sink::Target;

const HEADER_EXTENSIONS: [&str; 5] = ["h", "hpp", "c", "cpp", ""];
const LIBRARY_EXTENSIONS: [&str; 2] = ["lib", "obj"];

/// Extracts the Windows SDK headers and libraries for the requested
/// architectures into `out`. In `slim` mode, files that a compiler never
/// reads (documentation, samples, tooling) are dropped.
pub fn build_win_sdk(
    fetcher: &dyn Fetch,
    manifest: &InstallerManifest,
    sdk_version: &str,
    arches: &[Arch],
    slim: bool,
    out: &mut dyn Target,
) -> anyhow::Result<()> {
    let package_re =
        Regex::new(&format!("^Win.*SDK_{}$", regex::escape(sdk_version)))?;
    let sdk_package = manifest
        .packages
        .iter()
        .find(|package| package_re.is_match(&package.id))
        .with_context(|| {
            format!("no Windows SDK package matching version {} in manifest", sdk_version)
        })?;
    log::info!("Using SDK package {}", sdk_package.id);

    let include_re =
        Regex::new(r"^Windows Kits/[^/]+/Include/[0-9.]+/.*\.h(pp)?$")?;
    let lib_re = Regex::new(r"^Windows Kits/[^/]+/Lib/[0-9.]+/.*\.[Ll][Ii][Bb]")?;

    // Phase 1: parse every MSI payload; an MSI that installs headers or
    // import libraries marks its cabinets as interesting.
    let mut msis: Vec<Msi> = Vec::new();
    let mut interesting: HashMap<String, usize> = HashMap::new();
    for payload in &sdk_package.payloads {
        if !payload.file_name.ends_with(".msi") {
            continue;
        }
        let data = fetcher.fetch(&payload.url).with_context(|| {
            format!("failed to download MSI {}", payload.file_name)
        })?;
        let msi = Msi::parse(Cursor::new(data)).with_context(|| {
            format!("failed to parse MSI {}", payload.file_name)
        })?;
        let relevant = msi.file_map.values().any(|path| {
            include_re.is_match(path) || lib_re.is_match(path)
        });
        if relevant {
            let index = msis.len();
            for cabinet in &msi.cab_files {
                interesting.insert(cabinet.to_ascii_lowercase(), index);
            }
            msis.push(msi);
        }
    }
    log::info!("{} SDK cabinets selected", interesting.len());

    // Phase 2: pull the selected cabinets, in manifest payload order.
    for payload in &sdk_package.payloads {
        let parts: Vec<&str> = payload.file_name.split('\\').collect();
        if parts.len() != 2 {
            continue;
        }
        let msi = match interesting.get(&parts[1].to_ascii_lowercase()) {
            Some(&index) => &msis[index],
            None => continue,
        };
        let data = fetcher.fetch(&payload.url).with_context(|| {
            format!("failed to download CAB {}", payload.file_name)
        })?;
        extract_cab(&data, msi, arches, slim, out).with_context(|| {
            format!("failed to extract CAB {}", payload.file_name)
        })?;
    }
    Ok(())
}

fn extract_cab(
    data: &[u8],
    msi: &Msi,
    arches: &[Arch],
    slim: bool,
    out: &mut dyn Target,
) -> anyhow::Result<()> {
    let mut cabinet = Cabinet::new(Cursor::new(data))?;
    while let Some(header) = cabinet.next()? {
        let out_path = match msi.file_map.get(header.name()) {
            Some(path) => path.clone(),
            None => {
                // Normal condition: cabinets carry files the MSI never
                // installs.
                log::warn!("Unknown file {:?} in CAB, ignoring", header.name());
                continue;
            }
        };
        if !keep_sdk_file(&out_path, arches, slim) {
            continue;
        }
        out.create(&out_path, header.size() as u64, header.datetime())?;
        io::copy(&mut cabinet, out)?;
    }
    Ok(())
}

/// Applies the include/lib classification, architecture filter and slim
/// extension filter to an SDK install path such as
/// `Windows Kits/10/Include/10.0.20348.0/um/winsock2.h`.
fn keep_sdk_file(path: &str, arches: &[Arch], slim: bool) -> bool {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() < 3 {
        log::debug!("Skipping SDK file with short path {:?}", path);
        return false;
    }
    match segments[2].to_ascii_lowercase().as_str() {
        "include" => !slim || has_extension(path, &HEADER_EXTENSIONS),
        "lib" => {
            if segments.len() < 7 || !arch::contains_arch(arches, segments[5])
            {
                return false;
            }
            !slim || has_extension(path, &LIBRARY_EXTENSIONS)
        }
        _ => {
            log::debug!("Skipping non-include/lib SDK file {:?}", path);
            false
        }
    }
}

fn has_extension(path: &str, extensions: &[&str]) -> bool {
    let base = path.rsplit('/').next().unwrap_or(path);
    let extension = match base.rsplit_once('.') {
        Some((_, extension)) => extension,
        None => "",
    };
    extensions.iter().any(|e| e.eq_ignore_ascii_case(extension))
}

#[cfg(test)]
mod tests {
    use super::{has_extension, keep_sdk_file, HEADER_EXTENSIONS};
    use crate::arch::Arch;

    const X64: [Arch; 1] = [Arch::X64];

    #[test]
    fn includes_are_kept() {
        let path = "Windows Kits/10/Include/10.0.20348.0/um/winsock2.h";
        assert!(keep_sdk_file(path, &X64, false));
        assert!(keep_sdk_file(path, &X64, true));
    }

    #[test]
    fn slim_drops_non_source_includes() {
        let doc = "Windows Kits/10/Include/10.0.20348.0/um/readme.md";
        assert!(keep_sdk_file(doc, &X64, false));
        assert!(!keep_sdk_file(doc, &X64, true));
        // Extension-less headers (e.g. C++ standard-library style) stay.
        let bare = "Windows Kits/10/Include/10.0.20348.0/cppwinrt/winrt";
        assert!(keep_sdk_file(bare, &X64, true));
    }

    #[test]
    fn libs_are_filtered_by_architecture() {
        let x64 = "Windows Kits/10/Lib/10.0.20348.0/um/x64/kernel32.Lib";
        let arm = "Windows Kits/10/Lib/10.0.20348.0/um/arm64/kernel32.Lib";
        assert!(keep_sdk_file(x64, &X64, true));
        assert!(!keep_sdk_file(arm, &X64, true));
    }

    #[test]
    fn slim_drops_non_library_files() {
        let pdb = "Windows Kits/10/Lib/10.0.20348.0/um/x64/kernel32.pdb";
        assert!(keep_sdk_file(pdb, &X64, false));
        assert!(!keep_sdk_file(pdb, &X64, true));
    }

    #[test]
    fn other_trees_are_dropped() {
        assert!(!keep_sdk_file(
            "Windows Kits/10/bin/10.0.20348.0/x64/rc.exe",
            &X64,
            false
        ));
        assert!(!keep_sdk_file("Windows Kits/10", &X64, false));
    }

    #[test]
    fn extension_matching_is_case_insensitive() {
        assert!(has_extension("a/b/winsock2.H", &HEADER_EXTENSIONS));
        assert!(!has_extension("a/b/notes.txt", &HEADER_EXTENSIONS));
        assert!(has_extension("a/b/noext", &HEADER_EXTENSIONS));
    }
}
