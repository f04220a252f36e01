//! Extraction of the MSVC compiler toolset from Visual Studio `vsix`
//! packages.
//!
//! The installer manifest models the toolset as a component package whose
//! dependency closure contains the actual `vsix` payloads. Each payload is
//! a zip archive; only the `include` and `lib` subtrees of the MSVC
//! toolset directory are extracted.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{self, Cursor};

use anyhow::Context;

use crate::arch::{self, Arch};
use crate::fetch::Fetch;
use crate::manifest::{InstallerManifest, Package};
use crate::sink::Target;

const MSVC_PREFIX: &str = "Contents/VC/Tools/MSVC/";

/// Extracts the VC toolset headers and libraries for the requested
/// architectures into `out`.
pub fn build_vc_tools(
    fetcher: &dyn Fetch,
    manifest: &InstallerManifest,
    arches: &[Arch],
    out: &mut dyn Target,
) -> anyhow::Result<()> {
    let by_id: HashMap<&str, &Package> =
        manifest.packages.iter().map(|p| (p.id.as_str(), p)).collect();

    // Transitive closure over the dependency graph, seeded with the
    // per-architecture toolset components.
    let mut worklist: VecDeque<String> =
        arches.iter().map(|a| a.tools_component().to_string()).collect();
    let mut visited = HashSet::new();
    let mut selected: Vec<&Package> = Vec::new();
    while let Some(id) = worklist.pop_front() {
        if !visited.insert(id.clone()) {
            continue;
        }
        let package = match by_id.get(id.as_str()) {
            Some(package) => *package,
            None => continue,
        };
        selected.push(package);
        for dependency in package.dependencies.keys() {
            worklist.push_back(dependency.clone());
        }
    }
    log::info!("Selected {} packages for the VC toolset", selected.len());

    for package in selected {
        if !package.kind.eq_ignore_ascii_case("vsix") {
            continue;
        }
        let payload = package.payloads.first().with_context(|| {
            format!("package {} has no payloads", package.id)
        })?;
        log::info!("Downloading {} {}", package.id, package.version);
        let data = fetcher.fetch(&payload.url).with_context(|| {
            format!("failed to download package {}", package.id)
        })?;
        extract_vsix(&data, arches, out).with_context(|| {
            format!("failed to extract package {}", package.id)
        })?;
    }
    Ok(())
}

fn extract_vsix(
    data: &[u8],
    arches: &[Arch],
    out: &mut dyn Target,
) -> anyhow::Result<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))?;
    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        if file.is_dir() || !file.name().starts_with(MSVC_PREFIX) {
            continue;
        }
        let name = file.name().to_string();
        // Contents/VC/Tools/MSVC/<version>/<type>/..., so the type
        // directory sits at segment 5 and the lib architecture at 6.
        let parts: Vec<&str> = name.split('/').collect();
        if parts.len() < 6 {
            continue;
        }
        let type_dir = parts[5].to_ascii_lowercase();
        if type_dir != "include" && type_dir != "lib" {
            continue;
        }
        if type_dir == "lib"
            && (parts.len() < 7 || !arch::contains_arch(arches, parts[6]))
        {
            continue;
        }
        let target_path = name.strip_prefix("Contents/").unwrap_or(&name);
        out.create(target_path, file.size(), None)?;
        io::copy(&mut file, out)?;
    }
    Ok(())
}
