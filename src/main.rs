use std::fs::File;

use anyhow::Context;
use clap::Parser;

use winsysroot::arch;
use winsysroot::fetch::{self, HttpFetcher};
use winsysroot::manifest::{ChannelManifest, InstallerManifest};
use winsysroot::sdk;
use winsysroot::sink::{ArchiveTarget, DirectoryTarget, Target, VfsTarget};
use winsysroot::vctools;

const CHANNEL_MANIFEST_ID: &str = "Microsoft.VisualStudio.Manifests.VisualStudio";

/// Builds a Windows development sysroot from Microsoft's official Visual
/// Studio distribution channel.
#[derive(Parser)]
#[command(name = "winsysroot", version)]
struct Args {
    /// Major release of Visual Studio to generate a sysroot from (like 14, 17, ..)
    #[arg(long, default_value = "17")]
    vs_release: String,

    /// Version of the Windows SDK to use, without the patch version
    #[arg(long, default_value = "10.0.20348")]
    win_sdk_version: String,

    /// Comma-separated list of architectures to include in the sysroot.
    /// Supported are x86, x64, arm, arm64 and arm64ec.
    #[arg(long, default_value = "x64")]
    architectures: String,

    /// Strip most excess files, shipping only headers, libraries and
    /// object files
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    slim: bool,

    /// Output the sysroot under this directory. Exclusive with --out-tar.
    #[arg(long)]
    out_dir: Option<String>,

    /// Output the sysroot to a zstd-compressed tarball at this path.
    /// Exclusive with --out-dir.
    #[arg(long)]
    out_tar: Option<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .init();
    let args = Args::parse();
    let arches = arch::parse_arch_list(&args.architectures)?;

    let fetcher = HttpFetcher;
    let channel_url =
        format!("https://aka.ms/vs/{}/release/channel", args.vs_release);
    let channel: ChannelManifest = fetch::fetch_json(&fetcher, &channel_url)
        .context("failed to get channel manifest")?;
    log::info!("Using channel manifest {}", channel.info.id);
    let manifest_url = channel
        .channel_items
        .iter()
        .find(|item| item.id == CHANNEL_MANIFEST_ID)
        .and_then(|item| item.payloads.first())
        .map(|payload| payload.url.clone())
        .context("could not find installer manifest in channel manifest")?;
    let manifest: InstallerManifest =
        fetch::fetch_json(&fetcher, &manifest_url)
            .context("failed to get installer manifest")?;

    let mut out = match (&args.out_dir, &args.out_tar) {
        (Some(dir), None) => {
            VfsTarget::new(Box::new(DirectoryTarget::new(dir)) as Box<dyn Target>, dir)
        }
        (None, Some(path)) => {
            let file = File::create(path).with_context(|| {
                format!("failed to create output archive {}", path)
            })?;
            VfsTarget::new(
                Box::new(ArchiveTarget::new(file)?) as Box<dyn Target>,
                "/winsysroot",
            )
        }
        _ => anyhow::bail!("pass exactly one of --out-dir or --out-tar"),
    };

    sdk::build_win_sdk(
        &fetcher,
        &manifest,
        &args.win_sdk_version,
        &arches,
        args.slim,
        &mut out,
    )?;
    vctools::build_vc_tools(&fetcher, &manifest, &arches, &mut out)?;
    out.close().context("failed to finish writing output")?;
    Ok(())
}
