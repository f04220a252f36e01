//! Assembles a usable Windows development sysroot (headers, import
//! libraries and a case-insensitive VFS overlay) from Microsoft's
//! official Visual Studio distribution artifacts, without any Microsoft
//! tooling.
//!
//! The interesting parts are the binary-format readers: a
//! [cabinet](cab::Cabinet) reader that streams MSZIP-compressed files
//! across data-block boundaries, and an [MSI](msi::Msi) table reader that
//! reconstructs each file's install path from the installer database. The
//! [SDK](sdk) and [VC toolset](vctools) drivers walk the release manifests
//! and route extracted files into a [sink](sink::Target), either a
//! directory tree or a zstd-compressed tar stream, while a recording layer
//! builds the VFS overlay that lets case-sensitive hosts present the
//! Windows view.

#[macro_use]
mod macros;

pub mod arch;
pub mod cab;
pub mod fetch;
pub mod manifest;
pub mod msi;
pub mod sdk;
pub mod sink;
pub mod vctools;
pub mod vfs;
