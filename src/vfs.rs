//! The clang-style virtual-filesystem overlay document.
//!
//! A sysroot extracted onto a case-sensitive filesystem keeps the original
//! mixed-case Windows names; the overlay gives tooling a case-insensitive
//! view by redirecting virtual paths to the real files on disk.

use std::io;

use serde::Serialize;

/// How a consumer resolves paths the overlay does not cover.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RedirectingWith {
    Fallthrough,
    Fallback,
    RedirectOnly,
}

/// The `vfsoverlay.yaml` document (JSON, despite the conventional name).
#[derive(Debug, Serialize)]
pub struct VfsOverlay {
    pub version: u32,
    #[serde(rename = "case-sensitive", skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,
    #[serde(
        rename = "use-external-names",
        skip_serializing_if = "Option::is_none"
    )]
    pub use_external_names: Option<bool>,
    #[serde(
        rename = "overlay-relative",
        skip_serializing_if = "Option::is_none"
    )]
    pub overlay_relative: Option<bool>,
    #[serde(
        rename = "redirecting-with",
        skip_serializing_if = "Option::is_none"
    )]
    pub redirecting_with: Option<RedirectingWith>,
    pub roots: Vec<Inode>,
}

/// A node of the overlay tree: a virtual directory, or a virtual file
/// redirecting to real content.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Inode {
    Directory {
        name: String,
        contents: Vec<Inode>,
    },
    File {
        name: String,
        #[serde(rename = "external-contents")]
        external_contents: String,
    },
}

impl Inode {
    /// Creates an empty directory inode.
    pub fn directory(name: impl Into<String>) -> Inode {
        Inode::Directory { name: name.into(), contents: Vec::new() }
    }

    /// Creates a file inode redirecting to `external_contents`.
    pub fn file(
        name: impl Into<String>,
        external_contents: impl Into<String>,
    ) -> Inode {
        Inode::File {
            name: name.into(),
            external_contents: external_contents.into(),
        }
    }

    /// Returns this node's name.
    pub fn name(&self) -> &str {
        match self {
            Inode::Directory { name, .. } => name,
            Inode::File { name, .. } => name,
        }
    }

    /// Places `inode` under the directory path `dir` (slash-separated,
    /// relative to `self`), creating intermediate directories as needed.
    /// Existing children are matched case-insensitively, per Windows path
    /// semantics; children keep their insertion order.
    pub fn place(&mut self, dir: &str, inode: Inode) -> io::Result<()> {
        let parts: Vec<&str> = dir
            .split('/')
            .filter(|part| !part.is_empty() && *part != ".")
            .collect();
        self.place_parts(&parts, inode)
    }

    fn place_parts(&mut self, dir: &[&str], inode: Inode) -> io::Result<()> {
        let contents = match self {
            Inode::Directory { contents, .. } => contents,
            Inode::File { name, .. } => {
                invalid_input!(
                    "Failed placing inode: {:?} is not a directory",
                    name
                );
            }
        };
        let (head, rest) = match dir.split_first() {
            Some(split) => split,
            None => {
                contents.push(inode);
                return Ok(());
            }
        };
        if let Some(child) = contents
            .iter_mut()
            .find(|child| child.name().eq_ignore_ascii_case(head))
        {
            return child.place_parts(rest, inode);
        }
        let mut child = Inode::directory(*head);
        child.place_parts(rest, inode)?;
        contents.push(child);
        Ok(())
    }
}
