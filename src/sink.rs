//! Write targets for the extracted sysroot: a plain directory tree, a
//! zstd-compressed tar stream, and the VFS-recording layer wrapped around
//! either.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use time::{OffsetDateTime, PrimitiveDateTime};

use crate::vfs::{Inode, RedirectingWith, VfsOverlay};

/// The overlay entry appended to every target at close.
pub const VFS_OVERLAY_NAME: &str = "vfsoverlay.yaml";

/// A sink for extracted files.
///
/// `create` opens the next entry; the [`Write`] impl then receives exactly
/// `size` bytes for it, followed by another `create` or a final `close`.
pub trait Target: Write {
    /// Starts a new entry at `path` (slash-separated, relative).
    fn create(
        &mut self,
        path: &str,
        size: u64,
        mod_time: Option<PrimitiveDateTime>,
    ) -> io::Result<()>;

    /// Finishes the target, flushing and releasing underlying resources.
    fn close(&mut self) -> io::Result<()>;
}

impl Target for Box<dyn Target> {
    fn create(
        &mut self,
        path: &str,
        size: u64,
        mod_time: Option<PrimitiveDateTime>,
    ) -> io::Result<()> {
        (**self).create(path, size, mod_time)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Writes entries into a directory tree, creating parent directories on
/// demand (mode 0755; files are 0644). Modification times are left to the
/// filesystem.
pub struct DirectoryTarget {
    root: PathBuf,
    current: Option<File>,
}

impl DirectoryTarget {
    pub fn new(root: impl Into<PathBuf>) -> DirectoryTarget {
        DirectoryTarget { root: root.into(), current: None }
    }
}

impl Write for DirectoryTarget {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.current {
            Some(ref mut file) => file.write(buf),
            None => invalid_input!("No open entry in directory target"),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.current {
            Some(ref mut file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl Target for DirectoryTarget {
    fn create(
        &mut self,
        path: &str,
        _size: u64,
        _mod_time: Option<PrimitiveDateTime>,
    ) -> io::Result<()> {
        self.current = None;
        let target = self.root.join(path);
        let file = match create_file(&target) {
            Ok(file) => file,
            Err(ref err) if err.kind() == io::ErrorKind::NotFound => {
                if let Some(parent) = target.parent() {
                    fs::DirBuilder::new()
                        .recursive(true)
                        .mode(0o755)
                        .create(parent)?;
                }
                create_file(&target)?
            }
            Err(err) => return Err(err),
        };
        self.current = Some(file);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.current = None;
        Ok(())
    }
}

fn create_file(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o644)
        .open(path)
}

/// Writes entries as a zstd-compressed USTAR stream: tar over zstd over
/// the inner writer, released in that order at close.
pub struct ArchiveTarget<W: Write> {
    builder: Option<tar::Builder<zstd::stream::write::Encoder<'static, W>>>,
    pending: Option<PendingEntry>,
}

// tar wants whole entries, so the bytes of the entry being written are
// gathered here and appended when the next create (or close) arrives.
// Entry sizes are announced up front and bounded by folder sizes.
struct PendingEntry {
    path: String,
    size: u64,
    mtime: u64,
    data: Vec<u8>,
}

impl<W: Write> ArchiveTarget<W> {
    pub fn new(writer: W) -> io::Result<ArchiveTarget<W>> {
        let encoder = zstd::stream::write::Encoder::new(writer, 0)?;
        Ok(ArchiveTarget {
            builder: Some(tar::Builder::new(encoder)),
            pending: None,
        })
    }

    fn flush_pending(&mut self) -> io::Result<()> {
        let entry = match self.pending.take() {
            Some(entry) => entry,
            None => return Ok(()),
        };
        if entry.data.len() as u64 != entry.size {
            invalid_data!(
                "Archive entry {:?} received {} bytes, expected {}",
                entry.path,
                entry.data.len(),
                entry.size
            );
        }
        let builder = match self.builder {
            Some(ref mut builder) => builder,
            None => invalid_input!("Archive target is already closed"),
        };
        let mut header = tar::Header::new_ustar();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(entry.size);
        header.set_mode(0o644);
        header.set_mtime(entry.mtime);
        builder.append_data(&mut header, &entry.path, entry.data.as_slice())
    }
}

impl<W: Write> Write for ArchiveTarget<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.pending {
            Some(ref mut entry) => {
                entry.data.extend_from_slice(buf);
                Ok(buf.len())
            }
            None => invalid_input!("No open entry in archive target"),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<W: Write> Target for ArchiveTarget<W> {
    fn create(
        &mut self,
        path: &str,
        size: u64,
        mod_time: Option<PrimitiveDateTime>,
    ) -> io::Result<()> {
        self.flush_pending()?;
        // MS-DOS timestamps carry no zone; they are taken as UTC here.
        let mtime = mod_time
            .map(|dt| dt.assume_utc().unix_timestamp().max(0) as u64)
            .unwrap_or(0);
        self.pending = Some(PendingEntry {
            path: path.to_string(),
            size,
            mtime,
            data: Vec::with_capacity(size as usize),
        });
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.flush_pending()?;
        match self.builder.take() {
            Some(builder) => {
                let encoder = builder.into_inner()?;
                let mut writer = encoder.finish()?;
                writer.flush()
            }
            None => Ok(()),
        }
    }
}

/// Records every created entry in a VFS overlay while forwarding to an
/// inner target, then appends the overlay document as a final
/// [`VFS_OVERLAY_NAME`] entry at close.
pub struct VfsTarget<T: Target> {
    inner: T,
    root: Inode,
}

impl<T: Target> VfsTarget<T> {
    /// Wraps `inner`; `sysroot_path` names the overlay's root directory
    /// (the extraction directory, or the mount point for archives).
    pub fn new(inner: T, sysroot_path: &str) -> VfsTarget<T> {
        VfsTarget { inner, root: Inode::directory(sysroot_path) }
    }
}

impl<T: Target> Write for VfsTarget<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<T: Target> Target for VfsTarget<T> {
    fn create(
        &mut self,
        path: &str,
        size: u64,
        mod_time: Option<PrimitiveDateTime>,
    ) -> io::Result<()> {
        let (dir, base) = match path.rsplit_once('/') {
            Some(split) => split,
            None => ("", path),
        };
        self.root.place(dir, Inode::file(base, path))?;
        self.inner.create(path, size, mod_time)
    }

    fn close(&mut self) -> io::Result<()> {
        let root =
            std::mem::replace(&mut self.root, Inode::directory(""));
        let overlay = VfsOverlay {
            version: 0,
            case_sensitive: Some(false),
            use_external_names: None,
            overlay_relative: Some(true),
            redirecting_with: Some(RedirectingWith::Fallthrough),
            roots: vec![root],
        };
        let encoded = serde_json::to_vec_pretty(&overlay)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        let now = OffsetDateTime::now_utc();
        let now = PrimitiveDateTime::new(now.date(), now.time());
        self.inner.create(VFS_OVERLAY_NAME, encoded.len() as u64, Some(now))?;
        self.inner.write_all(&encoded)?;
        self.inner.close()
    }
}
