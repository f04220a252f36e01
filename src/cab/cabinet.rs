use std::io::{self, Read, Seek, SeekFrom};
use std::slice;

use byteorder::{LittleEndian, ReadBytesExt};
use time::PrimitiveDateTime;

use crate::cab::consts;
use crate::cab::ctype::CompressionType;
use crate::cab::datetime::datetime_from_bits;
use crate::cab::exact::ExactReader;
use crate::cab::mszip::MsZipDecompressor;

/// A structure for reading a cabinet file.
///
/// Files are produced in `(folder, offset)` order by [`Cabinet::next`];
/// after each call the cabinet itself acts as a [`Read`] over that file's
/// bytes. [`Cabinet::content_of`] offers random access by name instead.
#[derive(Debug)]
pub struct Cabinet<R> {
    reader: R,
    folders: Vec<FolderEntry>,
    files: Vec<FileEntry>,
    next_file: usize,
    // Folders are decompressed whole because files within a folder may
    // overlap in the uncompressed address space; the current file is a
    // window into this buffer.
    loaded_folder: Option<u16>,
    folder_buf: Vec<u8>,
    content_pos: usize,
    content_end: usize,
}

#[derive(Debug)]
struct FolderEntry {
    first_data_block_offset: u32,
    num_data_blocks: u16,
    compression_type: CompressionType,
}

/// Metadata about one file stored in a cabinet.
#[derive(Debug)]
pub struct FileEntry {
    name: String,
    folder_index: u16,
    datetime: Option<PrimitiveDateTime>,
    uncompressed_size: u32,
    uncompressed_offset: u32,
    attributes: u16,
}

impl FileEntry {
    /// Returns the name of file.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the datetime for this file.  According to the CAB spec, this
    /// "is typically considered the 'last modified' time in local time, but
    /// the actual definition is application-defined".
    /// Note that this will return [None] if the datetime in the cabinet file
    /// was not a valid date/time.
    pub fn datetime(&self) -> Option<PrimitiveDateTime> {
        self.datetime
    }

    /// Returns the total size of the file when decompressed, in bytes.
    pub fn uncompressed_size(&self) -> u32 {
        self.uncompressed_size
    }

    /// Returns true if this file has the "name is UTF" attribute set.
    pub fn is_name_utf(&self) -> bool {
        (self.attributes & consts::ATTR_NAME_IS_UTF) != 0
    }
}

/// An iterator over the file entries in a cabinet, in extraction order.
#[derive(Clone)]
pub struct FileEntries<'a> {
    iter: slice::Iter<'a, FileEntry>,
}

impl<'a> Iterator for FileEntries<'a> {
    type Item = &'a FileEntry;

    fn next(&mut self) -> Option<&'a FileEntry> {
        self.iter.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl<'a> ExactSizeIterator for FileEntries<'a> {}

/// Header describing the file most recently produced by [`Cabinet::next`].
#[derive(Debug)]
pub struct Header {
    name: String,
    size: u32,
    datetime: Option<PrimitiveDateTime>,
}

impl Header {
    /// Returns the name of the file, including its path inside the cabinet.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the decompressed size of the file in bytes.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Returns the file's timestamp, if it decodes to a valid date/time.
    pub fn datetime(&self) -> Option<PrimitiveDateTime> {
        self.datetime
    }
}

impl<R: Read + Seek> Cabinet<R> {
    /// Open an existing cabinet file.
    pub fn new(mut reader: R) -> io::Result<Cabinet<R>> {
        let signature = reader.read_u32::<LittleEndian>()?;
        if signature != consts::FILE_SIGNATURE {
            invalid_data!("Not a cabinet file (invalid file signature)");
        }
        let reserved1 = reader.read_u32::<LittleEndian>()?;
        let _total_size = reader.read_u32::<LittleEndian>()?;
        let reserved2 = reader.read_u32::<LittleEndian>()?;
        let first_file_offset = reader.read_u32::<LittleEndian>()?;
        let reserved3 = reader.read_u32::<LittleEndian>()?;
        if reserved1 != 0 || reserved2 != 0 || reserved3 != 0 {
            invalid_data!("Reserved header fields must be zero");
        }
        let minor_version = reader.read_u8()?;
        let major_version = reader.read_u8()?;
        if (major_version, minor_version)
            != (consts::VERSION_MAJOR, consts::VERSION_MINOR)
        {
            invalid_data!(
                "Version {}.{} cabinet files are not supported",
                major_version,
                minor_version
            );
        }
        let num_folders = reader.read_u16::<LittleEndian>()? as usize;
        let num_files = reader.read_u16::<LittleEndian>()? as usize;
        let flags = reader.read_u16::<LittleEndian>()?;
        let _cabinet_set_id = reader.read_u16::<LittleEndian>()?;
        let _cabinet_set_index = reader.read_u16::<LittleEndian>()?;
        if (flags & (consts::FLAG_PREV_CABINET | consts::FLAG_NEXT_CABINET))
            != 0
        {
            invalid_data!("Multi-part cabinet files are not supported");
        }
        if (flags & consts::FLAG_RESERVE_PRESENT) != 0 {
            let header_reserve_size = reader.read_u16::<LittleEndian>()?;
            let folder_reserve_size = reader.read_u8()?;
            let data_reserve_size = reader.read_u8()?;
            if folder_reserve_size != 0 || data_reserve_size != 0 {
                invalid_data!(
                    "Cabinets with per-folder or per-block reserve areas \
                     are not supported"
                );
            }
            if header_reserve_size > 0 {
                let mut header_reserve_data =
                    vec![0u8; header_reserve_size as usize];
                reader.read_exact(&mut header_reserve_data)?;
            }
        }
        let mut folders = Vec::with_capacity(num_folders);
        for _ in 0..num_folders {
            let first_data_offset = reader.read_u32::<LittleEndian>()?;
            let num_data_blocks = reader.read_u16::<LittleEndian>()?;
            let compression_bits = reader.read_u16::<LittleEndian>()?;
            let compression_type =
                CompressionType::from_bitfield(compression_bits)?;
            folders.push(FolderEntry {
                first_data_block_offset: first_data_offset,
                num_data_blocks,
                compression_type,
            });
        }
        reader.seek(SeekFrom::Start(first_file_offset as u64))?;
        let mut files = Vec::with_capacity(num_files);
        for _ in 0..num_files {
            let uncompressed_size = reader.read_u32::<LittleEndian>()?;
            let uncompressed_offset = reader.read_u32::<LittleEndian>()?;
            let folder_index = reader.read_u16::<LittleEndian>()?;
            if folder_index as usize >= folders.len() {
                invalid_data!("File entry folder index out of bounds");
            }
            let date = reader.read_u16::<LittleEndian>()?;
            let time = reader.read_u16::<LittleEndian>()?;
            let datetime = datetime_from_bits(date, time);
            let attributes = reader.read_u16::<LittleEndian>()?;
            let is_utf8 = (attributes & consts::ATTR_NAME_IS_UTF) != 0;
            let name = read_null_terminated_string(&mut reader, is_utf8)?;
            files.push(FileEntry {
                name,
                folder_index,
                datetime,
                uncompressed_size,
                uncompressed_offset,
                attributes,
            });
        }
        files.sort_by_key(|file| (file.folder_index, file.uncompressed_offset));
        Ok(Cabinet {
            reader,
            folders,
            files,
            next_file: 0,
            loaded_folder: None,
            folder_buf: Vec::new(),
            content_pos: 0,
            content_end: 0,
        })
    }

    /// Returns an iterator over the file entries in this cabinet, sorted
    /// into the order [`Cabinet::next`] produces them.
    pub fn file_entries(&self) -> FileEntries {
        FileEntries { iter: self.files.iter() }
    }

    /// Advances to the next file and returns its header, or `None` once
    /// every file has been produced. The file's bytes are then available
    /// through this cabinet's [`Read`] impl, up to the following call.
    pub fn next(&mut self) -> io::Result<Option<Header>> {
        if self.next_file >= self.files.len() {
            return Ok(None);
        }
        let folder_index = self.files[self.next_file].folder_index;
        if self.loaded_folder != Some(folder_index) {
            let mut buf = Vec::new();
            let folder = &self.folders[folder_index as usize];
            let mut stream = FolderStream::new(&mut self.reader, folder)?;
            stream.read_to_end(&mut buf)?;
            self.folder_buf = buf;
            self.loaded_folder = Some(folder_index);
        }
        let entry = &self.files[self.next_file];
        let offset = entry.uncompressed_offset as u64;
        let size = entry.uncompressed_size as u64;
        if offset + size > self.folder_buf.len() as u64 {
            invalid_data!(
                "File segment out of range (folder holds {} bytes, file \
                 {:?} wants {}..{})",
                self.folder_buf.len(),
                entry.name,
                offset,
                offset + size
            );
        }
        self.content_pos = offset as usize;
        self.content_end = (offset + size) as usize;
        self.next_file += 1;
        Ok(Some(Header {
            name: entry.name.clone(),
            size: entry.uncompressed_size,
            datetime: entry.datetime,
        }))
    }

    /// Returns a one-shot reader over the decompressed content of the named
    /// file, driving the block decoder as a stream instead of materializing
    /// the folder. The borrow it holds keeps sequential iteration and named
    /// lookup from being interleaved.
    pub fn content_of(&mut self, name: &str) -> io::Result<FileContent<R>> {
        let (folder_index, offset, size) = match self
            .files
            .iter()
            .find(|file| file.name == name)
        {
            Some(file) => (
                file.folder_index as usize,
                file.uncompressed_offset as u64,
                file.uncompressed_size as u64,
            ),
            None => not_found!("No such file in cabinet: {:?}", name),
        };
        let folder = &self.folders[folder_index];
        let mut stream = FolderStream::new(&mut self.reader, folder)?;
        ExactReader::new(&mut stream, offset).exhaust()?;
        Ok(FileContent { inner: ExactReader::new(stream, size) })
    }
}

impl<R: Read + Seek> Read for Cabinet<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let max_bytes = buf.len().min(self.content_end - self.content_pos);
        if max_bytes == 0 {
            return Ok(0);
        }
        buf[..max_bytes].copy_from_slice(
            &self.folder_buf[self.content_pos..self.content_pos + max_bytes],
        );
        self.content_pos += max_bytes;
        Ok(max_bytes)
    }
}

/// Reader over a single file's bytes, produced by [`Cabinet::content_of`].
#[derive(Debug)]
pub struct FileContent<'a, R> {
    inner: ExactReader<FolderStream<'a, R>>,
}

impl<'a, R: Read + Seek> Read for FileContent<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Streaming decoder over a folder's data blocks: bytes come out in folder
/// order, with the MSZIP history window carried across block boundaries.
#[derive(Debug)]
struct FolderStream<'a, R> {
    reader: &'a mut R,
    compression: CompressionType,
    blocks_left: u16,
    decompressor: MsZipDecompressor,
    block: Vec<u8>,
    pos: usize,
}

impl<'a, R: Read + Seek> FolderStream<'a, R> {
    fn new(
        reader: &'a mut R,
        entry: &FolderEntry,
    ) -> io::Result<FolderStream<'a, R>> {
        reader.seek(SeekFrom::Start(entry.first_data_block_offset as u64))?;
        Ok(FolderStream {
            reader,
            compression: entry.compression_type,
            blocks_left: entry.num_data_blocks,
            decompressor: MsZipDecompressor::new(),
            block: Vec::new(),
            pos: 0,
        })
    }

    fn load_block(&mut self) -> io::Result<()> {
        // The checksum is read and ignored; see the module docs.
        let _checksum = self.reader.read_u32::<LittleEndian>()?;
        let compressed_size = self.reader.read_u16::<LittleEndian>()?;
        let uncompressed_size = self.reader.read_u16::<LittleEndian>()?;
        let mut payload =
            ExactReader::new(&mut *self.reader, compressed_size as u64);
        let mut data = Vec::with_capacity(compressed_size as usize);
        payload.read_to_end(&mut data)?;
        self.block = match self.compression {
            CompressionType::None => {
                if compressed_size != uncompressed_size {
                    invalid_data!(
                        "Stored data block sizes disagree ({} compressed, \
                         {} uncompressed)",
                        compressed_size,
                        uncompressed_size
                    );
                }
                data
            }
            CompressionType::MsZip => self
                .decompressor
                .decompress_block(&data, uncompressed_size as usize)?,
        };
        self.pos = 0;
        self.blocks_left -= 1;
        Ok(())
    }
}

impl<'a, R: Read + Seek> Read for FolderStream<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos == self.block.len() {
            if self.blocks_left == 0 {
                return Ok(0);
            }
            self.load_block()?;
        }
        let max_bytes = buf.len().min(self.block.len() - self.pos);
        buf[..max_bytes]
            .copy_from_slice(&self.block[self.pos..self.pos + max_bytes]);
        self.pos += max_bytes;
        Ok(max_bytes)
    }
}

fn read_null_terminated_string<R: Read>(
    reader: &mut R,
    _is_utf8: bool,
) -> io::Result<String> {
    let mut bytes = Vec::<u8>::with_capacity(consts::MAX_STRING_SIZE);
    loop {
        let byte = reader.read_u8()?;
        if byte == 0 {
            break;
        } else if bytes.len() == consts::MAX_STRING_SIZE {
            invalid_data!(
                "String longer than maximum of {} bytes",
                consts::MAX_STRING_SIZE
            );
        }
        bytes.push(byte);
    }
    Ok(String::from_utf8_lossy(&bytes).to_string())
}
