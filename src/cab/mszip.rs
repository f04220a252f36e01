use std::io;

const MSZIP_SIGNATURE: [u8; 2] = *b"CK";
const DEFLATE_MAX_DICT_LEN: usize = 0x8000;

/// Decompresses a folder's MSZIP data blocks in order.
///
/// Each block is a raw DEFLATE stream prefixed with `CK`, but the 32 KiB
/// sliding dictionary is shared across the whole folder: block *k+1* may
/// back-reference into the last 32 KiB of block *k*'s output. The
/// dictionary is preserved here and fed to the decoder ahead of each block
/// as a synthetic stored block.
#[derive(Debug)]
pub struct MsZipDecompressor {
    decompressor: flate2::Decompress,
    dictionary: Vec<u8>,
}

impl MsZipDecompressor {
    pub fn new() -> MsZipDecompressor {
        MsZipDecompressor {
            decompressor: flate2::Decompress::new(false),
            dictionary: Vec::with_capacity(DEFLATE_MAX_DICT_LEN),
        }
    }

    /// Decompresses one data block (signature included) into exactly
    /// `uncompressed_size` bytes.
    pub fn decompress_block(
        &mut self,
        data: &[u8],
        uncompressed_size: usize,
    ) -> io::Result<Vec<u8>> {
        if data.len() < MSZIP_SIGNATURE.len()
            || data[..MSZIP_SIGNATURE.len()] != MSZIP_SIGNATURE
        {
            invalid_data!(
                "MSZIP decompression failed: Invalid block signature"
            );
        }
        let data = &data[MSZIP_SIGNATURE.len()..];
        // Reset the decoder, then prime it with the previous block's tail,
        // wrapped as a non-final stored block so the DEFLATE state machine
        // accepts it ahead of the real data:
        self.decompressor.reset(false);
        if !self.dictionary.is_empty() {
            debug_assert!(self.dictionary.len() <= DEFLATE_MAX_DICT_LEN);
            let length = self.dictionary.len() as u16;
            let mut chunk: Vec<u8> = vec![0];
            chunk.extend_from_slice(&length.to_le_bytes());
            chunk.extend_from_slice(&(!length).to_le_bytes());
            chunk.extend_from_slice(&self.dictionary);
            let mut out = Vec::with_capacity(self.dictionary.len());
            let flush = flate2::FlushDecompress::Sync;
            match self.decompressor.decompress_vec(&chunk, &mut out, flush) {
                Ok(flate2::Status::Ok) => {}
                _ => unreachable!(),
            }
        }
        // Decompress the block itself:
        let mut out = Vec::<u8>::with_capacity(uncompressed_size);
        let flush = flate2::FlushDecompress::Finish;
        match self.decompressor.decompress_vec(data, &mut out, flush) {
            Ok(_) => {}
            Err(error) => {
                invalid_data!("MSZIP decompression failed: {}", error);
            }
        }
        if out.len() != uncompressed_size {
            invalid_data!(
                "MSZIP decompression failed: Incorrect uncompressed size \
                 (expected {}, was actually {})",
                uncompressed_size,
                out.len()
            );
        }
        // Retain the tail as the next block's dictionary:
        if out.len() >= DEFLATE_MAX_DICT_LEN {
            let start = out.len() - DEFLATE_MAX_DICT_LEN;
            self.dictionary.clear();
            self.dictionary.extend_from_slice(&out[start..]);
        } else {
            let total = self.dictionary.len() + out.len();
            if total > DEFLATE_MAX_DICT_LEN {
                self.dictionary.drain(..(total - DEFLATE_MAX_DICT_LEN));
            }
            self.dictionary.extend_from_slice(&out);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::MsZipDecompressor;

    // Emits one MSZIP block. The compressor is shared across calls so a
    // later block's DEFLATE stream back-references earlier output, the
    // same way the Microsoft tooling frames SDK cabinets.
    fn mszip_block(
        compressor: &mut flate2::Compress,
        data: &[u8],
        is_last_block: bool,
    ) -> Vec<u8> {
        assert!(data.len() <= 0x8000);
        let mut out = vec![b'C', b'K'];
        out.reserve(0xffff);
        let flush = if is_last_block {
            flate2::FlushCompress::Finish
        } else {
            flate2::FlushCompress::Sync
        };
        compressor.compress_vec(data, &mut out, flush).unwrap();
        if !is_last_block {
            out.extend_from_slice(&0x0003u16.to_le_bytes());
        }
        out
    }

    fn repeat_text(phrase: &str, len: usize) -> Vec<u8> {
        let mut text = Vec::with_capacity(len + phrase.len());
        while text.len() < len {
            text.extend_from_slice(phrase.as_bytes());
        }
        text.truncate(len);
        text
    }

    #[test]
    fn decompress_stored_block() {
        // A hand-assembled block: "CK", then a final stored DEFLATE block
        // (0x01), LEN = 13, NLEN = !13, and the raw bytes.
        let block = b"CK\x01\x0d\x00\xf2\xff#pragma once\n";
        let mut decompressor = MsZipDecompressor::new();
        let output = decompressor.decompress_block(block, 13).unwrap();
        assert_eq!(output, b"#pragma once\n");
    }

    #[test]
    fn signature_is_required() {
        let mut decompressor = MsZipDecompressor::new();
        assert!(decompressor
            .decompress_block(b"XX\x01\x02\x00\xfd\xffhi", 2)
            .is_err());
        assert!(decompressor.decompress_block(b"C", 0).is_err());
    }

    #[test]
    fn output_length_is_checked() {
        let block = b"CK\x01\x0d\x00\xf2\xff#pragma once\n";
        let mut decompressor = MsZipDecompressor::new();
        assert!(decompressor.decompress_block(block, 14).is_err());
    }

    #[test]
    fn corrupt_stream_is_an_error() {
        // The stored block's NLEN complement is wrong.
        let block = b"CK\x01\x0d\x00\x00\x00#pragma once\n";
        let mut decompressor = MsZipDecompressor::new();
        assert!(decompressor.decompress_block(block, 13).is_err());
    }

    #[test]
    fn single_block_round_trip() {
        let original = repeat_text(
            "#define WSADESCRIPTION_LEN 256\n#define WSASYS_STATUS_LEN 128\n",
            700,
        );
        let mut compressor =
            flate2::Compress::new(flate2::Compression::best(), false);
        let block = mszip_block(&mut compressor, &original, true);
        assert!(block.len() < original.len());
        let mut decompressor = MsZipDecompressor::new();
        let output =
            decompressor.decompress_block(&block, original.len()).unwrap();
        assert_eq!(output, original);
    }

    #[test]
    fn window_carries_across_blocks() {
        // Each block repeats phrasing from the one before it, so their
        // streams only decode if the 32 KiB history survives the block
        // boundary.
        let part1 = repeat_text("#define WINAPI __stdcall\n", 1500);
        let part2 = repeat_text("#define WINAPI __stdcall\r\n", 1200);
        let part3 = repeat_text("#define CALLBACK __stdcall\n", 900);
        let mut compressor =
            flate2::Compress::new(flate2::Compression::best(), false);
        let block1 = mszip_block(&mut compressor, &part1, false);
        let block2 = mszip_block(&mut compressor, &part2, false);
        let block3 = mszip_block(&mut compressor, &part3, true);
        let mut decompressor = MsZipDecompressor::new();
        let output1 =
            decompressor.decompress_block(&block1, part1.len()).unwrap();
        let output2 =
            decompressor.decompress_block(&block2, part2.len()).unwrap();
        let output3 =
            decompressor.decompress_block(&block3, part3.len()).unwrap();
        assert_eq!(output1, part1);
        assert_eq!(output2, part2);
        assert_eq!(output3, part3);
    }
}
