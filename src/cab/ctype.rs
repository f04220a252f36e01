use std::io;

const CTYPE_NONE: u16 = 0;
const CTYPE_MSZIP: u16 = 1;

/// A scheme for compressing data within the cabinet.
///
/// Only the schemes found in Windows SDK payloads are supported; Quantum
/// and LZX folders are rejected when the cabinet is opened.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompressionType {
    /// No compression.
    None,
    /// MSZIP compression: per-block raw DEFLATE with a shared 32 KiB
    /// history window, described further in
    /// [MS-MCI](https://msdn.microsoft.com/en-us/library/cc483131.aspx).
    MsZip,
}

impl CompressionType {
    /// Decodes the CFFOLDER compression bitfield. Only the low four bits
    /// select the scheme; the rest are parameters of schemes this reader
    /// does not support.
    pub(crate) fn from_bitfield(bits: u16) -> io::Result<CompressionType> {
        match bits & 0x000f {
            CTYPE_NONE => Ok(CompressionType::None),
            CTYPE_MSZIP => Ok(CompressionType::MsZip),
            _ => invalid_data!("Unsupported compression type: 0x{:04x}", bits),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CompressionType;

    #[test]
    fn compression_type_from_bitfield() {
        assert_eq!(
            CompressionType::from_bitfield(0x0).unwrap(),
            CompressionType::None
        );
        assert_eq!(
            CompressionType::from_bitfield(0x1).unwrap(),
            CompressionType::MsZip
        );
        // High bits are not part of the scheme selector.
        assert_eq!(
            CompressionType::from_bitfield(0xfff1).unwrap(),
            CompressionType::MsZip
        );
    }

    #[test]
    fn quantum_and_lzx_are_rejected() {
        // Quantum level 7, memory 20:
        assert!(CompressionType::from_bitfield(0x1472).is_err());
        // LZX with a 2 MiB window:
        assert!(CompressionType::from_bitfield(0x1503).is_err());
    }
}
