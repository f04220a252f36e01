use std::io;

/// Decodes the shared string pool from the `_StringData`/`_StringPool`
/// stream pair.
///
/// `_StringData` is the UTF-8 text of every string packed back to back;
/// `_StringPool` is a sequence of `(len: u16, refcount: u16)` records
/// walking that text. A record with `refcount > 0` and `len == 0` carries
/// its true length in a following `u32` (strings over 64 KiB); a record
/// with `refcount == 0` is an empty slot that consumes no text. Index 0 is
/// always the empty string.
pub fn decode_strings(
    string_data: &[u8],
    string_pool: &[u8],
) -> io::Result<Vec<String>> {
    let mut strings = Vec::new();
    let mut pool = string_pool;
    let mut offset = 0usize;
    loop {
        if pool.is_empty() {
            return Ok(strings);
        }
        if pool.len() < 4 {
            invalid_data!("Malformed string pool (truncated record)");
        }
        let len16 = u16::from_le_bytes([pool[0], pool[1]]);
        let refcount = u16::from_le_bytes([pool[2], pool[3]]);
        pool = &pool[4..];
        if refcount == 0 {
            strings.push(String::new());
            continue;
        }
        let length = if len16 == 0 {
            if pool.len() < 4 {
                invalid_data!(
                    "Malformed string pool (truncated 32-bit length)"
                );
            }
            let len32 =
                u32::from_le_bytes([pool[0], pool[1], pool[2], pool[3]]);
            pool = &pool[4..];
            len32 as usize
        } else {
            len16 as usize
        };
        let end = match offset.checked_add(length) {
            Some(end) if end <= string_data.len() => end,
            _ => invalid_data!(
                "Malformed string pool (record runs past the {} data bytes)",
                string_data.len()
            ),
        };
        strings.push(
            String::from_utf8_lossy(&string_data[offset..end]).into_owned(),
        );
        offset = end;
    }
}
