use std::io::{self, Read};

/// A reader adapter that yields exactly `limit` bytes of its inner reader.
///
/// Reaching the limit reads as a clean end-of-stream, while the inner
/// reader running dry first is reported as `ErrorKind::UnexpectedEof`, so
/// framing truncation is never mistaken for an honest end of data.
#[derive(Debug)]
pub struct ExactReader<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> ExactReader<R> {
    /// Bounds `inner` to `limit` bytes.
    pub fn new(inner: R, limit: u64) -> ExactReader<R> {
        ExactReader { inner, remaining: limit }
    }

    /// Returns the number of bytes not yet produced.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Reads and discards whatever is left of the bounded region, leaving
    /// the inner reader positioned just past it.
    pub fn exhaust(&mut self) -> io::Result<()> {
        io::copy(self, &mut io::sink())?;
        Ok(())
    }

    /// Unwraps the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for ExactReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let max_bytes = self.remaining.min(buf.len() as u64) as usize;
        let bytes_read = self.inner.read(&mut buf[..max_bytes])?;
        if bytes_read == 0 {
            truncated!(
                "Truncated stream ({} bytes missing)",
                self.remaining
            );
        }
        self.remaining -= bytes_read as u64;
        Ok(bytes_read)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, ErrorKind, Read};

    use super::ExactReader;

    #[test]
    fn stops_at_the_limit() {
        let mut inner = Cursor::new(b"hello, world".to_vec());
        let mut reader = ExactReader::new(&mut inner, 5);
        let mut data = Vec::new();
        reader.read_to_end(&mut data).unwrap();
        assert_eq!(data, b"hello");
        assert_eq!(reader.remaining(), 0);
        assert_eq!(inner.position(), 5);
    }

    #[test]
    fn early_inner_eof_is_an_error() {
        let mut reader = ExactReader::new(Cursor::new(b"abc".to_vec()), 5);
        let mut data = Vec::new();
        let err = reader.read_to_end(&mut data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn exhaust_skips_past_the_region() {
        let mut inner = Cursor::new(b"0123456789".to_vec());
        let mut reader = ExactReader::new(&mut inner, 4);
        let mut first = [0u8; 2];
        reader.read_exact(&mut first).unwrap();
        reader.exhaust().unwrap();
        assert_eq!(inner.position(), 4);
        let mut rest = Vec::new();
        inner.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"456789");
    }
}
