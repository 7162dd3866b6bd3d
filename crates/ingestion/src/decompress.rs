//! Push-based gzip decoding for chunked network streams.

use std::io::Write;

use flate2::write::GzDecoder;

use hazard_common::{LoadError, LoadResult};

/// Incremental gzip decoder.
///
/// Compressed chunks are pushed in as they arrive from the network; each
/// push returns whatever plaintext decoded so far, keeping memory bounded
/// by the chunk size rather than the file size.
pub struct GzipStream {
    decoder: GzDecoder<Vec<u8>>,
}

impl GzipStream {
    pub fn new() -> Self {
        Self {
            decoder: GzDecoder::new(Vec::new()),
        }
    }

    /// Feed one compressed chunk, returning the bytes decoded so far.
    pub fn push(&mut self, chunk: &[u8]) -> LoadResult<Vec<u8>> {
        self.decoder
            .write_all(chunk)
            .map_err(|e| LoadError::Stream(format!("Gzip decode failed: {}", e)))?;
        self.decoder
            .flush()
            .map_err(|e| LoadError::Stream(format!("Gzip decode failed: {}", e)))?;
        Ok(std::mem::take(self.decoder.get_mut()))
    }

    /// Verify the gzip trailer and return any remaining decoded bytes.
    pub fn finish(self) -> LoadResult<Vec<u8>> {
        self.decoder
            .finish()
            .map_err(|e| LoadError::Stream(format!("Truncated or corrupt gzip stream: {}", e)))
    }
}

impl Default for GzipStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_single_push() {
        let compressed = gzip(b"hello,world\n");
        let mut stream = GzipStream::new();
        let mut out = stream.push(&compressed).unwrap();
        out.extend(stream.finish().unwrap());
        assert_eq!(out, b"hello,world\n");
    }

    #[test]
    fn test_chunked_pushes_reassemble() {
        let plain = b"40.0,-105.0,0.5,1.0,1.5\n40.1,-105.0,0.6,1.1,1.6\n".repeat(64);
        let compressed = gzip(&plain);

        // Feed the compressed bytes in awkward chunk sizes.
        for chunk_size in [1, 7, 64, compressed.len()] {
            let mut stream = GzipStream::new();
            let mut out = Vec::new();
            for chunk in compressed.chunks(chunk_size) {
                out.extend(stream.push(chunk).unwrap());
            }
            out.extend(stream.finish().unwrap());
            assert_eq!(out, plain, "chunk size {}", chunk_size);
        }
    }

    #[test]
    fn test_truncated_stream_rejected() {
        let compressed = gzip(b"some data that will be cut off mid-stream");
        let mut stream = GzipStream::new();
        stream.push(&compressed[..compressed.len() / 2]).unwrap();
        assert!(stream.finish().is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        let mut stream = GzipStream::new();
        let pushed = stream.push(b"definitely not gzip data");
        let result = pushed.and_then(|_| stream.finish());
        assert!(result.is_err());
    }
}
