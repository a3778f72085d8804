//! Content-decoding pipeline.
//!
//! Accept-Encoding is sent explicitly for impersonation, so response bodies
//! arrive raw and are decoded here. gzip and deflate decode incrementally;
//! brotli and zstd buffer the compressed input and decode once at the end.
//! Unknown or absent encodings pass bytes through untouched.

use std::io::{self, Read, Write};

use flate2::write::{GzDecoder, ZlibDecoder};

/// Incremental decoder selected from a `Content-Encoding` header value.
pub enum ContentDecoder {
    /// No decoding; bytes pass through.
    Identity(Vec<u8>),
    /// RFC 1952 gzip.
    Gzip(GzDecoder<Vec<u8>>),
    /// RFC 1950 zlib stream (the HTTP `deflate` token).
    Deflate(ZlibDecoder<Vec<u8>>),
    /// Brotli; compressed input buffered, decoded at finish.
    Brotli(Vec<u8>),
    /// Zstandard; compressed input buffered, decoded at finish.
    Zstd(Vec<u8>),
}

impl ContentDecoder {
    /// Selects a decoder for a `Content-Encoding` value.
    ///
    /// Unrecognized or empty values yield the passthrough decoder.
    #[must_use]
    pub fn for_encoding(encoding: &str) -> Self {
        match encoding.trim().to_lowercase().as_str() {
            "gzip" | "x-gzip" => Self::Gzip(GzDecoder::new(Vec::new())),
            "deflate" => Self::Deflate(ZlibDecoder::new(Vec::new())),
            "br" => Self::Brotli(Vec::new()),
            "zstd" => Self::Zstd(Vec::new()),
            _ => Self::Identity(Vec::new()),
        }
    }

    /// Returns true when this decoder passes bytes through unchanged.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity(_))
    }

    /// Feeds one chunk of raw body bytes.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the compressed stream is malformed.
    pub fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        match self {
            Self::Identity(buffer) | Self::Brotli(buffer) | Self::Zstd(buffer) => {
                buffer.extend_from_slice(chunk);
                Ok(())
            }
            Self::Gzip(decoder) => decoder.write_all(chunk),
            Self::Deflate(decoder) => decoder.write_all(chunk),
        }
    }

    /// Finalizes the stream and returns the decoded bytes.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the stream was truncated or malformed.
    pub fn finish(self) -> io::Result<Vec<u8>> {
        match self {
            Self::Identity(buffer) => Ok(buffer),
            Self::Gzip(decoder) => decoder.finish(),
            Self::Deflate(decoder) => decoder.finish(),
            Self::Brotli(buffer) => {
                let mut decoded = Vec::new();
                brotli::Decompressor::new(io::Cursor::new(buffer), 4096)
                    .read_to_end(&mut decoded)?;
                Ok(decoded)
            }
            Self::Zstd(buffer) => zstd::decode_all(io::Cursor::new(buffer)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SOURCE: &[u8] =
        b"The quick brown fox jumps over the lazy dog, repeatedly, for compression's sake. \
          The quick brown fox jumps over the lazy dog.";

    fn decode_in_chunks(mut decoder: ContentDecoder, compressed: &[u8]) -> Vec<u8> {
        // Feed in small chunks to exercise the incremental path.
        for chunk in compressed.chunks(7) {
            decoder.write(chunk).unwrap();
        }
        decoder.finish().unwrap()
    }

    #[test]
    fn test_gzip_round_trip() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(SOURCE).unwrap();
        let compressed = encoder.finish().unwrap();

        let decoded = decode_in_chunks(ContentDecoder::for_encoding("gzip"), &compressed);
        assert_eq!(decoded, SOURCE);
    }

    #[test]
    fn test_deflate_round_trip() {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(SOURCE).unwrap();
        let compressed = encoder.finish().unwrap();

        let decoded = decode_in_chunks(ContentDecoder::for_encoding("deflate"), &compressed);
        assert_eq!(decoded, SOURCE);
    }

    #[test]
    fn test_brotli_round_trip() {
        let mut compressed = Vec::new();
        {
            let mut encoder = brotli::CompressorWriter::new(&mut compressed, 4096, 5, 22);
            encoder.write_all(SOURCE).unwrap();
        }

        let decoded = decode_in_chunks(ContentDecoder::for_encoding("br"), &compressed);
        assert_eq!(decoded, SOURCE);
    }

    #[test]
    fn test_zstd_round_trip() {
        let compressed = zstd::encode_all(io::Cursor::new(SOURCE), 3).unwrap();
        let decoded = decode_in_chunks(ContentDecoder::for_encoding("zstd"), &compressed);
        assert_eq!(decoded, SOURCE);
    }

    #[test]
    fn test_unknown_encoding_passes_through() {
        let decoder = ContentDecoder::for_encoding("compress");
        assert!(decoder.is_identity());
        let decoded = decode_in_chunks(decoder, SOURCE);
        assert_eq!(decoded, SOURCE);
    }

    #[test]
    fn test_absent_encoding_passes_through() {
        assert!(ContentDecoder::for_encoding("").is_identity());
    }

    #[test]
    fn test_case_insensitive_encoding_names() {
        assert!(!ContentDecoder::for_encoding("GZIP").is_identity());
        assert!(!ContentDecoder::for_encoding(" Br ").is_identity());
    }

    #[test]
    fn test_truncated_gzip_stream_errors() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(SOURCE).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut decoder = ContentDecoder::for_encoding("gzip");
        decoder.write(&compressed[..compressed.len() / 2]).unwrap();
        assert!(decoder.finish().is_err());
    }
}
