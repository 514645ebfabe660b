// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Page compression codecs behind a common [`Codec`] interface. Each codec
//! is gated by the cargo feature of the crate providing it; requesting a
//! codec whose feature is disabled fails at runtime with a
//! [`Compression`](crate::errors::Error::Compression) error.

use crate::basic::Compression;
use crate::errors::Result;

/// A compression codec. Decompression exists so written pages can be read
/// back for verification.
pub trait Codec: Send {
    /// Compresses `input` and appends the result to `output`.
    fn compress(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()>;

    /// Decompresses `input` into `output`, returning the number of bytes
    /// appended. `uncompressed_size` is required by codecs whose block
    /// format does not self-describe (LZ4_RAW).
    fn decompress(
        &mut self,
        input: &[u8],
        output: &mut Vec<u8>,
        uncompressed_size: Option<usize>,
    ) -> Result<usize>;
}

/// Instantiates the codec for `compression`, or `None` for UNCOMPRESSED.
pub fn create_codec(compression: Compression) -> Result<Option<Box<dyn Codec>>> {
    match compression {
        Compression::UNCOMPRESSED => Ok(None),
        #[cfg(feature = "snap")]
        Compression::SNAPPY => Ok(Some(Box::new(SnappyCodec::new()))),
        #[cfg(feature = "flate2")]
        Compression::GZIP(level) => Ok(Some(Box::new(GzipCodec::new(level)))),
        #[cfg(feature = "brotli")]
        Compression::BROTLI(level) => Ok(Some(Box::new(BrotliCodec::new(level)))),
        #[cfg(feature = "zstd")]
        Compression::ZSTD(level) => Ok(Some(Box::new(ZstdCodec::new(level)))),
        #[cfg(feature = "lz4")]
        Compression::LZ4_RAW => Ok(Some(Box::new(Lz4RawCodec::new()))),
        #[allow(unreachable_patterns)]
        other => Err(compression_err!(
            "support for codec {} is not enabled in this build",
            other
        )),
    }
}

macro_rules! codec_level {
    ($(#[$attrs:meta])* $name:ident($repr:ty), $min:expr, $max:expr, $default:expr) => {
        $(#[$attrs])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name($repr);

        impl $name {
            /// Validates and wraps a compression level.
            pub fn try_new(level: $repr) -> Result<Self> {
                if ($min..=$max).contains(&level) {
                    Ok(Self(level))
                } else {
                    Err(compression_err!(
                        "valid range for {} is {}..={}, got {}",
                        stringify!($name),
                        $min,
                        $max,
                        level
                    ))
                }
            }

            pub fn compression_level(&self) -> $repr {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self($default)
            }
        }
    };
}

codec_level!(
    /// Gzip effort, 0 (store) to 9 (best).
    GzipLevel(u32), 0, 9, 6
);
codec_level!(
    /// Brotli quality, 0 to 11.
    BrotliLevel(u32), 0, 11, 1
);
codec_level!(
    /// Zstandard level, 1 to 22.
    ZstdLevel(i32), 1, 22, 1
);

#[cfg(feature = "snap")]
struct SnappyCodec {
    encoder: snap::raw::Encoder,
    decoder: snap::raw::Decoder,
}

#[cfg(feature = "snap")]
impl SnappyCodec {
    fn new() -> Self {
        Self {
            encoder: snap::raw::Encoder::new(),
            decoder: snap::raw::Decoder::new(),
        }
    }
}

#[cfg(feature = "snap")]
impl Codec for SnappyCodec {
    fn compress(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        let compressed = self
            .encoder
            .compress_vec(input)
            .map_err(|e| compression_err!("SNAPPY compression failed: {}", e))?;
        output.extend_from_slice(&compressed);
        Ok(())
    }

    fn decompress(
        &mut self,
        input: &[u8],
        output: &mut Vec<u8>,
        _uncompressed_size: Option<usize>,
    ) -> Result<usize> {
        let decompressed = self
            .decoder
            .decompress_vec(input)
            .map_err(|e| compression_err!("SNAPPY decompression failed: {}", e))?;
        output.extend_from_slice(&decompressed);
        Ok(decompressed.len())
    }
}

#[cfg(feature = "flate2")]
struct GzipCodec {
    level: GzipLevel,
}

#[cfg(feature = "flate2")]
impl GzipCodec {
    fn new(level: GzipLevel) -> Self {
        Self { level }
    }
}

#[cfg(feature = "flate2")]
impl Codec for GzipCodec {
    fn compress(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        use std::io::Write;
        let mut encoder = flate2::write::GzEncoder::new(
            Vec::new(),
            flate2::Compression::new(self.level.compression_level()),
        );
        encoder.write_all(input)?;
        output.extend_from_slice(&encoder.finish()?);
        Ok(())
    }

    fn decompress(
        &mut self,
        input: &[u8],
        output: &mut Vec<u8>,
        _uncompressed_size: Option<usize>,
    ) -> Result<usize> {
        use std::io::Read;
        let mut decoder = flate2::read::GzDecoder::new(input);
        let before = output.len();
        decoder.read_to_end(output)?;
        Ok(output.len() - before)
    }
}

#[cfg(feature = "brotli")]
struct BrotliCodec {
    level: BrotliLevel,
}

#[cfg(feature = "brotli")]
const BROTLI_BUFFER_SIZE: usize = 4096;
#[cfg(feature = "brotli")]
const BROTLI_LG_WINDOW_SIZE: u32 = 22;

#[cfg(feature = "brotli")]
impl BrotliCodec {
    fn new(level: BrotliLevel) -> Self {
        Self { level }
    }
}

#[cfg(feature = "brotli")]
impl Codec for BrotliCodec {
    fn compress(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        use std::io::Write;
        let mut encoder = brotli::CompressorWriter::new(
            &mut *output,
            BROTLI_BUFFER_SIZE,
            self.level.compression_level(),
            BROTLI_LG_WINDOW_SIZE,
        );
        encoder.write_all(input)?;
        encoder.flush()?;
        Ok(())
    }

    fn decompress(
        &mut self,
        input: &[u8],
        output: &mut Vec<u8>,
        _uncompressed_size: Option<usize>,
    ) -> Result<usize> {
        use std::io::Read;
        let before = output.len();
        brotli::Decompressor::new(input, BROTLI_BUFFER_SIZE).read_to_end(output)?;
        Ok(output.len() - before)
    }
}

#[cfg(feature = "zstd")]
struct ZstdCodec {
    level: ZstdLevel,
}

#[cfg(feature = "zstd")]
impl ZstdCodec {
    fn new(level: ZstdLevel) -> Self {
        Self { level }
    }
}

#[cfg(feature = "zstd")]
impl Codec for ZstdCodec {
    fn compress(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        let compressed = zstd::encode_all(input, self.level.compression_level())
            .map_err(|e| compression_err!("ZSTD compression failed: {}", e))?;
        output.extend_from_slice(&compressed);
        Ok(())
    }

    fn decompress(
        &mut self,
        input: &[u8],
        output: &mut Vec<u8>,
        _uncompressed_size: Option<usize>,
    ) -> Result<usize> {
        let decompressed = zstd::decode_all(input)
            .map_err(|e| compression_err!("ZSTD decompression failed: {}", e))?;
        output.extend_from_slice(&decompressed);
        Ok(decompressed.len())
    }
}

#[cfg(feature = "lz4")]
struct Lz4RawCodec;

#[cfg(feature = "lz4")]
impl Lz4RawCodec {
    fn new() -> Self {
        Self
    }
}

#[cfg(feature = "lz4")]
impl Codec for Lz4RawCodec {
    fn compress(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        output.extend_from_slice(&lz4_flex::block::compress(input));
        Ok(())
    }

    fn decompress(
        &mut self,
        input: &[u8],
        output: &mut Vec<u8>,
        uncompressed_size: Option<usize>,
    ) -> Result<usize> {
        let uncompressed_size = uncompressed_size.ok_or_else(|| {
            compression_err!("LZ4_RAW decompression requires the uncompressed size")
        })?;
        let decompressed = lz4_flex::block::decompress(input, uncompressed_size)
            .map_err(|e| compression_err!("LZ4_RAW decompression failed: {}", e))?;
        output.extend_from_slice(&decompressed);
        Ok(decompressed.len())
    }
}
