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

//! Encoder for repetition and definition levels.
//!
//! Levels are RLE/bit-packed with the minimum width for the column's maximum
//! level. A v1 data page prefixes each level block with its 4-byte little
//! endian byte length; in a v2 page the lengths live in the page header, so
//! the block is written bare.

use crate::encodings::rle::RleEncoder;
use crate::util::bit_util::num_required_bits;

/// Size in bytes an encoded level block can reach.
pub fn max_buffer_size(max_level: i16, num_values: usize) -> usize {
    RleEncoder::max_buffer_size(num_required_bits(max_level as u64), num_values)
}

/// Encodes one block of levels.
pub enum LevelEncoder {
    /// 4-byte length prefix followed by the RLE stream.
    V1(RleEncoder),
    /// Bare RLE stream.
    V2(RleEncoder),
}

impl LevelEncoder {
    /// Level encoder for a v1 data page.
    pub fn v1(max_level: i16, num_values: usize) -> Self {
        let mut buffer = Vec::with_capacity(4 + max_buffer_size(max_level, num_values));
        // placeholder for the length prefix, patched in consume()
        buffer.extend_from_slice(&[0u8; 4]);
        Self::V1(RleEncoder::new_from_buf(
            num_required_bits(max_level as u64),
            buffer,
        ))
    }

    /// Level encoder for a v2 data page.
    pub fn v2(max_level: i16, num_values: usize) -> Self {
        let buffer = Vec::with_capacity(max_buffer_size(max_level, num_values));
        Self::V2(RleEncoder::new_from_buf(
            num_required_bits(max_level as u64),
            buffer,
        ))
    }

    pub fn put(&mut self, levels: &[i16]) {
        let encoder = match self {
            Self::V1(encoder) | Self::V2(encoder) => encoder,
        };
        for &level in levels {
            encoder.put(level as u64);
        }
    }

    /// Finishes the block and returns the encoded bytes.
    pub fn consume(self) -> Vec<u8> {
        match self {
            Self::V1(encoder) => {
                let mut encoded = encoder.consume();
                let block_len = (encoded.len() - 4) as u32;
                encoded[0..4].copy_from_slice(&block_len.to_le_bytes());
                encoded
            }
            Self::V2(encoder) => encoder.consume(),
        }
    }
}
