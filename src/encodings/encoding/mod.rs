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

//! Value encoders for data pages.

use bytes::Bytes;

use crate::basic::{Encoding, Type};
use crate::data_type::private::ParquetValueType;
use crate::data_type::DataType;
use crate::encodings::rle::RleEncoder;
use crate::errors::Result;
use crate::util::bit_util::{num_required_bits, pack32_le, BitWriter};

pub(crate) mod dict_encoder;

/// An encoder for one column's values.
///
/// Encoders accumulate values and give back the encoded bytes on
/// [`flush_buffer`], after which they are empty and reusable for the next
/// page.
///
/// [`flush_buffer`]: Encoder::flush_buffer
pub trait Encoder<T: DataType>: Send {
    fn put(&mut self, values: &[T::T]) -> Result<()>;

    /// The encoding tag written into page headers for this encoder's output.
    fn encoding(&self) -> Encoding;

    /// Estimate of the encoded size of the values buffered so far (the
    /// flush threshold input).
    fn estimated_data_encoded_size(&self) -> usize;

    /// Estimate of the memory owned by this encoder (capacity, not live
    /// bytes).
    fn estimated_memory_size(&self) -> usize;

    /// Takes the encoded bytes, resetting the encoder.
    fn flush_buffer(&mut self) -> Result<Bytes>;
}

/// Creates the encoder for `encoding`, failing on encodings that do not
/// apply to `T` or are produced elsewhere (dictionary encoders are built by
/// the column writer itself).
pub fn get_encoder<T: DataType>(encoding: Encoding) -> Result<Box<dyn Encoder<T>>> {
    let encoder: Box<dyn Encoder<T>> = match encoding {
        Encoding::PLAIN => Box::new(PlainEncoder::new()),
        Encoding::RLE => Box::new(RleValueEncoder::new()),
        Encoding::DELTA_BINARY_PACKED => Box::new(DeltaBitPackEncoder::new()),
        Encoding::DELTA_LENGTH_BYTE_ARRAY => Box::new(DeltaLengthByteArrayEncoder::new()),
        Encoding::DELTA_BYTE_ARRAY => Box::new(DeltaByteArrayEncoder::new()),
        Encoding::PLAIN_DICTIONARY | Encoding::RLE_DICTIONARY => {
            return Err(encoding_err!(
                "dictionary encoding is managed by the column writer, not requestable directly"
            ))
        }
        other => return Err(nyi_err!("encoding {} is not supported for writes", other)),
    };
    Ok(encoder)
}

// ----------------------------------------------------------------------
// PLAIN

/// Little-endian fixed-width values; byte arrays with a 4-byte length
/// prefix; booleans bit-packed LSB-first.
pub struct PlainEncoder<T: DataType> {
    buffer: Vec<u8>,
    bit_writer: BitWriter,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: DataType> PlainEncoder<T> {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            bit_writer: BitWriter::new(),
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T: DataType> Default for PlainEncoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DataType> Encoder<T> for PlainEncoder<T> {
    fn put(&mut self, values: &[T::T]) -> Result<()> {
        T::T::encode_plain(values, &mut self.buffer, &mut self.bit_writer);
        Ok(())
    }

    fn encoding(&self) -> Encoding {
        Encoding::PLAIN
    }

    fn estimated_data_encoded_size(&self) -> usize {
        self.buffer.len() + self.bit_writer.bytes_written()
    }

    fn estimated_memory_size(&self) -> usize {
        self.buffer.capacity() + self.bit_writer.buffer_capacity()
    }

    fn flush_buffer(&mut self) -> Result<Bytes> {
        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.extend_from_slice(&self.bit_writer.take_buffer());
        Ok(buffer.into())
    }
}

// ----------------------------------------------------------------------
// RLE (boolean values)

/// RLE of boolean values with a 4-byte little-endian length prefix, the v2
/// encoding for BOOLEAN columns.
pub struct RleValueEncoder<T: DataType> {
    encoder: Option<RleEncoder>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: DataType> RleValueEncoder<T> {
    pub fn new() -> Self {
        Self {
            encoder: None,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T: DataType> Default for RleValueEncoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DataType> Encoder<T> for RleValueEncoder<T> {
    fn put(&mut self, values: &[T::T]) -> Result<()> {
        if T::get_physical_type() != Type::BOOLEAN {
            return Err(encoding_err!("RLE value encoding applies only to BOOLEAN"));
        }
        let encoder = self.encoder.get_or_insert_with(|| RleEncoder::new(1));
        for value in values {
            encoder.put(value.as_u64()?);
        }
        Ok(())
    }

    fn encoding(&self) -> Encoding {
        Encoding::RLE
    }

    fn estimated_data_encoded_size(&self) -> usize {
        4 + self.encoder.as_ref().map(|e| e.len()).unwrap_or(0)
    }

    fn estimated_memory_size(&self) -> usize {
        self.encoder
            .as_ref()
            .map(|e| e.buffer_capacity())
            .unwrap_or(0)
    }

    fn flush_buffer(&mut self) -> Result<Bytes> {
        let rle = match self.encoder.take() {
            Some(encoder) => encoder.consume(),
            None => Vec::new(),
        };
        let mut buffer = Vec::with_capacity(4 + rle.len());
        buffer.extend_from_slice(&(rle.len() as u32).to_le_bytes());
        buffer.extend_from_slice(&rle);
        Ok(buffer.into())
    }
}

// ----------------------------------------------------------------------
// DELTA_BINARY_PACKED

const DELTA_BLOCK_SIZE: usize = 128;
const DELTA_MINI_BLOCKS: usize = 4;
const DELTA_MINI_BLOCK_SIZE: usize = DELTA_BLOCK_SIZE / DELTA_MINI_BLOCKS;

/// Delta encoding of integers: a header with the first value, then blocks of
/// 128 deltas in 4 bit-packed miniblocks, each at its own width relative to
/// the block's minimum delta.
pub struct DeltaBitPackEncoder<T: DataType> {
    blocks: Vec<u8>,
    deltas: Vec<i64>,
    first_value: i64,
    previous_value: i64,
    total_values: usize,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: DataType> DeltaBitPackEncoder<T> {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            deltas: Vec::with_capacity(DELTA_BLOCK_SIZE),
            first_value: 0,
            previous_value: 0,
            total_values: 0,
            _phantom: std::marker::PhantomData,
        }
    }

    fn flush_block(&mut self) {
        if self.deltas.is_empty() {
            return;
        }
        let min_delta = *self.deltas.iter().min().unwrap();
        write_zig_zag_vlq(&mut self.blocks, min_delta);

        let adjusted: Vec<u64> = self
            .deltas
            .iter()
            .map(|d| d.wrapping_sub(min_delta) as u64)
            .collect();

        let mut widths = [0u8; DELTA_MINI_BLOCKS];
        for (i, chunk) in adjusted.chunks(DELTA_MINI_BLOCK_SIZE).enumerate() {
            widths[i] = chunk.iter().map(|&v| num_required_bits(v)).max().unwrap_or(0);
        }
        self.blocks.extend_from_slice(&widths);

        for (i, chunk) in adjusted.chunks(DELTA_MINI_BLOCK_SIZE).enumerate() {
            let width = widths[i] as usize;
            if width == 0 {
                continue;
            }
            // a trailing partial miniblock is zero padded to full size;
            // 64-bit deltas can need up to 8 bytes per value
            let mut padded = [0u64; DELTA_MINI_BLOCK_SIZE];
            padded[..chunk.len()].copy_from_slice(chunk);
            let mut packed = [0u8; 8 * DELTA_MINI_BLOCK_SIZE];
            pack32_le(width, &padded, &mut packed[..4 * width]);
            self.blocks.extend_from_slice(&packed[..4 * width]);
        }
        self.deltas.clear();
    }
}

impl<T: DataType> Default for DeltaBitPackEncoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DataType> Encoder<T> for DeltaBitPackEncoder<T> {
    fn put(&mut self, values: &[T::T]) -> Result<()> {
        for value in values {
            let value = value.as_i64()?;
            if self.total_values == 0 {
                self.first_value = value;
            } else {
                self.deltas.push(value.wrapping_sub(self.previous_value));
                if self.deltas.len() == DELTA_BLOCK_SIZE {
                    self.flush_block();
                }
            }
            self.previous_value = value;
            self.total_values += 1;
        }
        Ok(())
    }

    fn encoding(&self) -> Encoding {
        Encoding::DELTA_BINARY_PACKED
    }

    fn estimated_data_encoded_size(&self) -> usize {
        // header worst case plus pending deltas at full width
        self.blocks.len() + 20 + self.deltas.len() * 8
    }

    fn estimated_memory_size(&self) -> usize {
        self.blocks.capacity() + self.deltas.capacity() * 8
    }

    fn flush_buffer(&mut self) -> Result<Bytes> {
        self.flush_block();
        let mut buffer = Vec::with_capacity(16 + self.blocks.len());
        write_vlq(&mut buffer, DELTA_BLOCK_SIZE as u64);
        write_vlq(&mut buffer, DELTA_MINI_BLOCKS as u64);
        write_vlq(&mut buffer, self.total_values as u64);
        write_zig_zag_vlq(&mut buffer, self.first_value);
        buffer.extend_from_slice(&self.blocks);

        self.blocks.clear();
        self.first_value = 0;
        self.previous_value = 0;
        self.total_values = 0;
        Ok(buffer.into())
    }
}

// ----------------------------------------------------------------------
// DELTA_LENGTH_BYTE_ARRAY

/// Byte arrays as delta-encoded lengths followed by the concatenated data.
pub struct DeltaLengthByteArrayEncoder<T: DataType> {
    lengths: DeltaBitPackEncoder<crate::data_type::Int32Type>,
    data: Vec<u8>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: DataType> DeltaLengthByteArrayEncoder<T> {
    pub fn new() -> Self {
        Self {
            lengths: DeltaBitPackEncoder::new(),
            data: Vec::new(),
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T: DataType> Default for DeltaLengthByteArrayEncoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DataType> Encoder<T> for DeltaLengthByteArrayEncoder<T> {
    fn put(&mut self, values: &[T::T]) -> Result<()> {
        for value in values {
            let bytes = value.variable_bytes()?;
            if bytes.len() > i32::MAX as usize {
                return Err(encoding_err!(
                    "byte array of {} bytes exceeds the representable length",
                    bytes.len()
                ));
            }
            self.lengths.put(&[bytes.len() as i32])?;
            self.data.extend_from_slice(bytes);
        }
        Ok(())
    }

    fn encoding(&self) -> Encoding {
        Encoding::DELTA_LENGTH_BYTE_ARRAY
    }

    fn estimated_data_encoded_size(&self) -> usize {
        Encoder::<crate::data_type::Int32Type>::estimated_data_encoded_size(&self.lengths)
            + self.data.len()
    }

    fn estimated_memory_size(&self) -> usize {
        Encoder::<crate::data_type::Int32Type>::estimated_memory_size(&self.lengths)
            + self.data.capacity()
    }

    fn flush_buffer(&mut self) -> Result<Bytes> {
        let lengths = Encoder::<crate::data_type::Int32Type>::flush_buffer(&mut self.lengths)?;
        let mut buffer = Vec::with_capacity(lengths.len() + self.data.len());
        buffer.extend_from_slice(&lengths);
        buffer.append(&mut self.data);
        Ok(buffer.into())
    }
}

// ----------------------------------------------------------------------
// DELTA_BYTE_ARRAY

/// Incremental encoding: shared-prefix lengths, then suffixes in
/// DELTA_LENGTH_BYTE_ARRAY form.
pub struct DeltaByteArrayEncoder<T: DataType> {
    prefix_lengths: DeltaBitPackEncoder<crate::data_type::Int32Type>,
    suffixes: DeltaLengthByteArrayEncoder<crate::data_type::ByteArrayType>,
    previous: Vec<u8>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: DataType> DeltaByteArrayEncoder<T> {
    pub fn new() -> Self {
        Self {
            prefix_lengths: DeltaBitPackEncoder::new(),
            suffixes: DeltaLengthByteArrayEncoder::new(),
            previous: Vec::new(),
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T: DataType> Default for DeltaByteArrayEncoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DataType> Encoder<T> for DeltaByteArrayEncoder<T> {
    fn put(&mut self, values: &[T::T]) -> Result<()> {
        for value in values {
            let bytes = value.variable_bytes()?;
            let prefix_len = self
                .previous
                .iter()
                .zip(bytes.iter())
                .take_while(|(a, b)| a == b)
                .count();
            self.prefix_lengths.put(&[prefix_len as i32])?;
            self.suffixes
                .put(&[crate::data_type::ByteArray::from(&bytes[prefix_len..])])?;
            self.previous.clear();
            self.previous.extend_from_slice(bytes);
        }
        Ok(())
    }

    fn encoding(&self) -> Encoding {
        Encoding::DELTA_BYTE_ARRAY
    }

    fn estimated_data_encoded_size(&self) -> usize {
        Encoder::<crate::data_type::Int32Type>::estimated_data_encoded_size(&self.prefix_lengths)
            + Encoder::<crate::data_type::ByteArrayType>::estimated_data_encoded_size(
                &self.suffixes,
            )
    }

    fn estimated_memory_size(&self) -> usize {
        Encoder::<crate::data_type::Int32Type>::estimated_memory_size(&self.prefix_lengths)
            + Encoder::<crate::data_type::ByteArrayType>::estimated_memory_size(&self.suffixes)
            + self.previous.capacity()
    }

    fn flush_buffer(&mut self) -> Result<Bytes> {
        let prefix_lengths =
            Encoder::<crate::data_type::Int32Type>::flush_buffer(&mut self.prefix_lengths)?;
        let suffixes =
            Encoder::<crate::data_type::ByteArrayType>::flush_buffer(&mut self.suffixes)?;
        self.previous.clear();

        let mut buffer = Vec::with_capacity(prefix_lengths.len() + suffixes.len());
        buffer.extend_from_slice(&prefix_lengths);
        buffer.extend_from_slice(&suffixes);
        Ok(buffer.into())
    }
}

fn write_vlq(buffer: &mut Vec<u8>, mut v: u64) {
    while v > 0x7f {
        buffer.push(v as u8 | 0x80);
        v >>= 7;
    }
    buffer.push(v as u8);
}

fn write_zig_zag_vlq(buffer: &mut Vec<u8>, v: i64) {
    write_vlq(buffer, ((v as u64) << 1) ^ ((v >> 63) as u64));
}
