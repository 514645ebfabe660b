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

//! Dictionary encoding: distinct values in insertion order on a PLAIN
//! dictionary page, indices as a bit-width-prefixed RLE stream on each data
//! page.
//!
//! Values are deduplicated through a bucket map keyed by the hash of their
//! byte image: each bucket holds the ids of the entries that hashed there,
//! and a lookup compares the candidate entries directly. This sidesteps the
//! `Hash`/`Eq` requirements a value-keyed map would impose (floats have
//! neither) while keeping the dictionary itself a flat, insertion-ordered
//! vector that serializes straight onto the dictionary page.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::Hasher;

use bytes::Bytes;

use crate::basic::Type;
use crate::data_type::{AsBytes, DataType};
use crate::encodings::encoding::{Encoder, PlainEncoder};
use crate::encodings::rle::RleEncoder;
use crate::errors::Result;
use crate::schema::types::ColumnDescPtr;
use crate::util::bit_util::num_required_bits;

/// Per-column dictionary encoder.
///
/// The dictionary lives for the whole column chunk and caps out at
/// `u32::MAX` distinct entries (a bound the index encoding shares); the
/// buffered index stream is flushed per page.
pub struct DictEncoder<T: DataType> {
    /// Distinct values in first-appearance order; an entry's position is
    /// its dictionary id.
    entries: Vec<T::T>,
    /// Entry ids bucketed by the hash of the value's byte image.
    buckets: HashMap<u64, Vec<u32>>,
    /// PLAIN-encoded size of `entries`, the fallback decision input.
    encoded_size: usize,
    /// PLAIN width of one value, or `None` for BYTE_ARRAY, whose width is
    /// four length bytes plus the data.
    fixed_width: Option<usize>,
    /// Dictionary ids of the current page's values.
    indices: Vec<u32>,
}

impl<T: DataType> DictEncoder<T> {
    pub fn new(descr: ColumnDescPtr) -> Self {
        let fixed_width = match T::get_physical_type() {
            Type::BOOLEAN => Some(1),
            Type::INT32 | Type::FLOAT => Some(4),
            Type::INT64 | Type::DOUBLE => Some(8),
            Type::INT96 => Some(12),
            Type::FIXED_LEN_BYTE_ARRAY => Some(descr.type_length().max(0) as usize),
            Type::BYTE_ARRAY => None,
        };
        Self {
            entries: Vec::new(),
            buckets: HashMap::new(),
            encoded_size: 0,
            fixed_width,
            indices: Vec::new(),
        }
    }

    /// Number of distinct values seen so far.
    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    /// Encoded size of the dictionary page so far.
    pub fn dict_encoded_size(&self) -> usize {
        self.encoded_size
    }

    pub fn put(&mut self, values: &[T::T]) {
        self.indices.reserve(values.len());
        for value in values {
            let id = self.id_of(value);
            self.indices.push(id);
        }
    }

    /// Serializes the dictionary itself with PLAIN encoding.
    pub fn write_dict(&self) -> Result<Bytes> {
        let mut plain = PlainEncoder::<T>::new();
        plain.put(&self.entries)?;
        plain.flush_buffer()
    }

    /// Serializes the buffered indices: one byte of bit width, then the RLE
    /// stream.
    pub fn write_indices(&mut self) -> Result<Bytes> {
        let bit_width = self.bit_width();
        let mut buffer =
            Vec::with_capacity(1 + RleEncoder::max_buffer_size(bit_width, self.indices.len()));
        buffer.push(bit_width);
        let mut rle = RleEncoder::new_from_buf(bit_width, buffer);
        for &id in &self.indices {
            rle.put(id as u64);
        }
        self.indices.clear();
        Ok(rle.consume().into())
    }

    /// Estimated encoded size of the buffered indices.
    pub fn estimated_data_encoded_size(&self) -> usize {
        1 + RleEncoder::max_buffer_size(self.bit_width(), self.indices.len())
    }

    pub fn estimated_memory_size(&self) -> usize {
        self.encoded_size
            + self.indices.capacity() * 4
            + self.buckets.len() * (8 + std::mem::size_of::<Vec<u32>>())
    }

    pub fn num_buffered_indices(&self) -> usize {
        self.indices.len()
    }

    /// The id of `value`, interning it on first sight.
    fn id_of(&mut self, value: &T::T) -> u32 {
        let hash = hash_image(value.as_bytes());
        if let Some(bucket) = self.buckets.get(&hash) {
            for &id in bucket {
                if &self.entries[id as usize] == value {
                    return id;
                }
            }
        }
        let id = self.entries.len() as u32;
        self.encoded_size += self
            .fixed_width
            .unwrap_or_else(|| 4 + value.as_bytes().len());
        self.entries.push(value.clone());
        self.buckets.entry(hash).or_default().push(id);
        id
    }

    fn bit_width(&self) -> u8 {
        num_required_bits(self.entries.len().saturating_sub(1) as u64)
    }
}

fn hash_image(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    hasher.write(bytes);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::Repetition;
    use crate::data_type::{ByteArray, ByteArrayType, DoubleType, Int32Type};
    use crate::encodings::rle::RleDecoder;
    use crate::schema::types::{ColumnDescriptor, ColumnPath, Type as SchemaType};
    use std::sync::Arc;

    fn test_descr(physical_type: Type) -> ColumnDescPtr {
        let mut builder = SchemaType::primitive_type_builder("c", physical_type)
            .with_repetition(Repetition::REQUIRED);
        if physical_type == Type::FIXED_LEN_BYTE_ARRAY {
            builder = builder.with_length(8);
        }
        Arc::new(ColumnDescriptor::new(
            Arc::new(builder.build().unwrap()),
            0,
            0,
            ColumnPath::from("c"),
        ))
    }

    #[test]
    fn test_indices_roundtrip() {
        let mut encoder = DictEncoder::<Int32Type>::new(test_descr(Type::INT32));
        encoder.put(&[10, 20, 10, 30, 20, 10]);
        assert_eq!(encoder.num_entries(), 3);
        assert_eq!(encoder.dict_encoded_size(), 12);

        let indices = encoder.write_indices().unwrap();
        let bit_width = indices[0];
        assert_eq!(bit_width, 2);
        let decoded = RleDecoder::new(bit_width, &indices[1..]).decode(6).unwrap();
        assert_eq!(decoded, vec![0, 1, 0, 2, 1, 0]);
    }

    #[test]
    fn test_dict_page_insertion_order() {
        let mut encoder = DictEncoder::<ByteArrayType>::new(test_descr(Type::BYTE_ARRAY));
        encoder.put(&[
            ByteArray::from("bb"),
            ByteArray::from("a"),
            ByteArray::from("bb"),
        ]);
        let dict = encoder.write_dict().unwrap();
        // PLAIN encoding of "bb" then "a", in first-seen order
        assert_eq!(dict.as_ref(), b"\x02\0\0\0bb\x01\0\0\0a");
        assert_eq!(encoder.dict_encoded_size(), 4 + 2 + 4 + 1);
    }

    #[test]
    fn test_indices_cleared_between_pages() {
        let mut encoder = DictEncoder::<Int32Type>::new(test_descr(Type::INT32));
        encoder.put(&[1, 2, 3]);
        encoder.write_indices().unwrap();
        encoder.put(&[3]);
        let indices = encoder.write_indices().unwrap();
        let decoded = RleDecoder::new(indices[0], &indices[1..]).decode(1).unwrap();
        // dictionary survives across pages, so 3 keeps its id
        assert_eq!(decoded, vec![2]);
    }

    #[test]
    fn test_single_entry_bit_width_zero() {
        let mut encoder = DictEncoder::<Int32Type>::new(test_descr(Type::INT32));
        encoder.put(&[7, 7, 7, 7]);
        assert_eq!(encoder.num_entries(), 1);
        let indices = encoder.write_indices().unwrap();
        assert_eq!(indices[0], 0);
    }

    #[test]
    fn test_float_entries() {
        let mut encoder = DictEncoder::<DoubleType>::new(test_descr(Type::DOUBLE));
        encoder.put(&[1.5, 2.5, 1.5]);
        assert_eq!(encoder.num_entries(), 2);
        assert_eq!(encoder.dict_encoded_size(), 16);

        // NaN never equals itself, so every NaN becomes its own entry; the
        // column still round-trips through its id
        let mut encoder = DictEncoder::<DoubleType>::new(test_descr(Type::DOUBLE));
        encoder.put(&[f64::NAN, f64::NAN]);
        assert_eq!(encoder.num_entries(), 2);
        let indices = encoder.write_indices().unwrap();
        let decoded = RleDecoder::new(indices[0], &indices[1..]).decode(2).unwrap();
        assert_eq!(decoded, vec![0, 1]);
    }

    #[test]
    fn test_many_distinct_entries() {
        let mut encoder = DictEncoder::<Int32Type>::new(test_descr(Type::INT32));
        let values: Vec<i32> = (0..2000).collect();
        encoder.put(&values);
        encoder.put(&values);
        assert_eq!(encoder.num_entries(), 2000);
        assert_eq!(encoder.dict_encoded_size(), 2000 * 4);

        let indices = encoder.write_indices().unwrap();
        let decoded = RleDecoder::new(indices[0], &indices[1..])
            .decode(4000)
            .unwrap();
        let expected: Vec<u64> = (0..2000).chain(0..2000).collect();
        assert_eq!(decoded, expected);
    }
}
