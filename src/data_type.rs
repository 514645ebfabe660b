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

//! In-memory value types for each physical [`Type`], and the [`DataType`]
//! marker trait that ties them to typed column writers.

use std::fmt;

use bytes::Bytes;

use crate::basic::Type;
use crate::data_type::private::ParquetValueType;
use crate::column::writer::{ColumnWriter, ColumnWriterImpl};
use crate::errors::Result;
use crate::util::bit_util::BitWriter;

/// A borrowed little-endian byte view of a value, used for statistics
/// serialization and dictionary hashing.
pub trait AsBytes {
    fn as_bytes(&self) -> &[u8];
}

macro_rules! gen_as_bytes {
    ($ty:ty) => {
        impl AsBytes for $ty {
            #[allow(clippy::size_of_in_element_count)]
            fn as_bytes(&self) -> &[u8] {
                // SAFETY: plain-old-data viewed for its lifetime only. Byte
                // order matches the wire on little-endian targets, which is
                // what the plain encoder requires of this view.
                unsafe {
                    std::slice::from_raw_parts(
                        self as *const $ty as *const u8,
                        std::mem::size_of::<$ty>(),
                    )
                }
            }
        }
    };
}

gen_as_bytes!(bool);
gen_as_bytes!(i32);
gen_as_bytes!(i64);
gen_as_bytes!(f32);
gen_as_bytes!(f64);

impl AsBytes for [u8] {
    fn as_bytes(&self) -> &[u8] {
        self
    }
}

impl AsBytes for str {
    fn as_bytes(&self) -> &[u8] {
        self.as_ref()
    }
}

/// Value of the deprecated INT96 physical type: three little-endian `u32`s.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Int96 {
    value: [u32; 3],
}

impl Int96 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(lo: u32, mid: u32, hi: u32) -> Self {
        Self {
            value: [lo, mid, hi],
        }
    }

    pub fn data(&self) -> &[u32] {
        &self.value
    }

    pub fn set_data(&mut self, lo: u32, mid: u32, hi: u32) {
        self.value = [lo, mid, hi];
    }
}

impl AsBytes for Int96 {
    fn as_bytes(&self) -> &[u8] {
        // SAFETY: [u32; 3] has no padding; see gen_as_bytes above.
        unsafe { std::slice::from_raw_parts(self.value.as_ptr() as *const u8, 12) }
    }
}

impl fmt::Display for Int96 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.value)
    }
}

/// A variable-length byte array value, cheaply cloneable.
#[derive(Clone, Default)]
pub struct ByteArray {
    data: Bytes,
}

impl ByteArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Zero-copy slice of the range `[start, start + len)`.
    pub fn slice(&self, start: usize, len: usize) -> Self {
        Self {
            data: self.data.slice(start..start + len),
        }
    }

    pub fn as_utf8(&self) -> Result<&str> {
        Ok(std::str::from_utf8(&self.data)?)
    }
}

impl From<Vec<u8>> for ByteArray {
    fn from(data: Vec<u8>) -> Self {
        Self { data: data.into() }
    }
}

impl From<&str> for ByteArray {
    fn from(s: &str) -> Self {
        Self {
            data: Bytes::copy_from_slice(s.as_bytes()),
        }
    }
}

impl From<&[u8]> for ByteArray {
    fn from(b: &[u8]) -> Self {
        Self {
            data: Bytes::copy_from_slice(b),
        }
    }
}

impl From<Bytes> for ByteArray {
    fn from(data: Bytes) -> Self {
        Self { data }
    }
}

impl AsBytes for ByteArray {
    fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl PartialEq for ByteArray {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl fmt::Debug for ByteArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteArray({:?})", self.data)
    }
}

impl fmt::Display for ByteArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for b in self.data.iter() {
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

/// A byte array whose length is fixed by the schema.
///
/// A distinct type so that the plain encoding (no length prefix) and
/// dictionary sizing can differ from [`ByteArray`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FixedLenByteArray(ByteArray);

impl FixedLenByteArray {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        self.0.data()
    }
}

impl From<ByteArray> for FixedLenByteArray {
    fn from(ba: ByteArray) -> Self {
        Self(ba)
    }
}

impl From<Vec<u8>> for FixedLenByteArray {
    fn from(data: Vec<u8>) -> Self {
        Self(data.into())
    }
}

impl From<FixedLenByteArray> for ByteArray {
    fn from(flba: FixedLenByteArray) -> Self {
        flba.0
    }
}

impl AsBytes for FixedLenByteArray {
    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for FixedLenByteArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

pub(crate) mod private {
    use super::*;

    /// Operations every physical value type supports; sealed, because the set
    /// of physical types is fixed by the format.
    pub trait ParquetValueType:
        PartialEq
        + Clone
        + Default
        + fmt::Debug
        + fmt::Display
        + AsBytes
        + Send
        + crate::file::statistics::private::MakeStatistics
    {
        const PHYSICAL_TYPE: Type;

        /// Appends `values` in PLAIN encoding; booleans go to `bit_writer`,
        /// everything else to `buffer`.
        fn encode_plain(values: &[Self], buffer: &mut Vec<u8>, bit_writer: &mut BitWriter);

        /// The value reinterpreted as `u64`, for unsigned comparisons.
        /// Only meaningful for the integer physical types.
        fn as_u64(&self) -> Result<u64> {
            Err(internal_err!(
                "unsigned comparison is not defined for {}",
                Self::PHYSICAL_TYPE
            ))
        }

        /// The value widened to `i64`, for delta encoding of the integer
        /// physical types.
        fn as_i64(&self) -> Result<i64> {
            Err(encoding_err!(
                "{} values cannot be delta encoded",
                Self::PHYSICAL_TYPE
            ))
        }

        /// The value viewed as a byte array, for the incremental byte array
        /// encodings.
        fn variable_bytes(&self) -> Result<&[u8]> {
            Err(encoding_err!(
                "{} values have no variable-length byte form",
                Self::PHYSICAL_TYPE
            ))
        }
    }

    impl ParquetValueType for bool {
        const PHYSICAL_TYPE: Type = Type::BOOLEAN;

        fn encode_plain(values: &[Self], _buffer: &mut Vec<u8>, bit_writer: &mut BitWriter) {
            for value in values {
                bit_writer.put_value(*value as u64, 1);
            }
        }

        fn as_u64(&self) -> Result<u64> {
            Ok(*self as u64)
        }
    }

    impl ParquetValueType for i32 {
        const PHYSICAL_TYPE: Type = Type::INT32;

        fn encode_plain(values: &[Self], buffer: &mut Vec<u8>, _bit_writer: &mut BitWriter) {
            for value in values {
                buffer.extend_from_slice(&value.to_le_bytes());
            }
        }

        fn as_u64(&self) -> Result<u64> {
            Ok(*self as u32 as u64)
        }

        fn as_i64(&self) -> Result<i64> {
            Ok(*self as i64)
        }
    }

    impl ParquetValueType for i64 {
        const PHYSICAL_TYPE: Type = Type::INT64;

        fn encode_plain(values: &[Self], buffer: &mut Vec<u8>, _bit_writer: &mut BitWriter) {
            for value in values {
                buffer.extend_from_slice(&value.to_le_bytes());
            }
        }

        fn as_u64(&self) -> Result<u64> {
            Ok(*self as u64)
        }

        fn as_i64(&self) -> Result<i64> {
            Ok(*self)
        }
    }

    impl ParquetValueType for Int96 {
        const PHYSICAL_TYPE: Type = Type::INT96;

        fn encode_plain(values: &[Self], buffer: &mut Vec<u8>, _bit_writer: &mut BitWriter) {
            for value in values {
                for part in value.data() {
                    buffer.extend_from_slice(&part.to_le_bytes());
                }
            }
        }
    }

    impl ParquetValueType for f32 {
        const PHYSICAL_TYPE: Type = Type::FLOAT;

        fn encode_plain(values: &[Self], buffer: &mut Vec<u8>, _bit_writer: &mut BitWriter) {
            for value in values {
                buffer.extend_from_slice(&value.to_le_bytes());
            }
        }
    }

    impl ParquetValueType for f64 {
        const PHYSICAL_TYPE: Type = Type::DOUBLE;

        fn encode_plain(values: &[Self], buffer: &mut Vec<u8>, _bit_writer: &mut BitWriter) {
            for value in values {
                buffer.extend_from_slice(&value.to_le_bytes());
            }
        }
    }

    impl ParquetValueType for ByteArray {
        const PHYSICAL_TYPE: Type = Type::BYTE_ARRAY;

        fn encode_plain(values: &[Self], buffer: &mut Vec<u8>, _bit_writer: &mut BitWriter) {
            for value in values {
                buffer.extend_from_slice(&(value.len() as u32).to_le_bytes());
                buffer.extend_from_slice(value.data());
            }
        }

        fn variable_bytes(&self) -> Result<&[u8]> {
            Ok(self.data())
        }
    }

    impl ParquetValueType for FixedLenByteArray {
        const PHYSICAL_TYPE: Type = Type::FIXED_LEN_BYTE_ARRAY;

        fn encode_plain(values: &[Self], buffer: &mut Vec<u8>, _bit_writer: &mut BitWriter) {
            for value in values {
                buffer.extend_from_slice(value.data());
            }
        }

        fn variable_bytes(&self) -> Result<&[u8]> {
            Ok(self.data())
        }
    }
}

/// Marker trait mapping a physical [`Type`] to its in-memory value type and
/// its typed column writer.
pub trait DataType: 'static + Send {
    type T: private::ParquetValueType;

    fn get_physical_type() -> Type {
        Self::T::PHYSICAL_TYPE
    }

    /// Extracts a typed writer out of the [`ColumnWriter`] enum, or `None` if
    /// the variant does not match.
    fn get_column_writer(writer: ColumnWriter<'_>) -> Option<ColumnWriterImpl<'_, Self>>
    where
        Self: Sized;

    /// As [`Self::get_column_writer`], for a mutable reference.
    fn get_column_writer_mut<'a, 'b: 'a>(
        writer: &'a mut ColumnWriter<'b>,
    ) -> Option<&'a mut ColumnWriterImpl<'b, Self>>
    where
        Self: Sized;
}

macro_rules! make_type {
    ($name:ident, $value_ty:ty, $variant:ident) => {
        #[doc = concat!("Marker type for ", stringify!($variant), " columns.")]
        pub struct $name {}

        impl DataType for $name {
            type T = $value_ty;

            fn get_column_writer(writer: ColumnWriter<'_>) -> Option<ColumnWriterImpl<'_, Self>> {
                match writer {
                    ColumnWriter::$variant(w) => Some(w),
                    _ => None,
                }
            }

            fn get_column_writer_mut<'a, 'b: 'a>(
                writer: &'a mut ColumnWriter<'b>,
            ) -> Option<&'a mut ColumnWriterImpl<'b, Self>> {
                match writer {
                    ColumnWriter::$variant(w) => Some(w),
                    _ => None,
                }
            }
        }
    };
}

make_type!(BoolType, bool, BoolColumnWriter);
make_type!(Int32Type, i32, Int32ColumnWriter);
make_type!(Int64Type, i64, Int64ColumnWriter);
make_type!(Int96Type, Int96, Int96ColumnWriter);
make_type!(FloatType, f32, FloatColumnWriter);
make_type!(DoubleType, f64, DoubleColumnWriter);
make_type!(ByteArrayType, ByteArray, ByteArrayColumnWriter);
make_type!(FixedLenByteArrayType, FixedLenByteArray, FixedLenByteArrayColumnWriter);

#[cfg(test)]
mod tests {
    use super::private::ParquetValueType;
    use super::*;

    #[test]
    fn test_as_bytes_little_endian() {
        assert_eq!(1i32.as_bytes(), &[1, 0, 0, 0]);
        assert_eq!((-1i64).as_bytes(), &[0xff; 8]);
        assert_eq!(1.5f64.as_bytes(), 1.5f64.to_le_bytes());
        assert_eq!(true.as_bytes(), &[1]);
    }

    #[test]
    fn test_byte_array() {
        let ba = ByteArray::from("hello");
        assert_eq!(ba.len(), 5);
        assert_eq!(ba.as_utf8().unwrap(), "hello");
        assert_eq!(ba.slice(1, 3).data(), b"ell");
        assert_eq!(format!("{ba}"), "0x68656C6C6F");
    }

    #[test]
    fn test_plain_encode_byte_array() {
        let mut buffer = Vec::new();
        let mut bit_writer = BitWriter::new();
        ByteArray::encode_plain(
            &[ByteArray::from("ab"), ByteArray::from("c")],
            &mut buffer,
            &mut bit_writer,
        );
        assert_eq!(buffer, b"\x02\0\0\0ab\x01\0\0\0c");
    }

    #[test]
    fn test_int96() {
        let mut v = Int96::new();
        v.set_data(1, 2, 3);
        assert_eq!(v.data(), &[1, 2, 3]);
        assert_eq!(
            v.as_bytes(),
            &[1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0]
        );
    }
}
