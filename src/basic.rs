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

//! Rust mappings of the enums and unions from the Parquet thrift definition.
//! The numeric values are the wire values from
//! [`parquet.thrift`](https://github.com/apache/parquet-format/blob/master/src/main/thrift/parquet.thrift).

use std::fmt;
use std::io::Write;

pub use crate::compression::{BrotliLevel, GzipLevel, ZstdLevel};
use crate::errors::Result;
use crate::thrift::{
    CompactProtocolWriter, CompactSliceReader, ElementType, FieldType, ReadThrift, WriteThrift,
    WriteThriftField,
};

thrift_enum!(
/// Physical types of stored values.
///
/// These control the on-disk representation; narrower logical types such as
/// INT16 are layered on top of them via [`LogicalType`] annotations.
pub enum Type {
  BOOLEAN = 0;
  INT32 = 1;
  INT64 = 2;
  /// Deprecated 96-bit timestamp type, kept for legacy writers.
  INT96 = 3;
  FLOAT = 4;
  DOUBLE = 5;
  BYTE_ARRAY = 6;
  FIXED_LEN_BYTE_ARRAY = 7;
}
);

thrift_enum!(
/// Field cardinality: how many times a field can appear in its parent.
pub enum Repetition {
  /// Exactly one occurrence.
  REQUIRED = 0;
  /// Zero or one occurrence.
  OPTIONAL = 1;
  /// Zero or more occurrences.
  REPEATED = 2;
}
);

thrift_enum!(
/// Value encodings for data and dictionary pages.
pub enum Encoding {
  /// Little-endian fixed width numerics, length-prefixed byte arrays, bare
  /// fixed-length byte arrays, bit-packed booleans.
  PLAIN = 0;
  /// Deprecated dictionary index encoding from format v1; superseded by
  /// [`Encoding::RLE_DICTIONARY`].
  PLAIN_DICTIONARY = 2;
  /// Hybrid run-length / bit-packed encoding for levels and dictionary
  /// indices.
  RLE = 3;
  /// Deprecated MSB-first bit packing for levels.
  BIT_PACKED = 4;
  /// Delta encoding of integers in bit-packed miniblocks.
  DELTA_BINARY_PACKED = 5;
  /// Delta-encoded lengths followed by concatenated byte array data.
  DELTA_LENGTH_BYTE_ARRAY = 6;
  /// Incremental (prefix-sharing) encoding of byte arrays.
  DELTA_BYTE_ARRAY = 7;
  /// Dictionary indices as a bit-width-prefixed RLE stream.
  RLE_DICTIONARY = 8;
}
);

thrift_enum!(
/// Page kinds appearing in a column chunk.
pub enum PageType {
  DATA_PAGE = 0;
  INDEX_PAGE = 1;
  DICTIONARY_PAGE = 2;
  DATA_PAGE_V2 = 3;
}
);

thrift_enum!(
/// Deprecated logical-type annotations from format v1.
///
/// Still written next to [`LogicalType`] for forward compatibility with old
/// readers.
pub enum ConvertedType {
  UTF8 = 0;
  MAP = 1;
  MAP_KEY_VALUE = 2;
  LIST = 3;
  ENUM = 4;
  DECIMAL = 5;
  DATE = 6;
  TIME_MILLIS = 7;
  TIME_MICROS = 8;
  TIMESTAMP_MILLIS = 9;
  TIMESTAMP_MICROS = 10;
  UINT_8 = 11;
  UINT_16 = 12;
  UINT_32 = 13;
  UINT_64 = 14;
  INT_8 = 15;
  INT_16 = 16;
  INT_32 = 17;
  INT_64 = 18;
  JSON = 19;
  BSON = 20;
  INTERVAL = 21;
}
);

thrift_unit_union!(
/// Time unit for `Time` and `Timestamp` logical types.
pub union TimeUnit {
  1: MILLIS;
  2: MICROS;
  3: NANOS;
}
);

thrift_struct!(
struct DecimalType {
  1: required i32 scale;
  2: required i32 precision;
}
);

thrift_struct!(
struct TimeType {
  1: required bool is_adjusted_to_utc;
  2: required TimeUnit unit;
}
);

thrift_struct!(
struct IntType {
  1: required i8 bit_width;
  2: required bool is_signed;
}
);

/// Logical-type annotations layered over the physical [`Type`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicalType {
    /// A UTF-8 encoded string stored as BYTE_ARRAY.
    String,
    /// A map of key-value pairs.
    Map,
    /// A list of elements.
    List,
    /// One of a set of predefined string values, stored as BYTE_ARRAY.
    Enum,
    /// A fixed-point decimal number.
    Decimal {
        /// Number of fractional digits.
        scale: i32,
        /// Total number of digits.
        precision: i32,
    },
    /// Days since the Unix epoch, stored as INT32.
    Date,
    /// Time of day in the given unit since midnight.
    Time {
        /// Whether the value is adjusted to UTC.
        is_adjusted_to_utc: bool,
        /// Resolution of the stored integer.
        unit: TimeUnit,
    },
    /// Instant in the given unit since the Unix epoch.
    Timestamp {
        /// Whether the value is adjusted to UTC.
        is_adjusted_to_utc: bool,
        /// Resolution of the stored integer.
        unit: TimeUnit,
    },
    /// An integer of a specific bit width and signedness, stored in the
    /// narrowest fitting physical integer type.
    Integer {
        /// 8, 16, 32 or 64.
        bit_width: i8,
        /// Whether values are signed.
        is_signed: bool,
    },
    /// A type whose meaning is unknown; values are always null.
    Unknown,
    /// A JSON document, stored as BYTE_ARRAY.
    Json,
    /// A BSON document, stored as BYTE_ARRAY.
    Bson,
    /// A 16-byte UUID, stored as FIXED_LEN_BYTE_ARRAY(16).
    Uuid,
}

impl LogicalType {
    /// The [`ConvertedType`] written alongside this annotation for old
    /// readers, if one exists.
    pub fn converted_type(&self) -> Option<ConvertedType> {
        match self {
            Self::String => Some(ConvertedType::UTF8),
            Self::Map => Some(ConvertedType::MAP),
            Self::List => Some(ConvertedType::LIST),
            Self::Enum => Some(ConvertedType::ENUM),
            Self::Decimal { .. } => Some(ConvertedType::DECIMAL),
            Self::Date => Some(ConvertedType::DATE),
            Self::Time { unit, .. } => match unit {
                TimeUnit::MILLIS => Some(ConvertedType::TIME_MILLIS),
                TimeUnit::MICROS => Some(ConvertedType::TIME_MICROS),
                TimeUnit::NANOS => None,
            },
            Self::Timestamp { unit, .. } => match unit {
                TimeUnit::MILLIS => Some(ConvertedType::TIMESTAMP_MILLIS),
                TimeUnit::MICROS => Some(ConvertedType::TIMESTAMP_MICROS),
                TimeUnit::NANOS => None,
            },
            Self::Integer {
                bit_width,
                is_signed,
            } => Some(match (bit_width, is_signed) {
                (8, true) => ConvertedType::INT_8,
                (16, true) => ConvertedType::INT_16,
                (32, true) => ConvertedType::INT_32,
                (64, true) => ConvertedType::INT_64,
                (8, false) => ConvertedType::UINT_8,
                (16, false) => ConvertedType::UINT_16,
                (32, false) => ConvertedType::UINT_32,
                (64, false) => ConvertedType::UINT_64,
                _ => return None,
            }),
            Self::Json => Some(ConvertedType::JSON),
            Self::Bson => Some(ConvertedType::BSON),
            Self::Unknown | Self::Uuid => None,
        }
    }

    /// Statistics sort order implied by this annotation.
    pub fn sort_order(&self) -> SortOrder {
        match self {
            Self::String | Self::Enum | Self::Json | Self::Bson | Self::Uuid => {
                SortOrder::UNSIGNED
            }
            Self::Integer { is_signed, .. } => {
                if *is_signed {
                    SortOrder::SIGNED
                } else {
                    SortOrder::UNSIGNED
                }
            }
            Self::Decimal { .. } => SortOrder::SIGNED,
            Self::Date | Self::Time { .. } | Self::Timestamp { .. } => SortOrder::SIGNED,
            Self::Map | Self::List | Self::Unknown => SortOrder::UNDEFINED,
        }
    }
}

impl WriteThrift for LogicalType {
    const ELEMENT_TYPE: ElementType = ElementType::Struct;

    fn write_thrift<W: Write>(&self, w: &mut CompactProtocolWriter<W>) -> Result<()> {
        match self {
            Self::String => {
                w.write_empty_struct(1, 0)?;
            }
            Self::Map => {
                w.write_empty_struct(2, 0)?;
            }
            Self::List => {
                w.write_empty_struct(3, 0)?;
            }
            Self::Enum => {
                w.write_empty_struct(4, 0)?;
            }
            Self::Decimal { scale, precision } => {
                DecimalType {
                    scale: *scale,
                    precision: *precision,
                }
                .write_thrift_field(w, 5, 0)?;
            }
            Self::Date => {
                w.write_empty_struct(6, 0)?;
            }
            Self::Time {
                is_adjusted_to_utc,
                unit,
            } => {
                TimeType {
                    is_adjusted_to_utc: *is_adjusted_to_utc,
                    unit: *unit,
                }
                .write_thrift_field(w, 7, 0)?;
            }
            Self::Timestamp {
                is_adjusted_to_utc,
                unit,
            } => {
                TimeType {
                    is_adjusted_to_utc: *is_adjusted_to_utc,
                    unit: *unit,
                }
                .write_thrift_field(w, 8, 0)?;
            }
            Self::Integer {
                bit_width,
                is_signed,
            } => {
                IntType {
                    bit_width: *bit_width,
                    is_signed: *is_signed,
                }
                .write_thrift_field(w, 10, 0)?;
            }
            Self::Unknown => {
                w.write_empty_struct(11, 0)?;
            }
            Self::Json => {
                w.write_empty_struct(12, 0)?;
            }
            Self::Bson => {
                w.write_empty_struct(13, 0)?;
            }
            Self::Uuid => {
                w.write_empty_struct(14, 0)?;
            }
        }
        w.write_struct_end()
    }
}

thrift_field_impl!(LogicalType, FieldType::Struct);

impl ReadThrift for LogicalType {
    fn read_thrift(prot: &mut CompactSliceReader<'_>) -> Result<Self> {
        let ident = prot.read_field_begin(0)?;
        let ret = match ident.id {
            1 => {
                prot.read_empty_struct()?;
                Self::String
            }
            2 => {
                prot.read_empty_struct()?;
                Self::Map
            }
            3 => {
                prot.read_empty_struct()?;
                Self::List
            }
            4 => {
                prot.read_empty_struct()?;
                Self::Enum
            }
            5 => {
                let val = DecimalType::read_thrift(prot)?;
                Self::Decimal {
                    scale: val.scale,
                    precision: val.precision,
                }
            }
            6 => {
                prot.read_empty_struct()?;
                Self::Date
            }
            7 => {
                let val = TimeType::read_thrift(prot)?;
                Self::Time {
                    is_adjusted_to_utc: val.is_adjusted_to_utc,
                    unit: val.unit,
                }
            }
            8 => {
                let val = TimeType::read_thrift(prot)?;
                Self::Timestamp {
                    is_adjusted_to_utc: val.is_adjusted_to_utc,
                    unit: val.unit,
                }
            }
            10 => {
                let val = IntType::read_thrift(prot)?;
                Self::Integer {
                    bit_width: val.bit_width,
                    is_signed: val.is_signed,
                }
            }
            11 => {
                prot.read_empty_struct()?;
                Self::Unknown
            }
            12 => {
                prot.read_empty_struct()?;
                Self::Json
            }
            13 => {
                prot.read_empty_struct()?;
                Self::Bson
            }
            14 => {
                prot.read_empty_struct()?;
                Self::Uuid
            }
            other => return Err(internal_err!("unexpected LogicalType variant {}", other)),
        };
        let stop = prot.read_field_begin(ident.id)?;
        if stop.field_type != FieldType::Stop {
            return Err(internal_err!("multiple fields set for union LogicalType"));
        }
        Ok(ret)
    }
}

/// Compression codec applied to page payloads.
///
/// Codecs with a tunable effort carry their level; the level never reaches
/// the wire, which only records the codec tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum Compression {
    /// No compression.
    UNCOMPRESSED,
    /// [Snappy](https://github.com/google/snappy) block compression.
    SNAPPY,
    /// [Gzip](https://www.ietf.org/rfc/rfc1952.txt) compression.
    GZIP(GzipLevel),
    /// [Brotli](https://github.com/google/brotli) compression.
    BROTLI(BrotliLevel),
    /// [Zstandard](https://facebook.github.io/zstd/) compression.
    ZSTD(ZstdLevel),
    /// Raw (unframed) [LZ4](https://lz4.org/) block compression.
    LZ4_RAW,
}

impl Compression {
    /// Wire value of the `CompressionCodec` thrift enum.
    pub(crate) fn codec_tag(&self) -> i32 {
        match self {
            Self::UNCOMPRESSED => 0,
            Self::SNAPPY => 1,
            Self::GZIP(_) => 2,
            Self::BROTLI(_) => 4,
            Self::ZSTD(_) => 6,
            Self::LZ4_RAW => 7,
        }
    }

    pub(crate) fn from_codec_tag(tag: i32) -> Result<Self> {
        Ok(match tag {
            0 => Self::UNCOMPRESSED,
            1 => Self::SNAPPY,
            2 => Self::GZIP(Default::default()),
            4 => Self::BROTLI(Default::default()),
            6 => Self::ZSTD(Default::default()),
            7 => Self::LZ4_RAW,
            other => return Err(internal_err!("unsupported compression codec {}", other)),
        })
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UNCOMPRESSED => write!(f, "UNCOMPRESSED"),
            Self::SNAPPY => write!(f, "SNAPPY"),
            Self::GZIP(_) => write!(f, "GZIP"),
            Self::BROTLI(_) => write!(f, "BROTLI"),
            Self::ZSTD(_) => write!(f, "ZSTD"),
            Self::LZ4_RAW => write!(f, "LZ4_RAW"),
        }
    }
}

impl WriteThrift for Compression {
    const ELEMENT_TYPE: ElementType = ElementType::I32;

    fn write_thrift<W: Write>(&self, w: &mut CompactProtocolWriter<W>) -> Result<()> {
        w.write_i32(self.codec_tag())
    }
}

thrift_field_impl!(Compression, FieldType::I32);

impl ReadThrift for Compression {
    fn read_thrift(prot: &mut CompactSliceReader<'_>) -> Result<Self> {
        Compression::from_codec_tag(prot.read_i32()?)
    }
}

/// Sort order of statistics min/max values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum SortOrder {
    /// Signed comparison (numeric, or two's-complement bytes for decimals).
    SIGNED,
    /// Unsigned comparison (lexicographic bytes, unsigned integers).
    UNSIGNED,
    /// No meaningful order; min/max must not be relied on.
    UNDEFINED,
}

impl SortOrder {
    /// Whether min/max values under this order can also populate the
    /// deprecated signed `min`/`max` statistics fields.
    pub fn is_signed(&self) -> bool {
        matches!(self, Self::SIGNED)
    }
}

/// Computes the sort order for a column from its annotations, falling back
/// to the physical type's natural order.
pub fn column_sort_order(
    logical_type: Option<&LogicalType>,
    converted_type: Option<ConvertedType>,
    physical_type: Type,
) -> SortOrder {
    if let Some(logical) = logical_type {
        return logical.sort_order();
    }
    if let Some(converted) = converted_type {
        return match converted {
            ConvertedType::UTF8
            | ConvertedType::JSON
            | ConvertedType::BSON
            | ConvertedType::ENUM
            | ConvertedType::UINT_8
            | ConvertedType::UINT_16
            | ConvertedType::UINT_32
            | ConvertedType::UINT_64 => SortOrder::UNSIGNED,
            ConvertedType::INT_8
            | ConvertedType::INT_16
            | ConvertedType::INT_32
            | ConvertedType::INT_64
            | ConvertedType::DECIMAL
            | ConvertedType::DATE
            | ConvertedType::TIME_MILLIS
            | ConvertedType::TIME_MICROS
            | ConvertedType::TIMESTAMP_MILLIS
            | ConvertedType::TIMESTAMP_MICROS => SortOrder::SIGNED,
            ConvertedType::MAP | ConvertedType::MAP_KEY_VALUE | ConvertedType::LIST => {
                SortOrder::UNDEFINED
            }
            ConvertedType::INTERVAL => SortOrder::UNDEFINED,
        };
    }
    match physical_type {
        Type::BOOLEAN | Type::INT32 | Type::INT64 | Type::FLOAT | Type::DOUBLE => {
            SortOrder::SIGNED
        }
        Type::BYTE_ARRAY | Type::FIXED_LEN_BYTE_ARRAY => SortOrder::UNSIGNED,
        Type::INT96 => SortOrder::UNDEFINED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thrift::{CompactProtocolWriter, CompactSliceReader};

    fn roundtrip<T>(val: T) -> T
    where
        T: WriteThrift + ReadThrift,
    {
        let mut buf = Vec::new();
        val.write_thrift(&mut CompactProtocolWriter::new(&mut buf))
            .unwrap();
        T::read_thrift(&mut CompactSliceReader::new(&buf)).unwrap()
    }

    #[test]
    fn test_enum_roundtrip() {
        for t in [
            Type::BOOLEAN,
            Type::INT32,
            Type::INT64,
            Type::INT96,
            Type::FLOAT,
            Type::DOUBLE,
            Type::BYTE_ARRAY,
            Type::FIXED_LEN_BYTE_ARRAY,
        ] {
            assert_eq!(roundtrip(t), t);
        }
        for e in [
            Encoding::PLAIN,
            Encoding::RLE,
            Encoding::DELTA_BINARY_PACKED,
            Encoding::DELTA_BYTE_ARRAY,
            Encoding::RLE_DICTIONARY,
        ] {
            assert_eq!(roundtrip(e), e);
        }
    }

    #[test]
    fn test_time_unit_roundtrip() {
        for u in [TimeUnit::MILLIS, TimeUnit::MICROS, TimeUnit::NANOS] {
            assert_eq!(roundtrip(u), u);
        }
    }

    #[test]
    fn test_logical_type_roundtrip() {
        let cases = [
            LogicalType::String,
            LogicalType::Decimal {
                scale: 2,
                precision: 9,
            },
            LogicalType::Time {
                is_adjusted_to_utc: true,
                unit: TimeUnit::MICROS,
            },
            LogicalType::Timestamp {
                is_adjusted_to_utc: false,
                unit: TimeUnit::NANOS,
            },
            LogicalType::Integer {
                bit_width: 16,
                is_signed: false,
            },
            LogicalType::Uuid,
        ];
        for case in cases {
            assert_eq!(roundtrip(case.clone()), case);
        }
    }

    #[test]
    fn test_logical_to_converted() {
        assert_eq!(
            LogicalType::String.converted_type(),
            Some(ConvertedType::UTF8)
        );
        assert_eq!(
            LogicalType::Integer {
                bit_width: 8,
                is_signed: false
            }
            .converted_type(),
            Some(ConvertedType::UINT_8)
        );
        assert_eq!(
            LogicalType::Timestamp {
                is_adjusted_to_utc: true,
                unit: TimeUnit::NANOS
            }
            .converted_type(),
            None
        );
        assert_eq!(LogicalType::Uuid.converted_type(), None);
    }

    #[test]
    fn test_sort_order() {
        assert_eq!(
            column_sort_order(Some(&LogicalType::String), None, Type::BYTE_ARRAY),
            SortOrder::UNSIGNED
        );
        assert_eq!(
            column_sort_order(None, Some(ConvertedType::UINT_32), Type::INT32),
            SortOrder::UNSIGNED
        );
        assert_eq!(
            column_sort_order(None, None, Type::INT64),
            SortOrder::SIGNED
        );
        assert_eq!(
            column_sort_order(None, None, Type::INT96),
            SortOrder::UNDEFINED
        );
        assert_eq!(
            column_sort_order(
                Some(&LogicalType::Decimal {
                    scale: 2,
                    precision: 10
                }),
                None,
                Type::BYTE_ARRAY
            ),
            SortOrder::SIGNED
        );
    }

    #[test]
    fn test_compression_codec_tags() {
        assert_eq!(Compression::UNCOMPRESSED.codec_tag(), 0);
        assert_eq!(Compression::SNAPPY.codec_tag(), 1);
        assert_eq!(Compression::GZIP(Default::default()).codec_tag(), 2);
        assert_eq!(Compression::BROTLI(Default::default()).codec_tag(), 4);
        assert_eq!(Compression::ZSTD(Default::default()).codec_tag(), 6);
        assert_eq!(Compression::LZ4_RAW.codec_tag(), 7);
        // LZO and framed LZ4 are not supported
        assert!(Compression::from_codec_tag(3).is_err());
        assert!(Compression::from_codec_tag(5).is_err());
    }
}
