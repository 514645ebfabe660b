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

//! Wire-level thrift structs for page headers and the file footer. Field ids
//! mirror `parquet.thrift`; the in-memory metadata types in
//! [`crate::file::metadata`] convert into these for serialization.

use std::io::Write;

use crate::basic::{
    Compression, ConvertedType, Encoding, LogicalType, PageType, Repetition, Type,
};
use crate::errors::Result;
use crate::thrift::{
    CompactProtocolWriter, CompactSliceReader, ElementType, FieldType, ReadThrift, WriteThrift,
    WriteThriftField,
};

thrift_struct!(
/// One flattened node of the schema tree, in depth-first order.
pub(crate) struct SchemaElement {
  1: optional Type r#type;
  2: optional i32 type_length;
  3: optional Repetition repetition_type;
  4: required string name;
  5: optional i32 num_children;
  6: optional ConvertedType converted_type;
  7: optional i32 scale;
  8: optional i32 precision;
  9: optional i32 field_id;
  10: optional LogicalType logical_type;
}
);

thrift_struct!(
/// Per-page or per-chunk value statistics.
pub(crate) struct Statistics {
  1: optional binary max;
  2: optional binary min;
  3: optional i64 null_count;
  4: optional i64 distinct_count;
  5: optional binary max_value;
  6: optional binary min_value;
  7: optional bool is_max_value_exact;
  8: optional bool is_min_value_exact;
}
);

thrift_struct!(
/// Arbitrary key/value metadata carried in the footer.
pub struct KeyValue {
  1: required string key;
  2: optional string value;
}
);

thrift_struct!(
/// Sort order of rows within a row group.
pub struct SortingColumn {
  1: required i32 column_idx;
  2: required bool descending;
  3: required bool nulls_first;
}
);

thrift_struct!(
pub(crate) struct DataPageHeader {
  1: required i32 num_values;
  2: required Encoding encoding;
  3: required Encoding definition_level_encoding;
  4: required Encoding repetition_level_encoding;
  5: optional Statistics statistics;
}
);

thrift_struct!(
pub(crate) struct IndexPageHeader {
}
);

thrift_struct!(
pub(crate) struct DictionaryPageHeader {
  1: required i32 num_values;
  2: required Encoding encoding;
  3: optional bool is_sorted;
}
);

thrift_struct!(
pub(crate) struct DataPageHeaderV2 {
  1: required i32 num_values;
  2: required i32 num_nulls;
  3: required i32 num_rows;
  4: required Encoding encoding;
  5: required i32 definition_levels_byte_length;
  6: required i32 repetition_levels_byte_length;
  7: optional bool is_compressed;
  8: optional Statistics statistics;
}
);

thrift_struct!(
/// Common page header; exactly one of the type-specific sub-headers is set.
pub(crate) struct PageHeader {
  1: required PageType r#type;
  2: required i32 uncompressed_page_size;
  3: required i32 compressed_page_size;
  4: optional i32 crc;
  5: optional DataPageHeader data_page_header;
  6: optional IndexPageHeader index_page_header;
  7: optional DictionaryPageHeader dictionary_page_header;
  8: optional DataPageHeaderV2 data_page_header_v2;
}
);

thrift_unit_union!(
/// Column ordering used for min/max statistics; only the type-defined order
/// exists in the format today.
pub(crate) union ColumnOrder {
  1: TYPE_ORDER;
}
);

thrift_struct!(
pub(crate) struct ColumnMetaData {
  1: required Type r#type;
  2: required list<Encoding> encodings;
  3: required list<string> path_in_schema;
  4: required Compression codec;
  5: required i64 num_values;
  6: required i64 total_uncompressed_size;
  7: required i64 total_compressed_size;
  9: required i64 data_page_offset;
  10: optional i64 index_page_offset;
  11: optional i64 dictionary_page_offset;
  12: optional Statistics statistics;
}
);

thrift_struct!(
pub(crate) struct EncryptionWithColumnKey {
  1: required list<string> path_in_schema;
  2: optional binary key_metadata;
}
);

/// Crypto metadata of a single column chunk.
#[derive(Clone, Debug, PartialEq)]
#[allow(non_camel_case_types)]
pub(crate) enum ColumnCryptoMetaData {
    /// Column is encrypted with the footer key.
    ENCRYPTION_WITH_FOOTER_KEY,
    /// Column is encrypted with its own key.
    ENCRYPTION_WITH_COLUMN_KEY(EncryptionWithColumnKey),
}

impl WriteThrift for ColumnCryptoMetaData {
    const ELEMENT_TYPE: ElementType = ElementType::Struct;

    fn write_thrift<W: Write>(&self, w: &mut CompactProtocolWriter<W>) -> Result<()> {
        match self {
            Self::ENCRYPTION_WITH_FOOTER_KEY => {
                w.write_empty_struct(1, 0)?;
            }
            Self::ENCRYPTION_WITH_COLUMN_KEY(key) => {
                key.write_thrift_field(w, 2, 0)?;
            }
        }
        w.write_struct_end()
    }
}

thrift_field_impl!(ColumnCryptoMetaData, FieldType::Struct);

impl ReadThrift for ColumnCryptoMetaData {
    fn read_thrift(prot: &mut CompactSliceReader<'_>) -> Result<Self> {
        let ident = prot.read_field_begin(0)?;
        let ret = match ident.id {
            1 => {
                prot.read_empty_struct()?;
                Self::ENCRYPTION_WITH_FOOTER_KEY
            }
            2 => Self::ENCRYPTION_WITH_COLUMN_KEY(EncryptionWithColumnKey::read_thrift(prot)?),
            other => {
                return Err(internal_err!(
                    "unexpected ColumnCryptoMetaData variant {}",
                    other
                ))
            }
        };
        let stop = prot.read_field_begin(ident.id)?;
        if stop.field_type != FieldType::Stop {
            return Err(internal_err!(
                "multiple fields set for union ColumnCryptoMetaData"
            ));
        }
        Ok(ret)
    }
}

thrift_struct!(
pub(crate) struct ColumnChunk {
  1: optional string file_path;
  2: required i64 file_offset;
  3: optional ColumnMetaData meta_data;
  4: optional i64 offset_index_offset;
  5: optional i32 offset_index_length;
  6: optional i64 column_index_offset;
  7: optional i32 column_index_length;
  8: optional ColumnCryptoMetaData crypto_metadata;
  9: optional binary encrypted_column_metadata;
}
);

thrift_struct!(
pub(crate) struct RowGroup {
  1: required list<ColumnChunk> columns;
  2: required i64 total_byte_size;
  3: required i64 num_rows;
  4: optional list<SortingColumn> sorting_columns;
  5: optional i64 file_offset;
  6: optional i64 total_compressed_size;
  7: optional i16 ordinal;
}
);

thrift_struct!(
pub(crate) struct AesGcmV1 {
  1: optional binary aad_prefix;
  2: optional binary aad_file_unique;
  3: optional bool supply_aad_prefix;
}
);

thrift_struct!(
pub(crate) struct AesGcmCtrV1 {
  1: optional binary aad_prefix;
  2: optional binary aad_file_unique;
  3: optional bool supply_aad_prefix;
}
);

/// The file's encryption algorithm, recorded in the footer or in
/// [`FileCryptoMetaData`].
#[derive(Clone, Debug, PartialEq)]
#[allow(non_camel_case_types)]
pub(crate) enum EncryptionAlgorithm {
    AES_GCM_V1(AesGcmV1),
    AES_GCM_CTR_V1(AesGcmCtrV1),
}

impl WriteThrift for EncryptionAlgorithm {
    const ELEMENT_TYPE: ElementType = ElementType::Struct;

    fn write_thrift<W: Write>(&self, w: &mut CompactProtocolWriter<W>) -> Result<()> {
        match self {
            Self::AES_GCM_V1(algo) => {
                algo.write_thrift_field(w, 1, 0)?;
            }
            Self::AES_GCM_CTR_V1(algo) => {
                algo.write_thrift_field(w, 2, 0)?;
            }
        }
        w.write_struct_end()
    }
}

thrift_field_impl!(EncryptionAlgorithm, FieldType::Struct);

impl ReadThrift for EncryptionAlgorithm {
    fn read_thrift(prot: &mut CompactSliceReader<'_>) -> Result<Self> {
        let ident = prot.read_field_begin(0)?;
        let ret = match ident.id {
            1 => Self::AES_GCM_V1(AesGcmV1::read_thrift(prot)?),
            2 => Self::AES_GCM_CTR_V1(AesGcmCtrV1::read_thrift(prot)?),
            other => {
                return Err(internal_err!(
                    "unexpected EncryptionAlgorithm variant {}",
                    other
                ))
            }
        };
        let stop = prot.read_field_begin(ident.id)?;
        if stop.field_type != FieldType::Stop {
            return Err(internal_err!(
                "multiple fields set for union EncryptionAlgorithm"
            ));
        }
        Ok(ret)
    }
}

thrift_struct!(
/// Plaintext preamble of an encrypted footer.
pub(crate) struct FileCryptoMetaData {
  1: required EncryptionAlgorithm encryption_algorithm;
  2: optional binary key_metadata;
}
);

thrift_struct!(
/// The footer itself.
pub(crate) struct FileMetaData {
  1: required i32 version;
  2: required list<SchemaElement> schema;
  3: required i64 num_rows;
  4: required list<RowGroup> row_groups;
  5: optional list<KeyValue> key_value_metadata;
  6: optional string created_by;
  7: optional list<ColumnOrder> column_orders;
  8: optional EncryptionAlgorithm encryption_algorithm;
  9: optional binary footer_signing_key_metadata;
}
);

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<T: WriteThrift + ReadThrift + PartialEq + std::fmt::Debug>(val: &T) {
        let mut buf = Vec::new();
        val.write_thrift(&mut CompactProtocolWriter::new(&mut buf))
            .unwrap();
        let read = T::read_thrift(&mut CompactSliceReader::new(&buf)).unwrap();
        assert_eq!(&read, val);
    }

    #[test]
    fn test_schema_element_roundtrip() {
        roundtrip(&SchemaElement {
            r#type: Some(Type::FIXED_LEN_BYTE_ARRAY),
            type_length: Some(16),
            repetition_type: Some(Repetition::OPTIONAL),
            name: "uuid_field".to_owned(),
            num_children: None,
            converted_type: None,
            scale: None,
            precision: None,
            field_id: Some(4),
            logical_type: Some(LogicalType::Uuid),
        });
    }

    #[test]
    fn test_page_header_roundtrip() {
        roundtrip(&PageHeader {
            r#type: PageType::DATA_PAGE,
            uncompressed_page_size: 123,
            compressed_page_size: 77,
            crc: Some(-557),
            data_page_header: Some(DataPageHeader {
                num_values: 10,
                encoding: Encoding::PLAIN,
                definition_level_encoding: Encoding::RLE,
                repetition_level_encoding: Encoding::RLE,
                statistics: Some(Statistics {
                    max: None,
                    min: None,
                    null_count: Some(2),
                    distinct_count: None,
                    max_value: Some(vec![1, 2, 3]),
                    min_value: Some(vec![0]),
                    is_max_value_exact: Some(true),
                    is_min_value_exact: Some(true),
                }),
            }),
            index_page_header: None,
            dictionary_page_header: None,
            data_page_header_v2: None,
        });
    }

    #[test]
    fn test_file_meta_data_roundtrip() {
        roundtrip(&FileMetaData {
            version: 1,
            schema: vec![
                SchemaElement {
                    r#type: None,
                    type_length: None,
                    repetition_type: None,
                    name: "schema".to_owned(),
                    num_children: Some(1),
                    converted_type: None,
                    scale: None,
                    precision: None,
                    field_id: None,
                    logical_type: None,
                },
                SchemaElement {
                    r#type: Some(Type::INT64),
                    type_length: None,
                    repetition_type: Some(Repetition::REQUIRED),
                    name: "id".to_owned(),
                    num_children: None,
                    converted_type: None,
                    scale: None,
                    precision: None,
                    field_id: None,
                    logical_type: None,
                },
            ],
            num_rows: 42,
            row_groups: vec![RowGroup {
                columns: vec![ColumnChunk {
                    file_path: None,
                    file_offset: 0,
                    meta_data: Some(ColumnMetaData {
                        r#type: Type::INT64,
                        encodings: vec![Encoding::PLAIN, Encoding::RLE],
                        path_in_schema: vec!["id".to_owned()],
                        codec: Compression::SNAPPY,
                        num_values: 42,
                        total_uncompressed_size: 1000,
                        total_compressed_size: 600,
                        data_page_offset: 4,
                        index_page_offset: None,
                        dictionary_page_offset: None,
                        statistics: None,
                    }),
                    offset_index_offset: None,
                    offset_index_length: None,
                    column_index_offset: None,
                    column_index_length: None,
                    crypto_metadata: None,
                    encrypted_column_metadata: None,
                }],
                total_byte_size: 1000,
                num_rows: 42,
                sorting_columns: Some(vec![SortingColumn {
                    column_idx: 0,
                    descending: false,
                    nulls_first: false,
                }]),
                file_offset: Some(4),
                total_compressed_size: Some(600),
                ordinal: Some(0),
            }],
            key_value_metadata: Some(vec![KeyValue {
                key: "writer".to_owned(),
                value: Some("parquetry".to_owned()),
            }]),
            created_by: Some("parquetry version 0.1.0".to_owned()),
            column_orders: Some(vec![ColumnOrder::TYPE_ORDER]),
            encryption_algorithm: None,
            footer_signing_key_metadata: None,
        });
    }

    #[test]
    fn test_crypto_metadata_roundtrip() {
        roundtrip(&FileCryptoMetaData {
            encryption_algorithm: EncryptionAlgorithm::AES_GCM_V1(AesGcmV1 {
                aad_prefix: Some(b"prefix".to_vec()),
                aad_file_unique: Some(vec![1, 2, 3, 4, 5, 6, 7, 8]),
                supply_aad_prefix: Some(false),
            }),
            key_metadata: Some(b"kf".to_vec()),
        });
        roundtrip(&ColumnCryptoMetaData::ENCRYPTION_WITH_COLUMN_KEY(
            EncryptionWithColumnKey {
                path_in_schema: vec!["a".to_owned(), "b".to_owned()],
                key_metadata: None,
            },
        ));
        roundtrip(&ColumnCryptoMetaData::ENCRYPTION_WITH_FOOTER_KEY);
    }
}
