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

//! In-memory metadata for column chunks and row groups, and its conversion
//! to the wire structs of the footer.

use std::sync::Arc;

use crate::basic::{Compression, Encoding, Type};
use crate::errors::Result;
use crate::file::statistics::{self, Statistics};
use crate::format;
use crate::schema::stringify::Stringifier;
use crate::schema::types::{ColumnDescPtr, SchemaDescPtr};

pub use crate::format::{KeyValue, SortingColumn};

/// Reference counted row group metadata.
pub type RowGroupMetaDataPtr = Arc<RowGroupMetaData>;

/// Metadata of one column chunk within a row group.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnChunkMetaData {
    column_descr: ColumnDescPtr,
    encodings: Vec<Encoding>,
    file_offset: i64,
    num_values: i64,
    compression: Compression,
    total_compressed_size: i64,
    total_uncompressed_size: i64,
    data_page_offset: i64,
    index_page_offset: Option<i64>,
    dictionary_page_offset: Option<i64>,
    statistics: Option<Statistics>,
    pub(crate) crypto_metadata: Option<format::ColumnCryptoMetaData>,
    pub(crate) encrypted_column_metadata: Option<Vec<u8>>,
}

impl ColumnChunkMetaData {
    /// Starts building metadata for the chunk of `column_descr`.
    pub fn builder(column_descr: ColumnDescPtr) -> ColumnChunkMetaDataBuilder {
        ColumnChunkMetaDataBuilder::new(column_descr)
    }

    pub fn column_descr(&self) -> &ColumnDescPtr {
        &self.column_descr
    }

    pub fn column_type(&self) -> Type {
        self.column_descr.physical_type()
    }

    /// Encodings used by any page of this chunk.
    pub fn encodings(&self) -> &[Encoding] {
        &self.encodings
    }

    /// Byte offset of the first byte after this chunk.
    pub fn file_offset(&self) -> i64 {
        self.file_offset
    }

    /// Total number of values, nulls included.
    pub fn num_values(&self) -> i64 {
        self.num_values
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Compressed size of all pages including their headers.
    pub fn compressed_size(&self) -> i64 {
        self.total_compressed_size
    }

    /// Uncompressed size of all pages including their headers.
    pub fn uncompressed_size(&self) -> i64 {
        self.total_uncompressed_size
    }

    /// File offset of the first data page header.
    pub fn data_page_offset(&self) -> i64 {
        self.data_page_offset
    }

    /// File offset of the dictionary page header, when the chunk has one.
    pub fn dictionary_page_offset(&self) -> Option<i64> {
        self.dictionary_page_offset
    }

    /// File offset of the chunk's first page.
    pub fn byte_range(&self) -> (u64, u64) {
        let start = self
            .dictionary_page_offset
            .unwrap_or(self.data_page_offset) as u64;
        (start, self.total_compressed_size as u64)
    }

    pub fn statistics(&self) -> Option<&Statistics> {
        self.statistics.as_ref()
    }

    /// The chunk's min and max rendered in the column's canonical display
    /// form, for diagnostics. `None` when statistics or min/max are absent.
    pub fn statistics_display(&self) -> Option<(String, String)> {
        let stringifier = Stringifier::for_column(&self.column_descr);
        match self.statistics.as_ref()? {
            Statistics::Boolean(s) => Some((
                stringifier.stringify_bool(*s.min_opt()?),
                stringifier.stringify_bool(*s.max_opt()?),
            )),
            Statistics::Int32(s) => Some((
                stringifier.stringify_i32(*s.min_opt()?),
                stringifier.stringify_i32(*s.max_opt()?),
            )),
            Statistics::Int64(s) => Some((
                stringifier.stringify_i64(*s.min_opt()?),
                stringifier.stringify_i64(*s.max_opt()?),
            )),
            Statistics::Float(s) => Some((
                stringifier.stringify_f32(*s.min_opt()?),
                stringifier.stringify_f32(*s.max_opt()?),
            )),
            Statistics::Double(s) => Some((
                stringifier.stringify_f64(*s.min_opt()?),
                stringifier.stringify_f64(*s.max_opt()?),
            )),
            Statistics::ByteArray(s) => Some((
                stringifier.stringify_bytes(s.min_opt()?.data()),
                stringifier.stringify_bytes(s.max_opt()?.data()),
            )),
            Statistics::FixedLenByteArray(s) => Some((
                stringifier.stringify_bytes(s.min_opt()?.data()),
                stringifier.stringify_bytes(s.max_opt()?.data()),
            )),
            // INT96 carries no meaningful order to display
            Statistics::Int96(_) => None,
        }
    }

    /// Shifts the file offsets of a chunk that was staged in a memory
    /// buffer to its final position in the file.
    pub(crate) fn with_rebased_offsets(mut self, base: i64) -> Self {
        self.file_offset += base;
        self.data_page_offset += base;
        self.dictionary_page_offset = self.dictionary_page_offset.map(|off| off + base);
        self.index_page_offset = self.index_page_offset.map(|off| off + base);
        self
    }

    pub(crate) fn to_thrift(&self) -> format::ColumnChunk {
        let meta_data = format::ColumnMetaData {
            r#type: self.column_type(),
            encodings: self.encodings.clone(),
            path_in_schema: self.column_descr.path().parts().to_vec(),
            codec: self.compression,
            num_values: self.num_values,
            total_uncompressed_size: self.total_uncompressed_size,
            total_compressed_size: self.total_compressed_size,
            data_page_offset: self.data_page_offset,
            index_page_offset: self.index_page_offset,
            dictionary_page_offset: self.dictionary_page_offset,
            statistics: statistics::to_thrift(self.statistics.as_ref()),
        };
        format::ColumnChunk {
            file_path: None,
            file_offset: self.file_offset,
            meta_data: Some(meta_data),
            offset_index_offset: None,
            offset_index_length: None,
            column_index_offset: None,
            column_index_length: None,
            crypto_metadata: self.crypto_metadata.clone(),
            encrypted_column_metadata: self.encrypted_column_metadata.clone(),
        }
    }
}

/// Builder used by the column writer when closing a chunk.
pub struct ColumnChunkMetaDataBuilder {
    column_descr: ColumnDescPtr,
    encodings: Vec<Encoding>,
    file_offset: i64,
    num_values: i64,
    compression: Compression,
    total_compressed_size: i64,
    total_uncompressed_size: i64,
    data_page_offset: i64,
    index_page_offset: Option<i64>,
    dictionary_page_offset: Option<i64>,
    statistics: Option<Statistics>,
    crypto_metadata: Option<format::ColumnCryptoMetaData>,
}

impl ColumnChunkMetaDataBuilder {
    fn new(column_descr: ColumnDescPtr) -> Self {
        Self {
            column_descr,
            encodings: Vec::new(),
            file_offset: 0,
            num_values: 0,
            compression: Compression::UNCOMPRESSED,
            total_compressed_size: 0,
            total_uncompressed_size: 0,
            data_page_offset: 0,
            index_page_offset: None,
            dictionary_page_offset: None,
            statistics: None,
            crypto_metadata: None,
        }
    }

    pub fn set_encodings(mut self, encodings: Vec<Encoding>) -> Self {
        self.encodings = encodings;
        self
    }

    pub fn set_file_offset(mut self, value: i64) -> Self {
        self.file_offset = value;
        self
    }

    pub fn set_num_values(mut self, value: i64) -> Self {
        self.num_values = value;
        self
    }

    pub fn set_compression(mut self, value: Compression) -> Self {
        self.compression = value;
        self
    }

    pub fn set_total_compressed_size(mut self, value: i64) -> Self {
        self.total_compressed_size = value;
        self
    }

    pub fn set_total_uncompressed_size(mut self, value: i64) -> Self {
        self.total_uncompressed_size = value;
        self
    }

    pub fn set_data_page_offset(mut self, value: i64) -> Self {
        self.data_page_offset = value;
        self
    }

    pub fn set_index_page_offset(mut self, value: Option<i64>) -> Self {
        self.index_page_offset = value;
        self
    }

    pub fn set_dictionary_page_offset(mut self, value: Option<i64>) -> Self {
        self.dictionary_page_offset = value;
        self
    }

    pub fn set_statistics(mut self, value: Option<Statistics>) -> Self {
        self.statistics = value;
        self
    }

    pub(crate) fn set_crypto_metadata(
        mut self,
        value: Option<format::ColumnCryptoMetaData>,
    ) -> Self {
        self.crypto_metadata = value;
        self
    }

    pub fn build(self) -> Result<ColumnChunkMetaData> {
        Ok(ColumnChunkMetaData {
            column_descr: self.column_descr,
            encodings: self.encodings,
            file_offset: self.file_offset,
            num_values: self.num_values,
            compression: self.compression,
            total_compressed_size: self.total_compressed_size,
            total_uncompressed_size: self.total_uncompressed_size,
            data_page_offset: self.data_page_offset,
            index_page_offset: self.index_page_offset,
            dictionary_page_offset: self.dictionary_page_offset,
            statistics: self.statistics,
            crypto_metadata: self.crypto_metadata,
            encrypted_column_metadata: None,
        })
    }
}

/// Metadata of one row group.
#[derive(Debug, Clone, PartialEq)]
pub struct RowGroupMetaData {
    columns: Vec<ColumnChunkMetaData>,
    num_rows: i64,
    total_byte_size: i64,
    file_offset: Option<i64>,
    sorting_columns: Option<Vec<SortingColumn>>,
    ordinal: Option<i16>,
}

impl RowGroupMetaData {
    pub fn builder(schema_descr: SchemaDescPtr) -> RowGroupMetaDataBuilder {
        RowGroupMetaDataBuilder::new(schema_descr)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, i: usize) -> &ColumnChunkMetaData {
        &self.columns[i]
    }

    pub fn columns(&self) -> &[ColumnChunkMetaData] {
        &self.columns
    }

    pub fn num_rows(&self) -> i64 {
        self.num_rows
    }

    /// Total uncompressed byte size of all column data.
    pub fn total_byte_size(&self) -> i64 {
        self.total_byte_size
    }

    /// Compressed size of all column chunks.
    pub fn compressed_size(&self) -> i64 {
        self.columns.iter().map(|c| c.total_compressed_size).sum()
    }

    /// Byte offset of the first page of the first column chunk.
    pub fn file_offset(&self) -> Option<i64> {
        self.file_offset
    }

    pub fn sorting_columns(&self) -> Option<&Vec<SortingColumn>> {
        self.sorting_columns.as_ref()
    }

    /// Position of this row group in the file, starting at 0.
    pub fn ordinal(&self) -> Option<i16> {
        self.ordinal
    }

    pub(crate) fn to_thrift(&self) -> format::RowGroup {
        format::RowGroup {
            columns: self.columns.iter().map(|c| c.to_thrift()).collect(),
            total_byte_size: self.total_byte_size,
            num_rows: self.num_rows,
            sorting_columns: self.sorting_columns.clone(),
            file_offset: self.file_offset,
            total_compressed_size: Some(self.compressed_size()),
            ordinal: self.ordinal,
        }
    }
}

/// Builder used by the row group writer on close.
pub struct RowGroupMetaDataBuilder {
    schema_descr: SchemaDescPtr,
    columns: Vec<ColumnChunkMetaData>,
    num_rows: i64,
    total_byte_size: i64,
    file_offset: Option<i64>,
    sorting_columns: Option<Vec<SortingColumn>>,
    ordinal: Option<i16>,
}

impl RowGroupMetaDataBuilder {
    fn new(schema_descr: SchemaDescPtr) -> Self {
        Self {
            schema_descr,
            columns: Vec::new(),
            num_rows: 0,
            total_byte_size: 0,
            file_offset: None,
            sorting_columns: None,
            ordinal: None,
        }
    }

    pub fn set_column_metadata(mut self, columns: Vec<ColumnChunkMetaData>) -> Self {
        self.columns = columns;
        self
    }

    pub fn set_num_rows(mut self, num_rows: i64) -> Self {
        self.num_rows = num_rows;
        self
    }

    pub fn set_total_byte_size(mut self, total_byte_size: i64) -> Self {
        self.total_byte_size = total_byte_size;
        self
    }

    pub fn set_file_offset(mut self, file_offset: i64) -> Self {
        self.file_offset = Some(file_offset);
        self
    }

    pub fn set_sorting_columns(mut self, sorting_columns: Option<Vec<SortingColumn>>) -> Self {
        self.sorting_columns = sorting_columns;
        self
    }

    pub fn set_ordinal(mut self, ordinal: i16) -> Self {
        self.ordinal = Some(ordinal);
        self
    }

    pub fn build(self) -> Result<RowGroupMetaData> {
        if self.schema_descr.num_columns() != self.columns.len() {
            return Err(state_err!(
                "column count mismatch: the schema has {} leaves but {} chunks were written",
                self.schema_descr.num_columns(),
                self.columns.len()
            ));
        }
        Ok(RowGroupMetaData {
            columns: self.columns,
            num_rows: self.num_rows,
            total_byte_size: self.total_byte_size,
            file_offset: self.file_offset,
            sorting_columns: self.sorting_columns,
            ordinal: self.ordinal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::Repetition;
    use crate::schema::types::{SchemaDescriptor, Type as SchemaType};

    fn single_column_schema() -> SchemaDescPtr {
        let field = SchemaType::primitive_type_builder("a", Type::INT32)
            .with_repetition(Repetition::REQUIRED)
            .build()
            .unwrap();
        let schema = SchemaType::group_type_builder("schema")
            .with_fields(vec![Arc::new(field)])
            .build()
            .unwrap();
        Arc::new(SchemaDescriptor::new(Arc::new(schema)))
    }

    #[test]
    fn test_column_chunk_to_thrift() {
        let descr = single_column_schema().column(0);
        let meta = ColumnChunkMetaData::builder(descr)
            .set_compression(Compression::SNAPPY)
            .set_encodings(vec![Encoding::PLAIN, Encoding::RLE])
            .set_num_values(100)
            .set_total_compressed_size(500)
            .set_total_uncompressed_size(700)
            .set_data_page_offset(4)
            .set_dictionary_page_offset(None)
            .build()
            .unwrap();

        let chunk = meta.to_thrift();
        let cm = chunk.meta_data.unwrap();
        assert_eq!(cm.path_in_schema, vec!["a".to_owned()]);
        assert_eq!(cm.codec, Compression::SNAPPY);
        assert_eq!(cm.num_values, 100);
        assert_eq!(cm.data_page_offset, 4);
        assert_eq!(cm.dictionary_page_offset, None);
        assert_eq!(meta.byte_range(), (4, 500));
    }

    #[test]
    fn test_statistics_display_uses_column_annotation() {
        use crate::basic::LogicalType;
        use crate::file::statistics::ValueStatistics;

        let field = SchemaType::primitive_type_builder("d", Type::INT32)
            .with_repetition(Repetition::REQUIRED)
            .with_logical_type(LogicalType::Decimal {
                precision: 9,
                scale: 2,
            })
            .build()
            .unwrap();
        let schema = SchemaType::group_type_builder("schema")
            .with_fields(vec![Arc::new(field)])
            .build()
            .unwrap();
        let descr = Arc::new(SchemaDescriptor::new(Arc::new(schema))).column(0);

        let meta = ColumnChunkMetaData::builder(descr)
            .set_statistics(Some(
                ValueStatistics::new(Some(-1234i32), Some(567_890), None, 0).into(),
            ))
            .build()
            .unwrap();
        assert_eq!(
            meta.statistics_display(),
            Some(("-12.34".to_owned(), "5678.90".to_owned()))
        );
    }

    #[test]
    fn test_row_group_requires_all_columns() {
        let schema = single_column_schema();
        let err = RowGroupMetaData::builder(schema)
            .set_num_rows(10)
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Illegal state: column count mismatch: the schema has 1 leaves but 0 chunks were written"
        );
    }
}
