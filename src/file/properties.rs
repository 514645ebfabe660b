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

//! Writer configuration.
//!
//! # Usage
//!
//! ```rust
//! use parquetry::basic::{Compression, Encoding};
//! use parquetry::file::properties::*;
//! use parquetry::schema::types::ColumnPath;
//!
//! let props = WriterProperties::builder()
//!     .set_writer_version(WriterVersion::PARQUET_1_0)
//!     .set_compression(Compression::SNAPPY)
//!     .set_column_encoding(ColumnPath::from("col1"), Encoding::DELTA_BINARY_PACKED)
//!     .build();
//!
//! assert_eq!(props.compression(&ColumnPath::from("col2")), Compression::SNAPPY);
//! assert_eq!(
//!     props.encoding(&ColumnPath::from("col1")),
//!     Some(Encoding::DELTA_BINARY_PACKED)
//! );
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::basic::{Compression, Encoding};
use crate::encryption::encrypt::FileEncryptionProperties;
use crate::file::metadata::{KeyValue, SortingColumn};
use crate::schema::types::ColumnPath;

const DEFAULT_PAGE_SIZE: usize = 1024 * 1024;
const DEFAULT_WRITE_BATCH_SIZE: usize = 1024;
const DEFAULT_WRITER_VERSION: WriterVersion = WriterVersion::PARQUET_1_0;
const DEFAULT_COMPRESSION: Compression = Compression::UNCOMPRESSED;
const DEFAULT_DICTIONARY_ENABLED: bool = true;
const DEFAULT_DICTIONARY_PAGE_SIZE_LIMIT: usize = DEFAULT_PAGE_SIZE;
const DEFAULT_STATISTICS_ENABLED: EnabledStatistics = EnabledStatistics::Page;
const DEFAULT_ROW_GROUP_SIZE: usize = 128 * 1024 * 1024;
const DEFAULT_MIN_RECORD_COUNT_FOR_CHECK: usize = 100;
const DEFAULT_MAX_RECORD_COUNT_FOR_CHECK: usize = 10_000;
const DEFAULT_ESTIMATE_NEXT_SIZE_CHECK: bool = true;
const DEFAULT_PAGE_CHECKSUMS_ENABLED: bool = true;
const DEFAULT_MAX_PADDING_SIZE: usize = 8 * 1024 * 1024;
const DEFAULT_CREATED_BY: &str = concat!("parquetry version ", env!("CARGO_PKG_VERSION"));

/// Data page format version to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum WriterVersion {
    PARQUET_1_0,
    PARQUET_2_0,
}

impl WriterVersion {
    /// The version number written into the footer.
    pub fn as_num(&self) -> i32 {
        match self {
            WriterVersion::PARQUET_1_0 => 1,
            WriterVersion::PARQUET_2_0 => 2,
        }
    }
}

/// Which statistics the writer computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnabledStatistics {
    /// No statistics.
    None,
    /// Chunk-level statistics only.
    Chunk,
    /// Page-level and chunk-level statistics.
    #[default]
    Page,
}

/// Reference counted writer properties.
pub type WriterPropertiesPtr = Arc<WriterProperties>;

/// Immutable writer configuration, assembled with [`WriterPropertiesBuilder`].
#[derive(Debug, Clone)]
pub struct WriterProperties {
    data_page_size_limit: usize,
    dictionary_page_size_limit: usize,
    data_page_row_count_limit: usize,
    write_batch_size: usize,
    row_group_size_threshold: usize,
    min_record_count_for_check: usize,
    max_record_count_for_check: usize,
    estimate_next_size_check: bool,
    page_checksums_enabled: bool,
    row_group_alignment: Option<u64>,
    max_padding_size: usize,
    writer_version: WriterVersion,
    created_by: String,
    key_value_metadata: Option<Vec<KeyValue>>,
    sorting_columns: Option<Vec<SortingColumn>>,
    default_column_properties: ColumnProperties,
    column_properties: HashMap<ColumnPath, ColumnProperties>,
    file_encryption_properties: Option<FileEncryptionProperties>,
}

impl WriterProperties {
    /// Returns a builder with the default configuration.
    pub fn builder() -> WriterPropertiesBuilder {
        WriterPropertiesBuilder::with_defaults()
    }

    /// Best-effort limit on the encoded size of a data page.
    pub fn data_page_size_limit(&self) -> usize {
        self.data_page_size_limit
    }

    /// Size at which a column's dictionary falls back to plain encoding.
    pub fn dictionary_page_size_limit(&self) -> usize {
        self.dictionary_page_size_limit
    }

    /// Best-effort limit on the number of rows in a data page.
    pub fn data_page_row_count_limit(&self) -> usize {
        self.data_page_row_count_limit
    }

    /// Batch granularity of the bulk write APIs; limits are checked between
    /// batches.
    pub fn write_batch_size(&self) -> usize {
        self.write_batch_size
    }

    /// Buffered size at which the record writer flushes a row group.
    pub fn row_group_size_threshold(&self) -> usize {
        self.row_group_size_threshold
    }

    /// Fewest records between two memory probes of the record writer.
    pub fn min_record_count_for_check(&self) -> usize {
        self.min_record_count_for_check
    }

    /// Most records the record writer will go without a memory probe.
    pub fn max_record_count_for_check(&self) -> usize {
        self.max_record_count_for_check
    }

    /// Whether probe cadence is estimated from the observed record size
    /// rather than fixed at the minimum.
    pub fn estimate_next_size_check(&self) -> bool {
        self.estimate_next_size_check
    }

    /// Whether page headers carry a CRC32 of the compressed page body.
    pub fn page_checksums_enabled(&self) -> bool {
        self.page_checksums_enabled
    }

    /// Filesystem block size row groups are padded to, if configured.
    pub fn row_group_alignment(&self) -> Option<u64> {
        self.row_group_alignment
    }

    /// Most padding worth spending to reach an alignment boundary.
    pub fn max_padding_size(&self) -> usize {
        self.max_padding_size
    }

    pub fn writer_version(&self) -> WriterVersion {
        self.writer_version
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    pub fn key_value_metadata(&self) -> Option<&Vec<KeyValue>> {
        self.key_value_metadata.as_ref()
    }

    pub fn sorting_columns(&self) -> Option<&Vec<SortingColumn>> {
        self.sorting_columns.as_ref()
    }

    pub fn file_encryption_properties(&self) -> Option<&FileEncryptionProperties> {
        self.file_encryption_properties.as_ref()
    }

    /// Encoding of dictionary-encoded data pages. Not configurable.
    #[inline]
    pub fn dictionary_data_page_encoding(&self) -> Encoding {
        Encoding::RLE_DICTIONARY
    }

    /// Encoding of the dictionary page itself. Not configurable.
    #[inline]
    pub fn dictionary_page_encoding(&self) -> Encoding {
        Encoding::PLAIN
    }

    /// Explicitly configured encoding for a column, if any. With dictionary
    /// encoding enabled this is the fallback encoding.
    pub fn encoding(&self, col: &ColumnPath) -> Option<Encoding> {
        self.column_properties
            .get(col)
            .and_then(|c| c.encoding)
            .or(self.default_column_properties.encoding)
    }

    pub fn compression(&self, col: &ColumnPath) -> Compression {
        self.column_properties
            .get(col)
            .and_then(|c| c.codec)
            .or(self.default_column_properties.codec)
            .unwrap_or(DEFAULT_COMPRESSION)
    }

    pub fn dictionary_enabled(&self, col: &ColumnPath) -> bool {
        self.column_properties
            .get(col)
            .and_then(|c| c.dictionary_enabled)
            .or(self.default_column_properties.dictionary_enabled)
            .unwrap_or(DEFAULT_DICTIONARY_ENABLED)
    }

    pub fn statistics_enabled(&self, col: &ColumnPath) -> EnabledStatistics {
        self.column_properties
            .get(col)
            .and_then(|c| c.statistics_enabled)
            .or(self.default_column_properties.statistics_enabled)
            .unwrap_or(DEFAULT_STATISTICS_ENABLED)
    }
}

/// Builder for [`WriterProperties`].
pub struct WriterPropertiesBuilder {
    props: WriterProperties,
}

impl WriterPropertiesBuilder {
    fn with_defaults() -> Self {
        Self {
            props: WriterProperties {
                data_page_size_limit: DEFAULT_PAGE_SIZE,
                dictionary_page_size_limit: DEFAULT_DICTIONARY_PAGE_SIZE_LIMIT,
                data_page_row_count_limit: usize::MAX,
                write_batch_size: DEFAULT_WRITE_BATCH_SIZE,
                row_group_size_threshold: DEFAULT_ROW_GROUP_SIZE,
                min_record_count_for_check: DEFAULT_MIN_RECORD_COUNT_FOR_CHECK,
                max_record_count_for_check: DEFAULT_MAX_RECORD_COUNT_FOR_CHECK,
                estimate_next_size_check: DEFAULT_ESTIMATE_NEXT_SIZE_CHECK,
                page_checksums_enabled: DEFAULT_PAGE_CHECKSUMS_ENABLED,
                row_group_alignment: None,
                max_padding_size: DEFAULT_MAX_PADDING_SIZE,
                writer_version: DEFAULT_WRITER_VERSION,
                created_by: DEFAULT_CREATED_BY.to_owned(),
                key_value_metadata: None,
                sorting_columns: None,
                default_column_properties: ColumnProperties::default(),
                column_properties: HashMap::new(),
                file_encryption_properties: None,
            },
        }
    }

    /// Finalizes the configuration.
    pub fn build(self) -> WriterProperties {
        self.props
    }

    pub fn set_writer_version(mut self, value: WriterVersion) -> Self {
        self.props.writer_version = value;
        self
    }

    pub fn set_data_page_size_limit(mut self, value: usize) -> Self {
        self.props.data_page_size_limit = value;
        self
    }

    pub fn set_dictionary_page_size_limit(mut self, value: usize) -> Self {
        self.props.dictionary_page_size_limit = value;
        self
    }

    pub fn set_data_page_row_count_limit(mut self, value: usize) -> Self {
        self.props.data_page_row_count_limit = value;
        self
    }

    pub fn set_write_batch_size(mut self, value: usize) -> Self {
        self.props.write_batch_size = value;
        self
    }

    /// Sets the buffered size at which a row group is flushed. The bound is
    /// approximate: a row group may exceed it by roughly one record.
    pub fn set_row_group_size_threshold(mut self, value: usize) -> Self {
        assert!(value > 0, "row group size threshold must be positive");
        self.props.row_group_size_threshold = value;
        self
    }

    pub fn set_min_record_count_for_check(mut self, value: usize) -> Self {
        self.props.min_record_count_for_check = value.max(1);
        self
    }

    pub fn set_max_record_count_for_check(mut self, value: usize) -> Self {
        self.props.max_record_count_for_check = value.max(1);
        self
    }

    pub fn set_estimate_next_size_check(mut self, value: bool) -> Self {
        self.props.estimate_next_size_check = value;
        self
    }

    pub fn set_page_checksums_enabled(mut self, value: bool) -> Self {
        self.props.page_checksums_enabled = value;
        self
    }

    /// Pads row groups with zeros up to multiples of `value` bytes when the
    /// remaining space is within the max padding size.
    pub fn set_row_group_alignment(mut self, value: Option<u64>) -> Self {
        self.props.row_group_alignment = value;
        self
    }

    pub fn set_max_padding_size(mut self, value: usize) -> Self {
        self.props.max_padding_size = value;
        self
    }

    pub fn set_created_by(mut self, value: String) -> Self {
        self.props.created_by = value;
        self
    }

    pub fn set_key_value_metadata(mut self, value: Option<Vec<KeyValue>>) -> Self {
        self.props.key_value_metadata = value;
        self
    }

    pub fn set_sorting_columns(mut self, value: Option<Vec<SortingColumn>>) -> Self {
        self.props.sorting_columns = value;
        self
    }

    pub fn set_file_encryption_properties(
        mut self,
        value: Option<FileEncryptionProperties>,
    ) -> Self {
        self.props.file_encryption_properties = value;
        self
    }

    // ------------------------------------------------------------------
    // Column defaults and per-column overrides

    fn column_props(&mut self, col: ColumnPath) -> &mut ColumnProperties {
        self.props.column_properties.entry(col).or_default()
    }

    /// Sets the encoding for all columns. With dictionary encoding enabled
    /// this acts as the fallback encoding; requesting a dictionary encoding
    /// here panics.
    pub fn set_encoding(mut self, value: Encoding) -> Self {
        self.props.default_column_properties.set_encoding(value);
        self
    }

    pub fn set_compression(mut self, value: Compression) -> Self {
        self.props.default_column_properties.codec = Some(value);
        self
    }

    pub fn set_dictionary_enabled(mut self, value: bool) -> Self {
        self.props.default_column_properties.dictionary_enabled = Some(value);
        self
    }

    pub fn set_statistics_enabled(mut self, value: EnabledStatistics) -> Self {
        self.props.default_column_properties.statistics_enabled = Some(value);
        self
    }

    /// As [`set_encoding`](Self::set_encoding), for one column.
    pub fn set_column_encoding(mut self, col: ColumnPath, value: Encoding) -> Self {
        self.column_props(col).set_encoding(value);
        self
    }

    pub fn set_column_compression(mut self, col: ColumnPath, value: Compression) -> Self {
        self.column_props(col).codec = Some(value);
        self
    }

    pub fn set_column_dictionary_enabled(mut self, col: ColumnPath, value: bool) -> Self {
        self.column_props(col).dictionary_enabled = Some(value);
        self
    }

    pub fn set_column_statistics_enabled(
        mut self,
        col: ColumnPath,
        value: EnabledStatistics,
    ) -> Self {
        self.column_props(col).statistics_enabled = Some(value);
        self
    }
}

/// Per-column overrides; `None` falls through to the defaults.
#[derive(Debug, Clone, Default)]
struct ColumnProperties {
    encoding: Option<Encoding>,
    codec: Option<Compression>,
    dictionary_enabled: Option<bool>,
    statistics_enabled: Option<EnabledStatistics>,
}

impl ColumnProperties {
    fn set_encoding(&mut self, value: Encoding) {
        if value == Encoding::PLAIN_DICTIONARY || value == Encoding::RLE_DICTIONARY {
            panic!("dictionary encoding can not be used as fallback encoding");
        }
        self.encoding = Some(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let props = WriterProperties::builder().build();
        assert_eq!(props.writer_version(), WriterVersion::PARQUET_1_0);
        assert_eq!(props.data_page_size_limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(props.row_group_size_threshold(), DEFAULT_ROW_GROUP_SIZE);
        assert!(props.estimate_next_size_check());
        assert!(props.page_checksums_enabled());
        assert!(props.dictionary_enabled(&ColumnPath::from("any")));
        assert_eq!(
            props.statistics_enabled(&ColumnPath::from("any")),
            EnabledStatistics::Page
        );
        assert_eq!(
            props.compression(&ColumnPath::from("any")),
            Compression::UNCOMPRESSED
        );
        assert_eq!(props.encoding(&ColumnPath::from("any")), None);
        assert!(props.created_by().starts_with("parquetry version"));
    }

    #[test]
    fn test_column_overrides_take_precedence() {
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .set_dictionary_enabled(false)
            .set_column_compression(ColumnPath::from("a.b"), Compression::LZ4_RAW)
            .set_column_dictionary_enabled(ColumnPath::from("a.b"), true)
            .set_column_encoding(ColumnPath::from("a.b"), Encoding::DELTA_BINARY_PACKED)
            .build();

        assert_eq!(
            props.compression(&ColumnPath::from("a.b")),
            Compression::LZ4_RAW
        );
        assert_eq!(
            props.compression(&ColumnPath::from("other")),
            Compression::SNAPPY
        );
        assert!(props.dictionary_enabled(&ColumnPath::from("a.b")));
        assert!(!props.dictionary_enabled(&ColumnPath::from("other")));
        assert_eq!(
            props.encoding(&ColumnPath::from("a.b")),
            Some(Encoding::DELTA_BINARY_PACKED)
        );
    }

    #[test]
    #[should_panic(expected = "dictionary encoding can not be used as fallback encoding")]
    fn test_dictionary_encoding_rejected_as_fallback() {
        WriterProperties::builder().set_encoding(Encoding::RLE_DICTIONARY);
    }
}
