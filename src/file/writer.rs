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

//! The serialized file writer: magic, row groups of column chunks, and the
//! thrift-compact footer.
//!
//! The writer is an explicit lifecycle machine. A file writer moves
//! `Created → Started → (row group open/closed)* → Ended`; calling an
//! operation out of order fails with an
//! [`IllegalState`](crate::errors::Error::IllegalState) error, and a writer
//! abandoned before [`end`](SerializedFileWriter::end) leaves a truncated
//! file behind.

use std::io::Write;
use std::sync::Arc;

use crate::basic::PageType;
use crate::column::page::{CompressedPage, Page, PageWriteSpec, PageWriter};
use crate::column::writer::{get_column_writer, ColumnCloseResult, ColumnWriter};
use crate::encryption::ciphers::BlockEncryptor;
use crate::encryption::encrypt::FileEncryptor;
use crate::encryption::modules::create_footer_aad;
use crate::encryption::page_encryptor::PageEncryptor;
use crate::errors::Result;
use crate::file::metadata::{ColumnChunkMetaData, RowGroupMetaData, RowGroupMetaDataPtr};
use crate::file::properties::WriterPropertiesPtr;
use crate::file::statistics::to_thrift as statistics_to_thrift;
use crate::file::{FOOTER_SIZE, PARQUET_MAGIC, PARQUET_MAGIC_ENCRYPTED_FOOTER};
use crate::format;
use crate::schema::types::{self, ColumnDescPtr, SchemaDescPtr, SchemaDescriptor, TypePtr};
use crate::thrift::{CompactProtocolWriter, WriteThrift};

/// A [`Write`] wrapper that tracks the number of bytes written.
pub struct TrackedWrite<W> {
    inner: W,
    bytes_written: usize,
}

impl<W: Write> TrackedWrite<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            bytes_written: 0,
        }
    }

    /// Bytes written through this wrapper so far.
    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for TrackedWrite<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let bytes = self.inner.write(buf)?;
        self.bytes_written += bytes;
        Ok(bytes)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Callback invoked when a column chunk closes.
pub type OnCloseColumnChunk<'a> = Box<dyn FnOnce(ColumnCloseResult) -> Result<()> + 'a>;

/// Callback invoked when a row group closes.
pub type OnCloseRowGroup<'a> = Box<dyn FnOnce(RowGroupMetaDataPtr) -> Result<()> + 'a>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileWriterState {
    Created,
    Started,
    RowGroupOpen,
    Ended,
}

/// Writes a Parquet file to a [`Write`] sink, one row group at a time.
///
/// The workflow is: [`start`](Self::start) once, then for each row group
/// [`next_row_group`](Self::next_row_group) and close the returned writer,
/// and finally [`end`](Self::end).
pub struct SerializedFileWriter<W: Write + Send> {
    buf: TrackedWrite<W>,
    schema: TypePtr,
    descr: SchemaDescPtr,
    props: WriterPropertiesPtr,
    row_groups: Vec<RowGroupMetaDataPtr>,
    row_group_index: usize,
    file_encryptor: Option<Arc<FileEncryptor>>,
    state: FileWriterState,
}

impl<W: Write + Send> SerializedFileWriter<W> {
    /// Creates a writer in the `Created` state; nothing is written until
    /// [`start`](Self::start).
    pub fn new(buf: W, schema: TypePtr, properties: WriterPropertiesPtr) -> Result<Self> {
        let descr = Arc::new(SchemaDescriptor::new(schema.clone()));
        let file_encryptor = match properties.file_encryption_properties() {
            Some(encryption_properties) => Some(Arc::new(FileEncryptor::new(
                encryption_properties.clone(),
            )?)),
            None => None,
        };
        Ok(Self {
            buf: TrackedWrite::new(buf),
            schema,
            descr,
            props: properties,
            row_groups: Vec::new(),
            row_group_index: 0,
            file_encryptor,
            state: FileWriterState::Created,
        })
    }

    /// Writes the leading magic bytes.
    pub fn start(&mut self) -> Result<()> {
        if self.state != FileWriterState::Created {
            return Err(state_err!("cannot start a writer that is already started"));
        }
        self.buf.write_all(self.file_magic())?;
        self.state = FileWriterState::Started;
        Ok(())
    }

    /// Opens the next row group, padding to the configured block alignment
    /// first when enabled.
    pub fn next_row_group(&mut self) -> Result<SerializedRowGroupWriter<'_, W>> {
        match self.state {
            FileWriterState::Created => {
                return Err(state_err!("the writer must be started before row groups"))
            }
            FileWriterState::RowGroupOpen => {
                return Err(state_err!("previous row group writer was not closed"))
            }
            FileWriterState::Ended => return Err(state_err!("the writer is already ended")),
            FileWriterState::Started => {}
        }
        self.maybe_pad_to_alignment()?;

        self.state = FileWriterState::RowGroupOpen;
        let ordinal = self.row_group_index;
        self.row_group_index += 1;

        let row_groups = &mut self.row_groups;
        let state = &mut self.state;
        let on_close = move |metadata| {
            row_groups.push(metadata);
            *state = FileWriterState::Started;
            Ok(())
        };

        Ok(SerializedRowGroupWriter::new(
            self.descr.clone(),
            self.props.clone(),
            &mut self.buf,
            ordinal as i16,
            self.file_encryptor.clone(),
            Some(Box::new(on_close)),
        ))
    }

    /// Metadata of the row groups flushed so far.
    pub fn flushed_row_groups(&self) -> &[RowGroupMetaDataPtr] {
        &self.row_groups
    }

    pub(crate) fn file_encryptor(&self) -> Option<&Arc<FileEncryptor>> {
        self.file_encryptor.as_ref()
    }

    pub(crate) fn schema_descr(&self) -> &SchemaDescPtr {
        &self.descr
    }

    /// Current position in the output stream.
    pub fn bytes_written(&self) -> usize {
        self.buf.bytes_written()
    }

    /// Writes the footer and trailing magic, consuming the writer.
    pub fn end(mut self) -> Result<()> {
        match self.state {
            FileWriterState::RowGroupOpen => {
                return Err(state_err!("previous row group writer was not closed"))
            }
            FileWriterState::Created => {
                return Err(state_err!("the writer was never started"))
            }
            FileWriterState::Ended => return Err(state_err!("the writer is already ended")),
            FileWriterState::Started => {}
        }
        self.write_metadata()?;
        self.state = FileWriterState::Ended;
        self.buf.flush()?;
        Ok(())
    }

    fn file_magic(&self) -> &'static [u8; 4] {
        match &self.file_encryptor {
            Some(encryptor) if encryptor.encrypt_footer() => &PARQUET_MAGIC_ENCRYPTED_FOOTER,
            _ => &PARQUET_MAGIC,
        }
    }

    /// Zero-pads to the next alignment boundary when the gap is within the
    /// padding budget.
    fn maybe_pad_to_alignment(&mut self) -> Result<()> {
        let Some(alignment) = self.props.row_group_alignment() else {
            return Ok(());
        };
        let position = self.buf.bytes_written() as u64;
        let remaining = (alignment - position % alignment) % alignment;
        if remaining > 0 && remaining <= self.props.max_padding_size() as u64 {
            const ZEROS: [u8; 4096] = [0u8; 4096];
            let mut left = remaining as usize;
            while left > 0 {
                let chunk = left.min(ZEROS.len());
                self.buf.write_all(&ZEROS[..chunk])?;
                left -= chunk;
            }
        }
        Ok(())
    }

    /// Assembles and writes the footer: metadata, its little-endian length,
    /// and the closing magic.
    fn write_metadata(&mut self) -> Result<()> {
        let num_rows = self.row_groups.iter().map(|rg| rg.num_rows()).sum();

        let mut row_groups: Vec<format::RowGroup> = Vec::with_capacity(self.row_groups.len());
        for (ordinal, rg) in self.row_groups.iter().enumerate() {
            let mut rg = rg.to_thrift();
            if let Some(encryptor) = &self.file_encryptor {
                encryptor.encrypt_row_group_metadata(&mut rg, ordinal)?;
            }
            row_groups.push(rg);
        }

        // every leaf gets the type-defined order
        let column_orders = Some(vec![format::ColumnOrder::TYPE_ORDER; self.descr.num_columns()]);

        let mut file_metadata = format::FileMetaData {
            version: self.props.writer_version().as_num(),
            schema: types::to_flat_elements(self.schema.as_ref())?,
            num_rows,
            row_groups,
            key_value_metadata: self.props.key_value_metadata().cloned(),
            created_by: Some(self.props.created_by().to_owned()),
            column_orders,
            encryption_algorithm: None,
            footer_signing_key_metadata: None,
        };

        let start_pos = self.buf.bytes_written();
        match self.file_encryptor.clone() {
            Some(encryptor) if encryptor.encrypt_footer() => {
                // plaintext crypto preamble, then the footer as one
                // encrypted module
                let crypto_metadata = encryptor.file_crypto_metadata()?;
                let mut protocol = CompactProtocolWriter::new(&mut self.buf);
                crypto_metadata.write_thrift(&mut protocol)?;

                let aad = create_footer_aad(encryptor.file_aad())?;
                let mut plaintext = Vec::new();
                file_metadata.write_thrift(&mut CompactProtocolWriter::new(&mut plaintext))?;
                let ciphertext = encryptor.footer_encryptor()?.encrypt(&plaintext, &aad)?;
                self.buf.write_all(&(ciphertext.len() as u32).to_le_bytes())?;
                self.buf.write_all(&ciphertext)?;
            }
            Some(encryptor) => {
                // plaintext footer mode: footer in clear, advertised
                // algorithm, and a trailing GCM signature so tampering is
                // detectable
                file_metadata.encryption_algorithm = Some(encryptor.encryption_algorithm());
                file_metadata.footer_signing_key_metadata =
                    encryptor.footer_key_metadata().map(|m| m.to_vec());

                let mut plaintext = Vec::new();
                file_metadata.write_thrift(&mut CompactProtocolWriter::new(&mut plaintext))?;
                self.buf.write_all(&plaintext)?;

                let aad = create_footer_aad(encryptor.file_aad())?;
                let (nonce, tag) = encryptor.footer_encryptor()?.sign(&plaintext, &aad)?;
                self.buf.write_all(&nonce)?;
                self.buf.write_all(&tag)?;
            }
            None => {
                let mut protocol = CompactProtocolWriter::new(&mut self.buf);
                file_metadata.write_thrift(&mut protocol)?;
            }
        }
        let end_pos = self.buf.bytes_written();

        let mut footer = [0u8; FOOTER_SIZE];
        footer[0..4].copy_from_slice(&((end_pos - start_pos) as u32).to_le_bytes());
        footer[4..].copy_from_slice(self.file_magic());
        self.buf.write_all(&footer)?;
        Ok(())
    }
}

/// Writes the column chunks of one row group, in schema leaf order.
pub struct SerializedRowGroupWriter<'a, W: Write + Send> {
    descr: SchemaDescPtr,
    props: WriterPropertiesPtr,
    buf: &'a mut TrackedWrite<W>,
    ordinal: i16,
    file_encryptor: Option<Arc<FileEncryptor>>,
    total_rows_written: Option<u64>,
    total_bytes_written: u64,
    total_uncompressed_bytes: i64,
    column_index: usize,
    row_group_metadata: Option<RowGroupMetaDataPtr>,
    column_chunks: Vec<ColumnChunkMetaData>,
    on_close: Option<OnCloseRowGroup<'a>>,
    file_offset: i64,
}

impl<'a, W: Write + Send> std::fmt::Debug for SerializedRowGroupWriter<'a, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializedRowGroupWriter")
            .field("ordinal", &self.ordinal)
            .field("column_index", &self.column_index)
            .field("total_rows_written", &self.total_rows_written)
            .field("total_bytes_written", &self.total_bytes_written)
            .field("total_uncompressed_bytes", &self.total_uncompressed_bytes)
            .field("file_offset", &self.file_offset)
            .finish()
    }
}

impl<'a, W: Write + Send> SerializedRowGroupWriter<'a, W> {
    pub(crate) fn new(
        schema_descr: SchemaDescPtr,
        properties: WriterPropertiesPtr,
        buf: &'a mut TrackedWrite<W>,
        ordinal: i16,
        file_encryptor: Option<Arc<FileEncryptor>>,
        on_close: Option<OnCloseRowGroup<'a>>,
    ) -> Self {
        let num_columns = schema_descr.num_columns();
        let file_offset = buf.bytes_written() as i64;
        Self {
            descr: schema_descr,
            props: properties,
            buf,
            ordinal,
            file_encryptor,
            total_rows_written: None,
            total_bytes_written: 0,
            total_uncompressed_bytes: 0,
            column_index: 0,
            row_group_metadata: None,
            column_chunks: Vec::with_capacity(num_columns),
            on_close,
            file_offset,
        }
    }

    /// Opens the writer for the next column, or `None` when all leaves have
    /// been written.
    pub fn next_column(&mut self) -> Result<Option<SerializedColumnWriter<'_>>> {
        self.assert_previous_writer_closed()?;
        if self.column_index >= self.descr.num_columns() {
            return Ok(None);
        }

        let column = self.descr.column(self.column_index);
        let page_encryptor = self.page_encryptor(self.column_index, &column)?;
        let column_crypto = self.column_crypto_metadata(&column);
        let checksums_enabled = self.props.page_checksums_enabled();
        self.column_index += 1;

        let chunk_base = self.buf.bytes_written() as i64;
        let page_writer = Box::new(SerializedPageWriter::new(
            &mut *self.buf,
            checksums_enabled,
            page_encryptor,
        ));

        let total_bytes_written = &mut self.total_bytes_written;
        let total_uncompressed_bytes = &mut self.total_uncompressed_bytes;
        let total_rows_written = &mut self.total_rows_written;
        let column_chunks = &mut self.column_chunks;
        let on_close = move |mut result: ColumnCloseResult| {
            *total_bytes_written += result.bytes_written;
            // the page writer reported chunk-relative offsets
            result.metadata = result.metadata.with_rebased_offsets(chunk_base);
            *total_uncompressed_bytes += result.metadata.uncompressed_size();
            result.metadata.crypto_metadata = column_crypto;
            column_chunks.push(result.metadata);

            match *total_rows_written {
                Some(rows) if rows != result.rows_written => Err(state_err!(
                    "incorrect number of rows, expected {} != {} rows",
                    rows,
                    result.rows_written
                )),
                _ => {
                    *total_rows_written = Some(result.rows_written);
                    Ok(())
                }
            }
        };

        let writer = get_column_writer(column, self.props.clone(), page_writer)?;
        Ok(Some(SerializedColumnWriter::new(
            writer,
            Some(Box::new(on_close)),
        )))
    }

    /// Appends a column chunk that was buffered in memory, rebasing its
    /// offsets onto this file position. Used by the record writer, which
    /// buffers whole row groups before they reach the file.
    pub(crate) fn append_buffered_column(
        &mut self,
        result: ColumnCloseResult,
        chunk_bytes: &[u8],
    ) -> Result<()> {
        self.assert_previous_writer_closed()?;
        if self.column_index >= self.descr.num_columns() {
            return Err(state_err!("all column chunks of this row group are written"));
        }
        let column = self.descr.column(self.column_index);
        let column_crypto = self.column_crypto_metadata(&column);
        self.column_index += 1;

        let base = self.buf.bytes_written() as i64;
        self.buf.write_all(chunk_bytes)?;

        let mut metadata = result.metadata.with_rebased_offsets(base);
        metadata.crypto_metadata = column_crypto;
        self.total_bytes_written += result.bytes_written;
        self.total_uncompressed_bytes += metadata.uncompressed_size();
        self.column_chunks.push(metadata);
        match self.total_rows_written {
            Some(rows) if rows != result.rows_written => Err(state_err!(
                "incorrect number of rows, expected {} != {} rows",
                rows,
                result.rows_written
            )),
            _ => {
                self.total_rows_written = Some(result.rows_written);
                Ok(())
            }
        }
    }

    /// Finalizes this row group, handing the metadata to the file writer.
    pub fn close(mut self) -> Result<RowGroupMetaDataPtr> {
        if self.row_group_metadata.is_none() {
            self.assert_previous_writer_closed()?;

            let column_chunks = std::mem::take(&mut self.column_chunks);
            let row_group_metadata = RowGroupMetaData::builder(self.descr.clone())
                .set_column_metadata(column_chunks)
                .set_total_byte_size(self.total_uncompressed_bytes)
                .set_num_rows(self.total_rows_written.unwrap_or(0) as i64)
                .set_file_offset(self.file_offset)
                .set_sorting_columns(self.props.sorting_columns().cloned())
                .set_ordinal(self.ordinal)
                .build()?;

            let metadata = Arc::new(row_group_metadata);
            self.row_group_metadata = Some(metadata.clone());

            if let Some(on_close) = self.on_close.take() {
                on_close(metadata)?;
            }
        }
        Ok(self.row_group_metadata.clone().unwrap())
    }

    fn page_encryptor(
        &self,
        column_ordinal: usize,
        column: &ColumnDescPtr,
    ) -> Result<Option<PageEncryptor>> {
        match &self.file_encryptor {
            Some(encryptor) => {
                encryptor.page_encryptor(self.ordinal as usize, column_ordinal, column.path())
            }
            None => Ok(None),
        }
    }

    fn column_crypto_metadata(
        &self,
        column: &ColumnDescPtr,
    ) -> Option<format::ColumnCryptoMetaData> {
        self.file_encryptor
            .as_ref()
            .and_then(|encryptor| encryptor.column_crypto_metadata(column.path()))
    }

    #[inline]
    fn assert_previous_writer_closed(&self) -> Result<()> {
        if self.column_index != self.column_chunks.len() {
            Err(state_err!("previous column writer was not closed"))
        } else {
            Ok(())
        }
    }
}

/// A [`ColumnWriter`] wrapper that reports back to its row group writer on
/// close.
pub struct SerializedColumnWriter<'a> {
    inner: ColumnWriter<'a>,
    on_close: Option<OnCloseColumnChunk<'a>>,
}

impl<'a> SerializedColumnWriter<'a> {
    pub fn new(inner: ColumnWriter<'a>, on_close: Option<OnCloseColumnChunk<'a>>) -> Self {
        Self { inner, on_close }
    }

    /// The untyped writer.
    pub fn untyped(&mut self) -> &mut ColumnWriter<'a> {
        &mut self.inner
    }

    /// The writer downcast to `T`; panics on a type mismatch.
    pub fn typed<T: crate::data_type::DataType>(
        &mut self,
    ) -> &mut crate::column::writer::ColumnWriterImpl<'a, T> {
        crate::column::writer::get_typed_column_writer_mut(&mut self.inner)
    }

    /// Closes the column, invoking the row group writer's callback.
    pub fn close(mut self) -> Result<()> {
        let result = self.inner.close()?;
        if let Some(on_close) = self.on_close.take() {
            on_close(result)?;
        }
        Ok(())
    }
}

/// Serializes pages into a sink: thrift header (optionally encrypted), then
/// the page body (optionally encrypted), with an optional CRC32 in the
/// header.
///
/// Reported page offsets are relative to the start of the sink; callers
/// writing chunks at a non-zero file position rebase the chunk metadata.
pub struct SerializedPageWriter<W: Write> {
    sink: TrackedWrite<W>,
    checksums_enabled: bool,
    page_encryptor: Option<PageEncryptor>,
}

impl<W: Write> SerializedPageWriter<W> {
    pub fn new(
        sink: W,
        checksums_enabled: bool,
        page_encryptor: Option<PageEncryptor>,
    ) -> Self {
        Self {
            sink: TrackedWrite::new(sink),
            checksums_enabled,
            page_encryptor,
        }
    }

    /// CRC32 of the page body per the checksum contract: the full
    /// compressed body for v1 pages, the compressed value section only for
    /// v2 (levels are not compressed there).
    fn page_crc(&self, page: &CompressedPage) -> Option<i32> {
        if !self.checksums_enabled {
            return None;
        }
        let data = page.data();
        let payload = match page.compressed_page() {
            Page::DataPageV2 {
                def_levels_byte_len,
                rep_levels_byte_len,
                ..
            } => &data[(def_levels_byte_len + rep_levels_byte_len) as usize..],
            _ => data,
        };
        Some(crc32fast::hash(payload) as i32)
    }

    fn build_page_header(&self, page: &CompressedPage, compressed_size: usize) -> format::PageHeader {
        let mut page_header = format::PageHeader {
            r#type: page.page_type(),
            uncompressed_page_size: page.uncompressed_size() as i32,
            compressed_page_size: compressed_size as i32,
            crc: self.page_crc(page),
            data_page_header: None,
            index_page_header: None,
            dictionary_page_header: None,
            data_page_header_v2: None,
        };

        match page.compressed_page() {
            Page::DataPage {
                num_values,
                encoding,
                def_level_encoding,
                rep_level_encoding,
                statistics,
                ..
            } => {
                page_header.data_page_header = Some(format::DataPageHeader {
                    num_values: *num_values as i32,
                    encoding: *encoding,
                    definition_level_encoding: *def_level_encoding,
                    repetition_level_encoding: *rep_level_encoding,
                    statistics: statistics_to_thrift(statistics.as_ref()),
                });
            }
            Page::DataPageV2 {
                num_values,
                encoding,
                num_nulls,
                num_rows,
                def_levels_byte_len,
                rep_levels_byte_len,
                is_compressed,
                statistics,
                ..
            } => {
                page_header.data_page_header_v2 = Some(format::DataPageHeaderV2 {
                    num_values: *num_values as i32,
                    num_nulls: *num_nulls as i32,
                    num_rows: *num_rows as i32,
                    encoding: *encoding,
                    definition_levels_byte_length: *def_levels_byte_len as i32,
                    repetition_levels_byte_length: *rep_levels_byte_len as i32,
                    is_compressed: Some(*is_compressed),
                    statistics: statistics_to_thrift(statistics.as_ref()),
                });
            }
            Page::DictionaryPage {
                num_values,
                encoding,
                is_sorted,
                ..
            } => {
                page_header.dictionary_page_header = Some(format::DictionaryPageHeader {
                    num_values: *num_values as i32,
                    encoding: *encoding,
                    is_sorted: Some(*is_sorted),
                });
            }
        }
        page_header
    }

    /// Serializes a page header, encrypting it as its own module when page
    /// encryption is active. Returns the bytes written.
    fn serialize_page_header(
        &mut self,
        header: format::PageHeader,
        is_data_page: bool,
    ) -> Result<usize> {
        let start_pos = self.sink.bytes_written();

        match &mut self.page_encryptor {
            Some(encryptor) => {
                let mut plaintext = Vec::new();
                header.write_thrift(&mut CompactProtocolWriter::new(&mut plaintext))?;
                encryptor.encrypt_page_header(&plaintext, is_data_page, &mut self.sink)?;
            }
            None => {
                let mut protocol = CompactProtocolWriter::new(&mut self.sink);
                header.write_thrift(&mut protocol)?;
            }
        }
        Ok(self.sink.bytes_written() - start_pos)
    }
}

impl<W: Write + Send> PageWriter for SerializedPageWriter<W> {
    fn write_page(&mut self, page: CompressedPage) -> Result<PageWriteSpec> {
        let page_type = page.page_type();
        let num_values = page.num_values();
        let is_data_page = page.compressed_page().is_data_page();
        let uncompressed_size = page.uncompressed_size();

        // encrypt the body first: the header must carry the ciphertext size
        let encrypted_body = match &mut self.page_encryptor {
            Some(encryptor) => Some(encryptor.encrypt_page(&page)?),
            None => None,
        };
        let body_len = encrypted_body
            .as_ref()
            .map(|b| b.len())
            .unwrap_or_else(|| page.compressed_size());

        let header = self.build_page_header(&page, body_len);
        let start_pos = self.sink.bytes_written() as u64;
        let header_size = self.serialize_page_header(header, is_data_page)?;
        match &encrypted_body {
            Some(body) => self.sink.write_all(body)?,
            None => self.sink.write_all(page.data())?,
        }

        if let Some(encryptor) = &mut self.page_encryptor {
            if is_data_page {
                encryptor.increment_page();
            }
        }

        let mut spec = PageWriteSpec::default();
        spec.page_type = Some(page_type);
        spec.uncompressed_size = uncompressed_size + header_size;
        spec.compressed_size = body_len + header_size;
        spec.offset = start_pos;
        spec.bytes_written = self.sink.bytes_written() as u64 - start_pos;
        if page_type == PageType::DATA_PAGE || page_type == PageType::DATA_PAGE_V2 {
            spec.num_values = num_values;
        }
        Ok(spec)
    }

    fn close(&mut self) -> Result<()> {
        self.sink.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::{Compression, Encoding, LogicalType, Repetition, Type};
    use crate::data_type::{ByteArrayType, Int32Type, Int64Type};
    use crate::encodings::rle::RleDecoder;
    use crate::encryption::ciphers::{
        compute_plaintext_tag, BlockDecryptor, GcmBlockDecryptor, NONCE_LEN, SIZE_LEN, TAG_LEN,
    };
    use crate::encryption::encrypt::{
        EncryptionKey, FileEncryptionProperties,
    };
    use crate::encryption::modules::{create_footer_aad, create_module_aad, ModuleType};
    use crate::compression::create_codec;
    use crate::file::properties::{WriterProperties, WriterVersion};
    use crate::schema::types::{ColumnPath, Type as SchemaType};
    use crate::thrift::{CompactSliceReader, ReadThrift};

    fn int32_schema() -> TypePtr {
        let field = SchemaType::primitive_type_builder("a", Type::INT32)
            .with_repetition(Repetition::REQUIRED)
            .build()
            .unwrap();
        Arc::new(
            SchemaType::group_type_builder("schema")
                .with_fields(vec![Arc::new(field)])
                .build()
                .unwrap(),
        )
    }

    /// Parses the footer of a finished plaintext file.
    fn parse_footer(buffer: &[u8]) -> format::FileMetaData {
        assert_eq!(&buffer[0..4], PARQUET_MAGIC.as_slice());
        assert_eq!(&buffer[buffer.len() - 4..], PARQUET_MAGIC.as_slice());
        let len_pos = buffer.len() - FOOTER_SIZE;
        let footer_len =
            u32::from_le_bytes(buffer[len_pos..len_pos + 4].try_into().unwrap()) as usize;
        let footer = &buffer[len_pos - footer_len..len_pos];
        format::FileMetaData::read_thrift(&mut CompactSliceReader::new(footer)).unwrap()
    }

    /// Reads the page header at `offset` plus its body, returning the header
    /// and the body slice.
    fn read_page<'a>(buffer: &'a [u8], offset: usize) -> (format::PageHeader, &'a [u8]) {
        let mut prot = CompactSliceReader::new(&buffer[offset..]);
        let header = format::PageHeader::read_thrift(&mut prot).unwrap();
        let header_len = buffer.len() - offset - prot.as_slice().len();
        let body_start = offset + header_len;
        let body = &buffer[body_start..body_start + header.compressed_page_size as usize];
        (header, body)
    }

    #[test]
    fn test_empty_file_layout() {
        let mut buffer = Vec::new();
        let props = Arc::new(WriterProperties::builder().build());
        let mut writer =
            SerializedFileWriter::new(&mut buffer, int32_schema(), props).unwrap();
        writer.start().unwrap();
        writer.end().unwrap();

        let footer = parse_footer(&buffer);
        assert_eq!(footer.version, 1);
        assert_eq!(footer.num_rows, 0);
        assert!(footer.row_groups.is_empty());
        assert_eq!(footer.schema.len(), 2);
        assert_eq!(footer.schema[0].name, "schema");
        assert_eq!(footer.schema[1].name, "a");
        assert_eq!(footer.column_orders.as_ref().unwrap().len(), 1);
        assert!(footer
            .created_by
            .as_ref()
            .unwrap()
            .starts_with("parquetry version"));
    }

    #[test]
    fn test_write_to_real_file() {
        use std::io::{Read, Seek, SeekFrom};
        let mut file = tempfile::tempfile().unwrap();
        let props = Arc::new(WriterProperties::builder().build());
        let mut writer =
            SerializedFileWriter::new(file.try_clone().unwrap(), int32_schema(), props).unwrap();
        writer.start().unwrap();
        let mut row_group = writer.next_row_group().unwrap();
        let mut column = row_group.next_column().unwrap().unwrap();
        column
            .typed::<Int32Type>()
            .write_batch(&[7, 8, 9], None, None)
            .unwrap();
        column.close().unwrap();
        row_group.close().unwrap();
        writer.end().unwrap();

        let mut buffer = Vec::new();
        file.seek(SeekFrom::Start(0)).unwrap();
        file.read_to_end(&mut buffer).unwrap();
        let footer = parse_footer(&buffer);
        assert_eq!(footer.num_rows, 3);
    }

    #[test]
    fn test_state_machine_is_enforced() {
        let props = Arc::new(WriterProperties::builder().build());
        let mut writer =
            SerializedFileWriter::new(Vec::new(), int32_schema(), props.clone()).unwrap();
        // row groups before start are rejected
        let err = writer.next_row_group().unwrap_err().to_string();
        assert_eq!(err, "Illegal state: the writer must be started before row groups");

        writer.start().unwrap();
        let err = writer.start().unwrap_err().to_string();
        assert_eq!(err, "Illegal state: cannot start a writer that is already started");

        // ending with an open row group is rejected
        let mut writer =
            SerializedFileWriter::new(Vec::new(), int32_schema(), props).unwrap();
        writer.start().unwrap();
        let row_group = writer.next_row_group().unwrap();
        drop(row_group);
        let err = writer.end().unwrap_err().to_string();
        assert_eq!(err, "Illegal state: previous row group writer was not closed");
    }

    #[test]
    fn test_end_before_start_fails() {
        let props = Arc::new(WriterProperties::builder().build());
        let writer = SerializedFileWriter::new(Vec::new(), int32_schema(), props).unwrap();
        let err = writer.end().unwrap_err().to_string();
        assert_eq!(err, "Illegal state: the writer was never started");
    }

    #[test]
    fn test_dictionary_column_byte_level_roundtrip() {
        let values: Vec<i32> = (0..1000).collect();
        let mut buffer = Vec::new();
        let props = Arc::new(WriterProperties::builder().build());
        {
            let mut writer =
                SerializedFileWriter::new(&mut buffer, int32_schema(), props).unwrap();
            writer.start().unwrap();
            let mut row_group = writer.next_row_group().unwrap();
            let mut column = row_group.next_column().unwrap().unwrap();
            column
                .typed::<Int32Type>()
                .write_batch(&values, None, None)
                .unwrap();
            column.close().unwrap();
            row_group.close().unwrap();
            writer.end().unwrap();
        }

        let footer = parse_footer(&buffer);
        assert_eq!(footer.num_rows, 1000);
        let row_group = &footer.row_groups[0];
        assert_eq!(row_group.num_rows, 1000);
        let chunk = row_group.columns[0].meta_data.as_ref().unwrap();
        assert_eq!(chunk.num_values, 1000);
        assert_eq!(chunk.codec, Compression::UNCOMPRESSED);
        assert!(chunk.encodings.contains(&Encoding::RLE_DICTIONARY));
        assert!(chunk.encodings.contains(&Encoding::PLAIN));

        // statistics: full range, no nulls, signed order fills both forms
        let stats = chunk.statistics.as_ref().unwrap();
        assert_eq!(stats.min_value.as_deref(), Some(&0i32.to_le_bytes()[..]));
        assert_eq!(stats.max_value.as_deref(), Some(&999i32.to_le_bytes()[..]));
        assert_eq!(stats.min.as_deref(), Some(&0i32.to_le_bytes()[..]));
        assert_eq!(stats.null_count, Some(0));

        // the dictionary page precedes the data pages
        let dict_offset = chunk.dictionary_page_offset.unwrap() as usize;
        assert_eq!(dict_offset, 4);
        let (dict_header, dict_body) = read_page(&buffer, dict_offset);
        assert_eq!(dict_header.r#type, crate::basic::PageType::DICTIONARY_PAGE);
        let dict_header = dict_header.dictionary_page_header.unwrap();
        assert_eq!(dict_header.encoding, Encoding::PLAIN);
        assert_eq!(dict_header.num_values, 1000);
        let dictionary: Vec<i32> = dict_body
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes(b.try_into().unwrap()))
            .collect();
        assert_eq!(dictionary, values);

        // decode the dictionary indices and reconstruct the column
        let (data_header, data_body) = read_page(&buffer, chunk.data_page_offset as usize);
        assert_eq!(data_header.r#type, crate::basic::PageType::DATA_PAGE);
        let v1_header = data_header.data_page_header.unwrap();
        assert_eq!(v1_header.encoding, Encoding::RLE_DICTIONARY);
        assert_eq!(v1_header.num_values, 1000);
        let bit_width = data_body[0];
        let indices = RleDecoder::new(bit_width, &data_body[1..])
            .decode(1000)
            .unwrap();
        let decoded: Vec<i32> = indices.iter().map(|&i| dictionary[i as usize]).collect();
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_page_crc_matches_payload() {
        let mut buffer = Vec::new();
        let props = Arc::new(WriterProperties::builder().build());
        {
            let mut writer =
                SerializedFileWriter::new(&mut buffer, int32_schema(), props).unwrap();
            writer.start().unwrap();
            let mut row_group = writer.next_row_group().unwrap();
            let mut column = row_group.next_column().unwrap().unwrap();
            column
                .typed::<Int32Type>()
                .write_batch(&[5, 6, 7, 8], None, None)
                .unwrap();
            column.close().unwrap();
            row_group.close().unwrap();
            writer.end().unwrap();
        }

        let footer = parse_footer(&buffer);
        let chunk = footer.row_groups[0].columns[0].meta_data.as_ref().unwrap();
        let (header, body) = read_page(&buffer, chunk.dictionary_page_offset.unwrap() as usize);
        let crc = header.crc.unwrap();
        assert_eq!(crc, crc32fast::hash(body) as i32);
        // single-bit corruption is detectable
        let mut corrupted = body.to_vec();
        corrupted[0] ^= 0x40;
        assert_ne!(crc, crc32fast::hash(&corrupted) as i32);

        let (header, body) = read_page(&buffer, chunk.data_page_offset as usize);
        assert_eq!(header.crc.unwrap(), crc32fast::hash(body) as i32);
    }

    #[test]
    fn test_crc_disabled_omits_field() {
        let mut buffer = Vec::new();
        let props = Arc::new(
            WriterProperties::builder()
                .set_page_checksums_enabled(false)
                .set_dictionary_enabled(false)
                .build(),
        );
        {
            let mut writer =
                SerializedFileWriter::new(&mut buffer, int32_schema(), props).unwrap();
            writer.start().unwrap();
            let mut row_group = writer.next_row_group().unwrap();
            let mut column = row_group.next_column().unwrap().unwrap();
            column
                .typed::<Int32Type>()
                .write_batch(&[1, 2, 3], None, None)
                .unwrap();
            column.close().unwrap();
            row_group.close().unwrap();
            writer.end().unwrap();
        }
        let footer = parse_footer(&buffer);
        let chunk = footer.row_groups[0].columns[0].meta_data.as_ref().unwrap();
        let (header, body) = read_page(&buffer, chunk.data_page_offset as usize);
        assert_eq!(header.crc, None);
        // PLAIN encoding, no levels: the body is the raw values
        assert_eq!(body, [1u8, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0]);
    }

    #[test]
    fn test_dictionary_fallback_page_sequence() {
        let schema = {
            let field = SchemaType::primitive_type_builder("s", Type::BYTE_ARRAY)
                .with_repetition(Repetition::REQUIRED)
                .with_logical_type(LogicalType::String)
                .build()
                .unwrap();
            Arc::new(
                SchemaType::group_type_builder("schema")
                    .with_fields(vec![Arc::new(field)])
                    .build()
                    .unwrap(),
            )
        };
        // unique values overflow the tiny dictionary cap quickly
        let values: Vec<crate::data_type::ByteArray> = (0..100)
            .map(|i| crate::data_type::ByteArray::from(format!("unique-value-{i:04}").as_str()))
            .collect();

        let mut buffer = Vec::new();
        let props = Arc::new(
            WriterProperties::builder()
                .set_dictionary_page_size_limit(256)
                .set_write_batch_size(10)
                .build(),
        );
        {
            let mut writer =
                SerializedFileWriter::new(&mut buffer, schema, props).unwrap();
            writer.start().unwrap();
            let mut row_group = writer.next_row_group().unwrap();
            let mut column = row_group.next_column().unwrap().unwrap();
            column
                .typed::<ByteArrayType>()
                .write_batch(&values, None, None)
                .unwrap();
            column.close().unwrap();
            row_group.close().unwrap();
            writer.end().unwrap();
        }

        let footer = parse_footer(&buffer);
        let chunk = footer.row_groups[0].columns[0].meta_data.as_ref().unwrap();
        assert!(chunk.encodings.contains(&Encoding::RLE_DICTIONARY));
        assert!(chunk.encodings.contains(&Encoding::PLAIN));

        // walk all pages of the chunk: dictionary page first, then
        // dictionary-encoded pages, then fallback pages; never interleaved
        let mut offset = chunk.dictionary_page_offset.unwrap() as usize;
        let end = chunk.dictionary_page_offset.unwrap() as usize
            + chunk.total_compressed_size as usize;
        let mut encodings = Vec::new();
        let mut total_values = 0;
        while offset < end {
            let (header, body) = read_page(&buffer, offset);
            offset = body.as_ptr() as usize - buffer.as_ptr() as usize + body.len();
            if let Some(h) = &header.data_page_header {
                encodings.push(h.encoding);
                total_values += h.num_values;
            }
        }
        assert_eq!(total_values, 100);
        let first_plain = encodings
            .iter()
            .position(|&e| e == Encoding::PLAIN)
            .expect("fallback pages must exist");
        assert!(encodings[..first_plain]
            .iter()
            .all(|&e| e == Encoding::RLE_DICTIONARY));
        assert!(encodings[first_plain..].iter().all(|&e| e == Encoding::PLAIN));
    }

    #[test]
    fn test_v2_snappy_pages_with_crc() {
        let values: Vec<i64> = (0..10_000).collect();
        let schema = {
            let field = SchemaType::primitive_type_builder("v", Type::INT64)
                .with_repetition(Repetition::REQUIRED)
                .build()
                .unwrap();
            Arc::new(
                SchemaType::group_type_builder("schema")
                    .with_fields(vec![Arc::new(field)])
                    .build()
                    .unwrap(),
            )
        };
        let props = Arc::new(
            WriterProperties::builder()
                .set_writer_version(WriterVersion::PARQUET_2_0)
                .set_compression(Compression::SNAPPY)
                .set_data_page_size_limit(8 * 1024)
                .build(),
        );
        let mut buffer = Vec::new();
        {
            let mut writer =
                SerializedFileWriter::new(&mut buffer, schema, props).unwrap();
            writer.start().unwrap();
            let mut row_group = writer.next_row_group().unwrap();
            let mut column = row_group.next_column().unwrap().unwrap();
            column
                .typed::<Int64Type>()
                .write_batch(&values, None, None)
                .unwrap();
            column.close().unwrap();
            row_group.close().unwrap();
            writer.end().unwrap();
        }

        let footer = parse_footer(&buffer);
        assert_eq!(footer.version, 2);
        let chunk = footer.row_groups[0].columns[0].meta_data.as_ref().unwrap();
        assert_eq!(chunk.codec, Compression::SNAPPY);
        assert!(chunk.encodings.contains(&Encoding::RLE_DICTIONARY));

        let mut codec = create_codec(Compression::SNAPPY).unwrap().unwrap();

        // the dictionary page holds all distinct values, snappy compressed
        let (dict_header, dict_body) =
            read_page(&buffer, chunk.dictionary_page_offset.unwrap() as usize);
        let mut dict_plain = Vec::new();
        codec
            .decompress(
                dict_body,
                &mut dict_plain,
                Some(dict_header.uncompressed_page_size as usize),
            )
            .unwrap();
        let dictionary: Vec<i64> = dict_plain
            .chunks_exact(8)
            .map(|b| i64::from_le_bytes(b.try_into().unwrap()))
            .collect();
        assert_eq!(dictionary.len(), values.len());

        // walk the v2 data pages: CRC over the compressed value section,
        // values reconstructed through the dictionary
        let mut offset = chunk.data_page_offset as usize;
        let mut decoded = Vec::with_capacity(values.len());
        let mut num_pages = 0;
        while decoded.len() < values.len() {
            let (header, body) = read_page(&buffer, offset);
            offset = body.as_ptr() as usize - buffer.as_ptr() as usize + body.len();
            num_pages += 1;

            let v2 = header.data_page_header_v2.as_ref().unwrap();
            assert_eq!(v2.encoding, Encoding::RLE_DICTIONARY);
            assert_eq!(v2.definition_levels_byte_length, 0);
            assert_eq!(v2.repetition_levels_byte_length, 0);
            assert_eq!(v2.num_nulls, 0);
            assert_eq!(v2.is_compressed, Some(true));
            // no level section, so the checksum covers the whole body
            assert_eq!(header.crc.unwrap(), crc32fast::hash(body) as i32);

            let mut plain = Vec::new();
            codec
                .decompress(
                    body,
                    &mut plain,
                    Some(header.uncompressed_page_size as usize),
                )
                .unwrap();
            let bit_width = plain[0];
            let indices = RleDecoder::new(bit_width, &plain[1..])
                .decode(v2.num_values as usize)
                .unwrap();
            decoded.extend(indices.iter().map(|&i| dictionary[i as usize]));
        }
        assert!(num_pages > 1, "expected the 8 KiB limit to cut pages");
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_row_group_alignment_padding() {
        let mut buffer = Vec::new();
        let props = Arc::new(
            WriterProperties::builder()
                .set_row_group_alignment(Some(1024))
                .set_dictionary_enabled(false)
                .build(),
        );
        {
            let mut writer =
                SerializedFileWriter::new(&mut buffer, int32_schema(), props).unwrap();
            writer.start().unwrap();
            for _ in 0..2 {
                let mut row_group = writer.next_row_group().unwrap();
                let mut column = row_group.next_column().unwrap().unwrap();
                column
                    .typed::<Int32Type>()
                    .write_batch(&[1, 2, 3], None, None)
                    .unwrap();
                column.close().unwrap();
                row_group.close().unwrap();
            }
            writer.end().unwrap();
        }
        let footer = parse_footer(&buffer);
        // the second row group starts on the alignment boundary
        let second = &footer.row_groups[1];
        assert_eq!(second.file_offset.unwrap() % 1024, 0);
        let meta = footer.row_groups[0].columns[0].meta_data.as_ref().unwrap();
        let first_end = (meta.data_page_offset + meta.total_compressed_size) as usize;
        // the pad bytes are zero
        assert!(first_end < 1024);
        assert!(buffer[first_end..1024].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_uniform_encryption_gcm() {
        let key = vec![17u8; 16];
        let mut buffer = Vec::new();
        let encryption = FileEncryptionProperties::builder(key.clone())
            .build()
            .unwrap();
        let props = Arc::new(
            WriterProperties::builder()
                .set_dictionary_enabled(false)
                .set_file_encryption_properties(Some(encryption))
                .build(),
        );
        let schema = {
            let field = SchemaType::primitive_type_builder("v", Type::INT64)
                .with_repetition(Repetition::REQUIRED)
                .build()
                .unwrap();
            Arc::new(
                SchemaType::group_type_builder("schema")
                    .with_fields(vec![Arc::new(field)])
                    .build()
                    .unwrap(),
            )
        };
        let values: Vec<i64> = (0..50).collect();
        {
            let mut writer =
                SerializedFileWriter::new(&mut buffer, schema, props).unwrap();
            writer.start().unwrap();
            let mut row_group = writer.next_row_group().unwrap();
            let mut column = row_group.next_column().unwrap().unwrap();
            column
                .typed::<Int64Type>()
                .write_batch(&values, None, None)
                .unwrap();
            column.close().unwrap();
            row_group.close().unwrap();
            writer.end().unwrap();
        }

        // encrypted footer files are marked PARE at both ends
        assert_eq!(&buffer[0..4], PARQUET_MAGIC_ENCRYPTED_FOOTER.as_slice());
        assert_eq!(
            &buffer[buffer.len() - 4..],
            PARQUET_MAGIC_ENCRYPTED_FOOTER.as_slice()
        );

        // the footer region: FileCryptoMetaData, then the encrypted footer
        let len_pos = buffer.len() - FOOTER_SIZE;
        let footer_len =
            u32::from_le_bytes(buffer[len_pos..len_pos + 4].try_into().unwrap()) as usize;
        let footer_region = &buffer[len_pos - footer_len..len_pos];
        let mut prot = CompactSliceReader::new(footer_region);
        let crypto_metadata = format::FileCryptoMetaData::read_thrift(&mut prot).unwrap();
        let format::EncryptionAlgorithm::AES_GCM_V1(algo) = crypto_metadata.encryption_algorithm
        else {
            panic!("expected AES_GCM_V1");
        };
        let file_aad = algo.aad_file_unique.unwrap();

        let remainder = prot.as_slice();
        let ciphertext_len =
            u32::from_le_bytes(remainder[..SIZE_LEN].try_into().unwrap()) as usize;
        let ciphertext = &remainder[SIZE_LEN..SIZE_LEN + ciphertext_len];

        let decryptor = GcmBlockDecryptor::new(&key).unwrap();
        let footer_aad = create_footer_aad(&file_aad).unwrap();
        let footer_bytes = decryptor.decrypt(ciphertext, &footer_aad).unwrap();
        let footer =
            format::FileMetaData::read_thrift(&mut CompactSliceReader::new(&footer_bytes))
                .unwrap();
        assert_eq!(footer.num_rows, 50);
        let chunk = footer.row_groups[0].columns[0].meta_data.as_ref().unwrap();
        assert_eq!(
            footer.row_groups[0].columns[0].crypto_metadata,
            Some(format::ColumnCryptoMetaData::ENCRYPTION_WITH_FOOTER_KEY)
        );

        // page header and body are separate encrypted modules
        let page_offset = chunk.data_page_offset as usize;
        let header_len =
            u32::from_le_bytes(buffer[page_offset..page_offset + SIZE_LEN].try_into().unwrap())
                as usize;
        let header_ct = &buffer[page_offset + SIZE_LEN..page_offset + SIZE_LEN + header_len];
        let header_aad = create_module_aad(
            &file_aad,
            ModuleType::DataPageHeader,
            0,
            0,
            Some(0),
        )
        .unwrap();
        let header_bytes = decryptor.decrypt(header_ct, &header_aad).unwrap();
        let header =
            format::PageHeader::read_thrift(&mut CompactSliceReader::new(&header_bytes))
                .unwrap();
        assert_eq!(header.data_page_header.unwrap().num_values, 50);

        let body_offset = page_offset + SIZE_LEN + header_len;
        let body_len = u32::from_le_bytes(
            buffer[body_offset..body_offset + SIZE_LEN].try_into().unwrap(),
        ) as usize;
        assert_eq!(body_len + SIZE_LEN, header.compressed_page_size as usize);
        let body_ct = &buffer[body_offset + SIZE_LEN..body_offset + SIZE_LEN + body_len];
        let body_aad =
            create_module_aad(&file_aad, ModuleType::DataPage, 0, 0, Some(0)).unwrap();
        let body = decryptor.decrypt(body_ct, &body_aad).unwrap();
        let decoded: Vec<i64> = body
            .chunks_exact(8)
            .map(|b| i64::from_le_bytes(b.try_into().unwrap()))
            .collect();
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_plaintext_footer_with_encrypted_columns() {
        let double_key = vec![1u8; 16];
        let float_key = vec![2u8; 16];
        let footer_key = vec![3u8; 16];
        let schema = {
            let id = SchemaType::primitive_type_builder("id", Type::INT64)
                .with_repetition(Repetition::REQUIRED)
                .build()
                .unwrap();
            let double_field = SchemaType::primitive_type_builder("double_field", Type::DOUBLE)
                .with_repetition(Repetition::REQUIRED)
                .build()
                .unwrap();
            let float_field = SchemaType::primitive_type_builder("float_field", Type::FLOAT)
                .with_repetition(Repetition::REQUIRED)
                .build()
                .unwrap();
            Arc::new(
                SchemaType::group_type_builder("schema")
                    .with_fields(vec![
                        Arc::new(id),
                        Arc::new(double_field),
                        Arc::new(float_field),
                    ])
                    .build()
                    .unwrap(),
            )
        };
        let encryption = FileEncryptionProperties::builder(footer_key.clone())
            .with_plaintext_footer(true)
            .with_column_key(
                ColumnPath::from("double_field"),
                EncryptionKey::new(double_key.clone()),
            )
            .with_column_key(
                ColumnPath::from("float_field"),
                EncryptionKey::new(float_key),
            )
            .build()
            .unwrap();
        let props = Arc::new(
            WriterProperties::builder()
                .set_dictionary_enabled(false)
                .set_file_encryption_properties(Some(encryption))
                .build(),
        );

        let mut buffer = Vec::new();
        {
            let mut writer =
                SerializedFileWriter::new(&mut buffer, schema, props).unwrap();
            writer.start().unwrap();
            let mut row_group = writer.next_row_group().unwrap();
            let mut column = row_group.next_column().unwrap().unwrap();
            column
                .typed::<Int64Type>()
                .write_batch(&[10, 20], None, None)
                .unwrap();
            column.close().unwrap();
            let mut column = row_group.next_column().unwrap().unwrap();
            column
                .typed::<crate::data_type::DoubleType>()
                .write_batch(&[1.5, 2.5], None, None)
                .unwrap();
            column.close().unwrap();
            let mut column = row_group.next_column().unwrap().unwrap();
            column
                .typed::<crate::data_type::FloatType>()
                .write_batch(&[0.5, 0.25], None, None)
                .unwrap();
            column.close().unwrap();
            row_group.close().unwrap();
            writer.end().unwrap();
        }

        // legacy-compatible: plain magic and a readable footer
        let footer = parse_footer(&buffer);
        let algo = footer.encryption_algorithm.as_ref().expect("algorithm");
        let format::EncryptionAlgorithm::AES_GCM_V1(algo) = algo else {
            panic!("expected AES_GCM_V1");
        };
        let file_aad = algo.aad_file_unique.clone().unwrap();

        // the unencrypted column is fully readable without any key
        let id_chunk = footer.row_groups[0].columns[0].meta_data.as_ref().unwrap();
        assert!(footer.row_groups[0].columns[0].crypto_metadata.is_none());
        let (header, body) = read_page(&buffer, id_chunk.data_page_offset as usize);
        assert_eq!(header.data_page_header.unwrap().num_values, 2);
        let decoded: Vec<i64> = body
            .chunks_exact(8)
            .map(|b| i64::from_le_bytes(b.try_into().unwrap()))
            .collect();
        assert_eq!(decoded, vec![10, 20]);

        // encrypted columns advertise their key and hide their metadata
        let double_chunk = &footer.row_groups[0].columns[1];
        assert!(double_chunk.meta_data.is_none());
        let Some(format::ColumnCryptoMetaData::ENCRYPTION_WITH_COLUMN_KEY(crypto)) =
            &double_chunk.crypto_metadata
        else {
            panic!("expected a column key");
        };
        assert_eq!(crypto.path_in_schema, vec!["double_field".to_owned()]);

        // the column metadata decrypts with the column key
        let encrypted_meta = double_chunk.encrypted_column_metadata.as_ref().unwrap();
        let decryptor = GcmBlockDecryptor::new(&double_key).unwrap();
        let aad =
            create_module_aad(&file_aad, ModuleType::ColumnMetaData, 0, 1, None).unwrap();
        let meta_bytes = decryptor
            .decrypt(&encrypted_meta[SIZE_LEN..], &aad)
            .unwrap();
        let meta =
            format::ColumnMetaData::read_thrift(&mut CompactSliceReader::new(&meta_bytes))
                .unwrap();
        assert_eq!(meta.num_values, 2);
        assert_eq!(meta.path_in_schema, vec!["double_field".to_owned()]);

        // its data pages decrypt with the right key only
        let page_offset = meta.data_page_offset as usize;
        let header_len = u32::from_le_bytes(
            buffer[page_offset..page_offset + SIZE_LEN].try_into().unwrap(),
        ) as usize;
        let header_ct = &buffer[page_offset + SIZE_LEN..page_offset + SIZE_LEN + header_len];
        let header_aad =
            create_module_aad(&file_aad, ModuleType::DataPageHeader, 0, 1, Some(0)).unwrap();
        assert!(GcmBlockDecryptor::new(&footer_key)
            .unwrap()
            .decrypt(header_ct, &header_aad)
            .is_err());
        let header_bytes = decryptor.decrypt(header_ct, &header_aad).unwrap();
        let header =
            format::PageHeader::read_thrift(&mut CompactSliceReader::new(&header_bytes))
                .unwrap();
        let body_offset = page_offset + SIZE_LEN + header_len;
        let body_len = u32::from_le_bytes(
            buffer[body_offset..body_offset + SIZE_LEN].try_into().unwrap(),
        ) as usize;
        assert_eq!(body_len + SIZE_LEN, header.compressed_page_size as usize);
        let body_ct = &buffer[body_offset + SIZE_LEN..body_offset + SIZE_LEN + body_len];
        let body_aad =
            create_module_aad(&file_aad, ModuleType::DataPage, 0, 1, Some(0)).unwrap();
        let body = decryptor.decrypt(body_ct, &body_aad).unwrap();
        let decoded: Vec<f64> = body
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes(b.try_into().unwrap()))
            .collect();
        assert_eq!(decoded, vec![1.5, 2.5]);

        // the footer signature (nonce + tag after the footer body) verifies
        // against the footer bytes
        let len_pos = buffer.len() - FOOTER_SIZE;
        let footer_len =
            u32::from_le_bytes(buffer[len_pos..len_pos + 4].try_into().unwrap()) as usize;
        let footer_region = &buffer[len_pos - footer_len..len_pos];
        let signature_start = footer_region.len() - NONCE_LEN - TAG_LEN;
        let footer_bytes = &footer_region[..signature_start];
        let nonce: [u8; NONCE_LEN] = footer_region
            [signature_start..signature_start + NONCE_LEN]
            .try_into()
            .unwrap();
        let stored_tag = &footer_region[signature_start + NONCE_LEN..];
        let footer_aad = create_footer_aad(&file_aad).unwrap();
        let tag =
            compute_plaintext_tag(&footer_key, nonce, &footer_aad, footer_bytes).unwrap();
        assert_eq!(stored_tag, tag);
    }
}
