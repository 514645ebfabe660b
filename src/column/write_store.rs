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

//! The per-row-group pool of column writers fed by the shredder.
//!
//! Each leaf column writes through a [`SerializedPageWriter`] into an
//! in-memory buffer, so the columns of one row group can be built
//! interleaved and streamed out in leaf order when the row group flushes.
//! The store also aggregates the memory accounting the row-group flusher
//! polls.

use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::column::writer::{get_column_writer, ColumnCloseResult, ColumnWriter};
use crate::encryption::encrypt::FileEncryptor;
use crate::errors::Result;
use crate::file::properties::{WriterPropertiesPtr, WriterVersion};
use crate::file::writer::SerializedPageWriter;
use crate::schema::types::SchemaDescPtr;

/// A clonable [`Write`] over a shared in-memory buffer. The store hands one
/// end to a page writer and keeps the other to reclaim the bytes at flush.
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.buffer.lock().unwrap())
    }

    fn len(&self) -> usize {
        self.buffer.lock().unwrap().len()
    }

    fn capacity(&self) -> usize {
        self.buffer.lock().unwrap().capacity()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// One column chunk staged in memory, ready to be appended to the file.
pub(crate) struct BufferedColumnChunk {
    pub close_result: ColumnCloseResult,
    pub bytes: Vec<u8>,
}

/// Owns one column writer per schema leaf for the row group being built.
pub struct ColumnWriteStore {
    writers: Vec<ColumnWriter<'static>>,
    buffers: Vec<SharedBuffer>,
    props: WriterPropertiesPtr,
    rows: u64,
    rows_for_next_page_check: u64,
}

impl ColumnWriteStore {
    /// Creates writers for every leaf of `schema`, staging pages in memory.
    /// `row_group_ordinal` seeds the per-module AADs when encryption is on.
    pub(crate) fn new(
        schema: &SchemaDescPtr,
        props: &WriterPropertiesPtr,
        file_encryptor: Option<&Arc<FileEncryptor>>,
        row_group_ordinal: usize,
    ) -> Result<Self> {
        let mut writers = Vec::with_capacity(schema.num_columns());
        let mut buffers = Vec::with_capacity(schema.num_columns());
        for (column_ordinal, column) in schema.columns().iter().enumerate() {
            let buffer = SharedBuffer::default();
            let page_encryptor = match file_encryptor {
                Some(encryptor) => {
                    encryptor.page_encryptor(row_group_ordinal, column_ordinal, column.path())?
                }
                None => None,
            };
            let page_writer = Box::new(SerializedPageWriter::new(
                buffer.clone(),
                props.page_checksums_enabled(),
                page_encryptor,
            ));
            writers.push(get_column_writer(
                column.clone(),
                props.clone(),
                page_writer,
            )?);
            buffers.push(buffer);
        }
        Ok(Self {
            writers,
            buffers,
            props: props.clone(),
            rows: 0,
            rows_for_next_page_check: props.min_record_count_for_check() as u64,
        })
    }

    /// Number of column writers (schema leaves).
    pub fn num_columns(&self) -> usize {
        self.writers.len()
    }

    /// The writer of the `i`-th leaf.
    pub fn column_writer(&mut self, i: usize) -> &mut ColumnWriter<'static> {
        &mut self.writers[i]
    }

    /// Marks a record boundary. The v2 writers use these as their page
    /// split points.
    pub fn end_record(&mut self) -> Result<()> {
        self.rows += 1;
        if self.props.writer_version() == WriterVersion::PARQUET_2_0
            && self.rows >= self.rows_for_next_page_check
        {
            for writer in &mut self.writers {
                writer.cut_page_at_record_boundary()?;
            }
            self.rows_for_next_page_check =
                self.rows + self.props.min_record_count_for_check() as u64;
        }
        Ok(())
    }

    /// Live buffered bytes across all writers and staged pages.
    pub fn buffered_size(&self) -> u64 {
        let writers: usize = self.writers.iter().map(|w| w.estimated_buffered_size()).sum();
        let staged: usize = self.buffers.iter().map(|b| b.len()).sum();
        (writers + staged) as u64
    }

    /// Estimated allocated capacity across all writers and staged pages.
    pub fn allocated_size(&self) -> u64 {
        let writers: usize = self
            .writers
            .iter()
            .map(|w| w.estimated_allocated_size())
            .sum();
        let staged: usize = self.buffers.iter().map(|b| b.capacity()).sum();
        (writers + staged) as u64
    }

    /// Closes every writer in leaf order, returning the staged chunks.
    pub(crate) fn flush(self) -> Result<Vec<BufferedColumnChunk>> {
        let mut chunks = Vec::with_capacity(self.writers.len());
        for (writer, buffer) in self.writers.into_iter().zip(self.buffers) {
            let close_result = writer.close()?;
            chunks.push(BufferedColumnChunk {
                close_result,
                bytes: buffer.take(),
            });
        }
        Ok(chunks)
    }
}
