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

//! The record-level writer: shredding, buffering and memory-driven row
//! group flushing in one surface.
//!
//! Records arrive as [`RecordConsumer`] events and are shredded into
//! per-column buffers. Probing the buffered memory on every record would be
//! expensive, so the writer checks at an adaptive cadence and flushes a row
//! group when the buffered bytes come within about two records of the
//! configured threshold. Slightly undershooting the target is much better
//! than overshooting it.

use std::io::Write;

use log::{debug, warn};

use crate::column::write_store::ColumnWriteStore;
use crate::data_type::{ByteArray, Int96};
use crate::errors::Result;
use crate::file::properties::WriterPropertiesPtr;
use crate::file::writer::SerializedFileWriter;
use crate::record::{MessageShredder, RecordConsumer, RecordEvent};
use crate::schema::types::TypePtr;

/// Writes a stream of records to a Parquet file.
///
/// Closing the writer flushes the final row group and the footer; dropping
/// it without [`close`](Self::close) abandons the file.
pub struct RecordFileWriter<W: Write + Send> {
    writer: SerializedFileWriter<W>,
    shredder: Option<MessageShredder<ColumnWriteStore>>,
    props: WriterPropertiesPtr,
    record_count: u64,
    records_for_next_check: u64,
}

impl<W: Write + Send> RecordFileWriter<W> {
    /// Creates the file, writing the opening magic immediately.
    pub fn new(sink: W, schema: TypePtr, props: WriterPropertiesPtr) -> Result<Self> {
        let mut writer = SerializedFileWriter::new(sink, schema, props.clone())?;
        writer.start()?;
        let mut this = Self {
            writer,
            shredder: None,
            record_count: 0,
            records_for_next_check: props.min_record_count_for_check() as u64,
            props,
        };
        this.init_store()?;
        debug!(
            "created record writer: block size check in [{}, {}] records, estimation {}, row group threshold {} bytes",
            this.props.min_record_count_for_check(),
            this.props.max_record_count_for_check(),
            this.props.estimate_next_size_check(),
            this.props.row_group_size_threshold(),
        );
        Ok(this)
    }

    fn init_store(&mut self) -> Result<()> {
        let ordinal = self.writer.flushed_row_groups().len();
        let store = ColumnWriteStore::new(
            self.writer.schema_descr(),
            &self.props,
            self.writer.file_encryptor(),
            ordinal,
        )?;
        self.shredder = Some(MessageShredder::new(self.writer.schema_descr(), store));
        Ok(())
    }

    fn shredder_mut(&mut self) -> &mut MessageShredder<ColumnWriteStore> {
        self.shredder.as_mut().expect("write store is initialized")
    }

    /// Feeds one prebuilt [`RecordEvent`].
    pub fn write_event(&mut self, event: RecordEvent) -> Result<()> {
        crate::record::dispatch(self, event)
    }

    /// Feeds a full record's worth of events.
    pub fn write_record<I: IntoIterator<Item = RecordEvent>>(&mut self, events: I) -> Result<()> {
        for event in events {
            self.write_event(event)?;
        }
        Ok(())
    }

    /// Bytes in flight: everything written to the file plus everything
    /// still buffered. The input to external back-pressure.
    pub fn data_size(&self) -> u64 {
        self.writer.bytes_written() as u64
            + self
                .shredder
                .as_ref()
                .map(|s| s.sink().buffered_size())
                .unwrap_or(0)
    }

    /// Estimated allocated buffer capacity of the in-flight row group.
    pub fn allocated_size(&self) -> u64 {
        self.shredder
            .as_ref()
            .map(|s| s.sink().allocated_size())
            .unwrap_or(0)
    }

    /// Flushes the buffered records as a row group, leaving the writer
    /// ready for more records.
    pub fn flush_row_group(&mut self) -> Result<()> {
        let shredder = self
            .shredder
            .take()
            .ok_or_else(|| state_err!("the record writer is closed"))?;
        if shredder.in_message() {
            return Err(state_err!("cannot flush in the middle of a record"));
        }
        let store = shredder.into_sink();

        let allocated = store.allocated_size();
        if allocated as usize > 3 * self.props.row_group_size_threshold() {
            warn!("row group buffers use too much memory: {allocated} bytes allocated");
        }

        if self.record_count > 0 {
            debug!(
                "flushing {} records ({} buffered bytes) to the file",
                self.record_count,
                store.buffered_size()
            );
            let chunks = store.flush()?;
            let mut row_group = self.writer.next_row_group()?;
            for chunk in chunks {
                row_group.append_buffered_column(chunk.close_result, &chunk.bytes)?;
            }
            row_group.close()?;
            self.record_count = 0;
        }
        self.init_store()
    }

    /// Finishes the file: flushes the last row group and writes the footer.
    pub fn close(mut self) -> Result<()> {
        if let Some(shredder) = &self.shredder {
            if shredder.in_message() {
                return Err(state_err!("cannot close in the middle of a record"));
            }
        }
        self.flush_row_group()?;
        self.shredder = None;
        self.writer.end()
    }

    /// Decides whether the buffered row group is close enough to the
    /// threshold to flush, and when the next probe happens.
    fn check_block_size(&mut self) -> Result<()> {
        if self.record_count < self.records_for_next_check {
            return Ok(());
        }
        let threshold = self.props.row_group_size_threshold() as u64;
        let min_check = self.props.min_record_count_for_check() as u64;
        let max_check = self.props.max_record_count_for_check() as u64;
        let estimate = self.props.estimate_next_size_check();

        let buffered = self
            .shredder
            .as_ref()
            .map(|s| s.sink().buffered_size())
            .unwrap_or(0);
        let record_size = buffered / self.record_count.max(1);

        // flush when within ~2 records of the threshold: better slightly
        // under size than over
        if buffered + 2 * record_size > threshold {
            debug!(
                "buffered size {buffered} crossed threshold {threshold}: flushing {} records",
                self.record_count
            );
            let flushed_records = self.record_count;
            self.flush_row_group()?;
            self.records_for_next_check = if estimate {
                (flushed_records / 2).clamp(min_check, max_check)
            } else {
                min_check
            };
        } else if estimate {
            // check again about halfway to the projected crossing, never
            // more than max_check records away
            let projected = threshold / record_size.max(1);
            self.records_for_next_check =
                ((self.record_count + projected) / 2).clamp(min_check, self.record_count + max_check);
        } else {
            self.records_for_next_check = self.record_count + min_check;
        }
        debug!(
            "checked buffered size at {} records, next check at {}",
            self.record_count, self.records_for_next_check
        );
        Ok(())
    }
}

impl<W: Write + Send> RecordConsumer for RecordFileWriter<W> {
    fn start_message(&mut self) -> Result<()> {
        self.shredder_mut().start_message()
    }

    fn start_field(&mut self, name: &str, index: usize) -> Result<()> {
        self.shredder_mut().start_field(name, index)
    }

    fn end_field(&mut self) -> Result<()> {
        self.shredder_mut().end_field()
    }

    fn start_group(&mut self) -> Result<()> {
        self.shredder_mut().start_group()
    }

    fn end_group(&mut self) -> Result<()> {
        self.shredder_mut().end_group()
    }

    fn add_boolean(&mut self, value: bool) -> Result<()> {
        self.shredder_mut().add_boolean(value)
    }

    fn add_int32(&mut self, value: i32) -> Result<()> {
        self.shredder_mut().add_int32(value)
    }

    fn add_int64(&mut self, value: i64) -> Result<()> {
        self.shredder_mut().add_int64(value)
    }

    fn add_int96(&mut self, value: Int96) -> Result<()> {
        self.shredder_mut().add_int96(value)
    }

    fn add_float(&mut self, value: f32) -> Result<()> {
        self.shredder_mut().add_float(value)
    }

    fn add_double(&mut self, value: f64) -> Result<()> {
        self.shredder_mut().add_double(value)
    }

    fn add_bytes(&mut self, value: ByteArray) -> Result<()> {
        self.shredder_mut().add_bytes(value)
    }

    fn end_message(&mut self) -> Result<()> {
        self.shredder_mut().end_message()?;
        self.record_count += 1;
        self.check_block_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::{Repetition, Type};
    use crate::encodings::rle::RleDecoder;
    use crate::file::{FOOTER_SIZE, PARQUET_MAGIC};
    use crate::format;
    use crate::schema::types::Type as SchemaType;
    use crate::thrift::{CompactSliceReader, ReadThrift};
    use crate::util::bit_util::num_required_bits;
    use std::sync::Arc;

    use crate::file::properties::WriterProperties;
    use crate::record::RecordEvent::*;

    fn parse_footer(buffer: &[u8]) -> format::FileMetaData {
        assert_eq!(&buffer[0..4], PARQUET_MAGIC.as_slice());
        assert_eq!(&buffer[buffer.len() - 4..], PARQUET_MAGIC.as_slice());
        let len_pos = buffer.len() - FOOTER_SIZE;
        let footer_len =
            u32::from_le_bytes(buffer[len_pos..len_pos + 4].try_into().unwrap()) as usize;
        let footer = &buffer[len_pos - footer_len..len_pos];
        format::FileMetaData::read_thrift(&mut CompactSliceReader::new(footer)).unwrap()
    }

    /// Decodes every v1 PLAIN data page of a chunk into (rep, def, value
    /// bytes) streams.
    fn decode_chunk(
        buffer: &[u8],
        meta: &format::ColumnMetaData,
        max_rep: i16,
        max_def: i16,
    ) -> (Vec<u64>, Vec<u64>, Vec<u8>) {
        let mut offset = meta.data_page_offset as usize;
        let mut rep_levels = Vec::new();
        let mut def_levels = Vec::new();
        let mut value_bytes = Vec::new();
        let mut remaining = meta.num_values;
        while remaining > 0 {
            let mut prot = CompactSliceReader::new(&buffer[offset..]);
            let header = format::PageHeader::read_thrift(&mut prot).unwrap();
            let header_len = buffer.len() - offset - prot.as_slice().len();
            let body_start = offset + header_len;
            let body =
                &buffer[body_start..body_start + header.compressed_page_size as usize];
            let v1 = header.data_page_header.as_ref().unwrap();
            let num_values = v1.num_values as usize;

            let mut pos = 0;
            if max_rep > 0 {
                let len =
                    u32::from_le_bytes(body[pos..pos + 4].try_into().unwrap()) as usize;
                let mut decoder =
                    RleDecoder::new(num_required_bits(max_rep as u64), &body[pos + 4..pos + 4 + len]);
                rep_levels.extend(decoder.decode(num_values).unwrap());
                pos += 4 + len;
            }
            if max_def > 0 {
                let len =
                    u32::from_le_bytes(body[pos..pos + 4].try_into().unwrap()) as usize;
                let mut decoder =
                    RleDecoder::new(num_required_bits(max_def as u64), &body[pos + 4..pos + 4 + len]);
                def_levels.extend(decoder.decode(num_values).unwrap());
                pos += 4 + len;
            }
            value_bytes.extend_from_slice(&body[pos..]);
            remaining -= num_values as i64;
            offset = body_start + body.len();
        }
        (rep_levels, def_levels, value_bytes)
    }

    /// message m { optional group c { optional int64 id; repeated group d {
    /// optional int32 val; } } }
    fn nested_schema() -> crate::schema::types::TypePtr {
        let id = SchemaType::primitive_type_builder("id", Type::INT64)
            .build()
            .unwrap();
        let val = SchemaType::primitive_type_builder("val", Type::INT32)
            .build()
            .unwrap();
        let d = SchemaType::group_type_builder("d")
            .with_repetition(Repetition::REPEATED)
            .with_fields(vec![Arc::new(val)])
            .build()
            .unwrap();
        let c = SchemaType::group_type_builder("c")
            .with_repetition(Repetition::OPTIONAL)
            .with_fields(vec![Arc::new(id), Arc::new(d)])
            .build()
            .unwrap();
        Arc::new(
            SchemaType::group_type_builder("m")
                .with_fields(vec![Arc::new(c)])
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_nested_records_byte_level() {
        let props = Arc::new(
            WriterProperties::builder()
                .set_dictionary_enabled(false)
                .build(),
        );
        let mut buffer = Vec::new();
        {
            let mut writer =
                RecordFileWriter::new(&mut buffer, nested_schema(), props).unwrap();

            // record 1: {}
            writer.start_message().unwrap();
            writer.end_message().unwrap();

            // record 2: { c: { id: 1, d: [] } }
            writer.start_message().unwrap();
            writer.start_field("c", 0).unwrap();
            writer.start_group().unwrap();
            writer.start_field("id", 0).unwrap();
            writer.add_int64(1).unwrap();
            writer.end_field().unwrap();
            writer.end_group().unwrap();
            writer.end_field().unwrap();
            writer.end_message().unwrap();

            // record 3: { c: { id: 2, d: [{val: 10}, {val: 20}, {val: 30}] } }
            writer.start_message().unwrap();
            writer.start_field("c", 0).unwrap();
            writer.start_group().unwrap();
            writer.start_field("id", 0).unwrap();
            writer.add_int64(2).unwrap();
            writer.end_field().unwrap();
            writer.start_field("d", 1).unwrap();
            for val in [10, 20, 30] {
                writer.start_group().unwrap();
                writer.start_field("val", 0).unwrap();
                writer.add_int32(val).unwrap();
                writer.end_field().unwrap();
                writer.end_group().unwrap();
            }
            writer.end_field().unwrap();
            writer.end_group().unwrap();
            writer.end_field().unwrap();
            writer.end_message().unwrap();

            writer.close().unwrap();
        }

        let footer = parse_footer(&buffer);
        assert_eq!(footer.num_rows, 3);
        let row_group = &footer.row_groups[0];
        assert_eq!(row_group.num_rows, 3);

        // column 0: c.id with max levels (rep 0, def 2)
        let id_meta = row_group.columns[0].meta_data.as_ref().unwrap();
        assert_eq!(id_meta.path_in_schema, vec!["c".to_owned(), "id".to_owned()]);
        assert_eq!(id_meta.num_values, 3);
        let (rep, def, values) = decode_chunk(&buffer, id_meta, 0, 2);
        assert!(rep.is_empty());
        assert_eq!(def, vec![0, 2, 2]);
        let ids: Vec<i64> = values
            .chunks_exact(8)
            .map(|b| i64::from_le_bytes(b.try_into().unwrap()))
            .collect();
        assert_eq!(ids, vec![1, 2]);
        let stats = id_meta.statistics.as_ref().unwrap();
        assert_eq!(stats.null_count, Some(1));

        // column 1: c.d.val with max levels (rep 1, def 3)
        let val_meta = row_group.columns[1].meta_data.as_ref().unwrap();
        assert_eq!(val_meta.num_values, 5);
        let (rep, def, values) = decode_chunk(&buffer, val_meta, 1, 3);
        assert_eq!(rep, vec![0, 0, 0, 1, 1]);
        assert_eq!(def, vec![0, 1, 3, 3, 3]);
        let vals: Vec<i32> = values
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes(b.try_into().unwrap()))
            .collect();
        assert_eq!(vals, vec![10, 20, 30]);
        let stats = val_meta.statistics.as_ref().unwrap();
        assert_eq!(stats.null_count, Some(2));
        assert_eq!(stats.min_value.as_deref(), Some(&10i32.to_le_bytes()[..]));
        assert_eq!(stats.max_value.as_deref(), Some(&30i32.to_le_bytes()[..]));
    }

    fn flat_int64_schema() -> crate::schema::types::TypePtr {
        let v = SchemaType::primitive_type_builder("v", Type::INT64)
            .with_repetition(Repetition::REQUIRED)
            .build()
            .unwrap();
        Arc::new(
            SchemaType::group_type_builder("m")
                .with_fields(vec![Arc::new(v)])
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_memory_driven_row_group_flush() {
        const RECORDS: i64 = 2000;
        let props = Arc::new(
            WriterProperties::builder()
                .set_dictionary_enabled(false)
                .set_row_group_size_threshold(2048)
                .set_min_record_count_for_check(10)
                .build(),
        );
        let mut buffer = Vec::new();
        {
            let mut writer =
                RecordFileWriter::new(&mut buffer, flat_int64_schema(), props).unwrap();
            for i in 0..RECORDS {
                writer.start_message().unwrap();
                writer.start_field("v", 0).unwrap();
                writer.add_int64(i).unwrap();
                writer.end_field().unwrap();
                writer.end_message().unwrap();
            }
            assert!(writer.data_size() > 0);
            writer.close().unwrap();
        }

        let footer = parse_footer(&buffer);
        assert_eq!(footer.num_rows, RECORDS);
        // the memory probe split the stream into several bounded row groups
        assert!(footer.row_groups.len() >= 2, "expected multiple row groups");
        let max_group_rows = footer.row_groups.iter().map(|rg| rg.num_rows).max().unwrap();
        assert!(max_group_rows < RECORDS);
        // the buffered-size bound holds: full groups land close to the
        // threshold, overshooting by at most a page header's worth
        for rg in &footer.row_groups[..footer.row_groups.len() - 1] {
            let meta = rg.columns[0].meta_data.as_ref().unwrap();
            assert!(
                (2048 - 512..=2048 + 256).contains(&meta.total_uncompressed_size),
                "row group missed the size bound: {}",
                meta.total_uncompressed_size
            );
        }

        // values survive in order across all row groups
        let mut all_values = Vec::new();
        for rg in &footer.row_groups {
            let meta = rg.columns[0].meta_data.as_ref().unwrap();
            let (_, _, values) = decode_chunk(&buffer, meta, 0, 0);
            all_values.extend(
                values
                    .chunks_exact(8)
                    .map(|b| i64::from_le_bytes(b.try_into().unwrap())),
            );
        }
        let expected: Vec<i64> = (0..RECORDS).collect();
        assert_eq!(all_values, expected);
    }

    #[test]
    fn test_event_stream_dispatch() {
        let props = Arc::new(WriterProperties::builder().build());
        let mut buffer = Vec::new();
        {
            let mut writer =
                RecordFileWriter::new(&mut buffer, flat_int64_schema(), props).unwrap();
            for i in 0..3i64 {
                writer
                    .write_record(vec![
                        StartMessage,
                        StartField {
                            name: "v".to_owned(),
                            index: 0,
                        },
                        AddInt64(i),
                        EndField,
                        EndMessage,
                    ])
                    .unwrap();
            }
            writer.close().unwrap();
        }
        let footer = parse_footer(&buffer);
        assert_eq!(footer.num_rows, 3);
    }

    #[test]
    fn test_close_mid_record_is_rejected() {
        let props = Arc::new(WriterProperties::builder().build());
        let mut writer =
            RecordFileWriter::new(Vec::new(), flat_int64_schema(), props).unwrap();
        writer.start_message().unwrap();
        let err = writer.close().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Illegal state: cannot close in the middle of a record"
        );
    }

    #[test]
    fn test_explicit_flush_creates_row_group_boundary() {
        let props = Arc::new(WriterProperties::builder().build());
        let mut buffer = Vec::new();
        {
            let mut writer =
                RecordFileWriter::new(&mut buffer, flat_int64_schema(), props).unwrap();
            for i in 0..2i64 {
                writer.start_message().unwrap();
                writer.start_field("v", 0).unwrap();
                writer.add_int64(i).unwrap();
                writer.end_field().unwrap();
                writer.end_message().unwrap();
                writer.flush_row_group().unwrap();
            }
            writer.close().unwrap();
        }
        let footer = parse_footer(&buffer);
        assert_eq!(footer.row_groups.len(), 2);
        assert_eq!(footer.num_rows, 2);
        assert_eq!(footer.row_groups[0].ordinal, Some(0));
        assert_eq!(footer.row_groups[1].ordinal, Some(1));
    }
}
