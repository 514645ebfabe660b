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

//! Typed column writers.
//!
//! A column writer accumulates ⟨repetition level, definition level, value⟩
//! triples into an open page. After values arrive it evaluates one of three
//! transitions: keep buffering, seal the open page, or retire the
//! dictionary (seal, emit the dictionary page, release the pages parked
//! behind it, and continue with the fallback encoding). Sealing a page is
//! the only point where levels are encoded and the body is compressed, so a
//! page is always wholly one encoding.

use std::collections::{BTreeSet, VecDeque};

use bytes::Bytes;

use crate::basic::{Compression, Encoding, PageType, Type};
use crate::column::page::{CompressedPage, Page, PageWriteSpec, PageWriter};
use crate::column::writer::encoder::ColumnValueEncoder;
use crate::compression::{create_codec, Codec};
use crate::data_type::*;
use crate::encodings::levels::LevelEncoder;
use crate::errors::Result;
use crate::file::metadata::ColumnChunkMetaData;
use crate::file::properties::{
    EnabledStatistics, WriterProperties, WriterPropertiesPtr, WriterVersion,
};
use crate::file::statistics::{MinMax, Statistics, TypedComparator, ValueStatistics};
use crate::schema::types::ColumnDescPtr;

pub(crate) mod encoder;

/// Column writer for any physical type.
pub enum ColumnWriter<'a> {
    BoolColumnWriter(ColumnWriterImpl<'a, BoolType>),
    Int32ColumnWriter(ColumnWriterImpl<'a, Int32Type>),
    Int64ColumnWriter(ColumnWriterImpl<'a, Int64Type>),
    Int96ColumnWriter(ColumnWriterImpl<'a, Int96Type>),
    FloatColumnWriter(ColumnWriterImpl<'a, FloatType>),
    DoubleColumnWriter(ColumnWriterImpl<'a, DoubleType>),
    ByteArrayColumnWriter(ColumnWriterImpl<'a, ByteArrayType>),
    FixedLenByteArrayColumnWriter(ColumnWriterImpl<'a, FixedLenByteArrayType>),
}

macro_rules! downcast_writer {
    ($self:expr, $writer:ident, $body:expr) => {
        match $self {
            ColumnWriter::BoolColumnWriter($writer) => $body,
            ColumnWriter::Int32ColumnWriter($writer) => $body,
            ColumnWriter::Int64ColumnWriter($writer) => $body,
            ColumnWriter::Int96ColumnWriter($writer) => $body,
            ColumnWriter::FloatColumnWriter($writer) => $body,
            ColumnWriter::DoubleColumnWriter($writer) => $body,
            ColumnWriter::ByteArrayColumnWriter($writer) => $body,
            ColumnWriter::FixedLenByteArrayColumnWriter($writer) => $body,
        }
    };
}

macro_rules! typed_write {
    ($fn_name:ident, $value_ty:ty, $variant:ident) => {
        pub(crate) fn $fn_name(
            &mut self,
            value: $value_ty,
            rep_level: i16,
            def_level: i16,
        ) -> Result<()> {
            match self {
                ColumnWriter::$variant(writer) => writer.write_one(rep_level, def_level, Some(&value)),
                other => {
                    let physical_type =
                        <$value_ty as crate::data_type::private::ParquetValueType>::PHYSICAL_TYPE;
                    Err(schema_err!(
                        "column '{}' does not store {} values",
                        other.descriptor().path(),
                        physical_type
                    ))
                }
            }
        }
    };
}

impl<'a> ColumnWriter<'a> {
    /// The descriptor of the column this writer feeds.
    pub fn descriptor(&self) -> &ColumnDescPtr {
        downcast_writer!(self, writer, writer.descriptor())
    }

    /// Appends a null triple.
    pub(crate) fn write_null(&mut self, rep_level: i16, def_level: i16) -> Result<()> {
        downcast_writer!(self, writer, writer.write_one(rep_level, def_level, None))
    }

    typed_write!(write_bool, bool, BoolColumnWriter);
    typed_write!(write_i32, i32, Int32ColumnWriter);
    typed_write!(write_i64, i64, Int64ColumnWriter);
    typed_write!(write_int96, Int96, Int96ColumnWriter);
    typed_write!(write_f32, f32, FloatColumnWriter);
    typed_write!(write_f64, f64, DoubleColumnWriter);

    /// Appends a byte-array value; fixed-length columns validate the length
    /// against the schema.
    pub(crate) fn write_bytes(
        &mut self,
        value: ByteArray,
        rep_level: i16,
        def_level: i16,
    ) -> Result<()> {
        match self {
            ColumnWriter::ByteArrayColumnWriter(writer) => {
                writer.write_one(rep_level, def_level, Some(&value))
            }
            ColumnWriter::FixedLenByteArrayColumnWriter(writer) => {
                let expected = writer.descriptor().type_length();
                if value.len() != expected as usize {
                    return Err(schema_err!(
                        "column '{}' expects fixed {} byte values, got {} bytes",
                        writer.descriptor().path(),
                        expected,
                        value.len()
                    ));
                }
                writer.write_one(rep_level, def_level, Some(&value.into()))
            }
            other => Err(schema_err!(
                "column '{}' does not store BYTE_ARRAY values",
                other.descriptor().path()
            )),
        }
    }

    /// Live buffered bytes of this writer, across level sinks, the current
    /// page's encoder, and pages held for the dictionary.
    pub(crate) fn estimated_buffered_size(&self) -> usize {
        downcast_writer!(self, writer, writer.estimated_buffered_size())
    }

    /// Estimated allocated capacity of this writer.
    pub(crate) fn estimated_allocated_size(&self) -> usize {
        downcast_writer!(self, writer, writer.estimated_allocated_size())
    }

    /// Cuts a page at a record boundary if thresholds are reached; the v2
    /// writer's split point.
    pub(crate) fn cut_page_at_record_boundary(&mut self) -> Result<()> {
        downcast_writer!(self, writer, writer.cut_page_at_record_boundary())
    }

    /// Closes the writer, flushing all pages.
    pub fn close(self) -> Result<ColumnCloseResult> {
        downcast_writer!(self, writer, writer.close())
    }
}

/// Builds the column writer matching the descriptor's physical type.
pub fn get_column_writer<'a>(
    descr: ColumnDescPtr,
    props: WriterPropertiesPtr,
    page_writer: Box<dyn PageWriter + 'a>,
) -> Result<ColumnWriter<'a>> {
    Ok(match descr.physical_type() {
        Type::BOOLEAN => {
            ColumnWriter::BoolColumnWriter(ColumnWriterImpl::new(descr, props, page_writer)?)
        }
        Type::INT32 => {
            ColumnWriter::Int32ColumnWriter(ColumnWriterImpl::new(descr, props, page_writer)?)
        }
        Type::INT64 => {
            ColumnWriter::Int64ColumnWriter(ColumnWriterImpl::new(descr, props, page_writer)?)
        }
        Type::INT96 => {
            ColumnWriter::Int96ColumnWriter(ColumnWriterImpl::new(descr, props, page_writer)?)
        }
        Type::FLOAT => {
            ColumnWriter::FloatColumnWriter(ColumnWriterImpl::new(descr, props, page_writer)?)
        }
        Type::DOUBLE => {
            ColumnWriter::DoubleColumnWriter(ColumnWriterImpl::new(descr, props, page_writer)?)
        }
        Type::BYTE_ARRAY => {
            ColumnWriter::ByteArrayColumnWriter(ColumnWriterImpl::new(descr, props, page_writer)?)
        }
        Type::FIXED_LEN_BYTE_ARRAY => ColumnWriter::FixedLenByteArrayColumnWriter(
            ColumnWriterImpl::new(descr, props, page_writer)?,
        ),
    })
}

/// Extracts the typed writer for `T` out of `col_writer`.
///
/// Panics if the variant does not match `T`.
pub fn get_typed_column_writer<'a, T: DataType>(
    col_writer: ColumnWriter<'a>,
) -> ColumnWriterImpl<'a, T> {
    T::get_column_writer(col_writer).unwrap_or_else(|| {
        panic!(
            "failed to convert column writer into a typed column writer for `{}` type",
            T::get_physical_type()
        )
    })
}

/// As [`get_typed_column_writer`], for a mutable reference.
pub fn get_typed_column_writer_mut<'a, 'b: 'a, T: DataType>(
    col_writer: &'a mut ColumnWriter<'b>,
) -> &'a mut ColumnWriterImpl<'b, T> {
    T::get_column_writer_mut(col_writer).unwrap_or_else(|| {
        panic!(
            "failed to convert column writer into a typed column writer for `{}` type",
            T::get_physical_type()
        )
    })
}

/// Everything a closed column chunk reports back.
#[derive(Debug, Clone)]
pub struct ColumnCloseResult {
    /// Total bytes this writer put into the sink.
    pub bytes_written: u64,
    /// Total rows represented by the written triples.
    pub rows_written: u64,
    /// The chunk's metadata for the footer.
    pub metadata: ColumnChunkMetaData,
}

/// What the writer must do after new values arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageTransition {
    /// Below every threshold; keep accumulating.
    Buffer,
    /// The open page reached a size or row limit; seal it.
    SealPage,
    /// The dictionary outgrew its cap; seal the open page, emit the
    /// dictionary, release the parked pages, and fall back.
    RetireDictionary,
}

/// The open page: its level streams and triple counters. Values live in the
/// column's encoder until the page seals.
#[derive(Default)]
struct PageBuffer {
    rep_levels: Vec<i16>,
    def_levels: Vec<i16>,
    /// Triples accumulated, nulls included.
    values: u32,
    rows: u32,
    nulls: u64,
}

impl PageBuffer {
    fn is_empty(&self) -> bool {
        self.values == 0
    }

    /// Bytes the buffered level streams occupy.
    fn level_bytes(&self) -> usize {
        (self.rep_levels.len() + self.def_levels.len()) * 2
    }

    fn level_capacity_bytes(&self) -> usize {
        (self.rep_levels.capacity() + self.def_levels.capacity()) * 2
    }

    /// Accepts one batch of levels, counting rows and nulls, and returns
    /// how many of the entries carry a value.
    fn accept(
        &mut self,
        def_levels: Option<&[i16]>,
        rep_levels: Option<&[i16]>,
        count: usize,
        max_def_level: i16,
        max_rep_level: i16,
    ) -> Result<usize> {
        if let (Some(def), Some(rep)) = (def_levels, rep_levels) {
            if def.len() != rep.len() {
                return Err(schema_err!(
                    "definition and repetition level counts differ: {} vs {}",
                    def.len(),
                    rep.len()
                ));
            }
        }

        let present = match (max_def_level > 0, def_levels) {
            (false, _) => count,
            (true, None) => {
                return Err(schema_err!(
                    "column with max definition level {} was given no definition levels",
                    max_def_level
                ))
            }
            (true, Some(levels)) => {
                let present = levels.iter().filter(|&&l| l == max_def_level).count();
                self.nulls += (levels.len() - present) as u64;
                self.def_levels.extend_from_slice(levels);
                present
            }
        };

        match (max_rep_level > 0, rep_levels) {
            // without repetition every triple is its own row
            (false, _) => self.rows += count as u32,
            (true, None) => {
                return Err(schema_err!(
                    "column with max repetition level {} was given no repetition levels",
                    max_rep_level
                ))
            }
            (true, Some(levels)) => {
                // a zero repetition level starts a new row
                self.rows += levels.iter().filter(|&&l| l == 0).count() as u32;
                self.rep_levels.extend_from_slice(levels);
            }
        }

        self.values += count as u32;
        Ok(present)
    }

    /// Accepts a single triple whose levels were already validated.
    fn accept_one(&mut self, rep_level: i16, def_level: i16, max_def: i16, max_rep: i16) {
        if max_def > 0 {
            self.def_levels.push(def_level);
            if def_level < max_def {
                self.nulls += 1;
            }
        }
        if max_rep > 0 {
            self.rep_levels.push(rep_level);
            self.rows += (rep_level == 0) as u32;
        } else {
            self.rows += 1;
        }
        self.values += 1;
    }

    fn take(&mut self) -> PageBuffer {
        std::mem::take(self)
    }
}

/// Running totals of the column chunk, updated as pages reach the sink.
struct ChunkMetrics<T> {
    bytes_written: u64,
    rows: u64,
    uncompressed_size: u64,
    compressed_size: u64,
    num_values: u64,
    dictionary_page_offset: Option<u64>,
    first_data_page_offset: Option<u64>,
    minmax: MinMax<T>,
    nulls: u64,
    distinct: Option<u64>,
}

impl<T> ChunkMetrics<T> {
    fn new() -> Self {
        Self {
            bytes_written: 0,
            rows: 0,
            uncompressed_size: 0,
            compressed_size: 0,
            num_values: 0,
            dictionary_page_offset: None,
            first_data_page_offset: None,
            minmax: MinMax::new(),
            nulls: 0,
            distinct: None,
        }
    }

    /// Accounts for one page written to the sink.
    fn absorb_page(&mut self, spec: &PageWriteSpec) {
        self.uncompressed_size += spec.uncompressed_size as u64;
        self.compressed_size += spec.compressed_size as u64;
        self.num_values += spec.num_values as u64;
        self.bytes_written += spec.bytes_written;

        match spec.page_type {
            Some(PageType::DATA_PAGE) | Some(PageType::DATA_PAGE_V2) => {
                self.first_data_page_offset.get_or_insert(spec.offset);
            }
            Some(PageType::DICTIONARY_PAGE) => {
                assert!(
                    self.dictionary_page_offset.is_none(),
                    "dictionary page offset is already set"
                );
                self.dictionary_page_offset = Some(spec.offset);
            }
            _ => {}
        }
    }
}

/// Typed writer for one column chunk.
pub struct ColumnWriterImpl<'a, T: DataType> {
    descr: ColumnDescPtr,
    props: WriterPropertiesPtr,
    statistics_enabled: EnabledStatistics,

    page_writer: Box<dyn PageWriter + 'a>,
    codec: Compression,
    compressor: Option<Box<dyn Codec>>,
    encoder: ColumnValueEncoder<T>,
    comparator: TypedComparator<T::T>,

    /// The page being accumulated.
    page: PageBuffer,
    /// Sealed pages waiting for the dictionary page to go out first.
    parked_pages: VecDeque<CompressedPage>,
    metrics: ChunkMetrics<T::T>,

    /// BTreeSet so the footer's encodings list is deterministic.
    encodings: BTreeSet<Encoding>,
    /// True once any value was written; statistics hints only apply before.
    any_values: bool,
    /// Value count at which the single-value path probes the page size
    /// next.
    page_probe_at: usize,
}

impl<'a, T: DataType> ColumnWriterImpl<'a, T> {
    pub fn new(
        descr: ColumnDescPtr,
        props: WriterPropertiesPtr,
        page_writer: Box<dyn PageWriter + 'a>,
    ) -> Result<Self> {
        let codec = props.compression(descr.path());
        let compressor = create_codec(codec)?;
        let encoder = ColumnValueEncoder::try_new(&descr, props.as_ref())?;
        let comparator = TypedComparator::for_column(&descr);
        let statistics_enabled = props.statistics_enabled(descr.path());

        let mut encodings = BTreeSet::new();
        // level streams are always RLE
        encodings.insert(Encoding::RLE);

        Ok(Self {
            descr,
            statistics_enabled,
            page_writer,
            codec,
            compressor,
            encoder,
            comparator,
            page: PageBuffer::default(),
            parked_pages: VecDeque::new(),
            metrics: ChunkMetrics::new(),
            encodings,
            any_values: false,
            page_probe_at: props.min_record_count_for_check(),
            props,
        })
    }

    pub fn descriptor(&self) -> &ColumnDescPtr {
        &self.descr
    }

    /// Writes a batch of values with their levels.
    ///
    /// Definition levels are required when the column is nullable, and
    /// repetition levels when it is repeated; the number of values actually
    /// consumed (levels at the maximum definition level) is returned.
    pub fn write_batch(
        &mut self,
        values: &[T::T],
        def_levels: Option<&[i16]>,
        rep_levels: Option<&[i16]>,
    ) -> Result<usize> {
        self.write_batch_internal(values, def_levels, rep_levels, None, None, None)
    }

    /// As [`write_batch`](Self::write_batch), additionally recording a
    /// caller-provided distinct count and min/max for the chunk statistics.
    pub fn write_batch_with_statistics(
        &mut self,
        values: &[T::T],
        def_levels: Option<&[i16]>,
        rep_levels: Option<&[i16]>,
        min: Option<&T::T>,
        max: Option<&T::T>,
        distinct_count: Option<u64>,
    ) -> Result<usize> {
        self.write_batch_internal(values, def_levels, rep_levels, min, max, distinct_count)
    }

    fn write_batch_internal(
        &mut self,
        values: &[T::T],
        def_levels: Option<&[i16]>,
        rep_levels: Option<&[i16]>,
        min: Option<&T::T>,
        max: Option<&T::T>,
        distinct_count: Option<u64>,
    ) -> Result<usize> {
        let num_levels = match def_levels {
            Some(def_levels) => def_levels.len(),
            None => values.len(),
        };

        if self.statistics_enabled != EnabledStatistics::None {
            if let Some(min) = min {
                self.comparator.observe(min, &mut self.metrics.minmax);
            }
            if let Some(max) = max {
                self.comparator.observe(max, &mut self.metrics.minmax);
            }
        }
        // a distinct count only describes the chunk if nothing else was
        // written before or after this batch; later writes clear it
        self.metrics.distinct = if self.any_values {
            None
        } else {
            distinct_count
        };

        // work through the batch in bounded slices so page limits are
        // enforced at a reasonable granularity even for huge inputs
        let step = self.props.write_batch_size();
        let mut values_consumed = 0;
        let mut levels_consumed = 0;
        while levels_consumed < num_levels {
            let take = step.min(num_levels - levels_consumed);
            values_consumed += self.write_batch_chunk(
                values,
                values_consumed,
                def_levels.map(|lv| &lv[levels_consumed..levels_consumed + take]),
                rep_levels.map(|lv| &lv[levels_consumed..levels_consumed + take]),
                take,
            )?;
            levels_consumed += take;
        }

        Ok(values_consumed)
    }

    fn write_batch_chunk(
        &mut self,
        values: &[T::T],
        offset: usize,
        def_levels: Option<&[i16]>,
        rep_levels: Option<&[i16]>,
        count: usize,
    ) -> Result<usize> {
        let present = self.page.accept(
            def_levels,
            rep_levels,
            count,
            self.descr.max_def_level(),
            self.descr.max_rep_level(),
        )?;

        let slice = values.get(offset..offset + present).ok_or_else(|| {
            schema_err!(
                "levels call for {} values but the batch holds {}",
                present,
                values.len() - offset
            )
        })?;
        self.encoder.write(slice)?;
        self.any_values |= count > 0;

        self.apply_transition()?;
        Ok(present)
    }

    /// Appends one ⟨repetition, definition, value⟩ triple; the shredder's
    /// entry point.
    pub(crate) fn write_one(
        &mut self,
        rep_level: i16,
        def_level: i16,
        value: Option<&T::T>,
    ) -> Result<()> {
        let max_def_level = self.descr.max_def_level();
        let max_rep_level = self.descr.max_rep_level();
        if !(0..=max_def_level).contains(&def_level) || !(0..=max_rep_level).contains(&rep_level) {
            return Err(internal_err!(
                "levels ({}, {}) out of range for column '{}' with maxima ({}, {})",
                rep_level,
                def_level,
                self.descr.path(),
                max_rep_level,
                max_def_level
            ));
        }

        self.page
            .accept_one(rep_level, def_level, max_def_level, max_rep_level);
        match value {
            Some(value) => {
                debug_assert_eq!(def_level, max_def_level);
                self.encoder.write(std::slice::from_ref(value))?;
            }
            None => debug_assert!(def_level < max_def_level),
        }
        self.any_values = true;

        // the dictionary cap is exact: probe it on every value
        if self.dictionary_over_cap() {
            self.retire_dictionary()?;
        }
        self.probe_page_size()
    }

    /// The single-value path probes the page size at an adaptive cadence
    /// instead of on every value, homing in on the projected threshold
    /// crossing.
    fn probe_page_size(&mut self) -> Result<()> {
        let count = self.page.values as usize;
        if count < self.page_probe_at {
            return Ok(());
        }
        // v2 pages split only at record boundaries, where the write store
        // drives the transition
        if self.props.writer_version() != WriterVersion::PARQUET_1_0 {
            return Ok(());
        }

        let min_probe = self.props.min_record_count_for_check();
        let estimate = self.props.estimate_next_size_check();
        let limit = self.props.data_page_size_limit();
        let buffered = self.page.level_bytes() + self.encoder.estimated_data_page_size();

        if buffered >= limit
            || self.page.rows as usize >= self.props.data_page_row_count_limit()
        {
            self.page_probe_at = if estimate {
                (count / 2).max(min_probe)
            } else {
                min_probe
            };
            self.seal_page()
        } else {
            self.page_probe_at = if estimate {
                let projected = count * limit / buffered.max(1);
                (count + projected) / 2 + 1
            } else {
                count + min_probe
            };
            Ok(())
        }
    }

    /// Applies whichever transition the buffered state calls for; also the
    /// write store's record-boundary hook for v2 page splits.
    pub(crate) fn cut_page_at_record_boundary(&mut self) -> Result<()> {
        self.apply_transition()
    }

    /// Total bytes this writer has written to the sink so far.
    pub fn get_total_bytes_written(&self) -> u64 {
        self.metrics.bytes_written
    }

    /// Total rows this writer has seen so far.
    pub fn get_total_rows_written(&self) -> u64 {
        self.metrics.rows
    }

    /// Finalizes and closes this writer, returning the chunk metadata.
    pub fn close(mut self) -> Result<ColumnCloseResult> {
        if !self.page.is_empty() {
            self.seal_page()?;
        }
        if self.encoder.has_dictionary() {
            self.emit_dictionary_page()?;
        }
        self.release_parked_pages()?;
        let metadata = self.chunk_metadata()?;
        self.page_writer.close()?;

        Ok(ColumnCloseResult {
            bytes_written: self.metrics.bytes_written,
            rows_written: self.metrics.rows,
            metadata,
        })
    }

    /// Live buffered bytes: level streams, current page values, dictionary,
    /// and pages parked behind the dictionary.
    pub(crate) fn estimated_buffered_size(&self) -> usize {
        self.page.level_bytes()
            + self.encoder.estimated_data_page_size()
            + self.encoder.estimated_dict_page_size().unwrap_or(0)
            + self.parked_bytes()
    }

    pub(crate) fn estimated_allocated_size(&self) -> usize {
        self.page.level_capacity_bytes() + self.encoder.estimated_memory_size() + self.parked_bytes()
    }

    fn parked_bytes(&self) -> usize {
        self.parked_pages.iter().map(|p| p.compressed_size()).sum()
    }

    fn dictionary_over_cap(&self) -> bool {
        match self.encoder.estimated_dict_page_size() {
            Some(size) => size >= self.props.dictionary_page_size_limit(),
            None => false,
        }
    }

    /// Decides the next transition from the buffered state.
    fn next_transition(&self) -> PageTransition {
        if self.dictionary_over_cap() {
            return PageTransition::RetireDictionary;
        }
        // an empty page never seals, even when an over-sized dictionary
        // inflates the estimates
        if !self.page.is_empty()
            && (self.page.rows as usize >= self.props.data_page_row_count_limit()
                || self.encoder.estimated_data_page_size() >= self.props.data_page_size_limit())
        {
            return PageTransition::SealPage;
        }
        PageTransition::Buffer
    }

    fn apply_transition(&mut self) -> Result<()> {
        match self.next_transition() {
            PageTransition::Buffer => Ok(()),
            PageTransition::SealPage => self.seal_page(),
            PageTransition::RetireDictionary => self.retire_dictionary(),
        }
    }

    /// Seals the open page: encodes its levels, compresses its body, and
    /// hands it on (parked while a dictionary is still pending, straight to
    /// the sink otherwise).
    fn seal_page(&mut self) -> Result<()> {
        let values = self.encoder.flush_data_page()?;
        let page = self.page.take();

        // fold this page's span and nulls into the chunk statistics
        self.comparator
            .absorb(&values.minmax, &mut self.metrics.minmax);
        self.metrics.nulls += page.nulls;

        let page_statistics = match (self.statistics_enabled, values.minmax.min()) {
            (EnabledStatistics::Page, Some(_)) => {
                let (min, max) = values.minmax.clone().into_inner();
                Some(Statistics::new(min, max, None, page.nulls))
            }
            _ => None,
        };

        let max_rep_level = self.descr.max_rep_level();
        let max_def_level = self.descr.max_def_level();
        let sealed = match self.props.writer_version() {
            WriterVersion::PARQUET_1_0 => {
                let (buf, uncompressed_size) = seal_v1_body(
                    &page.rep_levels,
                    &page.def_levels,
                    max_rep_level,
                    max_def_level,
                    &values.buf,
                    &mut self.compressor,
                )?;
                CompressedPage::new(
                    Page::DataPage {
                        buf,
                        num_values: page.values,
                        encoding: values.encoding,
                        def_level_encoding: Encoding::RLE,
                        rep_level_encoding: Encoding::RLE,
                        statistics: page_statistics,
                    },
                    uncompressed_size,
                )
            }
            WriterVersion::PARQUET_2_0 => {
                let body = seal_v2_body(
                    &page.rep_levels,
                    &page.def_levels,
                    max_rep_level,
                    max_def_level,
                    &values.buf,
                    &mut self.compressor,
                )?;
                CompressedPage::new(
                    Page::DataPageV2 {
                        buf: body.buf,
                        num_values: page.values,
                        encoding: values.encoding,
                        num_nulls: page.nulls as u32,
                        num_rows: page.rows,
                        def_levels_byte_len: body.def_levels_byte_len,
                        rep_levels_byte_len: body.rep_levels_byte_len,
                        is_compressed: self.compressor.is_some(),
                        statistics: page_statistics,
                    },
                    body.uncompressed_size,
                )
            }
        };

        self.metrics.rows += page.rows as u64;
        if self.encoder.has_dictionary() {
            self.parked_pages.push_back(sealed);
            Ok(())
        } else {
            self.write_page_through(sealed)
        }
    }

    /// Retires the dictionary: seals the open page, emits the dictionary
    /// page, and releases the pages parked behind it, so later pages use
    /// the fallback encoding.
    fn retire_dictionary(&mut self) -> Result<()> {
        if !self.page.is_empty() {
            self.seal_page()?;
        }
        self.emit_dictionary_page()?;
        self.release_parked_pages()
    }

    fn release_parked_pages(&mut self) -> Result<()> {
        while let Some(page) = self.parked_pages.pop_front() {
            self.write_page_through(page)?;
        }
        Ok(())
    }

    fn emit_dictionary_page(&mut self) -> Result<()> {
        let page = self
            .encoder
            .flush_dict_page()?
            .ok_or_else(|| state_err!("dictionary encoder is not set"))?;

        let uncompressed_size = page.buf.len();
        let mut buf = page.buf;
        if let Some(compressor) = &mut self.compressor {
            let mut compressed = Vec::with_capacity(uncompressed_size);
            compressor.compress(&buf, &mut compressed)?;
            buf = compressed.into();
        }

        let dict_page = CompressedPage::new(
            Page::DictionaryPage {
                buf,
                num_values: page.num_values as u32,
                encoding: self.props.dictionary_page_encoding(),
                is_sorted: page.is_sorted,
            },
            uncompressed_size,
        );
        // the data pages written against this dictionary carry the
        // RLE_DICTIONARY tag
        self.encodings
            .insert(self.props.dictionary_data_page_encoding());
        self.write_page_through(dict_page)
    }

    fn write_page_through(&mut self, page: CompressedPage) -> Result<()> {
        self.encodings.insert(page.encoding());
        let spec = self.page_writer.write_page(page)?;
        self.metrics.absorb_page(&spec);
        Ok(())
    }

    fn chunk_metadata(&mut self) -> Result<ColumnChunkMetaData> {
        let total_compressed_size = self.metrics.compressed_size as i64;
        let dict_page_offset = self.metrics.dictionary_page_offset.map(|v| v as i64);
        let data_page_offset = self.metrics.first_data_page_offset.unwrap_or(0) as i64;
        let file_offset = dict_page_offset.unwrap_or(data_page_offset) + total_compressed_size;

        let mut builder = ColumnChunkMetaData::builder(self.descr.clone())
            .set_compression(self.codec)
            .set_encodings(self.encodings.iter().cloned().collect())
            .set_file_offset(file_offset)
            .set_total_compressed_size(total_compressed_size)
            .set_total_uncompressed_size(self.metrics.uncompressed_size as i64)
            .set_num_values(self.metrics.num_values as i64)
            .set_data_page_offset(data_page_offset)
            .set_dictionary_page_offset(dict_page_offset);

        // INT96 ordering is undefined; its min/max would only mislead
        if self.statistics_enabled != EnabledStatistics::None
            && T::get_physical_type() != Type::INT96
        {
            let (min, max) = self.metrics.minmax.take().into_inner();
            let statistics = ValueStatistics::new(min, max, self.metrics.distinct, self.metrics.nulls)
                .with_backwards_compatible_min_max(self.descr.sort_order().is_signed());
            builder = builder.set_statistics(Some(statistics.into()));
        }

        builder.build()
    }
}

// Assembles a v1 page body: RLE levels with their length prefixes, then the
// values, the whole concatenation compressed together.
fn seal_v1_body(
    rep_levels: &[i16],
    def_levels: &[i16],
    max_rep_level: i16,
    max_def_level: i16,
    values: &Bytes,
    compressor: &mut Option<Box<dyn Codec>>,
) -> Result<(Bytes, usize)> {
    let mut body = Vec::new();
    if max_rep_level > 0 {
        body.extend_from_slice(&encode_levels_v1(rep_levels, max_rep_level));
    }
    if max_def_level > 0 {
        body.extend_from_slice(&encode_levels_v1(def_levels, max_def_level));
    }
    body.extend_from_slice(values);

    let uncompressed_size = body.len();
    if let Some(codec) = compressor {
        let mut compressed = Vec::with_capacity(uncompressed_size);
        codec.compress(&body, &mut compressed)?;
        body = compressed;
    }
    Ok((body.into(), uncompressed_size))
}

struct V2Body {
    buf: Bytes,
    uncompressed_size: usize,
    rep_levels_byte_len: u32,
    def_levels_byte_len: u32,
}

// Assembles a v2 page body: bare RLE levels left uncompressed, followed by
// the compressed value section.
fn seal_v2_body(
    rep_levels: &[i16],
    def_levels: &[i16],
    max_rep_level: i16,
    max_def_level: i16,
    values: &Bytes,
    compressor: &mut Option<Box<dyn Codec>>,
) -> Result<V2Body> {
    let mut body = Vec::new();
    let mut rep_levels_byte_len = 0;
    let mut def_levels_byte_len = 0;
    if max_rep_level > 0 {
        let levels = encode_levels_v2(rep_levels, max_rep_level);
        rep_levels_byte_len = levels.len();
        body.extend_from_slice(&levels);
    }
    if max_def_level > 0 {
        let levels = encode_levels_v2(def_levels, max_def_level);
        def_levels_byte_len = levels.len();
        body.extend_from_slice(&levels);
    }
    let uncompressed_size = rep_levels_byte_len + def_levels_byte_len + values.len();

    match compressor {
        Some(codec) => codec.compress(values, &mut body)?,
        None => body.extend_from_slice(values),
    }
    Ok(V2Body {
        buf: body.into(),
        uncompressed_size,
        rep_levels_byte_len: rep_levels_byte_len as u32,
        def_levels_byte_len: def_levels_byte_len as u32,
    })
}

#[inline]
fn encode_levels_v1(levels: &[i16], max_level: i16) -> Vec<u8> {
    let mut encoder = LevelEncoder::v1(max_level, levels.len());
    encoder.put(levels);
    encoder.consume()
}

#[inline]
fn encode_levels_v2(levels: &[i16], max_level: i16) -> Vec<u8> {
    let mut encoder = LevelEncoder::v2(max_level, levels.len());
    encoder.put(levels);
    encoder.consume()
}

/// The fallback encoding used when none is configured for a column.
fn fallback_encoding(kind: Type, props: &WriterProperties) -> Encoding {
    match (kind, props.writer_version()) {
        (Type::BOOLEAN, WriterVersion::PARQUET_2_0) => Encoding::RLE,
        (Type::INT32, WriterVersion::PARQUET_2_0) => Encoding::DELTA_BINARY_PACKED,
        (Type::INT64, WriterVersion::PARQUET_2_0) => Encoding::DELTA_BINARY_PACKED,
        (Type::BYTE_ARRAY, WriterVersion::PARQUET_2_0) => Encoding::DELTA_BYTE_ARRAY,
        (Type::FIXED_LEN_BYTE_ARRAY, WriterVersion::PARQUET_2_0) => Encoding::DELTA_BYTE_ARRAY,
        _ => Encoding::PLAIN,
    }
}

/// Whether a column of this type may be dictionary encoded.
fn has_dictionary_support(kind: Type, props: &WriterProperties) -> bool {
    match (kind, props.writer_version()) {
        // booleans are cheaper plain or RLE encoded
        (Type::BOOLEAN, _) => false,
        // format v1 readers do not expect dictionary-encoded fixed arrays
        (Type::FIXED_LEN_BYTE_ARRAY, WriterVersion::PARQUET_1_0) => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::Repetition;
    use crate::file::properties::WriterProperties;
    use crate::schema::types::{ColumnDescriptor, ColumnPath, Type as SchemaType};
    use std::sync::Arc;

    /// Captures pages instead of serializing them.
    #[derive(Default)]
    struct TestPageWriter {
        pages: Arc<std::sync::Mutex<Vec<CompressedPage>>>,
        offset: u64,
    }

    impl PageWriter for TestPageWriter {
        fn write_page(&mut self, page: CompressedPage) -> Result<PageWriteSpec> {
            let mut spec = PageWriteSpec::default();
            spec.page_type = Some(page.page_type());
            spec.uncompressed_size = page.uncompressed_size();
            spec.compressed_size = page.compressed_size();
            spec.offset = self.offset;
            spec.bytes_written = page.compressed_size() as u64;
            if page.compressed_page().is_data_page() {
                spec.num_values = page.num_values();
            }
            self.offset += spec.bytes_written;
            self.pages.lock().unwrap().push(page);
            Ok(spec)
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn test_descr(max_def_level: i16, max_rep_level: i16) -> ColumnDescPtr {
        let field = SchemaType::primitive_type_builder("col", Type::INT32)
            .with_repetition(Repetition::REQUIRED)
            .build()
            .unwrap();
        Arc::new(ColumnDescriptor::new(
            Arc::new(field),
            max_def_level,
            max_rep_level,
            ColumnPath::from("col"),
        ))
    }

    fn writer_with(
        max_def_level: i16,
        max_rep_level: i16,
        props: WriterProperties,
    ) -> (
        ColumnWriterImpl<'static, Int32Type>,
        Arc<std::sync::Mutex<Vec<CompressedPage>>>,
    ) {
        let page_writer = TestPageWriter::default();
        let pages = page_writer.pages.clone();
        let writer = ColumnWriterImpl::new(
            test_descr(max_def_level, max_rep_level),
            Arc::new(props),
            Box::new(page_writer),
        )
        .unwrap();
        (writer, pages)
    }

    #[test]
    fn test_inconsistent_level_lengths() {
        let (mut writer, _) = writer_with(1, 1, WriterProperties::builder().build());
        let err = writer
            .write_batch(&[1, 2, 3, 4], Some(&[1, 1, 1]), Some(&[0, 0]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Schema error: definition and repetition level counts differ: 3 vs 2"
        );
    }

    #[test]
    fn test_def_levels_required_for_nullable_column() {
        let (mut writer, _) = writer_with(1, 0, WriterProperties::builder().build());
        let err = writer.write_batch(&[1, 2, 3, 4], None, None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Schema error: column with max definition level 1 was given no definition levels"
        );
    }

    #[test]
    fn test_rep_levels_required_for_repeated_column() {
        let (mut writer, _) = writer_with(0, 1, WriterProperties::builder().build());
        let err = writer.write_batch(&[1, 2, 3, 4], None, None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Schema error: column with max repetition level 1 was given no repetition levels"
        );
    }

    #[test]
    fn test_not_enough_values() {
        let (mut writer, _) = writer_with(1, 0, WriterProperties::builder().build());
        let err = writer
            .write_batch(&[1, 2], Some(&[1, 1, 1, 1]), None)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Schema error: levels call for 4 values but the batch holds 2"
        );
    }

    #[test]
    fn test_write_one_rejects_out_of_range_levels() {
        let (mut writer, _) = writer_with(1, 0, WriterProperties::builder().build());
        let err = writer.write_one(0, 2, Some(&7)).unwrap_err();
        assert!(err.to_string().contains("out of range"));
        let err = writer.write_one(1, 1, Some(&7)).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_close_reports_rows_and_encodings() {
        let (mut writer, pages) = writer_with(0, 0, WriterProperties::builder().build());
        writer.write_batch(&[1, 2, 2, 1], None, None).unwrap();
        let result = writer.close().unwrap();
        assert_eq!(result.rows_written, 4);
        assert_eq!(result.metadata.num_values(), 4);
        // dictionary-encoded chunk: PLAIN dictionary page, RLE levels,
        // RLE_DICTIONARY data pages
        assert_eq!(
            result.metadata.encodings(),
            &[Encoding::PLAIN, Encoding::RLE, Encoding::RLE_DICTIONARY]
        );
        assert!(result.metadata.dictionary_page_offset().is_some());

        let pages = pages.lock().unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_type(), PageType::DICTIONARY_PAGE);
        assert_eq!(pages[1].page_type(), PageType::DATA_PAGE);
    }

    #[test]
    fn test_nulls_counted_in_statistics() {
        let (mut writer, _) = writer_with(1, 0, WriterProperties::builder().build());
        writer
            .write_batch(&[3, -3], Some(&[1, 0, 1, 0, 0]), None)
            .unwrap();
        let result = writer.close().unwrap();
        let statistics = result.metadata.statistics().unwrap();
        assert_eq!(statistics.null_count(), 3);
        assert_eq!(statistics.min_bytes_opt(), Some(&(-3i32).to_le_bytes()[..]));
        assert_eq!(statistics.max_bytes_opt(), Some(&3i32.to_le_bytes()[..]));
        assert_eq!(result.metadata.num_values(), 5);
        assert_eq!(result.rows_written, 5);
    }

    #[test]
    fn test_v2_page_carries_nulls_and_rows() {
        let props = WriterProperties::builder()
            .set_writer_version(WriterVersion::PARQUET_2_0)
            .set_dictionary_enabled(false)
            .build();
        let (mut writer, pages) = writer_with(1, 0, props);
        writer.write_batch(&[10, 30], Some(&[1, 0, 1]), None).unwrap();
        writer.close().unwrap();

        let pages = pages.lock().unwrap();
        assert_eq!(pages.len(), 1);
        match pages[0].compressed_page() {
            Page::DataPageV2 {
                num_values,
                num_nulls,
                num_rows,
                def_levels_byte_len,
                rep_levels_byte_len,
                is_compressed,
                encoding,
                ..
            } => {
                assert_eq!(*num_values, 3);
                assert_eq!(*num_nulls, 1);
                assert_eq!(*num_rows, 3);
                assert!(*def_levels_byte_len > 0);
                assert_eq!(*rep_levels_byte_len, 0);
                assert!(!*is_compressed);
                // v2 integer fallback is delta encoding
                assert_eq!(*encoding, Encoding::DELTA_BINARY_PACKED);
            }
            other => panic!("expected a v2 data page, got {other:?}"),
        }
    }

    #[test]
    fn test_page_cut_on_size_threshold() {
        let props = WriterProperties::builder()
            .set_dictionary_enabled(false)
            .set_data_page_size_limit(128)
            .set_write_batch_size(50)
            .build();
        let (mut writer, pages) = writer_with(0, 0, props);
        let values: Vec<i32> = (0..1000).collect();
        writer.write_batch(&values, None, None).unwrap();
        writer.close().unwrap();

        let pages = pages.lock().unwrap();
        assert!(pages.len() > 1, "expected multiple pages, got {}", pages.len());
        let total: u32 = pages.iter().map(|p| p.num_values()).sum();
        assert_eq!(total, 1000);
    }

    #[test]
    fn test_distinct_count_cleared_by_later_writes() {
        let (mut writer, _) = writer_with(0, 0, WriterProperties::builder().build());
        writer
            .write_batch_with_statistics(&[1, 2, 3], None, None, None, None, Some(3))
            .unwrap();
        writer
            .write_batch_with_statistics(&[4], None, None, None, None, Some(1))
            .unwrap();
        let result = writer.close().unwrap();
        let statistics = result.metadata.statistics().unwrap();
        assert_eq!(statistics.distinct_count_opt(), None);
    }
}
