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

//! In-memory pages and the sink they are written to.

use bytes::Bytes;

use crate::basic::{Encoding, PageType};
use crate::errors::Result;
use crate::file::statistics::Statistics;

/// One Parquet page, fully encoded.
///
/// The `buf` of a data page holds `⟨rep levels | def levels | values⟩` for
/// v1 (compressed as a whole) and `⟨rep levels | def levels | compressed
/// values⟩` for v2 (levels never compressed).
#[derive(Clone, Debug)]
pub enum Page {
    DataPage {
        buf: Bytes,
        num_values: u32,
        encoding: Encoding,
        def_level_encoding: Encoding,
        rep_level_encoding: Encoding,
        statistics: Option<Statistics>,
    },
    DataPageV2 {
        buf: Bytes,
        num_values: u32,
        encoding: Encoding,
        num_nulls: u32,
        num_rows: u32,
        def_levels_byte_len: u32,
        rep_levels_byte_len: u32,
        is_compressed: bool,
        statistics: Option<Statistics>,
    },
    DictionaryPage {
        buf: Bytes,
        num_values: u32,
        encoding: Encoding,
        is_sorted: bool,
    },
}

impl Page {
    pub fn page_type(&self) -> PageType {
        match self {
            Page::DataPage { .. } => PageType::DATA_PAGE,
            Page::DataPageV2 { .. } => PageType::DATA_PAGE_V2,
            Page::DictionaryPage { .. } => PageType::DICTIONARY_PAGE,
        }
    }

    pub fn is_data_page(&self) -> bool {
        !matches!(self, Page::DictionaryPage { .. })
    }

    pub fn buffer(&self) -> &Bytes {
        match self {
            Page::DataPage { buf, .. }
            | Page::DataPageV2 { buf, .. }
            | Page::DictionaryPage { buf, .. } => buf,
        }
    }

    pub fn num_values(&self) -> u32 {
        match self {
            Page::DataPage { num_values, .. }
            | Page::DataPageV2 { num_values, .. }
            | Page::DictionaryPage { num_values, .. } => *num_values,
        }
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            Page::DataPage { encoding, .. }
            | Page::DataPageV2 { encoding, .. }
            | Page::DictionaryPage { encoding, .. } => *encoding,
        }
    }

    pub fn statistics(&self) -> Option<&Statistics> {
        match self {
            Page::DataPage { statistics, .. } | Page::DataPageV2 { statistics, .. } => {
                statistics.as_ref()
            }
            Page::DictionaryPage { .. } => None,
        }
    }
}

/// A page whose body has been through the compressor, paired with the
/// uncompressed size the page header must carry.
#[derive(Clone, Debug)]
pub struct CompressedPage {
    compressed_page: Page,
    uncompressed_size: usize,
}

impl CompressedPage {
    pub fn new(compressed_page: Page, uncompressed_size: usize) -> Self {
        Self {
            compressed_page,
            uncompressed_size,
        }
    }

    pub fn page_type(&self) -> PageType {
        self.compressed_page.page_type()
    }

    pub fn compressed_page(&self) -> &Page {
        &self.compressed_page
    }

    pub fn uncompressed_size(&self) -> usize {
        self.uncompressed_size
    }

    /// Size of the (possibly compressed) page body.
    pub fn compressed_size(&self) -> usize {
        self.compressed_page.buffer().len()
    }

    pub fn num_values(&self) -> u32 {
        self.compressed_page.num_values()
    }

    pub fn encoding(&self) -> Encoding {
        self.compressed_page.encoding()
    }

    pub fn data(&self) -> &[u8] {
        self.compressed_page.buffer()
    }
}

/// Result of writing one page to the sink, used to update column chunk
/// metadata.
#[derive(Debug, Default, Clone)]
pub struct PageWriteSpec {
    pub page_type: Option<PageType>,
    /// Header plus uncompressed body.
    pub uncompressed_size: usize,
    /// Header plus compressed body, as laid out in the file.
    pub compressed_size: usize,
    pub num_values: u32,
    /// File offset of the page header.
    pub offset: u64,
    pub bytes_written: u64,
}

/// Sink for the pages of a single column chunk.
///
/// Page order within a chunk follows write order; a dictionary page, when
/// present, must be written before all data pages.
pub trait PageWriter: Send {
    /// Writes a page and returns where and how large it ended up.
    fn write_page(&mut self, page: CompressedPage) -> Result<PageWriteSpec>;

    /// Flushes the underlying sink.
    fn close(&mut self) -> Result<()>;
}
