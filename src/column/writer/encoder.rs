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

//! The value-encoding half of a column writer: dictionary first, with
//! automatic fallback to the column's configured encoding.

use bytes::Bytes;

use crate::basic::Encoding;
use crate::column::writer::{fallback_encoding, has_dictionary_support};
use crate::data_type::DataType;
use crate::encodings::encoding::dict_encoder::DictEncoder;
use crate::encodings::encoding::{get_encoder, Encoder};
use crate::errors::Result;
use crate::file::properties::{EnabledStatistics, WriterProperties};
use crate::file::statistics::{MinMax, TypedComparator};
use crate::schema::types::ColumnDescPtr;

/// The encoded dictionary page of a column chunk.
pub(crate) struct DictionaryPage {
    pub buf: Bytes,
    pub num_values: usize,
    pub is_sorted: bool,
}

/// The encoded values of one data page, with the span of the page's values.
pub(crate) struct DataPageValues<T> {
    pub buf: Bytes,
    pub encoding: Encoding,
    pub minmax: MinMax<T>,
}

/// Encodes the values of one column chunk.
///
/// While the dictionary is alive, values are interned and pages carry
/// dictionary indices; once [`flush_dict_page`] retires it (at chunk close
/// or on fallback), subsequent values use the fallback encoder.
///
/// [`flush_dict_page`]: Self::flush_dict_page
pub(crate) struct ColumnValueEncoder<T: DataType> {
    encoder: Box<dyn Encoder<T>>,
    dict_encoder: Option<DictEncoder<T>>,
    comparator: TypedComparator<T::T>,
    track_minmax: bool,
    minmax: MinMax<T::T>,
    num_values: usize,
}

impl<T: DataType> ColumnValueEncoder<T> {
    pub fn try_new(descr: &ColumnDescPtr, props: &WriterProperties) -> Result<Self> {
        let dict_supported = props.dictionary_enabled(descr.path())
            && has_dictionary_support(T::get_physical_type(), props);
        let dict_encoder = dict_supported.then(|| DictEncoder::new(descr.clone()));

        let fallback = props
            .encoding(descr.path())
            .unwrap_or_else(|| fallback_encoding(T::get_physical_type(), props));
        let encoder = get_encoder::<T>(fallback)?;

        Ok(Self {
            encoder,
            dict_encoder,
            comparator: TypedComparator::for_column(descr),
            // chunk-level statistics are folded up from these per-page
            // spans, so they are tracked unless statistics are off entirely
            track_minmax: props.statistics_enabled(descr.path()) != EnabledStatistics::None,
            minmax: MinMax::new(),
            num_values: 0,
        })
    }

    /// Appends values to the current page.
    pub fn write(&mut self, values: &[T::T]) -> Result<()> {
        self.num_values += values.len();
        if self.track_minmax {
            self.comparator.observe_all(values, &mut self.minmax);
        }
        match &mut self.dict_encoder {
            Some(dict) => {
                dict.put(values);
                Ok(())
            }
            None => self.encoder.put(values),
        }
    }

    /// Number of values buffered for the current page.
    pub fn num_values(&self) -> usize {
        self.num_values
    }

    /// True while the dictionary is alive.
    pub fn has_dictionary(&self) -> bool {
        self.dict_encoder.is_some()
    }

    /// Current encoded size of the dictionary page, if one is being built.
    pub fn estimated_dict_page_size(&self) -> Option<usize> {
        Some(self.dict_encoder.as_ref()?.dict_encoded_size())
    }

    /// Estimated encoded size of the current page's values.
    pub fn estimated_data_page_size(&self) -> usize {
        match &self.dict_encoder {
            Some(dict) => dict.estimated_data_encoded_size(),
            None => self.encoder.estimated_data_encoded_size(),
        }
    }

    pub fn estimated_memory_size(&self) -> usize {
        let dict = self
            .dict_encoder
            .as_ref()
            .map(|d| d.estimated_memory_size())
            .unwrap_or(0);
        dict + self.encoder.estimated_memory_size()
    }

    /// Retires the dictionary and returns its page. Must not be called with
    /// values still buffered for a data page.
    pub fn flush_dict_page(&mut self) -> Result<Option<DictionaryPage>> {
        match self.dict_encoder.take() {
            Some(dict) => {
                if self.num_values != 0 {
                    return Err(state_err!(
                        "all data pages must be flushed before the dictionary page"
                    ));
                }
                let buf = dict.write_dict()?;
                Ok(Some(DictionaryPage {
                    buf,
                    num_values: dict.num_entries(),
                    // insertion order is not sorted order
                    is_sorted: false,
                }))
            }
            None => Ok(None),
        }
    }

    /// Takes the encoded values of the current page.
    pub fn flush_data_page(&mut self) -> Result<DataPageValues<T::T>> {
        let (buf, encoding) = match &mut self.dict_encoder {
            Some(dict) => (dict.write_indices()?, Encoding::RLE_DICTIONARY),
            None => (self.encoder.flush_buffer()?, self.encoder.encoding()),
        };

        self.num_values = 0;
        Ok(DataPageValues {
            buf,
            encoding,
            minmax: self.minmax.take(),
        })
    }
}
