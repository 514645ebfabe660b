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

//! `parquetry` is the write path of an [Apache Parquet] encoder.
//!
//! The crate ingests record-shaped input conforming to a schema and produces a
//! byte-exact Parquet file: nested records are shredded into flat column
//! streams with Dremel repetition/definition levels, values are encoded
//! (dictionary encoding with automatic fallback, PLAIN, the DELTA_* family),
//! pages are assembled with optional compression, CRC and modular AES
//! encryption, and the file is finished with a Thrift-compact footer carrying
//! per-column statistics.
//!
//! # Writing records
//!
//! The highest level entry point is [`file::record_writer::RecordFileWriter`],
//! which drives the full pipeline: a [`record::RecordConsumer`] event stream is
//! shredded into per-column ⟨repetition, definition, value⟩ triples, buffered
//! into pages, and flushed into row groups whenever the configured memory
//! threshold is approached.
//!
//! # Writing columns
//!
//! Workloads that already have flat column data can skip the shredder and use
//! [`file::writer::SerializedFileWriter`] together with the typed column
//! writers in [`column::writer`], mirroring the layering of the file format
//! itself: values → pages → column chunks → row groups → file.
//!
//! [Apache Parquet]: https://parquet.apache.org/

#[macro_use]
pub mod errors;

#[macro_use]
mod thrift;

pub mod basic;
pub(crate) mod format;

#[macro_use]
pub mod data_type;

mod util;

pub mod column;
pub mod compression;
pub(crate) mod encodings;
pub mod encryption;
pub mod file;
pub mod record;
pub mod schema;
