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

//! The record ingestion surface.
//!
//! A record is described to the writer as a balanced stream of events:
//! `start_message`, then for each present field `start_field` … `end_field`
//! with either a primitive value or a `start_group`/`end_group` pair (one
//! per instance for repeated fields) in between, then `end_message`. Fields
//! that are absent from a record are simply not mentioned.

use crate::data_type::{ByteArray, Int96};
use crate::errors::Result;

/// One record-building event, for callers that prefer to stream events as
/// values instead of calling [`RecordConsumer`] methods directly.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordEvent {
    StartMessage,
    StartField {
        name: String,
        index: usize,
    },
    EndField,
    StartGroup,
    EndGroup,
    AddBoolean(bool),
    AddInt32(i32),
    AddInt64(i64),
    AddInt96(Int96),
    AddFloat(f32),
    AddDouble(f64),
    /// A BYTE_ARRAY or FIXED_LEN_BYTE_ARRAY value.
    AddBytes(ByteArray),
    EndMessage,
}

/// Receiver of record events. The shredder is the canonical implementation;
/// object-model adapters drive one of these.
pub trait RecordConsumer {
    fn start_message(&mut self) -> Result<()>;

    /// Enters the child field `index` of the current group; `name` must
    /// match the schema.
    fn start_field(&mut self, name: &str, index: usize) -> Result<()>;

    /// Leaves the current field. At least one value or group instance must
    /// have been produced since the matching `start_field`.
    fn end_field(&mut self) -> Result<()>;

    /// Opens one instance of the current group field.
    fn start_group(&mut self) -> Result<()>;

    fn end_group(&mut self) -> Result<()>;

    fn add_boolean(&mut self, value: bool) -> Result<()>;
    fn add_int32(&mut self, value: i32) -> Result<()>;
    fn add_int64(&mut self, value: i64) -> Result<()>;
    fn add_int96(&mut self, value: Int96) -> Result<()>;
    fn add_float(&mut self, value: f32) -> Result<()>;
    fn add_double(&mut self, value: f64) -> Result<()>;
    fn add_bytes(&mut self, value: ByteArray) -> Result<()>;

    fn end_message(&mut self) -> Result<()>;
}

/// Feeds one event into a consumer.
pub fn dispatch<C: RecordConsumer + ?Sized>(consumer: &mut C, event: RecordEvent) -> Result<()> {
    match event {
        RecordEvent::StartMessage => consumer.start_message(),
        RecordEvent::StartField { name, index } => consumer.start_field(&name, index),
        RecordEvent::EndField => consumer.end_field(),
        RecordEvent::StartGroup => consumer.start_group(),
        RecordEvent::EndGroup => consumer.end_group(),
        RecordEvent::AddBoolean(value) => consumer.add_boolean(value),
        RecordEvent::AddInt32(value) => consumer.add_int32(value),
        RecordEvent::AddInt64(value) => consumer.add_int64(value),
        RecordEvent::AddInt96(value) => consumer.add_int96(value),
        RecordEvent::AddFloat(value) => consumer.add_float(value),
        RecordEvent::AddDouble(value) => consumer.add_double(value),
        RecordEvent::AddBytes(value) => consumer.add_bytes(value),
        RecordEvent::EndMessage => consumer.end_message(),
    }
}
