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

//! File-level APIs: writer properties, metadata, statistics and the
//! serialized file writers.

pub mod metadata;
pub mod properties;
pub mod record_writer;
pub mod statistics;
pub mod writer;

/// Magic bytes opening and closing a plaintext-footer Parquet file.
pub const PARQUET_MAGIC: [u8; 4] = *b"PAR1";
/// Magic bytes of a file whose footer is encrypted.
pub const PARQUET_MAGIC_ENCRYPTED_FOOTER: [u8; 4] = *b"PARE";
/// Length of the file tail after the footer: 4-byte footer length plus magic.
pub const FOOTER_SIZE: usize = 8;
