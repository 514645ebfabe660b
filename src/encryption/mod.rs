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

//! Parquet modular encryption, write side.
//!
//! A file is encrypted module by module (footer, column metadata, pages
//! and page headers), each with an AAD binding the ciphertext to its exact
//! position in the file, so modules cannot be swapped or replayed across
//! files undetected.

pub(crate) mod ciphers;
pub mod encrypt;
pub mod key_management;
pub(crate) mod modules;
pub(crate) mod page_encryptor;
