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

//! Key management: the KMS-facing interfaces and envelope encryption of
//! data keys.
//!
//! The crate never talks to a KMS itself; callers register
//! [`KmsClientFactory`](kms::KmsClientFactory) implementations and the
//! writer only sees wrapped key material.

pub mod key_material;
pub mod key_wrapping;
pub mod kms;

use crate::errors::Result;

/// Maps the key metadata stored in a file back to a key.
///
/// Failures surface as
/// [`KeyUnavailable`](crate::errors::EncryptionError::KeyUnavailable).
pub trait KeyRetriever: Send + Sync {
    fn retrieve_key(&self, key_metadata: &[u8]) -> Result<Vec<u8>>;
}
