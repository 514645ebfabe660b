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

//! The KMS client interface and its explicit factory registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::{EncryptionError, Result};

/// Connection parameters handed to a KMS client factory.
#[derive(Debug, Clone, Default)]
pub struct KmsConnectionConfig {
    kms_instance_id: String,
    kms_instance_url: String,
    key_access_token: Option<String>,
    custom_kms_conf: HashMap<String, String>,
}

impl KmsConnectionConfig {
    pub fn new(kms_instance_id: String, kms_instance_url: String) -> Self {
        Self {
            kms_instance_id,
            kms_instance_url,
            key_access_token: None,
            custom_kms_conf: HashMap::new(),
        }
    }

    pub fn with_key_access_token(mut self, token: String) -> Self {
        self.key_access_token = Some(token);
        self
    }

    pub fn with_custom_conf(mut self, key: String, value: String) -> Self {
        self.custom_kms_conf.insert(key, value);
        self
    }

    pub fn kms_instance_id(&self) -> &str {
        &self.kms_instance_id
    }

    pub fn kms_instance_url(&self) -> &str {
        &self.kms_instance_url
    }

    pub fn key_access_token(&self) -> Option<&str> {
        self.key_access_token.as_deref()
    }

    pub fn custom_conf(&self, key: &str) -> Option<&str> {
        self.custom_kms_conf.get(key).map(|s| s.as_str())
    }
}

/// A client of a key management server, able to wrap and unwrap data keys
/// with master keys it holds.
pub trait KmsClient: Send + Sync {
    /// Wraps `key_bytes` with the master key, returning an opaque string.
    fn wrap_key(&self, key_bytes: &[u8], master_key_identifier: &str) -> Result<String>;

    /// Inverse of [`wrap_key`](Self::wrap_key).
    fn unwrap_key(&self, wrapped_key: &str, master_key_identifier: &str) -> Result<Vec<u8>>;
}

impl fmt::Debug for dyn KmsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<dyn KmsClient>")
    }
}

/// Creates KMS clients for a connection configuration.
pub trait KmsClientFactory: Send + Sync {
    fn create_client(&self, config: &KmsConnectionConfig) -> Result<Arc<dyn KmsClient>>;
}

impl<F> KmsClientFactory for F
where
    F: Fn(&KmsConnectionConfig) -> Result<Arc<dyn KmsClient>> + Send + Sync,
{
    fn create_client(&self, config: &KmsConnectionConfig) -> Result<Arc<dyn KmsClient>> {
        self(config)
    }
}

/// Registry of KMS client factories keyed by a short identifier.
///
/// Key material records the identifier of the KMS that wrapped it; readers
/// and writers resolve the factory explicitly through this registry.
#[derive(Default)]
pub struct KmsClientFactoryRegistry {
    factories: HashMap<String, Box<dyn KmsClientFactory>>,
}

impl KmsClientFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `kms_id`, replacing any previous one.
    pub fn register<T: KmsClientFactory + 'static>(&mut self, kms_id: &str, factory: T) {
        self.factories.insert(kms_id.to_owned(), Box::new(factory));
    }

    /// Creates a client through the factory registered for `kms_id`.
    pub fn create_client(
        &self,
        kms_id: &str,
        config: &KmsConnectionConfig,
    ) -> Result<Arc<dyn KmsClient>> {
        let factory = self.factories.get(kms_id).ok_or_else(|| {
            EncryptionError::KeyUnavailable(format!(
                "no KMS client factory registered for '{kms_id}'"
            ))
        })?;
        factory.create_client(config)
    }
}
