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

//! Wrapping of randomly generated data encryption keys through a KMS, and
//! the matching [`KeyRetriever`] that unwraps them again.

use std::sync::Arc;

use ring::rand::{SecureRandom, SystemRandom};

use crate::encryption::encrypt::EncryptionKey;
use crate::encryption::key_management::key_material::KeyMaterial;
use crate::encryption::key_management::kms::{KmsClient, KmsConnectionConfig};
use crate::encryption::key_management::KeyRetriever;
use crate::errors::{EncryptionError, Result};

/// Generates a random 128-bit data encryption key.
pub fn generate_data_key() -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let mut key = vec![0u8; 16];
    rng.fill(&mut key)
        .map_err(|_| internal_err!("the system random source failed"))?;
    Ok(key)
}

/// Wraps data encryption keys with master keys held by a KMS, producing
/// the key metadata stored in the file.
pub struct KeyWrapper {
    kms: Arc<dyn KmsClient>,
    config: KmsConnectionConfig,
}

impl KeyWrapper {
    pub fn new(kms: Arc<dyn KmsClient>, config: KmsConnectionConfig) -> Self {
        Self { kms, config }
    }

    /// Generates a fresh data key wrapped with `master_key_id`, ready to be
    /// used as the footer or a column key.
    pub fn generate_wrapped_key(
        &self,
        master_key_id: &str,
        is_footer_key: bool,
    ) -> Result<EncryptionKey> {
        let dek = generate_data_key()?;
        let wrapped = self.kms.wrap_key(&dek, master_key_id)?;
        let material = if is_footer_key {
            KeyMaterial::for_footer_key(
                self.config.kms_instance_id().to_owned(),
                self.config.kms_instance_url().to_owned(),
                master_key_id.to_owned(),
                wrapped,
            )
        } else {
            KeyMaterial::for_column_key(master_key_id.to_owned(), wrapped)
        };
        Ok(EncryptionKey::new(dek).with_metadata(material.serialize()?))
    }
}

/// Unwraps keys from inline key material through a KMS.
pub struct KeyUnwrapper {
    kms: Arc<dyn KmsClient>,
}

impl KeyUnwrapper {
    pub fn new(kms: Arc<dyn KmsClient>) -> Self {
        Self { kms }
    }
}

impl KeyRetriever for KeyUnwrapper {
    fn retrieve_key(&self, key_metadata: &[u8]) -> Result<Vec<u8>> {
        let material = KeyMaterial::parse(key_metadata)?;
        if !material.internal_storage {
            let reference = material.key_reference.unwrap_or_default();
            return Err(EncryptionError::KeyUnavailable(format!(
                "key material is stored externally under '{reference}' and must be resolved by the caller"
            ))
            .into());
        }
        if material.double_wrapping {
            return Err(nyi_err!("double-wrapped key material is not supported"));
        }
        self.kms
            .unwrap_key(&material.wrapped_dek, &material.master_key_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::key_management::kms::tests::LocalWrapKms;
    use std::collections::HashMap;

    fn local_kms() -> Arc<dyn KmsClient> {
        let mut keys = HashMap::new();
        keys.insert("footer-master".to_owned(), vec![11u8; 16]);
        keys.insert("column-master".to_owned(), vec![22u8; 16]);
        Arc::new(LocalWrapKms::new(keys))
    }

    #[test]
    fn test_wrap_then_retrieve() {
        let kms = local_kms();
        let config = KmsConnectionConfig::new("inst".to_owned(), "url".to_owned());
        let wrapper = KeyWrapper::new(kms.clone(), config);

        let footer_key = wrapper.generate_wrapped_key("footer-master", true).unwrap();
        let column_key = wrapper
            .generate_wrapped_key("column-master", false)
            .unwrap();

        let retriever = KeyUnwrapper::new(kms);
        let unwrapped = retriever
            .retrieve_key(footer_key.metadata().unwrap())
            .unwrap();
        assert_eq!(unwrapped, footer_key.key());

        let unwrapped = retriever
            .retrieve_key(column_key.metadata().unwrap())
            .unwrap();
        assert_eq!(unwrapped, column_key.key());
    }

    #[test]
    fn test_missing_master_key_is_unavailable() {
        let kms = local_kms();
        let config = KmsConnectionConfig::new("inst".to_owned(), "url".to_owned());
        let wrapper = KeyWrapper::new(kms.clone(), config);
        let key = wrapper.generate_wrapped_key("footer-master", true).unwrap();

        // a KMS that lost the master key cannot serve the file
        let empty_kms: Arc<dyn KmsClient> = Arc::new(LocalWrapKms::new(HashMap::new()));
        let retriever = KeyUnwrapper::new(empty_kms);
        let err = retriever.retrieve_key(key.metadata().unwrap()).unwrap_err();
        assert!(err.to_string().contains("key unavailable"));
    }

    #[test]
    fn test_external_material_is_not_resolved_inline() {
        let mut material =
            KeyMaterial::for_column_key("column-master".to_owned(), "w".to_owned());
        material.internal_storage = false;
        material.key_reference = Some("store://ref-1".to_owned());
        let bytes = material.serialize().unwrap();

        let retriever = KeyUnwrapper::new(local_kms());
        let err = retriever.retrieve_key(&bytes).unwrap_err();
        assert!(err.to_string().contains("store://ref-1"));
    }
}
