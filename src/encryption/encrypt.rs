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

//! File encryption configuration and the per-file encryptor.

use std::collections::HashMap;

use ring::rand::{SecureRandom, SystemRandom};

use crate::encryption::ciphers::{BlockEncryptor, CtrBlockEncryptor, GcmBlockEncryptor};
use crate::encryption::modules::{create_module_aad, ModuleType};
use crate::encryption::page_encryptor::PageEncryptor;
use crate::errors::{EncryptionError, Result};
use crate::format;
use crate::schema::types::ColumnPath;
use crate::thrift::{CompactProtocolWriter, WriteThrift};

/// The two file encryption algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptionAlgorithm {
    /// All modules AES-GCM authenticated.
    #[default]
    AesGcmV1,
    /// Footer and metadata modules AES-GCM; page and page header modules
    /// AES-CTR without authentication.
    AesGcmCtrV1,
}

/// A key and the metadata readers use to retrieve it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionKey {
    key: Vec<u8>,
    key_metadata: Option<Vec<u8>>,
}

impl EncryptionKey {
    pub fn new(key: Vec<u8>) -> Self {
        Self {
            key,
            key_metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Vec<u8>) -> Self {
        self.key_metadata = Some(metadata);
        self
    }

    pub(crate) fn key(&self) -> &[u8] {
        &self.key
    }

    pub(crate) fn metadata(&self) -> Option<&Vec<u8>> {
        self.key_metadata.as_ref()
    }
}

/// How a file is to be encrypted: footer mode, algorithm, keys, and AAD
/// handling. Reusable across files; the random file AAD suffix is drawn per
/// file by [`FileEncryptor`].
#[derive(Debug, Clone, PartialEq)]
pub struct FileEncryptionProperties {
    encrypt_footer: bool,
    algorithm: EncryptionAlgorithm,
    footer_key: EncryptionKey,
    column_keys: HashMap<ColumnPath, EncryptionKey>,
    aad_prefix: Option<Vec<u8>>,
    store_aad_prefix: bool,
}

impl FileEncryptionProperties {
    /// Builder with the given footer key (16 or 32 bytes).
    pub fn builder(footer_key: Vec<u8>) -> EncryptionPropertiesBuilder {
        EncryptionPropertiesBuilder::new(footer_key)
    }

    /// Whether the footer itself is encrypted (`PARE` files), as opposed to
    /// the legacy-compatible plaintext footer mode.
    pub fn encrypt_footer(&self) -> bool {
        self.encrypt_footer
    }

    pub fn algorithm(&self) -> EncryptionAlgorithm {
        self.algorithm
    }

    /// When no per-column keys are configured, every column is encrypted
    /// uniformly with the footer key.
    pub fn is_uniform(&self) -> bool {
        self.column_keys.is_empty()
    }

    pub fn aad_prefix(&self) -> Option<&Vec<u8>> {
        self.aad_prefix.as_ref()
    }

    fn column_key(&self, path: &ColumnPath) -> Option<&EncryptionKey> {
        if self.is_uniform() {
            Some(&self.footer_key)
        } else {
            self.column_keys.get(path)
        }
    }
}

/// Builder for [`FileEncryptionProperties`].
pub struct EncryptionPropertiesBuilder {
    encrypt_footer: bool,
    algorithm: EncryptionAlgorithm,
    footer_key: EncryptionKey,
    column_keys: HashMap<ColumnPath, EncryptionKey>,
    aad_prefix: Option<Vec<u8>>,
    store_aad_prefix: bool,
}

impl EncryptionPropertiesBuilder {
    fn new(footer_key: Vec<u8>) -> Self {
        Self {
            encrypt_footer: true,
            algorithm: EncryptionAlgorithm::default(),
            footer_key: EncryptionKey::new(footer_key),
            column_keys: HashMap::new(),
            aad_prefix: None,
            store_aad_prefix: true,
        }
    }

    /// Leaves the footer in clear for legacy readers; configured columns
    /// are still encrypted and the footer carries a signature.
    pub fn with_plaintext_footer(mut self, plaintext_footer: bool) -> Self {
        self.encrypt_footer = !plaintext_footer;
        self
    }

    pub fn with_algorithm(mut self, algorithm: EncryptionAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_footer_key_metadata(mut self, metadata: Vec<u8>) -> Self {
        self.footer_key = self.footer_key.with_metadata(metadata);
        self
    }

    /// Encrypts one column with its own key. When any column key is set,
    /// columns without one are written in plaintext.
    pub fn with_column_key(mut self, path: ColumnPath, key: EncryptionKey) -> Self {
        self.column_keys.insert(path, key);
        self
    }

    /// AAD prefix binding the file to its context (e.g. its intended
    /// path).
    pub fn with_aad_prefix(mut self, aad_prefix: Vec<u8>) -> Self {
        self.aad_prefix = Some(aad_prefix);
        self
    }

    /// Whether the AAD prefix is persisted in the footer, or must be
    /// supplied by readers out-of-band.
    pub fn with_aad_prefix_storage(mut self, store_aad_prefix: bool) -> Self {
        self.store_aad_prefix = store_aad_prefix;
        self
    }

    pub fn build(self) -> Result<FileEncryptionProperties> {
        for key in std::iter::once(&self.footer_key).chain(self.column_keys.values()) {
            if key.key().len() != 16 && key.key().len() != 32 {
                return Err(EncryptionError::AlgorithmMismatch(format!(
                    "AES keys must be 16 or 32 bytes, got {}",
                    key.key().len()
                ))
                .into());
            }
        }
        Ok(FileEncryptionProperties {
            encrypt_footer: self.encrypt_footer,
            algorithm: self.algorithm,
            footer_key: self.footer_key,
            column_keys: self.column_keys,
            aad_prefix: self.aad_prefix,
            store_aad_prefix: self.store_aad_prefix,
        })
    }
}

/// Per-file encryption state: the properties plus this file's unique AAD.
#[derive(Debug)]
pub struct FileEncryptor {
    properties: FileEncryptionProperties,
    aad_file_unique: Vec<u8>,
    file_aad: Vec<u8>,
}

impl FileEncryptor {
    pub(crate) fn new(properties: FileEncryptionProperties) -> Result<Self> {
        let rng = SystemRandom::new();
        let mut aad_file_unique = vec![0u8; 8];
        rng.fill(&mut aad_file_unique)
            .map_err(|_| internal_err!("the system random source failed"))?;

        let file_aad = match properties.aad_prefix() {
            Some(prefix) => [prefix.as_slice(), &aad_file_unique].concat(),
            None => aad_file_unique.clone(),
        };
        Ok(Self {
            properties,
            aad_file_unique,
            file_aad,
        })
    }

    pub(crate) fn encrypt_footer(&self) -> bool {
        self.properties.encrypt_footer()
    }

    /// The AAD every module AAD is derived from: prefix (when any) plus the
    /// file-unique suffix.
    pub(crate) fn file_aad(&self) -> &[u8] {
        &self.file_aad
    }

    pub(crate) fn footer_key_metadata(&self) -> Option<&Vec<u8>> {
        self.properties.footer_key.metadata()
    }

    /// The footer's cipher; always GCM, in both algorithms.
    pub(crate) fn footer_encryptor(&self) -> Result<GcmBlockEncryptor> {
        GcmBlockEncryptor::new(self.properties.footer_key.key())
    }

    /// The page-module cipher for one column, or `None` when that column is
    /// written in plaintext.
    pub(crate) fn page_encryptor(
        &self,
        row_group_ordinal: usize,
        column_ordinal: usize,
        column_path: &ColumnPath,
    ) -> Result<Option<PageEncryptor>> {
        let Some(key) = self.properties.column_key(column_path) else {
            return Ok(None);
        };
        let encryptor: Box<dyn BlockEncryptor> = match self.properties.algorithm() {
            EncryptionAlgorithm::AesGcmV1 => Box::new(GcmBlockEncryptor::new(key.key())?),
            EncryptionAlgorithm::AesGcmCtrV1 => Box::new(CtrBlockEncryptor::new(key.key())?),
        };
        Ok(Some(PageEncryptor::new(
            encryptor,
            self.file_aad.clone(),
            row_group_ordinal,
            column_ordinal,
        )))
    }

    /// The crypto metadata recorded for one column chunk, or `None` when
    /// the column is in plaintext.
    pub(crate) fn column_crypto_metadata(
        &self,
        column_path: &ColumnPath,
    ) -> Option<format::ColumnCryptoMetaData> {
        if self.properties.is_uniform() {
            return Some(format::ColumnCryptoMetaData::ENCRYPTION_WITH_FOOTER_KEY);
        }
        let key = self.properties.column_keys.get(column_path)?;
        Some(format::ColumnCryptoMetaData::ENCRYPTION_WITH_COLUMN_KEY(
            format::EncryptionWithColumnKey {
                path_in_schema: column_path.parts().to_vec(),
                key_metadata: key.metadata().cloned(),
            },
        ))
    }

    /// The algorithm description persisted in the footer or crypto
    /// preamble.
    pub(crate) fn encryption_algorithm(&self) -> format::EncryptionAlgorithm {
        let store_prefix = self.properties.store_aad_prefix;
        let aad_prefix = self
            .properties
            .aad_prefix()
            .filter(|_| store_prefix)
            .cloned();
        let supply_aad_prefix = self.properties.aad_prefix().map(|_| !store_prefix);
        let aad_file_unique = Some(self.aad_file_unique.clone());
        match self.properties.algorithm() {
            EncryptionAlgorithm::AesGcmV1 => {
                format::EncryptionAlgorithm::AES_GCM_V1(format::AesGcmV1 {
                    aad_prefix,
                    aad_file_unique,
                    supply_aad_prefix,
                })
            }
            EncryptionAlgorithm::AesGcmCtrV1 => {
                format::EncryptionAlgorithm::AES_GCM_CTR_V1(format::AesGcmCtrV1 {
                    aad_prefix,
                    aad_file_unique,
                    supply_aad_prefix,
                })
            }
        }
    }

    /// The plaintext preamble written before an encrypted footer.
    pub(crate) fn file_crypto_metadata(&self) -> Result<format::FileCryptoMetaData> {
        Ok(format::FileCryptoMetaData {
            encryption_algorithm: self.encryption_algorithm(),
            key_metadata: self.footer_key_metadata().cloned(),
        })
    }

    /// Replaces the plaintext metadata of column chunks that carry their
    /// own key with an encrypted copy.
    pub(crate) fn encrypt_row_group_metadata(
        &self,
        row_group: &mut format::RowGroup,
        row_group_ordinal: usize,
    ) -> Result<()> {
        for (column_ordinal, chunk) in row_group.columns.iter_mut().enumerate() {
            let Some(format::ColumnCryptoMetaData::ENCRYPTION_WITH_COLUMN_KEY(column_key)) =
                &chunk.crypto_metadata
            else {
                // either plaintext, or uniformly covered by the footer key
                continue;
            };
            let path = ColumnPath::new(column_key.path_in_schema.clone());
            let key = self
                .properties
                .column_keys
                .get(&path)
                .ok_or_else(|| EncryptionError::KeyUnavailable(path.string()))?;
            let meta_data = chunk
                .meta_data
                .take()
                .ok_or_else(|| internal_err!("column metadata was already taken"))?;

            let aad = create_module_aad(
                self.file_aad(),
                ModuleType::ColumnMetaData,
                row_group_ordinal,
                column_ordinal,
                None,
            )?;
            // column metadata is authenticated in both algorithms
            let encryptor = GcmBlockEncryptor::new(key.key())?;
            let mut plaintext = Vec::new();
            meta_data.write_thrift(&mut CompactProtocolWriter::new(&mut plaintext))?;
            chunk.encrypted_column_metadata = Some(frame_ciphertext(
                encryptor.encrypt(&plaintext, &aad)?,
            ));
        }
        Ok(())
    }
}

/// Prepends the little-endian length that frames encrypted buffers in the
/// file.
pub(crate) fn frame_ciphertext(ciphertext: Vec<u8>) -> Vec<u8> {
    let mut framed = Vec::with_capacity(4 + ciphertext.len());
    framed.extend_from_slice(&(ciphertext.len() as u32).to_le_bytes());
    framed.extend_from_slice(&ciphertext);
    framed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::ciphers::{BlockDecryptor, GcmBlockDecryptor};
    use crate::encryption::modules::create_footer_aad;

    #[test]
    fn test_builder_validates_key_length() {
        assert!(FileEncryptionProperties::builder(vec![0u8; 16]).build().is_ok());
        assert!(FileEncryptionProperties::builder(vec![0u8; 32]).build().is_ok());
        assert!(FileEncryptionProperties::builder(vec![0u8; 20]).build().is_err());
        assert!(FileEncryptionProperties::builder(vec![0u8; 16])
            .with_column_key(
                ColumnPath::from("a"),
                EncryptionKey::new(vec![0u8; 5])
            )
            .build()
            .is_err());
    }

    #[test]
    fn test_uniform_vs_column_keys() {
        let uniform = FileEncryptionProperties::builder(vec![0u8; 16]).build().unwrap();
        assert!(uniform.is_uniform());
        assert!(uniform.column_key(&ColumnPath::from("x")).is_some());

        let per_column = FileEncryptionProperties::builder(vec![0u8; 16])
            .with_column_key(ColumnPath::from("a.b"), EncryptionKey::new(vec![1u8; 16]))
            .build()
            .unwrap();
        assert!(!per_column.is_uniform());
        assert!(per_column.column_key(&ColumnPath::from("a.b")).is_some());
        assert!(per_column.column_key(&ColumnPath::from("x")).is_none());
    }

    #[test]
    fn test_file_aad_includes_prefix() {
        let props = FileEncryptionProperties::builder(vec![0u8; 16])
            .with_aad_prefix(b"my-file".to_vec())
            .build()
            .unwrap();
        let encryptor = FileEncryptor::new(props).unwrap();
        assert!(encryptor.file_aad().starts_with(b"my-file"));
        assert_eq!(encryptor.file_aad().len(), 7 + 8);
    }

    #[test]
    fn test_footer_encryption_roundtrip() {
        let key = vec![9u8; 16];
        let props = FileEncryptionProperties::builder(key.clone()).build().unwrap();
        let encryptor = FileEncryptor::new(props).unwrap();

        let aad = create_footer_aad(encryptor.file_aad()).unwrap();
        let ciphertext = encryptor
            .footer_encryptor()
            .unwrap()
            .encrypt(b"footer", &aad)
            .unwrap();
        let decryptor = GcmBlockDecryptor::new(&key).unwrap();
        assert_eq!(decryptor.decrypt(&ciphertext, &aad).unwrap(), b"footer");
    }

    #[test]
    fn test_algorithm_metadata() {
        let props = FileEncryptionProperties::builder(vec![0u8; 16])
            .with_aad_prefix(b"p".to_vec())
            .with_aad_prefix_storage(false)
            .with_algorithm(EncryptionAlgorithm::AesGcmCtrV1)
            .build()
            .unwrap();
        let encryptor = FileEncryptor::new(props).unwrap();
        match encryptor.encryption_algorithm() {
            format::EncryptionAlgorithm::AES_GCM_CTR_V1(algo) => {
                assert_eq!(algo.aad_prefix, None);
                assert_eq!(algo.supply_aad_prefix, Some(true));
                assert_eq!(algo.aad_file_unique.unwrap().len(), 8);
            }
            other => panic!("unexpected algorithm {other:?}"),
        }
    }
}
