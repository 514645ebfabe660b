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

//! The envelope-encryption key material JSON.
//!
//! Key material describes a wrapped data encryption key and how to unwrap
//! it. It is stored either inline in a file's `key_metadata` fields
//! (internal storage) or externally, in which case the `key_metadata` holds
//! only a reference that is resolved out-of-band.

use serde::{Deserialize, Serialize};

use crate::errors::{EncryptionError, Result};

/// The only key material format currently defined.
pub const KEY_MATERIAL_TYPE: &str = "PKMT1";

/// A wrapped data encryption key and the metadata needed to unwrap it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMaterial {
    /// Format tag; always [`KEY_MATERIAL_TYPE`].
    #[serde(rename = "keyMaterialType")]
    pub key_material_type: String,

    /// Whether this JSON is stored inline in the file, or externally.
    #[serde(rename = "internalStorage")]
    pub internal_storage: bool,

    /// For external storage, the reference to the key material.
    #[serde(rename = "keyReference", skip_serializing_if = "Option::is_none")]
    pub key_reference: Option<String>,

    /// Whether the material belongs to the footer key.
    #[serde(rename = "isFooterKey")]
    pub is_footer_key: bool,

    /// KMS instance id; recorded for footer key material only.
    #[serde(rename = "kmsInstanceID", skip_serializing_if = "Option::is_none")]
    pub kms_instance_id: Option<String>,

    /// KMS instance URL; recorded for footer key material only.
    #[serde(rename = "kmsInstanceURL", skip_serializing_if = "Option::is_none")]
    pub kms_instance_url: Option<String>,

    /// Identifier of the master key that wrapped the data key.
    #[serde(rename = "masterKeyID")]
    pub master_key_id: String,

    /// The wrapped data encryption key.
    #[serde(rename = "wrappedDEK")]
    pub wrapped_dek: String,

    /// Whether the data key was wrapped with an intermediate key encryption
    /// key rather than directly with the master key.
    #[serde(rename = "doubleWrapping")]
    pub double_wrapping: bool,

    /// Identifier of the key encryption key, in double wrapping mode.
    #[serde(rename = "keyEncryptionKeyID", skip_serializing_if = "Option::is_none")]
    pub key_encryption_key_id: Option<String>,

    /// The wrapped key encryption key, in double wrapping mode.
    #[serde(rename = "wrappedKEK", skip_serializing_if = "Option::is_none")]
    pub wrapped_kek: Option<String>,
}

impl KeyMaterial {
    /// Material for a footer key, which records the KMS coordinates so a
    /// reader can reach the right server.
    pub fn for_footer_key(
        kms_instance_id: String,
        kms_instance_url: String,
        master_key_id: String,
        wrapped_dek: String,
    ) -> Self {
        Self {
            key_material_type: KEY_MATERIAL_TYPE.to_owned(),
            internal_storage: true,
            key_reference: None,
            is_footer_key: true,
            kms_instance_id: Some(kms_instance_id),
            kms_instance_url: Some(kms_instance_url),
            master_key_id,
            wrapped_dek,
            double_wrapping: false,
            key_encryption_key_id: None,
            wrapped_kek: None,
        }
    }

    /// Material for a column key.
    pub fn for_column_key(master_key_id: String, wrapped_dek: String) -> Self {
        Self {
            key_material_type: KEY_MATERIAL_TYPE.to_owned(),
            internal_storage: true,
            key_reference: None,
            is_footer_key: false,
            kms_instance_id: None,
            kms_instance_url: None,
            master_key_id,
            wrapped_dek,
            double_wrapping: false,
            key_encryption_key_id: None,
            wrapped_kek: None,
        }
    }

    /// Serializes to the JSON stored in `key_metadata`.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| internal_err!("failed to serialize key material: {}", e))
    }

    /// Parses key material from `key_metadata` bytes.
    pub fn parse(key_metadata: &[u8]) -> Result<Self> {
        let material: KeyMaterial = serde_json::from_slice(key_metadata).map_err(|e| {
            EncryptionError::KeyUnavailable(format!("malformed key material: {e}"))
        })?;
        if material.key_material_type != KEY_MATERIAL_TYPE {
            return Err(EncryptionError::KeyUnavailable(format!(
                "unsupported key material type '{}'",
                material.key_material_type
            ))
            .into());
        }
        Ok(material)
    }
}

/// The inline stand-in stored in the file when key material lives in an
/// external store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyReference {
    #[serde(rename = "keyReference")]
    pub key_reference: String,
}

impl KeyReference {
    pub fn new(key_reference: String) -> Self {
        Self { key_reference }
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| internal_err!("failed to serialize key reference: {}", e))
    }

    pub fn parse(key_metadata: &[u8]) -> Result<Self> {
        serde_json::from_slice(key_metadata).map_err(|e| {
            EncryptionError::KeyUnavailable(format!("malformed key reference: {e}")).into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_footer_material_roundtrip() {
        let material = KeyMaterial::for_footer_key(
            "kms1".to_owned(),
            "https://kms.example".to_owned(),
            "master-key-7".to_owned(),
            "d3JhcHBlZA==".to_owned(),
        );
        let bytes = material.serialize().unwrap();
        let parsed = KeyMaterial::parse(&bytes).unwrap();
        assert_eq!(parsed, material);
        assert!(parsed.is_footer_key);
        assert!(parsed.internal_storage);
    }

    #[test]
    fn test_column_material_omits_kms_coordinates() {
        let material =
            KeyMaterial::for_column_key("master-key-9".to_owned(), "enc".to_owned());
        let json = String::from_utf8(material.serialize().unwrap()).unwrap();
        assert!(json.contains("\"keyMaterialType\":\"PKMT1\""));
        assert!(!json.contains("kmsInstanceID"));
        assert!(!json.contains("doubleWrapping\":true"));
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        let err = KeyMaterial::parse(
            br#"{"keyMaterialType":"PKMT9","internalStorage":true,"isFooterKey":false,"masterKeyID":"m","wrappedDEK":"w","doubleWrapping":false}"#,
        )
        .unwrap_err();
        assert!(err
            .to_string()
            .contains("unsupported key material type 'PKMT9'"));
    }

    #[test]
    fn test_key_reference_roundtrip() {
        let reference = KeyReference::new("vault://tenant/file-17".to_owned());
        let bytes = reference.serialize().unwrap();
        assert_eq!(KeyReference::parse(&bytes).unwrap(), reference);
    }
}
