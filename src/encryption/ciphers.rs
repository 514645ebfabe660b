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

//! Block ciphers for module encryption.
//!
//! Encrypted buffers are laid out `nonce(12) ‖ ciphertext ‖ tag(16)`; the
//! CTR mode used by AES_GCM_CTR_V1 page modules carries no tag. Decryptors
//! exist so the unit tests can prove the idempotence property and that a
//! wrong key or AAD is rejected without revealing plaintext.

use std::fmt::Debug;

use aes::cipher::{KeyIvInit, StreamCipher};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_128_GCM, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};

use crate::errors::{EncryptionError, Result};

pub(crate) const NONCE_LEN: usize = 12;
pub(crate) const TAG_LEN: usize = 16;
/// Length of the little-endian size prefix framing encrypted buffers in the
/// file.
pub(crate) const SIZE_LEN: usize = 4;

/// CTR mode runs the 12-byte nonce with a 32-bit big-endian counter
/// starting at 1.
const CTR_IV_LEN: usize = 16;

type Aes128Ctr = ctr::Ctr32BE<aes::Aes128>;
type Aes256Ctr = ctr::Ctr32BE<aes::Aes256>;

/// Encrypts one buffer per call, producing `nonce ‖ body [‖ tag]`.
pub(crate) trait BlockEncryptor: Debug + Send + Sync {
    fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>>;
}

/// Inverse of [`BlockEncryptor`]; test and verification side.
pub(crate) trait BlockDecryptor: Debug + Send + Sync {
    fn decrypt(&self, nonce_and_ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>>;
}

fn gcm_key(key_bytes: &[u8]) -> Result<LessSafeKey> {
    let algorithm = match key_bytes.len() {
        16 => &AES_128_GCM,
        32 => &AES_256_GCM,
        other => {
            return Err(EncryptionError::AlgorithmMismatch(format!(
                "AES keys must be 16 or 32 bytes, got {other}"
            ))
            .into())
        }
    };
    let key = UnboundKey::new(algorithm, key_bytes)
        .map_err(|_| internal_err!("failed to build AES-GCM key"))?;
    Ok(LessSafeKey::new(key))
}

fn random_nonce(rng: &SystemRandom) -> Result<[u8; NONCE_LEN]> {
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill(&mut nonce)
        .map_err(|_| internal_err!("the system random source failed"))?;
    Ok(nonce)
}

/// AES-GCM: authenticated, used for footers, metadata, and all modules of
/// AES_GCM_V1 files.
pub(crate) struct GcmBlockEncryptor {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl Debug for GcmBlockEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcmBlockEncryptor").finish_non_exhaustive()
    }
}

impl GcmBlockEncryptor {
    pub(crate) fn new(key_bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            key: gcm_key(key_bytes)?,
            rng: SystemRandom::new(),
        })
    }

    /// Authenticates `plaintext` without storing the ciphertext: the
    /// signature of a plaintext footer is its nonce and GCM tag.
    pub(crate) fn sign(
        &self,
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<([u8; NONCE_LEN], [u8; TAG_LEN])> {
        let nonce = random_nonce(&self.rng)?;
        let mut in_out = plaintext.to_vec();
        let tag = self
            .key
            .seal_in_place_separate_tag(
                Nonce::assume_unique_for_key(nonce),
                Aad::from(aad),
                &mut in_out,
            )
            .map_err(|_| internal_err!("AES-GCM sealing failed"))?;
        let mut tag_bytes = [0u8; TAG_LEN];
        tag_bytes.copy_from_slice(tag.as_ref());
        Ok((nonce, tag_bytes))
    }
}

impl BlockEncryptor for GcmBlockEncryptor {
    fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let nonce = random_nonce(&self.rng)?;
        let mut in_out = plaintext.to_vec();
        let tag = self
            .key
            .seal_in_place_separate_tag(
                Nonce::assume_unique_for_key(nonce),
                Aad::from(aad),
                &mut in_out,
            )
            .map_err(|_| internal_err!("AES-GCM sealing failed"))?;

        let mut out = Vec::with_capacity(NONCE_LEN + in_out.len() + TAG_LEN);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&in_out);
        out.extend_from_slice(tag.as_ref());
        Ok(out)
    }
}

/// Recomputes the GCM tag of a signed plaintext (e.g. a plaintext footer)
/// under the recorded nonce, for signature verification.
pub(crate) fn compute_plaintext_tag(
    key_bytes: &[u8],
    nonce: [u8; NONCE_LEN],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<[u8; TAG_LEN]> {
    let key = gcm_key(key_bytes)?;
    let mut in_out = plaintext.to_vec();
    let tag = key
        .seal_in_place_separate_tag(
            Nonce::assume_unique_for_key(nonce),
            Aad::from(aad),
            &mut in_out,
        )
        .map_err(|_| internal_err!("AES-GCM sealing failed"))?;
    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_ref());
    Ok(tag_bytes)
}

/// AES-GCM decryption; fails with `TagMismatch` on any tampering of
/// ciphertext, tag, or AAD.
pub(crate) struct GcmBlockDecryptor {
    key: LessSafeKey,
}

impl Debug for GcmBlockDecryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcmBlockDecryptor").finish_non_exhaustive()
    }
}

impl GcmBlockDecryptor {
    pub(crate) fn new(key_bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            key: gcm_key(key_bytes)?,
        })
    }
}

impl BlockDecryptor for GcmBlockDecryptor {
    fn decrypt(&self, nonce_and_ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        if nonce_and_ciphertext.len() < NONCE_LEN + TAG_LEN {
            return Err(EncryptionError::TagMismatch.into());
        }
        let nonce = Nonce::try_assume_unique_for_key(&nonce_and_ciphertext[..NONCE_LEN])
            .map_err(|_| EncryptionError::TagMismatch)?;
        let mut in_out = nonce_and_ciphertext[NONCE_LEN..].to_vec();
        let plaintext_len = self
            .key
            .open_in_place(nonce, Aad::from(aad), &mut in_out)
            .map_err(|_| EncryptionError::TagMismatch)?
            .len();
        in_out.truncate(plaintext_len);
        Ok(in_out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CtrKeySize {
    Aes128,
    Aes256,
}

/// AES-CTR: unauthenticated stream mode for the page and page-header
/// modules of AES_GCM_CTR_V1 files.
#[derive(Debug)]
pub(crate) struct CtrBlockEncryptor {
    key: Vec<u8>,
    key_size: CtrKeySize,
    rng: SystemRandom,
}

impl CtrBlockEncryptor {
    pub(crate) fn new(key_bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            key_size: ctr_key_size(key_bytes)?,
            key: key_bytes.to_vec(),
            rng: SystemRandom::new(),
        })
    }
}

fn ctr_key_size(key_bytes: &[u8]) -> Result<CtrKeySize> {
    match key_bytes.len() {
        16 => Ok(CtrKeySize::Aes128),
        32 => Ok(CtrKeySize::Aes256),
        other => Err(EncryptionError::AlgorithmMismatch(format!(
            "AES keys must be 16 or 32 bytes, got {other}"
        ))
        .into()),
    }
}

fn apply_ctr_keystream(
    key: &[u8],
    key_size: CtrKeySize,
    nonce: &[u8; NONCE_LEN],
    buf: &mut [u8],
) -> Result<()> {
    let mut iv = [0u8; CTR_IV_LEN];
    iv[..NONCE_LEN].copy_from_slice(nonce);
    iv[CTR_IV_LEN - 1] = 1;
    match key_size {
        CtrKeySize::Aes128 => {
            let mut cipher = Aes128Ctr::new_from_slices(key, &iv)
                .map_err(|_| internal_err!("failed to build AES-CTR cipher"))?;
            cipher.apply_keystream(buf);
        }
        CtrKeySize::Aes256 => {
            let mut cipher = Aes256Ctr::new_from_slices(key, &iv)
                .map_err(|_| internal_err!("failed to build AES-CTR cipher"))?;
            cipher.apply_keystream(buf);
        }
    }
    Ok(())
}

impl BlockEncryptor for CtrBlockEncryptor {
    fn encrypt(&self, plaintext: &[u8], _aad: &[u8]) -> Result<Vec<u8>> {
        let nonce = random_nonce(&self.rng)?;
        let mut body = plaintext.to_vec();
        apply_ctr_keystream(&self.key, self.key_size, &nonce, &mut body)?;

        let mut out = Vec::with_capacity(NONCE_LEN + body.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&body);
        Ok(out)
    }
}

/// CTR decryption; inherently unauthenticated.
#[derive(Debug)]
pub(crate) struct CtrBlockDecryptor {
    key: Vec<u8>,
    key_size: CtrKeySize,
}

impl CtrBlockDecryptor {
    pub(crate) fn new(key_bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            key_size: ctr_key_size(key_bytes)?,
            key: key_bytes.to_vec(),
        })
    }
}

impl BlockDecryptor for CtrBlockDecryptor {
    fn decrypt(&self, nonce_and_ciphertext: &[u8], _aad: &[u8]) -> Result<Vec<u8>> {
        if nonce_and_ciphertext.len() < NONCE_LEN {
            return Err(EncryptionError::AadMismatch(
                "ciphertext shorter than its nonce".to_owned(),
            )
            .into());
        }
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&nonce_and_ciphertext[..NONCE_LEN]);
        let mut body = nonce_and_ciphertext[NONCE_LEN..].to_vec();
        apply_ctr_keystream(&self.key, self.key_size, &nonce, &mut body)?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;

    const KEY128: [u8; 16] = [42u8; 16];
    const KEY256: [u8; 32] = [43u8; 32];

    #[test]
    fn test_gcm_roundtrip() {
        for key in [&KEY128[..], &KEY256[..]] {
            let encryptor = GcmBlockEncryptor::new(key).unwrap();
            let decryptor = GcmBlockDecryptor::new(key).unwrap();
            let ciphertext = encryptor.encrypt(b"page body bytes", b"module aad").unwrap();
            assert_eq!(ciphertext.len(), NONCE_LEN + 15 + TAG_LEN);
            let plaintext = decryptor.decrypt(&ciphertext, b"module aad").unwrap();
            assert_eq!(plaintext, b"page body bytes");
        }
    }

    #[test]
    fn test_gcm_rejects_wrong_aad() {
        let encryptor = GcmBlockEncryptor::new(&KEY128).unwrap();
        let decryptor = GcmBlockDecryptor::new(&KEY128).unwrap();
        let ciphertext = encryptor.encrypt(b"secret", b"aad one").unwrap();
        let err = decryptor.decrypt(&ciphertext, b"aad two").unwrap_err();
        assert!(matches!(
            err,
            Error::Encryption(EncryptionError::TagMismatch)
        ));
    }

    #[test]
    fn test_gcm_rejects_wrong_key() {
        let encryptor = GcmBlockEncryptor::new(&KEY128).unwrap();
        let other = GcmBlockDecryptor::new(&[7u8; 16]).unwrap();
        let ciphertext = encryptor.encrypt(b"secret", b"aad").unwrap();
        assert!(other.decrypt(&ciphertext, b"aad").is_err());
    }

    #[test]
    fn test_gcm_detects_bit_flip() {
        let encryptor = GcmBlockEncryptor::new(&KEY128).unwrap();
        let decryptor = GcmBlockDecryptor::new(&KEY128).unwrap();
        let mut ciphertext = encryptor.encrypt(b"secret", b"aad").unwrap();
        let flip_at = NONCE_LEN + 2;
        ciphertext[flip_at] ^= 0x01;
        assert!(decryptor.decrypt(&ciphertext, b"aad").is_err());
    }

    #[test]
    fn test_ctr_roundtrip() {
        for key in [&KEY128[..], &KEY256[..]] {
            let encryptor = CtrBlockEncryptor::new(key).unwrap();
            let decryptor = CtrBlockDecryptor::new(key).unwrap();
            let ciphertext = encryptor.encrypt(b"counter mode page", b"").unwrap();
            // no tag in CTR mode
            assert_eq!(ciphertext.len(), NONCE_LEN + 17);
            assert_eq!(decryptor.decrypt(&ciphertext, b"").unwrap(), b"counter mode page");
        }
    }

    #[test]
    fn test_nonces_are_unique_per_call() {
        let encryptor = GcmBlockEncryptor::new(&KEY128).unwrap();
        let a = encryptor.encrypt(b"same", b"aad").unwrap();
        let b = encryptor.encrypt(b"same", b"aad").unwrap();
        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
    }

    #[test]
    fn test_invalid_key_length() {
        assert!(GcmBlockEncryptor::new(&[1u8; 24]).is_err());
        assert!(CtrBlockEncryptor::new(&[1u8; 10]).is_err());
    }

    #[test]
    fn test_signature_verifies() {
        let encryptor = GcmBlockEncryptor::new(&KEY128).unwrap();
        let (nonce, tag) = encryptor.sign(b"footer bytes", b"footer aad").unwrap();

        // rebuilding the ciphertext from plaintext + nonce must reproduce
        // the tag for the signature to verify
        let mut reassembled = Vec::new();
        reassembled.extend_from_slice(&nonce);
        let decryptor = GcmBlockDecryptor::new(&KEY128).unwrap();
        let mut in_out = b"footer bytes".to_vec();
        let key = gcm_key(&KEY128).unwrap();
        let tag2 = key
            .seal_in_place_separate_tag(
                Nonce::assume_unique_for_key(nonce),
                Aad::from(b"footer aad"),
                &mut in_out,
            )
            .unwrap();
        assert_eq!(tag, tag2.as_ref());

        // and the signature is a valid GCM message over the footer
        reassembled.extend_from_slice(&in_out);
        reassembled.extend_from_slice(&tag);
        assert_eq!(
            decryptor.decrypt(&reassembled, b"footer aad").unwrap(),
            b"footer bytes"
        );
    }
}
