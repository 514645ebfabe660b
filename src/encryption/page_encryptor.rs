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

//! Encryption of the page-level modules of one column chunk.

use std::io::Write;

use crate::column::page::CompressedPage;
use crate::encryption::ciphers::BlockEncryptor;
use crate::encryption::encrypt::frame_ciphertext;
use crate::encryption::modules::{create_module_aad, ModuleType};
use crate::errors::Result;

/// Encrypts the pages and page headers of one column chunk.
///
/// Data pages carry a per-chunk page ordinal in their AAD, starting at 0 in
/// every row group; the dictionary page is identified by row group and
/// column alone.
pub struct PageEncryptor {
    encryptor: Box<dyn BlockEncryptor>,
    file_aad: Vec<u8>,
    row_group_ordinal: usize,
    column_ordinal: usize,
    page_ordinal: usize,
}

impl PageEncryptor {
    pub(crate) fn new(
        encryptor: Box<dyn BlockEncryptor>,
        file_aad: Vec<u8>,
        row_group_ordinal: usize,
        column_ordinal: usize,
    ) -> Self {
        Self {
            encryptor,
            file_aad,
            row_group_ordinal,
            column_ordinal,
            page_ordinal: 0,
        }
    }

    /// Advances to the next data page. Dictionary pages do not count.
    pub fn increment_page(&mut self) {
        self.page_ordinal += 1;
    }

    fn module_aad(&self, module_type: ModuleType) -> Result<Vec<u8>> {
        let page_ordinal = matches!(
            module_type,
            ModuleType::DataPage | ModuleType::DataPageHeader
        )
        .then_some(self.page_ordinal);
        create_module_aad(
            &self.file_aad,
            module_type,
            self.row_group_ordinal,
            self.column_ordinal,
            page_ordinal,
        )
    }

    /// Encrypts a page body, returning the length-framed ciphertext that
    /// replaces it in the file.
    pub fn encrypt_page(&mut self, page: &CompressedPage) -> Result<Vec<u8>> {
        let module_type = if page.compressed_page().is_data_page() {
            ModuleType::DataPage
        } else {
            ModuleType::DictionaryPage
        };
        let aad = self.module_aad(module_type)?;
        Ok(frame_ciphertext(self.encryptor.encrypt(page.data(), &aad)?))
    }

    /// Encrypts a serialized page header into `sink`.
    pub fn encrypt_page_header<W: Write>(
        &mut self,
        header_bytes: &[u8],
        is_data_page: bool,
        sink: &mut W,
    ) -> Result<()> {
        let module_type = if is_data_page {
            ModuleType::DataPageHeader
        } else {
            ModuleType::DictionaryPageHeader
        };
        let aad = self.module_aad(module_type)?;
        let framed = frame_ciphertext(self.encryptor.encrypt(header_bytes, &aad)?);
        sink.write_all(&framed)?;
        Ok(())
    }
}
