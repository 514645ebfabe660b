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

//! Per-module AAD derivation.
//!
//! Every encrypted module's AAD is the file AAD followed by a short suffix
//! identifying the module: its type byte, then little-endian `u16` ordinals
//! for the row group, the column, and (for data page modules) the page
//! within its column chunk.

use crate::errors::Result;

/// The kinds of file modules that can be encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ModuleType {
    Footer = 0,
    ColumnMetaData = 1,
    DataPage = 2,
    DictionaryPage = 3,
    DataPageHeader = 4,
    DictionaryPageHeader = 5,
    ColumnIndex = 6,
    OffsetIndex = 7,
}

/// AAD of the footer module: no ordinals, just the type byte.
pub(crate) fn create_footer_aad(file_aad: &[u8]) -> Result<Vec<u8>> {
    let mut aad = Vec::with_capacity(file_aad.len() + 1);
    aad.extend_from_slice(file_aad);
    aad.push(ModuleType::Footer as u8);
    Ok(aad)
}

/// AAD of any non-footer module. `page_ordinal` is required for data page
/// and data page header modules and counts pages per column chunk from 0.
pub(crate) fn create_module_aad(
    file_aad: &[u8],
    module_type: ModuleType,
    row_group_ordinal: usize,
    column_ordinal: usize,
    page_ordinal: Option<usize>,
) -> Result<Vec<u8>> {
    debug_assert!(module_type != ModuleType::Footer);
    let row_group_ordinal = ordinal_to_u16(row_group_ordinal, "row group")?;
    let column_ordinal = ordinal_to_u16(column_ordinal, "column")?;

    let mut aad = Vec::with_capacity(file_aad.len() + 7);
    aad.extend_from_slice(file_aad);
    aad.push(module_type as u8);
    aad.extend_from_slice(&row_group_ordinal.to_le_bytes());
    aad.extend_from_slice(&column_ordinal.to_le_bytes());
    if matches!(
        module_type,
        ModuleType::DataPage | ModuleType::DataPageHeader
    ) {
        let page_ordinal = page_ordinal
            .ok_or_else(|| internal_err!("data page modules require a page ordinal"))?;
        aad.extend_from_slice(&ordinal_to_u16(page_ordinal, "page")?.to_le_bytes());
    }
    Ok(aad)
}

fn ordinal_to_u16(ordinal: usize, what: &str) -> Result<u16> {
    u16::try_from(ordinal).map_err(|_| {
        internal_err!(
            "encrypted files cannot have more than {} {}s, got ordinal {}",
            u16::MAX,
            what,
            ordinal
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_footer_aad_layout() {
        let aad = create_footer_aad(b"fileaad!").unwrap();
        assert_eq!(aad, b"fileaad!\x00");
    }

    #[test]
    fn test_module_aad_layout() {
        let aad = create_module_aad(b"fileaad!", ModuleType::DataPage, 1, 2, Some(3)).unwrap();
        assert_eq!(aad, b"fileaad!\x02\x01\x00\x02\x00\x03\x00");

        // non-page modules carry no page ordinal
        let aad =
            create_module_aad(b"fileaad!", ModuleType::ColumnMetaData, 1, 2, None).unwrap();
        assert_eq!(aad, b"fileaad!\x01\x01\x00\x02\x00");

        // dictionary pages are identified by row group and column alone
        let aad =
            create_module_aad(b"fileaad!", ModuleType::DictionaryPage, 0, 7, None).unwrap();
        assert_eq!(aad, b"fileaad!\x03\x00\x00\x07\x00");
    }

    #[test]
    fn test_page_ordinal_required_for_data_pages() {
        assert!(create_module_aad(b"x", ModuleType::DataPage, 0, 0, None).is_err());
        assert!(create_module_aad(b"x", ModuleType::DataPageHeader, 0, 0, None).is_err());
    }

    #[test]
    fn test_ordinal_range() {
        assert!(create_module_aad(b"x", ModuleType::DataPage, 70_000, 0, Some(0)).is_err());
        assert!(create_module_aad(b"x", ModuleType::DataPage, 0, 0, Some(65_536)).is_err());
    }
}
