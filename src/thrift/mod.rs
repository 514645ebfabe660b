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

//! Thrift [compact protocol] plumbing for the file metadata and page headers.
//!
//! The encoder serializes through [`CompactProtocolWriter`] and the
//! [`WriteThrift`]/[`WriteThriftField`] traits; the matching
//! [`CompactSliceReader`] and [`ReadThrift`] exist so that footers and page
//! headers written by this crate can be decoded again, which the unit tests
//! rely on heavily. No external thrift runtime is involved.
//!
//! [compact protocol]: https://github.com/apache/thrift/blob/master/doc/specs/thrift-compact-protocol.md

use std::io::Write;

use crate::errors::Result;

#[macro_use]
mod macros;

/// Compact-protocol type codes for struct fields.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum FieldType {
    Stop = 0,
    BooleanTrue = 1,
    BooleanFalse = 2,
    Byte = 3,
    I16 = 4,
    I32 = 5,
    I64 = 6,
    Double = 7,
    Binary = 8,
    List = 9,
    Set = 10,
    Map = 11,
    Struct = 12,
}

impl TryFrom<u8> for FieldType {
    type Error = crate::errors::Error;
    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::Stop,
            1 => Self::BooleanTrue,
            2 => Self::BooleanFalse,
            3 => Self::Byte,
            4 => Self::I16,
            5 => Self::I32,
            6 => Self::I64,
            7 => Self::Double,
            8 => Self::Binary,
            9 => Self::List,
            10 => Self::Set,
            11 => Self::Map,
            12 => Self::Struct,
            _ => return Err(internal_err!("unexpected thrift field type {}", value)),
        })
    }
}

/// Compact-protocol type codes for list elements.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ElementType {
    Bool = 2,
    Byte = 3,
    I16 = 4,
    I32 = 5,
    I64 = 6,
    Double = 7,
    Binary = 8,
    List = 9,
    Struct = 12,
}

impl ElementType {
    fn field_type(self) -> FieldType {
        match self {
            Self::Bool => FieldType::BooleanTrue,
            Self::Byte => FieldType::Byte,
            Self::I16 => FieldType::I16,
            Self::I32 => FieldType::I32,
            Self::I64 => FieldType::I64,
            Self::Double => FieldType::Double,
            Self::Binary => FieldType::Binary,
            Self::List => FieldType::List,
            Self::Struct => FieldType::Struct,
        }
    }
}

impl TryFrom<u8> for ElementType {
    type Error = crate::errors::Error;
    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            // 1 is accepted for bool for compatibility with pre-spec writers
            1 | 2 => Self::Bool,
            3 => Self::Byte,
            4 => Self::I16,
            5 => Self::I32,
            6 => Self::I64,
            7 => Self::Double,
            8 => Self::Binary,
            9 => Self::List,
            12 => Self::Struct,
            _ => return Err(internal_err!("unexpected thrift element type {}", value)),
        })
    }
}

// ----------------------------------------------------------------------
// Output protocol

/// Serializer for the thrift compact protocol, wrapping a byte sink.
pub(crate) struct CompactProtocolWriter<W: Write> {
    sink: W,
}

impl<W: Write> CompactProtocolWriter<W> {
    pub(crate) fn new(sink: W) -> Self {
        Self { sink }
    }

    fn write_byte(&mut self, b: u8) -> Result<()> {
        self.sink.write_all(&[b])?;
        Ok(())
    }

    /// ULEB128 unsigned varint.
    fn write_vlq(&mut self, val: u64) -> Result<()> {
        let mut v = val;
        while v > 0x7f {
            self.write_byte(v as u8 | 0x80)?;
            v >>= 7;
        }
        self.write_byte(v as u8)
    }

    /// Zig-zag encoded signed varint.
    fn write_zig_zag(&mut self, val: i64) -> Result<()> {
        self.write_vlq(((val as u64) << 1) ^ ((val >> 63) as u64))
    }

    /// Writes the field marker for `field_id`, using the delta to
    /// `last_field_id` when it fits in the short form.
    pub(crate) fn write_field_begin(
        &mut self,
        field_type: FieldType,
        field_id: i16,
        last_field_id: i16,
    ) -> Result<()> {
        let delta = field_id.wrapping_sub(last_field_id);
        if delta > 0 && delta <= 0xf {
            self.write_byte((delta as u8) << 4 | field_type as u8)
        } else {
            self.write_byte(field_type as u8)?;
            self.write_i16(field_id)
        }
    }

    pub(crate) fn write_list_begin(&mut self, element_type: ElementType, len: usize) -> Result<()> {
        if len < 15 {
            self.write_byte((len as u8) << 4 | element_type as u8)
        } else {
            self.write_byte(0xf0 | element_type as u8)?;
            self.write_vlq(len as u64)
        }
    }

    /// Terminates the current struct. Must follow the last field.
    pub(crate) fn write_struct_end(&mut self) -> Result<()> {
        self.write_byte(0)
    }

    /// Field id plus immediate end-of-struct, for empty structs in unions.
    pub(crate) fn write_empty_struct(&mut self, field_id: i16, last_field_id: i16) -> Result<i16> {
        self.write_field_begin(FieldType::Struct, field_id, last_field_id)?;
        self.write_struct_end()?;
        Ok(field_id)
    }

    pub(crate) fn write_bytes(&mut self, val: &[u8]) -> Result<()> {
        self.write_vlq(val.len() as u64)?;
        self.sink.write_all(val)?;
        Ok(())
    }

    /// Bool as a list element; bool struct fields are encoded in the field
    /// marker instead.
    pub(crate) fn write_bool(&mut self, val: bool) -> Result<()> {
        self.write_byte(if val { 1 } else { 2 })
    }

    pub(crate) fn write_i8(&mut self, val: i8) -> Result<()> {
        self.write_byte(val as u8)
    }

    pub(crate) fn write_i16(&mut self, val: i16) -> Result<()> {
        self.write_zig_zag(val as i64)
    }

    pub(crate) fn write_i32(&mut self, val: i32) -> Result<()> {
        self.write_zig_zag(val as i64)
    }

    pub(crate) fn write_i64(&mut self, val: i64) -> Result<()> {
        self.write_zig_zag(val)
    }
}

/// Objects serializable to the compact protocol.
pub(crate) trait WriteThrift {
    /// Element type used when a list of this object is written.
    const ELEMENT_TYPE: ElementType;

    fn write_thrift<W: Write>(&self, w: &mut CompactProtocolWriter<W>) -> Result<()>;
}

/// Objects writable as a struct field: writes the field marker for `field_id`
/// and then the value, returning `field_id` for chaining.
pub(crate) trait WriteThriftField {
    fn write_thrift_field<W: Write>(
        &self,
        w: &mut CompactProtocolWriter<W>,
        field_id: i16,
        last_field_id: i16,
    ) -> Result<i16>;
}

impl WriteThrift for bool {
    const ELEMENT_TYPE: ElementType = ElementType::Bool;
    fn write_thrift<W: Write>(&self, w: &mut CompactProtocolWriter<W>) -> Result<()> {
        w.write_bool(*self)
    }
}

impl WriteThrift for i8 {
    const ELEMENT_TYPE: ElementType = ElementType::Byte;
    fn write_thrift<W: Write>(&self, w: &mut CompactProtocolWriter<W>) -> Result<()> {
        w.write_i8(*self)
    }
}

impl WriteThrift for i16 {
    const ELEMENT_TYPE: ElementType = ElementType::I16;
    fn write_thrift<W: Write>(&self, w: &mut CompactProtocolWriter<W>) -> Result<()> {
        w.write_i16(*self)
    }
}

impl WriteThrift for i32 {
    const ELEMENT_TYPE: ElementType = ElementType::I32;
    fn write_thrift<W: Write>(&self, w: &mut CompactProtocolWriter<W>) -> Result<()> {
        w.write_i32(*self)
    }
}

impl WriteThrift for i64 {
    const ELEMENT_TYPE: ElementType = ElementType::I64;
    fn write_thrift<W: Write>(&self, w: &mut CompactProtocolWriter<W>) -> Result<()> {
        w.write_i64(*self)
    }
}

impl WriteThrift for str {
    const ELEMENT_TYPE: ElementType = ElementType::Binary;
    fn write_thrift<W: Write>(&self, w: &mut CompactProtocolWriter<W>) -> Result<()> {
        w.write_bytes(self.as_bytes())
    }
}

impl WriteThrift for String {
    const ELEMENT_TYPE: ElementType = ElementType::Binary;
    fn write_thrift<W: Write>(&self, w: &mut CompactProtocolWriter<W>) -> Result<()> {
        w.write_bytes(self.as_bytes())
    }
}

impl<T: WriteThrift> WriteThrift for Vec<T> {
    const ELEMENT_TYPE: ElementType = ElementType::List;
    fn write_thrift<W: Write>(&self, w: &mut CompactProtocolWriter<W>) -> Result<()> {
        w.write_list_begin(T::ELEMENT_TYPE, self.len())?;
        for item in self {
            item.write_thrift(w)?;
        }
        Ok(())
    }
}

// bool struct fields carry their value in the field marker
impl WriteThriftField for bool {
    fn write_thrift_field<W: Write>(
        &self,
        w: &mut CompactProtocolWriter<W>,
        field_id: i16,
        last_field_id: i16,
    ) -> Result<i16> {
        let field_type = if *self {
            FieldType::BooleanTrue
        } else {
            FieldType::BooleanFalse
        };
        w.write_field_begin(field_type, field_id, last_field_id)?;
        Ok(field_id)
    }
}

thrift_field_impl!(i8, FieldType::Byte);
thrift_field_impl!(i16, FieldType::I16);
thrift_field_impl!(i32, FieldType::I32);
thrift_field_impl!(i64, FieldType::I64);
thrift_field_impl!(String, FieldType::Binary);

impl WriteThriftField for str {
    fn write_thrift_field<W: Write>(
        &self,
        w: &mut CompactProtocolWriter<W>,
        field_id: i16,
        last_field_id: i16,
    ) -> Result<i16> {
        w.write_field_begin(FieldType::Binary, field_id, last_field_id)?;
        w.write_bytes(self.as_bytes())?;
        Ok(field_id)
    }
}

impl<T: WriteThrift> WriteThriftField for Vec<T> {
    fn write_thrift_field<W: Write>(
        &self,
        w: &mut CompactProtocolWriter<W>,
        field_id: i16,
        last_field_id: i16,
    ) -> Result<i16> {
        w.write_field_begin(FieldType::List, field_id, last_field_id)?;
        self.write_thrift(w)?;
        Ok(field_id)
    }
}

// ----------------------------------------------------------------------
// Input protocol (slice based; used by tests and footer verification)

/// Identifier of a decoded struct field.
pub(crate) struct FieldIdent {
    pub(crate) field_type: FieldType,
    pub(crate) id: i16,
    /// Booleans carry their value in the field marker.
    pub(crate) bool_val: Option<bool>,
}

/// Identifier of a decoded list.
pub(crate) struct ListIdent {
    pub(crate) element_type: ElementType,
    pub(crate) size: usize,
}

/// Compact-protocol deserializer over a byte slice.
pub(crate) struct CompactSliceReader<'a> {
    buf: &'a [u8],
}

impl<'a> CompactSliceReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// The not-yet-consumed remainder of the input.
    pub(crate) fn as_slice(&self) -> &'a [u8] {
        self.buf
    }

    pub(crate) fn read_byte(&mut self) -> Result<u8> {
        let ret = *self
            .buf
            .first()
            .ok_or_else(|| eof_err!("end of thrift input"))?;
        self.buf = &self.buf[1..];
        Ok(ret)
    }

    fn read_slice(&mut self, n: usize) -> Result<&'a [u8]> {
        let ret = self
            .buf
            .get(..n)
            .ok_or_else(|| eof_err!("end of thrift input"))?;
        self.buf = &self.buf[n..];
        Ok(ret)
    }

    pub(crate) fn read_vlq(&mut self) -> Result<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_byte()?;
            value |= ((byte & 0x7f) as u64).wrapping_shl(shift);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    pub(crate) fn read_zig_zag(&mut self) -> Result<i64> {
        let val = self.read_vlq()?;
        Ok((val >> 1) as i64 ^ -((val & 1) as i64))
    }

    pub(crate) fn read_bytes_owned(&mut self) -> Result<Vec<u8>> {
        let len = self.read_vlq()? as usize;
        Ok(self.read_slice(len)?.to_vec())
    }

    pub(crate) fn read_string(&mut self) -> Result<String> {
        let len = self.read_vlq()? as usize;
        Ok(std::str::from_utf8(self.read_slice(len)?)?.to_owned())
    }

    pub(crate) fn read_bool(&mut self) -> Result<bool> {
        match self.read_byte()? {
            0x01 => Ok(true),
            0x00 | 0x02 => Ok(false),
            b => Err(internal_err!("cannot convert {} into bool", b)),
        }
    }

    pub(crate) fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_byte()? as i8)
    }

    pub(crate) fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_zig_zag()? as i16)
    }

    pub(crate) fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_zig_zag()? as i32)
    }

    pub(crate) fn read_i64(&mut self) -> Result<i64> {
        self.read_zig_zag()
    }

    pub(crate) fn read_field_begin(&mut self, last_field_id: i16) -> Result<FieldIdent> {
        let header = self.read_byte()?;
        let field_delta = (header & 0xf0) >> 4;
        let field_type = FieldType::try_from(header & 0x0f)?;
        if field_type == FieldType::Stop {
            return Ok(FieldIdent {
                field_type,
                id: 0,
                bool_val: None,
            });
        }
        let bool_val = match field_type {
            FieldType::BooleanTrue => Some(true),
            FieldType::BooleanFalse => Some(false),
            _ => None,
        };
        let id = if field_delta != 0 {
            last_field_id
                .checked_add(field_delta as i16)
                .ok_or_else(|| internal_err!("thrift field id overflow"))?
        } else {
            self.read_i16()?
        };
        Ok(FieldIdent {
            field_type,
            id,
            bool_val,
        })
    }

    pub(crate) fn read_list_begin(&mut self) -> Result<ListIdent> {
        let header = self.read_byte()?;
        // some writers emit element type 0 for empty lists
        if header == 0 {
            return Ok(ListIdent {
                element_type: ElementType::Byte,
                size: 0,
            });
        }
        let element_type = ElementType::try_from(header & 0x0f)?;
        let short_size = (header & 0xf0) >> 4;
        let size = if short_size != 15 {
            short_size as usize
        } else {
            self.read_vlq()? as usize
        };
        Ok(ListIdent { element_type, size })
    }

    /// Consumes the single stop byte of an empty struct.
    pub(crate) fn read_empty_struct(&mut self) -> Result<()> {
        if self.read_byte()? != 0 {
            return Err(internal_err!("expected empty thrift struct"));
        }
        Ok(())
    }

    /// Skips over a field of the given type, recursing through nested
    /// structs and lists up to a fixed depth.
    pub(crate) fn skip(&mut self, field_type: FieldType) -> Result<()> {
        self.skip_till_depth(field_type, 32)
    }

    fn skip_till_depth(&mut self, field_type: FieldType, depth: u8) -> Result<()> {
        if depth == 0 {
            return Err(internal_err!("thrift skip depth exceeded"));
        }
        match field_type {
            FieldType::BooleanTrue | FieldType::BooleanFalse => Ok(()),
            FieldType::Byte => self.read_i8().map(|_| ()),
            FieldType::I16 | FieldType::I32 | FieldType::I64 => {
                self.read_vlq().map(|_| ())
            }
            FieldType::Double => self.read_slice(8).map(|_| ()),
            FieldType::Binary => {
                let len = self.read_vlq()? as usize;
                self.read_slice(len).map(|_| ())
            }
            FieldType::Struct => {
                let mut last_field_id = 0i16;
                loop {
                    let ident = self.read_field_begin(last_field_id)?;
                    if ident.field_type == FieldType::Stop {
                        return Ok(());
                    }
                    self.skip_till_depth(ident.field_type, depth - 1)?;
                    last_field_id = ident.id;
                }
            }
            FieldType::List => {
                let ident = self.read_list_begin()?;
                for _ in 0..ident.size {
                    self.skip_till_depth(ident.element_type.field_type(), depth - 1)?;
                }
                Ok(())
            }
            other => Err(internal_err!("cannot skip thrift type {:?}", other)),
        }
    }
}

/// Objects deserializable from the compact protocol.
pub(crate) trait ReadThrift: Sized {
    fn read_thrift(prot: &mut CompactSliceReader<'_>) -> Result<Self>;
}

impl ReadThrift for bool {
    fn read_thrift(prot: &mut CompactSliceReader<'_>) -> Result<Self> {
        prot.read_bool()
    }
}

impl ReadThrift for i8 {
    fn read_thrift(prot: &mut CompactSliceReader<'_>) -> Result<Self> {
        prot.read_i8()
    }
}

impl ReadThrift for i16 {
    fn read_thrift(prot: &mut CompactSliceReader<'_>) -> Result<Self> {
        prot.read_i16()
    }
}

impl ReadThrift for i32 {
    fn read_thrift(prot: &mut CompactSliceReader<'_>) -> Result<Self> {
        prot.read_i32()
    }
}

impl ReadThrift for i64 {
    fn read_thrift(prot: &mut CompactSliceReader<'_>) -> Result<Self> {
        prot.read_i64()
    }
}

impl ReadThrift for String {
    fn read_thrift(prot: &mut CompactSliceReader<'_>) -> Result<Self> {
        prot.read_string()
    }
}

/// Reads a thrift list of `T`.
pub(crate) fn read_thrift_vec<T: ReadThrift>(prot: &mut CompactSliceReader<'_>) -> Result<Vec<T>> {
    let ident = prot.read_list_begin()?;
    let mut out = Vec::with_capacity(ident.size);
    for _ in 0..ident.size {
        out.push(T::read_thrift(prot)?);
    }
    Ok(out)
}
