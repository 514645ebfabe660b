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

//! Macros that turn pasted sections of the Parquet thrift IDL into Rust
//! structs and enums with compact-protocol serialization in both directions.

/// Generates a [`WriteThriftField`](crate::thrift::WriteThriftField) impl for
/// a type that already implements `WriteThrift`.
macro_rules! thrift_field_impl {
    ($t:ty, $ft:expr) => {
        impl $crate::thrift::WriteThriftField for $t {
            fn write_thrift_field<W: std::io::Write>(
                &self,
                w: &mut $crate::thrift::CompactProtocolWriter<W>,
                field_id: i16,
                last_field_id: i16,
            ) -> $crate::errors::Result<i16> {
                w.write_field_begin($ft, field_id, last_field_id)?;
                $crate::thrift::WriteThrift::write_thrift(self, w)?;
                Ok(field_id)
            }
        }
    };
}

/// Generates a Rust enum from a thrift `enum` definition, with i32
/// serialization in both directions.
macro_rules! thrift_enum {
    ($(#[$attrs:meta])* $vis:vis enum $name:ident {
        $($(#[$vattrs:meta])* $vname:ident = $vval:literal;)*
    }) => {
        $(#[$attrs])*
        #[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
        #[allow(non_camel_case_types)]
        $vis enum $name {
            $($(#[$vattrs])* $vname = $vval,)*
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{self:?}")
            }
        }

        impl $crate::thrift::WriteThrift for $name {
            const ELEMENT_TYPE: $crate::thrift::ElementType = $crate::thrift::ElementType::I32;

            fn write_thrift<W: std::io::Write>(
                &self,
                w: &mut $crate::thrift::CompactProtocolWriter<W>,
            ) -> $crate::errors::Result<()> {
                w.write_i32(*self as i32)
            }
        }

        thrift_field_impl!($name, $crate::thrift::FieldType::I32);

        impl $crate::thrift::ReadThrift for $name {
            fn read_thrift(
                prot: &mut $crate::thrift::CompactSliceReader<'_>,
            ) -> $crate::errors::Result<Self> {
                let val = prot.read_i32()?;
                match val {
                    $($vval => Ok(Self::$vname),)*
                    _ => Err(internal_err!("unexpected {} {}", stringify!($name), val)),
                }
            }
        }
    };
}

/// Generates a Rust enum from a thrift `union` whose variants are all empty
/// structs.
macro_rules! thrift_unit_union {
    ($(#[$attrs:meta])* $vis:vis union $name:ident {
        $($(#[$vattrs:meta])* $fid:literal : $vname:ident;)*
    }) => {
        $(#[$attrs])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[allow(non_camel_case_types)]
        $vis enum $name {
            $($(#[$vattrs])* $vname,)*
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{self:?}")
            }
        }

        impl $crate::thrift::WriteThrift for $name {
            const ELEMENT_TYPE: $crate::thrift::ElementType =
                $crate::thrift::ElementType::Struct;

            fn write_thrift<W: std::io::Write>(
                &self,
                w: &mut $crate::thrift::CompactProtocolWriter<W>,
            ) -> $crate::errors::Result<()> {
                match *self {
                    $(Self::$vname => w.write_empty_struct($fid, 0)?,)*
                };
                w.write_struct_end()
            }
        }

        thrift_field_impl!($name, $crate::thrift::FieldType::Struct);

        impl $crate::thrift::ReadThrift for $name {
            fn read_thrift(
                prot: &mut $crate::thrift::CompactSliceReader<'_>,
            ) -> $crate::errors::Result<Self> {
                let ident = prot.read_field_begin(0)?;
                let ret = match ident.id {
                    $($fid => {
                        prot.read_empty_struct()?;
                        Self::$vname
                    })*
                    other => {
                        return Err(internal_err!(
                            "unexpected {} variant {}", stringify!($name), other
                        ))
                    }
                };
                let stop = prot.read_field_begin(ident.id)?;
                if stop.field_type != $crate::thrift::FieldType::Stop {
                    return Err(internal_err!(
                        "multiple fields set for union {}", stringify!($name)
                    ));
                }
                Ok(ret)
            }
        }
    };
}

// Maps a thrift type token to the Rust type stored in generated structs.
macro_rules! __thrift_base_type {
    (string) => { String };
    (binary) => { Vec<u8> };
    (bool) => { bool };
    (i8) => { i8 };
    (i16) => { i16 };
    (i32) => { i32 };
    (i64) => { i64 };
    (list<string>) => { Vec<String> };
    (list<$elem:ident>) => { Vec<__thrift_base_type!($elem)> };
    ($t:ident) => { $t };
}

macro_rules! __thrift_rust_type {
    (required $($tt:tt)+) => { __thrift_base_type!($($tt)+) };
    (optional $($tt:tt)+) => { Option<__thrift_base_type!($($tt)+)> };
}

// Decodes one field value of the given thrift type.
macro_rules! __thrift_read_value {
    (bool, $prot:ident, $ident:ident) => {
        $ident
            .bool_val
            .ok_or_else(|| internal_err!("expected boolean field"))?
    };
    (string, $prot:ident, $ident:ident) => {
        $prot.read_string()?
    };
    (binary, $prot:ident, $ident:ident) => {
        $prot.read_bytes_owned()?
    };
    (i8, $prot:ident, $ident:ident) => {
        $prot.read_i8()?
    };
    (i16, $prot:ident, $ident:ident) => {
        $prot.read_i16()?
    };
    (i32, $prot:ident, $ident:ident) => {
        $prot.read_i32()?
    };
    (i64, $prot:ident, $ident:ident) => {
        $prot.read_i64()?
    };
    (list<$elem:ident>, $prot:ident, $ident:ident) => {
        $crate::thrift::read_thrift_vec::<__thrift_base_type!($elem)>($prot)?
    };
    ($t:ident, $prot:ident, $ident:ident) => {
        <$t as $crate::thrift::ReadThrift>::read_thrift($prot)?
    };
}

// Encodes one struct field, tracking the last written field id.
macro_rules! __thrift_write_field {
    (required binary, $expr:expr, $fid:literal, $w:ident, $last:ident) => {
        $w.write_field_begin($crate::thrift::FieldType::Binary, $fid, $last)?;
        $w.write_bytes(&$expr)?;
        $last = $fid;
    };
    (optional binary, $expr:expr, $fid:literal, $w:ident, $last:ident) => {
        if let Some(v) = $expr.as_ref() {
            $w.write_field_begin($crate::thrift::FieldType::Binary, $fid, $last)?;
            $w.write_bytes(v)?;
            $last = $fid;
        }
    };
    (required $t:ident $(<$elem:ident>)?, $expr:expr, $fid:literal, $w:ident, $last:ident) => {
        $last = $crate::thrift::WriteThriftField::write_thrift_field(&$expr, $w, $fid, $last)?;
    };
    (optional $t:ident $(<$elem:ident>)?, $expr:expr, $fid:literal, $w:ident, $last:ident) => {
        if let Some(v) = $expr.as_ref() {
            $last = $crate::thrift::WriteThriftField::write_thrift_field(v, $w, $fid, $last)?;
        }
    };
}

macro_rules! __thrift_finish_field {
    (required $fname:ident, $name:ident) => {
        $fname.ok_or_else(|| {
            internal_err!(
                "required field {}.{} is missing",
                stringify!($name),
                stringify!($fname)
            )
        })?
    };
    (optional $fname:ident, $name:ident) => {
        $fname
    };
}

/// Generates a Rust struct from a thrift `struct` definition, with compact
/// protocol serialization in both directions. Field declarations follow the
/// IDL: `<id>: required|optional <type> <name>;`.
macro_rules! thrift_struct {
    ($(#[$attrs:meta])* $vis:vis struct $name:ident {
        $($(#[$fattrs:meta])* $fid:literal : $req:ident $ftype:ident $(<$elem:ident>)? $fname:ident;)*
    }) => {
        $(#[$attrs])*
        #[derive(Clone, Debug, PartialEq)]
        $vis struct $name {
            $($(#[$fattrs])* $vis $fname: __thrift_rust_type!($req $ftype $(<$elem>)?),)*
        }

        impl $crate::thrift::WriteThrift for $name {
            const ELEMENT_TYPE: $crate::thrift::ElementType =
                $crate::thrift::ElementType::Struct;

            #[allow(unused_assignments, unused_mut, unused_variables)]
            fn write_thrift<W: std::io::Write>(
                &self,
                w: &mut $crate::thrift::CompactProtocolWriter<W>,
            ) -> $crate::errors::Result<()> {
                let mut last_field_id = 0i16;
                $(__thrift_write_field!($req $ftype $(<$elem>)?, self.$fname, $fid, w, last_field_id);)*
                w.write_struct_end()
            }
        }

        thrift_field_impl!($name, $crate::thrift::FieldType::Struct);

        impl $crate::thrift::ReadThrift for $name {
            #[allow(unused_mut, unused_variables)]
            fn read_thrift(
                prot: &mut $crate::thrift::CompactSliceReader<'_>,
            ) -> $crate::errors::Result<Self> {
                $(let mut $fname: Option<__thrift_base_type!($ftype $(<$elem>)?)> = None;)*
                let mut last_field_id = 0i16;
                loop {
                    let ident = prot.read_field_begin(last_field_id)?;
                    if ident.field_type == $crate::thrift::FieldType::Stop {
                        break;
                    }
                    match ident.id {
                        $($fid => {
                            $fname = Some(__thrift_read_value!($ftype $(<$elem>)?, prot, ident));
                        })*
                        _ => {
                            prot.skip(ident.field_type)?;
                        }
                    }
                    last_field_id = ident.id;
                }
                Ok(Self {
                    $($fname: __thrift_finish_field!($req $fname, $name),)*
                })
            }
        }
    };
}
