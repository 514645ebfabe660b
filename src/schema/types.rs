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

//! The schema type tree, its builders, and the flat column descriptors
//! derived from it.

use std::fmt;
use std::sync::Arc;

use crate::basic::{
    column_sort_order, ConvertedType, LogicalType, Repetition, SortOrder, TimeUnit,
    Type as PhysicalType,
};
use crate::errors::Result;
use crate::format::SchemaElement;

/// Reference-counted schema node.
pub type TypePtr = Arc<Type>;
/// Reference-counted schema descriptor.
pub type SchemaDescPtr = Arc<SchemaDescriptor>;
/// Reference-counted column descriptor.
pub type ColumnDescPtr = Arc<ColumnDescriptor>;

/// A node of the schema tree: either a primitive leaf or a group with
/// children. The root of a schema is a group named after the message.
#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    /// A leaf holding values of a physical type.
    PrimitiveType {
        basic_info: BasicTypeInfo,
        physical_type: PhysicalType,
        /// Byte length for FIXED_LEN_BYTE_ARRAY, `-1` otherwise.
        type_length: i32,
        scale: i32,
        precision: i32,
    },
    /// An interior node with an ordered list of children.
    GroupType {
        basic_info: BasicTypeInfo,
        fields: Vec<TypePtr>,
    },
}

impl Type {
    /// Returns a builder for a primitive leaf, REQUIRED by default.
    pub fn primitive_type_builder(
        name: &str,
        physical_type: PhysicalType,
    ) -> PrimitiveTypeBuilder {
        PrimitiveTypeBuilder::new(name, physical_type)
    }

    /// Returns a builder for a group node.
    pub fn group_type_builder(name: &str) -> GroupTypeBuilder {
        GroupTypeBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        self.get_basic_info().name()
    }

    pub fn get_basic_info(&self) -> &BasicTypeInfo {
        match self {
            Type::PrimitiveType { basic_info, .. } => basic_info,
            Type::GroupType { basic_info, .. } => basic_info,
        }
    }

    /// Children of a group node; panics for a primitive.
    pub fn get_fields(&self) -> &[TypePtr] {
        match self {
            Type::GroupType { fields, .. } => &fields[..],
            _ => panic!("cannot call get_fields() on a primitive type"),
        }
    }

    /// Physical type of a primitive node; panics for a group.
    pub fn get_physical_type(&self) -> PhysicalType {
        match self {
            Type::PrimitiveType { physical_type, .. } => *physical_type,
            _ => panic!("cannot call get_physical_type() on a group type"),
        }
    }

    pub fn get_precision(&self) -> i32 {
        match self {
            Type::PrimitiveType { precision, .. } => *precision,
            _ => -1,
        }
    }

    pub fn get_scale(&self) -> i32 {
        match self {
            Type::PrimitiveType { scale, .. } => *scale,
            _ => -1,
        }
    }

    pub fn get_type_length(&self) -> i32 {
        match self {
            Type::PrimitiveType { type_length, .. } => *type_length,
            _ => -1,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Type::PrimitiveType { .. })
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Type::GroupType { .. })
    }

    /// Total number of nodes in the tree rooted here, including this one.
    pub fn num_nodes(&self) -> usize {
        match self {
            Type::PrimitiveType { .. } => 1,
            Type::GroupType { fields, .. } => {
                1 + fields.iter().map(|f| f.num_nodes()).sum::<usize>()
            }
        }
    }
}

/// Properties common to primitive and group nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct BasicTypeInfo {
    name: String,
    repetition: Option<Repetition>,
    converted_type: Option<ConvertedType>,
    logical_type: Option<LogicalType>,
    id: Option<i32>,
}

impl BasicTypeInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_repetition(&self) -> bool {
        self.repetition.is_some()
    }

    /// Repetition of the field; panics on the schema root, which has none.
    pub fn repetition(&self) -> Repetition {
        self.repetition
            .expect("repetition is not set on the schema root")
    }

    pub fn converted_type(&self) -> Option<ConvertedType> {
        self.converted_type
    }

    pub fn logical_type(&self) -> Option<&LogicalType> {
        self.logical_type.as_ref()
    }

    pub fn id(&self) -> Option<i32> {
        self.id
    }
}

/// Builder for primitive leaf nodes.
pub struct PrimitiveTypeBuilder {
    name: String,
    physical_type: PhysicalType,
    repetition: Repetition,
    converted_type: Option<ConvertedType>,
    logical_type: Option<LogicalType>,
    length: i32,
    precision: i32,
    scale: i32,
    id: Option<i32>,
}

impl PrimitiveTypeBuilder {
    fn new(name: &str, physical_type: PhysicalType) -> Self {
        Self {
            name: name.to_owned(),
            physical_type,
            repetition: Repetition::OPTIONAL,
            converted_type: None,
            logical_type: None,
            length: -1,
            precision: -1,
            scale: -1,
            id: None,
        }
    }

    pub fn with_repetition(mut self, repetition: Repetition) -> Self {
        self.repetition = repetition;
        self
    }

    pub fn with_converted_type(mut self, converted_type: ConvertedType) -> Self {
        self.converted_type = Some(converted_type);
        self
    }

    /// Sets the logical type and, unless already set, the matching converted
    /// type for old readers.
    pub fn with_logical_type(mut self, logical_type: LogicalType) -> Self {
        if self.converted_type.is_none() {
            self.converted_type = logical_type.converted_type();
        }
        self.logical_type = Some(logical_type);
        self
    }

    /// Byte length, required for FIXED_LEN_BYTE_ARRAY.
    pub fn with_length(mut self, length: i32) -> Self {
        self.length = length;
        self
    }

    pub fn with_precision(mut self, precision: i32) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_scale(mut self, scale: i32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_id(mut self, id: i32) -> Self {
        self.id = Some(id);
        self
    }

    pub fn build(self) -> Result<Type> {
        let basic_info = BasicTypeInfo {
            name: self.name.clone(),
            repetition: Some(self.repetition),
            converted_type: self.converted_type,
            logical_type: self.logical_type.clone(),
            id: self.id,
        };

        if self.physical_type == PhysicalType::FIXED_LEN_BYTE_ARRAY && self.length <= 0 {
            return Err(schema_err!(
                "invalid FIXED_LEN_BYTE_ARRAY length {} for field '{}'",
                self.length,
                self.name
            ));
        }

        if let Some(logical_type) = &self.logical_type {
            self.check_logical_type(logical_type)?;
        }

        match self.converted_type {
            Some(ConvertedType::DECIMAL) => self.check_decimal_precision_scale()?,
            Some(ConvertedType::INTERVAL) => {
                if self.physical_type != PhysicalType::FIXED_LEN_BYTE_ARRAY || self.length != 12 {
                    return Err(schema_err!(
                        "INTERVAL field '{}' must be FIXED_LEN_BYTE_ARRAY(12)",
                        self.name
                    ));
                }
            }
            Some(ConvertedType::UTF8 | ConvertedType::JSON | ConvertedType::BSON | ConvertedType::ENUM) => {
                if self.physical_type != PhysicalType::BYTE_ARRAY {
                    return Err(schema_err!(
                        "{} field '{}' must be stored as BYTE_ARRAY",
                        self.converted_type.unwrap(),
                        self.name
                    ));
                }
            }
            _ => {}
        }

        Ok(Type::PrimitiveType {
            basic_info,
            physical_type: self.physical_type,
            type_length: self.length,
            scale: self.scale,
            precision: self.precision,
        })
    }

    fn check_logical_type(&self, logical_type: &LogicalType) -> Result<()> {
        let ok = match logical_type {
            LogicalType::String
            | LogicalType::Enum
            | LogicalType::Json
            | LogicalType::Bson => self.physical_type == PhysicalType::BYTE_ARRAY,
            LogicalType::Decimal { .. } => {
                self.check_decimal_precision_scale()?;
                return Ok(());
            }
            LogicalType::Date => self.physical_type == PhysicalType::INT32,
            LogicalType::Time { unit, .. } => match unit {
                TimeUnit::MILLIS => self.physical_type == PhysicalType::INT32,
                _ => self.physical_type == PhysicalType::INT64,
            },
            LogicalType::Timestamp { .. } => self.physical_type == PhysicalType::INT64,
            LogicalType::Integer { bit_width, .. } => match bit_width {
                8 | 16 | 32 => self.physical_type == PhysicalType::INT32,
                64 => self.physical_type == PhysicalType::INT64,
                _ => {
                    return Err(schema_err!(
                        "invalid integer bit width {} for field '{}'",
                        bit_width,
                        self.name
                    ))
                }
            },
            LogicalType::Uuid => {
                self.physical_type == PhysicalType::FIXED_LEN_BYTE_ARRAY && self.length == 16
            }
            LogicalType::Unknown | LogicalType::Map | LogicalType::List => false,
        };
        if !ok {
            return Err(schema_err!(
                "{:?} annotation cannot be applied to field '{}' of physical type {}",
                logical_type,
                self.name,
                self.physical_type
            ));
        }
        Ok(())
    }

    fn check_decimal_precision_scale(&self) -> Result<()> {
        let (precision, scale) = (self.precision, self.scale);
        if precision < 1 {
            return Err(schema_err!(
                "DECIMAL precision must be at least 1, got {} for field '{}'",
                precision,
                self.name
            ));
        }
        if scale < 0 || scale > precision {
            return Err(schema_err!(
                "DECIMAL scale must be in [0, precision={}], got {} for field '{}'",
                precision,
                scale,
                self.name
            ));
        }
        let max_precision = match self.physical_type {
            PhysicalType::INT32 => 9,
            PhysicalType::INT64 => 18,
            PhysicalType::BYTE_ARRAY => i32::MAX,
            PhysicalType::FIXED_LEN_BYTE_ARRAY => {
                // largest base-10 number representable in length bytes of
                // two's complement
                (2f64.powi(8 * self.length - 1) - 1f64).log10().floor() as i32
            }
            other => {
                return Err(schema_err!(
                    "DECIMAL cannot be stored as {} in field '{}'",
                    other,
                    self.name
                ))
            }
        };
        if precision > max_precision {
            return Err(schema_err!(
                "DECIMAL precision {} exceeds what {} can hold in field '{}'",
                precision,
                self.physical_type,
                self.name
            ));
        }
        Ok(())
    }
}

/// Builder for group nodes.
pub struct GroupTypeBuilder {
    name: String,
    repetition: Option<Repetition>,
    converted_type: Option<ConvertedType>,
    logical_type: Option<LogicalType>,
    fields: Vec<TypePtr>,
    id: Option<i32>,
}

impl GroupTypeBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            repetition: None,
            converted_type: None,
            logical_type: None,
            fields: Vec::new(),
            id: None,
        }
    }

    pub fn with_repetition(mut self, repetition: Repetition) -> Self {
        self.repetition = Some(repetition);
        self
    }

    pub fn with_converted_type(mut self, converted_type: ConvertedType) -> Self {
        self.converted_type = Some(converted_type);
        self
    }

    pub fn with_logical_type(mut self, logical_type: LogicalType) -> Self {
        if self.converted_type.is_none() {
            self.converted_type = logical_type.converted_type();
        }
        self.logical_type = Some(logical_type);
        self
    }

    pub fn with_fields(mut self, fields: Vec<TypePtr>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_id(mut self, id: i32) -> Self {
        self.id = Some(id);
        self
    }

    pub fn build(self) -> Result<Type> {
        for (i, field) in self.fields.iter().enumerate() {
            for other in &self.fields[i + 1..] {
                if field.name() == other.name() {
                    return Err(schema_err!(
                        "duplicate field name '{}' in group '{}'",
                        field.name(),
                        self.name
                    ));
                }
            }
        }
        Ok(Type::GroupType {
            basic_info: BasicTypeInfo {
                name: self.name,
                repetition: self.repetition,
                converted_type: self.converted_type,
                logical_type: self.logical_type,
                id: self.id,
            },
            fields: self.fields,
        })
    }
}

/// Dot-separated path from the schema root to a leaf.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnPath {
    parts: Vec<String>,
}

impl ColumnPath {
    pub fn new(parts: Vec<String>) -> Self {
        Self { parts }
    }

    pub fn string(&self) -> String {
        self.parts.join(".")
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }
}

impl fmt::Display for ColumnPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.string())
    }
}

impl From<&str> for ColumnPath {
    fn from(single_path: &str) -> Self {
        Self {
            parts: single_path.split('.').map(|s| s.to_owned()).collect(),
        }
    }
}

impl From<String> for ColumnPath {
    fn from(single_path: String) -> Self {
        ColumnPath::from(single_path.as_str())
    }
}

/// A leaf column with its maximum repetition and definition levels and the
/// path from the root.
#[derive(Debug, PartialEq)]
pub struct ColumnDescriptor {
    primitive_type: TypePtr,
    max_def_level: i16,
    max_rep_level: i16,
    path: ColumnPath,
}

impl ColumnDescriptor {
    pub fn new(
        primitive_type: TypePtr,
        max_def_level: i16,
        max_rep_level: i16,
        path: ColumnPath,
    ) -> Self {
        Self {
            primitive_type,
            max_def_level,
            max_rep_level,
            path,
        }
    }

    /// Maximum definition level: the number of OPTIONAL or REPEATED nodes
    /// along the path, counting the leaf itself when it is not REQUIRED.
    pub fn max_def_level(&self) -> i16 {
        self.max_def_level
    }

    /// Maximum repetition level: the number of REPEATED nodes along the
    /// path, counting the leaf itself.
    pub fn max_rep_level(&self) -> i16 {
        self.max_rep_level
    }

    pub fn path(&self) -> &ColumnPath {
        &self.path
    }

    pub fn self_type(&self) -> &Type {
        self.primitive_type.as_ref()
    }

    pub fn name(&self) -> &str {
        self.primitive_type.name()
    }

    pub fn physical_type(&self) -> PhysicalType {
        self.primitive_type.get_physical_type()
    }

    pub fn logical_type(&self) -> Option<&LogicalType> {
        self.primitive_type.get_basic_info().logical_type()
    }

    pub fn converted_type(&self) -> Option<ConvertedType> {
        self.primitive_type.get_basic_info().converted_type()
    }

    pub fn type_length(&self) -> i32 {
        self.primitive_type.get_type_length()
    }

    pub fn type_precision(&self) -> i32 {
        self.primitive_type.get_precision()
    }

    pub fn type_scale(&self) -> i32 {
        self.primitive_type.get_scale()
    }

    /// Statistics sort order for this column.
    pub fn sort_order(&self) -> SortOrder {
        column_sort_order(
            self.logical_type(),
            self.converted_type(),
            self.physical_type(),
        )
    }
}

/// A schema tree together with the flat, pre-order list of its leaf columns.
#[derive(Debug)]
pub struct SchemaDescriptor {
    schema: TypePtr,
    leaves: Vec<ColumnDescPtr>,
}

impl SchemaDescriptor {
    /// Derives the column descriptors for `tp`, which must be a group (the
    /// message root).
    pub fn new(tp: TypePtr) -> Self {
        assert!(tp.is_group(), "the root of a schema must be a group type");
        let mut leaves = Vec::new();
        for field in tp.get_fields() {
            build_leaves(field, 0, 0, &mut vec![], &mut leaves);
        }
        Self { schema: tp, leaves }
    }

    pub fn num_columns(&self) -> usize {
        self.leaves.len()
    }

    /// Descriptor of the `i`-th leaf, in pre-order.
    pub fn column(&self, i: usize) -> ColumnDescPtr {
        self.leaves[i].clone()
    }

    pub fn columns(&self) -> &[ColumnDescPtr] {
        &self.leaves
    }

    pub fn root_schema(&self) -> &Type {
        self.schema.as_ref()
    }

    pub fn root_schema_ptr(&self) -> TypePtr {
        self.schema.clone()
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }
}

fn build_leaves(
    tp: &TypePtr,
    mut max_rep_level: i16,
    mut max_def_level: i16,
    path_so_far: &mut Vec<String>,
    leaves: &mut Vec<ColumnDescPtr>,
) {
    match tp.get_basic_info().repetition() {
        Repetition::REQUIRED => {}
        Repetition::OPTIONAL => max_def_level += 1,
        Repetition::REPEATED => {
            max_def_level += 1;
            max_rep_level += 1;
        }
    }

    path_so_far.push(tp.name().to_owned());
    match tp.as_ref() {
        Type::PrimitiveType { .. } => {
            leaves.push(Arc::new(ColumnDescriptor::new(
                tp.clone(),
                max_def_level,
                max_rep_level,
                ColumnPath::new(path_so_far.clone()),
            )));
        }
        Type::GroupType { fields, .. } => {
            for field in fields {
                build_leaves(field, max_rep_level, max_def_level, path_so_far, leaves);
            }
        }
    }
    path_so_far.pop();
}

/// Flattens a schema tree into the depth-first [`SchemaElement`] list the
/// footer carries.
pub(crate) fn to_flat_elements(schema: &Type) -> Result<Vec<SchemaElement>> {
    if !schema.is_group() {
        return Err(schema_err!("the root of a schema must be a group type"));
    }
    let mut elements = Vec::with_capacity(schema.num_nodes());
    flatten_into(schema, &mut elements);
    Ok(elements)
}

fn flatten_into(node: &Type, elements: &mut Vec<SchemaElement>) {
    let info = node.get_basic_info();
    match node {
        Type::PrimitiveType {
            physical_type,
            type_length,
            scale,
            precision,
            ..
        } => {
            elements.push(SchemaElement {
                r#type: Some(*physical_type),
                type_length: (*type_length >= 0).then_some(*type_length),
                repetition_type: Some(info.repetition()),
                name: info.name().to_owned(),
                num_children: None,
                converted_type: info.converted_type(),
                scale: (*scale >= 0).then_some(*scale),
                precision: (*precision >= 0).then_some(*precision),
                field_id: info.id(),
                logical_type: info.logical_type().cloned(),
            });
        }
        Type::GroupType { fields, .. } => {
            elements.push(SchemaElement {
                r#type: None,
                type_length: None,
                repetition_type: info.has_repetition().then(|| info.repetition()),
                name: info.name().to_owned(),
                num_children: Some(fields.len() as i32),
                converted_type: info.converted_type(),
                scale: None,
                precision: None,
                field_id: info.id(),
                logical_type: info.logical_type().cloned(),
            });
            for field in fields {
                flatten_into(field, elements);
            }
        }
    }
}
