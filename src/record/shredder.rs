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

//! Dremel record shredding: translates [`RecordConsumer`] events into
//! per-column ⟨repetition, definition, value⟩ triples.
//!
//! The shredder walks an arena-allocated mirror of the schema tree. For
//! every level of open groups it keeps the current repetition context and a
//! mark per child field; when a group or the message ends, fields that were
//! never written get a null triple at the definition level of the deepest
//! ancestor that was actually present.

use crate::basic::{Repetition, Type as PhysicalType};
use crate::column::write_store::ColumnWriteStore;
use crate::data_type::{ByteArray, Int96};
use crate::errors::Result;
use crate::record::consumer::RecordConsumer;
use crate::schema::types::{SchemaDescPtr, Type};

/// Destination of shredded triples, one method per physical type plus
/// nulls. Implemented by the column write store; tests substitute a
/// recording sink.
pub(crate) trait TripleSink {
    fn write_null(&mut self, column: usize, rep_level: i16, def_level: i16) -> Result<()>;
    fn write_bool(&mut self, column: usize, value: bool, rep_level: i16, def_level: i16)
        -> Result<()>;
    fn write_i32(&mut self, column: usize, value: i32, rep_level: i16, def_level: i16)
        -> Result<()>;
    fn write_i64(&mut self, column: usize, value: i64, rep_level: i16, def_level: i16)
        -> Result<()>;
    fn write_int96(
        &mut self,
        column: usize,
        value: Int96,
        rep_level: i16,
        def_level: i16,
    ) -> Result<()>;
    fn write_f32(&mut self, column: usize, value: f32, rep_level: i16, def_level: i16)
        -> Result<()>;
    fn write_f64(&mut self, column: usize, value: f64, rep_level: i16, def_level: i16)
        -> Result<()>;
    fn write_bytes(
        &mut self,
        column: usize,
        value: ByteArray,
        rep_level: i16,
        def_level: i16,
    ) -> Result<()>;
    /// Marks a record boundary.
    fn end_record(&mut self) -> Result<()>;
}

impl TripleSink for ColumnWriteStore {
    fn write_null(&mut self, column: usize, rep_level: i16, def_level: i16) -> Result<()> {
        self.column_writer(column).write_null(rep_level, def_level)
    }

    fn write_bool(
        &mut self,
        column: usize,
        value: bool,
        rep_level: i16,
        def_level: i16,
    ) -> Result<()> {
        self.column_writer(column).write_bool(value, rep_level, def_level)
    }

    fn write_i32(
        &mut self,
        column: usize,
        value: i32,
        rep_level: i16,
        def_level: i16,
    ) -> Result<()> {
        self.column_writer(column).write_i32(value, rep_level, def_level)
    }

    fn write_i64(
        &mut self,
        column: usize,
        value: i64,
        rep_level: i16,
        def_level: i16,
    ) -> Result<()> {
        self.column_writer(column).write_i64(value, rep_level, def_level)
    }

    fn write_int96(
        &mut self,
        column: usize,
        value: Int96,
        rep_level: i16,
        def_level: i16,
    ) -> Result<()> {
        self.column_writer(column)
            .write_int96(value, rep_level, def_level)
    }

    fn write_f32(
        &mut self,
        column: usize,
        value: f32,
        rep_level: i16,
        def_level: i16,
    ) -> Result<()> {
        self.column_writer(column).write_f32(value, rep_level, def_level)
    }

    fn write_f64(
        &mut self,
        column: usize,
        value: f64,
        rep_level: i16,
        def_level: i16,
    ) -> Result<()> {
        self.column_writer(column).write_f64(value, rep_level, def_level)
    }

    fn write_bytes(
        &mut self,
        column: usize,
        value: ByteArray,
        rep_level: i16,
        def_level: i16,
    ) -> Result<()> {
        self.column_writer(column)
            .write_bytes(value, rep_level, def_level)
    }

    fn end_record(&mut self) -> Result<()> {
        ColumnWriteStore::end_record(self)
    }
}

// One node of the arena-allocated schema mirror.
struct IoNode {
    name: String,
    /// Maximum definition level at this node.
    def_level: i16,
    /// Maximum repetition level at this node.
    rep_level: i16,
    /// Arena ids of children; empty for leaves.
    children: Vec<usize>,
    parent: usize,
    index_in_parent: usize,
    /// Leaf column index in schema order, for primitives.
    column: Option<usize>,
    physical_type: Option<PhysicalType>,
}

/// Shreds a stream of record events into a [`TripleSink`].
pub struct MessageShredder<S = ColumnWriteStore> {
    nodes: Vec<IoNode>,
    root: usize,
    sink: S,

    /// Id of the node the event stream is positioned on: a group between
    /// fields, or the entered child after `start_field`.
    current: usize,
    /// Depth of open groups; 0 is the message itself.
    level: usize,
    /// Per-level repetition context: the level at which the next value
    /// continues its enclosing lists.
    rep_context: Vec<i16>,
    /// Per-level marks of which child fields were written in the current
    /// instance.
    fields_written: Vec<Vec<bool>>,
    /// Set by `start_field`, cleared by any value or group instance; an
    /// empty field is a schema violation.
    empty_field: bool,
    in_message: bool,
}

impl<S: TripleSink> MessageShredder<S> {
    /// Builds the schema mirror for `schema` and binds it to `sink`.
    pub(crate) fn new(schema: &SchemaDescPtr, sink: S) -> Self {
        let mut nodes = Vec::new();
        let mut next_column = 0;
        let root = build_io_tree(
            schema.root_schema(),
            0,
            0,
            0,
            0,
            true,
            &mut nodes,
            &mut next_column,
        );
        debug_assert_eq!(next_column, schema.num_columns());
        Self {
            nodes,
            root,
            sink,
            current: root,
            level: 0,
            rep_context: Vec::new(),
            fields_written: Vec::new(),
            empty_field: false,
            in_message: false,
        }
    }

    /// Gives the sink back, e.g. to flush the row group it buffers.
    pub(crate) fn into_sink(self) -> S {
        self.sink
    }

    pub(crate) fn sink(&self) -> &S {
        &self.sink
    }

    /// True between `start_message` and `end_message`.
    pub(crate) fn in_message(&self) -> bool {
        self.in_message
    }

    fn node(&self, id: usize) -> &IoNode {
        &self.nodes[id]
    }

    fn set_level_state(&mut self, level: usize, rep: i16, num_fields: usize) {
        if self.rep_context.len() <= level {
            self.rep_context.resize(level + 1, 0);
            self.fields_written.resize(level + 1, Vec::new());
        }
        self.rep_context[level] = rep;
        let marks = &mut self.fields_written[level];
        marks.clear();
        marks.resize(num_fields, false);
    }

    /// Emits null triples for every unwritten child field of the group at
    /// the current level, at this group's definition level.
    fn write_nulls_for_missing_fields(&mut self) -> Result<()> {
        let group = self.current;
        let def_level = self.node(group).def_level;
        let rep_level = self.rep_context[self.level];
        for position in 0..self.node(group).children.len() {
            if self.fields_written[self.level][position] {
                continue;
            }
            let child = self.node(group).children[position];
            self.write_nulls_to_leaves(child, rep_level, def_level)?;
        }
        Ok(())
    }

    fn write_nulls_to_leaves(&mut self, node_id: usize, rep: i16, def: i16) -> Result<()> {
        match self.node(node_id).column {
            Some(column) => self.sink.write_null(column, rep, def),
            None => {
                for position in 0..self.node(node_id).children.len() {
                    let child = self.node(node_id).children[position];
                    self.write_nulls_to_leaves(child, rep, def)?;
                }
                Ok(())
            }
        }
    }

    fn expect_leaf(&self, physical_type: PhysicalType) -> Result<(usize, i16, i16)> {
        if !self.in_message {
            return Err(schema_err!("value added outside of a message"));
        }
        let node = self.node(self.current);
        match (node.column, node.physical_type) {
            (Some(column), Some(actual)) if actual == physical_type => {
                Ok((column, self.rep_context[self.level], node.def_level))
            }
            (Some(_), Some(actual)) => Err(schema_err!(
                "field '{}' stores {} values, not {}",
                node.name,
                actual,
                physical_type
            )),
            _ => Err(schema_err!(
                "cannot add a value to group field '{}'",
                node.name
            )),
        }
    }

    /// Post-value bookkeeping shared by all add methods: the field is
    /// non-empty, and further values in it continue at the leaf's own
    /// repetition level.
    fn value_written(&mut self) {
        self.empty_field = false;
        let leaf_rep = self.node(self.current).rep_level;
        self.rep_context[self.level] = leaf_rep;
    }
}

impl<S: TripleSink> RecordConsumer for MessageShredder<S> {
    fn start_message(&mut self) -> Result<()> {
        if self.in_message {
            return Err(schema_err!("previous message was not ended"));
        }
        self.in_message = true;
        self.current = self.root;
        self.level = 0;
        let num_fields = self.node(self.root).children.len();
        self.set_level_state(0, 0, num_fields);
        Ok(())
    }

    fn start_field(&mut self, name: &str, index: usize) -> Result<()> {
        if !self.in_message {
            return Err(schema_err!("field started outside of a message"));
        }
        let node = self.node(self.current);
        if node.column.is_some() {
            return Err(schema_err!(
                "cannot start a field inside primitive field '{}'",
                node.name
            ));
        }
        let child = *node.children.get(index).ok_or_else(|| {
            schema_err!(
                "group '{}' has {} fields, no field at index {}",
                node.name,
                node.children.len(),
                index
            )
        })?;
        if self.node(child).name != name {
            return Err(schema_err!(
                "expected field '{}' at index {} of group '{}', got '{}'",
                self.node(child).name,
                index,
                self.node(self.current).name,
                name
            ));
        }
        self.current = child;
        self.empty_field = true;
        Ok(())
    }

    fn end_field(&mut self) -> Result<()> {
        if !self.in_message || self.current == self.root {
            return Err(schema_err!("no field is open"));
        }
        if self.empty_field {
            return Err(schema_err!(
                "empty field '{}': omit the field instead of writing nothing",
                self.node(self.current).name
            ));
        }
        let index = self.node(self.current).index_in_parent;
        self.current = self.node(self.current).parent;
        self.fields_written[self.level][index] = true;
        let enclosing_rep = if self.level == 0 {
            0
        } else {
            self.rep_context[self.level - 1]
        };
        self.rep_context[self.level] = enclosing_rep;
        Ok(())
    }

    fn start_group(&mut self) -> Result<()> {
        if !self.in_message {
            return Err(schema_err!("group started outside of a message"));
        }
        let node = self.node(self.current);
        if node.column.is_some() {
            return Err(schema_err!(
                "field '{}' is primitive, not a group",
                node.name
            ));
        }
        if self.current == self.root {
            return Err(schema_err!("a field must be started before its group"));
        }
        let num_fields = node.children.len();
        self.level += 1;
        let enclosing_rep = self.rep_context[self.level - 1];
        self.set_level_state(self.level, enclosing_rep, num_fields);
        Ok(())
    }

    fn end_group(&mut self) -> Result<()> {
        if !self.in_message || self.level == 0 {
            return Err(schema_err!("no group is open"));
        }
        self.empty_field = false;
        self.write_nulls_for_missing_fields()?;
        self.level -= 1;
        // the next instance of this repeated group continues its list
        let group_rep = self.node(self.current).rep_level;
        self.rep_context[self.level] = group_rep;
        Ok(())
    }

    fn add_boolean(&mut self, value: bool) -> Result<()> {
        let (column, rep, def) = self.expect_leaf(PhysicalType::BOOLEAN)?;
        self.sink.write_bool(column, value, rep, def)?;
        self.value_written();
        Ok(())
    }

    fn add_int32(&mut self, value: i32) -> Result<()> {
        let (column, rep, def) = self.expect_leaf(PhysicalType::INT32)?;
        self.sink.write_i32(column, value, rep, def)?;
        self.value_written();
        Ok(())
    }

    fn add_int64(&mut self, value: i64) -> Result<()> {
        let (column, rep, def) = self.expect_leaf(PhysicalType::INT64)?;
        self.sink.write_i64(column, value, rep, def)?;
        self.value_written();
        Ok(())
    }

    fn add_int96(&mut self, value: Int96) -> Result<()> {
        let (column, rep, def) = self.expect_leaf(PhysicalType::INT96)?;
        self.sink.write_int96(column, value, rep, def)?;
        self.value_written();
        Ok(())
    }

    fn add_float(&mut self, value: f32) -> Result<()> {
        let (column, rep, def) = self.expect_leaf(PhysicalType::FLOAT)?;
        self.sink.write_f32(column, value, rep, def)?;
        self.value_written();
        Ok(())
    }

    fn add_double(&mut self, value: f64) -> Result<()> {
        let (column, rep, def) = self.expect_leaf(PhysicalType::DOUBLE)?;
        self.sink.write_f64(column, value, rep, def)?;
        self.value_written();
        Ok(())
    }

    fn add_bytes(&mut self, value: ByteArray) -> Result<()> {
        if !self.in_message {
            return Err(schema_err!("value added outside of a message"));
        }
        let node = self.node(self.current);
        let (column, physical) = match (node.column, node.physical_type) {
            (Some(column), Some(physical)) => (column, physical),
            _ => {
                return Err(schema_err!(
                    "cannot add a value to group field '{}'",
                    node.name
                ))
            }
        };
        if physical != PhysicalType::BYTE_ARRAY && physical != PhysicalType::FIXED_LEN_BYTE_ARRAY
        {
            return Err(schema_err!(
                "field '{}' stores {} values, not BYTE_ARRAY",
                node.name,
                physical
            ));
        }
        let (rep, def) = (self.rep_context[self.level], node.def_level);
        self.sink.write_bytes(column, value, rep, def)?;
        self.value_written();
        Ok(())
    }

    fn end_message(&mut self) -> Result<()> {
        if !self.in_message {
            return Err(schema_err!("no message is open"));
        }
        if self.level != 0 || self.current != self.root {
            return Err(schema_err!(
                "message ended with unbalanced fields or groups"
            ));
        }
        self.write_nulls_for_missing_fields()?;
        self.in_message = false;
        self.sink.end_record()
    }
}

/// Builds the arena mirror of the schema tree, assigning definition and
/// repetition levels and leaf column indices in schema order.
#[allow(clippy::too_many_arguments)]
fn build_io_tree(
    tp: &Type,
    parent: usize,
    index_in_parent: usize,
    parent_def: i16,
    parent_rep: i16,
    is_root: bool,
    nodes: &mut Vec<IoNode>,
    next_column: &mut usize,
) -> usize {
    let repetition = if is_root {
        Repetition::REQUIRED
    } else {
        tp.get_basic_info().repetition()
    };
    let (def_level, rep_level) = match repetition {
        Repetition::REQUIRED => (parent_def, parent_rep),
        Repetition::OPTIONAL => (parent_def + 1, parent_rep),
        Repetition::REPEATED => (parent_def + 1, parent_rep + 1),
    };

    let id = nodes.len();
    nodes.push(IoNode {
        name: tp.name().to_owned(),
        def_level,
        rep_level,
        children: Vec::new(),
        parent,
        index_in_parent,
        column: None,
        physical_type: None,
    });

    match tp {
        Type::PrimitiveType { physical_type, .. } => {
            nodes[id].column = Some(*next_column);
            nodes[id].physical_type = Some(*physical_type);
            *next_column += 1;
        }
        Type::GroupType { fields, .. } => {
            for (position, field) in fields.iter().enumerate() {
                let child = build_io_tree(
                    field,
                    id,
                    position,
                    def_level,
                    rep_level,
                    false,
                    nodes,
                    next_column,
                );
                nodes[id].children.push(child);
            }
        }
    }
    id
}
