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

//! Typed min/max/null-count statistics and the comparison strategy that
//! orders them.
//!
//! A column's ordering is fixed by its schema annotations, so it is resolved
//! exactly once into a [`TypedComparator`] when a writer is created: signed
//! numerics by value, unsigned logical types as unsigned integers, byte
//! arrays lexicographically on unsigned bytes, decimals as big-endian two's
//! complement. Float NaNs sit outside every order and never enter min/max.

use std::marker::PhantomData;

use crate::basic::{SortOrder, Type};
use crate::data_type::private::ParquetValueType;
use crate::data_type::{AsBytes, ByteArray, FixedLenByteArray, Int96};
use crate::format;
use crate::schema::types::ColumnDescriptor;

/// Builds the [`Statistics`] enum variant for a value type.
pub(crate) mod private {
    use super::*;

    pub trait MakeStatistics {
        fn make_statistics(statistics: ValueStatistics<Self>) -> Statistics
        where
            Self: Sized;
    }

    macro_rules! gen_make_statistics {
        ($value_ty:ty, $stat:ident) => {
            impl MakeStatistics for $value_ty {
                fn make_statistics(statistics: ValueStatistics<Self>) -> Statistics {
                    Statistics::$stat(statistics)
                }
            }
        };
    }

    gen_make_statistics!(bool, Boolean);
    gen_make_statistics!(i32, Int32);
    gen_make_statistics!(i64, Int64);
    gen_make_statistics!(Int96, Int96);
    gen_make_statistics!(f32, Float);
    gen_make_statistics!(f64, Double);
    gen_make_statistics!(ByteArray, ByteArray);
    gen_make_statistics!(FixedLenByteArray, FixedLenByteArray);
}

/// Statistics for one column chunk or page, typed by the physical type.
#[derive(Debug, Clone, PartialEq)]
pub enum Statistics {
    Boolean(ValueStatistics<bool>),
    Int32(ValueStatistics<i32>),
    Int64(ValueStatistics<i64>),
    Int96(ValueStatistics<Int96>),
    Float(ValueStatistics<f32>),
    Double(ValueStatistics<f64>),
    ByteArray(ValueStatistics<ByteArray>),
    FixedLenByteArray(ValueStatistics<FixedLenByteArray>),
}

macro_rules! statistics_enum_func {
    ($self:ident, $func:ident) => {{
        match $self {
            Statistics::Boolean(typed) => typed.$func(),
            Statistics::Int32(typed) => typed.$func(),
            Statistics::Int64(typed) => typed.$func(),
            Statistics::Int96(typed) => typed.$func(),
            Statistics::Float(typed) => typed.$func(),
            Statistics::Double(typed) => typed.$func(),
            Statistics::ByteArray(typed) => typed.$func(),
            Statistics::FixedLenByteArray(typed) => typed.$func(),
        }
    }};
}

impl Statistics {
    pub fn new<T: ParquetValueType>(
        min: Option<T>,
        max: Option<T>,
        distinct_count: Option<u64>,
        null_count: u64,
    ) -> Self {
        T::make_statistics(ValueStatistics::new(min, max, distinct_count, null_count))
    }

    /// Physical type of the values these statistics describe.
    pub fn physical_type(&self) -> Type {
        match self {
            Statistics::Boolean(_) => Type::BOOLEAN,
            Statistics::Int32(_) => Type::INT32,
            Statistics::Int64(_) => Type::INT64,
            Statistics::Int96(_) => Type::INT96,
            Statistics::Float(_) => Type::FLOAT,
            Statistics::Double(_) => Type::DOUBLE,
            Statistics::ByteArray(_) => Type::BYTE_ARRAY,
            Statistics::FixedLenByteArray(_) => Type::FIXED_LEN_BYTE_ARRAY,
        }
    }

    /// The minimum as plain-encoded bytes (no length prefix), if known.
    pub fn min_bytes_opt(&self) -> Option<&[u8]> {
        statistics_enum_func![self, min_bytes_opt]
    }

    /// The maximum as plain-encoded bytes (no length prefix), if known.
    pub fn max_bytes_opt(&self) -> Option<&[u8]> {
        statistics_enum_func![self, max_bytes_opt]
    }

    pub fn null_count(&self) -> u64 {
        statistics_enum_func![self, null_count]
    }

    pub fn distinct_count_opt(&self) -> Option<u64> {
        statistics_enum_func![self, distinct_count_opt]
    }

    pub(crate) fn is_min_max_backwards_compatible(&self) -> bool {
        statistics_enum_func![self, is_min_max_backwards_compatible]
    }
}

impl<T: ParquetValueType> From<ValueStatistics<T>> for Statistics {
    fn from(value: ValueStatistics<T>) -> Self {
        T::make_statistics(value)
    }
}

/// Typed statistics values for one column chunk or page.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueStatistics<T> {
    min: Option<T>,
    max: Option<T>,
    distinct_count: Option<u64>,
    null_count: u64,
    /// Whether min/max may also fill the deprecated signed `min`/`max`
    /// fields for old readers; only sound for signed sort orders.
    backwards_compatible_min_max: bool,
}

impl<T: ParquetValueType> ValueStatistics<T> {
    pub fn new(
        min: Option<T>,
        max: Option<T>,
        distinct_count: Option<u64>,
        null_count: u64,
    ) -> Self {
        Self {
            min,
            max,
            distinct_count,
            null_count,
            backwards_compatible_min_max: false,
        }
    }

    pub fn with_backwards_compatible_min_max(self, backwards_compatible: bool) -> Self {
        Self {
            backwards_compatible_min_max: backwards_compatible,
            ..self
        }
    }

    pub fn min_opt(&self) -> Option<&T> {
        self.min.as_ref()
    }

    pub fn max_opt(&self) -> Option<&T> {
        self.max.as_ref()
    }

    pub fn min_bytes_opt(&self) -> Option<&[u8]> {
        self.min_opt().map(AsBytes::as_bytes)
    }

    pub fn max_bytes_opt(&self) -> Option<&[u8]> {
        self.max_opt().map(AsBytes::as_bytes)
    }

    pub fn null_count(&self) -> u64 {
        self.null_count
    }

    pub fn distinct_count_opt(&self) -> Option<u64> {
        self.distinct_count
    }

    fn is_min_max_backwards_compatible(&self) -> bool {
        self.backwards_compatible_min_max
    }

    /// Folds `other` into `self` for a multi-page rollup: min/max under the
    /// column's comparator, null counts summed, distinct counts dropped
    /// (they do not compose).
    pub fn merge(&mut self, other: &Self, comparator: &TypedComparator<T>) {
        let mut spanned = MinMax {
            min: self.min.take(),
            max: self.max.take(),
        };
        if let Some(min) = &other.min {
            comparator.observe(min, &mut spanned);
        }
        if let Some(max) = &other.max {
            comparator.observe(max, &mut spanned);
        }
        (self.min, self.max) = spanned.into_inner();
        self.null_count += other.null_count;
        self.distinct_count = None;
    }
}

/// Serializes statistics for a page header or the column chunk metadata.
pub(crate) fn to_thrift(stats: Option<&Statistics>) -> Option<format::Statistics> {
    let stats = stats?;

    let min = stats.min_bytes_opt().map(|b| b.to_vec());
    let max = stats.max_bytes_opt().map(|b| b.to_vec());

    let mut thrift_stats = format::Statistics {
        max: None,
        min: None,
        null_count: Some(stats.null_count() as i64),
        distinct_count: stats.distinct_count_opt().map(|v| v as i64),
        max_value: max.clone(),
        min_value: min.clone(),
        is_max_value_exact: max.is_some().then_some(true),
        is_min_value_exact: min.is_some().then_some(true),
    };

    if stats.is_min_max_backwards_compatible() {
        // old readers understand only the deprecated fields, which assume a
        // signed order
        thrift_stats.min = min;
        thrift_stats.max = max;
    }

    Some(thrift_stats)
}

// The concrete orders a column can obey. Exactly one is picked per column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueOrder {
    /// false before true.
    Boolean,
    /// Two's-complement integer value.
    SignedInteger,
    /// Integer bits reinterpreted as unsigned.
    UnsignedInteger,
    /// IEEE 754 order with NaN outside it.
    Float32,
    /// IEEE 754 order with NaN outside it.
    Float64,
    /// Unsigned lexicographic byte order.
    Bytes,
    /// Big-endian two's-complement byte order (decimals).
    TwosComplementBytes,
}

/// Compares values of one column under its resolved order.
///
/// Built once per column writer; comparisons never have to re-inspect the
/// schema annotations.
#[derive(Debug)]
pub(crate) struct TypedComparator<T> {
    order: ValueOrder,
    values: PhantomData<T>,
}

impl<T> Clone for TypedComparator<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TypedComparator<T> {}

impl<T: ParquetValueType> TypedComparator<T> {
    /// Resolves the order for a column from its sort order and physical
    /// type.
    pub fn for_column(descr: &ColumnDescriptor) -> Self {
        let order = match T::PHYSICAL_TYPE {
            Type::BOOLEAN => ValueOrder::Boolean,
            Type::FLOAT => ValueOrder::Float32,
            Type::DOUBLE => ValueOrder::Float64,
            Type::INT32 | Type::INT64 => match descr.sort_order() {
                SortOrder::UNSIGNED => ValueOrder::UnsignedInteger,
                _ => ValueOrder::SignedInteger,
            },
            Type::BYTE_ARRAY | Type::FIXED_LEN_BYTE_ARRAY => match descr.sort_order() {
                SortOrder::SIGNED => ValueOrder::TwosComplementBytes,
                _ => ValueOrder::Bytes,
            },
            // INT96 has no defined order; raw bytes keep accumulation
            // deterministic, and its min/max are never written out
            Type::INT96 => ValueOrder::Bytes,
        };
        Self {
            order,
            values: PhantomData,
        }
    }

    /// `a > b` under the column's order.
    pub fn greater(&self, a: &T, b: &T) -> bool {
        match self.order {
            ValueOrder::Boolean | ValueOrder::UnsignedInteger => {
                a.as_u64().unwrap_or(0) > b.as_u64().unwrap_or(0)
            }
            ValueOrder::SignedInteger => a.as_i64().unwrap_or(0) > b.as_i64().unwrap_or(0),
            ValueOrder::Float32 => le_f32(a) > le_f32(b),
            ValueOrder::Float64 => le_f64(a) > le_f64(b),
            ValueOrder::Bytes => a.as_bytes() > b.as_bytes(),
            ValueOrder::TwosComplementBytes => {
                greater_twos_complement(a.as_bytes(), b.as_bytes())
            }
        }
    }

    // Float NaNs sit outside the order and never participate in min/max.
    fn unordered(&self, value: &T) -> bool {
        match self.order {
            ValueOrder::Float32 => le_f32(value).is_nan(),
            ValueOrder::Float64 => le_f64(value).is_nan(),
            _ => false,
        }
    }

    /// Folds one value into a running min/max.
    pub fn observe(&self, value: &T, acc: &mut MinMax<T>) {
        if self.unordered(value) {
            return;
        }
        if acc.min.as_ref().map_or(true, |min| self.greater(min, value)) {
            acc.min = Some(value.clone());
        }
        if acc.max.as_ref().map_or(true, |max| self.greater(value, max)) {
            acc.max = Some(value.clone());
        }
    }

    /// Folds every value of a slice into a running min/max.
    pub fn observe_all(&self, values: &[T], acc: &mut MinMax<T>) {
        for value in values {
            self.observe(value, acc);
        }
    }

    /// Folds the bounds of one accumulator (e.g. a page's) into another
    /// (its chunk's).
    pub fn absorb(&self, from: &MinMax<T>, into: &mut MinMax<T>) {
        if let Some(min) = from.min() {
            self.observe(min, into);
        }
        if let Some(max) = from.max() {
            self.observe(max, into);
        }
    }
}

/// Running min/max over the values a page or chunk has seen. Empty until a
/// comparable value arrives (all-null or all-NaN input leaves it empty).
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct MinMax<T> {
    min: Option<T>,
    max: Option<T>,
}

impl<T> MinMax<T> {
    pub fn new() -> Self {
        Self {
            min: None,
            max: None,
        }
    }

    pub fn min(&self) -> Option<&T> {
        self.min.as_ref()
    }

    pub fn max(&self) -> Option<&T> {
        self.max.as_ref()
    }

    /// Takes the accumulated bounds, leaving the accumulator empty.
    pub fn take(&mut self) -> Self {
        std::mem::replace(self, Self::new())
    }

    pub fn into_inner(self) -> (Option<T>, Option<T>) {
        (self.min, self.max)
    }
}

fn le_f32<T: AsBytes>(value: &T) -> f32 {
    f32::from_le_bytes(value.as_bytes().try_into().unwrap())
}

fn le_f64<T: AsBytes>(value: &T) -> f64 {
    f64::from_le_bytes(value.as_bytes().try_into().unwrap())
}

/// Signed comparison of big-endian two's-complement byte arrays of possibly
/// different lengths.
fn greater_twos_complement(a: &[u8], b: &[u8]) -> bool {
    if a.is_empty() || b.is_empty() {
        return !a.is_empty();
    }

    let first_a = a[0];
    let first_b = b[0];

    // different signs, or equal lengths with differing leading bytes,
    // resolve on the first byte (sign extension makes 0xFF10 equal 0x10)
    if (0x80 & first_a) != (0x80 & first_b) || (a.len() == b.len() && first_a != first_b) {
        return (first_a as i8) > (first_b as i8);
    }

    let negative = (first_a as i8) < 0;
    let extension: u8 = if negative { 0xff } else { 0 };

    if a.len() != b.len() {
        let (longer, longer_is_a) = if a.len() > b.len() {
            (&a[..a.len() - b.len()], true)
        } else {
            (&b[..b.len() - a.len()], false)
        };
        if longer.iter().any(|&x| x != extension) {
            // the longer value has significant leading bytes
            return if negative { !longer_is_a } else { longer_is_a };
        }
        // compare the aligned tails
        let (tail_a, tail_b) = if longer_is_a {
            (&a[a.len() - b.len()..], b)
        } else {
            (a, &b[b.len() - a.len()..])
        };
        if tail_a[0] != tail_b[0] {
            // the tail comparison is signed on its leading byte only when the
            // extension did not flip significance; treat as unsigned here
            return tail_a[0] > tail_b[0];
        }
        return tail_a[1..] > tail_b[1..];
    }

    a[1..] > b[1..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::{LogicalType, Repetition};
    use crate::schema::types::{ColumnPath, Type as SchemaType};
    use std::sync::Arc;

    fn descr_of(tp: SchemaType) -> ColumnDescriptor {
        ColumnDescriptor::new(Arc::new(tp), 0, 0, ColumnPath::from("c"))
    }

    fn plain_descr(physical: Type) -> ColumnDescriptor {
        let mut builder = SchemaType::primitive_type_builder("c", physical)
            .with_repetition(Repetition::REQUIRED);
        if physical == Type::FIXED_LEN_BYTE_ARRAY {
            builder = builder.with_length(4);
        }
        descr_of(builder.build().unwrap())
    }

    fn span<T: ParquetValueType>(
        comparator: &TypedComparator<T>,
        values: &[T],
    ) -> (Option<T>, Option<T>) {
        let mut acc = MinMax::new();
        comparator.observe_all(values, &mut acc);
        acc.into_inner()
    }

    #[test]
    fn test_signed_numeric_order() {
        let descr = plain_descr(Type::INT32);
        let comparator = TypedComparator::<i32>::for_column(&descr);
        let (min, max) = span(&comparator, &[5, -2, 9, 0]);
        assert_eq!(min, Some(-2));
        assert_eq!(max, Some(9));
    }

    #[test]
    fn test_unsigned_logical_order() {
        let descr = descr_of(
            SchemaType::primitive_type_builder("c", Type::INT32)
                .with_repetition(Repetition::REQUIRED)
                .with_logical_type(LogicalType::Integer {
                    bit_width: 32,
                    is_signed: false,
                })
                .build()
                .unwrap(),
        );
        let comparator = TypedComparator::<i32>::for_column(&descr);
        // -1 is u32::MAX under the unsigned order
        let (min, max) = span(&comparator, &[5, -1, 7]);
        assert_eq!(min, Some(5));
        assert_eq!(max, Some(-1));
    }

    #[test]
    fn test_nan_excluded() {
        let descr = plain_descr(Type::DOUBLE);
        let comparator = TypedComparator::<f64>::for_column(&descr);
        let (min, max) = span(&comparator, &[f64::NAN, 2.0, f64::NAN, 1.0]);
        assert_eq!(min, Some(1.0));
        assert_eq!(max, Some(2.0));

        // all-NaN input leaves the bounds unset
        let (min, max) = span(&comparator, &[f64::NAN, f64::NAN]);
        assert_eq!(min, None);
        assert_eq!(max, None);
    }

    #[test]
    fn test_zero_signs_compare_equal() {
        let descr = plain_descr(Type::DOUBLE);
        let comparator = TypedComparator::<f64>::for_column(&descr);
        assert!(!comparator.greater(&0.0, &-0.0));
        assert!(!comparator.greater(&-0.0, &0.0));
    }

    #[test]
    fn test_byte_array_unsigned_lexicographic() {
        let descr = plain_descr(Type::BYTE_ARRAY);
        let comparator = TypedComparator::<ByteArray>::for_column(&descr);
        let a = ByteArray::from(vec![0x7fu8]);
        let b = ByteArray::from(vec![0x80u8]);
        // unsigned: 0x80 > 0x7f despite being negative as i8
        assert!(comparator.greater(&b, &a));
        assert!(!comparator.greater(&a, &b));
    }

    #[test]
    fn test_decimal_two_complement_order() {
        let descr = descr_of(
            SchemaType::primitive_type_builder("c", Type::BYTE_ARRAY)
                .with_repetition(Repetition::REQUIRED)
                .with_logical_type(LogicalType::Decimal {
                    precision: 10,
                    scale: 2,
                })
                .build()
                .unwrap(),
        );
        let comparator = TypedComparator::<ByteArray>::for_column(&descr);
        let neg = ByteArray::from(vec![0xffu8, 0x38]); // -200
        let pos = ByteArray::from(vec![0x01u8, 0x2c]); // 300
        assert!(comparator.greater(&pos, &neg));
        assert!(!comparator.greater(&neg, &pos));

        // 0x38 alone is positive 56, shorter than its counterpart
        let short_pos = ByteArray::from(vec![0x38u8]);
        assert!(comparator.greater(&short_pos, &neg));

        // redundant 0xFF extension bytes do not change the value
        let extended = ByteArray::from(vec![0xffu8, 0xff, 0x38]);
        assert!(!comparator.greater(&extended, &neg));
        assert!(!comparator.greater(&neg, &extended));
    }

    #[test]
    fn test_merge() {
        let descr = plain_descr(Type::INT64);
        let comparator = TypedComparator::<i64>::for_column(&descr);
        let mut a = ValueStatistics::new(Some(3i64), Some(10), Some(4), 2);
        let b = ValueStatistics::new(Some(1i64), Some(7), Some(2), 5);
        a.merge(&b, &comparator);
        assert_eq!(a.min_opt(), Some(&1));
        assert_eq!(a.max_opt(), Some(&10));
        assert_eq!(a.null_count(), 7);
        // distinct counts do not compose across pages
        assert_eq!(a.distinct_count_opt(), None);
    }

    #[test]
    fn test_to_thrift_backwards_compatible() {
        let stats: Statistics = ValueStatistics::new(Some(1i32), Some(5), None, 0)
            .with_backwards_compatible_min_max(true)
            .into();
        let thrift = to_thrift(Some(&stats)).unwrap();
        assert_eq!(thrift.min_value, Some(vec![1, 0, 0, 0]));
        assert_eq!(thrift.min, Some(vec![1, 0, 0, 0]));
        assert_eq!(thrift.null_count, Some(0));

        let unsigned: Statistics =
            ValueStatistics::new(Some(ByteArray::from("a")), Some(ByteArray::from("b")), None, 1)
                .into();
        let thrift = to_thrift(Some(&unsigned)).unwrap();
        assert_eq!(thrift.min, None);
        assert_eq!(thrift.min_value, Some(b"a".to_vec()));
        assert_eq!(thrift.is_min_value_exact, Some(true));
    }
}
