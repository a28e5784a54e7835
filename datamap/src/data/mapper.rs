//! Record mapper
//!
//! Converts raw cursor rows into maps or records, and records or maps back
//! into ordered `(column, value)` lists for writing.
//!
//! Column names are lowercased on read. Each non-null cell is first converted
//! to the kind its column declares in the [`ColumnTypes`] table, then
//! re-converted to the destination slot's kind when the two differ and the
//! slot is not generic. Columns without a matching destination field are
//! ignored.

use std::sync::Arc;

use dashmap::DashMap;

use super::coerce::{self, CoercionPolicy};
use super::columns::{ColumnTypes, normalize_column};
use super::cursor::{BoxError, Cursor};
use super::error::DataError;
use super::record::{
    Destination, Element, FieldMut, FieldRef, MapTarget, Record, RecordDescriptor, Shape, Sink,
    record_is_zero,
};
use super::value::{Kind, Value};

/// One mapped field of a record type, with its column resolved
#[derive(Debug)]
struct ResolvedField {
    ident: &'static str,
    column: String,
    /// Normalized names a result column may use to address this field
    match_keys: Vec<String>,
    omitempty: bool,
    inline: bool,
    nested: Option<Arc<Layout>>,
}

/// Resolved field list of a record type
#[derive(Debug, Default)]
struct Layout {
    fields: Vec<ResolvedField>,
}

impl Layout {
    /// Path of field identifiers leading to the field for `column`
    ///
    /// Inline sub-records are searched in declaration order.
    fn locate(&self, column: &str) -> Option<Vec<&'static str>> {
        let key = normalize_column(column);
        for field in &self.fields {
            if let (true, Some(nested)) = (field.inline, &field.nested) {
                if let Some(mut path) = nested.locate(column) {
                    path.insert(0, field.ident);
                    return Some(path);
                }
                continue;
            }
            if field.match_keys.contains(&key) {
                return Some(vec![field.ident]);
            }
        }
        None
    }
}

/// Maps rows to records and records to field/value lists
pub struct RecordMapper {
    column_types: ColumnTypes,
    policy: CoercionPolicy,
    layouts: DashMap<&'static str, Arc<Layout>>,
}

impl RecordMapper {
    pub fn new(column_types: ColumnTypes) -> Self {
        Self {
            column_types,
            policy: CoercionPolicy::default(),
            layouts: DashMap::new(),
        }
    }

    pub fn with_policy(mut self, policy: CoercionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> CoercionPolicy {
        self.policy
    }

    // =========================================================================
    // Reading rows
    // =========================================================================

    /// Read the next row into `dst`
    ///
    /// `dst` is replaced by a freshly populated element. The cursor is
    /// closed when it turns out to be exhausted or on error; after a
    /// successful fetch it stays open for further reads.
    pub fn fetch_one<'a, D, C>(&self, dst: D, cursor: &mut C) -> Result<(), DataError>
    where
        D: Destination<'a>,
        D::Target: Element + Default + Sized,
        C: Cursor + ?Sized,
    {
        let target = dst.into_target().ok_or(DataError::ExpectingPointer)?;
        if <D::Target as Element>::shape() == Shape::Scalar {
            return Err(DataError::ExpectingMapOrStruct);
        }

        match self.next_item::<D::Target, C>(cursor) {
            Ok(item) => {
                *target = item;
                Ok(())
            }
            Err(e) => release(cursor, Err(e)),
        }
    }

    /// Read every remaining row, appending one element per row to `dst`
    ///
    /// The cursor is always closed. Rows mapped before a failure stay in `dst`.
    pub fn fetch_all<'a, D, C>(&self, dst: D, cursor: &mut C) -> Result<(), DataError>
    where
        D: Destination<'a>,
        D::Target: Sink,
        C: Cursor + ?Sized,
    {
        let sink = dst.into_target().ok_or(DataError::ExpectingPointer)?;
        if !sink.is_growable() {
            return Err(DataError::ExpectingSlicePointer);
        }
        if <<D::Target as Sink>::Item as Element>::shape() == Shape::Scalar {
            return Err(DataError::ExpectingSliceMapStruct);
        }

        let result = self.collect_rows(sink, cursor);
        release(cursor, result)
    }

    fn next_item<T, C>(&self, cursor: &mut C) -> Result<T, DataError>
    where
        T: Element + Default,
        C: Cursor + ?Sized,
    {
        let columns = row_columns(cursor)?;

        if !cursor.advance() {
            if let Some(e) = cursor.take_error() {
                return Err(DataError::Cursor(e));
            }
            return Err(DataError::NoMoreRows);
        }

        self.fetch_result(cursor, &columns)
    }

    fn collect_rows<S, C>(&self, sink: &mut S, cursor: &mut C) -> Result<(), DataError>
    where
        S: Sink + ?Sized,
        C: Cursor + ?Sized,
    {
        let columns = row_columns(cursor)?;
        let mut count = 0usize;

        while cursor.advance() {
            let item = self.fetch_result::<S::Item, C>(cursor, &columns)?;
            if !sink.push_item(item) {
                return Err(DataError::ExpectingSlicePointer);
            }
            count += 1;
        }

        if let Some(e) = cursor.take_error() {
            return Err(DataError::Cursor(e));
        }

        tracing::trace!(rows = count, "Fetched rows");
        Ok(())
    }

    /// Map the cursor's current row into a new element
    fn fetch_result<T, C>(&self, cursor: &mut C, columns: &[String]) -> Result<T, DataError>
    where
        T: Element + Default,
        C: Cursor + ?Sized,
    {
        let values = cursor.values()?;
        let mut item = T::default();

        match T::shape() {
            Shape::Map => {
                let map = item.as_map_mut().ok_or(DataError::ExpectingMapOrStruct)?;
                for (column, cell) in columns.iter().zip(values) {
                    if let Some(bytes) = cell {
                        let raw = String::from_utf8_lossy(&bytes);
                        self.put_map_value(map, column, &raw)?;
                    }
                }
            }
            Shape::Record => {
                let record = item.as_record_mut().ok_or(DataError::ExpectingMapOrStruct)?;
                let layout = self.layout(record.descriptor());
                for (column, cell) in columns.iter().zip(values) {
                    if let Some(bytes) = cell {
                        let raw = String::from_utf8_lossy(&bytes);
                        self.put_record_value(record, &layout, column, &raw)?;
                    }
                }
            }
            Shape::Scalar => return Err(DataError::ExpectingMapOrStruct),
        }

        tracing::trace!(columns = columns.len(), "Mapped row");
        Ok(item)
    }

    fn put_map_value(
        &self,
        map: &mut dyn MapTarget,
        column: &str,
        raw: &str,
    ) -> Result<(), DataError> {
        let value_kind = map.value_kind();
        let value = self.convert_for(column, raw, value_kind)?;

        if !map.insert_value(column.to_string(), value) {
            return self.unassignable(column, raw, value_kind);
        }
        Ok(())
    }

    fn put_record_value(
        &self,
        record: &mut dyn Record,
        layout: &Layout,
        column: &str,
        raw: &str,
    ) -> Result<(), DataError> {
        let Some(path) = layout.locate(column) else {
            tracing::trace!(column, "No destination field for column");
            return Ok(());
        };
        let Some((leaf, parents)) = path.split_last() else {
            return Ok(());
        };

        let mut current: &mut dyn Record = record;
        for ident in parents {
            current = match current.field_mut(ident) {
                Some(FieldMut::Record(nested)) => nested,
                _ => return Ok(()),
            };
        }

        let Some(FieldMut::Slot(slot)) = current.field_mut(leaf) else {
            tracing::trace!(column, "Column addresses a nested record, skipping");
            return Ok(());
        };

        let slot_kind = slot.kind();
        let value = self.convert_for(column, raw, slot_kind)?;

        if !slot.assign(value) {
            return self.unassignable(column, raw, slot_kind);
        }
        Ok(())
    }

    /// Convert for a destination of kind `target`
    ///
    /// Generic destinations take the column's declared kind, typed ones are
    /// converted straight to their own kind.
    fn convert_for(&self, column: &str, raw: &str, target: Kind) -> Result<Value, DataError> {
        let kind = if target.is_generic() {
            self.column_types.kind_of(column)
        } else {
            target
        };
        self.coerce(column, raw, kind)
    }

    fn coerce(&self, column: &str, raw: &str, kind: Kind) -> Result<Value, DataError> {
        match coerce::convert(raw, kind) {
            Ok(value) => Ok(value),
            Err(e) => match self.policy {
                CoercionPolicy::Strict => Err(DataError::coercion(column, kind, raw)),
                CoercionPolicy::Lenient => {
                    tracing::debug!(column, error = %e, "Keeping textual value");
                    Ok(Value::String(raw.to_string()))
                }
            },
        }
    }

    fn unassignable(
        &self,
        column: &str,
        raw: &str,
        kind: Kind,
    ) -> Result<(), DataError> {
        match self.policy {
            CoercionPolicy::Strict => Err(DataError::coercion(column, kind, raw)),
            CoercionPolicy::Lenient => {
                tracing::debug!(column, %kind, "Value does not fit destination, leaving default");
                Ok(())
            }
        }
    }

    // =========================================================================
    // Writing rows
    // =========================================================================

    /// Flatten a record or map into parallel column and value lists
    ///
    /// Record fields come out in declaration order, inline sub-records
    /// expanded in place. Map entries come out in the map's iteration order.
    /// `transform` is applied to every emitted value.
    pub fn to_field_values<T, F, O>(
        &self,
        item: &T,
        mut transform: F,
    ) -> Result<(Vec<String>, Vec<O>), DataError>
    where
        T: Element + ?Sized,
        F: FnMut(Value) -> O,
    {
        let mut fields = Vec::new();
        let mut values = Vec::new();

        if let Some(record) = item.as_record() {
            self.record_values(record, &mut transform, &mut fields, &mut values)?;
        } else if let Some(map) = item.as_map() {
            for (key, value) in map.entries() {
                fields.push(self.column_types.column_like(&key));
                values.push(transform(value));
            }
        } else {
            return Err(DataError::ExpectingMapOrStruct);
        }

        Ok((fields, values))
    }

    fn record_values<F, O>(
        &self,
        record: &dyn Record,
        transform: &mut F,
        fields: &mut Vec<String>,
        values: &mut Vec<O>,
    ) -> Result<(), DataError>
    where
        F: FnMut(Value) -> O,
    {
        let layout = self.layout(record.descriptor());

        for field in &layout.fields {
            match record.field(field.ident) {
                Some(FieldRef::Slot(slot)) => {
                    if field.omitempty && slot.is_zero() {
                        continue;
                    }
                    if field.inline {
                        return Err(DataError::ExpectingMapOrStruct);
                    }
                    fields.push(field.column.clone());
                    values.push(transform(slot.value()));
                }
                Some(FieldRef::Record(nested)) => {
                    if field.omitempty && record_is_zero(nested) {
                        continue;
                    }
                    if field.inline {
                        self.record_values(nested, transform, fields, values)?;
                    } else {
                        let (names, nested_values) = self.to_field_values_dyn(nested)?;
                        let map = names.into_iter().zip(nested_values).collect();
                        fields.push(field.column.clone());
                        values.push(transform(Value::Map(map)));
                    }
                }
                None => {}
            }
        }

        Ok(())
    }

    fn to_field_values_dyn(
        &self,
        record: &dyn Record,
    ) -> Result<(Vec<String>, Vec<Value>), DataError> {
        let mut fields = Vec::new();
        let mut values = Vec::new();
        self.record_values(record, &mut |v: Value| v, &mut fields, &mut values)?;
        Ok((fields, values))
    }

    // =========================================================================
    // Layouts
    // =========================================================================

    /// Resolved layout for a record type, built on first use
    fn layout(&self, descriptor: &'static RecordDescriptor) -> Arc<Layout> {
        if let Some(layout) = self.layouts.get(descriptor.type_name()) {
            return Arc::clone(layout.value());
        }

        // Nested layouts take the map lock themselves, so build outside it.
        let built = Arc::new(self.build_layout(descriptor));
        tracing::trace!(
            record = descriptor.type_name(),
            fields = built.fields.len(),
            "Resolved record layout"
        );

        Arc::clone(
            self.layouts
                .entry(descriptor.type_name())
                .or_insert(built)
                .value(),
        )
    }

    fn build_layout(&self, descriptor: &'static RecordDescriptor) -> Layout {
        let fields = descriptor
            .fields()
            .iter()
            .filter(|f| !f.is_skipped())
            .map(|f| {
                let column = match f.tag_name() {
                    Some(name) => name.to_string(),
                    None => self.column_types.column_like(f.ident()),
                };
                let mut match_keys = vec![normalize_column(&column)];
                if f.tag_name().is_none() {
                    match_keys.push(normalize_column(f.ident()));
                }
                ResolvedField {
                    ident: f.ident(),
                    column,
                    match_keys,
                    omitempty: f.omitempty(),
                    inline: f.inline(),
                    nested: f.nested().map(|d| self.layout(d)),
                }
            })
            .collect();

        Layout { fields }
    }
}

/// Lowercased column names of the result set
fn row_columns<C: Cursor + ?Sized>(cursor: &C) -> Result<Vec<String>, DataError> {
    let columns = cursor.columns().map_err(DataError::Cursor)?;
    Ok(columns.into_iter().map(|c| c.to_lowercase()).collect())
}

/// Close the cursor, keeping the first error
fn release<C: Cursor + ?Sized, T>(
    cursor: &mut C,
    result: Result<T, DataError>,
) -> Result<T, DataError> {
    let closed: Result<(), BoxError> = cursor.close();
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(DataError::Cursor(e)),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(e)) => {
            tracing::warn!(error = %e, "Failed to close cursor");
            Err(err)
        }
    }
}
