//! Conversion between table schemas / records and their Arrow
//! representation.

use std::sync::Arc;

use arrow_array::builder::{
    BinaryBuilder, BooleanBuilder, Float32Builder, Float64Builder, Int64Builder,
    LargeBinaryBuilder, StringBuilder,
};
use arrow_array::cast::AsArray;
use arrow_array::types::{Float32Type, Float64Type, Int64Type};
use arrow_array::{Array, ArrayRef, FixedSizeListArray, ListArray, RecordBatch, StructArray};
use arrow_buffer::{NullBuffer, OffsetBuffer, ScalarBuffer};
use arrow_schema::{DataType, Field, Schema, SchemaRef};

use fovea_common::{Result, error::Error};
use fovea_schema::{FieldSpec, TableSchema};
use fovea_types::registry::{AtomicType, TypeDescriptor, ValueLayout};
use fovea_types::{Record, Value};

/// Maps a table schema onto an Arrow schema. Every column is nullable;
/// presence constraints are enforced above the storage layer.
pub fn table_arrow_schema(schema: &TableSchema) -> Result<SchemaRef> {
    let mut fields = Vec::with_capacity(schema.fields().len());
    for (name, spec) in schema.fields() {
        fields.push(Field::new(name, field_data_type(spec)?, true));
    }
    Ok(Arc::new(Schema::new(fields)))
}

fn field_data_type(spec: &FieldSpec) -> Result<DataType> {
    let descriptor = fovea_types::registry::global()
        .resolve(&spec.type_name)
        .ok_or_else(|| Error::schema_not_registered(&spec.type_name))?;
    let inner = match descriptor {
        TypeDescriptor::Atomic(atomic) => atomic_data_type(atomic),
        TypeDescriptor::Composite(composite) => layout_data_type(&composite.layout),
    };
    if spec.collection {
        Ok(DataType::List(Arc::new(Field::new("item", inner, true))))
    } else {
        Ok(inner)
    }
}

fn atomic_data_type(atomic: AtomicType) -> DataType {
    match atomic {
        AtomicType::Integer => DataType::Int64,
        AtomicType::Floating => DataType::Float64,
        AtomicType::Complex => DataType::FixedSizeList(
            Arc::new(Field::new("item", DataType::Float64, true)),
            2,
        ),
        AtomicType::String => DataType::Utf8,
        AtomicType::Boolean => DataType::Boolean,
        AtomicType::Bytes => DataType::Binary,
        AtomicType::Buffer => DataType::LargeBinary,
    }
}

fn layout_data_type(layout: &ValueLayout) -> DataType {
    match layout {
        ValueLayout::Bool => DataType::Boolean,
        ValueLayout::Int64 => DataType::Int64,
        ValueLayout::Float32 => DataType::Float32,
        ValueLayout::Float64 => DataType::Float64,
        ValueLayout::Utf8 => DataType::Utf8,
        ValueLayout::Binary => DataType::Binary,
        ValueLayout::FixedSizeFloat(n) => DataType::FixedSizeList(
            Arc::new(Field::new("item", DataType::Float32, true)),
            *n as i32,
        ),
        ValueLayout::FixedSizeInt(n) => DataType::FixedSizeList(
            Arc::new(Field::new("item", DataType::Int64, true)),
            *n as i32,
        ),
        ValueLayout::FloatList => {
            DataType::List(Arc::new(Field::new("item", DataType::Float32, true)))
        }
        ValueLayout::IntList => {
            DataType::List(Arc::new(Field::new("item", DataType::Int64, true)))
        }
        ValueLayout::StringList => {
            DataType::List(Arc::new(Field::new("item", DataType::Utf8, true)))
        }
        ValueLayout::BoolList => {
            DataType::List(Arc::new(Field::new("item", DataType::Boolean, true)))
        }
        ValueLayout::Struct(members) => DataType::Struct(
            members
                .iter()
                .map(|(name, member)| Field::new(name, layout_data_type(member), true))
                .collect(),
        ),
    }
}

/// Converts a slice of records into a record batch following `schema`.
/// Missing columns become nulls; a record column that is not part of the
/// schema is an error.
pub fn records_to_batch(schema: &SchemaRef, rows: &[Record]) -> Result<RecordBatch> {
    if rows.is_empty() {
        return Ok(RecordBatch::new_empty(schema.clone()));
    }
    for row in rows {
        for (name, _) in row.iter() {
            if schema.column_with_name(name).is_none() {
                return Err(Error::invalid_arg(
                    "record",
                    format!("column '{name}' is not part of the table schema"),
                ));
            }
        }
    }
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let values: Vec<Option<&Value>> =
            rows.iter().map(|row| row.get_non_null(field.name())).collect();
        columns.push(build_array(field.name(), field.data_type(), &values)?);
    }
    RecordBatch::try_new(schema.clone(), columns)
        .map_err(|e| Error::arrow("building record batch", e))
}

fn type_mismatch(column: &str, expected: &str) -> Error {
    Error::invalid_arg(
        "record",
        format!("column '{column}' expects {expected}"),
    )
}

fn build_array(column: &str, data_type: &DataType, values: &[Option<&Value>]) -> Result<ArrayRef> {
    match data_type {
        DataType::Utf8 => {
            let mut builder = StringBuilder::new();
            for value in values {
                match value {
                    None => builder.append_null(),
                    Some(v) => builder.append_value(
                        v.as_str().ok_or_else(|| type_mismatch(column, "a string"))?,
                    ),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Int64 => {
            let mut builder = Int64Builder::new();
            for value in values {
                match value {
                    None => builder.append_null(),
                    Some(v) => builder.append_value(
                        v.as_i64().ok_or_else(|| type_mismatch(column, "an integer"))?,
                    ),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Float64 => {
            let mut builder = Float64Builder::new();
            for value in values {
                match value {
                    None => builder.append_null(),
                    Some(v) => builder.append_value(
                        v.as_f64().ok_or_else(|| type_mismatch(column, "a float"))?,
                    ),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Float32 => {
            let mut builder = Float32Builder::new();
            for value in values {
                match value {
                    None => builder.append_null(),
                    Some(v) => builder.append_value(
                        v.as_f32().ok_or_else(|| type_mismatch(column, "a float"))?,
                    ),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Boolean => {
            let mut builder = BooleanBuilder::new();
            for value in values {
                match value {
                    None => builder.append_null(),
                    Some(v) => builder.append_value(
                        v.as_bool().ok_or_else(|| type_mismatch(column, "a boolean"))?,
                    ),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Binary => {
            let mut builder = BinaryBuilder::new();
            for value in values {
                match value {
                    None => builder.append_null(),
                    Some(v) => builder.append_value(
                        v.as_bytes().ok_or_else(|| type_mismatch(column, "bytes"))?,
                    ),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::LargeBinary => {
            let mut builder = LargeBinaryBuilder::new();
            for value in values {
                match value {
                    None => builder.append_null(),
                    Some(v) => builder.append_value(
                        v.as_bytes().ok_or_else(|| type_mismatch(column, "bytes"))?,
                    ),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::List(item_field) => {
            let mut offsets: Vec<i32> = Vec::with_capacity(values.len() + 1);
            offsets.push(0);
            let mut validity: Vec<bool> = Vec::with_capacity(values.len());
            let mut child_values: Vec<Option<&Value>> = Vec::new();
            for value in values {
                match value {
                    None => {
                        validity.push(false);
                        offsets.push(child_values.len() as i32);
                    }
                    Some(v) => {
                        let items =
                            v.as_list().ok_or_else(|| type_mismatch(column, "a list"))?;
                        for item in items {
                            child_values.push((!item.is_null()).then_some(item));
                        }
                        validity.push(true);
                        offsets.push(child_values.len() as i32);
                    }
                }
            }
            let child = build_array(column, item_field.data_type(), &child_values)?;
            let array = ListArray::try_new(
                item_field.clone(),
                OffsetBuffer::new(ScalarBuffer::from(offsets)),
                child,
                Some(NullBuffer::from(validity)),
            )
            .map_err(|e| Error::arrow(format!("building list column '{column}'"), e))?;
            Ok(Arc::new(array))
        }
        DataType::FixedSizeList(item_field, size) => {
            let size = *size as usize;
            let mut validity: Vec<bool> = Vec::with_capacity(values.len());
            let mut child_values: Vec<Option<&Value>> = Vec::with_capacity(values.len() * size);
            for value in values {
                match value {
                    None => {
                        validity.push(false);
                        child_values.extend(std::iter::repeat_n(None, size));
                    }
                    Some(v) => {
                        let items =
                            v.as_list().ok_or_else(|| type_mismatch(column, "a list"))?;
                        if items.len() != size {
                            return Err(type_mismatch(column, &format!("{size} elements")));
                        }
                        for item in items {
                            child_values.push((!item.is_null()).then_some(item));
                        }
                        validity.push(true);
                    }
                }
            }
            let child = build_array(column, item_field.data_type(), &child_values)?;
            let array = FixedSizeListArray::try_new(
                item_field.clone(),
                size as i32,
                child,
                Some(NullBuffer::from(validity)),
            )
            .map_err(|e| Error::arrow(format!("building fixed-size column '{column}'"), e))?;
            Ok(Arc::new(array))
        }
        DataType::Struct(member_fields) => {
            let mut validity: Vec<bool> = Vec::with_capacity(values.len());
            let mut structs: Vec<Option<&std::collections::BTreeMap<String, Value>>> =
                Vec::with_capacity(values.len());
            for value in values {
                match value {
                    None => {
                        validity.push(false);
                        structs.push(None);
                    }
                    Some(v) => {
                        structs.push(Some(
                            v.as_struct().ok_or_else(|| type_mismatch(column, "a struct"))?,
                        ));
                        validity.push(true);
                    }
                }
            }
            let mut children: Vec<ArrayRef> = Vec::with_capacity(member_fields.len());
            for member in member_fields.iter() {
                let member_values: Vec<Option<&Value>> = structs
                    .iter()
                    .map(|s| {
                        s.and_then(|map| map.get(member.name()))
                            .filter(|v| !v.is_null())
                    })
                    .collect();
                children.push(build_array(member.name(), member.data_type(), &member_values)?);
            }
            let array = StructArray::try_new(
                member_fields.clone(),
                children,
                Some(NullBuffer::from(validity)),
            )
            .map_err(|e| Error::arrow(format!("building struct column '{column}'"), e))?;
            Ok(Arc::new(array))
        }
        other => Err(Error::arrow(
            format!("column '{column}'"),
            arrow_schema::ArrowError::NotYetImplemented(format!(
                "unsupported storage type {other:?}"
            )),
        )),
    }
}

/// Converts a record batch back into records. Null cells are omitted
/// from the resulting records.
pub fn batch_to_records(batch: &RecordBatch) -> Result<Vec<Record>> {
    let schema = batch.schema();
    let mut records = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let mut record = Record::new();
        for (i, field) in schema.fields().iter().enumerate() {
            let column = batch.column(i);
            if column.is_null(row) {
                continue;
            }
            record.set(field.name().clone(), array_value(column.as_ref(), row)?);
        }
        records.push(record);
    }
    Ok(records)
}

fn array_value(array: &dyn Array, row: usize) -> Result<Value> {
    match array.data_type() {
        DataType::Utf8 => Ok(Value::Str(array.as_string::<i32>().value(row).to_string())),
        DataType::Int64 => Ok(Value::Int(array.as_primitive::<Int64Type>().value(row))),
        DataType::Float64 => Ok(Value::Float(array.as_primitive::<Float64Type>().value(row))),
        DataType::Float32 => Ok(Value::Float(
            array.as_primitive::<Float32Type>().value(row) as f64,
        )),
        DataType::Boolean => Ok(Value::Bool(array.as_boolean().value(row))),
        DataType::Binary => Ok(Value::Bytes(array.as_binary::<i32>().value(row).to_vec())),
        DataType::LargeBinary => Ok(Value::Bytes(array.as_binary::<i64>().value(row).to_vec())),
        DataType::List(_) => {
            let list = array.as_list::<i32>();
            let items = list.value(row);
            list_values(items.as_ref())
        }
        DataType::FixedSizeList(_, _) => {
            let list = array.as_fixed_size_list();
            let items = list.value(row);
            list_values(items.as_ref())
        }
        DataType::Struct(_) => {
            let strukt = array.as_struct();
            let mut members = std::collections::BTreeMap::new();
            for (field, column) in strukt.fields().iter().zip(strukt.columns()) {
                if column.is_null(row) {
                    continue;
                }
                members.insert(field.name().clone(), array_value(column.as_ref(), row)?);
            }
            Ok(Value::Struct(members))
        }
        other => Err(Error::arrow(
            "reading column",
            arrow_schema::ArrowError::NotYetImplemented(format!(
                "unsupported storage type {other:?}"
            )),
        )),
    }
}

fn list_values(items: &dyn Array) -> Result<Value> {
    let mut out = Vec::with_capacity(items.len());
    for i in 0..items.len() {
        if items.is_null(i) {
            out.push(Value::Null);
        } else {
            out.push(array_value(items, i)?);
        }
    }
    Ok(Value::List(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fovea_types::BBox;

    fn object_schema() -> SchemaRef {
        table_arrow_schema(&fovea_schema::builtin::object()).unwrap()
    }

    #[test]
    fn object_schema_maps_to_arrow() {
        let schema = object_schema();
        assert_eq!(schema.fields().len(), 5);
        let bbox = schema.field_with_name("bbox").unwrap();
        assert!(matches!(bbox.data_type(), DataType::Struct(_)));
        let mask = schema.field_with_name("mask").unwrap();
        let DataType::Struct(members) = mask.data_type() else {
            panic!("mask should be a struct");
        };
        assert_eq!(members[0].name(), "size");
        assert_eq!(members[1].name(), "counts");
        assert_eq!(members[1].data_type(), &DataType::Binary);
    }

    #[test]
    fn records_round_trip_through_batches() {
        let schema = object_schema();
        let bbox = BBox::xyxy([0.0, 0.0, 100.0, 100.0]);
        let rows = vec![
            Record::new()
                .with("id", "obj_0")
                .with("item_id", "item_0")
                .with("view_id", "view_0")
                .with("bbox", bbox.to_value()),
            Record::new().with("id", "obj_1").with("item_id", "item_0"),
        ];
        let batch = records_to_batch(&schema, &rows).unwrap();
        assert_eq!(batch.num_rows(), 2);

        let back = batch_to_records(&batch).unwrap();
        assert_eq!(back[0].id(), Some("obj_0"));
        let decoded = BBox::from_value(back[0].get("bbox").unwrap()).unwrap();
        assert_eq!(decoded, bbox);
        // missing columns stay absent
        assert!(back[1].get("bbox").is_none());
        assert!(back[1].get("view_id").is_none());
    }

    #[test]
    fn binary_and_list_columns_round_trip() {
        let schema = table_arrow_schema(&fovea_schema::builtin::embedding()).unwrap();
        let rows = vec![Record::new()
            .with("id", "emb_0")
            .with("item_id", "item_0")
            .with("vector", vec![1u8, 2, 3, 255])];
        let batch = records_to_batch(&schema, &rows).unwrap();
        let back = batch_to_records(&batch).unwrap();
        assert_eq!(back[0].get_bytes("vector"), Some(&[1u8, 2, 3, 255][..]));
    }

    #[test]
    fn unknown_column_is_rejected() {
        let schema = object_schema();
        let rows = vec![Record::new().with("id", "x").with("surprise", 1i64)];
        assert!(records_to_batch(&schema, &rows).is_err());
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let schema = object_schema();
        let rows = vec![Record::new().with("id", 42i64)];
        assert!(records_to_batch(&schema, &rows).is_err());
    }
}
