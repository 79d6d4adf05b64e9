//! Arrow schemas and record ⇄ batch conversion for the four seed tables

use arrow::array::{
    Array, ArrayRef, BooleanArray, Int64Array, ListArray, ListBuilder, StringArray, StringBuilder,
    UInt32Array, UInt32Builder,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use devac_core::{
    DevacError, EdgeKind, EdgeRecord, EffectPayload, EffectRecord, ExternalRefRecord, NodeKind,
    NodeRecord, Visibility,
};
use std::path::Path;
use std::sync::Arc;

fn string_list_field(name: &str) -> Field {
    Field::new(
        name,
        DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
        true,
    )
}

pub fn nodes_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("entity_id", DataType::Utf8, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("qualified_name", DataType::Utf8, false),
        Field::new("kind", DataType::Utf8, false),
        Field::new("file_path", DataType::Utf8, false),
        Field::new("start_line", DataType::UInt32, false),
        Field::new("end_line", DataType::UInt32, false),
        Field::new("start_column", DataType::UInt32, false),
        Field::new("end_column", DataType::UInt32, false),
        Field::new("is_exported", DataType::Boolean, false),
        Field::new("is_default_export", DataType::Boolean, false),
        Field::new("visibility", DataType::Utf8, true),
        Field::new("is_async", DataType::Boolean, false),
        Field::new("is_generator", DataType::Boolean, false),
        Field::new("is_static", DataType::Boolean, false),
        Field::new("is_abstract", DataType::Boolean, false),
        Field::new("signature", DataType::Utf8, true),
        Field::new("doc", DataType::Utf8, true),
        string_list_field("decorators"),
        string_list_field("type_parameters"),
        Field::new("source_file_hash", DataType::Utf8, false),
        Field::new("branch", DataType::Utf8, false),
        Field::new("is_deleted", DataType::Boolean, false),
        Field::new("updated_at", DataType::Int64, false),
    ]))
}

pub fn edges_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("source_entity_id", DataType::Utf8, false),
        Field::new("target_entity_id", DataType::Utf8, false),
        Field::new("edge_type", DataType::Utf8, false),
        Field::new("file_path", DataType::Utf8, true),
        Field::new("line", DataType::UInt32, true),
        Field::new("column", DataType::UInt32, true),
        Field::new("properties", DataType::Utf8, true),
        Field::new("source_file_hash", DataType::Utf8, false),
        Field::new("branch", DataType::Utf8, false),
        Field::new("is_deleted", DataType::Boolean, false),
        Field::new("updated_at", DataType::Int64, false),
    ]))
}

pub fn external_refs_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("source_entity_id", DataType::Utf8, false),
        Field::new("module_specifier", DataType::Utf8, false),
        Field::new("imported_symbol", DataType::Utf8, false),
        Field::new("is_type_only", DataType::Boolean, false),
        Field::new("is_default", DataType::Boolean, false),
        Field::new("is_namespace", DataType::Boolean, false),
        Field::new("file_path", DataType::Utf8, false),
        Field::new("line", DataType::UInt32, false),
        Field::new("column", DataType::UInt32, false),
        Field::new("is_resolved", DataType::Boolean, false),
        Field::new("target_entity_id", DataType::Utf8, true),
        Field::new("branch", DataType::Utf8, false),
        Field::new("is_deleted", DataType::Boolean, false),
        Field::new("updated_at", DataType::Int64, false),
    ]))
}

pub fn effects_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("effect_id", DataType::Utf8, false),
        Field::new("source_entity_id", DataType::Utf8, false),
        Field::new("effect_type", DataType::Utf8, false),
        Field::new("payload", DataType::Utf8, false),
        Field::new("file_path", DataType::Utf8, false),
        Field::new("line", DataType::UInt32, false),
        Field::new("column", DataType::UInt32, false),
        Field::new("branch", DataType::Utf8, false),
        Field::new("is_deleted", DataType::Boolean, false),
        Field::new("updated_at", DataType::Int64, false),
    ]))
}

fn corrupt(path: &Path, reason: impl std::fmt::Display) -> DevacError {
    DevacError::CorruptSeed {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn string_list_array<'a, I, S>(rows: I) -> ArrayRef
where
    I: Iterator<Item = &'a Vec<S>>,
    S: AsRef<str> + 'a,
{
    let mut builder = ListBuilder::new(StringBuilder::new());
    for row in rows {
        for item in row {
            builder.values().append_value(item.as_ref());
        }
        builder.append(true);
    }
    Arc::new(builder.finish())
}

pub fn nodes_to_batch(records: &[NodeRecord]) -> Result<RecordBatch, DevacError> {
    let schema = nodes_schema();
    let mut visibility = StringBuilder::new();
    let mut signature = StringBuilder::new();
    let mut doc = StringBuilder::new();
    for r in records {
        match &r.visibility {
            Some(v) => visibility.append_value(v.as_str()),
            None => visibility.append_null(),
        }
        match &r.signature {
            Some(s) => signature.append_value(s),
            None => signature.append_null(),
        }
        match &r.doc {
            Some(d) => doc.append_value(d),
            None => doc.append_null(),
        }
    }
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.entity_id.as_str()))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.name.as_str()))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.qualified_name.as_str()))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.kind.as_str()))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.file_path.as_str()))),
        Arc::new(UInt32Array::from_iter_values(records.iter().map(|r| r.start_line))),
        Arc::new(UInt32Array::from_iter_values(records.iter().map(|r| r.end_line))),
        Arc::new(UInt32Array::from_iter_values(records.iter().map(|r| r.start_column))),
        Arc::new(UInt32Array::from_iter_values(records.iter().map(|r| r.end_column))),
        Arc::new(BooleanArray::from_iter(records.iter().map(|r| Some(r.is_exported)))),
        Arc::new(BooleanArray::from_iter(records.iter().map(|r| Some(r.is_default_export)))),
        Arc::new(visibility.finish()),
        Arc::new(BooleanArray::from_iter(records.iter().map(|r| Some(r.is_async)))),
        Arc::new(BooleanArray::from_iter(records.iter().map(|r| Some(r.is_generator)))),
        Arc::new(BooleanArray::from_iter(records.iter().map(|r| Some(r.is_static)))),
        Arc::new(BooleanArray::from_iter(records.iter().map(|r| Some(r.is_abstract)))),
        Arc::new(signature.finish()),
        Arc::new(doc.finish()),
        string_list_array(records.iter().map(|r| &r.decorators)),
        string_list_array(records.iter().map(|r| &r.type_parameters)),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.source_file_hash.as_str()))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.branch.as_str()))),
        Arc::new(BooleanArray::from_iter(records.iter().map(|r| Some(r.is_deleted)))),
        Arc::new(Int64Array::from_iter_values(records.iter().map(|r| r.updated_at))),
    ];
    RecordBatch::try_new(schema, columns)
        .map_err(|e| DevacError::Internal(format!("node batch build failed: {e}")))
}

pub fn edges_to_batch(records: &[EdgeRecord]) -> Result<RecordBatch, DevacError> {
    let schema = edges_schema();
    let mut file_path = StringBuilder::new();
    let mut line = UInt32Builder::new();
    let mut column = UInt32Builder::new();
    let mut properties = StringBuilder::new();
    for r in records {
        match &r.file_path {
            Some(p) => file_path.append_value(p),
            None => file_path.append_null(),
        }
        match r.line {
            Some(l) => line.append_value(l),
            None => line.append_null(),
        }
        match r.column {
            Some(c) => column.append_value(c),
            None => column.append_null(),
        }
        match &r.properties {
            Some(p) => properties.append_value(p),
            None => properties.append_null(),
        }
    }
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.source_entity_id.as_str()))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.target_entity_id.as_str()))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.edge_type.as_str()))),
        Arc::new(file_path.finish()),
        Arc::new(line.finish()),
        Arc::new(column.finish()),
        Arc::new(properties.finish()),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.source_file_hash.as_str()))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.branch.as_str()))),
        Arc::new(BooleanArray::from_iter(records.iter().map(|r| Some(r.is_deleted)))),
        Arc::new(Int64Array::from_iter_values(records.iter().map(|r| r.updated_at))),
    ];
    RecordBatch::try_new(schema, columns)
        .map_err(|e| DevacError::Internal(format!("edge batch build failed: {e}")))
}

pub fn external_refs_to_batch(records: &[ExternalRefRecord]) -> Result<RecordBatch, DevacError> {
    let schema = external_refs_schema();
    let mut target = StringBuilder::new();
    for r in records {
        match &r.target_entity_id {
            Some(t) => target.append_value(t),
            None => target.append_null(),
        }
    }
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.source_entity_id.as_str()))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.module_specifier.as_str()))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.imported_symbol.as_str()))),
        Arc::new(BooleanArray::from_iter(records.iter().map(|r| Some(r.is_type_only)))),
        Arc::new(BooleanArray::from_iter(records.iter().map(|r| Some(r.is_default)))),
        Arc::new(BooleanArray::from_iter(records.iter().map(|r| Some(r.is_namespace)))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.file_path.as_str()))),
        Arc::new(UInt32Array::from_iter_values(records.iter().map(|r| r.line))),
        Arc::new(UInt32Array::from_iter_values(records.iter().map(|r| r.column))),
        Arc::new(BooleanArray::from_iter(records.iter().map(|r| Some(r.is_resolved)))),
        Arc::new(target.finish()),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.branch.as_str()))),
        Arc::new(BooleanArray::from_iter(records.iter().map(|r| Some(r.is_deleted)))),
        Arc::new(Int64Array::from_iter_values(records.iter().map(|r| r.updated_at))),
    ];
    RecordBatch::try_new(schema, columns)
        .map_err(|e| DevacError::Internal(format!("ref batch build failed: {e}")))
}

pub fn effects_to_batch(records: &[EffectRecord]) -> Result<RecordBatch, DevacError> {
    let schema = effects_schema();
    let mut payloads = Vec::with_capacity(records.len());
    for r in records {
        payloads.push(serde_json::to_string(&r.payload)?);
    }
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.effect_id.as_str()))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.source_entity_id.as_str()))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.effect_type()))),
        Arc::new(StringArray::from_iter_values(payloads.iter().map(String::as_str))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.file_path.as_str()))),
        Arc::new(UInt32Array::from_iter_values(records.iter().map(|r| r.line))),
        Arc::new(UInt32Array::from_iter_values(records.iter().map(|r| r.column))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.branch.as_str()))),
        Arc::new(BooleanArray::from_iter(records.iter().map(|r| Some(r.is_deleted)))),
        Arc::new(Int64Array::from_iter_values(records.iter().map(|r| r.updated_at))),
    ];
    RecordBatch::try_new(schema, columns)
        .map_err(|e| DevacError::Internal(format!("effect batch build failed: {e}")))
}

struct Columns<'a> {
    batch: &'a RecordBatch,
    path: &'a Path,
}

impl<'a> Columns<'a> {
    fn strings(&self, idx: usize) -> Result<&'a StringArray, DevacError> {
        self.batch
            .column(idx)
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| corrupt(self.path, format!("column {idx} is not a string column")))
    }

    fn u32s(&self, idx: usize) -> Result<&'a UInt32Array, DevacError> {
        self.batch
            .column(idx)
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| corrupt(self.path, format!("column {idx} is not a u32 column")))
    }

    fn bools(&self, idx: usize) -> Result<&'a BooleanArray, DevacError> {
        self.batch
            .column(idx)
            .as_any()
            .downcast_ref::<BooleanArray>()
            .ok_or_else(|| corrupt(self.path, format!("column {idx} is not a boolean column")))
    }

    fn i64s(&self, idx: usize) -> Result<&'a Int64Array, DevacError> {
        self.batch
            .column(idx)
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| corrupt(self.path, format!("column {idx} is not an i64 column")))
    }

    fn lists(&self, idx: usize) -> Result<&'a ListArray, DevacError> {
        self.batch
            .column(idx)
            .as_any()
            .downcast_ref::<ListArray>()
            .ok_or_else(|| corrupt(self.path, format!("column {idx} is not a list column")))
    }

    fn opt_string(&self, idx: usize, row: usize) -> Result<Option<String>, DevacError> {
        let col = self.strings(idx)?;
        Ok(if col.is_null(row) {
            None
        } else {
            Some(col.value(row).to_string())
        })
    }

    fn opt_u32(&self, idx: usize, row: usize) -> Result<Option<u32>, DevacError> {
        let col = self.u32s(idx)?;
        Ok(if col.is_null(row) { None } else { Some(col.value(row)) })
    }

    fn string_list(&self, idx: usize, row: usize) -> Result<Vec<String>, DevacError> {
        let col = self.lists(idx)?;
        if col.is_null(row) {
            return Ok(Vec::new());
        }
        let values = col.value(row);
        let strings = values
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| corrupt(self.path, "list items are not strings"))?;
        Ok((0..strings.len())
            .filter(|&i| !strings.is_null(i))
            .map(|i| strings.value(i).to_string())
            .collect())
    }
}

pub fn batch_to_nodes(batch: &RecordBatch, path: &Path) -> Result<Vec<NodeRecord>, DevacError> {
    let cols = Columns { batch, path };
    let mut out = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let kind_text = cols.strings(3)?.value(row).to_string();
        let kind = NodeKind::parse_kind(&kind_text)
            .ok_or_else(|| corrupt(path, format!("unknown node kind `{kind_text}`")))?;
        out.push(NodeRecord {
            entity_id: cols.strings(0)?.value(row).to_string(),
            name: cols.strings(1)?.value(row).to_string(),
            qualified_name: cols.strings(2)?.value(row).to_string(),
            kind,
            file_path: cols.strings(4)?.value(row).to_string(),
            start_line: cols.u32s(5)?.value(row),
            end_line: cols.u32s(6)?.value(row),
            start_column: cols.u32s(7)?.value(row),
            end_column: cols.u32s(8)?.value(row),
            is_exported: cols.bools(9)?.value(row),
            is_default_export: cols.bools(10)?.value(row),
            visibility: cols
                .opt_string(11, row)?
                .and_then(|v| Visibility::parse_visibility(&v)),
            is_async: cols.bools(12)?.value(row),
            is_generator: cols.bools(13)?.value(row),
            is_static: cols.bools(14)?.value(row),
            is_abstract: cols.bools(15)?.value(row),
            signature: cols.opt_string(16, row)?,
            doc: cols.opt_string(17, row)?,
            decorators: cols.string_list(18, row)?,
            type_parameters: cols.string_list(19, row)?,
            source_file_hash: cols.strings(20)?.value(row).to_string(),
            branch: cols.strings(21)?.value(row).to_string(),
            is_deleted: cols.bools(22)?.value(row),
            updated_at: cols.i64s(23)?.value(row),
        });
    }
    Ok(out)
}

pub fn batch_to_edges(batch: &RecordBatch, path: &Path) -> Result<Vec<EdgeRecord>, DevacError> {
    let cols = Columns { batch, path };
    let mut out = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let kind_text = cols.strings(2)?.value(row).to_string();
        let edge_type = EdgeKind::parse_kind(&kind_text)
            .ok_or_else(|| corrupt(path, format!("unknown edge type `{kind_text}`")))?;
        out.push(EdgeRecord {
            source_entity_id: cols.strings(0)?.value(row).to_string(),
            target_entity_id: cols.strings(1)?.value(row).to_string(),
            edge_type,
            file_path: cols.opt_string(3, row)?,
            line: cols.opt_u32(4, row)?,
            column: cols.opt_u32(5, row)?,
            properties: cols.opt_string(6, row)?,
            source_file_hash: cols.strings(7)?.value(row).to_string(),
            branch: cols.strings(8)?.value(row).to_string(),
            is_deleted: cols.bools(9)?.value(row),
            updated_at: cols.i64s(10)?.value(row),
        });
    }
    Ok(out)
}

pub fn batch_to_external_refs(
    batch: &RecordBatch,
    path: &Path,
) -> Result<Vec<ExternalRefRecord>, DevacError> {
    let cols = Columns { batch, path };
    let mut out = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        out.push(ExternalRefRecord {
            source_entity_id: cols.strings(0)?.value(row).to_string(),
            module_specifier: cols.strings(1)?.value(row).to_string(),
            imported_symbol: cols.strings(2)?.value(row).to_string(),
            is_type_only: cols.bools(3)?.value(row),
            is_default: cols.bools(4)?.value(row),
            is_namespace: cols.bools(5)?.value(row),
            file_path: cols.strings(6)?.value(row).to_string(),
            line: cols.u32s(7)?.value(row),
            column: cols.u32s(8)?.value(row),
            is_resolved: cols.bools(9)?.value(row),
            target_entity_id: cols.opt_string(10, row)?,
            branch: cols.strings(11)?.value(row).to_string(),
            is_deleted: cols.bools(12)?.value(row),
            updated_at: cols.i64s(13)?.value(row),
        });
    }
    Ok(out)
}

pub fn batch_to_effects(batch: &RecordBatch, path: &Path) -> Result<Vec<EffectRecord>, DevacError> {
    let cols = Columns { batch, path };
    let mut out = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let payload_text = cols.strings(3)?.value(row);
        let payload: EffectPayload = serde_json::from_str(payload_text)
            .map_err(|e| corrupt(path, format!("bad effect payload: {e}")))?;
        out.push(EffectRecord {
            effect_id: cols.strings(0)?.value(row).to_string(),
            source_entity_id: cols.strings(1)?.value(row).to_string(),
            payload,
            file_path: cols.strings(4)?.value(row).to_string(),
            line: cols.u32s(5)?.value(row),
            column: cols.u32s(6)?.value(row),
            branch: cols.strings(7)?.value(row).to_string(),
            is_deleted: cols.bools(8)?.value(row),
            updated_at: cols.i64s(9)?.value(row),
        });
    }
    Ok(out)
}
