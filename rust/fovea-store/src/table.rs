//! Table handles, predicates and fragment-scanning queries.

use std::fs::File;
use std::path::{Path, PathBuf};

use arrow_schema::SchemaRef;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use fovea_common::{Result, error::Error};
use fovea_types::{Record, Value};

use crate::arrow_compat::{batch_to_records, records_to_batch};

/// Row filter supported by the adapter: single-column equality or
/// membership.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(String, Value),
    In(String, Vec<Value>),
}

impl Predicate {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Predicate {
        Predicate::Eq(column.into(), value.into())
    }

    pub fn in_list(
        column: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Predicate {
        Predicate::In(column.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::Eq(column, value) => record.get(column) == Some(value),
            Predicate::In(column, values) => record
                .get(column)
                .map(|v| values.contains(v))
                .unwrap_or(false),
        }
    }
}

/// Handle on one table: a fragment directory plus the Arrow schema.
/// Handles are cheap and may be reopened on every read.
#[derive(Debug)]
pub struct Table {
    name: String,
    dir: PathBuf,
    schema: SchemaRef,
}

impl Table {
    pub(crate) fn new(name: String, dir: PathBuf, schema: SchemaRef) -> Table {
        Table { name, dir, schema }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Appends rows as a new fragment, preserving submission order.
    pub fn add(&self, rows: &[Record]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let batch = records_to_batch(&self.schema, rows)?;
        let path = self.next_fragment_path()?;
        let file = File::create(&path).map_err(|e| Error::io(path.display().to_string(), e))?;
        let mut writer = ArrowWriter::try_new(file, self.schema.clone(), None)
            .map_err(|e| Error::backend(format!("creating fragment for '{}'", self.name), e))?;
        writer
            .write(&batch)
            .map_err(|e| Error::backend(format!("writing fragment for '{}'", self.name), e))?;
        writer
            .close()
            .map_err(|e| Error::backend(format!("closing fragment for '{}'", self.name), e))?;
        Ok(())
    }

    /// Removes matching rows, rewriting only the fragments that held
    /// them. Returns the number of rows removed.
    pub fn delete(&self, predicate: &Predicate) -> Result<usize> {
        let mut removed = 0usize;
        for fragment in self.fragments()? {
            let records = read_fragment(&fragment)?;
            let retained: Vec<Record> = records
                .iter()
                .filter(|record| !predicate.matches(record))
                .cloned()
                .collect();
            if retained.len() != records.len() {
                removed += records.len() - retained.len();
                write_fragment(&fragment, &self.schema, &retained)?;
            }
        }
        Ok(removed)
    }

    /// Total number of rows, from fragment metadata.
    pub fn count(&self) -> Result<usize> {
        let mut total = 0usize;
        for fragment in self.fragments()? {
            let file =
                File::open(&fragment).map_err(|e| Error::io(fragment.display().to_string(), e))?;
            let builder = ParquetRecordBatchReaderBuilder::try_new(file)
                .map_err(|e| Error::backend(format!("opening fragment of '{}'", self.name), e))?;
            total += builder.metadata().file_metadata().num_rows() as usize;
        }
        Ok(total)
    }

    pub fn query(&self) -> Query<'_> {
        Query {
            table: self,
            filter: None,
            offset: 0,
            limit: None,
            order_by_key: None,
            columns: None,
        }
    }

    pub(crate) fn fragments(&self) -> Result<Vec<PathBuf>> {
        list_fragments(&self.dir)
    }

    fn next_fragment_path(&self) -> Result<PathBuf> {
        let next = self
            .fragments()?
            .iter()
            .filter_map(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .and_then(|n| n.strip_prefix("part-"))
                    .and_then(|n| n.strip_suffix(".parquet"))
                    .and_then(|n| n.parse::<u64>().ok())
            })
            .max()
            .map(|index| index + 1)
            .unwrap_or(0);
        Ok(self.dir.join(format!("part-{next:05}.parquet")))
    }
}

/// Fragment files of a table directory, in name order.
pub(crate) fn list_fragments(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut fragments = Vec::new();
    let entries =
        std::fs::read_dir(dir).map_err(|e| Error::io(dir.display().to_string(), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir.display().to_string(), e))?;
        let path = entry.path();
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.starts_with("part-") && name.ends_with(".parquet") {
                fragments.push(path);
            }
        }
    }
    fragments.sort();
    Ok(fragments)
}

pub(crate) fn read_fragment(path: &Path) -> Result<Vec<Record>> {
    let file = File::open(path).map_err(|e| Error::io(path.display().to_string(), e))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::backend(format!("opening fragment '{}'", path.display()), e))?
        .build()
        .map_err(|e| Error::backend(format!("reading fragment '{}'", path.display()), e))?;
    let mut records = Vec::new();
    for batch in reader {
        let batch =
            batch.map_err(|e| Error::backend(format!("reading fragment '{}'", path.display()), e))?;
        records.extend(batch_to_records(&batch)?);
    }
    Ok(records)
}

pub(crate) fn write_fragment(path: &Path, schema: &SchemaRef, rows: &[Record]) -> Result<()> {
    let batch = records_to_batch(schema, rows)?;
    let file = File::create(path).map_err(|e| Error::io(path.display().to_string(), e))?;
    let mut writer = ArrowWriter::try_new(file, schema.clone(), None)
        .map_err(|e| Error::backend(format!("creating fragment '{}'", path.display()), e))?;
    if batch.num_rows() > 0 {
        writer
            .write(&batch)
            .map_err(|e| Error::backend(format!("writing fragment '{}'", path.display()), e))?;
    }
    writer
        .close()
        .map_err(|e| Error::backend(format!("closing fragment '{}'", path.display()), e))?;
    Ok(())
}

/// A fragment scan with an optional filter, key ordering, window and
/// column projection.
pub struct Query<'a> {
    table: &'a Table,
    filter: Option<Predicate>,
    offset: usize,
    limit: Option<usize>,
    order_by_key: Option<String>,
    columns: Option<Vec<String>>,
}

impl Query<'_> {
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Orders rows by a string key column, shortest first and
    /// lexicographic within a length. Rows missing the column sort
    /// first.
    pub fn order_by_key(mut self, column: impl Into<String>) -> Self {
        self.order_by_key = Some(column.into());
        self
    }

    /// Restricts result records to the named columns.
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn collect(self) -> Result<Vec<Record>> {
        let mut rows: Vec<Record> = Vec::new();
        for fragment in self.table.fragments()? {
            let records = read_fragment(&fragment)?;
            match &self.filter {
                None => rows.extend(records),
                Some(predicate) => {
                    rows.extend(records.into_iter().filter(|r| predicate.matches(r)));
                }
            }
        }

        if let Some(key) = &self.order_by_key {
            rows.sort_by(|a, b| {
                let ka = a.get_str(key).unwrap_or("");
                let kb = b.get_str(key).unwrap_or("");
                ka.len().cmp(&kb.len()).then_with(|| ka.cmp(kb))
            });
        }

        let mut rows: Vec<Record> = if self.offset > 0 || self.limit.is_some() {
            rows.into_iter()
                .skip(self.offset)
                .take(self.limit.unwrap_or(usize::MAX))
                .collect()
        } else {
            rows
        };

        if let Some(columns) = &self.columns {
            let names: Vec<&str> = columns.iter().map(String::as_str).collect();
            for row in &mut rows {
                row.retain_columns(&names);
            }
        }
        Ok(rows)
    }
}
