//! Connections to a table store root.

use std::fs::File;
use std::path::{Path, PathBuf};

use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use fovea_common::{Result, error::Error, name::canonical_name};
use fovea_schema::TableSchema;

use crate::arrow_compat::table_arrow_schema;
use crate::table::{Table, write_fragment};

/// Table creation disposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Fail when the table already holds data.
    Create,
    /// Clear any existing table first.
    Overwrite,
}

/// A connection to a store root directory.
///
/// The connection owns nothing beyond the path; every table operation
/// opens and releases its own file handles, so connections are meant to
/// be acquired per call and dropped when the call returns.
pub struct Connection {
    root: PathBuf,
}

impl Connection {
    /// Opens (creating if needed) a store root.
    pub fn open(root: impl AsRef<Path>) -> Result<Connection> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| Error::io(root.display().to_string(), e))?;
        Ok(Connection { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates a table for the given schema. The new table is seeded
    /// with a zero-row fragment so the columnar schema is always
    /// recoverable from fragment footers.
    pub fn create_table(
        &self,
        name: &str,
        schema: &TableSchema,
        mode: CreateMode,
    ) -> Result<Table> {
        let name = canonical_name(name);
        let dir = self.root.join(&name);
        if dir.exists() {
            match mode {
                CreateMode::Overwrite => {
                    std::fs::remove_dir_all(&dir)
                        .map_err(|e| Error::io(dir.display().to_string(), e))?;
                }
                CreateMode::Create => {
                    return Err(Error::invalid_arg(
                        "table",
                        format!("table '{name}' already exists"),
                    ));
                }
            }
        }
        std::fs::create_dir_all(&dir).map_err(|e| Error::io(dir.display().to_string(), e))?;
        let arrow_schema = table_arrow_schema(schema)?;
        write_fragment(&dir.join("part-00000.parquet"), &arrow_schema, &[])?;
        Ok(Table::new(name, dir, arrow_schema))
    }

    /// Opens an existing table, recovering its schema from the first
    /// fragment footer.
    pub fn open_table(&self, name: &str) -> Result<Table> {
        let name = canonical_name(name);
        let dir = self.root.join(&name);
        if !dir.is_dir() {
            return Err(Error::table_not_found(name));
        }
        let fragments = crate::table::list_fragments(&dir)?;
        let Some(first) = fragments.first() else {
            return Err(Error::table_not_found(name));
        };
        let file = File::open(first).map_err(|e| Error::io(first.display().to_string(), e))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| Error::backend(format!("opening table '{name}'"), e))?;
        let schema = builder.schema().clone();
        Ok(Table::new(name, dir, schema))
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.root.join(canonical_name(name)).is_dir()
    }

    /// Names of the tables present under the root, in name order.
    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let entries = std::fs::read_dir(&self.root)
            .map_err(|e| Error::io(self.root.display().to_string(), e))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(self.root.display().to_string(), e))?;
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Predicate;
    use fovea_types::Record;

    fn item_rows(ids: &[&str]) -> Vec<Record> {
        ids.iter()
            .map(|id| Record::new().with("id", *id).with("split", "train"))
            .collect()
    }

    #[test]
    fn create_add_and_count() {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(dir.path()).unwrap();
        let table = conn
            .create_table("item", &fovea_schema::builtin::item(), CreateMode::Create)
            .unwrap();
        assert_eq!(table.count().unwrap(), 0);

        table.add(&item_rows(&["a", "b", "c"])).unwrap();
        table.add(&item_rows(&["d"])).unwrap();
        assert_eq!(table.count().unwrap(), 4);

        let reopened = conn.open_table("item").unwrap();
        assert_eq!(reopened.count().unwrap(), 4);
        assert_eq!(reopened.schema().fields().len(), 2);
    }

    #[test]
    fn create_mode_guards_existing_tables() {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(dir.path()).unwrap();
        let schema = fovea_schema::builtin::item();
        let table = conn
            .create_table("item", &schema, CreateMode::Create)
            .unwrap();
        table.add(&item_rows(&["a"])).unwrap();

        assert!(conn.create_table("item", &schema, CreateMode::Create).is_err());

        let table = conn
            .create_table("item", &schema, CreateMode::Overwrite)
            .unwrap();
        assert_eq!(table.count().unwrap(), 0);
    }

    #[test]
    fn open_missing_table_is_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(dir.path()).unwrap();
        let err = conn.open_table("ghost").unwrap_err();
        assert!(matches!(
            err.kind(),
            fovea_common::error::ErrorKind::TableNotFound { .. }
        ));
    }

    #[test]
    fn query_filters_and_windows() {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(dir.path()).unwrap();
        let table = conn
            .create_table("item", &fovea_schema::builtin::item(), CreateMode::Create)
            .unwrap();
        table.add(&item_rows(&["b", "aa", "a", "c"])).unwrap();

        let rows = table
            .query()
            .filter(Predicate::in_list("id", ["a", "aa"]))
            .collect()
            .unwrap();
        assert_eq!(rows.len(), 2);

        let ordered = table.query().order_by_key("id").collect().unwrap();
        let ids: Vec<&str> = ordered.iter().filter_map(Record::id).collect();
        assert_eq!(ids, vec!["a", "b", "c", "aa"]);

        let window = table
            .query()
            .order_by_key("id")
            .offset(1)
            .limit(2)
            .collect()
            .unwrap();
        let ids: Vec<&str> = window.iter().filter_map(Record::id).collect();
        assert_eq!(ids, vec!["b", "c"]);

        let empty = table.query().offset(10).limit(5).collect().unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn projection_restricts_columns() {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(dir.path()).unwrap();
        let table = conn
            .create_table("item", &fovea_schema::builtin::item(), CreateMode::Create)
            .unwrap();
        table.add(&item_rows(&["a"])).unwrap();
        let rows = table.query().columns(&["id"]).collect().unwrap();
        assert_eq!(rows[0].id(), Some("a"));
        assert!(rows[0].get("split").is_none());
    }

    #[test]
    fn delete_rewrites_only_matching_fragments() {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(dir.path()).unwrap();
        let table = conn
            .create_table("item", &fovea_schema::builtin::item(), CreateMode::Create)
            .unwrap();
        table.add(&item_rows(&["a", "b"])).unwrap();
        table.add(&item_rows(&["c"])).unwrap();

        let removed = table.delete(&Predicate::eq("id", "b")).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(table.count().unwrap(), 2);

        let removed = table
            .delete(&Predicate::in_list("id", ["a", "c"]))
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(table.count().unwrap(), 0);

        // schema still recoverable after deleting everything
        assert!(conn.open_table("item").is_ok());
    }
}
