//! The dataset object: cross-table reads, pagination, projection and
//! dataset-item assembly.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use fovea_common::{Result, error::Error, name::is_valid_id};
use fovea_schema::{DatasetSchema, Group, ItemTemplate};
use fovea_store::{Connection, Predicate};
use fovea_types::{Record, Value};

use crate::features::FeaturesValues;
use crate::info::DatasetInfo;
use crate::item::DatasetItem;
use crate::media::{MediaUrl, resolve_media_url};
use crate::select::{ReadSelection, SelectedTables};
use crate::stats::{DatasetStat, load_stats, save_stat};

pub const INFO_FILE: &str = "info.json";
pub const SCHEMA_FILE: &str = "schema.json";
pub const FEATURES_FILE: &str = "features_values.json";
pub const STATS_FILE: &str = "stats.json";
pub const THUMBNAIL_FILE: &str = "preview.png";
pub const DB_DIR: &str = "db";
pub const MEDIA_DIR: &str = "media";
pub const PREVIEWS_DIR: &str = "previews";

/// A dataset on disk: header, schema, optional sideband documents, and
/// the columnar table store under `db/`.
///
/// The dataset holds no open backend connection between calls; every
/// read acquires and releases its own.
pub struct Dataset {
    path: PathBuf,
    info: DatasetInfo,
    schema: DatasetSchema,
    features_values: FeaturesValues,
    stats: Vec<DatasetStat>,
    thumbnail: Option<PathBuf>,
    template: OnceLock<ItemTemplate>,
}

impl Dataset {
    /// Opens the dataset stored at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Dataset> {
        let path = path.as_ref().to_path_buf();
        let info = DatasetInfo::load(&path.join(INFO_FILE))?;
        let schema = DatasetSchema::load(&path.join(SCHEMA_FILE))?;
        let features_values = FeaturesValues::load_or_default(&path.join(FEATURES_FILE))?;
        let stats = load_stats(&path.join(STATS_FILE))?;
        let thumbnail_path = path.join(THUMBNAIL_FILE);
        let thumbnail = thumbnail_path.is_file().then_some(thumbnail_path);
        Ok(Dataset {
            path,
            info,
            schema,
            features_values,
            stats,
            thumbnail,
            template: OnceLock::new(),
        })
    }

    /// Scans `root` for the dataset whose `info.json` id matches
    /// `dataset_id`. Directories without a parseable header are skipped.
    pub fn find(dataset_id: &str, root: impl AsRef<Path>) -> Result<Option<Dataset>> {
        let mut pending: Vec<PathBuf> = vec![root.as_ref().to_path_buf()];
        while let Some(dir) = pending.pop() {
            let info_path = dir.join(INFO_FILE);
            if info_path.is_file() {
                match DatasetInfo::load(&info_path) {
                    Ok(info) if info.id == dataset_id => {
                        return Dataset::open(&dir).map(Some);
                    }
                    Ok(_) => continue,
                    Err(err) => {
                        log::debug!("skipping '{}': {err}", dir.display());
                        continue;
                    }
                }
            }
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            let mut children: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .collect();
            children.sort();
            children.reverse();
            pending.extend(children);
        }
        Ok(None)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> &DatasetInfo {
        &self.info
    }

    pub fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    pub fn features_values(&self) -> &FeaturesValues {
        &self.features_values
    }

    pub fn stats(&self) -> &[DatasetStat] {
        &self.stats
    }

    pub fn thumbnail(&self) -> Option<&Path> {
        self.thumbnail.as_deref()
    }

    pub fn media_dir(&self) -> PathBuf {
        self.path.join(MEDIA_DIR)
    }

    /// Resolves a view url against this dataset's media directory.
    pub fn media_url(&self, view_url: &str) -> Result<MediaUrl> {
        resolve_media_url(&self.media_dir(), view_url)
    }

    /// The custom dataset-item shape, materialized on first use.
    pub fn template(&self) -> Result<&ItemTemplate> {
        if self.template.get().is_none() {
            let template = ItemTemplate::new(&self.schema)?;
            let _ = self.template.set(template);
        }
        self.template
            .get()
            .ok_or_else(|| Error::invalid_arg("template", "item template unavailable"))
    }

    fn connect(&self) -> Result<Connection> {
        Connection::open(self.path.join(DB_DIR))
    }

    /// Row count of one table.
    pub fn num_rows(&self, table: &str) -> Result<usize> {
        self.schema.table(table)?;
        let conn = self.connect()?;
        conn.open_table(table)?.count()
    }

    /// Saves a histogram into `stats.json`, replacing any prior entry
    /// with the same name.
    pub fn save_stat(&mut self, stat: DatasetStat) -> Result<()> {
        self.stats = save_stat(&self.path.join(STATS_FILE), stat)?;
        Ok(())
    }

    // ----- cross-table reads -------------------------------------------------

    /// Reads dataset items by id under an optional selection.
    ///
    /// An id that matches no row in any selected table is an
    /// `IdNotFound` error; an empty id list reads nothing.
    pub fn read_dataset_items(
        &self,
        ids: &[&str],
        select: Option<&ReadSelection>,
    ) -> Result<Vec<DatasetItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let all = ReadSelection::all();
        let selection = select.unwrap_or(&all);
        let selected = selection.resolve(&self.schema)?;
        let template = self.projected_template(&selected)?;

        let mut unique_ids: Vec<&str> = Vec::with_capacity(ids.len());
        for &id in ids {
            if !unique_ids.contains(&id) {
                unique_ids.push(id);
            }
        }

        let conn = self.connect()?;
        let mut items: Vec<DatasetItem> = unique_ids
            .iter()
            .map(|id| DatasetItem::from_template(&template, id))
            .collect();
        let mut found: BTreeSet<usize> = BTreeSet::new();

        if selected.item_fields {
            let item_table = conn.open_table(self.schema.item_table()?)?;
            let rows = item_table
                .query()
                .filter(Predicate::in_list("id", unique_ids.iter().copied()))
                .collect()?;
            for row in rows {
                let Some(position) = row.id().and_then(|id| position_of(&unique_ids, id)) else {
                    continue;
                };
                items[position].set_attributes(row);
                found.insert(position);
            }
        }

        self.fan_out(&conn, &selected, &unique_ids, &mut items, &mut found)?;

        if let Some(missing) = (0..unique_ids.len()).find(|i| !found.contains(i)) {
            return Err(Error::id_not_found(unique_ids[missing]));
        }
        Ok(items)
    }

    /// Reads one dataset item by id.
    pub fn read_dataset_item(
        &self,
        id: &str,
        select: Option<&ReadSelection>,
    ) -> Result<DatasetItem> {
        let mut items = self.read_dataset_items(&[id], select)?;
        items.pop().ok_or_else(|| Error::id_not_found(id))
    }

    /// Reads a window of dataset items, ordered by id length then id.
    ///
    /// Empty windows (`limit == 0`, or an offset past the end) read as
    /// empty lists.
    pub fn get_dataset_items(
        &self,
        offset: usize,
        limit: usize,
        select: Option<&ReadSelection>,
    ) -> Result<Vec<DatasetItem>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let all = ReadSelection::all();
        let selection = select.unwrap_or(&all);
        let selected = selection.resolve(&self.schema)?;
        let template = self.projected_template(&selected)?;

        let conn = self.connect()?;
        let item_table = conn.open_table(self.schema.item_table()?)?;
        let mut query = item_table
            .query()
            .order_by_key("id")
            .offset(offset)
            .limit(limit);
        if !selected.item_fields {
            query = query.columns(&["id"]);
        }
        let rows = query.collect()?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut items: Vec<DatasetItem> = Vec::with_capacity(rows.len());
        let mut ids: Vec<String> = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(id) = row.id().map(str::to_string) else {
                continue;
            };
            let mut item = DatasetItem::from_template(&template, &id);
            if selected.item_fields {
                item.set_attributes(row);
            }
            ids.push(id);
            items.push(item);
        }

        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let mut found = BTreeSet::new();
        self.fan_out(&conn, &selected, &id_refs, &mut items, &mut found)?;
        Ok(items)
    }

    /// Reads the explicit window `[start, stop)`; a window with
    /// `start >= stop` is an `InvalidPagination` error.
    pub fn get_dataset_items_range(
        &self,
        start: usize,
        stop: usize,
        select: Option<&ReadSelection>,
    ) -> Result<Vec<DatasetItem>> {
        if start >= stop {
            return Err(Error::invalid_pagination(start, stop));
        }
        self.get_dataset_items(start, stop - start, select)
    }

    /// Queries every selected non-item table with `item_id IN ids` and
    /// merges the rows into `items` (parallel to `ids`), marking the
    /// positions that matched.
    fn fan_out(
        &self,
        conn: &Connection,
        selected: &SelectedTables,
        ids: &[&str],
        items: &mut [DatasetItem],
        found: &mut BTreeSet<usize>,
    ) -> Result<()> {
        for table_name in &selected.tables {
            let table = conn.open_table(table_name)?;
            let rows = table
                .query()
                .filter(Predicate::in_list("item_id", ids.iter().copied()))
                .collect()?;
            for row in rows {
                let Some(position) = row
                    .get_str("item_id")
                    .and_then(|item_id| position_of(ids, item_id))
                else {
                    continue;
                };
                items[position].push_row(table_name, row);
                found.insert(position);
            }
        }
        Ok(())
    }

    fn projected_template(&self, selected: &SelectedTables) -> Result<ItemTemplate> {
        let template = self.template()?;
        let mut keep: BTreeSet<String> = selected.tables.iter().cloned().collect();
        if selected.item_fields {
            keep.insert(template.item_table().to_string());
        }
        Ok(template.project(&keep))
    }

    // ----- named read surface ------------------------------------------------

    /// Full dataset item for one id.
    pub fn read_item(&self, id: &str) -> Result<DatasetItem> {
        self.read_dataset_item(id, None)
    }

    /// Full dataset items for a list of ids.
    pub fn read_items(&self, ids: &[&str]) -> Result<Vec<DatasetItem>> {
        self.read_dataset_items(ids, None)
    }

    pub fn read_view(&self, id: &str) -> Result<DatasetItem> {
        self.read_dataset_item(id, Some(&ReadSelection::group(Group::View)))
    }

    pub fn read_views(&self, ids: &[&str], tables: Option<&[&str]>) -> Result<Vec<DatasetItem>> {
        self.read_group(ids, Group::View, tables)
    }

    pub fn read_object(&self, id: &str) -> Result<DatasetItem> {
        self.read_dataset_item(id, Some(&ReadSelection::group(Group::Object)))
    }

    pub fn read_objects(&self, ids: &[&str], tables: Option<&[&str]>) -> Result<Vec<DatasetItem>> {
        self.read_group(ids, Group::Object, tables)
    }

    pub fn read_embedding(&self, id: &str) -> Result<DatasetItem> {
        self.read_dataset_item(id, Some(&ReadSelection::group(Group::Embedding)))
    }

    pub fn read_embeddings(
        &self,
        ids: &[&str],
        tables: Option<&[&str]>,
    ) -> Result<Vec<DatasetItem>> {
        self.read_group(ids, Group::Embedding, tables)
    }

    fn read_group(
        &self,
        ids: &[&str],
        group: Group,
        tables: Option<&[&str]>,
    ) -> Result<Vec<DatasetItem>> {
        let selection = match tables {
            None => ReadSelection::group(group),
            Some(named) => ReadSelection::default().with_tables(group, named.iter().copied()),
        };
        self.read_dataset_items(ids, Some(&selection))
    }

    /// Full dataset item at a window position.
    pub fn get_item(&self, offset: usize) -> Result<Option<DatasetItem>> {
        Ok(self.get_dataset_items(offset, 1, None)?.pop())
    }

    pub fn get_items(&self, offset: usize, limit: usize) -> Result<Vec<DatasetItem>> {
        self.get_dataset_items(offset, limit, None)
    }

    pub fn get_views(&self, offset: usize, limit: usize) -> Result<Vec<DatasetItem>> {
        self.get_dataset_items(offset, limit, Some(&ReadSelection::group(Group::View)))
    }

    pub fn get_objects(&self, offset: usize, limit: usize) -> Result<Vec<DatasetItem>> {
        self.get_dataset_items(offset, limit, Some(&ReadSelection::group(Group::Object)))
    }

    pub fn get_embeddings(&self, offset: usize, limit: usize) -> Result<Vec<DatasetItem>> {
        self.get_dataset_items(offset, limit, Some(&ReadSelection::group(Group::Embedding)))
    }

    /// Reads every row of one table, in storage order.
    pub fn table_rows(&self, table: &str) -> Result<Vec<Record>> {
        self.schema.table(table)?;
        let conn = self.connect()?;
        conn.open_table(table)?.query().collect()
    }

    /// Single-column membership search on one table.
    pub fn search(
        &self,
        table: &str,
        field: &str,
        values: &[Value],
        limit: Option<usize>,
    ) -> Result<Vec<Record>> {
        self.schema.table(table)?;
        let conn = self.connect()?;
        let handle = conn.open_table(table)?;
        let mut query = handle
            .query()
            .filter(Predicate::In(field.to_string(), values.to_vec()));
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        query.collect()
    }

    // ----- writes ------------------------------------------------------------

    /// Appends rows to a table. Ids are validated before anything is
    /// written, so a rejected batch leaves the table unmodified.
    pub fn add_rows(&self, table: &str, rows: &[Record]) -> Result<()> {
        self.schema.table(table)?;
        validate_row_ids(table, rows)?;
        let conn = self.connect()?;
        conn.open_table(table)?.add(rows)
    }

    /// Replaces rows by primary key: deletes the incoming ids, then
    /// inserts the new rows.
    pub fn replace_rows(&self, table: &str, rows: &[Record]) -> Result<()> {
        self.schema.table(table)?;
        validate_row_ids(table, rows)?;
        let ids: Vec<&str> = rows.iter().filter_map(Record::id).collect();
        let conn = self.connect()?;
        let handle = conn.open_table(table)?;
        handle.delete(&Predicate::in_list("id", ids))?;
        handle.add(rows)
    }

    /// Deletes rows by primary key; returns the number removed.
    pub fn delete_rows(&self, table: &str, ids: &[&str]) -> Result<usize> {
        self.schema.table(table)?;
        let conn = self.connect()?;
        conn.open_table(table)?
            .delete(&Predicate::in_list("id", ids.iter().copied()))
    }
}

fn position_of(ids: &[&str], id: &str) -> Option<usize> {
    ids.iter().position(|candidate| *candidate == id)
}

/// Rejects rows whose id is missing or contains whitespace, naming the
/// offending table and id.
pub(crate) fn validate_row_ids(table: &str, rows: &[Record]) -> Result<()> {
    for row in rows {
        let id = row
            .id()
            .ok_or_else(|| Error::invalid_arg("id", format!("row for '{table}' has no id")))?;
        if !is_valid_id(id) {
            return Err(Error::id_contains_whitespace(table, id));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_validation_names_table_and_id() {
        let rows = vec![Record::new().with("id", "bad id")];
        let err = validate_row_ids("objects", &rows).unwrap_err();
        match err.kind() {
            fovea_common::error::ErrorKind::IdContainsWhitespace { table, id } => {
                assert_eq!(table, "objects");
                assert_eq!(id, "bad id");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
