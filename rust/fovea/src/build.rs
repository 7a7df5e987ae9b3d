//! Batched dataset ingestion from a source directory.
//!
//! The source is laid out as `{source_dir}/{split}/{media files}` with a
//! sideband `metadata.jsonl` per split (one JSON object per line, keyed
//! to a media file through its `view` member). Each media file yields
//! one item row, one view row and zero or more object rows; rows are
//! buffered per table and flushed every `batch_size` items.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use uuid::Uuid;

use fovea_common::{Result, error::Error};
use fovea_schema::{DatasetSchema, Group, ItemShape};
use fovea_store::{Connection, CreateMode, Table};
use fovea_types::{BBox, CompressedRle, Record, Value};

use crate::dataset::{
    DB_DIR, FEATURES_FILE, INFO_FILE, MEDIA_DIR, SCHEMA_FILE, validate_row_ids,
};
use crate::features::FeaturesValues;
use crate::info::DatasetInfo;
use crate::Dataset;

/// Disposition of the target dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Create the tables, overwriting a previous dataset at the target.
    Create,
    /// Append to the tables of an existing dataset.
    Append,
}

const METADATA_FILE: &str = "metadata.jsonl";
const DEFAULT_BATCH_SIZE: usize = 1000;
const DEFAULT_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Builds a dataset from a source directory in one pass.
pub struct DatasetBuilder {
    source_dir: PathBuf,
    target_dir: PathBuf,
    schema: DatasetSchema,
    name: String,
    description: String,
    batch_size: usize,
    media_extensions: Vec<String>,
}

impl DatasetBuilder {
    /// Creates a builder from a declared dataset-item shape.
    pub fn new(
        source_dir: impl AsRef<Path>,
        target_dir: impl AsRef<Path>,
        shape: ItemShape,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<DatasetBuilder> {
        let schema = DatasetSchema::from_item_shape(&shape)?;
        Ok(Self::from_schema(source_dir, target_dir, schema, name, description))
    }

    /// Creates a builder from an already-derived dataset schema.
    pub fn from_schema(
        source_dir: impl AsRef<Path>,
        target_dir: impl AsRef<Path>,
        schema: DatasetSchema,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> DatasetBuilder {
        DatasetBuilder {
            source_dir: source_dir.as_ref().to_path_buf(),
            target_dir: target_dir.as_ref().to_path_buf(),
            schema,
            name: name.into(),
            description: description.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            media_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> DatasetBuilder {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn media_extensions(
        mut self,
        extensions: impl IntoIterator<Item = impl Into<String>>,
    ) -> DatasetBuilder {
        self.media_extensions = extensions
            .into_iter()
            .map(|e| e.into().to_lowercase())
            .collect();
        self
    }

    /// Runs the build: creates (or reopens) the tables, ingests every
    /// split, then writes the sideband documents. Any failed write
    /// aborts the build.
    pub fn build(&self, mode: BuildMode) -> Result<Dataset> {
        let item_table_name = self.schema.item_table()?.to_string();
        let view_table_name = self.view_table()?.to_string();
        let object_table_name = self.object_table().map(str::to_string);

        std::fs::create_dir_all(&self.target_dir)
            .map_err(|e| Error::io(self.target_dir.display().to_string(), e))?;
        let conn = Connection::open(self.target_dir.join(DB_DIR))?;
        let mut tables: BTreeMap<String, Table> = BTreeMap::new();
        for (table_name, table_schema) in self.schema.tables() {
            let table = match mode {
                BuildMode::Create => {
                    debug!("creating table '{table_name}'");
                    conn.create_table(table_name, table_schema, CreateMode::Overwrite)?
                }
                BuildMode::Append => {
                    if conn.has_table(table_name) {
                        conn.open_table(table_name)?
                    } else {
                        conn.create_table(table_name, table_schema, CreateMode::Create)?
                    }
                }
            };
            tables.insert(table_name.to_string(), table);
        }

        let mut ingest = Ingest {
            schema: &self.schema,
            item_table: item_table_name,
            view_table: view_table_name,
            object_table: object_table_name,
            tables,
            buffers: BTreeMap::new(),
            buffered_items: 0,
            total_items: 0,
            batch_size: self.batch_size,
            media_dir: self.target_dir.join(MEDIA_DIR),
        };

        for split_dir in sorted_dirs(&self.source_dir)? {
            let split = split_dir
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            let metadata = load_metadata(&split_dir.join(METADATA_FILE))?;
            info!("ingesting split '{split}' ({} metadata lines)", metadata.len());
            for media_path in sorted_files(&split_dir)? {
                if !self.is_media_file(&media_path) {
                    continue;
                }
                let file_name = media_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default()
                    .to_string();
                let Some(line) = metadata.get(&file_name) else {
                    warn!("no metadata line for '{split}/{file_name}', skipping");
                    continue;
                };
                ingest.media_file(&split, &media_path, &file_name, line)?;
            }
        }
        ingest.flush()?;

        let item_count = ingest.total_items;
        self.write_documents(mode, item_count)?;
        Dataset::open(&self.target_dir)
    }

    fn is_media_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.media_extensions.iter().any(|ext| ext == &e.to_lowercase()))
            .unwrap_or(false)
    }

    /// The view table media files are ingested into. Folder ingestion
    /// requires exactly one view table.
    fn view_table(&self) -> Result<&str> {
        let views = self.schema.tables_in_group(Group::View);
        match views.as_slice() {
            [single] => Ok(*single),
            [] => Err(Error::invalid_arg(
                "schema",
                "folder ingestion requires a view table",
            )),
            _ => Err(Error::invalid_arg(
                "schema",
                "folder ingestion requires exactly one view table",
            )),
        }
    }

    /// The object table annotations are ingested into: the first
    /// object-group table that carries a bbox field.
    fn object_table(&self) -> Option<&str> {
        self.schema
            .tables_in_group(Group::Object)
            .into_iter()
            .find(|table| {
                self.schema
                    .table(table)
                    .map(|schema| schema.has_field("bbox"))
                    .unwrap_or(false)
            })
    }

    fn write_documents(&self, mode: BuildMode, item_count: u64) -> Result<()> {
        let info_path = self.target_dir.join(INFO_FILE);
        let mut dataset_info = match mode {
            BuildMode::Append if info_path.is_file() => DatasetInfo::load(&info_path)?,
            _ => DatasetInfo::new(Uuid::new_v4().simple().to_string(), self.name.clone()),
        };
        dataset_info.description = self.description.clone();
        dataset_info.num_elements += item_count;
        dataset_info.size = human_size(dir_size(&self.target_dir));
        dataset_info.save(&info_path)?;

        let features_path = self.target_dir.join(FEATURES_FILE);
        if !features_path.is_file() {
            FeaturesValues::default().save(&features_path)?;
        }
        self.schema.save(&self.target_dir.join(SCHEMA_FILE))?;
        Ok(())
    }
}

/// Mutable ingestion state: per-table buffers and the table handles.
struct Ingest<'a> {
    schema: &'a DatasetSchema,
    item_table: String,
    view_table: String,
    object_table: Option<String>,
    tables: BTreeMap<String, Table>,
    buffers: BTreeMap<String, Vec<Record>>,
    buffered_items: usize,
    total_items: u64,
    batch_size: usize,
    media_dir: PathBuf,
}

impl Ingest<'_> {
    fn media_file(
        &mut self,
        split: &str,
        media_path: &Path,
        file_name: &str,
        line: &serde_json::Value,
    ) -> Result<()> {
        let item_id = line
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(new_id);
        let view_id = new_id();

        let mut item_row = Record::new().with("id", item_id.as_str()).with("split", split);
        let item_schema = self.schema.table(&self.item_table)?;
        for (field, _) in item_schema.fields() {
            if field == "id" || field == "split" {
                continue;
            }
            if let Some(value) = line.get(field) {
                item_row.set(field.clone(), Value::from_json(value));
            }
        }

        let mut view_row = self.view_row(&item_id, &view_id, split, media_path, file_name)?;
        // sequence position and other declared view fields come straight
        // from the metadata line when present
        let view_schema = self.schema.table(&self.view_table)?;
        for (field, _) in view_schema.fields() {
            if view_row.contains(field) {
                continue;
            }
            if let Some(value) = line.get(field) {
                view_row.set(field.clone(), Value::from_json(value));
            }
        }

        let mut object_rows = Vec::new();
        if let Some(annotations) = line.get("objects") {
            object_rows = objects_from_metadata(annotations, &item_id, &view_id)?;
        }

        self.copy_media(split, media_path, file_name)?;

        self.buffer(self.item_table.clone(), item_row);
        self.buffer(self.view_table.clone(), view_row);
        match self.object_table.clone() {
            Some(object_table) => {
                for row in object_rows {
                    self.buffer(object_table.clone(), row);
                }
            }
            None if !object_rows.is_empty() => {
                warn!("metadata carries object annotations but the schema has no object table");
            }
            None => {}
        }
        self.item_done()
    }

    fn view_row(
        &self,
        item_id: &str,
        view_id: &str,
        split: &str,
        media_path: &Path,
        file_name: &str,
    ) -> Result<Record> {
        let reader = image::ImageReader::open(media_path)
            .map_err(|e| Error::io(media_path.display().to_string(), e))?
            .with_guessed_format()
            .map_err(|e| Error::io(media_path.display().to_string(), e))?;
        let format = reader.format().map(format_name).unwrap_or("UNKNOWN");
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| Error::invalid_format(media_path.display().to_string(), e.to_string()))?;
        Ok(Record::new()
            .with("id", view_id)
            .with("item_id", item_id)
            .with("url", format!("{split}/{file_name}"))
            .with("width", width as i64)
            .with("height", height as i64)
            .with("format", format))
    }

    fn copy_media(&self, split: &str, media_path: &Path, file_name: &str) -> Result<()> {
        let target_dir = self.media_dir.join(split);
        std::fs::create_dir_all(&target_dir)
            .map_err(|e| Error::io(target_dir.display().to_string(), e))?;
        let target = target_dir.join(file_name);
        std::fs::copy(media_path, &target)
            .map_err(|e| Error::io(target.display().to_string(), e))?;
        Ok(())
    }

    fn buffer(&mut self, table: String, row: Record) {
        self.buffers.entry(table).or_default().push(row);
    }

    fn item_done(&mut self) -> Result<()> {
        self.buffered_items += 1;
        self.total_items += 1;
        if self.buffered_items >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Validates every buffered row id, then appends the buffers to
    /// their tables. Validation happens before any write so a rejected
    /// batch leaves all tables unmodified.
    fn flush(&mut self) -> Result<()> {
        for (table, rows) in &self.buffers {
            validate_row_ids(table, rows)?;
        }
        for (table, rows) in std::mem::take(&mut self.buffers) {
            if rows.is_empty() {
                continue;
            }
            let handle = self
                .tables
                .get(&table)
                .ok_or_else(|| Error::table_not_found(table.clone()))?;
            debug!("flushing {} rows into '{table}'", rows.len());
            handle.add(&rows)?;
        }
        self.buffered_items = 0;
        Ok(())
    }
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn format_name(format: image::ImageFormat) -> &'static str {
    match format {
        image::ImageFormat::Jpeg => "JPEG",
        image::ImageFormat::Png => "PNG",
        image::ImageFormat::WebP => "WEBP",
        image::ImageFormat::Gif => "GIF",
        image::ImageFormat::Tiff => "TIFF",
        image::ImageFormat::Bmp => "BMP",
        _ => "UNKNOWN",
    }
}

/// Parses one split's `metadata.jsonl` into a map keyed by the `view`
/// member. An absent file yields an empty map.
fn load_metadata(path: &Path) -> Result<BTreeMap<String, serde_json::Value>> {
    if !path.is_file() {
        return Ok(BTreeMap::new());
    }
    let text =
        std::fs::read_to_string(path).map_err(|e| Error::io(path.display().to_string(), e))?;
    let mut lines = BTreeMap::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(line).map_err(|e| {
            Error::invalid_format(
                format!("{}:{}", path.display(), number + 1),
                e.to_string(),
            )
        })?;
        let Some(view) = value.get("view").and_then(|v| v.as_str()) else {
            return Err(Error::invalid_format(
                format!("{}:{}", path.display(), number + 1),
                "metadata line has no 'view' member",
            ));
        };
        lines.insert(view.to_string(), value);
    }
    Ok(lines)
}

/// Builds object rows from a metadata `objects` annotation: parallel
/// lists per annotation kind (`bbox`, `mask`), zipped by index.
fn objects_from_metadata(
    annotations: &serde_json::Value,
    item_id: &str,
    view_id: &str,
) -> Result<Vec<Record>> {
    let Some(map) = annotations.as_object() else {
        return Err(Error::invalid_format(
            "metadata",
            "'objects' must be an object of annotation lists",
        ));
    };
    let bboxes = match map.get("bbox") {
        Some(serde_json::Value::Array(entries)) => {
            entries.iter().map(parse_bbox).collect::<Result<Vec<_>>>()?
        }
        Some(_) => {
            return Err(Error::invalid_format("metadata", "'bbox' must be a list"));
        }
        None => Vec::new(),
    };
    let masks = match map.get("mask") {
        Some(serde_json::Value::Array(entries)) => entries
            .iter()
            .map(parse_mask)
            .collect::<Result<Vec<_>>>()?,
        Some(_) => {
            return Err(Error::invalid_format("metadata", "'mask' must be a list"));
        }
        None => Vec::new(),
    };

    let count = bboxes.len().max(masks.len());
    let mut rows = Vec::with_capacity(count);
    for index in 0..count {
        let mut row = Record::new()
            .with("id", new_id())
            .with("item_id", item_id)
            .with("view_id", view_id);
        if let Some(bbox) = bboxes.get(index) {
            row.set("bbox", bbox.to_value());
        }
        if let Some(mask) = masks.get(index) {
            row.set("mask", mask.to_value());
        }
        rows.push(row);
    }
    Ok(rows)
}

/// A bbox annotation is either a bare 4-number list (interpreted as
/// normalized `xywh` with full confidence) or an explicit bbox struct.
fn parse_bbox(json: &serde_json::Value) -> Result<BBox> {
    if let Some(entries) = json.as_array() {
        if entries.len() == 4 {
            let mut coords = [0f32; 4];
            for (slot, entry) in coords.iter_mut().zip(entries) {
                *slot = entry
                    .as_f64()
                    .ok_or_else(|| Error::invalid_format("metadata", "bbox coords must be numbers"))?
                    as f32;
            }
            return Ok(BBox::from_xywh_list(coords));
        }
    }
    serde_json::from_value(json.clone())
        .map_err(|e| Error::invalid_format("metadata", format!("bad bbox annotation: {e}")))
}

fn parse_mask(json: &serde_json::Value) -> Result<CompressedRle> {
    serde_json::from_value(json.clone())
        .map_err(|e| Error::invalid_format("metadata", format!("bad mask annotation: {e}")))
}

fn sorted_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).map_err(|e| Error::io(dir.display().to_string(), e))?;
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).map_err(|e| Error::io(dir.display().to_string(), e))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

fn dir_size(dir: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                dir_size(&path)
            } else {
                path.metadata().map(|m| m.len()).unwrap_or(0)
            }
        })
        .sum()
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_annotations_parse_both_forms() {
        let bare: serde_json::Value = serde_json::json!([1, 1, 100, 100]);
        let bbox = parse_bbox(&bare).unwrap();
        assert_eq!(bbox.coords, [1.0, 1.0, 100.0, 100.0]);
        assert_eq!(bbox.format, fovea_types::BBoxFormat::Xywh);
        assert!(bbox.is_normalized);
        assert_eq!(bbox.confidence, 1.0);

        let explicit: serde_json::Value = serde_json::json!({
            "coords": [0, 0, 100, 100],
            "format": "xyxy",
            "is_normalized": false,
            "confidence": 0.9
        });
        let bbox = parse_bbox(&explicit).unwrap();
        assert_eq!(bbox.format, fovea_types::BBoxFormat::Xyxy);
        assert!((bbox.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn metadata_lines_key_by_view() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(METADATA_FILE);
        std::fs::write(
            &path,
            "{\"view\": \"a.jpg\", \"label\": \"cat\"}\n\n{\"view\": \"b.jpg\"}\n",
        )
        .unwrap();
        let lines = load_metadata(&path).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines["a.jpg"]["label"], "cat");
    }

    #[test]
    fn metadata_without_view_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(METADATA_FILE);
        std::fs::write(&path, "{\"label\": \"cat\"}\n").unwrap();
        assert!(load_metadata(&path).is_err());
    }

    #[test]
    fn objects_zip_bbox_and_mask_lists() {
        let annotations = serde_json::json!({
            "bbox": [[1, 1, 10, 10], [2, 2, 5, 5]],
        });
        let rows = objects_from_metadata(&annotations, "item_0", "view_0").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get_str("item_id"), Some("item_0"));
        assert!(rows[0].get("bbox").is_some());
        assert!(rows[0].get("mask").is_none());
    }

    #[test]
    fn sizes_humanize() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MB");
    }
}
