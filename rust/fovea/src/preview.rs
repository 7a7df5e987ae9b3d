//! Preview generation: per-item thumbnails for image tables, short
//! encoded clips for sequence-frame tables.
//!
//! An optional post-step after building. Work is distributed over a
//! bounded worker pool; a failure on one item is logged and skipped
//! rather than aborting the pass. Clip encoding itself is pluggable
//! through [`SequenceEncoder`]; thumbnails are rendered directly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{info, warn};
use rayon::prelude::*;

use fovea_common::{Result, error::Error};
use fovea_schema::Group;
use fovea_types::Record;

use crate::Dataset;
use crate::dataset::PREVIEWS_DIR;
use crate::media::MediaUrl;

/// Tuning for the preview pass.
#[derive(Debug, Clone)]
pub struct PreviewConfig {
    /// Bounded worker pool size.
    pub workers: usize,
    /// Frame rate of encoded sequence clips.
    pub fps: f32,
    /// Spatial scale of encoded sequence clips.
    pub scale: f32,
    /// Bounding size of image thumbnails.
    pub thumbnail_size: (u32, u32),
}

impl Default for PreviewConfig {
    fn default() -> PreviewConfig {
        PreviewConfig {
            workers: 10,
            fps: 25.0,
            scale: 0.5,
            thumbnail_size: (128, 128),
        }
    }
}

/// Encodes an ordered list of frames into a short clip. Provided by the
/// embedding application; rendering pipelines are outside the core.
pub trait SequenceEncoder: Sync {
    fn encode(&self, frames: &[PathBuf], fps: f32, scale: f32, target: &Path) -> Result<()>;
}

/// Generates previews for every view table of the dataset.
///
/// Image-based tables get a thumbnail per row under
/// `previews/{table}/{id}.jpg`. Sequence-frame tables are grouped by
/// `sequence_id`, sorted by `timestamp`, and handed to `encoder` as
/// `previews/{table}/{sequence_id}.mp4`; they are skipped with a warning
/// when no encoder is supplied.
pub fn generate_previews(
    dataset: &Dataset,
    config: &PreviewConfig,
    encoder: Option<&dyn SequenceEncoder>,
) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers.max(1))
        .build()
        .map_err(|e| Error::invalid_arg("workers", e.to_string()))?;

    for table in dataset.schema().tables_in_group(Group::View) {
        let table_schema = dataset.schema().table(table)?;
        let rows = dataset.table_rows(table)?;
        let out_dir = dataset.path().join(PREVIEWS_DIR).join(table);
        std::fs::create_dir_all(&out_dir)
            .map_err(|e| Error::io(out_dir.display().to_string(), e))?;

        match table_schema.base_name() {
            "sequence_frame" => {
                let Some(encoder) = encoder else {
                    warn!("no sequence encoder supplied, skipping previews for '{table}'");
                    continue;
                };
                let sequences = group_sequences(dataset, &rows);
                info!(
                    "encoding {} sequence previews for '{table}'",
                    sequences.len()
                );
                pool.install(|| {
                    sequences.par_iter().for_each(|(sequence_id, frames)| {
                        let target = out_dir.join(format!("{sequence_id}.mp4"));
                        if let Err(err) =
                            encoder.encode(frames, config.fps, config.scale, &target)
                        {
                            warn!("sequence preview for '{sequence_id}' failed: {err}");
                        }
                    });
                });
            }
            "image" => {
                info!("rendering {} thumbnails for '{table}'", rows.len());
                pool.install(|| {
                    rows.par_iter().for_each(|row| {
                        if let Err(err) =
                            render_thumbnail(dataset, &out_dir, row, config.thumbnail_size)
                        {
                            warn!(
                                "thumbnail for '{}' failed: {err}",
                                row.id().unwrap_or("<no id>")
                            );
                        }
                    });
                });
            }
            other => {
                log::debug!("no preview renderer for '{table}' (base '{other}')");
            }
        }
    }
    Ok(())
}

/// Groups sequence-frame rows by `sequence_id` and orders each group by
/// `timestamp`, resolving frame urls to local paths.
fn group_sequences(dataset: &Dataset, rows: &[Record]) -> BTreeMap<String, Vec<PathBuf>> {
    let mut sequences: BTreeMap<String, Vec<(f64, PathBuf)>> = BTreeMap::new();
    for row in rows {
        let Some(sequence_id) = row.get_str("sequence_id") else {
            continue;
        };
        let Some(url) = row.get_str("url") else {
            continue;
        };
        let Ok(MediaUrl::Local(path)) = dataset.media_url(url) else {
            continue;
        };
        let timestamp = row.get_f64("timestamp").unwrap_or(0.0);
        sequences
            .entry(sequence_id.to_string())
            .or_default()
            .push((timestamp, path));
    }
    sequences
        .into_iter()
        .map(|(sequence_id, mut frames)| {
            frames.sort_by(|a, b| a.0.total_cmp(&b.0));
            (
                sequence_id,
                frames.into_iter().map(|(_, path)| path).collect(),
            )
        })
        .collect()
}

fn render_thumbnail(
    dataset: &Dataset,
    out_dir: &Path,
    row: &Record,
    size: (u32, u32),
) -> Result<()> {
    let id = row
        .id()
        .ok_or_else(|| Error::invalid_format("preview", "view row has no id"))?;
    let url = row
        .get_str("url")
        .ok_or_else(|| Error::invalid_format("preview", "view row has no url"))?;
    let MediaUrl::Local(path) = dataset.media_url(url)? else {
        // remote media is not fetched by the preview pass
        return Ok(());
    };
    let img = image::open(&path)
        .map_err(|e| Error::invalid_format(path.display().to_string(), e.to_string()))?;
    let thumb = img.thumbnail(size.0, size.1).to_rgb8();
    let target = out_dir.join(format!("{id}.jpg"));
    thumb
        .save(&target)
        .map_err(|e| Error::invalid_format(target.display().to_string(), e.to_string()))?;
    Ok(())
}
