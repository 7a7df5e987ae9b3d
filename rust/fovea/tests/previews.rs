//! Preview generation over built datasets.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fovea::{
    BuildMode, Dataset, DatasetBuilder, ItemShape, PreviewConfig, SequenceEncoder,
    generate_previews,
};
use fovea_common::Result;

fn write_jpeg(path: &Path, width: u32, height: u32) {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 100, 50]));
    img.save(path).unwrap();
}

#[test]
fn image_tables_get_thumbnails() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let train = source.path().join("train");
    std::fs::create_dir_all(&train).unwrap();
    write_jpeg(&train.join("item_0.jpg"), 256, 192);
    write_jpeg(&train.join("item_1.jpg"), 256, 192);
    std::fs::write(
        train.join("metadata.jsonl"),
        "{\"view\": \"item_0.jpg\"}\n{\"view\": \"item_1.jpg\"}\n",
    )
    .unwrap();

    let shape = ItemShape::builder().table("image", "image").build().unwrap();
    let dataset = DatasetBuilder::new(source.path(), target.path(), shape, "thumbs", "")
        .unwrap()
        .build(BuildMode::Create)
        .unwrap();

    let config = PreviewConfig {
        workers: 2,
        thumbnail_size: (32, 32),
        ..Default::default()
    };
    generate_previews(&dataset, &config, None).unwrap();

    let preview_dir = target.path().join("previews/image");
    let thumbnails: Vec<_> = std::fs::read_dir(&preview_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    assert_eq!(thumbnails.len(), 2);

    let (width, height) = image::image_dimensions(thumbnails[0].path()).unwrap();
    assert!(width <= 32 && height <= 32);
}

struct RecordingEncoder {
    calls: Mutex<Vec<(PathBuf, Vec<PathBuf>)>>,
}

impl SequenceEncoder for RecordingEncoder {
    fn encode(&self, frames: &[PathBuf], _fps: f32, _scale: f32, target: &Path) -> Result<()> {
        std::fs::write(target, b"clip")?;
        self.calls
            .lock()
            .expect("encoder lock")
            .push((target.to_path_buf(), frames.to_vec()));
        Ok(())
    }
}

#[test]
fn sequence_tables_encode_one_clip_per_sequence() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let train = source.path().join("train");
    std::fs::create_dir_all(&train).unwrap();
    // two frames of one sequence, deliberately listed out of timestamp
    // order in the metadata
    write_jpeg(&train.join("frame_0.jpg"), 64, 64);
    write_jpeg(&train.join("frame_1.jpg"), 64, 64);
    std::fs::write(
        train.join("metadata.jsonl"),
        concat!(
            "{\"view\": \"frame_1.jpg\", \"sequence_id\": \"seq0\", ",
            "\"timestamp\": 2.0, \"frame_index\": 1}\n",
            "{\"view\": \"frame_0.jpg\", \"sequence_id\": \"seq0\", ",
            "\"timestamp\": 1.0, \"frame_index\": 0}\n",
        ),
    )
    .unwrap();

    let shape = ItemShape::builder()
        .table("frames", "sequence_frame")
        .build()
        .unwrap();
    let dataset = DatasetBuilder::new(source.path(), target.path(), shape, "clips", "")
        .unwrap()
        .build(BuildMode::Create)
        .unwrap();

    let encoder = RecordingEncoder {
        calls: Mutex::new(Vec::new()),
    };
    let config = PreviewConfig {
        workers: 2,
        ..Default::default()
    };
    generate_previews(&dataset, &config, Some(&encoder)).unwrap();

    let calls = encoder.calls.lock().expect("encoder lock");
    assert_eq!(calls.len(), 1);
    let (clip, frames) = &calls[0];
    assert_eq!(clip.file_name().unwrap(), "seq0.mp4");
    assert!(clip.is_file());
    // frames are ordered by timestamp, not metadata order
    assert_eq!(frames.len(), 2);
    assert!(frames[0].ends_with("train/frame_0.jpg"));
    assert!(frames[1].ends_with("train/frame_1.jpg"));

    // reopening still sees the sequence view rows
    let reopened = Dataset::open(target.path()).unwrap();
    let rows = reopened.table_rows("frames").unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.get_str("sequence_id") == Some("seq0")));
}
