use crate::batch::types::WorkItem;
use crate::error::{ItemError, Stage};
use crate::imaging::variants::{VARIANTS, Variant};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageEncoder, ImageReader};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Derivative pipeline run by a worker for one work item
///
/// Each item writes only under `<output_root>/<item name>/`.
#[derive(Debug, Clone)]
pub struct DerivativePipeline {
    output_root: PathBuf,
    jpeg_quality: u8,
}

impl DerivativePipeline {
    pub fn new(output_root: impl Into<PathBuf>, jpeg_quality: u8) -> Self {
        Self {
            output_root: output_root.into(),
            jpeg_quality,
        }
    }

    /// Output namespace of a work item
    pub fn item_dir(&self, item: &WorkItem) -> PathBuf {
        self.output_root.join(&item.name)
    }

    /// Run every variant for `item`, stopping at the first failure
    ///
    /// Derivatives written before a failure are left in place.
    pub fn process(&self, item: &WorkItem) -> Result<(), ItemError> {
        let item_dir = self.item_dir(item);
        fs::create_dir_all(&item_dir).map_err(|e| {
            ItemError::new(
                Stage::Prepare,
                format!("failed to create {}: {e}", item_dir.display()),
            )
        })?;

        let source = decode(&item.source_path)?;
        tracing::trace!(
            "Decoded {} ({}x{})",
            item.source_path.display(),
            source.width(),
            source.height()
        );

        for variant in &VARIANTS {
            self.render(&source, variant, &item_dir)?;
        }
        Ok(())
    }

    fn render(&self, source: &DynamicImage, variant: &Variant, item_dir: &Path) -> Result<(), ItemError> {
        let derived = variant
            .apply(source)
            .map_err(ItemError::at(Stage::Transform(variant.name)))?;

        let target = item_dir.join(variant.file_name());
        self.write_jpeg(&derived, &target)
            .map_err(|e| ItemError::new(Stage::Write(variant.name), format!("{}: {e}", target.display())))?;

        tracing::trace!("Wrote {}", target.display());
        Ok(())
    }

    fn write_jpeg(&self, image: &DynamicImage, target: &Path) -> anyhow::Result<()> {
        let rgb = image.to_rgb8();
        let mut writer = BufWriter::new(File::create(target)?);
        JpegEncoder::new_with_quality(&mut writer, self.jpeg_quality).write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )?;
        writer.flush()?;
        Ok(())
    }
}

fn decode(path: &Path) -> Result<DynamicImage, ItemError> {
    let reader = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| ItemError::new(Stage::Decode, format!("failed to read {}: {e}", path.display())))?;

    reader
        .decode()
        .map_err(|e| ItemError::new(Stage::Decode, format!("failed to decode {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32) {
        RgbImage::from_fn(width, height, |x, y| Rgb([(x * 7) as u8, (y * 5) as u8, 200]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_process_writes_every_variant() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("photo.png");
        write_png(&source, 64, 48);

        let output = temp_dir.path().join("out").join("nested");
        let pipeline = DerivativePipeline::new(&output, 80);
        let item = WorkItem::new(&source, "photo");
        pipeline.process(&item).unwrap();

        for variant in &VARIANTS {
            let written = output.join("photo").join(variant.file_name());
            assert!(written.is_file(), "missing {}", written.display());
            let decoded = image::open(&written).unwrap();
            assert!(decoded.width() <= 64 && decoded.height() <= 48);
        }
    }

    #[test]
    fn test_write_failure_keeps_earlier_derivatives() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("p.png");
        write_png(&source, 20, 20);

        let output = temp_dir.path().join("out");
        // A directory where medium.jpg should go
        fs::create_dir_all(output.join("p").join("medium.jpg")).unwrap();

        let pipeline = DerivativePipeline::new(&output, 85);
        let err = pipeline.process(&WorkItem::new(&source, "p")).unwrap_err();
        assert_eq!(err.stage, Stage::Write("medium"));

        let item_dir = output.join("p");
        assert!(item_dir.join("thumbnail.jpg").is_file());
        assert!(item_dir.join("small.jpg").is_file());
        assert!(!item_dir.join("large.jpg").exists());
        assert!(!item_dir.join("grayscale.jpg").exists());
        assert!(!item_dir.join("blur.jpg").exists());
    }

    #[test]
    fn test_process_is_idempotent_on_existing_namespace() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.png");
        write_png(&source, 16, 16);

        let pipeline = DerivativePipeline::new(temp_dir.path().join("out"), 85);
        let item = WorkItem::new(&source, "a");
        pipeline.process(&item).unwrap();
        pipeline.process(&item).unwrap();
    }

    #[test]
    fn test_corrupt_input_fails_at_decode() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("corrupt.png");
        fs::write(&source, b"definitely not a png").unwrap();

        let pipeline = DerivativePipeline::new(temp_dir.path().join("out"), 85);
        let err = pipeline.process(&WorkItem::new(&source, "corrupt")).unwrap_err();
        assert_eq!(err.stage, Stage::Decode);
        // The namespace exists but nothing was written into it
        let dir = temp_dir.path().join("out").join("corrupt");
        assert!(dir.is_dir());
        assert_eq!(fs::read_dir(dir).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_source_fails_at_decode() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = DerivativePipeline::new(temp_dir.path().join("out"), 85);
        let err = pipeline
            .process(&WorkItem::new(temp_dir.path().join("gone.jpg"), "gone"))
            .unwrap_err();
        assert_eq!(err.stage, Stage::Decode);
    }

    #[test]
    fn test_unwritable_namespace_fails_at_prepare() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.png");
        write_png(&source, 8, 8);
        // A regular file where the output root should be
        let blocker = temp_dir.path().join("out");
        fs::write(&blocker, b"file").unwrap();

        let pipeline = DerivativePipeline::new(&blocker, 85);
        let err = pipeline.process(&WorkItem::new(&source, "a")).unwrap_err();
        assert_eq!(err.stage, Stage::Prepare);
    }
}
