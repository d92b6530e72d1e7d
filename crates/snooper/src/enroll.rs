//! Whitelist loading — labeled reference images to identity records.
//!
//! The whitelist directory holds one image per known identity; the file
//! stem is the label. Loading happens once before the watch loop starts
//! and any failure is fatal: running with a partially loaded whitelist
//! risks capturing a known person as an unknown.

use anyhow::{bail, Context, Result};
use std::path::Path;

use snooper_core::{Detect, Encode, FaceCrop};
use snooper_store::IdentityRecord;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Load every reference image under `dir` into identity records.
///
/// A missing directory is an empty whitelist (logged); an image that
/// cannot be read, contains no detectable face, or fails to encode
/// aborts the load.
pub fn load_whitelist(
    dir: &Path,
    detector: &mut dyn Detect,
    encoder: &mut dyn Encode,
) -> Result<Vec<IdentityRecord>> {
    if !dir.exists() {
        tracing::warn!(dir = %dir.display(), "whitelist directory missing, running with empty whitelist");
        return Ok(Vec::new());
    }

    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read whitelist directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        })
        .collect();
    paths.sort();

    let mut records = Vec::with_capacity(paths.len());

    for path in paths {
        let label = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .unwrap_or_default();
        if label.is_empty() {
            bail!("whitelist image {} has no usable label", path.display());
        }

        let image = image::open(&path)
            .with_context(|| format!("failed to read whitelist image {}", path.display()))?
            .to_luma8();
        let (width, height) = image.dimensions();

        let faces = detector
            .detect(image.as_raw(), width, height)
            .with_context(|| format!("detection failed on whitelist image {}", path.display()))?;

        // Detector output is sorted by confidence; take the best face.
        let Some(face) = faces.first() else {
            bail!("no face found in whitelist image {}", path.display());
        };

        let crop = FaceCrop::from_frame(image.as_raw(), width, height, face)
            .with_context(|| format!("degenerate face in whitelist image {}", path.display()))?;

        let descriptor = encoder
            .encode(&crop)
            .with_context(|| format!("encoding failed on whitelist image {}", path.display()))?;

        tracing::info!(label, path = %path.display(), confidence = face.confidence, "whitelist identity loaded");
        records.push(IdentityRecord { label, descriptor });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use snooper_core::{BoundingBox, Descriptor, DetectorError, EncoderError};

    struct OneFaceDetector;

    impl Detect for OneFaceDetector {
        fn detect(
            &mut self,
            _frame: &[u8],
            width: u32,
            height: u32,
        ) -> Result<Vec<BoundingBox>, DetectorError> {
            Ok(vec![BoundingBox {
                x: 0.0,
                y: 0.0,
                width: width as f32,
                height: height as f32,
                confidence: 0.9,
            }])
        }
    }

    struct NoFaceDetector;

    impl Detect for NoFaceDetector {
        fn detect(
            &mut self,
            _frame: &[u8],
            _width: u32,
            _height: u32,
        ) -> Result<Vec<BoundingBox>, DetectorError> {
            Ok(vec![])
        }
    }

    struct BrightnessEncoder;

    impl Encode for BrightnessEncoder {
        fn encode(&mut self, crop: &FaceCrop) -> Result<Descriptor, EncoderError> {
            let mean =
                crop.data.iter().map(|&b| b as f32).sum::<f32>() / crop.data.len() as f32;
            Ok(Descriptor::new(vec![mean / 255.0, 1.0]))
        }
    }

    fn write_image(dir: &Path, name: &str, luma: u8) {
        let image = image::GrayImage::from_pixel(8, 8, image::Luma([luma]));
        image.save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_loads_labeled_records_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "alice.png", 100);
        write_image(dir.path(), "bob.png", 200);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let records =
            load_whitelist(dir.path(), &mut OneFaceDetector, &mut BrightnessEncoder).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].label, "alice");
        assert_eq!(records[1].label, "bob");
        assert!(records[0].descriptor.values[0] < records[1].descriptor.values[0]);
    }

    #[test]
    fn test_missing_directory_is_empty_whitelist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let records =
            load_whitelist(&missing, &mut OneFaceDetector, &mut BrightnessEncoder).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_image_without_face_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "alice.png", 100);

        let result = load_whitelist(dir.path(), &mut NoFaceDetector, &mut BrightnessEncoder);
        assert!(result.is_err());
    }

    #[test]
    fn test_unreadable_image_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("alice.png"), b"not a png").unwrap();

        let result = load_whitelist(dir.path(), &mut OneFaceDetector, &mut BrightnessEncoder);
        assert!(result.is_err());
    }
}
