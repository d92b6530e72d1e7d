//! ArcFace-style face encoder via ONNX Runtime.
//!
//! Maps a face crop to an L2-normalized 512-dimensional descriptor.
//! Two crops of the same person land within the configured similarity
//! threshold of each other; that property comes from the model, not
//! from anything this module reasons about.

use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

use crate::imageops::resize_bilinear;
use crate::types::{Descriptor, Encode, FaceCrop};

const ENCODER_INPUT_SIZE: usize = 112;
const ENCODER_MEAN: f32 = 127.5;
const ENCODER_STD: f32 = 127.5;
const DESCRIPTOR_DIM: usize = 512;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("model file not found: {0} — download w600k_mbf.onnx and place in the model dir")]
    ModelNotFound(String),
    #[error("degenerate face crop ({width}x{height})")]
    DegenerateCrop { width: u32, height: u32 },
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// ONNX-backed face encoder.
pub struct FaceEncoder {
    session: Session,
}

impl FaceEncoder {
    /// Load the encoder ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, EncoderError> {
        if !Path::new(model_path).exists() {
            return Err(EncoderError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded face encoder model"
        );

        Ok(Self { session })
    }

    /// Resize a crop to 112×112 and normalize into a NCHW float tensor.
    fn preprocess(crop: &FaceCrop) -> Array4<f32> {
        let size = ENCODER_INPUT_SIZE;
        let resized = resize_bilinear(
            &crop.data,
            crop.width as usize,
            crop.height as usize,
            size,
            size,
        );

        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

        for y in 0..size {
            for x in 0..size {
                let pixel = resized.get(y * size + x).copied().unwrap_or(0) as f32;
                let normalized = (pixel - ENCODER_MEAN) / ENCODER_STD;
                // Grayscale → 3-channel: replicate Y → [R=Y, G=Y, B=Y]
                tensor[[0, 0, y, x]] = normalized;
                tensor[[0, 1, y, x]] = normalized;
                tensor[[0, 2, y, x]] = normalized;
            }
        }

        tensor
    }
}

impl Encode for FaceEncoder {
    /// Encode a face crop into a descriptor.
    ///
    /// Deterministic for identical input. Degenerate crops fail with
    /// `DegenerateCrop`; the caller skips the detection and continues.
    fn encode(&mut self, crop: &FaceCrop) -> Result<Descriptor, EncoderError> {
        if crop.width == 0 || crop.height == 0 || crop.data.is_empty() {
            return Err(EncoderError::DegenerateCrop {
                width: crop.width,
                height: crop.height,
            });
        }

        let input = Self::preprocess(crop);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EncoderError::InferenceFailed(format!("descriptor extraction: {e}")))?;

        let raw: Vec<f32> = raw_data.to_vec();

        if raw.len() != DESCRIPTOR_DIM {
            return Err(EncoderError::InferenceFailed(format!(
                "expected {DESCRIPTOR_DIM}-dim descriptor, got {}",
                raw.len()
            )));
        }

        // L2-normalize so cosine distance is well-behaved downstream.
        let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
        let values = if norm > 0.0 {
            raw.iter().map(|x| x / norm).collect()
        } else {
            raw
        };

        Ok(Descriptor::new(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_output_shape() {
        let crop = FaceCrop { data: vec![128u8; 80 * 60], width: 80, height: 60 };
        let tensor = FaceEncoder::preprocess(&crop);
        assert_eq!(tensor.shape(), &[1, 3, ENCODER_INPUT_SIZE, ENCODER_INPUT_SIZE]);
    }

    #[test]
    fn test_preprocess_normalization() {
        let crop = FaceCrop {
            data: vec![128u8; ENCODER_INPUT_SIZE * ENCODER_INPUT_SIZE],
            width: ENCODER_INPUT_SIZE as u32,
            height: ENCODER_INPUT_SIZE as u32,
        };
        let tensor = FaceEncoder::preprocess(&crop);
        let expected = (128.0 - ENCODER_MEAN) / ENCODER_STD;
        assert!((tensor[[0, 0, 0, 0]] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_channels_identical() {
        let crop = FaceCrop { data: vec![100u8; 30 * 30], width: 30, height: 30 };
        let tensor = FaceEncoder::preprocess(&crop);
        for y in 0..ENCODER_INPUT_SIZE {
            for x in 0..ENCODER_INPUT_SIZE {
                assert_eq!(tensor[[0, 0, y, x]], tensor[[0, 1, y, x]]);
                assert_eq!(tensor[[0, 1, y, x]], tensor[[0, 2, y, x]]);
            }
        }
    }
}
