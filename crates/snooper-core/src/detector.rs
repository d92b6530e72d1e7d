//! UltraFace (version-RFB-320) face detector via ONNX Runtime.
//!
//! Single-stage SSD variant whose exported graph already applies the
//! priors: it emits per-anchor class scores and normalized corner-form
//! boxes, so decoding is confidence filtering + rescaling + NMS.

use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

use crate::imageops::resize_bilinear;
use crate::types::{BoundingBox, Detect};

const ULTRAFACE_INPUT_WIDTH: usize = 320;
const ULTRAFACE_INPUT_HEIGHT: usize = 240;
const ULTRAFACE_MEAN: f32 = 127.0;
const ULTRAFACE_STD: f32 = 128.0;
const ULTRAFACE_CONFIDENCE_THRESHOLD: f32 = 0.7;
const ULTRAFACE_NMS_THRESHOLD: f32 = 0.3;
/// Values per anchor in the score tensor: [background, face].
const ULTRAFACE_CLASSES: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — download version-RFB-320.onnx and place in the model dir")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// UltraFace-based face detector.
pub struct FaceDetector {
    session: Session,
    /// (scores, boxes) output tensor positions, discovered at load time.
    output_indices: (usize, usize),
}

impl FaceDetector {
    /// Load the UltraFace ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?output_names,
            "loaded UltraFace model"
        );

        if output_names.len() < 2 {
            return Err(DetectorError::InferenceFailed(format!(
                "UltraFace model requires 2 outputs (scores, boxes), got {}",
                output_names.len()
            )));
        }

        let output_indices = discover_output_indices(&output_names);
        tracing::debug!(?output_indices, "UltraFace output tensor mapping");

        Ok(Self { session, output_indices })
    }

    /// Preprocess a grayscale frame into a 320×240 NCHW float tensor.
    ///
    /// The frame is stretched (no letterbox) — UltraFace was trained on
    /// stretched input and box coordinates come back normalized, so the
    /// aspect distortion cancels out on the way back.
    fn preprocess(frame: &[u8], width: usize, height: usize) -> Array4<f32> {
        let resized = resize_bilinear(
            frame,
            width,
            height,
            ULTRAFACE_INPUT_WIDTH,
            ULTRAFACE_INPUT_HEIGHT,
        );

        let mut tensor =
            Array4::<f32>::zeros((1, 3, ULTRAFACE_INPUT_HEIGHT, ULTRAFACE_INPUT_WIDTH));

        for y in 0..ULTRAFACE_INPUT_HEIGHT {
            for x in 0..ULTRAFACE_INPUT_WIDTH {
                let pixel = resized
                    .get(y * ULTRAFACE_INPUT_WIDTH + x)
                    .copied()
                    .unwrap_or(0) as f32;
                let normalized = (pixel - ULTRAFACE_MEAN) / ULTRAFACE_STD;
                // Grayscale → 3-channel: replicate Y → [R=Y, G=Y, B=Y]
                tensor[[0, 0, y, x]] = normalized;
                tensor[[0, 1, y, x]] = normalized;
                tensor[[0, 2, y, x]] = normalized;
            }
        }

        tensor
    }
}

impl Detect for FaceDetector {
    /// Detect faces in a grayscale frame, returning boxes sorted by confidence.
    fn detect(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<BoundingBox>, DetectorError> {
        let input = Self::preprocess(frame, width as usize, height as usize);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (score_idx, box_idx) = self.output_indices;
        let (_, scores) = outputs[score_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("scores: {e}")))?;
        let (_, boxes) = outputs[box_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("boxes: {e}")))?;

        let candidates = decode(
            scores,
            boxes,
            width as f32,
            height as f32,
            ULTRAFACE_CONFIDENCE_THRESHOLD,
        );

        let mut result = nms(candidates, ULTRAFACE_NMS_THRESHOLD);
        result.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(result)
    }
}

/// Map output tensor names to (scores, boxes) positions.
///
/// The reference export names them "scores" and "boxes"; unknown names
/// fall back to positional order.
fn discover_output_indices(names: &[String]) -> (usize, usize) {
    let scores = names.iter().position(|n| n == "scores");
    let boxes = names.iter().position(|n| n == "boxes");

    match (scores, boxes) {
        (Some(s), Some(b)) => (s, b),
        _ => {
            tracing::info!(
                ?names,
                "UltraFace: output names not recognized, assuming [0]=scores, [1]=boxes"
            );
            (0, 1)
        }
    }
}

/// Decode raw tensors into frame-space candidate boxes above threshold.
///
/// `scores` is `[background, face]` per anchor; `boxes` is normalized
/// `[x1, y1, x2, y2]` per anchor.
fn decode(
    scores: &[f32],
    boxes: &[f32],
    frame_w: f32,
    frame_h: f32,
    threshold: f32,
) -> Vec<BoundingBox> {
    let num_anchors = scores.len() / ULTRAFACE_CLASSES;
    let mut detections = Vec::new();

    for idx in 0..num_anchors {
        let confidence = scores[idx * ULTRAFACE_CLASSES + 1];
        if confidence <= threshold {
            continue;
        }

        let off = idx * 4;
        if off + 3 >= boxes.len() {
            continue;
        }

        let x1 = (boxes[off] * frame_w).clamp(0.0, frame_w);
        let y1 = (boxes[off + 1] * frame_h).clamp(0.0, frame_h);
        let x2 = (boxes[off + 2] * frame_w).clamp(0.0, frame_w);
        let y2 = (boxes[off + 3] * frame_h).clamp(0.0, frame_h);

        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        detections.push(BoundingBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence,
        });
    }

    detections
}

/// Non-Maximum Suppression: drop boxes overlapping a higher-confidence one.
fn nms(mut detections: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<BoundingBox> = Vec::new();

    for det in detections {
        let overlaps = keep.iter().any(|k| iou(k, &det) > iou_threshold);
        if !overlaps {
            keep.push(det);
        }
    }

    keep
}

/// Intersection-over-Union of two boxes.
fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.area() + b.area() - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
