use serde::{Deserialize, Serialize};

use crate::detector::DetectorError;
use crate::encoder::EncoderError;

/// Bounding box for a detected face, in frame pixel coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl BoundingBox {
    /// Area in square pixels. Zero for degenerate rectangles.
    pub fn area(&self) -> f32 {
        if self.width <= 0.0 || self.height <= 0.0 {
            0.0
        } else {
            self.width * self.height
        }
    }
}

/// Fixed-length face descriptor used for similarity comparison.
///
/// Produced deterministically by the encoder from a face crop and
/// immutable once created. Encoder output is L2-normalized, so cosine
/// distance between two descriptors lies in [0, 2].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descriptor {
    pub values: Vec<f32>,
}

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Cosine similarity in [-1, 1]. Higher = more similar.
    ///
    /// Always processes all dimensions; a zero-norm operand yields 0.
    pub fn cosine_similarity(&self, other: &Descriptor) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 {
            dot / denom
        } else {
            0.0
        }
    }

    /// Cosine distance in [0, 2]: `1 - cosine_similarity`.
    pub fn cosine_distance(&self, other: &Descriptor) -> f32 {
        1.0 - self.cosine_similarity(other)
    }

    /// Euclidean distance between two descriptors.
    pub fn euclidean_distance(&self, other: &Descriptor) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// A grayscale face crop cut out of a full frame.
///
/// The crop keeps its own copy of the pixels so it can outlive the frame
/// it came from (it is persisted when the face turns out to be new).
#[derive(Debug, Clone)]
pub struct FaceCrop {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl FaceCrop {
    /// Cut the bounding rectangle out of a grayscale frame.
    ///
    /// The rectangle is clamped to the frame; returns `None` when the
    /// clamped region is degenerate (zero area) — the caller treats this
    /// as an encoding failure and skips the detection.
    pub fn from_frame(
        frame: &[u8],
        frame_width: u32,
        frame_height: u32,
        rect: &BoundingBox,
    ) -> Option<Self> {
        if frame_width == 0 || frame_height == 0 {
            return None;
        }
        if frame.len() < (frame_width * frame_height) as usize {
            return None;
        }

        let x0 = (rect.x.floor().max(0.0) as u32).min(frame_width);
        let y0 = (rect.y.floor().max(0.0) as u32).min(frame_height);
        let x1 = ((rect.x + rect.width).ceil().max(0.0) as u32).min(frame_width);
        let y1 = ((rect.y + rect.height).ceil().max(0.0) as u32).min(frame_height);

        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        let width = x1 - x0;
        let height = y1 - y0;
        let mut data = Vec::with_capacity((width * height) as usize);

        for y in y0..y1 {
            let row = (y * frame_width + x0) as usize;
            data.extend_from_slice(&frame[row..row + width as usize]);
        }

        Some(Self { data, width, height })
    }
}

/// Face detection seam: black box producing zero or more rectangles per frame.
pub trait Detect {
    fn detect(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<BoundingBox>, DetectorError>;
}

/// Face encoding seam: crop in, descriptor out.
pub trait Encode {
    fn encode(&mut self, crop: &FaceCrop) -> Result<Descriptor, EncoderError>;
}
