//! Frame loop — pull frames, detect, and classify every face.

use std::sync::atomic::{AtomicBool, Ordering};

use snooper_core::{Detect, Encode, FaceCrop};
use snooper_hw::FrameSource;

use crate::pipeline::{Outcome, Pipeline};

/// Consecutive transient capture failures tolerated before the loop
/// gives up on a wedged source.
const MAX_CONSECUTIVE_CAPTURE_FAILURES: u32 = 30;

/// Counters accumulated over one run of the watch loop.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WatchStats {
    pub frames: u64,
    pub dark_frames: u64,
    pub capture_failures: u64,
    pub faces: u64,
    pub encode_failures: u64,
    pub whitelisted: u64,
    pub duplicates: u64,
    pub new_records: u64,
}

/// Run the watch loop until the source closes, the stop flag is set, or
/// the source fails too many times in a row.
///
/// No per-frame state survives an iteration; the only things that
/// accumulate are the pipeline's dedup gallery and these counters.
/// Every recoverable failure is logged with the frame sequence (and
/// rectangle where there is one) and skipped.
pub fn run(
    source: &mut dyn FrameSource,
    detector: &mut dyn Detect,
    encoder: &mut dyn Encode,
    pipeline: &mut Pipeline,
    stop: &AtomicBool,
) -> WatchStats {
    let mut stats = WatchStats::default();
    let mut consecutive_failures = 0u32;

    while !stop.load(Ordering::Relaxed) {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => {
                consecutive_failures = 0;
                frame
            }
            Ok(None) => {
                tracing::info!("capture source closed, stopping");
                break;
            }
            Err(err) => {
                stats.capture_failures += 1;
                consecutive_failures += 1;
                tracing::warn!(error = %err, "capture failed, skipping iteration");
                if consecutive_failures >= MAX_CONSECUTIVE_CAPTURE_FAILURES {
                    tracing::error!(
                        failures = consecutive_failures,
                        "capture source keeps failing, stopping"
                    );
                    break;
                }
                continue;
            }
        };

        if frame.is_dark {
            stats.dark_frames += 1;
            tracing::debug!(seq = frame.sequence, "skipping dark frame");
            continue;
        }

        stats.frames += 1;

        let rects = match detector.detect(&frame.data, frame.width, frame.height) {
            Ok(rects) => rects,
            Err(err) => {
                tracing::warn!(seq = frame.sequence, error = %err, "detection failed, skipping frame");
                continue;
            }
        };

        if rects.is_empty() {
            continue;
        }
        tracing::debug!(seq = frame.sequence, faces = rects.len(), "found faces");

        for rect in &rects {
            stats.faces += 1;

            let Some(face_crop) =
                FaceCrop::from_frame(&frame.data, frame.width, frame.height, rect)
            else {
                stats.encode_failures += 1;
                tracing::warn!(
                    seq = frame.sequence,
                    x = rect.x,
                    y = rect.y,
                    w = rect.width,
                    h = rect.height,
                    "degenerate detection rectangle, skipping"
                );
                continue;
            };

            let descriptor = match encoder.encode(&face_crop) {
                Ok(descriptor) => descriptor,
                Err(err) => {
                    stats.encode_failures += 1;
                    tracing::warn!(
                        seq = frame.sequence,
                        x = rect.x,
                        y = rect.y,
                        w = rect.width,
                        h = rect.height,
                        error = %err,
                        "encoding failed, skipping detection"
                    );
                    continue;
                }
            };

            match pipeline.classify(&descriptor, &face_crop) {
                Outcome::Whitelisted { label, distance } => {
                    stats.whitelisted += 1;
                    tracing::debug!(seq = frame.sequence, label, distance, "whitelisted face");
                }
                Outcome::DuplicateUnknown { id, distance } => {
                    stats.duplicates += 1;
                    tracing::debug!(seq = frame.sequence, id, distance, "already captured");
                }
                Outcome::NewUnknown { id } => {
                    stats.new_records += 1;
                    tracing::info!(seq = frame.sequence, id, "captured new unknown face");
                }
            }
        }
    }

    stats
}
