// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Brickscan Contributors

//! Scan pipeline: detect regions, classify each concurrently, join once
//!
//! One `run` call fans out one task per detected region and fans back in
//! through a counting join that fires batch completion exactly once, after
//! every region has reached a terminal state. Per-region failures shrink the
//! batch; only image decoding and detection are pipeline-fatal.

use chrono::{DateTime, Utc};
use image::{DynamicImage, GenericImageView};
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, Semaphore};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::classify::ColorClassifier;
use crate::vision::{BoundingBox, PieceClassifier, RegionDetector, RegionProposal};
use crate::{BrickscanError, Result};

/// One classified candidate awaiting user review, alive for the duration of
/// a single batch
#[derive(Debug, Clone)]
pub struct PieceCandidate {
    /// Unique within one ScanBatch; never shared with a catalog record
    pub local_id: Uuid,
    pub part_number: String,
    pub part_name: String,
    pub category: String,
    pub color_id: i64,
    pub color_name: String,
    pub confidence: f64,
    pub bounding_box: BoundingBox,
    pub crop: DynamicImage,
}

/// Immutable result of one pipeline run
#[derive(Debug, Clone)]
pub struct ScanBatch {
    pub source_width: u32,
    pub source_height: u32,
    /// Region-discovery order, not task-completion order
    pub candidates: Vec<PieceCandidate>,
    /// Regions excluded because their classification failed
    pub dropped_regions: usize,
    pub timestamp: DateTime<Utc>,
}

impl ScanBatch {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Counting join over N per-region tasks.
///
/// Each terminal state (success or recorded failure) decrements the
/// outstanding count; the call that reaches zero receives the full slot set
/// exactly once. Late or duplicate completions are ignored.
struct BatchCollector {
    state: Mutex<CollectorState>,
}

struct CollectorState {
    slots: Vec<Option<PieceCandidate>>,
    settled: Vec<bool>,
    remaining: usize,
    fired: bool,
}

impl BatchCollector {
    fn new(region_count: usize) -> Self {
        Self {
            state: Mutex::new(CollectorState {
                slots: (0..region_count).map(|_| None).collect(),
                settled: vec![false; region_count],
                remaining: region_count,
                fired: false,
            }),
        }
    }

    /// Record the terminal state for region `index`. Returns the assembled
    /// slot set exactly when the final outstanding region lands, `None` in
    /// every other case.
    fn complete(
        &self,
        index: usize,
        outcome: Option<PieceCandidate>,
    ) -> Option<Vec<Option<PieceCandidate>>> {
        let mut state = self.state.lock().expect("collector lock poisoned");

        if state.fired || index >= state.settled.len() || state.settled[index] {
            return None;
        }

        state.settled[index] = true;
        state.slots[index] = outcome;
        state.remaining -= 1;

        if state.remaining == 0 {
            state.fired = true;
            Some(std::mem::take(&mut state.slots))
        } else {
            None
        }
    }
}

/// Orchestrates one photograph through detection, cropping, color
/// classification, and identity classification
pub struct ScanPipeline {
    detector: Arc<dyn RegionDetector>,
    classifier: Arc<dyn PieceClassifier>,
    color: Arc<ColorClassifier>,
    max_concurrent: usize,
}

impl ScanPipeline {
    pub fn new(
        detector: Arc<dyn RegionDetector>,
        classifier: Arc<dyn PieceClassifier>,
        color: ColorClassifier,
        max_concurrent: usize,
    ) -> Self {
        Self {
            detector,
            classifier,
            color: Arc::new(color),
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Decode and scan a captured image.
    pub async fn run(&self, image_bytes: &[u8]) -> Result<ScanBatch> {
        let image = image::load_from_memory(image_bytes)
            .map_err(|e| BrickscanError::InvalidImage(e.to_string()))?;
        self.run_decoded(image).await
    }

    /// Scan an already-decoded image.
    pub async fn run_decoded(&self, image: DynamicImage) -> Result<ScanBatch> {
        let (source_width, source_height) = image.dimensions();

        let proposals = self.detector.detect(&image).await?;
        debug!("Detector proposed {} regions", proposals.len());

        // Zero detections is a valid empty result, not a failure.
        if proposals.is_empty() {
            return Ok(ScanBatch {
                source_width,
                source_height,
                candidates: Vec::new(),
                dropped_regions: 0,
                timestamp: Utc::now(),
            });
        }

        let region_count = proposals.len();
        let image = Arc::new(image);
        let collector = Arc::new(BatchCollector::new(region_count));
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));

        // The task that settles the last region takes the sender and fires
        // completion; the mutex makes the fire step mutually exclusive.
        let (done_tx, done_rx) = oneshot::channel();
        let done_tx = Arc::new(Mutex::new(Some(done_tx)));

        for (index, proposal) in proposals.into_iter().enumerate() {
            let image = Arc::clone(&image);
            let collector = Arc::clone(&collector);
            let semaphore = Arc::clone(&semaphore);
            let done_tx = Arc::clone(&done_tx);
            let classifier = Arc::clone(&self.classifier);
            let color = Arc::clone(&self.color);

            // Detached: a caller that abandons the run leaves region tasks
            // running to completion.
            tokio::spawn(async move {
                // Only fails if the semaphore is closed, which never happens
                let _permit = semaphore.acquire_owned().await.ok();

                let outcome =
                    match process_region(&image, proposal, index, &*classifier, &color).await {
                        Ok(candidate) => Some(candidate),
                        Err(e) => {
                            warn!("Region {} excluded from batch: {}", index, e);
                            None
                        }
                    };

                if let Some(slots) = collector.complete(index, outcome) {
                    let sender = done_tx.lock().expect("completion lock poisoned").take();
                    if let Some(sender) = sender {
                        // Receiver gone means the caller abandoned the run.
                        let _ = sender.send(slots);
                    }
                }
            });
        }

        let slots = done_rx.await.map_err(|_| {
            BrickscanError::Classifier("scan tasks terminated without completing".to_string())
        })?;

        let candidates: Vec<PieceCandidate> = slots.into_iter().flatten().collect();
        let dropped_regions = region_count - candidates.len();

        Ok(ScanBatch {
            source_width,
            source_height,
            candidates,
            dropped_regions,
            timestamp: Utc::now(),
        })
    }
}

/// Crop one proposed region and classify its color and identity.
async fn process_region(
    image: &DynamicImage,
    proposal: RegionProposal,
    index: usize,
    classifier: &dyn PieceClassifier,
    color: &ColorClassifier,
) -> Result<PieceCandidate> {
    let (image_width, image_height) = image.dimensions();
    let (x, y, w, h) = proposal.bounding_box.to_pixels(image_width, image_height);
    if w == 0 || h == 0 {
        return Err(BrickscanError::InvalidRegion(format!(
            "region {} crops to zero area",
            index
        )));
    }

    let crop = image.crop_imm(x, y, w, h);

    let palette_color = color.classify(&crop)?;
    let identity = classifier.identify(&crop).await?;

    Ok(PieceCandidate {
        local_id: Uuid::new_v4(),
        part_number: identity.part_number,
        part_name: identity.part_name,
        category: identity.category,
        color_id: palette_color.id,
        color_name: palette_color.name.to_string(),
        confidence: identity.confidence,
        bounding_box: proposal.bounding_box,
        crop,
    })
}
