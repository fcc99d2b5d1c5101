// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Brickscan Contributors

//! HTTP client for the vision service (detection + identification)

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use image::DynamicImage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{encode_crop_jpeg, PieceClassifier, PieceIdentity, RegionDetector, RegionProposal};
use crate::{BrickscanError, Result};

/// Client for a vision service exposing `/api/detect` and `/api/identify`
pub struct RemoteVision {
    client: Client,
    base_url: String,
    model: String,
    retries: u32,
}

#[derive(Serialize)]
struct VisionRequest {
    model: String,
    /// JPEG image, base64-encoded
    image: String,
}

#[derive(Deserialize)]
struct DetectResponse {
    regions: Vec<RegionProposal>,
}

#[derive(Deserialize)]
struct IdentifyResponse {
    part_number: String,
    part_name: String,
    category: String,
    confidence: f64,
}

#[derive(Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    name: String,
}

impl RemoteVision {
    /// Create a new vision service client
    pub fn new(base_url: &str, model: &str, timeout_secs: u64, retries: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| BrickscanError::Config(format!("Failed to create HTTP client: {}", e)))?;

        // Normalize URL
        let base_url = base_url
            .trim_end_matches('/')
            .replace("/api/detect", "")
            .replace("/api/identify", "");

        Ok(Self {
            client,
            base_url,
            model: model.to_string(),
            retries,
        })
    }

    /// Check if the vision service is reachable
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/models", self.base_url);

        self.client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                BrickscanError::VisionUnavailable(format!(
                    "Cannot connect to vision service at {}: {}",
                    self.base_url, e
                ))
            })?;

        Ok(())
    }

    /// List models the service has loaded
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/models", self.base_url);

        let response = self.client.get(&url).send().await?;
        let models: ModelsResponse = response.json().await?;
        Ok(models.models.into_iter().map(|m| m.name).collect())
    }

    /// Check whether the configured model is available
    pub async fn model_available(&self) -> Result<bool> {
        let models = self.list_models().await?;
        Ok(models
            .iter()
            .any(|m| m.starts_with(&self.model) || *m == format!("{}:latest", self.model)))
    }

    fn encode_request(&self, image: &DynamicImage) -> Result<VisionRequest> {
        let jpeg = encode_crop_jpeg(image)?;
        Ok(VisionRequest {
            model: self.model.clone(),
            image: general_purpose::STANDARD.encode(jpeg),
        })
    }

    async fn post_detect(&self, image: &DynamicImage) -> Result<Vec<RegionProposal>> {
        let url = format!("{}/api/detect", self.base_url);
        let request = self.encode_request(image)?;

        debug!("Sending detect request: model={}", self.model);

        let response = self.client.post(&url).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(BrickscanError::Detector(format!(
                "vision service returned status {}",
                response.status()
            )));
        }

        let result: DetectResponse = response.json().await?;
        Ok(result.regions)
    }

    async fn post_identify(&self, crop: &DynamicImage) -> Result<PieceIdentity> {
        let url = format!("{}/api/identify", self.base_url);
        let request = self.encode_request(crop)?;

        debug!("Sending identify request: model={}", self.model);

        let response = self.client.post(&url).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(BrickscanError::Classifier(format!(
                "vision service returned status {}",
                response.status()
            )));
        }

        let result: IdentifyResponse = response.json().await?;
        Ok(PieceIdentity {
            part_number: result.part_number,
            part_name: result.part_name,
            category: result.category,
            confidence: result.confidence.clamp(0.0, 1.0),
        })
    }

    /// Identify with retry on transient failures
    async fn identify_with_retry(&self, crop: &DynamicImage) -> Result<PieceIdentity> {
        let mut last_error = None;

        for attempt in 0..=self.retries {
            if attempt > 0 {
                let delay = Duration::from_secs(2u64.pow(attempt - 1));
                warn!("Retrying identify in {:?} (attempt {})", delay, attempt + 1);
                tokio::time::sleep(delay).await;
            }

            match self.post_identify(crop).await {
                Ok(identity) => return Ok(identity),
                Err(e) => {
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| BrickscanError::VisionUnavailable("Unknown error".to_string())))
    }
}

#[async_trait]
impl RegionDetector for RemoteVision {
    async fn detect(&self, image: &DynamicImage) -> Result<Vec<RegionProposal>> {
        self.post_detect(image).await
    }
}

#[async_trait]
impl PieceClassifier for RemoteVision {
    async fn identify(&self, crop: &DynamicImage) -> Result<PieceIdentity> {
        self.identify_with_retry(crop).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_normalization() {
        let client = RemoteVision::new("http://localhost:9090/api/detect", "partnet", 30, 0)
            .unwrap();
        assert_eq!(client.base_url, "http://localhost:9090");

        let client = RemoteVision::new("http://localhost:9090/", "partnet", 30, 0).unwrap();
        assert_eq!(client.base_url, "http://localhost:9090");
    }

    #[test]
    fn test_encode_request_is_base64_jpeg() {
        let client = RemoteVision::new("http://localhost:9090", "partnet", 30, 0).unwrap();
        let crop = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            4,
            4,
            image::Rgb([200, 30, 10]),
        ));
        let request = client.encode_request(&crop).unwrap();
        let decoded = general_purpose::STANDARD.decode(request.image).unwrap();
        assert!(image::load_from_memory(&decoded).is_ok());
    }
}
