// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Brickscan Contributors

//! Error types for Brickscan

use thiserror::Error;

/// Result type alias for Brickscan operations
pub type Result<T> = std::result::Result<T, BrickscanError>;

/// Brickscan error types
#[derive(Error, Debug)]
pub enum BrickscanError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Vision service not available: {0}")]
    VisionUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Undecodable image: {0}")]
    InvalidImage(String),

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Detector failure: {0}")]
    Detector(String),

    #[error("Classifier failure: {0}")]
    Classifier(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
