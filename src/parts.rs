// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Brickscan Contributors

//! Part-metadata API client
//!
//! Looks up canonical part names and categories from a part database REST
//! API. Separate from the vision service: this is reference data, not
//! classification.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::{BrickscanError, Result};

/// Client for the part-metadata REST API
pub struct PartsClient {
    client: Client,
    base_url: String,
    api_key: String,
}

/// Canonical information about one part
#[derive(Debug, Clone, Deserialize)]
pub struct PartInfo {
    pub part_num: String,
    pub name: String,
    pub part_cat_id: Option<i64>,
    pub part_img_url: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<PartInfo>,
}

impl PartInfo {
    /// Human-readable category name for the part's category id
    pub fn category_name(&self) -> &'static str {
        category_name(self.part_cat_id.unwrap_or(0))
    }
}

/// Map part-database category ids to display names
pub fn category_name(category_id: i64) -> &'static str {
    match category_id {
        1 => "Baseplate",
        3 => "Brick",
        4 => "Brick, Modified",
        11 => "Plate",
        14 => "Plate, Modified",
        15 => "Slope",
        18 => "Tile",
        26 => "Minifig",
        _ => "Other",
    }
}

impl PartsClient {
    /// Create a new part-metadata client
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BrickscanError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Fetch canonical info for one part number
    pub async fn part_info(&self, part_number: &str) -> Result<PartInfo> {
        let url = format!("{}/lego/parts/{}/", self.base_url, part_number);

        debug!("Fetching part info: {}", part_number);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("key {}", self.api_key))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BrickscanError::Config(format!(
                "part API returned status {} for part {}",
                response.status(),
                part_number
            )));
        }

        Ok(response.json().await?)
    }

    /// Search parts by free text
    pub async fn search(&self, query: &str) -> Result<Vec<PartInfo>> {
        let url = format!("{}/lego/parts/", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("search", query)])
            .header("Authorization", format!("key {}", self.api_key))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BrickscanError::Config(format!(
                "part API returned status {}",
                response.status()
            )));
        }

        let result: SearchResponse = response.json().await?;
        Ok(result.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_names() {
        assert_eq!(category_name(3), "Brick");
        assert_eq!(category_name(11), "Plate");
        assert_eq!(category_name(0), "Other");
        assert_eq!(category_name(9999), "Other");
    }

    #[test]
    fn test_part_info_deserializes_wire_format() {
        let json = r#"{
            "part_num": "3001",
            "name": "Brick 2 x 4",
            "part_cat_id": 3,
            "part_img_url": null
        }"#;
        let info: PartInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.part_num, "3001");
        assert_eq!(info.category_name(), "Brick");
    }
}
