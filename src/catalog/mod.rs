// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Brickscan Contributors

//! Persistent piece catalog (thread-safe SQLite wrapper)
//!
//! The catalog is the only mutable shared state in the system. One instance
//! is constructed at startup and passed by reference to everything that
//! reads or writes records.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::pipeline::{PieceCandidate, ScanBatch};
use crate::vision::encode_crop_jpeg;
use crate::{BrickscanError, Result};

/// One durable, user-owned entry representing a counted piece
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: String,
    pub part_number: String,
    pub part_name: String,
    pub color_name: String,
    pub color_id: i64,
    pub quantity: i64,
    pub image_path: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub confidence: Option<f64>,
    pub date_added: DateTime<Utc>,
}

/// Catalog-level statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogStats {
    pub record_count: i64,
    pub total_quantity: i64,
    pub category_count: i64,
}

/// Per-candidate quantity/location edits applied at commit time
#[derive(Debug, Clone, Default)]
pub struct CandidateEdits {
    quantities: HashMap<Uuid, i64>,
    locations: HashMap<Uuid, String>,
}

impl CandidateEdits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_quantity(&mut self, local_id: Uuid, quantity: i64) {
        self.quantities.insert(local_id, quantity);
    }

    pub fn set_location(&mut self, local_id: Uuid, location: impl Into<String>) {
        self.locations.insert(local_id, location.into());
    }

    /// Edited quantity for a candidate, defaulting to one
    pub fn quantity_for(&self, local_id: &Uuid) -> i64 {
        self.quantities.get(local_id).copied().unwrap_or(1).max(1)
    }

    pub fn location_for(&self, local_id: &Uuid) -> Option<&str> {
        self.locations.get(local_id).map(String::as_str)
    }
}

/// Piece catalog over SQLite (thread-safe wrapper)
#[derive(Clone)]
pub struct Catalog {
    conn: Arc<Mutex<Connection>>,
}

impl Catalog {
    /// Open or create the catalog database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let catalog = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        catalog.initialize()?;
        Ok(catalog)
    }

    /// Open an in-memory catalog (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let catalog = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        catalog.initialize()?;
        Ok(catalog)
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| BrickscanError::Config("Catalog lock poisoned".to_string()))
    }

    /// Initialize database schema
    fn initialize(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS pieces (
                id TEXT PRIMARY KEY,
                part_number TEXT NOT NULL,
                part_name TEXT NOT NULL,
                color_name TEXT NOT NULL,
                color_id INTEGER NOT NULL,
                quantity INTEGER NOT NULL CHECK (quantity >= 1),
                image_path TEXT,
                category TEXT,
                location TEXT,
                confidence REAL,
                date_added TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_pieces_part_number ON pieces(part_number);
            CREATE INDEX IF NOT EXISTS idx_pieces_category ON pieces(category);
        "#,
        )?;
        Ok(())
    }

    /// Persist one candidate as a new record. Never merges: committing the
    /// same part and color twice produces two independent records.
    pub fn create(
        &self,
        candidate: &PieceCandidate,
        quantity: i64,
        location: Option<&str>,
        image_path: Option<&str>,
    ) -> Result<CatalogRecord> {
        let record = CatalogRecord {
            id: Uuid::new_v4().to_string(),
            part_number: candidate.part_number.clone(),
            part_name: candidate.part_name.clone(),
            color_name: candidate.color_name.clone(),
            color_id: candidate.color_id,
            quantity: quantity.max(1),
            image_path: image_path.map(String::from),
            category: Some(candidate.category.clone()),
            location: location.map(String::from),
            confidence: Some(candidate.confidence),
            date_added: Utc::now(),
        };

        let conn = self.lock_conn()?;
        conn.execute(
            r#"INSERT INTO pieces (id, part_number, part_name, color_name, color_id, quantity,
                                   image_path, category, location, confidence, date_added)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
            params![
                record.id,
                record.part_number,
                record.part_name,
                record.color_name,
                record.color_id,
                record.quantity,
                record.image_path,
                record.category,
                record.location,
                record.confidence,
                record.date_added.to_rfc3339(),
            ],
        )?;

        debug!("Created record {} ({})", record.id, record.part_name);
        Ok(record)
    }

    /// Commit a reviewed batch: one record per candidate, applying the
    /// user's quantity/location edits. When an image directory is given,
    /// each crop is stored there as a content-addressed JPEG and the path
    /// recorded.
    pub fn commit_batch(
        &self,
        batch: &ScanBatch,
        edits: &CandidateEdits,
        image_dir: Option<&Path>,
    ) -> Result<Vec<CatalogRecord>> {
        let mut records = Vec::with_capacity(batch.candidates.len());

        for candidate in &batch.candidates {
            let image_path = match image_dir {
                Some(dir) => Some(store_crop(dir, candidate)?),
                None => None,
            };

            records.push(self.create(
                candidate,
                edits.quantity_for(&candidate.local_id),
                edits.location_for(&candidate.local_id),
                image_path.as_deref(),
            )?);
        }

        Ok(records)
    }

    /// Remove a record. Returns false (no-op) if the id is absent.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.lock_conn()?;
        let changed = conn.execute("DELETE FROM pieces WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Partial update of quantity and/or location; absent fields are left
    /// unchanged. Returns false if the id is absent.
    pub fn update(&self, id: &str, quantity: Option<i64>, location: Option<&str>) -> Result<bool> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            r#"UPDATE pieces
               SET quantity = COALESCE(?2, quantity),
                   location = COALESCE(?3, location)
               WHERE id = ?1"#,
            params![id, quantity.map(|q| q.max(1)), location],
        )?;
        Ok(changed > 0)
    }

    /// Full snapshot, newest first. Same-timestamp records order by
    /// insertion, newest insert first.
    pub fn all_records(&self) -> Result<Vec<CatalogRecord>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT id, part_number, part_name, color_name, color_id, quantity,
                      image_path, category, location, confidence, date_added
               FROM pieces ORDER BY date_added DESC, rowid DESC"#,
        )?;
        let records = stmt
            .query_map([], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Case-insensitive substring search across part number, part name,
    /// color name, and location.
    pub fn search(&self, query: &str) -> Result<Vec<CatalogRecord>> {
        let conn = self.lock_conn()?;
        let pattern = format!("%{}%", query);
        let mut stmt = conn.prepare(
            r#"SELECT id, part_number, part_name, color_name, color_id, quantity,
                      image_path, category, location, confidence, date_added
               FROM pieces
               WHERE part_number LIKE ?1 OR part_name LIKE ?1
                  OR color_name LIKE ?1 OR location LIKE ?1
               ORDER BY date_added DESC, rowid DESC"#,
        )?;
        let records = stmt
            .query_map(params![pattern], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Look up a single record by id
    pub fn get(&self, id: &str) -> Result<Option<CatalogRecord>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT id, part_number, part_name, color_name, color_id, quantity,
                      image_path, category, location, confidence, date_added
               FROM pieces WHERE id = ?1"#,
        )?;
        let mut rows = stmt.query_map(params![id], row_to_record)?;
        match rows.next() {
            Some(record) => Ok(Some(record?)),
            None => Ok(None),
        }
    }

    /// Delete every record in one atomic statement; readers see either the
    /// pre- or post-delete state. Returns the number of records removed.
    pub fn clear(&self) -> Result<usize> {
        let conn = self.lock_conn()?;
        let removed = conn.execute("DELETE FROM pieces", [])?;
        Ok(removed)
    }

    /// Catalog statistics
    pub fn stats(&self) -> Result<CatalogStats> {
        let conn = self.lock_conn()?;
        let record_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM pieces", [], |row| row.get(0))?;
        let total_quantity: i64 = conn.query_row(
            "SELECT COALESCE(SUM(quantity), 0) FROM pieces",
            [],
            |row| row.get(0),
        )?;
        let category_count: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT category) FROM pieces WHERE category IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(CatalogStats {
            record_count,
            total_quantity,
            category_count,
        })
    }

    /// Vacuum the database
    pub fn vacuum(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute("VACUUM", [])?;
        Ok(())
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<CatalogRecord> {
    let date_str: String = row.get(10)?;
    Ok(CatalogRecord {
        id: row.get(0)?,
        part_number: row.get(1)?,
        part_name: row.get(2)?,
        color_name: row.get(3)?,
        color_id: row.get(4)?,
        quantity: row.get(5)?,
        image_path: row.get(6)?,
        category: row.get(7)?,
        location: row.get(8)?,
        confidence: row.get(9)?,
        date_added: DateTime::parse_from_rfc3339(&date_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

/// Store a candidate's crop as a content-addressed JPEG, returning the path
fn store_crop(dir: &Path, candidate: &PieceCandidate) -> Result<String> {
    std::fs::create_dir_all(dir)?;

    let jpeg = encode_crop_jpeg(&candidate.crop)?;
    let hash = blake3::hash(&jpeg);
    let path = dir.join(format!("{}.jpg", hash.to_hex()));

    // Identical crops share one file
    if !path.exists() {
        std::fs::write(&path, &jpeg)?;
    }

    Ok(path.to_string_lossy().to_string())
}
