// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Brickscan Contributors

//! Stateless query functions over catalog snapshots
//!
//! Everything here is pure: records go in, records (or breakdowns) come
//! out, the catalog is never touched.

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogRecord;

/// Sort orders for record lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Newest first (default)
    #[default]
    DateAdded,
    NameAsc,
    NameDesc,
    QuantityDesc,
    QuantityAsc,
}

/// One slice of a quantity breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantityBreakdown {
    pub label: String,
    pub total_quantity: i64,
    /// Share of the grand total, in percent; 0 when the grand total is 0
    pub percentage: f64,
}

/// Collection-level totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    /// Sum of quantities across all records
    pub total_pieces: i64,
    /// Number of records
    pub unique_parts: usize,
    /// Number of distinct categories
    pub categories: usize,
}

/// Filter records by free text and exact category/color.
///
/// Text matches case-insensitively as a substring of part number, part
/// name, color name, or location (records without a location never match on
/// that field). `None` or `"All"` for category/color means no filter.
pub fn filter(
    records: &[CatalogRecord],
    text: Option<&str>,
    category: Option<&str>,
    color: Option<&str>,
) -> Vec<CatalogRecord> {
    let text = text.map(str::to_lowercase).filter(|t| !t.is_empty());
    let category = category.filter(|c| *c != "All");
    let color = color.filter(|c| *c != "All");

    records
        .iter()
        .filter(|record| {
            if let Some(ref needle) = text {
                let matches = record.part_number.to_lowercase().contains(needle)
                    || record.part_name.to_lowercase().contains(needle)
                    || record.color_name.to_lowercase().contains(needle)
                    || record
                        .location
                        .as_ref()
                        .is_some_and(|l| l.to_lowercase().contains(needle));
                if !matches {
                    return false;
                }
            }
            if let Some(cat) = category {
                if record.category.as_deref() != Some(cat) {
                    return false;
                }
            }
            if let Some(col) = color {
                if record.color_name != col {
                    return false;
                }
            }
            true
        })
        .cloned()
        .collect()
}

/// Sort a snapshot by the given key. Stable: ties keep their input order.
pub fn sort(records: &[CatalogRecord], key: SortKey) -> Vec<CatalogRecord> {
    let mut sorted = records.to_vec();
    match key {
        SortKey::DateAdded => sorted.sort_by(|a, b| b.date_added.cmp(&a.date_added)),
        SortKey::NameAsc => sorted.sort_by(|a, b| a.part_name.cmp(&b.part_name)),
        SortKey::NameDesc => sorted.sort_by(|a, b| b.part_name.cmp(&a.part_name)),
        SortKey::QuantityDesc => sorted.sort_by(|a, b| b.quantity.cmp(&a.quantity)),
        SortKey::QuantityAsc => sorted.sort_by(|a, b| a.quantity.cmp(&b.quantity)),
    }
    sorted
}

/// Quantity totals per category, largest first. Records without a category
/// group under "Uncategorized".
pub fn aggregate_by_category(records: &[CatalogRecord]) -> Vec<QuantityBreakdown> {
    aggregate(records, |record| {
        record
            .category
            .clone()
            .unwrap_or_else(|| "Uncategorized".to_string())
    })
}

/// Quantity totals per color name, largest first
pub fn aggregate_by_color(records: &[CatalogRecord]) -> Vec<QuantityBreakdown> {
    aggregate(records, |record| record.color_name.clone())
}

fn aggregate(
    records: &[CatalogRecord],
    label_of: impl Fn(&CatalogRecord) -> String,
) -> Vec<QuantityBreakdown> {
    let mut totals: std::collections::BTreeMap<String, i64> = std::collections::BTreeMap::new();
    for record in records {
        *totals.entry(label_of(record)).or_insert(0) += record.quantity;
    }

    let grand_total: i64 = totals.values().sum();

    let mut breakdown: Vec<QuantityBreakdown> = totals
        .into_iter()
        .map(|(label, total_quantity)| QuantityBreakdown {
            label,
            total_quantity,
            percentage: if grand_total == 0 {
                0.0
            } else {
                total_quantity as f64 * 100.0 / grand_total as f64
            },
        })
        .collect();

    // Largest share first; equal shares order by label (the BTreeMap walk
    // already yields labels ascending, and the sort is stable)
    breakdown.sort_by(|a, b| b.total_quantity.cmp(&a.total_quantity));
    breakdown
}

/// The `n` most recently added records
pub fn recent(records: &[CatalogRecord], n: usize) -> Vec<CatalogRecord> {
    let mut sorted = sort(records, SortKey::DateAdded);
    sorted.truncate(n);
    sorted
}

/// Collection totals: summed quantity, record count, distinct categories
pub fn collection_stats(records: &[CatalogRecord]) -> CollectionStats {
    let total_pieces = records.iter().map(|r| r.quantity).sum();
    let categories = records
        .iter()
        .filter_map(|r| r.category.as_deref())
        .collect::<std::collections::BTreeSet<_>>()
        .len();

    CollectionStats {
        total_pieces,
        unique_parts: records.len(),
        categories,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn record(
        part_number: &str,
        part_name: &str,
        color_name: &str,
        quantity: i64,
        category: Option<&str>,
        location: Option<&str>,
        age_minutes: i64,
    ) -> CatalogRecord {
        CatalogRecord {
            id: format!("{}-{}", part_number, age_minutes),
            part_number: part_number.to_string(),
            part_name: part_name.to_string(),
            color_name: color_name.to_string(),
            color_id: 0,
            quantity,
            image_path: None,
            category: category.map(String::from),
            location: location.map(String::from),
            confidence: None,
            date_added: Utc::now() - Duration::minutes(age_minutes),
        }
    }

    #[test]
    fn test_filter_text_matches_name_and_color_but_not_unrelated_location() {
        let records = vec![
            record("3001", "Red Brick", "Tan", 1, None, None, 0),
            record("3003", "Brick 2x2", "Red", 1, None, None, 1),
            record("3020", "Plate 2x4", "Blue", 1, None, Some("Shelf B"), 2),
        ];

        let hits = filter(&records, Some("red"), None, None);
        let numbers: Vec<&str> = hits.iter().map(|r| r.part_number.as_str()).collect();
        assert_eq!(numbers, vec!["3001", "3003"]);
    }

    #[test]
    fn test_filter_matches_location_when_present() {
        let records = vec![
            record("3020", "Plate 2x4", "Blue", 1, None, Some("Shelf B"), 0),
            record("3001", "Brick 2x4", "Red", 1, None, None, 1),
        ];

        let hits = filter(&records, Some("shelf"), None, None);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].part_number, "3020");
    }

    #[test]
    fn test_filter_category_and_color_exact_with_all_sentinel() {
        let records = vec![
            record("3001", "Brick 2x4", "Red", 1, Some("Bricks"), None, 0),
            record("3020", "Plate 2x4", "Red", 1, Some("Plates"), None, 1),
            record("3003", "Brick 2x2", "Blue", 1, Some("Bricks"), None, 2),
        ];

        let hits = filter(&records, None, Some("Bricks"), None);
        assert_eq!(hits.len(), 2);

        let hits = filter(&records, None, Some("All"), Some("Red"));
        assert_eq!(hits.len(), 2);

        let hits = filter(&records, None, Some("Bricks"), Some("Red"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].part_number, "3001");
    }

    #[test]
    fn test_sort_keys() {
        let records = vec![
            record("B", "Beta", "Red", 5, None, None, 10),
            record("A", "Alpha", "Red", 2, None, None, 5),
            record("C", "Gamma", "Red", 9, None, None, 0),
        ];

        let by_date: Vec<String> = sort(&records, SortKey::DateAdded)
            .iter()
            .map(|r| r.part_number.clone())
            .collect();
        assert_eq!(by_date, vec!["C", "A", "B"]);

        let names: Vec<String> = sort(&records, SortKey::NameAsc)
            .iter()
            .map(|r| r.part_name.clone())
            .collect();
        assert_eq!(names, vec!["Alpha", "Beta", "Gamma"]);

        let names: Vec<String> = sort(&records, SortKey::NameDesc)
            .iter()
            .map(|r| r.part_name.clone())
            .collect();
        assert_eq!(names, vec!["Gamma", "Beta", "Alpha"]);

        let quantities: Vec<i64> = sort(&records, SortKey::QuantityDesc)
            .iter()
            .map(|r| r.quantity)
            .collect();
        assert_eq!(quantities, vec![9, 5, 2]);

        let quantities: Vec<i64> = sort(&records, SortKey::QuantityAsc)
            .iter()
            .map(|r| r.quantity)
            .collect();
        assert_eq!(quantities, vec![2, 5, 9]);
    }

    #[test]
    fn test_sort_is_stable_on_ties() {
        let records = vec![
            record("first", "Same", "Red", 1, None, None, 0),
            record("second", "Same", "Red", 1, None, None, 0),
            record("third", "Same", "Red", 1, None, None, 0),
        ];

        let sorted = sort(&records, SortKey::NameAsc);
        let ids: Vec<&str> = sorted.iter().map(|r| r.part_number.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);

        let sorted = sort(&records, SortKey::QuantityDesc);
        let ids: Vec<&str> = sorted.iter().map(|r| r.part_number.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_aggregate_by_category_percentages_and_tie_order() {
        let records = vec![
            record("1", "a", "Red", 3, Some("Bricks"), None, 0),
            record("2", "b", "Red", 2, Some("Bricks"), None, 1),
            record("3", "c", "Red", 5, Some("Plates"), None, 2),
        ];

        let breakdown = aggregate_by_category(&records);
        assert_eq!(breakdown.len(), 2);
        // Equal totals: labels order ascending, so Bricks before Plates
        assert_eq!(breakdown[0].label, "Bricks");
        assert_eq!(breakdown[0].total_quantity, 5);
        assert!((breakdown[0].percentage - 50.0).abs() < 1e-9);
        assert_eq!(breakdown[1].label, "Plates");
        assert_eq!(breakdown[1].total_quantity, 5);
        assert!((breakdown[1].percentage - 50.0).abs() < 1e-9);

        let total: f64 = breakdown.iter().map(|b| b.percentage).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_of_empty_set_is_empty() {
        assert!(aggregate_by_category(&[]).is_empty());
        assert!(aggregate_by_color(&[]).is_empty());
    }

    #[test]
    fn test_aggregate_by_color() {
        let records = vec![
            record("1", "a", "Red", 1, None, None, 0),
            record("2", "b", "Blue", 1, None, None, 1),
        ];

        let breakdown = aggregate_by_color(&records);
        assert_eq!(breakdown.len(), 2);
        assert!(breakdown
            .iter()
            .all(|b| (b.percentage - 50.0).abs() < 1e-9));
    }

    #[test]
    fn test_uncategorized_records_group_together() {
        let records = vec![
            record("1", "a", "Red", 2, None, None, 0),
            record("2", "b", "Red", 3, None, None, 1),
        ];

        let breakdown = aggregate_by_category(&records);
        assert_eq!(breakdown.len(), 1);
        assert_eq!(breakdown[0].label, "Uncategorized");
        assert_eq!(breakdown[0].total_quantity, 5);
    }

    #[test]
    fn test_recent_takes_newest_n() {
        let records = vec![
            record("old", "a", "Red", 1, None, None, 30),
            record("new", "b", "Red", 1, None, None, 0),
            record("mid", "c", "Red", 1, None, None, 15),
        ];

        let top = recent(&records, 2);
        let ids: Vec<&str> = top.iter().map(|r| r.part_number.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);
    }

    #[test]
    fn test_collection_stats() {
        let records = vec![
            record("1", "a", "Red", 3, Some("Bricks"), None, 0),
            record("2", "b", "Blue", 2, Some("Bricks"), None, 1),
            record("3", "c", "Red", 5, Some("Plates"), None, 2),
            record("4", "d", "Tan", 1, None, None, 3),
        ];

        let stats = collection_stats(&records);
        assert_eq!(stats.total_pieces, 11);
        assert_eq!(stats.unique_parts, 4);
        assert_eq!(stats.categories, 2);
    }
}
