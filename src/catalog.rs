//! Static event discovery catalog shown on the discover screen.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use utoipa::{IntoParams, ToSchema};

use crate::errors::AppError;

const CATALOG_JSON: &str = include_str!("../data/discover_events.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverEvent {
    pub id: String,
    pub title: String,
    pub description: String,
    /// e.g. `party-bus`, `yacht`, `rooftop`
    pub category: String,
    pub venue: String,
    pub address: String,
    pub city: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`
    pub time: String,
    pub price: PriceRange,
    pub image: String,
    pub rating: f64,
    pub attendees: u32,
    pub max_capacity: u32,
    pub tags: Vec<String>,
    pub featured: bool,
    pub trending: bool,
    pub sold_out: bool,
    pub organizer: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DiscoverQuery {
    /// Only events in this category (case-insensitive).
    pub category: Option<String>,
}

static CATALOG: OnceLock<Result<Vec<DiscoverEvent>, String>> = OnceLock::new();

fn catalog() -> Result<&'static [DiscoverEvent], AppError> {
    CATALOG
        .get_or_init(|| serde_json::from_str(CATALOG_JSON).map_err(|e| e.to_string()))
        .as_deref()
        .map_err(|e| AppError::InternalError(format!("Event catalog is malformed: {}", e)))
}

/// Catalog events, optionally narrowed to one category. A blank category
/// means no filter.
pub fn discover(category: Option<&str>) -> Result<Vec<DiscoverEvent>, AppError> {
    let events = catalog()?;
    let category = category.map(str::trim).filter(|c| !c.is_empty());

    Ok(match category {
        Some(category) => events
            .iter()
            .filter(|e| e.category.eq_ignore_ascii_case(category))
            .cloned()
            .collect(),
        None => events.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_parses() {
        let events = discover(None).unwrap();
        assert_eq!(events.len(), 8);
        assert_eq!(events[0].id, "party_bus_001");
        assert_eq!(events[0].max_capacity, 100);
    }

    #[test]
    fn test_category_filter_ignores_case() {
        let yachts = discover(Some("YACHT")).unwrap();
        assert_eq!(yachts.len(), 1);
        assert_eq!(yachts[0].title, "Private Yacht Charter - NYC Skyline");

        assert!(discover(Some("karaoke")).unwrap().is_empty());
        assert_eq!(discover(Some("  ")).unwrap().len(), 8);
    }
}
