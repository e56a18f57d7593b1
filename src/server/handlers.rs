//! Lookup API endpoints
//!
//! ## Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/health` | GET | Liveness probe |
//! | `/chains` | GET | Declared chained pairs and their lookup URLs |
//! | `/lookup/{descriptor}[/:parent]` | GET | Strict lookup |
//! | `/lookup-all/{descriptor}[/:parent]?selected=2,5` | GET | Inclusive lookup |
//!
//! `{descriptor}` is
//! `:target_namespace/:target_type/:target_field/:source_namespace/:source_type/:source_field`.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::LookupError;
use crate::registry::ChainInfo;
use crate::resolver::{LookupDescriptor, LookupMode};
use crate::server::state::AppState;
use crate::types::{EntityTypeRef, OptionEntry};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Path segments of a lookup route
#[derive(Debug, Deserialize)]
pub struct DescriptorPath {
    pub target_namespace: String,
    pub target_type: String,
    pub target_field: String,
    pub source_namespace: String,
    pub source_type: String,
    pub source_field: String,
    /// Selected parent id; absent when nothing is selected yet
    #[serde(default)]
    pub parent: Option<String>,
}

impl DescriptorPath {
    pub fn descriptor(&self) -> LookupDescriptor {
        LookupDescriptor::new(
            EntityTypeRef::new(&self.target_namespace, &self.target_type),
            &self.target_field,
            EntityTypeRef::new(&self.source_namespace, &self.source_type),
            &self.source_field,
        )
    }
}

/// Query params for the inclusive lookup
#[derive(Debug, Default, Deserialize)]
pub struct SelectedQuery {
    /// Current value(s) of the dependent field, comma-separated
    #[serde(default)]
    pub selected: Option<String>,
}

impl SelectedQuery {
    pub fn values(&self) -> Vec<String> {
        self.selected
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// A declared chain with the routes a UI widget should call
#[derive(Debug, Clone, Serialize)]
pub struct ChainRoute {
    #[serde(flatten)]
    pub chain: ChainInfo,
    /// Strict lookup URL; append `/<parent id>`
    pub lookup_url: String,
    /// Inclusive lookup URL; append `/<parent id>?selected=<ids>`
    pub lookup_all_url: String,
}

impl ChainRoute {
    fn from_chain(chain: ChainInfo) -> Self {
        let descriptor = format!(
            "{}/{}/{}/{}/{}/{}",
            chain.target.namespace,
            chain.target.name,
            chain.target_field,
            chain.source.namespace,
            chain.source.name,
            chain.source_field
        );
        Self {
            lookup_url: format!("/lookup/{descriptor}"),
            lookup_all_url: format!("/lookup-all/{descriptor}"),
            chain,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /chains
pub async fn list_chains(State(state): State<AppState>) -> Json<Vec<ChainRoute>> {
    let routes = state
        .resolver
        .registry()
        .chains()
        .into_iter()
        .map(ChainRoute::from_chain)
        .collect();
    Json(routes)
}

/// GET /lookup/{descriptor}[/:parent]
///
/// Strict lookup: exactly the records linked to the parent, no placeholder.
/// An absent or unparsable parent yields `[]`.
///
/// ## Example
///
/// ```text
/// GET /lookup/test_app/Country/continent/test_app/Location/country/1
/// ```
pub async fn lookup(
    State(state): State<AppState>,
    Path(path): Path<DescriptorPath>,
) -> Result<Json<Vec<OptionEntry>>, LookupError> {
    let options = state
        .resolver
        .lookup_options(&path.descriptor(), path.parent.as_deref(), &LookupMode::Strict)
        .await?;
    Ok(Json(options))
}

/// GET /lookup-all/{descriptor}[/:parent]?selected=...
///
/// Inclusive lookup: the strict result, a placeholder, then any currently
/// selected records the strict result does not already contain.
pub async fn lookup_all(
    State(state): State<AppState>,
    Path(path): Path<DescriptorPath>,
    Query(query): Query<SelectedQuery>,
) -> Result<Json<Vec<OptionEntry>>, LookupError> {
    let mode = LookupMode::All {
        selected: query.values(),
    };
    let options = state
        .resolver
        .lookup_options(&path.descriptor(), path.parent.as_deref(), &mode)
        .await?;
    Ok(Json(options))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selected_values() {
        let query = SelectedQuery {
            selected: Some(" 2, ,5,".to_string()),
        };
        assert_eq!(query.values(), vec!["2".to_string(), "5".to_string()]);
        assert!(SelectedQuery::default().values().is_empty());
    }

    #[test]
    fn test_chain_route_urls() {
        let route = ChainRoute::from_chain(ChainInfo {
            source: EntityTypeRef::new("test_app", "Location"),
            source_field: "country".to_string(),
            parent_field: "continent".to_string(),
            target: EntityTypeRef::new("test_app", "Country"),
            target_field: "continent".to_string(),
            show_all: true,
        });
        assert_eq!(
            route.lookup_url,
            "/lookup/test_app/Country/continent/test_app/Location/country"
        );
        assert_eq!(
            route.lookup_all_url,
            "/lookup-all/test_app/Country/continent/test_app/Location/country"
        );
    }

    #[test]
    fn test_chain_route_keeps_dotted_namespace() {
        let route = ChainRoute::from_chain(ChainInfo {
            source: EntityTypeRef::new("acme.sales", "Order"),
            source_field: "region".to_string(),
            parent_field: "country".to_string(),
            target: EntityTypeRef::new("acme.sales", "Region"),
            target_field: "country".to_string(),
            show_all: false,
        });
        assert_eq!(
            route.lookup_url,
            "/lookup/acme.sales/Region/country/acme.sales/Order/region"
        );

        let json = serde_json::to_value(&route).unwrap();
        assert_eq!(json["source"], "acme.sales.Order");
        assert_eq!(json["target"], "acme.sales.Region");
    }
}
