//! Request-level lookup errors
//!
//! All variants except `Store` are wiring defects (a chained field declared
//! against a nonexistent type or field); they are reported to the caller
//! immediately and never retried. A missing or unparsable parent id is not
//! an error.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;
use crate::types::EntityTypeRef;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Unknown entity type {0}")]
    UnknownType(EntityTypeRef),

    #[error("Unknown relation field '{field}' on {entity}")]
    UnknownField { entity: EntityTypeRef, field: String },

    #[error("Field '{field}' on {entity} is neither a single- nor multi-valued relation")]
    InvalidFieldArity { entity: EntityTypeRef, field: String },

    #[error("{source_type}.{source_field} does not declare a chained selection of {target}")]
    ChainNotDeclared {
        source_type: EntityTypeRef,
        source_field: String,
        target: EntityTypeRef,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl LookupError {
    pub fn status(&self) -> StatusCode {
        match self {
            LookupError::UnknownType(_) | LookupError::UnknownField { .. } => {
                StatusCode::NOT_FOUND
            }
            LookupError::InvalidFieldArity { .. } => StatusCode::BAD_REQUEST,
            LookupError::ChainNotDeclared { .. } => StatusCode::FORBIDDEN,
            LookupError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for LookupError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            LookupError::Store(error) => tracing::error!(error = %error, "Lookup store failure"),
            other => tracing::warn!(error = %other, "Rejected lookup"),
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let country = EntityTypeRef::new("test_app", "Country");
        assert_eq!(
            LookupError::UnknownType(country.clone()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            LookupError::UnknownField {
                entity: country.clone(),
                field: "x".into()
            }
            .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            LookupError::InvalidFieldArity {
                entity: country.clone(),
                field: "tagged".into()
            }
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            LookupError::Store(StoreError::Query("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages() {
        let err = LookupError::ChainNotDeclared {
            source_type: EntityTypeRef::new("test_app", "Location"),
            source_field: "city".into(),
            target: EntityTypeRef::new("test_app", "Country"),
        };
        assert_eq!(
            err.to_string(),
            "test_app.Location.city does not declare a chained selection of test_app.Country"
        );
    }
}
