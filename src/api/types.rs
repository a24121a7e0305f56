//! Shared types for the API layer.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::models::enums::EntityType;
use crate::models::Certificate;

/// Shared context for all API routes.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }

    /// Certificates of every listed entity, entity order then upload order.
    pub fn certificates_for(&self, entities: &[EntityRef]) -> Result<Vec<Certificate>, ApiError> {
        let store = self.core.manager().store();
        let mut certificates = Vec::new();
        for entity in entities {
            certificates.extend(store.get_for_entity(entity.entity_type, &entity.entity_id)?);
        }
        Ok(certificates)
    }
}

/// An organization, vehicle or horse whose certificates take part in a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub entity_type: EntityType,
    pub entity_id: String,
}

/// Parses an entity type path segment.
pub fn parse_entity_type(raw: &str) -> Result<EntityType, ApiError> {
    EntityType::from_str(raw).map_err(|_| ApiError::BadRequest(format!("Unknown entity type: {raw}")))
}
