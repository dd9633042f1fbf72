use std::sync::Arc;

use thiserror::Error;

use crate::limits::*;
use crate::model::TenantId;
use crate::store::InMemoryStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TenantError {
    #[error("empty tenant name")]
    Empty,
    #[error("tenant name too long")]
    TooLong,
    #[error("tenant name may only contain letters, digits, '_' and '-': {0:?}")]
    InvalidName(String),
    #[error("too many tenants")]
    TooMany,
}

/// Maps pgwire database names to tenants. Tenant = database name from the
/// connection; the name is taken as-is or rejected, never rewritten.
pub struct TenantRegistry {
    store: Arc<InMemoryStore>,
}

impl TenantRegistry {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }

    /// Validate `name` and register the tenant on first use.
    pub fn resolve(&self, name: &str) -> Result<TenantId, TenantError> {
        let tenant = TenantId::new(name);
        if self.store.contains_tenant(&tenant) {
            return Ok(tenant);
        }
        if name.is_empty() {
            return Err(TenantError::Empty);
        }
        if name.len() > MAX_TENANT_NAME_LEN {
            return Err(TenantError::TooLong);
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(TenantError::InvalidName(name.to_string()));
        }
        if self.store.tenant_count() >= MAX_TENANTS {
            return Err(TenantError::TooMany);
        }

        if self.store.register_tenant(&tenant) {
            tracing::info!(tenant = %tenant, "tenant registered");
        }
        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(self.store.tenant_count() as f64);
        Ok(tenant)
    }

    pub fn count(&self) -> usize {
        self.store.tenant_count()
    }
}
