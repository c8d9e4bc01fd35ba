use crate::store::{CurrentMetricsStore, StoreError};
use std::collections::HashSet;

/// The join between the current and historical tables.
///
/// Every trend/graph query must intersect its organization scope with
/// `active_set()` before touching history. That is the whole contract:
/// organizations dropped from current tracking vanish from aggregate and
/// per-organization outputs even though their historical rows are retained
/// for potential future re-activation. Do not "optimize" this away into an
/// implicit query-time join.
#[derive(Debug, Clone)]
pub struct ActiveOrgFilter {
    current: CurrentMetricsStore,
}

impl ActiveOrgFilter {
    pub fn new(current: CurrentMetricsStore) -> Self {
        Self { current }
    }

    /// Organizations currently present in the current-metrics table.
    pub async fn active_set(&self) -> Result<HashSet<String>, StoreError> {
        self.current.list_active_orgs().await
    }

    pub async fn is_active(&self, org: &str) -> Result<bool, StoreError> {
        Ok(self.active_set().await?.contains(org))
    }
}
