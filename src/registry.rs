//! Owner registry.
//!
//! Immutable set of authorized principals plus the confirmation threshold.
//! Built once, validated at construction, and shared read-only by the ledger.

use crate::error::{CustodyError, CustodyResult};
use crate::Principal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Validated owner set and threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RegistryParts", into = "RegistryParts")]
pub struct OwnerRegistry {
    owners: Vec<Principal>,
    members: HashSet<Principal>,
    threshold: usize,
}

/// Unvalidated wire form; deserializing goes through [`OwnerRegistry::new`].
#[derive(Serialize, Deserialize)]
struct RegistryParts {
    owners: Vec<Principal>,
    threshold: usize,
}

impl OwnerRegistry {
    /// Validate and build a registry.
    ///
    /// Fails with `InvalidConfiguration` for an empty owner list, a threshold
    /// of zero or above the owner count, or a duplicate owner.
    pub fn new(owners: Vec<Principal>, threshold: usize) -> CustodyResult<Self> {
        if owners.is_empty() {
            return Err(CustodyError::InvalidConfiguration(
                "owner list is empty".to_string(),
            ));
        }

        if threshold == 0 {
            return Err(CustodyError::InvalidConfiguration(
                "threshold must be at least 1".to_string(),
            ));
        }

        if threshold > owners.len() {
            return Err(CustodyError::InvalidConfiguration(format!(
                "threshold {} exceeds owner count {}",
                threshold,
                owners.len()
            )));
        }

        let mut members = HashSet::with_capacity(owners.len());
        for owner in &owners {
            if !members.insert(*owner) {
                return Err(CustodyError::InvalidConfiguration(format!(
                    "duplicate owner {}",
                    owner
                )));
            }
        }

        Ok(Self {
            owners,
            members,
            threshold,
        })
    }

    /// Whether `principal` is an owner.
    pub fn is_owner(&self, principal: &Principal) -> bool {
        self.members.contains(principal)
    }

    /// Number of owners.
    pub fn owner_count(&self) -> usize {
        self.owners.len()
    }

    /// Confirmations required before a proposal may execute.
    pub fn required_confirmations(&self) -> usize {
        self.threshold
    }

    /// Owners in construction order.
    pub fn owners(&self) -> &[Principal] {
        &self.owners
    }

    /// Fail with `Unauthorized` unless `caller` is an owner.
    pub(crate) fn authorize(&self, caller: &Principal) -> CustodyResult<()> {
        if self.is_owner(caller) {
            Ok(())
        } else {
            tracing::debug!(caller = %caller, "rejected non-owner caller");
            Err(CustodyError::Unauthorized(*caller))
        }
    }
}

impl TryFrom<RegistryParts> for OwnerRegistry {
    type Error = CustodyError;

    fn try_from(parts: RegistryParts) -> Result<Self, Self::Error> {
        Self::new(parts.owners, parts.threshold)
    }
}

impl From<OwnerRegistry> for RegistryParts {
    fn from(registry: OwnerRegistry) -> Self {
        Self {
            owners: registry.owners,
            threshold: registry.threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owners(n: u8) -> Vec<Principal> {
        (1..=n).map(Principal::repeat).collect()
    }

    #[test]
    fn test_valid_registry() {
        let registry = OwnerRegistry::new(owners(3), 2).unwrap();
        assert_eq!(registry.owner_count(), 3);
        assert_eq!(registry.required_confirmations(), 2);
        assert_eq!(registry.owners(), owners(3).as_slice());
    }

    #[test]
    fn test_threshold_bounds_inclusive() {
        assert!(OwnerRegistry::new(owners(3), 1).is_ok());
        assert!(OwnerRegistry::new(owners(3), 3).is_ok());
    }

    #[test]
    fn test_rejects_empty_owners() {
        let result = OwnerRegistry::new(vec![], 1);
        assert!(matches!(result, Err(CustodyError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_rejects_zero_threshold() {
        let result = OwnerRegistry::new(owners(3), 0);
        assert!(matches!(result, Err(CustodyError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_rejects_threshold_above_owner_count() {
        let result = OwnerRegistry::new(owners(3), 4);
        assert!(matches!(result, Err(CustodyError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_rejects_duplicate_owner() {
        let mut list = owners(2);
        list.push(Principal::repeat(1));
        let result = OwnerRegistry::new(list, 2);
        assert!(matches!(result, Err(CustodyError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_is_owner() {
        let registry = OwnerRegistry::new(owners(3), 2).unwrap();
        assert!(registry.is_owner(&Principal::repeat(2)));
        assert!(!registry.is_owner(&Principal::repeat(9)));
    }

    #[test]
    fn test_deserialize_revalidates() {
        let json = format!(
            r#"{{"owners":["{}","{}"],"threshold":3}}"#,
            Principal::repeat(1),
            Principal::repeat(2)
        );
        assert!(serde_json::from_str::<OwnerRegistry>(&json).is_err());

        let registry = OwnerRegistry::new(owners(2), 2).unwrap();
        let encoded = serde_json::to_string(&registry).unwrap();
        let decoded: OwnerRegistry = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, registry);
    }
}
