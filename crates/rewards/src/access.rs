//! Role-based authorization.
//!
//! Every restricted operation calls [`AccessControl::authorize`] before it
//! touches state, so a rejected call never leaves a partial mutation behind.

use crate::errors::{Result, RewardsError};
use curation_types::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Roles recognised by the rewards engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Sets issuance, the minimum signal floor and the availability oracle
    Governor,
    /// Maintains the subgraph denylist
    AvailabilityOracle,
    /// Staking contract: opens and closes allocations
    Staking,
    /// Curation contract: reports signal changes
    Curation,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Governor => "governor",
            Role::AvailabilityOracle => "availability oracle",
            Role::Staking => "staking",
            Role::Curation => "curation",
        };
        f.write_str(name)
    }
}

/// Addresses holding each role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    pub governor: Address,
    /// Unset until the governor appoints one; denylist updates fail meanwhile.
    pub availability_oracle: Option<Address>,
    pub staking: Address,
    pub curation: Address,
}

impl AccessControl {
    pub fn new(governor: Address, staking: Address, curation: Address) -> Self {
        Self {
            governor,
            availability_oracle: None,
            staking,
            curation,
        }
    }

    pub fn with_availability_oracle(mut self, oracle: Address) -> Self {
        self.availability_oracle = Some(oracle);
        self
    }

    /// Address currently holding `role`, if any.
    pub fn holder(&self, role: Role) -> Option<Address> {
        match role {
            Role::Governor => Some(self.governor),
            Role::AvailabilityOracle => self.availability_oracle,
            Role::Staking => Some(self.staking),
            Role::Curation => Some(self.curation),
        }
    }

    /// Succeeds only when `caller` holds `role`.
    pub fn authorize(&self, caller: &Address, role: Role) -> Result<()> {
        match self.holder(role) {
            Some(holder) if holder == *caller => Ok(()),
            _ => Err(RewardsError::Unauthorized {
                caller: *caller,
                role,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access() -> AccessControl {
        AccessControl::new(
            Address::from_label("governor"),
            Address::from_label("staking"),
            Address::from_label("curation"),
        )
    }

    #[test]
    fn test_authorize_matches_holder() {
        let access = access();
        assert!(access
            .authorize(&Address::from_label("governor"), Role::Governor)
            .is_ok());
        assert!(access
            .authorize(&Address::from_label("staking"), Role::Staking)
            .is_ok());

        let err = access
            .authorize(&Address::from_label("staking"), Role::Governor)
            .unwrap_err();
        assert!(matches!(
            err,
            RewardsError::Unauthorized {
                role: Role::Governor,
                ..
            }
        ));
    }

    #[test]
    fn test_unset_oracle_rejects_everyone() {
        let access = access();
        assert!(access
            .authorize(&Address::ZERO, Role::AvailabilityOracle)
            .is_err());

        let oracle = Address::from_label("oracle");
        let access = access.with_availability_oracle(oracle);
        assert!(access.authorize(&oracle, Role::AvailabilityOracle).is_ok());
    }
}
