//! Identity provider port. Authentication, sessions and phone
//! verification live outside the core; all the core needs is a resolved
//! user with its payout capabilities.

use crate::error::{CoreError, CoreResult};
use crate::types::UserId;

#[derive(Debug, Clone)]
pub struct UserProfile {
    pub id: UserId,
    pub has_verified_phone: bool,
    /// Currency of the user's default payout account, if any.
    pub default_payout_currency: Option<String>,
}

pub trait IdentityProvider {
    fn resolve_user(&self, id: &UserId) -> CoreResult<UserProfile>;
}

/// In-memory directory for tests and the demo runner.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    users: std::collections::HashMap<UserId, UserProfile>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, profile: UserProfile) {
        self.users.insert(profile.id.clone(), profile);
    }

    pub fn with_user(
        mut self,
        id: &str,
        verified: bool,
        default_currency: Option<&str>,
    ) -> Self {
        self.insert(UserProfile {
            id: id.to_string(),
            has_verified_phone: verified,
            default_payout_currency: default_currency.map(str::to_string),
        });
        self
    }
}

impl IdentityProvider for StaticDirectory {
    fn resolve_user(&self, id: &UserId) -> CoreResult<UserProfile> {
        self.users
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("user {id}")))
    }
}
