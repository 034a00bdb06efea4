//! Lazy profile provisioning.
//!
//! Every authenticated user gets a `user_profiles` row the first time the
//! storefront sees them. Ids already handled by this process are remembered
//! so later requests skip the lookup.

use std::time::Duration;

use moka::future::Cache;

use quardcube_core::UserId;

use crate::db::{ProfileStore, RepositoryError};
use crate::models::NewProfile;

const CACHE_CAPACITY: u64 = 10_000;
const CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Creates missing profiles, at most once per user per process.
#[derive(Clone)]
pub struct ProfileProvisioner {
    seen: Cache<UserId, ()>,
}

impl Default for ProfileProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileProvisioner {
    #[must_use]
    pub fn new() -> Self {
        Self {
            seen: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    /// Make sure the user has a profile row, seeded from `profile` when it
    /// has to be created.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the lookup or insert fails. The id is not
    /// remembered in that case, so the next request retries.
    pub async fn ensure<S: ProfileStore>(
        &self,
        store: &S,
        profile: NewProfile,
    ) -> Result<(), RepositoryError> {
        let user_id = profile.user_id;

        if self.seen.contains_key(&user_id) {
            return Ok(());
        }

        if store.find_profile(user_id).await?.is_none() {
            store.upsert_profile(&profile).await?;
            tracing::info!(user_id = %user_id, "Created user profile");
        }

        self.seen.insert(user_id, ()).await;
        Ok(())
    }
}
