//! User profile repository.

use sqlx::PgPool;

use quardcube_core::{Email, UserId};

use super::{ProfileStore, RepositoryError};
use crate::models::{NewProfile, ProfileUpdate, UserProfile};

const PROFILE_COLUMNS: &str = "user_id, email, name, avatar_url, phone, street, city, state, \
                               country, postal_code, created_at, updated_at";

/// Repository for `user_profiles`.
pub struct ProfileRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProfileRepository<'a> {
    /// Create a new profile repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

impl ProfileStore for ProfileRepository<'_> {
    async fn find_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, RepositoryError> {
        let profile = sqlx::query_as::<_, UserProfile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(profile)
    }

    async fn upsert_profile(&self, profile: &NewProfile) -> Result<UserProfile, RepositoryError> {
        let row = sqlx::query_as::<_, UserProfile>(&format!(
            r"
            INSERT INTO user_profiles (user_id, email, name, avatar_url, country)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE SET
                email = EXCLUDED.email,
                name = COALESCE(EXCLUDED.name, user_profiles.name),
                avatar_url = COALESCE(EXCLUDED.avatar_url, user_profiles.avatar_url),
                country = COALESCE(EXCLUDED.country, user_profiles.country),
                updated_at = NOW()
            RETURNING {PROFILE_COLUMNS}
            "
        ))
        .bind(profile.user_id)
        .bind(&profile.email)
        .bind(profile.name.as_deref())
        .bind(profile.avatar_url.as_deref())
        .bind(profile.country.as_deref())
        .fetch_one(self.pool)
        .await?;

        Ok(row)
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        email: &Email,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, RepositoryError> {
        let row = sqlx::query_as::<_, UserProfile>(&format!(
            r"
            INSERT INTO user_profiles
                (user_id, email, name, avatar_url, country, street, city, state, postal_code, phone)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (user_id) DO UPDATE SET
                name = COALESCE(EXCLUDED.name, user_profiles.name),
                avatar_url = COALESCE(EXCLUDED.avatar_url, user_profiles.avatar_url),
                country = COALESCE(EXCLUDED.country, user_profiles.country),
                street = COALESCE(EXCLUDED.street, user_profiles.street),
                city = COALESCE(EXCLUDED.city, user_profiles.city),
                state = COALESCE(EXCLUDED.state, user_profiles.state),
                postal_code = COALESCE(EXCLUDED.postal_code, user_profiles.postal_code),
                phone = COALESCE(EXCLUDED.phone, user_profiles.phone),
                updated_at = NOW()
            RETURNING {PROFILE_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(email)
        .bind(update.name.as_deref())
        .bind(update.avatar_url.as_deref())
        .bind(update.country.as_deref())
        .bind(update.street.as_deref())
        .bind(update.city.as_deref())
        .bind(update.state.as_deref())
        .bind(update.postal_code.as_deref())
        .bind(update.phone.as_deref())
        .fetch_one(self.pool)
        .await?;

        Ok(row)
    }
}
