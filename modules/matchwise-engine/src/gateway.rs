//! Typed, validated access to the external entity store.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use matchwise_common::{Category, MatchError, Profile, ValidationError};

use crate::cancel::store_call;
use crate::traits::EntityStore;

/// Read-only profile access. Profiles are validated here once, so nothing
/// downstream re-checks shape.
#[derive(Clone)]
pub struct EntityGateway {
    store: Arc<dyn EntityStore>,
}

impl EntityGateway {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub async fn find(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Option<Profile>, MatchError> {
        match store_call(cancel, self.store.find_by_id(id)).await? {
            Some(profile) => {
                profile.validate()?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    /// Like `find`, but an absent profile is a validation error.
    pub async fn require(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Profile, MatchError> {
        self.find(id, cancel)
            .await?
            .ok_or(MatchError::Validation(ValidationError::UnknownProfile(id)))
    }

    /// Profiles for several ids. Unknown or invalid ids are left out.
    pub async fn find_many(
        &self,
        ids: impl IntoIterator<Item = Uuid>,
        cancel: &CancellationToken,
    ) -> Result<HashMap<Uuid, Profile>, MatchError> {
        let mut found = HashMap::new();
        for id in ids {
            if found.contains_key(&id) {
                continue;
            }
            match self.find(id, cancel).await {
                Ok(Some(profile)) => {
                    found.insert(id, profile);
                }
                Ok(None) => {}
                Err(MatchError::Validation(e)) => {
                    warn!(profile_id = %id, error = %e, "Skipping invalid profile");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(found)
    }

    /// Valid profiles in a category, ordered by id. Invalid records are skipped.
    pub async fn by_category(
        &self,
        category: Category,
        cancel: &CancellationToken,
    ) -> Result<Vec<Profile>, MatchError> {
        let profiles = store_call(cancel, self.store.find_by_category(category)).await?;
        let mut valid = keep_valid(profiles);
        valid.sort_by_key(|p| p.id);
        Ok(valid)
    }

    pub async fn providers(&self, cancel: &CancellationToken) -> Result<Vec<Profile>, MatchError> {
        self.by_category(Category::Provider, cancel).await
    }

    /// Regular and privileged seekers together, ordered by id.
    pub async fn seekers(&self, cancel: &CancellationToken) -> Result<Vec<Profile>, MatchError> {
        let mut seekers = self.by_category(Category::Seeker, cancel).await?;
        seekers.extend(self.by_category(Category::PrivilegedSeeker, cancel).await?);
        seekers.sort_by_key(|p| p.id);
        Ok(seekers)
    }

    /// Everyone else in the profile's organization.
    pub async fn colleagues(
        &self,
        profile: &Profile,
        cancel: &CancellationToken,
    ) -> Result<Vec<Profile>, MatchError> {
        let Some(organization) = profile.organization() else {
            return Ok(Vec::new());
        };
        let members = store_call(cancel, self.store.find_by_organization(organization)).await?;
        let mut colleagues: Vec<Profile> = keep_valid(members)
            .into_iter()
            .filter(|p| p.id != profile.id)
            .collect();
        colleagues.sort_by_key(|p| p.id);
        Ok(colleagues)
    }
}

fn keep_valid(profiles: Vec<Profile>) -> Vec<Profile> {
    profiles
        .into_iter()
        .filter(|p| match p.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!(profile_id = %p.id, error = %e, "Skipping invalid profile");
                false
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;

    #[tokio::test]
    async fn invalid_profiles_are_filtered_from_listings() {
        let store = Arc::new(InMemoryStore::new());
        let good = Profile::new(Uuid::new_v4(), "Good", Category::Seeker);
        let mut bad = Profile::new(Uuid::new_v4(), "Bad", Category::Seeker);
        bad.contact.email = Some("nope".into());
        store.add_profile(good.clone());
        store.add_profile(bad.clone());

        let gateway = EntityGateway::new(store);
        let cancel = CancellationToken::new();
        let seekers = gateway.seekers(&cancel).await.unwrap();
        assert_eq!(seekers, vec![good]);

        let err = gateway.find(bad.id, &cancel).await.unwrap_err();
        assert!(matches!(err, MatchError::Validation(ValidationError::InvalidEmail(_))));
    }

    #[tokio::test]
    async fn colleagues_exclude_self() {
        let store = Arc::new(InMemoryStore::new());
        let mut owner = Profile::new(Uuid::new_v4(), "Owner", Category::Provider);
        owner.organization = Some("Acme".into());
        let mut teammate = Profile::new(Uuid::new_v4(), "Teammate", Category::Provider);
        teammate.organization = Some("ACME".into());
        store.add_profile(owner.clone());
        store.add_profile(teammate.clone());

        let gateway = EntityGateway::new(store);
        let team = gateway
            .colleagues(&owner, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(team.len(), 1);
        assert_eq!(team[0].id, teammate.id);
    }

    #[tokio::test]
    async fn require_reports_unknown_profile() {
        let gateway = EntityGateway::new(Arc::new(InMemoryStore::new()));
        let id = Uuid::new_v4();
        let err = gateway.require(id, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            err,
            MatchError::Validation(ValidationError::UnknownProfile(missing)) if missing == id
        ));
    }
}
