//! Users, plans and usage limits
//!
//! Identity and billing providers are opaque: an [`IdentityProvider`] turns
//! a request credential into a [`UserId`], and billing arrives as
//! [`BillingEvent`]s that upgrade the user's [`Plan`].

use crate::error::{CoreError, StoreError};
use crate::store::{ProjectStore, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Subscription plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Plan {
    #[default]
    Free,
    Pro,
    Agency,
}

impl Plan {
    /// Paid plans have no monthly project limit
    #[inline]
    #[must_use]
    pub const fn is_unlimited(self) -> bool {
        matches!(self, Self::Pro | Self::Agency)
    }
}

/// Account record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub plan: Plan,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
}

impl User {
    #[must_use]
    pub const fn free(id: UserId) -> Self {
        Self {
            id,
            plan: Plan::Free,
            customer_id: None,
            subscription_id: None,
        }
    }
}

/// Event delivered by the billing provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BillingEvent {
    #[serde(rename = "checkout.session.completed", rename_all = "camelCase")]
    CheckoutCompleted {
        user_id: String,
        customer_id: Option<String>,
        subscription_id: Option<String>,
    },
    /// Anything the application does not act on
    #[serde(other)]
    Ignored,
}

/// Account persistence
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Unknown users are on the free plan
    ///
    /// # Errors
    /// Backend failures
    async fn get(&self, id: &UserId) -> Result<User, StoreError>;

    /// # Errors
    /// Backend failures
    async fn upsert(&self, user: User) -> Result<User, StoreError>;

    /// Apply a billing event, returning the updated user if any
    ///
    /// # Errors
    /// [`StoreError::Invalid`] if the event names no user
    async fn apply_billing(&self, event: BillingEvent) -> Result<Option<User>, StoreError> {
        match event {
            BillingEvent::CheckoutCompleted {
                user_id,
                customer_id,
                subscription_id,
            } => {
                let id = UserId::new(user_id).map_err(|_| StoreError::Invalid {
                    field: "userId",
                    message: "missing in session metadata".to_owned(),
                })?;
                let mut user = self.get(&id).await?;
                user.plan = Plan::Pro;
                user.customer_id = customer_id.or(user.customer_id);
                user.subscription_id = subscription_id.or(user.subscription_id);
                tracing::info!(user = %user.id, "Upgraded to Pro after checkout");
                self.upsert(user).await.map(Some)
            }
            BillingEvent::Ignored => Ok(None),
        }
    }
}

/// In-memory [`UserDirectory`]
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: DashMap<UserId, User>,
}

impl InMemoryUserDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get(&self, id: &UserId) -> Result<User, StoreError> {
        Ok(self
            .users
            .get(id)
            .map_or_else(|| User::free(id.clone()), |u| u.clone()))
    }

    async fn upsert(&self, user: User) -> Result<User, StoreError> {
        self.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }
}

/// Resolves a request credential to a user
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` when the request carries no credential
    ///
    /// # Errors
    /// [`StoreError::Unauthenticated`] for a credential that does not resolve
    async fn resolve(&self, credential: Option<&str>) -> Result<Option<UserId>, StoreError>;
}

/// Trusts the credential as the user id. Meant to sit behind a gateway
/// that has already authenticated the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderIdentity;

#[async_trait]
impl IdentityProvider for HeaderIdentity {
    async fn resolve(&self, credential: Option<&str>) -> Result<Option<UserId>, StoreError> {
        match credential.map(str::trim) {
            None | Some("") => Ok(None),
            Some(id) => UserId::new(id).map(Some).map_err(|_| StoreError::Unauthenticated),
        }
    }
}

/// Current usage against the plan limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub plan: Plan,
    pub usage: usize,
    pub limit: usize,
}

/// Enforces the free plan's monthly project limit
#[derive(Clone)]
pub struct UsageLimiter {
    users: Arc<dyn UserDirectory>,
    projects: Arc<dyn ProjectStore>,
    free_limit: usize,
}

impl std::fmt::Debug for UsageLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageLimiter").field("free_limit", &self.free_limit).finish_non_exhaustive()
    }
}

impl UsageLimiter {
    #[must_use]
    pub fn new(users: Arc<dyn UserDirectory>, projects: Arc<dyn ProjectStore>, free_limit: usize) -> Self {
        Self {
            users,
            projects,
            free_limit,
        }
    }

    /// Usage for the current calendar month
    ///
    /// # Errors
    /// Store failures
    pub async fn usage(&self, user: &UserId) -> Result<Usage, CoreError> {
        self.usage_at(user, Utc::now()).await
    }

    /// Fail with [`CoreError::LimitReached`] if `user` is a free user who
    /// has used up this month's projects
    ///
    /// # Errors
    /// Limit reached, or store failures
    pub async fn check(&self, user: &UserId) -> Result<Usage, CoreError> {
        let usage = self.usage(user).await?;
        if !usage.plan.is_unlimited() && usage.usage >= usage.limit {
            tracing::warn!(user = %user, usage = usage.usage, limit = usage.limit, "Free plan limit reached");
            return Err(CoreError::LimitReached { limit: usage.limit });
        }
        Ok(usage)
    }

    async fn usage_at(&self, user: &UserId, now: DateTime<Utc>) -> Result<Usage, CoreError> {
        let plan = self.users.get(user).await?.plan;
        let usage = self.projects.count_created_since(user, month_start(now)).await?;
        Ok(Usage {
            plan,
            usage,
            limit: self.free_limit,
        })
    }
}

/// Midnight UTC on the first day of `now`'s month
#[must_use]
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryProjectStore, NewProject};

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn limiter() -> (UsageLimiter, Arc<InMemoryUserDirectory>, Arc<InMemoryProjectStore>) {
        let users = Arc::new(InMemoryUserDirectory::new());
        let projects = Arc::new(InMemoryProjectStore::new());
        (UsageLimiter::new(users.clone(), projects.clone(), 3), users, projects)
    }

    async fn create(projects: &InMemoryProjectStore, owner: &UserId) {
        let project = NewProject {
            name: "p".into(),
            ..NewProject::default()
        };
        projects.create(owner, project).await.unwrap();
    }

    #[tokio::test]
    async fn free_users_stop_at_the_limit() {
        let (limiter, _, projects) = limiter();
        let alice = user("alice");
        for _ in 0..3 {
            limiter.check(&alice).await.unwrap();
            create(&projects, &alice).await;
        }
        let err = limiter.check(&alice).await.unwrap_err();
        assert!(matches!(err, CoreError::LimitReached { limit: 3 }));
    }

    #[tokio::test]
    async fn checkout_upgrades_to_pro() {
        let (limiter, users, projects) = limiter();
        let alice = user("alice");
        for _ in 0..5 {
            create(&projects, &alice).await;
        }
        assert!(limiter.check(&alice).await.is_err());

        let event: BillingEvent = serde_json::from_str(
            r#"{"type": "checkout.session.completed", "userId": "alice", "customerId": "cus_1", "subscriptionId": "sub_1"}"#,
        )
        .unwrap();
        let upgraded = users.apply_billing(event).await.unwrap().unwrap();
        assert_eq!(upgraded.plan, Plan::Pro);
        assert_eq!(upgraded.customer_id.as_deref(), Some("cus_1"));

        let usage = limiter.check(&alice).await.unwrap();
        assert_eq!(usage.usage, 5);
        assert_eq!(usage.plan, Plan::Pro);
    }

    #[tokio::test]
    async fn other_events_are_ignored() {
        let users = InMemoryUserDirectory::new();
        let event: BillingEvent = serde_json::from_str(r#"{"type": "invoice.paid"}"#).unwrap();
        assert_eq!(users.apply_billing(event).await.unwrap(), None);

        let missing = BillingEvent::CheckoutCompleted {
            user_id: String::new(),
            customer_id: None,
            subscription_id: None,
        };
        assert!(users.apply_billing(missing).await.is_err());
    }

    #[tokio::test]
    async fn header_identity() {
        assert_eq!(HeaderIdentity.resolve(None).await.unwrap(), None);
        assert_eq!(HeaderIdentity.resolve(Some("  ")).await.unwrap(), None);
        assert_eq!(HeaderIdentity.resolve(Some("u1")).await.unwrap(), Some(user("u1")));
    }

    #[test]
    fn month_start_is_first_midnight() {
        let now = Utc.with_ymd_and_hms(2025, 3, 17, 15, 4, 5).unwrap();
        assert_eq!(month_start(now), Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
    }
}
