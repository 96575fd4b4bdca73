//! User lookups.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use common::UserId;
use reqwest::{Client, Url};
use resilience::BreakerRegistry;
use serde::{Deserialize, Serialize};

use super::http::{get_json, parse_base_url, resource_url};
use super::{LookupResult, TransportError};

/// Breaker name guarding the users service.
pub const USERS_SERVICE: &str = "users-service";

/// A user as reported by the users service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl User {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            email: None,
            name: None,
        }
    }
}

/// Transport to the users service.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Fetches a user. `Ok(None)` means the user does not exist.
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, TransportError>;
}

/// Breaker-guarded users client.
#[derive(Clone)]
pub struct UsersClient {
    directory: Arc<dyn UserDirectory>,
    breakers: Arc<BreakerRegistry>,
}

impl UsersClient {
    pub fn new(directory: Arc<dyn UserDirectory>, breakers: Arc<BreakerRegistry>) -> Self {
        Self {
            directory,
            breakers,
        }
    }

    /// Looks up a user through the `users-service` breaker.
    pub async fn find_user(&self, id: &UserId) -> LookupResult<User> {
        let directory = self.directory.clone();
        let id = id.clone();

        let result = self
            .breakers
            .invoke(USERS_SERVICE, move || async move {
                directory.find_user(&id).await
            })
            .await;

        LookupResult::from_call(result)
    }
}

/// Users service over HTTP: `GET {base}/users/{id}`.
#[derive(Debug, Clone)]
pub struct HttpUserDirectory {
    client: Client,
    base_url: Url,
}

impl HttpUserDirectory {
    pub fn new(client: Client, base_url: &str) -> Result<Self, TransportError> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
        })
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, TransportError> {
        let url = resource_url(&self.base_url, "users", id.as_str())?;
        get_json(&self.client, url).await
    }
}

#[derive(Debug, Default)]
struct InMemoryUserState {
    users: HashMap<UserId, User>,
    fail: bool,
    latency: Option<Duration>,
    calls: usize,
}

/// In-memory users service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    state: Arc<Mutex<InMemoryUserState>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, InMemoryUserState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a user.
    pub fn insert(&self, user: User) {
        self.lock().users.insert(user.id.clone(), user);
    }

    /// Makes every lookup fail with a transport error.
    pub fn set_fail(&self, fail: bool) {
        self.lock().fail = fail;
    }

    /// Delays every lookup.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().latency = latency;
    }

    /// Returns how many lookups reached this service.
    pub fn call_count(&self) -> usize {
        self.lock().calls
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, TransportError> {
        let latency = {
            let mut state = self.lock();
            state.calls += 1;
            state.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let state = self.lock();
        if state.fail {
            return Err(TransportError::Unreachable);
        }
        Ok(state.users.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::DependencyFailure;

    fn client(directory: &InMemoryUserDirectory) -> UsersClient {
        UsersClient::new(
            Arc::new(directory.clone()),
            Arc::new(BreakerRegistry::default()),
        )
    }

    #[tokio::test]
    async fn test_found_and_not_found() {
        let directory = InMemoryUserDirectory::new();
        directory.insert(User::new("u1"));
        let users = client(&directory);

        assert_eq!(
            users.find_user(&UserId::new("u1")).await,
            LookupResult::Found(User::new("u1"))
        );
        assert_eq!(
            users.find_user(&UserId::new("nobody")).await,
            LookupResult::NotFound
        );
    }

    #[tokio::test]
    async fn test_not_found_does_not_trip_the_breaker() {
        let directory = InMemoryUserDirectory::new();
        let users = client(&directory);

        for _ in 0..5 {
            assert_eq!(
                users.find_user(&UserId::new("ghost")).await,
                LookupResult::NotFound
            );
        }
        assert_eq!(directory.call_count(), 5);
    }

    #[tokio::test]
    async fn test_transport_failure_then_fast_fail() {
        let directory = InMemoryUserDirectory::new();
        directory.set_fail(true);
        let users = client(&directory);

        assert_eq!(
            users.find_user(&UserId::new("u1")).await,
            LookupResult::Unavailable(DependencyFailure::Transport(TransportError::Unreachable))
        );
        assert_eq!(
            users.find_user(&UserId::new("u1")).await,
            LookupResult::Unavailable(DependencyFailure::CircuitOpen)
        );
        assert_eq!(directory.call_count(), 1);
    }
}
