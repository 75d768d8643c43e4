//! Payment details lookup and an in-memory user directory.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use domain::PaymentDetails;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A user together with the card the saga charges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub first_name: String,
    pub last_name: String,
    pub user_id: String,
    pub payment_details: PaymentDetails,
}

impl User {
    /// The record every user resolves to unless configured otherwise.
    pub fn default_for(user_id: impl Into<String>) -> Self {
        Self {
            first_name: "Jhon".to_string(),
            last_name: "Doe".to_string(),
            user_id: user_id.into(),
            payment_details: PaymentDetails {
                name: "JHON DOE".to_string(),
                card_number: "123Card".to_string(),
                valid_until_month: 12,
                valid_until_year: 2030,
                cvv: "123".to_string(),
            },
        }
    }
}

/// The lookup itself failed, as opposed to finding nothing.
#[derive(Debug, Error)]
pub enum UserLookupError {
    #[error("User directory unavailable: {0}")]
    Unavailable(String),
}

/// Resolves the payment details of a user.
#[async_trait]
pub trait PaymentDetailsLookup: Send + Sync {
    /// Returns `Ok(None)` when the user is unknown.
    async fn fetch_payment_details(&self, user_id: &str) -> Result<Option<User>, UserLookupError>;
}

#[derive(Debug, Default)]
struct DirectoryState {
    users: HashMap<String, User>,
    not_found: bool,
    unavailable: bool,
}

/// In-memory user directory.
///
/// Users registered with [`insert`](Self::insert) are returned as stored;
/// any other user id resolves to [`User::default_for`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    state: Arc<RwLock<DirectoryState>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: User) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .users
            .insert(user.user_id.clone(), user);
    }

    /// Makes every lookup come back empty.
    pub fn set_not_found(&self, not_found: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .not_found = not_found;
    }

    /// Makes every lookup fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .unavailable = unavailable;
    }
}

#[async_trait]
impl PaymentDetailsLookup for InMemoryUserDirectory {
    async fn fetch_payment_details(&self, user_id: &str) -> Result<Option<User>, UserLookupError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);

        if state.unavailable {
            return Err(UserLookupError::Unavailable(format!(
                "lookup of user {user_id} failed"
            )));
        }
        if state.not_found {
            return Ok(None);
        }

        Ok(Some(
            state
                .users
                .get(user_id)
                .cloned()
                .unwrap_or_else(|| User::default_for(user_id)),
        ))
    }
}
