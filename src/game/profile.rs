use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::records::now_date_label;
use super::storage::{KeyValueStore, USER_KEY};
use crate::error::{GameError, Result};

pub const MIN_USERNAME_LEN: usize = 3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub username: String,
    pub created_at: String,
}

impl UserProfile {
    pub fn initials(&self) -> String {
        self.username.chars().take(2).collect::<String>().to_uppercase()
    }
}

/// Local player profile. Purely cosmetic; nothing in a game session
/// depends on it.
pub struct ProfileStore {
    store: Rc<dyn KeyValueStore>,
}

impl ProfileStore {
    pub fn new(store: Rc<dyn KeyValueStore>) -> Self {
        ProfileStore { store }
    }

    pub fn current(&self) -> Option<UserProfile> {
        let raw = match self.store.get(USER_KEY) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(error = %err, "Failed to read player profile");
                return None;
            }
        };
        serde_json::from_str(&raw)
            .inspect_err(|err| warn!(error = %err, "Ignoring unreadable player profile"))
            .ok()
    }

    pub fn is_signed_in(&self) -> bool {
        self.current().is_some()
    }

    /// # Errors
    /// `GameError::InvalidUsername` for names shorter than
    /// `MIN_USERNAME_LEN` after trimming, or a storage error.
    pub fn sign_in(&self, username: &str) -> Result<UserProfile> {
        let username = username.trim();
        if username.chars().count() < MIN_USERNAME_LEN {
            return Err(GameError::InvalidUsername {
                min_len: MIN_USERNAME_LEN,
            });
        }

        let profile = UserProfile {
            username: username.to_string(),
            created_at: now_date_label(),
        };
        self.store.set(USER_KEY, &serde_json::to_string(&profile)?)?;
        info!(username = %profile.username, "Player signed in");
        Ok(profile)
    }

    /// # Errors
    /// Returns an error if the backend fails to delete the profile.
    pub fn sign_out(&self) -> Result<()> {
        self.store.remove(USER_KEY)?;
        info!("Player signed out");
        Ok(())
    }
}
