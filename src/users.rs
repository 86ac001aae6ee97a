use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ApiError;
use crate::models::User;

/// In-memory user records. Ids start at 1; names are unique.
#[derive(Debug)]
pub struct UserStore {
    users: DashMap<u64, User>,
    names: DashMap<String, u64>,
    next_id: AtomicU64,
}

impl Default for UserStore {
    fn default() -> Self {
        Self {
            users: DashMap::new(),
            names: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, name: &str, email: &str) -> Result<User, ApiError> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() {
            return Err(ApiError::Validation("name must not be empty".to_string()));
        }
        if !email.contains('@') {
            return Err(ApiError::Validation("email is not valid".to_string()));
        }

        // the name entry stays locked until the user is stored
        match self.names.entry(name.to_string()) {
            Entry::Occupied(_) => Err(ApiError::Conflict(format!("user `{name}` already exists"))),
            Entry::Vacant(slot) => {
                let user = User {
                    id: self.next_id.fetch_add(1, Ordering::Relaxed),
                    name: name.to_string(),
                    email: email.to_string(),
                    created_at: Utc::now(),
                };
                self.users.insert(user.id, user.clone());
                slot.insert(user.id);
                Ok(user)
            }
        }
    }

    pub fn get(&self, id: u64) -> Option<User> {
        self.users.get(&id).map(|u| u.value().clone())
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
