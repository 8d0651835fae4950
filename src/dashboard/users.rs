use std::collections::HashMap;

use serde::Serialize;

use crate::error::Result;
use crate::models::{OrderQuery, Profile, Role};
use crate::store::Store;

#[derive(Debug, Clone, Serialize)]
pub struct UserEntry {
    #[serde(flatten)]
    pub profile: Profile,
    pub order_count: usize,
}

/// Every profile, newest first, with how many orders each has placed.
#[derive(Debug, Clone, Serialize)]
pub struct UserDirectory {
    pub entries: Vec<UserEntry>,
    pub admins: usize,
    pub users: usize,
}

impl UserDirectory {
    pub async fn fetch(store: &dyn Store) -> Result<Self> {
        let profiles = store.list_profiles().await?;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for order in store.list_orders(&OrderQuery::default()).await? {
            *counts.entry(order.user_id).or_default() += 1;
        }

        let admins = profiles.iter().filter(|p| p.role == Role::Admin).count();
        let users = profiles.len() - admins;
        let entries = profiles
            .into_iter()
            .map(|profile| {
                let order_count = counts.get(&profile.id).copied().unwrap_or(0);
                UserEntry { profile, order_count }
            })
            .collect();

        Ok(UserDirectory { entries, admins, users })
    }
}
