//! Table access for profiles, sweets, orders and settings.
//!
//! Everything above this layer talks to `dyn Store`, so the HTTP routes and the
//! dashboard view-models run the same against MongoDB or the in-memory tables.

mod memory;
mod mongo;
mod notifying;
#[cfg(test)]
pub(crate) mod testing;

pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use notifying::Notifying;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Account, Order, OrderQuery, OrderStatus, Profile, Settings, Sweet, SweetPatch};

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_account(&self, account: &Account) -> Result<()>;
    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>>;
    /// Returns false when no account had that id.
    async fn delete_account(&self, id: &str) -> Result<bool>;

    async fn insert_profile(&self, profile: &Profile) -> Result<()>;
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>>;
    /// Newest first.
    async fn list_profiles(&self) -> Result<Vec<Profile>>;
    async fn update_profile_name(&self, id: &str, full_name: &str) -> Result<Option<Profile>>;

    /// Ordered by name.
    async fn list_sweets(&self) -> Result<Vec<Sweet>>;
    async fn get_sweet(&self, id: &str) -> Result<Option<Sweet>>;
    async fn insert_sweet(&self, sweet: &Sweet) -> Result<()>;
    async fn update_sweet(&self, id: &str, patch: &SweetPatch) -> Result<Option<Sweet>>;
    /// Blind write of the stock column; no comparison against the current value.
    async fn set_stock(&self, id: &str, stock: i64) -> Result<Option<Sweet>>;
    /// Deletes the sweet and detaches orders that referenced it.
    async fn delete_sweet(&self, id: &str) -> Result<bool>;

    async fn insert_order(&self, order: &Order) -> Result<()>;
    /// Newest first.
    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>>;
    async fn update_order_status(&self, id: &str, status: OrderStatus) -> Result<Option<Order>>;

    async fn get_settings(&self, user_id: &str) -> Result<Option<Settings>>;
    async fn upsert_settings(&self, settings: &Settings) -> Result<()>;
}
