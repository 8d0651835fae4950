//! A recording store for tests: counts calls per table and can fail chosen writes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::{MemoryStore, Store};
use crate::error::{Result, ShopError};
use crate::models::{Account, Order, OrderQuery, OrderStatus, Profile, Settings, Sweet, SweetPatch};

#[derive(Default)]
pub struct RecordingStore {
    pub inner: MemoryStore,
    pub fail_insert_order: AtomicBool,
    pub fail_set_stock: AtomicBool,
    pub fail_insert_profile: AtomicBool,
    pub fail_list_sweets: AtomicBool,
    pub sweet_calls: AtomicUsize,
    pub order_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sweet_calls(&self) -> usize {
        self.sweet_calls.load(Ordering::SeqCst)
    }

    pub fn order_calls(&self) -> usize {
        self.order_calls.load(Ordering::SeqCst)
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub fn reset_counts(&self) {
        self.sweet_calls.store(0, Ordering::SeqCst);
        self.order_calls.store(0, Ordering::SeqCst);
        self.profile_calls.store(0, Ordering::SeqCst);
    }

    fn hit(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for RecordingStore {
    async fn insert_account(&self, account: &Account) -> Result<()> {
        self.inner.insert_account(account).await
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.inner.find_account_by_email(email).await
    }

    async fn delete_account(&self, id: &str) -> Result<bool> {
        self.inner.delete_account(id).await
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<()> {
        if self.fail_insert_profile.load(Ordering::SeqCst) {
            return Err(ShopError::Internal("profile insert rejected".into()));
        }
        self.inner.insert_profile(profile).await
    }

    // Identity lookups are not section data, so they are not counted
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        self.inner.get_profile(id).await
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        Self::hit(&self.profile_calls);
        self.inner.list_profiles().await
    }

    async fn update_profile_name(&self, id: &str, full_name: &str) -> Result<Option<Profile>> {
        Self::hit(&self.profile_calls);
        self.inner.update_profile_name(id, full_name).await
    }

    async fn list_sweets(&self) -> Result<Vec<Sweet>> {
        Self::hit(&self.sweet_calls);
        if self.fail_list_sweets.load(Ordering::SeqCst) {
            return Err(ShopError::Internal("sweets fetch rejected".into()));
        }
        self.inner.list_sweets().await
    }

    async fn get_sweet(&self, id: &str) -> Result<Option<Sweet>> {
        Self::hit(&self.sweet_calls);
        self.inner.get_sweet(id).await
    }

    async fn insert_sweet(&self, sweet: &Sweet) -> Result<()> {
        Self::hit(&self.sweet_calls);
        self.inner.insert_sweet(sweet).await
    }

    async fn update_sweet(&self, id: &str, patch: &SweetPatch) -> Result<Option<Sweet>> {
        Self::hit(&self.sweet_calls);
        self.inner.update_sweet(id, patch).await
    }

    async fn set_stock(&self, id: &str, stock: i64) -> Result<Option<Sweet>> {
        Self::hit(&self.sweet_calls);
        if self.fail_set_stock.load(Ordering::SeqCst) {
            return Err(ShopError::Internal("stock update rejected".into()));
        }
        self.inner.set_stock(id, stock).await
    }

    async fn delete_sweet(&self, id: &str) -> Result<bool> {
        Self::hit(&self.sweet_calls);
        self.inner.delete_sweet(id).await
    }

    async fn insert_order(&self, order: &Order) -> Result<()> {
        Self::hit(&self.order_calls);
        if self.fail_insert_order.load(Ordering::SeqCst) {
            return Err(ShopError::Internal("order insert rejected".into()));
        }
        self.inner.insert_order(order).await
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>> {
        Self::hit(&self.order_calls);
        self.inner.list_orders(query).await
    }

    async fn update_order_status(&self, id: &str, status: OrderStatus) -> Result<Option<Order>> {
        Self::hit(&self.order_calls);
        self.inner.update_order_status(id, status).await
    }

    async fn get_settings(&self, user_id: &str) -> Result<Option<Settings>> {
        self.inner.get_settings(user_id).await
    }

    async fn upsert_settings(&self, settings: &Settings) -> Result<()> {
        self.inner.upsert_settings(settings).await
    }
}
