use std::sync::Arc;

use async_trait::async_trait;

use super::Store;
use crate::error::Result;
use crate::models::{Account, Order, OrderQuery, OrderStatus, Profile, Settings, Sweet, SweetPatch};
use crate::realtime::{ChangeHub, ChangeKind, Table};

/// Wraps a store and publishes a change event after each successful write.
pub struct Notifying {
    inner: Arc<dyn Store>,
    hub: ChangeHub,
}

impl Notifying {
    pub fn new(inner: Arc<dyn Store>, hub: ChangeHub) -> Self {
        Notifying { inner, hub }
    }
}

#[async_trait]
impl Store for Notifying {
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
        self.inner.insert_profile(profile).await?;
        self.hub.publish(Table::Profiles, ChangeKind::Insert, &profile.id);
        Ok(())
    }

    async fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        self.inner.get_profile(id).await
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.inner.list_profiles().await
    }

    async fn update_profile_name(&self, id: &str, full_name: &str) -> Result<Option<Profile>> {
        let updated = self.inner.update_profile_name(id, full_name).await?;
        if updated.is_some() {
            self.hub.publish(Table::Profiles, ChangeKind::Update, id);
        }
        Ok(updated)
    }

    async fn list_sweets(&self) -> Result<Vec<Sweet>> {
        self.inner.list_sweets().await
    }

    async fn get_sweet(&self, id: &str) -> Result<Option<Sweet>> {
        self.inner.get_sweet(id).await
    }

    async fn insert_sweet(&self, sweet: &Sweet) -> Result<()> {
        self.inner.insert_sweet(sweet).await?;
        self.hub.publish(Table::Sweets, ChangeKind::Insert, &sweet.id);
        Ok(())
    }

    async fn update_sweet(&self, id: &str, patch: &SweetPatch) -> Result<Option<Sweet>> {
        let updated = self.inner.update_sweet(id, patch).await?;
        if updated.is_some() {
            self.hub.publish(Table::Sweets, ChangeKind::Update, id);
        }
        Ok(updated)
    }

    async fn set_stock(&self, id: &str, stock: i64) -> Result<Option<Sweet>> {
        let updated = self.inner.set_stock(id, stock).await?;
        if updated.is_some() {
            self.hub.publish(Table::Sweets, ChangeKind::Update, id);
        }
        Ok(updated)
    }

    async fn delete_sweet(&self, id: &str) -> Result<bool> {
        let deleted = self.inner.delete_sweet(id).await?;
        if deleted {
            self.hub.publish(Table::Sweets, ChangeKind::Delete, id);
        }
        Ok(deleted)
    }

    async fn insert_order(&self, order: &Order) -> Result<()> {
        self.inner.insert_order(order).await?;
        self.hub.publish(Table::Orders, ChangeKind::Insert, &order.id);
        Ok(())
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>> {
        self.inner.list_orders(query).await
    }

    async fn update_order_status(&self, id: &str, status: OrderStatus) -> Result<Option<Order>> {
        let updated = self.inner.update_order_status(id, status).await?;
        if updated.is_some() {
            self.hub.publish(Table::Orders, ChangeKind::Update, id);
        }
        Ok(updated)
    }

    async fn get_settings(&self, user_id: &str) -> Result<Option<Settings>> {
        self.inner.get_settings(user_id).await
    }

    async fn upsert_settings(&self, settings: &Settings) -> Result<()> {
        self.inner.upsert_settings(settings).await?;
        self.hub.publish(Table::Settings, ChangeKind::Update, &settings.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn stock_writes_are_published() {
        let hub = ChangeHub::new();
        let store = Notifying::new(Arc::new(MemoryStore::new()), hub.clone());
        let mut sub = hub.subscribe(Some(Table::Sweets));

        // Missing rows produce no event
        assert!(store.set_stock("nope", 3).await.unwrap().is_none());
        assert!(sub.try_recv().is_none());

        store.upsert_settings(&Settings::defaults_for("u1")).await.unwrap();
        assert!(sub.try_recv().is_none());
    }
}
