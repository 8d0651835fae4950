use async_trait::async_trait;
use tokio::sync::RwLock;

use super::Store;
use crate::error::Result;
use crate::models::{Account, Order, OrderQuery, OrderStatus, Profile, Settings, Sweet, SweetPatch};

#[derive(Default)]
struct Tables {
    accounts: Vec<Account>,
    profiles: Vec<Profile>,
    sweets: Vec<Sweet>,
    orders: Vec<Order>,
    settings: Vec<Settings>,
}

/// Process-local tables. Used by the test suites and when no `DATABASE_URL` is configured.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_account(&self, account: &Account) -> Result<()> {
        self.tables.write().await.accounts.push(account.clone());
        Ok(())
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let tables = self.tables.read().await;
        Ok(tables.accounts.iter().find(|a| a.email == email).cloned())
    }

    async fn delete_account(&self, id: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.accounts.len();
        tables.accounts.retain(|a| a.id != id);
        Ok(tables.accounts.len() != before)
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<()> {
        self.tables.write().await.profiles.push(profile.clone());
        Ok(())
    }

    async fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        let tables = self.tables.read().await;
        Ok(tables.profiles.iter().find(|p| p.id == id).cloned())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        let mut profiles = self.tables.read().await.profiles.clone();
        profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(profiles)
    }

    async fn update_profile_name(&self, id: &str, full_name: &str) -> Result<Option<Profile>> {
        let mut tables = self.tables.write().await;
        Ok(tables.profiles.iter_mut().find(|p| p.id == id).map(|p| {
            p.full_name = full_name.to_string();
            p.clone()
        }))
    }

    async fn list_sweets(&self) -> Result<Vec<Sweet>> {
        let mut sweets = self.tables.read().await.sweets.clone();
        sweets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(sweets)
    }

    async fn get_sweet(&self, id: &str) -> Result<Option<Sweet>> {
        let tables = self.tables.read().await;
        Ok(tables.sweets.iter().find(|s| s.id == id).cloned())
    }

    async fn insert_sweet(&self, sweet: &Sweet) -> Result<()> {
        self.tables.write().await.sweets.push(sweet.clone());
        Ok(())
    }

    async fn update_sweet(&self, id: &str, patch: &SweetPatch) -> Result<Option<Sweet>> {
        let mut tables = self.tables.write().await;
        Ok(tables.sweets.iter_mut().find(|s| s.id == id).map(|s| {
            patch.apply(s);
            s.clone()
        }))
    }

    async fn set_stock(&self, id: &str, stock: i64) -> Result<Option<Sweet>> {
        let mut tables = self.tables.write().await;
        Ok(tables.sweets.iter_mut().find(|s| s.id == id).map(|s| {
            s.stock = stock;
            s.clone()
        }))
    }

    async fn delete_sweet(&self, id: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.sweets.len();
        tables.sweets.retain(|s| s.id != id);
        if tables.sweets.len() == before {
            return Ok(false);
        }
        for order in tables.orders.iter_mut() {
            if order.sweet_id.as_deref() == Some(id) {
                order.sweet_id = None;
            }
        }
        Ok(true)
    }

    async fn insert_order(&self, order: &Order) -> Result<()> {
        self.tables.write().await.orders.push(order.clone());
        Ok(())
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .iter()
            .filter(|o| query.user_id.as_deref().map_or(true, |u| o.user_id == u))
            .filter(|o| query.status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn update_order_status(&self, id: &str, status: OrderStatus) -> Result<Option<Order>> {
        let mut tables = self.tables.write().await;
        Ok(tables.orders.iter_mut().find(|o| o.id == id).map(|o| {
            o.status = status;
            o.clone()
        }))
    }

    async fn get_settings(&self, user_id: &str) -> Result<Option<Settings>> {
        let tables = self.tables.read().await;
        Ok(tables.settings.iter().find(|s| s.user_id == user_id).cloned())
    }

    async fn upsert_settings(&self, settings: &Settings) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.settings.iter_mut().find(|s| s.user_id == settings.user_id) {
            Some(existing) => *existing = settings.clone(),
            None => tables.settings.push(settings.clone()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use chrono::{Duration, Utc};

    fn sweet(id: &str, name: &str) -> Sweet {
        Sweet {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            category: Category::Chocolates,
            price: 1.0,
            stock: 5,
            image_url: String::new(),
            created_at: Utc::now(),
        }
    }

    fn order(id: &str, user: &str, sweet_id: &str, age_minutes: i64) -> Order {
        Order {
            id: id.into(),
            user_id: user.into(),
            sweet_id: Some(sweet_id.into()),
            sweet_name: "x".into(),
            quantity: 1,
            total_price: 1.0,
            status: OrderStatus::Pending,
            created_at: Utc::now() - Duration::minutes(age_minutes),
        }
    }

    #[tokio::test]
    async fn sweets_are_listed_by_name() {
        let store = MemoryStore::new();
        store.insert_sweet(&sweet("1", "Toffee")).await.unwrap();
        store.insert_sweet(&sweet("2", "Brownie")).await.unwrap();
        let names: Vec<String> = store.list_sweets().await.unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["Brownie", "Toffee"]);
    }

    #[tokio::test]
    async fn orders_filter_by_user_newest_first() {
        let store = MemoryStore::new();
        store.insert_order(&order("old", "alice", "s", 30)).await.unwrap();
        store.insert_order(&order("new", "alice", "s", 1)).await.unwrap();
        store.insert_order(&order("bob", "bob", "s", 5)).await.unwrap();

        let query = OrderQuery { user_id: Some("alice".into()), status: None };
        let ids: Vec<String> = store.list_orders(&query).await.unwrap().into_iter().map(|o| o.id).collect();
        assert_eq!(ids, ["new", "old"]);
    }

    #[tokio::test]
    async fn deleting_a_sweet_detaches_its_orders() {
        let store = MemoryStore::new();
        store.insert_sweet(&sweet("s1", "Fudge")).await.unwrap();
        store.insert_order(&order("o1", "alice", "s1", 0)).await.unwrap();

        assert!(store.delete_sweet("s1").await.unwrap());
        assert!(!store.delete_sweet("s1").await.unwrap());
        let orders = store.list_orders(&OrderQuery::default()).await.unwrap();
        assert_eq!(orders[0].sweet_id, None);
    }

    #[tokio::test]
    async fn upsert_settings_replaces_existing_row() {
        let store = MemoryStore::new();
        let mut settings = Settings::defaults_for("alice");
        store.upsert_settings(&settings).await.unwrap();
        settings.currency = "EUR".into();
        store.upsert_settings(&settings).await.unwrap();
        let loaded = store.get_settings("alice").await.unwrap().unwrap();
        assert_eq!(loaded.currency, "EUR");
    }
}
