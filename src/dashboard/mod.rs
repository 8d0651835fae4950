//! Dashboard view-models.
//!
//! Each page holds what it displays plus the notices (toasts) raised while
//! loading or mutating it. Remote failures never escape a page as errors once it
//! is loaded: they become notices and the page state is put back the way it was.
//! Admin-only sections are gated before any of their data is fetched.

pub mod catalog;
pub mod inventory;
pub mod orders;
pub mod settings;
pub mod users;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Result, ShopError};
use crate::models::{OrderQuery, OrderStatus, Profile, Role};
use crate::realtime::{ChangeEvent, ChangeHub, Subscription, Table};
use crate::store::Store;

use catalog::CatalogView;
use inventory::InventoryPage;
use orders::OrdersPage;
use settings::SettingsPage;
use users::UserDirectory;

pub const LOW_STOCK_LIMIT: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// A transient user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn success(description: impl Into<String>) -> Self {
        Notice { level: NoticeLevel::Success, title: "Success".into(), description: description.into() }
    }

    pub fn warning(description: impl Into<String>) -> Self {
        Notice { level: NoticeLevel::Warning, title: "Warning".into(), description: description.into() }
    }

    pub fn error(description: impl Into<String>) -> Self {
        Notice { level: NoticeLevel::Error, title: "Error".into(), description: description.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Overview,
    Catalog,
    Orders,
    Inventory,
    Users,
    Settings,
}

impl Section {
    pub const ALL: [Section; 6] = [
        Section::Overview,
        Section::Catalog,
        Section::Orders,
        Section::Inventory,
        Section::Users,
        Section::Settings,
    ];

    pub fn required_role(self) -> Role {
        match self {
            Section::Inventory | Section::Users => Role::Admin,
            _ => Role::User,
        }
    }

    pub fn allows(self, role: Role) -> bool {
        self.required_role() == Role::User || role.is_admin()
    }
}

/// Outcome of opening a role-gated section.
#[derive(Debug)]
pub enum Gated<T> {
    Granted(T),
    Denied,
}

impl<T> Gated<T> {
    pub fn is_denied(&self) -> bool {
        matches!(self, Gated::Denied)
    }

    pub fn into_result(self) -> Result<T> {
        match self {
            Gated::Granted(page) => Ok(page),
            Gated::Denied => Err(ShopError::Forbidden),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewStats {
    pub total_sweets: usize,
    pub low_stock_items: usize,
    pub pending_orders: usize,
    pub todays_sales: f64,
}

impl OverviewStats {
    pub async fn fetch(store: &dyn Store, now: DateTime<Utc>) -> Result<Self> {
        let sweets = store.list_sweets().await?;
        let pending = store
            .list_orders(&OrderQuery { user_id: None, status: Some(OrderStatus::Pending) })
            .await?;
        let today = now.date_naive();
        let todays_sales = store
            .list_orders(&OrderQuery::default())
            .await?
            .iter()
            .filter(|o| o.created_at.date_naive() == today)
            .map(|o| o.total_price)
            .sum();

        Ok(OverviewStats {
            total_sweets: sweets.len(),
            low_stock_items: sweets.iter().filter(|s| is_low_stock(s.stock)).count(),
            pending_orders: pending.len(),
            todays_sales,
        })
    }
}

pub fn is_low_stock(stock: i64) -> bool {
    stock > 0 && stock <= LOW_STOCK_LIMIT
}

/// Overview stats that refetch in full whenever sweets or orders change.
pub struct LiveOverview {
    store: Arc<dyn Store>,
    sweets: Subscription,
    orders: Subscription,
    stats: OverviewStats,
}

impl LiveOverview {
    pub async fn start(store: Arc<dyn Store>, hub: &ChangeHub) -> Result<Self> {
        let sweets = hub.subscribe(Some(Table::Sweets));
        let orders = hub.subscribe(Some(Table::Orders));
        let stats = OverviewStats::fetch(store.as_ref(), Utc::now()).await?;
        Ok(LiveOverview { store, sweets, orders, stats })
    }

    pub fn stats(&self) -> &OverviewStats {
        &self.stats
    }

    /// Waits for the next change and refetches. Returns the triggering event,
    /// or `None` once the hub has shut down.
    pub async fn next_change(&mut self) -> Result<Option<ChangeEvent>> {
        let event = tokio::select! {
            event = self.sweets.recv() => event,
            event = self.orders.recv() => event,
        };
        let Some(event) = event else {
            return Ok(None);
        };
        log::debug!("overview refetch after {} change", event.table);
        self.stats = OverviewStats::fetch(self.store.as_ref(), Utc::now()).await?;
        Ok(Some(event))
    }

    pub fn stop(self) {
        self.sweets.unsubscribe();
        self.orders.unsubscribe();
    }
}

/// Entry point for one signed-in identity.
pub struct Dashboard {
    store: Arc<dyn Store>,
    profile: Profile,
}

impl Dashboard {
    pub fn new(store: Arc<dyn Store>, profile: Profile) -> Self {
        Dashboard { store, profile }
    }

    pub async fn load(store: Arc<dyn Store>, user_id: &str) -> Result<Self> {
        let profile = store
            .get_profile(user_id)
            .await?
            .ok_or_else(|| ShopError::unauthorized("User not found"))?;
        Ok(Dashboard { store, profile })
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn role(&self) -> Role {
        self.profile.role
    }

    /// Sections shown in the navigation for this identity.
    pub fn sections(&self) -> Vec<Section> {
        Section::ALL.into_iter().filter(|s| s.allows(self.role())).collect()
    }

    pub async fn overview(&self) -> Result<OverviewStats> {
        OverviewStats::fetch(self.store.as_ref(), Utc::now()).await
    }

    pub async fn catalog(&self) -> CatalogView {
        CatalogView::load(self.store.clone(), &self.profile.id).await
    }

    pub async fn orders(&self) -> OrdersPage {
        OrdersPage::load(self.store.clone(), self.profile.clone()).await
    }

    pub async fn inventory(&self) -> Gated<InventoryPage> {
        if !Section::Inventory.allows(self.role()) {
            log::info!("inventory denied for {}", self.profile.id);
            return Gated::Denied;
        }
        Gated::Granted(InventoryPage::load(self.store.clone()).await)
    }

    pub async fn users(&self) -> Result<Gated<UserDirectory>> {
        if !Section::Users.allows(self.role()) {
            log::info!("user directory denied for {}", self.profile.id);
            return Ok(Gated::Denied);
        }
        Ok(Gated::Granted(UserDirectory::fetch(self.store.as_ref()).await?))
    }

    pub async fn settings(&self) -> Result<SettingsPage> {
        SettingsPage::load(self.store.clone(), &self.profile.id).await
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Utc;
    use uuid::Uuid;

    use crate::models::{Category, Order, OrderStatus, Profile, Role, Sweet, PLACEHOLDER_IMAGE};

    pub fn profile(name: &str, role: Role) -> Profile {
        Profile {
            id: Uuid::new_v4().to_string(),
            full_name: name.into(),
            email: format!("{}@shop.test", name.to_lowercase()),
            role,
            created_at: Utc::now(),
        }
    }

    pub fn sweet(name: &str, category: Category, price: f64, stock: i64) -> Sweet {
        Sweet {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: format!("{name} from the counter"),
            category,
            price,
            stock,
            image_url: PLACEHOLDER_IMAGE.into(),
            created_at: Utc::now(),
        }
    }

    pub fn order(user_id: &str, sweet: &Sweet, status: OrderStatus) -> Order {
        Order {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            sweet_id: Some(sweet.id.clone()),
            sweet_name: sweet.name.clone(),
            quantity: 1,
            total_price: sweet.price,
            status,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::models::Category;
    use crate::realtime::ChangeKind;
    use crate::store::testing::RecordingStore;
    use crate::store::{MemoryStore, Notifying};
    use chrono::Duration;

    #[test]
    fn admin_sections_are_gated() {
        assert!(!Section::Inventory.allows(Role::User));
        assert!(!Section::Users.allows(Role::User));
        assert!(Section::Orders.allows(Role::User));
        assert!(Section::ALL.iter().all(|s| s.allows(Role::Admin)));
    }

    #[tokio::test]
    async fn non_admin_is_denied_without_fetching() {
        let store = RecordingStore::new();
        let dashboard = Dashboard::new(store.clone(), profile("Uma", Role::User));

        assert!(dashboard.inventory().await.is_denied());
        assert!(dashboard.users().await.unwrap().is_denied());
        assert_eq!(store.sweet_calls(), 0);
        assert_eq!(store.order_calls(), 0);
        assert_eq!(store.profile_calls(), 0);
    }

    #[tokio::test]
    async fn admin_opens_gated_sections() {
        let store = RecordingStore::new();
        let dashboard = Dashboard::new(store.clone(), profile("Ada", Role::Admin));
        assert!(!dashboard.inventory().await.is_denied());
        assert!(store.sweet_calls() > 0);
        assert_eq!(dashboard.sections().len(), Section::ALL.len());
    }

    #[tokio::test]
    async fn user_navigation_hides_admin_sections() {
        let dashboard = Dashboard::new(Arc::new(MemoryStore::new()), profile("Uma", Role::User));
        let sections = dashboard.sections();
        assert!(!sections.contains(&Section::Inventory));
        assert!(!sections.contains(&Section::Users));
        assert!(sections.contains(&Section::Catalog));
    }

    #[tokio::test]
    async fn overview_counts_low_stock_pending_and_todays_sales() {
        let store = MemoryStore::new();
        let truffle = sweet("Truffle", Category::Chocolates, 4.0, 3);
        let cake = sweet("Cake", Category::Pastries, 10.0, 0);
        let gummy = sweet("Gummy", Category::Candies, 1.5, 40);
        for s in [&truffle, &cake, &gummy] {
            store.insert_sweet(s).await.unwrap();
        }
        store.insert_order(&order("u1", &truffle, OrderStatus::Pending)).await.unwrap();
        store.insert_order(&order("u1", &gummy, OrderStatus::Completed)).await.unwrap();
        let mut yesterday = order("u1", &cake, OrderStatus::Pending);
        yesterday.created_at = Utc::now() - Duration::days(1);
        store.insert_order(&yesterday).await.unwrap();

        let stats = OverviewStats::fetch(&store, Utc::now()).await.unwrap();
        assert_eq!(stats.total_sweets, 3);
        assert_eq!(stats.low_stock_items, 1);
        assert_eq!(stats.pending_orders, 2);
        assert_eq!(stats.todays_sales, 5.5);
    }

    #[tokio::test]
    async fn live_overview_refetches_on_change() {
        let hub = ChangeHub::new();
        let store: Arc<dyn Store> = Arc::new(Notifying::new(Arc::new(MemoryStore::new()), hub.clone()));
        let mut live = LiveOverview::start(store.clone(), &hub).await.unwrap();
        assert_eq!(live.stats().total_sweets, 0);

        store.insert_sweet(&sweet("Fudge", Category::Candies, 2.0, 5)).await.unwrap();
        let event = live.next_change().await.unwrap().unwrap();
        assert_eq!(event.table, Table::Sweets);
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(live.stats().total_sweets, 1);
        assert_eq!(live.stats().low_stock_items, 1);

        live.stop();
        assert_eq!(hub.subscriber_count(), 0);
    }
}
