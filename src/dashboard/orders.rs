use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::Notice;
use crate::error::{Result, ShopError};
use crate::models::{Customer, NewOrder, Order, OrderQuery, OrderStatus, OrderRow, Profile};
use crate::store::Store;

/// Admins see every order, everyone else only their own. Newest first.
pub async fn list_for(store: &dyn Store, viewer: &Profile) -> Result<Vec<OrderRow>> {
    let query = OrderQuery {
        user_id: (!viewer.role.is_admin()).then(|| viewer.id.clone()),
        status: None,
    };
    let orders = store.list_orders(&query).await?;
    attach_customers(store, orders).await
}

async fn attach_customers(store: &dyn Store, orders: Vec<Order>) -> Result<Vec<OrderRow>> {
    let mut customers: HashMap<String, Option<Customer>> = HashMap::new();
    let mut rows = Vec::with_capacity(orders.len());
    for order in orders {
        if !customers.contains_key(&order.user_id) {
            let customer = store.get_profile(&order.user_id).await?.map(|p| Customer {
                full_name: p.full_name,
                email: p.email,
            });
            customers.insert(order.user_id.clone(), customer);
        }
        let customer = customers.get(&order.user_id).cloned().flatten();
        rows.push(OrderRow { order, customer });
    }
    Ok(rows)
}

/// Inserts an order for `user_id`. New orders always start out pending.
pub async fn place_order(store: &dyn Store, user_id: &str, input: NewOrder) -> Result<Order> {
    if input.quantity < 1 {
        return Err(ShopError::validation("Quantity must be at least 1"));
    }
    if !input.total_price.is_finite() || input.total_price < 0.0 {
        return Err(ShopError::validation("Total price must be zero or more"));
    }
    if input.sweet_name.trim().is_empty() {
        return Err(ShopError::validation("Sweet name is required"));
    }
    let order = Order {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        sweet_id: Some(input.sweet_id),
        sweet_name: input.sweet_name,
        quantity: input.quantity,
        total_price: input.total_price,
        status: OrderStatus::Pending,
        created_at: Utc::now(),
    };
    store.insert_order(&order).await?;
    Ok(order)
}

pub async fn change_status(store: &dyn Store, id: &str, status: OrderStatus) -> Result<Order> {
    let order = store
        .update_order_status(id, status)
        .await?
        .ok_or(ShopError::NotFound("Order"))?;
    log::info!("order {} is now {}", id, status.as_str());
    Ok(order)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderSummary {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub revenue: f64,
}

impl OrderSummary {
    pub fn of(rows: &[OrderRow]) -> Self {
        let completed = rows.iter().filter(|r| r.order.status == OrderStatus::Completed);
        OrderSummary {
            total: rows.len(),
            pending: rows.iter().filter(|r| r.order.status == OrderStatus::Pending).count(),
            completed: completed.clone().count(),
            revenue: completed.map(|r| r.order.total_price).sum(),
        }
    }
}

pub struct OrdersPage {
    store: Arc<dyn Store>,
    viewer: Profile,
    rows: Vec<OrderRow>,
    notices: Vec<Notice>,
}

impl OrdersPage {
    pub async fn load(store: Arc<dyn Store>, viewer: Profile) -> Self {
        let mut page = OrdersPage { store, viewer, rows: Vec::new(), notices: Vec::new() };
        page.refresh().await;
        page
    }

    pub async fn refresh(&mut self) {
        match list_for(self.store.as_ref(), &self.viewer).await {
            Ok(rows) => self.rows = rows,
            Err(e) => {
                log::warn!("orders fetch failed: {}", e);
                self.notices.push(Notice::error("Failed to load orders"));
            }
        }
    }

    pub fn rows(&self) -> &[OrderRow] {
        &self.rows
    }

    pub fn summary(&self) -> OrderSummary {
        OrderSummary::of(&self.rows)
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Only admins get the status control.
    pub fn can_manage(&self) -> bool {
        self.viewer.role.is_admin()
    }

    pub async fn set_status(&mut self, id: &str, status: OrderStatus) -> bool {
        if !self.can_manage() {
            self.notices.push(Notice::error("Failed to update order status"));
            return false;
        }
        match change_status(self.store.as_ref(), id, status).await {
            Ok(_) => {
                self.notices.push(Notice::success("Order status updated"));
                self.refresh().await;
                true
            }
            Err(e) => {
                log::warn!("status change for {} failed: {}", id, e);
                self.notices.push(Notice::error("Failed to update order status"));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::fixtures::{order, profile, sweet};
    use crate::models::{Category, Role};
    use crate::store::MemoryStore;

    async fn shop() -> (Arc<dyn Store>, Profile, Profile, Profile) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let admin = profile("Ada", Role::Admin);
        let uma = profile("Uma", Role::User);
        let bo = profile("Bo", Role::User);
        for p in [&admin, &uma, &bo] {
            store.insert_profile(p).await.unwrap();
        }
        let cake = sweet("Cake", Category::Pastries, 6.0, 4);
        store.insert_order(&order(&uma.id, &cake, OrderStatus::Pending)).await.unwrap();
        store.insert_order(&order(&uma.id, &cake, OrderStatus::Completed)).await.unwrap();
        store.insert_order(&order(&bo.id, &cake, OrderStatus::Completed)).await.unwrap();
        (store, admin, uma, bo)
    }

    #[tokio::test]
    async fn users_only_see_their_own_orders() {
        let (store, _, uma, _) = shop().await;
        let rows = list_for(store.as_ref(), &uma).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.order.user_id == uma.id));
        assert_eq!(rows[0].customer.as_ref().unwrap().email, "uma@shop.test");
    }

    #[tokio::test]
    async fn admin_sees_all_with_summary() {
        let (store, admin, _, _) = shop().await;
        let page = OrdersPage::load(store, admin).await;
        let summary = page.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.revenue, 12.0);
    }

    #[tokio::test]
    async fn admin_changes_status() {
        let (store, admin, _, _) = shop().await;
        let mut page = OrdersPage::load(store, admin).await;
        let pending_id = page
            .rows()
            .iter()
            .find(|r| r.order.status == OrderStatus::Pending)
            .map(|r| r.order.id.clone())
            .unwrap();
        assert!(page.set_status(&pending_id, OrderStatus::Cancelled).await);
        assert_eq!(page.summary().pending, 0);
        assert!(!page.set_status("missing", OrderStatus::Completed).await);
    }

    #[tokio::test]
    async fn placed_orders_start_pending() {
        let store = MemoryStore::new();
        let input = NewOrder { sweet_id: "s1".into(), sweet_name: "Cake".into(), quantity: 2, total_price: 12.0 };
        let order = place_order(&store, "u1", input).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.user_id, "u1");

        let zero = NewOrder { sweet_id: "s1".into(), sweet_name: "Cake".into(), quantity: 0, total_price: 0.0 };
        assert!(place_order(&store, "u1", zero).await.is_err());
    }

    #[tokio::test]
    async fn users_cannot_change_status() {
        let (store, _, uma, _) = shop().await;
        let mut page = OrdersPage::load(store, uma).await;
        let id = page.rows()[0].order.id.clone();
        assert!(!page.can_manage());
        assert!(!page.set_status(&id, OrderStatus::Completed).await);
    }
}
