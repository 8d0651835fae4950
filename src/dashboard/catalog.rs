//! Product browsing and the optimistic purchase flow.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Notice, LOW_STOCK_LIMIT};
use crate::error::{Result, ShopError};
use crate::models::{Category, Order, OrderStatus, Sweet};
use crate::store::Store;

/// Search and filter criteria. Every set predicate must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogFilter {
    pub query: String,
    /// `None` means all categories.
    pub category: Option<Category>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl CatalogFilter {
    pub fn matches(&self, sweet: &Sweet) -> bool {
        let query = self.query.trim().to_lowercase();
        let text_ok = query.is_empty()
            || sweet.name.to_lowercase().contains(&query)
            || sweet.description.to_lowercase().contains(&query);

        text_ok
            && self.category.map_or(true, |c| sweet.category == c)
            && self.min_price.map_or(true, |min| sweet.price >= min)
            && self.max_price.map_or(true, |max| sweet.price <= max)
    }

    pub fn apply<'a>(&self, sweets: &'a [Sweet]) -> Vec<&'a Sweet> {
        sweets.iter().filter(|s| self.matches(s)).collect()
    }
}

/// Raw query-string form of [`CatalogFilter`]. Blank values mean "unset".
#[derive(Debug, Default, Deserialize)]
pub struct CatalogParams {
    pub q: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
}

impl TryFrom<CatalogParams> for CatalogFilter {
    type Error = ShopError;

    fn try_from(params: CatalogParams) -> Result<Self> {
        let category = match params.category.as_deref().map(str::trim) {
            None | Some("") | Some("All") => None,
            Some(name) => Some(name.parse::<Category>().map_err(ShopError::Validation)?),
        };
        Ok(CatalogFilter {
            query: params.q.unwrap_or_default(),
            category,
            min_price: parse_price(params.min_price.as_deref(), "min_price")?,
            max_price: parse_price(params.max_price.as_deref(), "max_price")?,
        })
    }
}

fn parse_price(raw: Option<&str>, field: &str) -> Result<Option<f64>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<f64>()
            .ok()
            .filter(|p| p.is_finite())
            .map(Some)
            .ok_or_else(|| ShopError::validation(format!("{field} must be a number"))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StockStatus {
    SoldOut,
    LowStock,
    Available,
}

impl StockStatus {
    pub fn for_stock(stock: i64) -> Self {
        if stock <= 0 {
            StockStatus::SoldOut
        } else if stock <= LOW_STOCK_LIMIT {
            StockStatus::LowStock
        } else {
            StockStatus::Available
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StockStatus::SoldOut => "Sold Out",
            StockStatus::LowStock => "Low Stock",
            StockStatus::Available => "Available",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    UnknownSweet,
    OutOfStock,
    InFlight,
}

/// A purchase whose local stock patch has been applied but not yet confirmed.
#[derive(Debug)]
pub struct PendingPurchase {
    sweet: Sweet,
    user_id: String,
}

#[derive(Debug)]
pub enum PurchaseFailure {
    OrderInsert(ShopError),
    StockUpdate(ShopError),
}

impl PendingPurchase {
    pub fn sweet_id(&self) -> &str {
        &self.sweet.id
    }

    /// Creates the order, then writes the decremented stock.
    ///
    /// The two writes are independent and the stock write is a blind set of the
    /// value computed from the snapshot taken when the purchase began.
    pub async fn submit(&self, store: &dyn Store) -> std::result::Result<Order, PurchaseFailure> {
        let order = Order {
            id: Uuid::new_v4().to_string(),
            user_id: self.user_id.clone(),
            sweet_id: Some(self.sweet.id.clone()),
            sweet_name: self.sweet.name.clone(),
            quantity: 1,
            total_price: self.sweet.price,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };
        store
            .insert_order(&order)
            .await
            .map_err(PurchaseFailure::OrderInsert)?;

        match store.set_stock(&self.sweet.id, self.sweet.stock - 1).await {
            Ok(Some(_)) => Ok(order),
            Ok(None) => Err(PurchaseFailure::StockUpdate(ShopError::NotFound("Sweet"))),
            Err(e) => Err(PurchaseFailure::StockUpdate(e)),
        }
    }
}

#[derive(Debug)]
pub enum PurchaseOutcome {
    Rejected(Rejection),
    Completed(Order),
    Failed,
}

pub struct CatalogView {
    store: Arc<dyn Store>,
    user_id: String,
    sweets: Vec<Sweet>,
    in_flight: HashSet<String>,
    notices: Vec<Notice>,
    pub filter: CatalogFilter,
}

impl CatalogView {
    pub async fn load(store: Arc<dyn Store>, user_id: &str) -> Self {
        let mut view = CatalogView {
            store,
            user_id: user_id.to_string(),
            sweets: Vec::new(),
            in_flight: HashSet::new(),
            notices: Vec::new(),
            filter: CatalogFilter::default(),
        };
        view.refresh().await;
        view
    }

    /// Full refetch; on failure the current listing stays.
    pub async fn refresh(&mut self) {
        match self.store.list_sweets().await {
            Ok(sweets) => self.sweets = sweets,
            Err(e) => {
                log::warn!("catalog fetch failed: {}", e);
                self.notices.push(Notice::error("Failed to load sweets"));
            }
        }
    }

    pub fn sweets(&self) -> &[Sweet] {
        &self.sweets
    }

    pub fn visible(&self) -> Vec<&Sweet> {
        self.filter.apply(&self.sweets)
    }

    pub fn displayed_stock(&self, sweet_id: &str) -> Option<i64> {
        self.find(sweet_id).map(|s| s.stock)
    }

    pub fn can_purchase(&self, sweet_id: &str) -> bool {
        self.find(sweet_id).map_or(false, |s| s.stock > 0) && !self.in_flight.contains(sweet_id)
    }

    pub fn is_in_flight(&self, sweet_id: &str) -> bool {
        self.in_flight.contains(sweet_id)
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Guards, then patches the displayed stock down by one. No remote call is made here.
    pub fn begin_purchase(&mut self, sweet_id: &str) -> std::result::Result<PendingPurchase, Rejection> {
        if self.in_flight.contains(sweet_id) {
            return Err(Rejection::InFlight);
        }
        let sweet = self.find_mut(sweet_id).ok_or(Rejection::UnknownSweet)?;
        if sweet.stock <= 0 {
            return Err(Rejection::OutOfStock);
        }
        let snapshot = sweet.clone();
        sweet.stock -= 1;
        self.in_flight.insert(sweet_id.to_string());

        Ok(PendingPurchase { sweet: snapshot, user_id: self.user_id.clone() })
    }

    /// Applies the remote result: keeps the patch on success, restores it otherwise.
    pub fn settle(
        &mut self,
        pending: PendingPurchase,
        result: std::result::Result<Order, PurchaseFailure>,
    ) -> PurchaseOutcome {
        self.in_flight.remove(&pending.sweet.id);
        match result {
            Ok(order) => {
                self.notices.push(Notice::success("Purchase successful!"));
                PurchaseOutcome::Completed(order)
            }
            Err(failure) => {
                let message = match &failure {
                    PurchaseFailure::OrderInsert(e) => {
                        log::warn!("order insert failed for {}: {}", pending.sweet.id, e);
                        "Failed to create order"
                    }
                    PurchaseFailure::StockUpdate(e) => {
                        log::warn!("stock update failed for {}: {}", pending.sweet.id, e);
                        "Failed to update stock"
                    }
                };
                if let Some(sweet) = self.find_mut(&pending.sweet.id) {
                    sweet.stock = pending.sweet.stock;
                }
                self.notices.push(Notice::error(message));
                PurchaseOutcome::Failed
            }
        }
    }

    pub async fn purchase(&mut self, sweet_id: &str) -> PurchaseOutcome {
        let pending = match self.begin_purchase(sweet_id) {
            Ok(pending) => pending,
            Err(rejection) => return PurchaseOutcome::Rejected(rejection),
        };
        let store = self.store.clone();
        let result = pending.submit(store.as_ref()).await;
        self.settle(pending, result)
    }

    fn find(&self, sweet_id: &str) -> Option<&Sweet> {
        self.sweets.iter().find(|s| s.id == sweet_id)
    }

    fn find_mut(&mut self, sweet_id: &str) -> Option<&mut Sweet> {
        self.sweets.iter_mut().find(|s| s.id == sweet_id)
    }
}
