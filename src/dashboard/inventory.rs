//! Admin inventory management: stock overview, CRUD, restock and CSV export.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{is_low_stock, Notice};
use crate::error::{Result, ShopError};
use crate::models::{NewSweet, OrderQuery, OrderStatus, Sweet, SweetPatch, PLACEHOLDER_IMAGE};
use crate::storage::{sweet_image_path, Storage, IMAGES_BUCKET};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryStats {
    pub total_sweets: usize,
    pub low_stock_items: usize,
    /// Units on hand across every product.
    pub total_units: i64,
    /// Sum of completed order totals.
    pub total_revenue: f64,
}

impl InventoryStats {
    pub async fn fetch(store: &dyn Store) -> Result<Self> {
        let sweets = store.list_sweets().await?;
        let completed = store
            .list_orders(&OrderQuery { user_id: None, status: Some(OrderStatus::Completed) })
            .await?;
        Ok(InventoryStats {
            total_sweets: sweets.len(),
            low_stock_items: sweets.iter().filter(|s| is_low_stock(s.stock)).count(),
            total_units: sweets.iter().fold(0i64, |total, s| total.saturating_add(s.stock)),
            total_revenue: completed.iter().map(|o| o.total_price).sum(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StockIndicator {
    Out,
    Low,
    Ok,
    High,
}

impl StockIndicator {
    pub fn for_stock(stock: i64) -> Self {
        match stock {
            i64::MIN..=0 => StockIndicator::Out,
            1..=10 => StockIndicator::Low,
            11..=30 => StockIndicator::Ok,
            _ => StockIndicator::High,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StockIndicator::Out => "Out",
            StockIndicator::Low => "Low",
            StockIndicator::Ok => "OK",
            StockIndicator::High => "High",
        }
    }
}

/// An image file as submitted by a form: original name, MIME type and base64 body.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: String,
}

impl ImageUpload {
    pub fn decode(&self) -> Result<Vec<u8>> {
        if !self.content_type.starts_with("image/") {
            return Err(ShopError::validation("Please select an image file"));
        }
        Ok(BASE64.decode(self.data.trim())?)
    }
}

/// Stores an image in the images bucket and returns its public URL.
pub async fn store_image(storage: &Storage, upload: &ImageUpload) -> Result<String> {
    let bytes = upload.decode()?;
    let path = sweet_image_path(&upload.file_name);
    storage.upload(IMAGES_BUCKET, &path, &bytes).await?;
    Ok(storage.public_url(IMAGES_BUCKET, &path))
}

fn validate_fields(name: Option<&str>, price: Option<f64>, stock: Option<i64>) -> Result<()> {
    if let Some(name) = name {
        if name.trim().is_empty() {
            return Err(ShopError::validation("Name is required"));
        }
    }
    if let Some(price) = price {
        if !price.is_finite() || price < 0.0 {
            return Err(ShopError::validation("Price must be zero or more"));
        }
    }
    if let Some(stock) = stock {
        if stock < 0 {
            return Err(ShopError::validation("Stock must be zero or more"));
        }
    }
    Ok(())
}

pub async fn create_sweet(store: &dyn Store, input: NewSweet) -> Result<Sweet> {
    validate_fields(Some(&input.name), Some(input.price), Some(input.stock))?;
    let sweet = Sweet {
        id: Uuid::new_v4().to_string(),
        name: input.name.trim().to_string(),
        description: input.description,
        category: input.category,
        price: input.price,
        stock: input.stock,
        image_url: input
            .image_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
        created_at: Utc::now(),
    };
    store.insert_sweet(&sweet).await?;
    log::info!("added sweet {} ({})", sweet.id, sweet.name);
    Ok(sweet)
}

pub async fn update_sweet(store: &dyn Store, id: &str, patch: &SweetPatch) -> Result<Sweet> {
    validate_fields(patch.name.as_deref(), patch.price, patch.stock)?;
    store.update_sweet(id, patch).await?.ok_or(ShopError::NotFound("Sweet"))
}

/// Adds `amount` units to the current stock.
pub async fn restock(store: &dyn Store, id: &str, amount: i64) -> Result<Sweet> {
    if amount <= 0 {
        return Err(ShopError::validation("Restock amount must be positive"));
    }
    let sweet = store.get_sweet(id).await?.ok_or(ShopError::NotFound("Sweet"))?;
    let stock = sweet
        .stock
        .checked_add(amount)
        .ok_or_else(|| ShopError::validation("Stock is too large"))?;
    store
        .set_stock(id, stock)
        .await?
        .ok_or(ShopError::NotFound("Sweet"))
}

pub async fn delete_sweet(store: &dyn Store, id: &str) -> Result<()> {
    if store.delete_sweet(id).await? {
        log::info!("deleted sweet {}", id);
        Ok(())
    } else {
        Err(ShopError::NotFound("Sweet"))
    }
}

pub fn export_csv(sweets: &[Sweet]) -> Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new().from_writer(vec![]);
    wtr.write_record(["ID", "Name", "Category", "Price", "Stock"])?;
    for s in sweets {
        wtr.write_record(&[
            s.id.clone(),
            s.name.clone(),
            s.category.to_string(),
            s.price.to_string(),
            s.stock.to_string(),
        ])?;
    }
    wtr.into_inner().map_err(|e| ShopError::Storage(e.into_error()))
}

pub struct InventoryPage {
    store: Arc<dyn Store>,
    sweets: Vec<Sweet>,
    stats: Option<InventoryStats>,
    notices: Vec<Notice>,
}

impl InventoryPage {
    pub async fn load(store: Arc<dyn Store>) -> Self {
        let mut page = InventoryPage { store, sweets: Vec::new(), stats: None, notices: Vec::new() };
        page.refresh().await;
        page
    }

    pub async fn refresh(&mut self) {
        match self.store.list_sweets().await {
            Ok(sweets) => self.sweets = sweets,
            Err(e) => {
                log::warn!("inventory fetch failed: {}", e);
                self.notices.push(Notice::error("Failed to load inventory"));
            }
        }
        match InventoryStats::fetch(self.store.as_ref()).await {
            Ok(stats) => self.stats = Some(stats),
            Err(e) => log::warn!("inventory stats failed: {}", e),
        }
    }

    pub fn sweets(&self) -> &[Sweet] {
        &self.sweets
    }

    pub fn stats(&self) -> Option<&InventoryStats> {
        self.stats.as_ref()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Uploads the image if one is given, falling back to the placeholder when that fails.
    pub async fn add(&mut self, storage: &Storage, mut input: NewSweet, image: Option<&ImageUpload>) -> bool {
        if let Some(upload) = image {
            input.image_url = Some(self.upload_or_keep(storage, upload, PLACEHOLDER_IMAGE, "using placeholder").await);
        }
        match create_sweet(self.store.as_ref(), input).await {
            Ok(_) => {
                self.notices.push(Notice::success("Sweet added successfully"));
                self.refresh().await;
                true
            }
            Err(e) => {
                log::warn!("add sweet failed: {}", e);
                self.notices.push(Notice::error("Failed to add sweet"));
                false
            }
        }
    }

    pub async fn edit(&mut self, storage: &Storage, id: &str, mut patch: SweetPatch, image: Option<&ImageUpload>) -> bool {
        if let Some(upload) = image {
            let current = self
                .sweets
                .iter()
                .find(|s| s.id == id)
                .map(|s| s.image_url.clone())
                .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string());
            patch.image_url = Some(self.upload_or_keep(storage, upload, &current, "keeping current").await);
        }
        match update_sweet(self.store.as_ref(), id, &patch).await {
            Ok(_) => {
                self.notices.push(Notice::success("Sweet updated successfully"));
                self.refresh().await;
                true
            }
            Err(e) => {
                log::warn!("update sweet {} failed: {}", id, e);
                self.notices.push(Notice::error("Failed to update sweet"));
                false
            }
        }
    }

    pub async fn restock(&mut self, id: &str, amount: i64) -> bool {
        if amount <= 0 {
            self.notices.push(Notice::error("Restock amount must be positive"));
            return false;
        }
        match restock(self.store.as_ref(), id, amount).await {
            Ok(sweet) => {
                self.notices.push(Notice::success(format!(
                    "Added {} units. New stock: {}",
                    amount, sweet.stock
                )));
                self.refresh().await;
                true
            }
            Err(e) => {
                log::warn!("restock {} failed: {}", id, e);
                self.notices.push(Notice::error("Failed to restock"));
                false
            }
        }
    }

    pub async fn delete(&mut self, id: &str) -> bool {
        match delete_sweet(self.store.as_ref(), id).await {
            Ok(()) => {
                self.notices.push(Notice::success("Sweet deleted successfully"));
                self.refresh().await;
                true
            }
            Err(e) => {
                log::warn!("delete sweet {} failed: {}", id, e);
                self.notices.push(Notice::error("Failed to delete sweet"));
                false
            }
        }
    }

    pub fn export_csv(&self) -> Result<Vec<u8>> {
        export_csv(&self.sweets)
    }

    async fn upload_or_keep(&mut self, storage: &Storage, upload: &ImageUpload, fallback: &str, what: &str) -> String {
        match store_image(storage, upload).await {
            Ok(url) => url,
            Err(e) => {
                log::warn!("image upload failed: {}", e);
                self.notices.push(Notice::warning(format!("Failed to upload image, {what}")));
                fallback.to_string()
            }
        }
    }
}
