use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::{self, doc, Document};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReplaceOptions, ReturnDocument};
use mongodb::{Collection, Database};

use super::Store;
use crate::error::{Result, ShopError};
use crate::models::{Account, Order, OrderQuery, OrderStatus, Profile, Settings, Sweet, SweetPatch};

/// MongoDB-backed tables. Rows are keyed by the application-level `id` field.
#[derive(Clone)]
pub struct MongoStore {
    accounts: Collection<Account>,
    profiles: Collection<Profile>,
    sweets: Collection<Sweet>,
    orders: Collection<Order>,
    settings: Collection<Settings>,
}

impl MongoStore {
    pub fn new(db: &Database) -> Self {
        MongoStore {
            accounts: db.collection("accounts"),
            profiles: db.collection("profiles"),
            sweets: db.collection("sweets"),
            orders: db.collection("orders"),
            settings: db.collection("settings"),
        }
    }

    fn after_update() -> FindOneAndUpdateOptions {
        FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build()
    }
}

fn to_bson<T: serde::Serialize>(value: &T) -> Result<bson::Bson> {
    bson::to_bson(value).map_err(|e| ShopError::Internal(format!("bson encoding failed: {e}")))
}

fn patch_document(patch: &SweetPatch) -> Result<Document> {
    let mut set = Document::new();
    if let Some(name) = &patch.name {
        set.insert("name", name.as_str());
    }
    if let Some(description) = &patch.description {
        set.insert("description", description.as_str());
    }
    if let Some(category) = patch.category {
        set.insert("category", to_bson(&category)?);
    }
    if let Some(price) = patch.price {
        set.insert("price", price);
    }
    if let Some(stock) = patch.stock {
        set.insert("stock", stock);
    }
    if let Some(image_url) = &patch.image_url {
        set.insert("image_url", image_url.as_str());
    }
    Ok(set)
}

#[async_trait]
impl Store for MongoStore {
    async fn insert_account(&self, account: &Account) -> Result<()> {
        self.accounts.insert_one(account, None).await?;
        Ok(())
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        Ok(self.accounts.find_one(doc! { "email": email }, None).await?)
    }

    async fn delete_account(&self, id: &str) -> Result<bool> {
        let result = self.accounts.delete_one(doc! { "id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<()> {
        self.profiles.insert_one(profile, None).await?;
        Ok(())
    }

    async fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        Ok(self.profiles.find_one(doc! { "id": id }, None).await?)
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let cursor = self.profiles.find(None, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_profile_name(&self, id: &str, full_name: &str) -> Result<Option<Profile>> {
        let update = doc! { "$set": { "full_name": full_name } };
        Ok(self
            .profiles
            .find_one_and_update(doc! { "id": id }, update, Self::after_update())
            .await?)
    }

    async fn list_sweets(&self) -> Result<Vec<Sweet>> {
        let options = FindOptions::builder().sort(doc! { "name": 1 }).build();
        let cursor = self.sweets.find(None, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn get_sweet(&self, id: &str) -> Result<Option<Sweet>> {
        Ok(self.sweets.find_one(doc! { "id": id }, None).await?)
    }

    async fn insert_sweet(&self, sweet: &Sweet) -> Result<()> {
        self.sweets.insert_one(sweet, None).await?;
        Ok(())
    }

    async fn update_sweet(&self, id: &str, patch: &SweetPatch) -> Result<Option<Sweet>> {
        let set = patch_document(patch)?;
        if set.is_empty() {
            return self.get_sweet(id).await;
        }
        Ok(self
            .sweets
            .find_one_and_update(doc! { "id": id }, doc! { "$set": set }, Self::after_update())
            .await?)
    }

    async fn set_stock(&self, id: &str, stock: i64) -> Result<Option<Sweet>> {
        let update = doc! { "$set": { "stock": stock } };
        Ok(self
            .sweets
            .find_one_and_update(doc! { "id": id }, update, Self::after_update())
            .await?)
    }

    async fn delete_sweet(&self, id: &str) -> Result<bool> {
        let result = self.sweets.delete_one(doc! { "id": id }, None).await?;
        if result.deleted_count == 0 {
            return Ok(false);
        }
        self.orders
            .update_many(doc! { "sweet_id": id }, doc! { "$set": { "sweet_id": bson::Bson::Null } }, None)
            .await?;
        Ok(true)
    }

    async fn insert_order(&self, order: &Order) -> Result<()> {
        self.orders.insert_one(order, None).await?;
        Ok(())
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>> {
        let mut filter = Document::new();
        if let Some(user_id) = &query.user_id {
            filter.insert("user_id", user_id.as_str());
        }
        if let Some(status) = query.status {
            filter.insert("status", status.as_str());
        }
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let cursor = self.orders.find(filter, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_order_status(&self, id: &str, status: OrderStatus) -> Result<Option<Order>> {
        let update = doc! { "$set": { "status": status.as_str() } };
        Ok(self
            .orders
            .find_one_and_update(doc! { "id": id }, update, Self::after_update())
            .await?)
    }

    async fn get_settings(&self, user_id: &str) -> Result<Option<Settings>> {
        Ok(self.settings.find_one(doc! { "user_id": user_id }, None).await?)
    }

    async fn upsert_settings(&self, settings: &Settings) -> Result<()> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.settings
            .replace_one(doc! { "user_id": settings.user_id.as_str() }, settings, options)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    #[test]
    fn empty_patch_produces_empty_set() {
        assert!(patch_document(&SweetPatch::default()).unwrap().is_empty());
    }

    #[test]
    fn patch_document_uses_display_category() {
        let patch = SweetPatch {
            category: Some(Category::Vegan),
            stock: Some(3),
            ..SweetPatch::default()
        };
        let set = patch_document(&patch).unwrap();
        assert_eq!(set.get_str("category").unwrap(), "Vegan");
        assert_eq!(set.get_i64("stock").unwrap(), 3);
        assert!(!set.contains_key("name"));
    }

    #[test]
    fn stored_timestamps_have_fixed_width() {
        use chrono::TimeZone;

        let on_the_second = Profile {
            id: "p1".into(),
            full_name: "Ada".into(),
            email: "ada@shop.test".into(),
            role: crate::models::Role::User,
            created_at: chrono::Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        };
        let mut a_bit_later = on_the_second.clone();
        a_bit_later.created_at += chrono::Duration::milliseconds(250);

        let first = mongodb::bson::to_document(&on_the_second).unwrap();
        let second = mongodb::bson::to_document(&a_bit_later).unwrap();
        let (first, second) = (first.get_str("created_at").unwrap(), second.get_str("created_at").unwrap());
        assert_eq!(first.len(), second.len());
        assert!(first < second);
    }
}
