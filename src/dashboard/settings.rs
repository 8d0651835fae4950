use std::sync::Arc;

use super::Notice;
use crate::error::{Result, ShopError};
use crate::models::{Profile, Settings, SettingsInput, CURRENCIES};
use crate::store::Store;

pub fn validate_settings(input: &SettingsInput) -> Result<()> {
    if input.shop_name.trim().is_empty() {
        return Err(ShopError::validation("Shop name is required"));
    }
    if !CURRENCIES.contains(&input.currency.as_str()) {
        return Err(ShopError::validation(format!("Unsupported currency: {}", input.currency)));
    }
    if input.low_stock_threshold < 0 {
        return Err(ShopError::validation("Low stock threshold must be zero or more"));
    }
    Ok(())
}

/// The caller's settings row, or defaults when none has been saved yet.
pub async fn load_settings(store: &dyn Store, user_id: &str) -> Result<Settings> {
    Ok(store
        .get_settings(user_id)
        .await?
        .unwrap_or_else(|| Settings::defaults_for(user_id)))
}

pub async fn save_settings(store: &dyn Store, user_id: &str, input: &SettingsInput) -> Result<Settings> {
    validate_settings(input)?;
    let mut settings = load_settings(store, user_id).await?;
    settings.shop_name = input.shop_name.trim().to_string();
    settings.currency = input.currency.clone();
    settings.low_stock_threshold = input.low_stock_threshold;
    settings.theme = input.theme;
    store.upsert_settings(&settings).await?;
    Ok(settings)
}

pub async fn rename_profile(store: &dyn Store, user_id: &str, full_name: &str) -> Result<Profile> {
    let full_name = full_name.trim();
    if full_name.is_empty() {
        return Err(ShopError::validation("Full name is required"));
    }
    store
        .update_profile_name(user_id, full_name)
        .await?
        .ok_or(ShopError::NotFound("Profile"))
}

pub struct SettingsPage {
    store: Arc<dyn Store>,
    profile: Profile,
    settings: Settings,
    notices: Vec<Notice>,
}

impl SettingsPage {
    pub async fn load(store: Arc<dyn Store>, user_id: &str) -> Result<Self> {
        let profile = store
            .get_profile(user_id)
            .await?
            .ok_or(ShopError::NotFound("Profile"))?;
        let settings = load_settings(store.as_ref(), user_id).await?;
        Ok(SettingsPage { store, profile, settings, notices: Vec::new() })
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub async fn save_profile(&mut self, full_name: &str) -> bool {
        match rename_profile(self.store.as_ref(), &self.profile.id, full_name).await {
            Ok(profile) => {
                self.profile = profile;
                self.notices.push(Notice::success("Profile updated successfully"));
                true
            }
            Err(e) => {
                log::warn!("profile update failed: {}", e);
                self.notices.push(Notice::error("Failed to update profile"));
                false
            }
        }
    }

    pub async fn save_settings(&mut self, input: &SettingsInput) -> bool {
        match save_settings(self.store.as_ref(), &self.profile.id, input).await {
            Ok(settings) => {
                self.settings = settings;
                self.notices.push(Notice::success("Settings updated successfully"));
                true
            }
            Err(e) => {
                log::warn!("settings update failed: {}", e);
                self.notices.push(Notice::error("Failed to update settings"));
                false
            }
        }
    }
}
