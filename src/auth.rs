use std::collections::HashSet;
use std::sync::RwLock;

use argon2::{self, Config as ArgonConfig};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use uuid::Uuid;

use crate::error::{Result, ShopError};
use crate::models::{Account, AuthResponse, Claims, Profile, Settings, SignInInput, SignUpInput};
use crate::store::Store;

const MIN_PASSWORD_LEN: usize = 6;

/// Password hashing, token issue/verification and sign-out bookkeeping.
pub struct AuthService {
    secret: String,
    ttl_hours: i64,
    // Token ids revoked by sign-out; they would otherwise stay valid until expiry
    revoked: RwLock<HashSet<String>>,
}

impl AuthService {
    pub fn new(secret: impl Into<String>, ttl_hours: i64) -> Self {
        AuthService {
            secret: secret.into(),
            ttl_hours,
            revoked: RwLock::new(HashSet::new()),
        }
    }

    /// Creates the account, its profile and a default settings row. The account is
    /// removed again if the profile cannot be written, so the email stays free.
    pub async fn sign_up(&self, store: &dyn Store, input: &SignUpInput) -> Result<Profile> {
        validate_sign_up(input)?;
        let email = input.email.trim().to_lowercase();

        if store.find_account_by_email(&email).await?.is_some() {
            return Err(ShopError::Conflict("User already registered".into()));
        }

        let salt: [u8; 16] = rand::thread_rng().gen();
        let hashed_password = argon2::hash_encoded(input.password.as_bytes(), &salt, &ArgonConfig::default())?;

        let id = Uuid::new_v4().to_string();
        store
            .insert_account(&Account {
                id: id.clone(),
                email: email.clone(),
                password_hash: hashed_password,
            })
            .await?;

        let profile = Profile {
            id: id.clone(),
            full_name: input.full_name.trim().to_string(),
            email,
            role: input.role,
            created_at: Utc::now(),
        };
        if let Err(e) = store.insert_profile(&profile).await {
            if let Err(cleanup) = store.delete_account(&id).await {
                log::error!("could not remove account {} after failed sign-up: {}", id, cleanup);
            }
            return Err(e);
        }
        // Missing settings fall back to defaults on read
        if let Err(e) = store.upsert_settings(&Settings::defaults_for(&id)).await {
            log::warn!("default settings for {} not saved: {}", id, e);
        }

        log::info!("new {} account {}", profile.role.as_str(), profile.id);
        Ok(profile)
    }

    pub async fn sign_in(&self, store: &dyn Store, input: &SignInInput) -> Result<AuthResponse> {
        let email = input.email.trim().to_lowercase();
        let invalid = || ShopError::unauthorized("Invalid login credentials");

        let account = store.find_account_by_email(&email).await?.ok_or_else(invalid)?;
        if !argon2::verify_encoded(&account.password_hash, input.password.as_bytes()).unwrap_or(false) {
            return Err(invalid());
        }
        let profile = store
            .get_profile(&account.id)
            .await?
            .ok_or(ShopError::NotFound("Profile"))?;

        let token = self.issue_token(&account.id)?;
        Ok(AuthResponse { token, profile })
    }

    pub fn sign_out(&self, claims: &Claims) {
        if let Ok(mut revoked) = self.revoked.write() {
            revoked.insert(claims.jti.clone());
        }
    }

    pub fn issue_token(&self, user_id: &str) -> Result<String> {
        let expiration = Utc::now()
            .checked_add_signed(chrono::Duration::hours(self.ttl_hours))
            .ok_or_else(|| ShopError::Internal("token expiry overflow".into()))?
            .timestamp() as usize;

        let claims = Claims {
            sub: user_id.to_string(),
            exp: expiration,
            jti: Uuid::new_v4().to_string(),
        };
        Ok(encode(&Header::default(), &claims, &EncodingKey::from_secret(self.secret.as_ref()))?)
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &Validation::new(Algorithm::HS256),
        )?;
        let revoked = self
            .revoked
            .read()
            .map(|r| r.contains(&data.claims.jti))
            .unwrap_or(false);
        if revoked {
            return Err(ShopError::unauthorized("Session has been signed out"));
        }
        Ok(data.claims)
    }

    pub async fn current_user(&self, store: &dyn Store, user_id: &str) -> Result<Profile> {
        store
            .get_profile(user_id)
            .await?
            .ok_or_else(|| ShopError::unauthorized("User not found"))
    }
}

/// Client-side form checks; nothing reaches the store when these fail.
pub fn validate_sign_up(input: &SignUpInput) -> Result<()> {
    if input.password != input.repeat_password {
        return Err(ShopError::validation("Passwords do not match"));
    }
    if input.full_name.trim().is_empty() {
        return Err(ShopError::validation("Full name is required"));
    }
    let email = input.email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
        _ => return Err(ShopError::validation("Invalid email address")),
    }
    if input.password.len() < MIN_PASSWORD_LEN {
        return Err(ShopError::validation(format!(
            "Password should be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::store::MemoryStore;

    fn input(email: &str, password: &str, repeat: &str) -> SignUpInput {
        SignUpInput {
            full_name: "Ada Baker".into(),
            email: email.into(),
            password: password.into(),
            repeat_password: repeat.into(),
            role: Role::User,
        }
    }

    #[test]
    fn mismatched_passwords_are_rejected() {
        let err = validate_sign_up(&input("ada@shop.test", "secret1", "secret2")).unwrap_err();
        assert_eq!(err.to_string(), "Passwords do not match");
    }

    #[test]
    fn short_password_and_bad_email_are_rejected() {
        assert!(validate_sign_up(&input("ada@shop.test", "abc", "abc")).is_err());
        assert!(validate_sign_up(&input("not-an-email", "secret1", "secret1")).is_err());
        assert!(validate_sign_up(&input("ada@shop.test", "secret1", "secret1")).is_ok());
    }

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let store = MemoryStore::new();
        let auth = AuthService::new("test-secret", 1);
        let profile = auth
            .sign_up(&store, &input("Ada@Shop.test", "secret1", "secret1"))
            .await
            .unwrap();
        assert_eq!(profile.email, "ada@shop.test");
        assert!(store.get_settings(&profile.id).await.unwrap().is_some());

        let response = auth
            .sign_in(&store, &SignInInput { email: "ada@shop.test".into(), password: "secret1".into() })
            .await
            .unwrap();
        let claims = auth.verify(&response.token).unwrap();
        assert_eq!(claims.sub, profile.id);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = MemoryStore::new();
        let auth = AuthService::new("test-secret", 1);
        let form = input("ada@shop.test", "secret1", "secret1");
        auth.sign_up(&store, &form).await.unwrap();
        assert!(matches!(auth.sign_up(&store, &form).await, Err(ShopError::Conflict(_))));
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let store = MemoryStore::new();
        let auth = AuthService::new("test-secret", 1);
        auth.sign_up(&store, &input("ada@shop.test", "secret1", "secret1")).await.unwrap();
        let result = auth
            .sign_in(&store, &SignInInput { email: "ada@shop.test".into(), password: "nope123".into() })
            .await;
        assert!(matches!(result, Err(ShopError::Unauthorized(_))));
    }

    #[test]
    fn signed_out_tokens_no_longer_verify() {
        let auth = AuthService::new("test-secret", 1);
        let token = auth.issue_token("u1").unwrap();
        let claims = auth.verify(&token).unwrap();
        auth.sign_out(&claims);
        assert!(auth.verify(&token).is_err());
    }

    #[test]
    fn tokens_from_another_secret_fail() {
        let token = AuthService::new("one", 1).issue_token("u1").unwrap();
        assert!(AuthService::new("two", 1).verify(&token).is_err());
    }

    #[tokio::test]
    async fn failed_profile_write_leaves_email_free() {
        use crate::store::testing::RecordingStore;
        use std::sync::atomic::Ordering;

        let store = RecordingStore::new();
        let auth = AuthService::new("test-secret", 1);
        let details = input("bo@shop.test", "secret1", "secret1");

        store.fail_insert_profile.store(true, Ordering::SeqCst);
        assert!(auth.sign_up(store.as_ref(), &details).await.is_err());
        assert!(store.find_account_by_email("bo@shop.test").await.unwrap().is_none());

        store.fail_insert_profile.store(false, Ordering::SeqCst);
        let profile = auth.sign_up(store.as_ref(), &details).await.unwrap();
        let login = SignInInput { email: "bo@shop.test".into(), password: "secret1".into() };
        assert_eq!(auth.sign_in(store.as_ref(), &login).await.unwrap().profile.id, profile.id);
    }
}
