use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const PLACEHOLDER_IMAGE: &str = "/placeholder.svg?height=200&width=200";
pub const DEFAULT_SHOP_NAME: &str = "Sweet Shop Manager";
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;
pub const CURRENCIES: [&str; 7] = ["USD", "EUR", "GBP", "INR", "JPY", "CAD", "AUD"];

/// Fixed-width RFC 3339 timestamps (microseconds, `Z` suffix). Stored strings then
/// sort in time order, which the newest-first listings rely on.
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        DateTime::<Utc>::deserialize(deserializer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

// Credentials live apart from the profile so a profile never carries the hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Chocolates,
    Pastries,
    Candies,
    Vegan,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Chocolates,
        Category::Pastries,
        Category::Candies,
        Category::Vegan,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Chocolates => "Chocolates",
            Category::Pastries => "Pastries",
            Category::Candies => "Candies",
            Category::Vegan => "Vegan",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category: {s}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sweet {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub price: f64,
    pub stock: i64,
    pub image_url: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSweet {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    pub price: f64,
    pub stock: i64,
    pub image_url: Option<String>,
}

/// Partial edit of a sweet; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweetPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub price: Option<f64>,
    pub stock: Option<i64>,
    pub image_url: Option<String>,
}

impl SweetPatch {
    pub fn apply(&self, sweet: &mut Sweet) {
        if let Some(name) = &self.name {
            sweet.name = name.clone();
        }
        if let Some(description) = &self.description {
            sweet.description = description.clone();
        }
        if let Some(category) = self.category {
            sweet.category = category;
        }
        if let Some(price) = self.price {
            sweet.price = price;
        }
        if let Some(stock) = self.stock {
            sweet.stock = stock;
        }
        if let Some(image_url) = &self.image_url {
            sweet.image_url = image_url.clone();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub sweet_id: Option<String>,
    pub sweet_name: String,
    pub quantity: i64,
    pub total_price: f64,
    pub status: OrderStatus,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub sweet_id: String,
    pub sweet_name: String,
    pub quantity: i64,
    pub total_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub full_name: String,
    pub email: String,
}

/// An order joined with the purchasing profile, as the orders listing shows it.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRow {
    #[serde(flatten)]
    pub order: Order,
    pub customer: Option<Customer>,
}

/// Filter for order listings. Results are always newest first.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    pub user_id: Option<String>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub id: String,
    pub user_id: String,
    pub shop_name: String,
    pub currency: String,
    pub low_stock_threshold: i64,
    pub theme: Theme,
}

impl Settings {
    pub fn defaults_for(user_id: &str) -> Self {
        Settings {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            shop_name: DEFAULT_SHOP_NAME.to_string(),
            currency: "USD".to_string(),
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            theme: Theme::Light,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingsInput {
    pub shop_name: String,
    pub currency: String,
    pub low_stock_threshold: i64,
    pub theme: Theme,
}

#[derive(Debug, Deserialize)]
pub struct ProfileInput {
    pub full_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignUpInput {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub repeat_password: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct SignInInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (user ID)
    pub exp: usize,  // Expiration time as UTC timestamp
    pub jti: String, // Token ID, used for sign-out
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub profile: Profile,
}
