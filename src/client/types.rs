//! Wire types for the Termgame Seller V2 API
//!
//! The vendor is loose with JSON types: ids arrive as numbers or strings and
//! prices as numbers or numeric strings. The lenient deserializers at the
//! bottom of this module normalise both.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `GET /balance`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    /// Available credit
    #[serde(default, deserialize_with = "lenient_f64")]
    pub balance: f64,
}

/// A game or service sold by the vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Product ID
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Whether the product can be bought
    #[serde(default)]
    pub is_active: bool,
    /// Label of the player identifier field (e.g. "Player ID", "UID")
    #[serde(default)]
    pub player_field_name: Option<String>,
    /// Purchasable packages
    #[serde(default)]
    pub packages: Vec<Package>,
    /// Game servers / zones, passed through untouched
    #[serde(default)]
    pub servers: Vec<Value>,
}

/// A purchasable top-up package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    /// Package ID
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Price in the account currency
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price: f64,
    /// Whether the package can be bought
    #[serde(default)]
    pub is_active: bool,
    /// Owning product, present on order payloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductRef>,
}

/// Product reference embedded in a package on order payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRef {
    /// Product ID
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub id: Option<String>,
    /// Product name
    #[serde(default)]
    pub name: String,
}

/// Order lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OrderState {
    /// Accepted, not yet delivered
    Pending,
    /// Being delivered
    Processing,
    /// Delivered
    Success,
    /// Delivery failed
    Failed,
    /// Any state this SDK does not know about
    Other(String),
}

impl OrderState {
    /// The vendor's string for this state
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Other(s) => s,
        }
    }

    /// Whether the order will not change state again
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl FromStr for OrderState {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "PENDING" => Self::Pending,
            "PROCESSING" => Self::Processing,
            "SUCCESS" => Self::Success,
            "FAILED" => Self::Failed,
            _ => Self::Other(s.to_string()),
        })
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for OrderState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OrderState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or(Self::Other(raw)))
    }
}

/// `GET /order-status/{orderId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatus {
    /// Order ID (the webhook transaction id)
    #[serde(deserialize_with = "lenient_string")]
    pub order_id: String,
    /// Current state
    pub status: OrderState,
    /// Amount charged
    #[serde(default, deserialize_with = "lenient_f64")]
    pub paid: f64,
    /// Account balance before the charge
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub before_balance: Option<f64>,
    /// Account balance after the charge
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub after_balance: Option<f64>,
    /// Why delivery failed
    #[serde(default)]
    pub fail_reason: Option<String>,
    /// Package that was bought
    #[serde(default)]
    pub package: Option<Package>,
    /// Player the top-up went to
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub player_id: Option<String>,
    /// Vendor member who placed the order
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub member_id: Option<String>,
    /// Fields this SDK does not model
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OrderStatus {
    /// Name of the game the order was for
    pub fn product_name(&self) -> Option<&str> {
        self.package
            .as_ref()
            .and_then(|p| p.product.as_ref())
            .map(|p| p.name.as_str())
    }

    /// Name of the package the order was for
    pub fn package_name(&self) -> Option<&str> {
        self.package.as_ref().map(|p| p.name.as_str())
    }
}

/// One entry of `GET /orders`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    /// Order ID
    #[serde(alias = "id", default, deserialize_with = "lenient_opt_string")]
    pub order_id: Option<String>,
    /// Current state
    #[serde(default)]
    pub status: Option<OrderState>,
    /// Amount charged
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub paid: Option<f64>,
    /// Fields this SDK does not model
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of `POST /buy/{packageId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResult {
    /// Order ID assigned by the vendor
    #[serde(alias = "id", default, deserialize_with = "lenient_opt_string")]
    pub order_id: Option<String>,
    /// Initial state
    #[serde(default)]
    pub status: Option<OrderState>,
    /// Fields this SDK does not model
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Who receives a purchased package.
///
/// The vendor accepts three payload shapes for the same purchase call; this
/// enum keeps them behind one operation.
#[derive(Clone, PartialEq, Eq)]
pub enum PurchaseTarget {
    /// Top up a player account by id
    PlayerId {
        /// Player identifier
        player_id: String,
        /// Server / zone, for games that need one
        zone_id: Option<String>,
    },
    /// Redeem through a payment or gift URL
    Url {
        /// Target URL
        url: String,
    },
    /// Log in to the game account to deliver
    Credentials {
        /// Account username
        username: String,
        /// Account password
        password: String,
    },
}

impl fmt::Debug for PurchaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlayerId { player_id, zone_id } => f
                .debug_struct("PlayerId")
                .field("player_id", player_id)
                .field("zone_id", zone_id)
                .finish(),
            Self::Url { url } => f.debug_struct("Url").field("url", url).finish(),
            Self::Credentials { username, .. } => f
                .debug_struct("Credentials")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Body of `POST /buy/{packageId}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyRequest {
    /// Delivery target
    pub target: PurchaseTarget,
    /// URL the vendor calls back on status changes
    pub callback_url: Option<String>,
}

impl BuyRequest {
    /// Buy for a player id
    pub fn player_id(player_id: impl Into<String>) -> Self {
        Self::new(PurchaseTarget::PlayerId {
            player_id: player_id.into(),
            zone_id: None,
        })
    }

    /// Buy through a URL
    pub fn url(url: impl Into<String>) -> Self {
        Self::new(PurchaseTarget::Url { url: url.into() })
    }

    /// Buy with game account credentials
    pub fn credentials(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::new(PurchaseTarget::Credentials {
            username: username.into(),
            password: password.into(),
        })
    }

    fn new(target: PurchaseTarget) -> Self {
        Self {
            target,
            callback_url: None,
        }
    }

    /// Set the zone id (player-id purchases only; ignored otherwise)
    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        if let PurchaseTarget::PlayerId { zone_id, .. } = &mut self.target {
            *zone_id = Some(zone.into());
        }
        self
    }

    /// Set the callback URL
    pub fn with_callback(mut self, callback_url: impl Into<String>) -> Self {
        self.callback_url = Some(callback_url.into());
        self
    }
}

impl Serialize for BuyRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match &self.target {
            PurchaseTarget::PlayerId { player_id, zone_id } => {
                map.serialize_entry("playerId", player_id)?;
                if let Some(zone_id) = zone_id {
                    map.serialize_entry("zoneId", zone_id)?;
                }
            }
            PurchaseTarget::Url { url } => map.serialize_entry("url", url)?,
            PurchaseTarget::Credentials { username, password } => {
                map.serialize_entry("username", username)?;
                map.serialize_entry("password", password)?;
            }
        }
        // An empty callback is treated as absent
        if let Some(callback) = self.callback_url.as_deref().filter(|c| !c.is_empty()) {
            map.serialize_entry("callbackUrl", callback)?;
        }
        map.end()
    }
}

/// Diagnostic snapshot of the most recent API response
#[derive(Debug, Clone, PartialEq)]
pub struct LastResponse {
    /// HTTP status code
    pub status_code: u16,
    /// Parsed JSON body
    pub body: Value,
    /// Raw body text
    pub raw: String,
}

// =============================================================================
// Lenient deserializers
// =============================================================================

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        _ => None,
    }
}

fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    value_to_string(value).ok_or_else(|| de::Error::custom("expected a string or number id"))
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(value_to_string))
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(0.0),
        other => value_to_f64(&other)
            .ok_or_else(|| de::Error::custom(format!("expected a number, got {}", other))),
    }
}

fn lenient_opt_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_f64))
}
