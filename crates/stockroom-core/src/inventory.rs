use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{require_non_negative, require_text, StockroomError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub quantity: i64,
    /// Number of damaged units. Damage images exist only while this is above zero.
    pub damaged: i64,
    pub description: String,
    pub category_id: Option<i64>,
    pub invoice_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields of a new item. Image fields are deliberately absent: attachments
/// are recorded as separate rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInventory {
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub damaged: i64,
    #[serde(default)]
    pub description: String,
    pub category_id: Option<i64>,
    pub invoice_id: Option<i64>,
}

impl CreateInventory {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), StockroomError> {
        require_text("name", &self.name)?;
        validate_price(self.price)?;
        require_non_negative("quantity", self.quantity)?;
        require_non_negative("damaged", self.damaged)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInventory {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub quantity: Option<i64>,
    pub damaged: Option<i64>,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub invoice_id: Option<i64>,
}

impl UpdateInventory {
    pub fn validate(&self) -> Result<(), StockroomError> {
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        if let Some(quantity) = self.quantity {
            require_non_negative("quantity", quantity)?;
        }
        if let Some(damaged) = self.damaged {
            require_non_negative("damaged", damaged)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.price.is_none()
            && self.quantity.is_none()
            && self.damaged.is_none()
            && self.description.is_none()
            && self.category_id.is_none()
            && self.invoice_id.is_none()
    }
}

fn validate_price(price: f64) -> Result<(), StockroomError> {
    if !price.is_finite() || price < 0.0 {
        return Err(StockroomError::InvalidInput(
            "price must be a finite amount of zero or greater".into(),
        ));
    }
    Ok(())
}
