use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{require_text, StockroomError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: i64,
    /// Tax registration number; unique per provider.
    pub ruc: String,
    pub name: String,
    pub telephone: String,
    pub address: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProvider {
    pub ruc: String,
    pub name: String,
    #[serde(default)]
    pub telephone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub email: String,
}

impl CreateProvider {
    pub fn validate(&self) -> Result<(), StockroomError> {
        require_text("ruc", &self.ruc)?;
        require_text("name", &self.name)?;
        if !self.email.is_empty() && !self.email.contains('@') {
            return Err(StockroomError::InvalidInput(format!(
                "email '{}' is not valid",
                self.email
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProvider {
    pub ruc: Option<String>,
    pub name: Option<String>,
    pub telephone: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
}

impl UpdateProvider {
    pub fn validate(&self) -> Result<(), StockroomError> {
        if let Some(ruc) = &self.ruc {
            require_text("ruc", ruc)?;
        }
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        Ok(())
    }
}
