use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{require_text, StockroomError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategory {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl CreateCategory {
    pub fn validate(&self) -> Result<(), StockroomError> {
        require_text("name", &self.name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategory {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl UpdateCategory {
    pub fn validate(&self) -> Result<(), StockroomError> {
        match &self.name {
            Some(name) => require_text("name", name),
            None => Ok(()),
        }
    }
}
