use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{require_text, StockroomError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: i64,
    pub code: String,
    pub date: NaiveDate,
    pub observation: String,
    pub provider_id: i64,
    /// Joined from `providers.name` on read.
    pub provider_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoice {
    pub code: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub observation: String,
    pub provider_id: i64,
}

impl CreateInvoice {
    pub fn validate(&self) -> Result<(), StockroomError> {
        require_text("code", &self.code)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvoice {
    pub code: Option<String>,
    pub date: Option<NaiveDate>,
    pub observation: Option<String>,
    pub provider_id: Option<i64>,
}

impl UpdateInvoice {
    pub fn validate(&self) -> Result<(), StockroomError> {
        match &self.code {
            Some(code) => require_text("code", code),
            None => Ok(()),
        }
    }
}
