use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{require_text, StockroomError};

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub lastname: String,
    /// National identity number; unique per user.
    pub dni: String,
    pub username: String,
    pub role_id: i64,
    pub role_name: String,
    pub status_id: i64,
    pub status_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatus {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub name: String,
    pub lastname: String,
    pub dni: String,
    pub username: String,
    pub password: String,
    pub role_id: i64,
    pub status_id: i64,
}

impl CreateUser {
    pub fn validate(&self) -> Result<(), StockroomError> {
        require_text("name", &self.name)?;
        require_text("lastname", &self.lastname)?;
        require_text("dni", &self.dni)?;
        validate_username(&self.username)?;
        validate_password(&self.password)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    pub name: Option<String>,
    pub lastname: Option<String>,
    pub dni: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub role_id: Option<i64>,
    pub status_id: Option<i64>,
}

impl UpdateUser {
    pub fn validate(&self) -> Result<(), StockroomError> {
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        if let Some(lastname) = &self.lastname {
            require_text("lastname", lastname)?;
        }
        if let Some(dni) = &self.dni {
            require_text("dni", dni)?;
        }
        if let Some(username) = &self.username {
            validate_username(username)?;
        }
        if let Some(password) = &self.password {
            validate_password(password)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPassword {
    pub dni: String,
    pub password: String,
}

impl ResetPassword {
    pub fn validate(&self) -> Result<(), StockroomError> {
        require_text("dni", &self.dni)?;
        validate_password(&self.password)
    }
}

/// A user row together with its stored password hash. Never serialized.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

fn validate_username(username: &str) -> Result<(), StockroomError> {
    require_text("username", username)?;
    if username.chars().any(char::is_whitespace) {
        return Err(StockroomError::InvalidInput(
            "username must not contain blanks".into(),
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), StockroomError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(StockroomError::InvalidInput(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if password.chars().any(char::is_whitespace) {
        return Err(StockroomError::InvalidInput(
            "password must not contain blanks".into(),
        ));
    }
    Ok(())
}
