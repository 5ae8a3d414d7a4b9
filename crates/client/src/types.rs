//! Request and response types for the users API

use crate::error::ClientError;
use serde::{Deserialize, Serialize};

/// Minimum password length accepted by the users API
pub const MIN_PASSWORD_LEN: usize = 8;

/// Registration payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Login payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Password change payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub password: String,
}

/// Body returned by login and token refresh.
///
/// Older backends name the field `token`, current ones `access_token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(alias = "token")]
    pub access_token: String,
}

/// Public profile returned after registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ClientError> {
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        if self.first_name.is_empty() || self.last_name.is_empty() {
            return Err(ClientError::Validation(
                "Name fields must be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), ClientError> {
        validate_email(&self.email)
    }
}

impl ChangePasswordRequest {
    pub fn validate(&self) -> Result<(), ClientError> {
        validate_password(&self.password)
    }
}

/// Structural email check: one `@`, non-empty local part, dotted domain
fn validate_email(email: &str) -> Result<(), ClientError> {
    let invalid = || ClientError::Validation("Invalid email address".to_string());

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(invalid());
    }

    Ok(())
}

fn validate_password(password: &str) -> Result<(), ClientError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ClientError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(())
}
