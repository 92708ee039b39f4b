use super::booking::PaymentMethod;
use crate::error::TravelError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = TravelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(TravelError::ValidationError("Invalid role".to_string())),
        }
    }
}

/// A registered traveller or administrator.
///
/// Credentials live behind the external credential service and are never
/// part of this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub default_payment_method: Option<PaymentMethod>,
    pub default_payment_label: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        name: &str,
        email: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<Self, TravelError> {
        let name = name.trim();
        let email = email.trim().to_lowercase();
        if name.chars().count() < 3 {
            return Err(TravelError::ValidationError(
                "name must be at least 3 characters".to_string(),
            ));
        }
        if !is_valid_email(&email) {
            return Err(TravelError::ValidationError(
                "a valid email is required".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email,
            role,
            default_payment_method: None,
            default_payment_label: None,
            created_at: now,
        })
    }
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !local.is_empty()
        && !host.is_empty()
        && tld.len() >= 2
        && !email.chars().any(char::is_whitespace)
        && !domain.contains('@')
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPreference {
    pub default_payment_method: Option<PaymentMethod>,
    pub default_payment_label: Option<String>,
}

/// The authenticated caller of an operation, as asserted by the credential
/// service in front of the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: Role::User,
        }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Audit identity in the `ROLE:Name (id)` format.
    pub fn performed_by(&self, user: Option<&User>) -> String {
        performed_by(self.role, user, self.user_id)
    }
}

pub fn performed_by(role: Role, user: Option<&User>, user_id: Uuid) -> String {
    let name = user.map(|u| u.name.as_str()).unwrap_or("Unknown");
    format!("{}:{} ({})", role, name, user_id)
}
