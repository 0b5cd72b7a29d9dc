use std::{fmt, str::FromStr};

use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(StoreError::InvalidRole(other.to_string())),
        }
    }
}

/// User record.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string
    pub full_name: String,
    pub role: Role,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub last_login: Option<OffsetDateTime>,
    pub date_joined: OffsetDateTime,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Row as stored in `users`; `role` is plain text there.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub last_login: Option<OffsetDateTime>,
    pub date_joined: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            email: r.email,
            password_hash: r.password_hash,
            full_name: r.full_name,
            role: r.role.parse()?,
            is_active: r.is_active,
            is_staff: r.is_staff,
            is_superuser: r.is_superuser,
            last_login: r.last_login,
            date_joined: r.date_joined,
        })
    }
}

/// Values for a record about to be inserted. Email must already be normalized.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: Role,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl NewUser {
    pub fn regular(email: String, password_hash: String, full_name: String) -> Self {
        Self {
            email,
            password_hash,
            full_name,
            role: Role::User,
            is_staff: false,
            is_superuser: false,
        }
    }

    pub fn admin(email: String, password_hash: String, full_name: String) -> Self {
        Self {
            email,
            password_hash,
            full_name,
            role: Role::Admin,
            is_staff: true,
            is_superuser: true,
        }
    }

    /// Builds the full record, assigning a fresh random id and join time.
    pub fn into_user(self, now: OffsetDateTime) -> User {
        User {
            id: Uuid::new_v4(),
            email: self.email,
            password_hash: self.password_hash,
            full_name: self.full_name,
            role: self.role,
            is_active: true,
            is_staff: self.is_staff,
            is_superuser: self.is_superuser,
            last_login: None,
            date_joined: now,
        }
    }
}

/// Self-service profile changes; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub email: Option<String>,
    pub full_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_and_displays() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert!("root".parse::<Role>().is_err());
        assert_eq!(Role::Admin.to_string(), "admin");
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn new_user_gets_canonical_uuid() {
        let a = NewUser::regular("a@x.io".into(), "h".into(), "A".into())
            .into_user(OffsetDateTime::now_utc());
        let b = NewUser::regular("b@x.io".into(), "h".into(), "B".into())
            .into_user(OffsetDateTime::now_utc());
        let rendered = a.id.to_string();
        assert_eq!(rendered.len(), 36);
        assert_eq!(rendered.matches('-').count(), 4);
        assert_ne!(a.id, b.id);
        assert!(a.is_active);
        assert_eq!(a.role, Role::User);
    }

    #[test]
    fn admin_template_sets_privileges() {
        let u = NewUser::admin("root@x.io".into(), "h".into(), "Root".into())
            .into_user(OffsetDateTime::now_utc());
        assert!(u.is_admin());
        assert!(u.is_staff && u.is_superuser);
    }

    #[test]
    fn password_hash_never_serialized() {
        let u = NewUser::regular("a@x.io".into(), "secret-hash".into(), "A".into())
            .into_user(OffsetDateTime::now_utc());
        let json = serde_json::to_string(&u).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("\"role\":\"user\""));
    }
}
