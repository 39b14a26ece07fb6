//! Enrolled users

use std::fmt;

use crate::error::{Error, Result};

/// Access level of an enrolled user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Privilege {
    #[default]
    Normal,
    Admin,
}

impl Privilege {
    pub fn code(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Admin => 1,
        }
    }
}

impl TryFrom<u8> for Privilege {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Admin),
            other => Err(Error::Validation(format!(
                "privilege must be 0 (user) or 1 (admin), got {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("user"),
            Self::Admin => f.write_str("admin"),
        }
    }
}

/// A user enrolled on a terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: String,
    pub name: String,
    pub privilege: Privilege,
}

impl UserRecord {
    /// Create a user record, rejecting an empty identifier
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        privilege: Privilege,
    ) -> Result<Self> {
        let user_id = user_id.into().trim().to_string();
        if user_id.is_empty() {
            return Err(Error::Validation("user id cannot be empty".into()));
        }
        Ok(Self {
            user_id,
            name: name.into().trim().to_string(),
            privilege,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privilege_codes() {
        assert_eq!(Privilege::try_from(0).unwrap(), Privilege::Normal);
        assert_eq!(Privilege::try_from(1).unwrap(), Privilege::Admin);
        assert!(Privilege::try_from(14).is_err());
        assert_eq!(Privilege::Admin.code(), 1);
    }

    #[test]
    fn test_user_record_trims() {
        let user = UserRecord::new(" 1042 ", " Mona Adel ", Privilege::Normal).unwrap();
        assert_eq!(user.user_id, "1042");
        assert_eq!(user.name, "Mona Adel");
        assert!(UserRecord::new("   ", "x", Privilege::Normal).is_err());
    }
}
