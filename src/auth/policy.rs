use crate::{auth::repo_types::User, error::ApiError};

/// Capabilities a route can require of its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Valid access token for an existing, active account.
    IsAuthenticated,
    /// `IsAuthenticated` plus a live `admin` role.
    IsAdminRole,
}

impl Capability {
    /// `caller` is the record resolved from the token, or `None` if there was none.
    pub fn check(self, caller: Option<&User>) -> Result<(), ApiError> {
        let Some(user) = caller.filter(|u| u.is_active) else {
            return Err(ApiError::Unauthorized(
                "Authentication credentials were not provided or are invalid.".into(),
            ));
        };
        match self {
            Capability::IsAuthenticated => Ok(()),
            Capability::IsAdminRole if user.is_admin() => Ok(()),
            Capability::IsAdminRole => Err(ApiError::Forbidden("Admin access required.".into())),
        }
    }
}
