use std::sync::Arc;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{
            ChangePasswordRequest, DetailResponse, LoginRequest, LoginResponse, Page,
            ProfileUpdateRequest, RefreshRequest, RefreshResponse, RegisterRequest,
            RegisterResponse, UserListItem, UserResponse,
        },
        jwt::{JwtKeys, TokenPair},
        password::{hash_password, password_problems, verify_against_dummy, verify_password},
        repo::UserStore,
        repo_types::{NewUser, ProfileChanges, User},
    },
    error::{ApiError, ApiResult, FieldError},
    state::AppState,
};

pub const PAGE_SIZE: i64 = 10;
pub const MAX_FULL_NAME_LEN: usize = 255;

const REQUIRED: &str = "This field is required.";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_email(raw: &str, errors: &mut Vec<FieldError>) -> String {
    let email = normalize_email(raw);
    if !is_valid_email(&email) {
        errors.push(FieldError::new("email", "Enter a valid email address."));
    }
    email
}

fn check_full_name(raw: &str, errors: &mut Vec<FieldError>) -> String {
    let name = raw.trim().to_string();
    if name.is_empty() {
        errors.push(FieldError::new("full_name", "This field may not be blank."));
    } else if name.chars().count() > MAX_FULL_NAME_LEN {
        errors.push(FieldError::new(
            "full_name",
            format!("Ensure this field has no more than {MAX_FULL_NAME_LEN} characters."),
        ));
    }
    name
}

fn check_password(field: &str, plain: &str, errors: &mut Vec<FieldError>) {
    errors.extend(
        password_problems(plain)
            .into_iter()
            .map(|msg| FieldError::new(field, msg)),
    );
}

fn internal(e: anyhow::Error) -> ApiError {
    ApiError::Internal(e.to_string())
}

/// Registration, login and account management on top of a `UserStore`.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn UserStore>,
    keys: JwtKeys,
}

impl FromRef<AppState> for AccountService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.store.clone(), state.keys.clone())
    }
}

impl AccountService {
    pub fn new(store: Arc<dyn UserStore>, keys: JwtKeys) -> Self {
        Self { store, keys }
    }

    fn issue_pair(&self, user_id: Uuid) -> ApiResult<TokenPair> {
        self.keys.issue_pair(user_id).map_err(|e| {
            error!(error = %e, %user_id, "jwt sign failed");
            internal(e)
        })
    }

    /// Creates a regular account and logs it in.
    pub async fn register(&self, req: RegisterRequest) -> ApiResult<RegisterResponse> {
        let mut errors = Vec::new();
        let email = match req.email.as_deref() {
            Some(raw) => check_email(raw, &mut errors),
            None => {
                errors.push(FieldError::new("email", REQUIRED));
                String::new()
            }
        };
        match req.password.as_deref() {
            Some(plain) => check_password("password", plain, &mut errors),
            None => errors.push(FieldError::new("password", REQUIRED)),
        }
        let full_name = match req.full_name.as_deref() {
            Some(raw) => check_full_name(raw, &mut errors),
            None => {
                errors.push(FieldError::new("full_name", REQUIRED));
                String::new()
            }
        };
        if !errors.is_empty() {
            warn!(fields = ?errors.iter().map(|e| e.field.as_str()).collect::<Vec<_>>(), "registration rejected");
            return Err(ApiError::Validation(errors));
        }

        let password = req.password.unwrap_or_default();
        let hash = hash_password(&password).map_err(internal)?;
        let user = self
            .store
            .insert(NewUser::regular(email, hash, full_name))
            .await
            .map_err(|e| {
                warn!(error = %e, "create user failed");
                ApiError::from(e)
            })?;

        let tokens = self.issue_pair(user.id)?;
        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(RegisterResponse {
            user: user.into(),
            tokens,
        })
    }

    /// Unknown email, inactive account and wrong password all yield the same error.
    pub async fn login(&self, req: LoginRequest) -> ApiResult<LoginResponse> {
        let email = normalize_email(&req.email);

        let Some(user) = self.store.find_by_email(&email).await? else {
            verify_against_dummy(&req.password);
            warn!(email = %email, "login unknown email");
            return Err(ApiError::invalid_credentials());
        };

        let ok = verify_password(&req.password, &user.password_hash).map_err(|e| {
            error!(error = %e, user_id = %user.id, "verify_password failed");
            internal(e)
        })?;
        if !ok {
            warn!(user_id = %user.id, "login invalid password");
            return Err(ApiError::invalid_credentials());
        }
        if !user.is_active {
            warn!(user_id = %user.id, "login for inactive account");
            return Err(ApiError::invalid_credentials());
        }

        self.store
            .record_login(user.id, OffsetDateTime::now_utc())
            .await?;
        let TokenPair { access, refresh } = self.issue_pair(user.id)?;

        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok(LoginResponse {
            access,
            refresh,
            user: user.into(),
        })
    }

    /// New access token from a refresh token. Pure token check, the refresh token is not rotated.
    pub fn refresh(&self, req: RefreshRequest) -> ApiResult<RefreshResponse> {
        let claims = self.keys.verify_refresh(&req.refresh).map_err(|e| {
            warn!(error = %e, "refresh rejected");
            ApiError::Unauthorized("Token is invalid or expired".into())
        })?;
        let access = self.keys.sign_access(claims.sub).map_err(internal)?;
        Ok(RefreshResponse { access })
    }

    /// `partial == false` (PUT) requires every editable field.
    pub async fn update_profile(
        &self,
        caller: &User,
        req: ProfileUpdateRequest,
        partial: bool,
    ) -> ApiResult<UserResponse> {
        let mut errors = Vec::new();
        if !partial {
            if req.email.is_none() {
                errors.push(FieldError::new("email", REQUIRED));
            }
            if req.full_name.is_none() {
                errors.push(FieldError::new("full_name", REQUIRED));
            }
        }
        let changes = ProfileChanges {
            email: req.email.as_deref().map(|e| check_email(e, &mut errors)),
            full_name: req.full_name.as_deref().map(|n| check_full_name(n, &mut errors)),
        };
        if !errors.is_empty() {
            return Err(ApiError::Validation(errors));
        }

        let user = self.store.update_profile(caller.id, changes).await?;
        info!(user_id = %user.id, "profile updated");
        Ok(user.into())
    }

    pub async fn change_password(
        &self,
        caller: &User,
        req: ChangePasswordRequest,
    ) -> ApiResult<DetailResponse> {
        let ok = verify_password(&req.old_password, &caller.password_hash).map_err(internal)?;
        if !ok {
            warn!(user_id = %caller.id, "change password with wrong current password");
            return Err(ApiError::WrongPassword);
        }

        let mut errors = Vec::new();
        check_password("new_password", &req.new_password, &mut errors);
        if !errors.is_empty() {
            return Err(ApiError::Validation(errors));
        }

        let hash = hash_password(&req.new_password).map_err(internal)?;
        self.store.set_password_hash(caller.id, &hash).await?;
        info!(user_id = %caller.id, "password changed");
        Ok(DetailResponse {
            detail: "Password changed successfully.".into(),
        })
    }

    /// Newest accounts first, `PAGE_SIZE` per page, pages numbered from 1.
    pub async fn list_users(&self, page: Option<i64>) -> ApiResult<Page<UserListItem>> {
        let invalid_page = || ApiError::NotFound("Invalid page.".into());
        let page = page.unwrap_or(1);
        if page < 1 {
            return Err(invalid_page());
        }
        let offset = (page - 1).checked_mul(PAGE_SIZE).ok_or_else(invalid_page)?;
        let (users, count) = self.store.list_page(PAGE_SIZE, offset).await?;

        let last_page = ((count + PAGE_SIZE - 1) / PAGE_SIZE).max(1);
        if page > last_page {
            return Err(invalid_page());
        }

        Ok(Page {
            count,
            next: (page < last_page).then_some(page + 1),
            previous: (page > 1).then_some(page - 1),
            results: users.into_iter().map(UserListItem::from).collect(),
        })
    }

    /// Ban or unban another account. Targeting oneself is refused before anything is read or written.
    pub async fn set_user_status(
        &self,
        caller: &User,
        target: Uuid,
        is_active: bool,
    ) -> ApiResult<UserListItem> {
        if target == caller.id {
            warn!(user_id = %caller.id, "admin attempted to change own status");
            return Err(ApiError::InvalidOperation(
                "Cannot modify your own status.".into(),
            ));
        }

        let user = self.store.set_active(target, is_active).await?;
        info!(admin_id = %caller.id, user_id = %user.id, is_active, "user status changed");
        Ok(user.into())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::auth::memory::MemoryUserStore;
    use crate::auth::repo_types::Role;
    use crate::config::JwtConfig;

    fn service() -> (AccountService, Arc<MemoryUserStore>) {
        let store = Arc::new(MemoryUserStore::new());
        let keys = JwtKeys::from_config(&JwtConfig {
            secret: "svc-secret".into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            ttl_minutes: 30,
            refresh_ttl_minutes: 60 * 24,
        });
        (AccountService::new(store.clone(), keys), store)
    }

    fn register_req(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: Some(email.into()),
            password: Some(password.into()),
            full_name: Some("Test User".into()),
        }
    }

    async fn admin(store: &MemoryUserStore) -> User {
        store
            .insert(NewUser::admin(
                "admin@example.com".into(),
                hash_password("AdminPass123").unwrap(),
                "Admin User".into(),
            ))
            .await
            .unwrap()
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("test@example.com"));
        assert!(!is_valid_email("test@example"));
        assert!(!is_valid_email("no at sign.com"));
        assert_eq!(normalize_email("  Test@Example.COM "), "test@example.com");
    }

    #[tokio::test]
    async fn register_stores_hash_and_issues_tokens() {
        let (svc, store) = service();
        let res = svc
            .register(register_req("Test@Example.com", "TestPass123"))
            .await
            .unwrap();
        assert_eq!(res.user.email, "test@example.com");
        assert_eq!(res.user.role, Role::User);
        assert!(res.user.is_active);

        let stored = store.find_by_email("test@example.com").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "TestPass123");
        assert!(verify_password("TestPass123", &stored.password_hash).unwrap());

        let claims = svc.keys.verify_access(&res.tokens.access).unwrap();
        assert_eq!(claims.sub, stored.id);
        svc.keys.verify_refresh(&res.tokens.refresh).unwrap();
    }

    #[tokio::test]
    async fn register_rejects_password_without_digit() {
        let (svc, store) = service();
        let err = svc
            .register(register_req("weak@example.com", "NoNumbersHere"))
            .await
            .unwrap_err();
        match err {
            ApiError::Validation(fields) => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].field, "password");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn register_reports_every_bad_field() {
        let (svc, _) = service();
        let err = svc
            .register(RegisterRequest {
                email: Some("nope".into()),
                password: Some("short".into()),
                full_name: None,
            })
            .await
            .unwrap_err();
        let ApiError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
        assert!(names.contains(&"email"));
        assert!(names.contains(&"password"));
        assert!(names.contains(&"full_name"));
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let (svc, store) = service();
        svc.register(register_req("dup@example.com", "TestPass123"))
            .await
            .unwrap();
        let err = svc
            .register(register_req("DUP@example.com", "OtherPass456"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn login_updates_last_login_and_embeds_role() {
        let (svc, store) = service();
        svc.register(register_req("test@example.com", "TestPass123"))
            .await
            .unwrap();
        let res = svc
            .login(LoginRequest {
                email: "TEST@example.com".into(),
                password: "TestPass123".into(),
            })
            .await
            .unwrap();
        assert_eq!(res.user.role, Role::User);
        let stored = store.find_by_email("test@example.com").await.unwrap().unwrap();
        assert!(stored.last_login.is_some());
        assert_eq!(svc.keys.verify_access(&res.access).unwrap().sub, stored.id);
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let (svc, store) = service();
        let user = svc
            .register(register_req("test@example.com", "TestPass123"))
            .await
            .unwrap()
            .user;

        let wrong = svc
            .login(LoginRequest {
                email: "test@example.com".into(),
                password: "WrongPassword123".into(),
            })
            .await
            .unwrap_err();
        let unknown = svc
            .login(LoginRequest {
                email: "ghost@example.com".into(),
                password: "TestPass123".into(),
            })
            .await
            .unwrap_err();
        store.set_active(user.id, false).await.unwrap();
        let banned = svc
            .login(LoginRequest {
                email: "test@example.com".into(),
                password: "TestPass123".into(),
            })
            .await
            .unwrap_err();

        assert_eq!(wrong.to_string(), unknown.to_string());
        assert_eq!(wrong.to_string(), banned.to_string());
        assert!(matches!(wrong, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn unknown_email_login_costs_a_hash_verification() {
        let (svc, _) = service();
        svc.register(register_req("test@example.com", "TestPass123"))
            .await
            .unwrap();
        let attempt = |email: &str| LoginRequest {
            email: email.into(),
            password: "WrongPassword123".into(),
        };
        // First call also computes the throwaway hash.
        svc.login(attempt("ghost@example.com")).await.unwrap_err();

        let started = Instant::now();
        svc.login(attempt("test@example.com")).await.unwrap_err();
        let known = started.elapsed();

        let started = Instant::now();
        svc.login(attempt("ghost@example.com")).await.unwrap_err();
        let unknown = started.elapsed();

        assert!(
            unknown * 4 >= known,
            "unknown email took {unknown:?}, known email took {known:?}"
        );
    }

    #[tokio::test]
    async fn refresh_issues_access_and_keeps_refresh_usable() {
        let (svc, _) = service();
        let res = svc
            .register(register_req("test@example.com", "TestPass123"))
            .await
            .unwrap();
        let first = svc
            .refresh(RefreshRequest {
                refresh: res.tokens.refresh.clone(),
            })
            .unwrap();
        let second = svc
            .refresh(RefreshRequest {
                refresh: res.tokens.refresh,
            })
            .unwrap();
        assert_eq!(
            svc.keys.verify_access(&first.access).unwrap().sub,
            svc.keys.verify_access(&second.access).unwrap().sub
        );

        let err = svc
            .refresh(RefreshRequest {
                refresh: res.tokens.access,
            })
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn profile_update_keeps_read_only_fields() {
        let (svc, store) = service();
        let id = svc
            .register(register_req("test@example.com", "TestPass123"))
            .await
            .unwrap()
            .user
            .id;
        let caller = store.find_by_id(id).await.unwrap().unwrap();
        let updated = svc
            .update_profile(
                &caller,
                ProfileUpdateRequest {
                    email: None,
                    full_name: Some("Updated Name".into()),
                },
                true,
            )
            .await
            .unwrap();
        assert_eq!(updated.full_name, "Updated Name");
        assert_eq!(updated.email, "test@example.com");
        assert_eq!(updated.role, Role::User);
        assert_eq!(updated.date_joined, caller.date_joined);
    }

    #[tokio::test]
    async fn full_profile_update_requires_all_fields() {
        let (svc, store) = service();
        let caller = admin(&store).await;
        let err = svc
            .update_profile(
                &caller,
                ProfileUpdateRequest {
                    email: None,
                    full_name: Some("Only Name".into()),
                },
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref f) if f[0].field == "email"));
    }

    #[tokio::test]
    async fn profile_email_change_to_taken_address_conflicts() {
        let (svc, store) = service();
        let caller = admin(&store).await;
        svc.register(register_req("taken@example.com", "TestPass123"))
            .await
            .unwrap();
        let err = svc
            .update_profile(
                &caller,
                ProfileUpdateRequest {
                    email: Some("Taken@Example.com".into()),
                    full_name: None,
                },
                true,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn change_password_requires_current_password() {
        let (svc, store) = service();
        let caller = admin(&store).await;

        let err = svc
            .change_password(
                &caller,
                ChangePasswordRequest {
                    old_password: "nope12345".into(),
                    new_password: "NewPass456".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::WrongPassword));

        let err = svc
            .change_password(
                &caller,
                ChangePasswordRequest {
                    old_password: "AdminPass123".into(),
                    new_password: "weakweak".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        svc.change_password(
            &caller,
            ChangePasswordRequest {
                old_password: "AdminPass123".into(),
                new_password: "NewPass456".into(),
            },
        )
        .await
        .unwrap();
        let stored = store.find_by_id(caller.id).await.unwrap().unwrap();
        assert!(verify_password("NewPass456", &stored.password_hash).unwrap());
        assert!(!verify_password("AdminPass123", &stored.password_hash).unwrap());
    }

    #[tokio::test]
    async fn listing_paginates_by_ten() {
        let (svc, store) = service();
        admin(&store).await;
        for i in 0..15 {
            store
                .insert(NewUser::regular(
                    format!("user{i}@example.com"),
                    "h".into(),
                    format!("User {i}"),
                ))
                .await
                .unwrap();
        }

        let first = svc.list_users(None).await.unwrap();
        assert_eq!(first.count, 16);
        assert_eq!(first.results.len(), 10);
        assert_eq!(first.next, Some(2));
        assert_eq!(first.previous, None);

        let second = svc.list_users(Some(2)).await.unwrap();
        assert_eq!(second.results.len(), 6);
        assert_eq!(second.next, None);
        assert_eq!(second.previous, Some(1));

        assert!(matches!(svc.list_users(Some(3)).await, Err(ApiError::NotFound(_))));
        assert!(matches!(svc.list_users(Some(0)).await, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn huge_page_number_is_not_found() {
        let (svc, store) = service();
        admin(&store).await;
        for page in [i64::MAX, i64::MAX / PAGE_SIZE + 2, 1_000_000] {
            let res = svc.list_users(Some(page)).await;
            assert!(matches!(res, Err(ApiError::NotFound(_))), "page {page}");
        }
    }

    #[tokio::test]
    async fn empty_listing_first_page_is_valid() {
        let (svc, _) = service();
        let page = svc.list_users(Some(1)).await.unwrap();
        assert_eq!(page.count, 0);
        assert!(page.results.is_empty());
        assert_eq!(page.next, None);
    }

    #[tokio::test]
    async fn admin_cannot_change_own_status_either_way() {
        let (svc, store) = service();
        let me = admin(&store).await;
        for value in [false, true] {
            let err = svc.set_user_status(&me, me.id, value).await.unwrap_err();
            assert!(matches!(err, ApiError::InvalidOperation(ref m) if m.contains("Cannot modify your own status")));
        }
        assert!(store.find_by_id(me.id).await.unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn ban_then_unban_persists() {
        let (svc, store) = service();
        let me = admin(&store).await;
        let target = svc
            .register(register_req("test@example.com", "TestPass123"))
            .await
            .unwrap()
            .user
            .id;

        let banned = svc.set_user_status(&me, target, false).await.unwrap();
        assert!(!banned.is_active);
        assert!(!store.find_by_id(target).await.unwrap().unwrap().is_active);

        svc.set_user_status(&me, target, true).await.unwrap();
        assert!(store.find_by_id(target).await.unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn status_change_for_unknown_user_is_not_found() {
        let (svc, store) = service();
        let me = admin(&store).await;
        let err = svc
            .set_user_status(&me, Uuid::new_v4(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
