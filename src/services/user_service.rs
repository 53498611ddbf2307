use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::profile_pic::{decode_data_url, is_data_url, DecodedImage, ProfilePicStore};
use crate::auth::validators::{self, MAX_ADDRESS_LENGTH, MAX_CONTACT_NUMBER_LENGTH, MAX_NAME_LENGTH};
use crate::auth::{password, AuthError, IssuedToken, JwtService};
use crate::config::AppConfig;
use crate::database::models::{NewUser, User, UserChanges, UserMinimal, UserResponse};
use crate::database::{RepositoryError, UserRepository};
use crate::error::ApiError;
use crate::policy::{self, DashboardScope, Role, RoleFilter};

pub type ServiceResult<T> = Result<T, ApiError>;

/// Account payload for signup and the admin creation routes. Signup ignores
/// `role` and `is_active`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserCreate {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub contact_number: Option<String>,
    pub address: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub profile_pic: Option<String>,
    pub role: Option<String>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Self-service update. Carries no activation or role fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub contact_number: Option<String>,
    pub address: Option<String>,
    pub profile_pic: Option<String>,
}

/// Update performed by an admin or super_admin on a user record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub contact_number: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
    pub profile_pic: Option<String>,
}

impl From<ProfileUpdate> for UserUpdate {
    fn from(update: ProfileUpdate) -> Self {
        Self {
            email: update.email,
            first_name: update.first_name,
            last_name: update.last_name,
            contact_number: update.contact_number,
            address: update.address,
            is_active: None,
            profile_pic: update.profile_pic,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleUpdateRequest {
    pub new_role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordResetRequest {
    pub new_password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Activate,
    Deactivate,
}

impl fmt::Display for BulkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BulkAction::Activate => f.write_str("activate"),
            BulkAction::Deactivate => f.write_str("deactivate"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkUserAction {
    pub user_ids: Vec<i64>,
    pub action: BulkAction,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Dashboard {
    pub total_users: i64,
    pub active_users: i64,
    pub inactive_users: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_admins: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_standard_users: Option<i64>,
    pub user_type: &'static str,
}

/// Picture value supplied in a create/update payload.
enum PictureInput {
    Keep,
    Verbatim(String),
    Upload(DecodedImage),
}

impl PictureInput {
    fn parse(value: Option<String>) -> ServiceResult<Self> {
        match value {
            None => Ok(PictureInput::Keep),
            Some(v) if is_data_url(&v) => Ok(PictureInput::Upload(decode_data_url(&v)?)),
            Some(v) => Ok(PictureInput::Verbatim(v)),
        }
    }
}

/// All account operations. Authorization decisions come from `policy`;
/// this type loads the records and applies the outcome.
#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
    jwt: JwtService,
    bcrypt_cost: u32,
    pictures: ProfilePicStore,
}

impl UserService {
    pub fn new(
        repo: Arc<dyn UserRepository>,
        jwt: JwtService,
        bcrypt_cost: u32,
        pictures: ProfilePicStore,
    ) -> Self {
        Self {
            repo,
            jwt,
            bcrypt_cost,
            pictures,
        }
    }

    pub fn from_config(repo: Arc<dyn UserRepository>, config: &AppConfig) -> Self {
        Self::new(
            repo,
            JwtService::from_config(config),
            config.security.bcrypt_cost,
            ProfilePicStore::new(&config.storage.profile_pic_dir),
        )
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    pub fn repository(&self) -> &Arc<dyn UserRepository> {
        &self.repo
    }

    pub async fn ping(&self) -> Result<(), RepositoryError> {
        self.repo.ping().await
    }

    pub async fn signup(&self, req: UserCreate) -> ServiceResult<UserResponse> {
        let email = self.check_new_account(&req).await?;
        let user = self
            .insert_account(email, req, Role::StandardUser, true)
            .await?;
        info!("User {} signed up as {}", user.email, user.role);
        Ok(user.into())
    }

    pub async fn login(&self, req: LoginRequest) -> ServiceResult<IssuedToken> {
        let email = validators::normalize_email(&req.email);

        let user = match self.repo.find_by_email(&email).await? {
            Some(user) => user,
            None => {
                warn!("Login failed: unknown email {}", email);
                return Err(ApiError::unauthorized("Invalid credentials"));
            }
        };

        if !self.verify(&req.password, &user.password_hash).await? {
            warn!("Login failed: wrong password for {}", email);
            return Err(ApiError::unauthorized("Invalid credentials"));
        }

        if !user.is_active {
            warn!("Login refused: account {} is deactivated", email);
            return Err(ApiError::unauthorized("User account is deactivated"));
        }

        let token = self.jwt.issue(user.id, &user.email, user.role)?;
        info!("User {} authenticated", user.email);
        Ok(token)
    }

    pub async fn email_available(&self, email: &str) -> ServiceResult<bool> {
        let email = validators::normalize_email(email);
        if email.is_empty() {
            return Ok(false);
        }
        Ok(self.repo.find_by_email(&email).await?.is_none())
    }

    pub fn profile(&self, user: &User) -> UserResponse {
        UserResponse::from(user)
    }

    pub async fn update_profile(
        &self,
        user: &User,
        update: ProfileUpdate,
    ) -> ServiceResult<UserResponse> {
        let updated = self.apply_update(user, update.into()).await?;
        info!("User {} updated their profile", updated.email);
        Ok(updated.into())
    }

    pub async fn upload_profile_pic(
        &self,
        user: &User,
        content_type: Option<&str>,
        filename: Option<&str>,
        bytes: &[u8],
    ) -> ServiceResult<UserResponse> {
        if !content_type.map_or(false, |ct| ct.starts_with("image/")) {
            return Err(ApiError::bad_request("Invalid image file"));
        }

        let path = self
            .pictures
            .save_upload(filename.unwrap_or("upload"), bytes)
            .await?;
        let changes = UserChanges {
            profile_pic: Some(path.clone()),
            ..Default::default()
        };
        let updated = self.update_with_picture(user.id, changes, Some(&path)).await?;

        if let Some(old) = &user.profile_pic {
            self.pictures.delete(old).await;
        }
        info!("User {} uploaded a profile picture", updated.email);
        Ok(updated.into())
    }

    pub async fn search_users(
        &self,
        actor: &User,
        email_fragment: Option<&str>,
    ) -> ServiceResult<Vec<UserMinimal>> {
        let scope = policy::search_scope(&actor.actor());
        let users = self.repo.search(email_fragment, scope).await?;
        Ok(users.iter().map(UserMinimal::from).collect())
    }

    pub async fn create_user_by_admin(
        &self,
        actor: &User,
        req: UserCreate,
    ) -> ServiceResult<UserResponse> {
        let email = self.check_new_account(&req).await?;
        let role = match req.role.as_deref() {
            None => Role::StandardUser,
            Some(name) => name.parse::<Role>()?,
        };
        policy::can_create(&actor.actor(), role)?;

        let is_active = req.is_active;
        let user = self.insert_account(email, req, role, is_active).await?;
        info!("User {} created {} with role {}", actor.email, user.email, user.role);
        Ok(user.into())
    }

    pub async fn create_admin(&self, actor: &User, req: UserCreate) -> ServiceResult<UserResponse> {
        policy::require_any(actor.role, &[Role::SuperAdmin])?;
        let email = self.check_new_account(&req).await?;
        policy::can_create(&actor.actor(), Role::Admin)?;

        let is_active = req.is_active;
        let user = self.insert_account(email, req, Role::Admin, is_active).await?;
        info!("Super admin {} created admin {}", actor.email, user.email);
        Ok(user.into())
    }

    pub async fn update_user_by_admin(
        &self,
        actor: &User,
        user_id: i64,
        update: UserUpdate,
    ) -> ServiceResult<UserResponse> {
        let target = self.load(user_id).await?;
        policy::can_update(&actor.actor(), &target.target())?;
        policy::can_self_update(&actor.actor(), &target.target(), update.is_active)?;

        let updated = self.apply_update(&target, update).await?;
        info!("User {} updated user {}", actor.email, updated.email);
        Ok(updated.into())
    }

    pub async fn change_user_role(
        &self,
        actor: &User,
        user_id: i64,
        new_role: &str,
    ) -> ServiceResult<UserResponse> {
        policy::can_change_roles(&actor.actor())?;
        let target = self.load(user_id).await?;
        let new_role = new_role.parse::<Role>()?;
        policy::can_change_role(&actor.actor(), &target.target(), new_role)?;

        let updated = self.repo.set_role(target.id, new_role).await?;
        info!(
            "User {} changed role of {} from {} to {}",
            actor.email, updated.email, target.role, new_role
        );
        Ok(updated.into())
    }

    pub async fn deactivate_user(&self, actor: &User, user_id: i64) -> ServiceResult<UserResponse> {
        let target = self.load(user_id).await?;
        policy::can_deactivate(&actor.actor(), &target.target())?;

        let updated = self.repo.set_active(target.id, false).await?;
        info!("User {} deactivated user {}", actor.email, updated.email);
        Ok(updated.into())
    }

    pub async fn activate_user(&self, actor: &User, user_id: i64) -> ServiceResult<UserResponse> {
        let target = self.load(user_id).await?;
        policy::can_activate(&actor.actor(), &target.target())?;

        let updated = self.repo.set_active(target.id, true).await?;
        info!("User {} activated user {}", actor.email, updated.email);
        Ok(updated.into())
    }

    pub async fn reset_user_password(
        &self,
        actor: &User,
        user_id: i64,
        new_password: &str,
    ) -> ServiceResult<UserResponse> {
        let target = self.load(user_id).await?;
        validators::validate_password_strength(new_password)
            .map_err(|msg| ApiError::field("new_password", msg))?;
        policy::can_reset_password(&actor.actor(), &target.target())?;

        let hash = self.hash(new_password).await?;
        let updated = self.repo.set_password_hash(target.id, &hash).await?;
        info!("User {} reset the password of {}", actor.email, updated.email);
        Ok(updated.into())
    }

    /// Applies the action to each id in order. Failures are logged and skipped.
    pub async fn bulk_user_action(
        &self,
        actor: &User,
        req: BulkUserAction,
    ) -> ServiceResult<Vec<UserResponse>> {
        let mut results = Vec::with_capacity(req.user_ids.len());

        for user_id in req.user_ids {
            let outcome = match req.action {
                BulkAction::Activate => self.activate_user(actor, user_id).await,
                BulkAction::Deactivate => self.deactivate_user(actor, user_id).await,
            };
            match outcome {
                Ok(user) => results.push(user),
                Err(e) => warn!("Bulk {} skipped user {}: {}", req.action, user_id, e),
            }
        }

        Ok(results)
    }

    pub async fn users_by_role(
        &self,
        actor: &User,
        requested: RoleFilter,
    ) -> ServiceResult<Vec<UserResponse>> {
        let filter = policy::listing_scope(&actor.actor(), requested)?;
        let users = self.repo.list(filter).await?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    pub async fn dashboard(&self, actor: &User) -> ServiceResult<Dashboard> {
        match policy::dashboard_scope(&actor.actor())? {
            DashboardScope::StandardUsersOnly => {
                let standard = RoleFilter::Only(Role::StandardUser);
                let total_users = self.repo.count(standard, false).await?;
                let active_users = self.repo.count(standard, true).await?;
                Ok(Dashboard {
                    total_users,
                    active_users,
                    inactive_users: total_users - active_users,
                    total_admins: None,
                    total_standard_users: None,
                    user_type: "standard_users_only",
                })
            }
            DashboardScope::AllUsers => {
                let total_users = self.repo.count(RoleFilter::All, false).await?;
                let active_users = self.repo.count(RoleFilter::All, true).await?;
                let total_admins = self.repo.count(RoleFilter::Only(Role::Admin), false).await?;
                let total_standard_users = self
                    .repo
                    .count(RoleFilter::Only(Role::StandardUser), false)
                    .await?;
                Ok(Dashboard {
                    total_users,
                    active_users,
                    inactive_users: total_users - active_users,
                    total_admins: Some(total_admins),
                    total_standard_users: Some(total_standard_users),
                    user_type: "all_users",
                })
            }
        }
    }

    async fn load(&self, user_id: i64) -> ServiceResult<User> {
        self.repo
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    /// Field validation plus the duplicate check. Returns the normalized email.
    async fn check_new_account(&self, req: &UserCreate) -> ServiceResult<String> {
        let email = validators::normalize_email(&req.email);
        if !validators::validate_email(&email) {
            return Err(ApiError::field("email", "Invalid email format"));
        }
        validators::validate_password_strength(&req.password)
            .map_err(|msg| ApiError::field("password", msg))?;
        check_name("first_name", Some(&req.first_name))?;
        check_name("last_name", Some(&req.last_name))?;
        check_optional_fields(req.contact_number.as_deref(), req.address.as_deref())?;

        if self.repo.find_by_email(&email).await?.is_some() {
            return Err(ApiError::bad_request("Email already registered"));
        }
        Ok(email)
    }

    async fn insert_account(
        &self,
        email: String,
        req: UserCreate,
        role: Role,
        is_active: bool,
    ) -> ServiceResult<User> {
        let picture = PictureInput::parse(req.profile_pic)?;
        let password_hash = self.hash(&req.password).await?;

        let profile_pic = match &picture {
            PictureInput::Verbatim(v) => Some(v.clone()),
            _ => None,
        };
        let user = self
            .repo
            .insert(NewUser {
                first_name: req.first_name.trim().to_string(),
                last_name: req.last_name.trim().to_string(),
                email,
                password_hash,
                contact_number: req.contact_number,
                address: req.address,
                is_active,
                profile_pic,
                role,
            })
            .await?;

        match picture {
            PictureInput::Upload(image) => {
                let path = self.pictures.save_decoded(&image, user.id).await?;
                let changes = UserChanges {
                    profile_pic: Some(path.clone()),
                    ..Default::default()
                };
                self.update_with_picture(user.id, changes, Some(&path)).await
            }
            _ => Ok(user),
        }
    }

    /// Validates and applies a partial update to `target`.
    async fn apply_update(&self, target: &User, update: UserUpdate) -> ServiceResult<User> {
        let email = match update.email.as_deref() {
            Some(raw) => {
                let email = validators::normalize_email(raw);
                if !validators::validate_email(&email) {
                    return Err(ApiError::field("email", "Invalid email format"));
                }
                if let Some(other) = self.repo.find_by_email(&email).await? {
                    if other.id != target.id {
                        return Err(ApiError::bad_request("Email already registered"));
                    }
                }
                Some(email)
            }
            None => None,
        };
        check_name("first_name", update.first_name.as_deref())?;
        check_name("last_name", update.last_name.as_deref())?;
        check_optional_fields(update.contact_number.as_deref(), update.address.as_deref())?;

        let (profile_pic, written) = match PictureInput::parse(update.profile_pic)? {
            PictureInput::Keep => (None, None),
            PictureInput::Verbatim(v) => (Some(v), None),
            PictureInput::Upload(image) => {
                let path = self.pictures.save_decoded(&image, target.id).await?;
                (Some(path.clone()), Some(path))
            }
        };
        let replaces_picture = profile_pic.is_some() && profile_pic != target.profile_pic;

        let changes = UserChanges {
            email,
            first_name: update.first_name.map(|v| v.trim().to_string()),
            last_name: update.last_name.map(|v| v.trim().to_string()),
            contact_number: update.contact_number,
            address: update.address,
            is_active: update.is_active,
            profile_pic,
        };
        let updated = self
            .update_with_picture(target.id, changes, written.as_deref())
            .await?;

        if replaces_picture {
            if let Some(old) = &target.profile_pic {
                self.pictures.delete(old).await;
            }
        }
        Ok(updated)
    }

    /// Write `changes`. If that fails, the just-stored picture at `written`
    /// is removed again.
    async fn update_with_picture(
        &self,
        user_id: i64,
        changes: UserChanges,
        written: Option<&str>,
    ) -> ServiceResult<User> {
        match self.repo.update(user_id, changes).await {
            Ok(user) => Ok(user),
            Err(e) => {
                if let Some(path) = written {
                    warn!("Discarding picture {} after failed update of user {}", path, user_id);
                    self.pictures.delete(path).await;
                }
                Err(e.into())
            }
        }
    }

    async fn hash(&self, plain: &str) -> ServiceResult<String> {
        let plain = plain.to_string();
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || password::hash_password(&plain, cost))
            .await
            .map_err(|e| {
                error!("Password hashing task failed: {}", e);
                ApiError::from(AuthError::Hashing(e.to_string()))
            })?
            .map_err(ApiError::from)
    }

    async fn verify(&self, plain: &str, hash: &str) -> ServiceResult<bool> {
        let plain = plain.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || password::verify_password(&plain, &hash))
            .await
            .map_err(|e| {
                error!("Password verification task failed: {}", e);
                ApiError::from(AuthError::Hashing(e.to_string()))
            })
    }
}

fn check_name(field: &str, value: Option<&str>) -> ServiceResult<()> {
    let Some(value) = value.map(str::trim) else {
        return Ok(());
    };
    if value.is_empty() {
        return Err(ApiError::field(field, format!("{} must not be blank", field)));
    }
    if value.chars().count() > MAX_NAME_LENGTH {
        return Err(ApiError::field(
            field,
            format!("{} must be at most {} characters", field, MAX_NAME_LENGTH),
        ));
    }
    Ok(())
}

fn check_optional_fields(contact_number: Option<&str>, address: Option<&str>) -> ServiceResult<()> {
    if !validators::within_length(contact_number, MAX_CONTACT_NUMBER_LENGTH) {
        return Err(ApiError::field(
            "contact_number",
            format!("contact_number must be at most {} characters", MAX_CONTACT_NUMBER_LENGTH),
        ));
    }
    if !validators::within_length(address, MAX_ADDRESS_LENGTH) {
        return Err(ApiError::field(
            "address",
            format!("address must be at most {} characters", MAX_ADDRESS_LENGTH),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryUserRepository;
    use crate::policy::SearchScope;
    use crate::testing::{new_account, TestContext, TEST_PASSWORD};

    #[tokio::test]
    async fn signup_forces_standard_role_and_normalizes_email() {
        let ctx = TestContext::new();
        let mut req = new_account("  New.User@Example.COM ");
        req.role = Some("super_admin".to_string());
        req.is_active = false;

        let user = ctx.service.signup(req).await.unwrap();
        assert_eq!(user.email, "new.user@example.com");
        assert_eq!(user.role, Role::StandardUser);
        assert!(user.is_active);
    }

    #[tokio::test]
    async fn signup_rejects_duplicates_and_weak_passwords() {
        let ctx = TestContext::new();
        ctx.seed("taken@example.com", Role::StandardUser, true).await;

        let err = ctx.service.signup(new_account("TAKEN@example.com")).await.unwrap_err();
        assert_eq!(err.message(), "Email already registered");

        let mut weak = new_account("weak@example.com");
        weak.password = "password".to_string();
        let err = ctx.service.signup(weak).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.message(), "Password must contain at least one uppercase letter");
    }

    #[tokio::test]
    async fn signup_stores_data_url_picture() {
        let ctx = TestContext::new();
        let mut req = new_account("pic@example.com");
        req.profile_pic = Some("data:image/png;base64,aGVsbG8=".to_string());

        let user = ctx.service.signup(req).await.unwrap();
        let path = user.profile_pic.unwrap();
        assert!(path.starts_with(&format!("/static/profile_pics/profile_{}_", user.id)));

        let mut bad = new_account("badpic@example.com");
        bad.profile_pic = Some("data:image/png;base64,!!".to_string());
        let err = ctx.service.signup(bad).await.unwrap_err();
        assert_eq!(err.message(), "Invalid image data");
        assert!(ctx.service.email_available("badpic@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn login_checks_credentials_then_activity() {
        let ctx = TestContext::new();
        ctx.seed("active@example.com", Role::StandardUser, true).await;
        ctx.seed("off@example.com", Role::StandardUser, false).await;

        let token = ctx
            .service
            .login(LoginRequest {
                email: "Active@Example.com".into(),
                password: TEST_PASSWORD.into(),
            })
            .await
            .unwrap();
        assert_eq!(token.token_type, "bearer");
        let claims = ctx.service.jwt().validate(&token.access_token).unwrap();
        assert_eq!(claims.role.as_deref(), Some("standard_user"));

        let wrong = ctx
            .service
            .login(LoginRequest {
                email: "active@example.com".into(),
                password: "Wrong1234".into(),
            })
            .await
            .unwrap_err();
        assert_eq!((wrong.status_code(), wrong.message()), (401, "Invalid credentials"));

        let unknown = ctx
            .service
            .login(LoginRequest {
                email: "ghost@example.com".into(),
                password: TEST_PASSWORD.into(),
            })
            .await
            .unwrap_err();
        assert_eq!(unknown.message(), "Invalid credentials");

        let inactive = ctx
            .service
            .login(LoginRequest {
                email: "off@example.com".into(),
                password: TEST_PASSWORD.into(),
            })
            .await
            .unwrap_err();
        assert_eq!((inactive.status_code(), inactive.message()), (401, "User account is deactivated"));
    }

    #[tokio::test]
    async fn email_availability() {
        let ctx = TestContext::new();
        ctx.seed("used@example.com", Role::StandardUser, true).await;
        assert!(!ctx.service.email_available("USED@example.com").await.unwrap());
        assert!(ctx.service.email_available("free@example.com").await.unwrap());
        assert!(!ctx.service.email_available("   ").await.unwrap());
    }

    #[tokio::test]
    async fn profile_update_keeps_email_unique() {
        let ctx = TestContext::new();
        ctx.seed("first@example.com", Role::StandardUser, true).await;
        let me = ctx.seed("me@example.com", Role::StandardUser, true).await;

        let clash = ProfileUpdate {
            email: Some("first@example.com".into()),
            ..Default::default()
        };
        let err = ctx.service.update_profile(&me, clash).await.unwrap_err();
        assert_eq!(err.message(), "Email already registered");

        let same = ProfileUpdate {
            email: Some("ME@example.com".into()),
            address: Some("1 Main St".into()),
            ..Default::default()
        };
        let updated = ctx.service.update_profile(&me, same).await.unwrap();
        assert_eq!(updated.address.as_deref(), Some("1 Main St"));
        assert!(updated.is_active);
    }

    #[tokio::test]
    async fn upload_requires_image_content_type() {
        let ctx = TestContext::new();
        let me = ctx.seed("me@example.com", Role::StandardUser, true).await;

        let err = ctx
            .service
            .upload_profile_pic(&me, Some("text/plain"), Some("a.txt"), b"hi")
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Invalid image file");

        let updated = ctx
            .service
            .upload_profile_pic(&me, Some("image/png"), Some("face.png"), b"png")
            .await
            .unwrap();
        assert!(updated.profile_pic.unwrap().ends_with("_face.png"));
    }

    #[tokio::test]
    async fn admin_creation_respects_tiers() {
        let ctx = TestContext::new();
        let admin = ctx.seed("admin@example.com", Role::Admin, true).await;
        let root = ctx.seed("root@example.com", Role::SuperAdmin, true).await;

        let mut req = new_account("a1@example.com");
        req.role = Some("admin".into());
        let err = ctx.service.create_user_by_admin(&admin, req.clone()).await.unwrap_err();
        assert_eq!(err.status_code(), 403);

        let created = ctx.service.create_user_by_admin(&root, req).await.unwrap();
        assert_eq!(created.role, Role::Admin);

        let mut bogus = new_account("a2@example.com");
        bogus.role = Some("owner".into());
        let err = ctx.service.create_user_by_admin(&root, bogus).await.unwrap_err();
        assert_eq!((err.status_code(), err.message()), (400, "Invalid role"));

        let mut again = new_account("a3@example.com");
        again.role = Some("super_admin".into());
        let err = ctx.service.create_user_by_admin(&root, again).await.unwrap_err();
        assert_eq!(err.message(), "Cannot create another super_admin account");

        let err = ctx
            .service
            .create_admin(&admin, new_account("a4@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
        let made = ctx
            .service
            .create_admin(&root, new_account("a4@example.com"))
            .await
            .unwrap();
        assert_eq!(made.role, Role::Admin);
    }

    #[tokio::test]
    async fn role_changes_check_gate_before_lookup() {
        let ctx = TestContext::new();
        let admin = ctx.seed("admin@example.com", Role::Admin, true).await;
        let root = ctx.seed("root@example.com", Role::SuperAdmin, true).await;
        let user = ctx.seed("user@example.com", Role::StandardUser, true).await;

        let err = ctx.service.change_user_role(&admin, 999, "admin").await.unwrap_err();
        assert_eq!(err.status_code(), 403);

        let err = ctx.service.change_user_role(&root, 999, "admin").await.unwrap_err();
        assert_eq!(err.status_code(), 404);

        let err = ctx.service.change_user_role(&root, root.id, "admin").await.unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = ctx.service.change_user_role(&root, user.id, "super_admin").await.unwrap_err();
        assert_eq!(err.message(), "Cannot grant super_admin role");

        let promoted = ctx.service.change_user_role(&root, user.id, "admin").await.unwrap();
        assert_eq!(promoted.role, Role::Admin);
    }

    #[tokio::test]
    async fn admin_update_blocks_self_deactivation() {
        let ctx = TestContext::new();
        let root = ctx.seed("root@example.com", Role::SuperAdmin, true).await;

        let update = UserUpdate {
            is_active: Some(false),
            ..Default::default()
        };
        let err = ctx
            .service
            .update_user_by_admin(&root, root.id, update)
            .await
            .unwrap_err();
        assert_eq!((err.status_code(), err.message()), (400, "Cannot deactivate yourself"));

        let rename = UserUpdate {
            first_name: Some("Ruth".into()),
            ..Default::default()
        };
        let updated = ctx.service.update_user_by_admin(&root, root.id, rename).await.unwrap();
        assert_eq!(updated.first_name, "Ruth");
    }

    #[tokio::test]
    async fn password_reset_validates_strength_and_tier() {
        let ctx = TestContext::new();
        let admin = ctx.seed("admin@example.com", Role::Admin, true).await;
        let other = ctx.seed("other@example.com", Role::Admin, true).await;
        let user = ctx.seed("user@example.com", Role::StandardUser, true).await;

        let err = ctx.service.reset_user_password(&admin, user.id, "short").await.unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = ctx
            .service
            .reset_user_password(&admin, other.id, "NewPassw0rd")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);

        ctx.service
            .reset_user_password(&admin, user.id, "NewPassw0rd")
            .await
            .unwrap();
        let token = ctx
            .service
            .login(LoginRequest {
                email: "user@example.com".into(),
                password: "NewPassw0rd".into(),
            })
            .await;
        assert!(token.is_ok());
    }

    #[tokio::test]
    async fn bulk_action_skips_failures() {
        let ctx = TestContext::new();
        let admin = ctx.seed("admin@example.com", Role::Admin, true).await;
        let peer = ctx.seed("peer@example.com", Role::Admin, true).await;
        let a = ctx.seed("a@example.com", Role::StandardUser, true).await;
        let b = ctx.seed("b@example.com", Role::StandardUser, true).await;

        let results = ctx
            .service
            .bulk_user_action(
                &admin,
                BulkUserAction {
                    user_ids: vec![b.id, admin.id, peer.id, 404, a.id],
                    action: BulkAction::Deactivate,
                },
            )
            .await
            .unwrap();

        let ids: Vec<i64> = results.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
        assert!(results.iter().all(|u| !u.is_active));
    }

    #[tokio::test]
    async fn listing_search_and_dashboard_are_scoped() {
        let ctx = TestContext::new();
        let root = ctx.seed("root@corp.io", Role::SuperAdmin, true).await;
        let admin = ctx.seed("admin@corp.io", Role::Admin, true).await;
        let user = ctx.seed("user@corp.io", Role::StandardUser, true).await;
        ctx.seed("idle@corp.io", Role::StandardUser, false).await;

        let err = ctx.service.users_by_role(&admin, RoleFilter::All).await.unwrap_err();
        assert_eq!(err.message(), "Admins can only access standard users");
        let all = ctx.service.users_by_role(&root, RoleFilter::All).await.unwrap();
        assert_eq!(all.len(), 4);

        let found = ctx.service.search_users(&admin, Some("corp")).await.unwrap();
        assert!(found.iter().all(|u| u.role == Role::StandardUser));
        assert_eq!(found.len(), 2);
        let own = ctx.service.search_users(&user, None).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].id, user.id);

        let board = ctx.service.dashboard(&admin).await.unwrap();
        assert_eq!((board.total_users, board.active_users, board.inactive_users), (2, 1, 1));
        assert_eq!(board.user_type, "standard_users_only");
        assert!(board.total_admins.is_none());

        let board = ctx.service.dashboard(&root).await.unwrap();
        assert_eq!(board.total_users, 4);
        assert_eq!(board.total_admins, Some(1));
        assert_eq!(board.total_standard_users, Some(2));
        assert_eq!(board.user_type, "all_users");

        assert_eq!(ctx.service.dashboard(&user).await.unwrap_err().status_code(), 403);
    }

    #[tokio::test]
    async fn names_are_measured_after_trimming() {
        let ctx = TestContext::new();
        let me = ctx.seed("me@example.com", Role::StandardUser, true).await;
        let longest = "n".repeat(MAX_NAME_LENGTH);

        let padded = ProfileUpdate {
            first_name: Some(format!("  {}  ", longest)),
            ..Default::default()
        };
        let updated = ctx.service.update_profile(&me, padded).await.unwrap();
        assert_eq!(updated.first_name, longest);

        let mut req = new_account("padded@example.com");
        req.last_name = format!("{} ", longest);
        assert!(ctx.service.signup(req).await.is_ok());

        let too_long = ProfileUpdate {
            first_name: Some(format!(" {}n ", longest)),
            ..Default::default()
        };
        let err = ctx.service.update_profile(&me, too_long).await.unwrap_err();
        assert_eq!(err.message(), "first_name must be at most 50 characters");
    }

    /// Delegates to the in-memory store but fails every `update`.
    struct RejectingUpdates(InMemoryUserRepository);

    #[async_trait::async_trait]
    impl UserRepository for RejectingUpdates {
        async fn insert(&self, user: NewUser) -> Result<User, RepositoryError> {
            self.0.insert(user).await
        }
        async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError> {
            self.0.find_by_id(id).await
        }
        async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
            self.0.find_by_email(email).await
        }
        async fn update(&self, _id: i64, _changes: UserChanges) -> Result<User, RepositoryError> {
            Err(RepositoryError::Query("connection reset".to_string()))
        }
        async fn set_role(&self, id: i64, role: Role) -> Result<User, RepositoryError> {
            self.0.set_role(id, role).await
        }
        async fn set_password_hash(&self, id: i64, hash: &str) -> Result<User, RepositoryError> {
            self.0.set_password_hash(id, hash).await
        }
        async fn list(&self, filter: RoleFilter) -> Result<Vec<User>, RepositoryError> {
            self.0.list(filter).await
        }
        async fn search(
            &self,
            email_fragment: Option<&str>,
            scope: SearchScope,
        ) -> Result<Vec<User>, RepositoryError> {
            self.0.search(email_fragment, scope).await
        }
        async fn count(&self, filter: RoleFilter, active_only: bool) -> Result<i64, RepositoryError> {
            self.0.count(filter, active_only).await
        }
        async fn ping(&self) -> Result<(), RepositoryError> {
            self.0.ping().await
        }
    }

    #[tokio::test]
    async fn failed_update_leaves_no_picture_behind() {
        let dir = tempfile::tempdir().unwrap();
        let service = UserService::new(
            Arc::new(RejectingUpdates(InMemoryUserRepository::new())),
            JwtService::new("unit-test-secret", 60),
            4,
            ProfilePicStore::new(dir.path()),
        );
        let stored_files = || std::fs::read_dir(dir.path()).map(|d| d.count()).unwrap_or(0);

        let mut req = new_account("me@example.com");
        req.profile_pic = Some("data:image/png;base64,aGVsbG8=".to_string());
        let err = service.signup(req).await.unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert_eq!(stored_files(), 0);

        let me = service
            .repository()
            .find_by_email("me@example.com")
            .await
            .unwrap()
            .unwrap();

        assert!(service
            .upload_profile_pic(&me, Some("image/png"), Some("face.png"), b"png")
            .await
            .is_err());
        assert_eq!(stored_files(), 0);

        let update = ProfileUpdate {
            profile_pic: Some("data:image/png;base64,aGVsbG8=".to_string()),
            ..Default::default()
        };
        assert!(service.update_profile(&me, update).await.is_err());
        assert_eq!(stored_files(), 0);
    }
}
