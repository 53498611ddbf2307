use std::sync::Arc;
use tempfile::TempDir;

use crate::auth::{password, JwtService};
use crate::database::models::{NewUser, User};
use crate::database::{InMemoryUserRepository, UserRepository};
use crate::policy::Role;
use crate::services::profile_pic::ProfilePicStore;
use crate::services::user_service::{UserCreate, UserService};

pub const TEST_PASSWORD: &str = "Passw0rd1";
pub const TEST_SECRET: &str = "unit-test-secret";

/// In-memory service with a throwaway picture directory.
pub struct TestContext {
    pub service: UserService,
    pub repo: Arc<InMemoryUserRepository>,
    _pictures: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        let pictures = tempfile::tempdir().expect("create temp picture dir");
        let repo = Arc::new(InMemoryUserRepository::new());
        let service = UserService::new(
            repo.clone(),
            JwtService::new(TEST_SECRET, 60),
            4,
            ProfilePicStore::new(pictures.path()),
        );

        Self {
            service,
            repo,
            _pictures: pictures,
        }
    }

    /// Insert a user directly, bypassing the service rules.
    pub async fn seed(&self, email: &str, role: Role, is_active: bool) -> User {
        let password_hash = password::hash_password(TEST_PASSWORD, 4).expect("hash test password");
        self.repo
            .insert(NewUser {
                first_name: "Test".to_string(),
                last_name: role.as_str().to_string(),
                email: email.to_string(),
                password_hash,
                contact_number: None,
                address: None,
                is_active,
                profile_pic: None,
                role,
            })
            .await
            .expect("seed user")
    }
}

/// A valid creation payload for `email`.
pub fn new_account(email: &str) -> UserCreate {
    UserCreate {
        email: email.to_string(),
        first_name: "New".to_string(),
        last_name: "Account".to_string(),
        password: TEST_PASSWORD.to_string(),
        contact_number: None,
        address: None,
        is_active: true,
        profile_pic: None,
        role: None,
    }
}
