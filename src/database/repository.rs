use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

use crate::database::models::{NewUser, User, UserChanges, UserRow};
use crate::policy::{Role, RoleFilter, SearchScope};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("User not found")]
    NotFound,

    #[error("Email already registered")]
    EmailExists,

    #[error("Query error: {0}")]
    Query(String),

    #[error("Stored row is invalid: {0}")]
    CorruptRow(String),

    #[error("Internal repository error")]
    Internal,
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                RepositoryError::EmailExists
            }
            other => RepositoryError::Query(other.to_string()),
        }
    }
}

/// Storage operations the user service needs.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert(&self, user: NewUser) -> Result<User, RepositoryError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    async fn update(&self, id: i64, changes: UserChanges) -> Result<User, RepositoryError>;
    async fn set_role(&self, id: i64, role: Role) -> Result<User, RepositoryError>;
    async fn set_password_hash(&self, id: i64, hash: &str) -> Result<User, RepositoryError>;
    async fn list(&self, filter: RoleFilter) -> Result<Vec<User>, RepositoryError>;
    async fn search(
        &self,
        email_fragment: Option<&str>,
        scope: SearchScope,
    ) -> Result<Vec<User>, RepositoryError>;
    async fn count(&self, filter: RoleFilter, active_only: bool) -> Result<i64, RepositoryError>;
    async fn ping(&self) -> Result<(), RepositoryError>;

    async fn set_active(&self, id: i64, is_active: bool) -> Result<User, RepositoryError> {
        let changes = UserChanges {
            is_active: Some(is_active),
            ..Default::default()
        };
        self.update(id, changes).await
    }
}

const SELECT_USER: &str = r#"
    SELECT u.id, u.first_name, u.last_name, u.email, u.hashed_password,
           u.contact_number, u.address, u.is_active, u.profile_pic,
           r.name AS role, u.created_at, u.updated_at
    FROM users u
    JOIN roles r ON r.id = u.role_id
"#;

fn into_user(row: UserRow) -> Result<User, RepositoryError> {
    User::try_from(row).map_err(|e| RepositoryError::CorruptRow(e.to_string()))
}

fn role_param(filter: RoleFilter) -> Option<&'static str> {
    match filter {
        RoleFilter::All => None,
        RoleFilter::Only(role) => Some(role.as_str()),
    }
}

/// Escape LIKE metacharacters so a search fragment matches literally.
fn like_pattern(fragment: &str) -> String {
    let escaped = fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Postgres-backed repository
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_required(&self, id: i64) -> Result<User, RepositoryError> {
        self.find_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn insert(&self, user: NewUser) -> Result<User, RepositoryError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO users (first_name, last_name, email, hashed_password, contact_number,
                               address, is_active, profile_pic, role_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, (SELECT id FROM roles WHERE name = $9))
            RETURNING id
            "#,
        )
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.contact_number)
        .bind(&user.address)
        .bind(user.is_active)
        .bind(&user.profile_pic)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await?;

        self.fetch_required(id).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError> {
        let query = format!("{} WHERE u.id = $1", SELECT_USER);
        sqlx::query_as::<_, UserRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(into_user)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let query = format!("{} WHERE u.email = $1", SELECT_USER);
        sqlx::query_as::<_, UserRow>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(into_user)
            .transpose()
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<User, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                email = COALESCE($2, email),
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                contact_number = COALESCE($5, contact_number),
                address = COALESCE($6, address),
                is_active = COALESCE($7, is_active),
                profile_pic = COALESCE($8, profile_pic),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&changes.email)
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .bind(&changes.contact_number)
        .bind(&changes.address)
        .bind(changes.is_active)
        .bind(&changes.profile_pic)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.fetch_required(id).await
    }

    async fn set_role(&self, id: i64, role: Role) -> Result<User, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET role_id = (SELECT id FROM roles WHERE name = $2), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.fetch_required(id).await
    }

    async fn set_password_hash(&self, id: i64, hash: &str) -> Result<User, RepositoryError> {
        let result = sqlx::query(
            "UPDATE users SET hashed_password = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.fetch_required(id).await
    }

    async fn list(&self, filter: RoleFilter) -> Result<Vec<User>, RepositoryError> {
        let query = format!(
            "{} WHERE ($1::text IS NULL OR r.name = $1) ORDER BY u.id",
            SELECT_USER
        );
        sqlx::query_as::<_, UserRow>(&query)
            .bind(role_param(filter))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(into_user)
            .collect()
    }

    async fn search(
        &self,
        email_fragment: Option<&str>,
        scope: SearchScope,
    ) -> Result<Vec<User>, RepositoryError> {
        let (role, only_id) = match scope {
            SearchScope::Everyone => (None, None),
            SearchScope::Role(role) => (Some(role.as_str()), None),
            SearchScope::SelfOnly(id) => (None, Some(id)),
        };
        let pattern = email_fragment
            .filter(|f| !f.trim().is_empty())
            .map(|f| like_pattern(f.trim()));

        let query = format!(
            r#"{} WHERE ($1::text IS NULL OR u.email ILIKE $1)
                  AND ($2::text IS NULL OR r.name = $2)
                  AND ($3::bigint IS NULL OR u.id = $3)
                ORDER BY u.id"#,
            SELECT_USER
        );
        sqlx::query_as::<_, UserRow>(&query)
            .bind(pattern)
            .bind(role)
            .bind(only_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(into_user)
            .collect()
    }

    async fn count(&self, filter: RoleFilter, active_only: bool) -> Result<i64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM users u
            JOIN roles r ON r.id = u.role_id
            WHERE ($1::text IS NULL OR r.name = $1)
              AND (NOT $2 OR u.is_active)
            "#,
        )
        .bind(role_param(filter))
        .bind(active_only)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// In-memory repository for development and tests
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<i64, User>>,
    next_id: Mutex<i64>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            next_id: Mutex::new(1),
        }
    }

    fn sorted(mut users: Vec<User>) -> Vec<User> {
        users.sort_by_key(|u| u.id);
        users
    }

    fn modify<F>(&self, id: i64, apply: F) -> Result<User, RepositoryError>
    where
        F: FnOnce(&mut User),
    {
        let mut users = self.users.lock().map_err(|_| RepositoryError::Internal)?;
        let user = users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        apply(user);
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn insert(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut users = self.users.lock().map_err(|_| RepositoryError::Internal)?;
        let mut next_id = self.next_id.lock().map_err(|_| RepositoryError::Internal)?;

        if users.values().any(|existing| existing.email == user.email) {
            return Err(RepositoryError::EmailExists);
        }

        let id = *next_id;
        *next_id += 1;

        let now = Utc::now();
        let stored = User {
            id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            password_hash: user.password_hash,
            contact_number: user.contact_number,
            address: user.address,
            is_active: user.is_active,
            profile_pic: user.profile_pic,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        users.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError> {
        let users = self.users.lock().map_err(|_| RepositoryError::Internal)?;
        Ok(users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let users = self.users.lock().map_err(|_| RepositoryError::Internal)?;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<User, RepositoryError> {
        // One guard covers the uniqueness check and the write.
        let mut users = self.users.lock().map_err(|_| RepositoryError::Internal)?;
        if let Some(email) = &changes.email {
            if users.values().any(|u| u.id != id && &u.email == email) {
                return Err(RepositoryError::EmailExists);
            }
        }

        let user = users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if let Some(v) = changes.email {
            user.email = v;
        }
        if let Some(v) = changes.first_name {
            user.first_name = v;
        }
        if let Some(v) = changes.last_name {
            user.last_name = v;
        }
        if let Some(v) = changes.contact_number {
            user.contact_number = Some(v);
        }
        if let Some(v) = changes.address {
            user.address = Some(v);
        }
        if let Some(v) = changes.is_active {
            user.is_active = v;
        }
        if let Some(v) = changes.profile_pic {
            user.profile_pic = Some(v);
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_role(&self, id: i64, role: Role) -> Result<User, RepositoryError> {
        self.modify(id, |user| user.role = role)
    }

    async fn set_password_hash(&self, id: i64, hash: &str) -> Result<User, RepositoryError> {
        self.modify(id, |user| user.password_hash = hash.to_string())
    }

    async fn list(&self, filter: RoleFilter) -> Result<Vec<User>, RepositoryError> {
        let users = self.users.lock().map_err(|_| RepositoryError::Internal)?;
        Ok(Self::sorted(
            users.values().filter(|u| filter.matches(u.role)).cloned().collect(),
        ))
    }

    async fn search(
        &self,
        email_fragment: Option<&str>,
        scope: SearchScope,
    ) -> Result<Vec<User>, RepositoryError> {
        let needle = email_fragment
            .map(|f| f.trim().to_lowercase())
            .filter(|f| !f.is_empty());
        let users = self.users.lock().map_err(|_| RepositoryError::Internal)?;

        let found = users
            .values()
            .filter(|u| match scope {
                SearchScope::Everyone => true,
                SearchScope::Role(role) => u.role == role,
                SearchScope::SelfOnly(id) => u.id == id,
            })
            .filter(|u| {
                needle
                    .as_deref()
                    .map_or(true, |n| u.email.to_lowercase().contains(n))
            })
            .cloned()
            .collect();
        Ok(Self::sorted(found))
    }

    async fn count(&self, filter: RoleFilter, active_only: bool) -> Result<i64, RepositoryError> {
        let users = self.users.lock().map_err(|_| RepositoryError::Internal)?;
        let count = users
            .values()
            .filter(|u| filter.matches(u.role))
            .filter(|u| !active_only || u.is_active)
            .count();
        Ok(count as i64)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
