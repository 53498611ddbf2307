use sqlx::PgPool;
use tracing::info;

use super::manager::DatabaseError;
use crate::policy::Role;

const CREATE_ROLES: &str = r#"
    CREATE TABLE IF NOT EXISTS roles (
        id SERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )
"#;

const CREATE_USERS: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        first_name VARCHAR(50) NOT NULL,
        last_name VARCHAR(50) NOT NULL,
        email TEXT NOT NULL UNIQUE,
        hashed_password TEXT NOT NULL,
        contact_number VARCHAR(15),
        address VARCHAR(255),
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        profile_pic TEXT,
        role_id INTEGER NOT NULL REFERENCES roles(id),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

const CREATE_USERS_ROLE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS users_role_id_idx ON users (role_id)";

/// Create tables if absent and seed the role names. Safe to run repeatedly.
pub async fn bootstrap(pool: &PgPool) -> Result<(), DatabaseError> {
    for statement in [CREATE_ROLES, CREATE_USERS, CREATE_USERS_ROLE_INDEX] {
        sqlx::query(statement).execute(pool).await?;
    }

    for role in Role::ALL {
        sqlx::query("INSERT INTO roles (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(role.as_str())
            .execute(pool)
            .await?;
    }

    info!("Database schema ready");
    Ok(())
}
