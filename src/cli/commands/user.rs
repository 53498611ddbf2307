use anyhow::bail;
use clap::Subcommand;
use serde_json::json;

use crate::auth::{password, validators};
use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::config;
use crate::database::models::{NewUser, UserResponse};
use crate::database::{DatabaseManager, PgUserRepository, UserRepository};
use crate::policy::{Role, RoleFilter};

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Create the super_admin account (only one may exist)")]
    CreateSuperAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long = "first-name")]
        first_name: String,
        #[arg(long = "last-name")]
        last_name: String,
    },

    #[command(about = "List users")]
    List {
        #[arg(long, value_parser = parse_role, help = "super_admin, admin or standard_user")]
        role: Option<Role>,
    },
}

fn parse_role(value: &str) -> Result<Role, String> {
    value.parse::<Role>().map_err(|e| e.to_string())
}

pub async fn handle(cmd: UserCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = super::connect().await?;
    let repo = PgUserRepository::new(pool.clone());

    let result = match cmd {
        UserCommands::CreateSuperAdmin {
            email,
            password,
            first_name,
            last_name,
        } => {
            create_super_admin(&repo, &output_format, email, password, first_name, last_name).await
        }
        UserCommands::List { role } => list(&repo, &output_format, role).await,
    };

    DatabaseManager::close(pool).await;
    result
}

async fn create_super_admin(
    repo: &PgUserRepository,
    output_format: &OutputFormat,
    email: String,
    password: String,
    first_name: String,
    last_name: String,
) -> anyhow::Result<()> {
    let email = validators::normalize_email(&email);
    if !validators::validate_email(&email) {
        bail!("Invalid email format");
    }
    validators::validate_password_strength(&password).map_err(anyhow::Error::msg)?;
    if first_name.trim().is_empty() || last_name.trim().is_empty() {
        bail!("First and last name are required");
    }

    if repo.count(RoleFilter::Only(Role::SuperAdmin), false).await? > 0 {
        bail!("A super_admin account already exists");
    }
    if repo.find_by_email(&email).await?.is_some() {
        bail!("Email already registered");
    }

    let password_hash = password::hash_password(&password, config::config().security.bcrypt_cost)?;
    let user = repo
        .insert(NewUser {
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            email,
            password_hash,
            contact_number: None,
            address: None,
            is_active: true,
            profile_pic: None,
            role: Role::SuperAdmin,
        })
        .await?;

    output_success(
        output_format,
        &format!("Created super_admin {}", user.email),
        Some(json!({ "user": UserResponse::from(&user) })),
    )
}

async fn list(
    repo: &PgUserRepository,
    output_format: &OutputFormat,
    role: Option<Role>,
) -> anyhow::Result<()> {
    let filter = role.map_or(RoleFilter::All, RoleFilter::Only);
    let users = repo.list(filter).await?;

    if users.is_empty() {
        return output_empty_collection(output_format, "users", "No users found");
    }

    match output_format {
        OutputFormat::Json => {
            let users: Vec<UserResponse> = users.iter().map(UserResponse::from).collect();
            println!("{}", serde_json::to_string_pretty(&json!({ "users": users }))?);
        }
        OutputFormat::Text => {
            println!("{:<6} {:<32} {:<24} {:<14} {}", "ID", "EMAIL", "NAME", "ROLE", "ACTIVE");
            println!("{}", "-".repeat(86));

            for user in &users {
                let name = format!("{} {}", user.first_name, user.last_name);
                println!(
                    "{:<6} {:<32} {:<24} {:<14} {}",
                    user.id,
                    truncate(&user.email, 32),
                    truncate(&name, 24),
                    user.role,
                    if user.is_active { "yes" } else { "no" }
                );
            }
        }
    }

    Ok(())
}
