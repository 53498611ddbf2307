use chrono::{TimeZone, Utc};
use clap::Subcommand;
use serde_json::json;

use crate::auth::JwtService;
use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::config;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Validate a token with the configured secret and print its claims")]
    Decode {
        #[arg(help = "Access token (without the Bearer prefix)")]
        token: String,
    },
}

pub async fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TokenCommands::Decode { token } => {
            let jwt = JwtService::from_config(config::config());
            let claims = jwt.validate(&token)?;
            let user_id = claims.subject_id()?;

            let expires_at = Utc
                .timestamp_opt(claims.exp, 0)
                .single()
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| claims.exp.to_string());

            match output_format {
                OutputFormat::Json => output_success(
                    &output_format,
                    "Token is valid",
                    Some(json!({
                        "user_id": user_id,
                        "role": claims.role,
                        "email": claims.email,
                        "expires_at": expires_at,
                    })),
                ),
                OutputFormat::Text => {
                    println!("✓ Token is valid");
                    println!("User ID: {}", user_id);
                    println!("Role:    {}", claims.role.as_deref().unwrap_or("-"));
                    println!("Email:   {}", claims.email.as_deref().unwrap_or("-"));
                    println!("Expires: {}", expires_at);
                    Ok(())
                }
            }
        }
    }
}
