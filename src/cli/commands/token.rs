use anyhow::Context;
use clap::Subcommand;
use serde_json::json;

use crate::auth::Claims;
use crate::cli::utils::output;
use crate::cli::{OutputFormat, Target};
use crate::config::{app::scalar_u64, keys};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Sign a token with the environment's secret")]
    Issue {
        #[arg(long, default_value = "user", help = "Role claim")]
        role: String,
        #[arg(long, default_value = "0", help = "User id claim")]
        userid: String,
        #[arg(long, default_value = "cli", help = "Name claim")]
        name: String,
        #[arg(long, help = "Lifetime in seconds (defaults to JWT_TTL_SECONDS)")]
        ttl: Option<i64>,
    },
}

pub fn handle(cmd: TokenCommands, target: &Target, output_format: OutputFormat) -> anyhow::Result<()> {
    let state = AppState::new(std::sync::Arc::new(target.build()?));

    match cmd {
        TokenCommands::Issue { role, userid, name, ttl } => {
            let jwt = state.jwt().context("JWT component is misconfigured")?;
            let ttl = match ttl {
                Some(ttl) => ttl,
                None => {
                    let configured = state.container().get_value(keys::JWT_TTL_SECONDS)?;
                    scalar_u64(keys::JWT_TTL_SECONDS, &configured)? as i64
                }
            };

            let claims = Claims::for_user(role, userid, name);
            let token = jwt.issue_token(&claims, ttl)?;
            output(
                output_format,
                &token,
                json!({ "token": token, "data": claims, "expires_in": ttl }),
            )
        }
    }
}
