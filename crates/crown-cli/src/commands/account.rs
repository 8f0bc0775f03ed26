//! Account commands.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::{bail, Result};
use crown_auth::{AuthError, ProfileSource};

/// Show the play summary for the signed-in user.
pub async fn profile(ctx: &Context) -> Result<()> {
    let controller = ctx.controller()?;
    if !controller.initialize().await.is_authenticated() {
        bail!("Not logged in. Run `crown login` first");
    }

    let profile = match controller.profile().await {
        Ok(profile) => profile,
        Err(e) if e.is_unauthorized() => {
            bail!("The server rejected the session. Run `crown logout` and sign in again")
        }
        Err(e) => return Err(e.into()),
    };

    match ctx.format {
        OutputFormat::Text => {
            output::print_row("Nickname", &profile.nickname);
            if profile.source == ProfileSource::Cached {
                println!("  (server unreachable, showing cached identity)");
            } else {
                output::print_row("Plays", &profile.play_count.to_string());
                output::print_row(
                    "Play time",
                    &output::format_seconds(profile.total_play_time),
                );
            }
            if !profile.profile_image.is_empty() {
                output::print_row("Image", &profile.profile_image);
            }
        }
        OutputFormat::Json => output::print_json(&profile),
    }
    Ok(())
}

/// Change the signed-in user's nickname.
pub async fn rename(ctx: &Context, nickname: &str) -> Result<()> {
    let controller = ctx.controller()?;
    if !controller.initialize().await.is_authenticated() {
        bail!("Not logged in. Run `crown login` first");
    }

    match controller.update_nickname(nickname).await {
        Ok(identity) => {
            output::print_success(&format!("Nickname is now {}", identity.nickname), &ctx.format);
            Ok(())
        }
        Err(AuthError::InvalidNickname) => bail!("Nickname must not be empty"),
        Err(e) => Err(e.into()),
    }
}
