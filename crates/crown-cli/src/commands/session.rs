//! Session commands.

use super::Context;
use crate::host::TerminalHost;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use crown_auth::{
    CallbackListener, CallbackOutcome, LogoutOutcome, OAuthCallbackHandler, SessionState,
};
use serde_json::json;
use std::sync::Arc;

/// Run the startup check and report the resulting state.
pub async fn status(ctx: &Context) -> Result<()> {
    let controller = ctx.controller()?;
    let state = controller.initialize().await;

    match ctx.format {
        OutputFormat::Text => match &state {
            SessionState::Authenticated(identity) => {
                println!("Auth:     logged in");
                output::print_row("Nickname", &identity.nickname);
                if !identity.email.is_empty() {
                    output::print_row("Email", &identity.email);
                }
            }
            _ => println!("Auth:     not logged in"),
        },
        OutputFormat::Json => output::print_json(&state),
    }
    Ok(())
}

/// Sign in through the provider: open the consent page and capture the
/// redirect on the loopback listener.
pub async fn login(ctx: &Context, no_browser: bool) -> Result<()> {
    let controller = ctx.controller()?;

    if let SessionState::Authenticated(identity) = controller.initialize().await {
        output::print_success(
            &format!("Already logged in as {}", identity.nickname),
            &ctx.format,
        );
        return Ok(());
    }

    let listener = CallbackListener::bind(
        ctx.config.callback_port,
        &ctx.config.callback_path,
        ctx.config.callback_timeout(),
    )
    .await?;
    let link = controller.request_login_link().await?;

    println!("Waiting for the provider to redirect to {}", listener.callback_url());
    if no_browser || open::that(&link).is_err() {
        println!("Open this URL to sign in:\n\n  {}\n", link);
    }

    let redirect = listener.wait_for_redirect().await?;
    finish_callback(ctx, controller, &redirect).await
}

/// Hand a redirect URL captured elsewhere to the callback handler.
pub async fn callback(ctx: &Context, url: &str) -> Result<()> {
    let controller = ctx.controller()?;
    finish_callback(ctx, controller, url).await
}

async fn finish_callback(
    ctx: &Context,
    controller: Arc<crown_auth::SessionController>,
    url: &str,
) -> Result<()> {
    let host = Arc::new(TerminalHost::new(matches!(ctx.format, OutputFormat::Json)));
    let handler = OAuthCallbackHandler::new(controller, host);

    match handler.handle(url).await {
        CallbackOutcome::LoggedIn(identity) => {
            output::print_success(&format!("Logged in as {}", identity.nickname), &ctx.format)
        }
        CallbackOutcome::LoginFailed => {
            output::print_error("The server did not accept the login", &ctx.format)
        }
        CallbackOutcome::Rejected => {
            output::print_error("The redirect carried an invalid or expired token", &ctx.format)
        }
        CallbackOutcome::Missing => {
            output::print_error("The redirect carried no token", &ctx.format)
        }
        CallbackOutcome::AlreadyProcessed => {}
    }
    Ok(())
}

/// Sign out locally and on the server.
pub async fn logout(ctx: &Context) -> Result<()> {
    let controller = ctx.controller()?;
    match controller.logout().await {
        LogoutOutcome::Completed => output::print_success("Logged out", &ctx.format),
        LogoutOutcome::Coalesced => output::print_success("Logout already running", &ctx.format),
    }
    Ok(())
}

/// Describe the stored token without printing it.
pub async fn token(ctx: &Context) -> Result<()> {
    let controller = ctx.controller()?;
    let diagnostics = controller.token_store().diagnostics();

    match ctx.format {
        OutputFormat::Text => {
            output::print_row("Token", if diagnostics.token_present { "present" } else { "absent" });
            if diagnostics.token_present {
                output::print_row("Length", &diagnostics.token_length.to_string());
                output::print_row(
                    "Expires",
                    &diagnostics
                        .expires_at
                        .map(|at| at.to_rfc3339())
                        .unwrap_or_else(|| "unknown".to_string()),
                );
                output::print_row("Expired", &diagnostics.expired.to_string());
            }
            output::print_row("Identity", if diagnostics.identity_present { "cached" } else { "none" });
        }
        OutputFormat::Json => output::print_json(&json!({
            "token": diagnostics,
            "storage": ctx.paths.storage_file(),
        })),
    }
    Ok(())
}
