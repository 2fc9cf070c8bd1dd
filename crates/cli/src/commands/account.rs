//! Account commands: login, logout, whoami.
//!
//! # Usage
//!
//! ```bash
//! mintvault login -e collector@example.com
//! mintvault whoami
//! mintvault logout
//! ```
//!
//! The session is persisted under the snapshot store so later commands
//! (and the next process) can pick it up without re-authenticating.

use std::sync::Arc;

use mintvault_client::backend::Backend;
use mintvault_client::{AuthHub, Clock, SystemClock};

use super::{CliContext, CliError};

/// Sign in with email + password and persist the session.
///
/// The password is read from `MINTVAULT_PASSWORD` when set, otherwise
/// prompted on the terminal without echo.
///
/// # Errors
///
/// Returns [`CliError`] if configuration is incomplete, the prompt
/// fails, or the backend rejects the credentials.
pub async fn login(email: &str) -> Result<(), CliError> {
    let ctx = CliContext::from_env()?;

    let password = match std::env::var("MINTVAULT_PASSWORD") {
        Ok(password) => password,
        Err(_) => rpassword::prompt_password("Password: ")?,
    };

    tracing::info!(email, "signing in");
    let session = ctx.backend.sign_in_with_password(email, &password).await?;

    // Adopting through the manager writes the snapshot; this process
    // exits right after, so the armed timers never fire.
    ctx.manager().adopt(session.clone());

    tracing::info!(
        user = %session.user.email,
        expires_in = session.expires_in(SystemClock.now()),
        "signed in"
    );
    Ok(())
}

/// Sign out remotely (best-effort) and clear the persisted session.
///
/// # Errors
///
/// Returns [`CliError`] only for local failures; a failed remote
/// sign-out is logged and the local session is cleared regardless.
pub async fn logout() -> Result<(), CliError> {
    let ctx = CliContext::from_env()?;
    let manager = ctx.manager();

    match manager.peek_persisted()? {
        Some(session) => {
            ctx.backend.set_session(session).await;
            if let Err(error) = ctx.backend.sign_out().await {
                tracing::warn!(%error, "remote sign-out failed");
            }
        }
        None => tracing::info!("no persisted session"),
    }
    manager.destroy();
    tracing::info!("signed out");
    Ok(())
}

/// Print the signed-in user's profile.
///
/// # Errors
///
/// Returns [`CliError::NotSignedIn`] when no persisted session exists.
#[allow(clippy::print_stdout)]
pub async fn whoami() -> Result<(), CliError> {
    let ctx = CliContext::from_env()?;
    let session = ctx.restore_session().await?;

    let hub = AuthHub::new(Arc::clone(&ctx.backend) as Arc<dyn Backend>);
    hub.initialize().await;

    let state = hub.state();
    let Some(profile) = state.user else {
        return Err(CliError::NotSignedIn);
    };

    println!("{} <{}>", profile.username, profile.email);
    if let Some(full_name) = &profile.full_name {
        println!("  name:      {full_name}");
    }
    println!("  level:     {} ({}/{} xp)", profile.level, profile.xp, profile.xp_to_next);
    if profile.is_fallback() {
        println!("  profile:   defaults (no profile row yet)");
    }
    if !profile.preferences.favorite_characters.is_empty() {
        println!(
            "  favorites: {}",
            profile.preferences.favorite_characters.join(", ")
        );
    }
    println!(
        "  session:   expires in {}s",
        session.expires_in(SystemClock.now()).max(0)
    );
    Ok(())
}
