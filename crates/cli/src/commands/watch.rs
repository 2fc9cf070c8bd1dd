//! Session watch command.
//!
//! Restores the persisted session, arms the lifecycle timers, and
//! reports refresh/warning/expiry events until the session ends or the
//! user interrupts. Useful for keeping a long bidding session alive from
//! a terminal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use mintvault_client::backend::Backend;
use mintvault_client::{SessionHooks, SessionManager, SnapshotStore};

use super::{CliContext, CliError};

/// Watch the persisted session, printing status every `interval_secs`.
///
/// # Errors
///
/// Returns [`CliError::NotSignedIn`] when no persisted session exists.
#[allow(clippy::print_stdout)]
pub async fn watch(interval_secs: u64) -> Result<(), CliError> {
    let ctx = CliContext::from_env()?;

    let expired = Arc::new(Notify::new());
    let hooks = SessionHooks::new()
        .on_refreshed(|session| {
            tracing::info!(expires_at = session.expires_at, "session refreshed");
        })
        .on_warning(|minutes_left| {
            tracing::warn!(minutes_left, "session expiring soon");
        })
        .on_expired({
            let expired = Arc::clone(&expired);
            move || expired.notify_waiters()
        });

    let manager = SessionManager::with_hooks(
        Arc::clone(&ctx.backend) as Arc<dyn Backend>,
        Arc::clone(&ctx.store) as Arc<dyn SnapshotStore>,
        ctx.config.session.clone(),
        hooks,
    );

    let Some(session) = manager.restore()? else {
        return Err(CliError::NotSignedIn);
    };
    ctx.backend.set_session(session).await;

    println!("watching session (ctrl-c to stop)");
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let status = manager.status();
                match status.seconds_until_expiry {
                    Some(seconds) => println!(
                        "active, {seconds}s until expiry{}{}",
                        if status.warning_shown { ", warned" } else { "" },
                        if status.refreshing { ", refreshing" } else { "" },
                    ),
                    None => println!("no active session"),
                }
            }
            () = expired.notified() => {
                println!("session expired");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                // Timers die with the process; the snapshot stays so the
                // session survives into the next command.
                println!("stopping; session stays persisted");
                break;
            }
        }
    }
    Ok(())
}
