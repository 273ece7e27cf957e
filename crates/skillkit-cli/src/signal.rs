use std::io;
use std::process;
use std::thread;

use anyhow::{Context, Result};
use skillkit_core::CancelToken;
use tracing::warn;

/// Exit status for a run abandoned by a second interrupt (128 + SIGINT).
const FORCED_EXIT_CODE: i32 = 130;

#[cfg(unix)]
type InterruptStream = tokio::signal::unix::Signal;
#[cfg(windows)]
type InterruptStream = tokio::signal::windows::CtrlC;

#[cfg(unix)]
fn register_interrupt() -> io::Result<InterruptStream> {
    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
}

#[cfg(windows)]
fn register_interrupt() -> io::Result<InterruptStream> {
    tokio::signal::windows::ctrl_c()
}

/// Flips `cancel` on the first Ctrl-C and exits on the second. The handler is
/// installed before this returns; waiting happens on its own thread with a
/// current-thread runtime so the install itself stays synchronous.
pub(crate) fn spawn_interrupt_listener(cancel: CancelToken) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start interrupt listener runtime")?;
    let mut interrupts = {
        let _guard = runtime.enter();
        register_interrupt().context("failed to install interrupt handler")?
    };

    thread::Builder::new()
        .name("skillkit-interrupt".to_string())
        .spawn(move || {
            runtime.block_on(async {
                if interrupts.recv().await.is_none() {
                    return;
                }
                warn!("interrupt received; stopping and rolling back");
                cancel.cancel();

                if interrupts.recv().await.is_some() {
                    eprintln!("second interrupt received; exiting without finishing rollback");
                    process::exit(FORCED_EXIT_CODE);
                }
            });
        })
        .context("failed to spawn interrupt listener")?;
    Ok(())
}
