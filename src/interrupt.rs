//! Ctrl-C handling for long-running capture loops.

use std::io;
use std::process;
use std::thread;

use tokio::runtime::Builder;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

use crate::session::StopSignal;

/// Exit status after a second interrupt (128 + SIGINT).
const EXIT_INTERRUPTED: i32 = 130;

/// Fire `stop` when the process receives SIGINT.
///
/// The handler is registered before this returns. From then on the first
/// Ctrl-C only fires `stop`, so the loop can finish its current frame and
/// release the camera. A second Ctrl-C exits at once.
pub fn stop_on_interrupt(stop: StopSignal) -> io::Result<()> {
    let runtime = Builder::new_current_thread().enable_all().build()?;
    let mut interrupts = {
        let _guard = runtime.enter();
        signal(SignalKind::interrupt())?
    };

    thread::Builder::new()
        .name("interrupt".to_owned())
        .spawn(move || {
            runtime.block_on(async {
                if interrupts.recv().await.is_none() {
                    return;
                }
                info!("interrupt received, stopping");
                stop.stop();

                if interrupts.recv().await.is_some() {
                    warn!("second interrupt, exiting without cleanup");
                    process::exit(EXIT_INTERRUPTED);
                }
            });
        })?;
    Ok(())
}
