//! Daemon module - main event loop orchestration
//!
//! Startup mutes the default source, opens the input devices and then
//! drains the merged event queue one event at a time through the engine.
//! Every exit path, whether a signal, a failed startup step, a closed
//! event queue or an unwinding panic, ends with the default source muted
//! again.

use crate::audio::{self, AudioControl};
use crate::config::Config;
use crate::engine::Engine;
use crate::error::{InputError, MicgateError, Result};
use crate::input::{self, RawEvent};
use crate::rules::Bindings;
use pidlock::Pidlock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::mpsc;

/// Keeps the microphone muted outside the daemon's lifetime
///
/// Acquiring mutes the default source; releasing mutes it again, querying
/// the source fresh. Release runs at most once. A guard dropped without
/// `release()` (early return, panic) performs the release on a private
/// runtime in `Drop`.
pub struct MuteGuard {
    control: Arc<dyn AudioControl>,
    released: AtomicBool,
}

impl MuteGuard {
    /// Mute the default source and arm the exit mute
    pub async fn acquire(control: Arc<dyn AudioControl>) -> Self {
        match audio::mute_default_source(control.as_ref()).await {
            Some(source) => tracing::info!("Default source: {} (muted initially)", source),
            None => tracing::warn!("Could not determine default source at startup"),
        }

        Self {
            control,
            released: AtomicBool::new(false),
        }
    }

    /// Run the exit mute now
    pub async fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }

        if audio::mute_default_source(self.control.as_ref()).await.is_some() {
            tracing::info!("Mic muted on exit");
        }
    }
}

impl Drop for MuteGuard {
    fn drop(&mut self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::warn!("Daemon exiting abnormally, muting mic");
        let control = Arc::clone(&self.control);

        // Cannot block_on inside the caller's runtime; use a fresh one on
        // its own thread.
        let handle = std::thread::spawn(move || {
            match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => {
                    runtime.block_on(audio::mute_default_source(control.as_ref()));
                }
                Err(e) => tracing::error!("Failed to build runtime for exit mute: {}", e),
            }
        });
        let _ = handle.join();
    }
}

/// Hold the single-instance lock
fn acquire_instance_lock() -> Result<Pidlock> {
    let dir = Config::runtime_dir();
    std::fs::create_dir_all(&dir)?;

    let lock_path = dir.join("micgate.lock");
    let lock_path_str = lock_path.to_string_lossy().to_string();
    let mut lock = Pidlock::new(&lock_path_str);

    match lock.acquire() {
        Ok(_) => {
            tracing::debug!("Acquired instance lock: {:?}", lock_path);
            Ok(lock)
        }
        Err(_) => Err(MicgateError::AlreadyRunning(lock_path_str)),
    }
}

/// Shutdown signals, registered before the first mute
struct Signals {
    interrupt: Signal,
    terminate: Signal,
    hangup: Signal,
}

impl Signals {
    /// Wait for the next shutdown signal and name it
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.hangup.recv() => "SIGHUP",
        }
    }
}

/// Why the event loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    Signal(&'static str),
    QueueClosed,
}

/// Drain the event queue through the engine until shutdown
///
/// `shutdown` resolves when the process is asked to stop.
pub async fn event_loop<F>(
    engine: &mut Engine,
    events: &mut mpsc::UnboundedReceiver<RawEvent>,
    shutdown: F,
) -> Shutdown
where
    F: std::future::Future<Output = &'static str>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(event) => {
                        engine.handle_event(&event).await;
                    }
                    None => return Shutdown::QueueClosed,
                }
            }

            name = &mut shutdown => {
                return Shutdown::Signal(name);
            }
        }
    }
}

/// Main daemon that orchestrates all components
pub struct Daemon {
    config: Config,
    control: Arc<dyn AudioControl>,
}

impl Daemon {
    /// Create a new daemon with the given configuration
    pub fn new(config: Config) -> Self {
        let control: Arc<dyn AudioControl> = Arc::from(audio::create_control(&config.audio));
        Self { config, control }
    }

    /// Run the daemon main loop
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!("Starting micgate daemon");

        // Configuration problems are reported before anything is touched
        self.config.validate()?;
        let bindings = Bindings::from_config(&self.config.binds)?;
        tracing::info!(
            "{} chord(s) bound over keys: {}",
            bindings.len(),
            bindings
                .keys_of_interest()
                .into_iter()
                .collect::<Vec<_>>()
                .join(", ")
        );
        if bindings.is_empty() {
            tracing::warn!("No chords bound in [binds], the mic will stay muted");
        }
        for (chord, rules) in bindings.entries() {
            tracing::debug!("  {} = {}", chord, rules);
        }

        let mut lock = acquire_instance_lock()?;

        // Set up signal handlers before the mic is touched
        let mut signals = Signals {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
        };

        tracing::info!("Audio control: {}", self.control.name());
        let guard = MuteGuard::acquire(Arc::clone(&self.control)).await;

        let result = self.listen(bindings, &mut signals).await;

        guard.release().await;
        if let Err(e) = lock.release() {
            tracing::warn!("Failed to release instance lock: {:?}", e);
        }

        tracing::info!("Daemon stopped");
        result
    }

    async fn listen(&self, bindings: Bindings, signals: &mut Signals) -> Result<()> {
        let mut source = input::create_source(&self.config.devices)?;
        let mut events = source.start().await?;
        tracing::info!("Monitoring: {}", source.device_names().join(", "));

        let mut engine = Engine::new(
            bindings,
            Arc::clone(&self.control),
            self.config.audio.target_volume,
        );

        let reason = event_loop(&mut engine, &mut events, signals.recv()).await;
        source.stop().await?;

        match reason {
            Shutdown::Signal(name) => {
                tracing::info!("Received {}, shutting down...", name);
                Ok(())
            }
            Shutdown::QueueClosed => {
                tracing::error!("All input devices closed");
                Err(InputError::AllDevicesClosed.into())
            }
        }
    }
}
