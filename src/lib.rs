pub mod config;
pub mod context;
pub mod engine;
pub mod message;
pub mod network;
pub mod scene;

use config::RigConfig;
use engine::{Engine, RunSummary};
use network::listener::{ListenerError, UdpListener};
use scene::RecordingSceneBackend;

/// Binds the listener described by `config` and runs the engine against an
/// in-memory scene until the configured frame budget or shutdown.
pub fn run(config: RigConfig) -> Result<RunSummary, ListenerError> {
    let (sender, inbox) = network::inbox();
    let listener = UdpListener::bind(&config.listener, sender)?;
    log::info!(
        "[rig] listening for BehaviorMate messages on {}",
        listener.local_addr()
    );
    let handle = listener.spawn()?;

    let mut engine = Engine::new(&config.engine, inbox, RecordingSceneBackend::default());
    let summary = engine.run();

    let diagnostics = handle.metrics_handle().snapshot();
    log::info!(
        "[rig] listener saw {} datagrams ({} bytes, {} undecodable)",
        diagnostics.datagrams_received,
        diagnostics.bytes_received,
        diagnostics.decode_failures
    );
    handle.shutdown();
    Ok(summary)
}
