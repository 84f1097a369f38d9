use std::{path::Path, sync::Arc, time::Duration};

use engine::{Engine, Show};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use transport::{UdpListener, UdpTransport};

mod config;

use config::load_settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = load_settings();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&settings.log_filter))
        .init();

    let show = load_show(&settings.show_path);
    let transport = UdpTransport::bind().await.map_err(|error| {
        error!(%error, "failed to open send socket");
        error
    })?;
    let engine = Arc::new(Engine::new(show, Arc::new(transport), settings.send_port));

    let listener = UdpListener::bind(settings.listen_port)
        .await
        .map_err(|error| {
            error!(
                port = settings.listen_port,
                %error,
                "failed to bind listen port; is another controller running?"
            );
            error
        })?;
    info!(port = settings.listen_port, "controller listening");
    let receive_loop = tokio::spawn(serve(listener, engine.clone()));

    start_show(&engine, Duration::from_millis(settings.startup_delay_ms)).await;

    receive_loop.await?;
    Ok(())
}

/// A show that cannot be read still leaves a running controller, with an
/// empty device table and no cues.
fn load_show(path: &Path) -> Show {
    match Show::load(path) {
        Ok(show) => {
            for entry in &show.skipped {
                warn!(%entry, "show entry skipped");
            }
            show
        }
        Err(error) => {
            error!(%error, "running without a show");
            Show::default()
        }
    }
}

async fn serve(listener: UdpListener, engine: Arc<Engine>) {
    listener
        .run(|datagram| {
            let engine = engine.clone();
            async move {
                engine
                    .on_message(&datagram.payload, datagram.sender.ip())
                    .await;
            }
        })
        .await;
}

/// Waits for players to come up, runs startup cues, then starts keep-alive.
async fn start_show(engine: &Engine, delay: Duration) {
    if !delay.is_zero() {
        info!(delay_ms = delay.as_millis() as u64, "waiting before startup cues");
        tokio::time::sleep(delay).await;
    }
    engine.run_startup_cues().await;
    engine.start_schedulers().await;
    info!(
        schedulers = engine.schedulers().len(),
        "startup complete"
    );
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
