use crate::control_plane::ControlPlane;
use crate::events::ControlPlaneEvent;
use std::future::Future;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Starts the control plane and relays user notifications to stderr until
/// `shutdown` resolves, then shuts the plane down.
///
/// Returns the number of notifications relayed.
pub async fn serve_until<F: Future>(plane: &ControlPlane, shutdown: F) -> u64 {
    let mut events = plane.events().subscribe();
    plane.start();

    tokio::pin!(shutdown);
    let mut relayed = 0;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested");
                break;
            }
            event = events.recv() => match event {
                Ok(ControlPlaneEvent::UserNotification { level, message }) => {
                    eprintln!("[forgeflow] level {level}: {message}");
                    relayed += 1;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    plane.shutdown().await;
    relayed
}
