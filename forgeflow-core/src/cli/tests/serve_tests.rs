use crate::cli::serve_until;
use crate::health::LivenessChecker;
use crate::{ControlPlane, ControlPlaneEvent};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tokio::sync::oneshot;

#[tokio::test]
async fn relays_notifications_until_shutdown_resolves() {
    // Arrange
    let plane = ControlPlane::builder()
        .component("api", Arc::new(LivenessChecker::new(|| async { true })))
        .build()
        .unwrap();
    let events = plane.events().clone();
    let (stop, stopped) = oneshot::channel::<()>();

    // Act
    let driver = async move {
        tokio::task::yield_now().await;
        for level in [2, 3] {
            events.publish(ControlPlaneEvent::UserNotification {
                level,
                message: "System operating in degraded mode".to_string(),
            });
            events.publish(ControlPlaneEvent::EmergencyDeactivated { health: 80.0 });
        }
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        let _ = stop.send(());
    };
    let (relayed, ()) = tokio::join!(serve_until(&plane, stopped), driver);

    // Assert
    assert_eq!(relayed, 2);
    assert!(plane.monitor().perform_health_check().await.is_err());
}
