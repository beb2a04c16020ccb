pub mod circuit_breaker;
pub mod cli;
pub mod conf;
pub mod control_plane;
pub mod degradation;
pub mod events;
pub mod health;
pub mod logging;

pub use control_plane::{BREAKERS_COMPONENT, ControlPlane, ControlPlaneBuilder};
pub use events::{ControlPlaneEvent, EventBus};
