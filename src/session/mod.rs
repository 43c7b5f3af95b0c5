//! Session lifecycle module
//!
//! Creates, isolates and tears down one browser session per worker:
//! capability resolution, backend selection (local driver server, grid hub,
//! cloud provider), and the worker-keyed registry.

mod backend;
mod capabilities;
mod registry;
mod session;

pub use backend::{SessionFactory, WebDriverBackend};
pub use capabilities::build_capabilities;
pub use registry::{SessionRegistry, WorkerId};
pub use session::{EffectiveTimeouts, Session, SessionInfo, SessionSnapshot};
