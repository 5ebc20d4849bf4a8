//! Transport plumbing shared by world instances and their controllers.
//!
//! - [`DiscoveryBus`]: namespaces become visible here once a world's
//!   communication endpoints exist. Visibility order is advertisement order.
//! - [`ControlChannel`]: external commands (pause/unpause) delivered to
//!   registered callbacks on the channel's own delivery thread.

mod control;
mod discovery;

pub use control::{ControlChannel, ControlMessage};
pub use discovery::DiscoveryBus;
