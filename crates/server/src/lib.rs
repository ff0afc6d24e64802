//! Runtime of the OSC bridge: the reactor that owns the fact store, the
//! listener feeding it, and the assembly that wires sources, rules and tasks
//! into one running [`Bridge`].

pub mod bridge;
pub mod listener;
pub mod reactor;

pub use bridge::Bridge;
pub use listener::Listener;
pub use reactor::Reactor;
