//! Host-facing event stream

mod events;
pub mod sink;

pub use events::SessionEvent;
pub use sink::{EventSink, SessionScope};
