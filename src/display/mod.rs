//! Display-side frame access

pub mod frame_slot;
pub mod sources;

pub use frame_slot::{FrameReader, FrameSlot};
pub use sources::FrameSources;
