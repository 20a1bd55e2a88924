//! Camera capture sessions with a latest-frame display slot and a
//! back-pressured analysis stage.

pub mod capture;
pub mod config;
pub mod display;
pub mod error;
pub mod events;
pub mod host;
pub mod pipeline;

pub use error::{ErrorKind, SessionError};
