//! Session
//!
//! The per-session context, the events that drive it, the screen it
//! projects and the loop that feeds it.

mod context;
mod event;
mod event_loop;
mod view;

pub use context::Session;
pub use event::{Command, Event, ParamChange, TransportCommand};
pub use event_loop::EventLoop;
pub use view::{CoverView, PlayerView, PlaylistRow, Screen};
