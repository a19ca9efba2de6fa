//! Cover mode
//!
//! The disguise: a key-driven two-state machine and the asset it shows.

pub mod asset;
pub mod keys;
pub mod state;

pub use asset::{AssetKind, DisplayHandle, PanicAsset, DOCX_MIME};
pub use keys::{Key, KeyEvent, TriggerKey};
pub use state::{transition, CoverController, CoverState, Transition};
