//! mpvlink Core Library
//!
//! Runtime binding to the mpv playback engine's C ABI. Nothing links against
//! the engine at build time: the shared library is loaded by name, entry
//! points are resolved per symbol, and every argument list and tagged value
//! is marshaled into the engine's binary layouts with call-scoped ownership.
//!
//! # Architecture
//!
//! This library is the marshaling core a UI shell drives; the shell only
//! supplies a native window id and invokes the operations below in response
//! to user actions.
//!
//! ## Loading (`library` module)
//! - [`EngineLibrary::load`] / [`EngineLibrary::load_default`] - load the
//!   engine shared library and resolve its entry points once
//! - A missing library degrades every operation to a no-op; a missing symbol
//!   stays `None` in the entry set and is never invoked
//!
//! ## Marshaling (`codec`, `args`, `node` modules)
//! - [`codec`] - UTF-8 plus trailing zero byte, both directions
//! - [`ArgBuffer`] - sentinel-terminated string-pointer arrays for flat
//!   commands
//! - [`NodeValue`] / [`NodeTree`] - the recursive tagged value for node
//!   commands; construction and release are mirror-image walks
//!
//! ## Driving the engine (`session`, `properties`, `player` modules)
//! - [`Session`] - create → initialize → use → terminate-destroy, exactly
//!   once each
//! - Property access per format tag, with engine-owned output buffers
//!   released through the engine's own free entry point
//! - [`Player`] - at most one live session, recreated per play request
//!
//! # Memory Management
//!
//! Two ownership categories that must never be conflated:
//! - Buffers this side allocates to encode a call's arguments are owned by
//!   that call and freed before it returns, success or failure
//! - Buffers the engine allocates and hands back are owned by the engine and
//!   released through its `free` entry point

pub mod args;
pub mod codec;
pub mod error;
pub mod ffi;
pub mod library;
pub mod node;
pub mod player;
pub mod properties;
pub mod session;

pub use args::ArgBuffer;
pub use error::{Error, Result, Status};
pub use ffi::{EntryPoints, Format};
pub use library::EngineLibrary;
pub use node::{NodeTree, NodeValue};
pub use player::{PlaybackStatus, Player};
pub use session::{Session, SessionState};
