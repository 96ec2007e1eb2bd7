//! Session and command-dispatch core for a multi-tab terminal front-end.
//!
//! Each tab is a [`session::Session`] owned by the [`registry::SessionRegistry`].
//! Submitted lines are classified by [`router`] into a local directive or a
//! process invocation, and results are folded back into the tab's state.

pub mod collaborators;
pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod history;
pub mod registry;
pub mod router;
pub mod session;
pub mod utils;
