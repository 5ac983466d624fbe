//! Glk Bridge Library
//!
//! The window, stream and event model of a Glk library, split between an
//! interpreter thread and a presentation thread. This crate provides:
//!
//! - `core`: Tags, the window tree, streams, file references, snapshots and archives
//! - `event`: Events, the cross-thread coordinator, the interpreter session and timers
//! - `host`: Interfaces the presentation layer implements
//! - `app`: Configuration and a sample program
//!
//! The interpreter owns a [`core::Library`] through an [`event::Session`]
//! and blocks only in `select`. The presentation side reads immutable
//! [`core::LibraryState`] snapshots and answers through the
//! [`event::Coordinator`].

pub mod app;
pub mod core;
pub mod error;
pub mod event;
pub mod host;

pub use crate::core::{Library, LibraryState, Settings, Tag};
pub use error::{GlkError, Result};
pub use event::{spawn_worker, Coordinator, Event, Session, UiEvent};
