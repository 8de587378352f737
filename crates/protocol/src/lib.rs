//! Wire types for the Reef command protocol.
//!
//! This crate contains the serde-serializable types shared between the
//! driver and the server: session identifiers and command documents as
//! they appear on the wire.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! - **Pure data**: No behavior beyond serialization/deserialization and
//!   small constructors
//! - **1:1 with protocol**: Match the shapes the server expects
//! - **Stable**: Changes only when the wire protocol changes
//!
//! The session lifecycle machinery built on top of these types lives in
//! `reef-driver`.

pub mod command;
pub mod types;

pub use command::*;
pub use types::*;
