//! Chat view helpers for the support conversations attached to shipments.
//!
//! Grouping is a pure function of the message list: it borrows its input,
//! never mutates it, and is cheap enough to recompute on every render.

pub mod grouping;

pub use grouping::{DayBucket, GROUP_WINDOW_MINUTES, MessageGroup, group_messages, group_messages_in};
