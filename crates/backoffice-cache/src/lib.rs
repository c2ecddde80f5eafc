//! Client-side read cache for back-office data.
//!
//! Slots are addressed by a [`CacheKey`] (an ordered tuple of strings) and
//! hold opaque JSON records or arrays of them. Writers go through
//! [`CacheStore::set_query_data`] with an updater closure; readers see the
//! latest value through [`CacheStore::get_query_data`].

pub mod key;
pub mod merge;
pub mod store;

pub use key::CacheKey;
pub use store::{CacheChange, CacheStore, QueryCache};
