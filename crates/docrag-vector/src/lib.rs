//! Exact nearest-neighbour index over unit vectors, its on-disk blob, and the
//! shared handle that readers and rebuilds go through.

pub mod flat;
pub mod persist;
pub mod shared;

pub use flat::{EntryView, FlatIndex};
pub use persist::{INDEX_MAGIC, INDEX_VERSION};
pub use shared::SharedIndex;
