pub mod fast_map;
pub mod intern;

pub use fast_map::{FastHashMap, fast_hash_map_new};
pub use intern::{Interner, Name};
