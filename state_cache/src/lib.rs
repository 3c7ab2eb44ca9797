pub use crate::state_cache::StateCache;

mod state_cache;
