//! Test doubles for code that depends on the engine.
mod memory_store;

pub use memory_store::MemoryCounterStore;
