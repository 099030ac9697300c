pub mod chunked;
pub mod graph;
pub mod memory;

pub use graph::GraphClient;
pub use memory::MemoryStore;
