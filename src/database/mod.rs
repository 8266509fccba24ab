pub mod memory;

pub use memory::MemoryRepository;
