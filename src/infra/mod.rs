pub mod appwrite;
pub mod in_memory;
pub mod urls;

pub use appwrite::AppwriteBackend;
pub use in_memory::InMemoryBackend;
