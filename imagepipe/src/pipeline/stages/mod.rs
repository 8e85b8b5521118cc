//! Concrete pipeline stages.

mod decode;
mod fetch;
mod memory;
mod warm;

pub use decode::DecodeStage;
pub use fetch::FetchStage;
pub use memory::MemoryCacheStage;
pub use warm::WarmStage;
