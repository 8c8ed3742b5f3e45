//! Durable state for issued passcodes.

mod backend;
mod memory;
mod record;

pub use backend::{InsertOutcome, OtpStore};
pub use memory::MemoryStore;
pub use record::OtpRecord;
