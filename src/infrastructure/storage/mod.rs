//! File-backed stores: the versioned prompts file and the iteration history

pub mod atomic;
pub mod history;
pub mod prompt_store;

pub use history::HistoryLedger;
pub use prompt_store::PromptStore;
