//! Core business logic abstractions

pub mod config;
pub mod error;
pub mod log;
pub mod quote;
pub mod refresh;
pub mod session;

// Re-export main types for cleaner imports
pub use error::{ErrorInfo, ErrorKind, FetchError};
pub use quote::{CurrencyPair, DisplayRecord, QuoteProvider};
pub use refresh::{Effect, Msg, Phase, QuoteView, RefreshState, update};
pub use session::QuoteSession;
