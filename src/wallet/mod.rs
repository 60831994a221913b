pub mod engine;
pub mod sync;
pub mod types;

pub use engine::WalletEngine;
pub use sync::RescanOrchestrator;
pub use types::*;
