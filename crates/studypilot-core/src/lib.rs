pub mod clock;
pub mod config;
pub mod error;
pub mod extract;
pub mod flashcards;
pub mod generation;
pub mod intervention;
pub mod mode;
pub mod orchestrator;
pub mod prompt;
pub mod relevance;
pub mod router;
pub mod suggestions;

pub use clock::*;
pub use config::*;
pub use error::*;
pub use extract::*;
pub use flashcards::*;
pub use generation::*;
pub use intervention::*;
pub use mode::*;
pub use orchestrator::*;
pub use prompt::*;
pub use relevance::*;
pub use router::*;
pub use suggestions::*;
