//! Exam-grade flashcard generation: type planning, prompting and validation.

pub mod distribution;
pub mod engine;
pub mod prompts;
pub mod validator;

pub use distribution::*;
pub use engine::*;
pub use validator::*;
