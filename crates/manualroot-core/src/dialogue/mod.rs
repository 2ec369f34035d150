//! Dialogue module
//!
//! Provides:
//! - Conversation turns and cited sources
//! - Clarification round counting
//! - Pre-search gates and generated-question validation
//! - The per-turn dialogue policy

mod gates;
mod policy;
pub mod prompts;
mod rounds;
mod turn;
mod validate;

pub use gates::{
    is_greeting, is_short_or_generic, is_technical, last_assistant_asked, requires_identification,
};
pub use policy::{DialoguePolicy, PolicyResponse, PolicyState};
pub use rounds::count_clarification_rounds;
pub use turn::{Role, Source, Turn};
pub use validate::{check_question, is_valid_question, normalize_assistant_text, QuestionDefect};
