//! Clarification round counting

use super::{Role, Turn};

/// Clarification rounds completed in a conversation, at most `max_rounds`.
///
/// A round is an assistant turn containing '?' answered by the next user
/// turn; the message being handled counts as the user turn after the last
/// history entry. Of several assistant turns in a row only the last can
/// pair with a user turn.
pub fn count_clarification_rounds(history: &[Turn], max_rounds: usize) -> usize {
    let rounds = history
        .iter()
        .enumerate()
        .filter(|(i, turn)| {
            turn.is_question()
                && history
                    .get(i + 1)
                    .map_or(true, |next| next.role == Role::User)
        })
        .count();
    rounds.min(max_rounds)
}
