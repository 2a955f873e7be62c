use quotesmith_core::{InvocationStrategy, Role};

use crate::input::RoleInput;

/// Documents longer than this many characters are extracted through a tool call.
pub const STRUCTURED_THRESHOLD_CHARS: usize = 1000;

/// Chooses how `role` should be invoked for `input`.
///
/// Only the analyst switches to structured invocation, and only for long
/// documents. Everything else stays freeform.
pub fn select_strategy(role: Role, input: &RoleInput) -> InvocationStrategy {
    strategy_for_document_len(role, input.document().chars().count())
}

pub fn strategy_for_document_len(role: Role, document_chars: usize) -> InvocationStrategy {
    match role {
        Role::Analyst if document_chars > STRUCTURED_THRESHOLD_CHARS => {
            InvocationStrategy::Structured
        }
        Role::Orchestrator | Role::Analyst | Role::Generator => InvocationStrategy::Freeform,
    }
}

#[cfg(test)]
mod tests {
    use quotesmith_core::{InvocationStrategy, Role};

    use super::select_strategy;
    use crate::input::RoleInput;

    fn document(len: usize) -> RoleInput {
        RoleInput::new().with("document", "x".repeat(len))
    }

    #[test]
    fn analyst_switches_to_structured_above_threshold() {
        for len in [1001, 5000] {
            assert_eq!(
                select_strategy(Role::Analyst, &document(len)),
                InvocationStrategy::Structured,
                "len {len}"
            );
        }
        for len in [0, 1000] {
            assert_eq!(
                select_strategy(Role::Analyst, &document(len)),
                InvocationStrategy::Freeform,
                "len {len}"
            );
        }
    }

    #[test]
    fn other_roles_are_always_freeform() {
        for len in [0, 1000, 1001, 5000, 50_000] {
            assert_eq!(
                select_strategy(Role::Orchestrator, &document(len)),
                InvocationStrategy::Freeform
            );
            assert_eq!(
                select_strategy(Role::Generator, &document(len)),
                InvocationStrategy::Freeform
            );
        }
    }

    #[test]
    fn threshold_counts_characters_not_bytes() {
        let input = RoleInput::new().with("document", "é".repeat(1000));
        assert_eq!(select_strategy(Role::Analyst, &input), InvocationStrategy::Freeform);
    }
}
