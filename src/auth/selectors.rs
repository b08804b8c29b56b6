//! Named selector strategies for the login and two-factor steps
//!
//! Each step tries its strategies in the order listed here, so element
//! resolution is deterministic: the first strategy that resolves wins.

use crate::driver::traits::{Selector, SelectorStrategy};

/// Strategies for the account identifier field
pub fn identifier_fields() -> Vec<SelectorStrategy> {
    vec![
        SelectorStrategy::new("email-id", Selector::css("#email")),
        SelectorStrategy::new("email-name", Selector::css("input[name='email']")),
        SelectorStrategy::new("text-input", Selector::css("input[type='text']")),
    ]
}

/// Strategies for the password field
pub fn secret_fields() -> Vec<SelectorStrategy> {
    vec![
        SelectorStrategy::new("pass-id", Selector::css("#pass")),
        SelectorStrategy::new("pass-name", Selector::css("input[name='pass']")),
        SelectorStrategy::new("password-input", Selector::css("input[type='password']")),
    ]
}

/// Strategies for the login submit control
pub fn submit_controls() -> Vec<SelectorStrategy> {
    vec![
        SelectorStrategy::new("login-name", Selector::css("button[name='login']")),
        SelectorStrategy::new("submit-type", Selector::css("button[type='submit']")),
        SelectorStrategy::new("login-text", Selector::text("Log in")),
    ]
}

/// Strategies that signal a two-factor prompt is present
pub fn two_factor_fields() -> Vec<SelectorStrategy> {
    vec![
        SelectorStrategy::new("approvals-id", Selector::css("#approvals_code")),
        SelectorStrategy::new(
            "approvals-name",
            Selector::css("input[name='approvals_code']"),
        ),
        SelectorStrategy::new(
            "one-time-code",
            Selector::css("input[autocomplete='one-time-code']"),
        ),
    ]
}

/// Strategies for the two-factor submit control
pub fn two_factor_submit() -> Vec<SelectorStrategy> {
    vec![
        SelectorStrategy::new(
            "checkpoint-submit",
            Selector::css("#checkpointSubmitButton"),
        ),
        SelectorStrategy::new("submit-type", Selector::css("button[type='submit']")),
        SelectorStrategy::new("continue-text", Selector::text("Continue")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_order_is_stable() {
        // The precedence order is part of the contract: id selectors first,
        // generic type selectors last.
        let names: Vec<&str> = identifier_fields().iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["email-id", "email-name", "text-input"]);

        let names: Vec<&str> = two_factor_fields().iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["approvals-id", "approvals-name", "one-time-code"]);
    }

    #[test]
    fn test_all_steps_have_strategies() {
        assert!(!identifier_fields().is_empty());
        assert!(!secret_fields().is_empty());
        assert!(!submit_controls().is_empty());
        assert!(!two_factor_fields().is_empty());
        assert!(!two_factor_submit().is_empty());
    }
}
