//! Property-based invariant tests for the inline style model and bounded polls.
//!
//! 1. Serialization is a fixed point of parsing (parse ∘ print ∘ parse = parse).
//! 2. Setting a property never disturbs other declarations.
//! 3. Removing a just-set property restores the declaration set.
//! 4. Every bounded poll over a never-true condition terminates.
//! 5. Timeout polls never schedule a check past their deadline.

use core::time::Duration;

use guidepost_core::poll::{BoundedPoll, PollOutcome};
use guidepost_core::style::InlineStyle;
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

fn property_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "color",
        "margin-top",
        "display",
        "opacity",
        "visibility",
        "pointer-events",
        "transform",
        "z-index",
    ])
    .prop_map(str::to_string)
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9#%.-]{1,10}"
}

fn decl_strategy() -> impl Strategy<Value = (String, String, bool)> {
    (property_strategy(), value_strategy(), any::<bool>())
}

fn style_text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(decl_strategy(), 0..6).prop_map(|decls| {
        decls
            .into_iter()
            .map(|(p, v, imp)| {
                if imp {
                    format!("{p}:{v} !important")
                } else {
                    format!("{p}: {v}")
                }
            })
            .collect::<Vec<_>>()
            .join(";")
    })
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Print is a fixed point of parse
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn parse_print_fixed_point(text in style_text_strategy()) {
        let parsed = InlineStyle::parse(&text);
        let reparsed = InlineStyle::parse(&parsed.to_css_text());
        prop_assert_eq!(parsed, reparsed);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Set leaves other declarations alone
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn set_is_local(text in style_text_strategy(), (prop, value, imp) in decl_strategy()) {
        let before = InlineStyle::parse(&text);
        let mut after = before.clone();
        after.set(&prop, &value, imp);

        for decl in before.iter().filter(|d| d.property != prop) {
            prop_assert_eq!(after.get(&decl.property), Some(decl));
        }
        prop_assert_eq!(after.value(&prop), Some(value.as_str()));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Set-then-remove of a fresh property is an identity
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn set_remove_fresh_property_identity(text in style_text_strategy(), value in value_strategy()) {
        let before = InlineStyle::parse(&text);
        let mut after = before.clone();
        after.set("--guidepost-probe", &value, true);
        after.remove("--guidepost-probe");
        prop_assert_eq!(before.to_css_text(), after.to_css_text());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4–5. Bounded polls terminate within their bound
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn timeout_poll_terminates(interval_ms in 1u64..500, timeout_ms in 0u64..5000) {
        let interval = Duration::from_millis(interval_ms);
        let timeout = Duration::from_millis(timeout_ms);
        let mut now = Duration::ZERO;
        let mut poll = BoundedPoll::with_timeout(now, interval, timeout);
        let mut checks = 0u64;
        loop {
            checks += 1;
            match poll.check(now, false) {
                PollOutcome::Pending { retry_in } => {
                    now += retry_in;
                    prop_assert!(now <= timeout);
                }
                PollOutcome::Exhausted => break,
                PollOutcome::Ready => prop_assert!(false, "never-true condition reported ready"),
            }
        }
        prop_assert_eq!(now, timeout);
        prop_assert!(checks <= timeout_ms / interval_ms + 2);
    }

    #[test]
    fn attempt_poll_terminates(max in 1u32..50) {
        let mut poll = BoundedPoll::with_attempts(Duration::ZERO, Duration::from_millis(10), max);
        let mut now = Duration::ZERO;
        let mut checks = 0u32;
        while let PollOutcome::Pending { retry_in } = poll.check(now, false) {
            now += retry_in;
            checks += 1;
        }
        prop_assert_eq!(checks + 1, max);
    }
}
