// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property-based tests for the core invariants: target interning, the
//! state machine's monotonicity, environment overlay slots, and header
//! parsing.

use std::sync::Arc;

use proptest::prelude::*;

use nexec_core::ExecutionTarget;
use nexec_process::{EnvOverlay, HeaderBlock, ProcessState, StateCell};

// ── Config ──────────────────────────────────────────────────────────────

fn fast_config() -> ProptestConfig {
    ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    }
}

// ── Strategies ──────────────────────────────────────────────────────────

fn arb_state() -> BoxedStrategy<ProcessState> {
    prop_oneof![
        Just(ProcessState::Initial),
        Just(ProcessState::Starting),
        Just(ProcessState::Running),
        Just(ProcessState::Finishing),
        Just(ProcessState::Finished),
        Just(ProcessState::Cancelled),
        Just(ProcessState::Error),
    ]
    .boxed()
}

fn arb_hostname() -> BoxedStrategy<String> {
    "[a-z][a-z0-9-]{0,20}(\\.[a-z]{2,5}){0,2}".boxed()
}

#[derive(Clone, Debug)]
enum OverlayOp {
    Put(String, String),
    Remove(String),
}

fn arb_overlay_ops() -> BoxedStrategy<Vec<OverlayOp>> {
    let key = "[A-Z][A-Z0-9_]{0,8}";
    let value = "[a-zA-Z0-9/_.-]{0,12}";
    prop::collection::vec(
        prop_oneof![
            (key, value).prop_map(|(k, v)| OverlayOp::Put(k, v)),
            key.prop_map(OverlayOp::Remove),
        ],
        0..24,
    )
    .boxed()
}

// ── Target interning ────────────────────────────────────────────────────

proptest! {
    #![proptest_config(fast_config())]

    #[test]
    fn target_key_round_trip_is_reference_equal(
        user in "[a-z]{1,8}",
        host in arb_hostname(),
        port in 1u16..,
    ) {
        let target = ExecutionTarget::create(&user, &host, port);
        let back = ExecutionTarget::from_key(&target.to_key());
        prop_assert!(Arc::ptr_eq(&target, &back));
        prop_assert_eq!(&*target, &*back);
    }

    #[test]
    fn remote_targets_never_report_local(
        user in "[a-z]{1,8}",
        host in "[a-z]{1,12}\\.example\\.com",
        port in 1u16..,
    ) {
        let target = ExecutionTarget::create(&user, &host, port);
        prop_assert!(!target.is_local());
        prop_assert_ne!(&*target, &*ExecutionTarget::local());
    }
}

// ── State machine ───────────────────────────────────────────────────────

proptest! {
    #![proptest_config(fast_config())]

    /// Whatever sequence of transitions is attempted, the first terminal
    /// state sticks and every later attempt is rejected.
    #[test]
    fn first_terminal_state_latches(transitions in prop::collection::vec(arb_state(), 1..32)) {
        let cell = StateCell::new();
        let mut latched: Option<ProcessState> = None;
        for next in transitions {
            let accepted = cell.set(next);
            match latched {
                Some(terminal) => {
                    prop_assert!(!accepted);
                    prop_assert_eq!(cell.get(), terminal);
                }
                None => {
                    prop_assert!(accepted);
                    prop_assert_eq!(cell.get(), next);
                    if next.is_terminal() {
                        latched = Some(next);
                    }
                }
            }
        }
    }
}

// ── Environment overlay ─────────────────────────────────────────────────

proptest! {
    #![proptest_config(fast_config())]

    /// The overlay keeps exactly one slot per key and the last operation
    /// on a key decides its visible value.
    #[test]
    fn overlay_keeps_one_slot_per_key(ops in arb_overlay_ops()) {
        let mut overlay = EnvOverlay::default();
        let mut model = std::collections::HashMap::<String, Option<String>>::new();
        for op in &ops {
            match op {
                OverlayOp::Put(k, v) => {
                    overlay.put(k.clone(), v.clone());
                    model.insert(k.clone(), Some(v.clone()));
                }
                OverlayOp::Remove(k) => {
                    overlay.remove(k.clone());
                    model.insert(k.clone(), None);
                }
            }
        }
        prop_assert_eq!(overlay.pairs().count(), model.len());
        for (key, expected) in &model {
            prop_assert_eq!(overlay.get(key), expected.as_deref());
        }
    }
}

// ── Header parsing ──────────────────────────────────────────────────────

proptest! {
    #![proptest_config(fast_config())]

    /// Entries before the blank line are preserved in order; everything
    /// after it is ignored.
    #[test]
    fn header_text_stops_at_the_blank_line(
        entries in prop::collection::vec(("[A-Z]{1,8}", "[a-zA-Z0-9/_.-]{0,12}"), 0..8),
        trailing in "[a-zA-Z0-9=_. -]{0,40}",
    ) {
        let mut text = String::new();
        for (name, value) in &entries {
            text.push_str(&format!("{name}={value}\n"));
        }
        text.push('\n');
        text.push_str(&trailing);

        let block = HeaderBlock::parse_text(&text);
        prop_assert_eq!(block.entries().len(), entries.len());
        for (parsed, original) in block.entries().iter().zip(&entries) {
            prop_assert_eq!(&parsed.0, &original.0);
            prop_assert_eq!(&parsed.1, &original.1);
        }
    }
}
