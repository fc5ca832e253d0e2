// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use proptest::prelude::*;

use super::strip_ansi;

#[test]
fn removes_color_sequences() {
    assert_eq!(strip_ansi("\x1b[31mhello\x1b[0m world"), "hello world");
}

#[test]
fn passes_plain_text_through() {
    assert_eq!(strip_ansi("hello world"), "hello world");
}

#[test]
fn handles_empty_input() {
    assert_eq!(strip_ansi(""), "");
}

#[test]
fn removes_chained_sequences() {
    let input = "\x1b[1;32mgreen bold\x1b[0m normal \x1b[4munderline\x1b[0m";
    let result = strip_ansi(input);
    assert!(result.contains("green bold"));
    assert!(result.contains("normal"));
    assert!(result.contains("underline"));
    assert!(!result.contains('\x1b'));
}

#[test]
fn input_that_is_only_sequences_becomes_empty() {
    assert_eq!(strip_ansi("\x1b[2J\x1b[H\x1b[?25l\x1b[0m"), "");
}

#[test]
fn preserves_newlines_and_order() {
    assert_eq!(strip_ansi("a\x1b[31m\nb\x1b[0m\nc"), "a\nb\nc");
}

/// Fragments of realistic terminal control output, interleaved with plain
/// text by the strategy below.
const SEQUENCES: &[&str] =
    &["\x1b[0m", "\x1b[31m", "\x1b[1;32m", "\x1b[2J", "\x1b[H", "\x1b[?25h", "\x1b[K", "\u{9b}0m"];

fn terminal_stream() -> impl Strategy<Value = String> {
    let fragment = prop_oneof![
        "[a-zA-Z0-9 .,?!/()\\[\\]-]{0,12}",
        proptest::sample::select(SEQUENCES).prop_map(str::to_owned),
    ];
    proptest::collection::vec(fragment, 0..16).prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn idempotent_on_terminal_streams(input in terminal_stream()) {
        let once = strip_ansi(&input);
        let twice = strip_ansi(&once);
        prop_assert_eq!(&once, &twice);
        prop_assert!(!once.contains('\x1b'));
        prop_assert!(!once.contains('\u{9b}'), "single-byte CSI survived stripping");
    }
}
