// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    help = { "/help", LocalCommand::Help },
    state = { "/state", LocalCommand::State },
    clear = { "/clear", LocalCommand::Clear },
    abort = { "/abort", LocalCommand::Abort },
    mode_debug = { "/mode debug", LocalCommand::Mode(UiMode::Debug) },
    mode_seamless = { "/mode seamless", LocalCommand::Mode(UiMode::Seamless) },
)]
fn parses_known_commands(input: &str, expected: LocalCommand) {
    assert_eq!(parse_local_command(input), Some(Ok(expected)));
}

#[test]
fn leading_whitespace_is_tolerated() {
    assert_eq!(
        parse_local_command("  /help  "),
        Some(Ok(LocalCommand::Help))
    );
}

#[test]
fn non_slash_text_is_not_a_command() {
    assert_eq!(parse_local_command("hello world"), None);
    assert_eq!(parse_local_command(""), None);
}

#[test]
fn unknown_command_is_an_error() {
    assert!(matches!(parse_local_command("/frobnicate"), Some(Err(_))));
}

#[test]
fn mode_requires_a_valid_argument() {
    assert!(matches!(parse_local_command("/mode"), Some(Err(_))));
    assert!(matches!(parse_local_command("/mode loud"), Some(Err(_))));
}
