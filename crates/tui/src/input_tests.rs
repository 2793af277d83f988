// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    carriage_return = { b"\r".as_slice(), InputEvent::Submit },
    line_feed = { b"\n".as_slice(), InputEvent::Submit },
    tab = { b"\t".as_slice(), InputEvent::Advance },
    space = { b" ".as_slice(), InputEvent::Advance },
    del = { b"\x7f".as_slice(), InputEvent::Delete },
    backspace = { b"\x08".as_slice(), InputEvent::Delete },
    printable = { b"a".as_slice(), InputEvent::Insert('a') },
)]
fn plain_bytes_follow_the_shared_rules(bytes: &[u8], expected: InputEvent) {
    assert_eq!(decode_input(bytes), vec![expected]);
}

#[test]
fn text_decodes_char_by_char() {
    let events = decode_input(b"hi!");
    assert_eq!(
        events,
        vec![
            InputEvent::Insert('h'),
            InputEvent::Insert('i'),
            InputEvent::Insert('!'),
        ]
    );
}

#[test]
fn utf8_multibyte_inserts_one_char() {
    let events = decode_input("é".as_bytes());
    assert_eq!(events, vec![InputEvent::Insert('é')]);
}

// ── Kitty (CSI <n> u) ────────────────────────────────────────────────────────

#[test]
fn kitty_sequence_decodes_to_its_byte() {
    // 13 = carriage return
    assert_eq!(decode_input(b"\x1b[13u"), vec![InputEvent::Submit]);
    // 97 = 'a'
    assert_eq!(decode_input(b"\x1b[97u"), vec![InputEvent::Insert('a')]);
}

#[test]
fn kitty_with_modifiers_still_decodes_the_code() {
    assert_eq!(decode_input(b"\x1b[9;5u"), vec![InputEvent::Advance]);
}

#[test]
fn kitty_code_above_255_is_ignored() {
    assert_eq!(decode_input(b"\x1b[57441u"), vec![InputEvent::Ignored]);
}

// ── modifyOtherKeys (CSI 27;mods;code ~) ─────────────────────────────────────

#[test]
fn modify_other_keys_decodes_to_its_byte() {
    assert_eq!(decode_input(b"\x1b[27;2;13~"), vec![InputEvent::Submit]);
    assert_eq!(decode_input(b"\x1b[27;5;122~"), vec![InputEvent::Insert('z')]);
}

#[test]
fn modify_other_keys_out_of_range_is_ignored() {
    assert_eq!(decode_input(b"\x1b[27;2;999~"), vec![InputEvent::Ignored]);
}

// ── Bracketed paste ──────────────────────────────────────────────────────────

#[test]
fn bracketed_paste_is_literal_text() {
    let events = decode_input(b"\x1b[200~hello\rworld\x1b[201~");
    assert_eq!(
        events,
        vec![InputEvent::Paste("hello\rworld".to_string())]
    );
}

#[test]
fn unterminated_paste_takes_the_rest() {
    let events = decode_input(b"\x1b[200~partial");
    assert_eq!(events, vec![InputEvent::Paste("partial".to_string())]);
}

#[test]
fn input_after_paste_continues_decoding() {
    let events = decode_input(b"\x1b[200~x\x1b[201~\r");
    assert_eq!(
        events,
        vec![InputEvent::Paste("x".to_string()), InputEvent::Submit]
    );
}

// ── SGR pointer ──────────────────────────────────────────────────────────────

#[test]
fn pointer_press_parses_position_and_button() {
    let events = decode_input(b"\x1b[<0;10;5M");
    assert_eq!(
        events,
        vec![InputEvent::Pointer(PointerEvent {
            col: 10,
            row: 5,
            press: true,
            button: 0,
            modifiers: 0,
        })]
    );
}

#[test]
fn pointer_release_uses_lowercase_m() {
    let events = decode_input(b"\x1b[<0;3;4m");
    let InputEvent::Pointer(pointer) = &events[0] else {
        panic!("expected pointer");
    };
    assert!(!pointer.press);
}

#[test]
fn pointer_modifiers_come_from_the_button_bits() {
    // 16 = ctrl bit in SGR encoding (button 0 + 16)
    let events = decode_input(b"\x1b[<16;1;1M");
    let InputEvent::Pointer(pointer) = &events[0] else {
        panic!("expected pointer");
    };
    assert_eq!(pointer.button, 0);
    assert_eq!(pointer.modifiers, 0b100);
}

// ── Unknown sequences ────────────────────────────────────────────────────────

#[test]
fn unknown_csi_sequences_are_ignored() {
    assert_eq!(decode_input(b"\x1b[38;5;99x"), vec![InputEvent::Ignored]);
    // Arrow key (CSI A) is not part of the shared rules
    assert_eq!(decode_input(b"\x1b[A"), vec![InputEvent::Ignored]);
}

#[test]
fn bare_escape_is_ignored_and_decoding_continues() {
    let events = decode_input(b"\x1bXa");
    assert_eq!(events, vec![InputEvent::Ignored, InputEvent::Insert('a')]);
}

#[test]
fn truncated_sequence_does_not_panic() {
    assert_eq!(decode_input(b"\x1b[12"), vec![InputEvent::Ignored]);
    assert_eq!(decode_input(b"\x1b"), vec![InputEvent::Ignored]);
}
