// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use harness_core::Conversation;
use serde_json::json;

fn conversation_with_state(adapter_state: serde_json::Value) -> Conversation {
    let mut v = harness_core::test_support::conversation_json("c1", "d1", "");
    v["adapterState"] = adapter_state;
    Conversation::parse(&v).unwrap()
}

#[tokio::test]
async fn derives_from_initial_prompt() {
    let provider = HeuristicTitleProvider;
    let conv = conversation_with_state(json!({"initialPrompt": "Fix the flaky test in ring.rs"}));
    assert!(provider.has_source(&conv));
    assert_eq!(
        provider.derive(&conv).await.as_deref(),
        Some("Fix the flaky test in ring.rs")
    );
}

#[tokio::test]
async fn falls_back_to_last_user_message() {
    let provider = HeuristicTitleProvider;
    let conv = conversation_with_state(json!({"lastUserMessage": "rename the crate"}));
    assert_eq!(provider.derive(&conv).await.as_deref(), Some("rename the crate"));
}

#[tokio::test]
async fn no_source_means_none() {
    let provider = HeuristicTitleProvider;
    let conv = conversation_with_state(json!({}));
    assert!(!provider.has_source(&conv));
    assert!(provider.derive(&conv).await.is_none());

    let blank = conversation_with_state(json!({"initialPrompt": "   "}));
    assert!(!provider.has_source(&blank));
}

#[tokio::test]
async fn only_the_first_line_is_used() {
    let provider = HeuristicTitleProvider;
    let conv =
        conversation_with_state(json!({"initialPrompt": "short summary\nthen a lot of detail"}));
    assert_eq!(provider.derive(&conv).await.as_deref(), Some("short summary"));
}

#[tokio::test]
async fn long_titles_are_clipped_with_ellipsis() {
    let provider = HeuristicTitleProvider;
    let long = "words ".repeat(20);
    let conv = conversation_with_state(json!({"initialPrompt": long}));
    let title = provider.derive(&conv).await.unwrap();
    assert!(title.chars().count() <= 48);
    assert!(title.ends_with('…'));
}

#[test]
fn refresh_status_strings() {
    assert_eq!(RefreshStatus::Updated.as_str(), "updated");
    assert_eq!(RefreshStatus::Unchanged.as_str(), "unchanged");
    assert_eq!(RefreshStatus::Skipped.as_str(), "skipped");
}
