// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! harness-sync: the client-side replica of the gateway's state.
//!
//! Observed events flow through the cursor tracker (ordering), the pure
//! reducer (state derivation), and into the synced store, which notifies
//! subscribers and feeds the memoized selectors.

pub mod reduce;
pub mod select;
pub mod state;
pub mod store;

pub use reduce::{reduce, Reduction};
pub use select::{
    subscribe_selector, ConversationByIdSelector, ConversationListSelector, ConversationRow,
    DirectoryListSelector, TaskListSelector,
};
pub use state::SyncedState;
pub use store::{StoreSubscription, SyncedStore};
