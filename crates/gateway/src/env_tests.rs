// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

#[test]
#[serial]
fn invoke_cwd_prefers_the_env_override() {
    std::env::set_var("HARNESS_INVOKE_CWD", "/tmp/elsewhere");
    assert_eq!(invoke_cwd(), PathBuf::from("/tmp/elsewhere"));
    std::env::remove_var("HARNESS_INVOKE_CWD");
}

#[test]
#[serial]
fn invoke_cwd_falls_back_to_process_cwd() {
    std::env::remove_var("HARNESS_INVOKE_CWD");
    let cwd = std::env::current_dir().unwrap();
    assert_eq!(invoke_cwd(), cwd);
}

#[test]
fn state_dir_is_workspace_relative() {
    assert_eq!(
        state_dir(std::path::Path::new("/work/project")),
        PathBuf::from("/work/project/.state")
    );
}

#[test]
#[serial]
fn control_plane_port_parses() {
    std::env::set_var("HARNESS_CONTROL_PLANE_PORT", "7777");
    assert_eq!(control_plane_port(), Some(7777));
    std::env::set_var("HARNESS_CONTROL_PLANE_PORT", "not-a-port");
    assert_eq!(control_plane_port(), None);
    std::env::remove_var("HARNESS_CONTROL_PLANE_PORT");
}
