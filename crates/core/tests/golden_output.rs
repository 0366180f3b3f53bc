//! Golden-output tests: the emitted files for a known firmware are
//! compared byte-for-byte against the expected generated C.

use daemon_toolchain_core::{SourceUnit, compile};
use daemon_toolchain_profile::Device;

const GRIPPER_FIRMWARE: &str = r#"#include <string.h>

static char g_grip_state[8] = "open";
static float g_grip_force_n = 0.0f;

// @daemon:export token=GRIP desc="Set gripper state" args="state:string[open..close]" safety="rate_hz=15,watchdog_ms=400,clamp=true" function=set_grip
void set_grip(const char *state) {
    if (state == 0) {
        return;
    }
    if (strcmp(state, "close") == 0) {
        strcpy(g_grip_state, "close");
    } else {
        strcpy(g_grip_state, "open");
    }
}

// @daemon:export token=GRIP_FORCE desc="Set gripper force" args="n:float[0..40]" safety="rate_hz=15,watchdog_ms=400,clamp=true" function=set_grip_force
void set_grip_force(float n) {
    g_grip_force_n = n;
}
"#;

const EXPECTED_ENTRY: &str = r#"#include "daemon_runtime.h"

#include <stdbool.h>
#include <stdio.h>
#include <stdlib.h>
#include <string.h>

void set_grip(const char * state);
void set_grip_force(float n);

int daemon_entry_dispatch(const char *token, int argc, const char **argv) {
  if (token == NULL) return DAEMON_ERR_BAD_TOKEN;
  if (strcmp(token, "STOP") == 0) {
    daemon_runtime_stop();
    return DAEMON_OK;
  }

  if (strcmp(token, "GRIP") == 0) {
    if (argc != 1) return DAEMON_ERR_BAD_ARGS;
    const char *arg_0 = argv[0];
    set_grip(arg_0);
    return DAEMON_OK;
  }

  if (strcmp(token, "GRIP_FORCE") == 0) {
    if (argc != 1) return DAEMON_ERR_BAD_ARGS;
    float arg_0 = 0.0f;
    if (!daemon_parse_float(argv[0], &arg_0)) return DAEMON_ERR_BAD_ARGS;
    if (arg_0 < 0.0) return DAEMON_ERR_RANGE;
    if (arg_0 > 40.0) return DAEMON_ERR_RANGE;
    set_grip_force(arg_0);
    return DAEMON_OK;
  }

  return DAEMON_ERR_BAD_TOKEN;
}
"#;

fn gripper_device() -> Device {
    Device {
        name: "gripworks_gripper".into(),
        version: "0.1.0".into(),
        node_id: "grip-1".into(),
    }
}

fn gripper_sources() -> Vec<SourceUnit> {
    vec![SourceUnit {
        path: "main.c".into(),
        text: GRIPPER_FIRMWARE.into(),
    }]
}

#[test]
fn dispatch_entry_matches_golden_bytes() {
    let result = compile(&gripper_sources(), &gripper_device());
    assert!(result.ok(), "diagnostics: {:?}", result.diagnostics);
    let entry = result
        .files
        .iter()
        .find(|f| f.name == "daemon_entry.c")
        .unwrap();
    assert_eq!(entry.contents, EXPECTED_ENTRY);
}

#[test]
fn manifest_json_matches_golden_bytes() {
    let result = compile(&gripper_sources(), &gripper_device());
    let manifest_json = result.manifest.unwrap().to_json();
    let expected = concat!(
        r#"{"daemon_version":"0.1","device":{"name":"gripworks_gripper","version":"0.1.0","node_id":"grip-1"},"#,
        r#""commands":[{"token":"GRIP","description":"Set gripper state","args":[{"name":"state","type":"string","min":null,"max":null,"required":true}],"#,
        r#""safety":{"rate_limit_hz":15,"watchdog_ms":400,"clamp":true},"nlp":{"synonyms":["grip","set gripper state"],"examples":["Set gripper state"]}},"#,
        r#"{"token":"GRIP_FORCE","description":"Set gripper force","args":[{"name":"n","type":"float","min":0.0,"max":40.0,"required":true}],"#,
        r#""safety":{"rate_limit_hz":15,"watchdog_ms":400,"clamp":true},"nlp":{"synonyms":["grip_force","set gripper force"],"examples":["Set gripper force"]}}],"#,
        r#""telemetry":{"keys":[{"name":"uptime_ms","type":"int","unit":"ms"},{"name":"last_token","type":"string"}]},"#,
        r#""transport":{"type":"serial-line-v1"}}"#,
    );
    assert_eq!(manifest_json, expected);
}

#[test]
fn runtime_header_matches_golden_bytes() {
    let result = compile(&gripper_sources(), &gripper_device());
    let header = result
        .files
        .iter()
        .find(|f| f.name == "daemon_runtime.h")
        .unwrap();
    let expected = r#"#ifndef DAEMON_RUNTIME_H
#define DAEMON_RUNTIME_H

#include <stdbool.h>
#include <stdint.h>

#define DAEMON_OK 0
#define DAEMON_ERR_BAD_TOKEN 10
#define DAEMON_ERR_BAD_ARGS 11
#define DAEMON_ERR_RANGE 12
#define DAEMON_ERR_RATE_LIMIT 13

void daemon_runtime_init(void);
void daemon_runtime_tick(uint32_t now_ms);
void daemon_runtime_handle_line(const char *line, uint32_t now_ms);
void daemon_runtime_stop(void);
void daemon_runtime_publish_telemetry(const char *key, const char *value);

bool daemon_parse_int(const char *raw, int *value);
bool daemon_parse_float(const char *raw, float *value);
int daemon_entry_dispatch(const char *token, int argc, const char **argv);

#endif
"#;
    assert_eq!(header.contents, expected);
}

#[test]
fn runtime_source_carries_profile_constants() {
    let result = compile(&gripper_sources(), &gripper_device());
    let runtime = result
        .files
        .iter()
        .find(|f| f.name == "daemon_runtime.c")
        .unwrap();
    // Both commands: rate 15 Hz → ⌈1000/15⌉ = 67; watchdog 400.
    assert!(runtime.contents.contains("static uint32_t g_watchdog_ms = 400;"));
    assert!(runtime.contents.contains("static uint32_t g_min_cmd_interval_ms = 67;"));
    assert!(!runtime.contents.contains('\r'));
}
