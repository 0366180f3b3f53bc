//! Runtime emitter: `daemon_runtime.h` (fixed) and `daemon_runtime.c`
//! (parameterized by the derived watchdog window, the minimum command
//! interval, and the embedded manifest JSON).
//!
//! The generated runtime is single-threaded cooperative C99: the caller
//! supplies monotonic `uint32_t` millisecond time and never calls
//! `daemon_runtime_tick` and `daemon_runtime_handle_line` concurrently.

use super::{EmittedFile, c_string_escape};
use crate::catalog::Catalog;

/// The catalog-independent runtime header.
const RUNTIME_HEADER: &str = "\
#ifndef DAEMON_RUNTIME_H
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
";

/// Emit `daemon_runtime.h`. Stable across catalogs.
pub fn emit_runtime_header() -> EmittedFile {
    EmittedFile {
        name: "daemon_runtime.h".into(),
        contents: RUNTIME_HEADER.into(),
        deps: Vec::new(),
    }
}

/// Emit `daemon_runtime.c` for a catalog and its synthesized manifest JSON.
///
/// The line handler implements the wire table: `HELLO`, `READ_MANIFEST`,
/// `STOP`, `RUN <TOKEN> [arg …]`, and the `BAD_REQUEST` fallbacks. The
/// watchdog is edge-triggered through the `g_active` flag: it emits one
/// `OK` on expiry and stays silent until the next accepted `RUN`.
pub fn emit_runtime_source(catalog: &Catalog, manifest_json: &str) -> EmittedFile {
    let watchdog_ms = catalog.watchdog_ms();
    let min_cmd_interval_ms = catalog.min_cmd_interval_ms();
    let manifest = c_string_escape(manifest_json);

    let contents = format!(
        "\
#include \"daemon_runtime.h\"

#include <stdio.h>
#include <stdlib.h>
#include <string.h>

static bool g_active = false;
static uint32_t g_last_cmd_ms = 0;
static uint32_t g_watchdog_ms = {watchdog_ms};
static uint32_t g_min_cmd_interval_ms = {min_cmd_interval_ms};

static void daemon_serial_write(const char *line) {{
  // TODO: Replace with board-specific serial write.
  puts(line);
}}

bool daemon_parse_int(const char *raw, int *value) {{
  if (raw == NULL || value == NULL) return false;
  char *end = NULL;
  long parsed = strtol(raw, &end, 10);
  if (end == raw || *end != '\\0') return false;
  *value = (int)parsed;
  return true;
}}

bool daemon_parse_float(const char *raw, float *value) {{
  if (raw == NULL || value == NULL) return false;
  char *end = NULL;
  float parsed = strtof(raw, &end);
  if (end == raw || *end != '\\0') return false;
  *value = parsed;
  return true;
}}

void daemon_runtime_publish_telemetry(const char *key, const char *value) {{
  char line[256];
  snprintf(line, sizeof(line), \"TELEMETRY %s=%s\", key, value);
  daemon_serial_write(line);
}}

void daemon_runtime_stop(void) {{
  g_active = false;
  daemon_serial_write(\"OK\");
}}

void daemon_runtime_init(void) {{
  g_active = false;
  g_last_cmd_ms = 0;
}}

void daemon_runtime_tick(uint32_t now_ms) {{
  if (g_active && (now_ms - g_last_cmd_ms) > g_watchdog_ms) {{
    daemon_runtime_stop();
  }}
}}

void daemon_runtime_handle_line(const char *line, uint32_t now_ms) {{
  if (line == NULL) {{
    daemon_serial_write(\"ERR BAD_REQUEST empty_line\");
    return;
  }}

  if (strcmp(line, \"HELLO\") == 0) {{
    daemon_serial_write(\"OK\");
    return;
  }}

  if (strcmp(line, \"READ_MANIFEST\") == 0) {{
    daemon_serial_write(\"MANIFEST {manifest}\");
    return;
  }}

  if (strcmp(line, \"STOP\") == 0) {{
    daemon_runtime_stop();
    return;
  }}

  if (strncmp(line, \"RUN \", 4) == 0) {{
    if (g_active && (now_ms - g_last_cmd_ms) < g_min_cmd_interval_ms) {{
      daemon_serial_write(\"ERR RATE_LIMIT too_fast\");
      return;
    }}

    char mutable_line[256];
    strncpy(mutable_line, line + 4, sizeof(mutable_line) - 1);
    mutable_line[sizeof(mutable_line) - 1] = '\\0';

    const char *argv[16];
    int argc = 0;
    char *save_ptr = NULL;
    char *token = strtok_r(mutable_line, \" \", &save_ptr);
    char *piece = NULL;
    while ((piece = strtok_r(NULL, \" \", &save_ptr)) != NULL && argc < 16) {{
      argv[argc++] = piece;
    }}

    int result = daemon_entry_dispatch(token, argc, argv);
    if (result == DAEMON_OK) {{
      daemon_serial_write(\"OK\");
      g_active = true;
      g_last_cmd_ms = now_ms;
    }} else if (result == DAEMON_ERR_BAD_TOKEN) {{
      daemon_serial_write(\"ERR BAD_TOKEN unknown\");
    }} else if (result == DAEMON_ERR_BAD_ARGS) {{
      daemon_serial_write(\"ERR BAD_ARGS invalid\");
    }} else if (result == DAEMON_ERR_RANGE) {{
      daemon_serial_write(\"ERR RANGE out_of_bounds\");
    }} else {{
      daemon_serial_write(\"ERR INTERNAL dispatch_failed\");
    }}
    return;
  }}

  daemon_serial_write(\"ERR BAD_REQUEST unsupported\");
}}
"
    );

    EmittedFile {
        name: "daemon_runtime.c".into(),
        contents,
        deps: vec!["daemon_runtime.h".into()],
    }
}
