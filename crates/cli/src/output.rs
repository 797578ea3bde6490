// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output helpers: `--json` prints the raw result, otherwise a compact
//! human rendering.

use anyhow::Result;
use serde_json::Value;

/// Print either pretty JSON or the formatted fallback.
pub fn format_or_json(json: bool, value: &Value, fallback: impl FnOnce()) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        fallback();
    }
    Ok(())
}

/// Render a list of objects as aligned columns picked by key.
pub fn print_table(items: &[Value], columns: &[(&str, &str)]) {
    if items.is_empty() {
        println!("(none)");
        return;
    }

    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|item| columns.iter().map(|(_, key)| cell(item, key)).collect())
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|(header, _)| header.len()).collect();
    for row in &rows {
        for (i, value) in row.iter().enumerate() {
            widths[i] = widths[i].max(value.len());
        }
    }

    let header: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, (header, _))| format!("{:<width$}", header, width = widths[i]))
        .collect();
    println!("{}", header.join("  "));
    for row in rows {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, value)| format!("{:<width$}", value, width = widths[i]))
            .collect();
        println!("{}", line.join("  "));
    }
}

fn cell(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "-".to_string(),
        Some(other) => other.to_string(),
    }
}

pub fn short_id(value: &Value) -> String {
    value.as_str().map(|s| s.chars().take(14).collect()).unwrap_or_else(|| "-".to_string())
}
