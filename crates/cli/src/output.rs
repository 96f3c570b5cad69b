// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output format switch shared by every `railyard` subcommand (SPEC_FULL.md
//! §6.2: "`-o json|text` output format switch").

use clap::ValueEnum;

/// Determine if color output should be enabled.
///
/// Delegates to [`crate::color::should_colorize`] — the single source of truth
/// for color detection across the CLI.
pub fn should_use_color() -> bool {
    crate::color::should_colorize()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print a value as pretty JSON, or fall back to a caller-supplied text
/// renderer, depending on `format`.
pub fn emit<T: serde::Serialize>(format: OutputFormat, value: &T, text: impl FnOnce(&T)) {
    match format {
        OutputFormat::Json => {
            match serde_json::to_string_pretty(value) {
                Ok(s) => println!("{s}"),
                Err(err) => eprintln!("Error: failed to serialize output: {err}"),
            }
        }
        OutputFormat::Text => text(value),
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
