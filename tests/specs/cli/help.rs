//! Top-level help and version behavior.

use crate::prelude::*;

#[test]
fn bare_invocation_prints_help_and_exits_zero() {
    Store::empty()
        .railyard()
        .passes()
        .stdout_has("railyard");
}

#[test]
fn help_lists_every_top_level_command() {
    let stdout = cli().args(&["--help"]).passes().stdout();
    for name in ["engine", "switch", "car", "complete", "progress", "message", "inbox"] {
        assert!(
            stdout.contains(name),
            "help output missing '{name}' command:\n{stdout}"
        );
    }
}

#[test]
fn car_help_lists_its_subcommands() {
    cli()
        .args(&["car", "--help"])
        .passes()
        .stdout_has("create")
        .stdout_has("list")
        .stdout_has("dep");
}

#[test]
fn version_flag_prints_a_version() {
    cli().args(&["-v"]).passes();
}
