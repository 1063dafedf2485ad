//! CLI argument definitions for `rmusic`.

use clap::{Arg, ArgAction, Command};

pub const DEFAULT_APP_NAME: &str = "regionmusic";

/// Build the CLI argument parser.
pub fn build_cli() -> Command {
    Command::new("rmusic")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Region music player with a RAM/disk decode cache")
        .long_about(
            "Runs region music commands such as MUSIC:<file>:<loop>:<fade>, STOP:<fade>, \
             VOLUME:<float>, LIST or CACHE_STATS. Commands come from the trailing \
             arguments, or one per line from stdin when none are given.",
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .short('d')
                .value_name("DIR")
                .default_value(".")
                .help("Directory holding music/ and config/"),
        )
        .arg(
            Arg::new("app-name")
                .long("app-name")
                .value_name("NAME")
                .default_value(DEFAULT_APP_NAME)
                .help("Settings file name under config/ (without .properties)"),
        )
        .arg(
            Arg::new("no-audio")
                .long("no-audio")
                .action(ArgAction::SetTrue)
                .help("Do not open an audio device; lines are simulated"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print LIST and cache reports as JSON; notices go to stderr"),
        )
        .arg(
            Arg::new("COMMANDS")
                .value_name("COMMAND")
                .num_args(0..)
                .trailing_var_arg(true)
                .help("Commands to run in order"),
        )
}
