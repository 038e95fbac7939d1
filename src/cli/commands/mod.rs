pub mod backend;
pub mod logging;

use crate::model::Table;
use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ColorChoice, Command,
};

pub const ARG_TABLE: &str = "table";
pub const ARG_OUTPUT: &str = "output";
pub const ARG_THEME_MODE: &str = "mode";

#[must_use]
pub fn validator_table() -> ValueParser {
    ValueParser::from(move |table: &str| -> std::result::Result<Table, String> { table.parse() })
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("onboardly")
        .about("Live onboarding dashboard")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(Command::new("summary").about("Sign in, load the dashboard once and print it"))
        .subcommand(
            Command::new("watch")
                .about("Keep the dashboard live and re-render on every change until Ctrl-C"),
        )
        .subcommand(
            Command::new("export")
                .about("Export one table as CSV")
                .arg(
                    Arg::new(ARG_TABLE)
                        .short('t')
                        .long(ARG_TABLE)
                        .help("employees, apps, onboarding_progress or activity_log")
                        .required(true)
                        .value_parser(validator_table()),
                )
                .arg(
                    Arg::new(ARG_OUTPUT)
                        .short('o')
                        .long(ARG_OUTPUT)
                        .help("Write to this file instead of stdout; a directory gets <table>-<date>.csv"),
                ),
        )
        .subcommand(Command::new("signup").about("Create an account with --email and --password"))
        .subcommand(
            Command::new("theme")
                .about("Show or change the display theme")
                .arg(
                    Arg::new(ARG_THEME_MODE)
                        .help("show, dark, light or toggle")
                        .default_value("show")
                        .value_parser(["show", "dark", "light", "toggle"]),
                ),
        );

    let command = backend::with_args(command);
    logging::with_args(command)
}
