use std::path::PathBuf;

use clap::{ArgGroup, ArgMatches, Command, arg, command, value_parser};

fn with_input(cmd: Command) -> Command {
    cmd.arg(arg!(-i --input <INPUT> "Raw process text (inline)"))
        .arg(
            arg!(-f --file <INPUT> "Process file to read")
                .value_parser(value_parser!(PathBuf)),
        )
        .group(
            ArgGroup::new("input-source")
                .args(["input", "file"])
                .required(true)
                .multiple(false),
        )
}

pub(crate) fn cli() -> ArgMatches {
    command!()
        .subcommand_required(true)
        .arg(
            arg!(-v --verbose <LEVEL> "Logging verbosity (-v for info, -v=LEVEL otherwise)")
                .num_args(0..=1)
                .default_missing_value("info")
                .require_equals(true)
                .value_parser(["error", "warn", "info", "debug", "trace"])
                .global(true),
        )
        .subcommand(
            with_input(command!("explore").about("Explore the states a process can reach"))
                .arg(
                    arg!(--"max-iter" <N> "Stop after this many exploration rounds")
                        .value_parser(value_parser!(usize)),
                )
                .arg(
                    arg!(--"step-budget" <N> "Rewrite steps allowed per normalization")
                        .value_parser(value_parser!(usize)),
                )
                .arg(arg!(--"no-confirm" "Do not re-check that new states are normal"))
                .arg(
                    arg!(-o --output <OUTPUT> "Render the derivation graph to a PDF file")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--dot <OUTPUT> "Write the derivation graph as DOT")
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            with_input(command!("encode").about("Print the normalized encoding as GML")),
        )
        .get_matches()
}
