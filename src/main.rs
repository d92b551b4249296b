mod cli;

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use clap::ArgMatches;
use env_logger::Builder;
use epim::{
    DerivationGraph, Error, ExploreConfig, Normalizer, Program, RecursiveProcessTable,
    ReductionEngine, Result, encode, parse_program, render,
};
use log::LevelFilter;

fn read_program(matches: &ArgMatches) -> Result<Program> {
    let text = match (
        matches.get_one::<String>("input"),
        matches.get_one::<PathBuf>("file"),
    ) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => return Err(Error::Parse("no process given".into())),
    };
    parse_program(&text)
}

fn load(matches: &ArgMatches, step_budget: usize) -> Result<(Program, RecursiveProcessTable)> {
    let program = read_program(matches)?;
    let mut table = RecursiveProcessTable::with_step_budget(step_budget);
    for definition in &program.definitions {
        table.add_definition(definition.clone())?;
    }
    Ok((program, table))
}

fn summary(dg: &DerivationGraph) {
    println!(
        "{} state(s), {} transition(s)",
        dg.state_count(),
        dg.transition_count()
    );
    for id in dg.terminal_states() {
        match &dg.state(id).term {
            Some(term) => println!("  terminal: {term}"),
            None => println!("  terminal: state {}", id.index()),
        }
    }
}

fn explore(matches: &ArgMatches) -> Result<()> {
    let mut config = ExploreConfig {
        max_iter: matches.get_one::<usize>("max-iter").copied(),
        confirm_normal_form: !matches.get_flag("no-confirm"),
        ..ExploreConfig::default()
    };
    if let Some(&budget) = matches.get_one::<usize>("step-budget") {
        config.step_budget = budget;
    }

    let (program, table) = load(matches, config.step_budget)?;
    let engine = ReductionEngine::new(&program.process, &table, config)?;
    let dg = engine.calc()?;
    summary(&dg);

    let dot = render::to_dot(&dg);
    if let Some(path) = matches.get_one::<PathBuf>("dot") {
        std::fs::write(path, &dot)?;
    }
    if let Some(path) = matches.get_one::<PathBuf>("output") {
        let svg = render::render_to_svg(&dot)?;
        render::render_svg_to_pdf(svg, path)?;
    }
    Ok(())
}

fn encode_only(matches: &ArgMatches) -> Result<()> {
    let (program, table) = load(matches, epim::DEFAULT_STEP_BUDGET)?;
    let term = program.process.term();
    table.check_calls(&term)?;
    let graph = Normalizer::new(table.step_budget())?.normal_form(encode(&term)?)?;
    println!("{}", graph.to_gml());
    Ok(())
}

fn main() -> ExitCode {
    let matches = cli::cli();

    let scope = matches.subcommand().map_or(&matches, |(_, sub)| sub);
    let level = scope
        .get_one::<String>("verbose")
        .and_then(|level| LevelFilter::from_str(level).ok())
        .unwrap_or(LevelFilter::Off);
    Builder::from_default_env().filter_level(level).init();

    let result = match matches.subcommand() {
        Some(("explore", sub)) => explore(sub),
        Some(("encode", sub)) => encode_only(sub),
        _ => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
