//! The scheduler executable.

use std::{error::Error, fs, process};

use clap::{Arg, ArgAction, Command};
use patsched::backend::{
    patmos,
    schedule::{self, ScheduleConfig},
    DisplayConfig,
    PrintBytes,
};

fn cli() -> Command {
    Command::new("patsched")
        .about("Reorder and bundle Patmos assembly for dual issue")
        .arg(Arg::new("input").required(true).help("The assembly file"))
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("Write the scheduled assembly here instead of stdout"),
        )
        .arg(
            Arg::new("print-bytes")
                .long("print-bytes")
                .value_parser(["none", "calls", "all"])
                .default_value("none")
                .help("Print immediates as byte addresses"),
        )
        .arg(
            Arg::new("no-bundle")
                .long("no-bundle")
                .action(ArgAction::SetTrue)
                .help("Issue one instruction per cycle"),
        )
        .arg(
            Arg::new("no-verify")
                .long("no-verify")
                .action(ArgAction::SetTrue)
                .help("Skip the verification of scheduled blocks"),
        )
        .arg(
            Arg::new("stats")
                .long("stats")
                .action(ArgAction::SetTrue)
                .help("Print scheduling statistics to stderr"),
        )
}

fn run() -> Result<(), Box<dyn Error>> {
    let matches = cli().get_matches();

    let input = matches
        .get_one::<String>("input")
        .ok_or("no input file")?;
    let src = fs::read_to_string(input)?;
    let mut mctx = patmos::parse(&src)?;

    log::info!("read {} functions from {}", mctx.funcs().len(), input);

    let config = ScheduleConfig {
        bundle: !matches.get_flag("no-bundle"),
        verify: !matches.get_flag("no-verify"),
    };
    let stats = schedule::schedule(&mut mctx, &config)?;

    log::info!(
        "{} instructions in {} bundles, {} empty slots",
        stats.insts,
        stats.bundles,
        stats.empty_slots
    );

    let print_bytes = matches
        .get_one::<String>("print-bytes")
        .map(|mode| mode.parse::<PrintBytes>())
        .transpose()?
        .unwrap_or_default();
    let display = DisplayConfig { print_bytes };
    let asm = mctx.display(&display).to_string();

    match matches.get_one::<String>("output") {
        Some(path) => fs::write(path, asm)?,
        None => print!("{}", asm),
    }

    if matches.get_flag("stats") {
        eprint!("{}", stats);
    }

    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(err) = run() {
        eprintln!("error: {}", err);
        process::exit(1);
    }
}
