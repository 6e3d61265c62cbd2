extern crate servman;

use anyhow::Result;
use clap::{App, Arg, SubCommand};
use git_version::git_version;
use servman::app;

const GIT_VERSION: &str =
    git_version!(args = ["--tags", "--always", "--dirty=-modified"], fallback = "unknown");

#[tokio::main]
async fn main() -> Result<()> {
    let matches = App::new("servman")
        .version(GIT_VERSION)
        .about("Install, remove and run programs as native system services")
        .arg(
            Arg::with_name("debug")
                .short("d")
                .long("debug")
                .help("run in debug mode"),
        )
        .subcommand(
            SubCommand::with_name("install")
                .about("install a service described by a yaml file, the service is named after the file")
                .arg(
                    Arg::with_name("config")
                        .value_name("CONFIG")
                        .required(true)
                        .help("path to the service yaml file"),
                ),
        )
        .subcommand(
            SubCommand::with_name("remove")
                .about("disable and remove an installed service")
                .arg(
                    Arg::with_name("service")
                        .value_name("SERVICE")
                        .required(true)
                        .help("service name"),
                ),
        )
        .subcommand(
            SubCommand::with_name("detect").about("print the service mechanism of this host"),
        )
        .subcommand(
            SubCommand::with_name("run").about("run as a service until asked to stop"),
        )
        .get_matches();

    let level = if matches.is_present("debug") {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    if let Err(err) = app::logger(level) {
        eprintln!("failed to setup logging: {}", err);
    }

    let result = match matches.subcommand() {
        ("install", Some(matches)) => app::install(matches.value_of("config").unwrap()).await,
        ("remove", Some(matches)) => app::remove(matches.value_of("service").unwrap()).await,
        ("detect", _) => app::detect().await,
        ("run", _) => app::run().await,
        _ => Err(anyhow::anyhow!("try help")),
    };

    match result {
        Ok(_) => Ok(()),
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(1);
        }
    }
}
