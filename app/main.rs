use std::{
    io::{stdin, stdout},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use lib::session::{Format, Session};

#[derive(Parser, Debug)]
#[command(about = "run commands against a set of in-memory repositories")]
struct Arguments {
    #[arg(short, long, help = "read commands from this file instead of stdin")]
    script: Option<PathBuf>,
    #[arg(long, help = "print one JSON object per result")]
    json: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Arguments::parse();
    let format = if args.json { Format::Json } else { Format::Text };
    let mut session = Session::new(format);
    let result = match &args.script {
        Some(path) => session.run_script(path, stdout().lock()),
        None => session.run(stdin().lock(), stdout().lock()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}
