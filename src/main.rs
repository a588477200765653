use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use posts_manager::RunOptions;

const HELP: &str = "posts-manager - Browse and edit DummyJSON posts from the terminal.

Usage: posts-manager [QUERY] [OPTIONS]

  QUERY                Initial location, e.g. \"?skip=10&limit=20&tag=love\"
  --search TEXT        Run a search after loading
  --post ID            Show the comments of a post
  --user ID            Show a user profile
  --config PATH        Read configuration from PATH
  --version, -V        Show version and exit
  --help,    -h        Show this help message";

enum Command {
    Version,
    Help,
    Run(RunOptions),
}

fn main() {
    let command = match parse_args(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(err) => {
            eprintln!("error: {err:#}\n\n{HELP}");
            std::process::exit(2);
        }
    };

    let options = match command {
        Command::Version => {
            println!("posts-manager {}", posts_manager::VERSION);
            return;
        }
        Command::Help => {
            println!("{HELP}");
            return;
        }
        Command::Run(options) => options,
    };

    if let Err(err) = posts_manager::run(options) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Command> {
    let mut options = RunOptions::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => return Ok(Command::Version),
            "--help" | "-h" => return Ok(Command::Help),
            "--search" => options.search = Some(value_for(&arg, args.next())?),
            "--post" => options.post = Some(id_for(&arg, args.next())?),
            "--user" => options.user = Some(id_for(&arg, args.next())?),
            "--config" => options.config_file = Some(PathBuf::from(value_for(&arg, args.next())?)),
            flag if flag.starts_with("--") => bail!("unknown option {flag}"),
            _ => {
                if !options.location.is_empty() {
                    bail!("unexpected argument {arg}");
                }
                options.location = arg;
            }
        }
    }
    Ok(Command::Run(options))
}

fn value_for(flag: &str, value: Option<String>) -> Result<String> {
    value.with_context(|| format!("{flag} needs a value"))
}

fn id_for(flag: &str, value: Option<String>) -> Result<u64> {
    let raw = value_for(flag, value)?;
    raw.parse()
        .with_context(|| format!("{flag} expects a numeric id, got {raw:?}"))
}
