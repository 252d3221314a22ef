use std::io::{stdin, Read};
use std::process::ExitCode;

use weaveq::config::DriverConfig;
use weaveq::error::{Error, Result};
use weaveq::parser::compile_query;
use weaveq::result::{JsonLinesHandler, StdoutHandler};
use weaveq::source::SourceRegistry;

struct Args {
    config_path: Option<String>,
    query_path: String,
    output_path: String,
}

fn parse_args() -> Result<Args> {
    let mut config_path = None;
    let mut query_path = None;
    let mut output_path = "-".to_string();

    let mut argv = std::env::args().skip(1);
    while let Some(flag) = argv.next() {
        let value = argv
            .next()
            .ok_or_else(|| Error::Io(format!("missing value for '{flag}'")))?;
        match flag.as_str() {
            "-c" => config_path = Some(value),
            "-q" => query_path = Some(value),
            "-o" => output_path = value,
            other => return Err(Error::Io(format!("unrecognized flag '{other}'"))),
        }
    }

    let query_path = query_path.ok_or_else(|| Error::Io("missing required '-q <query>'".to_string()))?;
    Ok(Args {
        config_path,
        query_path,
        output_path,
    })
}

fn read_query(path: &str) -> Result<String> {
    if path == "-" {
        let mut text = String::new();
        stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(std::fs::read_to_string(path)?)
    }
}

fn run() -> Result<()> {
    env_logger::init();
    let args = parse_args()?;

    let config = args
        .config_path
        .as_deref()
        .map(DriverConfig::load)
        .transpose()?;

    let registry = SourceRegistry::with_builtins();
    let query_text = read_query(&args.query_path)?;
    let builder = compile_query(&query_text, &registry, config.as_ref())?;

    if args.output_path == "-" {
        builder.result_handler(Box::new(StdoutHandler::default())).execute(true)
    } else {
        let file = std::fs::File::create(&args.output_path)?;
        builder
            .result_handler(Box::new(JsonLinesHandler::new(file)))
            .execute(true)
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
