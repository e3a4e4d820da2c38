mod args;

use clap::Parser;
use clio::{
    config::LocalConfigManager,
    logging::{EncoderConfig, Field},
    Level, LogRecord, NO_PREFIX_NAME, SUCCESS_NAME,
};
use std::process::ExitCode;

use crate::args::DemoArgs;

fn main() -> ExitCode {
    let args = DemoArgs::parse();

    match run(args) {
        Err(err) => {
            let root = err.root_cause();

            eprint!("\x1b[31m");
            eprintln!("Error: {}", err);
            eprintln!();
            eprintln!("Caused by:");
            eprint!("  {}", root);
            eprintln!("\x1b[0m");
            ExitCode::from(1)
        }
        Ok(_) => ExitCode::from(0),
    }
}

fn run(args: DemoArgs) -> eyre::Result<()> {
    let registry = clio::global();
    registry.set_level_from_string(&args.level);

    if args.no_color {
        registry.set_no_color(true);
    }

    if args.timestamps {
        registry.set_encoder_config(EncoderConfig::new().with_time_key("T"));
    }

    if let Some(file_config) = args.file_config(&LocalConfigManager::new())? {
        registry.set_file_logging(file_config)?;
    }

    clio::init_log_bridge()?;

    let log = clio::current().with_error_reporting(true);
    let none = Vec::<(&str, &str)>::new();

    log.log(Level::Info, "hello world from Logger::log", none.clone());
    log.named(SUCCESS_NAME)
        .log(Level::Info, "hello world from a success logger", none.clone());
    log.named(NO_PREFIX_NAME)
        .log(Level::Info, "hello world without a prefix", none.clone());
    log.log(Level::Warn, "hello world with a field", [("key", "value")]);
    log.log(
        Level::Error,
        "calling an API",
        [("url", "http://example.com"), ("status", "503")],
    );
    log.log(Level::Debug, "hello world at debug", none);

    log.emit(
        LogRecord::new(Level::Debug, "binary payload")
            .with_field("bytes", &b"clio says hi\x00\x01"[..])
            .with_field("", "blank key"),
    );
    log.with([Field::new("command", "demo")]).emit(
        LogRecord::new(Level::Error, "with a stack trace")
            .with_stack("main.rs:1 run\nmain.rs:2 main"),
    );

    log::info!(target: SUCCESS_NAME, "hello world from the log facade");
    log::warn!(attempt = 3; "retrying from the log facade");

    log.flush()
}
