use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::rc::Rc;

use clap::Parser;
use tick_core::{Privileges, ScriptError};
use tick_runtime::{Registry, ScriptLibrary, StderrSink, StdoutSink, VirtualMachine};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod cli_args;
mod console;
mod error_map;
mod source_loader;

pub(crate) use cli_args::{Cli, ConsoleArgs, Mode, ParseArgs, RunArgs};
pub(crate) use error_map::{
    emit_error, map_cli_config_read, map_cli_json, map_cli_source_path, map_cli_source_read,
    map_console_io,
};
pub(crate) use source_loader::{load_options, read_scripts_from_dir, resolve_scripts_dir};

pub(crate) const TICK_SECONDS: f64 = 1.0 / 60.0;

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };
    init_logging();
    match run(cli) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    }
}

/// Diagnostics go to stderr so stdout carries only script output.
fn init_logging() {
    let filter = EnvFilter::try_from_env("TICK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<i32, ScriptError> {
    match cli.command {
        Mode::Run(args) => run_scripts(args),
        Mode::Console(args) => console::run_console(args),
        Mode::Parse(args) => parse_file(args),
    }
}

pub(crate) fn build_registry(library: Option<Rc<ScriptLibrary>>) -> Result<Registry, ScriptError> {
    let builder = Registry::builder().with_core_commands();
    match library {
        Some(library) => builder.with_script_library(library),
        None => builder,
    }
    .build()
}

fn run_scripts(args: RunArgs) -> Result<i32, ScriptError> {
    let root = resolve_scripts_dir(&args.scripts_dir)?;
    let library = Rc::new(ScriptLibrary::new(read_scripts_from_dir(&root)?));
    let entry = library.get(&args.entry).map(str::to_string).ok_or_else(|| {
        ScriptError::new(
            "CLI_ENTRY_NOT_FOUND",
            format!("Entry script not found: {}", args.entry),
        )
    })?;
    let options = load_options(args.config.as_deref())?;

    let mut vm = VirtualMachine::new(build_registry(Some(library))?, options);
    vm.set_output(Rc::new(StdoutSink));
    vm.set_error_output(Rc::new(StderrSink));

    let failure: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
    let id = vm.launch_script(&entry, Privileges::ALL);
    if let Some(process) = vm.find_process_mut(id) {
        for line in args.input {
            process.push_input(line);
        }
        let sink = failure.clone();
        process.set_error_handler(move |message| {
            sink.borrow_mut().get_or_insert_with(|| message.to_string());
        });
    }

    for tick in 1..=args.max_ticks {
        vm.run(TICK_SECONDS);
        if let Some(message) = failure.borrow_mut().take() {
            return Err(ScriptError::new("CLI_SCRIPT_ERROR", message));
        }
        if vm.process_count() == 0 {
            debug!(ticks = tick, "scripts finished");
            return Ok(0);
        }
    }

    Err(ScriptError::new(
        "CLI_TICK_LIMIT",
        format!("Scripts still running after {} ticks.", args.max_ticks),
    ))
}

fn parse_file(args: ParseArgs) -> Result<i32, ScriptError> {
    let text = fs::read_to_string(&args.file).map_err(map_cli_source_read)?;
    let script = tick_parser::parse(&text);
    if args.text {
        print!("{}", tick_parser::format_script(&script));
        return Ok(0);
    }
    let json = serde_json::to_string_pretty(&script).map_err(map_cli_json)?;
    println!("{}", json);
    Ok(0)
}
