use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "tick")]
#[command(about = "Tick-driven command script runner")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Mode,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Mode {
    Run(RunArgs),
    Console(ConsoleArgs),
    Parse(ParseArgs),
}

#[derive(Debug, Args)]
pub(crate) struct RunArgs {
    #[arg(long = "scripts-dir")]
    pub(crate) scripts_dir: String,
    #[arg(long = "entry", default_value = "main.cfg")]
    pub(crate) entry: String,
    #[arg(long = "config")]
    pub(crate) config: Option<String>,
    #[arg(long = "max-ticks", default_value_t = 10_000)]
    pub(crate) max_ticks: u64,
    /// Line queued for `read`; repeat for several.
    #[arg(long = "input")]
    pub(crate) input: Vec<String>,
}

#[derive(Debug, Args)]
pub(crate) struct ConsoleArgs {
    #[arg(long = "config")]
    pub(crate) config: Option<String>,
    #[arg(long = "scripts-dir")]
    pub(crate) scripts_dir: Option<String>,
}

#[derive(Debug, Args)]
pub(crate) struct ParseArgs {
    pub(crate) file: String,
    /// Print the canonical script text instead of the JSON tree.
    #[arg(long = "text")]
    pub(crate) text: bool,
}
