fn main() {
    let exit_code = tick_cli::run_cli_from_args(std::env::args_os());
    std::process::exit(exit_code);
}
