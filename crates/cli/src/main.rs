use std::process::ExitCode;

fn main() -> ExitCode {
    overseer_cli::run()
}
