use std::process::ExitCode;

fn main() -> ExitCode {
    refbot_cli::run()
}
