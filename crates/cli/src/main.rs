use std::process::ExitCode;

fn main() -> ExitCode {
    quotesmith_cli::run()
}
