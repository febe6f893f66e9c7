//! workq - File-backed task queue

use std::process::ExitCode;

fn main() -> ExitCode {
    workq::cli::run()
}
