use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match agelens_lib::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("agelens: {e}");
            ExitCode::FAILURE
        }
    }
}
