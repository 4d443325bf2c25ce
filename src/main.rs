// src/main.rs

use std::process::ExitCode;

use warmdag::{RunStatus, cli, logging, run};

#[tokio::main]
async fn main() -> ExitCode {
    match run_main().await {
        Ok(RunStatus::Clean) => ExitCode::SUCCESS,
        Ok(RunStatus::Failures) => ExitCode::from(2),
        Ok(RunStatus::Interrupted) => ExitCode::from(130),
        Err(err) => {
            eprintln!("warmdag error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run_main() -> anyhow::Result<RunStatus> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
