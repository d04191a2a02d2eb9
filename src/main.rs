use std::process::ExitCode;

use clap::Parser;

use subwatch::{commands, ConfigError};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = commands::Cli::parse();

    match commands::execute(cli).await {
        Ok(code) => code,
        Err(err) => {
            if let Some(config_err) = err.downcast_ref::<ConfigError>() {
                eprintln!("configuration error: {config_err}");
                return ExitCode::from(3);
            }
            log::error!("{err:?}");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
