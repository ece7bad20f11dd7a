use clap::Parser;
use tracing_subscriber::EnvFilter;

use pipeline_search::cli::{Cli, Commands};
use pipeline_search::config::Config;

fn init_tracing(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.command.default_log_level());

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            return std::process::ExitCode::from(1);
        }
    };

    match cli.command {
        Commands::Serve { ref host, port } => {
            match pipeline_search::server::run(config, host, port).await {
                Ok(()) => std::process::ExitCode::SUCCESS,
                Err(err) => {
                    eprintln!("Error: {err:#}");
                    std::process::ExitCode::from(1)
                }
            }
        }
        _ => match pipeline_search::cli::run(cli, config).await {
            Ok(output) => {
                println!("{}", output.text);
                if output.success {
                    std::process::ExitCode::SUCCESS
                } else {
                    std::process::ExitCode::from(1)
                }
            }
            Err(err) => {
                if let Some(pipeline_err) =
                    err.downcast_ref::<pipeline_search::error::PipelineError>()
                {
                    eprintln!("Error: {pipeline_err}");
                } else {
                    eprintln!("Error: {err}");
                }
                std::process::ExitCode::from(1)
            }
        },
    }
}
