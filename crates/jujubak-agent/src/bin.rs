use jujubak_agent::cli::commands;
use jujubak_agent::cli::{parse_cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = parse_cli();

    match cli.command {
        Commands::Setup => {
            commands::setup(cli.config).await?;
        }
        Commands::Run {
            debug,
            purge,
            task_timeout,
            omit_controllers,
        } => {
            commands::run(cli.config, debug, purge, task_timeout, omit_controllers).await?;
        }
        Commands::PushKeys => {
            commands::push_keys(cli.config).await?;
        }
        Commands::CheckResults {
            results_file,
            max_age_hours,
        } => {
            let code = commands::check_results(cli.config, results_file, max_age_hours)?;
            std::process::exit(code);
        }
    }

    Ok(())
}
