use anyhow::Result;
use clap::Parser;
use folio::cli::{Cli, Commands};
use folio::{commands, AppContext};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let mut cx = AppContext::init(&cli).await?;

    match cli.command {
        Commands::List(args) => commands::handle_list(args, &cx)?,
        Commands::Show(args) => commands::handle_show(args, &cx)?,
        Commands::Add(args) => commands::handle_add(args, &mut cx).await?,
        Commands::Edit(args) => commands::handle_edit(args, &mut cx).await?,
        Commands::Delete(args) => commands::handle_delete(args, &mut cx).await?,
        Commands::Tags(args) => commands::handle_tags(args, &cx)?,
        Commands::Status => commands::handle_status(&cx).await?,
        Commands::Category(args) => commands::handle_category(args, &mut cx).await?,
        Commands::Version(args) => commands::handle_version(args, &mut cx).await?,
    }

    Ok(())
}

// RUST_LOG wins over the command-line flags when it is set.
fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
