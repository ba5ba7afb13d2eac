use std::net::TcpListener;

use anyhow::Context;
use blog::config;
use blog::core::db;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "blog", version, about = "A small blog server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Clear the existing data and create new tables
    InitDb,
    /// Run the HTTP server (the default)
    Serve,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    blog::telemetry::init();

    let cli = Cli::parse();
    let url = config::database_url();
    let pool = db::connect(&url)
        .await
        .with_context(|| format!("could not open database {url}"))?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::InitDb => {
            db::init_db(&pool).await?;
            println!("Initialized the database.");
        }
        Command::Serve => {
            let addr = config::bind_addr();
            let listener =
                TcpListener::bind(&addr).with_context(|| format!("could not bind {addr}"))?;
            tracing::info!("Server listening on http://{}", addr);
            blog::run(listener, pool)?.await?;
        }
    }

    Ok(())
}
