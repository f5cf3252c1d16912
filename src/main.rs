use cartesia::auth::{GoogleAuthService, JwtService};
use cartesia::config::Config;
use cartesia::db::Database;
use cartesia::server::App;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cartesia")]
#[command(author, version, about = "Roadmap authoring backend")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the API server
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Create the database schema and exit
    InitDb,
}

fn main() {
    // .env is optional; a missing file is not an error
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::InitDb => {
            let database_url = Config::database_url_from_env();
            if let Err(e) = Database::open_at(&database_url) {
                eprintln!("Failed to open database at {}: {}", database_url, e);
                std::process::exit(1);
            }
            // Schema creation happens at open time
            eprintln!("Database ready at {}", database_url);
        }
        Command::Serve { port } => {
            let config = match Config::from_env() {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("Configuration error: {}", e);
                    std::process::exit(1);
                }
            };

            let db = match Database::open_at(&config.database_url) {
                Ok(db) => db,
                Err(e) => {
                    eprintln!("Failed to open database at {}: {}", config.database_url, e);
                    std::process::exit(1);
                }
            };

            let jwt = JwtService::new(config.jwt_secret.as_bytes());
            let google = GoogleAuthService::new(
                config.google_client_id.clone(),
                config.google_client_secret.clone(),
                config.google_redirect_url.clone(),
            );
            let app = App::new(db, jwt, google, config.static_dir.clone());

            let port = port.unwrap_or(config.port);
            if let Err(e) = cartesia::server::start(app, port) {
                eprintln!("Server error: {}", e);
                std::process::exit(1);
            }
        }
    }
}
