use anyhow::Context;
use bookshelf_kernel::settings::Settings;
use clap::{Parser, Subcommand};

/// Administration commands for the bookshelf catalog.
#[derive(Debug, Parser)]
#[command(name = "bookshelf", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Migrate, start every module and serve HTTP until Ctrl-C.
    Serve,
    /// Apply pending database migrations and exit.
    Migrate,
    /// Create an account that may delete books.
    CreateSuperuser {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, env = "BOOKSHELF_SUPERUSER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Delete expired login sessions.
    ClearSessions,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load bookshelf settings")?;
    bookshelf_telemetry::init(&settings.telemetry)?;

    match cli.command {
        Command::Serve => {
            tracing::info!(env = ?settings.environment, "starting server");
            bookshelf_app::bootstrap(settings).await?.serve().await
        }
        Command::Migrate => {
            let applied = bookshelf_app::migrate(settings).await?;
            println!("applied {applied} migration(s)");
            Ok(())
        }
        Command::CreateSuperuser {
            username,
            email,
            password,
        } => {
            let app = bookshelf_app::bootstrap(settings).await?;
            let user = bookshelf_app::modules::accounts::create_account(
                &app.state, &username, &email, &password, true,
            )
            .await?;
            println!("superuser '{}' created (id {})", user.username, user.id);
            app.shutdown().await
        }
        Command::ClearSessions => {
            let app = bookshelf_app::bootstrap(settings).await?;
            let purged = bookshelf_app::modules::accounts::clear_expired_sessions(&app.state).await?;
            println!("removed {purged} expired session(s)");
            app.shutdown().await
        }
    }
}
