use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};
use tracing_subscriber::EnvFilter;

use tunelog::{app::App, cli, config, error};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in with Spotify through the browser
    Auth,

    /// Remove stored tokens
    Logout,

    /// Show the session state
    Status,

    /// Search tracks
    Search(SearchOptions),

    /// Show a track with its audio features and artist
    Track(TrackOptions),

    /// Show what is playing right now
    NowPlaying(NowPlayingOptions),

    /// List recently played tracks
    Recent(RecentOptions),

    /// Fetch album art through the local cache
    Art(ArtOptions),

    /// Manage the artwork cache
    Cache(CacheOptions),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    /// Free-text query
    query: String,
}

#[derive(Parser, Debug, Clone)]
pub struct TrackOptions {
    /// Spotify track id
    id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct NowPlayingOptions {
    /// Keep polling until interrupted
    #[clap(long)]
    watch: bool,

    /// Seconds between polls with --watch
    #[clap(long, default_value_t = 5)]
    interval: u64,
}

#[derive(Parser, Debug, Clone)]
pub struct RecentOptions {
    /// Number of tracks (1-50)
    #[clap(long, default_value_t = 20)]
    limit: u32,
}

#[derive(Parser, Debug, Clone)]
pub struct ArtOptions {
    /// Image URL
    url: String,
}

#[derive(Parser, Debug, Clone)]
pub struct CacheOptions {
    #[command(subcommand)]
    command: CacheSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CacheSubcommand {
    /// Show the disk usage of the artwork cache
    Size,
    /// Delete every cached artwork file
    Clear,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Command::Completions(opt) = &cli.command {
        let mut cmd = Cli::command_for_update();
        let name = cmd.get_name().to_string();
        generate(opt.shell, &mut cmd, name, &mut std::io::stdout());
        return;
    }

    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    let config = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => error!("Invalid configuration. Err: {}", e),
    };

    let app = match App::build(config) {
        Ok(app) => app,
        Err(e) => error!("Cannot set up the HTTP client. Err: {}", e),
    };

    // Local-only commands skip the network round trip of a restore.
    match cli.command {
        Command::Art(opt) => return cli::art(&app, &opt.url).await,
        Command::Cache(opt) => {
            return match opt.command {
                CacheSubcommand::Size => cli::cache_size(&app).await,
                CacheSubcommand::Clear => cli::cache_clear(&app).await,
            };
        }
        _ => {}
    }

    app.session.restore().await;

    match cli.command {
        Command::Auth => cli::auth(&app).await,
        Command::Logout => cli::logout(&app).await,
        Command::Status => cli::status(&app).await,
        Command::Search(opt) => cli::search(&app, &opt.query).await,
        Command::Track(opt) => cli::track(&app, &opt.id).await,
        Command::NowPlaying(opt) => cli::now_playing(&app, opt.watch, opt.interval).await,
        Command::Recent(opt) => cli::recent(&app, opt.limit).await,
        Command::Art(_) | Command::Cache(_) | Command::Completions(_) => {}
    }
}
