//! Cinetrack - Main entry point
//!
//! Catalog management, watch-progress inspection and headless playback
//! sessions from the command line.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tokio::time::{sleep_until, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cinetrack::catalog::NewMovie;
use cinetrack::db::MovieFilter;
use cinetrack::display;
use cinetrack::player::{HeadlessSurface, PlayerEvent, PlayerPhase, ResumeChoice};
use cinetrack::progress::{ProgressOutcome, ProgressStore};
use cinetrack::types::{MovieId, ViewerId};
use cinetrack::{Config, Database, Result, WatchPage};

#[derive(Parser)]
#[command(name = "cinetrack")]
#[command(author, version, about = "Resumable movie playback with per-viewer watch progress")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage catalog titles
    Movie {
        #[command(subcommand)]
        action: MovieAction,
    },

    /// Manage a viewer's favorite titles
    Favorite {
        #[command(subcommand)]
        action: FavoriteAction,
    },

    /// Inspect or edit a saved watch position
    Progress {
        #[command(subcommand)]
        action: ProgressAction,
    },

    /// Show the continue-watching list
    History {
        /// Viewer to show (defaults to general.viewer_id)
        #[arg(long)]
        viewer: Option<String>,

        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: u32,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Play a title on a headless surface, saving progress as it goes
    Watch {
        /// Catalog ID of the title
        #[arg(long)]
        movie: String,

        /// Viewer to track progress for (defaults to general.viewer_id)
        #[arg(long)]
        viewer: Option<String>,

        /// Ignore any saved position and start from the beginning
        #[arg(long)]
        start_over: bool,

        /// Media seconds per wall-clock second
        #[arg(long, default_value = "1.0")]
        speed: f64,

        /// Stop after this many wall-clock seconds
        #[arg(long = "for", value_name = "SECS")]
        for_secs: Option<u64>,

        /// Media length in seconds (defaults to the catalog runtime)
        #[arg(long)]
        length: Option<f64>,
    },

    /// Show or edit configuration
    Config {
        /// Print current configuration
        #[arg(long)]
        show: bool,

        /// Create default configuration file
        #[arg(long)]
        init: bool,
    },

    /// Database operations
    Db {
        /// Show database path and stats
        #[arg(long)]
        info: bool,
    },
}

#[derive(Subcommand)]
enum MovieAction {
    /// Add a title to the catalog
    Add {
        #[arg(long)]
        title: String,

        #[arg(long)]
        video_url: Option<String>,

        #[arg(long)]
        poster_url: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        duration_minutes: Option<i32>,

        #[arg(long)]
        release_year: Option<i32>,

        /// Genre tag; repeat or comma-separate for several
        #[arg(long = "genre", value_delimiter = ',')]
        genres: Vec<String>,

        /// Feature the title on the browse page
        #[arg(long)]
        featured: bool,
    },

    /// List catalog titles, newest first
    List {
        #[command(flatten)]
        filter: FilterArgs,

        /// Only featured titles
        #[arg(long)]
        featured: bool,

        /// Number of titles to show
        #[arg(short, long, default_value = "50")]
        limit: u32,
    },

    /// Show a catalog title
    Show {
        /// Catalog ID
        id: String,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// Case-insensitive title search
    #[arg(long)]
    search: Option<String>,

    /// Only titles tagged with this genre
    #[arg(long)]
    genre: Option<String>,

    /// Only titles released in this year
    #[arg(long)]
    year: Option<i32>,
}

impl FilterArgs {
    fn into_filter(self, featured_only: bool) -> MovieFilter {
        MovieFilter {
            search: self.search,
            genre: self.genre,
            release_year: self.year,
            featured_only,
        }
    }
}

#[derive(Subcommand)]
enum FavoriteAction {
    /// Add a title to the favorites
    Add {
        #[command(flatten)]
        target: ProgressTarget,
    },

    /// Remove a title from the favorites
    Remove {
        #[command(flatten)]
        target: ProgressTarget,
    },

    /// Add the title if it is not a favorite, remove it otherwise
    Toggle {
        #[command(flatten)]
        target: ProgressTarget,
    },

    /// List favorite titles
    List {
        /// Viewer (defaults to general.viewer_id)
        #[arg(long)]
        viewer: Option<String>,

        #[command(flatten)]
        filter: FilterArgs,
    },
}

#[derive(Args)]
struct ProgressTarget {
    /// Catalog ID of the title
    #[arg(long)]
    movie: String,

    /// Viewer (defaults to general.viewer_id)
    #[arg(long)]
    viewer: Option<String>,
}

#[derive(Subcommand)]
enum ProgressAction {
    /// Show the saved position
    Show {
        #[command(flatten)]
        target: ProgressTarget,
    },

    /// Report a position, applying the usual save rules
    Save {
        #[command(flatten)]
        target: ProgressTarget,

        /// Position in seconds
        #[arg(long)]
        progress: f64,

        /// Media length in seconds (0 if unknown)
        #[arg(long, default_value = "0")]
        duration: f64,
    },

    /// Forget the saved position
    Clear {
        #[command(flatten)]
        target: ProgressTarget,
    },
}

struct WatchOptions {
    movie: MovieId,
    viewer: Option<ViewerId>,
    start_over: bool,
    speed: f64,
    for_secs: Option<u64>,
    length: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first so its log level applies
    let config = if let Some(ref path) = cli.config {
        Config::load_from(path)?
    } else {
        Config::load()?
    };

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.general.log_level.to_lowercase()))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    config.validate()?;

    match cli.command {
        Some(Commands::Movie { action }) => run_movie(config, action).await,

        Some(Commands::Favorite { action }) => run_favorite(config, action).await,

        Some(Commands::Progress { action }) => run_progress(config, action).await,

        Some(Commands::History {
            viewer,
            limit,
            json,
        }) => run_history(config, viewer, limit, json).await,

        Some(Commands::Watch {
            movie,
            viewer,
            start_over,
            speed,
            for_secs,
            length,
        }) => {
            let viewer = config.current_viewer(viewer.as_deref());
            let options = WatchOptions {
                movie: MovieId::from(movie),
                viewer,
                start_over,
                speed,
                for_secs,
                length,
            };
            run_watch(config, options).await
        }

        Some(Commands::Config { show, init }) => {
            if init {
                let default_config = Config::default();
                default_config.save()?;
                println!(
                    "Created default configuration at {}",
                    Config::config_path()?.display()
                );
            } else if show {
                let contents = toml::to_string_pretty(&config)?;
                println!("{contents}");
            } else {
                println!("Configuration path: {}", Config::config_path()?.display());
            }
            Ok(())
        }

        Some(Commands::Db { info }) => {
            if info {
                let db = open_database(&config).await?;
                let movies = db.get_movie_count().await?;
                let positions = db.watch_history_count().await?;
                println!("Database path: {}", config.database_path()?.display());
                println!("Catalog titles: {movies}");
                println!("Saved positions: {positions}");
            }
            Ok(())
        }

        None => {
            // Default: continue watching for the configured viewer
            run_history(config, None, 10, false).await
        }
    }
}

async fn open_database(config: &Config) -> Result<Database> {
    let data_dir = config.data_dir()?;
    Database::new(&config.database, &data_dir).await
}

async fn run_movie(config: Config, action: MovieAction) -> Result<()> {
    let db = open_database(&config).await?;

    match action {
        MovieAction::Add {
            title,
            video_url,
            poster_url,
            description,
            duration_minutes,
            release_year,
            genres,
            featured,
        } => {
            let genres = genres
                .into_iter()
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty())
                .collect();
            let movie = db
                .insert_movie(&NewMovie {
                    title,
                    description,
                    poster_url,
                    video_url,
                    duration_minutes,
                    release_year,
                    genres,
                    is_featured: featured,
                })
                .await?;
            println!("Added \"{}\" as {}", movie.title, movie.id);
        }
        MovieAction::List {
            filter,
            featured,
            limit,
        } => {
            let filter = filter.into_filter(featured);
            let movies = db.list_movies(&filter, limit).await?;
            display::print_section_simple("CATALOG");
            if movies.is_empty() && filter.is_empty() {
                println!("  The catalog is empty.");
            } else if movies.is_empty() {
                println!("  No matching titles.");
            } else {
                display::display_movie_list(&movies);
            }
            println!();
        }
        MovieAction::Show { id } => match db.get_movie(&MovieId::from(id.as_str())).await? {
            Some(movie) => display::display_movie(&movie),
            None => println!("Movie not found: {id}"),
        },
    }
    Ok(())
}

async fn run_favorite(config: Config, action: FavoriteAction) -> Result<()> {
    let explicit = match &action {
        FavoriteAction::Add { target }
        | FavoriteAction::Remove { target }
        | FavoriteAction::Toggle { target } => target.viewer.as_deref(),
        FavoriteAction::List { viewer, .. } => viewer.as_deref(),
    };
    let Some(viewer) = config.current_viewer(explicit) else {
        println!("No viewer given. Pass --viewer or set general.viewer_id.");
        return Ok(());
    };

    let db = open_database(&config).await?;

    match action {
        FavoriteAction::Add { target } => {
            let movie = MovieId::from(target.movie.as_str());
            match db.add_favorite(&viewer, &movie).await? {
                Some(true) => println!("Added {movie} to favorites."),
                Some(false) => println!("{movie} is already a favorite."),
                None => println!("Movie not found: {movie}"),
            }
        }
        FavoriteAction::Remove { target } => {
            let movie = MovieId::from(target.movie.as_str());
            if db.remove_favorite(&viewer, &movie).await? {
                println!("Removed {movie} from favorites.");
            } else {
                println!("{movie} was not a favorite.");
            }
        }
        FavoriteAction::Toggle { target } => {
            let movie = MovieId::from(target.movie.as_str());
            match db.toggle_favorite(&viewer, &movie).await? {
                Some(true) => println!("Added {movie} to favorites."),
                Some(false) => println!("Removed {movie} from favorites."),
                None => println!("Movie not found: {movie}"),
            }
        }
        FavoriteAction::List { filter, .. } => {
            let movies = db
                .list_favorites(&viewer, &filter.into_filter(false))
                .await?;
            display::print_section_simple(&format!("FAVORITES ({viewer})"));
            if movies.is_empty() {
                println!("  No favorites yet.");
            } else {
                display::display_movie_list(&movies);
            }
            println!();
        }
    }
    Ok(())
}

async fn run_progress(config: Config, action: ProgressAction) -> Result<()> {
    let db = open_database(&config).await?;

    let target = match &action {
        ProgressAction::Show { target }
        | ProgressAction::Save { target, .. }
        | ProgressAction::Clear { target } => target,
    };
    let Some(viewer) = config.current_viewer(target.viewer.as_deref()) else {
        println!("No viewer given. Pass --viewer or set general.viewer_id.");
        return Ok(());
    };
    let movie = MovieId::from(target.movie.as_str());

    let store = ProgressStore::new(
        Arc::new(db),
        Some(viewer),
        Some(movie),
        config.playback.policy(),
    );

    match action {
        ProgressAction::Show { .. } => {
            let resume = store.load_progress().await;
            display::display_resume_point(&resume);
        }
        ProgressAction::Save {
            progress, duration, ..
        } => {
            let outcome = store.save_progress(progress, duration).await;
            println!("{}", describe_outcome(outcome));
        }
        ProgressAction::Clear { .. } => {
            let outcome = store.clear_progress().await;
            println!("{}", describe_outcome(outcome));
        }
    }
    Ok(())
}

const fn describe_outcome(outcome: ProgressOutcome) -> &'static str {
    match outcome {
        ProgressOutcome::Skipped => "Nothing to do: no viewer or movie.",
        ProgressOutcome::Ignored => "Too early to save; position ignored.",
        ProgressOutcome::Deleted => "Saved position removed.",
        ProgressOutcome::Upserted => "Position saved.",
        ProgressOutcome::Failed => "Storage failed; see the log.",
    }
}

async fn run_history(config: Config, viewer: Option<String>, limit: u32, json: bool) -> Result<()> {
    let Some(viewer) = config.current_viewer(viewer.as_deref()) else {
        println!("No viewer given. Pass --viewer or set general.viewer_id.");
        return Ok(());
    };

    let db = open_database(&config).await?;
    let entries = db.get_recent_watch_history(&viewer, limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    display::print_section_simple(&format!("CONTINUE WATCHING ({viewer})"));
    if entries.is_empty() {
        println!("  Nothing in progress.");
    } else {
        display::display_continue_watching(&entries, Utc::now());
    }
    println!();
    Ok(())
}

async fn run_watch(config: Config, options: WatchOptions) -> Result<()> {
    let db = open_database(&config).await?;

    let Some(movie) = db.get_movie(&options.movie).await? else {
        println!("Movie not found: {}", options.movie);
        return Ok(());
    };
    let length = options
        .length
        .or_else(|| movie.duration_minutes.map(|m| f64::from(m) * 60.0))
        .unwrap_or(0.0);

    let surface =
        HeadlessSurface::new(length, config.playback.headless_tick()).with_speed(options.speed);
    let Some(mut page) =
        WatchPage::open(&db, options.viewer, &options.movie, &config.playback, surface).await?
    else {
        println!("Movie not found: {}", options.movie);
        return Ok(());
    };

    if !page.is_playable() {
        println!("Video not available for \"{}\".", page.movie().title);
        page.close().await;
        return Ok(());
    }

    println!("Watching \"{}\"", page.movie().title);
    page.player().play();

    let stop_at = options
        .for_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    let stop = async move {
        match stop_at {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(stop);

    let mut status = tokio::time::interval(Duration::from_secs(5));

    loop {
        tokio::select! {
            event = page.next_event() => match event {
                Some(PlayerEvent::ResumePromptShown { saved }) => {
                    let (choice, verb) = if options.start_over {
                        (ResumeChoice::StartOver, "starting over")
                    } else {
                        (ResumeChoice::Resume, "resuming")
                    };
                    println!("Saved position at {saved}, {verb}");
                    page.player().resolve_resume_prompt(choice);
                }
                Some(PlayerEvent::Started) => println!("Playback started"),
                Some(PlayerEvent::PlayingChanged(false)) => {
                    let ended = page
                        .player()
                        .snapshot()
                        .await
                        .is_some_and(|s| s.phase == PlayerPhase::Ended);
                    if ended {
                        println!("Finished");
                        break;
                    }
                }
                Some(PlayerEvent::PlaybackFailed(reason) | PlayerEvent::SourceFailed(reason)) => {
                    eprintln!("Playback failed: {reason}");
                    break;
                }
                Some(_) => {}
                None => break,
            },
            _ = status.tick() => {
                if let Some(session) = page.player().snapshot().await {
                    println!("{}", display::player_status(&session));
                }
            }
            () = &mut stop => {
                info!("Stopping playback");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    let last = page.player().snapshot().await;
    page.close().await;
    if let Some(session) = last {
        println!("Stopped at {}", display::format_time(session.current_time));
    }
    Ok(())
}
