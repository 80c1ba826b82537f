use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::{error, info};

use quaver::app_runtime::AppRuntime;
use quaver::config_persistence::{default_config_path, load_config_file, persist_config_file};
use quaver::library::TreePosition;

/// Music library and queue manager
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a directory and add it to the import list
    Import { dir: PathBuf },
    /// Rebuild the library from storage and the import list
    Refresh,
    /// Print the artist/song index
    Library,
    /// Print the saved playlist catalog
    Playlists,
    /// Queue files (or an artist from the index) and print the queue
    Queue {
        files: Vec<PathBuf>,
        /// Queue every song of this artist row
        #[arg(long)]
        artist_row: Option<usize>,
        /// Save the queue as a playlist at this path
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Load a saved playlist by catalog row and print it
    Open { row: usize },
    /// Rename an artist across tags, storage and index
    RenameArtist { old: String, new: String },
    /// Retitle one track
    Retitle { path: PathBuf, title: String },
    /// Rename a saved playlist file
    RenamePlaylist { path: PathBuf, name: String },
    /// Remove a saved playlist and delete its file
    DeletePlaylist { path: PathBuf },
    /// Set the initial playback mode
    Mode {
        #[arg(long)]
        repeat_one: Option<bool>,
        #[arg(long)]
        repeat_all: Option<bool>,
        #[arg(long)]
        shuffle: Option<bool>,
    },
}

/// Stored paths are canonical, so command-line paths are resolved first.
fn canonical(path: &Path) -> quaver::Result<PathBuf> {
    path.canonicalize()
        .map_err(|_| quaver::Error::FileMissing(path.to_path_buf()))
}

fn print_queue(runtime: &AppRuntime) {
    let playlist = runtime.queue().playlist();
    for (row, track) in playlist.tracks().iter().enumerate() {
        let marker = if playlist.current_index() == Some(row) {
            '>'
        } else {
            ' '
        };
        println!(
            "{} {:>3}  {} - {} [{}]",
            marker,
            row,
            track.artist,
            track.title,
            track.formatted_length()
        );
    }
}

fn run(cli: Cli, config_path: PathBuf) -> quaver::Result<()> {
    let mut config = load_config_file(&config_path);

    if let Commands::Mode {
        repeat_one,
        repeat_all,
        shuffle,
    } = &cli.command
    {
        if let Some(value) = repeat_one {
            config.playback.repeat_one = *value;
        }
        if let Some(value) = repeat_all {
            config.playback.repeat_all = *value;
        }
        if let Some(value) = shuffle {
            config.playback.shuffle = *value;
        }
        persist_config_file(&config, &config_path);
        println!("{:?}", config.playback.mode());
        return Ok(());
    }

    let mut runtime = AppRuntime::build(&config)?;

    match cli.command {
        Commands::Import { dir } => {
            let report = runtime.library_mut().import_from_dir(&dir, true)?;
            println!(
                "{} added, {} already known, {} unreadable, {} failed",
                report.added, report.duplicates, report.unreadable, report.failed
            );
        }
        Commands::Refresh => {
            let report = runtime.library_mut().refresh()?;
            runtime.playlists_mut().refresh()?;
            println!("{} new tracks", report.added);
        }
        Commands::Library => {
            for (artist_row, artist) in runtime.library().tree().artists().iter().enumerate() {
                println!("{:>3}  {} ({})", artist_row, artist.name, artist.songs.len());
                for song in &artist.songs {
                    println!("       {}", song.title);
                }
            }
        }
        Commands::Playlists => {
            for (row, entry) in runtime.playlists().entries().iter().enumerate() {
                println!("{:>3}  {}  {}", row, entry.name, entry.path.display());
            }
        }
        Commands::Queue {
            files,
            artist_row,
            save,
        } => {
            if let Some(row) = artist_row {
                runtime.activate_library_item(TreePosition::Artist(row))?;
            }
            runtime.queue_paths(&files);
            print_queue(&runtime);
            if let Some(path) = save {
                let written = runtime.save_queue(&path)?;
                info!("Saved queue to {}", written.display());
            }
        }
        Commands::Open { row } => {
            runtime.open_saved_playlist(row)?;
            print_queue(&runtime);
        }
        Commands::RenameArtist { old, new } => {
            let moved = runtime.library_mut().rename_artist(&old, &new)?;
            println!("{} songs moved to {}", moved, new);
        }
        Commands::Retitle { path, title } => {
            runtime
                .library_mut()
                .rename_track_title(&canonical(&path)?, &title)?;
        }
        Commands::RenamePlaylist { path, name } => {
            let renamed = runtime.playlists_mut().rename(&canonical(&path)?, &name)?;
            println!("{}", renamed.display());
        }
        Commands::DeletePlaylist { path } => {
            runtime.playlists_mut().unregister(&canonical(&path)?)?;
        }
        Commands::Mode { .. } => {}
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    let level = match cli.verbose {
        0 => config_level(&config_path),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let mut clog = colog::default_builder();
    clog.filter(None, level);
    clog.init();

    if let Err(err) = run(cli, config_path) {
        error!("{}", err);
        return Err(Box::new(err));
    }
    Ok(())
}

/// Log level from an existing config file, without creating one.
fn config_level(config_path: &Path) -> log::LevelFilter {
    std::fs::read_to_string(config_path)
        .ok()
        .and_then(|content| toml::from_str::<quaver::config::Config>(&content).ok())
        .map(|config| config.runtime.level_filter())
        .unwrap_or(log::LevelFilter::Info)
}
