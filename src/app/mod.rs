mod api;
mod catalog;
mod episode;
mod launcher;
mod player;
mod tui;


use anyhow::{Context, Result};

use crate::cli::{CacheCommand, Cli, Command};
use crate::config::Config;
use crate::db::Database;
use crate::paths::{config_file_path, database_file_path};

use self::api::EpisodeApi;
use self::catalog::Catalog;
use self::episode::{duration_to_time_string, html_to_text, truncate};
use self::launcher::{ExternalPlayer, QueueRunOutcome, play_through_queue};
use self::player::{PlaybackQueueController, PlaybackState, TransitionLogger};

pub fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&config_file_path()?, cli.api_url.as_deref())?;
    let db = open_db()?;
    let catalog = Catalog::new(
        &db,
        EpisodeApi::from_config(&config),
        config.revalidate_after(),
        cli.offline,
    );

    // One controller for the whole session, lent to whichever view runs.
    let mut controller = PlaybackQueueController::new();
    controller.subscribe(TransitionLogger::default());

    match cli.command {
        Some(Command::List { limit }) => run_list(&catalog, limit.unwrap_or(config.list_limit))?,
        Some(Command::Show { id }) => run_show(&catalog, &id)?,
        Some(Command::Play { id, no_launch }) => {
            run_play(&catalog, &mut controller, &config, &id, no_launch)?
        }
        Some(Command::Queue {
            start,
            limit,
            no_launch,
        }) => run_queue(
            &catalog,
            &mut controller,
            &config,
            start,
            limit.unwrap_or(config.list_limit),
            no_launch,
        )?,
        Some(Command::Warm { limit }) => run_warm(&catalog, limit.unwrap_or(config.warm_limit))?,
        Some(Command::Cache {
            action: CacheCommand::Clear,
        }) => {
            let removed = db.clear()?;
            println!("Removed {removed} cached row(s).");
        }
        Some(Command::Tui) | None => tui::run_tui(&catalog, &mut controller, &config)?,
    }

    Ok(())
}

fn run_list(catalog: &Catalog<'_>, limit: usize) -> Result<()> {
    let episodes = catalog.latest(limit)?;
    if episodes.is_empty() {
        println!("No episodes available.");
        return Ok(());
    }

    println!(
        "{:<28} {:<44} {:<28} {:<10} {:<8}",
        "ID", "TITLE", "MEMBERS", "DATE", "DURATION"
    );
    for episode in episodes {
        println!(
            "{:<28} {:<44} {:<28} {:<10} {:<8}",
            truncate(&episode.id, 28),
            truncate(&episode.title, 44),
            truncate(&episode.members, 28),
            episode.published_at,
            episode.duration_as_string
        );
    }
    Ok(())
}

fn run_show(catalog: &Catalog<'_>, id: &str) -> Result<()> {
    let episode = catalog.episode(id)?;
    println!("{}", episode.title);
    println!("  Members: {}", episode.members);
    println!("  Published: {}", episode.published_at);
    println!("  Duration: {}", episode.duration_as_string);
    println!("  Audio: {}", episode.url);
    let description = html_to_text(&episode.description);
    if !description.is_empty() {
        println!("\n{description}");
    }
    Ok(())
}

fn run_play(
    catalog: &Catalog<'_>,
    controller: &mut PlaybackQueueController,
    config: &Config,
    id: &str,
    no_launch: bool,
) -> Result<()> {
    let episode = catalog.episode(id)?;
    controller.play_single(episode.to_episode());
    play_loaded_queue(controller, config, no_launch)
}

fn run_queue(
    catalog: &Catalog<'_>,
    controller: &mut PlaybackQueueController,
    config: &Config,
    start: usize,
    limit: usize,
    no_launch: bool,
) -> Result<()> {
    let episodes = catalog.latest(limit)?;
    if episodes.is_empty() {
        println!("No episodes available.");
        return Ok(());
    }

    let total = episodes.len();
    let queue = episodes.iter().map(|e| e.to_episode()).collect();
    controller
        .play_from_list(queue, start.wrapping_sub(1))
        .with_context(|| format!("--start {start} does not match any of the {total} episode(s)"))?;
    play_loaded_queue(controller, config, no_launch)
}

fn play_loaded_queue(
    controller: &mut PlaybackQueueController,
    config: &Config,
    no_launch: bool,
) -> Result<()> {
    println!("{}", format_now_playing(controller.state()));
    if no_launch {
        return Ok(());
    }

    let mut player = ExternalPlayer::new(config.player_command.clone());
    let outcome = play_through_queue(controller, &mut player)?;
    println!("{}", queue_outcome_message(&outcome, controller.state()));
    Ok(())
}

fn run_warm(catalog: &Catalog<'_>, limit: usize) -> Result<()> {
    let episodes = catalog.warm(limit)?;
    println!("Cached {} episode(s):", episodes.len());
    for episode in episodes {
        println!("  {}  {}", episode.id, truncate(&episode.title, 60));
    }
    Ok(())
}

fn open_db() -> Result<Database> {
    let db_path = database_file_path()?;
    let db = Database::open(&db_path)?;
    db.migrate()?;
    Ok(db)
}

fn flag(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

pub(crate) fn format_now_playing(state: &PlaybackState) -> String {
    let Some(episode) = state.current_episode() else {
        return "Nothing queued.".to_string();
    };
    format!(
        "{} {}/{}: {}\n  Members: {}\n  Duration: {}\n  Audio: {}\n  previous: {}  next: {}  loop: {}  shuffle: {}",
        if state.is_playing { "Playing" } else { "Paused" },
        state.current_index + 1,
        state.queue.len(),
        episode.title,
        episode.members,
        duration_to_time_string(episode.duration),
        episode.url,
        if state.has_previous() { "yes" } else { "no" },
        if state.has_next() { "yes" } else { "no" },
        flag(state.is_looping),
        flag(state.is_shuffling),
    )
}

pub(crate) fn queue_outcome_message(outcome: &QueueRunOutcome, state: &PlaybackState) -> String {
    if outcome.reached_end {
        return format!(
            "Reached the end of the queue after {} episode(s).",
            outcome.played
        );
    }
    match state.current_episode() {
        Some(episode) => format!(
            "Playback stopped/interrupted on {}. Played {} episode(s).",
            episode.title, outcome.played
        ),
        None => "Playback stopped.".to_string(),
    }
}
