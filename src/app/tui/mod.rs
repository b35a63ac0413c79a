mod actions;
mod render;
mod session;

use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::TableState;

use crate::config::Config;

use super::catalog::Catalog;
use super::episode::truncate;
use super::launcher::{ExternalPlayer, play_through_queue};
use super::player::PlaybackQueueController;
use super::queue_outcome_message;

use self::actions::{
    ControlOutcome, RefreshResult, TransitionBoard, apply_control, drain_refresh_results,
    spawn_refresh, status_error, status_info,
};
use self::render::draw_tui;
use self::session::TuiSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Control {
    Previous,
    PlayPause,
    Next,
    Loop,
    Shuffle,
}

impl Control {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Previous => "PREVIOUS",
            Self::PlayPause => "PLAY/PAUSE",
            Self::Next => "NEXT",
            Self::Loop => "LOOP",
            Self::Shuffle => "SHUFFLE",
        }
    }

    pub(crate) fn move_left(self) -> Self {
        match self {
            Self::Previous => Self::Previous,
            Self::PlayPause => Self::Previous,
            Self::Next => Self::PlayPause,
            Self::Loop => Self::Next,
            Self::Shuffle => Self::Loop,
        }
    }

    pub(crate) fn move_right(self) -> Self {
        match self {
            Self::Previous => Self::PlayPause,
            Self::PlayPause => Self::Next,
            Self::Next => Self::Loop,
            Self::Loop => Self::Shuffle,
            Self::Shuffle => Self::Shuffle,
        }
    }
}

#[derive(Debug, Clone)]
pub(super) struct PendingNotice {
    pub(super) title: &'static str,
    pub(super) message: String,
}

impl PendingNotice {
    fn new(title: &'static str, headline: &str, detail: &str) -> Self {
        Self {
            title,
            message: format!(
                "{headline}\n\n{}\n\nPress any key to continue.",
                truncate(detail, 50)
            ),
        }
    }
}

pub(crate) fn run_tui(
    catalog: &Catalog<'_>,
    controller: &mut PlaybackQueueController,
    config: &Config,
) -> Result<()> {
    let limit = config.list_limit;
    let transitions = Rc::new(RefCell::new(None::<String>));
    controller.subscribe(TransitionBoard::new(Rc::clone(&transitions)));

    let mut session = TuiSession::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .context("failed to initialize terminal backend")?;
    terminal.clear()?;

    let (mut items, mut status) = match catalog.latest(limit) {
        Ok(items) if items.is_empty() => (
            items,
            status_info("No episodes available. Press `r` to refresh."),
        ),
        Ok(items) => (items, status_info("Ready.")),
        Err(err) => (
            Vec::new(),
            status_error(&format!("Loading episodes failed: {err:#}")),
        ),
    };
    let mut table_state = TableState::default();
    table_state.select((!items.is_empty()).then_some(0));
    let mut control = Control::PlayPause;
    let mut pending_notice = None::<PendingNotice>;
    let mut refreshing = false;
    let (refresh_tx, refresh_rx) = mpsc::channel::<RefreshResult>();

    loop {
        if let Some(message) =
            drain_refresh_results(&refresh_rx, catalog, &mut items, &mut table_state)
        {
            refreshing = false;
            status = message;
        }
        if let Some(message) = transitions.borrow_mut().take() {
            status = status_info(&message);
        }

        terminal.draw(|frame| {
            draw_tui(
                frame,
                &items,
                &mut table_state,
                controller.state(),
                control,
                &status,
                pending_notice.as_ref(),
                refreshing,
            )
        })?;

        if !event::poll(Duration::from_millis(200))? {
            continue;
        }

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if pending_notice.is_some() {
            pending_notice = None;
            continue;
        }

        let pressed = match key.code {
            KeyCode::Char('q') => break,
            KeyCode::Up => {
                if let Some(selected) = table_state.selected() {
                    table_state.select(Some(selected.saturating_sub(1)));
                }
                None
            }
            KeyCode::Down => {
                if let Some(selected) = table_state.selected()
                    && !items.is_empty()
                {
                    let next = (selected + 1).min(items.len().saturating_sub(1));
                    table_state.select(Some(next));
                }
                None
            }
            KeyCode::Left => {
                control = control.move_left();
                None
            }
            KeyCode::Right => {
                control = control.move_right();
                None
            }
            KeyCode::Char(' ') => Some(control),
            KeyCode::Char('n') => Some(Control::Next),
            KeyCode::Char('b') => Some(Control::Previous),
            KeyCode::Char('l') => Some(Control::Loop),
            KeyCode::Char('s') => Some(Control::Shuffle),
            KeyCode::Enter => {
                let Some(selected) = table_state.selected().filter(|idx| *idx < items.len())
                else {
                    continue;
                };
                let queue = items.iter().map(|item| item.to_episode()).collect();
                if let Err(err) = controller.play_from_list(queue, selected) {
                    status = status_error(&format!("Queue failed: {err}"));
                }
                None
            }
            KeyCode::Char('p') => {
                let Some(item) = table_state.selected().and_then(|idx| items.get(idx)) else {
                    continue;
                };
                controller.play_single(item.to_episode());
                None
            }
            KeyCode::Char('o') => {
                let Some(current) = controller.state().current_episode() else {
                    status = status_error("Nothing queued. Press Enter or p on an episode first.");
                    continue;
                };
                if !controller.state().is_playing {
                    let title = current.title.clone();
                    pending_notice = Some(PendingNotice::new(
                        "Paused",
                        "Playback is paused. Resume before opening the player.",
                        &title,
                    ));
                    continue;
                }

                session.suspend()?;
                let mut player = ExternalPlayer::new(config.player_command.clone());
                let result = play_through_queue(controller, &mut player);
                session.resume()?;
                terminal.clear()?;

                // The run's own transitions would otherwise overwrite its summary.
                transitions.borrow_mut().take();
                status = match result {
                    Ok(outcome) => status_info(&queue_outcome_message(&outcome, controller.state())),
                    Err(err) => status_error(&format!("Player failed: {err:#}")),
                };
                None
            }
            KeyCode::Char('r') => {
                if catalog.is_offline() {
                    status = status_error("Refresh unavailable in offline mode.");
                } else if !refreshing {
                    refreshing = true;
                    status = status_info("Refreshing episodes...");
                    spawn_refresh(catalog.api().clone(), limit, refresh_tx.clone());
                }
                None
            }
            _ => None,
        };

        let Some(pressed) = pressed else {
            continue;
        };
        match apply_control(controller, pressed) {
            ControlOutcome::Applied => {}
            ControlOutcome::NothingQueued => {
                status = status_info("Nothing queued. Press Enter or p on an episode first.");
            }
            ControlOutcome::AtEnd => {
                let title = current_title(controller);
                pending_notice = Some(PendingNotice::new(
                    "No More Episodes",
                    "No next episode in the queue.",
                    &title,
                ));
                status = status_info("No next episode available.");
            }
            ControlOutcome::AtStart => {
                let title = current_title(controller);
                pending_notice = Some(PendingNotice::new(
                    "No More Episodes",
                    "No previous episode in the queue.",
                    &title,
                ));
                status = status_info("No previous episode available.");
            }
        }
    }

    terminal.show_cursor()?;
    session.leave()?;
    Ok(())
}

fn current_title(controller: &PlaybackQueueController) -> String {
    controller
        .state()
        .current_episode()
        .map(|episode| episode.title.clone())
        .unwrap_or_default()
}
