use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc;

use ratatui::widgets::TableState;

use super::super::api::EpisodeApi;
use super::super::catalog::Catalog;
use super::super::episode::EpisodeDetail;
use super::super::player::{
    PlaybackObserver, PlaybackQueueController, PlaybackState, PlaybackSummary,
};
use super::Control;

#[derive(Debug)]
pub(super) struct RefreshResult {
    pub(super) limit: usize,
    pub(super) result: Result<Vec<EpisodeDetail>, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ControlOutcome {
    Applied,
    NothingQueued,
    AtEnd,
    AtStart,
}

pub(super) fn apply_control(
    controller: &mut PlaybackQueueController,
    control: Control,
) -> ControlOutcome {
    let queued = !controller.state().queue.is_empty();
    match control {
        Control::Next if controller.advance() => ControlOutcome::Applied,
        Control::Previous if controller.retreat() => ControlOutcome::Applied,
        Control::Next | Control::Previous if !queued => ControlOutcome::NothingQueued,
        Control::Next => ControlOutcome::AtEnd,
        Control::Previous => ControlOutcome::AtStart,
        Control::PlayPause => {
            controller.toggle_playing();
            ControlOutcome::Applied
        }
        Control::Loop => {
            controller.toggle_looping();
            ControlOutcome::Applied
        }
        Control::Shuffle => {
            controller.toggle_shuffling();
            ControlOutcome::Applied
        }
    }
}

/// Turns controller transitions into status-line messages.
pub(super) struct TransitionBoard {
    last: Option<PlaybackSummary>,
    pending: Rc<RefCell<Option<String>>>,
}

impl TransitionBoard {
    pub(super) fn new(pending: Rc<RefCell<Option<String>>>) -> Self {
        Self {
            last: None,
            pending,
        }
    }
}

impl PlaybackObserver for TransitionBoard {
    fn state_changed(&mut self, state: &PlaybackState) {
        let message = describe_transition(self.last, state);
        *self.pending.borrow_mut() = Some(message);
        self.last = Some(state.summary());
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

pub(super) fn describe_transition(last: Option<PlaybackSummary>, state: &PlaybackState) -> String {
    let now = state.summary();
    if let Some(last) = last
        && last.same_position(&now)
    {
        if last.is_playing != now.is_playing {
            return if now.is_playing {
                "Playback resumed.".to_string()
            } else {
                "Playback paused.".to_string()
            };
        }
        if last.is_looping != now.is_looping {
            return format!("Loop {}.", on_off(now.is_looping));
        }
        if last.is_shuffling != now.is_shuffling {
            return format!("Shuffle {}.", on_off(now.is_shuffling));
        }
    }

    match state.current_episode() {
        Some(episode) => format!(
            "Now playing {}/{}: {}",
            state.current_index + 1,
            state.queue.len(),
            episode.title
        ),
        None => "Queue is empty.".to_string(),
    }
}

pub(super) fn refresh_items(
    items: &mut Vec<EpisodeDetail>,
    table_state: &mut TableState,
    fresh: Vec<EpisodeDetail>,
) {
    let preferred_id = table_state
        .selected()
        .and_then(|idx| items.get(idx))
        .map(|item| item.id.clone());
    *items = fresh;
    if items.is_empty() {
        table_state.select(None);
        return;
    }

    if let Some(id) = preferred_id
        && let Some(idx) = items.iter().position(|item| item.id == id)
    {
        table_state.select(Some(idx));
        return;
    }

    match table_state.selected() {
        Some(selected) => table_state.select(Some(selected.min(items.len() - 1))),
        None => table_state.select(Some(0)),
    }
}

pub(super) fn status_info(msg: &str) -> String {
    format!("INFO: {msg}")
}

pub(super) fn status_error(msg: &str) -> String {
    format!("ERROR: {msg}")
}

pub(super) fn spawn_refresh(api: EpisodeApi, limit: usize, tx: mpsc::Sender<RefreshResult>) {
    std::thread::spawn(move || {
        let result = api.list_episodes(limit).map_err(|err| format!("{err:#}"));
        let _ = tx.send(RefreshResult { limit, result });
    });
}

/// Applies finished background refreshes, returning a status message when
/// one completed.
pub(super) fn drain_refresh_results(
    rx: &mpsc::Receiver<RefreshResult>,
    catalog: &Catalog<'_>,
    items: &mut Vec<EpisodeDetail>,
    table_state: &mut TableState,
) -> Option<String> {
    let mut status = None;
    while let Ok(refresh) = rx.try_recv() {
        status = Some(match refresh.result {
            Ok(episodes) => {
                let count = episodes.len();
                match catalog.store_listing(refresh.limit, &episodes) {
                    Ok(()) => {
                        refresh_items(items, table_state, episodes);
                        status_info(&format!("Refreshed {count} episode(s)."))
                    }
                    Err(err) => status_error(&format!("Caching refreshed episodes failed: {err:#}")),
                }
            }
            Err(err) => status_error(&format!("Refresh failed: {err}")),
        });
    }
    status
}

#[cfg(test)]
mod tests {
    use super::super::super::episode::Episode;
    use super::*;

    fn episode(title: &str) -> Episode {
        Episode {
            title: title.to_string(),
            members: String::new(),
            thumbnail: String::new(),
            duration: 30,
            url: format!("https://cdn.example.test/{title}.mp3"),
        }
    }

    fn detail(id: &str) -> EpisodeDetail {
        EpisodeDetail {
            id: id.to_string(),
            title: id.to_uppercase(),
            members: String::new(),
            thumbnail: String::new(),
            published_at: String::new(),
            duration: 30,
            duration_as_string: "00:00:30".to_string(),
            description: String::new(),
            url: String::new(),
        }
    }

    #[test]
    fn navigation_controls_report_queue_edges() {
        let mut controller = PlaybackQueueController::new();
        assert_eq!(
            apply_control(&mut controller, Control::Next),
            ControlOutcome::NothingQueued
        );

        controller
            .play_from_list(vec![episode("a"), episode("b")], 0)
            .expect("valid index");
        assert_eq!(
            apply_control(&mut controller, Control::Previous),
            ControlOutcome::AtStart
        );
        assert_eq!(
            apply_control(&mut controller, Control::Next),
            ControlOutcome::Applied
        );
        assert_eq!(
            apply_control(&mut controller, Control::Next),
            ControlOutcome::AtEnd
        );
        assert_eq!(controller.state().current_index, 1);
    }

    #[test]
    fn flag_controls_toggle_even_without_a_queue() {
        let mut controller = PlaybackQueueController::new();
        for control in [Control::PlayPause, Control::Loop, Control::Shuffle] {
            assert_eq!(apply_control(&mut controller, control), ControlOutcome::Applied);
        }
        let state = controller.state();
        assert!(state.is_playing && state.is_looping && state.is_shuffling);
    }

    #[test]
    fn transition_board_describes_each_change() {
        let pending = Rc::new(RefCell::new(None));
        let mut controller = PlaybackQueueController::new();
        controller.subscribe(TransitionBoard::new(Rc::clone(&pending)));

        controller
            .play_from_list(vec![episode("a"), episode("b")], 0)
            .expect("valid index");
        assert_eq!(
            pending.borrow_mut().take().as_deref(),
            Some("Now playing 1/2: a")
        );

        controller.advance();
        assert_eq!(
            pending.borrow_mut().take().as_deref(),
            Some("Now playing 2/2: b")
        );

        controller.toggle_playing();
        assert_eq!(
            pending.borrow_mut().take().as_deref(),
            Some("Playback paused.")
        );

        controller.toggle_looping();
        assert_eq!(pending.borrow_mut().take().as_deref(), Some("Loop on."));

        controller.toggle_shuffling();
        assert_eq!(pending.borrow_mut().take().as_deref(), Some("Shuffle on."));
    }

    #[test]
    fn reloading_the_same_position_still_announces_the_episode() {
        let mut state = PlaybackState {
            queue: vec![episode("a")],
            is_playing: true,
            ..PlaybackState::default()
        };
        let last = state.summary();
        state.queue = vec![episode("z")];
        assert_eq!(describe_transition(Some(last), &state), "Now playing 1/1: z");
    }

    #[test]
    fn refresh_keeps_selection_on_the_same_episode() {
        let mut items = vec![detail("a"), detail("b")];
        let mut table_state = TableState::default();
        table_state.select(Some(1));

        refresh_items(
            &mut items,
            &mut table_state,
            vec![detail("new"), detail("a"), detail("b")],
        );

        assert_eq!(table_state.selected(), Some(2));
        assert_eq!(items.len(), 3);

        refresh_items(&mut items, &mut table_state, Vec::new());
        assert_eq!(table_state.selected(), None);
    }
}
