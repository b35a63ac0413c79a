use log::debug;
use thiserror::Error;

use super::episode::Episode;

/// Snapshot of the now-playing queue shared by every view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PlaybackState {
    pub(crate) queue: Vec<Episode>,
    pub(crate) current_index: usize,
    pub(crate) is_playing: bool,
    pub(crate) is_looping: bool,
    pub(crate) is_shuffling: bool,
}

impl PlaybackState {
    pub(crate) fn has_previous(&self) -> bool {
        self.current_index > 0
    }

    pub(crate) fn has_next(&self) -> bool {
        self.current_index + 1 < self.queue.len()
    }

    pub(crate) fn current_episode(&self) -> Option<&Episode> {
        self.queue.get(self.current_index)
    }

    pub(crate) fn summary(&self) -> PlaybackSummary {
        PlaybackSummary {
            queue_len: self.queue.len(),
            current_index: self.current_index,
            is_playing: self.is_playing,
            is_looping: self.is_looping,
            is_shuffling: self.is_shuffling,
        }
    }
}

/// Position and flags of a [`PlaybackState`], without the episodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PlaybackSummary {
    pub(crate) queue_len: usize,
    pub(crate) current_index: usize,
    pub(crate) is_playing: bool,
    pub(crate) is_looping: bool,
    pub(crate) is_shuffling: bool,
}

impl PlaybackSummary {
    pub(crate) fn same_position(&self, other: &Self) -> bool {
        self.queue_len == other.queue_len && self.current_index == other.current_index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub(crate) enum QueueError {
    #[error("episode index {index} is out of range for a queue of {len}")]
    InvalidIndex { index: usize, len: usize },
}

pub(crate) trait PlaybackObserver {
    fn state_changed(&mut self, state: &PlaybackState);
}

impl<F> PlaybackObserver for F
where
    F: FnMut(&PlaybackState),
{
    fn state_changed(&mut self, state: &PlaybackState) {
        self(state)
    }
}

/// Sole owner of [`PlaybackState`]. Every transition is synchronous and is
/// broadcast to the registered observers in registration order. No-op calls
/// do not notify.
#[derive(Default)]
pub(crate) struct PlaybackQueueController {
    state: PlaybackState,
    observers: Vec<Box<dyn PlaybackObserver>>,
}

impl PlaybackQueueController {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub(crate) fn subscribe<O>(&mut self, observer: O)
    where
        O: PlaybackObserver + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    pub(crate) fn play_single(&mut self, episode: Episode) {
        self.replace_queue(vec![episode], 0);
    }

    pub(crate) fn play_from_list(
        &mut self,
        list: Vec<Episode>,
        index: usize,
    ) -> Result<(), QueueError> {
        if index >= list.len() {
            return Err(QueueError::InvalidIndex {
                index,
                len: list.len(),
            });
        }
        self.replace_queue(list, index);
        Ok(())
    }

    /// Moves to the next queue entry. Returns false at the end of the queue.
    pub(crate) fn advance(&mut self) -> bool {
        if !self.state.has_next() {
            return false;
        }
        self.state.current_index += 1;
        self.notify();
        true
    }

    /// Moves to the previous queue entry. Returns false at the start of the queue.
    pub(crate) fn retreat(&mut self) -> bool {
        if !self.state.has_previous() {
            return false;
        }
        self.state.current_index -= 1;
        self.notify();
        true
    }

    pub(crate) fn toggle_playing(&mut self) {
        self.state.is_playing = !self.state.is_playing;
        self.notify();
    }

    // Looping and shuffling are observable flags only; navigation ignores them.
    pub(crate) fn toggle_looping(&mut self) {
        self.state.is_looping = !self.state.is_looping;
        self.notify();
    }

    pub(crate) fn toggle_shuffling(&mut self) {
        self.state.is_shuffling = !self.state.is_shuffling;
        self.notify();
    }

    fn replace_queue(&mut self, queue: Vec<Episode>, index: usize) {
        self.state.queue = queue;
        self.state.current_index = index;
        self.state.is_playing = true;
        self.notify();
    }

    fn notify(&mut self) {
        for observer in &mut self.observers {
            observer.state_changed(&self.state);
        }
    }
}

/// Debug-logs what changed between consecutive states.
#[derive(Debug, Default)]
pub(crate) struct TransitionLogger {
    last: Option<PlaybackSummary>,
}

impl PlaybackObserver for TransitionLogger {
    fn state_changed(&mut self, state: &PlaybackState) {
        let current = state.summary();
        let title = state
            .current_episode()
            .map(|episode| episode.title.as_str())
            .unwrap_or("-");
        match self.last {
            Some(last) if last.same_position(&current) => debug!(
                "playback flags: playing={} looping={} shuffling={}",
                state.is_playing, state.is_looping, state.is_shuffling
            ),
            _ => debug!(
                "now at {}/{}: {title} (playing={})",
                state.current_index + 1,
                state.queue.len(),
                state.is_playing
            ),
        }
        self.last = Some(current);
    }
}
