/// Bounded command history feeding the IDS
///
/// Two views are kept:
/// - per-source: the last `history_len` commands of each source, committed
///   after the command has been evaluated (rate-of-change rule)
/// - recent: every command received during the last `window_steps` steps,
///   recorded when a frame arrives so that commands of the same step see each
///   other (Sybil rule)
use crate::types::Command;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone)]
pub struct CommandHistory {
    per_source: HashMap<String, VecDeque<Command>>,
    recent: VecDeque<Command>,
    history_len: usize,
    window_steps: u64,
}

/// Read-only view handed to the IDS for one command
#[derive(Debug, Clone, Copy)]
pub struct HistoryWindow<'a> {
    /// Commands previously evaluated for this source, oldest first
    pub source_history: Option<&'a VecDeque<Command>>,
    /// Commands of all sources inside the Sybil window (current frame included)
    pub recent: &'a VecDeque<Command>,
    /// Trust of the source before this command was scored
    pub source_trust: f64,
}

impl<'a> HistoryWindow<'a> {
    /// Last command of the same source, if any
    pub fn previous(&self) -> Option<&'a Command> {
        self.source_history.and_then(|history| history.back())
    }
}

impl CommandHistory {
    pub fn new(history_len: usize, window_steps: u64) -> Self {
        Self {
            per_source: HashMap::new(),
            recent: VecDeque::new(),
            history_len: history_len.max(1),
            window_steps: window_steps.max(1),
        }
    }

    /// Record an incoming frame and drop commands that left the window
    pub fn record_frame(&mut self, step: u64, frame: &[Command]) {
        self.recent.extend(frame.iter().cloned());

        let window = self.window_steps;
        self.recent.retain(|command| command.step + window > step);
    }

    /// Append an evaluated command to its source history
    pub fn commit(&mut self, command: &Command) {
        let history = self
            .per_source
            .entry(command.source_id.clone())
            .or_insert_with(VecDeque::new);

        history.push_back(command.clone());
        while history.len() > self.history_len {
            history.pop_front();
        }
    }

    pub fn window(&self, source_id: &str, source_trust: f64) -> HistoryWindow<'_> {
        HistoryWindow {
            source_history: self.per_source.get(source_id),
            recent: &self.recent,
            source_trust,
        }
    }

    pub fn recent_len(&self) -> usize {
        self.recent.len()
    }

    pub fn source_len(&self, source_id: &str) -> usize {
        self.per_source.get(source_id).map_or(0, VecDeque::len)
    }
}
