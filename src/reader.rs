//! The dialogue reader: walks a graph and tells the host what to show.
//!
//! The reader never blocks. Every call returns the events produced on the way
//! and leaves the reader in a state saying what it waits for next: a click, a
//! timer, the end of a voice clip or a player choice. The host feeds the
//! matching signal back through [`DialogueReader::advance`],
//! [`DialogueReader::tick`] or [`DialogueReader::choose_line`].

use std::collections::HashMap;

use log::*;
use rand::RngCore;

use crate::content::{resolve_or_empty, ContentResolver};
use crate::context::{AudioLibrary, Color, ReaderConfig, ReaderContext};
use crate::errors::ReaderError;
use crate::graph::{
    DialogueGraph,
    Line,
    Node,
    SetType,
    Token,
    WaitingType,
    DEFAULT_STARTER,
};
use crate::shuffle::ShuffleBag;

/// Remaining wait time, in seconds, that counts as elapsed.
const TIME_EPSILON: f32 = 1e-4;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WaitReason {
    Click,
    Timer,
    AudioEnd,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReaderState {
    Idle,
    /// Only seen while a call is running.
    PlayingLine,
    AwaitingAdvance {
        reason: WaitReason,
        /// Length of the wait, zero for clicks.
        seconds: f32,
        /// Identifies this wait; completions carrying another id are stale.
        wait_id: u64,
    },
    AwaitingPlayerChoice {
        set: Token,
    },
    Finished,
}

/// Input that ends a wait.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AdvanceSignal {
    Click,
    TimerElapsed { wait_id: u64 },
    AudioFinished { wait_id: u64 },
}

/// One answer offered to the player.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOption {
    pub index: usize,
    pub line_id: String,
    pub text: String,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReaderEvent {
    ReadingStarted,
    /// A line is about to be shown. Carries the line id.
    LineRead(String),
    DisplayLine {
        line_id: String,
        character: String,
        text: String,
        color: Color,
    },
    PlayAudio {
        key: String,
        duration: f32,
    },
    ShowAnswers(Vec<AnswerOption>),
    ClearText,
    ReadingEnded,
}

/// Where to go once the current line is done.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Next {
    /// Keep playing a basic set. The index is ignored for random sets.
    Line { set: Token, index: usize },
    /// Enter whatever node the token names, or end if there is none.
    Node(Token),
}

/// What entering a node leads to.
enum Entry {
    Go(Next),
    Answers,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Phase {
    /// The line's initial delay or voice clip is running.
    Hold,
    /// The line's waiting policy is running.
    Advance,
}

#[derive(Debug, Clone, PartialEq)]
struct Pending {
    next: Next,
    waiting_type: WaitingType,
    extra_delay: f32,
    phase: Phase,
}

pub struct DialogueReader {
    graph: DialogueGraph,
    content: Box<dyn ContentResolver>,
    audio: Option<Box<dyn AudioLibrary>>,
    config: ReaderConfig,
    context: ReaderContext,
    rng: Box<dyn RngCore>,

    state: ReaderState,
    pending: Option<Pending>,
    /// Random-order pools for the sets of the current reading.
    bags: HashMap<Token, ShuffleBag>,
    next_wait_id: u64,
    remaining_time: f32,
}

impl DialogueReader {
    pub fn new(graph: DialogueGraph, content: impl ContentResolver + 'static) -> Self {
        Self::from_boxed(graph, Box::new(content))
    }

    fn from_boxed(graph: DialogueGraph, content: Box<dyn ContentResolver>) -> Self {
        Self {
            graph,
            content,
            audio: None,
            config: ReaderConfig::default(),
            context: ReaderContext::default(),
            rng: Box::new(rand::rng()),
            state: ReaderState::Idle,
            pending: None,
            bags: HashMap::new(),
            next_wait_id: 0,
            remaining_time: 0.0,
        }
    }

    pub fn with_config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_audio(mut self, audio: impl AudioLibrary + 'static) -> Self {
        self.audio = Some(Box::new(audio));
        self
    }

    pub fn with_rng(mut self, rng: impl RngCore + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    pub fn graph(&self) -> &DialogueGraph {
        &self.graph
    }

    pub fn context(&self) -> &ReaderContext {
        &self.context
    }

    pub fn state(&self) -> &ReaderState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        !matches!(self.state, ReaderState::Idle | ReaderState::Finished)
    }

    /// Starts reading from the default starting set.
    pub fn start(&mut self, context: ReaderContext) -> Result<Vec<ReaderEvent>, ReaderError> {
        self.start_from(DEFAULT_STARTER, context)
    }

    /// Starts reading from the set registered for `starter`. Any reading in
    /// progress is dropped without notice.
    pub fn start_from(&mut self, starter: &str, context: ReaderContext) -> Result<Vec<ReaderEvent>, ReaderError> {
        let token = self.graph.starting_set_for(starter)?.token;

        if self.is_running() {
            debug!("Restarting '{}' while it was still playing", self.graph.name);
        }
        self.pending = None;
        self.bags.clear();
        self.context = context;

        info!("Reading '{}' from set {}", self.graph.name, token);
        let mut events = vec![ReaderEvent::ReadingStarted];
        self.run(Next::Node(token), &mut events);
        Ok(events)
    }

    /// Ends the current wait if `signal` is the one the reader is waiting
    /// for. Other signals are logged and ignored.
    pub fn advance(&mut self, signal: AdvanceSignal) -> Vec<ReaderEvent> {
        let matches = match (&self.state, signal) {
            (ReaderState::AwaitingAdvance { reason: WaitReason::Click, .. }, AdvanceSignal::Click) => true,
            (
                ReaderState::AwaitingAdvance { reason: WaitReason::Timer, wait_id, .. },
                AdvanceSignal::TimerElapsed { wait_id: id },
            ) => *wait_id == id,
            (
                ReaderState::AwaitingAdvance { reason: WaitReason::AudioEnd, wait_id, .. },
                AdvanceSignal::AudioFinished { wait_id: id },
            ) => *wait_id == id,
            _ => false,
        };

        if !matches {
            debug!("Ignoring {:?} while {:?}", signal, self.state);
            return Vec::new();
        }

        let mut events = Vec::new();
        self.resume(&mut events);
        events
    }

    /// Counts down timer and voice clip waits, resuming once they run out.
    pub fn tick(&mut self, delta_seconds: f32) -> Vec<ReaderEvent> {
        match self.state {
            ReaderState::AwaitingAdvance { reason: WaitReason::Timer, .. }
            | ReaderState::AwaitingAdvance { reason: WaitReason::AudioEnd, .. } => {
                self.remaining_time -= delta_seconds;
                // Frame deltas rarely sum to the exact wait length.
                if self.remaining_time > TIME_EPSILON {
                    return Vec::new();
                }
                let mut events = Vec::new();
                self.resume(&mut events);
                events
            }
            _ => Vec::new(),
        }
    }

    /// Picks one of the answers currently offered.
    pub fn choose_line(&mut self, index: usize) -> Result<Vec<ReaderEvent>, ReaderError> {
        let set_token = match self.state {
            ReaderState::AwaitingPlayerChoice { set } => set,
            _ => return Err(ReaderError::NotAwaitingChoice),
        };
        let line = {
            let lines = self.graph.set(set_token).map_or(&[][..], |set| &set.lines[..]);
            lines.get(index)
                .cloned()
                .ok_or(ReaderError::InvalidChoice { index, count: lines.len() })?
        };
        debug!("Player chose answer {} of set {}", index, set_token);

        let mut events = Vec::new();
        self.state = ReaderState::PlayingLine;
        if let Some(next) = self.play_line(&line, Next::Node(line.linked_token), &mut events) {
            self.run(next, &mut events);
        }
        Ok(events)
    }

    /// Stops the reading in progress, dropping whatever it was waiting for.
    pub fn stop(&mut self) -> Vec<ReaderEvent> {
        let mut events = Vec::new();
        if self.is_running() {
            info!("Reading of '{}' stopped", self.graph.name);
            self.finish(&mut events);
        }
        events
    }

    /// Plays nodes until something makes the reader wait or the dialogue ends.
    /// A graph looping on itself with no wait is cut off after
    /// `max_chain_length` steps and ends like any other reading.
    fn run(&mut self, mut next: Next, events: &mut Vec<ReaderEvent>) {
        for _ in 0..self.config.max_chain_length {
            self.state = ReaderState::PlayingLine;

            let token = match next {
                Next::Line { set, index } => match self.play_basic_set(set, index, events) {
                    Some(following) => {
                        next = following;
                        continue;
                    }
                    None => return,
                },
                Next::Node(token) => token,
            };

            // Read what we need from the node first, so the graph is no longer
            // borrowed when we act on it.
            let entered = self.graph.node(token).map(|node| {
                trace!("Entering node {}", node.token());
                match node {
                    Node::Condition(condition) => {
                        let value = self.context.condition(&condition.condition_name);
                        debug!("Condition '{}' is {}", condition.condition_name, value);
                        Entry::Go(Next::Node(condition.branch(value)))
                    }
                    Node::Set(set) => match set.set_type {
                        SetType::Basic => Entry::Go(Next::Line { set: token, index: 0 }),
                        SetType::PlayerAnswer => Entry::Answers,
                    },
                }
            });

            match entered {
                Some(Entry::Answers) => {
                    self.present_answers(token, events);
                    return;
                }
                Some(Entry::Go(following)) => next = following,
                None => {
                    debug!("No node with token {}, ending the dialogue", token);
                    self.finish(events);
                    return;
                }
            }
        }

        error!(
            "'{}' ran {} steps without waiting, ending the dialogue",
            self.graph.name, self.config.max_chain_length,
        );
        self.finish(events);
    }

    /// Shows one line of a basic set. Returns where to go right away, or
    /// `None` if the reader is now waiting.
    fn play_basic_set(&mut self, token: Token, index: usize, events: &mut Vec<ReaderEvent>) -> Option<Next> {
        let set = match self.graph.set(token) {
            Some(set) if !set.lines.is_empty() => set,
            _ => {
                warn!("Set {} has no lines to play", token);
                return Some(Next::Node(crate::graph::NO_LINK));
            }
        };
        let len = set.lines.len();

        let (index, exhausted) = if set.play_randomly {
            let bag = self.bags.entry(token).or_insert_with(|| ShuffleBag::new(len));
            let drawn = bag.draw(&mut *self.rng).unwrap_or(0);
            let exhausted = bag.is_exhausted();
            if exhausted {
                self.bags.remove(&token);
            }
            (drawn, exhausted)
        } else {
            (index.min(len - 1), false)
        };

        let last_in_order = !set.play_randomly && index + 1 == len;
        let next = if last_in_order || set.play_only_one_line || (set.play_randomly && exhausted) {
            Next::Node(set.exit_token())
        } else {
            Next::Line { set: token, index: index + 1 }
        };

        debug!("Playing line {} of set {}", index, token);
        let line = set.lines[index].clone();
        self.play_line(&line, next, events)
    }

    /// Shows a line and sets up its waits.
    fn play_line(&mut self, line: &Line, next: Next, events: &mut Vec<ReaderEvent>) -> Option<Next> {
        let (reason, hold) = self.display_line(line, events);
        let pending = Pending {
            next,
            waiting_type: line.waiting_type,
            extra_delay: line.extra_delay,
            phase: Phase::Hold,
        };

        if hold > 0.0 {
            self.pending = Some(pending);
            self.suspend(reason, hold);
            None
        } else {
            self.apply_waiting(pending)
        }
    }

    /// Emits the line's events and returns how long it has to stay up.
    fn display_line(&mut self, line: &Line, events: &mut Vec<ReaderEvent>) -> (WaitReason, f32) {
        events.push(ReaderEvent::LineRead(line.key.clone()));

        let text = resolve_or_empty(&*self.content, &line.key, &self.context.locale_key);
        let color = self.context.color_for(&line.character, self.config.default_color);
        events.push(ReaderEvent::DisplayLine {
            line_id: line.key.clone(),
            character: line.character.clone(),
            text,
            color,
        });

        let clip = self.audio.as_ref().and_then(|audio| {
            let key = self.context.audio_key(&line.key);
            audio.clip_duration(&key).map(|duration| (key, duration))
        });
        match clip {
            // A voiced line stays up as long as its clip, whatever its delay.
            Some((key, duration)) => {
                let hold = duration + self.config.audio_guard;
                events.push(ReaderEvent::PlayAudio { key, duration });
                (WaitReason::AudioEnd, hold)
            }
            None => (WaitReason::Timer, line.initial_delay),
        }
    }

    /// Applies a line's waiting policy once its hold is over.
    fn apply_waiting(&mut self, pending: Pending) -> Option<Next> {
        match pending.waiting_type {
            WaitingType::None => Some(pending.next),
            WaitingType::WaitForClick => {
                self.pending = Some(Pending { phase: Phase::Advance, ..pending });
                self.suspend(WaitReason::Click, 0.0);
                None
            }
            WaitingType::WaitForTime if pending.extra_delay > 0.0 => {
                let seconds = pending.extra_delay;
                self.pending = Some(Pending { phase: Phase::Advance, ..pending });
                self.suspend(WaitReason::Timer, seconds);
                None
            }
            WaitingType::WaitForTime => Some(pending.next),
        }
    }

    fn resume(&mut self, events: &mut Vec<ReaderEvent>) {
        let pending = match self.pending.take() {
            Some(pending) => pending,
            None => {
                warn!("Resumed with nothing pending, ending the dialogue");
                self.finish(events);
                return;
            }
        };
        self.state = ReaderState::PlayingLine;

        let next = match pending.phase {
            Phase::Hold => self.apply_waiting(pending),
            Phase::Advance => Some(pending.next),
        };
        if let Some(next) = next {
            self.run(next, events);
        }
    }

    fn suspend(&mut self, reason: WaitReason, seconds: f32) {
        let wait_id = self.next_wait_id;
        self.next_wait_id += 1;
        self.remaining_time = seconds;
        self.state = ReaderState::AwaitingAdvance { reason, seconds, wait_id };
    }

    fn present_answers(&mut self, token: Token, events: &mut Vec<ReaderEvent>) {
        let lines = self.graph.set(token).map_or(&[][..], |set| &set.lines[..]);
        let options = lines.iter()
            .enumerate()
            .map(|(index, line)| AnswerOption {
                index,
                line_id: line.key.clone(),
                text: resolve_or_empty(&*self.content, &line.key, &self.context.locale_key),
                color: self.context.color_for(&line.character, self.config.default_color),
            })
            .collect();

        debug!("Waiting for the player to answer set {}", token);
        events.push(ReaderEvent::ShowAnswers(options));
        self.pending = None;
        self.state = ReaderState::AwaitingPlayerChoice { set: token };
    }

    fn finish(&mut self, events: &mut Vec<ReaderEvent>) {
        self.pending = None;
        self.remaining_time = 0.0;
        self.state = ReaderState::Finished;
        events.push(ReaderEvent::ClearText);
        events.push(ReaderEvent::ReadingEnded);
        info!("Finished reading '{}'", self.graph.name);
    }
}

/// Collects the graph and the string table, which are loaded separately, and
/// hands out a reader once both are in.
#[derive(Default)]
pub struct AssetGate {
    graph: Option<DialogueGraph>,
    content: Option<Box<dyn ContentResolver>>,
}

impl AssetGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph_loaded(&mut self, graph: DialogueGraph) {
        debug!("Dialogue '{}' is ready", graph.name);
        self.graph = Some(graph);
    }

    pub fn content_loaded(&mut self, content: impl ContentResolver + 'static) {
        debug!("Line content is ready");
        self.content = Some(Box::new(content));
    }

    pub fn is_ready(&self) -> bool {
        self.graph.is_some() && self.content.is_some()
    }

    /// Builds the reader once both assets are loaded. Nothing is consumed
    /// while they are not.
    pub fn take_reader(&mut self) -> Result<DialogueReader, ReaderError> {
        if !self.is_ready() {
            return Err(ReaderError::AssetsNotReady);
        }
        match (self.graph.take(), self.content.take()) {
            (Some(graph), Some(content)) => Ok(DialogueReader::from_boxed(graph, content)),
            _ => Err(ReaderError::AssetsNotReady),
        }
    }
}
