//! The dialogue graph: sets of lines and condition nodes, linked by tokens.
//!
//! Edges are plain integer tokens looked up in the graph, never references, so a
//! graph can be saved, loaded and edited freely. A token that names no node is
//! the end of the dialogue.

use std::collections::BTreeMap;

use log::*;
use rand::Rng;

use crate::errors::GraphError;

/// Stable identifier of a graph node, used as the target of every link.
pub type Token = i32;

/// Link value meaning "no link": the dialogue ends (or, inside a basic set,
/// falls through to the set's own exit).
pub const NO_LINK: Token = -1;

/// Name of the starter used when none is given.
pub const DEFAULT_STARTER: &str = "Default";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum WaitingType {
    /// Go on as soon as the line's hold is over.
    #[default]
    None,
    WaitForClick,
    /// Wait `extra_delay` seconds after the hold.
    WaitForTime,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SetType {
    /// Lines spoken one after the other (or randomly).
    #[default]
    Basic,
    /// Every line is an answer the player can pick, each with its own link.
    PlayerAnswer,
}

/// Position of a node in the authoring canvas. Ignored at runtime.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn offset(&mut self, delta: Position) {
        self.x += delta.x;
        self.y += delta.y;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// Key of the line in the string table.
    pub key: String,
    /// Speaker, used to pick a text color.
    pub character: String,
    pub waiting_type: WaitingType,
    /// Seconds the line stays up before its waiting policy applies.
    pub initial_delay: f32,
    /// Seconds waited after the hold when `waiting_type` is `WaitForTime`.
    pub extra_delay: f32,
    pub linked_token: Token,
}

impl Default for Line {
    fn default() -> Self {
        Self {
            key: String::new(),
            character: String::new(),
            waiting_type: WaitingType::None,
            initial_delay: 0.0,
            extra_delay: 0.0,
            linked_token: NO_LINK,
        }
    }
}

impl Line {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn spoken_by(mut self, character: impl Into<String>) -> Self {
        self.character = character.into();
        self
    }

    pub fn waiting(mut self, waiting_type: WaitingType) -> Self {
        self.waiting_type = waiting_type;
        self
    }

    pub fn delays(mut self, initial_delay: f32, extra_delay: f32) -> Self {
        self.initial_delay = initial_delay.max(0.0);
        self.extra_delay = extra_delay.max(0.0);
        self
    }

    pub fn linked_to(mut self, token: Token) -> Self {
        self.linked_token = token;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogueSet {
    pub token: Token,
    pub set_type: SetType,
    pub lines: Vec<Line>,
    pub play_only_one_line: bool,
    pub play_randomly: bool,
    pub position: Position,
}

impl DialogueSet {
    pub fn new(token: Token, set_type: SetType, lines: Vec<Line>) -> Self {
        Self {
            token,
            set_type,
            lines,
            play_only_one_line: false,
            play_randomly: false,
            position: Position::default(),
        }
    }

    pub fn basic(token: Token, lines: Vec<Line>) -> Self {
        Self::new(token, SetType::Basic, lines)
    }

    pub fn player_answer(token: Token, lines: Vec<Line>) -> Self {
        Self::new(token, SetType::PlayerAnswer, lines)
    }

    pub fn only_one_line(mut self, value: bool) -> Self {
        self.play_only_one_line = value;
        self
    }

    pub fn randomly(mut self, value: bool) -> Self {
        self.play_randomly = value;
        self
    }

    /// Where a basic set goes once it is done: the link of its last line.
    pub fn exit_token(&self) -> Token {
        self.lines.last().map_or(NO_LINK, |line| line.linked_token)
    }

    /// Links that actually drive playback, as `(line index, target)`.
    fn outgoing_links(&self) -> Vec<(usize, Token)> {
        match self.set_type {
            SetType::Basic => match self.lines.len() {
                0 => Vec::new(),
                len => vec![(len - 1, self.exit_token())],
            },
            SetType::PlayerAnswer => self.lines.iter()
                .map(|line| line.linked_token)
                .enumerate()
                .collect(),
        }
    }
}

/// A node that branches on a named boolean flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub token: Token,
    pub condition_name: String,
    pub token_if_true: Token,
    pub token_if_false: Token,
    pub position: Position,
}

impl Condition {
    pub fn new(token: Token, condition_name: impl Into<String>) -> Self {
        Self {
            token,
            condition_name: condition_name.into(),
            token_if_true: NO_LINK,
            token_if_false: NO_LINK,
            position: Position::default(),
        }
    }

    pub fn branches(mut self, token_if_true: Token, token_if_false: Token) -> Self {
        self.token_if_true = token_if_true;
        self.token_if_false = token_if_false;
        self
    }

    pub fn branch(&self, value: bool) -> Token {
        if value {
            self.token_if_true
        } else {
            self.token_if_false
        }
    }
}

/// Any node a token can resolve to.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Node<'a> {
    Set(&'a DialogueSet),
    Condition(&'a Condition),
}

impl Node<'_> {
    pub fn token(&self) -> Token {
        match self {
            Self::Set(set) => set.token,
            Self::Condition(condition) => condition.token,
        }
    }
}

/// A link pointing at a token no node carries. Playing it ends the dialogue,
/// which is usually not what the author meant.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DanglingLink {
    pub from: Token,
    /// Index of the line holding the link, `None` for condition branches.
    pub line: Option<usize>,
    pub target: Token,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DialogueGraph {
    pub name: String,
    /// Identifier of the content source holding this dialogue's lines.
    pub source_id: String,
    pub(crate) sets: Vec<DialogueSet>,
    pub(crate) conditions: Vec<Condition>,
    pub(crate) starters: BTreeMap<String, Token>,
}

impl DialogueGraph {
    pub fn new(name: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_id: source_id.into(),
            ..Self::default()
        }
    }

    /// Sets in creation order.
    pub fn sets(&self) -> &[DialogueSet] {
        &self.sets
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn starters(&self) -> &BTreeMap<String, Token> {
        &self.starters
    }

    pub fn contains_token(&self, token: Token) -> bool {
        self.node(token).is_some()
    }

    pub fn node(&self, token: Token) -> Option<Node<'_>> {
        if let Some(set) = self.set(token) {
            return Some(Node::Set(set));
        }
        self.condition(token).map(Node::Condition)
    }

    pub fn set(&self, token: Token) -> Option<&DialogueSet> {
        self.sets.iter().find(|set| set.token == token)
    }

    pub fn set_mut(&mut self, token: Token) -> Option<&mut DialogueSet> {
        self.sets.iter_mut().find(|set| set.token == token)
    }

    pub fn condition(&self, token: Token) -> Option<&Condition> {
        self.conditions.iter().find(|condition| condition.token == token)
    }

    pub fn condition_mut(&mut self, token: Token) -> Option<&mut Condition> {
        self.conditions.iter_mut().find(|condition| condition.token == token)
    }

    /// Looks up the set a link points at. `None` means the dialogue is over.
    pub fn next_set(&self, token: Token) -> Option<&DialogueSet> {
        self.set(token)
    }

    pub fn starting_token(&self) -> Option<Token> {
        self.starters.get(DEFAULT_STARTER).copied()
    }

    /// The set flagged as starting, or the first created set if none is.
    pub fn starting_set(&self) -> Result<&DialogueSet, GraphError> {
        self.starting_set_for(DEFAULT_STARTER)
    }

    /// The set registered for `starter`, falling back to the default starter
    /// and then to the first created set.
    pub fn starting_set_for(&self, starter: &str) -> Result<&DialogueSet, GraphError> {
        let flagged = self.starters.get(starter)
            .or_else(|| self.starters.get(DEFAULT_STARTER))
            .and_then(|&token| self.set(token));
        if let Some(set) = flagged {
            return Ok(set);
        }
        self.sets.first().ok_or(GraphError::EmptyGraph)
    }

    pub fn set_starting_set(&mut self, token: Token) -> Result<(), GraphError> {
        self.set_starter(DEFAULT_STARTER, token)
    }

    pub fn set_starter(&mut self, starter: impl Into<String>, token: Token) -> Result<(), GraphError> {
        if self.set(token).is_none() {
            return Err(GraphError::NotASet(token));
        }
        self.starters.insert(starter.into(), token);
        Ok(())
    }

    pub fn remove_starter(&mut self, starter: &str) -> Option<Token> {
        self.starters.remove(starter)
    }

    /// Creates a basic set with a single empty line and returns its token.
    pub fn add_set(&mut self, position: Position) -> Token {
        let token = self.fresh_token(&mut rand::rng());
        let mut set = DialogueSet::basic(token, vec![Line::default()]);
        set.position = position;
        self.sets.push(set);
        debug!("Added set {} to '{}'", token, self.name);
        token
    }

    /// Creates a condition node with no branches and returns its token.
    pub fn add_condition(&mut self, position: Position) -> Token {
        let token = self.fresh_token(&mut rand::rng());
        let mut condition = Condition::new(token, String::new());
        condition.position = position;
        self.conditions.push(condition);
        debug!("Added condition {} to '{}'", token, self.name);
        token
    }

    /// Adds an already built set, keeping its token.
    pub fn insert_set(&mut self, set: DialogueSet) -> Result<Token, GraphError> {
        self.check_new_token(set.token)?;
        if set.lines.is_empty() {
            return Err(GraphError::EmptySet(set.token));
        }
        let token = set.token;
        self.sets.push(set);
        Ok(token)
    }

    /// Adds an already built condition, keeping its token.
    pub fn insert_condition(&mut self, condition: Condition) -> Result<Token, GraphError> {
        self.check_new_token(condition.token)?;
        let token = condition.token;
        self.conditions.push(condition);
        Ok(token)
    }

    /// Removes a set. Links pointing at it are left alone and will end the
    /// dialogue; starters pointing at it are dropped.
    pub fn remove_set(&mut self, token: Token) -> Result<DialogueSet, GraphError> {
        let index = self.sets.iter()
            .position(|set| set.token == token)
            .ok_or(GraphError::UnknownToken(token))?;
        self.starters.retain(|_, target| *target != token);
        Ok(self.sets.remove(index))
    }

    pub fn remove_condition(&mut self, token: Token) -> Result<Condition, GraphError> {
        let index = self.conditions.iter()
            .position(|condition| condition.token == token)
            .ok_or(GraphError::UnknownToken(token))?;
        Ok(self.conditions.remove(index))
    }

    /// Appends an empty line to a set and returns its index. In a basic set
    /// only the last line links out, so the previous last line loses its link.
    pub fn add_line(&mut self, token: Token) -> Result<usize, GraphError> {
        let set = self.set_mut(token).ok_or(GraphError::NotASet(token))?;
        if set.set_type == SetType::Basic {
            if let Some(last) = set.lines.last_mut() {
                last.linked_token = NO_LINK;
            }
        }
        set.lines.push(Line::default());
        Ok(set.lines.len() - 1)
    }

    pub fn remove_line(&mut self, token: Token, index: usize) -> Result<Line, GraphError> {
        let set = self.set_mut(token).ok_or(GraphError::NotASet(token))?;
        if index >= set.lines.len() {
            return Err(GraphError::LineIndexOutOfRange { token, index });
        }
        if set.lines.len() == 1 {
            return Err(GraphError::LastLine(token));
        }
        Ok(set.lines.remove(index))
    }

    /// Switches a set between basic and player-answer. Becoming basic clears
    /// every link but the last line's.
    pub fn change_type(&mut self, token: Token, set_type: SetType) -> Result<(), GraphError> {
        let set = self.set_mut(token).ok_or(GraphError::NotASet(token))?;
        set.set_type = set_type;
        if set_type == SetType::Basic {
            let last = set.lines.len().saturating_sub(1);
            for line in &mut set.lines[..last] {
                line.linked_token = NO_LINK;
            }
        }
        Ok(())
    }

    pub fn link_line(&mut self, token: Token, index: usize, target: Token) -> Result<(), GraphError> {
        let set = self.set_mut(token).ok_or(GraphError::NotASet(token))?;
        let line = set.lines.get_mut(index)
            .ok_or(GraphError::LineIndexOutOfRange { token, index })?;
        line.linked_token = target;
        Ok(())
    }

    pub fn link_condition(&mut self, token: Token, outcome: bool, target: Token) -> Result<(), GraphError> {
        let condition = self.condition_mut(token).ok_or(GraphError::UnknownToken(token))?;
        if outcome {
            condition.token_if_true = target;
        } else {
            condition.token_if_false = target;
        }
        Ok(())
    }

    pub fn drag(&mut self, token: Token, delta: Position) -> Result<(), GraphError> {
        if let Some(set) = self.set_mut(token) {
            set.position.offset(delta);
        } else if let Some(condition) = self.condition_mut(token) {
            condition.position.offset(delta);
        } else {
            return Err(GraphError::UnknownToken(token));
        }
        Ok(())
    }

    pub fn drag_all(&mut self, delta: Position) {
        for set in &mut self.sets {
            set.position.offset(delta);
        }
        for condition in &mut self.conditions {
            condition.position.offset(delta);
        }
    }

    /// Every link that points at a token no node carries. Explicit `NO_LINK`s
    /// are not reported.
    pub fn dangling_links(&self) -> Vec<DanglingLink> {
        let mut dangling = Vec::new();
        for set in &self.sets {
            for (line, target) in set.outgoing_links() {
                if target != NO_LINK && !self.contains_token(target) {
                    dangling.push(DanglingLink { from: set.token, line: Some(line), target });
                }
            }
        }
        for condition in &self.conditions {
            for &target in &[condition.token_if_true, condition.token_if_false] {
                if target != NO_LINK && !self.contains_token(target) {
                    dangling.push(DanglingLink { from: condition.token, line: None, target });
                }
            }
        }
        dangling
    }

    /// Checks the invariants a loaded graph must hold: unique tokens, no
    /// reserved token, no empty set.
    pub(crate) fn validate(&self) -> Result<(), GraphError> {
        let mut seen = std::collections::HashSet::new();
        let tokens = self.sets.iter().map(|set| set.token)
            .chain(self.conditions.iter().map(|condition| condition.token));
        for token in tokens {
            if token == NO_LINK {
                return Err(GraphError::ReservedToken);
            }
            if !seen.insert(token) {
                return Err(GraphError::DuplicateToken(token));
            }
        }
        if let Some(set) = self.sets.iter().find(|set| set.lines.is_empty()) {
            return Err(GraphError::EmptySet(set.token));
        }
        Ok(())
    }

    fn check_new_token(&self, token: Token) -> Result<(), GraphError> {
        if token == NO_LINK {
            return Err(GraphError::ReservedToken);
        }
        if self.contains_token(token) {
            return Err(GraphError::DuplicateToken(token));
        }
        Ok(())
    }

    fn fresh_token<R: Rng + ?Sized>(&self, rng: &mut R) -> Token {
        loop {
            let token = rng.random_range(0..Token::MAX);
            if !self.contains_token(token) {
                return token;
            }
            debug!("Token {} already taken, rolling again", token);
        }
    }
}
