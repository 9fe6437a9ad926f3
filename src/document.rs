//! Saving and loading graphs as protobuf documents.

use std::fs;
use std::path::Path;

use log::*;
use prost::Message;

use crate::dialogue_proto as proto;
use crate::errors::GraphLoadError;
use crate::graph::{
    Condition,
    DialogueGraph,
    DialogueSet,
    Line,
    Position,
    SetType,
    WaitingType,
};

pub const GRAPH_EXTENSION: &str = "dlg";

/// File name a graph is saved under: its name without spaces.
pub fn graph_file_name(graph: &DialogueGraph) -> String {
    let name: String = graph.name.chars().filter(|c| !c.is_whitespace()).collect();
    format!("{}.{}", name, GRAPH_EXTENSION)
}

pub fn encode_graph(graph: &DialogueGraph) -> Result<Vec<u8>, GraphLoadError> {
    let document = proto::Dialogue::from(graph);
    let mut buf = Vec::with_capacity(document.encoded_len());
    document.encode(&mut buf)?;
    Ok(buf)
}

/// Decodes a graph and checks it. Dangling links are logged but accepted:
/// at runtime they just end the dialogue.
pub fn decode_graph(data: &[u8]) -> Result<DialogueGraph, GraphLoadError> {
    let document = proto::Dialogue::decode(data)?;
    let graph = DialogueGraph::try_from(document)?;
    for link in graph.dangling_links() {
        warn!(
            "'{}': node {} links to missing token {}; the dialogue will end there",
            graph.name, link.from, link.target,
        );
    }
    Ok(graph)
}

pub fn save_graph(graph: &DialogueGraph, path: impl AsRef<Path>) -> Result<(), GraphLoadError> {
    let path = path.as_ref();
    fs::write(path, encode_graph(graph)?)?;
    info!("Saved dialogue '{}' to {}", graph.name, path.display());
    Ok(())
}

pub fn load_graph(path: impl AsRef<Path>) -> Result<DialogueGraph, GraphLoadError> {
    let data = fs::read(path)?;
    decode_graph(&data)
}

impl From<Position> for proto::Position {
    fn from(position: Position) -> Self {
        Self { x: position.x, y: position.y }
    }
}

impl From<Option<proto::Position>> for Position {
    fn from(position: Option<proto::Position>) -> Self {
        position.map_or_else(Position::default, |p| Position::new(p.x, p.y))
    }
}

impl From<WaitingType> for proto::WaitingType {
    fn from(waiting_type: WaitingType) -> Self {
        match waiting_type {
            WaitingType::None => Self::None,
            WaitingType::WaitForClick => Self::WaitForClick,
            WaitingType::WaitForTime => Self::WaitForTime,
        }
    }
}

impl From<proto::WaitingType> for WaitingType {
    fn from(waiting_type: proto::WaitingType) -> Self {
        match waiting_type {
            proto::WaitingType::None => Self::None,
            proto::WaitingType::WaitForClick => Self::WaitForClick,
            proto::WaitingType::WaitForTime => Self::WaitForTime,
        }
    }
}

impl From<SetType> for proto::SetType {
    fn from(set_type: SetType) -> Self {
        match set_type {
            SetType::Basic => Self::Basic,
            SetType::PlayerAnswer => Self::PlayerAnswer,
        }
    }
}

impl From<proto::SetType> for SetType {
    fn from(set_type: proto::SetType) -> Self {
        match set_type {
            proto::SetType::Basic => Self::Basic,
            proto::SetType::PlayerAnswer => Self::PlayerAnswer,
        }
    }
}

impl From<&Line> for proto::Line {
    fn from(line: &Line) -> Self {
        Self {
            key: line.key.clone(),
            character: line.character.clone(),
            waiting_type: proto::WaitingType::from(line.waiting_type) as i32,
            initial_delay: line.initial_delay,
            extra_delay: line.extra_delay,
            linked_token: line.linked_token,
        }
    }
}

impl TryFrom<proto::Line> for Line {
    type Error = GraphLoadError;

    fn try_from(line: proto::Line) -> Result<Self, Self::Error> {
        let waiting_type = proto::WaitingType::from_i32(line.waiting_type)
            .ok_or(GraphLoadError::InvalidEnumValue {
                field: "Line.waiting_type",
                value: line.waiting_type,
            })?;
        Ok(Self {
            key: line.key,
            character: line.character,
            waiting_type: waiting_type.into(),
            initial_delay: line.initial_delay.max(0.0),
            extra_delay: line.extra_delay.max(0.0),
            linked_token: line.linked_token,
        })
    }
}

impl From<&DialogueSet> for proto::DialogueSet {
    fn from(set: &DialogueSet) -> Self {
        Self {
            token: set.token,
            set_type: proto::SetType::from(set.set_type) as i32,
            lines: set.lines.iter().map(proto::Line::from).collect(),
            play_only_one_line: set.play_only_one_line,
            play_randomly: set.play_randomly,
            position: Some(set.position.into()),
        }
    }
}

impl TryFrom<proto::DialogueSet> for DialogueSet {
    type Error = GraphLoadError;

    fn try_from(set: proto::DialogueSet) -> Result<Self, Self::Error> {
        let set_type = proto::SetType::from_i32(set.set_type)
            .ok_or(GraphLoadError::InvalidEnumValue {
                field: "DialogueSet.set_type",
                value: set.set_type,
            })?;
        let lines = set.lines.into_iter()
            .map(Line::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            token: set.token,
            set_type: set_type.into(),
            lines,
            play_only_one_line: set.play_only_one_line,
            play_randomly: set.play_randomly,
            position: set.position.into(),
        })
    }
}

impl From<&Condition> for proto::Condition {
    fn from(condition: &Condition) -> Self {
        Self {
            token: condition.token,
            condition_name: condition.condition_name.clone(),
            token_if_true: condition.token_if_true,
            token_if_false: condition.token_if_false,
            position: Some(condition.position.into()),
        }
    }
}

impl From<proto::Condition> for Condition {
    fn from(condition: proto::Condition) -> Self {
        Self {
            token: condition.token,
            condition_name: condition.condition_name,
            token_if_true: condition.token_if_true,
            token_if_false: condition.token_if_false,
            position: condition.position.into(),
        }
    }
}

impl From<&DialogueGraph> for proto::Dialogue {
    fn from(graph: &DialogueGraph) -> Self {
        Self {
            name: graph.name.clone(),
            source_id: graph.source_id.clone(),
            sets: graph.sets.iter().map(proto::DialogueSet::from).collect(),
            conditions: graph.conditions.iter().map(proto::Condition::from).collect(),
            starters: graph.starters.iter()
                .map(|(name, &token)| (name.clone(), token))
                .collect(),
        }
    }
}

impl TryFrom<proto::Dialogue> for DialogueGraph {
    type Error = GraphLoadError;

    fn try_from(document: proto::Dialogue) -> Result<Self, Self::Error> {
        let sets = document.sets.into_iter()
            .map(DialogueSet::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let graph = Self {
            name: document.name,
            source_id: document.source_id,
            sets,
            conditions: document.conditions.into_iter().map(Condition::from).collect(),
            starters: document.starters.into_iter().collect(),
        };
        graph.validate()?;
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::errors::GraphError;
    use crate::graph::{DEFAULT_STARTER, NO_LINK};

    fn sample_graph() -> DialogueGraph {
        let mut graph = DialogueGraph::new("Gate Guard", "guard_sheet");
        let mut greeting = DialogueSet::basic(11, vec![
            Line::new("guard_hello").spoken_by("guard").waiting(WaitingType::WaitForClick),
            Line::new("guard_who").spoken_by("guard").delays(1.5, 0.25).waiting(WaitingType::WaitForTime).linked_to(12),
        ]).randomly(true);
        greeting.position = Position::new(10.0, -4.5);
        graph.insert_set(greeting).unwrap();
        graph.insert_set(DialogueSet::player_answer(12, vec![
            Line::new("answer_friend").linked_to(13),
            Line::new("answer_leave").linked_to(NO_LINK),
        ])).unwrap();
        graph.insert_condition(Condition::new(13, "has_pass").branches(14, NO_LINK)).unwrap();
        graph.insert_set(DialogueSet::basic(14, vec![Line::new("guard_ok")]).only_one_line(true)).unwrap();
        graph.set_starting_set(11).unwrap();
        graph.set_starter("Night", 14).unwrap();
        graph
    }

    #[test]
    fn graph_survives_a_save_load_cycle() {
        let graph = sample_graph();
        let data = encode_graph(&graph).unwrap();
        let loaded = decode_graph(&data).unwrap();

        assert_eq!(loaded, graph);
        let tokens: Vec<_> = loaded.sets().iter().map(|set| set.token).collect();
        assert_eq!(tokens, vec![11, 12, 14]);
        assert_eq!(loaded.starters().get(DEFAULT_STARTER), Some(&11));
        assert_eq!(loaded.set(11).unwrap().lines[1].initial_delay, 1.5);
    }

    #[test]
    fn saves_and_loads_files() {
        let graph = sample_graph();
        let path = std::env::temp_dir().join(format!("colloquy-{}-{}", std::process::id(), graph_file_name(&graph)));
        save_graph(&graph, &path).unwrap();
        let loaded = load_graph(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded, graph);
    }

    #[test]
    fn file_name_drops_spaces() {
        assert_eq!(graph_file_name(&sample_graph()), "GateGuard.dlg");
    }

    #[test]
    fn corrupt_document_fails_to_load() {
        let result = decode_graph(&[0xff, 0xff, 0xff, 0xff]);
        assert!(matches!(result, Err(GraphLoadError::Decode(_))));

        let result = load_graph("/definitely/not/here.dlg");
        assert!(matches!(result, Err(GraphLoadError::Io(_))));
    }

    #[test]
    fn unknown_enum_values_are_rejected() {
        let mut document = proto::Dialogue::from(&sample_graph());
        document.sets[0].lines[0].waiting_type = 9;
        let result = DialogueGraph::try_from(document);
        assert!(matches!(
            result,
            Err(GraphLoadError::InvalidEnumValue { field: "Line.waiting_type", value: 9 })
        ));
    }

    #[test]
    fn duplicate_tokens_are_rejected() {
        let mut document = proto::Dialogue::from(&sample_graph());
        document.conditions[0].token = 11;
        let result = DialogueGraph::try_from(document);
        assert!(matches!(result, Err(GraphLoadError::Graph(GraphError::DuplicateToken(11)))));
    }

    #[test]
    fn dangling_links_still_load() {
        let mut graph = sample_graph();
        graph.link_line(14, 0, 999).unwrap();
        let loaded = decode_graph(&encode_graph(&graph).unwrap()).unwrap();
        assert_eq!(loaded.dangling_links().len(), 1);
    }
}
