//! Branching dialogue graphs and a reader that plays them.
//!
//! A [`DialogueGraph`] holds dialogue sets (lines spoken in order, at random, or
//! offered as player answers) and condition nodes, linked by integer tokens.
//! A [`DialogueReader`] walks a graph, resolving each line's text through a
//! [`ContentResolver`] and telling the host what to display, play and wait for.

pub use crate::{
    content::{resolve_or_empty, ContentResolver, StringTable, STRING_TABLE_POSTFIX},
    context::{
        load_character_colors,
        load_character_colors_from_path,
        AudioLibrary,
        CharacterColor,
        Color,
        ReaderConfig,
        ReaderContext,
    },
    document::{decode_graph, encode_graph, graph_file_name, load_graph, save_graph, GRAPH_EXTENSION},
    errors::{ContentError, GraphError, GraphLoadError, ReaderError, StringTableError},
    graph::{
        Condition,
        DanglingLink,
        DialogueGraph,
        DialogueSet,
        Line,
        Node,
        Position,
        SetType,
        Token,
        WaitingType,
        DEFAULT_STARTER,
        NO_LINK,
    },
    reader::{
        AdvanceSignal,
        AnswerOption,
        AssetGate,
        DialogueReader,
        ReaderEvent,
        ReaderState,
        WaitReason,
    },
    shuffle::ShuffleBag,
};

pub mod dialogue_proto {
    include!(concat!(env!("OUT_DIR"), "/dialogue.rs"));
}

mod content;
mod context;
mod document;
mod errors;
mod graph;
mod reader;
mod shuffle;
