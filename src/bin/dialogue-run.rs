use std::env;
use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use colloquy::*;

const DEFAULT_LOCALE: &str = "en";

fn find_string_table(graph_path: &Path, graph: &DialogueGraph) -> PathBuf {
    let by_source = graph_path.with_file_name(format!("{}{}", graph.source_id, STRING_TABLE_POSTFIX));
    if !graph.source_id.is_empty() && by_source.exists() {
        by_source
    } else {
        graph_path.with_extension("csv")
    }
}

fn print_events(events: &[ReaderEvent]) {
    for event in events {
        match event {
            ReaderEvent::DisplayLine { character, text, .. } if character.is_empty() => {
                println!("{}", text);
            }
            ReaderEvent::DisplayLine { character, text, .. } => {
                println!("{}: {}", character, text);
            }
            ReaderEvent::PlayAudio { key, duration } => {
                println!("== Audio: {} ({:.2}s) ==", key, duration);
            }
            ReaderEvent::ShowAnswers(options) => {
                println!("== Choose answer ==");
                for option in options {
                    println!("{}: {}", option.index, option.text);
                }
            }
            ReaderEvent::ReadingEnded => println!("== Dialogue complete =="),
            _ => {}
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();

    let mut args = env::args().skip(1);

    // Read first argument as a path to a saved dialogue.
    let graph_path = match args.next() {
        Some(path) => PathBuf::from(path),
        None => {
            eprintln!("usage: dialogue-run <dialogue.{}> [starter] [locale]", GRAPH_EXTENSION);
            return Ok(());
        }
    };
    let starter = args.next().unwrap_or_else(|| DEFAULT_STARTER.to_string());
    let locale = args.next().unwrap_or_else(|| DEFAULT_LOCALE.to_string());

    let graph = load_graph(&graph_path)?;
    let string_table = StringTable::from_path(find_string_table(&graph_path, &graph))?;

    let mut gate = AssetGate::new();
    gate.graph_loaded(graph);
    gate.content_loaded(string_table);
    let mut reader = gate.take_reader()?;

    let events = reader.start_from(&starter, ReaderContext::new(locale))?;
    print_events(&events);

    loop {
        let events = match reader.state().clone() {
            ReaderState::AwaitingAdvance { reason: WaitReason::Click, .. } => {
                // Enter stands in for a click.
                let mut input = String::new();
                io::stdin().read_line(&mut input)?;
                reader.advance(AdvanceSignal::Click)
            }
            ReaderState::AwaitingAdvance { reason: WaitReason::Timer, seconds, wait_id } => {
                thread::sleep(Duration::from_secs_f32(seconds));
                reader.advance(AdvanceSignal::TimerElapsed { wait_id })
            }
            ReaderState::AwaitingAdvance { reason: WaitReason::AudioEnd, seconds, wait_id } => {
                thread::sleep(Duration::from_secs_f32(seconds));
                reader.advance(AdvanceSignal::AudioFinished { wait_id })
            }
            ReaderState::AwaitingPlayerChoice { .. } => {
                // Block to accept input from player.
                let mut selection = String::new();
                io::stdin().read_line(&mut selection)?;
                match selection.trim().parse::<usize>() {
                    Ok(index) => match reader.choose_line(index) {
                        Ok(events) => events,
                        Err(err) => {
                            eprintln!("{}", err);
                            continue;
                        }
                    },
                    Err(_) => {
                        eprintln!("Please enter an answer number.");
                        continue;
                    }
                }
            }
            ReaderState::Idle | ReaderState::PlayingLine | ReaderState::Finished => break,
        };
        print_events(&events);
    }

    Ok(())
}
