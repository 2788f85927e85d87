use anyhow::{Context, Result};
use mlchat_core::agent::AgentLoop;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::Path;
use termimad::MadSkin;
use tracing::{debug, warn};

const PROMPT: &str = "> ";

#[derive(Debug, PartialEq, Eq)]
pub enum Line<'a> {
    Empty,
    Exit,
    Query(&'a str),
}

pub fn classify(line: &str) -> Line<'_> {
    let line = line.trim();
    if line.is_empty() {
        Line::Empty
    } else if is_exit_command(line) {
        Line::Exit
    } else {
        Line::Query(line)
    }
}

pub fn is_exit_command(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "exit" | "quit")
}

pub fn skin() -> MadSkin {
    MadSkin::default()
}

pub fn print_answer(skin: &MadSkin, answer: &str) {
    println!("{}", skin.term_text(answer));
}

pub async fn run(agent_loop: &AgentLoop, skin: &MadSkin, history_path: &Path) -> Result<()> {
    let mut editor = DefaultEditor::new().context("Failed to start line editor")?;
    if let Err(e) = editor.load_history(history_path) {
        debug!(path = %history_path.display(), "no history loaded: {}", e);
    }

    println!("📊 mlchat");
    println!("Ask about your experiments. Type 'exit' or 'quit' to leave.\n");

    loop {
        match editor.readline(PROMPT) {
            Ok(line) => match classify(&line) {
                Line::Empty => continue,
                Line::Exit => {
                    println!("👋 Goodbye!");
                    break;
                }
                Line::Query(query) => {
                    let _ = editor.add_history_entry(query);

                    println!("\n🤔 Processing...\n");
                    match agent_loop.process(query).await {
                        Ok(response) => print_answer(skin, &response),
                        Err(e) => eprintln!("❌ Error: {}", e),
                    }
                    println!();
                }
            },
            Err(ReadlineError::Eof | ReadlineError::Interrupted) => {
                println!("\n👋 Goodbye!");
                break;
            }
            Err(e) => return Err(e).context("Failed to read input"),
        }
    }

    save_history(&mut editor, history_path);
    Ok(())
}

fn save_history(editor: &mut DefaultEditor, path: &Path) {
    if let Some(parent) = path.parent()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        warn!(path = %parent.display(), "could not create history directory: {}", e);
        return;
    }
    if let Err(e) = editor.save_history(path) {
        warn!(path = %path.display(), "could not save history: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_words_are_case_insensitive_and_trimmed() {
        for input in ["exit", "quit", "EXIT", "  Quit  ", "exit\n"] {
            assert!(is_exit_command(input), "{input:?}");
        }
        for input in ["exit now", "q", "", "quitter"] {
            assert!(!is_exit_command(input), "{input:?}");
        }
    }

    #[test]
    fn classifies_lines() {
        assert_eq!(classify("   "), Line::Empty);
        assert_eq!(classify(" QUIT "), Line::Exit);
        assert_eq!(
            classify("  which run has the best accuracy? "),
            Line::Query("which run has the best accuracy?")
        );
    }

    #[test]
    fn saves_history_into_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history");
        let mut editor = DefaultEditor::new().unwrap();
        editor.add_history_entry("list experiments").unwrap();

        save_history(&mut editor, &path);

        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.contains("list experiments"));
    }
}
