//! Line-oriented interactive session.

use std::path::Path;

use anyhow::Result;
use textclf_ai::ClassifierSession;
use textclf_core::Catalog;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::display;

const HELP: &str = "\
commands:
  /model NAME   switch model
  /models       list catalog models
  /state        show session state
  /history      show session history
  /clear        clear history
  /quit         exit
anything else is classified with the current model";

/// A parsed input line.
#[derive(Debug, PartialEq)]
enum Input<'a> {
    Text(&'a str),
    Model(&'a str),
    Models,
    State,
    History,
    Clear,
    Help,
    Quit,
    Unknown(&'a str),
    Blank,
}

fn parse_line(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Blank;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Text(line);
    };
    let (head, arg) = match command.split_once(char::is_whitespace) {
        Some((h, a)) => (h, a.trim()),
        None => (command, ""),
    };
    match (head, arg) {
        ("model", name) if !name.is_empty() => Input::Model(name),
        ("models", _) => Input::Models,
        ("state", _) => Input::State,
        ("history", _) => Input::History,
        ("clear", _) => Input::Clear,
        ("help", _) => Input::Help,
        ("quit" | "exit", _) => Input::Quit,
        _ => Input::Unknown(line),
    }
}

async fn select(session: &ClassifierSession, name: &str) {
    match session.select_model(name).await {
        Ok(()) => println!("Loaded model {name}"),
        Err(e) => println!("Error: {e}"),
    }
}

pub async fn run(
    session: &ClassifierSession,
    catalog: &Catalog,
    initial_model: Option<String>,
    export: Option<&Path>,
) -> Result<()> {
    if let Some(name) = initial_model {
        select(session, &name).await;
    } else {
        println!("No model selected. Use /model NAME (/models to list).");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            Input::Blank => {}
            Input::Text(text) => match session.classify(text).await {
                Ok(c) => println!("Classification: {c}"),
                Err(e) => println!("Error: {e}"),
            },
            Input::Model(name) => select(session, name).await,
            Input::Models => display::print_models(catalog),
            Input::State => println!(
                "{} (model: {})",
                session.state().as_str(),
                session.selected().as_deref().unwrap_or("none")
            ),
            Input::History => display::print_history(&session.history())?,
            Input::Clear => session.clear_history(),
            Input::Help => println!("{HELP}"),
            Input::Quit => break,
            Input::Unknown(cmd) => println!("unknown command {cmd:?}; try /help"),
        }
    }

    if let Some(path) = export {
        display::export_history(&session.history(), path)?;
        println!("History written to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_text_and_commands() {
        assert_eq!(parse_line("  Win a FREE prize "), Input::Text("Win a FREE prize"));
        assert_eq!(parse_line("/model spam"), Input::Model("spam"));
        assert_eq!(parse_line("/model   leading  "), Input::Model("leading"));
        assert_eq!(parse_line("/models"), Input::Models);
        assert_eq!(parse_line("/history"), Input::History);
        assert_eq!(parse_line("/exit"), Input::Quit);
        assert_eq!(parse_line("   "), Input::Blank);
    }

    #[test]
    fn model_without_name_is_unknown() {
        assert_eq!(parse_line("/model"), Input::Unknown("/model"));
        assert_eq!(parse_line("/bogus x"), Input::Unknown("/bogus x"));
    }
}
