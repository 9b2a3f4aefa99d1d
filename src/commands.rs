use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

use crate::{models::SolveMode, view::confidence_label, AppState};

pub const USAGE: &str = "\
usage:
  captcha-solver solve <image> [--mode text|math]
  captcha-solver history
  captcha-solver history show <index>
  captcha-solver history clear
  captcha-solver health";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Solve { image: PathBuf, mode: SolveMode },
    History,
    HistoryShow(usize),
    HistoryClear,
    Health,
    Help,
}

impl Command {
    /// Parses arguments without the program name.
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let Some(command) = args.next() else {
            return Ok(Command::Help);
        };

        match command.as_str() {
            "solve" => {
                let mut image = None;
                let mut mode = SolveMode::default();
                while let Some(arg) = args.next() {
                    match arg.as_str() {
                        "--mode" | "-m" => {
                            let value = args
                                .next()
                                .ok_or_else(|| anyhow!("--mode needs a value"))?;
                            mode = value.parse().map_err(|err: String| anyhow!(err))?;
                        }
                        _ if image.is_none() => image = Some(PathBuf::from(arg)),
                        other => bail!("unexpected argument '{other}'"),
                    }
                }
                let image = image.ok_or_else(|| anyhow!("solve needs an image path"))?;
                Ok(Command::Solve { image, mode })
            }
            "history" => match args.next().as_deref() {
                None => Ok(Command::History),
                Some("clear") => Ok(Command::HistoryClear),
                Some("show") => {
                    let raw = args
                        .next()
                        .ok_or_else(|| anyhow!("history show needs an index"))?;
                    let index = raw
                        .parse()
                        .with_context(|| format!("invalid history index '{raw}'"))?;
                    Ok(Command::HistoryShow(index))
                }
                Some(other) => bail!("unknown history command '{other}'"),
            },
            "health" => Ok(Command::Health),
            "help" | "--help" | "-h" => Ok(Command::Help),
            other => bail!("unknown command '{other}'"),
        }
    }
}

pub async fn execute(state: &AppState, command: Command) -> Result<()> {
    match command {
        Command::Solve { image, mode } => {
            let controller = &state.controller;
            controller.select_image_path(&image).await?;
            controller.set_mode(mode).await;

            let outcome = controller.solve().await?;
            println!("{}", outcome.predicted_text);
            println!(
                "confidence {}",
                confidence_label(outcome.confidence_percent)
            );
            if let Some(expression) = &outcome.expression {
                println!("expression {expression}");
            }
            for detail in outcome.char_details() {
                println!(
                    "  #{} {} {}",
                    detail.position + 1,
                    detail.predicted_char,
                    confidence_label(detail.confidence_percent)
                );
            }
            controller.dismiss().await;
        }
        Command::History => {
            let entries = state.history.entries();
            if entries.is_empty() {
                println!("No CAPTCHAs solved yet");
            }
            for (index, entry) in entries.iter().enumerate() {
                println!(
                    "{index:>2}  {:<12} {:<5} {}",
                    entry.result_text,
                    entry.mode,
                    confidence_label(entry.confidence_percent)
                );
            }
        }
        Command::HistoryShow(index) => {
            let entry = state
                .history
                .select_entry(index)
                .ok_or_else(|| anyhow!("no history entry at index {index}"))?;
            println!("{}", entry.result_text);
            println!("mode {}", entry.mode.model_label());
            println!("confidence {}", confidence_label(entry.confidence_percent));
        }
        Command::HistoryClear => state.history.clear(),
        Command::Health => {
            let health = state.controller.health().await?;
            println!("text model: {}", if health.text { "loaded" } else { "missing" });
            println!("math model: {}", if health.math { "loaded" } else { "missing" });
        }
        Command::Help => println!("{USAGE}"),
    }
    Ok(())
}
