//! Command-line interface for storyreel.
//!
//! Exposes the workflow surface: submit text, confirm a character candidate,
//! trigger the second phase, inspect status or the full document, and roll a
//! project back to an earlier version.

use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::domain::CharacterField;
use crate::pipeline::Pipeline;
use crate::store::ContextStore;

/// storyreel - staged text-to-anime generation pipeline
#[derive(Parser, Debug)]
#[command(name = "storyreel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run phase 1: parse text and generate character candidates
    Run {
        /// Project id (generated if not provided)
        #[arg(long)]
        project_id: Option<String>,

        /// Input file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Read input from stdin
        #[arg(long)]
        stdin: bool,
    },

    /// Confirm one candidate image for a character
    Confirm {
        /// Project id
        project_id: String,

        /// Character name
        character: String,

        /// Zero-based index into the character's candidate list
        index: usize,
    },

    /// Run phase 2: fine-tunes, keyframes, videos, final composition
    Continue {
        /// Project id
        project_id: String,
    },

    /// Show a project's durable status
    Status {
        /// Project id
        project_id: String,
    },

    /// Dump a project's full document as JSON
    Context {
        /// Project id
        project_id: String,
    },

    /// Roll a project back to an earlier version
    Rollback {
        /// Project id
        project_id: String,

        /// Snapshot version to restore
        version: u64,
    },
}

impl Cli {
    /// Execute the parsed command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run {
                project_id,
                input,
                stdin,
            } => run_phase_one(project_id, input, stdin).await,
            Commands::Confirm {
                project_id,
                character,
                index,
            } => confirm_character(&project_id, &character, index).await,
            Commands::Continue { project_id } => run_phase_two(&project_id).await,
            Commands::Status { project_id } => show_status(&project_id).await,
            Commands::Context { project_id } => show_context(&project_id).await,
            Commands::Rollback {
                project_id,
                version,
            } => rollback(&project_id, version).await,
        }
    }
}

/// Read pipeline input from file or stdin
fn read_input(input: Option<PathBuf>, use_stdin: bool) -> Result<String> {
    if let Some(path) = input {
        return std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read input file: {}", path.display()));
    }

    if !use_stdin && atty_is_terminal() {
        bail!("No input provided. Pass --input <file> or pipe text via stdin.");
    }

    let mut text = String::new();
    io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read from stdin")?;
    Ok(text)
}

fn atty_is_terminal() -> bool {
    use std::io::IsTerminal;
    io::stdin().is_terminal()
}

async fn run_phase_one(
    project_id: Option<String>,
    input: Option<PathBuf>,
    stdin: bool,
) -> Result<()> {
    let text = read_input(input, stdin)?;
    if text.trim().is_empty() {
        bail!("Input text is empty");
    }

    let pipeline = Pipeline::from_config(project_id).await?;
    let gate = pipeline.run(&text).await?;

    println!("Project: {}", gate.project_id);
    println!("Status:  {}", gate.status);
    println!("{}", gate.message);
    println!();
    println!(
        "Next: storyreel confirm {} <character> <index>, then storyreel continue {}",
        gate.project_id, gate.project_id
    );
    Ok(())
}

async fn confirm_character(project_id: &str, character: &str, index: usize) -> Result<()> {
    let store = ContextStore::open(project_id).await?;

    let record = store
        .get_character(character)
        .await?
        .with_context(|| format!("Character '{}' not found in project {}", character, project_id))?;

    let candidates = record
        .candidates
        .with_context(|| format!("Character '{}' has no candidates yet", character))?;

    let selected = candidates
        .get(index)
        .with_context(|| {
            format!(
                "Candidate index {} out of range (character '{}' has {} candidates)",
                index,
                character,
                candidates.len()
            )
        })?
        .clone();

    store
        .update_character(character, CharacterField::SelectedImage(selected.clone()))
        .await?;

    println!("Confirmed '{}' -> {}", character, selected);
    Ok(())
}

async fn run_phase_two(project_id: &str) -> Result<()> {
    let pipeline = Pipeline::from_config(Some(project_id.to_string())).await?;
    let final_video = pipeline.continue_after_confirmation().await?;

    println!("Project {} completed", project_id);
    println!("Final video: {}", final_video);
    Ok(())
}

async fn show_status(project_id: &str) -> Result<()> {
    let store = ContextStore::open(project_id).await?;
    let context = store.load().await?;

    println!("Project:  {}", context.meta.project_id);
    println!("Status:   {}", context.status);
    println!("Version:  {}", context.meta.version);
    println!("Created:  {}", context.meta.created_at);
    if let Some(updated) = context.meta.updated_at {
        println!("Updated:  {}", updated);
    }
    println!("Characters: {}", context.characters.len());
    println!("Scenes:     {}", context.scenes.len());
    if let Some(ref error) = context.error {
        println!("Error:    {}", error);
    }
    if let Some(ref final_video) = context.final_video {
        println!("Final:    {}", final_video);
    }
    Ok(())
}

async fn show_context(project_id: &str) -> Result<()> {
    let store = ContextStore::open(project_id).await?;
    let context = store.load().await?;
    println!("{}", serde_json::to_string_pretty(&context)?);
    Ok(())
}

async fn rollback(project_id: &str, version: u64) -> Result<()> {
    let store = ContextStore::open(project_id).await?;
    let context = store.rollback(version).await?;

    println!(
        "Project {} rolled back; live document is now version {} ({})",
        project_id, context.meta.version, context.status
    );
    Ok(())
}
