use super::{print_document, read_deltas, CommandError, DocumentFile};
use crate::config::Config;
use anyhow::Result;
use arbor_editor::{EditSession, EditorResult, SessionConfig};
use arbor_model::{update_base_versions, Delta, Document};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Args)]
pub struct ConvergeArgs {
    /// Document file both replicas start from
    pub document: PathBuf,

    /// Deltas made concurrently by the first replica
    pub a: PathBuf,

    /// Deltas made concurrently by the second replica
    pub b: PathBuf,

    /// Actor id of the first replica (overrides config)
    #[arg(long)]
    pub actor_a: Option<String>,

    /// Actor id of the second replica (overrides config)
    #[arg(long)]
    pub actor_b: Option<String>,
}

pub fn converge(args: ConvergeArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let file = DocumentFile::read(&args.document)?;

    let mut config_a = config.session.clone();
    let mut config_b = config.peer_session();
    if let Some(actor) = args.actor_a {
        config_a.actor_id = actor;
    }
    if let Some(actor) = args.actor_b {
        config_b.actor_id = actor;
    }

    println!(
        "{}",
        format!(
            "🔀 Reconciling '{}' and '{}'...",
            config_a.actor_id, config_b.actor_id
        )
        .bright_blue()
        .bold()
    );

    let document_a = file.to_document()?;
    let document_b = file.to_document()?;
    let deltas_a = read_deltas(&args.a, &document_a)?;
    let deltas_b = read_deltas(&args.b, &document_b)?;

    let (a, b) = simulate(
        (config_a, document_a, deltas_a),
        (config_b, document_b, deltas_b),
    )?;

    print_document(a.actor_id(), a.document())?;
    print_document(b.actor_id(), b.document())?;

    check_converged(a.document(), b.document())?;
    println!();
    println!("✨ {} Replicas converged", "Done".green().bold());

    Ok(())
}

type Replica = (SessionConfig, Document, Vec<Delta>);

/// Applies each side's deltas as one local edit, then exchanges the change sets.
pub fn simulate(a: Replica, b: Replica) -> EditorResult<(EditSession, EditSession)> {
    let mut session_a = local_edit(a)?;
    let mut session_b = local_edit(b)?;

    let from_a = session_a.take_outgoing();
    let from_b = session_b.take_outgoing();

    if let Some(change_set) = from_b {
        session_a.receive(change_set)?;
    }
    if let Some(change_set) = from_a {
        session_b.receive(change_set)?;
    }

    info!(
        version_a = session_a.document().version(),
        version_b = session_b.document().version(),
        "exchanged change sets"
    );

    Ok((session_a, session_b))
}

fn local_edit((config, document, mut deltas): Replica) -> EditorResult<EditSession> {
    let mut session = EditSession::with_document(config, document);
    update_base_versions(&mut deltas, session.document().version());

    session.edit(Some("file"), |batch, doc| {
        for delta in deltas {
            batch.add_delta(doc, delta)?;
        }
        Ok(())
    })?;

    Ok(session)
}

fn check_converged(a: &Document, b: &Document) -> Result<()> {
    for root in a.root_names() {
        let tree_a = a.stringify_root(root)?;
        let tree_b = b.stringify_root(root)?;
        if tree_a != tree_b {
            return Err(CommandError::Diverged {
                root: root.to_string(),
                a: tree_a,
                b: tree_b,
            }
            .into());
        }
    }
    Ok(())
}
