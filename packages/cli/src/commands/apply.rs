use super::{print_document, read_deltas, DocumentFile};
use anyhow::Result;
use arbor_model::{update_base_versions, Delta, Document, ModelResult};
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Document file ({ "roots": { name: markup } })
    pub document: PathBuf,

    /// JSON array of serialized deltas
    pub deltas: PathBuf,

    /// Write the resulting document file here instead of printing it
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

pub fn apply(args: ApplyArgs, _cwd: &str) -> Result<()> {
    let mut document = DocumentFile::read(&args.document)?.to_document()?;
    let deltas = read_deltas(&args.deltas, &document)?;

    println!(
        "{}",
        format!("🌳 Applying {} deltas...", deltas.len()).bright_blue().bold()
    );

    let operations = apply_deltas(&mut document, deltas)?;
    println!("  {} {} operations applied", "✓".green(), operations);

    match args.out {
        Some(out) => {
            let file = DocumentFile::from_document(&document)?;
            fs::write(&out, serde_json::to_string_pretty(&file)?)?;
            println!("  {} Wrote {}", "✓".green(), out.display());
        }
        None => print_document("Result", &document)?,
    }

    Ok(())
}

/// Applies `deltas` in order on top of the current version. Base versions in
/// the file are renumbered, since loading a document already bumps its version.
pub fn apply_deltas(document: &mut Document, mut deltas: Vec<Delta>) -> ModelResult<usize> {
    update_base_versions(&mut deltas, document.version());
    debug!(version = document.version(), count = deltas.len(), "applying deltas");

    document.enqueue_changes(|doc| -> ModelResult<usize> {
        let mut operations = 0;
        for delta in deltas {
            operations += doc.apply_delta(delta)?.len();
        }
        Ok(operations)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_model::{markup, Batch, Position};

    #[test]
    fn test_apply_renumbers_deltas() {
        let mut source = Document::new();
        source
            .load_root("main", markup::parse("<paragraph>foo</paragraph>").unwrap())
            .unwrap();

        let mut batch = Batch::new();
        batch
            .split(&mut source, &Position::new("main", vec![0, 1]))
            .unwrap();

        // Same content, but loaded through two roots so the versions differ.
        let mut target = Document::new();
        target
            .load_root("title", markup::parse("Title").unwrap())
            .unwrap();
        target
            .load_root("main", markup::parse("<paragraph>foo</paragraph>").unwrap())
            .unwrap();

        let operations = apply_deltas(&mut target, batch.deltas).unwrap();
        assert_eq!(operations, 2);
        assert_eq!(
            target.stringify_root("main").unwrap(),
            "<paragraph>f</paragraph><paragraph>oo</paragraph>"
        );
        assert_eq!(target.version(), 4);
    }
}
