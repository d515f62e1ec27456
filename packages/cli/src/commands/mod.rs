pub mod apply;
pub mod converge;
pub mod init;

pub use apply::{apply, ApplyArgs};
pub use converge::{converge, ConvergeArgs};
pub use init::{init, InitArgs};

use anyhow::{Context, Result};
use arbor_model::{markup, Delta, Document};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("{0} must contain a JSON array of deltas")]
    NotADeltaList(String),

    #[error("replicas diverged on root '{root}':\n  a: {a}\n  b: {b}")]
    Diverged { root: String, a: String, b: String },
}

/// Document file format: root names mapped to model markup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentFile {
    pub roots: BTreeMap<String, String>,
}

impl DocumentFile {
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn to_document(&self) -> Result<Document> {
        let mut document = Document::new();
        for (name, source) in &self.roots {
            document
                .load_root(name, markup::parse(source)?)
                .with_context(|| format!("cannot load root '{name}'"))?;
        }
        Ok(document)
    }

    pub fn from_document(document: &Document) -> Result<Self> {
        let mut roots = BTreeMap::new();
        for name in document.root_names() {
            roots.insert(name.to_string(), document.stringify_root(name)?);
        }
        Ok(Self { roots })
    }
}

/// Reads a JSON array of deltas, checking their roots against `document`.
pub fn read_deltas(path: &Path, document: &Document) -> Result<Vec<Delta>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;

    let values = match serde_json::from_str::<Value>(&content)? {
        Value::Array(values) => values,
        _ => return Err(CommandError::NotADeltaList(path.display().to_string()).into()),
    };

    values
        .into_iter()
        .map(|value| Delta::from_json(value, document).map_err(Into::into))
        .collect()
}

pub fn print_document(title: &str, document: &Document) -> Result<()> {
    println!("{} (version {})", title.bright_white().bold(), document.version());
    for name in document.root_names() {
        println!("  {} {}", format!("{name}:").cyan(), document.stringify_root(name)?);
    }
    Ok(())
}
