//! HCL file parser implementation.
//!
//! Module blocks are read with the `hcl-rs` crate. The parsed body carries no
//! positions, so the `source` literal of each block is then located in the raw
//! text with a forward-only cursor; that literal and its line are what the
//! update applicator later rewrites.

use crate::error::{Result, SamwiseError};
use crate::parser::{parse_module_source, Parser, TERRAFORM_EXTENSION};
use crate::types::ModuleSourceReference;

use hcl::{Block, Body, Expression};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static SOURCE_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    // source = "..." at the start of a line, capturing the quoted literal
    Regex::new(r#"(?m)^[ \t]*source[ \t]*=[ \t]*("(?:[^"\\\n]|\\.)*")"#).expect("Invalid regex")
});

/// HCL parser for Terraform files.
#[derive(Debug, Clone, Copy, Default)]
pub struct HclParser;

impl HclParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse the `.tf` files directly inside `dir`. Subdirectories are the
    /// walker's business.
    ///
    /// A file that cannot be read, is not UTF-8 or is not valid HCL is logged
    /// and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory doesn't exist or can't be listed.
    pub async fn parse_directory(&self, dir: &Path) -> Result<Vec<ModuleSourceReference>> {
        if !dir.is_dir() {
            return Err(crate::err!(DirectoryNotFound { path: dir.to_path_buf() }));
        }

        let mut files: Vec<PathBuf> = Vec::new();
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| SamwiseError::io(dir, e, file!(), line!()))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SamwiseError::io(dir, e, file!(), line!()))?
        {
            let path = entry.path();
            if path.is_file() && Self::is_terraform_file(&path) {
                files.push(path);
            }
        }
        files.sort();

        let mut references = Vec::new();
        for file_path in &files {
            tracing::debug!(file = %file_path.display(), "Parsing file");
            match self.parse_file(file_path).await {
                Ok(found) => references.extend(found),
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(file = %file_path.display(), "Skipping unparsable file: {}", e);
                }
                Err(e) => {
                    tracing::warn!(file = %file_path.display(), "Skipping unreadable file: {}", e);
                }
            }
        }

        tracing::debug!(
            dir = %dir.display(),
            files = files.len(),
            modules = references.len(),
            "Directory parsed"
        );

        Ok(references)
    }

    /// Parse a single Terraform file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn parse_file(&self, path: &Path) -> Result<Vec<ModuleSourceReference>> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SamwiseError::io(path, e, file!(), line!()))?;

        self.parse_content(&content, path)
    }

    fn is_terraform_file(path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some(TERRAFORM_EXTENSION)
    }
}

impl Parser for HclParser {
    fn parse_content(&self, content: &str, file_path: &Path) -> Result<Vec<ModuleSourceReference>> {
        let body: Body = hcl::from_str(content).map_err(|e| crate::err!(HclParse {
            file: file_path.to_path_buf(),
            message: e.to_string(),
        }))?;

        let mut cursor = 0;
        let mut references = Vec::new();

        for block in body.blocks().filter(|b| b.identifier.as_str() == "module") {
            let name = block
                .labels
                .first()
                .map(|l| l.as_str().to_string())
                .unwrap_or_default();

            let Some(source) = literal_source(block) else {
                tracing::debug!(
                    module = %name,
                    file = %file_path.display(),
                    "Module has no literal source, skipping"
                );
                continue;
            };

            let (raw_expression, line_number) = match locate_source(content, &name, &mut cursor) {
                Some(found) => found,
                None => {
                    tracing::warn!(
                        module = %name,
                        file = %file_path.display(),
                        "Could not locate source literal in file text"
                    );
                    (format!("\"{source}\""), 0)
                }
            };

            let parts = parse_module_source(&source);
            references.push(ModuleSourceReference {
                name,
                raw_expression,
                repository_url: parts.repository_url,
                pinned_ref: parts.git_ref,
                sub_module_path: parts.sub_module_path,
                source_kind: parts.kind,
                origin_file: file_path.to_path_buf(),
                line_number,
            });
        }

        Ok(references)
    }
}

fn literal_source(block: &Block) -> Option<String> {
    block
        .body
        .attributes()
        .find(|attr| attr.key.as_str() == "source")
        .and_then(|attr| match &attr.expr {
            Expression::String(s) => Some(s.clone()),
            _ => None,
        })
}

/// Finds `module "<name>"` or a bare `module <name>` at or after `cursor`,
/// then the first `source = "..."` after it. Returns the quoted literal and its 1-based line, and moves the
/// cursor past it.
fn locate_source(content: &str, name: &str, cursor: &mut usize) -> Option<(String, usize)> {
    let name = regex::escape(name);
    let header = Regex::new(&format!(r#"\bmodule[ \t]+(?:"{name}"|{name}\b)[ \t]*\{{"#)).ok()?;
    let rest = content.get(*cursor..)?;
    let header_end = *cursor + header.find(rest)?.end();

    let literal = SOURCE_ATTRIBUTE.captures(&content[header_end..])?.get(1)?;
    let start = header_end + literal.start();
    let line_number = content[..start].matches('\n').count() + 1;

    *cursor = header_end + literal.end();
    Some((literal.as_str().to_string(), line_number))
}
