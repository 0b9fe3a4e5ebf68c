//! Parsing of Terraform files into module source references.
//!
//! Two layers:
//! - [`HclParser`] reads `.tf` files with `hcl-rs` and finds `module` blocks
//!   whose `source` is a string literal, recording where that literal sits in
//!   the file.
//! - [`parse_module_source`] splits the literal into repository URL, `ref=`
//!   pin and sub-module path.
//!
//! # Example
//!
//! ```rust,ignore
//! use samwise::parser::HclParser;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let parser = HclParser::new();
//!     let references = parser.parse_directory("./terraform".as_ref()).await?;
//!     println!("Found {} module sources", references.len());
//!     Ok(())
//! }
//! ```

mod hcl;
mod source;

pub use hcl::HclParser;
pub use source::{parse_module_source, ModuleSourceParts};

use crate::types::ModuleSourceReference;

/// File extension of Terraform configuration files.
pub const TERRAFORM_EXTENSION: &str = "tf";

/// Trait for extracting module references from file content.
pub trait Parser: Send + Sync {
    /// Parse a single file's contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the HCL content is invalid.
    fn parse_content(
        &self,
        content: &str,
        file_path: &std::path::Path,
    ) -> crate::Result<Vec<ModuleSourceReference>>;
}
