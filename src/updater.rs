//! In-place rewriting of module refs.
//!
//! Only the `ref=<pinned>` part of a source literal changes, and only on the
//! line the literal was found on. Everything else in the file is left as it
//! was, formatting and comments included.

use crate::error::{Result, SamwiseError};
use crate::git::RepositoryInspector;
use crate::resolver::VersionResolver;
use crate::types::{FileMutationRecord, ModuleSourceReference};
use regex::{Captures, Regex};
use std::path::Path;

/// Pins module refs to the newest tag, one file at a time.
pub struct UpdateApplicator<'a, I> {
    resolver: &'a mut VersionResolver<I>,
}

impl<'a, I: RepositoryInspector> UpdateApplicator<'a, I> {
    pub fn new(resolver: &'a mut VersionResolver<I>) -> Self {
        Self { resolver }
    }

    /// Rewrite the references of `file` that have a newer tag.
    ///
    /// References without a repository URL or without a pinned ref are
    /// skipped, as are references whose repository could not be resolved.
    /// The file is written at most once, and only if something changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or written.
    pub async fn apply(&mut self, file: &Path, references: &[ModuleSourceReference]) -> Result<Vec<FileMutationRecord>> {
        let content = tokio::fs::read_to_string(file)
            .await
            .map_err(|e| SamwiseError::io(file, e, file!(), line!()))?;
        let mut lines: Vec<String> = content.split_inclusive('\n').map(str::to_string).collect();
        let mut records = Vec::new();

        for reference in references {
            if reference.is_inert() || reference.pinned_ref_str().is_empty() {
                tracing::trace!(module = %reference.name, "No pinned ref, not updating");
                continue;
            }

            let pinned = reference.pinned_ref_str();
            let latest = match self.resolver.resolve(&reference.repository_url, pinned).await {
                Ok(resolution) => match resolution.latest {
                    Some(latest) => latest,
                    None => continue,
                },
                Err(_) => continue,
            };

            let after = retarget(&reference.raw_expression, pinned, latest.as_str());
            if after == reference.raw_expression {
                continue;
            }

            let Some(line) = reference
                .line_number
                .checked_sub(1)
                .and_then(|i| lines.get_mut(i))
                .filter(|l| l.contains(&reference.raw_expression))
            else {
                tracing::warn!(
                    module = %reference.name,
                    file = %file.display(),
                    line = reference.line_number,
                    "Source literal not found on its line, not updating"
                );
                continue;
            };
            *line = line.replacen(&reference.raw_expression, &after, 1);

            tracing::info!(
                module = %reference.name,
                file = %file.display(),
                from = %pinned,
                to = %latest,
                "Module ref updated"
            );
            records.push(FileMutationRecord {
                file_path: file.to_path_buf(),
                line_number: reference.line_number,
                before_expression: reference.raw_expression.clone(),
                after_expression: after,
            });
        }

        if !records.is_empty() {
            tokio::fs::write(file, lines.concat())
                .await
                .map_err(|e| SamwiseError::io(file, e, file!(), line!()))?;
        }

        Ok(records)
    }
}

/// Replace the `?ref=<pinned>` or `&ref=<pinned>` parameter with `<latest>`
/// inside a source literal.
fn retarget(expression: &str, pinned: &str, latest: &str) -> String {
    let pattern = format!(r#"([?&]ref=){}(&|//|"|$)"#, regex::escape(pinned));
    let Ok(parameter) = Regex::new(&pattern) else {
        return expression.to_string();
    };
    parameter
        .replacen(expression, 1, |caps: &Captures<'_>| format!("{}{latest}{}", &caps[1], &caps[2]))
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{InspectedRepository, MockRepositoryInspector};
    use crate::parser::HclParser;
    use pretty_assertions::assert_eq;
    use std::fs;

    const MAIN_TF: &str = r#"# network
module "vpc" {
  source = "git::https://github.com/org/terraform-vpc.git//modules/vpc?ref=v1.0.1"
  cidr   = "10.0.0.0/16"
}

module "dns" {
  source = "git@github.com:org/terraform-dns.git?ref=v2.0.0"
}

module "unpinned" {
  source = "git::https://github.com/org/terraform-vpc.git"
}

module "registry" {
  source  = "terraform-aws-modules/vpc/aws"
  version = "5.0.0"
}
"#;

    fn inspector() -> MockRepositoryInspector {
        let mut inspector = MockRepositoryInspector::new();
        inspector
            .expect_inspect()
            .withf(|url| url.ends_with("terraform-vpc.git"))
            .times(1)
            .returning(|url| Ok(InspectedRepository::with_tags(url, ["v1.0.0", "v1.0.2", "v1.0.3-beta"])));
        inspector
            .expect_inspect()
            .withf(|url| url.ends_with("terraform-dns.git"))
            .times(1)
            .returning(|url| Ok(InspectedRepository::with_tags(url, ["v1.9.0", "v2.0.0"])));
        inspector
    }

    #[test]
    fn test_retarget_only_touches_ref() {
        assert_eq!(
            retarget("\"git::https://h/r.git//sub?ref=v1.0.1\"", "v1.0.1", "v1.2.0"),
            "\"git::https://h/r.git//sub?ref=v1.2.0\""
        );
        assert_eq!(retarget("\"git::https://h/r.git\"", "v1", "v2"), "\"git::https://h/r.git\"");
    }

    #[test]
    fn test_retarget_respects_parameter_boundaries() {
        assert_eq!(
            retarget("\"git::https://h/r.git?xref=v1&ref=v1\"", "v1", "v2"),
            "\"git::https://h/r.git?xref=v1&ref=v2\""
        );
        assert_eq!(
            retarget("\"git::https://h/r.git?ref=v1.0.1&depth=1\"", "v1.0", "v2.0"),
            "\"git::https://h/r.git?ref=v1.0.1&depth=1\""
        );
        assert_eq!(
            retarget("\"https://h/r.git?ref=v1.0.0//modules/db\"", "v1.0.0", "v1.1.0"),
            "\"https://h/r.git?ref=v1.1.0//modules/db\""
        );
    }

    #[tokio::test]
    async fn test_apply_rewrites_only_outdated_refs() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("main.tf");
        fs::write(&file, MAIN_TF).unwrap();

        let references = HclParser::new().parse_file(&file).await.unwrap();
        let mut resolver = VersionResolver::new(inspector());
        let records = UpdateApplicator::new(&mut resolver).apply(&file, &references).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].line_number, 3);
        assert_eq!(
            records[0].after_expression,
            "\"git::https://github.com/org/terraform-vpc.git//modules/vpc?ref=v1.0.3-beta\""
        );

        let expected = MAIN_TF.replace("?ref=v1.0.1", "?ref=v1.0.3-beta");
        assert_eq!(fs::read_to_string(&file).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_unchanged_file_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("main.tf");
        let content = "module \"dns\" {\n  source = \"git@github.com:org/terraform-dns.git?ref=v2.0.0\"\n}\n";
        fs::write(&file, content).unwrap();
        let mut permissions = fs::metadata(&file).unwrap().permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&file, permissions).unwrap();

        let references = HclParser::new().parse_file(&file).await.unwrap();
        let mut inspector = MockRepositoryInspector::new();
        inspector
            .expect_inspect()
            .times(1)
            .returning(|url| Ok(InspectedRepository::with_tags(url, ["v2.0.0"])));
        let mut resolver = VersionResolver::new(inspector);

        let records = UpdateApplicator::new(&mut resolver).apply(&file, &references).await.unwrap();
        assert!(records.is_empty());
        assert_eq!(fs::read_to_string(&file).unwrap(), content);
    }

    #[tokio::test]
    async fn test_unreachable_repository_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("main.tf");
        let content = "module \"vpc\" {\n  source = \"github.com/org/vpc?ref=v1.0.0\"\n}\n";
        fs::write(&file, content).unwrap();

        let references = HclParser::new().parse_file(&file).await.unwrap();
        let mut inspector = MockRepositoryInspector::new();
        inspector.expect_inspect().times(1).returning(|url| {
            Err(crate::err!(GitAuth {
                url: url.to_string(),
                message: "denied".to_string(),
            }))
        });
        let mut resolver = VersionResolver::new(inspector);

        let records = UpdateApplicator::new(&mut resolver).apply(&file, &references).await.unwrap();
        assert!(records.is_empty());
        assert_eq!(fs::read_to_string(&file).unwrap(), content);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let mut resolver = VersionResolver::new(MockRepositoryInspector::new());
        let err = UpdateApplicator::new(&mut resolver)
            .apply(Path::new("/nonexistent/main.tf"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, SamwiseError::Io { .. }));
    }
}
