//! Module descriptor resolution.
//!
//! A module's dotted qualified name doubles as a relative file path: the
//! descriptor for `com.example.App` lives at `com/example/App.config.xml`
//! under one of the configured search roots. The descriptor's root element
//! may carry a `rename-to` attribute that replaces the qualified name as
//! the base name of generated artifacts.

use std::path::{Path, PathBuf};

/// File suffix appended to the path-converted qualified name.
pub const DESCRIPTOR_SUFFIX: &str = ".config.xml";

/// Root-element attribute holding the output rename directive.
pub const RENAME_ATTRIBUTE: &str = "rename-to";

#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("module descriptor not found in any search root: {relative_path}")]
    NotFound { relative_path: String },
    #[error("failed to read module descriptor {path}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed module descriptor {path}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },
}

/// One compilable unit under test, as described by its XML descriptor.
///
/// Read-only: discovered fresh on every generation pass, never cached.
#[derive(Debug, Clone)]
pub struct ModuleDescriptor {
    qualified_name: String,
    rename_to: Option<String>,
    path: PathBuf,
}

impl ModuleDescriptor {
    /// Locate and parse the descriptor for `qualified_name`, searching
    /// `search_roots` in order and taking the first existing file.
    ///
    /// The parser rejects DTDs, so external entities are never resolved.
    pub fn load(
        qualified_name: &str,
        search_roots: &[PathBuf],
    ) -> Result<Self, DescriptorError> {
        let path = locate_descriptor(qualified_name, search_roots)?;
        let text = std::fs::read_to_string(&path).map_err(|source| {
            DescriptorError::Unreadable {
                path: path.clone(),
                source,
            }
        })?;
        let rename_to = parse_rename_attribute(&text).map_err(|source| {
            DescriptorError::Malformed {
                path: path.clone(),
                source,
            }
        })?;
        Ok(Self {
            qualified_name: qualified_name.to_string(),
            rename_to,
            path,
        })
    }

    /// The dotted module name the descriptor was looked up under.
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// The `rename-to` directive, if present and non-blank.
    pub fn rename_to(&self) -> Option<&str> {
        self.rename_to.as_deref()
    }

    /// Where the descriptor file was found.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name for generated artifacts: the rename directive when one
    /// exists, the qualified name otherwise.
    pub fn effective_name(&self) -> &str {
        self.rename_to().unwrap_or(&self.qualified_name)
    }
}

/// Convert a dotted qualified name into the descriptor's relative path,
/// e.g. `com.example.App` → `com/example/App.config.xml`.
pub fn descriptor_relative_path(qualified_name: &str) -> PathBuf {
    let mut rel: PathBuf = qualified_name.split('.').collect();
    let file = match rel.file_name() {
        Some(name) => format!("{}{}", name.to_string_lossy(), DESCRIPTOR_SUFFIX),
        None => DESCRIPTOR_SUFFIX.to_string(),
    };
    rel.set_file_name(file);
    rel
}

/// First search root containing the descriptor wins; roots are probed in
/// caller-supplied order.
fn locate_descriptor(
    qualified_name: &str,
    search_roots: &[PathBuf],
) -> Result<PathBuf, DescriptorError> {
    let relative = descriptor_relative_path(qualified_name);
    search_roots
        .iter()
        .map(|root| root.join(&relative))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| DescriptorError::NotFound {
            relative_path: relative.to_string_lossy().into_owned(),
        })
}

/// Read the root element's rename attribute. Absent or all-whitespace
/// values count as "no override".
fn parse_rename_attribute(text: &str) -> Result<Option<String>, roxmltree::Error> {
    let doc = roxmltree::Document::parse(text)?;
    let rename = doc
        .root_element()
        .attribute(RENAME_ATTRIBUTE)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    Ok(rename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_descriptor(root: &Path, qualified_name: &str, content: &str) -> PathBuf {
        let path = root.join(descriptor_relative_path(qualified_name));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn relative_path_replaces_dots_and_appends_suffix() {
        let rel = descriptor_relative_path("com.example.App");
        assert_eq!(
            rel,
            Path::new("com").join("example").join("App.config.xml")
        );
    }

    #[test]
    fn relative_path_for_undotted_name() {
        assert_eq!(descriptor_relative_path("App"), Path::new("App.config.xml"));
    }

    #[test]
    fn load_reads_rename_attribute() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(dir.path(), "com.example.App", r#"<module rename-to="app"/>"#);

        let descriptor =
            ModuleDescriptor::load("com.example.App", &[dir.path().to_path_buf()]).unwrap();
        assert_eq!(descriptor.rename_to(), Some("app"));
        assert_eq!(descriptor.effective_name(), "app");
    }

    #[test]
    fn absent_rename_falls_back_to_qualified_name() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(dir.path(), "com.example.App", "<module/>");

        let descriptor =
            ModuleDescriptor::load("com.example.App", &[dir.path().to_path_buf()]).unwrap();
        assert_eq!(descriptor.rename_to(), None);
        assert_eq!(descriptor.effective_name(), "com.example.App");
    }

    #[test]
    fn blank_rename_counts_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(dir.path(), "com.example.App", r#"<module rename-to="   "/>"#);

        let descriptor =
            ModuleDescriptor::load("com.example.App", &[dir.path().to_path_buf()]).unwrap();
        assert_eq!(descriptor.rename_to(), None);
        assert_eq!(descriptor.effective_name(), "com.example.App");
    }

    #[test]
    fn first_matching_search_root_wins() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        write_descriptor(first.path(), "a.B", r#"<module rename-to="from-first"/>"#);
        write_descriptor(second.path(), "a.B", r#"<module rename-to="from-second"/>"#);

        let roots = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let descriptor = ModuleDescriptor::load("a.B", &roots).unwrap();
        assert_eq!(descriptor.rename_to(), Some("from-first"));
    }

    #[test]
    fn missing_descriptor_reports_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModuleDescriptor::load("com.example.Missing", &[dir.path().to_path_buf()])
            .unwrap_err();

        match &err {
            DescriptorError::NotFound { relative_path } => {
                assert!(relative_path.contains("Missing.config.xml"));
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert!(err.to_string().contains("Missing.config.xml"));
    }

    #[test]
    fn malformed_xml_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(dir.path(), "a.Bad", "this is not xml");

        let err = ModuleDescriptor::load("a.Bad", &[dir.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, DescriptorError::Malformed { .. }));
    }

    #[test]
    fn doctype_declarations_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(
            dir.path(),
            "a.Evil",
            r#"<!DOCTYPE module [<!ENTITY xxe SYSTEM "file:///etc/passwd">]><module rename-to="&xxe;"/>"#,
        );

        let err = ModuleDescriptor::load("a.Evil", &[dir.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, DescriptorError::Malformed { .. }));
    }
}
