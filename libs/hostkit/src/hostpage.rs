//! Host page materialization.
//!
//! Every module under test needs a browser-loadable HTML entry page that
//! pulls in the compiled module's bootstrap script. This module guarantees
//! the page exists: it is generated once from a template (or a built-in
//! default) and never overwritten afterwards. Existence alone is the
//! guard, not content or timestamps.

use std::path::PathBuf;

use crate::descriptor::{DescriptorError, ModuleDescriptor};

/// Placeholder replaced by the effective module name everywhere it occurs
/// in a user-supplied template.
pub const MODULE_NAME_TOKEN: &str = "{{MODULE_NAME}}";

/// Default `<title>` suffix when none is configured.
pub const DEFAULT_TITLE_SUFFIX: &str = "Test";

#[derive(Debug, thiserror::Error)]
pub enum HostPageError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error("failed to read host page template {path}")]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write host page {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Inputs for one materialization pass.
///
/// A plain read-only struct: the caller resolves its own configuration
/// (overlays, fallbacks) before handing it over, so the pass itself has no
/// hidden coupling to live settings.
#[derive(Debug, Clone)]
pub struct HostPagePlan {
    /// Dotted qualified names, processed in order, duplicates allowed.
    pub modules: Vec<String>,
    /// Descriptor search roots, probed in order.
    pub search_roots: Vec<PathBuf>,
    /// Directory host pages are written into.
    pub out_dir: PathBuf,
    /// Optional template file; when set, `{{MODULE_NAME}}` substitution is
    /// applied instead of the built-in document.
    pub template: Option<PathBuf>,
    /// Suffix appended to the module name in the default document's title.
    pub title_suffix: String,
}

impl HostPagePlan {
    pub fn new(
        modules: Vec<String>,
        search_roots: Vec<PathBuf>,
        out_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            modules,
            search_roots,
            out_dir: out_dir.into(),
            template: None,
            title_suffix: DEFAULT_TITLE_SUFFIX.to_string(),
        }
    }
}

/// Outcome for one module in a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPage {
    /// The qualified name the page was requested for.
    pub module: String,
    /// Where the page lives.
    pub path: PathBuf,
    /// True when this pass wrote the file, false when it already existed.
    pub created: bool,
}

/// Guarantee a host page for every module in the plan.
///
/// Modules are processed strictly in order; the first failure aborts the
/// rest of the batch. Pre-existing pages are left untouched and reported
/// with `created: false`.
pub fn ensure_host_pages(plan: &HostPagePlan) -> Result<Vec<HostPage>, HostPageError> {
    let mut pages = Vec::with_capacity(plan.modules.len());
    for module in &plan.modules {
        let descriptor = ModuleDescriptor::load(module, &plan.search_roots)?;
        pages.push(ensure_page(plan, &descriptor)?);
    }
    Ok(pages)
}

fn ensure_page(
    plan: &HostPagePlan,
    descriptor: &ModuleDescriptor,
) -> Result<HostPage, HostPageError> {
    let name = descriptor.effective_name();
    let path = plan.out_dir.join(format!("{name}.html"));

    // Existence alone is the guard: a pre-existing page is never re-read,
    // re-rendered, or overwritten.
    if path.exists() {
        tracing::debug!(module = descriptor.qualified_name(), path = %path.display(), "host page already exists");
        return Ok(HostPage {
            module: descriptor.qualified_name().to_string(),
            path,
            created: false,
        });
    }

    let content = match &plan.template {
        Some(template) => std::fs::read_to_string(template)
            .map_err(|source| HostPageError::TemplateRead {
                path: template.clone(),
                source,
            })?
            .replace(MODULE_NAME_TOKEN, name),
        None => default_page(name, &plan.title_suffix),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| HostPageError::Write {
            path: path.clone(),
            source,
        })?;
    }
    std::fs::write(&path, content).map_err(|source| HostPageError::Write {
        path: path.clone(),
        source,
    })?;

    tracing::info!(module = descriptor.qualified_name(), path = %path.display(), "host page created");
    Ok(HostPage {
        module: descriptor.qualified_name().to_string(),
        path,
        created: true,
    })
}

/// The built-in host document: a title and the module bootstrap script.
fn default_page(name: &str, title_suffix: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>{name} {title_suffix}</title>
    <script type="text/javascript" src="{name}/{name}.nocache.js"></script>
</head>
<body></body>
</html>
"#
    )
}
