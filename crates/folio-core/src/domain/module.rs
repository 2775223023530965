//! Module descriptors.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Whether a module has children of its own.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    #[default]
    Leaf,
    Container,
}

/// One renderable unit of the notebook.
///
/// Built once from the registry at run start and never mutated afterwards.
/// `id` is unique among its siblings; submodules keep declaration order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleDescriptor {
    pub id: String,
    pub name: String,
    pub active: bool,
    pub kind: ModuleKind,
    /// Module folder, relative to the notebook root.
    pub path: PathBuf,
    /// Entry file inside `path`; falls back to the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    /// Launcher override; an empty string executes the entry directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,
    /// `*` wildcard restricting which output PDFs are collected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_pattern: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Asset URLs to fetch before modules run.
    #[serde(default)]
    pub assets: Vec<String>,
    #[serde(default)]
    pub submodules: Vec<ModuleDescriptor>,
}

impl ModuleDescriptor {
    /// An active leaf module.
    pub fn leaf(id: impl Into<String>, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            active: true,
            kind: ModuleKind::Leaf,
            path: path.into(),
            entry: None,
            interpreter: None,
            output_pattern: None,
            description: String::new(),
            assets: Vec::new(),
            submodules: Vec::new(),
        }
    }

    /// Mark this module inactive.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Append a child, turning this module into a container.
    pub fn with_submodule(mut self, child: ModuleDescriptor) -> Self {
        self.kind = ModuleKind::Container;
        self.submodules.push(child);
        self
    }

    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = Some(entry.into());
        self
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    pub fn with_output_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.output_pattern = Some(pattern.into());
        self
    }

    pub fn with_asset(mut self, url: impl Into<String>) -> Self {
        self.assets.push(url.into());
        self
    }

    pub fn is_container(&self) -> bool {
        self.kind == ModuleKind::Container
    }

    /// Entry file name, using `default_entry` when none is declared.
    pub fn entry_or<'a>(&'a self, default_entry: &'a str) -> &'a str {
        self.entry.as_deref().unwrap_or(default_entry)
    }

    /// Module folder resolved against the notebook root.
    pub fn dir(&self, root: &Path) -> PathBuf {
        root.join(&self.path)
    }

    /// Depth-first walk over this module and all descendants, in declared order.
    pub fn walk(&self) -> Vec<&ModuleDescriptor> {
        let mut out = vec![self];
        for child in &self.submodules {
            out.extend(child.walk());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_submodule_makes_container() {
        let module = ModuleDescriptor::leaf("01.00", "Journal", "01.00_Journal")
            .with_submodule(ModuleDescriptor::leaf("01.0A", "Abstract", "01.00_Journal/01.0A"));
        assert!(module.is_container());
        assert_eq!(module.submodules.len(), 1);
    }

    #[test]
    fn walk_is_depth_first_in_declared_order() {
        let module = ModuleDescriptor::leaf("a", "A", "a")
            .with_submodule(
                ModuleDescriptor::leaf("a1", "A1", "a/a1")
                    .with_submodule(ModuleDescriptor::leaf("a1x", "A1x", "a/a1/x")),
            )
            .with_submodule(ModuleDescriptor::leaf("a2", "A2", "a/a2"));

        let ids: Vec<&str> = module.walk().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "a1", "a1x", "a2"]);
    }

    #[test]
    fn entry_falls_back_to_default() {
        let module = ModuleDescriptor::leaf("x", "X", "x");
        assert_eq!(module.entry_or("main.py"), "main.py");
        let module = module.with_entry("render.sh");
        assert_eq!(module.entry_or("main.py"), "render.sh");
    }
}
