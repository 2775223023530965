//! Module Registry: the ordered set of modules a run will consider.
//!
//! Modules come from the `modules` object of the registry file, in the
//! order they are written there, optionally extended by a discovery pass
//! over `NN.NN_Title` folders under the root.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use folio_core::{FolioConfig, ModuleDescriptor, ModuleKind};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{BuildError, Result};

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    discover: bool,
    modules: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawModule {
    name: Option<String>,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    entry: Option<String>,
    #[serde(default)]
    interpreter: Option<String>,
    #[serde(default)]
    output_pattern: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    assets: Vec<String>,
    #[serde(default)]
    submodules: Map<String, Value>,
}

/// Loaded modules, top level in declared order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    modules: Vec<ModuleDescriptor>,
}

impl Registry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_modules(modules: Vec<ModuleDescriptor>) -> Self {
        Self { modules }
    }

    /// Read the registry file named by `config`, then run discovery if
    /// either the file or the settings ask for it.
    pub fn load(config: &FolioConfig) -> Result<Self> {
        let path = config.config_path();
        let raw = fs::read_to_string(&path).map_err(|e| BuildError::Configuration {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let (mut registry, discover) = Self::parse(&raw).map_err(|reason| {
            BuildError::Configuration {
                path: path.clone(),
                reason,
            }
        })?;

        registry.drop_self_references(&config.root);

        if discover || config.discover {
            let found = Self::discover(&config.root, &config.default_entry)?;
            registry.merge_discovered(found);
        }

        info!(path = %path.display(), modules = registry.len(), "Registry loaded");
        Ok(registry)
    }

    /// Parse registry JSON; returns the modules and the file's `discover` flag.
    pub fn parse(raw: &str) -> std::result::Result<(Self, bool), String> {
        let file: RegistryFile = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        let modules = convert_map(file.modules)?;
        Ok((Self { modules }, file.discover))
    }

    /// Build a registry from folders alone.
    ///
    /// Every direct child of `root` named like `01.00_Some_Title` that holds
    /// `entry` becomes an active leaf; matching folders inside it become its
    /// submodules.
    pub fn discover(root: &Path, entry: &str) -> Result<Self> {
        Ok(Self {
            modules: discover_in(root, Path::new(""), entry)?,
        })
    }

    pub fn modules(&self) -> &[ModuleDescriptor] {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Every module, depth first.
    pub fn walk(&self) -> Vec<&ModuleDescriptor> {
        self.modules.iter().flat_map(|m| m.walk()).collect()
    }

    /// Look a module up by id anywhere in the tree.
    pub fn find(&self, id: &str) -> Option<&ModuleDescriptor> {
        self.walk().into_iter().find(|m| m.id == id)
    }

    /// Configured modules win; discovered ones are appended when neither
    /// their id nor their path is already taken.
    fn merge_discovered(&mut self, discovered: Registry) {
        let mut ids: HashSet<String> = self.walk().iter().map(|m| m.id.clone()).collect();
        let mut paths: HashSet<PathBuf> = self.walk().iter().map(|m| m.path.clone()).collect();

        for module in discovered.modules {
            if ids.contains(&module.id) || paths.contains(&module.path) {
                debug!(module_id = %module.id, "Discovered module already configured");
                continue;
            }
            for m in module.walk() {
                ids.insert(m.id.clone());
                paths.insert(m.path.clone());
            }
            info!(module_id = %module.id, path = %module.path.display(), "Discovered module");
            self.modules.push(module);
        }
    }

    fn drop_self_references(&mut self, root: &Path) {
        let root = canonical(root);
        strip_root(&mut self.modules, &root);
    }
}

fn strip_root(modules: &mut Vec<ModuleDescriptor>, root: &Path) {
    modules.retain(|m| {
        let points_at_root = canonical(&root.join(&m.path)) == root;
        if points_at_root {
            warn!(module_id = %m.id, "Module path is the notebook root, skipping");
        }
        !points_at_root
    });
    for m in modules.iter_mut() {
        strip_root(&mut m.submodules, root);
    }
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn convert_map(map: Map<String, Value>) -> std::result::Result<Vec<ModuleDescriptor>, String> {
    let mut out = Vec::with_capacity(map.len());
    for (id, value) in map {
        let raw: RawModule =
            serde_json::from_value(value).map_err(|e| format!("module {}: {}", id, e))?;
        out.push(convert(id, raw)?);
    }
    Ok(out)
}

fn convert(id: String, raw: RawModule) -> std::result::Result<ModuleDescriptor, String> {
    let submodules = convert_map(raw.submodules)?;
    let kind = match raw.kind.as_deref() {
        Some("container") => ModuleKind::Container,
        Some("leaf") | Some("single") => ModuleKind::Leaf,
        Some(other) => return Err(format!("module {}: unknown type {:?}", id, other)),
        None if !submodules.is_empty() => ModuleKind::Container,
        None => ModuleKind::Leaf,
    };
    Ok(ModuleDescriptor {
        name: raw.name.unwrap_or_else(|| id.clone()),
        path: raw.path.unwrap_or_else(|| PathBuf::from(&id)),
        id,
        active: raw.active,
        kind,
        entry: raw.entry,
        interpreter: raw.interpreter,
        output_pattern: raw.output_pattern,
        description: raw.description,
        assets: raw.assets,
        submodules,
    })
}

fn module_dir_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([0-9A-Za-z]{2}\.[0-9A-Za-z]{1,2})_([0-9A-Za-z].*)$").expect("valid regex")
    })
}

fn discover_in(root: &Path, rel: &Path, entry: &str) -> Result<Vec<ModuleDescriptor>> {
    let mut names: Vec<String> = fs::read_dir(root.join(rel))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .collect();
    names.sort();

    let mut modules = Vec::new();
    for name in names {
        let Some(caps) = module_dir_re().captures(&name) else {
            continue;
        };
        let path = rel.join(&name);
        if !root.join(&path).join(entry).is_file() {
            continue;
        }
        let title = caps[2].replace('_', " ");
        let mut module = ModuleDescriptor::leaf(&caps[1], title, path.clone());
        for child in discover_in(root, &path, entry)? {
            module = module.with_submodule(child);
        }
        modules.push(module);
    }
    Ok(modules)
}
