//! Task discovery
//!
//! Discovery runs in two phases. [`enumerate_modules`] lists candidate
//! modules under `<root>/<package>`; a [`ModuleLoader`] then runs the
//! registration entry point of one module at a time, until the requested
//! task shows up in the [`Registry`].

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Result, TaskMasterError};
use crate::registry::{Registry, Task};

/// Files starting with this prefix are never loaded
pub const RESERVED_PREFIX: &str = "__";

/// One candidate module found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRef {
    /// Dotted module path, e.g. `tasks.deploy.staging`
    pub name: String,
    pub path: PathBuf,
}

impl ModuleRef {
    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|ext| ext.to_str())
    }

    /// File name without extension
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
    }
}

/// List modules under `<root>/<package>` whose extension is in `extensions`
///
/// Entries are visited in file-name order, symlinks are not followed and
/// files starting with [`RESERVED_PREFIX`] are skipped. A missing package
/// directory yields no modules.
pub fn enumerate_modules(root: &Path, package: &str, extensions: &[&str]) -> Result<Vec<ModuleRef>> {
    let package_dir = root.join(package);
    if !package_dir.is_dir() {
        debug!(path = %package_dir.display(), "Tasks directory not found");
        return Ok(Vec::new());
    }

    let walker = WalkDir::new(&package_dir)
        .follow_links(false)
        .min_depth(1)
        .sort_by_file_name();

    let mut modules = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| TaskMasterError::Discovery {
            path: package_dir.clone(),
            details: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if file_name.starts_with(RESERVED_PREFIX) {
            continue;
        }
        let path = entry.path();
        let handled = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| extensions.contains(&ext))
            .unwrap_or(false);
        if !handled {
            continue;
        }

        if let Some(name) = dotted_name(package, &package_dir, path) {
            modules.push(ModuleRef {
                name,
                path: path.to_path_buf(),
            });
        }
    }
    Ok(modules)
}

/// `<package_dir>/a/b/c.ext` → `package.a.b.c`
fn dotted_name(package: &str, package_dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(package_dir).ok()?.with_extension("");
    let mut name = package.replace(['/', '\\'], ".");
    for component in relative.components() {
        name.push('.');
        name.push_str(component.as_os_str().to_str()?);
    }
    Some(name)
}

/// Registration entry point of one kind of module
pub trait ModuleLoader {
    /// File extensions this loader handles, without the dot
    fn extensions(&self) -> &[&'static str];

    /// Register every task the module declares
    fn load(&self, module: &ModuleRef, registry: &mut Registry) -> Result<()>;
}

/// Entry point of a compiled-in task module
pub type ModuleEntry = fn(&mut Registry) -> Result<()>;

/// Catalog of compiled-in task modules, keyed by dotted module path
///
/// A `tasks/deploy.rs` file is only a marker for discovery; its entry
/// point has to be listed here (usually from `main`) to run.
#[derive(Default, Clone)]
pub struct StaticModules {
    entries: HashMap<String, ModuleEntry>,
}

impl StaticModules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module(mut self, name: impl Into<String>, entry: ModuleEntry) -> Self {
        self.entries.insert(name.into(), entry);
        self
    }
}

impl ModuleLoader for StaticModules {
    fn extensions(&self) -> &[&'static str] {
        &["rs"]
    }

    fn load(&self, module: &ModuleRef, registry: &mut Registry) -> Result<()> {
        match self.entries.get(&module.name) {
            Some(entry) => entry(registry),
            None => {
                debug!(module = %module.name, "No compiled-in entry point, skipping");
                Ok(())
            }
        }
    }
}

/// Lazy, idempotent task lookup over a tasks directory
pub struct Discovery {
    root: PathBuf,
    package: String,
    loaders: Vec<Box<dyn ModuleLoader>>,
    loaded: HashSet<PathBuf>,
}

impl Discovery {
    pub fn new(root: impl Into<PathBuf>, package: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            package: package.into(),
            loaders: Vec::new(),
            loaded: HashSet::new(),
        }
    }

    pub fn with_loader(mut self, loader: impl ModuleLoader + 'static) -> Self {
        self.loaders.push(Box::new(loader));
        self
    }

    /// Find `name`, loading modules in order until it is registered
    pub fn resolve(&mut self, name: &str, registry: &mut Registry) -> Result<Task> {
        if let Some(task) = registry.get(name) {
            return Ok(task.clone());
        }

        for module in self.pending()? {
            self.load(&module, registry)?;
            if let Some(task) = registry.get(name) {
                return Ok(task.clone());
            }
        }

        if registry.is_empty() {
            debug!(package = %self.package, "No tasks registered under the tasks directory");
        }
        Err(TaskMasterError::UnknownTask {
            requested: name.to_string(),
            known: registry.names(),
        })
    }

    /// Load every module not loaded yet
    pub fn load_all(&mut self, registry: &mut Registry) -> Result<()> {
        for module in self.pending()? {
            self.load(&module, registry)?;
        }
        debug!(package = %self.package, tasks = registry.len(), "All task modules loaded");
        Ok(())
    }

    fn pending(&self) -> Result<Vec<ModuleRef>> {
        let extensions: Vec<&'static str> = self
            .loaders
            .iter()
            .flat_map(|loader| loader.extensions().iter().copied())
            .collect();

        let mut modules = enumerate_modules(&self.root, &self.package, &extensions)?;
        modules.retain(|module| !self.loaded.contains(&module.path));
        Ok(modules)
    }

    fn load(&mut self, module: &ModuleRef, registry: &mut Registry) -> Result<()> {
        let loader = self
            .loaders
            .iter()
            .find(|loader| module.extension().is_some_and(|ext| loader.extensions().contains(&ext)));
        if let Some(loader) = loader {
            debug!(module = %module.name, path = %module.path.display(), "Loading task module");
            loader.load(module, registry)?;
        }
        self.loaded.insert(module.path.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Handler, Kwargs};
    use crate::schema::Arguments;
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;
    use tempfile::TempDir;

    fn noop(_: &mut Arguments, _: &Kwargs) -> anyhow::Result<()> {
        Ok(())
    }

    fn touch(dir: &Path, relative: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "tasks/b.rs");
        touch(dir.path(), "tasks/a.rs");
        touch(dir.path(), "tasks/__init__.rs");
        touch(dir.path(), "tasks/notes.txt");
        touch(dir.path(), "tasks/nested/deep.rs");
        touch(dir.path(), "tasks/nested/__skip.rs");
        dir
    }

    /// Registers `<stem>` for every module and records the load order
    struct Recording {
        loads: Rc<RefCell<Vec<String>>>,
    }

    impl ModuleLoader for Recording {
        fn extensions(&self) -> &[&'static str] {
            &["rs"]
        }

        fn load(&self, module: &ModuleRef, registry: &mut Registry) -> Result<()> {
            self.loads.borrow_mut().push(module.name.clone());
            registry.register(Some(module.stem()), Handler::new(module.stem(), noop), None)
        }
    }

    #[test]
    fn enumerates_in_order_with_dotted_names() {
        let dir = tree();
        let modules = enumerate_modules(dir.path(), "tasks", &["rs"]).unwrap();
        let names: Vec<&str> = modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["tasks.a", "tasks.b", "tasks.nested.deep"]);
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(enumerate_modules(dir.path(), "tasks", &["rs"]).unwrap().is_empty());
    }

    #[test]
    fn resolve_stops_at_first_match() {
        let dir = tree();
        let loads = Rc::new(RefCell::new(Vec::new()));
        let mut discovery = Discovery::new(dir.path(), "tasks").with_loader(Recording {
            loads: Rc::clone(&loads),
        });
        let mut registry = Registry::default();

        let task = discovery.resolve("b", &mut registry).unwrap();
        assert_eq!(task.name(), "b");
        assert_eq!(*loads.borrow(), vec!["tasks.a", "tasks.b"]);

        // already registered: nothing is loaded again
        discovery.resolve("a", &mut registry).unwrap();
        assert_eq!(loads.borrow().len(), 2);

        // continues past loaded modules only
        discovery.resolve("deep", &mut registry).unwrap();
        assert_eq!(*loads.borrow(), vec!["tasks.a", "tasks.b", "tasks.nested.deep"]);
    }

    #[test]
    fn unknown_task_lists_everything_registered() {
        let dir = tree();
        let loads = Rc::new(RefCell::new(Vec::new()));
        let mut discovery = Discovery::new(dir.path(), "tasks").with_loader(Recording {
            loads: Rc::clone(&loads),
        });
        let mut registry = Registry::default();

        let err = discovery.resolve("missing", &mut registry).unwrap_err();
        match err {
            TaskMasterError::UnknownTask { requested, known } => {
                assert_eq!(requested, "missing");
                assert_eq!(known, vec!["a", "b", "deep"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // a second miss loads nothing twice
        let _ = discovery.resolve("missing", &mut registry);
        assert_eq!(loads.borrow().len(), 3);
    }

    #[test]
    fn load_all_is_idempotent() {
        let dir = tree();
        let loads = Rc::new(RefCell::new(Vec::new()));
        let mut discovery = Discovery::new(dir.path(), "tasks").with_loader(Recording {
            loads: Rc::clone(&loads),
        });
        let mut registry = Registry::default();

        discovery.resolve("a", &mut registry).unwrap();
        discovery.load_all(&mut registry).unwrap();
        discovery.load_all(&mut registry).unwrap();
        assert_eq!(*loads.borrow(), vec!["tasks.a", "tasks.b", "tasks.nested.deep"]);
    }

    fn register_alpha(registry: &mut Registry) -> Result<()> {
        registry.register(Some("alpha"), crate::handler!(noop), None)
    }

    #[test]
    fn static_modules_run_catalogued_entry_points() {
        let dir = tree();
        let mut discovery = Discovery::new(dir.path(), "tasks")
            .with_loader(StaticModules::new().module("tasks.b", register_alpha));
        let mut registry = Registry::default();

        let task = discovery.resolve("alpha", &mut registry).unwrap();
        assert_eq!(task.handler().ident(), "noop");
        assert_eq!(registry.names(), vec!["alpha"]);
    }
}
