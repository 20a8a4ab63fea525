//! Source-provider and edit-applier boundary.
//!
//! The engine never touches the host directly: module enumeration and text
//! come in through [`SourceProvider`], and computed edit sets go back out
//! through [`EditApplier`]. The filesystem implementations here back the CLI;
//! [`MemorySourceProvider`] backs tests and embedding hosts.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use vbatool_core::graph::ModuleKind;
use vbatool_core::{EditSet, PatchError, QualifiedModuleName};

/// Errors from source enumeration and loading.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("unknown project: {0}")]
    UnknownProject(String),

    #[error("unknown module: {0}")]
    UnknownModule(QualifiedModuleName),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors from applying an edit set to the host.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("unknown module: {0}")]
    UnknownModule(QualifiedModuleName),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Handle for one enumerated module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSource {
    pub name: QualifiedModuleName,
    pub kind: ModuleKind,
}

/// Supplies module enumeration and source text from the host.
pub trait SourceProvider {
    /// Names of the loaded projects.
    fn projects(&self) -> Vec<String>;

    /// Modules of one project, in deterministic order.
    fn list_modules(&self, project: &str) -> Result<Vec<ModuleSource>, SourceError>;

    /// Raw source text of one module.
    fn module_text(&self, module: &QualifiedModuleName) -> Result<String, SourceError>;
}

/// Applies a computed edit set back into the host.
pub trait EditApplier {
    /// Apply all edits atomically; returns the modules written.
    fn apply(&mut self, edits: &EditSet) -> Result<Vec<QualifiedModuleName>, ApplyError>;
}

// ============================================================================
// In-memory provider
// ============================================================================

/// Module sources held in memory. Used by tests and embedding hosts that
/// already have text on hand.
#[derive(Debug, Clone, Default)]
pub struct MemorySourceProvider {
    modules: BTreeMap<QualifiedModuleName, (ModuleKind, String)>,
}

impl MemorySourceProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        MemorySourceProvider::default()
    }

    /// Add a module. Returns `self` for chaining.
    pub fn with_module(
        mut self,
        project: &str,
        module: &str,
        kind: ModuleKind,
        source: impl Into<String>,
    ) -> Self {
        self.modules.insert(
            QualifiedModuleName::new(project, module),
            (kind, source.into()),
        );
        self
    }

    /// Replace a module's text in place (simulates a host edit).
    pub fn set_text(&mut self, module: &QualifiedModuleName, source: impl Into<String>) {
        if let Some(entry) = self.modules.get_mut(module) {
            entry.1 = source.into();
        }
    }
}

impl SourceProvider for MemorySourceProvider {
    fn projects(&self) -> Vec<String> {
        let mut projects: Vec<String> =
            self.modules.keys().map(|qmn| qmn.project.clone()).collect();
        projects.dedup();
        projects
    }

    fn list_modules(&self, project: &str) -> Result<Vec<ModuleSource>, SourceError> {
        let modules: Vec<ModuleSource> = self
            .modules
            .iter()
            .filter(|(qmn, _)| qmn.project == project)
            .map(|(qmn, (kind, _))| ModuleSource {
                name: qmn.clone(),
                kind: *kind,
            })
            .collect();
        if modules.is_empty() {
            return Err(SourceError::UnknownProject(project.to_string()));
        }
        Ok(modules)
    }

    fn module_text(&self, module: &QualifiedModuleName) -> Result<String, SourceError> {
        self.modules
            .get(module)
            .map(|(_, text)| text.clone())
            .ok_or_else(|| SourceError::UnknownModule(module.clone()))
    }
}

// ============================================================================
// Filesystem provider
// ============================================================================

/// Loads a project from a directory: the directory name is the project name,
/// `.bas` files are standard modules, `.cls` files are class modules.
#[derive(Debug, Clone)]
pub struct FileSourceProvider {
    project: String,
    files: BTreeMap<QualifiedModuleName, (ModuleKind, PathBuf)>,
}

impl FileSourceProvider {
    /// Scan a project directory.
    pub fn open(root: &Path) -> Result<Self, SourceError> {
        let project = root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Project".to_string());

        let mut files = BTreeMap::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| SourceError::Io {
                path: root.to_path_buf(),
                source: io::Error::other(e),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let kind = match path.extension().and_then(|ext| ext.to_str()) {
                Some("bas") => ModuleKind::Standard,
                Some("cls") => ModuleKind::Class,
                _ => continue,
            };
            let module = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            files.insert(
                QualifiedModuleName::new(project.clone(), module),
                (kind, path.to_path_buf()),
            );
        }

        Ok(FileSourceProvider { project, files })
    }

    /// Path backing a module, if known.
    pub fn path_of(&self, module: &QualifiedModuleName) -> Option<&Path> {
        self.files.get(module).map(|(_, path)| path.as_path())
    }
}

impl SourceProvider for FileSourceProvider {
    fn projects(&self) -> Vec<String> {
        vec![self.project.clone()]
    }

    fn list_modules(&self, project: &str) -> Result<Vec<ModuleSource>, SourceError> {
        if project != self.project {
            return Err(SourceError::UnknownProject(project.to_string()));
        }
        Ok(self
            .files
            .iter()
            .map(|(qmn, (kind, _))| ModuleSource {
                name: qmn.clone(),
                kind: *kind,
            })
            .collect())
    }

    fn module_text(&self, module: &QualifiedModuleName) -> Result<String, SourceError> {
        let (_, path) = self
            .files
            .get(module)
            .ok_or_else(|| SourceError::UnknownModule(module.clone()))?;
        std::fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.clone(),
            source,
        })
    }
}

/// Applies edit sets to the files behind a [`FileSourceProvider`].
#[derive(Debug)]
pub struct FileEditApplier<'a> {
    provider: &'a FileSourceProvider,
}

impl<'a> FileEditApplier<'a> {
    /// Create an applier over the provider's files.
    pub fn new(provider: &'a FileSourceProvider) -> Self {
        FileEditApplier { provider }
    }
}

impl EditApplier for FileEditApplier<'_> {
    fn apply(&mut self, edits: &EditSet) -> Result<Vec<QualifiedModuleName>, ApplyError> {
        // Read every touched module up front so validation sees one
        // consistent view and failures leave no partial writes.
        let mut sources = BTreeMap::new();
        for module in edits.modules() {
            let path = self
                .provider
                .path_of(module)
                .ok_or_else(|| ApplyError::UnknownModule(module.clone()))?;
            let text = std::fs::read_to_string(path).map_err(|source| ApplyError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            sources.insert(module.clone(), text);
        }

        let updated = edits.apply(&sources)?;

        let mut written = Vec::new();
        for (module, text) in &updated {
            let path = self
                .provider
                .path_of(module)
                .ok_or_else(|| ApplyError::UnknownModule(module.clone()))?;
            std::fs::write(path, text).map_err(|source| ApplyError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            written.push(module.clone());
        }
        Ok(written)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_provider_lists_in_deterministic_order() {
        let provider = MemorySourceProvider::new()
            .with_module("P", "B", ModuleKind::Standard, "")
            .with_module("P", "A", ModuleKind::Class, "");
        let modules = provider.list_modules("P").unwrap();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[0].name.module, "A");
        assert_eq!(modules[0].kind, ModuleKind::Class);
    }

    #[test]
    fn memory_provider_unknown_project() {
        let provider = MemorySourceProvider::new();
        assert!(matches!(
            provider.list_modules("Nope"),
            Err(SourceError::UnknownProject(_))
        ));
    }

    #[test]
    fn file_provider_scans_bas_and_cls() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("TestProject");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(root.join("Module1.bas"), "Public Sub Foo()\nEnd Sub\n").unwrap();
        std::fs::write(root.join("Class1.cls"), "").unwrap();
        std::fs::write(root.join("notes.txt"), "ignored").unwrap();

        let provider = FileSourceProvider::open(&root).unwrap();
        assert_eq!(provider.projects(), vec!["TestProject"]);
        let modules = provider.list_modules("TestProject").unwrap();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[0].name.module, "Class1");
        assert_eq!(modules[0].kind, ModuleKind::Class);
        assert_eq!(modules[1].kind, ModuleKind::Standard);

        let text = provider
            .module_text(&QualifiedModuleName::new("TestProject", "Module1"))
            .unwrap();
        assert!(text.contains("Foo"));
    }

    #[test]
    fn file_applier_round_trips_edits() {
        use vbatool_core::{Edit, Selection, Span};

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("P");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(root.join("M.bas"), "foo = 1\n").unwrap();

        let provider = FileSourceProvider::open(&root).unwrap();
        let qmn = QualifiedModuleName::new("P", "M");
        let mut edits = EditSet::new();
        edits.push(Edit::new(
            qmn.clone(),
            Span::new(0, 3),
            Selection::new(1, 1, 1, 3),
            "bar",
        ));

        let written = FileEditApplier::new(&provider).apply(&edits).unwrap();
        assert_eq!(written, vec![qmn]);
        assert_eq!(
            std::fs::read_to_string(root.join("M.bas")).unwrap(),
            "bar = 1\n"
        );
    }
}
