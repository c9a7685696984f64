//! Document Catalog
//!
//! Read-only view of the preloaded document folder:
//! `<root>/<category>/<document>.pdf`, one category per client.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Extension of documents offered for questions
const PDF_EXTENSION: &str = ".pdf";

/// Maximum recursion depth for the full-catalog walk.
const MAX_WALK_DEPTH: u32 = 10;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog folder cannot be opened: {0}")]
    CategoriesUnavailable(String),
    #[error("Catalog folder has no categories: {0}")]
    NoCategories(String),
    #[error("Category folder not found: {0}")]
    CategoryNotFound(String),
    #[error("Document not found: {0}")]
    DocumentNotFound(String),
    #[error("Invalid name: {0}")]
    InvalidName(String),
    #[error("Path escapes catalog folder")]
    PathEscape,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    /// Short banner shown to the user
    pub fn user_message(&self) -> String {
        match self {
            CatalogError::CategoriesUnavailable(_) | CatalogError::NoCategories(_) => {
                "Fout bij het openen van categorieën. Controleer of de map bestaat en niet leeg is.".to_string()
            }
            CatalogError::CategoryNotFound(path) => {
                format!("Map niet gevonden: {}. Controleer of de map bestaat.", path)
            }
            CatalogError::DocumentNotFound(path) => {
                format!("Document niet gevonden: {}.", path)
            }
            CatalogError::InvalidName(name) => format!("Ongeldige naam: {}.", name),
            CatalogError::PathEscape => "Het document ligt buiten de documentenmap.".to_string(),
            CatalogError::Io(e) => format!("Fout bij het lezen van de documentenmap: {}", e),
        }
    }
}

/// A PDF in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Filename, e.g. `policy.pdf`
    pub title: String,
    pub path: PathBuf,
    /// Owning category (client folder name)
    pub category: String,
}

/// Catalog rooted at an explicit folder
#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
}

impl Catalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Immediate subfolder names of the root, sorted.
    ///
    /// Symlinked folders count as categories when they resolve inside the root.
    pub fn list_categories(&self) -> Result<Vec<String>, CatalogError> {
        let read_dir = fs::read_dir(&self.root).map_err(|e| {
            warn!(root = %self.root.display(), error = %e, "Catalog root unreadable");
            CatalogError::CategoriesUnavailable(self.root.display().to_string())
        })?;

        let mut categories = Vec::new();
        for entry in read_dir {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() && self.contains(&path) {
                categories.push(entry.file_name().to_string_lossy().to_string());
            }
        }

        if categories.is_empty() {
            return Err(CatalogError::NoCategories(self.root.display().to_string()));
        }

        categories.sort();
        debug!(count = categories.len(), "Listed categories");
        Ok(categories)
    }

    /// PDF filenames directly inside `category`, sorted.
    ///
    /// Symlinked PDFs are listed when they resolve inside the root, so every
    /// listed name can be passed to [`Catalog::resolve_document`].
    pub fn list_documents(&self, category: &str) -> Result<Vec<String>, CatalogError> {
        validate_name(category)?;
        let category_path = self.root.join(category);

        let read_dir = fs::read_dir(&category_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                CatalogError::CategoryNotFound(category_path.display().to_string())
            }
            _ => CatalogError::Io(e),
        })?;

        let mut documents = Vec::new();
        for entry in read_dir {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            let path = entry.path();
            if name.ends_with(PDF_EXTENSION) && path.is_file() && self.contains(&path) {
                documents.push(name);
            }
        }

        documents.sort();
        debug!(category = %category, count = documents.len(), "Listed documents");
        Ok(documents)
    }

    /// Every PDF anywhere under the root, sorted by category then title.
    pub fn all_documents(&self) -> Result<Vec<Document>, CatalogError> {
        if !self.root.is_dir() {
            return Err(CatalogError::CategoriesUnavailable(self.root.display().to_string()));
        }

        let mut documents = Vec::new();
        walk_documents(self, &self.root, MAX_WALK_DEPTH, &mut documents)?;
        documents.sort_by(|a, b| {
            a.category.cmp(&b.category).then_with(|| a.title.cmp(&b.title))
        });
        Ok(documents)
    }

    /// Resolve a selection to a document inside the catalog.
    pub fn resolve_document(&self, category: &str, filename: &str) -> Result<Document, CatalogError> {
        validate_name(category)?;
        validate_name(filename)?;

        let category_path = self.root.join(category);
        if !category_path.is_dir() {
            return Err(CatalogError::CategoryNotFound(category_path.display().to_string()));
        }

        let candidate = category_path.join(filename);
        if !candidate.is_file() {
            return Err(CatalogError::DocumentNotFound(candidate.display().to_string()));
        }

        let path = validate_path_containment(&self.root, &candidate)?;
        Ok(Document {
            title: filename.to_string(),
            path,
            category: category.to_string(),
        })
    }

    /// True if `path` resolves, links followed, to a location inside the root.
    fn contains(&self, path: &Path) -> bool {
        match validate_path_containment(&self.root, path) {
            Ok(_) => true,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping entry outside the catalog");
                false
            }
        }
    }

    /// Raw bytes of a document, for download.
    pub fn read_document(&self, category: &str, filename: &str) -> Result<Vec<u8>, CatalogError> {
        let document = self.resolve_document(category, filename)?;
        Ok(fs::read(&document.path)?)
    }
}

/// Recursively collect PDFs. The category is the first path component below the root.
///
/// Symlinked files are followed everywhere. Symlinked folders are followed
/// only as categories, directly below the root, matching `list_categories`.
fn walk_documents(
    catalog: &Catalog,
    dir: &Path,
    remaining_depth: u32,
    documents: &mut Vec<Document>,
) -> Result<(), CatalogError> {
    if remaining_depth == 0 {
        return Ok(());
    }

    let root = catalog.root();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        let is_category = dir == root && file_type.is_symlink() && path.is_dir();

        if file_type.is_dir() || is_category {
            if catalog.contains(&path) {
                walk_documents(catalog, &path, remaining_depth - 1, documents)?;
            }
        } else if path.is_file() {
            let title = entry.file_name().to_string_lossy().to_string();
            if !title.ends_with(PDF_EXTENSION) || !catalog.contains(&path) {
                continue;
            }
            let category = path.strip_prefix(root)
                .ok()
                .and_then(|rel| rel.components().next())
                .filter(|_| path.parent() != Some(root))
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .unwrap_or_default();
            documents.push(Document { title, path, category });
        }
    }

    Ok(())
}

/// Category and document names must be a single normal path component.
fn validate_name(name: &str) -> Result<(), CatalogError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => Ok(()),
        _ => Err(CatalogError::InvalidName(name.to_string())),
    }
}

/// Canonicalize both paths and require the candidate to live under the base.
fn validate_path_containment(base: &Path, candidate: &Path) -> Result<PathBuf, CatalogError> {
    let canonical_base = base.canonicalize()?;
    let canonical_candidate = candidate.canonicalize()?;
    if canonical_candidate.starts_with(&canonical_base) {
        Ok(canonical_candidate)
    } else {
        Err(CatalogError::PathEscape)
    }
}
