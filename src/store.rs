//! Read side of the converter: loads produced books by id for a reading
//! front-end, keeping the most recently used ones in memory.

use crate::converter::BOOK_FILE;
use crate::error::ConvertResult;
use crate::model::Book;
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Stands in for a path separator inside a book id.
const ID_SEPARATOR: &str = "__";

pub const DEFAULT_CAPACITY: usize = 10;

/// Bounded cache of books under a fixed root directory.
pub struct BookStore {
    root: PathBuf,
    capacity: usize,
    /// Most recently used first.
    cache: Mutex<VecDeque<(String, Arc<Book>)>>,
}

impl BookStore {
    pub fn new(root: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            root: root.into(),
            capacity: capacity.max(1),
            cache: Mutex::new(VecDeque::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loads the book stored under `book_id`. Ids that do not name a
    /// directory inside the root, and directories without a book, yield
    /// `None`.
    pub fn load(&self, book_id: &str) -> ConvertResult<Option<Arc<Book>>> {
        if let Some(book) = self.cached(book_id) {
            tracing::debug!(book_id, "book cache hit");
            return Ok(Some(book));
        }

        let Some(dir) = self.book_dir(book_id) else {
            tracing::debug!(book_id, "rejected book id");
            return Ok(None);
        };

        let json = match fs::read_to_string(dir.join(BOOK_FILE)) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let book = Arc::new(serde_json::from_str::<Book>(&json)?);

        let mut cache = self.lock();
        cache.retain(|(id, _)| id != book_id);
        cache.push_front((book_id.to_string(), Arc::clone(&book)));
        cache.truncate(self.capacity);

        tracing::debug!(book_id, title = %book.metadata.title, "loaded book");
        Ok(Some(book))
    }

    /// Forgets a cached book, e.g. after its directory was moved or renamed.
    pub fn invalidate(&self, book_id: &str) {
        self.lock().retain(|(id, _)| id != book_id);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Directory for `book_id`, or `None` if the id is empty, absolute or
    /// would leave the root.
    pub fn book_dir(&self, book_id: &str) -> Option<PathBuf> {
        let decoded = book_id.replace(ID_SEPARATOR, "/");

        let mut relative = PathBuf::new();
        for component in Path::new(decoded.trim()).components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }

        if relative.as_os_str().is_empty() {
            None
        } else {
            Some(self.root.join(relative))
        }
    }

    fn cached(&self, book_id: &str) -> Option<Arc<Book>> {
        let mut cache = self.lock();
        let position = cache.iter().position(|(id, _)| id == book_id)?;
        let entry = cache.remove(position)?;
        let book = Arc::clone(&entry.1);
        cache.push_front(entry);
        Some(book)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<(String, Arc<Book>)>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Encodes a path relative to the books root as a book id.
pub fn encode_book_id(relative_path: &Path) -> String {
    relative_path
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(ID_SEPARATOR)
}
