use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};

use crate::error::{FrequenciaError, Result};
use crate::model::{BOOK_HEADERS, Book};

pub fn catalog_path(data_dir: &Path) -> PathBuf {
    data_dir.join("livros.csv")
}

pub fn cover_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("capas")
}

#[derive(Debug, Clone)]
pub struct Catalog {
    path: PathBuf,
    covers: PathBuf,
}

impl Catalog {
    pub fn open<P: Into<PathBuf>, Q: Into<PathBuf>>(path: P, covers: Q) -> Self {
        Self {
            path: path.into(),
            covers: covers.into(),
        }
    }

    pub fn list(&self) -> Result<Vec<Book>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);
        let mut books = Vec::new();
        for result in rdr.deserialize() {
            books.push(result.map_err(|source| FrequenciaError::CorruptFile {
                path: self.path.clone(),
                source,
            })?);
        }
        Ok(books)
    }

    /// Stores the cover under its original file name, replacing any cover
    /// that already has that name, and appends the book to the catalog.
    ///
    /// The cover is staged next to its final name and only moved into place
    /// once the catalog row is written.
    pub fn add(&self, title: &str, author: &str, year: i32, cover_source: &Path) -> Result<Book> {
        let (title, author) = (title.trim(), author.trim());
        if title.is_empty() {
            return Err(FrequenciaError::InvalidBook("título vazio".to_string()));
        }
        if author.is_empty() {
            return Err(FrequenciaError::InvalidBook("autor vazio".to_string()));
        }
        let file_name = cover_source.file_name().ok_or_else(|| {
            FrequenciaError::InvalidBook(format!("capa sem nome: {}", cover_source.display()))
        })?;
        if !cover_source.is_file() {
            return Err(FrequenciaError::MissingFile(cover_source.to_path_buf()));
        }

        let mut books = self.list()?;
        fs::create_dir_all(&self.covers)?;
        let stored = self.covers.join(file_name);
        let staged = if is_same_file(cover_source, &stored)? {
            None
        } else {
            if stored.exists() {
                log::warn!("replacing existing cover {}", stored.display());
            }
            let staged = self
                .covers
                .join(format!(".{}.tmp", file_name.to_string_lossy()));
            fs::copy(cover_source, &staged)?;
            Some(staged)
        };

        let book = Book {
            title: title.to_string(),
            author: author.to_string(),
            year,
            cover: stored.to_string_lossy().into_owned(),
        };
        books.push(book.clone());
        if let Err(e) = self.write_all(&books) {
            if let Some(staged) = &staged {
                let _ = fs::remove_file(staged);
            }
            return Err(e);
        }
        if let Some(staged) = staged {
            fs::rename(&staged, &stored).inspect_err(|_| {
                let _ = fs::remove_file(&staged);
            })?;
        }
        log::info!("added book {:?} to {}", book.title, self.path.display());
        Ok(book)
    }

    pub fn ensure_exists(&self) -> Result<bool> {
        fs::create_dir_all(&self.covers)?;
        if self.path.exists() {
            return Ok(false);
        }
        self.write_all(&[])?;
        Ok(true)
    }

    fn write_all(&self, books: &[Book]) -> Result<()> {
        let write_failed = |e: csv::Error| FrequenciaError::WriteFailed {
            path: self.path.clone(),
            reason: e.to_string(),
        };
        let mut wtr = WriterBuilder::new()
            .has_headers(false)
            .from_path(&self.path)
            .map_err(write_failed)?;
        wtr.write_record(BOOK_HEADERS).map_err(write_failed)?;
        for book in books {
            wtr.serialize(book).map_err(write_failed)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn is_same_file(source: &Path, stored: &Path) -> Result<bool> {
    if !stored.exists() {
        return Ok(false);
    }
    Ok(fs::canonicalize(source)? == fs::canonicalize(stored)?)
}
