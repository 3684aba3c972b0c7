use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task;
use tracing::debug;

use crate::error::{Error, Result};

/// Reads a PDF file and returns the text of every page, in order.
pub fn read_pdf(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    debug!(path = %path.display(), "extracting pdf text");
    pdf_extract::extract_text(path).map_err(|err| Error::Pdf {
        path: path.display().to_string(),
        message: err.to_string(),
    })
}

/// Source of document text for [`crate::agents::PdfReader`].
pub trait DocumentLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<String>;
}

/// Reads `.pdf` files through the PDF extractor and anything else as UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader;

impl DocumentLoader for FileLoader {
    fn load(&self, path: &Path) -> Result<String> {
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf {
            read_pdf(path)
        } else {
            Ok(fs::read_to_string(path)?)
        }
    }
}

/// Loads every path on tokio's blocking pool and returns the texts in order.
pub async fn load_all(loader: Arc<dyn DocumentLoader>, paths: Vec<PathBuf>) -> Result<Vec<String>> {
    task::spawn_blocking(move || paths.iter().map(|path| loader.load(path)).collect()).await?
}

impl<F> DocumentLoader for F
where
    F: Fn(&Path) -> Result<String> + Send + Sync,
{
    fn load(&self, path: &Path) -> Result<String> {
        self(path)
    }
}
