//! PDF → preview image conversion. Rendering itself is delegated to poppler's `pdftoppm`.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Not a PDF document")]
    NotPdf,

    #[error("I/O error during conversion: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdftoppm exited with {status}: {stderr}")]
    Renderer { status: String, stderr: String },
}

/// Renders the first page of a PDF to PNG bytes.
#[async_trait]
pub trait PreviewRenderer: Send + Sync {
    async fn render(&self, pdf: &[u8]) -> Result<Bytes, ConvertError>;
}

const PDF_MAGIC: &[u8] = b"%PDF-";
const RENDER_DPI: &str = "150";

pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

pub struct PdftoppmRenderer {
    binary: String,
}

impl PdftoppmRenderer {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl PreviewRenderer for PdftoppmRenderer {
    async fn render(&self, pdf: &[u8]) -> Result<Bytes, ConvertError> {
        if !looks_like_pdf(pdf) {
            return Err(ConvertError::NotPdf);
        }

        let dir = tempfile::tempdir()?;
        let input = dir.path().join("input.pdf");
        let prefix = dir.path().join("page");
        tokio::fs::write(&input, pdf).await?;

        let output = Command::new(&self.binary)
            .arg("-png")
            .args(["-f", "1", "-l", "1", "-singlefile"])
            .args(["-r", RENDER_DPI])
            .arg(&input)
            .arg(&prefix)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ConvertError::Renderer {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let png = tokio::fs::read(prefix.with_extension("png")).await?;
        debug!("Rendered preview: {} bytes", png.len());
        Ok(Bytes::from(png))
    }
}
