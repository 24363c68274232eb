//! Archive packagers. Consume a chapter's downloaded image directory and
//! write one artifact: a CBZ (zip of the images, verbatim) or a PDF (one
//! page per image, page sized to the image's pixel dimensions).

use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use printpdf::image_crate::codecs::jpeg::JpegDecoder;
use printpdf::{Image, ImageTransform, Mm, PdfDocument};

/// DPI used both for page sizing and image placement, so each PDF page
/// matches its source image's pixel dimensions exactly.
const EMBED_DPI: f32 = 300.0;

/// Output artifact format, chosen once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Zip-compatible image bundle.
    Cbz,
    /// Paginated document, one image per page at native resolution.
    Pdf,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Cbz => "cbz",
            OutputFormat::Pdf => "pdf",
        }
    }
}

/// Errors from the archive writers.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("No images to package in {dir}.")]
    NoImages { dir: PathBuf },

    #[error("Failed to create archive file: {path}: {source}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read image: {path}: {source}")]
    ReadImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Failed to compose PDF: {0}")]
    Pdf(String),
}

impl From<std::io::Error> for ArchiveError {
    fn from(e: std::io::Error) -> Self {
        ArchiveError::Zip(zip::result::ZipError::Io(e))
    }
}

/// Collect the chapter's `.jpg` files sorted by filename. Image filenames
/// carry a zero-padded index, so filename order equals download order.
fn sorted_image_files(dir: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ArchiveError::ReadImage {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().map(|e| e == "jpg").unwrap_or(false))
        .collect();
    files.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));
    Ok(files)
}

/// Bundle a chapter's images into a zip-compatible archive, verbatim.
///
/// Entry order equals filename order equals download order; no re-encoding.
pub fn write_cbz(images_dir: &Path, artifact: &Path) -> Result<(), ArchiveError> {
    let files = sorted_image_files(images_dir)?;
    if files.is_empty() {
        return Err(ArchiveError::NoImages {
            dir: images_dir.to_path_buf(),
        });
    }

    let file = File::create(artifact).map_err(|e| ArchiveError::CreateFile {
        path: artifact.to_path_buf(),
        source: e,
    })?;
    let mut zip = ZipWriter::new(file);
    // JPEG data is already compressed; store it as-is.
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o644);

    for path in &files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let data = std::fs::read(path).map_err(|e| ArchiveError::ReadImage {
            path: path.clone(),
            source: e,
        })?;
        zip.start_file(name, options)?;
        zip.write_all(&data)?;
    }

    zip.finish()?;
    Ok(())
}

/// Compose a chapter's images into a PDF, one page per image.
///
/// Images are taken in filename order; each page is sized to its source
/// image's pixel dimensions at the embed DPI, so nothing is scaled or
/// letterboxed.
pub fn write_pdf(images_dir: &Path, title: &str, artifact: &Path) -> Result<(), ArchiveError> {
    let files = sorted_image_files(images_dir)?;
    if files.is_empty() {
        return Err(ArchiveError::NoImages {
            dir: images_dir.to_path_buf(),
        });
    }

    let doc = PdfDocument::empty(title);
    for path in &files {
        let data = std::fs::read(path).map_err(|e| ArchiveError::ReadImage {
            path: path.clone(),
            source: e,
        })?;
        let decoder = JpegDecoder::new(Cursor::new(&data))
            .map_err(|e| ArchiveError::Pdf(format!("{}: {}", path.display(), e)))?;
        let image = Image::try_from(decoder)
            .map_err(|e| ArchiveError::Pdf(format!("{}: {}", path.display(), e)))?;

        let width = Mm::from(image.image.width.into_pt(EMBED_DPI));
        let height = Mm::from(image.image.height.into_pt(EMBED_DPI));
        let (page, layer) = doc.add_page(width, height, "image");
        image.add_to_layer(
            doc.get_page(page).get_layer(layer),
            ImageTransform {
                dpi: Some(EMBED_DPI),
                ..Default::default()
            },
        );
    }

    let file = File::create(artifact).map_err(|e| ArchiveError::CreateFile {
        path: artifact.to_path_buf(),
        source: e,
    })?;
    let mut writer = BufWriter::new(file);
    doc.save(&mut writer)
        .map_err(|e| ArchiveError::Pdf(e.to_string()))?;
    Ok(())
}

/// Write the chapter artifact in the requested format.
pub fn package_chapter(
    format: OutputFormat,
    images_dir: &Path,
    title: &str,
    artifact: &Path,
) -> Result<(), ArchiveError> {
    match format {
        OutputFormat::Cbz => write_cbz(images_dir, artifact),
        OutputFormat::Pdf => write_pdf(images_dir, title, artifact),
    }
}
