//! Best-effort PDF page scanner
//!
//! Pattern matching over raw bytes, enough to size imported template
//! pages. No cross-reference tables, object streams or compression are
//! interpreted; compressed page trees fall back to a single A4 page.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

const POINTS_PER_MM: f64 = 72.0 / 25.4;

static PAGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // `\b` keeps `/Type /Pages` from matching
    Regex::new(r"/Type\s*/Page\b").expect("valid page pattern")
});

static OBJECT_END_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bendobj\b").expect("valid endobj pattern"));

static MEDIA_BOX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"/MediaBox\s*\[\s*(-?[0-9]*\.?[0-9]+)\s+(-?[0-9]*\.?[0-9]+)\s+(-?[0-9]*\.?[0-9]+)\s+(-?[0-9]*\.?[0-9]+)\s*\]",
    )
    .expect("valid MediaBox pattern")
});

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a PDF file")]
    NotPdf,

    #[error("page {page} out of range (document has {count} pages)")]
    PageOutOfRange { page: usize, count: usize },
}

/// Page geometry in PDF points (1/72 inch)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub width: f64,
    pub height: f64,
}

impl PageBox {
    /// ISO A4, used when a document declares no MediaBox
    pub const A4: PageBox = PageBox {
        width: 595.28,
        height: 841.89,
    };

    pub fn width_mm(&self) -> f64 {
        self.width / POINTS_PER_MM
    }

    pub fn height_mm(&self) -> f64 {
        self.height / POINTS_PER_MM
    }

    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }
}

/// Scanned page count and page boxes of one PDF source
#[derive(Debug, Clone, Default)]
pub struct PdfScanner {
    page_count: usize,
    /// Each page's own MediaBox, in file order
    page_boxes: Vec<Option<PageBox>>,
    /// First MediaBox found outside a single page object, e.g. on `/Pages`
    inherited_box: Option<PageBox>,
}

impl PdfScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan the file at `path` and return its page count
    pub fn open_source(&mut self, path: impl AsRef<Path>) -> Result<usize, PdfError> {
        let bytes = std::fs::read(path.as_ref())?;
        *self = Self::from_bytes(&bytes)?;
        debug!(
            path = %path.as_ref().display(),
            pages = self.page_count,
            "scanned PDF source"
        );
        Ok(self.page_count)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PdfError> {
        if !bytes.starts_with(b"%PDF-") {
            return Err(PdfError::NotPdf);
        }
        let text = String::from_utf8_lossy(bytes);

        let mut page_boxes = Vec::new();
        let mut inherited_box = None;
        for object in OBJECT_END_PATTERN.split(&text) {
            let pages = PAGE_PATTERN.find_iter(object).count();
            let declared = media_box(object);
            if pages == 1 {
                page_boxes.push(declared);
            } else {
                // A page tree node, or several pages that cannot be told apart
                page_boxes.extend(std::iter::repeat_n(None, pages));
                inherited_box = inherited_box.or(declared);
            }
        }

        Ok(Self {
            page_count: page_boxes.len().max(1),
            page_boxes,
            inherited_box,
        })
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Geometry of page `page_no`, counted from 1.
    ///
    /// A page's own MediaBox wins. Pages without one take the box declared
    /// on the page tree, and A4 is used when there is none.
    pub fn page_box(&self, page_no: usize) -> Result<PageBox, PdfError> {
        if page_no == 0 || page_no > self.page_count {
            return Err(PdfError::PageOutOfRange {
                page: page_no,
                count: self.page_count,
            });
        }
        Ok(self
            .page_boxes
            .get(page_no - 1)
            .copied()
            .flatten()
            .or(self.inherited_box)
            .unwrap_or(PageBox::A4))
    }
}

/// First usable MediaBox in `object`
fn media_box(object: &str) -> Option<PageBox> {
    MEDIA_BOX_PATTERN
        .captures_iter(object)
        .filter_map(|caps| {
            let value = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<f64>().ok());
            let (x1, y1, x2, y2) = (value(1)?, value(2)?, value(3)?, value(4)?);
            Some(PageBox {
                width: (x2 - x1).abs(),
                height: (y2 - y1).abs(),
            })
        })
        .find(|page_box| page_box.width > 0.0 && page_box.height > 0.0)
}
