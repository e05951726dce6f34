//! Parsed note documents handed over by the note parser

use serde::{Deserialize, Serialize};

/// 1-based page number
pub type PageIndex = usize;

/// One decoded page.
///
/// The bitmap is 8-bit grayscale, row-major, `width * height` bytes of the
/// owning document's geometry. The parser guarantees nothing beyond that, so
/// renderers validate the length themselves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub number: PageIndex,
    /// Recognized handwriting, if the device produced any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(with = "base64_bytes")]
    pub bitmap: Vec<u8>,
}

impl Page {
    #[must_use]
    pub fn new(number: PageIndex, bitmap: Vec<u8>) -> Self {
        Self {
            number,
            text: None,
            bitmap,
        }
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("document JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("page at position {position} is numbered {found}, expected {expected}")]
    PageNumber {
        position: usize,
        expected: PageIndex,
        found: PageIndex,
    },
}

/// Immutable in-memory note document.
///
/// `pages[i].number` is `i + 1`; [`Document::try_new`] and
/// [`Document::from_json`] enforce it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Page width in pixels
    pub width: u32,
    /// Page height in pixels
    pub height: u32,
    pub pages: Vec<Page>,
}

impl Document {
    /// Build without checking page numbering
    #[must_use]
    pub fn new(width: u32, height: u32, pages: Vec<Page>) -> Self {
        Self {
            width,
            height,
            pages,
        }
    }

    /// Build, rejecting pages whose number is out of step with their position
    pub fn try_new(width: u32, height: u32, pages: Vec<Page>) -> Result<Self, DocumentError> {
        let doc = Self::new(width, height, pages);
        doc.validate()?;
        Ok(doc)
    }

    /// Parse the JSON interchange form produced by the note parser
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let doc: Self = serde_json::from_str(json)?;
        doc.validate()?;
        Ok(doc)
    }

    /// Check that pages are numbered 1..=N in order
    pub fn validate(&self) -> Result<(), DocumentError> {
        for (position, page) in self.pages.iter().enumerate() {
            if page.number != position + 1 {
                return Err(DocumentError::PageNumber {
                    position,
                    expected: position + 1,
                    found: page.number,
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Look up a page by its 1-based number.
    ///
    /// `None` when the page at that position carries a different number.
    #[must_use]
    pub fn page(&self, number: PageIndex) -> Option<&Page> {
        number
            .checked_sub(1)
            .and_then(|idx| self.pages.get(idx))
            .filter(|page| page.number == number)
    }

    /// Every page number in document order
    #[must_use]
    pub fn all_page_indices(&self) -> Vec<PageIndex> {
        (1..=self.page_count()).collect()
    }

    /// Expected bitmap length for one page
    #[must_use]
    pub fn bitmap_len(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
