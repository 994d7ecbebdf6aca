/// Crawl action definitions
///
/// Every queued task requests exactly one of these actions. The set is
/// closed: a task whose action code is not listed here is never eligible
/// for selection.
use std::fmt;

/// The action a worker applies to a fetched URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Store the raw response bytes as a file
    DownloadFile,

    /// Store the rendered page text
    StorePageText,

    /// Render the page to a PDF
    PageToPdf,
}

impl ActionKind {
    /// Converts the action to its database code
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::DownloadFile => "download_file",
            Self::StorePageText => "store_page_text",
            Self::PageToPdf => "page_to_pdf",
        }
    }

    /// Parses an action from its database code
    ///
    /// Returns None if the code doesn't match any known action.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "download_file" => Some(Self::DownloadFile),
            "store_page_text" => Some(Self::StorePageText),
            "page_to_pdf" => Some(Self::PageToPdf),
            _ => None,
        }
    }

    /// Human-readable description, used when seeding the reference table
    pub fn description(&self) -> &'static str {
        match self {
            Self::DownloadFile => "store the raw response bytes",
            Self::StorePageText => "store the rendered page text",
            Self::PageToPdf => "render the page to a PDF",
        }
    }

    /// Returns all supported actions
    pub fn all() -> Vec<Self> {
        vec![Self::DownloadFile, Self::StorePageText, Self::PageToPdf]
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
