//! PDF harvesting from a web page.
//!
//! Fetches one HTML page, collects every link to a `.pdf` file and downloads
//! the files one after another into a local folder, which can then be
//! indexed. Files already present are left alone, so a run can be repeated
//! after a partial failure.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use percent_encoding::percent_decode_str;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Default download folder.
pub const DEFAULT_OUTPUT_DIR: &str = "downloaded_pdfs";

const FALLBACK_FILE_NAME: &str = "document.pdf";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Errors raised while harvesting.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// The request could not be sent or its body read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// Status code received.
        status: u16,
    },

    /// The page URL is malformed or not http(s).
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// A file could not be written.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A download that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestFailure {
    /// The PDF link.
    pub url: Url,
    /// What went wrong.
    pub error: String,
}

/// Outcome of one harvesting run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestReport {
    /// Number of distinct PDF links on the page.
    pub found: usize,
    /// Files written by this run.
    pub downloaded: Vec<PathBuf>,
    /// Files that already existed.
    pub skipped: Vec<PathBuf>,
    /// Links that could not be downloaded.
    pub failed: Vec<HarvestFailure>,
}

/// Every link in `html` pointing at a `.pdf` file, resolved against `base`.
///
/// The extension check ignores case; duplicates (after dropping fragments)
/// are removed while keeping document order.
#[must_use]
pub fn extract_pdf_links(html: &str, base: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Ok(mut url) = base.join(href.trim()) else {
            debug!(href, "skipping unparsable link");
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") {
            continue;
        }
        if !url.path().to_ascii_lowercase().ends_with(".pdf") {
            continue;
        }
        url.set_fragment(None);
        if seen.insert(url.clone()) {
            links.push(url);
        }
    }
    links
}

/// Local file name for a PDF link.
///
/// Uses the percent-decoded last path segment with path separators replaced,
/// or `document.pdf` when nothing usable remains.
#[must_use]
pub fn file_name_for(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .unwrap_or_default();

    let name: String = percent_decode_str(segment)
        .decode_utf8_lossy()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();
    let name = name.trim();

    if name.is_empty() || name == "." || name == ".." {
        FALLBACK_FILE_NAME.to_string()
    } else {
        name.to_string()
    }
}

/// Downloads the PDFs linked from a page.
#[derive(Debug, Clone)]
pub struct PdfHarvester {
    client: reqwest::Client,
    output_dir: PathBuf,
}

impl PdfHarvester {
    /// Create a harvester writing into `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self, HarvestError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self::with_client(client, output_dir))
    }

    /// Create a harvester around an existing HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            output_dir: output_dir.into(),
        }
    }

    /// Folder the PDFs are written to.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Fetch `page_url` and download every PDF it links to.
    ///
    /// # Errors
    ///
    /// Fails only when the page itself cannot be fetched or the output folder
    /// cannot be created; individual downloads are reported in
    /// [`HarvestReport::failed`].
    #[instrument(skip(self), fields(out = %self.output_dir.display()))]
    pub async fn harvest(&self, page_url: &str) -> Result<HarvestReport, HarvestError> {
        let page = Url::parse(page_url)
            .map_err(|e| HarvestError::InvalidUrl(format!("{page_url}: {e}")))?;
        if !matches!(page.scheme(), "http" | "https") {
            return Err(HarvestError::InvalidUrl(format!(
                "{page_url}: only http and https are supported"
            )));
        }

        let html = self.fetch(&page).await?.text().await?;
        let links = extract_pdf_links(&html, &page);
        info!(count = links.len(), "found PDF links");

        tokio::fs::create_dir_all(&self.output_dir).await?;

        let mut report = HarvestReport {
            found: links.len(),
            ..HarvestReport::default()
        };
        for link in links {
            let path = self.output_dir.join(file_name_for(&link));
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                debug!(path = %path.display(), "already downloaded");
                report.skipped.push(path);
                continue;
            }

            match self.download(&link, &path).await {
                Ok(bytes) => {
                    info!(path = %path.display(), bytes, "downloaded");
                    report.downloaded.push(path);
                }
                Err(e) => {
                    warn!(url = %link, error = %e, "download failed");
                    report.failed.push(HarvestFailure {
                        url: link,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    async fn fetch(&self, url: &Url) -> Result<reqwest::Response, HarvestError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    /// Write the body of `url` to `path` through a `.part` file.
    async fn download(&self, url: &Url, path: &Path) -> Result<usize, HarvestError> {
        let bytes = self.fetch(url).await?.bytes().await?;
        let part = path.with_extension("pdf.part");
        tokio::fs::write(&part, &bytes).await?;
        tokio::fs::rename(&part, path).await?;
        Ok(bytes.len())
    }
}
