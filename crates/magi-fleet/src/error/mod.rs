//! Fleet error type.

use thiserror::Error;

use crate::ids::{BrowserId, PageId};
use crate::surface::SurfaceError;

/// Errors from fleet store and supervisor operations.
#[derive(Debug, Error)]
pub enum FleetError {
    /// The referenced browser does not exist.
    #[error("browser not found: {0}")]
    BrowserNotFound(BrowserId),

    /// The referenced page does not exist.
    #[error("page not found: {0}")]
    PageNotFound(PageId),

    /// The page exists but belongs to a different browser.
    #[error("page {page} does not belong to browser {browser}")]
    PageNotInBrowser {
        /// The page that was addressed.
        page: PageId,
        /// The browser it was addressed through.
        browser: BrowserId,
    },

    /// The embedded engine refused or failed an operation.
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

#[cfg(test)]
mod tests;
