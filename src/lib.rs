//! ansa-news: ANSA front-page headlines via headless Chrome
//!
//! Commands:
//! - serve: JSON API (`/health`, `/news`)
//! - fetch: One-shot extraction printed to stdout

pub mod browser;
pub mod classify;
pub mod deadline;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod schema;
pub mod server;
pub mod site;

pub use browser::{ChromeRenderer, PageRenderer, RenderOptions, RenderedPage};
pub use error::{ClassifiedError, ErrorKind, RenderError};
pub use fetch::{fetch_and_extract, FetchSettings, NewsRequest, Timeouts};
pub use schema::{Article, NewsEnvelope};
pub use site::SiteProfile;
