//! Shared helpers.
//!
//! - **URL validation**: SSRF guards for fetched URLs and a scheme check for
//!   links opened in the browser
//! - **Text processing**: HTML stripping, entity decoding, width-aware
//!   truncation and relative dates for terminal output
//!
//! ```
//! use newsdesk::util::{strip_html, truncate_to_width, validate_url};
//!
//! let url = validate_url("https://example.com/feed.xml").unwrap();
//! assert_eq!(url.host_str(), Some("example.com"));
//!
//! assert_eq!(strip_html("<p>Breaking <b>news</b></p>"), "Breaking news");
//! assert_eq!(truncate_to_width("Long article title", 10), "Long ar...");
//! ```

mod text;
mod url_validator;

pub use text::{
    collapse_whitespace, decode_entities, display_width, format_relative, strip_control_chars,
    strip_html, truncate_chars, truncate_to_width, wrap_to_width,
};
pub use url_validator::{validate_url, validate_url_for_open, UrlValidationError};
