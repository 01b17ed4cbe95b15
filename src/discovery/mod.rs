//! Candidate discovery passes.
//!
//! Three independent angles surface work for the measurement stage:
//!
//! 1. **Structural** — [`resources`] walks the parsed document for sub-resource
//!    references (images, stylesheets, scripts, fonts, media, frames, style
//!    imports).
//! 2. **Heuristic** — [`script_api`] scans script text for URL-shaped literals
//!    and [`url_patterns`] re-scans extracted resource URLs for API-shaped
//!    paths. Each is blind to what the other surfaces; dedup happens at
//!    insertion.
//! 3. **Speculative** — [`probe`] requests well-known relative paths that may
//!    never be referenced anywhere in the page.

pub mod probe;
pub mod resources;
pub mod script_api;
pub mod url_patterns;
