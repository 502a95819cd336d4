//! # Simple Thumbs
//!
//! An on-demand thumbnail server. Put images under `<web_root>/images/`,
//! request `/images/photo.jpg?size=200x100`, and get the photo scaled to fit
//! a 200×100 box, centered and padded with the background color. The result
//! is cached on disk; the next identical request is a file read.
//!
//! Everything that is not an image request falls through to a plain static
//! file server over the web root.
//!
//! # Request Flow
//!
//! ```text
//! GET /images/trips/beach.png?size=300x200
//!   │
//!   ├─ outside /images/, or not an image ─────────► static files (passthrough)
//!   ├─ bad size / path escapes web root ──────────► 400 problem+json
//!   ├─ no such source ────────────────────────────► static files (→ 404)
//!   ├─ size=full ─────────────────────────────────► source bytes
//!   ├─ images/_thumbs/beach_300x200.png exists ───► cached bytes
//!   └─ otherwise ── render, publish atomically ───► new bytes
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`size`] | Parses the `size` query token into a target box or "full" |
//! | [`paths`] | Sandboxed request-path resolution and cache path derivation |
//! | [`imaging`] | Fit-and-pad math, the image backend trait, and the `image`-crate backend |
//! | [`cache`] | Flat on-disk cache with atomic publish |
//! | [`dispatch`] | Classifies a request and produces its bytes |
//! | [`server`] | axum middleware, static fallback, problem+json errors |
//! | [`warm`] | Pre-generates cache entries for every source image |
//! | [`config`] | `config.toml` loading, validation, and merging over stock defaults |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Fit and Pad, Never Crop
//!
//! Every thumbnail has exactly the requested dimensions. The source is scaled
//! uniformly until it touches the box on one axis (upscaling small sources
//! too) and the rest is filled with the background color. Nothing is cut off,
//! and a grid of thumbnails lines up without CSS tricks.
//!
//! ## The File Name Is the Cache Key
//!
//! A thumbnail lives at `<cache_dir>/<stem>_<w>x<h><ext>`. There is no
//! manifest to load, corrupt, or keep in sync. The trade-off is that the key
//! knows nothing else: a replaced source, a new background color, or a
//! different quality setting does not refresh entries already on disk, and
//! `a/photo.jpg` and `b/photo.jpg` share a slot. Clear the cache directory
//! by hand after such changes.
//!
//! ## Same Format In, Same Format Out
//!
//! A PNG source yields a PNG thumbnail, a JPEG a JPEG. The configured quality
//! only affects lossy encoders.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, resampling (Catmull-Rom), compositing, and encoding all go
//! through the `image` crate. No ImageMagick, no system libraries: the binary
//! is self-contained.

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod imaging;
pub mod output;
pub mod paths;
pub mod server;
pub mod size;
pub mod warm;
