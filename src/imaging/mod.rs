//! Image processing: pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Fit** | [`calculate_fit`] (pure arithmetic) |
//! | **Thumbnail** | `resize` (CatmullRom) + `overlay` onto a filled canvas |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{Placement, calculate_fit};
pub use operations::{ThumbnailConfig, create_thumbnail, get_dimensions, plan_thumbnail};
pub use params::{Background, Quality, ThumbnailParams};
pub use rust_backend::{RustBackend, is_supported};
