//! CLI output formatting.
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and, where useful, a `print_*` wrapper that writes to stdout.
//! Format functions are pure: no I/O, no side effects.
//!
//! # Output Format
//!
//! ## Warm
//!
//! One line per (source, size) job, in completion order:
//!
//! ```text
//! /images/photo.jpg 128x128: generated
//! /images/trips/beach.png 128x128: cached
//! /images/broken.jpg 128x128: failed
//!     Error: cannot decode source image: ...
//! ```
//!
//! ## Resolve
//!
//! ```text
//! /images/photo.jpg?size=100x100
//!     Disposition: miss
//!     Source: public/images/photo.jpg
//!     Thumbnail: public/images/_thumbs/photo_100x100.jpg
//!     Size: 100x100
//! ```

use crate::dispatch::Decision;
use crate::warm::{EntryStatus, WarmEvent};

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

// ============================================================================
// Warm
// ============================================================================

/// Format a single warm progress event as display lines.
pub fn format_warm_event(event: &WarmEvent) -> Vec<String> {
    match event {
        WarmEvent::Done { path, size, status } => {
            let status_str = match status {
                EntryStatus::Cached => "cached",
                EntryStatus::Generated => "generated",
            };
            vec![format!("{} {}: {}", path, size, status_str)]
        }
        WarmEvent::Failed { path, size, error } => vec![
            format!("{} {}: failed", path, size),
            format!("{}Error: {}", indent(1), error),
        ],
    }
}

// ============================================================================
// Resolve
// ============================================================================

/// Format the classification of one request path.
pub fn format_resolve_output(path: &str, size: Option<&str>, decision: &Decision) -> Vec<String> {
    let mut lines = vec![match size {
        Some(s) => format!("{}?size={}", path, s),
        None => path.to_string(),
    }];
    lines.push(format!("{}Disposition: {}", indent(1), decision.disposition));

    if let Some(request) = &decision.request {
        lines.push(format!("{}Source: {}", indent(1), request.source_path.display()));
        if request.thumbnail_path != request.source_path {
            lines.push(format!(
                "{}Thumbnail: {}",
                indent(1),
                request.thumbnail_path.display()
            ));
        }
        let size = match request.target {
            Some(target) => target.to_string(),
            None => "full".to_string(),
        };
        lines.push(format!("{}Size: {}", indent(1), size));
    }
    lines
}

pub fn print_resolve_output(path: &str, size: Option<&str>, decision: &Decision) {
    for line in format_resolve_output(path, size, decision) {
        println!("{}", line);
    }
}
