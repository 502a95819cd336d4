//! Cache pre-generation.
//!
//! Walks the images directory and pushes every source through the
//! [`Dispatcher`] at each requested size, exactly as if the URL had been
//! requested over HTTP. Entries that already exist count as cached; the
//! rest are rendered and published.
//!
//! The cache directory itself is skipped, as is anything without a
//! supported image extension.
//!
//! ## Parallel Processing
//!
//! Jobs run on the global [rayon](https://docs.rs/rayon) pool; `main`
//! sizes it from `thumbnails.max_parallel`. A failure on one source is
//! reported and does not stop the others.

use crate::cache::CacheStats;
use crate::dispatch::{Disposition, Dispatcher, Outcome};
use crate::imaging::{ImageBackend, is_supported};
use crate::size::TargetBox;
use rayon::prelude::*;
use std::path::Path;
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum WarmError {
    #[error("cannot walk images directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Progress for a single (source, size) job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarmEvent {
    Done {
        path: String,
        size: TargetBox,
        status: EntryStatus,
    },
    Failed {
        path: String,
        size: TargetBox,
        error: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Cached,
    Generated,
}

#[derive(Debug, Default)]
pub struct WarmResult {
    pub stats: CacheStats,
    pub failures: usize,
}

/// Request paths (`/images/...`) of every supported source under the images
/// directory, sorted.
pub fn find_sources(
    web_root: &Path,
    images_dir: &Path,
    cache_dir: &Path,
) -> Result<Vec<String>, WarmError> {
    let mut paths = Vec::new();
    let walker = WalkDir::new(images_dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.path() != cache_dir);

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_supported(entry.path()) {
            continue;
        }
        if let Some(path) = request_path(web_root, entry.path()) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// `/a/b.jpg` for `<web_root>/a/b.jpg`, escaping `%`. `None` for non-UTF-8 names.
fn request_path(web_root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(web_root).ok()?;
    let mut out = String::new();
    for component in relative.components() {
        out.push('/');
        out.push_str(&component.as_os_str().to_str()?.replace('%', "%25"));
    }
    Some(out)
}

/// Generate every missing cache entry for `sizes`.
pub fn warm<B: ImageBackend>(
    dispatcher: &Dispatcher<B>,
    sizes: &[TargetBox],
    progress: Option<Sender<WarmEvent>>,
) -> Result<WarmResult, WarmError> {
    let resolver = dispatcher.resolver();
    let sources = find_sources(
        resolver.web_root(),
        &resolver.images_dir(),
        resolver.cache_dir(),
    )?;

    let jobs: Vec<(&str, TargetBox)> = sources
        .iter()
        .flat_map(|path| sizes.iter().map(move |size| (path.as_str(), *size)))
        .collect();

    let events: Vec<WarmEvent> = jobs
        .par_iter()
        .map(|&(path, size)| {
            let event = run_job(dispatcher, path, size);
            if let Some(tx) = &progress {
                tx.send(event.clone()).ok();
            }
            event
        })
        .collect();

    let mut result = WarmResult::default();
    for event in events {
        match event {
            WarmEvent::Done {
                status: EntryStatus::Cached,
                ..
            } => result.stats.hit(),
            WarmEvent::Done {
                status: EntryStatus::Generated,
                ..
            } => result.stats.miss(),
            WarmEvent::Failed { .. } => result.failures += 1,
        }
    }
    Ok(result)
}

fn run_job<B: ImageBackend>(dispatcher: &Dispatcher<B>, path: &str, size: TargetBox) -> WarmEvent {
    let token = size.to_string();
    let failed = |error: String| WarmEvent::Failed {
        path: path.to_string(),
        size,
        error,
    };

    match dispatcher.dispatch(path, Some(&token)) {
        Ok(Outcome::Image { disposition, .. }) => WarmEvent::Done {
            path: path.to_string(),
            size,
            status: if disposition == Disposition::CacheHit {
                EntryStatus::Cached
            } else {
                EntryStatus::Generated
            },
        },
        Ok(Outcome::Passthrough(d)) => failed(format!("not served ({d})")),
        Err(e) => failed(e.to_string()),
    }
}
