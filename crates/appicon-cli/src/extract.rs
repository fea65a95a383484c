use std::{
    collections::{HashMap, HashSet},
    ffi::OsStr,
    os::unix::ffi::OsStrExt,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use appicon_core::{get_icon, try_get_icon, AppImageThumbnailer, Settings};
use appicon_utils::fs::ensure_dir_exists;
use nu_ansi_term::Color::{Green, Red, Yellow};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{
    error::Result,
    inflight::{canonical_key, InFlight},
    utils::{icon_file_name, write_icon, Colored},
};

#[derive(Serialize)]
struct Extracted<'a> {
    source: &'a Path,
    output: PathBuf,
    format: &'static str,
    size: usize,
}

/// Writes the icon of `path`. Returns whether one was written.
pub fn extract_icon(
    path: &Path,
    output: Option<&Path>,
    settings: &Settings,
    json: bool,
) -> Result<bool> {
    let icon = match try_get_icon(path, settings) {
        Ok(icon) => icon,
        Err(err) => {
            error!("{} {}: {}", Colored(Red, "No icon in"), path.display(), err);
            return Ok(false);
        }
    };

    let written = write_icon(path, &icon, output)?;
    if json {
        let record = Extracted {
            source: path,
            output: written,
            format: icon.extension(),
            size: icon.data.len(),
        };
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(true)
}

pub fn make_thumbnail(
    path: &Path,
    output: Option<&Path>,
    settings: Settings,
    json: bool,
) -> Result<bool> {
    let mut thumbnailer = AppImageThumbnailer::new(settings);
    let icon = match thumbnailer.try_make_thumbnail(path) {
        Ok(icon) => icon,
        Err(err) => {
            error!("{} {}: {}", Colored(Red, "No thumbnail for"), path.display(), err);
            return Ok(false);
        }
    };

    let written = write_icon(path, &icon, output)?;
    if json {
        let record = Extracted {
            source: path,
            output: written,
            format: icon.extension(),
            size: icon.data.len(),
        };
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(true)
}

/// One batch entry. `suffix` is set when another entry shares the file stem,
/// so the two output names stay apart.
#[derive(Debug)]
struct Job<'a> {
    source: &'a Path,
    suffix: Option<String>,
}

/// Drops repeated paths (by canonical path, first spelling wins) and gives
/// every entry whose stem is shared a short hash of its canonical path.
fn plan_jobs(paths: &[PathBuf]) -> Vec<Job<'_>> {
    let mut seen = HashSet::new();
    let unique: Vec<(&Path, PathBuf)> = paths
        .iter()
        .filter_map(|path| {
            let key = canonical_key(path);
            seen.insert(key.clone()).then_some((path.as_path(), key))
        })
        .collect();

    let stem = |path: &Path| path.file_stem().unwrap_or_default().to_os_string();
    let mut stems: HashMap<_, usize> = HashMap::new();
    for &(source, _) in &unique {
        *stems.entry(stem(source)).or_default() += 1;
    }

    unique
        .into_iter()
        .map(|(source, key)| {
            let shared = stems.get(&stem(source)).is_some_and(|&count| count > 1);
            let suffix = shared.then(|| short_hash(key.as_os_str()));
            Job {
                source,
                suffix,
            }
        })
        .collect()
}

fn short_hash(key: &OsStr) -> String {
    blake3::hash(key.as_bytes()).to_hex()[..8].to_string()
}

/// Extracts icons for every path on a worker pool. Returns the number of
/// icons written.
pub fn batch_extract(
    paths: &[PathBuf],
    output_dir: Option<&Path>,
    jobs: Option<usize>,
    settings: &Settings,
    json: bool,
) -> Result<usize> {
    let output_dir = output_dir.unwrap_or(Path::new("."));
    ensure_dir_exists(output_dir)?;

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(jobs) = jobs {
        builder = builder.num_threads(jobs);
    }
    let pool = builder.build()?;

    let planned = plan_jobs(paths);
    if planned.len() < paths.len() {
        debug!(
            skipped = paths.len() - planned.len(),
            "dropped repeated paths"
        );
    }

    let inflight = InFlight::new();
    let written = AtomicUsize::new(0);

    pool.install(|| {
        planned.par_iter().for_each(|job| {
            let path = job.source;
            let Some(_guard) = inflight.try_begin(path) else {
                debug!(path = %path.display(), "already being fetched, skipping");
                return;
            };

            let Some(icon) = get_icon(path, settings) else {
                warn!("{} {}", Colored(Yellow, "No icon in"), path.display());
                return;
            };

            let target = match icon_file_name(
                path,
                job.suffix.as_deref(),
                icon.extension(),
                output_dir,
            ) {
                Ok(target) => target,
                Err(err) => {
                    error!("{err}");
                    return;
                }
            };
            match write_icon(path, &icon, Some(&target)) {
                Ok(target) => {
                    written.fetch_add(1, Ordering::Relaxed);
                    if json {
                        let record = Extracted {
                            source: path,
                            output: target,
                            format: icon.extension(),
                            size: icon.data.len(),
                        };
                        if let Ok(line) = serde_json::to_string(&record) {
                            println!("{line}");
                        }
                    }
                }
                Err(err) => error!("{err}"),
            }
        });
    });

    let written = written.into_inner();
    info!(
        "{} {written} of {} icons",
        Colored(Green, "Extracted"),
        paths.len()
    );
    Ok(written)
}
