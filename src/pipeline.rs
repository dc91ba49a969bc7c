use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::ConvertError;
use crate::extract::{self, ExtractedFields};
use crate::kml::{self, RawPlacemark};
use crate::node::{self, OutputNode};
use crate::osm;

const CHUNK_SIZE: usize = 500;

/// Counters for one run, printed at the end.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub files: usize,
    pub seen: usize,
    pub with_description: usize,
    pub no_coordinates: usize,
    pub out_of_region: usize,
    pub kept: usize,
    /// Ids of the first and last emitted node.
    pub first_id: Option<i64>,
    pub last_id: Option<i64>,
}

impl RunSummary {
    pub fn print(&self) {
        println!(
            "Read {} placemarks from {} files ({} with description).",
            self.seen, self.files, self.with_description
        );
        println!(
            "Dropped {} without coordinates, {} outside the region.",
            self.no_coordinates, self.out_of_region
        );
        match (self.first_id, self.last_id) {
            (Some(first), Some(last)) => {
                println!("Wrote {} nodes (ids {} .. {}).", self.kept, first, last)
            }
            _ => println!("Wrote {} nodes.", self.kept),
        }
    }
}

/// Files directly inside `dir` with the given extension (case-insensitive), sorted by path.
pub fn discover_inputs(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let extension = extension.trim_start_matches('.');
    let entries = std::fs::read_dir(dir).map_err(|source| ConvertError::Read {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if matches && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    if paths.is_empty() {
        return Err(ConvertError::NoInputs {
            dir: dir.to_path_buf(),
            extension: extension.to_string(),
        }
        .into());
    }
    info!(dir = %dir.display(), files = paths.len(), "found input files");
    Ok(paths)
}

/// Read every input file in encounter order. Any unreadable file aborts the run.
pub fn load_placemarks(paths: &[PathBuf]) -> Result<Vec<RawPlacemark>> {
    let mut placemarks = Vec::new();
    for path in paths {
        let found = kml::read_kml_file(path)?;
        info!(file = %path.display(), placemarks = found.len(), "parsed");
        placemarks.extend(found);
    }
    Ok(placemarks)
}

/// Extract and validate every placemark, numbering emitted nodes from `settings.start_id` down.
pub fn build_nodes(placemarks: &[RawPlacemark], settings: &Settings) -> (Vec<OutputNode>, RunSummary) {
    let pb = ProgressBar::new(placemarks.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    let mut summary = RunSummary::default();
    let mut nodes = Vec::new();
    let mut next_id = settings.start_id;

    for chunk in placemarks.chunks(CHUNK_SIZE) {
        let extracted: Vec<ExtractedFields> = chunk.par_iter().map(extract::extract).collect();

        for fields in &extracted {
            summary.seen += 1;
            if fields.description.is_some() {
                summary.with_description += 1;
            }
            let Some(coords) = fields.coords else {
                summary.no_coordinates += 1;
                warn!(label = %fields.best_label(), "no coordinates found, dropped");
                continue;
            };
            match node::build_and_validate(fields, coords, next_id, settings) {
                Ok(node) => {
                    summary.first_id.get_or_insert(node.id);
                    summary.last_id = Some(node.id);
                    summary.kept += 1;
                    next_id -= 1;
                    nodes.push(node);
                }
                Err(reason) => {
                    summary.out_of_region += 1;
                    warn!("{reason}, dropped");
                }
            }
        }
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    (nodes, summary)
}

/// Whole run: scan `input_dir`, convert, write `output`.
pub fn convert(input_dir: &Path, output: &Path, settings: &Settings) -> Result<RunSummary> {
    settings.validate()?;
    let paths = discover_inputs(input_dir, &settings.input_extension)?;
    let placemarks = load_placemarks(&paths)?;
    println!("Converting {} placemarks from {} files...", placemarks.len(), paths.len());

    let (nodes, mut summary) = build_nodes(&placemarks, settings);
    summary.files = paths.len();

    osm::write_file(output, &nodes)?;
    info!(output = %output.display(), nodes = nodes.len(), "wrote OSM file");
    Ok(summary)
}
