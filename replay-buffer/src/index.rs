use anyhow::{Context, Result};
use log::info;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const ARCHIVE_EXTENSIONS: [&str; 3] = ["data", "gz", "bin"];

/// The archive files found under a games directory, newest first.
pub struct ArchiveIndex {
    files: Vec<(PathBuf, SystemTime)>,
    games_dir: PathBuf,
}

impl ArchiveIndex {
    pub fn new(games_dir: PathBuf) -> Result<Self> {
        let mut _self = Self {
            files: vec![],
            games_dir,
        };

        _self.re_index()?;

        Ok(_self)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn re_index(&mut self) -> Result<()> {
        let mut files = get_archive_files(&self.games_dir)
            .with_context(|| format!("Failed to index {:?}", self.games_dir))?;

        files.sort_by(|(a_path, a), (b_path, b)| b.cmp(a).then_with(|| a_path.cmp(b_path)));

        info!("Indexed {} archives in {:?}", files.len(), self.games_dir);

        self.files = files;

        Ok(())
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Path> + '_ {
        self.files.iter().map(|(p, _)| p.as_path())
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.iter().map(Path::to_path_buf).collect()
    }
}

/// Sources read by `worker` out of `workers`. With at least one source per worker the
/// sources are dealt out round-robin; otherwise every worker reads all of them.
pub fn partition(sources: &[PathBuf], worker: usize, workers: usize) -> Vec<PathBuf> {
    if sources.len() < workers {
        return sources.to_vec();
    }

    sources
        .iter()
        .skip(worker)
        .step_by(workers)
        .cloned()
        .collect()
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy())
        .is_some_and(|ext| ARCHIVE_EXTENSIONS.contains(&&*ext))
}

fn get_archive_files(games_dir: &Path) -> Result<Vec<(PathBuf, SystemTime)>> {
    let mut files = vec![];

    for entry in games_dir.read_dir()?.flatten() {
        if entry.file_type()?.is_dir() {
            let archives_in_dir = get_archive_files(&entry.path())?;
            files.extend(archives_in_dir);
        } else if is_archive(&entry.path()) {
            let metadata = entry.metadata()?;
            let created = metadata.created().or_else(|_| metadata.modified())?;
            files.push((entry.path(), created));
        }
    }

    Ok(files)
}
