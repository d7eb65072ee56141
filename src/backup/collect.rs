use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Walks the configured include directories and produces the file list for
/// one backup run.
///
/// Exclude patterns are tested against the path relative to the project root
/// and against the bare file/dir name, so `*.tmp` excludes temp files at any
/// depth and `node_modules` excludes the directory wherever it appears.
/// Excluded directories are pruned before descent, not filtered afterwards.
pub struct FileCollector {
    project_root: PathBuf,
    include_directories: Vec<PathBuf>,
    exclude: GlobSet,
}

impl FileCollector {
    pub fn new<P: Into<PathBuf>>(
        project_root: P,
        include_directories: Vec<PathBuf>,
        exclude_patterns: &[String],
    ) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in exclude_patterns {
            builder.add(
                Glob::new(pattern)
                    .map_err(Error::from)
                    .with_msg(format!("Invalid exclude pattern {pattern:?}"))?,
            );
        }

        Ok(Self {
            project_root: project_root.into(),
            include_directories,
            exclude: builder.build()?,
        })
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let rel = path.strip_prefix(&self.project_root).unwrap_or(path);
        if self.exclude.is_match(rel) {
            return true;
        }
        path.file_name()
            .map(|name| self.exclude.is_match(Path::new(name)))
            .unwrap_or(false)
    }

    /// Collects all files to back up, in traversal order.
    ///
    /// A missing include directory contributes no files and is not an error;
    /// an include root that exists but cannot be read is.
    pub fn collect(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for dir in &self.include_directories {
            let dir_path = self.project_root.join(dir);
            if !dir_path.exists() {
                warn!("Include directory not found: {:?}", dir_path);
                continue;
            }

            info!("Collecting files from: {:?}", dir_path);

            let walker = WalkDir::new(&dir_path)
                .follow_links(true)
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !self.is_excluded(e.path()));

            for entry in walker {
                match entry {
                    Ok(entry) if entry.file_type().is_file() => {
                        debug!("Including file: {:?}", entry.path());
                        files.push(entry.into_path());
                    }
                    Ok(_) => {}
                    Err(e) if e.depth() == 0 => {
                        return Err(Error::from(e)).with_msg(format!(
                            "Include directory cannot be read: {:?}",
                            dir_path
                        ));
                    }
                    Err(e) => warn!("Skipping unreadable entry: {e}"),
                }
            }
        }

        Ok(files)
    }
}
