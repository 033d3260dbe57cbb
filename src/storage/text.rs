//! Text backend
//!
//! Records live one per line in a single file named after the minute it was
//! created: `reddit-YYYYMMDDHHMM.txt`. The file is created by the first
//! insert. Updates and deletes rewrite it through a temporary file.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::{Result, VaultError};
use crate::record::Record;

use super::{parse_line, StorageExecutor};

/// Names of files this backend owns
const FILE_NAME_PATTERN: &str = r"^reddit-[0-9]{12}\.txt$";

/// Flat-file storage executor
pub struct TextExecutor {
    /// Directory holding the output file
    dir: PathBuf,

    /// Current output file, once one exists
    path: Option<PathBuf>,
}

impl TextExecutor {
    /// Open the backend in `dir`
    ///
    /// With `clean_slate`, every earlier output file is removed. Otherwise
    /// the newest one is adopted and appended to.
    pub fn open(dir: &Path, clean_slate: bool) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let mut existing = Self::discover(dir)?;
        existing.sort();

        let path = if clean_slate {
            for old in &existing {
                tracing::info!("Previous text file {} is being purged", old.display());
                fs::remove_file(old)?;
            }
            None
        } else {
            let adopted = existing.pop();
            match &adopted {
                Some(path) => tracing::info!("Adopting text file {}", path.display()),
                None => tracing::info!("No previous text file in {}", dir.display()),
            }
            adopted
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            path,
        })
    }

    /// Current output file, if any record has been written yet
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Files in `dir` whose names match the output pattern
    fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
        let pattern = Regex::new(FILE_NAME_PATTERN)
            .map_err(|e| VaultError::Storage(format!("Invalid file pattern: {}", e)))?;

        let mut found = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let matches = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| pattern.is_match(name));
            if matches && path.is_file() {
                found.push(path);
            }
        }
        Ok(found)
    }

    fn new_file_path(&self) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d%H%M");
        self.dir.join(format!("reddit-{}.txt", stamp))
    }

    /// Raw lines of the current file
    fn read_lines(&self) -> Result<Vec<String>> {
        match &self.path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)?;
                Ok(contents.lines().map(str::to_string).collect())
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Parsed records of the current file; unreadable lines are skipped
    fn read_records(&self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        for (index, line) in self.read_lines()?.iter().enumerate() {
            match Record::from_line(line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping line {}: {}", index + 1, e),
            }
        }
        Ok(records)
    }

    /// Replace the file contents with `lines`
    fn rewrite(&self, lines: &[String]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let tmp = path.with_extension("txt.tmp");
        {
            let mut writer = BufWriter::new(fs::File::create(&tmp)?);
            for line in lines {
                writer.write_all(line.as_bytes())?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Whether `line` holds the record with `id`
fn line_has_id(line: &str, id: &str) -> bool {
    line.split(crate::record::DELIMITER).next() == Some(id)
}

impl StorageExecutor for TextExecutor {
    fn name(&self) -> &'static str {
        "text"
    }

    fn insert(&mut self, lines: &[String]) -> Result<Vec<String>> {
        let mut known: HashSet<String> = self
            .read_records()?
            .into_iter()
            .map(|record| record.unique_id)
            .collect();

        let path = match &self.path {
            Some(path) => path.clone(),
            None => {
                let path = self.new_file_path();
                tracing::info!("Creating text file {}", path.display());
                path
            }
        };

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        self.path = Some(path);
        let mut writer = BufWriter::new(file);

        let mut ids = Vec::with_capacity(lines.len());
        for line in lines {
            let record = match parse_line(line) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Skipping record: {}", e);
                    continue;
                }
            };
            if !known.insert(record.unique_id.clone()) {
                tracing::warn!("Skipping record: id {} already stored", record.unique_id);
                continue;
            }

            writer.write_all(record.to_line().as_bytes())?;
            writer.write_all(b"\n")?;
            ids.push(record.unique_id);
        }
        writer.flush()?;

        Ok(ids)
    }

    fn find(&mut self, id: &str) -> Result<Option<Record>> {
        Ok(self
            .read_records()?
            .into_iter()
            .find(|record| record.unique_id == id))
    }

    fn find_all(&mut self) -> Result<Vec<Record>> {
        self.read_records()
    }

    fn update(&mut self, record: &Record, id: &str) -> Result<bool> {
        let mut lines = self.read_lines()?;
        let mut updated = false;

        for line in lines.iter_mut() {
            if line_has_id(line, id) {
                *line = record.to_line();
                updated = true;
            }
        }

        if updated {
            self.rewrite(&lines)?;
        }
        Ok(updated)
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        let lines = self.read_lines()?;
        let before = lines.len();

        let kept: Vec<String> = lines
            .into_iter()
            .filter(|line| !line_has_id(line, id))
            .collect();

        if kept.len() == before {
            return Ok(false);
        }
        self.rewrite(&kept)?;
        Ok(true)
    }
}
