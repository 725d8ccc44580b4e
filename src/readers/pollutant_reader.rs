use memmap2::Mmap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::engine::InputSplit;
use crate::error::{ProcessingError, Result};
use crate::utils::constants::{DEFAULT_BUFFER_SIZE, DEFAULT_SPLIT_LINES};

/// Reads wide pollutant CSV files and cuts them into input splits.
pub struct PollutantReader {
    split_lines: usize,
    use_mmap: bool,
}

impl PollutantReader {
    pub fn new() -> Self {
        Self {
            split_lines: DEFAULT_SPLIT_LINES,
            use_mmap: false,
        }
    }

    pub fn with_split_lines(mut self, split_lines: usize) -> Self {
        self.split_lines = split_lines.max(1);
        self
    }

    pub fn with_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    /// Split every file. The split's source is the full path, so column
    /// indices of equally named files in different directories stay apart.
    pub fn read_splits(&self, paths: &[PathBuf]) -> Result<Vec<InputSplit>> {
        let mut splits = Vec::new();
        for path in paths {
            let content = self.read_content(path)?;
            let file_splits = InputSplit::split_content(&source_id(path), &content, self.split_lines);
            debug!(file = %source_name(path), splits = file_splits.len(), "file split");
            splits.extend(file_splits);
        }
        Ok(splits)
    }

    /// One split per file, header included
    pub fn read_whole_files(&self, paths: &[PathBuf]) -> Result<Vec<InputSplit>> {
        let mut splits = Vec::with_capacity(paths.len());
        for path in paths {
            let content = self.read_content(path)?;
            splits.extend(InputSplit::split_content(&source_id(path), &content, usize::MAX));
        }
        Ok(splits)
    }

    pub fn read_content(&self, path: &Path) -> Result<String> {
        if self.use_mmap {
            let file = File::open(path)?;
            let mmap = unsafe { Mmap::map(&file)? };
            let content = std::str::from_utf8(&mmap)
                .map_err(|e| ProcessingError::InvalidFormat(format!("Invalid UTF-8: {}", e)))?;
            Ok(content.to_string())
        } else {
            let file = File::open(path)?;
            let mut reader = BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file);
            let mut content = String::new();
            reader.read_to_string(&mut content)?;
            Ok(content)
        }
    }
}

impl Default for PollutantReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity of an input file inside column keys.
pub fn source_id(path: &Path) -> String {
    path.display().to_string()
}

pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// List the `.csv` files in a directory, sorted by name.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("csv") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> Result<PathBuf> {
        let path = dir.path().join(name);
        let mut file = File::create(&path)?;
        file.write_all(content.as_bytes())?;
        Ok(path)
    }

    #[test]
    fn test_read_splits() -> Result<()> {
        let dir = TempDir::new()?;
        let path = write_file(
            &dir,
            "2024_PM10_1g.csv",
            "Time,STA01-PM10-1g\n2024-01-01T00,1\n2024-01-01T01,2\n2024-01-01T02,3\n",
        )?;

        let splits = PollutantReader::new().with_split_lines(2).read_splits(&[path.clone()])?;
        assert_eq!(splits.len(), 2);
        assert_eq!(&*splits[0].source, path.display().to_string());
        assert!(splits[0].has_header());
        assert_eq!(splits[1].lines, vec!["2024-01-01T01,2", "2024-01-01T02,3"]);

        let whole = PollutantReader::new().with_mmap(true).read_whole_files(&[path])?;
        assert_eq!(whole.len(), 1);
        assert_eq!(whole[0].lines.len(), 4);
        Ok(())
    }

    #[test]
    fn test_same_file_name_in_two_directories_keeps_distinct_sources() -> Result<()> {
        let dir = TempDir::new()?;
        let (a, b) = (dir.path().join("a"), dir.path().join("b"));
        std::fs::create_dir_all(&a)?;
        std::fs::create_dir_all(&b)?;
        std::fs::write(a.join("pm10.csv"), "Time,STA01-PM10-1g\n2024-01-01T00,1.0\n")?;
        std::fs::write(b.join("pm10.csv"), "Time,STA02-PM10-1g\n2024-01-01T00,2.0\n")?;

        let splits = PollutantReader::new().read_whole_files(&[a.join("pm10.csv"), b.join("pm10.csv")])?;
        assert_eq!(splits.len(), 2);
        assert_ne!(splits[0].source, splits[1].source);
        Ok(())
    }

    #[test]
    fn test_list_csv_files_sorted() -> Result<()> {
        let dir = TempDir::new()?;
        write_file(&dir, "b.csv", "x")?;
        write_file(&dir, "a.csv", "x")?;
        write_file(&dir, "notes.txt", "x")?;

        let files = list_csv_files(dir.path())?;
        let names: Vec<String> = files.iter().map(|p| source_name(p)).collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
        Ok(())
    }
}
