use anyhow::{Context, Result};
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use log::debug;
use regex::Regex;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::{DirEntry, WalkDir};

use crate::app_config::FilesConfig;
use crate::errors::FileError;
use crate::extraction::ParserKind;

// @module: File and directory utilities

/// Directory names never descended into
pub const SKIP_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "__pycache__",
    "venv",
    ".venv",
    "build",
    "dist",
    ".git",
];

/// Suffix appended to the original file name for backups
pub const BACKUP_SUFFIX: &str = "backup";

/// Compiled `--include` / `--exclude` globs.
///
/// `**` crosses directories, `*` and `?` stay inside one path segment. A
/// pattern without `/` is matched against the file name alone.
#[derive(Debug, Clone, Default)]
pub struct PathPatterns {
    include: Vec<(Regex, bool)>,
    exclude: Vec<(Regex, bool)>,
}

impl PathPatterns {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let compile = |patterns: &[String]| -> Result<Vec<(Regex, bool)>> {
            patterns
                .iter()
                .map(|pattern| -> Result<(Regex, bool)> {
                    let regex = Regex::new(&glob_to_regex(pattern))
                        .with_context(|| format!("Invalid glob pattern: {}", pattern))?;
                    Ok((regex, pattern.contains('/')))
                })
                .collect()
        };
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Whether `relative` (to the walk root) passes both lists
    pub fn allows(&self, relative: &Path) -> bool {
        let full = relative.to_string_lossy().replace('\\', "/");
        let name = relative.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        let matches = |(regex, anchored): &(Regex, bool)| {
            if *anchored {
                regex.is_match(&full)
            } else {
                regex.is_match(&name)
            }
        };

        if self.exclude.iter().any(matches) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(matches)
    }
}

fn glob_to_regex(glob: &str) -> String {
    let glob = glob.trim_start_matches("./");
    let mut regex = String::from("^");
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    regex.push_str("(?:.*/)?");
                } else {
                    regex.push_str(".*");
                }
            }
            '*' => regex.push_str("[^/]*"),
            '?' => regex.push_str("[^/]"),
            _ => regex.push_str(&regex::escape(&c.to_string())),
        }
    }
    regex.push('$');
    regex
}

/// On-disk text encoding, kept so rewrites round-trip byte for byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
}

impl TextEncoding {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf8Bom => "utf-8-bom",
            Self::Utf16Le => "utf-16le",
            Self::Utf16Be => "utf-16be",
        }
    }
}

/// File contents decoded to UTF-8
#[derive(Debug, Clone)]
pub struct DecodedFile {
    pub path: PathBuf,
    pub content: String,
    pub encoding: TextEncoding,
}

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.as_os_str().is_empty() && !path.exists() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    // @generates: `<stem>.<target>.<ext>` next to the input or under output_dir
    pub fn generate_output_path<P: AsRef<Path>>(
        input_file: P,
        output_dir: Option<&Path>,
        target_language: &str,
    ) -> PathBuf {
        let input_file = input_file.as_ref();

        let stem = input_file.file_stem().unwrap_or_default().to_string_lossy();
        let output_filename = match input_file.extension() {
            Some(ext) => format!("{}.{}.{}", stem, target_language, ext.to_string_lossy()),
            None => format!("{}.{}", stem, target_language),
        };

        match output_dir {
            Some(dir) => dir.join(output_filename),
            None => input_file.with_file_name(output_filename),
        }
    }

    /// Output paths for a batch written under `output_dir`, in input order.
    ///
    /// Each input keeps its location relative to the deepest directory
    /// shared by all inputs, so `a/util.py` and `b/util.py` land in
    /// `<output_dir>/a/` and `<output_dir>/b/` instead of on top of each other.
    pub fn mirrored_output_paths(inputs: &[PathBuf], output_dir: &Path, target_language: &str) -> Vec<PathBuf> {
        let absolute: Vec<PathBuf> = inputs
            .iter()
            .map(|input| std::path::absolute(input).unwrap_or_else(|_| input.clone()))
            .collect();

        let mut common: Vec<Component> = match absolute.first().and_then(|first| first.parent()) {
            Some(parent) => parent.components().collect(),
            None => Vec::new(),
        };
        for path in absolute.iter().skip(1) {
            let parent: Vec<Component> = path.parent().map(|p| p.components().collect()).unwrap_or_default();
            let shared = common.iter().zip(&parent).take_while(|(a, b)| a == b).count();
            common.truncate(shared);
        }
        let base: PathBuf = common.iter().collect();

        absolute
            .iter()
            .map(|path| {
                let relative = path.strip_prefix(&base).unwrap_or(path.as_path());
                let relative: PathBuf = relative
                    .components()
                    .filter(|c| matches!(c, Component::Normal(_)))
                    .collect();
                output_dir.join(Self::generate_output_path(&relative, None, target_language))
            })
            .collect()
    }

    /// Sibling `<name>.backup` path
    pub fn backup_path<P: AsRef<Path>>(path: P) -> PathBuf {
        let path = path.as_ref();
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        path.with_file_name(format!("{}.{}", name, BACKUP_SUFFIX))
    }

    /// Copy the original next to itself before it is overwritten
    pub fn create_backup<P: AsRef<Path>>(path: P) -> Result<PathBuf, FileError> {
        let path = path.as_ref();
        let backup = Self::backup_path(path);
        fs::copy(path, &backup).map_err(|source| FileError::Backup {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Backed up {:?} to {:?}", path, backup);
        Ok(backup)
    }

    /// Read and decode a text file
    pub fn read_text<P: AsRef<Path>>(path: P) -> Result<DecodedFile, FileError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| FileError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let (content, encoding) = decode_bytes(&bytes).map_err(|message| FileError::Decode {
            path: path.to_path_buf(),
            message,
        })?;

        Ok(DecodedFile {
            path: path.to_path_buf(),
            content,
            encoding,
        })
    }

    /// Replace `path` with `content` via a temp file in the same directory
    pub fn write_atomic<P: AsRef<Path>>(path: P, content: &str, encoding: TextEncoding) -> Result<(), FileError> {
        let path = path.as_ref();
        let write_error = |message: String| FileError::Write {
            path: path.to_path_buf(),
            message,
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::ensure_dir(&dir).map_err(|e| write_error(e.to_string()))?;

        let mut temp = NamedTempFile::new_in(&dir).map_err(|e| write_error(e.to_string()))?;
        temp.write_all(&encode_text(content, encoding))
            .and_then(|_| temp.flush())
            .map_err(|e| write_error(e.to_string()))?;

        if let Ok(metadata) = fs::metadata(path) {
            fs::set_permissions(temp.path(), metadata.permissions()).map_err(|e| write_error(e.to_string()))?;
        }

        temp.persist(path).map_err(|e| write_error(e.error.to_string()))?;
        Ok(())
    }

    /// Supported files under `root`, sorted. A file root is returned as is.
    ///
    /// Hidden directories, the built-in skip list and `exclude_dirs` are not
    /// entered. Backups and previously written `<stem>.<target>.<ext>` outputs
    /// are ignored, and `include` / `exclude` globs apply to paths relative
    /// to `root`.
    pub fn collect_files<P: AsRef<Path>>(
        root: P,
        files: &FilesConfig,
        target_language: Option<&str>,
    ) -> Result<Vec<PathBuf>> {
        let root = root.as_ref();
        if root.is_file() {
            return Ok(vec![root.to_path_buf()]);
        }
        if !root.is_dir() {
            anyhow::bail!("Input path does not exist: {:?}", root);
        }

        let patterns = PathPatterns::new(&files.include, &files.exclude)?;
        let mut result = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry, &files.exclude_dirs));

        for entry in walker {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }
            if is_generated(path, target_language) {
                continue;
            }
            if !files.extensions.is_empty() {
                let ext = path.extension().map(|e| e.to_string_lossy().to_lowercase());
                let wanted = ext.is_some_and(|ext| {
                    files
                        .extensions
                        .iter()
                        .any(|want| want.trim_start_matches('.').eq_ignore_ascii_case(&ext))
                });
                if !wanted {
                    continue;
                }
            }
            if !patterns.is_empty() && !patterns.allows(path.strip_prefix(root).unwrap_or(path)) {
                continue;
            }
            if ParserKind::supports_path(path) {
                result.push(path.to_path_buf());
            }
        }

        result.sort();
        debug!("Collected {} files under {:?}", result.len(), root);
        Ok(result)
    }
}

fn is_skipped_dir(entry: &DirEntry, exclude_dirs: &[String]) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIP_DIRS.contains(&name.as_ref()) || exclude_dirs.iter().any(|d| d == name.as_ref())
}

fn is_generated(path: &Path, target_language: Option<&str>) -> bool {
    if path.extension().is_some_and(|ext| ext == BACKUP_SUFFIX) {
        return true;
    }
    match (target_language, path.file_stem()) {
        (Some(target), Some(stem)) => stem.to_string_lossy().ends_with(&format!(".{}", target)),
        _ => false,
    }
}

/// Decode UTF-8 (with or without BOM) or BOM-marked UTF-16. Invalid input is rejected.
pub fn decode_bytes(bytes: &[u8]) -> Result<(String, TextEncoding), String> {
    let (encoding, bom_len): (&'static Encoding, usize) = Encoding::for_bom(bytes).unwrap_or((UTF_8, 0));

    let text_encoding = if encoding == UTF_16LE {
        TextEncoding::Utf16Le
    } else if encoding == UTF_16BE {
        TextEncoding::Utf16Be
    } else if bom_len > 0 {
        TextEncoding::Utf8Bom
    } else {
        TextEncoding::Utf8
    };

    let body = &bytes[bom_len..];
    if text_encoding == TextEncoding::Utf8 && body.contains(&0) {
        return Err("binary content (NUL byte)".to_string());
    }

    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .map(|text| (text.into_owned(), text_encoding))
        .ok_or_else(|| format!("invalid {} byte sequence", encoding.name()))
}

/// Encode `content` back to its original encoding, BOM included
pub fn encode_text(content: &str, encoding: TextEncoding) -> Vec<u8> {
    match encoding {
        TextEncoding::Utf8 => content.as_bytes().to_vec(),
        TextEncoding::Utf8Bom => {
            let mut bytes = vec![0xEF, 0xBB, 0xBF];
            bytes.extend_from_slice(content.as_bytes());
            bytes
        }
        TextEncoding::Utf16Le => {
            let mut bytes = vec![0xFF, 0xFE];
            bytes.extend(content.encode_utf16().flat_map(u16::to_le_bytes));
            bytes
        }
        TextEncoding::Utf16Be => {
            let mut bytes = vec![0xFE, 0xFF];
            bytes.extend(content.encode_utf16().flat_map(u16::to_be_bytes));
            bytes
        }
    }
}
