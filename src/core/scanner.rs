use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::debug;
use walkdir::WalkDir;
use zip::ZipArchive;

use super::classpath::{RootKind, ScanRoot};
use super::filter::{class_name_for_path, may_be_archive, strip_package_root, ScanSpec};
use crate::error::{ArchiveError, ScanError};

pub const DEFAULT_MAX_NESTING: usize = 1;

const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";
const EMPTY_ZIP_MAGIC: [u8; 4] = *b"PK\x05\x06";

/// Upper bound on buffer space reserved from an entry's declared size.
const MAX_PREALLOC: usize = 1 << 20;

/// One candidate class descriptor read from a scan root.
#[derive(Debug, Clone)]
pub struct BinaryEntry {
    /// Slash-delimited path inside the root, package root prefix removed.
    pub name: String,
    pub bytes: Vec<u8>,
    /// Human-readable location, `outer.jar!/lib/inner.jar!/pkg/C.class` for nested entries.
    pub location: String,
    /// Position in the root's enumeration.
    pub ordinal: u64,
    pub root: Weak<ScanRoot>,
}

pub fn is_archive_magic(bytes: &[u8]) -> bool {
    bytes.starts_with(&ZIP_MAGIC) || bytes.starts_with(&EMPTY_ZIP_MAGIC)
}

/// Opens scan roots and enumerates their class descriptors lazily.
#[derive(Debug, Clone)]
pub struct ArchiveReader {
    spec: Arc<ScanSpec>,
    max_nesting: usize,
}

impl ArchiveReader {
    pub fn new(spec: Arc<ScanSpec>) -> Self {
        Self {
            spec,
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }

    pub fn with_max_nesting(mut self, depth: usize) -> Self {
        self.max_nesting = depth;
        self
    }

    /// Lazy enumeration of `root`. Failures on single entries are yielded as
    /// errors and enumeration continues with the next entry.
    pub fn entries(&self, root: &Arc<ScanRoot>) -> EntryIter {
        let source = match root.kind {
            RootKind::Directory => Source::Directory(self.walk_directory(&root.path)),
            RootKind::Archive => match open_archive(&root.path) {
                Ok(archive) => Source::Archive(vec![ArchiveFrame {
                    len: archive.len(),
                    archive,
                    next: 0,
                    location: root.path.display().to_string(),
                    depth: 0,
                }]),
                Err(source) => {
                    Source::Failed(Some(ScanError::archive(root.path.display().to_string(), source)))
                }
            },
        };

        EntryIter {
            spec: Arc::clone(&self.spec),
            max_nesting: self.max_nesting,
            root: Arc::downgrade(root),
            root_path: root.path.clone(),
            source,
            ordinal: 0,
        }
    }

    fn walk_directory(&self, dir: &Path) -> Box<dyn Iterator<Item = walkdir::Result<walkdir::DirEntry>> + Send> {
        let spec = Arc::clone(&self.spec);
        let base = dir.to_path_buf();
        let walker = WalkDir::new(dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| {
                if !entry.file_type().is_dir() {
                    return true;
                }
                match entry.path().strip_prefix(&base) {
                    Ok(relative) => {
                        let package = relative_slash_path(relative).replace('/', ".");
                        spec.package_may_contain_accepted(&package)
                    }
                    Err(_) => true,
                }
            });
        Box::new(walker)
    }
}

trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

type DynArchive = ZipArchive<Box<dyn ReadSeek>>;

struct ArchiveFrame {
    archive: DynArchive,
    len: usize,
    next: usize,
    location: String,
    depth: usize,
}

enum Source {
    Directory(Box<dyn Iterator<Item = walkdir::Result<walkdir::DirEntry>> + Send>),
    /// Innermost archive on top.
    Archive(Vec<ArchiveFrame>),
    Failed(Option<ScanError>),
}

enum Step {
    Yield(Result<BinaryEntry, ScanError>),
    Enter(ArchiveFrame),
    Skip,
}

/// Lazy iterator over the entries of one scan root.
pub struct EntryIter {
    spec: Arc<ScanSpec>,
    max_nesting: usize,
    root: Weak<ScanRoot>,
    root_path: PathBuf,
    source: Source,
    ordinal: u64,
}

impl Iterator for EntryIter {
    type Item = Result<BinaryEntry, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let step = match &mut self.source {
                Source::Failed(error) => return error.take().map(Err),
                Source::Directory(walker) => match walker.next()? {
                    Ok(entry) => self.directory_step(entry.path()),
                    Err(err) => {
                        let location = err
                            .path()
                            .map(|p| p.display().to_string())
                            .unwrap_or_else(|| self.root_path.display().to_string());
                        let source = ArchiveError::Io(err.into());
                        Step::Yield(Err(ScanError::archive(location, source)))
                    }
                },
                Source::Archive(frames) => {
                    let frame = frames.last_mut()?;
                    if frame.next >= frame.len {
                        frames.pop();
                        if frames.is_empty() {
                            return None;
                        }
                        continue;
                    }
                    let index = frame.next;
                    frame.next += 1;
                    archive_step(&self.spec, self.max_nesting, frame, index)
                }
            };

            match step {
                Step::Yield(Ok(mut entry)) => {
                    entry.ordinal = self.ordinal;
                    entry.root = Weak::clone(&self.root);
                    self.ordinal += 1;
                    return Some(Ok(entry));
                }
                Step::Yield(Err(error)) => return Some(Err(error)),
                Step::Enter(frame) => {
                    debug!(location = %frame.location, "entering nested archive");
                    if let Source::Archive(frames) = &mut self.source {
                        frames.push(frame);
                    }
                }
                Step::Skip => {}
            }
        }
    }
}

impl EntryIter {
    fn directory_step(&self, path: &Path) -> Step {
        if !path.is_file() {
            return Step::Skip;
        }
        let relative = match path.strip_prefix(&self.root_path) {
            Ok(relative) => relative_slash_path(relative),
            Err(_) => return Step::Skip,
        };
        match class_name_for_path(&relative) {
            Some(class_name) if self.spec.class_accepted(&class_name) => {}
            _ => return Step::Skip,
        }
        let location = path.display().to_string();
        Step::Yield(
            std::fs::read(path)
                .map(|bytes| new_entry(relative, bytes, location.clone()))
                .map_err(|err| ScanError::archive(location, err)),
        )
    }
}

fn archive_step(spec: &ScanSpec, max_nesting: usize, frame: &mut ArchiveFrame, index: usize) -> Step {
    let mut file = match frame.archive.by_index(index) {
        Ok(file) => file,
        Err(err) => {
            let location = format!("{}!/#{}", frame.location, index);
            return Step::Yield(Err(ScanError::archive(location, err)));
        }
    };
    if file.is_dir() {
        return Step::Skip;
    }
    let raw_name = file.name().to_string();
    let location = format!("{}!/{}", frame.location, raw_name);
    let name = strip_package_root(&raw_name).to_string();

    if let Some(class_name) = class_name_for_path(&name) {
        if !spec.class_accepted(&class_name) {
            return Step::Skip;
        }
        let declared = file.size();
        return Step::Yield(match read_entry(&mut file, declared) {
            Ok(bytes) => Ok(new_entry(name, bytes, location)),
            Err(err) => Err(ScanError::archive(location, err)),
        });
    }

    if !may_be_archive(&raw_name) {
        return Step::Skip;
    }
    let file_name = raw_name.rsplit('/').next().unwrap_or(&raw_name);
    if !spec.archive_accepted(file_name) {
        return Step::Skip;
    }

    let declared = file.size();
    let bytes = match read_entry(&mut file, declared) {
        Ok(bytes) => bytes,
        Err(err) => return Step::Yield(Err(ScanError::archive(location, err))),
    };
    if !is_archive_magic(&bytes) {
        return Step::Skip;
    }
    if frame.depth + 1 > max_nesting {
        return Step::Yield(Err(ScanError::RecursionLimitExceeded {
            location,
            limit: max_nesting,
        }));
    }

    let reader: Box<dyn ReadSeek> = Box::new(Cursor::new(bytes));
    match ZipArchive::new(reader) {
        Ok(archive) => Step::Enter(ArchiveFrame {
            len: archive.len(),
            archive,
            next: 0,
            location,
            depth: frame.depth + 1,
        }),
        Err(err) => Step::Yield(Err(ScanError::archive(location, err))),
    }
}

/// The declared size comes from the archive headers and is not trusted for
/// allocation; the buffer grows with the bytes actually read.
fn read_entry(file: &mut impl Read, declared: u64) -> std::io::Result<Vec<u8>> {
    let capacity = usize::try_from(declared).unwrap_or(usize::MAX).min(MAX_PREALLOC);
    let mut bytes = Vec::with_capacity(capacity);
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn open_archive(path: &Path) -> Result<DynArchive, ArchiveError> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 4];
    let read = file.read(&mut magic)?;
    if !is_archive_magic(&magic[..read]) {
        return Err(ArchiveError::NotAnArchive);
    }
    file.rewind()?;
    let reader: Box<dyn ReadSeek> = Box::new(BufReader::new(file));
    Ok(ZipArchive::new(reader)?)
}

fn new_entry(name: String, bytes: Vec<u8>, location: String) -> BinaryEntry {
    BinaryEntry {
        name,
        bytes,
        location,
        ordinal: 0,
        root: Weak::new(),
    }
}

fn relative_slash_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
