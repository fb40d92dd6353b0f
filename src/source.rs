use std::path::PathBuf;

/// A handle into the per-run [`SourceMap`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(u32);

/// A half-open byte range into one source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub source: SourceId,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(source: SourceId, start: usize, end: usize) -> Self {
        Self { source, start, end }
    }
}

#[derive(Debug)]
pub struct SourceFile {
    pub contents: String,
    pub origin: SourceFileOrigin,
}

#[derive(Debug)]
pub enum SourceFileOrigin {
    Memory,
    File(PathBuf),
}

impl core::fmt::Display for SourceFileOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFileOrigin::Memory => f.write_str("<memory>"),
            SourceFileOrigin::File(path) => f.write_fmt(format_args!("{}", path.display())),
        }
    }
}

impl SourceFile {
    pub fn value_of_span(&self, span: Span) -> &str {
        &self.contents[span.start..span.end]
    }

    /// 1-based line number for a byte position
    pub fn row_for_position(&self, position: usize) -> usize {
        self.contents[..position.min(self.contents.len())]
            .bytes()
            .filter(|b| *b == b'\n')
            .count()
            + 1
    }

    /// 1-based column number for a byte position
    pub fn column_for_position(&self, position: usize) -> usize {
        let position = position.min(self.contents.len());

        position
            - self.contents[..position]
                .rfind('\n')
                .map(|i| i + 1)
                .unwrap_or(0)
            + 1
    }

    /// The file name portion of the origin, if any. Library provenance checks
    /// match on this (see the enum representation policy).
    pub fn file_name(&self) -> Option<&str> {
        match &self.origin {
            SourceFileOrigin::Memory => None,
            SourceFileOrigin::File(path) => path.to_str(),
        }
    }
}

/// The table of source files for one compilation run. The front end registers
/// every file it parsed; the middle end only ever reads it (provenance lookups
/// and diagnostic rendering). Explicitly per-run, never a process singleton.
#[derive(Debug, Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, file: SourceFile) -> SourceId {
        let id = SourceId(self.files.len() as u32);
        self.files.push(file);
        id
    }

    pub fn add_memory(&mut self, contents: impl Into<String>) -> SourceId {
        self.add(SourceFile {
            contents: contents.into(),
            origin: SourceFileOrigin::Memory,
        })
    }

    pub fn add_file(&mut self, path: impl Into<PathBuf>, contents: impl Into<String>) -> SourceId {
        self.add(SourceFile {
            contents: contents.into(),
            origin: SourceFileOrigin::File(path.into()),
        })
    }

    pub fn get(&self, id: SourceId) -> &SourceFile {
        &self.files[id.0 as usize]
    }
}
