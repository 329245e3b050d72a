//! Attachment names for stored chunks.
//!
//! ```text
//! 1718000000000-3f9a1c2e.mp4.0.chunk
//! └── stamp ──────────┘ └ext┘ │  └ kind
//!                          index
//! ```
//!
//! The index and kind are informational. Reassembly order comes from the
//! order of a file's locators, never from labels.

use std::fmt;
use std::path::Path;

/// Whether a chunk is the whole file or one piece of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// The file fits in a single chunk.
    Atomic,
    /// One of several chunks.
    Chunk,
}

impl ChunkKind {
    /// Kind for a file split into `count` chunks.
    pub fn for_count(count: usize) -> Self {
        if count == 1 {
            ChunkKind::Atomic
        } else {
            ChunkKind::Chunk
        }
    }

    /// Label suffix.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Atomic => "atomic",
            ChunkKind::Chunk => "chunk",
        }
    }
}

/// A parsed or freshly minted chunk label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkLabel {
    /// Timestamp-based unique stamp.
    pub stamp: String,
    /// Original file extension, without the dot.
    pub extension: Option<String>,
    /// Zero-based chunk index.
    pub index: usize,
    /// Single or multi-chunk file.
    pub kind: ChunkKind,
}

impl ChunkLabel {
    /// Mint a label for chunk `index` of `count` chunks of `file_name`.
    pub fn new(file_name: &str, index: usize, count: usize) -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        let nonce = uuid::Uuid::new_v4().simple().to_string();

        Self {
            stamp: format!("{millis}-{}", &nonce[..8]),
            extension: extension_of(file_name),
            index,
            kind: ChunkKind::for_count(count),
        }
    }

    /// Parse a label produced by [`ChunkLabel::new`].
    pub fn parse(label: &str) -> Option<Self> {
        let (rest, kind) = label.rsplit_once('.')?;
        let kind = match kind {
            "atomic" => ChunkKind::Atomic,
            "chunk" => ChunkKind::Chunk,
            _ => return None,
        };

        let (stem, index) = rest.rsplit_once('.')?;
        let index = index.parse().ok()?;

        let (stamp, extension) = match stem.split_once('.') {
            Some((stamp, ext)) if !ext.is_empty() => (stamp, Some(ext.to_string())),
            Some((stamp, _)) => (stamp, None),
            None => (stem, None),
        };

        if stamp.is_empty() {
            return None;
        }

        Some(Self {
            stamp: stamp.to_string(),
            extension,
            index,
            kind,
        })
    }
}

impl fmt::Display for ChunkLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stamp)?;
        if let Some(ext) = &self.extension {
            write!(f, ".{ext}")?;
        }
        write!(f, ".{}.{}", self.index, self.kind.as_str())
    }
}

/// Extension of `file_name`, without the dot.
pub fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_for_count() {
        assert_eq!(ChunkKind::for_count(1), ChunkKind::Atomic);
        assert_eq!(ChunkKind::for_count(2), ChunkKind::Chunk);
        assert_eq!(ChunkKind::for_count(0), ChunkKind::Chunk);
    }

    #[test]
    fn test_new_label_format() {
        let label = ChunkLabel::new("movie.mp4", 3, 5).to_string();
        assert!(label.ends_with(".mp4.3.chunk"), "{label}");

        let label = ChunkLabel::new("notes.txt", 0, 1).to_string();
        assert!(label.ends_with(".txt.0.atomic"), "{label}");
    }

    #[test]
    fn test_labels_are_unique() {
        let a = ChunkLabel::new("a.bin", 0, 1).to_string();
        let b = ChunkLabel::new("a.bin", 0, 1).to_string();
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_minted_label() {
        let minted = ChunkLabel::new("archive.gz", 7, 9);
        let parsed = ChunkLabel::parse(&minted.to_string()).unwrap();
        assert_eq!(parsed, minted);
    }

    #[test]
    fn test_parse_without_extension() {
        let parsed = ChunkLabel::parse("1718000000000-abcdef01.0.atomic").unwrap();
        assert_eq!(parsed.extension, None);
        assert_eq!(parsed.index, 0);
        assert_eq!(parsed.kind, ChunkKind::Atomic);
    }

    #[test]
    fn test_parse_reference_style_label() {
        let parsed = ChunkLabel::parse("1718000000000.mp4.12.chunk").unwrap();
        assert_eq!(parsed.stamp, "1718000000000");
        assert_eq!(parsed.extension.as_deref(), Some("mp4"));
        assert_eq!(parsed.index, 12);
    }

    #[test]
    fn test_parse_rejects_foreign_names() {
        assert!(ChunkLabel::parse("photo.png").is_none());
        assert!(ChunkLabel::parse("x.y.chunk").is_none());
        assert!(ChunkLabel::parse(".0.chunk").is_none());
        assert!(ChunkLabel::parse("").is_none());
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("a.txt").as_deref(), Some("txt"));
        assert_eq!(extension_of("a.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension_of("README"), None);
        assert_eq!(extension_of(".hidden"), None);
    }
}
