use std::io;
use std::path::PathBuf;

/// Result alias used by every loader in this crate.
pub type MapResult<T> = Result<T, MapError>;

/// Coarse classification of a [`MapError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The document was malformed or uses something we do not support.
    Decode,
    /// An underlying document or image could not be fetched.
    ResourceLoad,
}

/// Error type for level, tile set and animation loading.
#[derive(thiserror::Error, Debug)]
pub enum MapError {
    /// File I/O error
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// Image bytes could not be decoded
    #[error("failed to load image {path}: {reason}")]
    Image {
        /// Image file.
        path: PathBuf,
        /// Decoder message.
        reason: String,
    },

    /// XML parse error
    #[error("failed to parse XML in {path}: {source}")]
    Xml {
        /// Document that failed to parse.
        path: PathBuf,
        /// Underlying error.
        source: roxmltree::Error,
    },

    /// JSON settings or animation library could not be parsed
    #[error("failed to parse {path}: {source}")]
    Config {
        /// Offending file.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// Compressed payloads or an unknown `encoding` attribute
    #[error("unsupported layer data in '{layer}': {detail}")]
    UnsupportedEncoding {
        /// Layer name.
        layer: String,
        /// What was found.
        detail: String,
    },

    /// A numeric attribute is present but not a number
    #[error("attribute '{name}' on <{element}> is not a number: '{value}'")]
    InvalidAttribute {
        /// Element tag.
        element: String,
        /// Attribute name.
        name: String,
        /// Raw text.
        value: String,
    },

    /// A tile set has no leading `<image>` child
    #[error("tile set '{tileset}' has no image as its first child")]
    MissingTileImage {
        /// Tile set name, or its source path for external sets.
        tileset: String,
    },

    /// A tile layer has no `<data>` child
    #[error("no layer data present in layer '{layer}'")]
    MissingLayerData {
        /// Layer name.
        layer: String,
    },

    /// The `<data>` payload could not be turned into cells
    #[error("invalid cell data in layer '{layer}': {reason}")]
    InvalidCellData {
        /// Layer name.
        layer: String,
        /// What went wrong.
        reason: String,
    },

    /// The map's pixel extent does not fit a layer surface
    #[error("map of {width}x{height} pixels exceeds the {max}px surface limit")]
    SurfaceTooLarge {
        /// Requested width in pixels.
        width: u64,
        /// Requested height in pixels.
        height: u64,
        /// Largest side the surface supports.
        max: u64,
    },

    /// A cell references a GID no tile set owns
    #[error("layer '{layer}' references GID {gid} which no tile set owns")]
    InvalidTileGid {
        /// Layer name.
        layer: String,
        /// Cleaned GID (flags stripped).
        gid: u32,
    },

    /// Animation definitions are inconsistent
    #[error("invalid animation '{name}': {reason}")]
    InvalidAnimation {
        /// Animation name.
        name: String,
        /// What went wrong.
        reason: String,
    },
}

impl MapError {
    /// Which side of the taxonomy this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MapError::Io { .. } | MapError::Image { .. } => ErrorKind::ResourceLoad,
            _ => ErrorKind::Decode,
        }
    }

    pub(crate) fn cells(layer: &str, reason: impl Into<String>) -> Self {
        MapError::InvalidCellData {
            layer: layer.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn animation(name: &str, reason: impl Into<String>) -> Self {
        MapError::InvalidAnimation {
            name: name.to_owned(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_and_image_failures_are_resource_errors() {
        let io = MapError::Io {
            path: PathBuf::from("maps/arena.xml"),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        let img = MapError::Image {
            path: PathBuf::from("tiles.png"),
            reason: "bad png".into(),
        };
        assert_eq!(io.kind(), ErrorKind::ResourceLoad);
        assert_eq!(img.kind(), ErrorKind::ResourceLoad);
    }

    #[test]
    fn oversized_surface_names_the_limit() {
        let err = MapError::SurfaceTooLarge {
            width: 70_000,
            height: 1,
            max: 65_535,
        };
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(err.to_string().contains("70000x1"));
    }

    #[test]
    fn document_problems_are_decode_errors() {
        let err = MapError::UnsupportedEncoding {
            layer: "ground".into(),
            detail: "compressionlevel 1".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(err.to_string().contains("ground"));
        assert_eq!(MapError::cells("walls", "odd").kind(), ErrorKind::Decode);
    }
}
