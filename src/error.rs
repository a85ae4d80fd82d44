use std::fmt;

/// Errors raised by the engine, the codecs and the file layer.
#[derive(Debug)]
pub enum EditorError {
    /// GrayBit-7 signature mismatch or truncated payload.
    Format(String),
    /// GrayBit-7 version byte other than 1.
    UnsupportedVersion(u8),
    /// Kernel flattening/unflattening given something other than 9 values.
    InvalidKernelSize(usize),
    /// A divisor or interval width that would be zero.
    DivisionByZero(&'static str),
    /// Native image failed to decode (corrupt or unsupported file).
    Decode(String),
    /// Colour string that is not `#rrggbb`.
    InvalidColor(String),
    /// Zero or mismatched buffer dimensions.
    InvalidDimensions(String),
    Io(std::io::Error),
    /// Project file (de)serialization failure.
    Project(String),
    /// Background job panicked or was dropped.
    Job(String),
}

impl fmt::Display for EditorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditorError::Format(msg) => write!(f, "invalid GrayBit-7 data: {}", msg),
            EditorError::UnsupportedVersion(v) => write!(f, "unsupported GrayBit-7 version: {}", v),
            EditorError::InvalidKernelSize(n) => {
                write!(f, "kernel must have exactly 9 values, got {}", n)
            }
            EditorError::DivisionByZero(what) => write!(f, "division by zero: {}", what),
            EditorError::Decode(msg) => write!(f, "failed to decode image: {}", msg),
            EditorError::InvalidColor(s) => write!(f, "invalid colour '{}', expected #rrggbb", s),
            EditorError::InvalidDimensions(msg) => write!(f, "invalid dimensions: {}", msg),
            EditorError::Io(e) => write!(f, "I/O error: {}", e),
            EditorError::Project(msg) => write!(f, "project file error: {}", msg),
            EditorError::Job(msg) => write!(f, "background job failed: {}", msg),
        }
    }
}

impl std::error::Error for EditorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EditorError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EditorError {
    fn from(e: std::io::Error) -> Self {
        EditorError::Io(e)
    }
}

impl From<image::ImageError> for EditorError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::IoError(io) => EditorError::Io(io),
            other => EditorError::Decode(other.to_string()),
        }
    }
}

impl From<Box<bincode::ErrorKind>> for EditorError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        EditorError::Project(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EditorError>;
