//! Native artifact format detection.
//!
//! The engine is shipped as a shared library. Before handing a file to the
//! dynamic loader we check its header against the object format the host
//! platform loads, so a truncated download or a library built for another
//! platform fails with a clear `BindFailed` instead of a loader-specific message.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tls_runtime_common::RuntimeError;

/// Number of header bytes inspected.
const HEADER_LEN: usize = 4;

/// Shared library object format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    /// ELF (Linux and most Unixes).
    Elf,
    /// Mach-O, thin or universal (macOS).
    MachO,
    /// PE/COFF (Windows).
    Pe,
}

impl ArtifactFormat {
    /// The format loaded by the platform this binary was built for.
    pub const fn native() -> Self {
        if cfg!(target_os = "windows") {
            Self::Pe
        } else if cfg!(target_vendor = "apple") {
            Self::MachO
        } else {
            Self::Elf
        }
    }

    /// Detect the format from the leading bytes of a file.
    pub fn detect(header: &[u8]) -> Option<Self> {
        match header {
            [0x7f, b'E', b'L', b'F', ..] => Some(Self::Elf),
            [0xfe, 0xed, 0xfa, 0xce | 0xcf, ..]
            | [0xce | 0xcf, 0xfa, 0xed, 0xfe, ..]
            | [0xca, 0xfe, 0xba, 0xbe, ..] => Some(Self::MachO),
            [b'M', b'Z', ..] => Some(Self::Pe),
            _ => None,
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Elf => write!(f, "ELF"),
            Self::MachO => write!(f, "Mach-O"),
            Self::Pe => write!(f, "PE"),
        }
    }
}

/// Check that the file at `path` is a shared library for this platform.
///
/// # Errors
///
/// Returns `BindFailed` if the file cannot be read, is too small, or has a
/// header of another (or no) object format.
pub fn validate_artifact(path: &Path) -> Result<ArtifactFormat, RuntimeError> {
    let mut header = [0u8; HEADER_LEN];
    File::open(path)
        .and_then(|mut file| file.read_exact(&mut header))
        .map_err(|e| RuntimeError::bind_failed(path, format!("cannot read artifact header: {e}")))?;

    let expected = ArtifactFormat::native();
    match ArtifactFormat::detect(&header) {
        Some(format) if format == expected => Ok(format),
        Some(format) => Err(RuntimeError::bind_failed(
            path,
            format!("artifact is {format}, this platform loads {expected}"),
        )),
        None => Err(RuntimeError::bind_failed(
            path,
            "not a shared library: unknown header",
        )),
    }
}
