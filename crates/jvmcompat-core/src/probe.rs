//! Controller bytecode level probing.
//!
//! Legacy path for controllers that only expose a loose release string.
//! [`ClassFileProbe`] first reads the major version out of a compiled class
//! file belonging to the controller; when that artifact is missing or not a
//! class file it maps the declared release onto [`RELEASE_TABLE`].

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ClassFileError, CompatError, CompatResult};
use crate::obs;
use crate::version::VersionIdentifier;

/// Magic number opening every class file.
pub const CLASS_FILE_MAGIC: u32 = 0xCAFE_BABE;

/// Class file major version; 45 is Java 1.1, 52 is Java 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BytecodeLevel(u16);

impl BytecodeLevel {
    pub const JAVA_1_1: BytecodeLevel = BytecodeLevel(45);
    pub const JAVA_5: BytecodeLevel = BytecodeLevel(49);
    pub const JAVA_6: BytecodeLevel = BytecodeLevel(50);
    pub const JAVA_7: BytecodeLevel = BytecodeLevel(51);
    pub const JAVA_8: BytecodeLevel = BytecodeLevel(52);
    pub const JAVA_9: BytecodeLevel = BytecodeLevel(53);

    const FEATURE_OFFSET: u16 = 44;

    pub const fn new(major: u16) -> Self {
        BytecodeLevel(major)
    }

    pub fn major(&self) -> u16 {
        self.0
    }

    /// Runtime feature number this level corresponds to.
    pub fn feature(&self) -> u64 {
        u64::from(self.0.saturating_sub(Self::FEATURE_OFFSET))
    }

    /// Level emitted by a runtime of the given feature number.
    pub fn from_feature(feature: u64) -> Option<Self> {
        u16::try_from(feature)
            .ok()
            .and_then(|f| f.checked_add(Self::FEATURE_OFFSET))
            .map(BytecodeLevel)
    }
}

impl fmt::Display for BytecodeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Java {})", self.0, self.feature())
    }
}

/// Release boundaries, keyed by feature number, oldest first. A release maps
/// to the last boundary it is not older than; anything newer than the last
/// boundary gets the newest tier.
pub const RELEASE_TABLE: &[(u64, BytecodeLevel)] = &[
    (1, BytecodeLevel::JAVA_1_1),
    (2, BytecodeLevel(46)),
    (3, BytecodeLevel(47)),
    (4, BytecodeLevel(48)),
    (5, BytecodeLevel::JAVA_5),
    (6, BytecodeLevel::JAVA_6),
    (7, BytecodeLevel::JAVA_7),
    (8, BytecodeLevel::JAVA_8),
    (9, BytecodeLevel::JAVA_9),
];

/// Source of the controller's own bytecode level.
pub trait BytecodeLevelProbe: Send + Sync {
    fn controller_level(&self) -> CompatResult<BytecodeLevel>;
}

/// Parse the first eight bytes of a class file.
pub fn parse_class_header(header: &[u8]) -> Result<BytecodeLevel, ClassFileError> {
    let header: &[u8; 8] = header
        .get(..8)
        .and_then(|h| h.try_into().ok())
        .ok_or(ClassFileError::Truncated)?;

    let magic = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    if magic != CLASS_FILE_MAGIC {
        return Err(ClassFileError::BadMagic(magic));
    }

    let major = u16::from_be_bytes([header[6], header[7]]);
    if major < BytecodeLevel::JAVA_1_1.major() {
        return Err(ClassFileError::UnsupportedMajor(major));
    }
    Ok(BytecodeLevel(major))
}

/// Read the bytecode level out of a class file on disk.
pub fn read_class_file_level(path: &Path) -> Result<BytecodeLevel, ClassFileError> {
    let mut file = File::open(path)?;
    let mut header = [0u8; 8];
    file.read_exact(&mut header).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => ClassFileError::Truncated,
        _ => ClassFileError::Io(e),
    })?;
    parse_class_header(&header)
}

/// Map a declared release version onto [`RELEASE_TABLE`].
pub fn level_for_release(release: &str) -> CompatResult<BytecodeLevel> {
    let version = VersionIdentifier::parse(release).map_err(|e| {
        CompatError::ProbeExhausted(format!("controller release is unusable: {e}"))
    })?;
    let feature = version.feature();

    let level = RELEASE_TABLE
        .iter()
        .rev()
        .find(|(boundary, _)| feature >= *boundary)
        .or_else(|| RELEASE_TABLE.first())
        .map(|(_, level)| *level)
        .ok_or_else(|| CompatError::ProbeExhausted("release table is empty".to_string()))?;
    Ok(level)
}

/// Two-stage probe: class file header, then release table.
#[derive(Debug, Clone, Default)]
pub struct ClassFileProbe {
    artifact: Option<PathBuf>,
    release: Option<String>,
}

impl ClassFileProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Class file compiled for the controller.
    pub fn with_artifact(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact = Some(path.into());
        self
    }

    /// Release version the controller declares for itself.
    pub fn with_release(mut self, release: impl Into<String>) -> Self {
        self.release = Some(release.into());
        self
    }

    pub fn artifact(&self) -> Option<&Path> {
        self.artifact.as_deref()
    }

    pub fn release(&self) -> Option<&str> {
        self.release.as_deref()
    }
}

impl BytecodeLevelProbe for ClassFileProbe {
    fn controller_level(&self) -> CompatResult<BytecodeLevel> {
        if let Some(path) = &self.artifact {
            match read_class_file_level(path) {
                Ok(level) => return Ok(level),
                Err(e) => obs::emit_probe_fallback(path, &e),
            }
        }

        match &self.release {
            Some(release) => level_for_release(release),
            None => Err(CompatError::ProbeExhausted(
                "no readable class file and no declared release".to_string(),
            )),
        }
    }
}

/// Probe answering a fixed level; for controllers whose level is known up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedLevelProbe(pub BytecodeLevel);

impl BytecodeLevelProbe for FixedLevelProbe {
    fn controller_level(&self) -> CompatResult<BytecodeLevel> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn class_header(major: u16) -> Vec<u8> {
        let mut bytes = CLASS_FILE_MAGIC.to_be_bytes().to_vec();
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&major.to_be_bytes());
        bytes.extend_from_slice(&[0x00, 0x10]); // constant pool count
        bytes
    }

    fn class_file(major: u16) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&class_header(major)).unwrap();
        file
    }

    #[test]
    fn test_level_feature_conversion() {
        assert_eq!(BytecodeLevel::JAVA_8.feature(), 8);
        assert_eq!(BytecodeLevel::new(61).feature(), 17);
        assert_eq!(BytecodeLevel::from_feature(11), Some(BytecodeLevel::new(55)));
        assert_eq!(BytecodeLevel::from_feature(u64::MAX), None);
    }

    #[test]
    fn test_parse_class_header() {
        assert_eq!(
            parse_class_header(&class_header(52)).unwrap(),
            BytecodeLevel::JAVA_8
        );
        assert!(matches!(
            parse_class_header(&[0xCA, 0xFE]),
            Err(ClassFileError::Truncated)
        ));
        assert!(matches!(
            parse_class_header(b"PK\x03\x04\x00\x00\x00\x34"),
            Err(ClassFileError::BadMagic(0x504B_0304))
        ));
        assert!(matches!(
            parse_class_header(&class_header(12)),
            Err(ClassFileError::UnsupportedMajor(12))
        ));
    }

    #[test]
    fn test_release_table_lookup() {
        assert_eq!(level_for_release("1.1").unwrap(), BytecodeLevel::JAVA_1_1);
        assert_eq!(level_for_release("1.6").unwrap(), BytecodeLevel::JAVA_6);
        assert_eq!(level_for_release("6").unwrap(), BytecodeLevel::JAVA_6);
        assert_eq!(level_for_release("1.8.0_66").unwrap(), BytecodeLevel::JAVA_8);
        assert_eq!(level_for_release("8").unwrap(), BytecodeLevel::JAVA_8);
        assert_eq!(level_for_release("9").unwrap(), BytecodeLevel::JAVA_9);
    }

    #[test]
    fn test_release_table_newest_tier_wins_beyond_last_boundary() {
        assert_eq!(level_for_release("17.0.2").unwrap(), BytecodeLevel::JAVA_9);
        assert_eq!(level_for_release("99.9").unwrap(), BytecodeLevel::JAVA_9);
    }

    #[test]
    fn test_release_table_below_first_boundary_gets_oldest_tier() {
        assert_eq!(level_for_release("0.9").unwrap(), BytecodeLevel::JAVA_1_1);
    }

    #[test]
    fn test_release_unparseable_exhausts_probe() {
        let err = level_for_release("unknown").unwrap_err();
        assert!(matches!(err, CompatError::ProbeExhausted(_)));
    }

    #[test]
    fn test_probe_reads_class_file_first() {
        let file = class_file(61);
        let probe = ClassFileProbe::new()
            .with_artifact(file.path())
            .with_release("1.8");
        assert_eq!(probe.controller_level().unwrap(), BytecodeLevel::new(61));
    }

    #[test]
    fn test_probe_falls_back_on_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let probe = ClassFileProbe::new()
            .with_artifact(dir.path().join("Missing.class"))
            .with_release("1.7.0");
        assert_eq!(probe.controller_level().unwrap(), BytecodeLevel::JAVA_7);
    }

    #[test]
    fn test_probe_falls_back_on_bad_signature() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"#!/bin/sh\necho not a class\n").unwrap();
        let probe = ClassFileProbe::new()
            .with_artifact(file.path())
            .with_release("8");
        assert_eq!(probe.controller_level().unwrap(), BytecodeLevel::JAVA_8);
    }

    #[test]
    fn test_probe_exhausted_without_release() {
        let dir = tempfile::tempdir().unwrap();
        let probe = ClassFileProbe::new().with_artifact(dir.path().join("Missing.class"));
        assert!(matches!(
            probe.controller_level(),
            Err(CompatError::ProbeExhausted(_))
        ));
        assert!(ClassFileProbe::new().controller_level().is_err());
    }
}
