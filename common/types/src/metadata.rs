// Licensed under the Apache-2.0 license

//! Manifest metadata: semantic versions and manifest roles.

use crate::error::{SuitError, SuitResult};

/// Release type of a manifest version, encoded in the suit-semantic-version
/// sequence as a negative integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleaseType {
    #[default]
    Normal,
    Rc,
    Beta,
    Alpha,
}

impl ReleaseType {
    fn from_raw(raw: i32) -> Option<ReleaseType> {
        match raw {
            -1 => Some(ReleaseType::Rc),
            -2 => Some(ReleaseType::Beta),
            -3 => Some(ReleaseType::Alpha),
            _ => None,
        }
    }
}

/// Semantic version of a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ManifestVersion {
    pub release_type: ReleaseType,
    pub major: i32,
    pub minor: i32,
    pub patch: i32,
    pub pre_release_number: i32,
}

impl ManifestVersion {
    /// Parse a suit-semantic-version integer sequence.
    ///
    /// Accepted shapes: `[major]`, `[major, minor]`, `[major, minor, patch]`,
    /// optionally terminated by a negative release-type entry and one
    /// trailing non-negative pre-release counter. Anything after the release
    /// type other than that single counter is out of bounds.
    pub fn from_array(array: &[i32]) -> SuitResult<ManifestVersion> {
        if array.is_empty() {
            return Err(SuitError::SizeLimit);
        }
        if array[0] < 0 {
            return Err(SuitError::OutOfBounds);
        }

        let mut version = ManifestVersion::default();
        for (i, &value) in array.iter().enumerate() {
            if value >= 0 {
                match i {
                    0 => version.major = value,
                    1 => version.minor = value,
                    2 => version.patch = value,
                    _ => return Err(SuitError::OutOfBounds),
                }
            } else {
                version.release_type =
                    ReleaseType::from_raw(value).ok_or(SuitError::OutOfBounds)?;
                if array.len() == i + 2 && array[i + 1] >= 0 {
                    version.pre_release_number = array[i + 1];
                    return Ok(version);
                } else if array.len() == i + 1 {
                    return Ok(version);
                }
                // The release type ends the sequence.
                return Err(SuitError::OutOfBounds);
            }
        }

        Ok(version)
    }
}

/// Manifest role, encoded as two nibbles: domain id and index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ManifestRole {
    Unknown = 0x00,
    /// Entry point for all vendor-controlled manifests.
    SecTop = 0x10,
    SecSdfw = 0x11,
    SecSysctrl = 0x12,
    /// Entry point for all OEM-controlled manifests.
    AppRoot = 0x20,
    AppRecovery = 0x21,
    AppLocal1 = 0x22,
    AppLocal2 = 0x23,
    AppLocal3 = 0x24,
    RadRecovery = 0x30,
    RadLocal1 = 0x31,
    RadLocal2 = 0x32,
}

impl ManifestRole {
    pub fn from_raw(raw: u8) -> Option<ManifestRole> {
        match raw {
            0x10 => Some(ManifestRole::SecTop),
            0x11 => Some(ManifestRole::SecSdfw),
            0x12 => Some(ManifestRole::SecSysctrl),
            0x20 => Some(ManifestRole::AppRoot),
            0x21 => Some(ManifestRole::AppRecovery),
            0x22 => Some(ManifestRole::AppLocal1),
            0x23 => Some(ManifestRole::AppLocal2),
            0x24 => Some(ManifestRole::AppLocal3),
            0x30 => Some(ManifestRole::RadRecovery),
            0x31 => Some(ManifestRole::RadLocal1),
            0x32 => Some(ManifestRole::RadLocal2),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_major_minor_patch() {
        let v = ManifestVersion::from_array(&[1, 2, 3]).unwrap();
        assert_eq!(v.major, 1);
        assert_eq!(v.minor, 2);
        assert_eq!(v.patch, 3);
        assert_eq!(v.release_type, ReleaseType::Normal);
    }

    #[test]
    fn test_version_short_forms() {
        let v = ManifestVersion::from_array(&[7]).unwrap();
        assert_eq!((v.major, v.minor, v.patch), (7, 0, 0));
        let v = ManifestVersion::from_array(&[7, 1]).unwrap();
        assert_eq!((v.major, v.minor, v.patch), (7, 1, 0));
    }

    #[test]
    fn test_version_release_types() {
        let v = ManifestVersion::from_array(&[1, 0, 0, -1]).unwrap();
        assert_eq!(v.release_type, ReleaseType::Rc);
        let v = ManifestVersion::from_array(&[1, -2, 4]).unwrap();
        assert_eq!(v.release_type, ReleaseType::Beta);
        assert_eq!(v.pre_release_number, 4);
        let v = ManifestVersion::from_array(&[2, 0, -3]).unwrap();
        assert_eq!(v.release_type, ReleaseType::Alpha);
    }

    #[test]
    fn test_version_invalid_sequences() {
        assert_eq!(ManifestVersion::from_array(&[]), Err(SuitError::SizeLimit));
        assert_eq!(ManifestVersion::from_array(&[-1]), Err(SuitError::OutOfBounds));
        // Unknown release type.
        assert_eq!(ManifestVersion::from_array(&[1, -4]), Err(SuitError::OutOfBounds));
        // Too many positional entries.
        assert_eq!(
            ManifestVersion::from_array(&[1, 2, 3, 4]),
            Err(SuitError::OutOfBounds)
        );
        // Trailing entries after the pre-release counter.
        assert_eq!(
            ManifestVersion::from_array(&[1, -1, 2, 3]),
            Err(SuitError::OutOfBounds)
        );
        // Negative pre-release counter.
        assert_eq!(
            ManifestVersion::from_array(&[1, -1, -1]),
            Err(SuitError::OutOfBounds)
        );
    }

    #[test]
    fn test_role_round_trip() {
        for raw in [0x10, 0x11, 0x12, 0x20, 0x21, 0x22, 0x23, 0x24, 0x30, 0x31, 0x32] {
            let role = ManifestRole::from_raw(raw).unwrap();
            assert_eq!(role as u8, raw);
        }
        assert_eq!(ManifestRole::from_raw(0x00), None);
        assert_eq!(ManifestRole::from_raw(0x40), None);
    }
}
