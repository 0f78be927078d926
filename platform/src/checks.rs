// Licensed under the Apache-2.0 license

//! Vendor and class identity condition checks.
//!
//! A mismatch is a failed manifest condition, not a fatal error; try-each
//! branches in a manifest rely on the distinction.

use suit_types::{ManifestClassId, SuitError, SuitResult, Uuid};

pub fn check_vid(expected: &Uuid, actual: &Uuid) -> SuitResult<()> {
    if expected == actual {
        Ok(())
    } else {
        log::info!("vendor id condition failed");
        Err(SuitError::FailCondition)
    }
}

pub fn check_cid(expected: &ManifestClassId, actual: &ManifestClassId) -> SuitResult<()> {
    if expected == actual {
        Ok(())
    } else {
        log::info!("class id condition failed");
        Err(SuitError::FailCondition)
    }
}
