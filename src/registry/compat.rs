// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Known incompatibilities of schema compiler versions.
//!
//! Registries check the table when they are created and log a warning for each entry
//! matching [`COMPILER_VERSION`]. Nothing is patched.

use semver::{Version, VersionReq};
use tracing::{debug, warn};

/// Version of the schema compiler registries run against.
pub const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");

const KNOWN_ISSUES: &[(&str, &str)] = &[
    (
        "<0.1.0",
        "contributor annotations are only resolved on the outermost layer of a field; registries nested in lists or maps are not seen",
    ),
    (
        "<0.1.0",
        "a failed forced rebuild keeps the previous validator instead of recompiling on next use",
    ),
];

lazy_static::lazy_static! {
    static ref ISSUE_TABLE: Vec<(VersionReq, &'static str)> = KNOWN_ISSUES
        .iter()
        .filter_map(|(req, message)| VersionReq::parse(req).ok().map(|req| (req, *message)))
        .collect();
}

/// Issues known to affect `version`.
pub fn known_issues(version: &Version) -> Vec<&'static str> {
    ISSUE_TABLE
        .iter()
        .filter(|(req, _)| req.matches(version))
        .map(|(_, message)| *message)
        .collect()
}

pub(crate) fn warn_known_issues() {
    let version = match Version::parse(COMPILER_VERSION) {
        Ok(version) => version,
        Err(e) => {
            debug!(version = COMPILER_VERSION, error = %e, "unparsable compiler version");
            return;
        }
    };

    for issue in known_issues(&version) {
        warn!(compiler_version = %version, "known schema compiler issue: {issue}");
    }
}
