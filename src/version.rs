//! Interface versioning and the compatibility rule
//!
//! Every service carries a major.minor interface version. Minor bumps are
//! append-only vtable extensions; major bumps break layout.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InterfaceVersion {
    pub major: u16,
    pub minor: u16,
}

impl InterfaceVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        InterfaceVersion { major, minor }
    }

    /// Compatibility rule for the whole export mechanism: the server-provided
    /// version satisfies a module's required version iff the majors match and
    /// the server's minor is at least the required minor. A module compiled
    /// against a later minor would call vtable members the server never
    /// published, so it is rejected.
    pub fn satisfies(&self, required: InterfaceVersion) -> bool {
        self.major == required.major && self.minor >= required.minor
    }
}

impl fmt::Display for InterfaceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
