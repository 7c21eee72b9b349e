//! Operating mode of the running client.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Process-wide operating mode, chosen by the host application.
///
/// `Demo` populates identity and memberships synthetically without any
/// backend credential. `Live` authenticates against the real backend.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OperatingMode {
    #[default]
    Demo,
    Live,
}

impl OperatingMode {
    pub fn is_demo(self) -> bool {
        matches!(self, Self::Demo)
    }

    pub fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }
}
