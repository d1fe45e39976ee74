//! Key codes, key repertoires and the target's capability set.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A platform key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const HOME: KeyCode = KeyCode(3);
    pub const BACK: KeyCode = KeyCode(4);
    pub const CALL: KeyCode = KeyCode(5);
    pub const ENDCALL: KeyCode = KeyCode(6);
    pub const DPAD_UP: KeyCode = KeyCode(19);
    pub const DPAD_DOWN: KeyCode = KeyCode(20);
    pub const DPAD_LEFT: KeyCode = KeyCode(21);
    pub const DPAD_RIGHT: KeyCode = KeyCode(22);
    pub const DPAD_CENTER: KeyCode = KeyCode(23);
    pub const VOLUME_UP: KeyCode = KeyCode(24);
    pub const VOLUME_DOWN: KeyCode = KeyCode(25);
    pub const POWER: KeyCode = KeyCode(26);
    pub const MENU: KeyCode = KeyCode(82);
    pub const MUTE: KeyCode = KeyCode(91);
    pub const VOLUME_MUTE: KeyCode = KeyCode(164);
    pub const SLEEP: KeyCode = KeyCode(223);
    pub const SOFT_SLEEP: KeyCode = KeyCode(276);

    /// Keys that would put the target to sleep or hang up; never generated.
    pub fn is_denied(self) -> bool {
        matches!(
            self,
            KeyCode::POWER | KeyCode::ENDCALL | KeyCode::SLEEP | KeyCode::SOFT_SLEEP
        )
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KEYCODE({})", self.0)
    }
}

/// Highest key code the generator will ever draw.
pub const MAX_KEY_CODE: u16 = 288;

/// Key events that move around the UI.
pub const NAV_KEYS: [KeyCode; 4] = [
    KeyCode::DPAD_UP,
    KeyCode::DPAD_DOWN,
    KeyCode::DPAD_LEFT,
    KeyCode::DPAD_RIGHT,
];

/// Key events that perform major navigation (sent less often).
pub const MAJOR_NAV_KEYS: [KeyCode; 2] = [KeyCode::MENU, KeyCode::DPAD_CENTER];

/// Key events that perform system operations.
pub const SYS_KEYS: [KeyCode; 8] = [
    KeyCode::HOME,
    KeyCode::BACK,
    KeyCode::CALL,
    KeyCode::ENDCALL,
    KeyCode::VOLUME_UP,
    KeyCode::VOLUME_DOWN,
    KeyCode::VOLUME_MUTE,
    KeyCode::MUTE,
];

/// Which inputs the target actually supports.
///
/// Abstracted behind a trait so the capability query can be backed by the
/// live target in production and by a fixed set in tests.
pub trait Capabilities {
    fn has_key(&self, code: KeyCode) -> bool;
}

/// Physical key availability: every key exists unless listed as missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalKeys {
    missing: BTreeSet<KeyCode>,
}

impl PhysicalKeys {
    /// A target with every key available.
    pub fn all() -> Self {
        Self::default()
    }

    /// A target lacking the given keys.
    pub fn without(keys: impl IntoIterator<Item = KeyCode>) -> Self {
        Self {
            missing: keys.into_iter().collect(),
        }
    }

    /// Probe only the system keys through `probe`; all other keys are
    /// assumed present.
    pub fn probe_system_keys(probe: impl Fn(KeyCode) -> bool) -> Self {
        Self::without(SYS_KEYS.iter().copied().filter(|k| !probe(*k)))
    }

    pub fn missing(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.missing.iter().copied()
    }
}

impl Capabilities for PhysicalKeys {
    fn has_key(&self, code: KeyCode) -> bool {
        !self.missing.contains(&code)
    }
}
