use serde::{Deserialize, Serialize};
use tracing::info;

use crate::keys::{Capabilities, KeyCode, MAJOR_NAV_KEYS, NAV_KEYS, SYS_KEYS};

/// Event categories, in the fixed declaration order used for sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Touch,
    Motion,
    PinchZoom,
    Trackball,
    Rotation,
    Permission,
    Nav,
    MajorNav,
    SysKeys,
    AppSwitch,
    Flip,
    AnyKey,
}

impl Category {
    pub const COUNT: usize = 12;

    pub const ALL: [Category; Category::COUNT] = [
        Category::Touch,
        Category::Motion,
        Category::PinchZoom,
        Category::Trackball,
        Category::Rotation,
        Category::Permission,
        Category::Nav,
        Category::MajorNav,
        Category::SysKeys,
        Category::AppSwitch,
        Category::Flip,
        Category::AnyKey,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// The fixed key repertoire a category draws from, if any.
    pub fn key_repertoire(self) -> Option<&'static [KeyCode]> {
        match self {
            Category::Nav => Some(&NAV_KEYS),
            Category::MajorNav => Some(&MAJOR_NAV_KEYS),
            Category::SysKeys => Some(&SYS_KEYS),
            _ => None,
        }
    }

    /// Whether the category is emitted as a key down/up pair.
    pub fn is_key(self) -> bool {
        matches!(
            self,
            Category::Nav | Category::MajorNav | Category::SysKeys | Category::AnyKey
        )
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Category::Touch => "touch",
            Category::Motion => "motion",
            Category::PinchZoom => "pinchzoom",
            Category::Trackball => "trackball",
            Category::Rotation => "rotation",
            Category::Permission => "permission",
            Category::Nav => "nav",
            Category::MajorNav => "majornav",
            Category::SysKeys => "syskeys",
            Category::AppSwitch => "appswitch",
            Category::Flip => "flip",
            Category::AnyKey => "anykey",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WeightError {
    #[error("event weights > 100% (user total {user_sum}%)")]
    OverAllocated { user_sum: f64 },

    #[error("event weights != 100% (user total {user_sum}%, every category specified)")]
    Incomplete { user_sum: f64 },

    #[error("{category} has no physical keys but with factor {weight}%")]
    MissingKeys { category: Category, weight: f64 },
}

/// Raw category weights before normalization.
///
/// A positive entry is a default placeholder that absorbs whatever the user
/// leaves unassigned. A zero or negative entry is user-specified; its
/// magnitude is the requested percentage.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTable {
    factors: [f64; Category::COUNT],
}

impl WeightTable {
    /// The stock distribution. Rotation and permission start disabled.
    pub fn new() -> Self {
        let mut factors = [0.0; Category::COUNT];
        factors[Category::Touch.index()] = 15.0;
        factors[Category::Motion.index()] = 10.0;
        factors[Category::PinchZoom.index()] = 2.0;
        factors[Category::Trackball.index()] = 15.0;
        factors[Category::Rotation.index()] = 0.0;
        factors[Category::Permission.index()] = 0.0;
        factors[Category::Nav.index()] = 25.0;
        factors[Category::MajorNav.index()] = 15.0;
        factors[Category::SysKeys.index()] = 2.0;
        factors[Category::AppSwitch.index()] = 2.0;
        factors[Category::Flip.index()] = 1.0;
        factors[Category::AnyKey.index()] = 13.0;
        Self { factors }
    }

    /// Pin a category to an explicit user percentage.
    pub fn set_percentage(&mut self, category: Category, percent: f64) {
        self.factors[category.index()] = -percent.abs();
    }

    pub fn raw(&self, category: Category) -> f64 {
        self.factors[category.index()]
    }

    pub fn is_user_specified(&self, category: Category) -> bool {
        self.factors[category.index()] <= 0.0
    }

    /// Rescale defaults around the user-specified percentages, check key
    /// availability, and convert to a cumulative distribution.
    pub fn normalize<C: Capabilities + ?Sized>(
        &self,
        capabilities: &C,
        verbose: u8,
    ) -> Result<Distribution, WeightError> {
        let mut user_sum = 0.0;
        let mut default_sum = 0.0;
        let mut default_count = 0usize;
        for &factor in &self.factors {
            if factor <= 0.0 {
                user_sum -= factor;
            } else {
                default_sum += factor;
                default_count += 1;
            }
        }

        if user_sum > 100.0 {
            return Err(WeightError::OverAllocated { user_sum });
        }
        if default_count == 0 && !(99.9..=100.1).contains(&user_sum) {
            return Err(WeightError::Incomplete { user_sum });
        }

        let adjustment = if default_sum > 0.0 {
            (100.0 - user_sum) / default_sum
        } else {
            0.0
        };

        let mut percentages = [0.0; Category::COUNT];
        for (slot, &factor) in percentages.iter_mut().zip(&self.factors) {
            *slot = if factor <= 0.0 {
                -factor
            } else {
                factor * adjustment
            };
        }

        if verbose > 0 {
            info!("Event percentages:");
            for category in Category::ALL {
                info!(%category, percent = percentages[category.index()], "  weight");
            }
        }

        for category in Category::ALL {
            if let Some(keys) = category.key_repertoire() {
                let weight = percentages[category.index()];
                if weight >= 0.1 && !keys.iter().any(|k| capabilities.has_key(*k)) {
                    return Err(WeightError::MissingKeys { category, weight });
                }
            }
        }

        let mut thresholds = [0.0; Category::COUNT];
        let mut running = 0.0;
        for (threshold, percent) in thresholds.iter_mut().zip(&percentages) {
            running += percent / 100.0;
            *threshold = running;
        }

        Ok(Distribution {
            percentages,
            thresholds,
        })
    }
}

impl Default for WeightTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalized, immutable cumulative distribution over categories.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    percentages: [f64; Category::COUNT],
    thresholds: [f64; Category::COUNT],
}

impl Distribution {
    /// First category whose cumulative threshold exceeds `draw`. Anything
    /// past the flip threshold falls through to `AnyKey`.
    pub fn select(&self, draw: f64) -> Category {
        Category::ALL[..Category::COUNT - 1]
            .iter()
            .copied()
            .find(|c| draw < self.thresholds[c.index()])
            .unwrap_or(Category::AnyKey)
    }

    pub fn percentage(&self, category: Category) -> f64 {
        self.percentages[category.index()]
    }

    pub fn threshold(&self, category: Category) -> f64 {
        self.thresholds[category.index()]
    }

    pub fn thresholds(&self) -> &[f64; Category::COUNT] {
        &self.thresholds
    }

    /// Final cumulative value; 1.0 for any valid table.
    pub fn total(&self) -> f64 {
        self.thresholds[Category::COUNT - 1]
    }
}
