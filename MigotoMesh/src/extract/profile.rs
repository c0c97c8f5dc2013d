//! Engine convention profiles.

use serde::{Deserialize, Serialize};

/// Axis, winding and handedness conventions of the target engine.
///
/// The profile is passed explicitly through [`extract`](super::extract); there
/// is no process-global "current game" state. Adding a new engine means adding
/// a variant here and filling in every accessor - the exhaustive matches make
/// the compiler point at every convention decision the new engine has to make.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineProfile {
    /// Unity-style conventions: handedness is recovered from `TANGENT.w`,
    /// which stores the flipped bitangent sign.
    #[default]
    Unity,
    /// Unreal-style conventions (WWMI/WuWa targets): `TANGENT.w` is a fixed
    /// `1.0`, handedness travels in `NORMAL.w` as the flipped bitangent sign,
    /// the binormal's X/Y are negated, and the blend influence count comes
    /// from the schema instead of the fixed default 4.
    Unreal,
    /// Fixed-handedness conventions (YYSLS target): `TANGENT.w` and
    /// `BINORMAL.w` are a fixed `1.0`, and UNORM-encoded normals carry a
    /// constant `0` in the fourth channel.
    Yysls,
}

impl EngineProfile {
    /// Whether a 4-wide SNORM normal stores `-bitangent_sign` in its fourth
    /// channel.
    #[must_use]
    pub fn normal_w_carries_handedness(self) -> bool {
        match self {
            Self::Unreal => true,
            Self::Unity | Self::Yysls => false,
        }
    }

    /// Constant fourth channel for UNORM-encoded normals.
    #[must_use]
    pub fn unorm_normal_w(self) -> f32 {
        match self {
            Self::Yysls => 0.0,
            Self::Unity | Self::Unreal => 1.0,
        }
    }

    /// Whether `TANGENT.w` is a fixed `1.0` (handedness stored elsewhere)
    /// rather than the flipped bitangent sign.
    #[must_use]
    pub fn tangent_w_is_fixed_one(self) -> bool {
        match self {
            Self::Unreal | Self::Yysls => true,
            Self::Unity => false,
        }
    }

    /// Whether the binormal's X and Y components are negated before encoding.
    #[must_use]
    pub fn flip_binormal_xy(self) -> bool {
        match self {
            Self::Unreal => true,
            Self::Unity | Self::Yysls => false,
        }
    }

    /// Whether the per-vertex blend influence count is derived from the
    /// schema's `BLENDINDICES` widths instead of the fixed default 4.
    #[must_use]
    pub fn blend_influences_from_schema(self) -> bool {
        match self {
            Self::Unreal => true,
            Self::Unity | Self::Yysls => false,
        }
    }
}
