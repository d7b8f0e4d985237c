use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Schema generation of the avatar extension block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VrmVersion {
    #[default]
    #[serde(rename = "0.x")]
    V0,
    #[serde(rename = "1.0")]
    V1,
}

impl VrmVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            VrmVersion::V0 => "0.x",
            VrmVersion::V1 => "1.0",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "0" | "0.x" | "0.0" | "vrm0" => Some(VrmVersion::V0),
            "1" | "1.0" | "vrm1" => Some(VrmVersion::V1),
            _ => None,
        }
    }
}

/// Version-agnostic avatar metadata. Every reference is held by host name
/// (bone, mesh, material, shape key) and resolved to glTF indices on export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VrmMetadata {
    /// Generation the model was read from; `None` for host-authored data.
    pub source_version: Option<VrmVersion>,
    /// Degrade missing required humanoid bones to a warning.
    pub allow_non_humanoid: bool,
    pub meta: AvatarMeta,
    pub humanoid: Humanoid,
    pub first_person: FirstPerson,
    pub look_at: LookAt,
    pub expressions: Vec<Expression>,
    pub spring_bone: SpringBone,
}

// ─── Meta ─────────────────────────────────────────────────────────────────────

/// Licence and credit information, stored with the newer field set.
#[derive(Debug, Clone, PartialEq)]
pub struct AvatarMeta {
    pub name: String,
    pub version: String,
    pub authors: Vec<String>,
    pub copyright_information: String,
    pub contact_information: String,
    pub references: Vec<String>,
    /// Scene image index used as thumbnail.
    pub thumbnail_image: Option<usize>,
    pub avatar_permission: AvatarPermission,
    pub allow_excessively_violent_usage: bool,
    pub allow_excessively_sexual_usage: bool,
    pub commercial_usage: CommercialUsage,
    pub allow_political_or_religious_usage: bool,
    pub allow_antisocial_or_hate_usage: bool,
    pub credit_notation: CreditNotation,
    pub allow_redistribution: bool,
    pub modification: Modification,
    pub license_url: String,
    pub third_party_licenses: String,
    pub other_license_url: String,
}

impl Default for AvatarMeta {
    fn default() -> Self {
        Self {
            name: String::new(),
            version: String::new(),
            authors: Vec::new(),
            copyright_information: String::new(),
            contact_information: String::new(),
            references: Vec::new(),
            thumbnail_image: None,
            avatar_permission: AvatarPermission::OnlyAuthor,
            allow_excessively_violent_usage: false,
            allow_excessively_sexual_usage: false,
            commercial_usage: CommercialUsage::PersonalNonProfit,
            allow_political_or_religious_usage: false,
            allow_antisocial_or_hate_usage: false,
            credit_notation: CreditNotation::Required,
            allow_redistribution: false,
            modification: Modification::Prohibited,
            license_url: "https://vrm.dev/licenses/1.0/".to_string(),
            third_party_licenses: String::new(),
            other_license_url: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarPermission {
    OnlyAuthor,
    OnlySeparatelyLicensedPerson,
    Everyone,
}

impl AvatarPermission {
    pub fn vrm0_name(self) -> &'static str {
        match self {
            AvatarPermission::OnlyAuthor => "OnlyAuthor",
            AvatarPermission::OnlySeparatelyLicensedPerson => "ExplicitlyLicensedPerson",
            AvatarPermission::Everyone => "Everyone",
        }
    }

    pub fn vrm1_name(self) -> &'static str {
        match self {
            AvatarPermission::OnlyAuthor => "onlyAuthor",
            AvatarPermission::OnlySeparatelyLicensedPerson => "onlySeparatelyLicensedPerson",
            AvatarPermission::Everyone => "everyone",
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "ExplicitlyLicensedPerson" | "onlySeparatelyLicensedPerson" => {
                AvatarPermission::OnlySeparatelyLicensedPerson
            }
            "Everyone" | "everyone" => AvatarPermission::Everyone,
            _ => AvatarPermission::OnlyAuthor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommercialUsage {
    PersonalNonProfit,
    PersonalProfit,
    Corporation,
}

impl CommercialUsage {
    pub fn vrm1_name(self) -> &'static str {
        match self {
            CommercialUsage::PersonalNonProfit => "personalNonProfit",
            CommercialUsage::PersonalProfit => "personalProfit",
            CommercialUsage::Corporation => "corporation",
        }
    }

    pub fn from_vrm1_name(name: &str) -> Self {
        match name {
            "personalProfit" => CommercialUsage::PersonalProfit,
            "corporation" => CommercialUsage::Corporation,
            _ => CommercialUsage::PersonalNonProfit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditNotation {
    Required,
    Unnecessary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modification {
    Prohibited,
    AllowModification,
    AllowModificationRedistribution,
}

impl Modification {
    pub fn vrm1_name(self) -> &'static str {
        match self {
            Modification::Prohibited => "prohibited",
            Modification::AllowModification => "allowModification",
            Modification::AllowModificationRedistribution => "allowModificationRedistribution",
        }
    }

    pub fn from_vrm1_name(name: &str) -> Self {
        match name {
            "allowModification" => Modification::AllowModification,
            "allowModificationRedistribution" => Modification::AllowModificationRedistribution,
            _ => Modification::Prohibited,
        }
    }
}

// ─── Humanoid ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Humanoid {
    /// Humanoid bone name (newer naming) to armature bone name.
    pub bones: BTreeMap<String, String>,
}

impl Humanoid {
    pub fn bone(&self, human_bone: &str) -> Option<&str> {
        self.bones.get(human_bone).map(String::as_str)
    }

    pub fn is_humanoid_bone(&self, bone_name: &str) -> bool {
        self.bones.values().any(|name| name == bone_name)
    }
}

// ─── First person / look-at ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct FirstPerson {
    /// Bone the viewpoint hangs off; the head when unset.
    pub bone: Option<String>,
    /// Viewpoint offset from `bone` in host axes.
    pub bone_offset: [f32; 3],
    pub mesh_annotations: Vec<MeshAnnotation>,
}

impl Default for FirstPerson {
    fn default() -> Self {
        Self {
            bone: None,
            bone_offset: [0.0, 0.0, 0.06],
            mesh_annotations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshAnnotation {
    pub mesh: String,
    pub flag: FirstPersonFlag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FirstPersonFlag {
    #[default]
    Auto,
    Both,
    ThirdPersonOnly,
    FirstPersonOnly,
}

impl FirstPersonFlag {
    pub fn vrm0_name(self) -> &'static str {
        match self {
            FirstPersonFlag::Auto => "Auto",
            FirstPersonFlag::Both => "Both",
            FirstPersonFlag::ThirdPersonOnly => "ThirdPersonOnly",
            FirstPersonFlag::FirstPersonOnly => "FirstPersonOnly",
        }
    }

    pub fn vrm1_name(self) -> &'static str {
        match self {
            FirstPersonFlag::Auto => "auto",
            FirstPersonFlag::Both => "both",
            FirstPersonFlag::ThirdPersonOnly => "thirdPersonOnly",
            FirstPersonFlag::FirstPersonOnly => "firstPersonOnly",
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "Both" | "both" => FirstPersonFlag::Both,
            "ThirdPersonOnly" | "thirdPersonOnly" => FirstPersonFlag::ThirdPersonOnly,
            "FirstPersonOnly" | "firstPersonOnly" => FirstPersonFlag::FirstPersonOnly,
            _ => FirstPersonFlag::Auto,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookAtKind {
    #[default]
    Bone,
    Expression,
}

/// Linear eye-rotation mapping: input degrees up to `input_max_value` map to
/// `output_scale` degrees (bone) or expression weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookAtRangeMap {
    pub input_max_value: f32,
    pub output_scale: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookAt {
    pub kind: LookAtKind,
    pub horizontal_inner: LookAtRangeMap,
    pub horizontal_outer: LookAtRangeMap,
    pub vertical_down: LookAtRangeMap,
    pub vertical_up: LookAtRangeMap,
}

impl Default for LookAt {
    fn default() -> Self {
        let bone_range = LookAtRangeMap {
            input_max_value: 90.0,
            output_scale: 10.0,
        };
        Self {
            kind: LookAtKind::Bone,
            horizontal_inner: bone_range,
            horizontal_outer: bone_range,
            vertical_down: bone_range,
            vertical_up: bone_range,
        }
    }
}

// ─── Expressions ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionPreset {
    Custom,
    Neutral,
    Happy,
    Angry,
    Sad,
    Relaxed,
    Surprised,
    Aa,
    Ih,
    Ou,
    Ee,
    Oh,
    Blink,
    BlinkLeft,
    BlinkRight,
    LookUp,
    LookDown,
    LookLeft,
    LookRight,
}

const PRESET_NAMES: [(ExpressionPreset, Option<&str>, &str); 18] = [
    (ExpressionPreset::Neutral, Some("neutral"), "neutral"),
    (ExpressionPreset::Happy, Some("joy"), "happy"),
    (ExpressionPreset::Angry, Some("angry"), "angry"),
    (ExpressionPreset::Sad, Some("sorrow"), "sad"),
    (ExpressionPreset::Relaxed, Some("fun"), "relaxed"),
    (ExpressionPreset::Surprised, None, "surprised"),
    (ExpressionPreset::Aa, Some("a"), "aa"),
    (ExpressionPreset::Ih, Some("i"), "ih"),
    (ExpressionPreset::Ou, Some("u"), "ou"),
    (ExpressionPreset::Ee, Some("e"), "ee"),
    (ExpressionPreset::Oh, Some("o"), "oh"),
    (ExpressionPreset::Blink, Some("blink"), "blink"),
    (ExpressionPreset::BlinkLeft, Some("blink_l"), "blinkLeft"),
    (ExpressionPreset::BlinkRight, Some("blink_r"), "blinkRight"),
    (ExpressionPreset::LookUp, Some("lookup"), "lookUp"),
    (ExpressionPreset::LookDown, Some("lookdown"), "lookDown"),
    (ExpressionPreset::LookLeft, Some("lookleft"), "lookLeft"),
    (ExpressionPreset::LookRight, Some("lookright"), "lookRight"),
];

impl ExpressionPreset {
    /// Legacy `presetName`; custom expressions and presets the legacy
    /// schema lacks use `unknown`.
    pub fn vrm0_name(self) -> &'static str {
        PRESET_NAMES
            .iter()
            .find(|(preset, _, _)| *preset == self)
            .and_then(|(_, name, _)| *name)
            .unwrap_or("unknown")
    }

    /// Key under `expressions.preset`; `None` for custom expressions.
    pub fn vrm1_name(self) -> Option<&'static str> {
        PRESET_NAMES
            .iter()
            .find(|(preset, _, _)| *preset == self)
            .map(|(_, _, name)| *name)
    }

    pub fn from_vrm0_name(name: &str) -> Self {
        PRESET_NAMES
            .iter()
            .find(|(_, vrm0, _)| *vrm0 == Some(name))
            .map(|(preset, _, _)| *preset)
            .unwrap_or(ExpressionPreset::Custom)
    }

    pub fn from_vrm1_name(name: &str) -> Self {
        PRESET_NAMES
            .iter()
            .find(|(_, _, vrm1)| *vrm1 == name)
            .map(|(preset, _, _)| *preset)
            .unwrap_or(ExpressionPreset::Custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpressionOverride {
    #[default]
    None,
    Block,
    Blend,
}

impl ExpressionOverride {
    pub fn vrm1_name(self) -> &'static str {
        match self {
            ExpressionOverride::None => "none",
            ExpressionOverride::Block => "block",
            ExpressionOverride::Blend => "blend",
        }
    }

    pub fn from_vrm1_name(name: &str) -> Self {
        match name {
            "block" => ExpressionOverride::Block,
            "blend" => ExpressionOverride::Blend,
            _ => ExpressionOverride::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub name: String,
    pub preset: ExpressionPreset,
    pub is_binary: bool,
    pub morph_target_binds: Vec<MorphTargetBind>,
    pub material_color_binds: Vec<MaterialColorBind>,
    pub texture_transform_binds: Vec<TextureTransformBind>,
    pub override_blink: ExpressionOverride,
    pub override_look_at: ExpressionOverride,
    pub override_mouth: ExpressionOverride,
}

impl Expression {
    pub fn new(name: impl Into<String>, preset: ExpressionPreset) -> Self {
        Self {
            name: name.into(),
            preset,
            is_binary: false,
            morph_target_binds: Vec::new(),
            material_color_binds: Vec::new(),
            texture_transform_binds: Vec::new(),
            override_blink: ExpressionOverride::None,
            override_look_at: ExpressionOverride::None,
            override_mouth: ExpressionOverride::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MorphTargetBind {
    pub mesh: String,
    pub shape_key: String,
    /// Normalized 0..1.
    pub weight: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialColorKind {
    Color,
    EmissionColor,
    ShadeColor,
    MatcapColor,
    RimColor,
    OutlineColor,
}

const COLOR_KIND_NAMES: [(MaterialColorKind, Option<&str>, &str); 6] = [
    (MaterialColorKind::Color, Some("_Color"), "color"),
    (MaterialColorKind::EmissionColor, Some("_EmissionColor"), "emissionColor"),
    (MaterialColorKind::ShadeColor, Some("_ShadeColor"), "shadeColor"),
    (MaterialColorKind::MatcapColor, None, "matcapColor"),
    (MaterialColorKind::RimColor, Some("_RimColor"), "rimColor"),
    (MaterialColorKind::OutlineColor, Some("_OutlineColor"), "outlineColor"),
];

impl MaterialColorKind {
    /// Legacy material property name; the matcap colour has none.
    pub fn vrm0_property(self) -> Option<&'static str> {
        COLOR_KIND_NAMES
            .iter()
            .find(|(kind, _, _)| *kind == self)
            .and_then(|(_, name, _)| *name)
    }

    pub fn vrm1_name(self) -> &'static str {
        COLOR_KIND_NAMES
            .iter()
            .find(|(kind, _, _)| *kind == self)
            .map(|(_, _, name)| *name)
            .unwrap_or("color")
    }

    pub fn from_vrm0_property(name: &str) -> Option<Self> {
        COLOR_KIND_NAMES
            .iter()
            .find(|(_, vrm0, _)| *vrm0 == Some(name))
            .map(|(kind, _, _)| *kind)
    }

    pub fn from_vrm1_name(name: &str) -> Option<Self> {
        COLOR_KIND_NAMES
            .iter()
            .find(|(_, _, vrm1)| *vrm1 == name)
            .map(|(kind, _, _)| *kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialColorBind {
    pub material: String,
    pub kind: MaterialColorKind,
    pub target: [f32; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureTransformBind {
    pub material: String,
    pub scale: [f32; 2],
    pub offset: [f32; 2],
}

// ─── Spring bones ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpringBone {
    pub collider_groups: Vec<ColliderGroup>,
    pub groups: Vec<SpringGroup>,
}

/// Sphere colliders attached to one bone.
#[derive(Debug, Clone, PartialEq)]
pub struct ColliderGroup {
    pub name: String,
    pub bone: String,
    pub colliders: Vec<SphereCollider>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereCollider {
    /// Offset from the bone head in host axes.
    pub offset: [f32; 3],
    pub radius: f32,
}

/// Spring chains sharing one parameter set.
#[derive(Debug, Clone, PartialEq)]
pub struct SpringGroup {
    pub comment: String,
    pub stiffness: f32,
    pub gravity_power: f32,
    /// Host axes.
    pub gravity_dir: [f32; 3],
    pub drag_force: f32,
    pub hit_radius: f32,
    pub center: Option<String>,
    /// Chain root bones; each chain continues through first children.
    pub bones: Vec<String>,
    /// Indices into [`SpringBone::collider_groups`].
    pub collider_groups: Vec<usize>,
}

impl Default for SpringGroup {
    fn default() -> Self {
        Self {
            comment: String::new(),
            stiffness: 1.0,
            gravity_power: 0.0,
            gravity_dir: [0.0, 0.0, -1.0],
            drag_force: 0.4,
            hit_radius: 0.02,
            center: None,
            bones: Vec::new(),
            collider_groups: Vec::new(),
        }
    }
}
