use serde::{Deserialize, Serialize};

use crate::error::ValidationIssue;
use crate::scene::VrmVersion;

// ─── Bone name constants ──────────────────────────────────────────────────────

/// Humanoid bones every avatar must map.
pub const REQUIRED_BONES: [&str; 17] = [
    "hips",
    "spine",
    "chest",
    "neck",
    "head",
    "leftUpperArm",
    "leftLowerArm",
    "leftHand",
    "rightUpperArm",
    "rightLowerArm",
    "rightHand",
    "leftUpperLeg",
    "leftLowerLeg",
    "leftFoot",
    "rightUpperLeg",
    "rightLowerLeg",
    "rightFoot",
];

/// `(ancestor, descendant)` pairs every humanoid skeleton must respect.
pub const REQUIRED_PARENT_RELATIONS: [(&str, &str); 12] = [
    ("hips", "spine"),
    ("spine", "chest"),
    ("chest", "neck"),
    ("neck", "head"),
    ("leftUpperArm", "leftLowerArm"),
    ("leftLowerArm", "leftHand"),
    ("rightUpperArm", "rightLowerArm"),
    ("rightLowerArm", "rightHand"),
    ("leftUpperLeg", "leftLowerLeg"),
    ("leftLowerLeg", "leftFoot"),
    ("rightUpperLeg", "rightLowerLeg"),
    ("rightLowerLeg", "rightFoot"),
];

/// Every humanoid bone in emission order, with the newer naming.
pub const HUMAN_BONES: [&str; 55] = [
    "hips",
    "spine",
    "chest",
    "upperChest",
    "neck",
    "head",
    "leftEye",
    "rightEye",
    "jaw",
    "leftUpperLeg",
    "leftLowerLeg",
    "leftFoot",
    "leftToes",
    "rightUpperLeg",
    "rightLowerLeg",
    "rightFoot",
    "rightToes",
    "leftShoulder",
    "leftUpperArm",
    "leftLowerArm",
    "leftHand",
    "rightShoulder",
    "rightUpperArm",
    "rightLowerArm",
    "rightHand",
    "leftThumbMetacarpal",
    "leftThumbProximal",
    "leftThumbDistal",
    "leftIndexProximal",
    "leftIndexIntermediate",
    "leftIndexDistal",
    "leftMiddleProximal",
    "leftMiddleIntermediate",
    "leftMiddleDistal",
    "leftRingProximal",
    "leftRingIntermediate",
    "leftRingDistal",
    "leftLittleProximal",
    "leftLittleIntermediate",
    "leftLittleDistal",
    "rightThumbMetacarpal",
    "rightThumbProximal",
    "rightThumbDistal",
    "rightIndexProximal",
    "rightIndexIntermediate",
    "rightIndexDistal",
    "rightMiddleProximal",
    "rightMiddleIntermediate",
    "rightMiddleDistal",
    "rightRingProximal",
    "rightRingIntermediate",
    "rightRingDistal",
    "rightLittleProximal",
    "rightLittleIntermediate",
    "rightLittleDistal",
];

/// Thumb bones were renamed one joint up between the two generations.
const THUMB_RENAMES: [(&str, &str); 4] = [
    ("leftThumbMetacarpal", "leftThumbProximal"),
    ("leftThumbProximal", "leftThumbIntermediate"),
    ("rightThumbMetacarpal", "rightThumbProximal"),
    ("rightThumbProximal", "rightThumbIntermediate"),
];

/// Legacy humanoid name for a bone.
pub(crate) fn vrm0_bone_name(name: &str) -> &str {
    THUMB_RENAMES
        .iter()
        .find(|(newer, _)| *newer == name)
        .map(|(_, legacy)| *legacy)
        .unwrap_or(name)
}

/// Newer humanoid name for a legacy bone name.
pub(crate) fn vrm1_bone_name(name: &str) -> &str {
    THUMB_RENAMES
        .iter()
        .find(|(_, legacy)| *legacy == name)
        .map(|(newer, _)| *newer)
        .unwrap_or(name)
}

/// Name of the synthetic transform root appended after every other node.
pub const SECONDARY_NODE_NAME: &str = "secondary";

// ─── Public types ─────────────────────────────────────────────────────────────

/// Export options, stored in option files and passed by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExportOptions {
    /// Schema generation to write.
    pub target_version: VrmVersion,
    /// `asset.generator` string.
    pub generator: String,
    /// Emit morph-target NORMAL deltas. Only honoured for 0.x output.
    pub export_morph_normals: bool,
    /// Emit host custom properties as node/material `extras`.
    pub export_extras: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            target_version: VrmVersion::V0,
            generator: concat!("vrm-codec ", env!("CARGO_PKG_VERSION")).to_string(),
            export_morph_normals: true,
            export_extras: true,
        }
    }
}

/// Texture metadata probed from embedded images.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextureInfo {
    pub index: usize,
    pub width: u32,
    pub height: u32,
}

/// Summary returned after writing a file.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub version: VrmVersion,
    pub node_count: usize,
    pub mesh_count: usize,
    pub skin_count: usize,
    pub material_count: usize,
    pub total_vertices: usize,
    pub total_triangles: usize,
    pub issues: Vec<ValidationIssue>,
}

/// Summary returned after reading a file.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub version: VrmVersion,
    pub model_name: String,
    pub author: Option<String>,
    pub bone_count: usize,
    pub mesh_count: usize,
    pub total_vertices: usize,
    pub total_polygons: usize,
    pub material_count: usize,
    pub missing_required_bones: Vec<String>,
    pub texture_infos: Vec<TextureInfo>,
    pub issues: Vec<ValidationIssue>,
}

/// Summary of a cross-generation rewrite.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub from: VrmVersion,
    pub to: VrmVersion,
    pub import: ImportReport,
    pub export: ExportReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_thumb_bones_when_renaming_then_generations_shift_by_one_joint() {
        assert_eq!(vrm0_bone_name("leftThumbMetacarpal"), "leftThumbProximal");
        assert_eq!(vrm0_bone_name("leftThumbProximal"), "leftThumbIntermediate");
        assert_eq!(vrm0_bone_name("leftThumbDistal"), "leftThumbDistal");
        assert_eq!(vrm1_bone_name("rightThumbIntermediate"), "rightThumbProximal");
        assert_eq!(vrm1_bone_name("hips"), "hips");
    }

    #[test]
    fn given_partial_option_json_when_deserializing_then_defaults_fill_the_rest() {
        let options: ExportOptions =
            serde_json::from_value(serde_json::json!({"target_version": "1.0"}))
                .expect("options should deserialize");

        assert_eq!(options.target_version, VrmVersion::V1);
        assert!(options.export_morph_normals);
        assert!(options.generator.starts_with("vrm-codec"));
    }

    #[test]
    fn given_required_bones_when_checking_table_then_all_are_human_bones() {
        for bone in REQUIRED_BONES {
            assert!(HUMAN_BONES.contains(&bone), "{bone} missing");
        }
    }
}
