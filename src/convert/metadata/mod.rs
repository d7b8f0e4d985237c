//! Avatar extension block: emission at either schema generation and
//! normalization back to [`VrmMetadata`].

pub(crate) mod vrm0;
pub(crate) mod vrm1;

use std::collections::HashMap;

use nalgebra::Vector3;
use serde_json::{Value, json};

use super::types::REQUIRED_BONES;
use crate::error::{Issues, MISSING_REQUIRED_BONE, UNRESOLVED_REFERENCE, VrmError};
use crate::json::{float, get_f32, get_list, get_str, get_usize};
use crate::json_path;
use crate::scene::{Humanoid, VrmMetadata, VrmVersion};

// ─── Export side ──────────────────────────────────────────────────────────────

/// Where an exported mesh object ended up.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MeshRef {
    pub(crate) mesh: usize,
    pub(crate) node: usize,
    /// Morph target names in target order.
    pub(crate) targets: Vec<String>,
}

/// Thumbnail after embedding: legacy meta points at a texture, newer meta
/// at an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Thumbnail {
    pub(crate) image: usize,
    pub(crate) texture: usize,
}

/// Name to glTF index tables of one export.
#[derive(Debug, Default)]
pub(crate) struct ExportIndex {
    pub(crate) bone_nodes: HashMap<String, usize>,
    /// Bone name to its first child, for spring chains.
    pub(crate) first_child: HashMap<String, String>,
    pub(crate) meshes: HashMap<String, MeshRef>,
    pub(crate) materials: HashMap<String, usize>,
    pub(crate) thumbnail: Option<Thumbnail>,
}

impl ExportIndex {
    pub(crate) fn bone(&self, name: &str, context: &str, issues: &mut Issues) -> Option<usize> {
        let node = self.bone_nodes.get(name).copied();
        if node.is_none() {
            issues.warn(
                UNRESOLVED_REFERENCE,
                format!("{context}: bone '{name}' does not exist"),
            );
        }
        node
    }

    pub(crate) fn material(&self, name: &str, context: &str, issues: &mut Issues) -> Option<usize> {
        let index = self.materials.get(name).copied();
        if index.is_none() {
            issues.warn(
                UNRESOLVED_REFERENCE,
                format!("{context}: material '{name}' does not exist"),
            );
        }
        index
    }

    /// `(mesh ref, target index)` of a shape key.
    pub(crate) fn morph_target(
        &self,
        mesh: &str,
        shape_key: &str,
        context: &str,
        issues: &mut Issues,
    ) -> Option<(&MeshRef, usize)> {
        let resolved = self.meshes.get(mesh).and_then(|mesh_ref| {
            mesh_ref
                .targets
                .iter()
                .position(|target| target == shape_key)
                .map(|index| (mesh_ref, index))
        });
        if resolved.is_none() {
            issues.warn(
                UNRESOLVED_REFERENCE,
                format!("{context}: shape key '{shape_key}' of mesh '{mesh}' does not exist"),
            );
        }
        resolved
    }

    /// Bones of a spring chain: the root, then first children down to a leaf.
    pub(crate) fn spring_chain(&self, root: &str) -> Vec<String> {
        let mut chain = vec![root.to_string()];
        let mut current = root;
        while let Some(child) = self.first_child.get(current) {
            if chain.contains(child) {
                break;
            }
            chain.push(child.clone());
            current = child;
        }
        chain
    }
}

/// Required humanoid bones that are unmapped or whose bone is not exported.
pub(crate) fn missing_required_bones(
    humanoid: &Humanoid,
    bone_exists: impl Fn(&str) -> bool,
) -> Vec<String> {
    REQUIRED_BONES
        .iter()
        .filter(|human_bone| !humanoid.bone(human_bone).is_some_and(&bone_exists))
        .map(|human_bone| human_bone.to_string())
        .collect()
}

/// Fail unless every required bone resolves; with `allow_non_humanoid`
/// the gap is recorded as a warning instead.
pub(crate) fn check_required_bones(
    metadata: &VrmMetadata,
    index: &ExportIndex,
    issues: &mut Issues,
) -> Result<(), VrmError> {
    let missing = missing_required_bones(&metadata.humanoid, |bone| {
        index.bone_nodes.contains_key(bone)
    });
    if missing.is_empty() {
        return Ok(());
    }
    let message = format!("missing required humanoid bones: {}", missing.join(", "));
    if metadata.allow_non_humanoid {
        issues.warn(MISSING_REQUIRED_BONE, message);
        Ok(())
    } else {
        Err(VrmError::SchemaViolation(message))
    }
}

/// `{x, y, z}` object used by the legacy schema.
pub(crate) fn vec3_object(value: Vector3<f32>, issues: &mut Issues) -> Value {
    json!({
        "x": float(value.x, issues),
        "y": float(value.y, issues),
        "z": float(value.z, issues),
    })
}

pub(crate) fn read_vec3_object(value: &Value, default: Vector3<f32>) -> Vector3<f32> {
    Vector3::new(
        get_f32(value, json_path!["x"], default.x),
        get_f32(value, json_path!["y"], default.y),
        get_f32(value, json_path!["z"], default.z),
    )
}

// ─── Import side ──────────────────────────────────────────────────────────────

/// Index to host-name tables of one imported document.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ImportNames {
    pub(crate) nodes: Vec<String>,
    /// Mesh index per node.
    pub(crate) node_meshes: Vec<Option<usize>>,
    /// Mesh object name per glTF mesh: the first node instancing it.
    pub(crate) meshes: Vec<String>,
    /// Morph target names per glTF mesh.
    pub(crate) targets: Vec<Vec<String>>,
    pub(crate) materials: Vec<String>,
}

pub(crate) fn node_name(node: &Value, index: usize) -> String {
    node.get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| format!("node_{index}"))
}

/// Target names from `extras.targetNames` on the mesh or its first
/// primitive, falling back to `morph_<n>`.
pub(crate) fn target_names(mesh: &Value) -> Vec<String> {
    let count = get_list(mesh, json_path!["primitives", 0, "targets"]).len();
    let stored = [
        get_list(mesh, json_path!["extras", "targetNames"]),
        get_list(mesh, json_path!["primitives", 0, "extras", "targetNames"]),
    ]
    .into_iter()
    .find(|names| names.len() == count && count > 0);

    (0..count)
        .map(|index| {
            stored
                .and_then(|names| names.get(index))
                .and_then(Value::as_str)
                .map(ToOwned::to_owned)
                .unwrap_or_else(|| format!("morph_{index}"))
        })
        .collect()
}

impl ImportNames {
    pub(crate) fn from_document(json: &Value) -> Self {
        let nodes_json = get_list(json, json_path!["nodes"]);
        let nodes: Vec<String> = nodes_json
            .iter()
            .enumerate()
            .map(|(index, node)| node_name(node, index))
            .collect();
        let node_meshes: Vec<Option<usize>> = nodes_json
            .iter()
            .map(|node| get_usize(node, json_path!["mesh"]))
            .collect();

        let meshes_json = get_list(json, json_path!["meshes"]);
        let meshes = meshes_json
            .iter()
            .enumerate()
            .map(|(mesh_index, mesh)| {
                node_meshes
                    .iter()
                    .position(|node_mesh| *node_mesh == Some(mesh_index))
                    .map(|node| nodes[node].clone())
                    .unwrap_or_else(|| get_str(mesh, json_path!["name"], "mesh").to_string())
            })
            .collect();
        let targets = meshes_json.iter().map(target_names).collect();
        let materials = get_list(json, json_path!["materials"])
            .iter()
            .enumerate()
            .map(|(index, material)| {
                material
                    .get("name")
                    .and_then(Value::as_str)
                    .map(ToOwned::to_owned)
                    .unwrap_or_else(|| format!("material_{index}"))
            })
            .collect();

        Self {
            nodes,
            node_meshes,
            meshes,
            targets,
            materials,
        }
    }

    pub(crate) fn node(&self, index: Option<usize>, context: &str, issues: &mut Issues) -> Option<String> {
        let name = index.and_then(|index| self.nodes.get(index)).cloned();
        if name.is_none() {
            issues.warn(
                UNRESOLVED_REFERENCE,
                format!("{context}: node {index:?} does not exist"),
            );
        }
        name
    }

    pub(crate) fn material(&self, index: Option<usize>, context: &str, issues: &mut Issues) -> Option<String> {
        let name = index.and_then(|index| self.materials.get(index)).cloned();
        if name.is_none() {
            issues.warn(
                UNRESOLVED_REFERENCE,
                format!("{context}: material {index:?} does not exist"),
            );
        }
        name
    }

    /// `(mesh object, shape key)` of a mesh-indexed morph target.
    pub(crate) fn mesh_target(
        &self,
        mesh: Option<usize>,
        target: Option<usize>,
        context: &str,
        issues: &mut Issues,
    ) -> Option<(String, String)> {
        let resolved = mesh.zip(target).and_then(|(mesh, target)| {
            let object = self.meshes.get(mesh)?;
            let shape_key = self.targets.get(mesh)?.get(target)?;
            Some((object.clone(), shape_key.clone()))
        });
        if resolved.is_none() {
            issues.warn(
                UNRESOLVED_REFERENCE,
                format!("{context}: morph target {target:?} of mesh {mesh:?} does not exist"),
            );
        }
        resolved
    }
}

/// Which generation a document carries, by its extension keys.
pub(crate) fn detect_version(json: &Value) -> Option<VrmVersion> {
    if crate::json::lookup(json, json_path!["extensions", "VRMC_vrm"]).is_some() {
        Some(VrmVersion::V1)
    } else if crate::json::lookup(json, json_path!["extensions", "VRM"]).is_some() {
        Some(VrmVersion::V0)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn given_partial_humanoid_when_checking_required_bones_then_error_or_warning_follows_flag() {
        let mut metadata = VrmMetadata::default();
        metadata.humanoid = Humanoid {
            bones: BTreeMap::from([("hips".to_string(), "Hips".to_string())]),
        };
        let index = ExportIndex {
            bone_nodes: HashMap::from([("Hips".to_string(), 0)]),
            ..ExportIndex::default()
        };
        let mut issues = Issues::new();

        let strict = check_required_bones(&metadata, &index, &mut issues);
        assert!(matches!(strict, Err(VrmError::SchemaViolation(_))));

        metadata.allow_non_humanoid = true;
        assert!(check_required_bones(&metadata, &index, &mut issues).is_ok());
        assert!(issues.has_code(MISSING_REQUIRED_BONE));
        assert_eq!(
            missing_required_bones(&metadata.humanoid, |bone| bone == "Hips").len(),
            REQUIRED_BONES.len() - 1
        );
    }

    #[test]
    fn given_bone_chain_when_following_first_children_then_chain_stops_at_leaf() {
        let index = ExportIndex {
            first_child: HashMap::from([
                ("Hair1".to_string(), "Hair2".to_string()),
                ("Hair2".to_string(), "Hair3".to_string()),
            ]),
            ..ExportIndex::default()
        };
        assert_eq!(index.spring_chain("Hair1"), vec!["Hair1", "Hair2", "Hair3"]);
        assert_eq!(index.spring_chain("Tail"), vec!["Tail"]);
    }

    #[test]
    fn given_document_when_collecting_names_then_meshes_take_node_names() {
        let doc = json!({
            "nodes": [{"name": "Hips"}, {"name": "Body", "mesh": 0}, {}],
            "meshes": [{
                "name": "BodyMesh",
                "primitives": [{"targets": [{}, {}]}],
                "extras": {"targetNames": ["Smile", "Blink"]}
            }],
            "materials": [{"name": "Skin"}, {}]
        });

        let names = ImportNames::from_document(&doc);

        assert_eq!(names.nodes, vec!["Hips", "Body", "node_2"]);
        assert_eq!(names.meshes, vec!["Body"]);
        assert_eq!(names.targets, vec![vec!["Smile".to_string(), "Blink".to_string()]]);
        assert_eq!(names.materials, vec!["Skin", "material_1"]);
        let mut issues = Issues::new();
        assert_eq!(
            names.mesh_target(Some(0), Some(1), "test", &mut issues),
            Some(("Body".to_string(), "Blink".to_string()))
        );
        assert_eq!(names.mesh_target(Some(0), Some(5), "test", &mut issues), None);
        assert!(issues.has_code(UNRESOLVED_REFERENCE));
    }

    #[test]
    fn given_extension_keys_when_detecting_version_then_generation_is_reported() {
        assert_eq!(detect_version(&json!({"extensions": {"VRM": {}}})), Some(VrmVersion::V0));
        assert_eq!(detect_version(&json!({"extensions": {"VRMC_vrm": {}}})), Some(VrmVersion::V1));
        assert_eq!(detect_version(&json!({})), None);
    }
}
