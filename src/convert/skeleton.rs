//! Node hierarchy and skins.
//!
//! Bones become nodes in depth-first pre-order, one skin is planned per
//! root subtree that carries a humanoid bone, and every other object hangs
//! off the scene root or the bone it is attached to.

use std::collections::HashMap;

use nalgebra::{Matrix4, Translation3, Vector3};
use serde_json::{Map, Value, json};

use super::buffer::BinaryBuilder;
use super::geometry::SkinBinding;
use super::gltf_utils::to_gltf_axes;
use super::types::SECONDARY_NODE_NAME;
use crate::error::{Issues, MULTIPLE_ARMATURES, UNRESOLVED_REFERENCE};
use crate::json::numbers;
use crate::scene::{Armature, Humanoid, MeshObject, SceneInput, VrmVersion};

/// One glTF node before serialization.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct NodeSpec {
    pub(crate) name: String,
    pub(crate) translation: Vector3<f32>,
    pub(crate) children: Vec<usize>,
    pub(crate) mesh: Option<usize>,
    pub(crate) skin: Option<usize>,
    pub(crate) extras: Option<Value>,
}

impl NodeSpec {
    fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn to_json(&self, issues: &mut Issues) -> Value {
        let mut node = Map::new();
        node.insert("name".into(), json!(self.name));
        if self.translation != Vector3::zeros() {
            node.insert("translation".into(), numbers(self.translation.as_slice(), issues));
        }
        if !self.children.is_empty() {
            node.insert("children".into(), json!(self.children));
        }
        if let Some(mesh) = self.mesh {
            node.insert("mesh".into(), json!(mesh));
        }
        if let Some(skin) = self.skin {
            node.insert("skin".into(), json!(skin));
        }
        if let Some(extras) = &self.extras {
            node.insert("extras".into(), extras.clone());
        }
        Value::Object(node)
    }
}

/// Joints of one root subtree.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SkinPlan {
    pub(crate) skeleton: usize,
    /// Node index per joint slot.
    pub(crate) joints: Vec<usize>,
    /// Bone name per joint slot.
    pub(crate) joint_names: Vec<String>,
    /// Column-major inverse bind matrix per joint slot.
    pub(crate) inverse_binds: Vec<[f32; 16]>,
}

#[derive(Debug, Default)]
pub(crate) struct NodeGraph {
    version: VrmVersion,
    pub(crate) nodes: Vec<NodeSpec>,
    /// Scene root nodes in creation order.
    pub(crate) roots: Vec<usize>,
    /// Armature bone name to node index.
    pub(crate) bone_nodes: HashMap<String, usize>,
    /// Armature bone name to world-space head (host axes).
    bone_heads: HashMap<String, [f32; 3]>,
    pub(crate) skins: Vec<SkinPlan>,
    /// Index of the hips bone's joint slot, per skin.
    hips_slots: Vec<Option<u16>>,
}

/// Column-major inverse of a translation-only bind pose.
fn inverse_bind(head: Vector3<f32>) -> [f32; 16] {
    let inverse: Matrix4<f32> = Translation3::from(head).inverse().to_homogeneous();
    let mut out = [0.0; 16];
    out.copy_from_slice(inverse.as_slice());
    out
}

impl NodeGraph {
    /// Lay out the bone nodes and skins of the scene's armature. Only the
    /// first armature is exported.
    pub(crate) fn build(scene: &SceneInput, version: VrmVersion, issues: &mut Issues) -> Self {
        let mut graph = Self {
            version,
            ..Self::default()
        };
        let mut armatures = scene.armatures();
        let Some(armature) = armatures.next() else {
            return graph;
        };
        let ignored: Vec<&str> = armatures.map(|extra| extra.name.as_str()).collect();
        if !ignored.is_empty() {
            issues.warn(
                MULTIPLE_ARMATURES,
                format!(
                    "only armature '{}' is exported; ignored: {}",
                    armature.name,
                    ignored.join(", ")
                ),
            );
        }

        for root in armature.roots() {
            let mut subtree = Vec::new();
            graph.add_bone(armature, root, None, &mut subtree);
            graph.roots.push(subtree[0]);
            graph.plan_skin(armature, &subtree, &scene.metadata.humanoid);
        }
        tracing::debug!(
            armature = %armature.name,
            bones = graph.bone_nodes.len(),
            skins = graph.skins.len(),
            "skeleton laid out"
        );
        graph
    }

    fn add_bone(
        &mut self,
        armature: &Armature,
        bone_index: usize,
        parent_node: Option<usize>,
        subtree: &mut Vec<usize>,
    ) {
        let bone = &armature.bones[bone_index];
        let head = to_gltf_axes(bone.head, self.version);
        let parent_head = bone
            .parent
            .and_then(|parent| armature.bones.get(parent))
            .map(|parent| to_gltf_axes(parent.head, self.version))
            .unwrap_or_else(Vector3::zeros);

        let node_index = self.nodes.len();
        self.nodes.push(NodeSpec {
            translation: head - parent_head,
            ..NodeSpec::named(&bone.name)
        });
        if let Some(parent) = parent_node {
            self.nodes[parent].children.push(node_index);
        }
        self.bone_nodes.insert(bone.name.clone(), node_index);
        self.bone_heads.insert(bone.name.clone(), bone.head);
        subtree.push(node_index);

        let children: Vec<usize> = armature.children_of(bone_index).collect();
        for child in children {
            self.add_bone(armature, child, Some(node_index), subtree);
        }
    }

    fn plan_skin(&mut self, armature: &Armature, subtree: &[usize], humanoid: &Humanoid) {
        let joint_names: Vec<String> = subtree
            .iter()
            .map(|node| self.nodes[*node].name.clone())
            .collect();
        if !joint_names.iter().any(|name| humanoid.is_humanoid_bone(name)) {
            return;
        }
        let inverse_binds = joint_names
            .iter()
            .map(|name| {
                let head = armature
                    .bone_index(name)
                    .map(|index| armature.bones[index].head)
                    .unwrap_or([0.0; 3]);
                inverse_bind(to_gltf_axes(head, self.version))
            })
            .collect();
        let hips_slot = humanoid
            .bone("hips")
            .and_then(|hips| joint_names.iter().position(|name| name == hips))
            .and_then(|slot| u16::try_from(slot).ok());

        self.skins.push(SkinPlan {
            skeleton: subtree[0],
            joints: subtree.to_vec(),
            joint_names,
            inverse_binds,
        });
        self.hips_slots.push(hips_slot);
    }

    /// Skin a mesh binds to and the joint slot of each vertex group. The
    /// skin is the first one containing any of the mesh's groups.
    pub(crate) fn skin_binding(&self, mesh: &MeshObject) -> Option<(usize, SkinBinding)> {
        if !mesh.is_skinned() || self.skins.is_empty() {
            return None;
        }
        let skin_index = self
            .skins
            .iter()
            .position(|skin| {
                mesh.vertex_groups
                    .iter()
                    .any(|group| skin.joint_names.contains(group))
            })
            .unwrap_or(0);
        let skin = &self.skins[skin_index];
        let group_joints = mesh
            .vertex_groups
            .iter()
            .map(|group| {
                skin.joint_names
                    .iter()
                    .position(|name| name == group)
                    .and_then(|slot| u16::try_from(slot).ok())
            })
            .collect();

        Some((
            skin_index,
            SkinBinding {
                group_joints,
                fallback_joint: self.hips_slots[skin_index].unwrap_or(0),
            },
        ))
    }

    /// Add a non-bone node. With a resolvable `parent_bone` the node hangs
    /// off that bone, otherwise it becomes a scene root.
    pub(crate) fn add_object(
        &mut self,
        name: &str,
        origin: [f32; 3],
        parent_bone: Option<&str>,
        issues: &mut Issues,
    ) -> usize {
        let origin = to_gltf_axes(origin, self.version);
        let parent = parent_bone.and_then(|bone| {
            let resolved = self
                .bone_nodes
                .get(bone)
                .zip(self.bone_heads.get(bone))
                .map(|(node, head)| (*node, to_gltf_axes(*head, self.version)));
            if resolved.is_none() {
                issues.warn(
                    UNRESOLVED_REFERENCE,
                    format!("'{name}' is attached to unknown bone '{bone}'; exported at the root"),
                );
            }
            resolved
        });

        let node_index = self.nodes.len();
        match parent {
            Some((parent_node, parent_head)) => {
                self.nodes.push(NodeSpec {
                    translation: origin - parent_head,
                    ..NodeSpec::named(name)
                });
                self.nodes[parent_node].children.push(node_index);
            }
            None => {
                self.nodes.push(NodeSpec {
                    translation: origin,
                    ..NodeSpec::named(name)
                });
                self.roots.push(node_index);
            }
        }
        node_index
    }

    /// Skinned meshes sit at the root with an identity transform; their
    /// vertices are baked into armature space instead.
    pub(crate) fn add_skinned_mesh(&mut self, name: &str, skin: usize) -> usize {
        let node_index = self.nodes.len();
        self.nodes.push(NodeSpec {
            skin: Some(skin),
            ..NodeSpec::named(name)
        });
        self.roots.push(node_index);
        node_index
    }

    pub(crate) fn add_secondary(&mut self) -> usize {
        let node_index = self.nodes.len();
        self.nodes.push(NodeSpec::named(SECONDARY_NODE_NAME));
        self.roots.push(node_index);
        node_index
    }

    pub(crate) fn nodes_json(&self, issues: &mut Issues) -> Vec<Value> {
        self.nodes.iter().map(|node| node.to_json(issues)).collect()
    }

    /// Skin objects, writing the inverse bind matrices into `builder`.
    pub(crate) fn skins_json(&self, builder: &mut BinaryBuilder) -> Vec<Value> {
        self.skins
            .iter()
            .map(|skin| {
                let accessor = builder.add_mat4(&skin.inverse_binds);
                json!({
                    "inverseBindMatrices": accessor,
                    "skeleton": skin.skeleton,
                    "joints": skin.joints,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::scene::{Bone, EmptyObject, SceneObject};

    fn bone(name: &str, parent: Option<usize>, head: [f32; 3]) -> Bone {
        Bone {
            name: name.into(),
            parent,
            head,
        }
    }

    fn scene() -> SceneInput {
        let armature = Armature {
            name: "Armature".into(),
            bones: vec![
                bone("Hips", None, [0.0, 0.0, 1.0]),
                bone("Spine", Some(0), [0.0, 0.0, 1.2]),
                bone("Head", Some(1), [0.0, 0.0, 1.6]),
                bone("Tail", Some(0), [0.0, 0.3, 1.0]),
                bone("Prop", None, [1.0, 0.0, 0.0]),
            ],
        };
        let mut scene = SceneInput {
            objects: vec![SceneObject::Armature(armature)],
            ..SceneInput::default()
        };
        scene.metadata.humanoid = Humanoid {
            bones: BTreeMap::from([
                ("hips".to_string(), "Hips".to_string()),
                ("head".to_string(), "Head".to_string()),
            ]),
        };
        scene
    }

    #[test]
    fn given_armature_when_building_graph_then_nodes_follow_pre_order_with_relative_offsets() {
        let mut issues = Issues::new();
        let graph = NodeGraph::build(&scene(), VrmVersion::V1, &mut issues);

        let names: Vec<&str> = graph.nodes.iter().map(|node| node.name.as_str()).collect();
        assert_eq!(names, vec!["Hips", "Spine", "Head", "Tail", "Prop"]);
        assert_eq!(graph.roots, vec![0, 4]);
        assert_eq!(graph.nodes[0].children, vec![1, 3]);
        assert_eq!(graph.nodes[0].translation, Vector3::new(0.0, 1.0, 0.0));
        let spine = graph.nodes[1].translation;
        assert!((spine.y - 0.2).abs() < 1e-6 && spine.x == 0.0 && spine.z == 0.0);
        assert_eq!(graph.nodes[3].translation, Vector3::new(0.0, 0.0, -0.3));
        assert!(issues.is_empty());
    }

    #[test]
    fn given_subtrees_when_planning_skins_then_only_humanoid_subtree_is_skinned() {
        let mut issues = Issues::new();
        let graph = NodeGraph::build(&scene(), VrmVersion::V0, &mut issues);

        assert_eq!(graph.skins.len(), 1);
        let skin = &graph.skins[0];
        assert_eq!(skin.skeleton, 0);
        assert_eq!(skin.joints, vec![0, 1, 2, 3]);
        // Hips head (0, 0, 1) is (0, 1, 0) in glTF; the inverse translates back.
        assert_eq!(&skin.inverse_binds[0][12..16], &[0.0, -1.0, 0.0, 1.0]);
        assert_eq!(skin.inverse_binds[0][0], 1.0);
    }

    #[test]
    fn given_skinned_mesh_when_binding_then_groups_map_to_joint_slots() {
        let mut issues = Issues::new();
        let graph = NodeGraph::build(&scene(), VrmVersion::V1, &mut issues);
        let mesh = MeshObject {
            name: "Body".into(),
            vertex_groups: vec!["Head".into(), "NotABone".into(), "Hips".into()],
            ..MeshObject::default()
        };

        let (skin, binding) = graph.skin_binding(&mesh).expect("mesh is skinned");

        assert_eq!(skin, 0);
        assert_eq!(binding.group_joints, vec![Some(2), None, Some(0)]);
        assert_eq!(binding.fallback_joint, 0);
        assert!(graph.skin_binding(&MeshObject::default()).is_none());
    }

    #[test]
    fn given_objects_when_adding_nodes_then_bone_attachment_is_relative() {
        let mut issues = Issues::new();
        let mut graph = NodeGraph::build(&scene(), VrmVersion::V1, &mut issues);
        let empty = EmptyObject {
            name: "HatAnchor".into(),
            origin: [0.0, 0.0, 1.8],
            parent_bone: Some("Head".into()),
            extras: None,
        };

        let attached = graph.add_object(&empty.name, empty.origin, empty.parent_bone.as_deref(), &mut issues);
        let orphan = graph.add_object("Lost", [1.0, 2.0, 3.0], Some("Missing"), &mut issues);
        let secondary = graph.add_secondary();

        assert!(graph.nodes[2].children.contains(&attached));
        assert!((graph.nodes[attached].translation.y - 0.2).abs() < 1e-6);
        assert_eq!(graph.nodes[orphan].translation, Vector3::new(1.0, 3.0, -2.0));
        assert!(issues.has_code(UNRESOLVED_REFERENCE));
        assert_eq!(graph.roots.last(), Some(&secondary));
        assert_eq!(graph.nodes[secondary].name, SECONDARY_NODE_NAME);
    }

    #[test]
    fn given_two_armatures_when_building_then_second_is_ignored_with_warning() {
        let mut scene = scene();
        scene.objects.push(SceneObject::Armature(Armature {
            name: "Other".into(),
            bones: vec![bone("Root", None, [0.0; 3])],
        }));
        let mut issues = Issues::new();

        let graph = NodeGraph::build(&scene, VrmVersion::V1, &mut issues);

        assert_eq!(graph.nodes.len(), 5);
        assert!(issues.has_code(MULTIPLE_ARMATURES));
    }

    #[test]
    fn given_node_without_translation_when_serializing_then_optional_keys_are_omitted() {
        let mut issues = Issues::new();
        let node = NodeSpec {
            mesh: Some(3),
            skin: Some(0),
            ..NodeSpec::named("Body")
        };
        assert_eq!(node.to_json(&mut issues), json!({"name": "Body", "mesh": 3, "skin": 0}));
    }
}
