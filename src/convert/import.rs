//! Rebuild a [`SceneInput`] from a decoded VRM document.
//!
//! Node transforms are reduced to their translation; every exporter this
//! crate pairs with writes bones and meshes with translation only.

use std::collections::{HashMap, HashSet};

use nalgebra::Vector3;
use serde_json::Value;

use super::gltf_utils::{
    buffer_view_bytes, collect_parent_index_map, from_gltf_axes, read_f32_elements,
    read_indices, read_u32_elements,
};
use super::material::import_materials;
use super::metadata::{ImportNames, detect_version, missing_required_bones, target_names, vrm0, vrm1};
use super::types::{ImportReport, REQUIRED_PARENT_RELATIONS, SECONDARY_NODE_NAME, TextureInfo};
use crate::error::{
    EMPTY_PRIMITIVE, IMAGE_UNREADABLE, INVALID_BONE_HIERARCHY, Issues, MISSING_REQUIRED_BONE,
    NODE_TRANSFORM_IGNORED, UNRESOLVED_REFERENCE, VrmError,
};
use crate::json::{get_f32_array, get_list, get_str, get_usize, host_value, lookup};
use crate::json_path;
use crate::scene::{
    Armature, Bone, EmptyObject, Face, Humanoid, ImageData, Loop, MeshObject, SceneImage,
    SceneInput, SceneObject, ShapeKey, VrmVersion,
};
use crate::texture::{guess_mime_type, probe_dimensions};

const ARMATURE_NAME: &str = "Armature";
const REFERENCE_SHAPE_KEY: &str = "Basis";
const MODE_TRIANGLES: u64 = 4;

/// Node tree of a document with world translations resolved.
struct DocumentGraph<'a> {
    json: &'a Value,
    bin: &'a [u8],
    version: VrmVersion,
    nodes: &'a [Value],
    parents: HashMap<usize, usize>,
    /// World translation per node, glTF axes.
    world: Vec<Vector3<f32>>,
}

impl<'a> DocumentGraph<'a> {
    fn new(json: &'a Value, bin: &'a [u8], version: VrmVersion, issues: &mut Issues) -> Self {
        let nodes = get_list(json, json_path!["nodes"]);
        let parents = collect_parent_index_map(json);

        let mut ignored = 0usize;
        let local: Vec<Vector3<f32>> = nodes
            .iter()
            .map(|node| {
                let rotation = get_f32_array(node, json_path!["rotation"], [0.0, 0.0, 0.0, 1.0]);
                let scale = get_f32_array(node, json_path!["scale"], [1.0; 3]);
                let matrix = get_f32_array(node, json_path!["matrix"], [0.0; 16]);
                let has_matrix = node.get("matrix").is_some();
                if rotation != [0.0, 0.0, 0.0, 1.0] || scale != [1.0; 3] || has_matrix {
                    ignored += 1;
                }
                if has_matrix {
                    Vector3::new(matrix[12], matrix[13], matrix[14])
                } else {
                    Vector3::from(get_f32_array(node, json_path!["translation"], [0.0; 3]))
                }
            })
            .collect();
        if ignored > 0 {
            issues.info(
                NODE_TRANSFORM_IGNORED,
                format!("{ignored} nodes carry rotation or scale; only translations were read"),
            );
        }

        let mut graph = Self {
            json,
            bin,
            version,
            nodes,
            parents,
            world: Vec::with_capacity(nodes.len()),
        };
        graph.world = (0..nodes.len())
            .map(|node| {
                graph
                    .ancestors(node)
                    .fold(local[node], |position, ancestor| position + local[ancestor])
            })
            .collect();
        graph
    }

    /// Parent chain of `node`, nearest first. Cycles end the walk.
    fn ancestors(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        let limit = self.nodes.len();
        let mut current = node;
        std::iter::from_fn(move || {
            let parent = self.parents.get(&current).copied()?;
            current = parent;
            Some(parent)
        })
        .take(limit)
    }

    fn root_of(&self, node: usize) -> usize {
        self.ancestors(node).last().unwrap_or(node)
    }

    fn children(&self, node: usize) -> Vec<usize> {
        get_list(&self.nodes[node], json_path!["children"])
            .iter()
            .filter_map(Value::as_u64)
            .map(|child| child as usize)
            .filter(|child| *child < self.nodes.len())
            .collect()
    }

    fn host_position(&self, node: usize) -> [f32; 3] {
        from_gltf_axes(self.world[node], self.version).into()
    }

    fn skin_joints(&self, skin: usize) -> Vec<usize> {
        get_list(self.json, json_path!["skins", skin, "joints"])
            .iter()
            .filter_map(Value::as_u64)
            .map(|joint| joint as usize)
            .filter(|joint| *joint < self.nodes.len())
            .collect()
    }

    /// Mesh-less nodes in every tree that holds a skin joint or a humanoid
    /// bone.
    fn bone_flags(&self, names: &ImportNames, humanoid: &Humanoid) -> Vec<bool> {
        let skins = get_list(self.json, json_path!["skins"]).len();
        let mut anchors: HashSet<usize> = (0..skins).flat_map(|skin| self.skin_joints(skin)).collect();
        for bone in humanoid.bones.values() {
            if let Some(node) = names.nodes.iter().position(|name| name == bone) {
                anchors.insert(node);
            }
        }
        let roots: HashSet<usize> = anchors.iter().map(|node| self.root_of(*node)).collect();

        (0..self.nodes.len())
            .map(|node| {
                self.nodes[node].get("mesh").is_none() && roots.contains(&self.root_of(node))
            })
            .collect()
    }

    /// Bones in depth-first pre-order, heads in host axes.
    fn armature(&self, names: &ImportNames, is_bone: &[bool]) -> Armature {
        let mut armature = Armature {
            name: ARMATURE_NAME.to_string(),
            bones: Vec::new(),
        };
        let mut visited = HashSet::new();
        for root in (0..self.nodes.len()).filter(|node| !self.parents.contains_key(node)) {
            self.visit_bone(root, None, names, is_bone, &mut armature, &mut visited);
        }
        armature
    }

    fn visit_bone(
        &self,
        node: usize,
        parent: Option<usize>,
        names: &ImportNames,
        is_bone: &[bool],
        armature: &mut Armature,
        visited: &mut HashSet<usize>,
    ) {
        if !visited.insert(node) {
            return;
        }
        let parent = if is_bone[node] {
            armature.bones.push(Bone {
                name: names.nodes[node].clone(),
                parent,
                head: self.host_position(node),
            });
            Some(armature.bones.len() - 1)
        } else {
            parent
        };
        for child in self.children(node) {
            self.visit_bone(child, parent, names, is_bone, armature, visited);
        }
    }

    fn parent_bone(&self, node: usize, names: &ImportNames, is_bone: &[bool]) -> Option<String> {
        self.parents
            .get(&node)
            .filter(|parent| is_bone[**parent])
            .map(|parent| names.nodes[*parent].clone())
    }

    fn is_secondary(&self, node: usize, names: &ImportNames) -> bool {
        names.nodes[node] == SECONDARY_NODE_NAME
            && !self.parents.contains_key(&node)
            && self.children(node).is_empty()
    }
}

/// Vertex streams of one mesh object while its primitives are merged.
#[derive(Default)]
struct MeshAssembly {
    object: MeshObject,
    normals: Vec<[f32; 3]>,
    uvs: Vec<Vec<[f32; 2]>>,
    targets: Vec<Vec<[f32; 3]>>,
    /// POSITION accessor to `(first vertex, vertex count)`; primitives
    /// sharing an accessor share vertices.
    runs: HashMap<usize, (usize, usize)>,
}

impl MeshAssembly {
    fn append_vertices(
        &mut self,
        graph: &DocumentGraph<'_>,
        primitive: &Value,
        position_accessor: usize,
    ) -> Option<(usize, usize)> {
        if let Some(run) = self.runs.get(&position_accessor) {
            return Some(*run);
        }
        let (json, bin, version) = (graph.json, graph.bin, graph.version);
        let positions = read_f32_elements::<3>(json, bin, position_accessor)?;
        let base = self.object.positions.len();
        let count = positions.len();
        let attribute = |name: &str| get_usize(primitive, json_path!["attributes", name]);

        let host_positions: Vec<[f32; 3]> = positions
            .iter()
            .map(|position| <[f32; 3]>::from(from_gltf_axes(*position, version)))
            .collect();

        match attribute("NORMAL")
            .and_then(|accessor| read_f32_elements::<3>(json, bin, accessor))
            .filter(|normals| normals.len() == count)
        {
            Some(normals) => self.normals.extend(
                normals
                    .iter()
                    .map(|normal| <[f32; 3]>::from(from_gltf_axes(*normal, version))),
            ),
            None => self.normals.extend(std::iter::repeat_n([0.0; 3], count)),
        }

        let mut layers = Vec::new();
        while let Some(layer) = attribute(&format!("TEXCOORD_{}", layers.len()))
            .and_then(|accessor| read_f32_elements::<2>(json, bin, accessor))
            .filter(|layer| layer.len() == count)
        {
            layers.push(layer);
        }
        self.uvs.extend((0..count).map(|vertex| {
            layers
                .iter()
                .map(|layer| {
                    let [u, v] = layer[vertex];
                    [u, 1.0 - v]
                })
                .collect()
        }));

        if self.object.is_skinned() {
            let joints = attribute("JOINTS_0")
                .and_then(|accessor| read_u32_elements::<4>(json, bin, accessor))
                .filter(|joints| joints.len() == count);
            let weights = attribute("WEIGHTS_0")
                .and_then(|accessor| read_f32_elements::<4>(json, bin, accessor))
                .filter(|weights| weights.len() == count);
            let groups = self.object.vertex_groups.len();
            for vertex in 0..count {
                let pairs = joints
                    .as_ref()
                    .zip(weights.as_ref())
                    .map(|(joints, weights)| {
                        joints[vertex]
                            .iter()
                            .zip(weights[vertex])
                            .filter(|(joint, weight)| (**joint as usize) < groups && *weight > 0.0)
                            .map(|(joint, weight)| (*joint as usize, weight))
                            .collect()
                    })
                    .unwrap_or_default();
                self.object.vertex_weights.push(pairs);
            }
        }

        let targets = get_list(primitive, json_path!["targets"]);
        for (index, shape) in self.targets.iter_mut().enumerate() {
            let deltas = targets
                .get(index)
                .and_then(|target| get_usize(target, json_path!["POSITION"]))
                .and_then(|accessor| read_f32_elements::<3>(json, bin, accessor))
                .filter(|deltas| deltas.len() == count);
            match deltas {
                Some(deltas) => shape.extend(
                    host_positions
                        .iter()
                        .zip(&deltas)
                        .map(|(position, delta)| {
                            <[f32; 3]>::from(Vector3::from(*position) + from_gltf_axes(*delta, version))
                        }),
                ),
                None => shape.extend_from_slice(&host_positions),
            }
        }

        self.object.positions.extend(host_positions);
        self.runs.insert(position_accessor, (base, count));
        Some((base, count))
    }

    fn add_triangles(&mut self, slot: usize, base: usize, count: usize, indices: &[u32]) -> usize {
        let mut skipped = 0;
        for triangle in indices.chunks_exact(3) {
            if triangle.iter().any(|index| *index as usize >= count) {
                skipped += 1;
                continue;
            }
            let loops = triangle
                .iter()
                .map(|index| {
                    let vertex = base + *index as usize;
                    Loop {
                        vertex,
                        normal: self.normals[vertex],
                        uvs: self.uvs[vertex].clone(),
                    }
                })
                .collect();
            self.object.faces.push(Face {
                material_slot: slot,
                loops,
            });
        }
        skipped
    }

    fn finish(mut self, names: &[String]) -> MeshObject {
        if !names.is_empty() {
            let mut shape_keys = vec![ShapeKey {
                name: REFERENCE_SHAPE_KEY.to_string(),
                positions: self.object.positions.clone(),
            }];
            shape_keys.extend(names.iter().zip(self.targets).map(|(name, positions)| ShapeKey {
                name: name.clone(),
                positions,
            }));
            self.object.shape_keys = shape_keys;
        }
        self.object
    }
}

fn import_mesh(
    graph: &DocumentGraph<'_>,
    node: usize,
    mesh_index: usize,
    names: &ImportNames,
    is_bone: &[bool],
    issues: &mut Issues,
) -> Option<MeshObject> {
    let name = names.nodes[node].clone();
    let Some(mesh) = get_list(graph.json, json_path!["meshes"]).get(mesh_index) else {
        issues.warn(
            UNRESOLVED_REFERENCE,
            format!("node '{name}' references missing mesh {mesh_index}"),
        );
        return None;
    };

    let skin = get_usize(&graph.nodes[node], json_path!["skin"]);
    let vertex_groups = skin
        .map(|skin| {
            graph
                .skin_joints(skin)
                .into_iter()
                .map(|joint| names.nodes[joint].clone())
                .collect()
        })
        .unwrap_or_default();
    let shape_names = target_names(mesh);

    let mut assembly = MeshAssembly {
        object: MeshObject {
            name: name.clone(),
            origin: graph.host_position(node),
            parent_bone: skin
                .is_none()
                .then(|| graph.parent_bone(node, names, is_bone))
                .flatten(),
            vertex_groups,
            extras: graph.nodes[node].get("extras").map(host_value),
            ..MeshObject::default()
        },
        targets: vec![Vec::new(); shape_names.len()],
        ..MeshAssembly::default()
    };

    for (primitive_index, primitive) in get_list(mesh, json_path!["primitives"]).iter().enumerate() {
        let context = format!("mesh '{name}' primitive {primitive_index}");
        let mode = primitive
            .get("mode")
            .and_then(Value::as_u64)
            .unwrap_or(MODE_TRIANGLES);
        if mode != MODE_TRIANGLES {
            issues.warn(EMPTY_PRIMITIVE, format!("{context}: mode {mode} is not triangles; skipped"));
            continue;
        }
        let Some((base, count)) = get_usize(primitive, json_path!["attributes", "POSITION"])
            .and_then(|accessor| assembly.append_vertices(graph, primitive, accessor))
        else {
            issues.warn(EMPTY_PRIMITIVE, format!("{context}: positions are unreadable; skipped"));
            continue;
        };
        let indices = match get_usize(primitive, json_path!["indices"]) {
            Some(accessor) => match read_indices(graph.json, graph.bin, accessor) {
                Some(indices) => indices,
                None => {
                    issues.warn(EMPTY_PRIMITIVE, format!("{context}: indices are unreadable; skipped"));
                    continue;
                }
            },
            None => (0..count as u32).collect(),
        };

        let slot = assembly.object.material_slots.len();
        assembly
            .object
            .material_slots
            .push(get_usize(primitive, json_path!["material"]));
        let skipped = assembly.add_triangles(slot, base, count, &indices);
        if skipped > 0 {
            issues.warn(
                UNRESOLVED_REFERENCE,
                format!("{context}: {skipped} triangles index past the vertex streams"),
            );
        }
    }

    Some(assembly.finish(&shape_names))
}

fn import_images(json: &Value, bin: &[u8], issues: &mut Issues) -> (Vec<SceneImage>, Vec<TextureInfo>) {
    let mut images = Vec::new();
    let mut texture_infos = Vec::new();

    for (index, image) in get_list(json, json_path!["images"]).iter().enumerate() {
        let name = match get_str(image, json_path!["name"], "") {
            "" => format!("image_{index}"),
            name => name.to_string(),
        };
        let declared = image.get("mimeType").and_then(Value::as_str);
        let Some(bytes) = get_usize(image, json_path!["bufferView"])
            .and_then(|view| buffer_view_bytes(json, bin, view))
        else {
            issues.warn(
                UNRESOLVED_REFERENCE,
                format!("image '{name}' is not embedded in the binary chunk"),
            );
            images.push(SceneImage {
                name,
                data: ImageData::Encoded {
                    mime_type: declared.unwrap_or_default().to_string(),
                    bytes: Vec::new(),
                },
            });
            continue;
        };

        match probe_dimensions(bytes) {
            Ok((width, height)) => texture_infos.push(TextureInfo { index, width, height }),
            Err(err) => issues.warn(IMAGE_UNREADABLE, format!("image '{name}': {err}")),
        }
        let mime_type = declared
            .or_else(|| guess_mime_type(bytes))
            .unwrap_or("application/octet-stream")
            .to_string();
        images.push(SceneImage {
            name,
            data: ImageData::Encoded {
                mime_type,
                bytes: bytes.to_vec(),
            },
        });
    }
    (images, texture_infos)
}

/// Humanoid bones whose required ancestor is not above them in the tree.
fn validate_hierarchy(armature: &Armature, humanoid: &Humanoid, issues: &mut Issues) {
    let index_of = |human_bone: &str| {
        humanoid
            .bone(human_bone)
            .and_then(|name| armature.bone_index(name))
    };
    for (ancestor, descendant) in REQUIRED_PARENT_RELATIONS {
        let (Some(ancestor_index), Some(descendant_index)) = (index_of(ancestor), index_of(descendant))
        else {
            continue;
        };
        let mut current = armature.bones[descendant_index].parent;
        let mut steps = 0;
        while let Some(parent) = current {
            if parent == ancestor_index || steps > armature.bones.len() {
                break;
            }
            current = armature.bones[parent].parent;
            steps += 1;
        }
        if current != Some(ancestor_index) {
            issues.error(
                INVALID_BONE_HIERARCHY,
                format!("humanoid bone {descendant} is not below {ancestor}"),
            );
        }
    }
}

/// Reconstruct the scene held by a parsed document and its binary blob.
pub(crate) fn import_document(json: &Value, bin: &[u8]) -> Result<(SceneInput, ImportReport), VrmError> {
    let version = detect_version(json).ok_or_else(|| {
        VrmError::SchemaViolation("document carries neither a VRM nor a VRMC_vrm extension".into())
    })?;
    let mut issues = Issues::new();
    let names = ImportNames::from_document(json);
    let metadata = match version {
        VrmVersion::V0 => vrm0::import(json, &names, &mut issues),
        VrmVersion::V1 => vrm1::import(json, &names, &mut issues),
    };

    let graph = DocumentGraph::new(json, bin, version, &mut issues);
    let is_bone = graph.bone_flags(&names, &metadata.humanoid);
    let armature = graph.armature(&names, &is_bone);
    validate_hierarchy(&armature, &metadata.humanoid, &mut issues);

    let mut objects = Vec::new();
    let bone_count = armature.bones.len();
    if bone_count > 0 {
        objects.push(SceneObject::Armature(armature.clone()));
    }
    for node in 0..graph.nodes.len() {
        if let Some(mesh) = get_usize(&graph.nodes[node], json_path!["mesh"]) {
            if let Some(object) = import_mesh(&graph, node, mesh, &names, &is_bone, &mut issues) {
                objects.push(SceneObject::Mesh(object));
            }
        } else if !is_bone[node] && !graph.is_secondary(node, &names) {
            objects.push(SceneObject::Other(EmptyObject {
                name: names.nodes[node].clone(),
                origin: graph.host_position(node),
                parent_bone: graph.parent_bone(node, &names, &is_bone),
                extras: graph.nodes[node].get("extras").map(host_value),
            }));
        }
    }

    let materials = import_materials(json, version);
    let (images, texture_infos) = import_images(json, bin, &mut issues);

    let missing = missing_required_bones(&metadata.humanoid, |bone| armature.bone_index(bone).is_some());
    if !missing.is_empty() {
        issues.error(
            MISSING_REQUIRED_BONE,
            format!("missing required humanoid bones: {}", missing.join(", ")),
        );
    }

    let scene = SceneInput {
        objects,
        materials,
        images,
        metadata,
    };
    let meta = &scene.metadata.meta;
    let model_name = if meta.name.is_empty() {
        get_str(json, json_path!["asset", "generator"], "").to_string()
    } else {
        meta.name.clone()
    };
    let author = meta
        .authors
        .first()
        .cloned()
        .or_else(|| lookup(json, json_path!["asset", "copyright"]).and_then(Value::as_str).map(ToOwned::to_owned));

    let report = ImportReport {
        version,
        model_name,
        author,
        bone_count,
        mesh_count: scene.meshes().count(),
        total_vertices: scene.meshes().map(|mesh| mesh.positions.len()).sum(),
        total_polygons: scene.meshes().map(|mesh| mesh.faces.len()).sum(),
        material_count: scene.materials.len(),
        missing_required_bones: missing,
        texture_infos,
        issues: issues.into_vec(),
    };
    tracing::debug!(
        version = version.as_str(),
        bones = report.bone_count,
        meshes = report.mesh_count,
        "document imported"
    );
    Ok((scene, report))
}
