use std::collections::HashMap;

use nalgebra::Vector3;
use serde_json::{Map, Value, json};

use super::buffer::{BinaryBuilder, Bounds};
use super::gltf_utils::to_gltf_axes;
use super::morph::complete_shape;
use super::skinning::{JointWeights, WeightAdjustments, prepare_vertex_weights};
use crate::error::{EMPTY_PRIMITIVE, Issues, PRECISION_FALLBACK_JOINT, PRECISION_JOINT_TRUNCATED};
use crate::scene::{MeshObject, VrmVersion};

// ─── Inputs ───────────────────────────────────────────────────────────────────

/// Joint binding of a skinned mesh.
#[derive(Debug, Clone)]
pub(crate) struct SkinBinding {
    /// Joint slot per vertex group; `None` for groups that are not bones.
    pub(crate) group_joints: Vec<Option<u16>>,
    /// Slot receiving vertices left without any weight.
    pub(crate) fallback_joint: u16,
}

#[derive(Debug)]
pub(crate) struct MeshBuildInput<'a> {
    pub(crate) mesh: &'a MeshObject,
    pub(crate) version: VrmVersion,
    /// Added to every position before axis conversion (bakes skinned meshes
    /// into armature space).
    pub(crate) vertex_offset: Vector3<f32>,
    pub(crate) skin: Option<SkinBinding>,
    /// Per morph target, per source vertex normal deltas in host axes.
    pub(crate) morph_normals: Option<Vec<Vec<Vector3<f32>>>>,
}

/// Identity of an output vertex. Floats are compared bitwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct VertexKey {
    uvs: Vec<[u32; 2]>,
    normal: [u32; 3],
    vertex: usize,
}

impl VertexKey {
    fn new(uvs: &[[f32; 2]], normal: &Vector3<f32>, vertex: usize) -> Self {
        Self {
            uvs: uvs.iter().map(|uv| uv.map(f32::to_bits)).collect(),
            normal: [normal.x, normal.y, normal.z].map(f32::to_bits),
            vertex,
        }
    }
}

// ─── Deduplicated streams ─────────────────────────────────────────────────────

/// Deduplicated per-vertex attribute streams of one mesh, already in glTF
/// axes, plus one index run per material slot.
#[derive(Debug, Default)]
pub(crate) struct VertexStreams {
    pub(crate) positions: Vec<Vector3<f32>>,
    pub(crate) position_bounds: Bounds,
    pub(crate) normals: Vec<Vector3<f32>>,
    /// One stream per UV layer, V flipped.
    pub(crate) uvs: Vec<Vec<[f32; 2]>>,
    pub(crate) joints: Vec<[u16; 4]>,
    pub(crate) weights: Vec<[f32; 4]>,
    pub(crate) morph_positions: Vec<Vec<Vector3<f32>>>,
    pub(crate) morph_bounds: Vec<Bounds>,
    pub(crate) morph_normals: Vec<Vec<Vector3<f32>>>,
    /// `(material slot, triangle indices)` in ascending slot order.
    pub(crate) index_runs: Vec<(usize, Vec<u32>)>,
    /// Source vertex of every output vertex.
    pub(crate) source_vertices: Vec<usize>,
    pub(crate) truncated_vertices: usize,
    pub(crate) fallback_vertices: usize,
}

impl VertexStreams {
    pub(crate) fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub(crate) fn triangle_count(&self) -> usize {
        self.index_runs.iter().map(|(_, run)| run.len() / 3).sum()
    }
}

/// Walk the faces of a mesh (stable-sorted by material slot, n-gons fan
/// triangulated) and emit one output vertex per distinct [`VertexKey`].
pub(crate) fn build_vertex_streams(input: &MeshBuildInput<'_>) -> VertexStreams {
    let mesh = input.mesh;
    let version = input.version;
    let uv_layers = mesh.uv_layer_count();
    let convert =
        |position: [f32; 3]| to_gltf_axes(Vector3::from(position) + input.vertex_offset, version);

    let prepared_skin: Vec<(JointWeights, WeightAdjustments)> = match &input.skin {
        Some(binding) => (0..mesh.positions.len())
            .map(|vertex| {
                let pairs = mesh.vertex_weights.get(vertex).map(Vec::as_slice).unwrap_or(&[]);
                prepare_vertex_weights(pairs, &binding.group_joints, binding.fallback_joint)
            })
            .collect(),
        None => Vec::new(),
    };

    let reference = mesh
        .shape_keys
        .first()
        .map(|key| complete_shape(&key.positions, &mesh.positions))
        .unwrap_or_else(|| mesh.positions.clone());
    let targets: Vec<Vec<[f32; 3]>> = mesh
        .morph_targets()
        .iter()
        .map(|target| complete_shape(&target.positions, &mesh.positions))
        .collect();
    let target_count = targets.len();

    let mut streams = VertexStreams {
        uvs: vec![Vec::new(); uv_layers],
        morph_positions: vec![Vec::new(); target_count],
        morph_bounds: vec![Bounds::default(); target_count],
        morph_normals: if input.morph_normals.is_some() {
            vec![Vec::new(); target_count]
        } else {
            Vec::new()
        },
        ..VertexStreams::default()
    };

    let mut face_order: Vec<usize> = (0..mesh.faces.len()).collect();
    face_order.sort_by_key(|&index| mesh.faces[index].material_slot);

    let mut seen = HashMap::<VertexKey, u32>::new();
    let mut current_run: Option<(usize, Vec<u32>)> = None;

    for face_index in face_order {
        let face = &mesh.faces[face_index];
        if face.loops.len() < 3 || face.loops.iter().any(|c| c.vertex >= mesh.positions.len()) {
            continue;
        }

        if current_run.as_ref().map(|(slot, _)| *slot) != Some(face.material_slot) {
            if let Some(run) = current_run.take() {
                streams.index_runs.push(run);
            }
            current_run = Some((face.material_slot, Vec::new()));
        }

        let mut corner_indices = Vec::with_capacity(face.loops.len());
        for corner in &face.loops {
            let normal = to_gltf_axes(corner.normal, version);
            let uvs: Vec<[f32; 2]> = (0..uv_layers)
                .map(|layer| {
                    let [u, v] = corner.uvs.get(layer).copied().unwrap_or([0.0, 0.0]);
                    [u, 1.0 - v]
                })
                .collect();
            let key = VertexKey::new(&uvs, &normal, corner.vertex);

            let index = match seen.get(&key) {
                Some(index) => *index,
                None => {
                    let index = streams.positions.len() as u32;
                    let vertex = corner.vertex;

                    let position = convert(mesh.positions[vertex]);
                    streams.position_bounds.include(&position);
                    streams.positions.push(position);
                    streams.normals.push(normal);
                    for (layer, uv) in uvs.into_iter().enumerate() {
                        streams.uvs[layer].push(uv);
                    }

                    if let Some((prepared, adjustments)) = prepared_skin.get(vertex) {
                        streams.joints.push(prepared.joints);
                        streams.weights.push(prepared.weights);
                        streams.truncated_vertices += usize::from(adjustments.truncated);
                        streams.fallback_vertices += usize::from(adjustments.fallback);
                    }

                    let reference_position = convert(reference[vertex]);
                    for (target_index, target) in targets.iter().enumerate() {
                        let delta = convert(target[vertex]) - reference_position;
                        streams.morph_bounds[target_index].include(&delta);
                        streams.morph_positions[target_index].push(delta);
                    }
                    if let Some(normal_deltas) = &input.morph_normals {
                        for (target_index, stream) in streams.morph_normals.iter_mut().enumerate() {
                            let delta = normal_deltas
                                .get(target_index)
                                .and_then(|deltas| deltas.get(vertex))
                                .copied()
                                .unwrap_or_else(Vector3::zeros);
                            stream.push(to_gltf_axes(delta, version));
                        }
                    }

                    streams.source_vertices.push(vertex);
                    seen.insert(key, index);
                    index
                }
            };
            corner_indices.push(index);
        }

        if let Some((_, run)) = current_run.as_mut() {
            for corner in 1..corner_indices.len() - 1 {
                run.extend([corner_indices[0], corner_indices[corner], corner_indices[corner + 1]]);
            }
        }
    }

    if let Some(run) = current_run.take() {
        streams.index_runs.push(run);
    }
    streams
}

// ─── Accessor emission ────────────────────────────────────────────────────────

/// Accessor indices of one exported mesh.
#[derive(Debug, Clone, Default)]
pub(crate) struct MeshBuffers {
    pub(crate) attributes: Map<String, Value>,
    pub(crate) targets: Vec<Map<String, Value>>,
    /// `(material slot, index accessor)` per primitive.
    pub(crate) primitives: Vec<(usize, usize)>,
    pub(crate) vertex_count: usize,
    pub(crate) triangle_count: usize,
}

pub(crate) fn write_vertex_streams(
    streams: &VertexStreams,
    builder: &mut BinaryBuilder,
    issues: &mut Issues,
) -> MeshBuffers {
    let mut attributes = Map::new();
    let position = builder.add_vec3(&streams.positions, Some(&streams.position_bounds), issues);
    attributes.insert("POSITION".into(), json!(position));
    let normal = builder.add_vec3(&streams.normals, None, issues);
    attributes.insert("NORMAL".into(), json!(normal));
    for (layer, uvs) in streams.uvs.iter().enumerate() {
        let accessor = builder.add_vec2(uvs);
        attributes.insert(format!("TEXCOORD_{layer}"), json!(accessor));
    }
    if !streams.joints.is_empty() {
        let joints = builder.add_joints(&streams.joints);
        attributes.insert("JOINTS_0".into(), json!(joints));
        let weights = builder.add_vec4(&streams.weights);
        attributes.insert("WEIGHTS_0".into(), json!(weights));
    }

    let targets = streams
        .morph_positions
        .iter()
        .enumerate()
        .map(|(target_index, deltas)| {
            let mut target = Map::new();
            let position = builder.add_vec3(deltas, Some(&streams.morph_bounds[target_index]), issues);
            target.insert("POSITION".into(), json!(position));
            if let Some(normals) = streams.morph_normals.get(target_index) {
                let normal = builder.add_vec3(normals, None, issues);
                target.insert("NORMAL".into(), json!(normal));
            }
            target
        })
        .collect();

    let primitives = streams
        .index_runs
        .iter()
        .map(|(slot, indices)| (*slot, builder.add_indices(indices)))
        .collect();

    MeshBuffers {
        attributes,
        targets,
        primitives,
        vertex_count: streams.vertex_count(),
        triangle_count: streams.triangle_count(),
    }
}

/// Build and write the buffers of one mesh. A mesh without a single
/// triangle emits nothing and records an `EMPTY_PRIMITIVE` warning.
pub(crate) fn export_mesh_geometry(
    input: &MeshBuildInput<'_>,
    builder: &mut BinaryBuilder,
    issues: &mut Issues,
) -> Option<MeshBuffers> {
    let streams = build_vertex_streams(input);
    let name = &input.mesh.name;

    if streams.triangle_count() == 0 {
        issues.warn(
            EMPTY_PRIMITIVE,
            format!("mesh '{name}' has no faces; no accessors were written"),
        );
        return None;
    }
    if streams.truncated_vertices > 0 {
        issues.warn(
            PRECISION_JOINT_TRUNCATED,
            format!(
                "mesh '{name}': {} vertices had more than 4 joint influences",
                streams.truncated_vertices
            ),
        );
    }
    if streams.fallback_vertices > 0 {
        issues.warn(
            PRECISION_FALLBACK_JOINT,
            format!(
                "mesh '{name}': {} vertices without weights were bound to the fallback joint",
                streams.fallback_vertices
            ),
        );
    }

    tracing::debug!(
        mesh = %name,
        vertices = streams.vertex_count(),
        triangles = streams.triangle_count(),
        "mesh buffers built"
    );
    Some(write_vertex_streams(&streams, builder, issues))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::scene::{Face, Loop, ShapeKey};

    fn corner(vertex: usize, uv: [f32; 2]) -> Loop {
        Loop {
            vertex,
            normal: [0.0, 0.0, 1.0],
            uvs: vec![uv],
        }
    }

    fn two_triangles_sharing_an_edge() -> MeshObject {
        MeshObject {
            name: "Quad".into(),
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 2.0],
            ],
            faces: vec![
                Face {
                    material_slot: 0,
                    loops: vec![corner(0, [0.0, 0.0]), corner(1, [1.0, 0.0]), corner(2, [1.0, 1.0])],
                },
                Face {
                    material_slot: 0,
                    loops: vec![corner(0, [0.0, 0.0]), corner(2, [1.0, 1.0]), corner(3, [0.0, 1.0])],
                },
            ],
            material_slots: vec![Some(0)],
            ..MeshObject::default()
        }
    }

    fn input(mesh: &MeshObject, version: VrmVersion) -> MeshBuildInput<'_> {
        MeshBuildInput {
            mesh,
            version,
            vertex_offset: Vector3::zeros(),
            skin: None,
            morph_normals: None,
        }
    }

    #[test]
    fn given_two_faces_sharing_vertices_when_building_then_four_vertices_are_emitted() {
        let mesh = two_triangles_sharing_an_edge();

        let streams = build_vertex_streams(&input(&mesh, VrmVersion::V0));

        assert_eq!(streams.vertex_count(), 4);
        assert_eq!(streams.index_runs, vec![(0, vec![0, 1, 2, 0, 2, 3])]);
        assert_eq!(streams.uvs[0][1], [1.0, 1.0]);
        assert_eq!(streams.uvs[0][2], [1.0, 0.0]);
    }

    #[test]
    fn given_split_uv_seam_when_building_then_vertex_is_duplicated() {
        let mut mesh = two_triangles_sharing_an_edge();
        mesh.faces[1].loops[0].uvs = vec![[0.5, 0.5]];

        let streams = build_vertex_streams(&input(&mesh, VrmVersion::V0));

        assert_eq!(streams.vertex_count(), 5);
        assert_eq!(streams.source_vertices, vec![0, 1, 2, 0, 3]);
    }

    #[test]
    fn given_built_streams_when_checking_keys_then_distinct_indices_have_distinct_keys() {
        let mut mesh = two_triangles_sharing_an_edge();
        mesh.faces.push(Face {
            material_slot: 0,
            loops: vec![corner(3, [0.0, 1.0]), corner(2, [1.0, 1.0]), corner(1, [0.2, 0.0])],
        });

        let streams = build_vertex_streams(&input(&mesh, VrmVersion::V1));

        let mut keys = std::collections::HashSet::new();
        for index in 0..streams.vertex_count() {
            let uvs: Vec<[f32; 2]> = streams.uvs.iter().map(|layer| layer[index]).collect();
            assert!(keys.insert(VertexKey::new(
                &uvs,
                &streams.normals[index],
                streams.source_vertices[index]
            )));
        }
        assert_eq!(streams.vertex_count(), 5);
    }

    #[test]
    fn given_faces_of_several_materials_when_building_then_runs_are_sorted_and_fanned() {
        let mut mesh = two_triangles_sharing_an_edge();
        mesh.faces[0].material_slot = 1;
        mesh.faces.push(Face {
            material_slot: 0,
            loops: vec![
                corner(0, [0.0, 0.0]),
                corner(1, [1.0, 0.0]),
                corner(2, [1.0, 1.0]),
                corner(3, [0.0, 1.0]),
            ],
        });

        let streams = build_vertex_streams(&input(&mesh, VrmVersion::V0));

        let slots: Vec<usize> = streams.index_runs.iter().map(|(slot, _)| *slot).collect();
        assert_eq!(slots, vec![0, 1]);
        assert_eq!(streams.index_runs[0].1.len(), 9);
        assert_eq!(streams.index_runs[1].1.len(), 3);
        assert_eq!(streams.triangle_count(), 4);
    }

    #[test]
    fn given_positions_when_building_then_axes_are_converted_and_bounds_bracket_them() {
        let mesh = two_triangles_sharing_an_edge();

        let legacy = build_vertex_streams(&input(&mesh, VrmVersion::V0));
        let newer = build_vertex_streams(&input(&mesh, VrmVersion::V1));

        assert_eq!(legacy.positions[3], Vector3::new(0.0, 2.0, 1.0));
        assert_eq!(newer.positions[3], Vector3::new(0.0, 2.0, -1.0));
        for streams in [&legacy, &newer] {
            assert!(streams.positions.iter().all(|p| streams.position_bounds.contains(p)));
        }
        assert_eq!(newer.position_bounds.min, Vector3::new(0.0, 0.0, -1.0));
        assert_eq!(newer.position_bounds.max, Vector3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn given_shape_keys_when_building_then_position_deltas_are_relative_to_reference() {
        let mut mesh = two_triangles_sharing_an_edge();
        let mut raised = mesh.positions.clone();
        raised[2][2] += 0.5;
        mesh.shape_keys = vec![
            ShapeKey {
                name: "Basis".into(),
                positions: mesh.positions.clone(),
            },
            ShapeKey {
                name: "Raise".into(),
                positions: raised,
            },
        ];

        let streams = build_vertex_streams(&input(&mesh, VrmVersion::V1));

        assert_eq!(streams.morph_positions.len(), 1);
        assert_eq!(streams.morph_positions[0][2], Vector3::new(0.0, 0.5, 0.0));
        assert_eq!(streams.morph_positions[0][0], Vector3::zeros());
        assert!(streams.morph_positions[0]
            .iter()
            .all(|delta| streams.morph_bounds[0].contains(delta)));
    }

    #[test]
    fn given_skinned_mesh_when_writing_then_joint_and_weight_accessors_are_added() {
        let mut mesh = two_triangles_sharing_an_edge();
        mesh.vertex_groups = vec!["Hips".into()];
        mesh.vertex_weights = vec![vec![(0, 1.0)], vec![(0, 0.5)], vec![], vec![(0, 1.0)]];
        let mut build = input(&mesh, VrmVersion::V0);
        build.skin = Some(SkinBinding {
            group_joints: vec![Some(3)],
            fallback_joint: 0,
        });
        let mut builder = BinaryBuilder::new();
        let mut issues = Issues::new();

        let buffers = export_mesh_geometry(&build, &mut builder, &mut issues)
            .expect("mesh has faces");
        let (_, accessors, _) = builder.finish();

        let keys: Vec<&str> = buffers.attributes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["POSITION", "NORMAL", "TEXCOORD_0", "JOINTS_0", "WEIGHTS_0"]);
        let joints = buffers.attributes["JOINTS_0"].as_u64().unwrap_or_default() as usize;
        assert_eq!(accessors[joints]["componentType"], json!(5123));
        assert!(issues.has_code(PRECISION_FALLBACK_JOINT));
        assert_eq!(buffers.primitives.len(), 1);
    }

    #[test]
    fn given_mesh_without_faces_when_exporting_then_warning_is_recorded() {
        let mesh = MeshObject {
            name: "Empty".into(),
            positions: vec![[0.0; 3]],
            ..MeshObject::default()
        };
        let mut builder = BinaryBuilder::new();
        let mut issues = Issues::new();

        let buffers = export_mesh_geometry(&input(&mesh, VrmVersion::V0), &mut builder, &mut issues);

        assert!(buffers.is_none());
        assert!(issues.has_code(EMPTY_PRIMITIVE));
        assert_eq!(builder.accessor_count(), 0);
    }
}
