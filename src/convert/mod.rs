//! Scene to VRM conversion and back.
//!
//! [`export_vrm`] lays out nodes and skins, writes mesh buffers, maps
//! materials and finally assembles the avatar extension block for the
//! requested generation. [`import_vrm`] reverses the flow and
//! [`migrate_vrm`] chains the two.

mod buffer;
mod geometry;
mod gltf_utils;
mod import;
mod material;
mod metadata;
mod morph;
mod skeleton;
mod skinning;
mod types;

use std::collections::HashMap;

use nalgebra::Vector3;
use serde_json::{Map, Value, json};

use buffer::BinaryBuilder;
use geometry::{MeshBuildInput, export_mesh_geometry};
use material::MaterialExporter;
use metadata::{ExportIndex, MeshRef, Thumbnail, check_required_bones, vrm0, vrm1};
use morph::morph_normal_deltas;
use skeleton::NodeGraph;

use crate::error::{Issues, UNRESOLVED_REFERENCE, VrmError};
use crate::glb;
use crate::json::make_json;
use crate::scene::{MeshObject, SceneInput, SceneObject, TextureRef, VrmVersion};

pub use material::{PbrGatherer, shading_from_vrm1, shading_to_vrm1};
pub use skinning::normalize_weights_for_f32;
pub use types::{
    ExportOptions, ExportReport, HUMAN_BONES, ImportReport, MigrationReport, REQUIRED_BONES,
    REQUIRED_PARENT_RELATIONS, SECONDARY_NODE_NAME, TextureInfo,
};

const LEGACY_EXTENSION: &str = "VRM";
const MODE_TRIANGLES: u32 = 4;

/// Totals gathered while meshes are written.
#[derive(Debug, Default)]
struct MeshTotals {
    meshes: usize,
    vertices: usize,
    triangles: usize,
}

/// Serialize a scene into VRM bytes at `options.target_version`.
///
/// Fails when a required humanoid bone is missing (unless the metadata
/// allows non-humanoid models), when an image cannot be encoded, or when
/// the result does not fit a GLB container.
pub fn export_vrm(
    scene: &SceneInput,
    options: &ExportOptions,
    gatherer: Option<&dyn PbrGatherer>,
) -> Result<(Vec<u8>, ExportReport), VrmError> {
    let version = options.target_version;
    let mut issues = Issues::new();
    let mut builder = BinaryBuilder::new();

    let mut graph = NodeGraph::build(scene, version, &mut issues);
    let mut index = ExportIndex {
        bone_nodes: graph.bone_nodes.clone(),
        first_child: first_children(scene),
        ..ExportIndex::default()
    };
    check_required_bones(&scene.metadata, &index, &mut issues)?;

    let mut exporter = MaterialExporter::new(&scene.images, version, options.export_extras);
    let mut materials = Vec::with_capacity(scene.materials.len());
    let mut legacy_materials = Vec::new();
    for (material_index, material) in scene.materials.iter().enumerate() {
        let exported = exporter.export(material, &mut builder, gatherer, &mut issues)?;
        materials.push(exported.gltf);
        legacy_materials.extend(exported.legacy);
        index.materials.insert(material.name.clone(), material_index);
    }

    if let Some(scene_image) = scene.metadata.meta.thumbnail_image
        && let Some(texture) = exporter.texture(&TextureRef::new(scene_image), &mut builder, &mut issues)?
        && let Some(image) = exporter.image(scene_image, &mut builder, &mut issues)?
    {
        index.thumbnail = Some(Thumbnail { image, texture });
    }

    let mut meshes = Vec::new();
    let mut totals = MeshTotals::default();
    for object in &scene.objects {
        match object {
            SceneObject::Armature(_) => {}
            SceneObject::Mesh(mesh) => {
                let skin = graph.skin_binding(mesh);
                let (node, vertex_offset) = match &skin {
                    Some((skin_index, _)) => (
                        graph.add_skinned_mesh(&mesh.name, *skin_index),
                        Vector3::from(mesh.origin),
                    ),
                    None => (
                        graph.add_object(&mesh.name, mesh.origin, mesh.parent_bone.as_deref(), &mut issues),
                        Vector3::zeros(),
                    ),
                };
                if options.export_extras
                    && let Some(extras) = &mesh.extras
                {
                    graph.nodes[node].extras = Some(make_json(extras, &mut issues));
                }

                let input = MeshBuildInput {
                    mesh,
                    version,
                    vertex_offset,
                    skin: skin.map(|(_, binding)| binding),
                    morph_normals: morph_normals_for(scene, mesh, options),
                };
                let Some(buffers) = export_mesh_geometry(&input, &mut builder, &mut issues) else {
                    continue;
                };

                let target_names: Vec<&str> =
                    mesh.morph_targets().iter().map(|key| key.name.as_str()).collect();
                let primitives = buffers
                    .primitives
                    .iter()
                    .map(|(slot, indices)| {
                        let mut primitive = Map::new();
                        primitive.insert("attributes".into(), Value::Object(buffers.attributes.clone()));
                        primitive.insert("indices".into(), json!(indices));
                        if let Some(material) = slot_material(scene, mesh, *slot, &mut issues) {
                            primitive.insert("material".into(), json!(material));
                        }
                        primitive.insert("mode".into(), json!(MODE_TRIANGLES));
                        if !buffers.targets.is_empty() {
                            let targets: Vec<Value> =
                                buffers.targets.iter().cloned().map(Value::Object).collect();
                            primitive.insert("targets".into(), Value::Array(targets));
                            if version == VrmVersion::V0 {
                                primitive.insert("extras".into(), json!({ "targetNames": target_names }));
                            }
                        }
                        Value::Object(primitive)
                    })
                    .collect::<Vec<_>>();

                let mut mesh_json = Map::new();
                mesh_json.insert("name".into(), json!(mesh.name));
                mesh_json.insert("primitives".into(), Value::Array(primitives));
                if !target_names.is_empty() {
                    mesh_json.insert("extras".into(), json!({ "targetNames": target_names }));
                }

                let mesh_index = meshes.len();
                meshes.push(Value::Object(mesh_json));
                graph.nodes[node].mesh = Some(mesh_index);
                index.meshes.insert(
                    mesh.name.clone(),
                    MeshRef {
                        mesh: mesh_index,
                        node,
                        targets: target_names.iter().map(|name| name.to_string()).collect(),
                    },
                );
                totals.meshes += 1;
                totals.vertices += buffers.vertex_count;
                totals.triangles += buffers.triangle_count;
            }
            SceneObject::Other(empty) => {
                let node = graph.add_object(&empty.name, empty.origin, empty.parent_bone.as_deref(), &mut issues);
                if options.export_extras
                    && let Some(extras) = &empty.extras
                {
                    graph.nodes[node].extras = Some(make_json(extras, &mut issues));
                }
            }
        }
    }
    graph.add_secondary();

    let mut extensions = Map::new();
    let mut vrm_extensions: Vec<&str> = Vec::new();
    match version {
        VrmVersion::V0 => {
            let vrm = vrm0::export(
                &scene.metadata,
                &index,
                &options.generator,
                legacy_materials,
                &mut issues,
            );
            extensions.insert(LEGACY_EXTENSION.into(), vrm);
            vrm_extensions.push(LEGACY_EXTENSION);
        }
        VrmVersion::V1 => {
            extensions.insert(vrm1::VRMC_VRM.into(), vrm1::export_vrm(&scene.metadata, &index, &mut issues));
            vrm_extensions.push(vrm1::VRMC_VRM);
            if let Some(spring) = vrm1::export_spring(&scene.metadata, &index, &mut issues) {
                extensions.insert(vrm1::VRMC_SPRING_BONE.into(), spring);
                vrm_extensions.push(vrm1::VRMC_SPRING_BONE);
            }
        }
    }

    let nodes = graph.nodes_json(&mut issues);
    let skins = graph.skins_json(&mut builder);
    let tables = exporter.finish();
    let (buffer_views, accessors, bin) = builder.finish();

    let mut extensions_used: Vec<&str> = tables.extensions_used.clone();
    extensions_used.extend(vrm_extensions);

    let mut document = Map::new();
    document.insert(
        "asset".into(),
        json!({ "generator": options.generator, "version": "2.0" }),
    );
    document.insert("extensionsUsed".into(), json!(extensions_used));
    document.insert("scene".into(), json!(0));
    document.insert("scenes".into(), json!([{ "nodes": graph.roots }]));
    document.insert("nodes".into(), Value::Array(nodes));
    let optional_tables = [
        ("meshes", meshes),
        ("skins", skins),
        ("materials", materials),
        ("textures", tables.textures),
        ("samplers", tables.samplers),
        ("images", tables.images),
        ("accessors", accessors),
        ("bufferViews", buffer_views),
    ];
    for (key, table) in optional_tables {
        if !table.is_empty() {
            document.insert(key.into(), Value::Array(table));
        }
    }
    if !bin.is_empty() {
        document.insert("buffers".into(), json!([{ "byteLength": bin.len() }]));
    }
    document.insert("extensions".into(), Value::Object(extensions));

    let bytes = glb::encode(&Value::Object(document), &bin)?;
    let report = ExportReport {
        version,
        node_count: graph.nodes.len(),
        mesh_count: totals.meshes,
        skin_count: graph.skins.len(),
        material_count: scene.materials.len(),
        total_vertices: totals.vertices,
        total_triangles: totals.triangles,
        issues: issues.into_vec(),
    };
    tracing::info!(
        version = version.as_str(),
        nodes = report.node_count,
        meshes = report.mesh_count,
        bytes = bytes.len(),
        "VRM exported"
    );
    Ok((bytes, report))
}

/// Parse VRM bytes of either generation back into a scene.
pub fn import_vrm(bytes: &[u8]) -> Result<(SceneInput, ImportReport), VrmError> {
    let (json, bin) = glb::decode(bytes)?;
    import::import_document(&json, &bin)
}

/// Re-encode VRM bytes at `target`, going through the version-agnostic
/// scene. A source that already lacks required bones stays exportable.
pub fn migrate_vrm(
    bytes: &[u8],
    target: VrmVersion,
    options: &ExportOptions,
) -> Result<(Vec<u8>, MigrationReport), VrmError> {
    let (mut scene, import) = import_vrm(bytes)?;
    if !import.missing_required_bones.is_empty() {
        scene.metadata.allow_non_humanoid = true;
    }
    let options = ExportOptions {
        target_version: target,
        ..options.clone()
    };
    let (output, export) = export_vrm(&scene, &options, None)?;
    tracing::info!(from = import.version.as_str(), to = target.as_str(), "VRM migrated");
    Ok((
        output,
        MigrationReport {
            from: import.version,
            to: target,
            import,
            export,
        },
    ))
}

/// Bone name to its first child, for the exported armature.
fn first_children(scene: &SceneInput) -> HashMap<String, String> {
    let Some(armature) = scene.armatures().next() else {
        return HashMap::new();
    };
    (0..armature.bones.len())
        .filter_map(|bone| {
            armature.children_of(bone).next().map(|child| {
                (armature.bones[bone].name.clone(), armature.bones[child].name.clone())
            })
        })
        .collect()
}

/// Normal deltas are only written for 0.x; faces whose material opts out
/// do not contribute.
fn morph_normals_for(
    scene: &SceneInput,
    mesh: &MeshObject,
    options: &ExportOptions,
) -> Option<Vec<Vec<Vector3<f32>>>> {
    if options.target_version != VrmVersion::V0
        || !options.export_morph_normals
        || mesh.morph_targets().is_empty()
    {
        return None;
    }
    let excluded: Vec<bool> = mesh
        .material_slots
        .iter()
        .map(|slot| {
            slot.and_then(|material| scene.materials.get(material))
                .is_some_and(|material| !material.export_shape_key_normals)
        })
        .collect();
    Some(morph_normal_deltas(mesh, &excluded))
}

fn slot_material(scene: &SceneInput, mesh: &MeshObject, slot: usize, issues: &mut Issues) -> Option<usize> {
    let material = mesh.material_slots.get(slot).copied().flatten()?;
    if material < scene.materials.len() {
        Some(material)
    } else {
        issues.warn(
            UNRESOLVED_REFERENCE,
            format!("mesh '{}' slot {slot} uses missing material #{material}", mesh.name),
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::{MISSING_REQUIRED_BONE, Severity};
    use crate::scene::{
        Armature, Bone, ColliderGroup, EmptyObject, Expression, ExpressionPreset, Face, Humanoid,
        ImageData, Loop, MaterialDescription, MorphTargetBind, SceneImage, SceneMaterial,
        ShapeKey, SphereCollider, SpringGroup,
    };

    const BODY: [(&str, Option<&str>, [f32; 3]); 17] = [
        ("hips", None, [0.0, 0.0, 1.0]),
        ("spine", Some("hips"), [0.0, 0.0, 1.125]),
        ("chest", Some("spine"), [0.0, 0.0, 1.25]),
        ("neck", Some("chest"), [0.0, 0.0, 1.5]),
        ("head", Some("neck"), [0.0, 0.0, 1.625]),
        ("leftUpperArm", Some("chest"), [0.25, 0.0, 1.5]),
        ("leftLowerArm", Some("leftUpperArm"), [0.5, 0.0, 1.5]),
        ("leftHand", Some("leftLowerArm"), [0.75, 0.0, 1.5]),
        ("rightUpperArm", Some("chest"), [-0.25, 0.0, 1.5]),
        ("rightLowerArm", Some("rightUpperArm"), [-0.5, 0.0, 1.5]),
        ("rightHand", Some("rightLowerArm"), [-0.75, 0.0, 1.5]),
        ("leftUpperLeg", Some("hips"), [0.125, 0.0, 1.0]),
        ("leftLowerLeg", Some("leftUpperLeg"), [0.125, 0.0, 0.5]),
        ("leftFoot", Some("leftLowerLeg"), [0.125, 0.0, 0.125]),
        ("rightUpperLeg", Some("hips"), [-0.125, 0.0, 1.0]),
        ("rightLowerLeg", Some("rightUpperLeg"), [-0.125, 0.0, 0.5]),
        ("rightFoot", Some("rightLowerLeg"), [-0.125, 0.0, 0.125]),
    ];

    fn bone_name(human: &str) -> String {
        format!("J_{human}")
    }

    fn armature() -> Armature {
        let mut bones: Vec<Bone> = BODY
            .iter()
            .map(|(human, parent, head)| Bone {
                name: bone_name(human),
                parent: parent.map(|parent| BODY.iter().position(|(name, _, _)| *name == parent).unwrap_or(0)),
                head: *head,
            })
            .collect();
        let head = bones.iter().position(|bone| bone.name == "J_head").unwrap_or(0);
        bones.push(Bone {
            name: "J_hair".into(),
            parent: Some(head),
            head: [0.0, 0.125, 1.75],
        });
        bones.push(Bone {
            name: "J_hair_end".into(),
            parent: Some(bones.len() - 1),
            head: [0.0, 0.25, 1.625],
        });
        Armature {
            name: "Armature".into(),
            bones,
        }
    }

    fn corner(vertex: usize, uv: [f32; 2]) -> Loop {
        Loop {
            vertex,
            normal: [0.0, -1.0, 0.0],
            uvs: vec![uv],
        }
    }

    fn body() -> MeshObject {
        let positions = vec![
            [-0.25, 0.0, 1.0],
            [0.25, 0.0, 1.0],
            [0.25, 0.0, 1.25],
            [-0.25, 0.0, 1.25],
        ];
        let mut smile = positions.clone();
        smile[2][2] = 1.375;
        MeshObject {
            name: "Body".into(),
            positions: positions.clone(),
            faces: vec![Face {
                material_slot: 0,
                loops: vec![
                    corner(0, [0.0, 0.0]),
                    corner(1, [1.0, 0.0]),
                    corner(2, [1.0, 1.0]),
                    corner(3, [0.0, 1.0]),
                ],
            }],
            material_slots: vec![Some(0)],
            vertex_groups: vec!["J_chest".into(), "J_spine".into()],
            vertex_weights: vec![vec![(1, 1.0)], vec![(1, 1.0)], vec![(0, 1.0)], vec![(0, 0.5), (1, 0.5)]],
            shape_keys: vec![
                ShapeKey {
                    name: "Basis".into(),
                    positions,
                },
                ShapeKey {
                    name: "Smile".into(),
                    positions: smile,
                },
            ],
            ..MeshObject::default()
        }
    }

    fn scene() -> SceneInput {
        let mut scene = SceneInput {
            objects: vec![
                SceneObject::Armature(armature()),
                SceneObject::Mesh(body()),
                SceneObject::Other(EmptyObject {
                    name: "Marker".into(),
                    origin: [1.0, 0.0, 0.0],
                    ..EmptyObject::default()
                }),
            ],
            materials: vec![SceneMaterial::new("Skin", MaterialDescription::Mtoon(Box::default()))],
            images: vec![SceneImage {
                name: "Thumbnail".into(),
                data: ImageData::Rgba8 {
                    width: 2,
                    height: 2,
                    pixels: vec![255; 16],
                },
            }],
            ..SceneInput::default()
        };

        let metadata = &mut scene.metadata;
        metadata.meta.name = "Sample".into();
        metadata.meta.authors = vec!["Author".into()];
        metadata.meta.thumbnail_image = Some(0);
        metadata.humanoid = Humanoid {
            bones: BODY
                .iter()
                .map(|(human, _, _)| (human.to_string(), bone_name(human)))
                .collect::<BTreeMap<_, _>>(),
        };
        metadata.first_person.bone = Some("J_head".into());

        let mut happy = Expression::new("happy", ExpressionPreset::Happy);
        happy.morph_target_binds.push(MorphTargetBind {
            mesh: "Body".into(),
            shape_key: "Smile".into(),
            weight: 0.5,
        });
        metadata.expressions.push(happy);

        metadata.spring_bone.collider_groups.push(ColliderGroup {
            name: "Head".into(),
            bone: "J_head".into(),
            colliders: vec![SphereCollider {
                offset: [0.0, 0.0, 0.125],
                radius: 0.125,
            }],
        });
        metadata.spring_bone.groups.push(SpringGroup {
            comment: "Hair".into(),
            bones: vec!["J_hair".into()],
            collider_groups: vec![0],
            ..SpringGroup::default()
        });
        scene
    }

    fn export(scene: &SceneInput, version: VrmVersion) -> (Vec<u8>, ExportReport) {
        let options = ExportOptions {
            target_version: version,
            ..ExportOptions::default()
        };
        export_vrm(scene, &options, None).expect("scene should export")
    }

    fn imported_armature(scene: &SceneInput) -> &Armature {
        scene.armatures().next().expect("armature should be imported")
    }

    fn imported_body(scene: &SceneInput) -> &MeshObject {
        scene
            .meshes()
            .find(|mesh| mesh.name == "Body")
            .expect("body should be imported")
    }

    #[test]
    fn given_humanoid_scene_when_exporting_0x_then_independent_parser_accepts_document() {
        let (bytes, report) = export(&scene(), VrmVersion::V0);

        let gltf = gltf::Gltf::from_slice(&bytes).expect("output should be valid glTF");
        assert_eq!(gltf.nodes().count(), report.node_count);
        assert_eq!(report.node_count, 19 + 3);
        assert_eq!(gltf.nodes().last().and_then(|node| node.name()), Some(SECONDARY_NODE_NAME));
        assert_eq!(gltf.skins().count(), 1);
        assert_eq!(gltf.skins().next().map(|skin| skin.joints().count()), Some(19));

        let mesh = gltf.meshes().next().expect("body mesh");
        assert_eq!(mesh.name(), Some("Body"));
        let primitive = mesh.primitives().next().expect("one primitive");
        assert_eq!(primitive.morph_targets().count(), 1);
        assert_eq!(primitive.material().index(), Some(0));

        assert_eq!(report.mesh_count, 1);
        assert_eq!(report.total_vertices, 4);
        assert_eq!(report.total_triangles, 2);
        assert!(report.issues.iter().all(|issue| issue.severity != Severity::Error));
    }

    #[test]
    fn given_humanoid_scene_when_round_tripping_either_version_then_scene_survives() {
        let source = scene();
        for version in [VrmVersion::V0, VrmVersion::V1] {
            let (bytes, _) = export(&source, version);
            let (imported, report) = import_vrm(&bytes).expect("export output should import");

            assert_eq!(report.version, version);
            assert_eq!(report.model_name, "Sample");
            assert_eq!(report.author.as_deref(), Some("Author"));
            assert_eq!(report.bone_count, 19);
            assert!(report.missing_required_bones.is_empty());
            assert_eq!(report.texture_infos.len(), 1);
            assert_eq!((report.texture_infos[0].width, report.texture_infos[0].height), (2, 2));

            let bones = &imported_armature(&imported).bones;
            for bone in &armature().bones {
                let copy = bones
                    .iter()
                    .find(|copy| copy.name == bone.name)
                    .expect("bone should survive");
                assert_eq!(copy.head, bone.head, "head of {}", bone.name);
            }
            let hair = bones.iter().find(|bone| bone.name == "J_hair").expect("hair bone");
            let parent = hair.parent.map(|parent| bones[parent].name.as_str());
            assert_eq!(parent, Some("J_head"));

            let expected = body();
            let body = imported_body(&imported);
            assert_eq!(body.positions, expected.positions);
            assert_eq!(body.faces.len(), 2);
            assert_eq!(
                body.shape_keys.iter().map(|key| key.name.as_str()).collect::<Vec<_>>(),
                vec!["Basis", "Smile"]
            );
            assert_eq!(body.shape_keys[1].positions[2], [0.25, 0.0, 1.375]);
            let chest = body
                .vertex_groups
                .iter()
                .position(|group| group == "J_chest")
                .expect("chest group");
            assert_eq!(body.vertex_weights[2], vec![(chest, 1.0)]);

            assert!(imported.objects.iter().any(|object| matches!(
                object,
                SceneObject::Other(empty) if empty.name == "Marker" && empty.origin == [1.0, 0.0, 0.0]
            )));
            assert!(!imported.objects.iter().any(|object| matches!(
                object,
                SceneObject::Other(empty) if empty.name == SECONDARY_NODE_NAME
            )));

            assert_eq!(imported.materials.len(), 1);
            assert_eq!(imported.materials[0].name, "Skin");
            assert!(matches!(imported.materials[0].description, MaterialDescription::Mtoon(_)));

            let metadata = &imported.metadata;
            assert_eq!(metadata.source_version, Some(version));
            assert_eq!(metadata.humanoid.bone("leftFoot"), Some("J_leftFoot"));
            assert_eq!(metadata.meta.thumbnail_image, Some(0));
            let happy = metadata
                .expressions
                .iter()
                .find(|expression| expression.preset == ExpressionPreset::Happy)
                .expect("happy expression");
            assert_eq!(
                happy.morph_target_binds,
                vec![MorphTargetBind {
                    mesh: "Body".into(),
                    shape_key: "Smile".into(),
                    weight: 0.5,
                }]
            );
            assert_eq!(metadata.spring_bone.groups.len(), 1);
            assert_eq!(metadata.spring_bone.groups[0].bones, vec!["J_hair".to_string()]);
            assert_eq!(metadata.spring_bone.collider_groups.len(), 1);
            assert_eq!(metadata.spring_bone.collider_groups[0].bone, "J_head");
        }
    }

    #[test]
    fn given_exported_file_when_migrating_to_same_version_then_document_and_blob_are_stable() {
        let source = scene();
        for version in [VrmVersion::V0, VrmVersion::V1] {
            let (first, _) = export(&source, version);

            let (second, report) =
                migrate_vrm(&first, version, &ExportOptions::default()).expect("migration");

            assert_eq!((report.from, report.to), (version, version));
            let (first_json, first_bin) = glb::decode(&first).expect("first container");
            let (second_json, second_bin) = glb::decode(&second).expect("second container");
            assert_eq!(
                crate::json::structural_diff(&first_json, &second_json, 1e-5),
                Vec::<String>::new(),
                "{version:?} document drifted"
            );
            assert_eq!(first_bin.len(), second_bin.len(), "{version:?} blob length");
        }
    }

    #[test]
    fn given_0x_file_when_migrating_to_1_0_then_weights_are_rescaled_and_blocks_swapped() {
        let mut source = scene();
        source.metadata.expressions[0].morph_target_binds[0].weight = 0.8;
        let (bytes, _) = export(&source, VrmVersion::V0);

        let (migrated, report) =
            migrate_vrm(&bytes, VrmVersion::V1, &ExportOptions::default()).expect("migration");
        assert_eq!((report.from, report.to), (VrmVersion::V0, VrmVersion::V1));
        assert_eq!(report.export.version, VrmVersion::V1);

        let (json, _) = glb::decode(&migrated).expect("migrated container");
        let extensions = json["extensions"].as_object().expect("extensions");
        assert!(extensions.contains_key(vrm1::VRMC_VRM));
        assert!(extensions.contains_key(vrm1::VRMC_SPRING_BONE));
        assert!(!extensions.contains_key(LEGACY_EXTENSION));

        let weight = json["extensions"][vrm1::VRMC_VRM]["expressions"]["preset"]["happy"]
            ["morphTargetBinds"][0]["weight"]
            .as_f64()
            .expect("bind weight");
        assert!((weight - 0.8).abs() < 1e-6, "weight was {weight}");
    }

    #[test]
    fn given_missing_required_bone_when_exporting_then_strict_mode_fails_and_lenient_mode_warns() {
        let mut source = scene();
        source.metadata.humanoid.bones.remove("leftFoot");

        let options = ExportOptions::default();
        assert!(matches!(
            export_vrm(&source, &options, None),
            Err(VrmError::SchemaViolation(message)) if message.contains("leftFoot")
        ));

        source.metadata.allow_non_humanoid = true;
        let (_, report) = export_vrm(&source, &options, None).expect("lenient export");
        assert!(report.issues.iter().any(|issue| issue.code == MISSING_REQUIRED_BONE));
    }

    #[test]
    fn given_slot_without_material_when_exporting_then_primitive_has_no_material() {
        let mut source = scene();
        source.materials.clear();
        if let Some(SceneObject::Mesh(mesh)) = source.objects.get_mut(1) {
            mesh.material_slots = vec![None];
        }
        let (bytes, report) = export(&source, VrmVersion::V1);

        let (json, _) = glb::decode(&bytes).expect("container");
        assert!(json["meshes"][0]["primitives"][0].get("material").is_none());
        assert!(json.get("materials").is_none());
        assert_eq!(report.material_count, 0);
    }
}
