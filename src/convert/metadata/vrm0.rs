//! Legacy `VRM` extension (0.x).

use nalgebra::Vector3;
use serde_json::{Map, Value, json};

use super::{ExportIndex, ImportNames, Thumbnail, read_vec3_object, vec3_object};
use crate::convert::gltf_utils::{from_spring_axes, to_spring_axes};
use crate::convert::types::{HUMAN_BONES, vrm0_bone_name, vrm1_bone_name};
use crate::error::{Issues, UNRESOLVED_REFERENCE};
use crate::json::{
    float, get_bool, get_f32, get_f32_array, get_i64, get_list, get_str, get_usize, lookup, numbers,
};
use crate::json_path;
use crate::scene::{
    AvatarMeta, AvatarPermission, ColliderGroup, CommercialUsage, CreditNotation, Expression,
    ExpressionPreset, FirstPerson, FirstPersonFlag, Humanoid, LookAt, LookAtKind, LookAtRangeMap,
    MaterialColorBind, MaterialColorKind, MeshAnnotation, Modification, MorphTargetBind,
    SphereCollider, SpringBone, SpringGroup, TextureTransformBind, VrmMetadata, VrmVersion,
};

const WEIGHT_SCALE: f32 = 100.0;
const TEXTURE_TRANSFORM_PROPERTY: &str = "_MainTex_ST";
const REDISTRIBUTION_PROHIBITED: &str = "Redistribution_Prohibited";
const LOOK_AT_CURVE: [f32; 8] = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0];

// ─── Export ───────────────────────────────────────────────────────────────────

/// The whole `extensions.VRM` object.
pub(crate) fn export(
    metadata: &VrmMetadata,
    index: &ExportIndex,
    exporter_version: &str,
    material_properties: Vec<Value>,
    issues: &mut Issues,
) -> Value {
    let mut vrm = Map::new();
    vrm.insert("exporterVersion".into(), json!(exporter_version));
    vrm.insert("specVersion".into(), json!("0.0"));
    vrm.insert("meta".into(), export_meta(&metadata.meta, index.thumbnail));
    vrm.insert("humanoid".into(), export_humanoid(&metadata.humanoid, index, issues));
    vrm.insert("firstPerson".into(), export_first_person(metadata, index, issues));
    vrm.insert(
        "blendShapeMaster".into(),
        json!({ "blendShapeGroups": export_blend_shape_groups(&metadata.expressions, index, issues) }),
    );
    vrm.insert(
        "secondaryAnimation".into(),
        export_secondary_animation(&metadata.spring_bone, index, issues),
    );
    vrm.insert("materialProperties".into(), Value::Array(material_properties));
    Value::Object(vrm)
}

fn usage(allowed: bool) -> &'static str {
    if allowed { "Allow" } else { "Disallow" }
}

fn export_meta(meta: &AvatarMeta, thumbnail: Option<Thumbnail>) -> Value {
    let mut out = Map::new();
    out.insert("title".into(), json!(meta.name));
    out.insert("version".into(), json!(meta.version));
    out.insert("author".into(), json!(meta.authors.join(", ")));
    out.insert("contactInformation".into(), json!(meta.contact_information));
    out.insert("reference".into(), json!(meta.references.join(", ")));
    if let Some(thumbnail) = thumbnail {
        out.insert("texture".into(), json!(thumbnail.texture));
    }
    out.insert("allowedUserName".into(), json!(meta.avatar_permission.vrm0_name()));
    out.insert(
        "violentUssageName".into(),
        json!(usage(meta.allow_excessively_violent_usage)),
    );
    out.insert(
        "sexualUssageName".into(),
        json!(usage(meta.allow_excessively_sexual_usage)),
    );
    out.insert(
        "commercialUssageName".into(),
        json!(usage(meta.commercial_usage != CommercialUsage::PersonalNonProfit)),
    );
    out.insert("otherPermissionUrl".into(), json!(""));
    let license_name = if meta.allow_redistribution {
        "Other"
    } else {
        REDISTRIBUTION_PROHIBITED
    };
    out.insert("licenseName".into(), json!(license_name));
    let other_license_url = if meta.other_license_url.is_empty() {
        &meta.license_url
    } else {
        &meta.other_license_url
    };
    out.insert("otherLicenseUrl".into(), json!(other_license_url));
    Value::Object(out)
}

fn export_humanoid(humanoid: &Humanoid, index: &ExportIndex, issues: &mut Issues) -> Value {
    let human_bones: Vec<Value> = HUMAN_BONES
        .iter()
        .filter_map(|human_bone| {
            let bone_name = humanoid.bone(human_bone)?;
            let node = index.bone(bone_name, &format!("humanoid bone {human_bone}"), issues)?;
            Some(json!({
                "bone": vrm0_bone_name(human_bone),
                "node": node,
                "useDefaultValues": true,
            }))
        })
        .collect();

    json!({
        "humanBones": human_bones,
        "armStretch": 0.05,
        "legStretch": 0.05,
        "upperArmTwist": 0.5,
        "lowerArmTwist": 0.5,
        "upperLegTwist": 0.5,
        "lowerLegTwist": 0.5,
        "feetSpacing": 0.0,
        "hasTranslationDoF": false,
    })
}

fn curve_mapper(range: LookAtRangeMap, issues: &mut Issues) -> Value {
    json!({
        "curve": numbers(&LOOK_AT_CURVE, issues),
        "xRange": float(range.input_max_value, issues),
        "yRange": float(range.output_scale, issues),
    })
}

fn export_first_person(metadata: &VrmMetadata, index: &ExportIndex, issues: &mut Issues) -> Value {
    let first_person = &metadata.first_person;
    let bone = first_person
        .bone
        .as_deref()
        .or_else(|| metadata.humanoid.bone("head"));
    let bone_node = bone
        .and_then(|bone| index.bone(bone, "first person bone", issues))
        .map_or(-1, |node| node as i64);

    let annotations: Vec<Value> = first_person
        .mesh_annotations
        .iter()
        .filter_map(|annotation| {
            let Some(mesh) = index.meshes.get(&annotation.mesh) else {
                issues.warn(
                    UNRESOLVED_REFERENCE,
                    format!("first person annotation: mesh '{}' does not exist", annotation.mesh),
                );
                return None;
            };
            Some(json!({"mesh": mesh.mesh, "firstPersonFlag": annotation.flag.vrm0_name()}))
        })
        .collect();

    let look_at = &metadata.look_at;
    let mut out = Map::new();
    out.insert("firstPersonBone".into(), json!(bone_node));
    out.insert(
        "firstPersonBoneOffset".into(),
        vec3_object(to_spring_axes(first_person.bone_offset, VrmVersion::V0), issues),
    );
    out.insert("meshAnnotations".into(), Value::Array(annotations));
    out.insert(
        "lookAtTypeName".into(),
        json!(match look_at.kind {
            LookAtKind::Bone => "Bone",
            LookAtKind::Expression => "BlendShape",
        }),
    );
    out.insert("lookAtHorizontalInner".into(), curve_mapper(look_at.horizontal_inner, issues));
    out.insert("lookAtHorizontalOuter".into(), curve_mapper(look_at.horizontal_outer, issues));
    out.insert("lookAtVerticalDown".into(), curve_mapper(look_at.vertical_down, issues));
    out.insert("lookAtVerticalUp".into(), curve_mapper(look_at.vertical_up, issues));
    Value::Object(out)
}

fn export_blend_shape_groups(
    expressions: &[Expression],
    index: &ExportIndex,
    issues: &mut Issues,
) -> Vec<Value> {
    expressions
        .iter()
        .map(|expression| {
            let context = format!("expression '{}'", expression.name);
            let binds: Vec<Value> = expression
                .morph_target_binds
                .iter()
                .filter_map(|bind| {
                    let (mesh, target) =
                        index.morph_target(&bind.mesh, &bind.shape_key, &context, issues)?;
                    let mesh = mesh.mesh;
                    Some(json!({
                        "mesh": mesh,
                        "index": target,
                        "weight": float(bind.weight * WEIGHT_SCALE, issues),
                    }))
                })
                .collect();

            let mut material_values = Vec::new();
            for bind in &expression.material_color_binds {
                if index.material(&bind.material, &context, issues).is_none() {
                    continue;
                }
                let Some(property) = bind.kind.vrm0_property() else {
                    issues.warn(
                        UNRESOLVED_REFERENCE,
                        format!(
                            "{context}: '{}' has no legacy material property; bind dropped",
                            bind.kind.vrm1_name()
                        ),
                    );
                    continue;
                };
                material_values.push(json!({
                    "materialName": bind.material,
                    "propertyName": property,
                    "targetValue": numbers(&bind.target, issues),
                }));
            }
            for bind in &expression.texture_transform_binds {
                if index.material(&bind.material, &context, issues).is_none() {
                    continue;
                }
                let value = [bind.scale[0], bind.scale[1], bind.offset[0], bind.offset[1]];
                material_values.push(json!({
                    "materialName": bind.material,
                    "propertyName": TEXTURE_TRANSFORM_PROPERTY,
                    "targetValue": numbers(&value, issues),
                }));
            }

            json!({
                "name": expression.name,
                "presetName": expression.preset.vrm0_name(),
                "binds": binds,
                "materialValues": material_values,
                "isBinary": expression.is_binary,
            })
        })
        .collect()
}

fn export_secondary_animation(
    spring_bone: &SpringBone,
    index: &ExportIndex,
    issues: &mut Issues,
) -> Value {
    let mut group_map = Vec::with_capacity(spring_bone.collider_groups.len());
    let mut collider_groups = Vec::new();
    for group in &spring_bone.collider_groups {
        let context = format!("collider group '{}'", group.name);
        let Some(node) = index.bone(&group.bone, &context, issues) else {
            group_map.push(None);
            continue;
        };
        let colliders: Vec<Value> = group
            .colliders
            .iter()
            .map(|collider| {
                json!({
                    "offset": vec3_object(to_spring_axes(collider.offset, VrmVersion::V0), issues),
                    "radius": float(collider.radius, issues),
                })
            })
            .collect();
        group_map.push(Some(collider_groups.len()));
        collider_groups.push(json!({"node": node, "colliders": colliders}));
    }

    let mut bone_groups = Vec::new();
    for group in &spring_bone.groups {
        let context = format!("spring group '{}'", group.comment);
        let bones: Vec<usize> = group
            .bones
            .iter()
            .filter_map(|bone| index.bone(bone, &context, issues))
            .collect();
        if bones.is_empty() {
            continue;
        }
        let center = group
            .center
            .as_deref()
            .and_then(|center| index.bone(center, &context, issues))
            .map_or(-1, |node| node as i64);
        let colliders: Vec<usize> = group
            .collider_groups
            .iter()
            .filter_map(|group| group_map.get(*group).copied().flatten())
            .collect();

        bone_groups.push(json!({
            "comment": group.comment,
            "stiffiness": float(group.stiffness, issues),
            "gravityPower": float(group.gravity_power, issues),
            "gravityDir": vec3_object(to_spring_axes(group.gravity_dir, VrmVersion::V0), issues),
            "dragForce": float(group.drag_force, issues),
            "center": center,
            "hitRadius": float(group.hit_radius, issues),
            "bones": bones,
            "colliderGroups": colliders,
        }));
    }

    json!({"boneGroups": bone_groups, "colliderGroups": collider_groups})
}

// ─── Import ───────────────────────────────────────────────────────────────────

/// Normalize `extensions.VRM` into the version-agnostic model.
pub(crate) fn import(json: &Value, names: &ImportNames, issues: &mut Issues) -> VrmMetadata {
    let null = Value::Null;
    let vrm = lookup(json, json_path!["extensions", "VRM"]).unwrap_or(&null);

    VrmMetadata {
        source_version: Some(VrmVersion::V0),
        allow_non_humanoid: false,
        meta: import_meta(json, vrm.get("meta").unwrap_or(&null)),
        humanoid: import_humanoid(vrm, names, issues),
        first_person: import_first_person(vrm, names, issues),
        look_at: import_look_at(vrm),
        expressions: import_blend_shape_groups(vrm, names, issues),
        spring_bone: import_secondary_animation(vrm, names, issues),
    }
}

fn split_list(text: &str) -> Vec<String> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![text.to_string()]
    }
}

fn import_meta(json: &Value, meta: &Value) -> AvatarMeta {
    let defaults = AvatarMeta::default();
    let allowed = |key: &str| get_str(meta, json_path![key], "Disallow") == "Allow";
    let license_name = get_str(meta, json_path!["licenseName"], REDISTRIBUTION_PROHIBITED);
    let thumbnail_image = get_usize(meta, json_path!["texture"]).and_then(|texture| {
        get_usize(json, json_path!["textures", texture, "source"])
    });

    AvatarMeta {
        name: get_str(meta, json_path!["title"], "").to_string(),
        version: get_str(meta, json_path!["version"], "").to_string(),
        authors: split_list(get_str(meta, json_path!["author"], "")),
        contact_information: get_str(meta, json_path!["contactInformation"], "").to_string(),
        references: split_list(get_str(meta, json_path!["reference"], "")),
        thumbnail_image,
        avatar_permission: AvatarPermission::from_name(get_str(
            meta,
            json_path!["allowedUserName"],
            "OnlyAuthor",
        )),
        allow_excessively_violent_usage: allowed("violentUssageName"),
        allow_excessively_sexual_usage: allowed("sexualUssageName"),
        commercial_usage: if allowed("commercialUssageName") {
            CommercialUsage::Corporation
        } else {
            CommercialUsage::PersonalNonProfit
        },
        credit_notation: if license_name == "CC0" {
            CreditNotation::Unnecessary
        } else {
            CreditNotation::Required
        },
        allow_redistribution: license_name != REDISTRIBUTION_PROHIBITED,
        modification: if license_name.starts_with("CC") && !license_name.contains("_ND") {
            Modification::AllowModificationRedistribution
        } else {
            Modification::Prohibited
        },
        other_license_url: get_str(meta, json_path!["otherLicenseUrl"], "").to_string(),
        ..defaults
    }
}

fn import_humanoid(vrm: &Value, names: &ImportNames, issues: &mut Issues) -> Humanoid {
    let mut humanoid = Humanoid::default();
    for bone in get_list(vrm, json_path!["humanoid", "humanBones"]) {
        let human_bone = vrm1_bone_name(get_str(bone, json_path!["bone"], ""));
        if human_bone.is_empty() {
            continue;
        }
        let context = format!("humanoid bone {human_bone}");
        if let Some(node) = names.node(get_usize(bone, json_path!["node"]), &context, issues) {
            humanoid.bones.insert(human_bone.to_string(), node);
        }
    }
    humanoid
}

fn import_first_person(vrm: &Value, names: &ImportNames, issues: &mut Issues) -> FirstPerson {
    let null = Value::Null;
    let first_person = vrm.get("firstPerson").unwrap_or(&null);
    let defaults = FirstPerson::default();

    let bone = get_i64(first_person, json_path!["firstPersonBone"])
        .and_then(|node| usize::try_from(node).ok())
        .and_then(|node| names.nodes.get(node).cloned());
    let bone_offset = lookup(first_person, json_path!["firstPersonBoneOffset"])
        .map(|offset| {
            read_vec3_object(offset, to_spring_axes(defaults.bone_offset, VrmVersion::V0))
        })
        .map_or(defaults.bone_offset, |stored| from_spring_axes(stored, VrmVersion::V0).into());
    let mesh_annotations = get_list(first_person, json_path!["meshAnnotations"])
        .iter()
        .filter_map(|annotation| {
            let mesh = get_usize(annotation, json_path!["mesh"]);
            let Some(object) = mesh.and_then(|mesh| names.meshes.get(mesh)) else {
                issues.warn(
                    UNRESOLVED_REFERENCE,
                    format!("first person annotation: mesh {mesh:?} does not exist"),
                );
                return None;
            };
            Some(MeshAnnotation {
                mesh: object.clone(),
                flag: FirstPersonFlag::from_name(get_str(
                    annotation,
                    json_path!["firstPersonFlag"],
                    "Auto",
                )),
            })
        })
        .collect();

    FirstPerson {
        bone,
        bone_offset,
        mesh_annotations,
    }
}

fn import_look_at(vrm: &Value) -> LookAt {
    let defaults = LookAt::default();
    let range = |key: &str, default: LookAtRangeMap| LookAtRangeMap {
        input_max_value: get_f32(
            vrm,
            json_path!["firstPerson", key, "xRange"],
            default.input_max_value,
        ),
        output_scale: get_f32(vrm, json_path!["firstPerson", key, "yRange"], default.output_scale),
    };

    LookAt {
        kind: match get_str(vrm, json_path!["firstPerson", "lookAtTypeName"], "Bone") {
            "BlendShape" => LookAtKind::Expression,
            _ => LookAtKind::Bone,
        },
        horizontal_inner: range("lookAtHorizontalInner", defaults.horizontal_inner),
        horizontal_outer: range("lookAtHorizontalOuter", defaults.horizontal_outer),
        vertical_down: range("lookAtVerticalDown", defaults.vertical_down),
        vertical_up: range("lookAtVerticalUp", defaults.vertical_up),
    }
}

fn import_blend_shape_groups(vrm: &Value, names: &ImportNames, issues: &mut Issues) -> Vec<Expression> {
    get_list(vrm, json_path!["blendShapeMaster", "blendShapeGroups"])
        .iter()
        .map(|group| {
            let preset = ExpressionPreset::from_vrm0_name(get_str(group, json_path!["presetName"], ""));
            let name = get_str(group, json_path!["name"], "");
            let name = if name.is_empty() {
                preset.vrm1_name().unwrap_or("expression")
            } else {
                name
            };
            let context = format!("expression '{name}'");
            let mut expression = Expression::new(name, preset);
            expression.is_binary = get_bool(group, json_path!["isBinary"], false);

            for bind in get_list(group, json_path!["binds"]) {
                let Some((mesh, shape_key)) = names.mesh_target(
                    get_usize(bind, json_path!["mesh"]),
                    get_usize(bind, json_path!["index"]),
                    &context,
                    issues,
                ) else {
                    continue;
                };
                expression.morph_target_binds.push(MorphTargetBind {
                    mesh,
                    shape_key,
                    weight: get_f32(bind, json_path!["weight"], 100.0) / WEIGHT_SCALE,
                });
            }

            for value in get_list(group, json_path!["materialValues"]) {
                let material = get_str(value, json_path!["materialName"], "").to_string();
                if !names.materials.contains(&material) {
                    issues.warn(
                        UNRESOLVED_REFERENCE,
                        format!("{context}: material '{material}' does not exist"),
                    );
                    continue;
                }
                let property = get_str(value, json_path!["propertyName"], "");
                let target = get_f32_array(value, json_path!["targetValue"], [0.0; 4]);
                if property == TEXTURE_TRANSFORM_PROPERTY {
                    expression.texture_transform_binds.push(TextureTransformBind {
                        material,
                        scale: [target[0], target[1]],
                        offset: [target[2], target[3]],
                    });
                } else if let Some(kind) = MaterialColorKind::from_vrm0_property(property) {
                    expression
                        .material_color_binds
                        .push(MaterialColorBind { material, kind, target });
                } else {
                    issues.warn(
                        UNRESOLVED_REFERENCE,
                        format!("{context}: material property '{property}' has no counterpart"),
                    );
                }
            }
            expression
        })
        .collect()
}

fn import_secondary_animation(vrm: &Value, names: &ImportNames, issues: &mut Issues) -> SpringBone {
    let mut spring_bone = SpringBone::default();
    let mut group_map = Vec::new();

    for group in get_list(vrm, json_path!["secondaryAnimation", "colliderGroups"]) {
        let Some(bone) = names.node(get_usize(group, json_path!["node"]), "collider group", issues)
        else {
            group_map.push(None);
            continue;
        };
        let colliders = get_list(group, json_path!["colliders"])
            .iter()
            .map(|collider| SphereCollider {
                offset: collider
                    .get("offset")
                    .map(|offset| read_vec3_object(offset, Vector3::zeros()))
                    .map_or([0.0; 3], |stored| from_spring_axes(stored, VrmVersion::V0).into()),
                radius: get_f32(collider, json_path!["radius"], 0.0),
            })
            .collect();
        group_map.push(Some(spring_bone.collider_groups.len()));
        spring_bone.collider_groups.push(ColliderGroup {
            name: bone.clone(),
            bone,
            colliders,
        });
    }

    for group in get_list(vrm, json_path!["secondaryAnimation", "boneGroups"]) {
        let defaults = SpringGroup::default();
        let comment = get_str(group, json_path!["comment"], "").to_string();
        let context = format!("spring group '{comment}'");
        let bones: Vec<String> = get_list(group, json_path!["bones"])
            .iter()
            .filter_map(|node| names.node(node.as_u64().map(|node| node as usize), &context, issues))
            .collect();
        if bones.is_empty() {
            continue;
        }
        let center = get_i64(group, json_path!["center"])
            .and_then(|node| usize::try_from(node).ok())
            .and_then(|node| names.nodes.get(node).cloned());
        let collider_groups = get_list(group, json_path!["colliderGroups"])
            .iter()
            .filter_map(Value::as_u64)
            .filter_map(|index| group_map.get(index as usize).copied().flatten())
            .collect();

        spring_bone.groups.push(SpringGroup {
            comment,
            stiffness: get_f32(group, json_path!["stiffiness"], defaults.stiffness),
            gravity_power: get_f32(group, json_path!["gravityPower"], defaults.gravity_power),
            gravity_dir: group
                .get("gravityDir")
                .map(|direction| {
                    read_vec3_object(direction, to_spring_axes(defaults.gravity_dir, VrmVersion::V0))
                })
                .map_or(defaults.gravity_dir, |stored| {
                    from_spring_axes(stored, VrmVersion::V0).into()
                }),
            drag_force: get_f32(group, json_path!["dragForce"], defaults.drag_force),
            hit_radius: get_f32(group, json_path!["hitRadius"], defaults.hit_radius),
            center,
            bones,
            collider_groups,
        });
    }
    spring_bone
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::convert::metadata::MeshRef;

    fn export_index() -> ExportIndex {
        ExportIndex {
            bone_nodes: HashMap::from([
                ("Hips".to_string(), 0),
                ("Head".to_string(), 1),
                ("Hair".to_string(), 2),
                ("LeftThumb".to_string(), 3),
            ]),
            meshes: HashMap::from([(
                "Face".to_string(),
                MeshRef {
                    mesh: 0,
                    node: 4,
                    targets: vec!["Smile".into(), "Blink".into()],
                },
            )]),
            materials: HashMap::from([("Skin".to_string(), 0)]),
            ..ExportIndex::default()
        }
    }

    fn import_names() -> ImportNames {
        ImportNames {
            nodes: vec![
                "Hips".into(),
                "Head".into(),
                "Hair".into(),
                "LeftThumb".into(),
                "Face".into(),
            ],
            node_meshes: vec![None, None, None, None, Some(0)],
            meshes: vec!["Face".into()],
            targets: vec![vec!["Smile".into(), "Blink".into()]],
            materials: vec!["Skin".into()],
        }
    }

    #[test]
    fn given_bind_weight_when_exporting_legacy_then_weight_is_scaled_to_percent() {
        let mut expression = Expression::new("Joy", ExpressionPreset::Happy);
        expression.morph_target_binds.push(MorphTargetBind {
            mesh: "Face".into(),
            shape_key: "Smile".into(),
            weight: 0.8,
        });
        expression.material_color_binds.push(MaterialColorBind {
            material: "Skin".into(),
            kind: MaterialColorKind::MatcapColor,
            target: [1.0; 4],
        });
        let mut issues = Issues::new();

        let groups = export_blend_shape_groups(&[expression], &export_index(), &mut issues);

        assert_eq!(
            groups,
            vec![json!({
                "name": "Joy",
                "presetName": "joy",
                "binds": [{"mesh": 0, "index": 0, "weight": 80.0}],
                "materialValues": [],
                "isBinary": false
            })]
        );
        assert!(issues.has_code(UNRESOLVED_REFERENCE));
    }

    #[test]
    fn given_legacy_weight_80_when_importing_then_model_weight_is_normalized() {
        let vrm = json!({
            "blendShapeMaster": {"blendShapeGroups": [{
                "name": "Blink",
                "presetName": "blink",
                "binds": [{"mesh": 0, "index": 1, "weight": 80}],
                "materialValues": [{"materialName": "Skin", "propertyName": "_MainTex_ST", "targetValue": [2, 2, 0.5, 0]}],
                "isBinary": true
            }]}
        });
        let mut issues = Issues::new();

        let expressions = import_blend_shape_groups(&vrm, &import_names(), &mut issues);

        assert_eq!(expressions.len(), 1);
        let expression = &expressions[0];
        assert_eq!(expression.preset, ExpressionPreset::Blink);
        assert!(expression.is_binary);
        assert_eq!(
            expression.morph_target_binds,
            vec![MorphTargetBind {
                mesh: "Face".into(),
                shape_key: "Blink".into(),
                weight: 0.8
            }]
        );
        assert_eq!(
            expression.texture_transform_binds,
            vec![TextureTransformBind {
                material: "Skin".into(),
                scale: [2.0, 2.0],
                offset: [0.5, 0.0]
            }]
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn given_humanoid_with_thumb_when_exporting_then_legacy_bone_names_and_defaults_are_used() {
        let humanoid = Humanoid {
            bones: BTreeMap::from([
                ("hips".to_string(), "Hips".to_string()),
                ("leftThumbMetacarpal".to_string(), "LeftThumb".to_string()),
                ("head".to_string(), "Missing".to_string()),
            ]),
        };
        let mut issues = Issues::new();

        let exported = export_humanoid(&humanoid, &export_index(), &mut issues);

        assert_eq!(
            exported["humanBones"],
            json!([
                {"bone": "hips", "node": 0, "useDefaultValues": true},
                {"bone": "leftThumbProximal", "node": 3, "useDefaultValues": true}
            ])
        );
        assert_eq!(exported["armStretch"], json!(0.05));
        assert_eq!(exported["hasTranslationDoF"], json!(false));
        assert!(issues.has_code(UNRESOLVED_REFERENCE));

        let imported = import_humanoid(&json!({"humanoid": exported}), &import_names(), &mut issues);
        assert_eq!(imported.bone("leftThumbMetacarpal"), Some("LeftThumb"));
    }

    #[test]
    fn given_spring_groups_when_round_tripping_then_collider_indices_are_renumbered() {
        let spring_bone = SpringBone {
            collider_groups: vec![
                ColliderGroup {
                    name: "ghost".into(),
                    bone: "Nowhere".into(),
                    colliders: vec![],
                },
                ColliderGroup {
                    name: "Head".into(),
                    bone: "Head".into(),
                    colliders: vec![SphereCollider {
                        offset: [0.0, 0.5, 0.25],
                        radius: 0.1,
                    }],
                },
            ],
            groups: vec![
                SpringGroup {
                    comment: "hair".into(),
                    bones: vec!["Hair".into()],
                    center: Some("Head".into()),
                    collider_groups: vec![0, 1],
                    gravity_power: 0.5,
                    ..SpringGroup::default()
                },
                SpringGroup {
                    comment: "nothing".into(),
                    ..SpringGroup::default()
                },
            ],
        };
        let mut issues = Issues::new();

        let exported = export_secondary_animation(&spring_bone, &export_index(), &mut issues);

        assert_eq!(exported["colliderGroups"].as_array().map(Vec::len), Some(1));
        assert_eq!(
            exported["colliderGroups"][0]["colliders"][0]["offset"],
            json!({"x": 0.0, "y": 0.25, "z": 0.5})
        );
        assert_eq!(exported["boneGroups"].as_array().map(Vec::len), Some(1));
        assert_eq!(exported["boneGroups"][0]["colliderGroups"], json!([0]));
        assert_eq!(exported["boneGroups"][0]["center"], json!(1));
        assert_eq!(exported["boneGroups"][0]["gravityDir"], json!({"x": 0.0, "y": -1.0, "z": 0.0}));

        let imported = import_secondary_animation(
            &json!({"secondaryAnimation": exported}),
            &import_names(),
            &mut issues,
        );
        assert_eq!(imported.collider_groups, vec![spring_bone.collider_groups[1].clone()]);
        assert_eq!(imported.groups.len(), 1);
        assert_eq!(imported.groups[0].bones, vec!["Hair".to_string()]);
        assert_eq!(imported.groups[0].collider_groups, vec![0]);
        assert_eq!(imported.groups[0].gravity_dir, [0.0, 0.0, -1.0]);
        assert_eq!(imported.groups[0].center.as_deref(), Some("Head"));
    }

    #[test]
    fn given_meta_when_exporting_and_importing_then_licence_fields_map_across() {
        let meta = AvatarMeta {
            name: "Avatar".into(),
            authors: vec!["Someone".into()],
            allow_redistribution: false,
            commercial_usage: CommercialUsage::Corporation,
            ..AvatarMeta::default()
        };

        let exported = export_meta(&meta, Some(Thumbnail { image: 2, texture: 0 }));

        assert_eq!(exported["title"], json!("Avatar"));
        assert_eq!(exported["licenseName"], json!("Redistribution_Prohibited"));
        assert_eq!(exported["commercialUssageName"], json!("Allow"));
        assert_eq!(exported["texture"], json!(0));

        let doc = json!({"textures": [{"source": 2}]});
        let imported = import_meta(&doc, &exported);
        assert_eq!(imported.name, "Avatar");
        assert_eq!(imported.authors, vec!["Someone".to_string()]);
        assert_eq!(imported.thumbnail_image, Some(2));
        assert!(!imported.allow_redistribution);
        assert_eq!(imported.commercial_usage, CommercialUsage::Corporation);
    }
}
