//! `VRMC_vrm` and `VRMC_springBone` (1.0).

use serde_json::{Map, Value, json};

use super::{ExportIndex, ImportNames};
use crate::convert::gltf_utils::{from_spring_axes, to_spring_axes};
use crate::convert::types::HUMAN_BONES;
use crate::error::{COLLIDER_SIMPLIFIED, Issues, UNRESOLVED_REFERENCE};
use crate::json::{
    float, get_bool, get_f32, get_f32_array, get_list, get_str, get_usize, lookup, numbers,
};
use crate::json_path;
use crate::scene::{
    AvatarMeta, AvatarPermission, ColliderGroup, CommercialUsage, CreditNotation, Expression,
    ExpressionOverride, ExpressionPreset, FirstPerson, FirstPersonFlag, Humanoid, LookAt,
    LookAtKind, LookAtRangeMap, MaterialColorBind, MaterialColorKind, MeshAnnotation,
    Modification, MorphTargetBind, SphereCollider, SpringBone, SpringGroup, TextureTransformBind,
    VrmMetadata, VrmVersion,
};

pub(crate) const VRMC_VRM: &str = "VRMC_vrm";
pub(crate) const VRMC_SPRING_BONE: &str = "VRMC_springBone";
const SPEC_VERSION: &str = "1.0";

fn spring_out(value: [f32; 3], issues: &mut Issues) -> Value {
    numbers(to_spring_axes(value, VrmVersion::V1).as_slice(), issues)
}

fn spring_in(value: &Value, path: &[crate::json::PathSegment<'_>], default: [f32; 3]) -> [f32; 3] {
    let default: [f32; 3] = to_spring_axes(default, VrmVersion::V1).into();
    let stored = get_f32_array(value, path, default);
    from_spring_axes(stored, VrmVersion::V1).into()
}

// ─── Export ───────────────────────────────────────────────────────────────────

/// The `VRMC_vrm` extension object.
pub(crate) fn export_vrm(metadata: &VrmMetadata, index: &ExportIndex, issues: &mut Issues) -> Value {
    let mut vrm = Map::new();
    vrm.insert("specVersion".into(), json!(SPEC_VERSION));
    vrm.insert(
        "meta".into(),
        export_meta(&metadata.meta, index.thumbnail.map(|thumbnail| thumbnail.image)),
    );
    vrm.insert("humanoid".into(), export_humanoid(&metadata.humanoid, index, issues));
    vrm.insert(
        "firstPerson".into(),
        export_first_person(&metadata.first_person, index, issues),
    );
    vrm.insert(
        "lookAt".into(),
        export_look_at(&metadata.look_at, metadata.first_person.bone_offset, issues),
    );
    vrm.insert("expressions".into(), export_expressions(&metadata.expressions, index, issues));
    Value::Object(vrm)
}

fn export_meta(meta: &AvatarMeta, thumbnail_image: Option<usize>) -> Value {
    let mut out = Map::new();
    out.insert("name".into(), json!(meta.name));
    out.insert("version".into(), json!(meta.version));
    out.insert("authors".into(), json!(meta.authors));
    out.insert("copyrightInformation".into(), json!(meta.copyright_information));
    out.insert("contactInformation".into(), json!(meta.contact_information));
    out.insert("references".into(), json!(meta.references));
    out.insert("thirdPartyLicenses".into(), json!(meta.third_party_licenses));
    if let Some(image) = thumbnail_image {
        out.insert("thumbnailImage".into(), json!(image));
    }
    out.insert("licenseUrl".into(), json!(meta.license_url));
    out.insert("avatarPermission".into(), json!(meta.avatar_permission.vrm1_name()));
    out.insert(
        "allowExcessivelyViolentUsage".into(),
        json!(meta.allow_excessively_violent_usage),
    );
    out.insert(
        "allowExcessivelySexualUsage".into(),
        json!(meta.allow_excessively_sexual_usage),
    );
    out.insert("commercialUsage".into(), json!(meta.commercial_usage.vrm1_name()));
    out.insert(
        "allowPoliticalOrReligiousUsage".into(),
        json!(meta.allow_political_or_religious_usage),
    );
    out.insert(
        "allowAntisocialOrHateUsage".into(),
        json!(meta.allow_antisocial_or_hate_usage),
    );
    out.insert(
        "creditNotation".into(),
        json!(match meta.credit_notation {
            CreditNotation::Required => "required",
            CreditNotation::Unnecessary => "unnecessary",
        }),
    );
    out.insert("allowRedistribution".into(), json!(meta.allow_redistribution));
    out.insert("modification".into(), json!(meta.modification.vrm1_name()));
    out.insert("otherLicenseUrl".into(), json!(meta.other_license_url));
    Value::Object(out)
}

fn export_humanoid(humanoid: &Humanoid, index: &ExportIndex, issues: &mut Issues) -> Value {
    let mut bones = Map::new();
    for human_bone in HUMAN_BONES {
        let Some(bone_name) = humanoid.bone(human_bone) else {
            continue;
        };
        if let Some(node) = index.bone(bone_name, &format!("humanoid bone {human_bone}"), issues) {
            bones.insert(human_bone.to_string(), json!({ "node": node }));
        }
    }
    json!({ "humanBones": bones })
}

fn export_first_person(first_person: &FirstPerson, index: &ExportIndex, issues: &mut Issues) -> Value {
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
            Some(json!({"node": mesh.node, "type": annotation.flag.vrm1_name()}))
        })
        .collect();
    json!({ "meshAnnotations": annotations })
}

fn range_map(range: LookAtRangeMap, issues: &mut Issues) -> Value {
    json!({
        "inputMaxValue": float(range.input_max_value, issues),
        "outputScale": float(range.output_scale, issues),
    })
}

fn export_look_at(look_at: &LookAt, offset: [f32; 3], issues: &mut Issues) -> Value {
    let mut out = Map::new();
    out.insert("offsetFromHeadBone".into(), spring_out(offset, issues));
    out.insert(
        "type".into(),
        json!(match look_at.kind {
            LookAtKind::Bone => "bone",
            LookAtKind::Expression => "expression",
        }),
    );
    out.insert("rangeMapHorizontalInner".into(), range_map(look_at.horizontal_inner, issues));
    out.insert("rangeMapHorizontalOuter".into(), range_map(look_at.horizontal_outer, issues));
    out.insert("rangeMapVerticalDown".into(), range_map(look_at.vertical_down, issues));
    out.insert("rangeMapVerticalUp".into(), range_map(look_at.vertical_up, issues));
    Value::Object(out)
}

fn export_expression(expression: &Expression, index: &ExportIndex, issues: &mut Issues) -> Value {
    let context = format!("expression '{}'", expression.name);
    let morph_target_binds: Vec<Value> = expression
        .morph_target_binds
        .iter()
        .filter_map(|bind| {
            let (mesh, target) = index.morph_target(&bind.mesh, &bind.shape_key, &context, issues)?;
            let node = mesh.node;
            Some(json!({"node": node, "index": target, "weight": float(bind.weight, issues)}))
        })
        .collect();
    let material_color_binds: Vec<Value> = expression
        .material_color_binds
        .iter()
        .filter_map(|bind| {
            let material = index.material(&bind.material, &context, issues)?;
            Some(json!({
                "material": material,
                "type": bind.kind.vrm1_name(),
                "targetValue": numbers(&bind.target, issues),
            }))
        })
        .collect();
    let texture_transform_binds: Vec<Value> = expression
        .texture_transform_binds
        .iter()
        .filter_map(|bind| {
            let material = index.material(&bind.material, &context, issues)?;
            Some(json!({
                "material": material,
                "scale": numbers(&bind.scale, issues),
                "offset": numbers(&bind.offset, issues),
            }))
        })
        .collect();

    json!({
        "morphTargetBinds": morph_target_binds,
        "materialColorBinds": material_color_binds,
        "textureTransformBinds": texture_transform_binds,
        "isBinary": expression.is_binary,
        "overrideBlink": expression.override_blink.vrm1_name(),
        "overrideLookAt": expression.override_look_at.vrm1_name(),
        "overrideMouth": expression.override_mouth.vrm1_name(),
    })
}

fn export_expressions(expressions: &[Expression], index: &ExportIndex, issues: &mut Issues) -> Value {
    let mut preset = Map::new();
    let mut custom = Map::new();
    for expression in expressions {
        let value = export_expression(expression, index, issues);
        match expression.preset.vrm1_name() {
            Some(name) => preset.insert(name.to_string(), value),
            None => custom.insert(expression.name.clone(), value),
        };
    }
    json!({"preset": preset, "custom": custom})
}

/// The `VRMC_springBone` extension object, or `None` when the model has
/// neither springs nor colliders.
pub(crate) fn export_spring(
    metadata: &VrmMetadata,
    index: &ExportIndex,
    issues: &mut Issues,
) -> Option<Value> {
    let spring_bone = &metadata.spring_bone;
    if spring_bone.groups.is_empty() && spring_bone.collider_groups.is_empty() {
        return None;
    }

    let mut colliders = Vec::new();
    let mut collider_groups = Vec::new();
    let mut group_map = Vec::with_capacity(spring_bone.collider_groups.len());
    for group in &spring_bone.collider_groups {
        let context = format!("collider group '{}'", group.name);
        let Some(node) = index.bone(&group.bone, &context, issues) else {
            group_map.push(None);
            continue;
        };
        let mut members = Vec::with_capacity(group.colliders.len());
        for collider in &group.colliders {
            members.push(colliders.len());
            colliders.push(json!({
                "node": node,
                "shape": {"sphere": {
                    "offset": spring_out(collider.offset, issues),
                    "radius": float(collider.radius, issues),
                }},
            }));
        }
        group_map.push(Some(collider_groups.len()));
        collider_groups.push(json!({"name": group.name, "colliders": members}));
    }

    let mut springs = Vec::new();
    for group in &spring_bone.groups {
        let context = format!("spring group '{}'", group.comment);
        let center = group
            .center
            .as_deref()
            .and_then(|center| index.bone(center, &context, issues));
        let group_colliders: Vec<usize> = group
            .collider_groups
            .iter()
            .filter_map(|group| group_map.get(*group).copied().flatten())
            .collect();

        for root in &group.bones {
            if index.bone(root, &context, issues).is_none() {
                continue;
            }
            let joints: Vec<Value> = index
                .spring_chain(root)
                .iter()
                .filter_map(|bone| index.bone_nodes.get(bone))
                .map(|node| {
                    json!({
                        "node": node,
                        "hitRadius": float(group.hit_radius, issues),
                        "stiffness": float(group.stiffness, issues),
                        "gravityPower": float(group.gravity_power, issues),
                        "gravityDir": spring_out(group.gravity_dir, issues),
                        "dragForce": float(group.drag_force, issues),
                    })
                })
                .collect();

            let mut spring = Map::new();
            spring.insert("name".into(), json!(group.comment));
            spring.insert("joints".into(), Value::Array(joints));
            spring.insert("colliderGroups".into(), json!(group_colliders));
            if let Some(center) = center {
                spring.insert("center".into(), json!(center));
            }
            springs.push(Value::Object(spring));
        }
    }

    Some(json!({
        "specVersion": SPEC_VERSION,
        "colliders": colliders,
        "colliderGroups": collider_groups,
        "springs": springs,
    }))
}

// ─── Import ───────────────────────────────────────────────────────────────────

/// Normalize `VRMC_vrm` and `VRMC_springBone` into the version-agnostic model.
pub(crate) fn import(json: &Value, names: &ImportNames, issues: &mut Issues) -> VrmMetadata {
    let null = Value::Null;
    let vrm = lookup(json, json_path!["extensions", VRMC_VRM]).unwrap_or(&null);
    let spring = lookup(json, json_path!["extensions", VRMC_SPRING_BONE]).unwrap_or(&null);

    let mut first_person = import_first_person(vrm, names, issues);
    first_person.bone_offset = spring_in(
        vrm,
        json_path!["lookAt", "offsetFromHeadBone"],
        first_person.bone_offset,
    );

    VrmMetadata {
        source_version: Some(VrmVersion::V1),
        allow_non_humanoid: false,
        meta: import_meta(vrm.get("meta").unwrap_or(&null)),
        humanoid: import_humanoid(vrm, names, issues),
        first_person,
        look_at: import_look_at(vrm),
        expressions: import_expressions(vrm, names, issues),
        spring_bone: import_spring(spring, names, issues),
    }
}

fn string_list(meta: &Value, key: &str) -> Vec<String> {
    get_list(meta, json_path![key])
        .iter()
        .filter_map(Value::as_str)
        .map(ToOwned::to_owned)
        .collect()
}

fn import_meta(meta: &Value) -> AvatarMeta {
    let defaults = AvatarMeta::default();
    let text = |key: &str, default: &str| get_str(meta, json_path![key], default).to_string();
    let flag = |key: &str| get_bool(meta, json_path![key], false);

    AvatarMeta {
        name: text("name", ""),
        version: text("version", ""),
        authors: string_list(meta, "authors"),
        copyright_information: text("copyrightInformation", ""),
        contact_information: text("contactInformation", ""),
        references: string_list(meta, "references"),
        thumbnail_image: get_usize(meta, json_path!["thumbnailImage"]),
        avatar_permission: AvatarPermission::from_name(get_str(
            meta,
            json_path!["avatarPermission"],
            "onlyAuthor",
        )),
        allow_excessively_violent_usage: flag("allowExcessivelyViolentUsage"),
        allow_excessively_sexual_usage: flag("allowExcessivelySexualUsage"),
        commercial_usage: CommercialUsage::from_vrm1_name(get_str(
            meta,
            json_path!["commercialUsage"],
            "",
        )),
        allow_political_or_religious_usage: flag("allowPoliticalOrReligiousUsage"),
        allow_antisocial_or_hate_usage: flag("allowAntisocialOrHateUsage"),
        credit_notation: match get_str(meta, json_path!["creditNotation"], "required") {
            "unnecessary" => CreditNotation::Unnecessary,
            _ => CreditNotation::Required,
        },
        allow_redistribution: flag("allowRedistribution"),
        modification: Modification::from_vrm1_name(get_str(meta, json_path!["modification"], "")),
        license_url: text("licenseUrl", &defaults.license_url),
        third_party_licenses: text("thirdPartyLicenses", ""),
        other_license_url: text("otherLicenseUrl", ""),
    }
}

fn import_humanoid(vrm: &Value, names: &ImportNames, issues: &mut Issues) -> Humanoid {
    let mut humanoid = Humanoid::default();
    let Some(bones) = lookup(vrm, json_path!["humanoid", "humanBones"]).and_then(Value::as_object)
    else {
        return humanoid;
    };
    for (human_bone, bone) in bones {
        let context = format!("humanoid bone {human_bone}");
        if let Some(node) = names.node(get_usize(bone, json_path!["node"]), &context, issues) {
            humanoid.bones.insert(human_bone.clone(), node);
        }
    }
    humanoid
}

fn import_first_person(vrm: &Value, names: &ImportNames, issues: &mut Issues) -> FirstPerson {
    let mesh_annotations = get_list(vrm, json_path!["firstPerson", "meshAnnotations"])
        .iter()
        .filter_map(|annotation| {
            let node = get_usize(annotation, json_path!["node"]);
            let has_mesh = node
                .and_then(|node| names.node_meshes.get(node).copied().flatten())
                .is_some();
            if !has_mesh {
                issues.warn(
                    UNRESOLVED_REFERENCE,
                    format!("first person annotation: node {node:?} carries no mesh"),
                );
                return None;
            }
            Some(MeshAnnotation {
                mesh: names.nodes.get(node?)?.clone(),
                flag: FirstPersonFlag::from_name(get_str(annotation, json_path!["type"], "auto")),
            })
        })
        .collect();

    FirstPerson {
        mesh_annotations,
        ..FirstPerson::default()
    }
}

fn import_look_at(vrm: &Value) -> LookAt {
    let defaults = LookAt::default();
    let range = |key: &str, default: LookAtRangeMap| LookAtRangeMap {
        input_max_value: get_f32(
            vrm,
            json_path!["lookAt", key, "inputMaxValue"],
            default.input_max_value,
        ),
        output_scale: get_f32(vrm, json_path!["lookAt", key, "outputScale"], default.output_scale),
    };

    LookAt {
        kind: match get_str(vrm, json_path!["lookAt", "type"], "bone") {
            "expression" => LookAtKind::Expression,
            _ => LookAtKind::Bone,
        },
        horizontal_inner: range("rangeMapHorizontalInner", defaults.horizontal_inner),
        horizontal_outer: range("rangeMapHorizontalOuter", defaults.horizontal_outer),
        vertical_down: range("rangeMapVerticalDown", defaults.vertical_down),
        vertical_up: range("rangeMapVerticalUp", defaults.vertical_up),
    }
}

fn import_expression(
    name: &str,
    preset: ExpressionPreset,
    value: &Value,
    names: &ImportNames,
    issues: &mut Issues,
) -> Expression {
    let context = format!("expression '{name}'");
    let mut expression = Expression::new(name, preset);
    expression.is_binary = get_bool(value, json_path!["isBinary"], false);
    expression.override_blink =
        ExpressionOverride::from_vrm1_name(get_str(value, json_path!["overrideBlink"], "none"));
    expression.override_look_at =
        ExpressionOverride::from_vrm1_name(get_str(value, json_path!["overrideLookAt"], "none"));
    expression.override_mouth =
        ExpressionOverride::from_vrm1_name(get_str(value, json_path!["overrideMouth"], "none"));

    for bind in get_list(value, json_path!["morphTargetBinds"]) {
        let mesh = get_usize(bind, json_path!["node"])
            .and_then(|node| names.node_meshes.get(node).copied().flatten());
        let Some((mesh, shape_key)) =
            names.mesh_target(mesh, get_usize(bind, json_path!["index"]), &context, issues)
        else {
            continue;
        };
        expression.morph_target_binds.push(MorphTargetBind {
            mesh,
            shape_key,
            weight: get_f32(bind, json_path!["weight"], 1.0),
        });
    }

    for bind in get_list(value, json_path!["materialColorBinds"]) {
        let Some(material) = names.material(get_usize(bind, json_path!["material"]), &context, issues)
        else {
            continue;
        };
        let kind_name = get_str(bind, json_path!["type"], "");
        let Some(kind) = MaterialColorKind::from_vrm1_name(kind_name) else {
            issues.warn(
                UNRESOLVED_REFERENCE,
                format!("{context}: unknown material color type '{kind_name}'"),
            );
            continue;
        };
        expression.material_color_binds.push(MaterialColorBind {
            material,
            kind,
            target: get_f32_array(bind, json_path!["targetValue"], [0.0; 4]),
        });
    }

    for bind in get_list(value, json_path!["textureTransformBinds"]) {
        let Some(material) = names.material(get_usize(bind, json_path!["material"]), &context, issues)
        else {
            continue;
        };
        expression.texture_transform_binds.push(TextureTransformBind {
            material,
            scale: get_f32_array(bind, json_path!["scale"], [1.0, 1.0]),
            offset: get_f32_array(bind, json_path!["offset"], [0.0, 0.0]),
        });
    }
    expression
}

fn import_expressions(vrm: &Value, names: &ImportNames, issues: &mut Issues) -> Vec<Expression> {
    let mut expressions = Vec::new();
    if let Some(presets) = lookup(vrm, json_path!["expressions", "preset"]).and_then(Value::as_object) {
        for (name, value) in presets {
            let preset = ExpressionPreset::from_vrm1_name(name);
            expressions.push(import_expression(name, preset, value, names, issues));
        }
    }
    if let Some(custom) = lookup(vrm, json_path!["expressions", "custom"]).and_then(Value::as_object) {
        for (name, value) in custom {
            expressions.push(import_expression(
                name,
                ExpressionPreset::Custom,
                value,
                names,
                issues,
            ));
        }
    }
    expressions
}

/// Collider groups spanning several nodes are split per node, since the
/// model attaches each group to one bone. Capsules keep their head sphere.
fn import_spring(spring: &Value, names: &ImportNames, issues: &mut Issues) -> SpringBone {
    let mut spring_bone = SpringBone::default();

    let colliders: Vec<Option<(String, SphereCollider)>> = get_list(spring, json_path!["colliders"])
        .iter()
        .enumerate()
        .map(|(index, collider)| {
            let context = format!("collider {index}");
            let node = names.node(get_usize(collider, json_path!["node"]), &context, issues)?;
            let shape = if let Some(sphere) = lookup(collider, json_path!["shape", "sphere"]) {
                sphere
            } else if let Some(capsule) = lookup(collider, json_path!["shape", "capsule"]) {
                issues.info(
                    COLLIDER_SIMPLIFIED,
                    format!("{context}: capsule collider reduced to a sphere"),
                );
                capsule
            } else {
                issues.warn(UNRESOLVED_REFERENCE, format!("{context}: unknown collider shape"));
                return None;
            };
            Some((
                node,
                SphereCollider {
                    offset: spring_in(shape, json_path!["offset"], [0.0; 3]),
                    radius: get_f32(shape, json_path!["radius"], 0.0),
                },
            ))
        })
        .collect();

    let mut group_map: Vec<Vec<usize>> = Vec::new();
    for group in get_list(spring, json_path!["colliderGroups"]) {
        let name = get_str(group, json_path!["name"], "");
        let mut per_node: Vec<(String, Vec<SphereCollider>)> = Vec::new();
        for member in get_list(group, json_path!["colliders"]).iter().filter_map(Value::as_u64) {
            let Some(Some((node, collider))) = colliders.get(member as usize) else {
                continue;
            };
            match per_node.iter_mut().find(|(bone, _)| bone == node) {
                Some((_, list)) => list.push(*collider),
                None => per_node.push((node.clone(), vec![*collider])),
            }
        }

        let split = per_node.len() > 1;
        let mut indices = Vec::with_capacity(per_node.len());
        for (bone, colliders) in per_node {
            let group_name = match (name.is_empty(), split) {
                (true, _) => bone.clone(),
                (false, true) => format!("{name}.{bone}"),
                (false, false) => name.to_string(),
            };
            indices.push(spring_bone.collider_groups.len());
            spring_bone.collider_groups.push(ColliderGroup {
                name: group_name,
                bone,
                colliders,
            });
        }
        group_map.push(indices);
    }

    for spring in get_list(spring, json_path!["springs"]) {
        let comment = get_str(spring, json_path!["name"], "").to_string();
        let context = format!("spring '{comment}'");
        let Some(first_joint) = get_list(spring, json_path!["joints"]).first() else {
            continue;
        };
        let Some(root) = names.node(get_usize(first_joint, json_path!["node"]), &context, issues)
        else {
            continue;
        };
        let defaults = SpringGroup::default();
        let center = get_usize(spring, json_path!["center"])
            .and_then(|node| names.node(Some(node), &context, issues));
        let collider_groups = get_list(spring, json_path!["colliderGroups"])
            .iter()
            .filter_map(Value::as_u64)
            .filter_map(|group| group_map.get(group as usize))
            .flatten()
            .copied()
            .collect();

        spring_bone.groups.push(SpringGroup {
            comment,
            stiffness: get_f32(first_joint, json_path!["stiffness"], defaults.stiffness),
            gravity_power: get_f32(first_joint, json_path!["gravityPower"], defaults.gravity_power),
            gravity_dir: spring_in(first_joint, json_path!["gravityDir"], defaults.gravity_dir),
            drag_force: get_f32(first_joint, json_path!["dragForce"], defaults.drag_force),
            hit_radius: get_f32(first_joint, json_path!["hitRadius"], defaults.hit_radius),
            center,
            bones: vec![root],
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
    use crate::convert::metadata::{MeshRef, Thumbnail};

    const NODES: [&str; 5] = ["Hips", "Head", "Hair1", "Hair2", "Face"];

    fn bone_nodes(names: &[&str]) -> HashMap<String, usize> {
        names
            .iter()
            .enumerate()
            .map(|(index, name)| (name.to_string(), index))
            .collect()
    }

    fn export_index() -> ExportIndex {
        ExportIndex {
            bone_nodes: bone_nodes(&NODES[..4]),
            first_child: HashMap::from([("Hair1".to_string(), "Hair2".to_string())]),
            meshes: HashMap::from([(
                "Face".to_string(),
                MeshRef {
                    mesh: 0,
                    node: 4,
                    targets: vec!["Smile".into()],
                },
            )]),
            materials: HashMap::from([("Skin".to_string(), 0)]),
            thumbnail: Some(Thumbnail { image: 1, texture: 0 }),
        }
    }

    fn import_names() -> ImportNames {
        ImportNames {
            nodes: NODES.iter().map(|name| name.to_string()).collect(),
            node_meshes: vec![None, None, None, None, Some(0)],
            meshes: vec!["Face".into()],
            targets: vec![vec!["Smile".into()]],
            materials: vec!["Skin".into()],
        }
    }

    fn metadata() -> VrmMetadata {
        let mut happy = Expression::new("happy", ExpressionPreset::Happy);
        happy.override_blink = ExpressionOverride::Block;
        happy.morph_target_binds.push(MorphTargetBind {
            mesh: "Face".into(),
            shape_key: "Smile".into(),
            weight: 0.5,
        });
        let mut custom = Expression::new("Sparkle", ExpressionPreset::Custom);
        custom.texture_transform_binds.push(TextureTransformBind {
            material: "Skin".into(),
            scale: [2.0, 1.0],
            offset: [0.25, 0.0],
        });

        VrmMetadata {
            meta: AvatarMeta {
                name: "Avatar".into(),
                authors: vec!["Someone".into()],
                commercial_usage: CommercialUsage::PersonalProfit,
                thumbnail_image: Some(1),
                ..AvatarMeta::default()
            },
            humanoid: Humanoid {
                bones: BTreeMap::from([
                    ("hips".to_string(), "Hips".to_string()),
                    ("head".to_string(), "Head".to_string()),
                ]),
            },
            first_person: FirstPerson {
                mesh_annotations: vec![MeshAnnotation {
                    mesh: "Face".into(),
                    flag: FirstPersonFlag::ThirdPersonOnly,
                }],
                ..FirstPerson::default()
            },
            expressions: vec![happy, custom],
            spring_bone: SpringBone {
                collider_groups: vec![ColliderGroup {
                    name: "head".into(),
                    bone: "Head".into(),
                    colliders: vec![SphereCollider {
                        offset: [0.0, 0.1, 0.2],
                        radius: 0.25,
                    }],
                }],
                groups: vec![SpringGroup {
                    comment: "hair".into(),
                    bones: vec!["Hair1".into()],
                    center: Some("Hips".into()),
                    collider_groups: vec![0],
                    ..SpringGroup::default()
                }],
            },
            ..VrmMetadata::default()
        }
    }

    #[test]
    fn given_metadata_when_exporting_then_extension_uses_node_indices() {
        let mut issues = Issues::new();

        let vrm = export_vrm(&metadata(), &export_index(), &mut issues);

        assert_eq!(vrm["humanoid"]["humanBones"], json!({"hips": {"node": 0}, "head": {"node": 1}}));
        assert_eq!(
            vrm["firstPerson"]["meshAnnotations"],
            json!([{"node": 4, "type": "thirdPersonOnly"}])
        );
        assert_eq!(vrm["meta"]["thumbnailImage"], json!(1));
        assert_eq!(vrm["lookAt"]["offsetFromHeadBone"], json!([0.0, 0.06, 0.0]));
        assert_eq!(
            vrm["expressions"]["preset"]["happy"]["morphTargetBinds"],
            json!([{"node": 4, "index": 0, "weight": 0.5}])
        );
        assert_eq!(vrm["expressions"]["preset"]["happy"]["overrideBlink"], json!("block"));
        assert_eq!(
            vrm["expressions"]["custom"]["Sparkle"]["textureTransformBinds"],
            json!([{"material": 0, "scale": [2.0, 1.0], "offset": [0.25, 0.0]}])
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn given_spring_group_when_exporting_then_chain_follows_first_children() {
        let mut issues = Issues::new();

        let spring = export_spring(&metadata(), &export_index(), &mut issues);

        let Some(spring) = spring else {
            panic!("expected a spring bone extension");
        };
        assert_eq!(
            spring["colliders"],
            json!([{"node": 1, "shape": {"sphere": {"offset": [0.0, 0.2, -0.1], "radius": 0.25}}}])
        );
        assert_eq!(spring["colliderGroups"], json!([{"name": "head", "colliders": [0]}]));
        let joints: Vec<&Value> = spring["springs"][0]["joints"]
            .as_array()
            .map(|joints| joints.iter().map(|joint| &joint["node"]).collect())
            .unwrap_or_default();
        assert_eq!(joints, vec![&json!(2), &json!(3)]);
        assert_eq!(spring["springs"][0]["center"], json!(0));
        assert_eq!(spring["springs"][0]["joints"][0]["gravityDir"], json!([0.0, -1.0, 0.0]));
    }

    #[test]
    fn given_empty_spring_bone_when_exporting_then_extension_is_omitted() {
        let mut issues = Issues::new();
        assert_eq!(
            export_spring(&VrmMetadata::default(), &export_index(), &mut issues),
            None
        );
    }

    #[test]
    fn given_exported_document_when_importing_then_metadata_round_trips() {
        let source = metadata();
        let mut issues = Issues::new();
        let document = json!({"extensions": {
            "VRMC_vrm": export_vrm(&source, &export_index(), &mut issues),
            "VRMC_springBone": export_spring(&source, &export_index(), &mut issues),
        }});

        let imported = import(&document, &import_names(), &mut issues);

        assert_eq!(imported.source_version, Some(VrmVersion::V1));
        assert_eq!(imported.meta, source.meta);
        assert_eq!(imported.humanoid, source.humanoid);
        assert_eq!(imported.first_person, source.first_person);
        assert_eq!(imported.look_at, source.look_at);
        assert_eq!(imported.expressions, source.expressions);
        assert_eq!(imported.spring_bone, source.spring_bone);
        assert!(issues.is_empty());
    }

    #[test]
    fn given_collider_group_over_two_nodes_when_importing_then_group_is_split() {
        let spring = json!({
            "colliders": [
                {"node": 0, "shape": {"sphere": {"offset": [0, 0, 0], "radius": 0.1}}},
                {"node": 1, "shape": {"capsule": {"offset": [0, 0, 0], "radius": 0.2, "tail": [0, 1, 0]}}}
            ],
            "colliderGroups": [{"name": "body", "colliders": [0, 1]}],
            "springs": [{"name": "hair", "joints": [{"node": 2}, {"node": 3}], "colliderGroups": [0]}]
        });
        let mut issues = Issues::new();

        let imported = import_spring(&spring, &import_names(), &mut issues);

        let groups: Vec<(&str, &str)> = imported
            .collider_groups
            .iter()
            .map(|group| (group.name.as_str(), group.bone.as_str()))
            .collect();
        assert_eq!(groups, vec![("body.Hips", "Hips"), ("body.Head", "Head")]);
        assert_eq!(imported.groups[0].bones, vec!["Hair1".to_string()]);
        assert_eq!(imported.groups[0].collider_groups, vec![0, 1]);
        assert_eq!(imported.groups[0].stiffness, SpringGroup::default().stiffness);
    }
}
