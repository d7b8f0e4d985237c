//! Legacy `materialProperties` entries (`VRM/MToon` and friends).

use serde_json::{Map, Value, json};

use super::{MaterialExporter, texture_ref_from_index};
use crate::convert::buffer::BinaryBuilder;
use crate::error::{Issues, VrmError};
use crate::json::{float, get_f32, get_f32_array, get_list, get_str, get_u64, lookup, numbers};
use crate::json_path;
use crate::scene::{
    AlphaMode, CullMode, MaterialDescription, MtoonMaterial, OutlineColorMode, OutlineWidthMode,
    TextureMapping, TextureRef, TransparentZWriteMaterial,
};

pub(super) const MTOON_SHADER: &str = "VRM/MToon";
pub(super) const TRANSPARENT_ZWRITE_SHADER: &str = "VRM/UnlitTransparentZWrite";
pub(super) const GLTF_SHADER: &str = "VRM_USE_GLTFSHADER";

const MTOON_VERSION: f64 = 38.0;
const TRANSPARENT_ZWRITE_QUEUE: i64 = 2600;

/// Legacy render state derived from the alpha mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RenderState {
    blend_mode: u8,
    src_blend: u8,
    dst_blend: u8,
    z_write: u8,
    alpha_test: bool,
    queue: i64,
    render_type: &'static str,
}

fn render_state(alpha_mode: AlphaMode, z_write: bool, queue_offset: i32) -> RenderState {
    let offset = i64::from(queue_offset);
    match (alpha_mode, z_write) {
        (AlphaMode::Opaque, _) => RenderState {
            blend_mode: 0,
            src_blend: 1,
            dst_blend: 0,
            z_write: 1,
            alpha_test: false,
            queue: 2000,
            render_type: "Opaque",
        },
        (AlphaMode::Clip, _) => RenderState {
            blend_mode: 1,
            src_blend: 1,
            dst_blend: 0,
            z_write: 1,
            alpha_test: true,
            queue: 2450,
            render_type: "TransparentCutout",
        },
        (AlphaMode::Blend, false) => RenderState {
            blend_mode: 2,
            src_blend: 5,
            dst_blend: 10,
            z_write: 0,
            alpha_test: false,
            queue: 3000 + offset,
            render_type: "Transparent",
        },
        (AlphaMode::Blend, true) => RenderState {
            blend_mode: 3,
            src_blend: 5,
            dst_blend: 10,
            z_write: 1,
            alpha_test: false,
            queue: 2501 + offset,
            render_type: "Transparent",
        },
    }
}

fn outline_keywords(width: OutlineWidthMode, color: OutlineColorMode) -> Vec<&'static str> {
    let width_keyword = match width {
        OutlineWidthMode::None => return vec!["MTOON_OUTLINE_NONE"],
        OutlineWidthMode::World => "MTOON_OUTLINE_WIDTH_WORLD",
        OutlineWidthMode::Screen => "MTOON_OUTLINE_WIDTH_SCREEN",
    };
    let color_keyword = match color {
        OutlineColorMode::Fixed => "MTOON_OUTLINE_COLOR_FIXED",
        OutlineColorMode::Mixed => "MTOON_OUTLINE_COLOR_MIXED",
    };
    vec![width_keyword, color_keyword]
}

fn color4(rgb: [f32; 3]) -> [f32; 4] {
    [rgb[0], rgb[1], rgb[2], 1.0]
}

fn empty_properties(name: &str, shader: &str, queue: i64) -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert("name".into(), json!(name));
    properties.insert("shader".into(), json!(shader));
    properties.insert("renderQueue".into(), json!(queue));
    properties.insert("floatProperties".into(), json!({}));
    properties.insert("vectorProperties".into(), json!({}));
    properties.insert("textureProperties".into(), json!({}));
    properties.insert("keywordMap".into(), json!({}));
    properties.insert("tagMap".into(), json!({}));
    properties
}

/// Entry telling legacy readers to use the glTF material as is.
pub(super) fn gltf_shader_properties(name: &str) -> Value {
    Value::Object(empty_properties(name, GLTF_SHADER, -1))
}

pub(super) fn transparent_zwrite_properties(name: &str, main_texture: Option<usize>) -> Value {
    let mut properties = empty_properties(name, TRANSPARENT_ZWRITE_SHADER, TRANSPARENT_ZWRITE_QUEUE);
    if let Some(index) = main_texture {
        properties.insert("textureProperties".into(), json!({ "_MainTex": index }));
    }
    properties.insert("tagMap".into(), json!({ "RenderType": "Transparent" }));
    Value::Object(properties)
}

impl MaterialExporter<'_> {
    /// `materialProperties` entry for a toon material.
    pub(super) fn export_mtoon_legacy(
        &mut self,
        name: &str,
        mtoon: &MtoonMaterial,
        builder: &mut BinaryBuilder,
        issues: &mut Issues,
    ) -> Result<Value, VrmError> {
        let state = render_state(
            mtoon.alpha_mode,
            mtoon.transparent_with_z_write,
            mtoon.render_queue_offset,
        );

        let mut floats = Map::new();
        let scalar_slots = [
            ("_Cutoff", mtoon.alpha_cutoff),
            ("_BumpScale", mtoon.normal_scale),
            ("_ReceiveShadowRate", mtoon.receive_shadow_rate),
            ("_ShadingGradeRate", mtoon.shading_grade_rate),
            ("_ShadeShift", mtoon.shade_shift),
            ("_ShadeToony", mtoon.shade_toony),
            ("_LightColorAttenuation", mtoon.light_color_attenuation),
            ("_IndirectLightIntensity", mtoon.indirect_light_intensity),
            ("_RimLightingMix", mtoon.rim_lighting_mix),
            ("_RimFresnelPower", mtoon.rim_fresnel_power),
            ("_RimLift", mtoon.rim_lift),
            ("_OutlineWidth", mtoon.outline_width),
            ("_OutlineScaledMaxDistance", mtoon.outline_scaled_max_distance),
            ("_OutlineLightingMix", mtoon.outline_lighting_mix),
            ("_UvAnimScrollX", mtoon.uv_animation_scroll_x),
            ("_UvAnimScrollY", mtoon.uv_animation_scroll_y),
            ("_UvAnimRotation", mtoon.uv_animation_rotation),
        ];
        for (key, value) in scalar_slots {
            floats.insert(key.into(), float(value, issues));
        }
        let enum_slots = [
            ("_MToonVersion", MTOON_VERSION),
            ("_DebugMode", 0.0),
            ("_BlendMode", f64::from(state.blend_mode)),
            ("_OutlineWidthMode", f64::from(mtoon.outline_width_mode as u8)),
            ("_OutlineColorMode", f64::from(mtoon.outline_color_mode as u8)),
            ("_CullMode", f64::from(mtoon.cull_mode as u8)),
            ("_OutlineCullMode", f64::from(mtoon.outline_cull_mode as u8)),
            ("_SrcBlend", f64::from(state.src_blend)),
            ("_DstBlend", f64::from(state.dst_blend)),
            ("_ZWrite", f64::from(state.z_write)),
        ];
        for (key, value) in enum_slots {
            floats.insert(key.into(), json!(value));
        }

        let mut vectors = Map::new();
        vectors.insert("_Color".into(), numbers(&mtoon.color, issues));
        vectors.insert("_ShadeColor".into(), numbers(&color4(mtoon.shade_color), issues));
        vectors.insert("_RimColor".into(), numbers(&color4(mtoon.rim_color), issues));
        vectors.insert("_EmissionColor".into(), numbers(&color4(mtoon.emission_color), issues));
        vectors.insert("_OutlineColor".into(), numbers(&color4(mtoon.outline_color), issues));

        let mut textures = Map::new();
        let texture_slots = [
            ("_MainTex", mtoon.main_texture.as_ref()),
            ("_ShadeTexture", mtoon.shade_texture.as_ref()),
            ("_BumpMap", mtoon.normal_texture.as_ref()),
            ("_ReceiveShadowTexture", mtoon.receive_shadow_texture.as_ref()),
            ("_ShadingGradeTexture", mtoon.shading_grade_texture.as_ref()),
            ("_RimTexture", mtoon.rim_texture.as_ref()),
            ("_SphereAdd", mtoon.sphere_add_texture.as_ref()),
            ("_EmissionMap", mtoon.emission_texture.as_ref()),
            ("_OutlineWidthTexture", mtoon.outline_width_texture.as_ref()),
            ("_UvAnimMaskTexture", mtoon.uv_animation_mask_texture.as_ref()),
        ];
        for (slot, texture) in texture_slots {
            let Some(texture) = texture else {
                continue;
            };
            let Some(index) = self.texture(texture, builder, issues)? else {
                continue;
            };
            textures.insert(slot.into(), json!(index));
            let (offset, scale) = texture
                .mapping
                .map(TextureMapping::to_gltf)
                .unwrap_or(([0.0, 0.0], [1.0, 1.0]));
            vectors.insert(
                slot.into(),
                numbers(&[offset[0], offset[1], scale[0], scale[1]], issues),
            );
        }

        let mut keywords = Map::new();
        match state.blend_mode {
            1 => {
                keywords.insert("_ALPHATEST_ON".into(), json!(true));
            }
            2 | 3 => {
                keywords.insert("_ALPHABLEND_ON".into(), json!(true));
            }
            _ => {}
        }
        if textures.contains_key("_BumpMap") {
            keywords.insert("_NORMALMAP".into(), json!(true));
        }
        for keyword in outline_keywords(mtoon.outline_width_mode, mtoon.outline_color_mode) {
            keywords.insert(keyword.into(), json!(true));
        }

        let mut properties = empty_properties(name, MTOON_SHADER, state.queue);
        properties.insert("floatProperties".into(), Value::Object(floats));
        properties.insert("vectorProperties".into(), Value::Object(vectors));
        properties.insert("textureProperties".into(), Value::Object(textures));
        properties.insert("keywordMap".into(), Value::Object(keywords));
        properties.insert("tagMap".into(), json!({ "RenderType": state.render_type }));
        Ok(Value::Object(properties))
    }
}

fn legacy_texture(json: &Value, properties: &Value, slot: &str) -> Option<TextureRef> {
    let index = get_u64(properties, json_path!["textureProperties", slot])?;
    let mut texture = texture_ref_from_index(json, usize::try_from(index).ok()?)?;
    let transform = get_f32_array(
        properties,
        json_path!["vectorProperties", slot],
        [0.0, 0.0, 1.0, 1.0],
    );
    let mapping = TextureMapping::from_gltf([transform[0], transform[1]], [transform[2], transform[3]]);
    texture.mapping = (!mapping.is_identity()).then_some(mapping);
    Some(texture)
}

fn legacy_color3(properties: &Value, key: &str, default: [f32; 3]) -> [f32; 3] {
    let items = get_list(properties, json_path!["vectorProperties", key]);
    if items.len() < 3 {
        return default;
    }
    let mut out = default;
    for (slot, item) in out.iter_mut().zip(items) {
        if let Some(number) = item.as_f64() {
            *slot = number as f32;
        }
    }
    out
}

/// Read a legacy entry. `None` when the shader is not one the mapper knows,
/// in which case the glTF material itself is authoritative.
pub(super) fn import_legacy(
    json: &Value,
    _material: &Value,
    properties: &Value,
) -> Option<MaterialDescription> {
    match get_str(properties, json_path!["shader"], "") {
        MTOON_SHADER => Some(MaterialDescription::Mtoon(Box::new(import_mtoon0(
            json, properties,
        )))),
        TRANSPARENT_ZWRITE_SHADER => Some(MaterialDescription::TransparentZWrite(
            TransparentZWriteMaterial {
                main_texture: legacy_texture(json, properties, "_MainTex"),
            },
        )),
        _ => None,
    }
}

fn import_mtoon0(json: &Value, properties: &Value) -> MtoonMaterial {
    let defaults = MtoonMaterial::default();
    let scalar = |key: &str, default: f32| get_f32(properties, json_path!["floatProperties", key], default);
    let code = |key: &str, default: f64| {
        crate::json::get_f64(properties, json_path!["floatProperties", key], default)
    };
    let texture = |slot: &str| legacy_texture(json, properties, slot);

    let (alpha_mode, transparent_with_z_write, base_queue) = match code("_BlendMode", 0.0).round() as i64 {
        1 => (AlphaMode::Clip, false, None),
        2 => (AlphaMode::Blend, false, Some(3000)),
        3 => (AlphaMode::Blend, true, Some(2501)),
        _ => (AlphaMode::Opaque, false, None),
    };
    let render_queue_offset = match (base_queue, lookup(properties, json_path!["renderQueue"]).and_then(Value::as_i64)) {
        (Some(base), Some(queue)) => i32::try_from(queue - base).unwrap_or(0),
        _ => 0,
    };

    MtoonMaterial {
        alpha_mode,
        transparent_with_z_write,
        render_queue_offset,
        alpha_cutoff: scalar("_Cutoff", defaults.alpha_cutoff),
        cull_mode: CullMode::from_code(code("_CullMode", 2.0)),
        color: get_f32_array(properties, json_path!["vectorProperties", "_Color"], defaults.color),
        main_texture: texture("_MainTex"),
        shade_color: legacy_color3(properties, "_ShadeColor", defaults.shade_color),
        shade_texture: texture("_ShadeTexture"),
        normal_texture: texture("_BumpMap"),
        normal_scale: scalar("_BumpScale", defaults.normal_scale),
        receive_shadow_rate: scalar("_ReceiveShadowRate", defaults.receive_shadow_rate),
        receive_shadow_texture: texture("_ReceiveShadowTexture"),
        shading_grade_rate: scalar("_ShadingGradeRate", defaults.shading_grade_rate),
        shading_grade_texture: texture("_ShadingGradeTexture"),
        shade_shift: scalar("_ShadeShift", defaults.shade_shift),
        shade_toony: scalar("_ShadeToony", defaults.shade_toony),
        light_color_attenuation: scalar("_LightColorAttenuation", defaults.light_color_attenuation),
        indirect_light_intensity: scalar("_IndirectLightIntensity", defaults.indirect_light_intensity),
        rim_color: legacy_color3(properties, "_RimColor", defaults.rim_color),
        rim_texture: texture("_RimTexture"),
        rim_lighting_mix: scalar("_RimLightingMix", defaults.rim_lighting_mix),
        rim_fresnel_power: scalar("_RimFresnelPower", defaults.rim_fresnel_power),
        rim_lift: scalar("_RimLift", defaults.rim_lift),
        sphere_add_texture: texture("_SphereAdd"),
        emission_color: legacy_color3(properties, "_EmissionColor", defaults.emission_color),
        emission_texture: texture("_EmissionMap"),
        outline_width_mode: OutlineWidthMode::from_code(code("_OutlineWidthMode", 0.0)),
        outline_width: scalar("_OutlineWidth", defaults.outline_width),
        outline_width_texture: texture("_OutlineWidthTexture"),
        outline_scaled_max_distance: scalar(
            "_OutlineScaledMaxDistance",
            defaults.outline_scaled_max_distance,
        ),
        outline_color_mode: OutlineColorMode::from_code(code("_OutlineColorMode", 0.0)),
        outline_color: legacy_color3(properties, "_OutlineColor", defaults.outline_color),
        outline_lighting_mix: scalar("_OutlineLightingMix", defaults.outline_lighting_mix),
        outline_cull_mode: CullMode::from_code(code("_OutlineCullMode", 1.0)),
        uv_animation_mask_texture: texture("_UvAnimMaskTexture"),
        uv_animation_scroll_x: scalar("_UvAnimScrollX", defaults.uv_animation_scroll_x),
        uv_animation_scroll_y: scalar("_UvAnimScrollY", defaults.uv_animation_scroll_y),
        uv_animation_rotation: scalar("_UvAnimRotation", defaults.uv_animation_rotation),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::scene::{ImageData, SceneImage, VrmVersion};

    fn images() -> Vec<SceneImage> {
        vec![SceneImage {
            name: "body".into(),
            data: ImageData::Encoded {
                mime_type: "image/png".into(),
                bytes: vec![9; 12],
            },
        }]
    }

    #[test]
    fn given_each_alpha_mode_when_deriving_render_state_then_table_row_is_used() {
        let rows = [
            (render_state(AlphaMode::Opaque, true, 5), (0, 1, 0, 1, false, 2000, "Opaque")),
            (
                render_state(AlphaMode::Clip, false, 5),
                (1, 1, 0, 1, true, 2450, "TransparentCutout"),
            ),
            (
                render_state(AlphaMode::Blend, false, -3),
                (2, 5, 10, 0, false, 2997, "Transparent"),
            ),
            (
                render_state(AlphaMode::Blend, true, 4),
                (3, 5, 10, 1, false, 2505, "Transparent"),
            ),
        ];

        for (state, expected) in rows {
            assert_eq!(
                (
                    state.blend_mode,
                    state.src_blend,
                    state.dst_blend,
                    state.z_write,
                    state.alpha_test,
                    state.queue,
                    state.render_type
                ),
                expected
            );
        }
    }

    #[test]
    fn given_outline_modes_when_deriving_keywords_then_color_follows_only_visible_outlines() {
        assert_eq!(
            outline_keywords(OutlineWidthMode::None, OutlineColorMode::Mixed),
            vec!["MTOON_OUTLINE_NONE"]
        );
        assert_eq!(
            outline_keywords(OutlineWidthMode::World, OutlineColorMode::Fixed),
            vec!["MTOON_OUTLINE_WIDTH_WORLD", "MTOON_OUTLINE_COLOR_FIXED"]
        );
        assert_eq!(
            outline_keywords(OutlineWidthMode::Screen, OutlineColorMode::Mixed),
            vec!["MTOON_OUTLINE_WIDTH_SCREEN", "MTOON_OUTLINE_COLOR_MIXED"]
        );
    }

    #[test]
    fn given_clip_toon_material_when_exporting_legacy_then_render_state_and_slots_are_written() {
        let images = images();
        let mut main = TextureRef::new(0);
        main.mapping = Some(TextureMapping {
            location: [0.0, 0.5],
            scale: [1.0, 0.5],
        });
        let mtoon = MtoonMaterial {
            alpha_mode: AlphaMode::Clip,
            main_texture: Some(main),
            normal_texture: Some(TextureRef::new(0)),
            outline_width_mode: OutlineWidthMode::World,
            ..MtoonMaterial::default()
        };
        let mut exporter = MaterialExporter::new(&images, VrmVersion::V0, true);
        let mut builder = BinaryBuilder::new();
        let mut issues = Issues::new();

        let legacy = exporter
            .export_mtoon_legacy("Face", &mtoon, &mut builder, &mut issues)
            .expect("legacy export");

        assert_eq!(legacy["shader"], json!("VRM/MToon"));
        assert_eq!(legacy["renderQueue"], json!(2450));
        assert_eq!(legacy["floatProperties"]["_BlendMode"], json!(1.0));
        assert_eq!(legacy["floatProperties"]["_MToonVersion"], json!(38.0));
        assert_eq!(legacy["floatProperties"]["_OutlineCullMode"], json!(1.0));
        assert_eq!(legacy["textureProperties"], json!({"_MainTex": 0, "_BumpMap": 0}));
        assert_eq!(legacy["vectorProperties"]["_MainTex"], json!([0.0, 0.0, 1.0, 0.5]));
        assert_eq!(legacy["vectorProperties"]["_BumpMap"], json!([0.0, 0.0, 1.0, 1.0]));
        assert_eq!(
            legacy["keywordMap"],
            json!({
                "_ALPHATEST_ON": true,
                "_NORMALMAP": true,
                "MTOON_OUTLINE_WIDTH_WORLD": true,
                "MTOON_OUTLINE_COLOR_FIXED": true
            })
        );
        assert_eq!(legacy["tagMap"], json!({"RenderType": "TransparentCutout"}));
        assert!(issues.is_empty());
    }

    #[test]
    fn given_exported_legacy_entry_when_importing_then_toon_material_is_restored() {
        let images = images();
        let mut shade = TextureRef::new(0);
        shade.mapping = Some(TextureMapping {
            location: [0.25, 0.25],
            scale: [0.5, 0.5],
        });
        let original = MtoonMaterial {
            alpha_mode: AlphaMode::Blend,
            transparent_with_z_write: true,
            render_queue_offset: 3,
            cull_mode: CullMode::Off,
            shade_color: [0.5, 0.25, 0.125],
            shade_texture: Some(shade),
            outline_width_mode: OutlineWidthMode::Screen,
            outline_color_mode: OutlineColorMode::Mixed,
            uv_animation_scroll_y: 0.75,
            ..MtoonMaterial::default()
        };
        let mut exporter = MaterialExporter::new(&images, VrmVersion::V0, true);
        let mut builder = BinaryBuilder::new();
        let mut issues = Issues::new();
        let legacy = exporter
            .export_mtoon_legacy("Hair", &original, &mut builder, &mut issues)
            .expect("legacy export");
        let tables = exporter.finish();
        let doc = json!({"samplers": tables.samplers, "textures": tables.textures});

        let imported = import_legacy(&doc, &json!({"name": "Hair"}), &legacy);

        assert_eq!(imported, Some(MaterialDescription::Mtoon(Box::new(original))));
    }

    #[test]
    fn given_transparent_zwrite_entry_when_importing_then_main_texture_is_kept() {
        let doc = json!({"textures": [{"source": 4}]});
        let properties = transparent_zwrite_properties("Glass", Some(0));

        assert_eq!(properties["renderQueue"], json!(2600));
        let Some(MaterialDescription::TransparentZWrite(material)) =
            import_legacy(&doc, &json!({}), &properties)
        else {
            panic!("expected the transparent material");
        };
        assert_eq!(material.main_texture.map(|texture| texture.image), Some(4));
        assert_eq!(import_legacy(&doc, &json!({}), &gltf_shader_properties("Glass")), None);
    }
}
