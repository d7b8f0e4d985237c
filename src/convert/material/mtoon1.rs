//! `VRMC_materials_mtoon` transcoding.

use serde_json::{Map, Value, json};

use super::{MaterialExporter, VRMC_MATERIALS_MTOON, texture_ref_from_info};
use crate::convert::buffer::BinaryBuilder;
use crate::error::{Issues, VrmError};
use crate::json::{PathSegment, float, get_bool, get_f32, get_f32_array, get_str, lookup, numbers};
use crate::json_path;
use crate::scene::{
    AlphaMode, CullMode, MaterialDescription, MtoonMaterial, OutlineColorMode, OutlineWidthMode,
    TextureRef,
};

const WORLD_WIDTH_SCALE: f32 = 0.01;
const SCREEN_WIDTH_SCALE: f32 = 0.005;

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Convert legacy `(_ShadeToony, _ShadeShift)` into
/// `(shadingToonyFactor, shadingShiftFactor)`.
pub fn shading_to_vrm1(toony: f32, shift: f32) -> (f32, f32) {
    let min = shift;
    let max = lerp(1.0, shift, toony);
    let toony1 = ((2.0 - (max - min)) / 2.0).clamp(0.0, 1.0);
    let shift1 = (-(max + min) / 2.0).clamp(-1.0, 1.0);
    (toony1, shift1)
}

/// Inverse of [`shading_to_vrm1`].
///
/// When the legacy shift is 1 every toony value maps to the same band, so
/// the default toony is returned.
pub fn shading_from_vrm1(toony: f32, shift: f32) -> (f32, f32) {
    let max = -shift + 1.0 - toony;
    let min = -shift - 1.0 + toony;
    let shift0 = min;
    let denominator = 1.0 - shift0;
    let toony0 = if denominator.abs() <= f32::EPSILON {
        MtoonMaterial::default().shade_toony
    } else {
        ((1.0 - max) / denominator).clamp(0.0, 1.0)
    };
    (toony0, shift0)
}

fn width_mode_name(mode: OutlineWidthMode) -> &'static str {
    match mode {
        OutlineWidthMode::None => "none",
        OutlineWidthMode::World => "worldCoordinates",
        OutlineWidthMode::Screen => "screenCoordinates",
    }
}

fn width_mode_from_name(name: &str) -> OutlineWidthMode {
    match name {
        "worldCoordinates" => OutlineWidthMode::World,
        "screenCoordinates" => OutlineWidthMode::Screen,
        _ => OutlineWidthMode::None,
    }
}

impl MaterialExporter<'_> {
    pub(super) fn export_mtoon1(
        &mut self,
        mtoon: &MtoonMaterial,
        builder: &mut BinaryBuilder,
        issues: &mut Issues,
    ) -> Result<Value, VrmError> {
        let (toony, shift) = shading_to_vrm1(mtoon.shade_toony, mtoon.shade_shift);
        let width_factor = match mtoon.outline_width_mode {
            OutlineWidthMode::None => 0.0,
            OutlineWidthMode::World => mtoon.outline_width * WORLD_WIDTH_SCALE,
            OutlineWidthMode::Screen => mtoon.outline_width * SCREEN_WIDTH_SCALE,
        };
        let outline_lighting_mix = match mtoon.outline_color_mode {
            OutlineColorMode::Fixed => 0.0,
            OutlineColorMode::Mixed => mtoon.outline_lighting_mix,
        };
        let matcap_factor = if mtoon.sphere_add_texture.is_some() {
            [1.0, 1.0, 1.0]
        } else {
            [0.0, 0.0, 0.0]
        };

        let mut extension = Map::new();
        extension.insert("specVersion".into(), json!("1.0"));
        extension.insert(
            "transparentWithZWrite".into(),
            json!(mtoon.alpha_mode == AlphaMode::Blend && mtoon.transparent_with_z_write),
        );
        extension.insert("renderQueueOffsetNumber".into(), json!(mtoon.render_queue_offset));
        extension.insert("shadeColorFactor".into(), numbers(&mtoon.shade_color, issues));
        self.insert_texture(&mut extension, "shadeMultiplyTexture", mtoon.shade_texture.as_ref(), builder, issues)?;
        extension.insert("shadingShiftFactor".into(), float(shift, issues));
        extension.insert("shadingToonyFactor".into(), float(toony, issues));
        extension.insert(
            "giEqualizationFactor".into(),
            float(1.0 - mtoon.indirect_light_intensity, issues),
        );
        extension.insert("matcapFactor".into(), numbers(&matcap_factor, issues));
        self.insert_texture(&mut extension, "matcapTexture", mtoon.sphere_add_texture.as_ref(), builder, issues)?;
        extension.insert("parametricRimColorFactor".into(), numbers(&mtoon.rim_color, issues));
        self.insert_texture(&mut extension, "rimMultiplyTexture", mtoon.rim_texture.as_ref(), builder, issues)?;
        extension.insert("rimLightingMixFactor".into(), float(mtoon.rim_lighting_mix, issues));
        extension.insert(
            "parametricRimFresnelPowerFactor".into(),
            float(mtoon.rim_fresnel_power, issues),
        );
        extension.insert("parametricRimLiftFactor".into(), float(mtoon.rim_lift, issues));
        extension.insert(
            "outlineWidthMode".into(),
            json!(width_mode_name(mtoon.outline_width_mode)),
        );
        extension.insert("outlineWidthFactor".into(), float(width_factor, issues));
        self.insert_texture(
            &mut extension,
            "outlineWidthMultiplyTexture",
            mtoon.outline_width_texture.as_ref(),
            builder,
            issues,
        )?;
        extension.insert("outlineColorFactor".into(), numbers(&mtoon.outline_color, issues));
        extension.insert("outlineLightingMixFactor".into(), float(outline_lighting_mix, issues));
        self.insert_texture(
            &mut extension,
            "uvAnimationMaskTexture",
            mtoon.uv_animation_mask_texture.as_ref(),
            builder,
            issues,
        )?;
        extension.insert(
            "uvAnimationScrollXSpeedFactor".into(),
            float(mtoon.uv_animation_scroll_x, issues),
        );
        extension.insert(
            "uvAnimationScrollYSpeedFactor".into(),
            float(-mtoon.uv_animation_scroll_y, issues),
        );
        extension.insert(
            "uvAnimationRotationSpeedFactor".into(),
            float(mtoon.uv_animation_rotation, issues),
        );
        Ok(Value::Object(extension))
    }

    fn insert_texture(
        &mut self,
        target: &mut Map<String, Value>,
        key: &str,
        texture: Option<&TextureRef>,
        builder: &mut BinaryBuilder,
        issues: &mut Issues,
    ) -> Result<(), VrmError> {
        if let Some(info) = self.texture_info(texture, builder, issues)? {
            target.insert(key.into(), Value::Object(info));
        }
        Ok(())
    }
}

/// Rebuild a toon material from a glTF material carrying
/// `VRMC_materials_mtoon`. `None` when the extension is absent.
pub(super) fn import_mtoon1(json: &Value, material: &Value) -> Option<MaterialDescription> {
    let extension = lookup(material, json_path!["extensions", VRMC_MATERIALS_MTOON])?;
    let defaults = MtoonMaterial::default();
    let texture_at = |node: &Value, path: &[PathSegment<'_>]| {
        lookup(node, path).and_then(|info| texture_ref_from_info(json, info))
    };
    let factor = |key: &str, default: f32| get_f32(extension, json_path![key], default);

    let alpha_mode = AlphaMode::from_gltf_name(get_str(material, json_path!["alphaMode"], "OPAQUE"));
    let (shade_toony, shade_shift) = shading_from_vrm1(
        factor("shadingToonyFactor", 0.9),
        factor("shadingShiftFactor", 0.0),
    );
    let outline_width_mode = width_mode_from_name(get_str(extension, json_path!["outlineWidthMode"], "none"));
    let width_factor = factor("outlineWidthFactor", 0.0);
    let outline_width = match outline_width_mode {
        OutlineWidthMode::None => defaults.outline_width,
        OutlineWidthMode::World => width_factor / WORLD_WIDTH_SCALE,
        OutlineWidthMode::Screen => width_factor / SCREEN_WIDTH_SCALE,
    };
    let outline_lighting_mix = factor("outlineLightingMixFactor", 1.0);
    let outline_color_mode = if outline_lighting_mix > 0.0 {
        OutlineColorMode::Mixed
    } else {
        OutlineColorMode::Fixed
    };

    Some(MaterialDescription::Mtoon(Box::new(MtoonMaterial {
        alpha_mode,
        transparent_with_z_write: get_bool(extension, json_path!["transparentWithZWrite"], false),
        render_queue_offset: lookup(extension, json_path!["renderQueueOffsetNumber"])
            .and_then(Value::as_i64)
            .and_then(|offset| i32::try_from(offset).ok())
            .unwrap_or(0),
        alpha_cutoff: get_f32(material, json_path!["alphaCutoff"], defaults.alpha_cutoff),
        cull_mode: if get_bool(material, json_path!["doubleSided"], false) {
            CullMode::Off
        } else {
            CullMode::Back
        },
        color: get_f32_array(
            material,
            json_path!["pbrMetallicRoughness", "baseColorFactor"],
            defaults.color,
        ),
        main_texture: texture_at(material, json_path!["pbrMetallicRoughness", "baseColorTexture"]),
        shade_color: get_f32_array(extension, json_path!["shadeColorFactor"], defaults.shade_color),
        shade_texture: texture_at(extension, json_path!["shadeMultiplyTexture"]),
        normal_texture: texture_at(material, json_path!["normalTexture"]),
        normal_scale: get_f32(material, json_path!["normalTexture", "scale"], defaults.normal_scale),
        receive_shadow_rate: defaults.receive_shadow_rate,
        receive_shadow_texture: None,
        shading_grade_rate: defaults.shading_grade_rate,
        shading_grade_texture: None,
        shade_shift,
        shade_toony,
        light_color_attenuation: defaults.light_color_attenuation,
        indirect_light_intensity: 1.0 - factor("giEqualizationFactor", 0.9),
        rim_color: get_f32_array(extension, json_path!["parametricRimColorFactor"], defaults.rim_color),
        rim_texture: texture_at(extension, json_path!["rimMultiplyTexture"]),
        rim_lighting_mix: factor("rimLightingMixFactor", defaults.rim_lighting_mix),
        rim_fresnel_power: factor("parametricRimFresnelPowerFactor", defaults.rim_fresnel_power),
        rim_lift: factor("parametricRimLiftFactor", defaults.rim_lift),
        sphere_add_texture: texture_at(extension, json_path!["matcapTexture"]),
        emission_color: get_f32_array(material, json_path!["emissiveFactor"], defaults.emission_color),
        emission_texture: texture_at(material, json_path!["emissiveTexture"]),
        outline_width_mode,
        outline_width,
        outline_width_texture: texture_at(extension, json_path!["outlineWidthMultiplyTexture"]),
        outline_scaled_max_distance: defaults.outline_scaled_max_distance,
        outline_color_mode,
        outline_color: get_f32_array(extension, json_path!["outlineColorFactor"], defaults.outline_color),
        outline_lighting_mix: match outline_color_mode {
            OutlineColorMode::Mixed => outline_lighting_mix,
            OutlineColorMode::Fixed => defaults.outline_lighting_mix,
        },
        outline_cull_mode: defaults.outline_cull_mode,
        uv_animation_mask_texture: texture_at(extension, json_path!["uvAnimationMaskTexture"]),
        uv_animation_scroll_x: factor("uvAnimationScrollXSpeedFactor", 0.0),
        uv_animation_scroll_y: -factor("uvAnimationScrollYSpeedFactor", 0.0),
        uv_animation_rotation: factor("uvAnimationRotationSpeedFactor", 0.0),
    })))
}
