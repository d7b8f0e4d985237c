use serde_json::{Map, Value, json};

use super::{KHR_MATERIALS_UNLIT, MaterialExporter, texture_ref_from_info};
use crate::convert::buffer::BinaryBuilder;
use crate::error::{Issues, VrmError};
use crate::json::{float, get_f32, get_f32_array, get_str, numbers};
use crate::json_path;
use crate::scene::{
    AlphaMode, CullMode, MaterialDescription, MtoonMaterial, PbrMaterial,
    TransparentZWriteMaterial,
};

impl MaterialExporter<'_> {
    /// Standard metallic-roughness material.
    pub(super) fn export_pbr(
        &mut self,
        name: &str,
        pbr: &PbrMaterial,
        builder: &mut BinaryBuilder,
        issues: &mut Issues,
    ) -> Result<Map<String, Value>, VrmError> {
        let mut material = Map::new();
        material.insert("name".into(), json!(name));

        let mut metallic_roughness = Map::new();
        metallic_roughness.insert("baseColorFactor".into(), numbers(&pbr.base_color, issues));
        if let Some(info) = self.texture_info(pbr.base_color_texture.as_ref(), builder, issues)? {
            metallic_roughness.insert("baseColorTexture".into(), Value::Object(info));
        }
        metallic_roughness.insert("metallicFactor".into(), float(pbr.metallic, issues));
        metallic_roughness.insert("roughnessFactor".into(), float(pbr.roughness, issues));
        if let Some(info) =
            self.texture_info(pbr.metallic_roughness_texture.as_ref(), builder, issues)?
        {
            metallic_roughness.insert("metallicRoughnessTexture".into(), Value::Object(info));
        }
        material.insert("pbrMetallicRoughness".into(), Value::Object(metallic_roughness));

        if let Some(mut info) = self.texture_info(pbr.normal_texture.as_ref(), builder, issues)? {
            info.insert("scale".into(), float(pbr.normal_scale, issues));
            material.insert("normalTexture".into(), Value::Object(info));
        }
        if let Some(mut info) = self.texture_info(pbr.occlusion_texture.as_ref(), builder, issues)? {
            info.insert("strength".into(), float(pbr.occlusion_strength, issues));
            material.insert("occlusionTexture".into(), Value::Object(info));
        }
        if let Some(info) = self.texture_info(pbr.emissive_texture.as_ref(), builder, issues)? {
            material.insert("emissiveTexture".into(), Value::Object(info));
        }
        material.insert("emissiveFactor".into(), numbers(&pbr.emissive, issues));

        insert_alpha(&mut material, pbr.alpha_mode, pbr.alpha_cutoff, issues);
        material.insert("doubleSided".into(), json!(pbr.double_sided));
        if pbr.unlit {
            self.mark_unlit(&mut material);
        }
        Ok(material)
    }

    /// glTF part of a toon material: what a viewer without the vendor
    /// extension renders. The legacy generation marks it unlit.
    pub(super) fn export_mtoon_base(
        &mut self,
        name: &str,
        mtoon: &MtoonMaterial,
        unlit: bool,
        builder: &mut BinaryBuilder,
        issues: &mut Issues,
    ) -> Result<Map<String, Value>, VrmError> {
        let mut material = Map::new();
        material.insert("name".into(), json!(name));

        let mut metallic_roughness = Map::new();
        metallic_roughness.insert("baseColorFactor".into(), numbers(&mtoon.color, issues));
        if let Some(info) = self.texture_info(mtoon.main_texture.as_ref(), builder, issues)? {
            metallic_roughness.insert("baseColorTexture".into(), Value::Object(info));
        }
        metallic_roughness.insert("metallicFactor".into(), json!(0.0));
        metallic_roughness.insert("roughnessFactor".into(), json!(0.9));
        material.insert("pbrMetallicRoughness".into(), Value::Object(metallic_roughness));

        if let Some(mut info) = self.texture_info(mtoon.normal_texture.as_ref(), builder, issues)? {
            info.insert("scale".into(), float(mtoon.normal_scale, issues));
            material.insert("normalTexture".into(), Value::Object(info));
        }
        if let Some(info) = self.texture_info(mtoon.emission_texture.as_ref(), builder, issues)? {
            material.insert("emissiveTexture".into(), Value::Object(info));
        }
        material.insert("emissiveFactor".into(), numbers(&mtoon.emission_color, issues));

        insert_alpha(&mut material, mtoon.alpha_mode, mtoon.alpha_cutoff, issues);
        material.insert("doubleSided".into(), json!(mtoon.cull_mode == CullMode::Off));
        if unlit {
            self.mark_unlit(&mut material);
        }
        Ok(material)
    }

    /// Unlit, alpha-blended material carrying only the main texture.
    pub(super) fn export_transparent_zwrite(
        &mut self,
        name: &str,
        transparent: &TransparentZWriteMaterial,
        builder: &mut BinaryBuilder,
        issues: &mut Issues,
    ) -> Result<Map<String, Value>, VrmError> {
        let mut material = Map::new();
        material.insert("name".into(), json!(name));
        let mut metallic_roughness = Map::new();
        metallic_roughness.insert("baseColorFactor".into(), json!([1.0, 1.0, 1.0, 1.0]));
        if let Some(info) =
            self.texture_info(transparent.main_texture.as_ref(), builder, issues)?
        {
            metallic_roughness.insert("baseColorTexture".into(), Value::Object(info));
        }
        metallic_roughness.insert("metallicFactor".into(), json!(0.0));
        metallic_roughness.insert("roughnessFactor".into(), json!(0.9));
        material.insert("pbrMetallicRoughness".into(), Value::Object(metallic_roughness));
        material.insert("alphaMode".into(), json!(AlphaMode::Blend.gltf_name()));
        material.insert("doubleSided".into(), json!(false));
        self.mark_unlit(&mut material);
        Ok(material)
    }

    fn mark_unlit(&mut self, material: &mut Map<String, Value>) {
        material.insert("extensions".into(), json!({ KHR_MATERIALS_UNLIT: {} }));
        self.use_extension(KHR_MATERIALS_UNLIT);
    }
}

fn insert_alpha(
    material: &mut Map<String, Value>,
    alpha_mode: AlphaMode,
    cutoff: f32,
    issues: &mut Issues,
) {
    material.insert("alphaMode".into(), json!(alpha_mode.gltf_name()));
    if alpha_mode == AlphaMode::Clip {
        material.insert("alphaCutoff".into(), float(cutoff, issues));
    }
}

/// Read a plain glTF material.
pub(super) fn import_pbr(json: &Value, material: &Value) -> MaterialDescription {
    let texture = |path: &[crate::json::PathSegment<'_>]| {
        crate::json::lookup(material, path).and_then(|info| texture_ref_from_info(json, info))
    };
    let defaults = PbrMaterial::default();

    MaterialDescription::Pbr(PbrMaterial {
        base_color: get_f32_array(
            material,
            json_path!["pbrMetallicRoughness", "baseColorFactor"],
            defaults.base_color,
        ),
        base_color_texture: texture(json_path!["pbrMetallicRoughness", "baseColorTexture"]),
        metallic: get_f32(material, json_path!["pbrMetallicRoughness", "metallicFactor"], 1.0),
        roughness: get_f32(material, json_path!["pbrMetallicRoughness", "roughnessFactor"], 1.0),
        metallic_roughness_texture: texture(json_path![
            "pbrMetallicRoughness",
            "metallicRoughnessTexture"
        ]),
        normal_texture: texture(json_path!["normalTexture"]),
        normal_scale: get_f32(material, json_path!["normalTexture", "scale"], 1.0),
        occlusion_texture: texture(json_path!["occlusionTexture"]),
        occlusion_strength: get_f32(material, json_path!["occlusionTexture", "strength"], 1.0),
        emissive: get_f32_array(material, json_path!["emissiveFactor"], defaults.emissive),
        emissive_texture: texture(json_path!["emissiveTexture"]),
        alpha_mode: AlphaMode::from_gltf_name(get_str(material, json_path!["alphaMode"], "OPAQUE")),
        alpha_cutoff: get_f32(material, json_path!["alphaCutoff"], 0.5),
        double_sided: crate::json::get_bool(material, json_path!["doubleSided"], false),
        unlit: crate::json::lookup(material, json_path!["extensions", KHR_MATERIALS_UNLIT]).is_some(),
    })
}
