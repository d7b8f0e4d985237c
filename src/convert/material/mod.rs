//! Material parameter mapper.
//!
//! Export dispatches on [`MaterialDescription`] and the target generation;
//! import picks the representation from the document (legacy
//! `materialProperties`, `VRMC_materials_mtoon`, or plain glTF PBR).

mod mtoon0;
mod mtoon1;
mod pbr;

use std::collections::HashMap;

use serde_json::{Map, Value, json};

use super::buffer::BinaryBuilder;
use crate::error::{Issues, UNRESOLVED_REFERENCE, UNSUPPORTED_SHADER_MAPPING, VrmError};
use crate::json::{get_list, make_json, numbers};
use crate::json_path;
use crate::scene::{
    MagFilter, MaterialDescription, MinFilter, SamplerState, SceneImage, SceneMaterial,
    TextureMapping, TextureRef, VrmVersion, WrapMode,
};
use crate::texture::encode_image;

pub use mtoon1::{shading_from_vrm1, shading_to_vrm1};

pub(crate) const KHR_TEXTURE_TRANSFORM: &str = "KHR_texture_transform";
pub(crate) const KHR_MATERIALS_UNLIT: &str = "KHR_materials_unlit";
pub(crate) const VRMC_MATERIALS_MTOON: &str = "VRMC_materials_mtoon";

/// Alternative source for materials the mapper has no table for, typically
/// the host's own glTF exporter.
pub trait PbrGatherer {
    /// Return a complete glTF material object, or `None` to fall back to a
    /// placeholder.
    fn gather(&self, material: &SceneMaterial) -> Option<Value>;
}

/// One exported material: the glTF entry plus, for 0.x, the matching
/// `materialProperties` entry.
#[derive(Debug, Clone)]
pub(crate) struct ExportedMaterial {
    pub(crate) gltf: Value,
    pub(crate) legacy: Option<Value>,
}

/// Shared sampler/texture/image tables produced by a [`MaterialExporter`].
#[derive(Debug, Default)]
pub(crate) struct MaterialTables {
    pub(crate) samplers: Vec<Value>,
    pub(crate) textures: Vec<Value>,
    pub(crate) images: Vec<Value>,
    pub(crate) extensions_used: Vec<&'static str>,
}

// ─── Export ───────────────────────────────────────────────────────────────────

pub(crate) struct MaterialExporter<'a> {
    images: &'a [SceneImage],
    version: VrmVersion,
    export_extras: bool,
    tables: MaterialTables,
    sampler_index: HashMap<SamplerState, usize>,
    texture_index: HashMap<(usize, usize), usize>,
    image_index: HashMap<usize, usize>,
}

impl<'a> MaterialExporter<'a> {
    pub(crate) fn new(images: &'a [SceneImage], version: VrmVersion, export_extras: bool) -> Self {
        Self {
            images,
            version,
            export_extras,
            tables: MaterialTables::default(),
            sampler_index: HashMap::new(),
            texture_index: HashMap::new(),
            image_index: HashMap::new(),
        }
    }

    pub(crate) fn use_extension(&mut self, name: &'static str) {
        if !self.tables.extensions_used.contains(&name) {
            self.tables.extensions_used.push(name);
        }
    }

    /// glTF image index of a scene image, embedding it on first use.
    pub(crate) fn image(
        &mut self,
        scene_image: usize,
        builder: &mut BinaryBuilder,
        issues: &mut Issues,
    ) -> Result<Option<usize>, VrmError> {
        if let Some(index) = self.image_index.get(&scene_image) {
            return Ok(Some(*index));
        }
        let Some(image) = self.images.get(scene_image) else {
            issues.warn(
                UNRESOLVED_REFERENCE,
                format!("image #{scene_image} does not exist; texture dropped"),
            );
            return Ok(None);
        };

        let encoded = encode_image(&image.data)?;
        let view = builder.push_view(&encoded.bytes, None);
        self.tables.images.push(json!({
            "name": image.name,
            "bufferView": view,
            "mimeType": encoded.mime_type,
        }));
        let index = self.tables.images.len() - 1;
        self.image_index.insert(scene_image, index);
        Ok(Some(index))
    }

    fn sampler(&mut self, state: SamplerState) -> usize {
        if let Some(index) = self.sampler_index.get(&state) {
            return *index;
        }
        self.tables.samplers.push(json!({
            "magFilter": state.mag_filter.code(),
            "minFilter": state.min_filter.code(),
            "wrapS": state.wrap_s.code(),
            "wrapT": state.wrap_t.code(),
        }));
        let index = self.tables.samplers.len() - 1;
        self.sampler_index.insert(state, index);
        index
    }

    /// glTF texture index for a reference, deduplicated by (image, sampler).
    pub(crate) fn texture(
        &mut self,
        texture: &TextureRef,
        builder: &mut BinaryBuilder,
        issues: &mut Issues,
    ) -> Result<Option<usize>, VrmError> {
        let Some(image) = self.image(texture.image, builder, issues)? else {
            return Ok(None);
        };
        let sampler = self.sampler(texture.sampler);
        if let Some(index) = self.texture_index.get(&(image, sampler)) {
            return Ok(Some(*index));
        }
        self.tables.textures.push(json!({"sampler": sampler, "source": image}));
        let index = self.tables.textures.len() - 1;
        self.texture_index.insert((image, sampler), index);
        Ok(Some(index))
    }

    /// A glTF `textureInfo` object, with `KHR_texture_transform` when the
    /// reference carries a non-identity mapping.
    pub(crate) fn texture_info(
        &mut self,
        texture: Option<&TextureRef>,
        builder: &mut BinaryBuilder,
        issues: &mut Issues,
    ) -> Result<Option<Map<String, Value>>, VrmError> {
        let Some(texture) = texture else {
            return Ok(None);
        };
        let Some(index) = self.texture(texture, builder, issues)? else {
            return Ok(None);
        };

        let mut info = Map::new();
        info.insert("index".into(), json!(index));
        if texture.tex_coord != 0 {
            info.insert("texCoord".into(), json!(texture.tex_coord));
        }
        if let Some(mapping) = texture.mapping.filter(|mapping| !mapping.is_identity()) {
            let (offset, scale) = mapping.to_gltf();
            info.insert(
                "extensions".into(),
                json!({
                    KHR_TEXTURE_TRANSFORM: {
                        "offset": numbers(&offset, issues),
                        "scale": numbers(&scale, issues),
                    }
                }),
            );
            self.use_extension(KHR_TEXTURE_TRANSFORM);
        }
        Ok(Some(info))
    }

    pub(crate) fn export(
        &mut self,
        material: &SceneMaterial,
        builder: &mut BinaryBuilder,
        gatherer: Option<&dyn PbrGatherer>,
        issues: &mut Issues,
    ) -> Result<ExportedMaterial, VrmError> {
        let name = material.name.as_str();
        let mut exported = match (&material.description, self.version) {
            (MaterialDescription::Mtoon(mtoon), VrmVersion::V0) => {
                let gltf = self.export_mtoon_base(name, mtoon, true, builder, issues)?;
                let legacy = self.export_mtoon_legacy(name, mtoon, builder, issues)?;
                ExportedMaterial {
                    gltf: Value::Object(gltf),
                    legacy: Some(legacy),
                }
            }
            (MaterialDescription::Mtoon(mtoon), VrmVersion::V1) => {
                let mut gltf = self.export_mtoon_base(name, mtoon, false, builder, issues)?;
                let extension = self.export_mtoon1(mtoon, builder, issues)?;
                gltf.insert(
                    "extensions".into(),
                    json!({ VRMC_MATERIALS_MTOON: extension }),
                );
                self.use_extension(VRMC_MATERIALS_MTOON);
                ExportedMaterial {
                    gltf: Value::Object(gltf),
                    legacy: None,
                }
            }
            (MaterialDescription::Pbr(pbr), version) => ExportedMaterial {
                gltf: Value::Object(self.export_pbr(name, pbr, builder, issues)?),
                legacy: (version == VrmVersion::V0).then(|| mtoon0::gltf_shader_properties(name)),
            },
            (MaterialDescription::TransparentZWrite(material), version) => {
                let gltf = self.export_transparent_zwrite(name, material, builder, issues)?;
                let legacy = match version {
                    VrmVersion::V0 => {
                        let texture = match material.main_texture.as_ref() {
                            Some(texture) => self.texture(texture, builder, issues)?,
                            None => None,
                        };
                        Some(mtoon0::transparent_zwrite_properties(name, texture))
                    }
                    VrmVersion::V1 => None,
                };
                ExportedMaterial {
                    gltf: Value::Object(gltf),
                    legacy,
                }
            }
            (MaterialDescription::Unrecognized(unrecognized), version) => {
                let gathered = gatherer.and_then(|gatherer| gatherer.gather(material));
                issues.warn(
                    UNSUPPORTED_SHADER_MAPPING,
                    format!(
                        "material '{name}' uses unsupported shading '{}'; {}",
                        unrecognized.shader_name,
                        if gathered.is_some() {
                            "exported through the PBR gatherer"
                        } else {
                            "exported as a placeholder"
                        }
                    ),
                );
                ExportedMaterial {
                    gltf: gathered.unwrap_or_else(|| json!({ "name": name })),
                    legacy: (version == VrmVersion::V0).then(|| mtoon0::gltf_shader_properties(name)),
                }
            }
        };

        if self.export_extras
            && let (Some(extras), Some(object)) = (&material.extras, exported.gltf.as_object_mut())
        {
            object.insert("extras".into(), make_json(extras, issues));
        }
        tracing::debug!(material = name, version = self.version.as_str(), "material exported");
        Ok(exported)
    }

    pub(crate) fn finish(self) -> MaterialTables {
        self.tables
    }
}

// ─── Import ───────────────────────────────────────────────────────────────────

/// Resolve a glTF `textureInfo` back into a scene texture reference.
/// Scene images keep the glTF image numbering on import.
pub(crate) fn texture_ref_from_info(json: &Value, info: &Value) -> Option<TextureRef> {
    let index = info.get("index")?.as_u64()? as usize;
    let mut texture = texture_ref_from_index(json, index)?;
    texture.tex_coord = info.get("texCoord").and_then(Value::as_u64).unwrap_or(0) as u32;
    if let Some(transform) = info
        .get("extensions")
        .and_then(|extensions| extensions.get(KHR_TEXTURE_TRANSFORM))
    {
        let offset = crate::json::get_f32_array(transform, json_path!["offset"], [0.0, 0.0]);
        let scale = crate::json::get_f32_array(transform, json_path!["scale"], [1.0, 1.0]);
        let mapping = TextureMapping::from_gltf(offset, scale);
        texture.mapping = (!mapping.is_identity()).then_some(mapping);
    }
    Some(texture)
}

pub(crate) fn texture_ref_from_index(json: &Value, index: usize) -> Option<TextureRef> {
    let texture = get_list(json, json_path!["textures"]).get(index)?;
    let image = texture.get("source")?.as_u64()? as usize;
    let sampler = texture
        .get("sampler")
        .and_then(Value::as_u64)
        .and_then(|sampler| get_list(json, json_path!["samplers"]).get(sampler as usize))
        .map(|sampler| SamplerState {
            wrap_s: WrapMode::from_code(sampler.get("wrapS").and_then(Value::as_u64).unwrap_or(10497)),
            wrap_t: WrapMode::from_code(sampler.get("wrapT").and_then(Value::as_u64).unwrap_or(10497)),
            mag_filter: MagFilter::from_code(
                sampler.get("magFilter").and_then(Value::as_u64).unwrap_or(9729),
            ),
            min_filter: MinFilter::from_code(
                sampler.get("minFilter").and_then(Value::as_u64).unwrap_or(9987),
            ),
        })
        .unwrap_or_default();
    Some(TextureRef {
        image,
        sampler,
        mapping: None,
        tex_coord: 0,
    })
}

/// Rebuild every scene material of a document.
pub(crate) fn import_materials(json: &Value, version: VrmVersion) -> Vec<SceneMaterial> {
    let legacy_properties = get_list(json, json_path!["extensions", "VRM", "materialProperties"]);

    get_list(json, json_path!["materials"])
        .iter()
        .enumerate()
        .map(|(index, material)| {
            let name = material
                .get("name")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned)
                .unwrap_or_else(|| format!("material_{index}"));

            let legacy = match version {
                VrmVersion::V0 => legacy_properties
                    .iter()
                    .find(|properties| properties.get("name").and_then(Value::as_str) == Some(name.as_str()))
                    .or_else(|| legacy_properties.get(index)),
                VrmVersion::V1 => None,
            };
            let description = legacy
                .and_then(|properties| mtoon0::import_legacy(json, material, properties))
                .or_else(|| mtoon1::import_mtoon1(json, material))
                .unwrap_or_else(|| pbr::import_pbr(json, material));

            let mut scene_material = SceneMaterial::new(name, description);
            scene_material.extras = material.get("extras").map(crate::json::host_value);
            scene_material
        })
        .collect()
}
