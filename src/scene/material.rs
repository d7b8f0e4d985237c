use serde::{Deserialize, Serialize};

/// Shading model of a material, decided once by the host before export.
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialDescription {
    /// Toon material with the legacy vendor property set.
    Mtoon(Box<MtoonMaterial>),
    /// glTF metallic-roughness material, optionally unlit.
    Pbr(PbrMaterial),
    /// Unlit, alpha blended, depth writing material with a single texture.
    TransparentZWrite(TransparentZWriteMaterial),
    /// Anything the mapper has no table for.
    Unrecognized(UnrecognizedMaterial),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Clip,
    Blend,
}

impl AlphaMode {
    pub fn gltf_name(self) -> &'static str {
        match self {
            AlphaMode::Opaque => "OPAQUE",
            AlphaMode::Clip => "MASK",
            AlphaMode::Blend => "BLEND",
        }
    }

    pub fn from_gltf_name(name: &str) -> Self {
        match name {
            "MASK" => AlphaMode::Clip,
            "BLEND" => AlphaMode::Blend,
            _ => AlphaMode::Opaque,
        }
    }
}

/// Face culling, numbered like the legacy `_CullMode` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullMode {
    Off = 0,
    Front = 1,
    #[default]
    Back = 2,
}

impl CullMode {
    pub fn from_code(code: f64) -> Self {
        match code.round() as i64 {
            0 => CullMode::Off,
            1 => CullMode::Front,
            _ => CullMode::Back,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutlineWidthMode {
    #[default]
    None = 0,
    World = 1,
    Screen = 2,
}

impl OutlineWidthMode {
    pub fn from_code(code: f64) -> Self {
        match code.round() as i64 {
            1 => OutlineWidthMode::World,
            2 => OutlineWidthMode::Screen,
            _ => OutlineWidthMode::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutlineColorMode {
    #[default]
    Fixed = 0,
    Mixed = 1,
}

impl OutlineColorMode {
    pub fn from_code(code: f64) -> Self {
        if code.round() as i64 == 1 {
            OutlineColorMode::Mixed
        } else {
            OutlineColorMode::Fixed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    #[default]
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

impl WrapMode {
    pub fn code(self) -> u32 {
        match self {
            WrapMode::Repeat => 10497,
            WrapMode::ClampToEdge => 33071,
            WrapMode::MirroredRepeat => 33648,
        }
    }

    pub fn from_code(code: u64) -> Self {
        match code {
            33071 => WrapMode::ClampToEdge,
            33648 => WrapMode::MirroredRepeat,
            _ => WrapMode::Repeat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MagFilter {
    Nearest,
    #[default]
    Linear,
}

impl MagFilter {
    pub fn code(self) -> u32 {
        match self {
            MagFilter::Nearest => 9728,
            MagFilter::Linear => 9729,
        }
    }

    pub fn from_code(code: u64) -> Self {
        if code == 9728 {
            MagFilter::Nearest
        } else {
            MagFilter::Linear
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MinFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    #[default]
    LinearMipmapLinear,
}

impl MinFilter {
    pub fn code(self) -> u32 {
        match self {
            MinFilter::Nearest => 9728,
            MinFilter::Linear => 9729,
            MinFilter::NearestMipmapNearest => 9984,
            MinFilter::LinearMipmapNearest => 9985,
            MinFilter::NearestMipmapLinear => 9986,
            MinFilter::LinearMipmapLinear => 9987,
        }
    }

    pub fn from_code(code: u64) -> Self {
        match code {
            9728 => MinFilter::Nearest,
            9729 => MinFilter::Linear,
            9984 => MinFilter::NearestMipmapNearest,
            9985 => MinFilter::LinearMipmapNearest,
            9986 => MinFilter::NearestMipmapLinear,
            _ => MinFilter::LinearMipmapLinear,
        }
    }
}

/// Wrap and filter state of one texture reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerState {
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub mag_filter: MagFilter,
    pub min_filter: MinFilter,
}

/// Host texture-coordinate mapping (location/scale with V pointing up).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureMapping {
    pub location: [f32; 2],
    pub scale: [f32; 2],
}

impl TextureMapping {
    /// `KHR_texture_transform` offset and scale for this mapping.
    pub fn to_gltf(self) -> ([f32; 2], [f32; 2]) {
        let offset = [
            self.location[0],
            1.0 - self.location[1] - self.scale[1],
        ];
        (offset, self.scale)
    }

    pub fn from_gltf(offset: [f32; 2], scale: [f32; 2]) -> Self {
        Self {
            location: [offset[0], 1.0 - offset[1] - scale[1]],
            scale,
        }
    }

    pub fn is_identity(self) -> bool {
        self.location == [0.0, 0.0] && self.scale == [1.0, 1.0]
    }
}

/// Reference from a material slot to a scene image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureRef {
    pub image: usize,
    pub sampler: SamplerState,
    pub mapping: Option<TextureMapping>,
    pub tex_coord: u32,
}

impl TextureRef {
    pub fn new(image: usize) -> Self {
        Self {
            image,
            sampler: SamplerState::default(),
            mapping: None,
            tex_coord: 0,
        }
    }
}

/// Toon material slots. Field comments name the legacy property each one
/// is stored in.
#[derive(Debug, Clone, PartialEq)]
pub struct MtoonMaterial {
    /// `_BlendMode`, `_SrcBlend`, `_DstBlend`, `_ZWrite`, render queue.
    pub alpha_mode: AlphaMode,
    pub transparent_with_z_write: bool,
    /// Added to the base queue of transparent modes.
    pub render_queue_offset: i32,
    /// `_Cutoff`
    pub alpha_cutoff: f32,
    /// `_CullMode`
    pub cull_mode: CullMode,

    /// `_Color`
    pub color: [f32; 4],
    /// `_MainTex`
    pub main_texture: Option<TextureRef>,
    /// `_ShadeColor`
    pub shade_color: [f32; 3],
    /// `_ShadeTexture`
    pub shade_texture: Option<TextureRef>,
    /// `_BumpMap`
    pub normal_texture: Option<TextureRef>,
    /// `_BumpScale`
    pub normal_scale: f32,
    /// `_ReceiveShadowRate`
    pub receive_shadow_rate: f32,
    /// `_ReceiveShadowTexture`
    pub receive_shadow_texture: Option<TextureRef>,
    /// `_ShadingGradeRate`
    pub shading_grade_rate: f32,
    /// `_ShadingGradeTexture`
    pub shading_grade_texture: Option<TextureRef>,
    /// `_ShadeShift`
    pub shade_shift: f32,
    /// `_ShadeToony`
    pub shade_toony: f32,
    /// `_LightColorAttenuation`
    pub light_color_attenuation: f32,
    /// `_IndirectLightIntensity`
    pub indirect_light_intensity: f32,

    /// `_RimColor`
    pub rim_color: [f32; 3],
    /// `_RimTexture`
    pub rim_texture: Option<TextureRef>,
    /// `_RimLightingMix`
    pub rim_lighting_mix: f32,
    /// `_RimFresnelPower`
    pub rim_fresnel_power: f32,
    /// `_RimLift`
    pub rim_lift: f32,
    /// `_SphereAdd`
    pub sphere_add_texture: Option<TextureRef>,

    /// `_EmissionColor`
    pub emission_color: [f32; 3],
    /// `_EmissionMap`
    pub emission_texture: Option<TextureRef>,

    /// `_OutlineWidthMode`
    pub outline_width_mode: OutlineWidthMode,
    /// `_OutlineWidth`, centimetres (world) or percent of screen height.
    pub outline_width: f32,
    /// `_OutlineWidthTexture`
    pub outline_width_texture: Option<TextureRef>,
    /// `_OutlineScaledMaxDistance`
    pub outline_scaled_max_distance: f32,
    /// `_OutlineColorMode`
    pub outline_color_mode: OutlineColorMode,
    /// `_OutlineColor`
    pub outline_color: [f32; 3],
    /// `_OutlineLightingMix`
    pub outline_lighting_mix: f32,
    /// `_OutlineCullMode`
    pub outline_cull_mode: CullMode,

    /// `_UvAnimMaskTexture`
    pub uv_animation_mask_texture: Option<TextureRef>,
    /// `_UvAnimScrollX`
    pub uv_animation_scroll_x: f32,
    /// `_UvAnimScrollY`
    pub uv_animation_scroll_y: f32,
    /// `_UvAnimRotation`
    pub uv_animation_rotation: f32,
}

impl Default for MtoonMaterial {
    fn default() -> Self {
        Self {
            alpha_mode: AlphaMode::Opaque,
            transparent_with_z_write: false,
            render_queue_offset: 0,
            alpha_cutoff: 0.5,
            cull_mode: CullMode::Back,
            color: [1.0, 1.0, 1.0, 1.0],
            main_texture: None,
            shade_color: [0.97, 0.81, 0.86],
            shade_texture: None,
            normal_texture: None,
            normal_scale: 1.0,
            receive_shadow_rate: 1.0,
            receive_shadow_texture: None,
            shading_grade_rate: 1.0,
            shading_grade_texture: None,
            shade_shift: 0.0,
            shade_toony: 0.9,
            light_color_attenuation: 0.0,
            indirect_light_intensity: 0.1,
            rim_color: [0.0, 0.0, 0.0],
            rim_texture: None,
            rim_lighting_mix: 0.0,
            rim_fresnel_power: 1.0,
            rim_lift: 0.0,
            sphere_add_texture: None,
            emission_color: [0.0, 0.0, 0.0],
            emission_texture: None,
            outline_width_mode: OutlineWidthMode::None,
            outline_width: 0.5,
            outline_width_texture: None,
            outline_scaled_max_distance: 1.0,
            outline_color_mode: OutlineColorMode::Fixed,
            outline_color: [0.0, 0.0, 0.0],
            outline_lighting_mix: 1.0,
            outline_cull_mode: CullMode::Front,
            uv_animation_mask_texture: None,
            uv_animation_scroll_x: 0.0,
            uv_animation_scroll_y: 0.0,
            uv_animation_rotation: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PbrMaterial {
    pub base_color: [f32; 4],
    pub base_color_texture: Option<TextureRef>,
    pub metallic: f32,
    pub roughness: f32,
    pub metallic_roughness_texture: Option<TextureRef>,
    pub normal_texture: Option<TextureRef>,
    pub normal_scale: f32,
    pub occlusion_texture: Option<TextureRef>,
    pub occlusion_strength: f32,
    pub emissive: [f32; 3],
    pub emissive_texture: Option<TextureRef>,
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: f32,
    pub double_sided: bool,
    pub unlit: bool,
}

impl Default for PbrMaterial {
    fn default() -> Self {
        Self {
            base_color: [1.0, 1.0, 1.0, 1.0],
            base_color_texture: None,
            metallic: 1.0,
            roughness: 1.0,
            metallic_roughness_texture: None,
            normal_texture: None,
            normal_scale: 1.0,
            occlusion_texture: None,
            occlusion_strength: 1.0,
            emissive: [0.0, 0.0, 0.0],
            emissive_texture: None,
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.5,
            double_sided: false,
            unlit: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransparentZWriteMaterial {
    pub main_texture: Option<TextureRef>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnrecognizedMaterial {
    /// Host description of the shading setup, used in diagnostics.
    pub shader_name: String,
}
