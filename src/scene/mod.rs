//! Immutable scene snapshot exchanged with the host.
//!
//! Export consumes a [`SceneInput`]; import produces one. Coordinates are in
//! the host convention (right-handed, Z up); the converter applies the axis
//! change on the way in and out.

mod material;
mod metadata;

use serde::{Deserialize, Serialize};

use crate::json::HostValue;

pub use material::{
    AlphaMode, CullMode, MaterialDescription, MinFilter, MagFilter, MtoonMaterial,
    OutlineColorMode, OutlineWidthMode, PbrMaterial, SamplerState, TextureMapping, TextureRef,
    TransparentZWriteMaterial, UnrecognizedMaterial, WrapMode,
};
pub use metadata::{
    AvatarMeta, AvatarPermission, ColliderGroup, CommercialUsage, CreditNotation, Expression,
    ExpressionOverride, ExpressionPreset, FirstPerson, FirstPersonFlag, Humanoid, LookAt,
    LookAtKind, LookAtRangeMap, MaterialColorBind, MaterialColorKind, MeshAnnotation,
    Modification, MorphTargetBind, SphereCollider, SpringBone, SpringGroup, TextureTransformBind,
    VrmMetadata, VrmVersion,
};

/// Everything the converter needs from the host, passed by reference.
#[derive(Debug, Clone, Default)]
pub struct SceneInput {
    pub objects: Vec<SceneObject>,
    pub materials: Vec<SceneMaterial>,
    pub images: Vec<SceneImage>,
    pub metadata: VrmMetadata,
}

impl SceneInput {
    pub fn armatures(&self) -> impl Iterator<Item = &Armature> {
        self.objects.iter().filter_map(|object| match object {
            SceneObject::Armature(armature) => Some(armature),
            _ => None,
        })
    }

    pub fn meshes(&self) -> impl Iterator<Item = &MeshObject> {
        self.objects.iter().filter_map(|object| match object {
            SceneObject::Mesh(mesh) => Some(mesh),
            _ => None,
        })
    }

    pub fn material_index(&self, name: &str) -> Option<usize> {
        self.materials
            .iter()
            .position(|material| material.name == name)
    }
}

/// One exportable host object.
#[derive(Debug, Clone)]
pub enum SceneObject {
    Armature(Armature),
    Mesh(MeshObject),
    Other(EmptyObject),
}

#[derive(Debug, Clone, Default)]
pub struct Armature {
    pub name: String,
    /// Bones in any order; `parent` indexes into this list.
    pub bones: Vec<Bone>,
}

impl Armature {
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|bone| bone.name == name)
    }

    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(|(_, bone)| bone.parent.is_none())
            .map(|(index, _)| index)
    }

    pub fn children_of(&self, parent: usize) -> impl Iterator<Item = usize> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(move |(_, bone)| bone.parent == Some(parent))
            .map(|(index, _)| index)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    pub parent: Option<usize>,
    /// World-space head position.
    pub head: [f32; 3],
}

#[derive(Debug, Clone, Default)]
pub struct MeshObject {
    pub name: String,
    /// World-space object origin. Vertex positions are relative to it.
    pub origin: [f32; 3],
    /// Rigid attachment to a bone. Ignored for skinned meshes.
    pub parent_bone: Option<String>,
    pub positions: Vec<[f32; 3]>,
    pub faces: Vec<Face>,
    /// Scene material index per slot; `None` leaves the primitive without a
    /// material.
    pub material_slots: Vec<Option<usize>>,
    /// Vertex group names; groups named after bones drive skinning.
    pub vertex_groups: Vec<String>,
    /// Per vertex `(vertex group index, weight)` pairs.
    pub vertex_weights: Vec<Vec<(usize, f32)>>,
    /// Shape keys; the first one is the reference shape.
    pub shape_keys: Vec<ShapeKey>,
    pub extras: Option<HostValue>,
}

impl MeshObject {
    pub fn is_skinned(&self) -> bool {
        !self.vertex_groups.is_empty()
    }

    /// Morph targets exported for this mesh: every shape key after the
    /// reference one.
    pub fn morph_targets(&self) -> &[ShapeKey] {
        self.shape_keys.get(1..).unwrap_or(&[])
    }

    pub fn uv_layer_count(&self) -> usize {
        self.faces
            .iter()
            .flat_map(|face| face.loops.iter())
            .map(|corner| corner.uvs.len())
            .max()
            .unwrap_or(0)
    }
}

/// A polygon; n-gons are fan-triangulated on export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Face {
    pub material_slot: usize,
    pub loops: Vec<Loop>,
}

/// One face corner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Loop {
    pub vertex: usize,
    pub normal: [f32; 3],
    /// One coordinate pair per UV layer, V pointing up.
    pub uvs: Vec<[f32; 2]>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeKey {
    pub name: String,
    /// Absolute positions, same frame as [`MeshObject::positions`].
    pub positions: Vec<[f32; 3]>,
}

/// Non-mesh, non-armature object exported as a plain transform node.
#[derive(Debug, Clone, Default)]
pub struct EmptyObject {
    pub name: String,
    pub origin: [f32; 3],
    pub parent_bone: Option<String>,
    pub extras: Option<HostValue>,
}

#[derive(Debug, Clone)]
pub struct SceneMaterial {
    pub name: String,
    pub description: MaterialDescription,
    /// When false, faces using this material are left out of morph-target
    /// normal computation.
    pub export_shape_key_normals: bool,
    pub extras: Option<HostValue>,
}

impl SceneMaterial {
    pub fn new(name: impl Into<String>, description: MaterialDescription) -> Self {
        Self {
            name: name.into(),
            description,
            export_shape_key_normals: true,
            extras: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneImage {
    pub name: String,
    pub data: ImageData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImageData {
    /// Already-encoded file contents (PNG, JPEG, ...).
    Encoded { mime_type: String, bytes: Vec<u8> },
    /// Raw RGBA8 pixels, PNG-encoded on export.
    Rgba8 {
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    },
}
