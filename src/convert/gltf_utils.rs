use std::collections::HashMap;

use nalgebra::Vector3;
use serde_json::Value;

use crate::scene::VrmVersion;

// ─── Axis conversion ──────────────────────────────────────────────────────────

/// Host (right-handed, Z up) to glTF (right-handed, Y up).
///
/// Legacy avatars face -Z, newer ones face +Z, so the horizontal axes flip
/// differently per generation.
pub(crate) fn to_gltf_axes(value: impl Into<Vector3<f32>>, version: VrmVersion) -> Vector3<f32> {
    let v = value.into();
    match version {
        VrmVersion::V0 => Vector3::new(-v.x, v.z, v.y),
        VrmVersion::V1 => Vector3::new(v.x, v.z, -v.y),
    }
}

/// Inverse of [`to_gltf_axes`].
pub(crate) fn from_gltf_axes(value: impl Into<Vector3<f32>>, version: VrmVersion) -> Vector3<f32> {
    let v = value.into();
    match version {
        VrmVersion::V0 => Vector3::new(-v.x, v.z, v.y),
        VrmVersion::V1 => Vector3::new(v.x, -v.z, v.y),
    }
}

/// Spring parameter vectors (collider offsets, gravity direction). The
/// legacy block stores them in the left-handed runtime space.
pub(crate) fn to_spring_axes(value: impl Into<Vector3<f32>>, version: VrmVersion) -> Vector3<f32> {
    let v = value.into();
    match version {
        VrmVersion::V0 => Vector3::new(v.x, v.z, v.y),
        VrmVersion::V1 => Vector3::new(v.x, v.z, -v.y),
    }
}

pub(crate) fn from_spring_axes(value: impl Into<Vector3<f32>>, version: VrmVersion) -> Vector3<f32> {
    let v = value.into();
    match version {
        VrmVersion::V0 => Vector3::new(v.x, v.z, v.y),
        VrmVersion::V1 => Vector3::new(v.x, -v.z, v.y),
    }
}

// ─── Accessor metadata ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub(crate) struct AccessorMeta {
    pub(crate) base_offset: usize,
    pub(crate) stride: usize,
    pub(crate) count: usize,
    pub(crate) component_type: u64,
    pub(crate) component_count: usize,
    pub(crate) normalized: bool,
}

impl AccessorMeta {
    fn component_size(&self) -> usize {
        match self.component_type {
            5120 | 5121 => 1,
            5122 | 5123 => 2,
            _ => 4,
        }
    }
}

pub(crate) fn accessor_meta(json: &Value, accessor_index: usize) -> Option<AccessorMeta> {
    let accessor = json.get("accessors")?.as_array()?.get(accessor_index)?;
    let buffer_view_index = accessor.get("bufferView")?.as_u64()? as usize;
    let buffer_view = json.get("bufferViews")?.as_array()?.get(buffer_view_index)?;

    let component_count = match accessor.get("type")?.as_str()? {
        "SCALAR" => 1,
        "VEC2" => 2,
        "VEC3" => 3,
        "VEC4" => 4,
        "MAT4" => 16,
        _ => return None,
    };

    let component_type = accessor.get("componentType")?.as_u64()?;
    let component_size = match component_type {
        5120 | 5121 => 1,
        5122 | 5123 => 2,
        5125 | 5126 => 4,
        _ => return None,
    };

    let view_offset = buffer_view
        .get("byteOffset")
        .and_then(Value::as_u64)
        .unwrap_or(0) as usize;
    let accessor_offset = accessor
        .get("byteOffset")
        .and_then(Value::as_u64)
        .unwrap_or(0) as usize;
    let stride = buffer_view
        .get("byteStride")
        .and_then(Value::as_u64)
        .map(|value| value as usize)
        .unwrap_or(component_count * component_size);

    Some(AccessorMeta {
        base_offset: view_offset + accessor_offset,
        stride,
        count: accessor.get("count")?.as_u64()? as usize,
        component_type,
        component_count,
        normalized: accessor
            .get("normalized")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}

fn read_component(bin: &[u8], meta: &AccessorMeta, element: usize, lane: usize) -> Option<f64> {
    let offset = meta.base_offset + element * meta.stride + lane * meta.component_size();
    let value = match meta.component_type {
        5120 => {
            let raw = *bin.get(offset)? as i8;
            if meta.normalized {
                (raw as f64 / 127.0).max(-1.0)
            } else {
                raw as f64
            }
        }
        5121 => {
            let raw = *bin.get(offset)?;
            if meta.normalized {
                raw as f64 / 255.0
            } else {
                raw as f64
            }
        }
        5122 => {
            let bytes = bin.get(offset..offset + 2)?;
            let raw = i16::from_le_bytes([bytes[0], bytes[1]]);
            if meta.normalized {
                (raw as f64 / 32767.0).max(-1.0)
            } else {
                raw as f64
            }
        }
        5123 => {
            let bytes = bin.get(offset..offset + 2)?;
            let raw = u16::from_le_bytes([bytes[0], bytes[1]]);
            if meta.normalized {
                raw as f64 / 65535.0
            } else {
                raw as f64
            }
        }
        5125 => {
            let bytes = bin.get(offset..offset + 4)?;
            u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
        }
        5126 => {
            let bytes = bin.get(offset..offset + 4)?;
            f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
        }
        _ => return None,
    };
    Some(value)
}

/// Read an accessor as float tuples. Returns `None` when the accessor is
/// missing, has a different width, or runs past the end of the blob.
pub(crate) fn read_f32_elements<const N: usize>(
    json: &Value,
    bin: &[u8],
    accessor_index: usize,
) -> Option<Vec<[f32; N]>> {
    let meta = accessor_meta(json, accessor_index)?;
    if meta.component_count != N {
        return None;
    }
    (0..meta.count)
        .map(|element| {
            let mut out = [0.0f32; N];
            for (lane, slot) in out.iter_mut().enumerate() {
                *slot = read_component(bin, &meta, element, lane)? as f32;
            }
            Some(out)
        })
        .collect()
}

/// Read an integer accessor (indices, joints) element by element.
pub(crate) fn read_u32_elements<const N: usize>(
    json: &Value,
    bin: &[u8],
    accessor_index: usize,
) -> Option<Vec<[u32; N]>> {
    let meta = accessor_meta(json, accessor_index)?;
    if meta.component_count != N || !matches!(meta.component_type, 5121 | 5123 | 5125) {
        return None;
    }
    (0..meta.count)
        .map(|element| {
            let mut out = [0u32; N];
            for (lane, slot) in out.iter_mut().enumerate() {
                *slot = read_component(bin, &meta, element, lane)? as u32;
            }
            Some(out)
        })
        .collect()
}

pub(crate) fn read_indices(json: &Value, bin: &[u8], accessor_index: usize) -> Option<Vec<u32>> {
    read_u32_elements::<1>(json, bin, accessor_index)
        .map(|items| items.into_iter().map(|[index]| index).collect())
}

/// Slice of the blob covered by a buffer view.
pub(crate) fn buffer_view_bytes<'b>(json: &Value, bin: &'b [u8], view_index: usize) -> Option<&'b [u8]> {
    let view = json.get("bufferViews")?.as_array()?.get(view_index)?;
    let offset = view.get("byteOffset").and_then(Value::as_u64).unwrap_or(0) as usize;
    let length = view.get("byteLength")?.as_u64()? as usize;
    bin.get(offset..offset.checked_add(length)?)
}

// ─── Node hierarchy helpers ───────────────────────────────────────────────────

/// Collect child→parent node index mapping from glTF JSON.
pub(crate) fn collect_parent_index_map(json: &Value) -> HashMap<usize, usize> {
    let mut parent_map = HashMap::<usize, usize>::new();
    let Some(nodes) = json.get("nodes").and_then(Value::as_array) else {
        return parent_map;
    };

    for (parent_index, node) in nodes.iter().enumerate() {
        let Some(children) = node.get("children").and_then(Value::as_array) else {
            continue;
        };
        for child in children {
            if let Some(child_index) = child.as_u64().map(|value| value as usize) {
                parent_map.insert(child_index, parent_index);
            }
        }
    }

    parent_map
}
