use nalgebra::Vector3;
use serde_json::{Map, Value, json};

use crate::error::Issues;
use crate::json::numbers;

pub(crate) const COMPONENT_UNSIGNED_SHORT: u32 = 5123;
pub(crate) const COMPONENT_UNSIGNED_INT: u32 = 5125;
pub(crate) const COMPONENT_FLOAT: u32 = 5126;

pub(crate) const TARGET_ARRAY_BUFFER: u32 = 34962;
pub(crate) const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;

/// Owner of the single binary blob and of the bufferView/accessor tables.
///
/// Every accessor gets its own tightly packed buffer view, so accessor
/// `byteOffset` is always zero. Views start on 4-byte boundaries.
#[derive(Debug, Default)]
pub(crate) struct BinaryBuilder {
    bin: Vec<u8>,
    buffer_views: Vec<Value>,
    accessors: Vec<Value>,
}

impl BinaryBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn align(&mut self) {
        let padding = crate::glb::padding_for(self.bin.len());
        self.bin.resize(self.bin.len() + padding, 0);
    }

    /// Append raw bytes as a new buffer view and return its index.
    pub(crate) fn push_view(&mut self, bytes: &[u8], target: Option<u32>) -> usize {
        self.align();
        let byte_offset = self.bin.len();
        self.bin.extend_from_slice(bytes);

        let mut view = Map::new();
        view.insert("buffer".into(), json!(0));
        view.insert("byteOffset".into(), json!(byte_offset));
        view.insert("byteLength".into(), json!(bytes.len()));
        if let Some(target) = target {
            view.insert("target".into(), json!(target));
        }
        self.buffer_views.push(Value::Object(view));
        self.buffer_views.len() - 1
    }

    fn push_accessor(
        &mut self,
        buffer_view: usize,
        component_type: u32,
        count: usize,
        accessor_type: &str,
        bounds: Option<(Value, Value)>,
    ) -> usize {
        let mut accessor = Map::new();
        accessor.insert("bufferView".into(), json!(buffer_view));
        accessor.insert("byteOffset".into(), json!(0));
        accessor.insert("componentType".into(), json!(component_type));
        accessor.insert("count".into(), json!(count));
        accessor.insert("type".into(), json!(accessor_type));
        if let Some((min, max)) = bounds {
            accessor.insert("min".into(), min);
            accessor.insert("max".into(), max);
        }
        self.accessors.push(Value::Object(accessor));
        self.accessors.len() - 1
    }

    /// Float VEC3 accessor. `bounds` adds componentwise min/max.
    pub(crate) fn add_vec3(
        &mut self,
        values: &[Vector3<f32>],
        bounds: Option<&Bounds>,
        issues: &mut Issues,
    ) -> usize {
        let bytes = f32_bytes(values.iter().flat_map(|value| value.iter()));
        let view = self.push_view(&bytes, Some(TARGET_ARRAY_BUFFER));
        let bounds = bounds.map(|bounds| bounds.to_json(issues));
        self.push_accessor(view, COMPONENT_FLOAT, values.len(), "VEC3", bounds)
    }

    pub(crate) fn add_vec2(&mut self, values: &[[f32; 2]]) -> usize {
        let bytes = f32_bytes(values.iter().flatten());
        let view = self.push_view(&bytes, Some(TARGET_ARRAY_BUFFER));
        self.push_accessor(view, COMPONENT_FLOAT, values.len(), "VEC2", None)
    }

    pub(crate) fn add_vec4(&mut self, values: &[[f32; 4]]) -> usize {
        let bytes = f32_bytes(values.iter().flatten());
        let view = self.push_view(&bytes, Some(TARGET_ARRAY_BUFFER));
        self.push_accessor(view, COMPONENT_FLOAT, values.len(), "VEC4", None)
    }

    pub(crate) fn add_joints(&mut self, values: &[[u16; 4]]) -> usize {
        let bytes: Vec<u8> = values
            .iter()
            .flatten()
            .flat_map(|value| value.to_le_bytes())
            .collect();
        let view = self.push_view(&bytes, Some(TARGET_ARRAY_BUFFER));
        self.push_accessor(view, COMPONENT_UNSIGNED_SHORT, values.len(), "VEC4", None)
    }

    pub(crate) fn add_indices(&mut self, indices: &[u32]) -> usize {
        let bytes: Vec<u8> = indices.iter().flat_map(|value| value.to_le_bytes()).collect();
        let view = self.push_view(&bytes, Some(TARGET_ELEMENT_ARRAY_BUFFER));
        self.push_accessor(view, COMPONENT_UNSIGNED_INT, indices.len(), "SCALAR", None)
    }

    /// Column-major MAT4 accessor (inverse bind matrices, no view target).
    pub(crate) fn add_mat4(&mut self, matrices: &[[f32; 16]]) -> usize {
        let bytes = f32_bytes(matrices.iter().flatten());
        let view = self.push_view(&bytes, None);
        self.push_accessor(view, COMPONENT_FLOAT, matrices.len(), "MAT4", None)
    }

    #[cfg(test)]
    pub(crate) fn accessor_count(&self) -> usize {
        self.accessors.len()
    }

    pub(crate) fn finish(self) -> (Vec<Value>, Vec<Value>, Vec<u8>) {
        (self.buffer_views, self.accessors, self.bin)
    }
}

fn f32_bytes<'a>(values: impl Iterator<Item = &'a f32>) -> Vec<u8> {
    values.flat_map(|value| value.to_le_bytes()).collect()
}

/// Running componentwise extent of a VEC3 stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Bounds {
    pub(crate) min: Vector3<f32>,
    pub(crate) max: Vector3<f32>,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: Vector3::repeat(f32::INFINITY),
            max: Vector3::repeat(f32::NEG_INFINITY),
        }
    }
}

impl Bounds {
    pub(crate) fn include(&mut self, value: &Vector3<f32>) {
        self.min = self.min.inf(value);
        self.max = self.max.sup(value);
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, value: &Vector3<f32>) -> bool {
        self.min <= *value && *value <= self.max
    }

    fn to_json(self, issues: &mut Issues) -> (Value, Value) {
        (numbers(self.min.as_slice(), issues), numbers(self.max.as_slice(), issues))
    }
}
