//! Uniform values and texture-unit assignment.

use std::collections::HashMap;

use crate::schema::TextureUnitPolicy;

use super::{GpuError, TextureHandle, UniformKind};

/// Number of texture units a single program may use.
pub const MAX_TEXTURE_UNITS: usize = 8;

/// A value passed to a named uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    UInt(u32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Texture(TextureHandle),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            Self::Float(_) => UniformKind::Float,
            Self::Int(_) => UniformKind::Int,
            Self::UInt(_) => UniformKind::UInt,
            Self::Vec2(_) => UniformKind::Vec2,
            Self::Vec3(_) => UniformKind::Vec3,
            Self::Vec4(_) => UniformKind::Vec4,
            Self::Texture(_) => UniformKind::Texture,
        }
    }

    /// Write the value's bytes at `offset`. Textures write nothing.
    pub(crate) fn write_to(&self, block: &mut [u8], offset: usize) {
        let bytes: &[u8] = match self {
            Self::Float(v) => bytemuck::bytes_of(v),
            Self::Int(v) => bytemuck::bytes_of(v),
            Self::UInt(v) => bytemuck::bytes_of(v),
            Self::Vec2(v) => bytemuck::bytes_of(v),
            Self::Vec3(v) => bytemuck::bytes_of(v),
            Self::Vec4(v) => bytemuck::bytes_of(v),
            Self::Texture(_) => return,
        };
        block[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

/// Named uniform values for one program invocation.
///
/// Keys are unique; setting an existing name replaces its value in place.
/// Iteration follows first-insertion order, which fixes the order textures
/// are assigned to units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Uniforms {
    entries: Vec<(String, UniformValue)>,
}

impl Uniforms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: UniformValue) -> &mut Self {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    pub fn with(mut self, name: impl Into<String>, value: UniformValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn float(self, name: impl Into<String>, value: f32) -> Self {
        self.with(name, UniformValue::Float(value))
    }

    pub fn int(self, name: impl Into<String>, value: i32) -> Self {
        self.with(name, UniformValue::Int(value))
    }

    pub fn vec2(self, name: impl Into<String>, value: [f32; 2]) -> Self {
        self.with(name, UniformValue::Vec2(value))
    }

    pub fn texture(self, name: impl Into<String>, texture: TextureHandle) -> Self {
        self.with(name, UniformValue::Texture(texture))
    }

    pub fn get(&self, name: &str) -> Option<UniformValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Texture entries, in iteration order.
    pub fn textures(&self) -> impl Iterator<Item = (&str, TextureHandle)> {
        self.entries.iter().filter_map(|(n, v)| match v {
            UniformValue::Texture(t) => Some((n.as_str(), *t)),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-program texture-unit table.
///
/// Mirrors the classic GL model: each unit holds one texture and each sampler
/// points at a unit. A draw reads through the sampler's unit, so rebinding a
/// unit changes what every sampler pointing at it sees.
#[derive(Debug, Clone)]
pub struct TextureUnits {
    policy: TextureUnitPolicy,
    units: [Option<TextureHandle>; MAX_TEXTURE_UNITS],
    samplers: HashMap<String, usize>,
    next_unit: usize,
}

impl TextureUnits {
    pub fn new(policy: TextureUnitPolicy) -> Self {
        Self {
            policy,
            units: [None; MAX_TEXTURE_UNITS],
            samplers: HashMap::new(),
            next_unit: 0,
        }
    }

    pub fn policy(&self) -> TextureUnitPolicy {
        self.policy
    }

    /// Assign `textures` to units in order and point each sampler at its unit.
    ///
    /// Returns the unit chosen for each sampler. Nothing changes on error.
    pub fn bind<'a>(
        &mut self,
        textures: impl IntoIterator<Item = (&'a str, TextureHandle)>,
    ) -> Result<Vec<(String, usize)>, GpuError> {
        let textures: Vec<_> = textures.into_iter().collect();

        let required = match self.policy {
            TextureUnitPolicy::Counting => textures.len(),
            TextureUnitPolicy::Cached => {
                let new_names = textures
                    .iter()
                    .filter(|(name, _)| !self.samplers.contains_key(*name))
                    .count();
                self.next_unit + new_names
            }
        };
        if required > MAX_TEXTURE_UNITS {
            return Err(GpuError::TextureUnitsExhausted {
                limit: MAX_TEXTURE_UNITS,
            });
        }

        let mut assigned = Vec::with_capacity(textures.len());
        let mut counter = 0;
        for (name, texture) in textures {
            let unit = match self.policy {
                TextureUnitPolicy::Counting => {
                    let unit = counter;
                    counter += 1;
                    unit
                }
                TextureUnitPolicy::Cached => match self.samplers.get(name) {
                    Some(&unit) => unit,
                    None => {
                        let unit = self.next_unit;
                        self.next_unit += 1;
                        unit
                    }
                },
            };

            if self.units[unit].is_some_and(|old| old != texture) {
                for (other, _) in self.samplers.iter().filter(|(n, u)| **u == unit && *n != name) {
                    log::warn!(
                        "Texture unit {unit} rebound for {name}; sampler {other} now reads the new texture"
                    );
                }
            }

            self.units[unit] = Some(texture);
            self.samplers.insert(name.to_string(), unit);
            assigned.push((name.to_string(), unit));
        }

        Ok(assigned)
    }

    pub fn unit_of(&self, sampler: &str) -> Option<usize> {
        self.samplers.get(sampler).copied()
    }

    /// Texture currently visible to `sampler` through its unit.
    pub fn texture_for(&self, sampler: &str) -> Option<TextureHandle> {
        self.unit_of(sampler).and_then(|unit| self.units[unit])
    }

    /// Forget units bound to `texture`.
    pub(crate) fn release(&mut self, texture: TextureHandle) {
        for unit in self.units.iter_mut() {
            if *unit == Some(texture) {
                *unit = None;
            }
        }
    }
}
