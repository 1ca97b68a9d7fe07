//! Typed constant substitution for shader sources.
//!
//! Sources mark substitution points with `#{NAME}`. Each name must be
//! defined with a typed value, which is written out as a WGSL literal of
//! that type.

use std::collections::{BTreeMap, BTreeSet};

use super::GpuError;

/// A constant value spliced into shader source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShaderConstant {
    U32(u32),
    I32(i32),
    F32(f32),
}

impl ShaderConstant {
    /// WGSL literal for this value.
    pub fn to_wgsl(&self) -> String {
        match self {
            Self::U32(v) => format!("{v}u"),
            // `-2147483648i` negates an out-of-range literal.
            Self::I32(i32::MIN) => "(-2147483647i - 1i)".to_string(),
            Self::I32(v) => format!("{v}i"),
            // `{:?}` keeps a decimal point on whole numbers (`2.0`, not `2`).
            Self::F32(v) => format!("{v:?}"),
        }
    }
}

/// Named constants for one preprocessing pass.
#[derive(Debug, Clone, Default)]
pub struct ShaderDefines {
    values: BTreeMap<String, ShaderConstant>,
}

impl ShaderDefines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) a constant.
    pub fn define(mut self, name: impl Into<String>, value: ShaderConstant) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<ShaderConstant> {
        self.values.get(name).copied()
    }

    /// Substitute every `#{NAME}` in `source`.
    pub fn apply(&self, source: &str) -> Result<String, GpuError> {
        let mut out = String::with_capacity(source.len());
        let mut used = BTreeSet::new();
        let mut rest = source;

        while let Some(start) = rest.find("#{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find('}').ok_or_else(|| GpuError::ShaderCompile {
                log: format!("unterminated placeholder at byte {}", source.len() - rest.len() + start),
            })?;
            let name = &after[..end];
            if !is_identifier(name) {
                return Err(GpuError::ShaderCompile {
                    log: format!("malformed placeholder #{{{name}}}"),
                });
            }
            let value = self.get(name).ok_or_else(|| GpuError::ShaderCompile {
                log: format!("undefined placeholder #{{{name}}}"),
            })?;
            out.push_str(&value.to_wgsl());
            used.insert(name);
            rest = &after[end + 1..];
        }
        out.push_str(rest);

        for name in self.values.keys() {
            if !used.contains(name.as_str()) {
                log::warn!("Shader define {name} is not referenced by the source");
            }
        }

        Ok(out)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_typed_literals() {
        assert_eq!(ShaderConstant::U32(256).to_wgsl(), "256u");
        assert_eq!(ShaderConstant::I32(-3).to_wgsl(), "-3i");
        assert_eq!(ShaderConstant::F32(2.0).to_wgsl(), "2.0");
        assert_eq!(ShaderConstant::F32(0.5).to_wgsl(), "0.5");
    }

    #[test]
    fn test_i32_min_is_valid_wgsl() {
        let defines = ShaderDefines::new().define("LOW", ShaderConstant::I32(i32::MIN));
        let src = defines
            .apply(
                "const LOW: i32 = #{LOW};
                @fragment
                fn main() -> @location(0) vec4<f32> { return vec4<f32>(f32(LOW)); }",
            )
            .unwrap();
        assert!(src.contains("(-2147483647i - 1i)"));
        naga::front::wgsl::parse_str(&src).unwrap();
    }

    #[test]
    fn test_substitutes_every_occurrence() {
        let defines = ShaderDefines::new().define("RADIUS", ShaderConstant::I32(2));
        let out = defines
            .apply("const R: i32 = #{RADIUS}; let n = #{RADIUS} * 2;")
            .unwrap();
        assert_eq!(out, "const R: i32 = 2i; let n = 2i * 2;");
    }

    #[test]
    fn test_undefined_placeholder_is_error() {
        let err = ShaderDefines::new().apply("let n = #{GRID};").unwrap_err();
        match err {
            GpuError::ShaderCompile { log } => assert!(log.contains("GRID")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_placeholder_is_error() {
        let defines = ShaderDefines::new().define("A", ShaderConstant::U32(1));
        assert!(defines.apply("#{1A}").is_err());
        assert!(defines.apply("#{A").is_err());
    }

    #[test]
    fn test_source_without_placeholders_is_unchanged() {
        let src = "@fragment fn main() -> @location(0) vec4<f32> { return vec4(1.0); }";
        assert_eq!(ShaderDefines::new().apply(src).unwrap(), src);
    }

    proptest! {
        #[test]
        fn prop_u32_substitution_is_exact(value in any::<u32>()) {
            let defines = ShaderDefines::new().define("N", ShaderConstant::U32(value));
            let out = defines.apply("x = #{N};").unwrap();
            prop_assert_eq!(out, format!("x = {value}u;"));
        }
    }
}
