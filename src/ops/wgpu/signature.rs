//! Typed kernel contracts.
//!
//! A [`KernelSource`] pairs WGSL text with one [`KernelSignature`] per entry
//! point. The signature is the host's view of the kernel: parameter order,
//! buffer access and element types, scalar types and workgroup shape. The
//! program builder checks the source against it before compiling and the
//! dispatcher checks every argument list against it before binding.

use std::borrow::Cow;

use crate::error::{HarnessError, Result};

const MATMUL_WGSL: &str = include_str!("shaders/matmul.wgsl");
const BLEND_WGSL: &str = include_str!("shaders/blend.wgsl");

/// Entry point of the matrix product kernel.
pub const MATMUL_ENTRY: &str = "matrix_multiply";
/// Entry point of the image blend kernel.
pub const BLEND_ENTRY: &str = "blend_intensity";

/// Intended direction of data through a device buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Filled by the host before launch, only read by the kernel.
    ReadOnly,
    /// Written by the kernel, read back by the host after launch.
    WriteOnly,
}

/// Host element type of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    /// 64-bit signed integer.
    I64,
    /// Byte sample.
    U8,
}

impl ElementType {
    /// Width of one element in bytes.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::I64 => 8,
            Self::U8 => 1,
        }
    }
}

/// Scalar parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    /// 32-bit signed integer.
    I32,
    /// 32-bit unsigned integer.
    U32,
}

/// One kernel parameter slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    /// Storage buffer.
    Buffer {
        /// Read-only input or write-only output.
        access: Access,
        /// Host element type.
        element: ElementType,
    },
    /// Scalar passed through the uniform block.
    Scalar(ScalarType),
}

impl Param {
    /// Human-readable description used in bind errors.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Buffer { access, element } => format!("{access:?} buffer of {element:?}"),
            Self::Scalar(ty) => format!("scalar {ty:?}"),
        }
    }
}

/// Host-side contract of one kernel entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSignature {
    /// Name of the `@compute` function.
    pub entry_point: &'static str,
    /// Parameters in binding order. Buffers come first, scalars after.
    pub params: &'static [Param],
    /// Workgroup shape declared by the kernel, `(x, y)`.
    pub workgroup: [u32; 2],
}

impl KernelSignature {
    /// Number of storage buffer parameters.
    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.params
            .iter()
            .filter(|p| matches!(p, Param::Buffer { .. }))
            .count()
    }

    /// Number of scalar parameters.
    #[must_use]
    pub fn scalar_count(&self) -> usize {
        self.params.len() - self.buffer_count()
    }

    /// Number of `@binding` slots the kernel uses: one per buffer, plus one
    /// uniform block if there are scalars.
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.buffer_count() + usize::from(self.scalar_count() > 0)
    }

    fn check_order(&self) -> core::result::Result<(), String> {
        let first_scalar = self
            .params
            .iter()
            .position(|p| matches!(p, Param::Scalar(_)))
            .unwrap_or(self.params.len());
        if self.params[first_scalar..]
            .iter()
            .any(|p| matches!(p, Param::Buffer { .. }))
        {
            return Err(format!(
                "signature `{}` declares a buffer after a scalar",
                self.entry_point
            ));
        }
        Ok(())
    }
}

/// `(A, B, C, size)` over `size × size` matrices of `i64`.
pub const MATMUL_SIGNATURE: KernelSignature = KernelSignature {
    entry_point: MATMUL_ENTRY,
    params: &[
        Param::Buffer {
            access: Access::ReadOnly,
            element: ElementType::I64,
        },
        Param::Buffer {
            access: Access::ReadOnly,
            element: ElementType::I64,
        },
        Param::Buffer {
            access: Access::WriteOnly,
            element: ElementType::I64,
        },
        Param::Scalar(ScalarType::I32),
    ],
    workgroup: [8, 8],
};

/// `(img1, img2, result, rows, cols)` over packed RGB frames.
pub const BLEND_SIGNATURE: KernelSignature = KernelSignature {
    entry_point: BLEND_ENTRY,
    params: &[
        Param::Buffer {
            access: Access::ReadOnly,
            element: ElementType::U8,
        },
        Param::Buffer {
            access: Access::ReadOnly,
            element: ElementType::U8,
        },
        Param::Buffer {
            access: Access::WriteOnly,
            element: ElementType::U8,
        },
        Param::Scalar(ScalarType::I32),
        Param::Scalar(ScalarType::I32),
    ],
    workgroup: [8, 8],
};

/// `@compute` function found in WGSL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredEntryPoint {
    /// Function name.
    pub name: String,
    /// `@workgroup_size` arguments, missing ones filled with 1.
    pub workgroup: Option<[u32; 3]>,
}

/// WGSL text plus the signatures of the entry points it provides.
#[derive(Debug, Clone)]
pub struct KernelSource {
    label: &'static str,
    wgsl: Cow<'static, str>,
    signatures: Vec<KernelSignature>,
}

impl KernelSource {
    /// Wraps arbitrary source text.
    pub fn new(
        label: &'static str,
        wgsl: impl Into<Cow<'static, str>>,
        signatures: Vec<KernelSignature>,
    ) -> Self {
        Self {
            label,
            wgsl: wgsl.into(),
            signatures,
        }
    }

    /// The bundled matrix product kernel.
    #[must_use]
    pub fn matmul() -> Self {
        Self::new("matmul", MATMUL_WGSL, vec![MATMUL_SIGNATURE])
    }

    /// The bundled image blend kernel.
    #[must_use]
    pub fn blend() -> Self {
        Self::new("blend", BLEND_WGSL, vec![BLEND_SIGNATURE])
    }

    /// Debug label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.label
    }

    /// WGSL text.
    #[must_use]
    pub fn wgsl(&self) -> &str {
        &self.wgsl
    }

    /// Declared signatures.
    #[must_use]
    pub fn signatures(&self) -> &[KernelSignature] {
        &self.signatures
    }

    /// Signature for `name`.
    ///
    /// # Errors
    ///
    /// [`HarnessError::EntryPointNotFound`] if no signature declares it.
    pub fn signature(&self, name: &str) -> Result<&KernelSignature> {
        self.signatures
            .iter()
            .find(|s| s.entry_point == name)
            .ok_or_else(|| HarnessError::EntryPointNotFound {
                name: name.to_string(),
                available: self
                    .signatures
                    .iter()
                    .map(|s| s.entry_point.to_string())
                    .collect(),
            })
    }

    /// `@compute` functions declared in the text, in source order.
    #[must_use]
    pub fn declared_entry_points(&self) -> Vec<DeclaredEntryPoint> {
        let src = strip_line_comments(&self.wgsl);
        let mut found = Vec::new();
        let mut rest = src.as_str();
        while let Some(at) = rest.find("@compute") {
            rest = &rest[at + "@compute".len()..];
            let Some(fn_at) = rest.find("fn ") else {
                break;
            };
            let attrs = &rest[..fn_at];
            let after = rest[fn_at + 3..].trim_start();
            let name: String = after
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            if !name.is_empty() {
                found.push(DeclaredEntryPoint {
                    name,
                    workgroup: parse_workgroup_size(attrs),
                });
            }
            rest = &rest[fn_at + 3..];
        }
        found
    }

    /// Checks the text against the signatures without compiling it.
    ///
    /// Every signature must name a `@compute` function whose workgroup shape
    /// matches, and the number of `@binding` slots in the text must equal the
    /// slots the signature needs.
    ///
    /// # Errors
    ///
    /// [`HarnessError::Build`] listing every problem found.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if self.signatures.is_empty() {
            problems.push(format!("source `{}` declares no signatures", self.label));
        }

        let declared = self.declared_entry_points();
        let bindings = strip_line_comments(&self.wgsl).matches("@binding(").count();

        for sig in &self.signatures {
            if let Err(problem) = sig.check_order() {
                problems.push(problem);
            }
            match declared.iter().find(|d| d.name == sig.entry_point) {
                None => problems.push(format!(
                    "entry point `{}` is not a @compute function in `{}` (found: {:?})",
                    sig.entry_point,
                    self.label,
                    declared.iter().map(|d| d.name.as_str()).collect::<Vec<_>>()
                )),
                Some(d) => {
                    let expected = [sig.workgroup[0], sig.workgroup[1], 1];
                    if d.workgroup != Some(expected) {
                        problems.push(format!(
                            "entry point `{}` workgroup size {:?} does not match signature {:?}",
                            sig.entry_point, d.workgroup, expected
                        ));
                    }
                }
            }
            if sig.binding_count() != bindings {
                problems.push(format!(
                    "entry point `{}` needs {} bindings, source declares {}",
                    sig.entry_point,
                    sig.binding_count(),
                    bindings
                ));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(HarnessError::Build {
                log: problems.join("\n"),
            })
        }
    }
}

fn strip_line_comments(src: &str) -> String {
    src.lines()
        .map(|line| line.find("//").map_or(line, |at| &line[..at]))
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_workgroup_size(attrs: &str) -> Option<[u32; 3]> {
    let start = attrs.find("@workgroup_size(")? + "@workgroup_size(".len();
    let end = start + attrs[start..].find(')')?;
    let mut dims = [1u32; 3];
    for (slot, part) in attrs[start..end].split(',').enumerate() {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if slot >= 3 {
            return None;
        }
        dims[slot] = part.trim_end_matches('u').parse().ok()?;
    }
    Some(dims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_sources_validate() {
        KernelSource::matmul().validate().unwrap();
        KernelSource::blend().validate().unwrap();
    }

    #[test]
    fn finds_entry_points_and_workgroups() {
        let declared = KernelSource::matmul().declared_entry_points();
        assert_eq!(
            declared,
            vec![DeclaredEntryPoint {
                name: MATMUL_ENTRY.into(),
                workgroup: Some([8, 8, 1]),
            }]
        );
    }

    #[test]
    fn unknown_signature_name() {
        let err = KernelSource::blend().signature("computeIntensity").unwrap_err();
        match err {
            HarnessError::EntryPointNotFound { name, available } => {
                assert_eq!(name, "computeIntensity");
                assert_eq!(available, vec![BLEND_ENTRY.to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn signature_naming_missing_function_fails_validation() {
        let mut sig = MATMUL_SIGNATURE;
        sig.entry_point = "computeIntensity";
        let source = KernelSource::new("renamed", MATMUL_WGSL, vec![sig]);
        let err = source.validate().unwrap_err();
        assert!(matches!(err, HarnessError::Build { ref log } if log.contains("computeIntensity")));
    }

    #[test]
    fn foreign_signature_fails_validation() {
        let source = KernelSource::new("mismatch", MATMUL_WGSL, vec![BLEND_SIGNATURE]);
        let log = match source.validate() {
            Err(HarnessError::Build { log }) => log,
            other => panic!("expected build error, got {other:?}"),
        };
        assert!(log.contains("not a @compute function"));
    }

    #[test]
    fn binding_count_mismatch_fails_validation() {
        const TWO_BUFFERS: &[Param] = &[
            Param::Buffer {
                access: Access::ReadOnly,
                element: ElementType::I64,
            },
            Param::Buffer {
                access: Access::WriteOnly,
                element: ElementType::I64,
            },
            Param::Scalar(ScalarType::I32),
        ];
        let sig = KernelSignature {
            entry_point: MATMUL_ENTRY,
            params: TWO_BUFFERS,
            workgroup: [8, 8],
        };
        let source = KernelSource::new("short", MATMUL_WGSL, vec![sig]);
        let log = match source.validate() {
            Err(HarnessError::Build { log }) => log,
            other => panic!("expected build error, got {other:?}"),
        };
        assert!(log.contains("needs 3 bindings, source declares 4"));
    }

    #[test]
    fn scalar_before_buffer_is_rejected() {
        const SWAPPED: &[Param] = &[
            Param::Scalar(ScalarType::I32),
            Param::Buffer {
                access: Access::ReadOnly,
                element: ElementType::I64,
            },
        ];
        let sig = KernelSignature {
            entry_point: MATMUL_ENTRY,
            params: SWAPPED,
            workgroup: [8, 8],
        };
        assert!(sig.check_order().is_err());
    }

    #[test]
    fn parses_workgroup_variants() {
        assert_eq!(parse_workgroup_size("@workgroup_size(64)"), Some([64, 1, 1]));
        assert_eq!(parse_workgroup_size("@workgroup_size(4u, 2u)"), Some([4, 2, 1]));
        assert_eq!(parse_workgroup_size(" "), None);
    }

    #[test]
    fn matmul_counts() {
        assert_eq!(MATMUL_SIGNATURE.buffer_count(), 3);
        assert_eq!(MATMUL_SIGNATURE.scalar_count(), 1);
        assert_eq!(BLEND_SIGNATURE.binding_count(), 4);
    }
}
