//! Parameter and size validation against a [`ModelDescriptor`].
//!
//! Everything here is pure: the same descriptor and parameter map always
//! produce the same report.

use crate::error::{GenFlowError, Result};
use crate::registry::types::{ModelDescriptor, ParamType, ParameterSpec, Params, SizeConstraint};
use serde::Serialize;
use serde_json::Value;

/// Outcome of validating a parameter map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// One message per violated rule, in parameter declaration order.
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// Returns true when no rule was violated.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Converts a failed report into a [`GenFlowError::Validation`].
    pub fn into_result(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(GenFlowError::Validation(self.errors))
        }
    }
}

/// Validates `params` against every [`ParameterSpec`] of `descriptor`.
///
/// Unknown parameter names are ignored. `null` counts as absent.
pub fn validate_params(descriptor: &ModelDescriptor, params: &Params) -> ValidationReport {
    let mut errors = Vec::new();

    for spec in &descriptor.parameters {
        let value = params.get(&spec.name).filter(|v| !v.is_null());

        let Some(value) = value else {
            if spec.required {
                errors.push(format!("`{}` is required", spec.name));
            }
            continue;
        };

        if let Some(message) = check_value(spec, value) {
            errors.push(message);
            continue;
        }

        if let Some(condition) = &spec.only_when {
            let actual = effective_value(descriptor, params, &condition.param);
            if actual.as_ref() != Some(&condition.equals) {
                errors.push(format!(
                    "`{}` is only valid when `{}` is {}",
                    spec.name, condition.param, condition.equals
                ));
            }
        }
    }

    ValidationReport { errors }
}

/// Value a parameter takes once defaults apply.
pub(crate) fn effective_value(
    descriptor: &ModelDescriptor,
    params: &Params,
    name: &str,
) -> Option<Value> {
    params
        .get(name)
        .filter(|v| !v.is_null())
        .cloned()
        .or_else(|| descriptor.parameter(name).and_then(|p| p.default.clone()))
}

fn check_value(spec: &ParameterSpec, value: &Value) -> Option<String> {
    let type_ok = match &spec.kind {
        ParamType::String => value.is_string(),
        ParamType::Integer => value.is_i64() || value.is_u64(),
        ParamType::Float => value.is_number(),
        ParamType::Boolean => value.is_boolean(),
        ParamType::Enum(options) => {
            if options.contains(value) {
                true
            } else {
                let allowed: Vec<String> = options.iter().map(Value::to_string).collect();
                return Some(format!(
                    "`{}` must be one of [{}], got {}",
                    spec.name,
                    allowed.join(", "),
                    value
                ));
            }
        }
    };
    if !type_ok {
        return Some(format!(
            "`{}` must be {}, got {}",
            spec.name,
            spec.kind.name(),
            value
        ));
    }

    if let Some(number) = value.as_f64() {
        if let Some(min) = spec.min {
            if number < min {
                return Some(format!("`{}` must be >= {min}, got {number}", spec.name));
            }
        }
        if let Some(max) = spec.max {
            if number > max {
                return Some(format!("`{}` must be <= {max}, got {number}", spec.name));
            }
        }
    }

    if let Some(text) = value.as_str() {
        let len = text.chars().count();
        if let Some(min_len) = spec.min_len {
            if len < min_len {
                return Some(format!(
                    "`{}` must be at least {min_len} characters, got {len}",
                    spec.name
                ));
            }
        }
        if let Some(max_len) = spec.max_len {
            if len > max_len {
                return Some(format!(
                    "`{}` must be at most {max_len} characters, got {len}",
                    spec.name
                ));
            }
        }
    }

    None
}

/// Checks a width/height pair against a size constraint. Bounds are inclusive.
pub fn check_size(constraint: &SizeConstraint, width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(GenFlowError::invalid(format!(
            "image size must be positive, got {width}x{height}"
        )));
    }

    let pixels = u64::from(width) * u64::from(height);
    if pixels < constraint.min_pixels {
        return Err(GenFlowError::invalid(format!(
            "{width}x{height} has {pixels} pixels, below the minimum of {}",
            constraint.min_pixels
        )));
    }
    if pixels > constraint.max_pixels {
        return Err(GenFlowError::invalid(format!(
            "{width}x{height} has {pixels} pixels, above the maximum of {}",
            constraint.max_pixels
        )));
    }

    let aspect = f64::from(width) / f64::from(height);
    if aspect < constraint.min_aspect {
        return Err(GenFlowError::invalid(format!(
            "{width}x{height} has aspect ratio {aspect:.4}, below the minimum of {}",
            constraint.min_aspect
        )));
    }
    if aspect > constraint.max_aspect {
        return Err(GenFlowError::invalid(format!(
            "{width}x{height} has aspect ratio {aspect:.4}, above the maximum of {}",
            constraint.max_aspect
        )));
    }

    Ok(())
}

/// Parses `"1024*768"` or `"1024x768"` into `(width, height)`.
pub fn parse_size(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.trim().split_once(['*', 'x', 'X'])?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}
