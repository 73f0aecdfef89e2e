//! Capability registry: the immutable catalogue of generation backends.
//!
//! A [`Registry`] is assembled once at startup through [`RegistryBuilder`]
//! (or [`catalog::builtin`]) and is read-only afterwards, so it can be shared
//! behind an `Arc` by any number of concurrent requests.

pub mod catalog;
mod types;
mod validate;

pub use types::{
    Capabilities, Category, Condition, ModelDescriptor, ParamType, ParameterSpec, Params,
    ProviderKind, SizeConstraint, SubmissionStyle,
};
pub use validate::{check_size, parse_size, validate_params, ValidationReport};

pub(crate) use validate::effective_value;

use crate::error::{GenFlowError, Result};
use indexmap::IndexMap;

/// Collects descriptors before freezing them into a [`Registry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    models: Vec<ModelDescriptor>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a model descriptor.
    pub fn model(mut self, descriptor: ModelDescriptor) -> Self {
        self.models.push(descriptor);
        self
    }

    /// Freezes the registry. Duplicate ids are rejected.
    pub fn build(self) -> Result<Registry> {
        let mut models = IndexMap::with_capacity(self.models.len());
        for descriptor in self.models {
            if models.contains_key(&descriptor.id) {
                return Err(GenFlowError::invalid(format!(
                    "model `{}` registered twice",
                    descriptor.id
                )));
            }
            models.insert(descriptor.id.clone(), descriptor);
        }
        Ok(Registry { models })
    }
}

/// Read-only catalogue of model descriptors, in registration order.
#[derive(Debug, Clone)]
pub struct Registry {
    models: IndexMap<String, ModelDescriptor>,
}

impl Registry {
    /// Creates a new [`RegistryBuilder`].
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Looks up a model by id.
    pub fn get(&self, id: &str) -> Result<&ModelDescriptor> {
        self.models
            .get(id)
            .ok_or_else(|| GenFlowError::ModelNotFound(id.to_string()))
    }

    /// All models, in registration order.
    pub fn list(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.values()
    }

    /// Models of one category, in registration order.
    pub fn list_by_category(&self, category: Category) -> Vec<&ModelDescriptor> {
        self.models
            .values()
            .filter(|m| m.category == category)
            .collect()
    }

    /// Default value of every parameter that declares one.
    pub fn defaults(&self, id: &str) -> Result<Params> {
        let descriptor = self.get(id)?;
        Ok(descriptor
            .parameters
            .iter()
            .filter_map(|p| p.default.clone().map(|d| (p.name.clone(), d)))
            .collect())
    }

    /// Validates a parameter map against the model's declared parameters.
    pub fn validate(&self, id: &str, params: &Params) -> Result<ValidationReport> {
        Ok(validate_params(self.get(id)?, params))
    }

    /// Validates an output size against the model's size constraint.
    ///
    /// Models without a constraint accept any positive size.
    pub fn validate_size(&self, id: &str, width: u32, height: u32) -> Result<()> {
        match &self.get(id)?.size {
            Some(constraint) => check_size(constraint, width, height),
            None if width > 0 && height > 0 => Ok(()),
            None => Err(GenFlowError::invalid(format!(
                "image size must be positive, got {width}x{height}"
            ))),
        }
    }

    /// Number of registered models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Returns true if no model is registered.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> Registry {
        catalog::builtin().unwrap()
    }

    #[test]
    fn test_get_and_not_found() {
        let registry = registry();
        assert_eq!(registry.get("wan2.2-i2v-plus").unwrap().category, Category::ImageToVideo);
        assert!(matches!(
            registry.get("does-not-exist"),
            Err(GenFlowError::ModelNotFound(id)) if id == "does-not-exist"
        ));
    }

    #[test]
    fn test_list_by_category_keeps_registration_order() {
        let registry = registry();
        let ids: Vec<_> = registry
            .list_by_category(Category::TextToImage)
            .into_iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(
            ids,
            vec!["wan2.2-t2i-flash", "doubao-seedream-3-0-t2i-250415", "gpt-image-1"]
        );
    }

    #[test]
    fn test_defaults() {
        let defaults = registry().defaults("wan2.2-i2v-plus").unwrap();
        assert_eq!(defaults["resolution"], json!("1080P"));
        assert_eq!(defaults["duration"], json!(5));
        assert!(!defaults.contains_key("seed"));
    }

    #[test]
    fn test_validate_by_id() {
        let registry = registry();
        let params = json!({"prompt": "a fox", "resolution": "4K"});
        let report = registry
            .validate("wan2.2-i2v-plus", params.as_object().unwrap())
            .unwrap();
        assert!(!report.is_ok());
        assert!(report.errors[0].contains("`resolution`"));
    }

    #[test]
    fn test_validate_size_uses_constraint() {
        let registry = registry();
        assert!(registry.validate_size("wan2.2-t2i-flash", 1024, 1024).is_ok());
        assert!(registry.validate_size("wan2.2-t2i-flash", 2048, 2048).is_err());
        // no constraint declared
        assert!(registry.validate_size("gpt-image-1", 4096, 16).is_ok());
        assert!(registry.validate_size("gpt-image-1", 0, 16).is_err());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let model = catalog::builtin_models().remove(0);
        let result = Registry::builder().model(model.clone()).model(model).build();
        assert!(matches!(result, Err(GenFlowError::Validation(_))));
    }
}
