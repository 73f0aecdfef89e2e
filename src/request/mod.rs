//! Request builder: turns a model id, inputs and parameters into the exact
//! payload a provider expects.
//!
//! Every category goes through the same [`RequestBuilder::prepare`] step
//! (lookup, defaulting, validation); the provider-specific encoders in the
//! submodules only reshape an already-valid parameter map.

mod ark;
mod dashscope;
mod openai;

use crate::error::{GenFlowError, Result};
use crate::registry::{
    check_size, effective_value, parse_size, validate_params, Category, ModelDescriptor, Params,
    ProviderKind, Registry, SubmissionStyle,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Upper bound shared by all seed parameters in the catalogue.
const MAX_SEED: i64 = 2_147_483_647;

/// User-facing inputs that are not plain model parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationInput {
    /// Text prompt.
    pub prompt: Option<String>,
    /// Things the output should avoid.
    pub negative_prompt: Option<String>,
    /// Source image (first frame for image-to-video, base image for image-to-image).
    pub image_url: Option<String>,
    /// Reference images for reference-to-video.
    #[serde(default)]
    pub reference_urls: Vec<String>,
}

impl GenerationInput {
    /// Creates an input with the given prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Default::default()
        }
    }

    /// Sets the negative prompt.
    pub fn with_negative_prompt(mut self, negative: impl Into<String>) -> Self {
        self.negative_prompt = Some(negative.into());
        self
    }

    /// Sets the source image URL.
    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Adds a reference image URL.
    pub fn with_reference(mut self, url: impl Into<String>) -> Self {
        self.reference_urls.push(url.into());
        self
    }
}

/// A validated, provider-shaped request ready for submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderRequest {
    /// Model id (also the vendor's model name).
    pub model: String,
    /// Category the request was validated for.
    pub category: Category,
    /// Vendor to submit to.
    pub provider: ProviderKind,
    /// Submission style of the model.
    pub style: SubmissionStyle,
    /// Path relative to the backend's base URL, starting with `/`.
    pub endpoint: String,
    /// JSON body in the vendor's format.
    pub body: Value,
    /// Seed used for this request, if the model takes one.
    pub seed: Option<i64>,
}

/// Output of the shared prepare step.
#[derive(Debug, Clone)]
pub struct PreparedRequest<'a> {
    /// Descriptor of the requested model.
    pub descriptor: &'a ModelDescriptor,
    /// Inputs after category checks.
    pub input: GenerationInput,
    /// Caller parameters merged with defaults, prompt included.
    pub params: Params,
}

impl PreparedRequest<'_> {
    pub(crate) fn str_param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    /// Parameters minus the given names, for vendor "parameters" sections.
    pub(crate) fn params_without(&self, names: &[&str]) -> Params {
        self.params
            .iter()
            .filter(|(k, _)| !names.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Builds provider requests from the immutable [`Registry`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    registry: Arc<Registry>,
}

impl RequestBuilder {
    /// Creates a builder over the given registry.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// The registry requests are built against.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Shared step for all categories: look up the model, fill defaults,
    /// validate parameters, inputs and output size.
    ///
    /// Fails with [`GenFlowError::Validation`] listing every violated rule.
    pub fn prepare(
        &self,
        category: Category,
        model_id: &str,
        input: &GenerationInput,
        params: &Params,
    ) -> Result<PreparedRequest<'_>> {
        let descriptor = self.registry.get(model_id)?;
        if descriptor.category != category {
            return Err(GenFlowError::invalid(format!(
                "model `{model_id}` is a {} model, not {category}",
                descriptor.category
            )));
        }

        let mut merged = params.clone();
        merged.retain(|_, v| !v.is_null());
        if let Some(prompt) = input.prompt.as_deref().filter(|p| !p.trim().is_empty()) {
            merged
                .entry("prompt")
                .or_insert_with(|| Value::from(prompt));
        }
        if let Some(negative) = input.negative_prompt.as_deref().filter(|p| !p.is_empty()) {
            if descriptor.parameter("negative_prompt").is_some() {
                merged
                    .entry("negative_prompt")
                    .or_insert_with(|| Value::from(negative));
            }
        }
        fill_defaults(descriptor, &mut merged);

        let mut errors = validate_params(descriptor, &merged).errors;
        errors.extend(check_inputs(category, input));
        if let Some(message) = check_size_param(descriptor, &merged) {
            errors.push(message);
        }
        if !errors.is_empty() {
            return Err(GenFlowError::Validation(errors));
        }

        Ok(PreparedRequest {
            descriptor,
            input: input.clone(),
            params: merged,
        })
    }

    /// Builds one provider request.
    pub fn build(
        &self,
        category: Category,
        model_id: &str,
        input: &GenerationInput,
        params: &Params,
    ) -> Result<ProviderRequest> {
        let prepared = self.prepare(category, model_id, input, params)?;
        encode(&prepared)
    }

    /// Builds `count` requests that differ only by seed (`seed`, `seed + 1`, ...).
    ///
    /// Without a caller-supplied seed a random base is drawn for models that
    /// take one. Every member is validated; one bad member fails the batch.
    pub fn build_group(
        &self,
        category: Category,
        model_id: &str,
        input: &GenerationInput,
        params: &Params,
        count: usize,
    ) -> Result<Vec<ProviderRequest>> {
        if count == 0 {
            return Err(GenFlowError::invalid("group size must be at least 1"));
        }
        let descriptor = self.registry.get(model_id)?;
        let takes_seed = descriptor.parameter("seed").is_some();

        let base_seed = match params.get("seed").filter(|v| !v.is_null()) {
            Some(seed) => Some(seed.as_i64().ok_or_else(|| {
                GenFlowError::invalid(format!("`seed` must be an integer, got {seed}"))
            })?),
            None if takes_seed => {
                let upper = MAX_SEED - count as i64;
                Some(rand::thread_rng().gen_range(0..=upper.max(0)))
            }
            None => None,
        };

        (0..count)
            .map(|i| {
                let mut member = params.clone();
                if let Some(base) = base_seed {
                    member.insert("seed".into(), Value::from(base + i as i64));
                }
                self.build(category, model_id, input, &member)
            })
            .collect()
    }
}

/// Inserts declared defaults for absent parameters, skipping conditional
/// parameters whose precondition does not hold.
fn fill_defaults(descriptor: &ModelDescriptor, params: &mut Params) {
    for spec in &descriptor.parameters {
        let Some(default) = &spec.default else {
            continue;
        };
        if params.contains_key(&spec.name) {
            continue;
        }
        if let Some(condition) = &spec.only_when {
            if effective_value(descriptor, params, &condition.param).as_ref()
                != Some(&condition.equals)
            {
                continue;
            }
        }
        params.insert(spec.name.clone(), default.clone());
    }
}

fn check_inputs(category: Category, input: &GenerationInput) -> Vec<String> {
    let mut errors = Vec::new();
    let has_prompt = input
        .prompt
        .as_deref()
        .is_some_and(|p| !p.trim().is_empty());

    match category {
        Category::Text | Category::TextToImage | Category::TextToVideo => {
            if !has_prompt {
                errors.push(format!("{category} requires a non-empty prompt"));
            }
        }
        Category::ImageToImage | Category::ImageToVideo => match input.image_url.as_deref() {
            None | Some("") => errors.push(format!("{category} requires a source image")),
            Some(url) if !is_fetchable_url(url) => {
                errors.push(format!("source image must be an http(s) or data URL, got `{url}`"))
            }
            Some(_) => {}
        },
        Category::ReferenceToVideo => {
            if input.reference_urls.is_empty() {
                errors.push(format!("{category} requires at least one reference image"));
            }
            for url in input.reference_urls.iter().filter(|u| !is_fetchable_url(u)) {
                errors.push(format!(
                    "reference image must be an http(s) or data URL, got `{url}`"
                ));
            }
        }
    }
    errors
}

fn is_fetchable_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://") || url.starts_with("data:")
}

/// Checks a `size` parameter against the model's size constraint.
fn check_size_param(descriptor: &ModelDescriptor, params: &Params) -> Option<String> {
    let constraint = descriptor.size.as_ref()?;
    let size = params.get("size")?.as_str()?;
    match parse_size(size) {
        Some((width, height)) => check_size(constraint, width, height)
            .err()
            .map(|e| match e {
                GenFlowError::Validation(mut messages) => messages.remove(0),
                other => other.to_string(),
            }),
        None => Some(format!("`size` must look like 1024*1024, got `{size}`")),
    }
}

fn encode(prepared: &PreparedRequest<'_>) -> Result<ProviderRequest> {
    let descriptor = prepared.descriptor;
    let (endpoint, body) = match (descriptor.provider, descriptor.category) {
        (_, Category::Text) => openai::encode_chat(prepared),
        (ProviderKind::DashScope, category) if category.is_image() => {
            dashscope::encode_image(prepared)
        }
        (ProviderKind::DashScope, _) => dashscope::encode_video(prepared),
        (ProviderKind::Ark, category) if category.is_video() => ark::encode_video(prepared),
        (ProviderKind::Ark, Category::TextToImage) => ark::encode_image(prepared),
        (ProviderKind::OpenAi, Category::TextToImage) => openai::encode_image(prepared),
        (provider, category) => {
            return Err(GenFlowError::invalid(format!(
                "{provider} has no {category} endpoint"
            )))
        }
    };

    Ok(ProviderRequest {
        model: descriptor.id.clone(),
        category: descriptor.category,
        provider: descriptor.provider,
        style: descriptor.style,
        endpoint: endpoint.to_string(),
        body,
        seed: prepared.params.get("seed").and_then(Value::as_i64),
    })
}
