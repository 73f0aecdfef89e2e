//! Descriptor types for the capability registry.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameter map as supplied by callers and sent to providers.
pub type Params = serde_json::Map<String, Value>;

/// What a model generates and from which inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Text completion.
    Text,
    /// Image from a prompt.
    TextToImage,
    /// Image from a source image and a prompt.
    ImageToImage,
    /// Video from a first-frame image.
    ImageToVideo,
    /// Video from a prompt.
    TextToVideo,
    /// Video guided by one or more reference images.
    ReferenceToVideo,
}

impl Category {
    /// All categories in display order.
    pub const ALL: [Category; 6] = [
        Self::Text,
        Self::TextToImage,
        Self::ImageToImage,
        Self::ImageToVideo,
        Self::TextToVideo,
        Self::ReferenceToVideo,
    ];

    /// Returns the snake_case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::TextToImage => "text_to_image",
            Self::ImageToImage => "image_to_image",
            Self::ImageToVideo => "image_to_video",
            Self::TextToVideo => "text_to_video",
            Self::ReferenceToVideo => "reference_to_video",
        }
    }

    /// Parses the snake_case identifier (hyphens accepted).
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|c| c.as_str() == normalized)
    }

    /// Returns true for categories producing images.
    pub fn is_image(&self) -> bool {
        matches!(self, Self::TextToImage | Self::ImageToImage)
    }

    /// Returns true for categories producing videos.
    pub fn is_video(&self) -> bool {
        matches!(
            self,
            Self::ImageToVideo | Self::TextToVideo | Self::ReferenceToVideo
        )
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a provider runs a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStyle {
    /// The submit call itself returns the finished result.
    Blocking,
    /// Submit returns a task id; status is fetched with a separate GET.
    AsyncHttpPoll,
    /// A vendor client runs its own polling loop after submission.
    SdkManagedPoll,
}

impl std::fmt::Display for SubmissionStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blocking => write!(f, "blocking"),
            Self::AsyncHttpPoll => write!(f, "async-http-poll"),
            Self::SdkManagedPoll => write!(f, "sdk-managed-poll"),
        }
    }
}

/// Remote vendor hosting a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Alibaba Cloud Model Studio (DashScope).
    DashScope,
    /// Volcengine Ark.
    Ark,
    /// OpenAI or an OpenAI-compatible endpoint.
    OpenAi,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DashScope => write!(f, "dashscope"),
            Self::Ark => write!(f, "ark"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

/// Feature flags a model advertises.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Token streaming.
    pub streaming: bool,
    /// Reasoning ("thinking") output.
    pub thinking: bool,
    /// Web search augmentation.
    pub search: bool,
    /// Structured JSON output.
    pub json_output: bool,
    /// Generated audio track.
    pub audio: bool,
    /// Accepts a seed parameter.
    pub seed: bool,
    /// Accepts a watermark flag.
    pub watermark: bool,
    /// Vendor-side prompt rewriting.
    pub prompt_extend: bool,
}

/// Semantic type of a parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "options", rename_all = "lowercase")]
pub enum ParamType {
    /// Any JSON string.
    String,
    /// Whole number.
    Integer,
    /// Any JSON number.
    Float,
    /// `true` or `false`.
    Boolean,
    /// One of a fixed set of JSON values.
    Enum(Vec<Value>),
}

impl ParamType {
    /// Type name with article, for validation messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Integer => "an integer",
            Self::Float => "a number",
            Self::Boolean => "a boolean",
            Self::Enum(_) => "one of the listed options",
        }
    }
}

/// "Only valid when `param` == `equals`".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Parameter the condition reads.
    pub param: String,
    /// Value it must take (after defaults).
    pub equals: Value,
}

/// Contract for one named parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Name as sent to the provider.
    pub name: String,
    /// Value type.
    pub kind: ParamType,
    /// Whether callers must supply it.
    #[serde(default)]
    pub required: bool,
    /// Value used when the caller omits it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Inclusive lower bound for numbers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive upper bound for numbers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Inclusive lower bound on string length (characters).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_len: Option<usize>,
    /// Inclusive upper bound on string length (characters).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_len: Option<usize>,
    /// Only accepted when another parameter has a given value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_when: Option<Condition>,
    /// Free-form help text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParameterSpec {
    /// Creates an optional parameter of the given type.
    pub fn new(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: None,
            min: None,
            max: None,
            min_len: None,
            max_len: None,
            only_when: None,
            description: None,
        }
    }

    /// Optional string parameter.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::String)
    }

    /// Optional integer parameter.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Integer)
    }

    /// Optional float parameter.
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Float)
    }

    /// Optional boolean parameter.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Boolean)
    }

    /// Enum of string options.
    pub fn one_of(name: impl Into<String>, options: &[&str]) -> Self {
        Self::new(
            name,
            ParamType::Enum(options.iter().map(|o| Value::from(*o)).collect()),
        )
    }

    /// Enum of integer options.
    pub fn one_of_int(name: impl Into<String>, options: &[i64]) -> Self {
        Self::new(
            name,
            ParamType::Enum(options.iter().map(|o| Value::from(*o)).collect()),
        )
    }

    /// Marks the parameter as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the default value.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets inclusive numeric bounds.
    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Sets inclusive string length bounds.
    pub fn length(mut self, min: usize, max: usize) -> Self {
        self.min_len = Some(min);
        self.max_len = Some(max);
        self
    }

    /// Restricts the parameter to when `param` equals `equals`.
    pub fn only_when(mut self, param: impl Into<String>, equals: impl Into<Value>) -> Self {
        self.only_when = Some(Condition {
            param: param.into(),
            equals: equals.into(),
        });
        self
    }

    /// Sets the description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Pixel-count and aspect-ratio bounds for image outputs (all inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeConstraint {
    /// Fewest pixels (width * height).
    pub min_pixels: u64,
    /// Most pixels (width * height).
    pub max_pixels: u64,
    /// Lower bound on width / height.
    pub min_aspect: f64,
    /// Upper bound on width / height.
    pub max_aspect: f64,
}

/// Immutable description of one generation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Unique id, also the vendor's model name.
    pub id: String,
    /// Display name.
    pub name: String,
    /// What the model generates.
    pub category: Category,
    /// Vendor model version.
    pub version: String,
    /// Hosting vendor.
    pub provider: ProviderKind,
    /// How jobs are submitted and tracked.
    pub style: SubmissionStyle,
    /// Advertised feature flags.
    #[serde(default)]
    pub capabilities: Capabilities,
    /// Accepted parameters, in declaration order.
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    /// Output size bounds for image models.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<SizeConstraint>,
}

impl ModelDescriptor {
    /// Looks up a parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_roundtrip() {
        for category in Category::ALL {
            assert_eq!(Category::parse(category.as_str()), Some(category));
        }
        assert_eq!(Category::parse("Image-To-Video"), Some(Category::ImageToVideo));
        assert_eq!(Category::parse("audio"), None);
    }

    #[test]
    fn test_category_kinds() {
        assert!(Category::ImageToImage.is_image());
        assert!(Category::ReferenceToVideo.is_video());
        assert!(!Category::Text.is_image());
        assert!(!Category::Text.is_video());
    }

    #[test]
    fn test_param_type_serialization() {
        let spec = ParameterSpec::one_of("resolution", &["480P", "720P"]).required();
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["kind"]["type"], "enum");
        assert_eq!(json["kind"]["options"][1], "720P");
        assert_eq!(json["required"], true);
        assert!(json.get("default").is_none());
    }

    #[test]
    fn test_style_display() {
        assert_eq!(SubmissionStyle::AsyncHttpPoll.to_string(), "async-http-poll");
        assert_eq!(ProviderKind::DashScope.to_string(), "dashscope");
    }
}
