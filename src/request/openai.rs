//! OpenAI-compatible chat completion and image generation payloads.
//!
//! DashScope's compatible mode accepts the same chat shape, so text models of
//! every provider are encoded here.

use crate::request::PreparedRequest;
use serde_json::{json, Map, Value};

const CHAT_PATH: &str = "/chat/completions";
const IMAGES_PATH: &str = "/images/generations";

pub(super) fn encode_chat(prepared: &PreparedRequest<'_>) -> (&'static str, Value) {
    let mut messages = Vec::new();
    if let Some(system) = prepared.str_param("system").filter(|s| !s.is_empty()) {
        messages.push(json!({"role": "system", "content": system}));
    }
    messages.push(json!({
        "role": "user",
        "content": prepared.str_param("prompt").unwrap_or_default(),
    }));

    let mut body = Map::new();
    body.insert("model".into(), prepared.descriptor.id.clone().into());
    body.insert("messages".into(), Value::Array(messages));
    body.insert("stream".into(), false.into());

    for (name, value) in prepared.params_without(&["prompt", "system", "response_format"]) {
        body.insert(name, value);
    }
    if let Some(format) = prepared.str_param("response_format") {
        body.insert("response_format".into(), json!({"type": format}));
    }

    (CHAT_PATH, Value::Object(body))
}

pub(super) fn encode_image(prepared: &PreparedRequest<'_>) -> (&'static str, Value) {
    let mut body = prepared.params.clone();
    body.insert("model".into(), prepared.descriptor.id.clone().into());
    body.insert("n".into(), 1.into());
    (IMAGES_PATH, Value::Object(body))
}

#[cfg(test)]
mod tests {
    use crate::registry::{catalog, Category, Params, ProviderKind, SubmissionStyle};
    use crate::request::{GenerationInput, RequestBuilder};
    use serde_json::json;
    use std::sync::Arc;

    fn builder() -> RequestBuilder {
        RequestBuilder::new(Arc::new(catalog::builtin().unwrap()))
    }

    #[test]
    fn test_chat_payload() {
        let request = builder()
            .build(
                Category::Text,
                "qwen-plus",
                &GenerationInput::new("Write a logline"),
                &json!({"system": "You are a screenwriter.", "response_format": "json_object"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .unwrap();

        assert_eq!(request.provider, ProviderKind::DashScope);
        assert_eq!(request.style, SubmissionStyle::Blocking);
        assert_eq!(request.endpoint, "/chat/completions");
        assert_eq!(
            request.body["messages"],
            json!([
                {"role": "system", "content": "You are a screenwriter."},
                {"role": "user", "content": "Write a logline"}
            ])
        );
        assert_eq!(request.body["response_format"], json!({"type": "json_object"}));
        assert_eq!(request.body["stream"], false);
        assert_eq!(request.body["temperature"], json!(0.7));
        assert!(request.body.get("prompt").is_none());
        assert!(request.body.get("thinking_budget").is_none());
    }

    #[test]
    fn test_image_payload() {
        let request = builder()
            .build(
                Category::TextToImage,
                "gpt-image-1",
                &GenerationInput::new("a fox logo"),
                &Params::new(),
            )
            .unwrap();
        assert_eq!(request.endpoint, "/images/generations");
        assert_eq!(
            request.body,
            json!({
                "model": "gpt-image-1",
                "prompt": "a fox logo",
                "n": 1,
                "size": "1024x1024",
                "quality": "auto"
            })
        );
    }
}
