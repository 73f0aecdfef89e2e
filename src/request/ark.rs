//! Volcengine Ark payloads.
//!
//! Video tasks carry their parameters as `--flag value` commands appended to
//! the text prompt; image generation uses the OpenAI-style images API.

use crate::request::PreparedRequest;
use serde_json::{json, Value};

const VIDEO_TASKS_PATH: &str = "/contents/generations/tasks";
const IMAGES_PATH: &str = "/images/generations";

/// Maps parameter names to Ark's prompt command flags.
const VIDEO_COMMANDS: &[(&str, &str)] = &[
    ("resolution", "rs"),
    ("ratio", "rt"),
    ("duration", "dur"),
    ("fps", "fps"),
    ("seed", "seed"),
    ("camera_fixed", "cf"),
    ("watermark", "wm"),
];

pub(super) fn encode_video(prepared: &PreparedRequest<'_>) -> (&'static str, Value) {
    let mut text = prepared.str_param("prompt").unwrap_or_default().trim().to_string();
    for (param, flag) in VIDEO_COMMANDS {
        let Some(value) = prepared.params.get(*param) else {
            continue;
        };
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(&format!("--{flag} {rendered}"));
    }

    let mut content = vec![json!({"type": "text", "text": text})];
    if let Some(url) = &prepared.input.image_url {
        content.push(json!({
            "type": "image_url",
            "image_url": {"url": url},
            "role": "first_frame",
        }));
    }
    for url in &prepared.input.reference_urls {
        content.push(json!({
            "type": "image_url",
            "image_url": {"url": url},
            "role": "reference_image",
        }));
    }

    (
        VIDEO_TASKS_PATH,
        json!({
            "model": prepared.descriptor.id,
            "content": content,
        }),
    )
}

pub(super) fn encode_image(prepared: &PreparedRequest<'_>) -> (&'static str, Value) {
    let mut body = prepared.params.clone();
    body.insert("model".into(), prepared.descriptor.id.clone().into());
    body.insert("response_format".into(), "url".into());
    (IMAGES_PATH, Value::Object(body))
}

#[cfg(test)]
mod tests {
    use crate::registry::{catalog, Category, Params};
    use crate::request::{GenerationInput, RequestBuilder};
    use serde_json::json;
    use std::sync::Arc;

    fn builder() -> RequestBuilder {
        RequestBuilder::new(Arc::new(catalog::builtin().unwrap()))
    }

    #[test]
    fn test_video_commands_appended_in_declaration_order() {
        let request = builder()
            .build(
                Category::ImageToVideo,
                "doubao-seedance-1-0-pro-250528",
                &GenerationInput::new("a boat drifts").with_image("https://cdn/boat.jpg"),
                &json!({"seed": 42, "duration": 10}).as_object().cloned().unwrap(),
            )
            .unwrap();

        assert_eq!(request.endpoint, "/contents/generations/tasks");
        assert_eq!(
            request.body["content"][0]["text"],
            "a boat drifts --rs 720p --rt adaptive --dur 10 --fps 24 --seed 42 --cf false --wm false"
        );
        assert_eq!(request.body["content"][1]["image_url"]["url"], "https://cdn/boat.jpg");
        assert_eq!(request.body["content"][1]["role"], "first_frame");
        assert_eq!(request.body["model"], "doubao-seedance-1-0-pro-250528");
    }

    #[test]
    fn test_text_to_video_has_only_text_content() {
        let request = builder()
            .build(
                Category::TextToVideo,
                "doubao-seedance-1-0-lite-t2v-250428",
                &GenerationInput::new("city lights"),
                &json!({"seed": 1}).as_object().cloned().unwrap(),
            )
            .unwrap();
        let content = request.body["content"].as_array().unwrap();
        assert_eq!(content.len(), 1);
        assert!(content[0]["text"].as_str().unwrap().contains("--rt 16:9"));
    }

    #[test]
    fn test_image_payload() {
        let request = builder()
            .build(
                Category::TextToImage,
                "doubao-seedream-3-0-t2i-250415",
                &GenerationInput::new("a teapot"),
                &Params::new(),
            )
            .unwrap();
        assert_eq!(request.endpoint, "/images/generations");
        assert_eq!(request.body["prompt"], "a teapot");
        assert_eq!(request.body["size"], "1024x1024");
        assert_eq!(request.body["response_format"], "url");
        assert_eq!(request.body["guidance_scale"], json!(2.5));
        assert_eq!(request.body["watermark"], true);
        assert!(request.body.get("seed").is_none());
    }
}
