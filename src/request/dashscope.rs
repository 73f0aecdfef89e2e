//! DashScope (`{model, input, parameters}`) payloads for image and video synthesis.

use crate::registry::Category;
use crate::request::PreparedRequest;
use serde_json::{json, Map, Value};

const TEXT_TO_IMAGE_PATH: &str = "/services/aigc/text2image/image-synthesis";
const IMAGE_TO_IMAGE_PATH: &str = "/services/aigc/image2image/image-synthesis";
const VIDEO_SYNTHESIS_PATH: &str = "/services/aigc/video-generation/video-synthesis";

/// Parameter names that belong in `input` rather than `parameters`.
const INPUT_FIELDS: &[&str] = &["prompt", "negative_prompt", "function"];

pub(super) fn encode_image(prepared: &PreparedRequest<'_>) -> (&'static str, Value) {
    let mut input = text_input(prepared);
    let path = match prepared.descriptor.category {
        Category::ImageToImage => {
            if let Some(function) = prepared.str_param("function") {
                input.insert("function".into(), function.into());
            }
            if let Some(url) = &prepared.input.image_url {
                input.insert("base_image_url".into(), url.as_str().into());
            }
            IMAGE_TO_IMAGE_PATH
        }
        _ => TEXT_TO_IMAGE_PATH,
    };
    (path, body(prepared, input, prepared.params_without(INPUT_FIELDS)))
}

pub(super) fn encode_video(prepared: &PreparedRequest<'_>) -> (&'static str, Value) {
    let mut input = text_input(prepared);
    let mut parameters = prepared.params_without(INPUT_FIELDS);

    match prepared.descriptor.category {
        Category::ImageToVideo => {
            if let Some(url) = &prepared.input.image_url {
                input.insert("img_url".into(), url.as_str().into());
            }
        }
        Category::ReferenceToVideo => {
            let refs = &prepared.input.reference_urls;
            input.insert("function".into(), "image_reference".into());
            input.insert("ref_images_url".into(), json!(refs));
            // one obj_or_bg marker per reference image
            if let Some(marker) = parameters.remove("obj_or_bg") {
                parameters.insert(
                    "obj_or_bg".into(),
                    Value::Array(vec![marker; refs.len()]),
                );
            }
        }
        _ => {}
    }
    (VIDEO_SYNTHESIS_PATH, body(prepared, input, parameters))
}

fn text_input(prepared: &PreparedRequest<'_>) -> Map<String, Value> {
    let mut input = Map::new();
    for field in ["prompt", "negative_prompt"] {
        if let Some(text) = prepared.str_param(field).filter(|t| !t.is_empty()) {
            input.insert(field.into(), text.into());
        }
    }
    input
}

fn body(
    prepared: &PreparedRequest<'_>,
    input: Map<String, Value>,
    parameters: Map<String, Value>,
) -> Value {
    json!({
        "model": prepared.descriptor.id,
        "input": input,
        "parameters": parameters,
    })
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
    fn test_text_to_image_payload() {
        let request = builder()
            .build(
                Category::TextToImage,
                "wan2.2-t2i-flash",
                &GenerationInput::new("a red kite").with_negative_prompt("blurry"),
                &json!({"seed": 7}).as_object().cloned().unwrap(),
            )
            .unwrap();

        assert_eq!(request.endpoint, "/services/aigc/text2image/image-synthesis");
        assert_eq!(
            request.body,
            json!({
                "model": "wan2.2-t2i-flash",
                "input": {"prompt": "a red kite", "negative_prompt": "blurry"},
                "parameters": {
                    "seed": 7,
                    "n": 1,
                    "size": "1024*1024",
                    "prompt_extend": true,
                    "watermark": false
                }
            })
        );
    }

    #[test]
    fn test_image_edit_payload() {
        let request = builder()
            .build(
                Category::ImageToImage,
                "wanx2.1-imageedit",
                &GenerationInput::new("make it snowy").with_image("https://cdn/x.png"),
                &json!({"function": "stylization_all"}).as_object().cloned().unwrap(),
            )
            .unwrap();

        assert_eq!(request.endpoint, "/services/aigc/image2image/image-synthesis");
        assert_eq!(request.body["input"]["function"], "stylization_all");
        assert_eq!(request.body["input"]["base_image_url"], "https://cdn/x.png");
        assert!(request.body["parameters"].get("function").is_none());
        assert!(request.body["parameters"].get("prompt").is_none());
    }

    #[test]
    fn test_image_to_video_payload() {
        let request = builder()
            .build(
                Category::ImageToVideo,
                "wan2.2-i2v-plus",
                &GenerationInput::new("the cat jumps").with_image("https://cdn/cat.png"),
                &Params::new(),
            )
            .unwrap();

        assert_eq!(request.endpoint, "/services/aigc/video-generation/video-synthesis");
        assert_eq!(request.body["input"]["img_url"], "https://cdn/cat.png");
        assert_eq!(request.body["parameters"]["resolution"], "1080P");
        assert_eq!(request.body["parameters"]["duration"], 5);
    }

    #[test]
    fn test_reference_to_video_payload() {
        let request = builder()
            .build(
                Category::ReferenceToVideo,
                "wanx2.1-vace-plus",
                &GenerationInput::new("two friends wave")
                    .with_reference("https://cdn/a.png")
                    .with_reference("https://cdn/b.png"),
                &json!({"seed": 1}).as_object().cloned().unwrap(),
            )
            .unwrap();

        assert_eq!(request.body["input"]["function"], "image_reference");
        assert_eq!(
            request.body["input"]["ref_images_url"],
            json!(["https://cdn/a.png", "https://cdn/b.png"])
        );
        assert_eq!(request.body["parameters"]["obj_or_bg"], json!(["obj", "obj"]));
    }
}
