//! Built-in model catalogue.

use crate::error::Result;
use crate::registry::types::{
    Capabilities, Category, ModelDescriptor, ParameterSpec, ProviderKind, SizeConstraint,
    SubmissionStyle,
};
use crate::registry::{Registry, RegistryBuilder};

const MAX_SEED: f64 = 2_147_483_647.0;

/// Returns the catalogue of models shipped with the crate, in display order.
pub fn builtin_models() -> Vec<ModelDescriptor> {
    vec![
        qwen_plus(),
        gpt_4o_mini(),
        wan_t2i_flash(),
        seedream_t2i(),
        gpt_image_1(),
        wanx_image_edit(),
        wan_i2v_plus(),
        seedance_pro_i2v(),
        seedance_lite_i2v(),
        wan_t2v_plus(),
        seedance_lite_t2v(),
        wan_vace_plus(),
    ]
}

/// Builds a [`Registry`] holding [`builtin_models`].
pub fn builtin() -> Result<Registry> {
    builtin_models()
        .into_iter()
        .fold(RegistryBuilder::new(), |builder, model| builder.model(model))
        .build()
}

fn seed() -> ParameterSpec {
    ParameterSpec::integer("seed")
        .range(0.0, MAX_SEED)
        .describe("Random seed; members of a group use seed, seed+1, ...")
}

fn prompt(max_len: usize) -> ParameterSpec {
    ParameterSpec::string("prompt").required().length(1, max_len)
}

fn negative_prompt() -> ParameterSpec {
    ParameterSpec::string("negative_prompt").length(0, 500)
}

fn watermark(default: bool) -> ParameterSpec {
    ParameterSpec::boolean("watermark").default_value(default)
}

fn prompt_extend() -> ParameterSpec {
    ParameterSpec::boolean("prompt_extend")
        .default_value(true)
        .describe("Let the provider rewrite the prompt")
}

fn qwen_plus() -> ModelDescriptor {
    ModelDescriptor {
        id: "qwen-plus".into(),
        name: "Qwen Plus".into(),
        category: Category::Text,
        version: "2025-07-28".into(),
        provider: ProviderKind::DashScope,
        style: SubmissionStyle::Blocking,
        capabilities: Capabilities {
            streaming: true,
            thinking: true,
            search: true,
            json_output: true,
            ..Default::default()
        },
        parameters: vec![
            prompt(30_000),
            ParameterSpec::string("system").length(0, 10_000),
            ParameterSpec::float("temperature").range(0.0, 2.0).default_value(0.7),
            ParameterSpec::float("top_p").range(0.0, 1.0).default_value(0.8),
            ParameterSpec::integer("max_tokens").range(1.0, 16_384.0),
            ParameterSpec::boolean("enable_thinking").default_value(false),
            ParameterSpec::integer("thinking_budget")
                .range(1.0, 38_912.0)
                .only_when("enable_thinking", true),
            ParameterSpec::boolean("enable_search").default_value(false),
            ParameterSpec::one_of("response_format", &["text", "json_object"]).default_value("text"),
        ],
        size: None,
    }
}

fn gpt_4o_mini() -> ModelDescriptor {
    ModelDescriptor {
        id: "gpt-4o-mini".into(),
        name: "GPT-4o mini".into(),
        category: Category::Text,
        version: "2024-07-18".into(),
        provider: ProviderKind::OpenAi,
        style: SubmissionStyle::Blocking,
        capabilities: Capabilities {
            streaming: true,
            json_output: true,
            seed: true,
            ..Default::default()
        },
        parameters: vec![
            prompt(100_000),
            ParameterSpec::string("system"),
            ParameterSpec::float("temperature").range(0.0, 2.0).default_value(1.0),
            ParameterSpec::integer("max_tokens").range(1.0, 16_384.0),
            seed(),
            ParameterSpec::one_of("response_format", &["text", "json_object"]).default_value("text"),
        ],
        size: None,
    }
}

fn wan_t2i_flash() -> ModelDescriptor {
    ModelDescriptor {
        id: "wan2.2-t2i-flash".into(),
        name: "Wan 2.2 Text-to-Image Flash".into(),
        category: Category::TextToImage,
        version: "2.2".into(),
        provider: ProviderKind::DashScope,
        style: SubmissionStyle::AsyncHttpPoll,
        capabilities: Capabilities {
            seed: true,
            watermark: true,
            prompt_extend: true,
            ..Default::default()
        },
        parameters: vec![
            prompt(800),
            negative_prompt(),
            ParameterSpec::integer("n").range(1.0, 4.0).default_value(1),
            ParameterSpec::string("size")
                .default_value("1024*1024")
                .only_when("n", 1)
                .describe("Custom output size, honoured only for single-image requests"),
            seed(),
            prompt_extend(),
            watermark(false),
        ],
        size: Some(SizeConstraint {
            min_pixels: 512 * 512,
            max_pixels: 1440 * 1440,
            min_aspect: 0.25,
            max_aspect: 4.0,
        }),
    }
}

fn seedream_t2i() -> ModelDescriptor {
    ModelDescriptor {
        id: "doubao-seedream-3-0-t2i-250415".into(),
        name: "Seedream 3.0".into(),
        category: Category::TextToImage,
        version: "3.0".into(),
        provider: ProviderKind::Ark,
        style: SubmissionStyle::Blocking,
        capabilities: Capabilities {
            seed: true,
            watermark: true,
            ..Default::default()
        },
        parameters: vec![
            prompt(1_000),
            ParameterSpec::string("size").default_value("1024x1024"),
            seed(),
            ParameterSpec::float("guidance_scale").range(1.0, 10.0).default_value(2.5),
            watermark(true),
        ],
        size: Some(SizeConstraint {
            min_pixels: 512 * 512,
            max_pixels: 2048 * 2048,
            min_aspect: 1.0 / 3.0,
            max_aspect: 3.0,
        }),
    }
}

fn gpt_image_1() -> ModelDescriptor {
    ModelDescriptor {
        id: "gpt-image-1".into(),
        name: "GPT Image 1".into(),
        category: Category::TextToImage,
        version: "1".into(),
        provider: ProviderKind::OpenAi,
        style: SubmissionStyle::Blocking,
        capabilities: Capabilities::default(),
        parameters: vec![
            prompt(32_000),
            ParameterSpec::one_of("size", &["1024x1024", "1536x1024", "1024x1536", "auto"])
                .default_value("1024x1024"),
            ParameterSpec::one_of("quality", &["low", "medium", "high", "auto"]).default_value("auto"),
            ParameterSpec::one_of("background", &["transparent", "opaque", "auto"]),
        ],
        size: None,
    }
}

fn wanx_image_edit() -> ModelDescriptor {
    ModelDescriptor {
        id: "wanx2.1-imageedit".into(),
        name: "Wanx 2.1 Image Edit".into(),
        category: Category::ImageToImage,
        version: "2.1".into(),
        provider: ProviderKind::DashScope,
        style: SubmissionStyle::AsyncHttpPoll,
        capabilities: Capabilities {
            seed: true,
            watermark: true,
            ..Default::default()
        },
        parameters: vec![
            prompt(800),
            ParameterSpec::one_of(
                "function",
                &[
                    "stylization_all",
                    "stylization_local",
                    "description_edit",
                    "description_edit_with_mask",
                    "remove_watermark",
                    "expand",
                    "super_resolution",
                    "colorization",
                    "doodle",
                    "control_cartoon_feature",
                ],
            )
            .default_value("description_edit"),
            ParameterSpec::integer("n").range(1.0, 4.0).default_value(1),
            ParameterSpec::float("strength").range(0.0, 1.0).default_value(0.5),
            seed(),
            watermark(false),
        ],
        size: None,
    }
}

fn wan_i2v_plus() -> ModelDescriptor {
    ModelDescriptor {
        id: "wan2.2-i2v-plus".into(),
        name: "Wan 2.2 Image-to-Video Plus".into(),
        category: Category::ImageToVideo,
        version: "2.2".into(),
        provider: ProviderKind::DashScope,
        style: SubmissionStyle::AsyncHttpPoll,
        capabilities: Capabilities {
            seed: true,
            watermark: true,
            prompt_extend: true,
            ..Default::default()
        },
        parameters: vec![
            ParameterSpec::string("prompt").length(0, 800),
            negative_prompt(),
            ParameterSpec::one_of("resolution", &["480P", "1080P"]).default_value("1080P"),
            ParameterSpec::one_of_int("duration", &[5]).default_value(5),
            seed(),
            prompt_extend(),
            watermark(false),
        ],
        size: None,
    }
}

fn seedance_params(default_ratio: &str) -> Vec<ParameterSpec> {
    vec![
        ParameterSpec::string("prompt").length(0, 2_000),
        ParameterSpec::one_of("resolution", &["480p", "720p", "1080p"]).default_value("720p"),
        ParameterSpec::one_of("ratio", &["16:9", "4:3", "1:1", "3:4", "9:16", "21:9", "adaptive"])
            .default_value(default_ratio),
        ParameterSpec::one_of_int("duration", &[5, 10]).default_value(5),
        ParameterSpec::one_of_int("fps", &[24]).default_value(24),
        seed(),
        ParameterSpec::boolean("camera_fixed").default_value(false),
        watermark(false),
    ]
}

fn seedance_pro_i2v() -> ModelDescriptor {
    ModelDescriptor {
        id: "doubao-seedance-1-0-pro-250528".into(),
        name: "Seedance 1.0 Pro".into(),
        category: Category::ImageToVideo,
        version: "1.0".into(),
        provider: ProviderKind::Ark,
        style: SubmissionStyle::SdkManagedPoll,
        capabilities: Capabilities {
            seed: true,
            watermark: true,
            ..Default::default()
        },
        parameters: seedance_params("adaptive"),
        size: None,
    }
}

fn seedance_lite_i2v() -> ModelDescriptor {
    ModelDescriptor {
        id: "doubao-seedance-1-0-lite-i2v-250428".into(),
        name: "Seedance 1.0 Lite I2V".into(),
        ..seedance_pro_i2v()
    }
}

fn seedance_lite_t2v() -> ModelDescriptor {
    ModelDescriptor {
        id: "doubao-seedance-1-0-lite-t2v-250428".into(),
        name: "Seedance 1.0 Lite T2V".into(),
        category: Category::TextToVideo,
        parameters: {
            let mut params = seedance_params("16:9");
            params[0] = prompt(2_000);
            params
        },
        ..seedance_pro_i2v()
    }
}

fn wan_t2v_plus() -> ModelDescriptor {
    ModelDescriptor {
        id: "wan2.2-t2v-plus".into(),
        name: "Wan 2.2 Text-to-Video Plus".into(),
        category: Category::TextToVideo,
        version: "2.2".into(),
        provider: ProviderKind::DashScope,
        style: SubmissionStyle::AsyncHttpPoll,
        capabilities: Capabilities {
            seed: true,
            watermark: true,
            prompt_extend: true,
            ..Default::default()
        },
        parameters: vec![
            prompt(800),
            negative_prompt(),
            ParameterSpec::one_of(
                "size",
                &[
                    "1920*1080", "1080*1920", "1440*1440", "1632*1248", "1248*1632", "832*480",
                    "480*832", "624*624",
                ],
            )
            .default_value("1920*1080"),
            ParameterSpec::one_of_int("duration", &[5]).default_value(5),
            seed(),
            prompt_extend(),
            watermark(false),
        ],
        size: None,
    }
}

fn wan_vace_plus() -> ModelDescriptor {
    ModelDescriptor {
        id: "wanx2.1-vace-plus".into(),
        name: "Wanx 2.1 VACE Plus (reference to video)".into(),
        category: Category::ReferenceToVideo,
        version: "2.1".into(),
        provider: ProviderKind::DashScope,
        style: SubmissionStyle::AsyncHttpPoll,
        capabilities: Capabilities {
            seed: true,
            watermark: true,
            prompt_extend: true,
            ..Default::default()
        },
        parameters: vec![
            prompt(800),
            ParameterSpec::one_of("obj_or_bg", &["obj", "bg"]).default_value("obj"),
            ParameterSpec::one_of("size", &["1280*720", "720*1280", "960*960", "832*1088", "1088*832"])
                .default_value("1280*720"),
            ParameterSpec::one_of_int("duration", &[5]).default_value(5),
            seed(),
            prompt_extend(),
            watermark(false),
        ],
        size: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::validate::validate_params;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_ids_unique() {
        let models = builtin_models();
        let ids: HashSet<_> = models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids.len(), models.len());
    }

    #[test]
    fn test_every_category_covered() {
        let models = builtin_models();
        for category in Category::ALL {
            assert!(
                models.iter().any(|m| m.category == category),
                "no model for {category}"
            );
        }
    }

    #[test]
    fn test_defaults_satisfy_their_own_specs() {
        for model in builtin_models() {
            let mut params = crate::registry::Params::new();
            for spec in &model.parameters {
                if let Some(default) = &spec.default {
                    params.insert(spec.name.clone(), default.clone());
                }
            }
            params.insert("prompt".into(), "a lighthouse at dawn".into());
            let report = validate_params(&model, &params);
            assert!(report.is_ok(), "{}: {:?}", model.id, report.errors);
        }
    }

    #[test]
    fn test_all_three_styles_present() {
        let styles: HashSet<_> = builtin_models().iter().map(|m| m.style).collect();
        assert_eq!(styles.len(), 3);
    }
}
