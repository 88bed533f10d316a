use crate::config::TargetConfig;

pub const DEFAULT_PROMPT_TEMPLATE: &str = "You are an expert visual analyst for fashion and jewellery e-commerce. \
Describe this image in {min_words}-{max_words} words, objectively and concretely, \
covering: shot type, setting, style/mood, visible products, dominant colours, \
presence of a model and any other relevant elements. \
Do not invent metrics or content that is not in the image.";

/// Render the prompt sent with every image.
pub fn render_prompt(target: &TargetConfig) -> String {
    let template = target
        .prompt_template
        .as_deref()
        .unwrap_or(DEFAULT_PROMPT_TEMPLATE);

    template
        .replace("{min_words}", &target.min_words.to_string())
        .replace("{max_words}", &target.max_words.to_string())
}
