/// Chat-completions model names and whether they accept image input.
#[derive(Clone, Debug)]
pub struct ModelInfo {
    pub name: &'static str,
    pub supports_vision: bool,
}

pub static GPT_4O_MINI: ModelInfo = ModelInfo {
    name: "gpt-4o-mini",
    supports_vision: true,
};

pub static GPT_4O: ModelInfo = ModelInfo {
    name: "gpt-4o",
    supports_vision: true,
};

pub static GPT_4_1_MINI: ModelInfo = ModelInfo {
    name: "gpt-4.1-mini",
    supports_vision: true,
};

pub static GPT_35_TURBO: ModelInfo = ModelInfo {
    name: "gpt-3.5-turbo",
    supports_vision: false,
};

static ALL_MODELS: &[&ModelInfo] = &[&GPT_4O_MINI, &GPT_4O, &GPT_4_1_MINI, &GPT_35_TURBO];

pub fn find_model(name: &str) -> Option<&'static ModelInfo> {
    ALL_MODELS.iter().find(|m| m.name == name).copied()
}

pub fn default_model() -> &'static ModelInfo {
    &GPT_4O_MINI
}
