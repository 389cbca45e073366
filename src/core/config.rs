use std::env;

pub const DEFAULT_MODELS: [&str; 5] = [
    "llama3.2:1b",
    "llama3.2:3b",
    "llama3.1:8b",
    "falcon:7b",
    "HridaAI/hrida-t2sql-128k:latest",
];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage_path: String,
    pub db_path: String,
    pub ollama_api_hostname: String,
    /// Models that are installed locally. Anything else is rejected
    /// before a request is made.
    pub models: Vec<String>,
    pub default_model: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let storage_path = env::var("PARLEY_STORAGE_PATH").unwrap_or("./".to_string());
        let db_path = format!("{}/parley.db", storage_path.trim_end_matches('/'));
        let ollama_api_hostname = env::var("PARLEY_OLLAMA_HOST")
            .unwrap_or_else(|_| "http://localhost:11434".to_string());
        let models = env::var("PARLEY_MODELS")
            .map(|val| parse_model_list(&val))
            .unwrap_or_else(|_| DEFAULT_MODELS.iter().map(|m| m.to_string()).collect());
        let default_model = env::var("PARLEY_DEFAULT_MODEL")
            .ok()
            .or_else(|| models.first().cloned())
            .unwrap_or_else(|| DEFAULT_MODELS[0].to_string());

        Self {
            storage_path,
            db_path,
            ollama_api_hostname,
            models,
            default_model,
        }
    }
}

fn parse_model_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
        .collect()
}
