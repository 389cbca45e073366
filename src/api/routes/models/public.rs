//! Public types for the models API
use serde::Serialize;

#[derive(Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
    pub default_model: String,
}
