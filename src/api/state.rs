use crate::chat::CompletionStreamer;
use crate::core::AppConfig;
use crate::core::db::Database;

pub struct AppState {
    pub db: Database,
    pub streamer: CompletionStreamer,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(db: Database, streamer: CompletionStreamer, config: AppConfig) -> Self {
        Self {
            db,
            streamer,
            config,
        }
    }
}
