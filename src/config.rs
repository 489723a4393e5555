use std::env;

pub struct Config {
    pub database_url: String,
    pub frontend_origin: String,
    /// Base URL of the internal operations service that receives action side
    /// effects (task creation, notifications, alerts, ...).
    pub effects_base_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let frontend_origin = env::var("FRONTEND_ORIGIN").expect("FRONTEND_ORIGIN must be set");

        let effects_base_url = env::var("EFFECTS_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:4100/internal".to_string());

        Config {
            database_url,
            frontend_origin,
            effects_base_url,
        }
    }
}
