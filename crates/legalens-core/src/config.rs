use std::collections::HashMap;

use anyhow::Result;

/// Full worker configuration.
/// Non-sensitive fields have defaults; API keys come from env/.env only.
#[derive(Debug, Clone)]
pub struct Config {
    // Persistence
    pub database_url: String,

    // Vector index
    pub qdrant_url: String,
    pub qdrant_collection: String,
    /// JSON file of precedents loaded into the index at startup (optional).
    pub precedents_seed_file: String,

    // LLM providers (a provider is enabled when its key is present)
    pub groq_api_key: String,
    pub groq_model: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub anthropic_api_key: String,
    pub anthropic_model: String,
    /// Preferred provider ("groq", "openai" or "anthropic"); the others
    /// become failover candidates in declaration order.
    pub llm_provider: String,
    pub embedding_model: String,

    // Documents
    pub documents_dir: String,

    // Worker tuning
    pub worker_tick_s: u64,
    pub worker_max_concurrent: u32,
    pub parallel_mode: bool,
    pub stage_timeout_s: u64,
}

fn parse_dotenv() -> HashMap<String, String> {
    let mut map = HashMap::new();
    let Ok(contents) = std::fs::read_to_string(".env") else {
        return map;
    };
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            map.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
    map
}

fn get(key: &str, dotenv: &HashMap<String, String>) -> Option<String> {
    std::env::var(key).ok().or_else(|| dotenv.get(key).cloned())
}

fn get_str(key: &str, dotenv: &HashMap<String, String>, default: &str) -> String {
    get(key, dotenv).unwrap_or_else(|| default.to_string())
}

fn get_bool(key: &str, dotenv: &HashMap<String, String>, default: bool) -> bool {
    match get(key, dotenv).as_deref() {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        Some(_) => default,
        None => default,
    }
}

fn get_u64(key: &str, dotenv: &HashMap<String, String>, default: u64) -> u64 {
    get(key, dotenv).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn get_u32(key: &str, dotenv: &HashMap<String, String>, default: u32) -> u32 {
    get(key, dotenv).and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let dotenv = parse_dotenv();

        Ok(Self {
            database_url: get_str(
                "DATABASE_URL",
                &dotenv,
                "host=localhost user=legalens dbname=legalens",
            ),
            qdrant_url: get_str("QDRANT_URI", &dotenv, "http://localhost:6333"),
            qdrant_collection: get_str("QDRANT_COLLECTION", &dotenv, "legal_precedents"),
            precedents_seed_file: get_str("PRECEDENTS_SEED_FILE", &dotenv, ""),
            groq_api_key: get_str("GROQ_API_KEY", &dotenv, ""),
            groq_model: get_str("GROQ_MODEL", &dotenv, "llama3-70b-8192"),
            openai_api_key: get_str("OPENAI_API_KEY", &dotenv, ""),
            openai_model: get_str("OPENAI_MODEL", &dotenv, "gpt-4o"),
            anthropic_api_key: get_str("ANTHROPIC_API_KEY", &dotenv, ""),
            anthropic_model: get_str("ANTHROPIC_MODEL", &dotenv, "claude-3-opus-20240229"),
            llm_provider: get_str("LLM_PROVIDER", &dotenv, "groq"),
            embedding_model: get_str("EMBEDDING_MODEL", &dotenv, "text-embedding-3-small"),
            documents_dir: get_str("DOCUMENTS_DIR", &dotenv, "store/documents"),
            worker_tick_s: get_u64("WORKER_TICK_S", &dotenv, 5),
            worker_max_concurrent: get_u32("WORKER_MAX_CONCURRENT", &dotenv, 4),
            parallel_mode: get_bool("PARALLEL_MODE", &dotenv, true),
            stage_timeout_s: get_u64(
                "STAGE_TIMEOUT_S",
                &dotenv,
                crate::workflow::DEFAULT_STAGE_TIMEOUT_S,
            ),
        })
    }
}
