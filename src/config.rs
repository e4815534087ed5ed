use serde::{Deserialize, Serialize};

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub document_ai: DocumentAiConfig,
    pub erpnext: ErpNextConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// 外部文档理解服务配置 (key-value extraction + classification)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentAiConfig {
    pub endpoint: String,
    pub api_key: String,
}

/// ERPNext 配置 (可选, 未配置时跳过同步)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErpNextConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
}

impl ErpNextConfig {
    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://invoices.db".to_string()),
            },
            document_ai: DocumentAiConfig {
                endpoint: String::new(),
                api_key: String::new(),
            },
            erpnext: ErpNextConfig {
                base_url: String::new(),
                api_key: String::new(),
                api_secret: String::new(),
            },
        }
    }
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("SERVER_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8080),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://invoices.db".to_string()),
            },
            document_ai: DocumentAiConfig {
                endpoint: std::env::var("DOC_AI_ENDPOINT").unwrap_or_default(),
                api_key: std::env::var("DOC_AI_API_KEY").unwrap_or_default(),
            },
            erpnext: ErpNextConfig {
                base_url: std::env::var("ERPNEXT_BASE_URL").unwrap_or_default(),
                api_key: std::env::var("ERPNEXT_API_KEY").unwrap_or_default(),
                api_secret: std::env::var("ERPNEXT_API_SECRET").unwrap_or_default(),
            },
        }
    }
}
