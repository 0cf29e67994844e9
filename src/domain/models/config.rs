use serde::{Deserialize, Serialize};

/// Main configuration structure for Remedy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Context type under which catalog strategies are learned
    #[serde(default = "default_context_type")]
    pub context_type: String,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Embedding provider and cache configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Attention router configuration
    #[serde(default)]
    pub router: RouterConfig,

    /// Evolution store configuration
    #[serde(default)]
    pub evolution: EvolutionConfig,

    /// Escalation ladder configuration
    #[serde(default)]
    pub escalation: EscalationConfig,

    /// Per-session healing budget
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Pending decision retention
    #[serde(default)]
    pub decisions: DecisionsConfig,

    /// Long-term corpus thresholds
    #[serde(default)]
    pub corpus: CorpusConfig,
}

fn default_context_type() -> String {
    "repair".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            context_type: default_context_type(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            embedding: EmbeddingConfig::default(),
            router: RouterConfig::default(),
            evolution: EvolutionConfig::default(),
            escalation: EscalationConfig::default(),
            budget: BudgetConfig::default(),
            decisions: DecisionsConfig::default(),
            corpus: CorpusConfig::default(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".remedy/remedy.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (stdout only when unset)
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EmbeddingConfig {
    /// Provider: "openai" (any OpenAI-compatible endpoint) or "hash"
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// Base URL of the embeddings API
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    /// Embedding model name
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Provider-declared dimensionality
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Dimension of fallback vectors when the provider declares none
    #[serde(default = "default_fallback_dimension")]
    pub fallback_dimension: usize,

    /// Bound on one embedding fan-out, in seconds
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum cached embeddings
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,

    /// Cached embedding time-to-live, in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

const fn default_embedding_dimension() -> usize {
    1536
}

const fn default_fallback_dimension() -> usize {
    64
}

const fn default_embedding_timeout_secs() -> u64 {
    30
}

const fn default_cache_capacity() -> u64 {
    10_000
}

const fn default_cache_ttl_secs() -> u64 {
    3600
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            fallback_dimension: default_fallback_dimension(),
            timeout_secs: default_embedding_timeout_secs(),
            cache_capacity: default_cache_capacity(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// Attention router configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RouterConfig {
    /// Winners below this weight are overridden by the default strategy
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f64,

    /// Softmax temperature applied to scaled dot products
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

const fn default_confidence_floor() -> f64 {
    0.15
}

const fn default_temperature() -> f64 {
    0.1
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            confidence_floor: default_confidence_floor(),
            temperature: default_temperature(),
        }
    }
}

/// Evolution store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EvolutionConfig {
    /// EMA decay factor in (0, 1]
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// Samples at which learned values get half the blend weight
    #[serde(default = "default_saturation_samples")]
    pub saturation_samples: f64,

    /// Success rate below which an option is an anti-pattern
    #[serde(default = "default_anti_pattern_threshold")]
    pub anti_pattern_threshold: f64,

    /// Samples required before an option can be flagged
    #[serde(default = "default_anti_pattern_min_samples")]
    pub anti_pattern_min_samples: u64,
}

const fn default_alpha() -> f64 {
    0.2
}

const fn default_saturation_samples() -> f64 {
    5.0
}

const fn default_anti_pattern_threshold() -> f64 {
    0.4
}

const fn default_anti_pattern_min_samples() -> u64 {
    3
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            saturation_samples: default_saturation_samples(),
            anti_pattern_threshold: default_anti_pattern_threshold(),
            anti_pattern_min_samples: default_anti_pattern_min_samples(),
        }
    }
}

/// Escalation ladder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EscalationConfig {
    /// Retries at which exploratory mode starts
    #[serde(default = "default_explore_after")]
    pub explore_after: u32,

    /// Retries at which transformational mode starts
    #[serde(default = "default_transform_after")]
    pub transform_after: u32,

    /// Cross-archetype matches kept
    #[serde(default = "default_exploratory_max_results")]
    pub exploratory_max_results: usize,

    /// Scaled score a cross-archetype match must exceed
    #[serde(default)]
    pub exploratory_min_score: f64,

    /// Solved cases scanned per exploratory search
    #[serde(default = "default_exploratory_corpus_limit")]
    pub exploratory_corpus_limit: usize,

    /// Anti-patterns consulted per standard decision
    #[serde(default = "default_anti_pattern_limit")]
    pub anti_pattern_limit: usize,
}

const fn default_explore_after() -> u32 {
    2
}

const fn default_transform_after() -> u32 {
    4
}

const fn default_exploratory_max_results() -> usize {
    3
}

const fn default_exploratory_corpus_limit() -> usize {
    50
}

const fn default_anti_pattern_limit() -> usize {
    10
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            explore_after: default_explore_after(),
            transform_after: default_transform_after(),
            exploratory_max_results: default_exploratory_max_results(),
            exploratory_min_score: 0.0,
            exploratory_corpus_limit: default_exploratory_corpus_limit(),
            anti_pattern_limit: default_anti_pattern_limit(),
        }
    }
}

/// Healing budget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BudgetConfig {
    #[serde(default = "default_llm_calls")]
    pub llm_calls: u32,

    #[serde(default = "default_critical_regens")]
    pub critical_regens: u32,

    #[serde(default = "default_docker_restarts")]
    pub docker_restarts: u32,

    /// Audit entries kept per session
    #[serde(default = "default_audit_log_capacity")]
    pub audit_log_capacity: usize,
}

const fn default_llm_calls() -> u32 {
    6
}

const fn default_critical_regens() -> u32 {
    2
}

const fn default_docker_restarts() -> u32 {
    3
}

const fn default_audit_log_capacity() -> usize {
    100
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            llm_calls: default_llm_calls(),
            critical_regens: default_critical_regens(),
            docker_restarts: default_docker_restarts(),
            audit_log_capacity: default_audit_log_capacity(),
        }
    }
}

/// Pending decision retention
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DecisionsConfig {
    /// Seconds a PENDING decision is kept before eviction
    #[serde(default = "default_pending_ttl_secs")]
    pub pending_ttl_secs: u64,

    /// Maximum PENDING decisions held
    #[serde(default = "default_max_pending")]
    pub max_pending: u64,
}

const fn default_pending_ttl_secs() -> u64 {
    86_400
}

const fn default_max_pending() -> u64 {
    10_000
}

impl Default for DecisionsConfig {
    fn default() -> Self {
        Self {
            pending_ttl_secs: default_pending_ttl_secs(),
            max_pending: default_max_pending(),
        }
    }
}

/// Long-term corpus thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CorpusConfig {
    /// Quality at or above which successes enter the success corpus
    #[serde(default = "default_success_quality_threshold")]
    pub success_quality_threshold: f64,

    /// Quality below which failures enter the anti-pattern corpus
    #[serde(default = "default_anti_pattern_quality_threshold")]
    pub anti_pattern_quality_threshold: f64,
}

const fn default_success_quality_threshold() -> f64 {
    8.0
}

const fn default_anti_pattern_quality_threshold() -> f64 {
    3.0
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            success_quality_threshold: default_success_quality_threshold(),
            anti_pattern_quality_threshold: default_anti_pattern_quality_threshold(),
        }
    }
}
