use relay_core::config::{ServiceConfig, ServiceDefaults};

pub const MODERATION_DEFAULTS: ServiceDefaults = ServiceDefaults {
    service_name: "moderation",
    env_prefix: "MODERATION_",
    bind_address: "0.0.0.0:5000",
    peer_url_key: "SUBMISSION_URL",
    peer_url: "http://127.0.0.1:5001",
};

/// Configuration for the moderation service; `peer_url` is where approval
/// callbacks go.
pub type ModerationServiceConfig = ServiceConfig;
