use relay_core::config::{ServiceConfig, ServiceDefaults};

/// Keys are read with the `SUBMISSION_` prefix first, then unprefixed.
pub const SUBMISSION_DEFAULTS: ServiceDefaults = ServiceDefaults {
    service_name: "submission",
    env_prefix: "SUBMISSION_",
    bind_address: "0.0.0.0:5001",
    peer_url_key: "MODERATION_URL",
    peer_url: "http://127.0.0.1:5000",
};

/// Configuration for the submission service; `peer_url` is moderation.
pub type SubmissionServiceConfig = ServiceConfig;
