use thiserror::Error;

pub type CampaignResult<T> = Result<T, CampaignError>;

#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Missing required columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("Invalid value {value:?} for column '{column}' at row {row}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("Cluster not found: {0}")]
    SegmentNotFound(i64),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CampaignError {
    /// Errors caused by the uploaded data rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CampaignError::Schema { .. }
                | CampaignError::InvalidValue { .. }
                | CampaignError::DegenerateInput(_)
                | CampaignError::Csv(_)
        )
    }

    /// Stable machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            CampaignError::Schema { .. } => "schema_error",
            CampaignError::InvalidValue { .. } => "invalid_value",
            CampaignError::DegenerateInput(_) => "degenerate_input",
            CampaignError::SegmentNotFound(_) => "segment_not_found",
            CampaignError::Provider(_) => "provider_error",
            CampaignError::Config(_) => "config_error",
            CampaignError::Csv(_) => "malformed_csv",
            CampaignError::Internal(_) => "internal_error",
        }
    }
}

/// Failure of a single outbound provider call.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("provider rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("provider misconfigured: {0}")]
    Misconfigured(String),
}
