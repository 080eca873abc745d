use thiserror::Error;

#[derive(Error, Debug)]
pub enum GroundPointError {
    #[error("Malformed table: {0}")]
    Format(String),

    #[error("Invalid argument: {0}")]
    Validation(String),

    #[error("{program} exited with status {status}:\n{output}")]
    ExternalTool {
        program: String,
        status: i32,
        output: String,
    },

    #[error("Join failure on point id: {0}")]
    Join(String),

    #[error("ODE service error: {0}")]
    OdeService(String),

    #[error("HTTP ureq error: {0}")]
    UreqHttpError(#[from] ureq::Error),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl PartialEq for GroundPointError {
    fn eq(&self, other: &Self) -> bool {
        use GroundPointError::*;
        match (self, other) {
            (Format(a), Format(b)) => a == b,
            (Validation(a), Validation(b)) => a == b,
            (Join(a), Join(b)) => a == b,
            (OdeService(a), OdeService(b)) => a == b,
            (
                ExternalTool {
                    program: pa,
                    status: sa,
                    ..
                },
                ExternalTool {
                    program: pb,
                    status: sb,
                    ..
                },
            ) => pa == pb && sa == sb,

            // Foreign error payloads are not comparable: equal if same variant
            (UreqHttpError(_), UreqHttpError(_)) => true,
            (IoError(_), IoError(_)) => true,
            (CsvError(_), CsvError(_)) => true,
            (JsonError(_), JsonError(_)) => true,

            _ => false,
        }
    }
}
