//! Error types for the drone fleet domain

use thiserror::Error;

/// Core error type for the drone fleet domain
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Drone not found: {0}")]
    DroneNotFound(String),

    #[error("Mission not found: {0}")]
    MissionNotFound(String),

    #[error("Invalid position: latitude={lat}, longitude={lng}")]
    InvalidPosition { lat: f64, lng: f64 },

    #[error("Invalid battery level: {0} (expected 0-100)")]
    InvalidBattery(f64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },
}

impl CoreError {
    pub fn drone_not_found(id: impl Into<String>) -> Self {
        Self::DroneNotFound(id.into())
    }

    pub fn mission_not_found(id: impl Into<String>) -> Self {
        Self::MissionNotFound(id.into())
    }

    pub fn invalid_position(lat: f64, lng: f64) -> Self {
        Self::InvalidPosition { lat, lng }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
