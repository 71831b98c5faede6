// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Two locations could not be aligned, or a location is not usable for the request.
    #[error("protocol error: {msg}")]
    Protocol { msg: String },

    #[error("invalid location [{location}]: {reason}")]
    InvalidLocation { location: String, reason: String },

    #[error("invalid argument: {msg}")]
    InvalidArgument { msg: String },

    #[error("multiple resource types have the same name [{name}]")]
    DuplicateResourceType { name: String },

    #[error("instance [{instance}] is already assigned to [{owner}], cannot reassign to [{requested}]")]
    AlreadyOwned {
        instance: String,
        owner: String,
        requested: String,
    },

    #[error("invalid interval {amount} {unit}: must be between 1 second and 365 days")]
    InvalidInterval { amount: u64, unit: String },

    #[error("endpoint [{endpoint}] is not ready: {reason}")]
    NotReady { endpoint: String, reason: String },

    #[error("cannot convert attribute [{attribute}]: {reason}")]
    Attribute { attribute: String, reason: String },

    #[error("driver error: {msg}")]
    Driver { msg: String },
}

impl Error {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol { msg: msg.into() }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument { msg: msg.into() }
    }

    pub fn driver(msg: impl Into<String>) -> Self {
        Error::Driver { msg: msg.into() }
    }

    /// Transient conditions the collector loop should not warn about.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Error::NotReady { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
