//! Error types for the Tether reflection pipeline
//!
//! Errors are structured with fields to aid debugging in production. Each
//! variant carries the context the failure is scoped to (an address, a node,
//! a remote authority), and every error is scoped to a single resource's
//! reflection cycle - nothing here is fatal to the process.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for Tether operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Missing or malformed topology configuration
    #[error("configuration error [{context}]: {message}")]
    Configuration {
        /// Description of what's missing or malformed
        message: String,
        /// Context where the error occurred (e.g., "identity", "directory")
        context: String,
    },

    /// Non-IPv4 or otherwise unusable address/CIDR input
    #[error("address format error: {message}")]
    AddressFormat {
        /// Description of what's wrong with the input
        message: String,
        /// The offending address or CIDR, when known
        input: Option<String>,
    },

    /// Node or cluster-record resolution failure
    #[error("lookup error for {subject}: {message}")]
    Lookup {
        /// The node or record the lookup was about
        subject: String,
        /// Description of what failed
        message: String,
    },

    /// Failure of a remote authority (IPAM mapper, connection directory)
    #[error("remote error [{authority}]: {message}")]
    Remote {
        /// The authority that failed (e.g., "ipam")
        authority: String,
        /// Description of what failed
        message: String,
    },
}

impl Error {
    /// Create a configuration error without specific context
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create a configuration error with context
    pub fn configuration_in(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Create an address format error without the offending input
    pub fn address_format(msg: impl Into<String>) -> Self {
        Self::AddressFormat {
            message: msg.into(),
            input: None,
        }
    }

    /// Create an address format error recording the offending input
    pub fn address_format_for(input: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::AddressFormat {
            message: msg.into(),
            input: Some(input.into()),
        }
    }

    /// Create a lookup error for a node or record
    pub fn lookup(subject: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Lookup {
            subject: subject.into(),
            message: msg.into(),
        }
    }

    /// Create a remote-authority error
    pub fn remote(authority: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Remote {
            authority: authority.into(),
            message: msg.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Configuration and address format errors are not retryable (require a
    /// topology or input fix). Lookup failures resolve to a conservative
    /// filtering decision instead of a retry. Remote errors are retryable:
    /// the surrounding reconciliation loop is expected to re-queue.
    /// Kubernetes errors depend on the status code.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => {
                // Retry on transient K8s errors (connection, timeout).
                // Don't retry on 4xx errors (validation, not found, etc.)
                !matches!(
                    source,
                    kube::Error::Api(ae) if (400..500).contains(&ae.code)
                )
            }
            Error::Configuration { .. } => false,
            Error::AddressFormat { .. } => false,
            Error::Lookup { .. } => false,
            Error::Remote { .. } => true,
        }
    }

    /// Get the context if this error has one
    pub fn context(&self) -> Option<&str> {
        match self {
            Error::Configuration { context, .. } => Some(context),
            Error::Remote { authority, .. } => Some(authority),
            _ => None,
        }
    }

    /// Get the offending input if this error recorded one
    pub fn input(&self) -> Option<&str> {
        match self {
            Error::AddressFormat { input, .. } => input.as_deref(),
            _ => None,
        }
    }
}
