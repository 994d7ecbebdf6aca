//! Failure taxonomy with permanence classification
//!
//! A failure kind is either permanent (retrying can never resolve it, the
//! task is excluded from selection forever) or transient (the task re-enters
//! the pool once its delay elapses). The default taxonomy below is seeded
//! into the database at initialization; the permanence used at runtime is
//! always the seeded table's, so an operator can reclassify a code without
//! recompiling.

use std::fmt;

/// A failure recorded against a queued task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The task URL could not be parsed or resolved
    MalformedUrl,

    /// A commit or other database transaction failed
    TransactionFail,

    /// The fetch returned this HTTP status code
    Http(u16),
}

impl FailureKind {
    /// Converts the failure kind to its database code
    pub fn code(&self) -> String {
        match self {
            Self::MalformedUrl => "malformed_url".to_string(),
            Self::TransactionFail => "transaction_fail".to_string(),
            Self::Http(status) => format!("http_{}", status),
        }
    }

    /// Parses a failure kind from its database code
    pub fn from_code(s: &str) -> Option<Self> {
        match s {
            "malformed_url" => Some(Self::MalformedUrl),
            "transaction_fail" => Some(Self::TransactionFail),
            _ => s
                .strip_prefix("http_")
                .and_then(|digits| digits.parse::<u16>().ok())
                .map(Self::Http),
        }
    }

    /// Permanence according to the default taxonomy
    ///
    /// Returns None for codes the default taxonomy does not list (for
    /// example an exotic HTTP status). Such kinds cannot be recorded against
    /// a task unless an operator seeds a row for them first.
    pub fn default_permanence(&self) -> Option<bool> {
        let code = self.code();
        DEFAULT_FAILURE_TAXONOMY
            .iter()
            .find(|def| def.code == code)
            .map(|def| def.permanent)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One seeded row of the failure reference table
#[derive(Debug, Clone, Copy)]
pub struct FailureKindDef {
    pub code: &'static str,
    pub permanent: bool,
    pub description: &'static str,
}

/// The default failure taxonomy seeded at database initialization
///
/// 4xx statuses are permanent except those that signal a timing problem
/// (408, 429); 5xx statuses are transient.
pub const DEFAULT_FAILURE_TAXONOMY: &[FailureKindDef] = &[
    FailureKindDef {
        code: "malformed_url",
        permanent: true,
        description: "URL could not be parsed",
    },
    FailureKindDef {
        code: "transaction_fail",
        permanent: false,
        description: "database transaction failed, commit rolled back",
    },
    FailureKindDef {
        code: "http_400",
        permanent: true,
        description: "HTTP 400 Bad Request",
    },
    FailureKindDef {
        code: "http_401",
        permanent: true,
        description: "HTTP 401 Unauthorized",
    },
    FailureKindDef {
        code: "http_402",
        permanent: true,
        description: "HTTP 402 Payment Required",
    },
    FailureKindDef {
        code: "http_403",
        permanent: true,
        description: "HTTP 403 Forbidden",
    },
    FailureKindDef {
        code: "http_404",
        permanent: true,
        description: "HTTP 404 Not Found",
    },
    FailureKindDef {
        code: "http_405",
        permanent: true,
        description: "HTTP 405 Method Not Allowed",
    },
    FailureKindDef {
        code: "http_408",
        permanent: false,
        description: "HTTP 408 Request Timeout",
    },
    FailureKindDef {
        code: "http_410",
        permanent: true,
        description: "HTTP 410 Gone",
    },
    FailureKindDef {
        code: "http_414",
        permanent: true,
        description: "HTTP 414 URI Too Long",
    },
    FailureKindDef {
        code: "http_429",
        permanent: false,
        description: "HTTP 429 Too Many Requests",
    },
    FailureKindDef {
        code: "http_451",
        permanent: true,
        description: "HTTP 451 Unavailable For Legal Reasons",
    },
    FailureKindDef {
        code: "http_500",
        permanent: false,
        description: "HTTP 500 Internal Server Error",
    },
    FailureKindDef {
        code: "http_502",
        permanent: false,
        description: "HTTP 502 Bad Gateway",
    },
    FailureKindDef {
        code: "http_503",
        permanent: false,
        description: "HTTP 503 Service Unavailable",
    },
    FailureKindDef {
        code: "http_504",
        permanent: false,
        description: "HTTP 504 Gateway Timeout",
    },
];
