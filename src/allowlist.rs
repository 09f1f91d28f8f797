// src/allowlist.rs
// Known-benign ERPNext rejection messages. A rejection whose text contains
// one of these is logged and skipped; anything else aborts the device batch.

use thiserror::Error;

pub const EMPLOYEE_NOT_FOUND: &str = "No Employee found for the given employee field value";
pub const EMPLOYEE_INACTIVE: &str = "Transactions cannot be created for an Inactive Employee";
pub const DUPLICATE_CHECKIN: &str = "This employee already has a log with the same timestamp";

const KNOWN_ERRORS: [&str; 3] = [EMPLOYEE_NOT_FOUND, EMPLOYEE_INACTIVE, DUPLICATE_CHECKIN];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllowlistError {
    #[error("allowed_exceptions index {0} is out of range (valid: 1..={max})", max = KNOWN_ERRORS.len())]
    IndexOutOfRange(usize),
}

/// The set of rejection messages that may be skipped without aborting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorAllowlist {
    entries: Vec<String>,
}

impl Default for ErrorAllowlist {
    fn default() -> Self {
        Self {
            entries: KNOWN_ERRORS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl ErrorAllowlist {
    /// Narrow the allowlist to a subset of the known errors, selected by
    /// 1-based index. Back-compat convenience for existing configurations
    /// (`allowed_exceptions = [1, 3]`).
    pub fn from_selection(indices: &[usize]) -> Result<Self, AllowlistError> {
        let mut entries = Vec::with_capacity(indices.len());
        for &i in indices {
            let entry = KNOWN_ERRORS
                .get(i.wrapping_sub(1))
                .ok_or(AllowlistError::IndexOutOfRange(i))?;
            entries.push((*entry).to_string());
        }
        Ok(Self { entries })
    }

    /// Substring match against the downstream's free-text rejection reason.
    pub fn is_allowlisted(&self, message: &str) -> bool {
        self.entries.iter().any(|e| message.contains(e))
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}
