//! Response envelopes shared by every endpoint.

use serde::Deserialize;

use crate::models::Pagination;

use super::ApiError;

/// `{ success, data, message? }`
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    /// Unwrap the payload, treating `success: false` like a transport error.
    pub fn into_data(self) -> Result<T, ApiError> {
        if !self.success {
            return Err(ApiError::unsuccessful(self.message));
        }
        self.data
            .ok_or_else(|| ApiError::InvalidResponse("envelope has no data".to_string()))
    }

    /// Like `into_data` but an absent payload is fine (e.g. "no active logo").
    pub fn into_optional(self) -> Result<Option<T>, ApiError> {
        if !self.success {
            return Err(ApiError::unsuccessful(self.message));
        }
        Ok(self.data)
    }
}

/// `{ success, data, page, pages, total }`
#[derive(Debug, Deserialize)]
pub struct PagedEnvelope<T> {
    pub success: bool,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub pages: Option<u32>,
    #[serde(default)]
    pub total: Option<u64>,
}

impl<T> PagedEnvelope<T> {
    pub fn into_page(self) -> Result<(Vec<T>, Pagination), ApiError> {
        if !self.success {
            return Err(ApiError::unsuccessful(self.message));
        }
        let total = self.total.unwrap_or(self.data.len() as u64);
        let pagination = Pagination {
            page: self.page.unwrap_or(1),
            pages: self.pages.unwrap_or(if total == 0 { 0 } else { 1 }),
            total,
        };
        Ok((self.data, pagination))
    }
}
