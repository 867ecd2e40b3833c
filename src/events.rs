//! Events describing selection outcomes.
//!
//! The core returns events to the caller instead of logging them itself; submit them to
//! your analytics storage for click-through-rate attribution.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{models::Timestamp, Str};

/// An advertisement was selected for a customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionEvent {
    /// Content that was selected.
    pub content_id: Str,
    /// Targeting group that qualified the content.
    pub targeting_group_id: Str,
    #[allow(missing_docs)]
    pub customer_id: Str,
    #[allow(missing_docs)]
    pub marketplace_id: Str,
    /// Score the winning group was ranked by.
    pub click_through_rate: f64,
    /// When the selection was made.
    pub timestamp: Timestamp,
    #[allow(missing_docs)]
    pub meta_data: HashMap<String, String>,
}
