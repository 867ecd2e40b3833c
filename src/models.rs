use derive_more::From;
use serde::{Deserialize, Serialize};

use crate::{targeting::TargetingPredicate, Str};

#[allow(missing_docs)]
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Who is asking for an advertisement and where it will be rendered.
///
/// Immutable once constructed and cheap to clone, so it can be shared read-only between
/// concurrent predicate evaluations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// Customer the advertisement is generated for. May be blank for unrecognized
    /// visitors; blankness is a targetable attribute, not an input error.
    pub customer_id: Str,
    /// Marketplace the advertisement will be rendered on.
    pub marketplace_id: Str,
}

impl RequestContext {
    /// Create a request context.
    pub fn new(customer_id: impl Into<Str>, marketplace_id: impl Into<Str>) -> RequestContext {
        RequestContext {
            customer_id: customer_id.into(),
            marketplace_id: marketplace_id.into(),
        }
    }

    /// A recognized request carries a non-blank customer id.
    pub fn is_recognized(&self) -> bool {
        !self.customer_id.is_blank()
    }
}

/// A piece of renderable advertisement content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvertisementContent {
    /// Unique within a marketplace.
    pub content_id: Str,
    /// Payload handed to the rendering layer as-is.
    pub renderable_content: String,
    #[allow(missing_docs)]
    pub marketplace_id: Str,
}

/// A bundle of targeting predicates plus a click-through-rate score, qualifying one
/// advertisement content for an audience segment.
///
/// One content may have any number of targeting groups: different rules and scores for
/// different audiences.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetingGroup {
    #[allow(missing_docs)]
    pub targeting_group_id: Str,
    /// The content this group qualifies.
    pub content_id: Str,
    /// Ranking score used to pick among eligible groups.
    pub click_through_rate: f64,
    /// All predicates must evaluate to true for the group to qualify. An empty list is
    /// vacuously satisfied.
    #[serde(default)]
    pub targeting_predicates: Vec<TargetingPredicate>,
}

/// Result of advertisement selection.
///
/// "No advertisement" is a first-class variant rather than an absent value, so callers
/// can always render the result without dereferencing content that is not there.
#[derive(Debug, Clone, PartialEq, From, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GeneratedAdvertisement {
    /// An advertisement customized for the request.
    #[from]
    Advertisement(AdvertisementContent),
    /// No advertisement is available or eligible.
    Empty,
}

impl GeneratedAdvertisement {
    /// Returns `true` for the empty sentinel.
    pub fn is_empty(&self) -> bool {
        matches!(self, GeneratedAdvertisement::Empty)
    }

    /// The selected content, if any.
    pub fn content(&self) -> Option<&AdvertisementContent> {
        match self {
            GeneratedAdvertisement::Advertisement(content) => Some(content),
            GeneratedAdvertisement::Empty => None,
        }
    }
}
