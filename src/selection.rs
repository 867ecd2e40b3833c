//! Advertisement selection.
//!
//! [`AdvertisementSelector`] is responsible for picking the advertisement to be
//! rendered: it pulls the candidate contents and their targeting groups from the
//! collaborator stores, filters the groups through the [`TargetingEvaluator`], and
//! returns the eligible content with the highest click-through rate.

use std::{
    collections::{hash_map, HashMap},
    sync::Arc,
};

use chrono::Utc;
use serde::Serialize;

use crate::{
    error::Result,
    events::SelectionEvent,
    stores::{ContentStore, TargetingGroupStore},
    targeting::{GroupDisposition, TargetingEvaluator, TargetingEvaluatorConfig},
    AdvertisementContent, GeneratedAdvertisement, RequestContext, Str, TargetingGroup,
};

/// Configuration for [`AdvertisementSelector`].
pub struct AdvertisementSelectorConfig {
    /// Source of advertisement content, keyed by marketplace id.
    pub content_store: Arc<dyn ContentStore>,
    /// Source of targeting groups, keyed by content id.
    pub targeting_group_store: Arc<dyn TargetingGroupStore>,
    /// Worker-pool and deadline configuration for targeting evaluation.
    pub evaluator: TargetingEvaluatorConfig,
}

/// Picks the advertisement to be rendered for a (customer, marketplace) pair.
///
/// Eligible targeting groups are ranked by click-through rate descending; ties are
/// broken deterministically by lowest content id, then lowest targeting-group id, so
/// repeated selections with identical input are reproducible.
pub struct AdvertisementSelector {
    content_store: Arc<dyn ContentStore>,
    targeting_group_store: Arc<dyn TargetingGroupStore>,
    evaluator: TargetingEvaluator,
}

/// Evaluation outcome for one candidate targeting group.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupEvaluation {
    #[allow(missing_docs)]
    pub targeting_group_id: Str,
    #[allow(missing_docs)]
    pub content_id: Str,
    /// Why the group did or did not qualify. Timeouts show up here rather than as
    /// call errors.
    pub disposition: GroupDisposition,
}

/// Result of [`AdvertisementSelector::select_advertisement_details`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResult {
    /// The selected advertisement, or the empty sentinel.
    pub advertisement: GeneratedAdvertisement,
    /// Selection event that should be submitted to analytics storage, present iff an
    /// advertisement was selected.
    pub event: Option<SelectionEvent>,
    /// Evaluation outcome for every candidate targeting group, in candidate order.
    pub evaluations: Vec<GroupEvaluation>,
}

impl SelectionResult {
    fn empty(evaluations: Vec<GroupEvaluation>) -> SelectionResult {
        SelectionResult {
            advertisement: GeneratedAdvertisement::Empty,
            event: None,
            evaluations,
        }
    }
}

impl AdvertisementSelector {
    /// Create a selector.
    ///
    /// # Errors
    ///
    /// [`Error::Io`](crate::Error::Io) if the evaluation worker pool fails to start.
    pub fn new(config: AdvertisementSelectorConfig) -> Result<AdvertisementSelector> {
        let evaluator = TargetingEvaluator::with_config(config.evaluator)?;
        Ok(AdvertisementSelector {
            content_store: config.content_store,
            targeting_group_store: config.targeting_group_store,
            evaluator,
        })
    }

    /// Select the single best advertisement for the customer and marketplace.
    ///
    /// Returns the eligible content with the highest click-through rate, or the empty
    /// sentinel if no content is available or eligible. A blank marketplace id yields
    /// the empty sentinel without consulting any store.
    ///
    /// # Errors
    ///
    /// Store failures propagate unchanged as [`Error::Store`](crate::Error::Store).
    pub fn select_advertisement(
        &self,
        customer_id: &str,
        marketplace_id: &str,
    ) -> Result<GeneratedAdvertisement> {
        Ok(self
            .select_advertisement_details(customer_id, marketplace_id)?
            .advertisement)
    }

    /// Like [`select_advertisement`](AdvertisementSelector::select_advertisement),
    /// additionally reporting the selection event and per-group evaluation outcomes.
    pub fn select_advertisement_details(
        &self,
        customer_id: &str,
        marketplace_id: &str,
    ) -> Result<SelectionResult> {
        if marketplace_id.trim().is_empty() {
            log::warn!(target: "adselect",
                "marketplace id is blank, returning the empty advertisement");
            return Ok(SelectionResult::empty(Vec::new()));
        }

        let contents = self.content_store.get(marketplace_id)?;

        // Content ids are unique per marketplace, but the store is not trusted on
        // that: keep the first occurrence, in first-encounter order.
        let mut contents_by_id: HashMap<&str, &AdvertisementContent> =
            HashMap::with_capacity(contents.len());
        let mut content_ids: Vec<&Str> = Vec::with_capacity(contents.len());
        for content in &contents {
            if let hash_map::Entry::Vacant(slot) = contents_by_id.entry(&content.content_id) {
                let _ = slot.insert(content);
                content_ids.push(&content.content_id);
            }
        }

        let mut candidates: Vec<TargetingGroup> = Vec::new();
        for content_id in content_ids {
            candidates.extend(self.targeting_group_store.get(content_id)?);
        }

        let context = RequestContext::new(customer_id, marketplace_id);

        let evaluations: Vec<GroupEvaluation> = candidates
            .iter()
            .map(|group| GroupEvaluation {
                targeting_group_id: group.targeting_group_id.clone(),
                content_id: group.content_id.clone(),
                disposition: self.evaluator.disposition(&context, group),
            })
            .collect();

        let winner = candidates
            .iter()
            .zip(&evaluations)
            .filter(|(_, evaluation)| evaluation.disposition.is_eligible())
            .map(|(group, _)| group)
            .max_by(|a, b| rank(a, b));

        let Some(winner) = winner else {
            log::debug!(target: "adselect",
                customer_id = context.customer_id,
                marketplace_id = context.marketplace_id;
                "no eligible targeting group");
            return Ok(SelectionResult::empty(evaluations));
        };

        let Some(content) = contents_by_id.get(winner.content_id.as_ref()) else {
            // The targeting-group store returned a group for a content id it was not
            // asked about. Treated as no advertisement rather than a request failure.
            log::warn!(target: "adselect",
                targeting_group_id = winner.targeting_group_id,
                content_id = winner.content_id;
                "internal: winning targeting group references unknown content");
            return Ok(SelectionResult::empty(evaluations));
        };

        log::trace!(target: "adselect",
            customer_id = context.customer_id,
            content_id = winner.content_id,
            click_through_rate = winner.click_through_rate;
            "selected advertisement");

        let event = SelectionEvent {
            content_id: winner.content_id.clone(),
            targeting_group_id: winner.targeting_group_id.clone(),
            customer_id: context.customer_id.clone(),
            marketplace_id: context.marketplace_id.clone(),
            click_through_rate: winner.click_through_rate,
            timestamp: Utc::now(),
            meta_data: [(
                "adselectCoreVersion".to_owned(),
                env!("CARGO_PKG_VERSION").to_owned(),
            )]
            .into(),
        };

        Ok(SelectionResult {
            advertisement: GeneratedAdvertisement::from((*content).clone()),
            event: Some(event),
            evaluations,
        })
    }
}

/// Ranking order for eligible targeting groups: click-through rate descending, ties
/// broken by lowest content id, then lowest targeting-group id.
fn rank(a: &TargetingGroup, b: &TargetingGroup) -> std::cmp::Ordering {
    f64::total_cmp(&a.click_through_rate, &b.click_through_rate)
        .then_with(|| b.content_id.cmp(&a.content_id))
        .then_with(|| b.targeting_group_id.cmp(&a.targeting_group_id))
}
