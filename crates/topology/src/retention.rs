//! Image registry lifecycle rules.
//!
//! A [`LifecycleRule`] selects images by tag state and expires those beyond a
//! count or age limit. Rules are evaluated in ascending priority; an image
//! claimed by one rule is not considered by later ones. [`RegistrySimulation`]
//! applies a rule set eagerly after every push, which is the steady state the
//! platform converges to.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{StackError, Timestamp};

// ---------------------------------------------------------------------------
// Rule definition
// ---------------------------------------------------------------------------

/// Which images a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagStatus {
    /// Every image, tagged or not.
    Any,
    /// Images with at least one tag starting with one of `prefixes`.
    Tagged {
        /// Tag prefixes; must not be empty.
        prefixes: Vec<String>,
    },
    /// Images with no tags.
    Untagged,
}

impl TagStatus {
    /// Returns `true` if `image` is selected.
    pub fn matches(&self, image: &ImageRecord) -> bool {
        match self {
            Self::Any => true,
            Self::Untagged => image.tags.is_empty(),
            Self::Tagged { prefixes } => image
                .tags
                .iter()
                .any(|tag| prefixes.iter().any(|p| tag.starts_with(p.as_str()))),
        }
    }
}

/// The limit beyond which selected images expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionLimit {
    /// Keep only the newest `n` selected images.
    MaxImageCount(u32),
    /// Expire selected images pushed more than `days` days ago.
    MaxImageAgeDays(u32),
}

/// One registry lifecycle rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleRule {
    /// Evaluation priority; lower runs first. Unique within a rule set.
    pub priority: u32,
    /// Free-text description shown by the platform.
    pub description: Option<String>,
    /// Which images the rule considers.
    pub tag_status: TagStatus,
    /// When selected images expire.
    pub limit: RetentionLimit,
}

impl LifecycleRule {
    /// A rule keeping the newest `count` images regardless of tags.
    pub fn keep_newest(priority: u32, count: u32, description: impl Into<String>) -> Self {
        Self {
            priority,
            description: Some(description.into()),
            tag_status: TagStatus::Any,
            limit: RetentionLimit::MaxImageCount(count),
        }
    }

    /// Returns the images in `candidates` that this rule expires at `now`.
    pub fn expired<'a>(
        &self,
        candidates: &[&'a ImageRecord],
        now: Timestamp,
    ) -> Vec<&'a ImageRecord> {
        let mut selected: Vec<&ImageRecord> = candidates
            .iter()
            .copied()
            .filter(|image| self.tag_status.matches(image))
            .collect();

        match self.limit {
            RetentionLimit::MaxImageCount(count) => {
                // Newest first; ties broken by push sequence.
                selected.sort_by(|a, b| {
                    b.pushed_at
                        .cmp(&a.pushed_at)
                        .then_with(|| b.sequence.cmp(&a.sequence))
                });
                selected.into_iter().skip(count as usize).collect()
            }
            RetentionLimit::MaxImageAgeDays(days) => selected
                .into_iter()
                .filter(|image| image.pushed_at.days_until(now) > i64::from(days))
                .collect(),
        }
    }
}

/// Checks a rule set against the registry's constraints.
///
/// - priorities are unique;
/// - an [`TagStatus::Any`] rule has the highest priority value in the set;
/// - `Tagged` rules name at least one prefix;
/// - count limits are at least 1.
pub fn validate_rules(rules: &[LifecycleRule]) -> Result<(), StackError> {
    let invalid = |message: String| Err(StackError::LifecycleRule { message });

    let mut priorities: Vec<u32> = rules.iter().map(|r| r.priority).collect();
    priorities.sort_unstable();
    if let Some(w) = priorities.windows(2).find(|w| w[0] == w[1]) {
        return invalid(format!("priority {} is used more than once", w[0]));
    }

    let highest = priorities.last().copied();
    for rule in rules {
        if rule.tag_status == TagStatus::Any && Some(rule.priority) != highest {
            return invalid(format!(
                "rule {} selects any tag state and must have the highest priority value",
                rule.priority
            ));
        }
        if let TagStatus::Tagged { prefixes } = &rule.tag_status {
            if prefixes.is_empty() {
                return invalid(format!("rule {} is tagged but lists no prefixes", rule.priority));
            }
        }
        if rule.limit == RetentionLimit::MaxImageCount(0) {
            return invalid(format!("rule {} keeps zero images", rule.priority));
        }
    }

    Ok(())
}

/// Returns the images `rules` expire, evaluating rules by ascending priority.
pub fn evaluate<'a>(
    rules: &[LifecycleRule],
    images: &'a [ImageRecord],
    now: Timestamp,
) -> Vec<&'a ImageRecord> {
    let mut ordered: Vec<&LifecycleRule> = rules.iter().collect();
    ordered.sort_by_key(|r| r.priority);

    let mut remaining: Vec<&ImageRecord> = images.iter().collect();
    let mut expired: Vec<&ImageRecord> = Vec::new();

    for rule in ordered {
        let claimed = rule.expired(&remaining, now);
        remaining.retain(|image| !claimed.iter().any(|c| c.sequence == image.sequence));
        expired.extend(claimed);
    }

    expired
}

// ---------------------------------------------------------------------------
// Images and simulation
// ---------------------------------------------------------------------------

/// An image stored in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Content digest.
    pub digest: String,
    /// Tags currently pointing at the image.
    pub tags: Vec<String>,
    /// When the image was pushed.
    pub pushed_at: Timestamp,
    /// Monotonic push counter assigned by the registry.
    pub sequence: u64,
}

/// An in-memory registry that applies its lifecycle rules after every push.
#[derive(Debug, Clone)]
pub struct RegistrySimulation {
    rules: Vec<LifecycleRule>,
    images: Vec<ImageRecord>,
    next_sequence: u64,
}

impl RegistrySimulation {
    /// Creates an empty registry governed by `rules`.
    pub fn new(rules: Vec<LifecycleRule>) -> Self {
        Self {
            rules,
            images: Vec::new(),
            next_sequence: 0,
        }
    }

    /// Pushes an image and returns the images evicted as a result.
    ///
    /// A pushed tag moves off any older image that carried it, as in the
    /// platform's mutable-tag mode. Pushing a digest the registry already
    /// holds only retags that image; its push time and sequence are kept.
    pub fn push(
        &mut self,
        digest: impl Into<String>,
        tags: Vec<String>,
        at: Timestamp,
    ) -> Vec<ImageRecord> {
        let digest = digest.into();
        for image in &mut self.images {
            image.tags.retain(|t| !tags.contains(t));
        }

        match self.images.iter().position(|i| i.digest == digest) {
            Some(index) => {
                debug!(%digest, "Retagged existing image");
                self.images[index].tags.extend(tags);
            }
            None => {
                self.images.push(ImageRecord {
                    digest,
                    tags,
                    pushed_at: at,
                    sequence: self.next_sequence,
                });
                self.next_sequence += 1;
            }
        }

        let evicted: Vec<u64> = evaluate(&self.rules, &self.images, at)
            .into_iter()
            .map(|image| image.sequence)
            .collect();

        let (gone, kept): (Vec<ImageRecord>, Vec<ImageRecord>) = std::mem::take(&mut self.images)
            .into_iter()
            .partition(|image| evicted.contains(&image.sequence));
        self.images = kept;

        if !gone.is_empty() {
            debug!(
                evicted = gone.len(),
                retained = self.images.len(),
                "Lifecycle rules expired images"
            );
        }
        gone
    }

    /// Images currently retained, oldest first.
    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }
}
