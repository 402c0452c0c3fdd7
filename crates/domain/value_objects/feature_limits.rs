use serde::{Serialize, Serializer};

use crate::domain::value_objects::enums::{
    subscription_tiers::SubscriptionTier, usage_kinds::UsageKind,
};

/// A per-period allowance. `Unlimited` is a marker, never a large number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quota {
    Limited(u32),
    Unlimited,
}

impl Quota {
    pub fn allows(&self, used: u32) -> bool {
        match self {
            Quota::Limited(limit) => used < *limit,
            Quota::Unlimited => true,
        }
    }

    pub fn remaining(&self, used: u32) -> Remaining {
        match self {
            Quota::Limited(limit) => Remaining::Finite(limit.saturating_sub(used)),
            Quota::Unlimited => Remaining::Unbounded,
        }
    }

    pub fn limit(&self) -> Option<u32> {
        match self {
            Quota::Limited(limit) => Some(*limit),
            Quota::Unlimited => None,
        }
    }

    fn exceeds(&self, other: &Quota) -> bool {
        match (self, other) {
            (Quota::Unlimited, Quota::Unlimited) => false,
            (Quota::Unlimited, Quota::Limited(_)) => true,
            (Quota::Limited(_), Quota::Unlimited) => false,
            (Quota::Limited(a), Quota::Limited(b)) => a > b,
        }
    }
}

impl Serialize for Quota {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Quota::Limited(limit) => serializer.serialize_u32(*limit),
            Quota::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

/// What is left of a quota in the current period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    Finite(u32),
    Unbounded,
}

impl Remaining {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Remaining::Finite(0))
    }
}

impl Serialize for Remaining {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Remaining::Finite(left) => serializer.serialize_u32(*left),
            Remaining::Unbounded => serializer.serialize_str("unlimited"),
        }
    }
}

/// Quotas and feature flags granted by a tier. Derived, never stored.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct FeatureLimits {
    pub resume_versions_per_month: Quota,
    pub ai_enhancements_per_day: Quota,
    pub cover_letters_per_month: Quota,
    pub interview_sessions_per_month: Quota,
    pub salary_insights_access: bool,
    pub negotiation_coach_access: bool,
    pub linkedin_optimizer_access: bool,
    pub unlimited_application_tracking: bool,
    pub priority_support: bool,
}

impl FeatureLimits {
    pub const fn for_tier(tier: SubscriptionTier) -> Self {
        match tier {
            SubscriptionTier::Free => Self {
                resume_versions_per_month: Quota::Limited(3),
                ai_enhancements_per_day: Quota::Limited(5),
                cover_letters_per_month: Quota::Limited(3),
                interview_sessions_per_month: Quota::Limited(2),
                salary_insights_access: false,
                negotiation_coach_access: false,
                linkedin_optimizer_access: false,
                unlimited_application_tracking: false,
                priority_support: false,
            },
            SubscriptionTier::Pro => Self {
                resume_versions_per_month: Quota::Limited(25),
                ai_enhancements_per_day: Quota::Limited(50),
                cover_letters_per_month: Quota::Limited(30),
                interview_sessions_per_month: Quota::Limited(20),
                salary_insights_access: true,
                negotiation_coach_access: false,
                linkedin_optimizer_access: true,
                unlimited_application_tracking: true,
                priority_support: false,
            },
            SubscriptionTier::Premium => Self {
                resume_versions_per_month: Quota::Unlimited,
                ai_enhancements_per_day: Quota::Unlimited,
                cover_letters_per_month: Quota::Unlimited,
                interview_sessions_per_month: Quota::Unlimited,
                salary_insights_access: true,
                negotiation_coach_access: true,
                linkedin_optimizer_access: true,
                unlimited_application_tracking: true,
                priority_support: true,
            },
        }
    }

    pub fn quota(&self, kind: UsageKind) -> Quota {
        match kind {
            UsageKind::ResumeVersion => self.resume_versions_per_month,
            UsageKind::AiEnhancement => self.ai_enhancements_per_day,
            UsageKind::CoverLetter => self.cover_letters_per_month,
            UsageKind::InterviewSession => self.interview_sessions_per_month,
        }
    }

    /// Lowest tier whose quota for `kind` is larger than `current`'s, if any.
    pub fn tier_lifting_quota(kind: UsageKind, current: SubscriptionTier) -> Option<SubscriptionTier> {
        let current_quota = Self::for_tier(current).quota(kind);
        SubscriptionTier::ALL
            .into_iter()
            .filter(|tier| *tier > current)
            .find(|tier| Self::for_tier(*tier).quota(kind).exceeds(&current_quota))
    }
}

/// Names other subsystems use when asking whether a user may do something.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    ResumeVersions,
    AiEnhancements,
    CoverLetters,
    InterviewSessions,
    SalaryInsights,
    NegotiationCoach,
    LinkedinOptimizer,
    UnlimitedApplicationTracking,
    PrioritySupport,
}

impl Feature {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim() {
            "resume_versions" => Some(Feature::ResumeVersions),
            "ai_enhancements" => Some(Feature::AiEnhancements),
            "cover_letters" => Some(Feature::CoverLetters),
            "interview_sessions" => Some(Feature::InterviewSessions),
            "salary_insights" => Some(Feature::SalaryInsights),
            "negotiation_coach" => Some(Feature::NegotiationCoach),
            "linkedin_optimizer" => Some(Feature::LinkedinOptimizer),
            "unlimited_application_tracking" => Some(Feature::UnlimitedApplicationTracking),
            "priority_support" => Some(Feature::PrioritySupport),
            _ => None,
        }
    }

    /// Usage kind backing a quantitative feature.
    pub fn usage_kind(&self) -> Option<UsageKind> {
        match self {
            Feature::ResumeVersions => Some(UsageKind::ResumeVersion),
            Feature::AiEnhancements => Some(UsageKind::AiEnhancement),
            Feature::CoverLetters => Some(UsageKind::CoverLetter),
            Feature::InterviewSessions => Some(UsageKind::InterviewSession),
            _ => None,
        }
    }

    /// Value of a boolean feature flag; quantitative features report `None`.
    pub fn flag(&self, limits: &FeatureLimits) -> Option<bool> {
        match self {
            Feature::SalaryInsights => Some(limits.salary_insights_access),
            Feature::NegotiationCoach => Some(limits.negotiation_coach_access),
            Feature::LinkedinOptimizer => Some(limits.linkedin_optimizer_access),
            Feature::UnlimitedApplicationTracking => Some(limits.unlimited_application_tracking),
            Feature::PrioritySupport => Some(limits.priority_support),
            _ => None,
        }
    }

    /// Lowest tier that grants the feature at all.
    pub fn minimum_tier(&self) -> SubscriptionTier {
        SubscriptionTier::ALL
            .into_iter()
            .find(|tier| {
                let limits = FeatureLimits::for_tier(*tier);
                match (self.flag(&limits), self.usage_kind()) {
                    (Some(flag), _) => flag,
                    (None, Some(kind)) => limits.quota(kind) != Quota::Limited(0),
                    (None, None) => false,
                }
            })
            .unwrap_or(SubscriptionTier::Premium)
    }
}
