use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::{
        enums::usage_kinds::UsageKind, feature_limits::Quota, usage::UsageWindow,
    },
    infra::db::postgres::schema::usage_periods,
};

/// Usage counters for one monthly window. The AI counter is scoped to
/// `ai_enhancements_day` and restarts whenever the UTC day changes.
#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = usage_periods)]
pub struct UsagePeriodEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub resume_versions_used: i32,
    pub ai_enhancements_used_today: i32,
    pub ai_enhancements_day: NaiveDate,
    pub cover_letters_used: i32,
    pub interview_sessions_used: i32,
    pub updated_at: DateTime<Utc>,
}

impl UsagePeriodEntity {
    /// A zeroed period for a user with no row in `window` yet.
    pub fn empty(user_id: Uuid, window: UsageWindow, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::nil(),
            user_id,
            period_start: window.start,
            period_end: window.end,
            resume_versions_used: 0,
            ai_enhancements_used_today: 0,
            ai_enhancements_day: now.date_naive(),
            cover_letters_used: 0,
            interview_sessions_used: 0,
            updated_at: now,
        }
    }

    /// Applies the daily boundary: a counter recorded on an earlier day reads as zero.
    pub fn rolled_over(mut self, now: DateTime<Utc>) -> Self {
        self.roll_day(now);
        self
    }

    fn roll_day(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if self.ai_enhancements_day != today {
            self.ai_enhancements_day = today;
            self.ai_enhancements_used_today = 0;
        }
    }

    pub fn used(&self, kind: UsageKind) -> u32 {
        let raw = match kind {
            UsageKind::ResumeVersion => self.resume_versions_used,
            UsageKind::AiEnhancement => self.ai_enhancements_used_today,
            UsageKind::CoverLetter => self.cover_letters_used,
            UsageKind::InterviewSession => self.interview_sessions_used,
        };
        u32::try_from(raw).unwrap_or(0)
    }

    /// Compare-and-increment on an already locked row. Returns false, leaving
    /// the counters untouched, when `quota` is already used up.
    pub fn try_consume(&mut self, kind: UsageKind, quota: Quota, now: DateTime<Utc>) -> bool {
        self.roll_day(now);

        if !quota.allows(self.used(kind)) {
            return false;
        }

        let counter = match kind {
            UsageKind::ResumeVersion => &mut self.resume_versions_used,
            UsageKind::AiEnhancement => &mut self.ai_enhancements_used_today,
            UsageKind::CoverLetter => &mut self.cover_letters_used,
            UsageKind::InterviewSession => &mut self.interview_sessions_used,
        };
        *counter = counter.saturating_add(1);
        self.updated_at = now;
        true
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = usage_periods)]
pub struct InsertUsagePeriodEntity {
    pub user_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub ai_enhancements_day: NaiveDate,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = usage_periods)]
pub struct UsageCountersChangeset {
    pub resume_versions_used: i32,
    pub ai_enhancements_used_today: i32,
    pub ai_enhancements_day: NaiveDate,
    pub cover_letters_used: i32,
    pub interview_sessions_used: i32,
    pub updated_at: DateTime<Utc>,
}

impl From<&UsagePeriodEntity> for UsageCountersChangeset {
    fn from(value: &UsagePeriodEntity) -> Self {
        Self {
            resume_versions_used: value.resume_versions_used,
            ai_enhancements_used_today: value.ai_enhancements_used_today,
            ai_enhancements_day: value.ai_enhancements_day,
            cover_letters_used: value.cover_letters_used,
            interview_sessions_used: value.interview_sessions_used,
            updated_at: value.updated_at,
        }
    }
}
