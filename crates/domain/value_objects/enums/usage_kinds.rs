use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Quota-consuming actions tracked by the usage ledger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UsageKind {
    ResumeVersion,
    AiEnhancement,
    CoverLetter,
    InterviewSession,
}

impl UsageKind {
    pub const ALL: [UsageKind; 4] = [
        UsageKind::ResumeVersion,
        UsageKind::AiEnhancement,
        UsageKind::CoverLetter,
        UsageKind::InterviewSession,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UsageKind::ResumeVersion => "resume_version",
            UsageKind::AiEnhancement => "ai_enhancement",
            UsageKind::CoverLetter => "cover_letter",
            UsageKind::InterviewSession => "interview_session",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "resume_version" | "resume_versions" => Some(UsageKind::ResumeVersion),
            "ai_enhancement" | "ai_enhancements" => Some(UsageKind::AiEnhancement),
            "cover_letter" | "cover_letters" => Some(UsageKind::CoverLetter),
            "interview_session" | "interview_sessions" => Some(UsageKind::InterviewSession),
            _ => None,
        }
    }

    /// AI enhancements roll over every day; everything else per billing month.
    pub fn is_daily(&self) -> bool {
        matches!(self, UsageKind::AiEnhancement)
    }
}

impl Display for UsageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
