//! Review modes and reviewer skills.
//!
//! A skill is a checklist that parameterizes the reviewer prompt. Which
//! skill applies is decided by [`Skill::classify`], a pure function of
//! the user's content; the review loop itself never branches on it.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How the final answer is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewMode {
    /// Helpful assistant that marks unverified claims.
    Normal,
    /// Red-team reviewer that ranks every issue by severity.
    #[default]
    Devil,
}

impl ReviewMode {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Devil => "devil",
        }
    }

    /// The other mode.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Normal => Self::Devil,
            Self::Devil => Self::Normal,
        }
    }
}

impl std::fmt::Display for ReviewMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "devil" => Ok(Self::Devil),
            other => Err(format!("unknown review mode '{other}' (expected devil or normal)")),
        }
    }
}

/// Code markers that route content to [`Skill::CodeChecker`].
const CODE_MARKERS: &[&str] = &["def ", "class ", "import ", "function", "```"];

/// Vocabulary that routes content to [`Skill::LogicAuditor`].
const ANALYTIC_MARKERS: &[&str] = &[
    "paper",
    "report",
    "proposal",
    "design",
    "analysis",
    "hypothesis",
    "conclusion",
    "thesis",
    "research",
    "study",
];

/// Reviewer checklist selected from the content under review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Skill {
    /// Source code.
    CodeChecker,
    /// Papers, reports, designs and other argued documents.
    LogicAuditor,
    /// Everything else.
    GeneralReviewer,
}

impl Skill {
    /// Every skill, in classification priority order.
    pub const ALL: [Self; 3] = [Self::CodeChecker, Self::LogicAuditor, Self::GeneralReviewer];

    /// Picks the skill for `content`. Code markers win over analytic vocabulary.
    #[must_use]
    pub fn classify(content: &str) -> Self {
        let lower = content.to_lowercase();
        if CODE_MARKERS.iter().any(|m| lower.contains(m)) {
            Self::CodeChecker
        } else if ANALYTIC_MARKERS.iter().any(|m| lower.contains(m)) {
            Self::LogicAuditor
        } else {
            Self::GeneralReviewer
        }
    }

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CodeChecker => "code-checker",
            Self::LogicAuditor => "logic-auditor",
            Self::GeneralReviewer => "general-reviewer",
        }
    }

    /// Template file name, relative to the prompt directory.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("skills/{}.md", self.as_str())
    }
}

impl std::fmt::Display for Skill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("def parse(x):\n    return x", Skill::CodeChecker ; "python def")]
    #[test_case("```rust\nfn main() {}\n```", Skill::CodeChecker ; "fenced block")]
    #[test_case("export function handler() {}", Skill::CodeChecker ; "js function")]
    #[test_case("Our research proposal argues that", Skill::LogicAuditor ; "proposal")]
    #[test_case("The CONCLUSION does not follow", Skill::LogicAuditor ; "case insensitive")]
    #[test_case("Is it going to rain in Paris?", Skill::GeneralReviewer ; "general")]
    #[test_case("", Skill::GeneralReviewer ; "empty")]
    fn test_classify(content: &str, expected: Skill) {
        assert_eq!(Skill::classify(content), expected);
    }

    #[test]
    fn test_code_markers_win_over_analysis() {
        assert_eq!(
            Skill::classify("analysis of this class hierarchy"),
            Skill::CodeChecker
        );
    }

    #[test]
    fn test_skill_names() {
        assert_eq!(Skill::LogicAuditor.to_string(), "logic-auditor");
        assert_eq!(Skill::CodeChecker.file_name(), "skills/code-checker.md");
        let json = serde_json::to_string(&Skill::GeneralReviewer).unwrap_or_default();
        assert_eq!(json, "\"general-reviewer\"");
    }

    #[test]
    fn test_review_mode_parse_and_toggle() {
        assert_eq!("Devil".parse::<ReviewMode>(), Ok(ReviewMode::Devil));
        assert_eq!(" normal ".parse::<ReviewMode>(), Ok(ReviewMode::Normal));
        assert!("angel".parse::<ReviewMode>().is_err());
        assert_eq!(ReviewMode::Devil.toggled(), ReviewMode::Normal);
        assert_eq!(ReviewMode::default(), ReviewMode::Devil);
    }
}
