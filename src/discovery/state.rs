//! Resolution state machine
//!
//! The engine walks these stages in order. Transitions are pure functions of
//! a few facts about the request, so the routing can be tested without any
//! network or browser.

use std::fmt;

use super::request::FailureTally;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    NotStarted,
    /// Site-type specific strategy (code repository, app marketplace).
    Specialized,
    /// Fetch the URL variants and score their links.
    StaticProbe,
    /// Hidden regions and scripts of the pages already fetched.
    HiddenScan,
    /// Conventional legal paths on the resolved base.
    PatternProbe,
    /// Headless browser render and interaction.
    DynamicRender,
    Resolved,
    Exhausted,
}

impl Stage {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Exhausted)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Specialized => "specialized",
            Self::StaticProbe => "static_probe",
            Self::HiddenScan => "hidden_scan",
            Self::PatternProbe => "pattern_probe",
            Self::DynamicRender => "dynamic_render",
            Self::Resolved => "resolved",
            Self::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the transition function needs to know about the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageFacts {
    /// The site classified as something other than generic.
    pub specialized_site: bool,
    /// A non-rejected candidate meets the threshold and passed verification.
    pub resolved: bool,
    pub probe_patterns: bool,
    pub render_enabled: bool,
}

/// The stage that follows `current`.
#[must_use]
pub fn next_stage(current: Stage, facts: StageFacts) -> Stage {
    if current.is_terminal() {
        return current;
    }
    if facts.resolved && current != Stage::NotStarted {
        return Stage::Resolved;
    }

    match current {
        Stage::NotStarted if facts.specialized_site => Stage::Specialized,
        Stage::NotStarted | Stage::Specialized => Stage::StaticProbe,
        Stage::StaticProbe => Stage::HiddenScan,
        Stage::HiddenScan if facts.probe_patterns => Stage::PatternProbe,
        Stage::HiddenScan | Stage::PatternProbe if facts.render_enabled => Stage::DynamicRender,
        Stage::HiddenScan | Stage::PatternProbe | Stage::DynamicRender => Stage::Exhausted,
        Stage::Resolved | Stage::Exhausted => current,
    }
}

/// Best guess at why nothing qualified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustionReason {
    AccessBlocked,
    JavascriptRequired,
    StructurallyAbsent,
}

impl ExhaustionReason {
    #[must_use]
    pub fn diagnose(tally: FailureTally, spa_detected: bool, render_failed: bool) -> Self {
        if tally.access_blocked() {
            Self::AccessBlocked
        } else if spa_detected || render_failed {
            Self::JavascriptRequired
        } else {
            Self::StructurallyAbsent
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AccessBlocked => "access-blocked",
            Self::JavascriptRequired => "javascript-required",
            Self::StructurallyAbsent => "structurally-absent",
        }
    }

    #[must_use]
    pub fn explain(self) -> &'static str {
        match self {
            Self::AccessBlocked => "the site refused automated access",
            Self::JavascriptRequired => {
                "the page builds its content with JavaScript and rendering did not surface the link"
            }
            Self::StructurallyAbsent => "no page on the site links to the document",
        }
    }
}

impl fmt::Display for ExhaustionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(facts: StageFacts) -> Vec<Stage> {
        let mut stages = vec![Stage::NotStarted];
        let mut current = Stage::NotStarted;
        while !current.is_terminal() {
            current = next_stage(current, facts);
            stages.push(current);
        }
        stages
    }

    #[test]
    fn generic_site_walks_every_stage() {
        let facts = StageFacts {
            probe_patterns: true,
            render_enabled: true,
            ..StageFacts::default()
        };
        assert_eq!(
            walk(facts),
            [
                Stage::NotStarted,
                Stage::StaticProbe,
                Stage::HiddenScan,
                Stage::PatternProbe,
                Stage::DynamicRender,
                Stage::Exhausted
            ]
        );
    }

    #[test]
    fn specialized_site_starts_with_specializer() {
        let facts = StageFacts {
            specialized_site: true,
            ..StageFacts::default()
        };
        assert_eq!(
            walk(facts),
            [
                Stage::NotStarted,
                Stage::Specialized,
                Stage::StaticProbe,
                Stage::HiddenScan,
                Stage::Exhausted
            ]
        );
    }

    #[test]
    fn resolution_short_circuits() {
        let facts = StageFacts {
            resolved: true,
            render_enabled: true,
            ..StageFacts::default()
        };
        assert_eq!(next_stage(Stage::StaticProbe, facts), Stage::Resolved);
        assert_eq!(next_stage(Stage::Resolved, facts), Stage::Resolved);
    }

    #[test]
    fn exhaustion_reasons() {
        let blocked = FailureTally {
            attempts: 2,
            blocked: 2,
            ..FailureTally::default()
        };
        assert_eq!(
            ExhaustionReason::diagnose(blocked, true, true),
            ExhaustionReason::AccessBlocked
        );
        let fetched = FailureTally {
            attempts: 1,
            succeeded: 1,
            ..FailureTally::default()
        };
        assert_eq!(
            ExhaustionReason::diagnose(fetched, false, true).as_str(),
            "javascript-required"
        );
        assert_eq!(
            ExhaustionReason::diagnose(fetched, false, false),
            ExhaustionReason::StructurallyAbsent
        );
    }
}
