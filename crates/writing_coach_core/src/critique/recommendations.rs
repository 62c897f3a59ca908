//! Turns a critique report into a list of human-readable recommendations.

use super::language::FeedbackLanguage;
use super::report::{CritiqueReport, EssayIssue};

/// Essay dimensions scoring below this get a labeled feedback block.
pub const FEEDBACK_THRESHOLD: u8 = 70;

const MAX_ESSAY_ISSUES: usize = 3;

pub fn recommendations(report: &CritiqueReport, language: FeedbackLanguage) -> Vec<String> {
    let labels = language.labels();
    let mut out = Vec::new();

    if let Some(essay) = &report.essay_analysis {
        let blocks = [
            (essay.structure_score, labels.essay_structure, &essay.structure_feedback),
            (essay.transition_score, labels.essay_transitions, &essay.transition_feedback),
            (essay.coherence_score, labels.essay_coherence, &essay.coherence_feedback),
        ];
        for (score, label, feedback) in blocks {
            if score.get() < FEEDBACK_THRESHOLD {
                out.push(format!("【{}】", label));
                if !feedback.is_empty() {
                    out.push(feedback.clone());
                }
            }
        }

        if !essay.essay_issues.is_empty() {
            out.push(format!("【{}】", labels.specific_issues));
            out.extend(
                most_severe(&essay.essay_issues)
                    .map(|issue| format!("• {}", issue.description)),
            );
        }
    }

    if let Some((kind, count)) = most_common_sentence_issue(report) {
        if count >= 2 {
            out.push(format!("【{}】", labels.sentence_errors));
            out.push(labels.common_error(count, kind));
        }
    }

    if out.is_empty() {
        out.push(labels.excellent.to_string());
    }
    out
}

/// Critical first, then major, then minor; response order is kept within a severity.
fn most_severe(issues: &[EssayIssue]) -> impl Iterator<Item = &EssayIssue> {
    let mut ranked: Vec<&EssayIssue> = issues.iter().collect();
    ranked.sort_by(|a, b| b.severity.cmp(&a.severity));
    ranked.into_iter().take(MAX_ESSAY_ISSUES)
}

/// The most frequent sentence issue type. Ties go to the type seen first.
fn most_common_sentence_issue(report: &CritiqueReport) -> Option<(&str, usize)> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for issue in report.sentence_analysis.iter().flat_map(|s| &s.issues) {
        match counts.iter_mut().find(|(kind, _)| *kind == issue.kind) {
            Some((_, count)) => *count += 1,
            None => counts.push((issue.kind.as_str(), 1)),
        }
    }

    counts
        .into_iter()
        .fold(None, |best, candidate| match best {
            Some(best @ (_, top)) if top >= candidate.1 => Some(best),
            _ => Some(candidate),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::critique::report::parse_report;

    fn report(essay: &str, issues: &[&str]) -> CritiqueReport {
        let issues = issues
            .iter()
            .map(|kind| {
                format!(
                    r#"{{"type": "{}", "description": "d", "severity": "minor"}}"#,
                    kind
                )
            })
            .collect::<Vec<_>>()
            .join(",");
        let json = format!(
            r#"{{"sentence_analysis": [{{"index": 1, "original": "s", "grammar_score": 80,
                "semantic_score": 80, "collocation_score": 80, "overall_quality": 80,
                "issues": [{}]}}]{}}}"#,
            issues, essay
        );
        parse_report(&json).expect("valid report")
    }

    fn essay_section(structure: u8, transition: u8, coherence: u8, issues: &str) -> String {
        format!(
            r#", "essay_analysis": {{"structure_score": {}, "coherence_score": {},
                "transition_score": {}, "topic_consistency_score": 90, "logic_score": 90,
                "structure_feedback": "Needs a conclusion", "transition_feedback": "Abrupt",
                "coherence_feedback": "Choppy", "essay_issues": [{}]}}"#,
            structure, coherence, transition, issues
        )
    }

    fn issue(description: &str, severity: &str) -> String {
        format!(
            r#"{{"type": "t", "description": "{}", "severity": "{}"}}"#,
            description, severity
        )
    }

    #[test]
    fn clean_report_yields_single_excellent_message() {
        let recs = recommendations(&report(&essay_section(90, 90, 90, ""), &[]), FeedbackLanguage::ENGLISH);
        assert_eq!(
            recs,
            vec!["Excellent work overall - both sentence quality and essay structure are strong!"]
        );
    }

    #[test]
    fn low_dimensions_add_labeled_feedback_blocks() {
        let recs = recommendations(&report(&essay_section(60, 65, 90, ""), &[]), FeedbackLanguage::ENGLISH);
        assert_eq!(
            recs,
            vec!["【Essay Structure】", "Needs a conclusion", "【Transitions】", "Abrupt"]
        );
    }

    #[test]
    fn threshold_is_exclusive() {
        let recs = recommendations(&report(&essay_section(70, 70, 70, ""), &[]), FeedbackLanguage::ENGLISH);
        assert_eq!(recs.len(), 1);
    }

    #[test]
    fn keeps_three_most_severe_essay_issues() {
        let issues = [
            issue("first minor", "minor"),
            issue("major one", "major"),
            issue("second minor", "minor"),
            issue("critical one", "critical"),
        ]
        .join(",");
        let recs = recommendations(&report(&essay_section(90, 90, 90, &issues), &[]), FeedbackLanguage::ENGLISH);
        assert_eq!(
            recs,
            vec![
                "【Specific Issues to Address】",
                "• critical one",
                "• major one",
                "• first minor",
            ]
        );
    }

    #[test]
    fn recurring_sentence_issue_is_reported_once() {
        let recs = recommendations(
            &report("", &["Word order", "Particle", "Word order"]),
            FeedbackLanguage::ENGLISH,
        );
        assert_eq!(
            recs,
            vec!["【Sentence-Level Errors】", "Found 2 instances of \"Word order\""]
        );
    }

    #[test]
    fn single_occurrence_issue_is_not_reported() {
        let recs = recommendations(&report("", &["Word order", "Particle"]), FeedbackLanguage::ENGLISH);
        assert_eq!(recs.len(), 1);
        assert!(recs[0].starts_with("Excellent"));
    }

    #[test]
    fn labels_follow_requested_language() {
        let recs = recommendations(
            &report(&essay_section(50, 90, 90, ""), &["词序", "词序"]),
            FeedbackLanguage::resolve("zh"),
        );
        assert_eq!(recs[0], "【文章结构】");
        assert_eq!(recs[2], "【句子层面的错误】");
        assert_eq!(recs[3], "发现 2 处「词序」");
    }

    #[test]
    fn unsupported_language_never_leaks_into_labels() {
        let recs = recommendations(&report(&essay_section(50, 90, 90, ""), &[]), FeedbackLanguage::resolve("xx"));
        assert_eq!(recs[0], "【Essay Structure】");
    }
}
