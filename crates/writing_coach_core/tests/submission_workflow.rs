//! End-to-end runs of the submission saga against the in-memory adapters.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;
use writing_coach_core::critique::CritiqueError;
use writing_coach_core::testing::{MemoryDatabase, ScriptedOracle, WhitespaceSegmenter, SAMPLE_REPORT};
use writing_coach_core::vocabulary::HskEntry;
use writing_coach_core::{
    CritiqueClient, DatabaseService, EssaySubmission, HskDictionary, NewUser, PortError,
    SubmissionError, SubmissionWorkflow, TargetLevel, VocabularyScorer,
};

const ESSAY: &str = "我 很 喜欢 学习 中文 。 中文 是 一门 很 有意思 的 语言 。\n学习 中文 有 很多 好处 。";

fn dictionary() -> Arc<HskDictionary> {
    let entries = [("学习", 1), ("中文", 1), ("喜欢", 1), ("语言", 2), ("好处", 4)]
        .into_iter()
        .map(|(word, level)| {
            (
                word.to_string(),
                HskEntry {
                    level,
                    pinyin: String::new(),
                    translation: String::new(),
                },
            )
        })
        .collect::<HashMap<_, _>>();
    Arc::new(HskDictionary::from_entries(entries))
}

struct Harness {
    db: Arc<MemoryDatabase>,
    oracle: Arc<ScriptedOracle>,
    workflow: SubmissionWorkflow,
    user_id: Uuid,
}

async fn harness(oracle: ScriptedOracle) -> Harness {
    let db = Arc::new(MemoryDatabase::new());
    let oracle = Arc::new(oracle);
    let scorer = Arc::new(VocabularyScorer::new(dictionary(), Box::new(WhitespaceSegmenter)));
    let workflow = SubmissionWorkflow::new(db.clone(), scorer, CritiqueClient::new(oracle.clone()));

    let user = db
        .create_user(NewUser {
            email: "learner@example.com".to_string(),
            username: "learner".to_string(),
            hashed_password: "hash".to_string(),
            target_level: TargetLevel::default(),
            preferred_language: "en".to_string(),
        })
        .await
        .expect("user created");

    Harness {
        db,
        oracle,
        workflow,
        user_id: user.id,
    }
}

fn submission(user_id: Uuid, language: &str) -> EssaySubmission {
    EssaySubmission {
        user_id,
        title: "我的中文学习".to_string(),
        content: ESSAY.to_string(),
        theme: Some("学习".to_string()),
        target_level: TargetLevel::new(4).unwrap(),
        language: language.to_string(),
    }
}

#[tokio::test]
async fn successful_submission_stores_essay_and_analysis() {
    let h = harness(ScriptedOracle::replying(SAMPLE_REPORT)).await;

    let analysis = h.workflow.submit(submission(h.user_id, "zh")).await.expect("analysis");

    assert_eq!(h.db.essay_count(), 1);
    assert_eq!(h.db.analysis_count(), 1);
    assert_eq!(h.oracle.calls(), 1);

    let fields = &analysis.fields;
    assert_eq!(fields.sentence_count, 3);
    assert_eq!(fields.paragraph_count, 2);
    assert_eq!(fields.sentence_quality_score, 76);
    assert_eq!(fields.transition_score, Some(60));
    assert_eq!(fields.topic_consistency_score, Some(90));
    assert_eq!(fields.grammar_score, Some(81));
    assert_eq!(fields.analysis_language, "zh");
    assert_eq!(fields.recommendations[0], "【过渡衔接】");
    assert!((0..=100).contains(&fields.overall_score));
    assert_eq!(fields.sentence_details.as_array().map(Vec::len), Some(3));
    assert_eq!(fields.hsk_distribution["1"], 6);
    assert_eq!(fields.hsk_distribution["unknown"], 3);
    assert_eq!(fields.hsk_distribution["4"], 1);

    let stored = h.db.get_analysis_for_essay(fields.essay_id).await.expect("stored");
    assert_eq!(stored.id, analysis.id);
}

#[tokio::test]
async fn provider_failure_rolls_back_the_essay() {
    let h = harness(ScriptedOracle::failing("upstream timeout")).await;

    let err = h.workflow.submit(submission(h.user_id, "en")).await.unwrap_err();

    assert!(matches!(
        err,
        SubmissionError::ScoringUnavailable(CritiqueError::Unavailable(_))
    ));
    assert_eq!(h.db.essay_count(), 0);
    assert_eq!(h.db.analysis_count(), 0);
}

#[tokio::test]
async fn malformed_reply_rolls_back_instead_of_scoring_zero() {
    let h = harness(ScriptedOracle::replying("```json\n{\"oops\": true}\n```")).await;

    let err = h.workflow.submit(submission(h.user_id, "en")).await.unwrap_err();

    assert!(matches!(
        err,
        SubmissionError::ScoringUnavailable(CritiqueError::Malformed(_))
    ));
    assert_eq!(h.db.essay_count(), 0);
    assert_eq!(h.db.analysis_count(), 0);
}

#[tokio::test]
async fn panic_mid_pipeline_rolls_back_the_essay() {
    let h = harness(ScriptedOracle::panicking()).await;

    let err = h.workflow.submit(submission(h.user_id, "en")).await.unwrap_err();

    assert!(matches!(err, SubmissionError::ScoringFailed(_)));
    assert_eq!(h.db.essay_count(), 0);
    assert_eq!(h.db.analysis_count(), 0);
}

#[tokio::test]
async fn analysis_write_failure_rolls_back_the_essay() {
    let h = harness(ScriptedOracle::replying(SAMPLE_REPORT)).await;
    h.db.fail_analysis_writes();

    let err = h.workflow.submit(submission(h.user_id, "en")).await.unwrap_err();

    assert!(matches!(err, SubmissionError::ScoringFailed(_)));
    assert_eq!(h.db.essay_count(), 0);
}

#[tokio::test]
async fn invalid_submission_writes_nothing() {
    let h = harness(ScriptedOracle::replying(SAMPLE_REPORT)).await;
    let mut short = submission(h.user_id, "en");
    short.content = "太短。".to_string();

    let err = h.workflow.submit(short).await.unwrap_err();

    assert!(matches!(err, SubmissionError::Invalid(_)));
    assert_eq!(h.db.essay_count(), 0);
    assert_eq!(h.oracle.calls(), 0);
}

#[tokio::test]
async fn two_submissions_get_independent_analyses() {
    let h = harness(ScriptedOracle::replying(SAMPLE_REPORT)).await;

    let first = h.workflow.submit(submission(h.user_id, "en")).await.expect("first");
    let second = h.workflow.submit(submission(h.user_id, "en")).await.expect("second");

    assert_ne!(first.fields.essay_id, second.fields.essay_id);
    assert_ne!(first.id, second.id);
    assert_eq!(h.db.analysis_count(), 2);

    let err = h.db.create_analysis(first.fields.clone()).await.unwrap_err();
    assert!(matches!(err, PortError::Conflict(_)));
    assert_eq!(h.db.analysis_count(), 2);
}

#[tokio::test]
async fn unsupported_language_falls_back_to_english_everywhere() {
    let h = harness(ScriptedOracle::replying(SAMPLE_REPORT)).await;

    let analysis = h.workflow.submit(submission(h.user_id, "xx")).await.expect("analysis");

    let prompt = h.oracle.last_prompt().expect("prompt sent");
    assert!(prompt.system_instructions.contains("in English"));
    assert_eq!(analysis.fields.analysis_language, "en");
    assert_eq!(analysis.fields.recommendations[0], "【Transitions】");
}

#[tokio::test]
async fn punctuation_only_text_skips_the_oracle() {
    let h = harness(ScriptedOracle::replying(SAMPLE_REPORT)).await;
    let mut s = submission(h.user_id, "en");
    s.content = "。。。。！！！？？？\n\n".to_string();

    let analysis = h.workflow.submit(s).await.expect("analysis");

    assert_eq!(h.oracle.calls(), 0);
    assert_eq!(analysis.fields.structure_score, None);
    assert_eq!(analysis.fields.grammar_score, None);
    assert_eq!(analysis.fields.overall_score, 0);
}
