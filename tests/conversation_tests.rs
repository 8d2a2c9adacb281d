//! Tests of the high-level Conversation facade.

mod common;

use common::*;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use voxloop::types::{Language, Role, Voice};
use voxloop::Conversation;

fn conversation(stt: Arc<MockStt>, llm: Arc<MockLlm>, tts: Arc<MockTts>) -> Conversation {
    Conversation::new(stt, llm, tts)
}

#[tokio::test]
async fn test_text_only_round_trip() {
    let conv = conversation(
        Arc::new(MockStt::new("")),
        Arc::new(MockLlm::new("Paris.")),
        Arc::new(MockTts::new(&[])),
    );
    let cancel = CancellationToken::new();

    let response = conv.text_only(&cancel, "Capital of France?").await.unwrap();
    assert_eq!(response, "Paris.");
    assert_eq!(conv.last_user_message(), "Capital of France?");
    assert_eq!(conv.last_assistant_message(), "Paris.");

    let ctx = conv.context();
    assert_eq!(ctx.len(), 2);
    assert_eq!(ctx[0].role, Role::User);
    assert_eq!(ctx[1].role, Role::Assistant);
}

#[tokio::test]
async fn test_chat_streams_synthesis() {
    let conv = conversation(
        Arc::new(MockStt::new("")),
        Arc::new(MockLlm::new("hello there")),
        Arc::new(MockTts::new(&[&[1, 2], &[3]])),
    );
    let cancel = CancellationToken::new();

    let mut received = Vec::new();
    let mut sink = |chunk: Vec<u8>| -> anyhow::Result<()> {
        received.extend_from_slice(&chunk);
        Ok(())
    };
    let response = conv.chat(&cancel, "hi", &mut sink).await.unwrap();
    assert_eq!(response, "hello there");
    assert_eq!(received, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_process_audio_reports_both_sides() {
    let conv = conversation(
        Arc::new(MockStt::new("what time is it")),
        Arc::new(MockLlm::new("half past nine")),
        Arc::new(MockTts::new(&[&[9]])),
    );
    let cancel = CancellationToken::new();

    let mut sink = |_chunk: Vec<u8>| -> anyhow::Result<()> { Ok(()) };
    let (transcript, response) =
        conv.process_audio(&cancel, &[1, 2, 3], &mut sink).await.unwrap();
    assert_eq!(transcript, "what time is it");
    assert_eq!(response, "half past nine");
}

#[tokio::test]
async fn test_voice_and_language_validation() {
    let conv = conversation(
        Arc::new(MockStt::new("")),
        Arc::new(MockLlm::new("")),
        Arc::new(MockTts::new(&[])),
    );

    conv.set_voice_by_name("m2").unwrap();
    assert_eq!(conv.session().voice(), Voice::M2);
    assert!(conv.set_voice_by_name("Q9").is_err());

    conv.set_language_by_name("de").unwrap();
    assert_eq!(conv.session().language(), Language::De);
    assert!(conv.set_language_by_name("klingon").is_err());
}

#[tokio::test]
async fn test_clear_context_keeps_prompt_reset_wipes_it() {
    let conv = conversation(
        Arc::new(MockStt::new("")),
        Arc::new(MockLlm::new("ok")),
        Arc::new(MockTts::new(&[])),
    );
    let cancel = CancellationToken::new();

    conv.set_system_prompt("be kind");
    conv.set_voice(Voice::M5);
    conv.text_only(&cancel, "hey").await.unwrap();
    assert_eq!(conv.context().len(), 3);

    conv.clear_context();
    let ctx = conv.context();
    assert_eq!(ctx.len(), 1);
    assert_eq!(ctx[0].content, "be kind");
    assert_eq!(conv.session().voice(), Voice::M5);

    conv.reset();
    assert!(conv.context().is_empty());
    assert_eq!(conv.session().voice(), Voice::F1);
}

#[tokio::test]
async fn test_generated_session_ids_are_unique() {
    let a = conversation(
        Arc::new(MockStt::new("")),
        Arc::new(MockLlm::new("")),
        Arc::new(MockTts::new(&[])),
    );
    let b = conversation(
        Arc::new(MockStt::new("")),
        Arc::new(MockLlm::new("")),
        Arc::new(MockTts::new(&[])),
    );
    assert_ne!(a.session_id(), b.session_id());
    assert_eq!(a.providers().llm, "mock_llm");
}
