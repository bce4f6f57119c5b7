//! End-to-end tests for the enrichment pipeline.
//!
//! POST /messages -> queue -> processor -> notes and replies, with mock
//! collaborators scripted per test.

use std::time::Duration;

use connectors::ReplyMessage;
use inbox_core::{ItemStatus, NoteAnalysis, StageKind, FALLBACK_PROVIDER};
use integration_tests::{
    fixtures,
    setup::{TestContext, TestOptions},
};
use worker::ProcessorConfig;

fn without_ai() -> TestOptions {
    TestOptions {
        ai_enabled: false,
        ..TestOptions::default()
    }
}

/// Text message: pending, claimed, title derived from content, completed.
#[tokio::test]
async fn test_text_message_completes_with_content_title() {
    let ctx = TestContext::with_options(without_ai());
    let server = ctx.server();

    let id = ctx
        .receive(&server, fixtures::text_message("hello world"))
        .await;
    assert_eq!(ctx.item(id).await.status, ItemStatus::Pending);

    let summary = ctx.process_all().await;
    assert_eq!(summary.completed, 1);

    let item = ctx.item(id).await;
    assert_eq!(item.status, ItemStatus::Completed);
    assert_eq!(item.attempt_count, 1);
    let result = item.result.expect("completed items carry a result");
    assert_eq!(result.title, "hello world");
    assert_eq!(result.ai_provider, FALLBACK_PROVIDER);
    assert!(!result.degraded, "disabled AI is not a degradation");

    let notes = ctx.mocks.notes.notes();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].body, "hello world");
    assert_eq!(notes[0].source_type, "text");
}

/// Photo whose reference cannot be resolved fails at content resolution.
#[tokio::test]
async fn test_unresolvable_photo_fails_at_content_resolution() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let id = ctx
        .receive(&server, fixtures::photo_message(fixtures::DEAD_REF, Some("receipt")))
        .await;
    let summary = ctx.process_all().await;
    assert_eq!(summary.failed, 1);

    let item = ctx.item(id).await;
    assert_eq!(item.status, ItemStatus::Failed);
    assert!(item.result.is_none());
    let error = item.error.expect("failed items carry an error");
    assert_eq!(error.stage, StageKind::ResolveContent);
    assert!(error.cause.contains("404"));

    assert!(ctx.mocks.notes.notes().is_empty());
    assert_eq!(ctx.mocks.ocr.calls(), 0);

    let replies = ctx.mocks.notifier.replies();
    assert_eq!(replies.len(), 1);
    match &replies[0].1 {
        ReplyMessage::Failed { stage, .. } => assert_eq!(stage, "content resolution"),
        other => panic!("expected failure notice, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ai_analysis_shapes_the_note() {
    let ctx = TestContext::new();
    ctx.mocks.notes.set_folders(&["Projects", "Resources/Tests"]);
    let server = ctx.server();

    let id = ctx
        .receive(&server, fixtures::text_message("Notes about testing strategy"))
        .await;
    ctx.process_all().await;

    let result = ctx.item(id).await.result.unwrap();
    assert_eq!(result.title, "Mock Analysis");
    assert_eq!(result.folder, "Resources/Tests");
    assert_eq!(result.tags, vec!["mock", "testing"]);
    assert_eq!(result.ai_provider, "mock");
    assert!(!result.degraded);

    let prompts = ctx.mocks.analyzer.prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].0, "Notes about testing strategy");
    assert_eq!(prompts[0].1.content_type, "text");
    assert_eq!(prompts[0].1.existing_folders, vec!["Projects", "Resources/Tests"]);

    let replies = ctx.mocks.notifier.replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].0.chat_id, fixtures::SENDER_ID);
    assert!(replies[0].1.render().contains("Saved to Obsidian"));
}

#[tokio::test]
async fn test_ai_failure_degrades_to_fallback() {
    let ctx = TestContext::new();
    ctx.mocks.analyzer.set_failure("connection refused");
    let server = ctx.server();

    let id = ctx
        .receive(&server, fixtures::text_message("Groceries\nmilk, eggs"))
        .await;
    let summary = ctx.process_all().await;
    assert_eq!(summary.degraded, 1);

    let item = ctx.item(id).await;
    assert_eq!(item.status, ItemStatus::Completed);
    let result = item.result.unwrap();
    assert!(result.degraded);
    assert_eq!(result.title, "Groceries");
    assert_eq!(result.ai_provider, FALLBACK_PROVIDER);
    assert_eq!(result.degradations[0].stage, StageKind::Analyze);
    assert!(result.degradations[0].cause.contains("connection refused"));

    let notes = ctx.mocks.notes.notes();
    assert!(notes[0].degraded);
    assert!(notes[0].ai_provider.is_none());

    match &ctx.mocks.notifier.replies()[0].1 {
        ReplyMessage::Saved { ai_available, .. } => assert!(!ai_available),
        other => panic!("expected preview, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ai_failure_is_terminal_without_fallback() {
    let ctx = TestContext::with_options(TestOptions {
        processor: ProcessorConfig {
            fallback_on_ai_error: false,
            ..ProcessorConfig::default()
        },
        ..TestOptions::default()
    });
    ctx.mocks.analyzer.set_failure("quota exceeded");
    let server = ctx.server();

    let id = ctx.receive(&server, fixtures::text_message("anything")).await;
    ctx.process_all().await;

    let item = ctx.item(id).await;
    assert_eq!(item.status, ItemStatus::Failed);
    assert_eq!(item.error.unwrap().stage, StageKind::Analyze);
    assert!(ctx.mocks.notes.notes().is_empty());
}

#[tokio::test]
async fn test_ai_timeout_degrades() {
    let ctx = TestContext::with_options(TestOptions {
        processor: ProcessorConfig {
            analyze_timeout_secs: 1,
            ..ProcessorConfig::default()
        },
        ..TestOptions::default()
    });
    ctx.mocks.analyzer.set_delay(Duration::from_secs(5));
    let server = ctx.server();

    let id = ctx.receive(&server, fixtures::text_message("slow day")).await;
    ctx.process_all().await;

    let result = ctx.item(id).await.result.unwrap();
    assert!(result.degraded);
    assert!(result.degradations[0].cause.starts_with("timed out"));
}

#[tokio::test]
async fn test_photo_with_ocr_text() {
    let ctx = TestContext::new();
    ctx.mocks
        .content
        .serve("https://files.test/board.jpg", &b"\xff\xd8jpeg"[..]);
    ctx.mocks.ocr.set_text("Ship on Friday");
    let server = ctx.server();

    let id = ctx
        .receive(
            &server,
            fixtures::photo_message("https://files.test/board.jpg", Some("whiteboard")),
        )
        .await;
    ctx.process_all().await;

    let item = ctx.item(id).await;
    assert_eq!(item.status, ItemStatus::Completed);
    assert!(!item.result.unwrap().degraded);

    let notes = ctx.mocks.notes.notes();
    assert_eq!(
        notes[0].body,
        "whiteboard\n\n## Extracted Text\n\nShip on Friday"
    );
    assert!(notes[0].has_ocr);
    assert_eq!(notes[0].attachments.len(), 1);

    let attachment = &ctx.mocks.notes.attachments()[0];
    assert!(attachment.starts_with("_attachments/telegram_photo_"));
    assert!(attachment.ends_with(".jpg"));
}

/// OCR failure with resolved content and a writable vault still completes.
#[tokio::test]
async fn test_ocr_failure_degrades() {
    let ctx = TestContext::new();
    ctx.mocks
        .content
        .serve("https://files.test/scan.png", &b"png"[..]);
    ctx.mocks.ocr.set_failure("tesseract not installed");
    let server = ctx.server();

    let id = ctx
        .receive(
            &server,
            fixtures::photo_message("https://files.test/scan.png", Some("scan")),
        )
        .await;
    ctx.process_all().await;

    let item = ctx.item(id).await;
    assert_eq!(item.status, ItemStatus::Completed);
    let result = item.result.unwrap();
    assert!(result.degraded);
    assert_eq!(result.degradations[0].stage, StageKind::ExtractText);

    let notes = ctx.mocks.notes.notes();
    assert_eq!(notes[0].body, "scan");
    assert_eq!(ctx.mocks.notes.attachments().len(), 1);
}

#[tokio::test]
async fn test_persistence_failure_is_terminal() {
    let ctx = TestContext::new();
    ctx.mocks.notes.set_failure("vault is read-only");
    let server = ctx.server();

    let id = ctx.receive(&server, fixtures::text_message("keep me")).await;
    ctx.process_all().await;

    let item = ctx.item(id).await;
    assert_eq!(item.status, ItemStatus::Failed);
    let error = item.error.unwrap();
    assert_eq!(error.stage, StageKind::Materialize);
    assert!(error.cause.contains("read-only"));
}

/// A failed note write leaves no attachment behind.
#[tokio::test]
async fn test_note_failure_removes_saved_attachment() {
    let ctx = TestContext::new();
    ctx.mocks
        .content
        .serve("https://files.test/receipt.jpg", &b"jpeg"[..]);
    ctx.mocks.notes.set_note_failure("disk full");
    let server = ctx.server();

    let id = ctx
        .receive(
            &server,
            fixtures::photo_message("https://files.test/receipt.jpg", Some("receipt")),
        )
        .await;
    ctx.process_all().await;

    let item = ctx.item(id).await;
    assert_eq!(item.status, ItemStatus::Failed);
    assert_eq!(item.error.unwrap().stage, StageKind::Materialize);
    assert!(ctx.mocks.notes.notes().is_empty());
    assert!(ctx.mocks.notes.attachments().is_empty());
}

#[tokio::test]
async fn test_voice_note_is_always_degraded() {
    let ctx = TestContext::with_options(without_ai());
    ctx.mocks
        .content
        .serve("https://files.test/voice.ogg", &b"OggS"[..]);
    let server = ctx.server();

    let id = ctx
        .receive(&server, fixtures::voice_message("https://files.test/voice.ogg", 42))
        .await;
    ctx.process_all().await;

    let result = ctx.item(id).await.result.unwrap();
    assert!(result.degraded);
    assert_eq!(result.degradations[0].stage, StageKind::ExtractText);
    assert!(result.title.starts_with("Voice Note - "));

    let notes = ctx.mocks.notes.notes();
    assert_eq!(notes[0].body, "[Voice message - 42 seconds]");
    assert!(ctx.mocks.notes.attachments()[0].ends_with(".ogg"));
}

#[tokio::test]
async fn test_text_document_passes_through() {
    let ctx = TestContext::with_options(without_ai());
    ctx.mocks
        .content
        .serve("https://files.test/todo.md", &b"# Todo\n- write tests"[..]);
    let server = ctx.server();

    let id = ctx
        .receive(
            &server,
            fixtures::document_message("https://files.test/todo.md", "todo.md", "text/markdown"),
        )
        .await;
    ctx.process_all().await;

    let result = ctx.item(id).await.result.unwrap();
    assert_eq!(result.title, "Todo");
    assert!(!result.degraded);
    assert!(ctx.mocks.notes.attachments()[0].ends_with("_todo.md"));
}

#[tokio::test]
async fn test_hidden_link_rendered_and_article_appended() {
    let ctx = TestContext::new();
    ctx.mocks.articles.serve(
        "https://blog.test/rust",
        "Why Rust",
        "Ownership makes concurrency safe.",
    );
    let server = ctx.server();

    let id = ctx
        .receive(
            &server,
            fixtures::text_link_message("read this post", 10, 4, "https://blog.test/rust"),
        )
        .await;
    ctx.process_all().await;

    let result = ctx.item(id).await.result.unwrap();
    assert_eq!(result.title, "Why Rust", "article title wins over the AI title");

    let note = &ctx.mocks.notes.notes()[0];
    assert!(note.body.starts_with("read this [post](https://blog.test/rust)"));
    assert!(note.body.contains("## Why Rust"));
    assert!(note.body.contains("Ownership makes concurrency safe."));
    assert_eq!(note.article_url.as_deref(), Some("https://blog.test/rust"));
}

#[tokio::test]
async fn test_article_failure_degrades() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let id = ctx
        .receive(
            &server,
            fixtures::text_message("see https://gone.test/page for details"),
        )
        .await;
    ctx.process_all().await;

    let result = ctx.item(id).await.result.unwrap();
    assert!(result.degraded);
    assert_eq!(result.degradations[0].stage, StageKind::ExtractText);
    assert_eq!(
        ctx.mocks.notes.notes()[0].body,
        "see https://gone.test/page for details"
    );
}

#[tokio::test]
async fn test_reply_failure_does_not_change_outcome() {
    let ctx = TestContext::new();
    ctx.mocks.notifier.set_should_fail(true);
    let server = ctx.server();

    let id = ctx.receive(&server, fixtures::text_message("quiet")).await;
    ctx.process_all().await;

    assert_eq!(ctx.item(id).await.status, ItemStatus::Completed);
}

#[tokio::test]
async fn test_no_reply_without_target() {
    let ctx = TestContext::new();
    let server = ctx.server();

    ctx.receive(&server, fixtures::silent_text_message("no one to tell"))
        .await;
    ctx.process_all().await;

    assert!(ctx.mocks.notifier.replies().is_empty());
}

#[tokio::test]
async fn test_preview_disabled_sends_no_success_reply() {
    let ctx = TestContext::with_options(TestOptions {
        send_preview: false,
        ..TestOptions::default()
    });
    let server = ctx.server();

    ctx.receive(&server, fixtures::text_message("hush")).await;
    ctx.process_all().await;

    assert!(ctx.mocks.notifier.replies().is_empty());
}

#[tokio::test]
async fn test_note_written_to_real_vault() {
    let ctx = TestContext::with_options(TestOptions {
        real_vault: true,
        ..TestOptions::default()
    });
    ctx.mocks.analyzer.set_reply(NoteAnalysis {
        title: "Vault Check".to_string(),
        summary: "Checks the vault writer".to_string(),
        tags: vec!["check".to_string()],
        suggested_folder: "Inbox".to_string(),
        ..NoteAnalysis::default()
    });
    let server = ctx.server();

    let first = ctx.receive(&server, fixtures::text_message("same title")).await;
    let second = ctx.receive(&server, fixtures::text_message("same title")).await;
    ctx.process_all().await;

    let first = ctx.item(first).await.result.unwrap().note_path;
    let second = ctx.item(second).await.result.unwrap().note_path;
    assert_ne!(first, second, "conflicting filenames get a suffix");
    assert!(first.starts_with("Incoming/"));

    let written = std::fs::read_to_string(ctx.dir.path().join("vault").join(&first)).unwrap();
    assert!(written.starts_with("---\n"));
    assert!(written.contains("# Vault Check"));
    assert!(written.contains("same title"));
}
