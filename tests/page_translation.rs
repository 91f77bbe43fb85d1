//! 页面翻译集成测试
//!
//! 覆盖完整轮次：收集、会话、调度、应用与还原

use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use page_translator::parsers::DomPort;
use page_translator::translation::backend::{HostCapabilities, ScriptedCapability, TextBehavior};
use page_translator::translation::config::{constants, SegmentStrategy};
use page_translator::translation::{
    RecordingSurface, TranslationConfig, TranslationEngine, TranslationError,
};

mod common;

use common::{AssertionHelper, HtmlTestHelper, TestEnvironment};

#[tokio::test(start_paused = true)]
async fn test_single_paragraph_and_code_block() {
    let env = TestEnvironment::builder(HtmlTestHelper::page(
        "<p>Hello world</p><code>let x = 1;</code>",
    ))
    .build();

    let report = env.engine.translate_page(false).await.unwrap();
    assert_eq!(report.collected, 1);
    assert_eq!(report.translated, 1);
    assert_eq!(env.capability.texts(), vec!["Hello world".to_string()]);

    let html = env.html();
    AssertionHelper::assert_contains(&html, "data-ft-pair=\"en->ja\"");
    AssertionHelper::assert_contains(
        &html,
        "<span class=\"ft-original\">Hello world</span><span class=\"ft-translated\">[ja] Hello world</span>",
    );
    AssertionHelper::assert_contains(&html, "<code>let x = 1;</code>");
    assert_eq!(env.count_class(constants::PAIR_CLASS), 1);
    assert_eq!(env.surface.last_status().as_deref(), Some("翻译完成：1/1"));
    assert!(!env.surface.is_busy());
}

#[tokio::test(start_paused = true)]
async fn test_article_skips_ui_and_code() {
    let env = TestEnvironment::builder(HtmlTestHelper::article()).build();
    env.engine.translate_page(false).await.unwrap();

    let texts = env.capability.texts();
    assert!(texts.contains(&"Getting started".to_string()));
    assert!(texts.contains(&"Open the settings page".to_string()));
    assert!(!texts.iter().any(|t| t == "Translate"));
    assert!(!texts.iter().any(|t| t.contains("cargo install")));
    AssertionHelper::assert_contains(&env.html(), "<pre><code>cargo install tool</code></pre>");
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_pair_is_fatal() {
    let capability = ScriptedCapability::new().with_unsupported_pair("en", "xx");
    let env = TestEnvironment::builder(HtmlTestHelper::paragraphs(3))
        .capability(capability)
        .languages("en", "xx")
        .build();
    let before = env.html();

    let err = env.engine.translate_page(false).await.unwrap_err();
    assert_eq!(
        err,
        TranslationError::PairUnsupported {
            source_lang: "en".into(),
            target_lang: "xx".into()
        }
    );
    assert_eq!(env.capability.started(), 0);
    assert_eq!(env.html(), before);
    assert!(env.surface.statuses().iter().any(|s| s == "不支持 en -> xx 翻译"));
    assert!(!env.surface.is_busy());
    assert!(!env.engine.is_in_progress());
}

#[tokio::test(start_paused = true)]
async fn test_missing_capability_is_fatal() {
    let port = HtmlTestHelper::port(&HtmlTestHelper::paragraphs(2));
    let surface = Rc::new(RecordingSurface::new());
    let engine = TranslationEngine::new(
        port,
        TranslationConfig::default(),
        HostCapabilities::default(),
        surface.clone(),
    );

    let err = engine.translate_page(false).await.unwrap_err();
    assert_eq!(err, TranslationError::CapabilityAbsent);
    assert!(err.is_fatal());
    assert!(surface.last_status().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_hanging_segment_does_not_block_the_pass() {
    let hang = HtmlTestHelper::paragraph_text(17);
    let capability = ScriptedCapability::new()
        .with_delay(Duration::from_millis(100))
        .with_behavior(&hang, TextBehavior::Hang);
    let env = TestEnvironment::builder(HtmlTestHelper::paragraphs(50))
        .capability(capability)
        .concurrency(4, false)
        .segment_timeout(Duration::from_secs(5))
        .build();

    let report = env.engine.translate_page(false).await.unwrap();
    assert_eq!(report.collected, 50);
    assert_eq!(report.translated, 49);
    assert_eq!(report.failed, 1);
    assert!(!report.cancelled);

    assert_eq!(env.capability.max_in_flight(), 4);
    assert_eq!(env.capability.in_flight(), 0);
    assert_eq!(env.count_class(constants::PAIR_CLASS), 49);

    // 最先启动的是文档中最前面的片段
    let mut started: Vec<String> = env.capability.texts().into_iter().take(4).collect();
    started.sort();
    let expected: Vec<String> = (0..4).map(HtmlTestHelper::paragraph_text).collect();
    assert_eq!(started, expected);

    let progress = env.surface.progress();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(progress.last().copied(), Some(100.0));
}

#[tokio::test(start_paused = true)]
async fn test_adaptive_limit_stays_under_ceiling() {
    let capability = ScriptedCapability::new().with_delay(Duration::from_millis(50));
    let env = TestEnvironment::builder(HtmlTestHelper::paragraphs(60))
        .capability(capability)
        .concurrency(3, true)
        .build();

    let report = env.engine.translate_page(false).await.unwrap();
    assert_eq!(report.translated, 60);
    assert!(env.capability.max_in_flight() <= 3 * constants::ADAPTIVE_CEILING_FACTOR);
}

#[tokio::test(start_paused = true)]
async fn test_round_trip_for_both_strategies() {
    for strategy in [SegmentStrategy::TextNode, SegmentStrategy::Container] {
        for keep_original in [true, false] {
            let env = TestEnvironment::builder(HtmlTestHelper::article())
                .strategy(strategy)
                .keep_original(keep_original)
                .build();
            let before = env.html();

            let report = env.engine.translate_page(false).await.unwrap();
            assert!(report.translated > 0, "{:?}", strategy);
            assert_ne!(env.html(), before);

            assert!(env.engine.restore_page() > 0);
            assert_eq!(env.html(), before, "{:?} keep_original={}", strategy, keep_original);
            assert!(!env.engine.is_page_translated());
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_container_strategy_marks_containers() {
    let env = TestEnvironment::builder(HtmlTestHelper::page(
        "<p>Install the <b>package</b> first.</p>",
    ))
    .strategy(SegmentStrategy::Container)
    .build();

    env.engine.translate_page(false).await.unwrap();
    assert_eq!(env.capability.texts(), vec!["Install the package first.".to_string()]);

    let html = env.html();
    AssertionHelper::assert_contains(&html, "data-ft-segment-translated=\"true\"");
    AssertionHelper::assert_contains(
        &html,
        "<span class=\"ft-segment-translated\">[ja] Install the package first.</span>",
    );
}

#[tokio::test(start_paused = true)]
async fn test_second_pass_collects_nothing() {
    let env = TestEnvironment::builder(HtmlTestHelper::paragraphs(5)).build();

    let first = env.engine.translate_page(false).await.unwrap();
    assert_eq!(first.translated, 5);

    let second = env.engine.translate_page(false).await.unwrap();
    assert_eq!(second.collected, 0);
    assert_eq!(env.capability.started(), 5);
    assert_eq!(env.count_class(constants::PAIR_CLASS), 5);
}

#[tokio::test(start_paused = true)]
async fn test_keep_original_toggle_after_translation() {
    let env = TestEnvironment::builder(HtmlTestHelper::paragraphs(3)).build();
    env.engine.translate_page(false).await.unwrap();
    assert_eq!(env.count_class(constants::SHOW_ORIGINAL_CLASS), 3);

    assert_eq!(env.engine.set_keep_original(false), 3);
    assert_eq!(env.count_class(constants::SHOW_ORIGINAL_CLASS), 0);
    assert!(!env.engine.keep_original());

    env.engine.set_keep_original(true);
    assert_eq!(env.count_class(constants::SHOW_ORIGINAL_CLASS), 3);
}

#[tokio::test(start_paused = true)]
async fn test_changed_anchor_is_skipped() {
    let first = HtmlTestHelper::paragraph_text(0);
    let capability = ScriptedCapability::new()
        .with_behavior(&first, TextBehavior::Delay(Duration::from_secs(1)));
    let env = TestEnvironment::builder(HtmlTestHelper::paragraphs(3))
        .capability(capability)
        .build();

    let page_script = async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let p = env.port.find(&["html", "body", "p"])[0].clone();
        env.port.set_inner_markup(&p, "Rewritten by page").unwrap();
    };
    let (report, _) = tokio::join!(env.engine.translate_page(false), page_script);

    let report = report.unwrap();
    assert_eq!(report.translated, 2);
    assert_eq!(report.skipped, 1);
    AssertionHelper::assert_contains(&env.html(), "<p>Rewritten by page</p>");
}

#[tokio::test(start_paused = true)]
async fn test_changed_container_is_skipped() {
    let capability = ScriptedCapability::new()
        .with_behavior("Install the package first.", TextBehavior::Delay(Duration::from_secs(1)));
    let env = TestEnvironment::builder(HtmlTestHelper::page(
        "<p>Install the <b>package</b> first.</p><p>Then run it.</p>",
    ))
    .capability(capability)
    .strategy(SegmentStrategy::Container)
    .build();

    let page_script = async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let p = env.port.find(&["html", "body", "p"])[0].clone();
        env.port.set_inner_markup(&p, "Rewritten by page").unwrap();
    };
    let (report, _) = tokio::join!(env.engine.translate_page(false), page_script);

    let report = report.unwrap();
    assert_eq!(report.translated, 1);
    assert_eq!(report.skipped, 1);
    let html = env.html();
    AssertionHelper::assert_contains(&html, "<p>Rewritten by page</p>");
    AssertionHelper::assert_not_contains(&html, "[ja] Install the package first.");
}

#[tokio::test(start_paused = true)]
async fn test_auto_source_uses_detector() {
    let env = TestEnvironment::builder(HtmlTestHelper::paragraphs(2))
        .languages("auto", "ja")
        .detector("fr", 0.9)
        .build();

    let report = env.engine.translate_page(false).await.unwrap();
    assert_eq!(report.source_lang, "fr");
    AssertionHelper::assert_contains(&env.html(), "data-ft-pair=\"fr->ja\"");
}

#[tokio::test(start_paused = true)]
async fn test_low_confidence_detection_is_undetermined() {
    let env = TestEnvironment::builder(HtmlTestHelper::paragraphs(2))
        .languages("auto", "ja")
        .detector("fr", 0.3)
        .build();

    let report = env.engine.translate_page(false).await.unwrap();
    assert_eq!(report.source_lang, constants::UNDETERMINED_LANG);
}

#[tokio::test(start_paused = true)]
async fn test_worker_pool_translates_page() {
    let env = TestEnvironment::builder(HtmlTestHelper::paragraphs(10))
        .workers()
        .build();

    let report = env.engine.translate_page(false).await.unwrap();
    assert_eq!(report.translated, 10);
    assert_eq!(env.capability.started(), 10);
    AssertionHelper::assert_contains(&env.html(), "[ja] Paragraph number 9");

    // 工作者的会话随池一起销毁，只保留主会话
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        env.capability.sessions_destroyed(),
        env.capability.sessions_created() - 1
    );
}

#[tokio::test(start_paused = true)]
async fn test_blocked_workers_fall_back() {
    let port = HtmlTestHelper::port(&HtmlTestHelper::paragraphs(4));
    let capability = Arc::new(ScriptedCapability::new());
    let capabilities = HostCapabilities::new(capability.clone()).with_workers(Arc::new(
        page_translator::translation::backend::TokioWorkerSpawner::blocked(),
    ));
    let config = TranslationConfig {
        source_lang: "en".into(),
        use_workers: true,
        ..TranslationConfig::default()
    };
    let engine = TranslationEngine::new(port, config, capabilities, Rc::new(RecordingSurface::new()));

    let report = engine.translate_page(false).await.unwrap();
    assert_eq!(report.translated, 4);
    assert_eq!(capability.started(), 4);
}
