//! 划词翻译、持久化设置与自动翻译的集成测试

use std::rc::Rc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use page_translator::parsers::DomPort;
use page_translator::translation::backend::{ScriptedCapability, TextBehavior};
use page_translator::translation::core::{mutation_channel, AutoTranslator, MutationRecord};
use page_translator::translation::storage::settings::{keys, read_or, write};
use page_translator::translation::{FileSettingsStore, SettingsStore, TranslationError};

mod common;

use common::{HtmlTestHelper, TestEnvironment};

#[tokio::test(start_paused = true)]
async fn test_selection_recovers_from_invalid_session() {
    let env = TestEnvironment::builder(HtmlTestHelper::page("")).build();

    assert_eq!(env.engine.translate_text("one").await.unwrap(), "[ja] one");
    env.capability.invalidate_sessions();
    assert_eq!(env.engine.translate_text("two").await.unwrap(), "[ja] two");
    assert_eq!(env.capability.sessions_created(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_selection_keeps_newlines() {
    let env = TestEnvironment::builder(HtmlTestHelper::page("")).build();
    let translated = env.engine.translate_text("line one\nline two").await.unwrap();
    assert_eq!(translated, "[ja] line one\nline two");
    assert_eq!(env.capability.texts(), vec!["line one<br>line two".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_selection_failure_is_retried_then_reported() {
    let capability = ScriptedCapability::new().with_behavior("broken", TextBehavior::Fail);
    let env = TestEnvironment::builder(HtmlTestHelper::page(""))
        .capability(capability)
        .build();

    let started = tokio::time::Instant::now();
    let err = env.engine.translate_text_with_retry("broken").await.unwrap_err();
    assert!(matches!(err, TranslationError::Backend(_)));
    assert_eq!(env.capability.started(), 4);
    // 每次重试前暂停
    assert!(started.elapsed() >= Duration::from_secs(3));
    // 每次重试前都重建会话
    assert_eq!(env.capability.sessions_created(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_selection_unsupported_pair_is_not_retried() {
    let capability = ScriptedCapability::new().with_unsupported_pair("en", "ja");
    let env = TestEnvironment::builder(HtmlTestHelper::page(""))
        .capability(capability)
        .build();

    let err = env.engine.translate_text_with_retry("hello").await.unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(env.capability.started(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_settings_survive_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");

    {
        let env = TestEnvironment::builder(HtmlTestHelper::page("")).build();
        let engine = Rc::try_unwrap(env.engine).ok().unwrap();
        let store: Rc<dyn SettingsStore> = Rc::new(FileSettingsStore::new(&path));
        let engine = engine.with_settings(store, "docs.example").unwrap();
        engine.set_languages("de", "fr");
        engine.set_auto_observe(true);
    }

    let env = TestEnvironment::builder(HtmlTestHelper::page("")).build();
    let engine = Rc::try_unwrap(env.engine).ok().unwrap();
    let store: Rc<dyn SettingsStore> = Rc::new(FileSettingsStore::new(&path));
    let engine = engine.with_settings(store.clone(), "docs.example").unwrap();

    assert_eq!(engine.source_lang(), "de");
    assert_eq!(engine.target_lang(), "fr");
    assert!(engine.auto_observe());
    assert!(!read_or(store.as_ref(), &keys::auto_observe("other.example"), false));
}

#[tokio::test(start_paused = true)]
async fn test_globally_disabled_engine_does_not_start() {
    let dir = TempDir::new().unwrap();
    let store: Rc<dyn SettingsStore> = Rc::new(FileSettingsStore::new(dir.path().join("s.json")));
    write(store.as_ref(), keys::DISABLED, true);

    let env = TestEnvironment::builder(HtmlTestHelper::page("")).build();
    let engine = Rc::try_unwrap(env.engine).ok().unwrap();
    assert!(engine.with_settings(store, "any.example").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_auto_observe_translates_inserted_content() {
    let env = TestEnvironment::builder(HtmlTestHelper::paragraphs(2)).build();
    env.engine.translate_page(false).await.unwrap();
    env.engine.set_auto_observe(true);

    let (tx, rx) = mutation_channel();
    let cancel = CancellationToken::new();
    let observer = AutoTranslator::new(env.engine.clone());

    let page = async {
        let port = &env.port;
        let p = port.create_element("p");
        port.append_child(&p, &port.create_text("Loaded later")).unwrap();
        port.append_child(&port.body(), &p).unwrap();
        tx.send(MutationRecord::new(vec![p])).unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        cancel.cancel();
    };
    let (stats, _) = tokio::join!(observer.run(rx, cancel.clone()), page);

    assert_eq!(stats.passes, 1);
    // 只有新内容被送去翻译
    assert_eq!(env.capability.started(), 3);
    assert_eq!(env.capability.texts().last().map(String::as_str), Some("Loaded later"));
}
