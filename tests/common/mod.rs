// 集成测试公共模块
//
// 提供测试页面、引擎构建与断言辅助

#![allow(dead_code)]

use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use page_translator::parsers::{DomPort, RcDomPort};
use page_translator::translation::backend::{
    HostCapabilities, ScriptedCapability, ScriptedDetector, TokioWorkerSpawner,
};
use page_translator::translation::config::SegmentStrategy;
use page_translator::translation::{RecordingSurface, TranslationConfig, TranslationEngine};

/// 测试页面
pub struct HtmlTestHelper;

impl HtmlTestHelper {
    pub fn page(body: &str) -> String {
        format!(
            "<html><head><title>Test page</title></head><body>{}</body></html>",
            body
        )
    }

    /// 常见的文章页面：标题、段落、列表、代码与引擎界面
    pub fn article() -> String {
        Self::page(
            "<div class=\"ft-ui\"><button>Translate</button></div>\
             <article><h1>Getting started</h1>\
             <p>Install the <b>package</b> first.</p>\
             <ul><li>Open the settings page</li><li>Pick a language</li></ul>\
             <pre><code>cargo install tool</code></pre>\
             <p>See https://example.com/docs for details.</p></article>",
        )
    }

    /// `count` 个段落，第 i 个的文本是 `Paragraph number i`
    pub fn paragraphs(count: usize) -> String {
        let body: String = (0..count)
            .map(|i| format!("<p>{}</p>", Self::paragraph_text(i)))
            .collect();
        Self::page(&body)
    }

    pub fn paragraph_text(i: usize) -> String {
        format!("Paragraph number {}", i)
    }

    pub fn port(html: &str) -> Rc<RcDomPort> {
        Rc::new(RcDomPort::parse(html.as_bytes(), "utf-8").expect("parse html"))
    }
}

/// 测试引擎的组装
pub struct TestEnvironment {
    pub port: Rc<RcDomPort>,
    pub capability: ScriptedCapability,
    pub surface: Rc<RecordingSurface>,
    pub engine: Rc<TranslationEngine<RcDomPort>>,
}

pub struct TestEnvironmentBuilder {
    html: String,
    capability: ScriptedCapability,
    config: TranslationConfig,
    workers: bool,
    detector: Option<ScriptedDetector>,
}

impl TestEnvironmentBuilder {
    pub fn new(html: String) -> Self {
        Self {
            html,
            capability: ScriptedCapability::new(),
            config: TranslationConfig {
                source_lang: "en".to_string(),
                target_lang: "ja".to_string(),
                max_concurrency: 4,
                use_workers: false,
                ..TranslationConfig::default()
            },
            workers: false,
            detector: None,
        }
    }

    pub fn detector(mut self, language: &str, confidence: f64) -> Self {
        self.detector = Some(ScriptedDetector::new(language, confidence));
        self
    }

    pub fn capability(mut self, capability: ScriptedCapability) -> Self {
        self.capability = capability;
        self
    }

    pub fn languages(mut self, source: &str, target: &str) -> Self {
        self.config.source_lang = source.to_string();
        self.config.target_lang = target.to_string();
        self
    }

    pub fn strategy(mut self, strategy: SegmentStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn keep_original(mut self, keep: bool) -> Self {
        self.config.keep_original = keep;
        self
    }

    pub fn concurrency(mut self, limit: usize, adaptive: bool) -> Self {
        self.config.max_concurrency = limit;
        self.config.adaptive_limit = adaptive;
        self
    }

    pub fn segment_timeout(mut self, timeout: Duration) -> Self {
        self.config.segment_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn workers(mut self) -> Self {
        self.workers = true;
        self.config.use_workers = true;
        self
    }

    pub fn build(self) -> TestEnvironment {
        let port = HtmlTestHelper::port(&self.html);
        let surface = Rc::new(RecordingSurface::new());
        let translator = Arc::new(self.capability.clone());
        let mut capabilities = HostCapabilities::new(translator.clone());
        if let Some(detector) = self.detector {
            capabilities = capabilities.with_detector(Arc::new(detector));
        }
        if self.workers {
            capabilities = capabilities.with_workers(Arc::new(TokioWorkerSpawner::new(translator)));
        }
        let engine = TranslationEngine::new(port.clone(), self.config, capabilities, surface.clone());

        TestEnvironment {
            port,
            capability: self.capability,
            surface,
            engine: Rc::new(engine),
        }
    }
}

impl TestEnvironment {
    pub fn builder(html: String) -> TestEnvironmentBuilder {
        TestEnvironmentBuilder::new(html)
    }

    pub fn html(&self) -> String {
        self.port.to_html_string()
    }

    /// 文档中 `class` 元素的数量
    pub fn count_class(&self, class: &str) -> usize {
        let body = self.port.body();
        self.port
            .find_elements(&body, |node| self.port.has_class(node, class))
            .len()
    }
}

/// 断言辅助
pub struct AssertionHelper;

impl AssertionHelper {
    pub fn assert_contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "expected to find {:?} in:\n{}",
            needle,
            haystack
        );
    }

    pub fn assert_not_contains(haystack: &str, needle: &str) {
        assert!(
            !haystack.contains(needle),
            "did not expect {:?} in:\n{}",
            needle,
            haystack
        );
    }
}
