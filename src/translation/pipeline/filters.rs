//! 文本过滤器模块
//!
//! 判断一段文本是否应被排除在翻译之外。判断是纯函数，按固定优先级执行，
//! 第一条命中的规则决定结果：代码环境、URL、代码标识符与技术术语、
//! Markdown 语法、纯标点、数字与版本号、短缩写。

use std::sync::OnceLock;

use regex::Regex;

use crate::translation::config::constants;

/// 排除原因，按判断优先级排列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    Empty,
    CodeEnvironment,
    Url,
    CodeIdentifier,
    TechnicalTerm,
    Markdown,
    Punctuation,
    NumberOrVersion,
    ShortAcronym,
}

/// 祖先链中一个元素的摘要
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AncestorFrame {
    pub tag: String,
    pub class: String,
    /// 是否带有 `data-lang`、`data-language` 或 `data-code`
    pub has_code_data: bool,
}

/// 文本所在元素向上的祖先链，最近的在前
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AncestorContext {
    pub frames: Vec<AncestorFrame>,
}

impl AncestorContext {
    pub fn new(frames: Vec<AncestorFrame>) -> Self {
        Self { frames }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

const CODE_IDENTIFIER_PATTERNS: &[&str] = &[
    r"^[a-zA-Z_][a-zA-Z0-9_]*\.[a-zA-Z_][a-zA-Z0-9_.]*$",
    r"^[a-zA-Z_][a-zA-Z0-9_]*::[a-zA-Z_][a-zA-Z0-9_]*$",
    r"^--[a-zA-Z-]+(-[a-zA-Z-]+)*$",
    r"^-[a-zA-Z]$",
    r"^[A-Z_][A-Z0-9_]*$",
    r"^[a-z]+[A-Z][a-zA-Z0-9]*$",
    r"^\$[a-zA-Z_][a-zA-Z0-9_]*$",
    r"^@[a-zA-Z_][a-zA-Z0-9_]*$",
    r"^#[a-zA-Z_][a-zA-Z0-9_]*$",
    r"^[a-zA-Z0-9_-]+/[a-zA-Z0-9_-]+$",
    r"^[a-zA-Z0-9_-]+:[a-zA-Z0-9_-]+$",
    r"^[a-zA-Z][a-zA-Z0-9]*\(\)$",
    r"^[a-zA-Z][a-zA-Z0-9]*\[\]$",
    r"^[a-zA-Z][a-zA-Z0-9]*\{\}$",
];

const URL_PATTERNS: &[&str] = &[
    r"(?i)^https?://\S+$",
    r"^[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}(/\S*)?$",
    r"(?i)^[a-zA-Z0-9.-]+\.(io|com|org)(/\S*)?$",
    r"(?i)^kubernetes\.io\S*$",
    r"(?i)^github\.com\S*$",
];

const MARKDOWN_PATTERNS: &[&str] = &[
    r"^#{1,6}\s",
    r"^\*\s",
    r"^-\s",
    r"^\d+\.\s",
    r"^>\s",
    r"^```",
    r"^`[^`]+`$",
    r"^\[[^\]]+\]\([^)]+\)$",
    r"^!\[[^\]]*\]\([^)]+\)$",
];

const NUMBER_PATTERNS: &[&str] = &[
    r"^\d+$",
    r"^\d+\.\d+(\.\d+)?$",
    r"^v\d+\.\d+(\.\d+)?$",
    r"^\d+[a-zA-Z]+$",
];

const CODE_CLASS_PATTERNS: &[&str] = &[
    r"(?i)\bcode\b",
    r"(?i)\bpre\b",
    r"(?i)\bhighlight\b",
    r"(?i)\blanguage-",
    r"(?i)\bhljs\b",
    r"(?i)\bcodehilite\b",
    r"(?i)\bsyntax\b",
    r"(?i)\bmonospace\b",
];

/// 不区分大小写比较的技术术语
const TECHNICAL_TERMS: &[&str] = &[
    "kubernetes", "ingress", "nginx", "controller", "rollouts", "argo", "spec", "metadata",
    "annotations", "labels", "namespace", "deployment", "service", "configmap", "secret", "pod",
    "node", "cluster", "kubectl", "helm", "docker", "container", "image", "registry", "yaml",
    "json", "api", "endpoint", "webhook", "crd", "rbac",
];

const TECHNICAL_ABBREVIATIONS: &[&str] = &[
    "API", "URL", "CSS", "HTML", "XML", "JSON", "HTTP", "HTTPS", "FTP", "SSH", "SSL", "TLS",
    "DNS", "CDN", "SDK", "CLI", "GUI", "IDE", "SQL", "REST", "SOAP", "JWT", "CORS", "CSRF",
];

/// 编译后的正则表达式集合
struct RegexCache {
    url: Vec<Regex>,
    code_identifier: Vec<Regex>,
    markdown: Vec<Regex>,
    number: Vec<Regex>,
    code_class: Vec<Regex>,
    punctuation: Option<Regex>,
    acronym: Option<Regex>,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(regex) => Some(regex),
            Err(e) => {
                tracing::error!("正则表达式编译失败 {}: {}", pattern, e);
                None
            }
        })
        .collect()
}

fn regexes() -> &'static RegexCache {
    static CACHE: OnceLock<RegexCache> = OnceLock::new();
    CACHE.get_or_init(|| RegexCache {
        url: compile(URL_PATTERNS),
        code_identifier: compile(CODE_IDENTIFIER_PATTERNS),
        markdown: compile(MARKDOWN_PATTERNS),
        number: compile(NUMBER_PATTERNS),
        code_class: compile(CODE_CLASS_PATTERNS),
        punctuation: compile(&[r"^[\s\p{P}\p{S}]+$"]).into_iter().next(),
        acronym: compile(&[r"^[A-Z]{2,3}$"]).into_iter().next(),
    })
}

fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|regex| regex.is_match(text))
}

/// 文本过滤器
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFilter;

impl TextFilter {
    /// 创建新的文本过滤器
    pub fn new() -> Self {
        Self
    }

    /// 给出排除原因，`None` 表示可以翻译
    pub fn classify(&self, text: &str, context: &AncestorContext) -> Option<SkipReason> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Some(SkipReason::Empty);
        }

        // 代码环境优先于一切文本规则
        if self.is_in_code_environment(context) {
            return Some(SkipReason::CodeEnvironment);
        }

        if self.is_url(trimmed) {
            return Some(SkipReason::Url);
        }

        if self.is_code_identifier(trimmed) {
            return Some(SkipReason::CodeIdentifier);
        }

        if self.is_technical_term(trimmed) {
            return Some(SkipReason::TechnicalTerm);
        }

        if self.is_markdown_syntax(trimmed) {
            return Some(SkipReason::Markdown);
        }

        if is_punctuation_only(trimmed) {
            return Some(SkipReason::Punctuation);
        }

        if self.is_number_or_version(trimmed) {
            return Some(SkipReason::NumberOrVersion);
        }

        if self.is_short_acronym(trimmed) {
            return Some(SkipReason::ShortAcronym);
        }

        None
    }

    /// 判断文本是否应跳过翻译
    pub fn should_skip(&self, text: &str, context: &AncestorContext) -> bool {
        self.classify(text, context).is_some()
    }

    /// 检查祖先链是否处于代码环境
    pub fn is_in_code_environment(&self, context: &AncestorContext) -> bool {
        let class_patterns = &regexes().code_class;
        context
            .frames
            .iter()
            .take(constants::CODE_ANCESTOR_DEPTH)
            .any(|frame| {
                constants::CODE_TAGS.contains(&frame.tag.as_str())
                    || (!frame.class.is_empty() && any_match(class_patterns, &frame.class))
                    || frame.has_code_data
            })
    }

    /// 检查是否为URL或裸域名
    pub fn is_url(&self, text: &str) -> bool {
        any_match(&regexes().url, text)
    }

    /// 检查是否为代码标识符
    pub fn is_code_identifier(&self, text: &str) -> bool {
        any_match(&regexes().code_identifier, text)
    }

    pub fn is_technical_term(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        TECHNICAL_TERMS.contains(&lower.as_str())
    }

    /// 检查是否为Markdown语法
    pub fn is_markdown_syntax(&self, text: &str) -> bool {
        any_match(&regexes().markdown, text)
    }

    /// 检查是否为数字、版本号或带单位的数字
    pub fn is_number_or_version(&self, text: &str) -> bool {
        any_match(&regexes().number, text)
    }

    /// 检查是否为短缩写
    pub fn is_short_acronym(&self, text: &str) -> bool {
        if text.chars().count() > 3 {
            return false;
        }
        if regexes().acronym.as_ref().is_some_and(|re| re.is_match(text)) {
            return true;
        }
        TECHNICAL_ABBREVIATIONS.contains(&text.to_uppercase().as_str())
    }

    /// 批量过滤文本
    pub fn filter_texts(&self, texts: Vec<String>) -> Vec<String> {
        let context = AncestorContext::empty();
        texts
            .into_iter()
            .filter(|text| !self.should_skip(text, &context))
            .collect()
    }
}

/// 文本是否完全由空白、标点和符号组成
pub fn is_punctuation_only(text: &str) -> bool {
    match regexes().punctuation.as_ref() {
        Some(regex) => regex.is_match(text),
        None => text
            .chars()
            .all(|c| c.is_whitespace() || c.is_ascii_punctuation()),
    }
}
