use openai_api_rs::v1::chat_completion::{ChatCompletionMessage, Content, MessageRole};
use threadtldr::core::models::RenderedThreadText;
use threadtldr::prompt::{
    DEFAULT_TEMPLATE, MAX_TEMPLATE_LEN, PromptStrategy, PromptTemplate, THREAD_PLACEHOLDER,
    sanitize_template,
};

fn text_of(message: &ChatCompletionMessage) -> &str {
    match &message.content {
        Content::Text(text) => text,
        _ => panic!("expected text content"),
    }
}

fn thread() -> RenderedThreadText {
    RenderedThreadText::new("[parent message] U1hello\nU2(:eyes: 1)hi".to_string())
}

#[test]
fn test_append_strategy_uses_system_and_user() {
    let template = PromptTemplate::builtin(PromptStrategy::Append);
    let messages = template.build_messages(&thread());

    assert_eq!(messages.len(), 2);
    assert!(matches!(messages[0].role, MessageRole::system));
    assert_eq!(text_of(&messages[0]), DEFAULT_TEMPLATE);
    assert!(matches!(messages[1].role, MessageRole::user));
    assert_eq!(text_of(&messages[1]), thread().as_str());
}

#[test]
fn test_substitute_strategy_replaces_every_placeholder() {
    let template = PromptTemplate::new(
        format!("Summarize:\n{THREAD_PLACEHOLDER}\n---\n{THREAD_PLACEHOLDER}"),
        PromptStrategy::Substitute,
    );
    let messages = template.build_messages(&thread());

    assert_eq!(messages.len(), 1);
    assert!(matches!(messages[0].role, MessageRole::user));
    let text = text_of(&messages[0]);
    assert!(!text.contains(THREAD_PLACEHOLDER));
    assert_eq!(text.matches("U1hello").count(), 2);
}

#[test]
fn test_substitute_without_placeholder_appends() {
    let template = PromptTemplate::new("Summarize this.", PromptStrategy::Substitute);
    assert!(!template.has_placeholder());
    let messages = template.build_messages(&thread());
    assert_eq!(
        text_of(&messages[0]),
        format!("Summarize this.\n\n{}", thread().as_str())
    );
}

#[test]
fn test_strategy_parsing() {
    assert_eq!("APPEND".parse::<PromptStrategy>().unwrap(), PromptStrategy::Append);
    assert_eq!(" substitute ".parse::<PromptStrategy>().unwrap(), PromptStrategy::Substitute);
    let err = "merge".parse::<PromptStrategy>().unwrap_err();
    assert!(err.to_string().contains("PROMPT_STRATEGY"));
    assert_eq!(PromptStrategy::Substitute.to_string(), "substitute");
}

#[test]
fn test_load_without_path_is_builtin() {
    let template = PromptTemplate::load(None, PromptStrategy::Append).unwrap();
    assert_eq!(template.text(), DEFAULT_TEMPLATE);
    assert_eq!(template.strategy(), PromptStrategy::Append);
}

#[test]
fn test_load_from_file_is_sanitized() {
    let path = std::env::temp_dir().join(format!("threadtldr-prompt-{}.txt", std::process::id()));
    std::fs::write(&path, "  Summarize \u{0007}{{thread}}\n").unwrap();

    let template = PromptTemplate::load(Some(&path), PromptStrategy::Substitute).unwrap();
    assert_eq!(template.text(), "Summarize {{thread}}");
    assert!(template.has_placeholder());

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_load_rejects_missing_and_empty_files() {
    let missing = std::path::Path::new("/nonexistent/threadtldr/prompt.txt");
    let err = PromptTemplate::load(Some(missing), PromptStrategy::Append).unwrap_err();
    assert!(err.to_string().contains("PROMPT_TEMPLATE_PATH"));

    let path = std::env::temp_dir().join(format!("threadtldr-empty-{}.txt", std::process::id()));
    std::fs::write(&path, " \n\t\n").unwrap();
    assert!(PromptTemplate::load(Some(&path), PromptStrategy::Append).is_err());
    std::fs::remove_file(&path).ok();
}

#[test]
fn test_load_rejects_oversized_file() {
    let path = std::env::temp_dir().join(format!("threadtldr-big-{}.txt", std::process::id()));
    std::fs::write(&path, "a".repeat(MAX_TEMPLATE_LEN + 1)).unwrap();
    let err = PromptTemplate::load(Some(&path), PromptStrategy::Append).unwrap_err();
    assert!(err.to_string().contains("exceeds"));
    std::fs::remove_file(&path).ok();
}

#[test]
fn test_sanitize_keeps_newlines_and_tabs() {
    assert_eq!(sanitize_template("a\tb\nc\u{0000}d\u{007F}"), "a\tb\ncd");
}

#[test]
fn test_builtin_template_keeps_reaction_guidance_and_dictionary() {
    assert!(DEFAULT_TEMPLATE.contains("\"sob\" or \"cry\""));
    assert!(DEFAULT_TEMPLATE.contains("hall of fame"));
    assert!(DEFAULT_TEMPLATE.contains("HC - Hack Club"));
    assert!(DEFAULT_TEMPLATE.contains("YSWS - You Ship We Ship"));
}
