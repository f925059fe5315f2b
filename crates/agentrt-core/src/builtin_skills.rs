// Built-in skills. Heuristic stubs; contracts match the documented
// input/output shapes rather than invoking a real model.

use crate::skills::{Skill, SkillExecutionResult};
use agentrt_contracts::skills::SkillContext;
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());
static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://[^\s]+").unwrap());

const STOPWORDS: &[&str] = &[
    "about", "after", "again", "their", "there", "these", "those", "where", "which", "while",
    "would", "could", "should", "thing", "things", "other", "because", "before", "between",
];

/// Frequency-over-non-stopword-words(len>=5) extraction, top `limit`.
pub fn top_topics(text: &str, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        let lower = word.to_lowercase();
        if lower.len() < 5 || STOPWORDS.contains(&lower.as_str()) {
            continue;
        }
        *counts.entry(lower).or_insert(0) += 1;
    }
    let mut pairs: Vec<(String, usize)> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    pairs.into_iter().take(limit).map(|(w, _)| w).collect()
}

pub fn extract_entities(text: &str) -> Vec<String> {
    let mut entities: Vec<String> = EMAIL_RE.find_iter(text).map(|m| m.as_str().to_string()).collect();
    entities.extend(URL_RE.find_iter(text).map(|m| m.as_str().to_string()));
    entities
}

pub struct SummarizeSkill;

#[async_trait]
impl Skill for SummarizeSkill {
    fn id(&self) -> &str {
        "summarize"
    }
    fn name(&self) -> &str {
        "Summarize"
    }
    fn description(&self) -> &str {
        "Produce a short summary of the input text."
    }
    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {"text": {"type": "string"}}, "required": ["text"]})
    }
    fn output_schema(&self) -> Value {
        json!({"type": "object", "properties": {"summary": {"type": "string"}}})
    }
    async fn execute(&self, input: Value, _context: &SkillContext) -> SkillExecutionResult {
        let text = input.get("text").and_then(Value::as_str).unwrap_or("");
        let summary: String = text.split_whitespace().take(40).collect::<Vec<_>>().join(" ");
        SkillExecutionResult::success(json!({"summary": summary}))
    }
}

pub struct TranslateSkill;

#[async_trait]
impl Skill for TranslateSkill {
    fn id(&self) -> &str {
        "translate"
    }
    fn name(&self) -> &str {
        "Translate"
    }
    fn description(&self) -> &str {
        "Translate text into a target language."
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"text": {"type": "string"}, "target_language": {"type": "string"}},
            "required": ["text", "target_language"]
        })
    }
    fn output_schema(&self) -> Value {
        json!({"type": "object", "properties": {"translated": {"type": "string"}}})
    }
    async fn execute(&self, input: Value, _context: &SkillContext) -> SkillExecutionResult {
        let text = input.get("text").and_then(Value::as_str).unwrap_or("");
        let target = input
            .get("target_language")
            .and_then(Value::as_str)
            .unwrap_or("en");
        SkillExecutionResult::success(json!({
            "translated": text,
            "target_language": target,
            "note": "heuristic stub: no translation model wired up",
        }))
    }
}

pub struct SentimentAnalysisSkill;

#[async_trait]
impl Skill for SentimentAnalysisSkill {
    fn id(&self) -> &str {
        "sentiment_analysis"
    }
    fn name(&self) -> &str {
        "Sentiment Analysis"
    }
    fn description(&self) -> &str {
        "Classify the sentiment of the input text."
    }
    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {"text": {"type": "string"}}, "required": ["text"]})
    }
    fn output_schema(&self) -> Value {
        json!({"type": "object", "properties": {"label": {"type": "string"}, "score": {"type": "number"}}})
    }
    async fn execute(&self, input: Value, _context: &SkillContext) -> SkillExecutionResult {
        let text = input
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_lowercase();
        const POSITIVE: &[&str] = &["good", "great", "love", "excellent", "happy", "thanks"];
        const NEGATIVE: &[&str] = &["bad", "terrible", "hate", "awful", "angry", "broken"];
        let positive = POSITIVE.iter().filter(|w| text.contains(*w)).count();
        let negative = NEGATIVE.iter().filter(|w| text.contains(*w)).count();
        let (label, score) = match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => ("positive", 0.5 + 0.1 * positive as f64),
            std::cmp::Ordering::Less => ("negative", 0.5 + 0.1 * negative as f64),
            std::cmp::Ordering::Equal => ("neutral", 0.5),
        };
        SkillExecutionResult::success(json!({"label": label, "score": score.min(1.0)}))
    }
}

pub struct ExtractEntitiesSkill;

#[async_trait]
impl Skill for ExtractEntitiesSkill {
    fn id(&self) -> &str {
        "extract_entities"
    }
    fn name(&self) -> &str {
        "Extract Entities"
    }
    fn description(&self) -> &str {
        "Extract emails and URLs from text (regex-based minimum)."
    }
    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {"text": {"type": "string"}}, "required": ["text"]})
    }
    fn output_schema(&self) -> Value {
        json!({"type": "object", "properties": {"entities": {"type": "array"}}})
    }
    async fn execute(&self, input: Value, _context: &SkillContext) -> SkillExecutionResult {
        let text = input.get("text").and_then(Value::as_str).unwrap_or("");
        SkillExecutionResult::success(json!({"entities": extract_entities(text)}))
    }
}

pub struct KeywordExtractionSkill;

#[async_trait]
impl Skill for KeywordExtractionSkill {
    fn id(&self) -> &str {
        "keyword_extraction"
    }
    fn name(&self) -> &str {
        "Keyword Extraction"
    }
    fn description(&self) -> &str {
        "Extract the top keywords from text by frequency."
    }
    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {"text": {"type": "string"}}, "required": ["text"]})
    }
    fn output_schema(&self) -> Value {
        json!({"type": "object", "properties": {"keywords": {"type": "array"}}})
    }
    async fn execute(&self, input: Value, _context: &SkillContext) -> SkillExecutionResult {
        let text = input.get("text").and_then(Value::as_str).unwrap_or("");
        SkillExecutionResult::success(json!({"keywords": top_topics(text, 5)}))
    }
}

pub struct TextClassificationSkill;

#[async_trait]
impl Skill for TextClassificationSkill {
    fn id(&self) -> &str {
        "text_classification"
    }
    fn name(&self) -> &str {
        "Text Classification"
    }
    fn description(&self) -> &str {
        "Classify text into one of a set of candidate labels."
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"text": {"type": "string"}, "labels": {"type": "array"}},
            "required": ["text", "labels"]
        })
    }
    fn output_schema(&self) -> Value {
        json!({"type": "object", "properties": {"label": {"type": "string"}}})
    }
    async fn execute(&self, input: Value, _context: &SkillContext) -> SkillExecutionResult {
        let text = input
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_lowercase();
        let labels: Vec<String> = input
            .get("labels")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        if labels.is_empty() {
            return SkillExecutionResult::failure("no candidate labels provided");
        }
        let chosen = labels
            .iter()
            .max_by_key(|label| {
                let lower = label.to_lowercase();
                text.matches(lower.as_str()).count()
            })
            .cloned()
            .unwrap_or_else(|| labels[0].clone());
        SkillExecutionResult::success(json!({"label": chosen}))
    }
}

pub struct QuestionAnsweringSkill;

#[async_trait]
impl Skill for QuestionAnsweringSkill {
    fn id(&self) -> &str {
        "question_answering"
    }
    fn name(&self) -> &str {
        "Question Answering"
    }
    fn description(&self) -> &str {
        "Answer a question given a context passage."
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"question": {"type": "string"}, "context": {"type": "string"}},
            "required": ["question", "context"]
        })
    }
    fn output_schema(&self) -> Value {
        json!({"type": "object", "properties": {"answer": {"type": "string"}}})
    }
    async fn execute(&self, input: Value, _context: &SkillContext) -> SkillExecutionResult {
        let context_text = input.get("context").and_then(Value::as_str).unwrap_or("");
        let question = input.get("question").and_then(Value::as_str).unwrap_or("");
        if context_text.is_empty() {
            return SkillExecutionResult::failure("context is empty");
        }
        let best_sentence = context_text
            .split(['.', '\n'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .max_by_key(|sentence| {
                let sentence_lower = sentence.to_lowercase();
                question
                    .split_whitespace()
                    .filter(|w| sentence_lower.contains(&w.to_lowercase()))
                    .count()
            })
            .unwrap_or(context_text);
        SkillExecutionResult::success(json!({"answer": best_sentence}))
    }
}

pub struct ContentModerationSkill;

#[async_trait]
impl Skill for ContentModerationSkill {
    fn id(&self) -> &str {
        "content_moderation"
    }
    fn name(&self) -> &str {
        "Content Moderation"
    }
    fn description(&self) -> &str {
        "Flag text that matches a small denylist of unsafe terms."
    }
    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {"text": {"type": "string"}}, "required": ["text"]})
    }
    fn output_schema(&self) -> Value {
        json!({"type": "object", "properties": {"flagged": {"type": "boolean"}, "categories": {"type": "array"}}})
    }
    async fn execute(&self, input: Value, _context: &SkillContext) -> SkillExecutionResult {
        const DENYLIST: &[(&str, &str)] = &[
            ("kill", "violence"),
            ("bomb", "violence"),
            ("hate", "harassment"),
        ];
        let text = input
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_lowercase();
        let categories: Vec<&str> = DENYLIST
            .iter()
            .filter(|(term, _)| text.contains(term))
            .map(|(_, category)| *category)
            .collect();
        SkillExecutionResult::success(json!({
            "flagged": !categories.is_empty(),
            "categories": categories,
        }))
    }
}

pub fn register_builtins(registry: &mut crate::skills::SkillRegistry) {
    registry.register(SummarizeSkill);
    registry.register(TranslateSkill);
    registry.register(SentimentAnalysisSkill);
    registry.register(ExtractEntitiesSkill);
    registry.register(KeywordExtractionSkill);
    registry.register(TextClassificationSkill);
    registry.register(QuestionAnsweringSkill);
    registry.register(ContentModerationSkill);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_extraction_finds_emails_and_urls() {
        let entities = extract_entities("contact me at a@b.com or visit https://example.com/x");
        assert!(entities.iter().any(|e| e == "a@b.com"));
        assert!(entities.iter().any(|e| e.starts_with("https://example.com")));
    }

    #[test]
    fn top_topics_filters_short_and_stopwords() {
        let topics = top_topics("because there would other system system system design design", 5);
        assert!(topics.contains(&"system".to_string()));
        assert!(!topics.contains(&"because".to_string()));
    }

    #[tokio::test]
    async fn builtins_register_all_eight_skills() {
        let mut registry = crate::skills::SkillRegistry::new();
        register_builtins(&mut registry);
        assert_eq!(registry.len(), 8);
    }
}
