//! Lesson and syllabus resolution.
//!
//! Resolution order for lesson content: admin-authored override, then the
//! in-memory lesson cache, then AI generation. Document types are the
//! exception: they are never generated, so a missing override yields a
//! coming-soon sentinel instead of a generation call.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use gemini_client::{GeminiClient, GeminiError, GenerateRequest, strip_code_fences};

use crate::catalog;
use crate::config::Config;
use crate::rotation::{KeyPool, RotationError, generate_with_failover};
use crate::store::AdminStore;
use crate::types::{
    Chapter, ContentScope, ContentType, Language, LessonContent, LessonSource, McqItem,
};

const DEFAULT_TARGET_QUESTIONS: usize = 15;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    Api(#[from] GeminiError),
    #[error("failed to parse generated payload: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error(transparent)]
    Generation(#[from] RotationError<GenerationError>),
}

#[derive(Debug, Clone)]
pub struct ResolveParams {
    pub scope: ContentScope,
    pub chapter: Chapter,
    pub language: Language,
    pub content_type: ContentType,
    pub target_questions: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestPaperTopic {
    pub subject: String,
    pub chapters: Vec<String>,
}

/// Wire shape the model is asked to produce for MCQ payloads.
#[derive(Debug, Deserialize)]
struct WireMcq {
    question: String,
    options: Vec<String>,
    #[serde(rename = "correctAnswer")]
    correct_answer: usize,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    mnemonic: Option<String>,
    #[serde(default)]
    concept: Option<String>,
}

impl WireMcq {
    fn into_item(self, default_explanation: &str) -> McqItem {
        McqItem {
            question: self.question,
            options: self.options,
            correct_answer: self.correct_answer,
            explanation: self
                .explanation
                .unwrap_or_else(|| default_explanation.to_string()),
            mnemonic: self.mnemonic,
            concept: self.concept,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireChapter {
    title: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Clone)]
pub struct ContentResolver {
    store: AdminStore,
    http: reqwest::Client,
    base_url: String,
    default_model: String,
    backup_key: Option<String>,
    env_key: Option<String>,
    chapter_cache: Arc<RwLock<HashMap<String, Vec<Chapter>>>>,
    lesson_cache: Arc<RwLock<HashMap<String, LessonContent>>>,
}

impl ContentResolver {
    pub fn new(config: &Config, store: AdminStore, http: reqwest::Client) -> Self {
        Self {
            store,
            http,
            base_url: config.generation_base_url.clone(),
            default_model: config.default_model.clone(),
            backup_key: config.backup_api_key.clone(),
            env_key: config.env_api_key.clone(),
            chapter_cache: Arc::new(RwLock::new(HashMap::new())),
            lesson_cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn resolve_content(
        &self,
        params: ResolveParams,
    ) -> Result<LessonContent, ContentError> {
        let settings = self.store.get_settings().await;
        let model = settings
            .ai_model
            .clone()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| self.default_model.clone());
        let instruction = if settings.ai_instruction.trim().is_empty() {
            String::new()
        } else {
            format!("IMPORTANT INSTRUCTION: {}\n", settings.ai_instruction.trim())
        };

        let content_key = params.scope.content_key(&params.chapter.id);

        if let Some(lesson) = self.admin_authored_lesson(&params, &content_key).await {
            return Ok(lesson);
        }

        if params.content_type.is_document() {
            // Nothing admin-authored and documents are never synthesized.
            return Ok(LessonContent {
                id: new_lesson_id(),
                title: params.chapter.title.clone(),
                subtitle: "Content Unavailable".to_string(),
                body: String::new(),
                content_type: params.content_type,
                subject: params.scope.subject.clone(),
                created_at: Utc::now(),
                coming_soon: true,
                mcqs: None,
                source: LessonSource::Unavailable,
            });
        }

        let cache_key = format!(
            "{}_{}_{}",
            content_key,
            params.content_type.as_str(),
            params.language.as_str()
        );
        if let Some(cached) = self.lesson_cache.read().await.get(&cache_key) {
            let mut lesson = cached.clone();
            lesson.source = LessonSource::Cache;
            return Ok(lesson);
        }

        let pool = KeyPool::collect(
            &settings.api_keys,
            self.backup_key.as_deref(),
            self.env_key.as_deref(),
        );

        let lesson = if params.content_type.is_mcq() {
            self.generate_mcq_lesson(&params, &pool, &model, &instruction)
                .await?
        } else {
            self.generate_notes_lesson(&params, &pool, &model, &instruction)
                .await?
        };

        self.lesson_cache
            .write()
            .await
            .insert(cache_key, lesson.clone());
        Ok(lesson)
    }

    /// Admin override lookup. A hit always wins; the lesson title is taken
    /// from the requested chapter, not the stored record.
    async fn admin_authored_lesson(
        &self,
        params: &ResolveParams,
        content_key: &str,
    ) -> Option<LessonContent> {
        let record = self.store.get_override(content_key).await?;

        let lesson = |subtitle: &str, body: String, mcqs: Option<Vec<McqItem>>| LessonContent {
            id: new_lesson_id(),
            title: params.chapter.title.clone(),
            subtitle: subtitle.to_string(),
            body,
            content_type: params.content_type,
            subject: params.scope.subject.clone(),
            created_at: Utc::now(),
            coming_soon: false,
            mcqs,
            source: LessonSource::AdminOverride,
        };

        match params.content_type {
            ContentType::DocumentFree => record
                .free_link
                .map(|link| lesson("Provided by Admin", link, None)),
            ContentType::DocumentPremium => record
                .premium_link
                .map(|link| lesson("High Quality Content", link, None)),
            ContentType::DocumentLegacy => record
                .legacy_link
                .map(|link| lesson("Provided by Teacher", link, None)),
            ContentType::McqSimple | ContentType::McqAnalysis => {
                record.manual_mcqs.map(|mcqs| {
                    let subtitle = format!("{} Questions", mcqs.len());
                    lesson(&subtitle, String::new(), Some(mcqs))
                })
            }
            ContentType::WeeklyTest => record.weekly_test_mcqs.map(|mcqs| {
                let subtitle = format!("{} Questions", mcqs.len());
                lesson(&subtitle, String::new(), Some(mcqs))
            }),
            ContentType::NotesFree | ContentType::NotesPremium => None,
        }
    }

    async fn generate_mcq_lesson(
        &self,
        params: &ResolveParams,
        pool: &KeyPool,
        model: &str,
        instruction: &str,
    ) -> Result<LessonContent, ContentError> {
        let target = params
            .target_questions
            .unwrap_or(DEFAULT_TARGET_QUESTIONS)
            .clamp(1, 50);
        let prompt = format!(
            "{instruction}Create {target} MCQs for {} Class {} {}, Chapter: \"{}\".\n\
             Language: {}.\n\
             Return valid JSON array:\n\
             [{{\"question\": \"Question text\", \"options\": [\"A\", \"B\", \"C\", \"D\"], \
             \"correctAnswer\": 0, \"explanation\": \"Explanation here\", \
             \"mnemonic\": \"Short memory trick\", \"concept\": \"Core concept\"}}]",
            params.scope.board.as_str(),
            params.scope.class_level.as_str(),
            params.scope.subject,
            params.chapter.title,
            params.language.as_str(),
        );

        let mcqs = self
            .generate_json::<Vec<WireMcq>>(pool, model, &prompt)
            .await?
            .into_iter()
            .map(|wire| wire.into_item("Refer to Key"))
            .collect::<Vec<_>>();

        Ok(LessonContent {
            id: new_lesson_id(),
            title: format!("MCQ Test: {}", params.chapter.title),
            subtitle: format!("{} Questions", mcqs.len()),
            body: String::new(),
            content_type: params.content_type,
            subject: params.scope.subject.clone(),
            created_at: Utc::now(),
            coming_soon: false,
            mcqs: Some(mcqs),
            source: LessonSource::Generated,
        })
    }

    async fn generate_notes_lesson(
        &self,
        params: &ResolveParams,
        pool: &KeyPool,
        model: &str,
        instruction: &str,
    ) -> Result<LessonContent, ContentError> {
        let detailed = params.content_type == ContentType::NotesPremium;
        let depth = if detailed {
            "Include deep insights, memory tips, and exam strategies."
        } else {
            "Keep it concise and clear."
        };
        let prompt = format!(
            "{instruction}Write detailed study notes for {} Class {} {}, Chapter: \"{}\".\n\
             Language: {}.\n\
             Format: Markdown.\n\
             Structure:\n\
             1. Introduction\n\
             2. Key Concepts (Bullet points)\n\
             3. Detailed Explanations\n\
             4. Important Formulas/Dates\n\
             5. Summary\n\
             {depth}",
            params.scope.board.as_str(),
            params.scope.class_level.as_str(),
            params.scope.subject,
            params.chapter.title,
            params.language.as_str(),
        );

        let request = GenerateRequest::text(prompt);
        let body = generate_with_failover(pool, |key| {
            let client = GeminiClient::new(self.http.clone(), self.base_url.clone(), key);
            let request = request.clone();
            let model = model.to_string();
            async move {
                client
                    .generate(&model, &request)
                    .await
                    .map_err(GenerationError::Api)
            }
        })
        .await?;

        Ok(LessonContent {
            id: new_lesson_id(),
            title: params.chapter.title.clone(),
            subtitle: if detailed {
                "Premium Study Notes".to_string()
            } else {
                "Quick Revision Notes".to_string()
            },
            body,
            content_type: params.content_type,
            subject: params.scope.subject.clone(),
            created_at: Utc::now(),
            coming_soon: false,
            mcqs: None,
            source: LessonSource::Generated,
        })
    }

    /// Chapter listing with a four-stage fallback: admin-saved list, chapter
    /// cache, built-in syllabus, then AI generation. When even generation
    /// fails the placeholder list is cached so we stop hammering the API.
    pub async fn fetch_chapters(
        &self,
        scope: &ContentScope,
        language: Language,
    ) -> Vec<Chapter> {
        let list_key = scope.chapter_list_key(language);

        if let Some(custom) = self.store.get_chapter_list(&list_key).await {
            return custom;
        }

        if let Some(cached) = self.chapter_cache.read().await.get(&list_key) {
            return cached.clone();
        }

        if let Some(titles) = catalog::static_syllabus(scope) {
            let chapters = catalog::static_chapters(titles);
            self.chapter_cache
                .write()
                .await
                .insert(list_key, chapters.clone());
            return chapters;
        }

        let settings = self.store.get_settings().await;
        let model = settings
            .ai_model
            .clone()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| self.default_model.clone());
        let pool = KeyPool::collect(
            &settings.api_keys,
            self.backup_key.as_deref(),
            self.env_key.as_deref(),
        );

        let stream_label = scope
            .stream
            .filter(|_| scope.class_level.has_streams())
            .map(|stream| format!("{} ", stream.as_str()))
            .unwrap_or_default();
        let prompt = format!(
            "List 15 standard chapters for Class {} {}Subject: {} ({}). \
             Return JSON array: [{{\"title\": \"...\", \"description\": \"...\"}}].",
            scope.class_level.as_str(),
            stream_label,
            scope.subject,
            scope.board.as_str(),
        );

        let chapters = match self.generate_json::<Vec<WireChapter>>(&pool, &model, &prompt).await {
            Ok(rows) => rows
                .into_iter()
                .enumerate()
                .map(|(idx, row)| Chapter {
                    id: format!("ch-{}", idx + 1),
                    title: row.title,
                    description: row.description,
                })
                .collect(),
            Err(error) => {
                tracing::warn!(
                    target: "studydesk.content",
                    error = %error,
                    "chapter generation failed, serving placeholder list",
                );
                catalog::placeholder_chapters()
            }
        };

        self.chapter_cache
            .write()
            .await
            .insert(list_key, chapters.clone());
        chapters
    }

    /// Combined-scope exam paper. Failures degrade to an empty paper rather
    /// than an error.
    pub async fn generate_test_paper(
        &self,
        topics: &[TestPaperTopic],
        count: usize,
        language: Language,
    ) -> Vec<McqItem> {
        let settings = self.store.get_settings().await;
        let model = settings
            .ai_model
            .clone()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| self.default_model.clone());
        let pool = KeyPool::collect(
            &settings.api_keys,
            self.backup_key.as_deref(),
            self.env_key.as_deref(),
        );

        let scope_text = topics
            .iter()
            .map(|topic| format!("{}: [{}]", topic.subject, topic.chapters.join(", ")))
            .collect::<Vec<_>>()
            .join("; ");
        let prompt = format!(
            "Create Exam Paper with {count} MCQs. Scope: {scope_text}. Lang: {}. \
             Return JSON Array [{{question, options[], correctAnswer(int)}}]. No explanations.",
            language.as_str(),
        );

        match self.generate_json::<Vec<WireMcq>>(&pool, &model, &prompt).await {
            Ok(rows) => rows
                .into_iter()
                .map(|wire| wire.into_item("Refer to Key"))
                .collect(),
            Err(error) => {
                tracing::warn!(
                    target: "studydesk.content",
                    error = %error,
                    "test paper generation failed, returning empty paper",
                );
                Vec::new()
            }
        }
    }

    async fn generate_json<T>(
        &self,
        pool: &KeyPool,
        model: &str,
        prompt: &str,
    ) -> Result<T, RotationError<GenerationError>>
    where
        T: serde::de::DeserializeOwned,
    {
        let request = GenerateRequest::json(prompt);
        generate_with_failover(pool, |key| {
            let client = GeminiClient::new(self.http.clone(), self.base_url.clone(), key);
            let request = request.clone();
            let model = model.to_string();
            async move {
                let raw = client.generate(&model, &request).await?;
                let parsed = serde_json::from_str::<T>(&strip_code_fences(&raw))?;
                Ok::<T, GenerationError>(parsed)
            }
        })
        .await
    }
}

fn new_lesson_id() -> String {
    format!("les_{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ContentOverrideRecord;
    use crate::types::{Board, ClassLevel};

    fn resolver() -> (ContentResolver, AdminStore) {
        let config = Config::for_tests();
        let store = AdminStore::from_config(&config);
        let resolver = ContentResolver::new(&config, store.clone(), reqwest::Client::new());
        (resolver, store)
    }

    fn scope() -> ContentScope {
        ContentScope {
            board: Board::Cbse,
            class_level: ClassLevel::Ten,
            stream: None,
            subject: "Science".to_string(),
        }
    }

    fn chapter() -> Chapter {
        Chapter {
            id: "ch-1".to_string(),
            title: "Life Processes".to_string(),
            description: None,
        }
    }

    fn params(content_type: ContentType) -> ResolveParams {
        ResolveParams {
            scope: scope(),
            chapter: chapter(),
            language: Language::English,
            content_type,
            target_questions: None,
        }
    }

    #[tokio::test]
    async fn missing_document_yields_coming_soon() {
        let (resolver, _store) = resolver();
        let lesson = resolver
            .resolve_content(params(ContentType::DocumentFree))
            .await
            .expect("documents never error");
        assert!(lesson.coming_soon);
        assert_eq!(lesson.source, LessonSource::Unavailable);
        assert_eq!(lesson.title, "Life Processes");
    }

    #[tokio::test]
    async fn admin_document_link_wins() {
        let (resolver, store) = resolver();
        let key = scope().content_key("ch-1");
        store
            .put_override(
                &key,
                ContentOverrideRecord {
                    free_link: Some("https://cdn.example/notes.pdf".to_string()),
                    ..ContentOverrideRecord::default()
                },
            )
            .await
            .expect("save override");

        let lesson = resolver
            .resolve_content(params(ContentType::DocumentFree))
            .await
            .expect("resolve");
        assert!(!lesson.coming_soon);
        assert_eq!(lesson.source, LessonSource::AdminOverride);
        assert_eq!(lesson.body, "https://cdn.example/notes.pdf");
        assert_eq!(lesson.title, "Life Processes");
    }

    #[tokio::test]
    async fn manual_mcqs_bypass_generation() {
        let (resolver, store) = resolver();
        let key = scope().content_key("ch-1");
        store
            .put_override(
                &key,
                ContentOverrideRecord {
                    manual_mcqs: Some(vec![McqItem {
                        question: "2 + 2?".to_string(),
                        options: vec!["3".to_string(), "4".to_string()],
                        correct_answer: 1,
                        explanation: "Basic arithmetic".to_string(),
                        mnemonic: None,
                        concept: None,
                    }]),
                    ..ContentOverrideRecord::default()
                },
            )
            .await
            .expect("save override");

        // No API keys are configured, so any generation attempt would fail.
        let lesson = resolver
            .resolve_content(params(ContentType::McqSimple))
            .await
            .expect("resolve");
        assert_eq!(lesson.source, LessonSource::AdminOverride);
        assert_eq!(lesson.mcqs.expect("manual mcqs").len(), 1);
        assert_eq!(lesson.subtitle, "1 Questions");
    }

    #[tokio::test]
    async fn notes_without_keys_fail_with_empty_pool() {
        let (resolver, _store) = resolver();
        let result = resolver.resolve_content(params(ContentType::NotesFree)).await;
        assert!(matches!(
            result,
            Err(ContentError::Generation(RotationError::NoKeysAvailable))
        ));
    }

    #[tokio::test]
    async fn static_syllabus_serves_chapters_without_keys() {
        let (resolver, _store) = resolver();
        let chapters = resolver.fetch_chapters(&scope(), Language::English).await;
        assert!(chapters.len() > 10);
        assert_eq!(chapters[0].id, "static-1");
    }

    #[tokio::test]
    async fn custom_list_wins_over_static_syllabus() {
        let (resolver, store) = resolver();
        let key = scope().chapter_list_key(Language::English);
        store
            .save_chapter_list(
                &key,
                vec![Chapter {
                    id: "custom-1".to_string(),
                    title: "Admin Curated".to_string(),
                    description: None,
                }],
            )
            .await
            .expect("save list");

        let chapters = resolver.fetch_chapters(&scope(), Language::English).await;
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, "Admin Curated");
    }

    #[tokio::test]
    async fn unknown_combination_degrades_to_placeholder() {
        let (resolver, _store) = resolver();
        let unknown = ContentScope {
            board: Board::Bseb,
            class_level: ClassLevel::Seven,
            stream: None,
            subject: "Sanskrit".to_string(),
        };
        let chapters = resolver.fetch_chapters(&unknown, Language::Hindi).await;
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title, "Chapter 1");
    }

    #[tokio::test]
    async fn test_paper_degrades_to_empty_without_keys() {
        let (resolver, _store) = resolver();
        let topics = vec![TestPaperTopic {
            subject: "Science".to_string(),
            chapters: vec!["Life Processes".to_string()],
        }];
        let paper = resolver
            .generate_test_paper(&topics, 10, Language::English)
            .await;
        assert!(paper.is_empty());
    }
}
