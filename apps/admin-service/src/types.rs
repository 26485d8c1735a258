//! Domain vocabulary shared by the store, resolver, and HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Board {
    #[serde(rename = "CBSE")]
    Cbse,
    #[serde(rename = "BSEB")]
    Bseb,
}

impl Board {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cbse => "CBSE",
            Self::Bseb => "BSEB",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassLevel {
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "10")]
    Ten,
    #[serde(rename = "11")]
    Eleven,
    #[serde(rename = "12")]
    Twelve,
}

impl ClassLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Six => "6",
            Self::Seven => "7",
            Self::Eight => "8",
            Self::Nine => "9",
            Self::Ten => "10",
            Self::Eleven => "11",
            Self::Twelve => "12",
        }
    }

    /// Streams only apply at the senior-secondary level.
    pub const fn has_streams(self) -> bool {
        matches!(self, Self::Eleven | Self::Twelve)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stream {
    Science,
    Commerce,
    Arts,
}

impl Stream {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Science => "Science",
            Self::Commerce => "Commerce",
            Self::Arts => "Arts",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    English,
    Hindi,
}

impl Language {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Hindi => "Hindi",
        }
    }
}

/// What kind of lesson payload the caller is asking for.
///
/// Document types carry admin-provided links only; the service never fabricates
/// a document URL. Notes and MCQ types are generation-eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    NotesFree,
    NotesPremium,
    McqSimple,
    McqAnalysis,
    WeeklyTest,
    DocumentFree,
    DocumentPremium,
    DocumentLegacy,
}

impl ContentType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotesFree => "notes_free",
            Self::NotesPremium => "notes_premium",
            Self::McqSimple => "mcq_simple",
            Self::McqAnalysis => "mcq_analysis",
            Self::WeeklyTest => "weekly_test",
            Self::DocumentFree => "document_free",
            Self::DocumentPremium => "document_premium",
            Self::DocumentLegacy => "document_legacy",
        }
    }

    pub const fn is_document(self) -> bool {
        matches!(
            self,
            Self::DocumentFree | Self::DocumentPremium | Self::DocumentLegacy
        )
    }

    pub const fn is_mcq(self) -> bool {
        matches!(self, Self::McqSimple | Self::McqAnalysis | Self::WeeklyTest)
    }

    pub const fn is_notes(self) -> bool {
        matches!(self, Self::NotesFree | Self::NotesPremium)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McqItem {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    #[serde(default)]
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mnemonic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub color: String,
}

/// Composite addressing for syllabus and content records.
///
/// The stream segment is only rendered for classes that actually have streams,
/// so a class-10 key never grows a stream suffix even if a caller sends one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentScope {
    pub board: Board,
    pub class_level: ClassLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<Stream>,
    pub subject: String,
}

impl ContentScope {
    fn stream_suffix(&self, separator: char) -> String {
        match self.stream {
            Some(stream) if self.class_level.has_streams() => {
                format!("{separator}{}", stream.as_str())
            }
            _ => String::new(),
        }
    }

    /// Key for an admin content override on one chapter.
    pub fn content_key(&self, chapter_id: &str) -> String {
        format!(
            "{}_{}{}_{}_{}",
            self.board.as_str(),
            self.class_level.as_str(),
            self.stream_suffix('-'),
            self.subject,
            chapter_id
        )
    }

    /// Key for a saved chapter list in one language.
    pub fn chapter_list_key(&self, language: Language) -> String {
        format!(
            "{}-{}{}-{}-{}",
            self.board.as_str(),
            self.class_level.as_str(),
            self.stream_suffix('-'),
            self.subject,
            language.as_str()
        )
    }

    /// Key for the built-in syllabus table (board + class + subject only).
    pub fn static_key(&self) -> String {
        format!(
            "{}-{}-{}",
            self.board.as_str(),
            self.class_level.as_str(),
            self.subject
        )
    }
}

/// Where a resolved lesson came from, exposed to API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonSource {
    AdminOverride,
    Cache,
    Generated,
    Unavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonContent {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub body: String,
    pub content_type: ContentType,
    pub subject: String,
    pub created_at: DateTime<Utc>,
    pub coming_soon: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcqs: Option<Vec<McqItem>>,
    pub source: LessonSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(class_level: ClassLevel, stream: Option<Stream>) -> ContentScope {
        ContentScope {
            board: Board::Cbse,
            class_level,
            stream,
            subject: "Physics".to_string(),
        }
    }

    #[test]
    fn content_key_includes_stream_for_senior_classes() {
        let key = scope(ClassLevel::Twelve, Some(Stream::Science)).content_key("ch-3");
        assert_eq!(key, "CBSE_12-Science_Physics_ch-3");
    }

    #[test]
    fn content_key_drops_stream_for_junior_classes() {
        let key = scope(ClassLevel::Ten, Some(Stream::Science)).content_key("ch-3");
        assert_eq!(key, "CBSE_10_Physics_ch-3");
    }

    #[test]
    fn chapter_list_key_carries_language() {
        let key = scope(ClassLevel::Eleven, Some(Stream::Commerce))
            .chapter_list_key(Language::Hindi);
        assert_eq!(key, "CBSE-11-Commerce-Physics-Hindi");
    }

    #[test]
    fn class_level_serializes_as_bare_number() {
        assert_eq!(
            serde_json::to_string(&ClassLevel::Ten).expect("serialize"),
            "\"10\""
        );
    }

    #[test]
    fn document_types_are_never_mcq_or_notes() {
        for content_type in [
            ContentType::DocumentFree,
            ContentType::DocumentPremium,
            ContentType::DocumentLegacy,
        ] {
            assert!(content_type.is_document());
            assert!(!content_type.is_mcq());
            assert!(!content_type.is_notes());
        }
    }
}
