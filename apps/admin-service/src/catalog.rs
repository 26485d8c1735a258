//! Built-in syllabus table and subject pool.
//!
//! The static syllabus is keyed by board + class + subject and covers the
//! high-traffic combinations so those never need a generation call. Everything
//! else falls through to the resolver's AI path.

use std::collections::HashMap;

use crate::types::{Board, Chapter, ClassLevel, ContentScope, Stream, Subject};

struct SyllabusEntry {
    board: Board,
    class_level: ClassLevel,
    subject: &'static str,
    chapters: &'static [&'static str],
}

const CBSE_10_SCIENCE: &[&str] = &[
    "Chemical Reactions and Equations",
    "Acids, Bases and Salts",
    "Metals and Non-metals",
    "Carbon and its Compounds",
    "Life Processes",
    "Control and Coordination",
    "How do Organisms Reproduce?",
    "Heredity",
    "Light: Reflection and Refraction",
    "The Human Eye and the Colourful World",
    "Electricity",
    "Magnetic Effects of Electric Current",
    "Our Environment",
];

const CBSE_10_MATHS: &[&str] = &[
    "Real Numbers",
    "Polynomials",
    "Pair of Linear Equations in Two Variables",
    "Quadratic Equations",
    "Arithmetic Progressions",
    "Triangles",
    "Coordinate Geometry",
    "Introduction to Trigonometry",
    "Some Applications of Trigonometry",
    "Circles",
    "Areas Related to Circles",
    "Surface Areas and Volumes",
    "Statistics",
    "Probability",
];

const CBSE_9_SCIENCE: &[&str] = &[
    "Matter in Our Surroundings",
    "Is Matter Around Us Pure?",
    "Atoms and Molecules",
    "Structure of the Atom",
    "The Fundamental Unit of Life",
    "Tissues",
    "Motion",
    "Force and Laws of Motion",
    "Gravitation",
    "Work and Energy",
    "Sound",
    "Improvement in Food Resources",
];

const CBSE_12_PHYSICS: &[&str] = &[
    "Electric Charges and Fields",
    "Electrostatic Potential and Capacitance",
    "Current Electricity",
    "Moving Charges and Magnetism",
    "Magnetism and Matter",
    "Electromagnetic Induction",
    "Alternating Current",
    "Electromagnetic Waves",
    "Ray Optics and Optical Instruments",
    "Wave Optics",
    "Dual Nature of Radiation and Matter",
    "Atoms",
    "Nuclei",
    "Semiconductor Electronics",
];

const SYLLABUS: &[SyllabusEntry] = &[
    SyllabusEntry {
        board: Board::Cbse,
        class_level: ClassLevel::Ten,
        subject: "Science",
        chapters: CBSE_10_SCIENCE,
    },
    SyllabusEntry {
        board: Board::Cbse,
        class_level: ClassLevel::Ten,
        subject: "Mathematics",
        chapters: CBSE_10_MATHS,
    },
    SyllabusEntry {
        board: Board::Cbse,
        class_level: ClassLevel::Nine,
        subject: "Science",
        chapters: CBSE_9_SCIENCE,
    },
    SyllabusEntry {
        board: Board::Cbse,
        class_level: ClassLevel::Twelve,
        subject: "Physics",
        chapters: CBSE_12_PHYSICS,
    },
    SyllabusEntry {
        board: Board::Bseb,
        class_level: ClassLevel::Ten,
        subject: "Science",
        chapters: CBSE_10_SCIENCE,
    },
    SyllabusEntry {
        board: Board::Bseb,
        class_level: ClassLevel::Ten,
        subject: "Mathematics",
        chapters: CBSE_10_MATHS,
    },
];

/// Chapter titles for a board/class/subject combination, if the built-in table
/// covers it. The stream never participates in this lookup.
pub fn static_syllabus(scope: &ContentScope) -> Option<&'static [&'static str]> {
    SYLLABUS
        .iter()
        .find(|entry| {
            entry.board == scope.board
                && entry.class_level == scope.class_level
                && entry.subject == scope.subject
        })
        .map(|entry| entry.chapters)
}

/// Materializes a static syllabus hit as chapter records.
pub fn static_chapters(titles: &[&str]) -> Vec<Chapter> {
    titles
        .iter()
        .enumerate()
        .map(|(idx, title)| Chapter {
            id: format!("static-{}", idx + 1),
            title: (*title).to_string(),
            description: Some(format!("Chapter {}", idx + 1)),
        })
        .collect()
}

/// The two-chapter placeholder used when every other source fails.
pub fn placeholder_chapters() -> Vec<Chapter> {
    vec![
        Chapter {
            id: "1".to_string(),
            title: "Chapter 1".to_string(),
            description: None,
        },
        Chapter {
            id: "2".to_string(),
            title: "Chapter 2".to_string(),
            description: None,
        },
    ]
}

/// Canonical subject id: lowercased name with spaces removed.
pub fn subject_id(name: &str) -> String {
    name.to_lowercase().replace(' ', "")
}

pub fn default_subjects() -> Vec<Subject> {
    [
        ("Science", "flask", "emerald"),
        ("Mathematics", "calculator", "blue"),
        ("Physics", "atom", "indigo"),
        ("Chemistry", "beaker", "rose"),
        ("Biology", "leaf", "green"),
        ("English", "book-open", "amber"),
        ("Hindi", "languages", "orange"),
        ("Social Science", "globe", "cyan"),
        ("History", "landmark", "stone"),
        ("Economics", "trending-up", "teal"),
        ("Accountancy", "receipt", "violet"),
        ("Business Studies", "briefcase", "sky"),
    ]
    .into_iter()
    .map(|(name, icon, color)| Subject {
        id: subject_id(name),
        name: name.to_string(),
        icon: icon.to_string(),
        color: color.to_string(),
    })
    .collect()
}

fn applies_to(subject_name: &str, class_level: ClassLevel, stream: Option<Stream>) -> bool {
    if !class_level.has_streams() {
        // Junior classes take the combined-subject set, not stream specialisms.
        return !matches!(
            subject_name,
            "Physics" | "Chemistry" | "Biology" | "Economics" | "Accountancy" | "Business Studies"
        );
    }

    match stream {
        Some(Stream::Science) => matches!(
            subject_name,
            "Physics" | "Chemistry" | "Biology" | "Mathematics" | "English" | "Hindi"
        ),
        Some(Stream::Commerce) => matches!(
            subject_name,
            "Accountancy" | "Business Studies" | "Economics" | "Mathematics" | "English" | "Hindi"
        ),
        Some(Stream::Arts) => matches!(
            subject_name,
            "History" | "Economics" | "Social Science" | "English" | "Hindi"
        ),
        None => true,
    }
}

/// Subject listing for a class/stream: custom subjects are merged over the
/// defaults by id, then stream applicability and hidden-subject settings
/// filter the result.
pub fn subjects_for(
    class_level: ClassLevel,
    stream: Option<Stream>,
    custom_pool: &[Subject],
    hidden: &[String],
) -> Vec<Subject> {
    let mut pool: HashMap<String, Subject> = default_subjects()
        .into_iter()
        .map(|subject| (subject.id.clone(), subject))
        .collect();
    for subject in custom_pool {
        pool.insert(subject.id.clone(), subject.clone());
    }

    let mut subjects: Vec<Subject> = pool
        .into_values()
        .filter(|subject| !hidden.contains(&subject.id))
        .filter(|subject| {
            // Custom subjects outside the default pool are always shown.
            let is_default = default_subjects()
                .iter()
                .any(|default| default.id == subject.id);
            !is_default || applies_to(&subject.name, class_level, stream)
        })
        .collect();
    subjects.sort_by(|a, b| a.name.cmp(&b.name));
    subjects
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(board: Board, class_level: ClassLevel, subject: &str) -> ContentScope {
        ContentScope {
            board,
            class_level,
            stream: None,
            subject: subject.to_string(),
        }
    }

    #[test]
    fn static_syllabus_hits_known_combination() {
        let titles = static_syllabus(&scope(Board::Cbse, ClassLevel::Ten, "Science"))
            .expect("class 10 science is built in");
        assert!(titles.contains(&"Life Processes"));
    }

    #[test]
    fn static_syllabus_misses_unknown_combination() {
        assert!(static_syllabus(&scope(Board::Bseb, ClassLevel::Six, "Sanskrit")).is_none());
    }

    #[test]
    fn static_chapters_number_from_one() {
        let chapters = static_chapters(&["Alpha", "Beta"]);
        assert_eq!(chapters[0].id, "static-1");
        assert_eq!(chapters[1].title, "Beta");
        assert_eq!(chapters[1].description.as_deref(), Some("Chapter 2"));
    }

    #[test]
    fn subject_id_drops_spaces_and_case() {
        assert_eq!(subject_id("Business Studies"), "businessstudies");
    }

    #[test]
    fn custom_subject_overrides_default_by_id() {
        let custom = vec![Subject {
            id: "science".to_string(),
            name: "Science".to_string(),
            icon: "microscope".to_string(),
            color: "lime".to_string(),
        }];
        let subjects = subjects_for(ClassLevel::Nine, None, &custom, &[]);
        let science = subjects
            .iter()
            .find(|subject| subject.id == "science")
            .expect("science present");
        assert_eq!(science.icon, "microscope");
    }

    #[test]
    fn hidden_subjects_are_filtered() {
        let subjects = subjects_for(ClassLevel::Nine, None, &[], &["science".to_string()]);
        assert!(subjects.iter().all(|subject| subject.id != "science"));
    }

    #[test]
    fn commerce_stream_excludes_physics() {
        let subjects = subjects_for(ClassLevel::Twelve, Some(Stream::Commerce), &[], &[]);
        assert!(subjects.iter().all(|subject| subject.name != "Physics"));
        assert!(subjects.iter().any(|subject| subject.name == "Accountancy"));
    }
}
