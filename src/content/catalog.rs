//! File-backed content catalog
//!
//! [`ContentCatalog`] is a [`ContentHierarchyProvider`] loaded from a JSON
//! document describing courses, their lessons, topics and quizzes. The binary
//! uses it to stand in for the host platform's content tables.
//!
//! ```json
//! {
//!   "courses": [
//!     {
//!       "id": 12,
//!       "certificate": 900,
//!       "lessons": [
//!         { "id": 40, "quizzes": [41], "topics": [{ "id": 42, "quizzes": [43] }] }
//!       ],
//!       "quizzes": [50]
//!     }
//!   ],
//!   "quiz_pro_ids": { "41": 7 }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::content::hierarchy::{ContentHierarchyProvider, QuizFilter};
use crate::types::{ContentId, StudentId};

/// Errors raised while loading a catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Catalog file does not exist
    #[error("Catalog file not found: {0}")]
    FileNotFound(String),

    /// Catalog file could not be read
    #[error("Failed to read catalog file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Catalog file is not valid JSON
    #[error("Failed to parse catalog JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The same id is used by two nodes
    #[error("Content id {0} is used more than once in the catalog")]
    DuplicateId(ContentId),
}

/// A topic inside a lesson
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicEntry {
    /// Topic id
    pub id: ContentId,
    /// Quizzes attached to the topic
    #[serde(default)]
    pub quizzes: Vec<ContentId>,
}

/// A lesson inside a course
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonEntry {
    /// Lesson id
    pub id: ContentId,
    /// Topics in lesson order
    #[serde(default)]
    pub topics: Vec<TopicEntry>,
    /// Quizzes attached to the lesson
    #[serde(default)]
    pub quizzes: Vec<ContentId>,
    /// Students allowed to see the lesson; everyone when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_to: Option<BTreeSet<StudentId>>,
}

/// A course and everything under it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseEntry {
    /// Course id
    pub id: ContentId,
    /// Lessons in course order
    #[serde(default)]
    pub lessons: Vec<LessonEntry>,
    /// Quizzes attached directly to the course
    #[serde(default)]
    pub quizzes: Vec<ContentId>,
    /// Certificate awarded on completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<u64>,
}

/// In-memory course catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentCatalog {
    /// Courses in catalog order
    #[serde(default)]
    pub courses: Vec<CourseEntry>,
    /// Quiz engine ids keyed by quiz
    #[serde(default)]
    pub quiz_pro_ids: BTreeMap<ContentId, u64>,
}

impl ContentCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CatalogError::FileNotFound(path.display().to_string()));
        }

        let content = fs::read_to_string(path)?;
        let catalog = Self::from_json(&content)?;
        info!(
            "Loaded catalog from {} with {} courses",
            path.display(),
            catalog.courses.len()
        );
        Ok(catalog)
    }

    /// Parse a catalog from a JSON string
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.check_unique_ids()?;
        Ok(catalog)
    }

    /// Add a course with no content
    pub fn with_course(mut self, id: ContentId) -> Self {
        self.courses.push(CourseEntry { id, lessons: Vec::new(), quizzes: Vec::new(), certificate: None });
        self
    }

    /// Add a lesson to the most recently added course
    pub fn with_lesson(mut self, id: ContentId) -> Self {
        if let Some(course) = self.courses.last_mut() {
            course.lessons.push(LessonEntry { id, topics: Vec::new(), quizzes: Vec::new(), visible_to: None });
        }
        self
    }

    /// Restrict the most recently added lesson to the given students
    pub fn visible_to(mut self, students: impl IntoIterator<Item = StudentId>) -> Self {
        if let Some(lesson) = self.courses.last_mut().and_then(|c| c.lessons.last_mut()) {
            lesson.visible_to = Some(students.into_iter().collect());
        }
        self
    }

    /// Add a topic to the most recently added lesson
    pub fn with_topic(mut self, id: ContentId) -> Self {
        if let Some(lesson) = self.courses.last_mut().and_then(|c| c.lessons.last_mut()) {
            lesson.topics.push(TopicEntry { id, quizzes: Vec::new() });
        }
        self
    }

    /// Add a quiz to the most recently added topic, or to the lesson when it has no topics
    pub fn with_quiz(mut self, id: ContentId) -> Self {
        if let Some(lesson) = self.courses.last_mut().and_then(|c| c.lessons.last_mut()) {
            match lesson.topics.last_mut() {
                Some(topic) => topic.quizzes.push(id),
                None => lesson.quizzes.push(id),
            }
        }
        self
    }

    /// Add a quiz directly to the most recently added course
    pub fn with_course_quiz(mut self, id: ContentId) -> Self {
        if let Some(course) = self.courses.last_mut() {
            course.quizzes.push(id);
        }
        self
    }

    /// Attach a certificate to the most recently added course
    pub fn with_certificate(mut self, certificate: u64) -> Self {
        if let Some(course) = self.courses.last_mut() {
            course.certificate = Some(certificate);
        }
        self
    }

    /// Record the quiz engine id of a quiz
    pub fn with_quiz_pro_id(mut self, quiz: ContentId, pro_id: u64) -> Self {
        self.quiz_pro_ids.insert(quiz, pro_id);
        self
    }

    fn course(&self, id: ContentId) -> Option<&CourseEntry> {
        self.courses.iter().find(|c| c.id == id)
    }

    fn lesson(&self, course: ContentId, lesson: ContentId) -> Option<&LessonEntry> {
        self.course(course).and_then(|c| c.lessons.iter().find(|l| l.id == lesson))
    }

    /// Courses, lessons and topics must have distinct ids.
    /// A quiz may be attached in more than one place.
    fn check_unique_ids(&self) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();
        let mut claim = |id: ContentId| {
            if seen.insert(id) {
                Ok(())
            } else {
                Err(CatalogError::DuplicateId(id))
            }
        };

        for course in &self.courses {
            claim(course.id)?;
            for lesson in &course.lessons {
                claim(lesson.id)?;
                for topic in &lesson.topics {
                    claim(topic.id)?;
                }
            }
        }
        Ok(())
    }
}

impl ContentHierarchyProvider for ContentCatalog {
    fn list_courses(&self) -> Vec<ContentId> {
        self.courses.iter().map(|c| c.id).collect()
    }

    fn list_lessons(&self, course: ContentId, student: StudentId) -> Vec<ContentId> {
        self.course(course)
            .map(|c| {
                c.lessons
                    .iter()
                    .filter(|l| l.visible_to.as_ref().map_or(true, |v| v.contains(&student)))
                    .map(|l| l.id)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn list_topics(&self, lesson: ContentId, course: ContentId) -> Vec<ContentId> {
        self.lesson(course, lesson)
            .map(|l| l.topics.iter().map(|t| t.id).collect())
            .unwrap_or_default()
    }

    fn list_quizzes(&self, filter: QuizFilter) -> Vec<ContentId> {
        match filter {
            QuizFilter::ByCourseDirect(course) => {
                self.course(course).map(|c| c.quizzes.clone()).unwrap_or_default()
            }
            QuizFilter::ByParent(parent) => {
                for course in &self.courses {
                    for lesson in &course.lessons {
                        if lesson.id == parent {
                            return lesson.quizzes.clone();
                        }
                        if let Some(topic) = lesson.topics.iter().find(|t| t.id == parent) {
                            return topic.quizzes.clone();
                        }
                    }
                }
                Vec::new()
            }
        }
    }

    fn course_certificate(&self, course: ContentId) -> Option<u64> {
        self.course(course).and_then(|c| c.certificate)
    }

    fn quiz_pro_id(&self, quiz: ContentId) -> Option<u64> {
        self.quiz_pro_ids.get(&quiz).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"{
        "courses": [
            {
                "id": 12,
                "certificate": 900,
                "lessons": [
                    { "id": 40, "quizzes": [41], "topics": [{ "id": 42, "quizzes": [43] }] },
                    { "id": 44, "visible_to": [2] }
                ],
                "quizzes": [50]
            },
            { "id": 13 }
        ],
        "quiz_pro_ids": { "41": 7 }
    }"#;

    #[test]
    fn test_parse_catalog() {
        let catalog = ContentCatalog::from_json(SAMPLE).unwrap();

        assert_eq!(catalog.list_courses(), vec![ContentId(12), ContentId(13)]);
        assert_eq!(catalog.list_topics(ContentId(40), ContentId(12)), vec![ContentId(42)]);
        assert_eq!(catalog.list_quizzes(QuizFilter::ByParent(ContentId(40))), vec![ContentId(41)]);
        assert_eq!(catalog.list_quizzes(QuizFilter::ByParent(ContentId(42))), vec![ContentId(43)]);
        assert_eq!(
            catalog.list_quizzes(QuizFilter::ByCourseDirect(ContentId(12))),
            vec![ContentId(50)]
        );
        assert_eq!(catalog.course_certificate(ContentId(12)), Some(900));
        assert_eq!(catalog.course_certificate(ContentId(13)), None);
        assert_eq!(catalog.quiz_pro_id(ContentId(41)), Some(7));
        assert_eq!(catalog.quiz_pro_id(ContentId(43)), None);
    }

    #[test]
    fn test_lesson_visibility() {
        let catalog = ContentCatalog::from_json(SAMPLE).unwrap();

        assert_eq!(catalog.list_lessons(ContentId(12), StudentId(1)), vec![ContentId(40)]);
        assert_eq!(
            catalog.list_lessons(ContentId(12), StudentId(2)),
            vec![ContentId(40), ContentId(44)]
        );
        assert!(catalog.list_lessons(ContentId(99), StudentId(1)).is_empty());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let json = r#"{ "courses": [ { "id": 1, "lessons": [ { "id": 1 } ] } ] }"#;
        let result = ContentCatalog::from_json(json);
        assert!(matches!(result, Err(CatalogError::DuplicateId(ContentId(1)))));
    }

    #[test]
    fn test_builder_matches_json() {
        let built = ContentCatalog::new()
            .with_course(ContentId(12))
            .with_certificate(900)
            .with_lesson(ContentId(40))
            .with_quiz(ContentId(41))
            .with_topic(ContentId(42))
            .with_quiz(ContentId(43))
            .with_lesson(ContentId(44))
            .visible_to([StudentId(2)])
            .with_course_quiz(ContentId(50))
            .with_course(ContentId(13))
            .with_quiz_pro_id(ContentId(41), 7);

        assert_eq!(built, ContentCatalog::from_json(SAMPLE).unwrap());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let catalog = ContentCatalog::from_file(file.path()).unwrap();
        assert_eq!(catalog.courses.len(), 2);

        let missing = ContentCatalog::from_file("/nonexistent/catalog.json");
        assert!(matches!(missing, Err(CatalogError::FileNotFound(_))));
    }
}
