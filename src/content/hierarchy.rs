//! Content hierarchy provider and the adjacency built from it
//!
//! The host platform owns the course → lesson → topic → quiz tree. The
//! simulator asks the [`ContentHierarchyProvider`] for it once per generate
//! call and keeps the answers in a [`ContentTree`], which then yields the
//! ordered [`ContentNode`]s every student walks through.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{ContentId, ContentKind, StudentId};

/// Selector for quiz lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuizFilter {
    /// Quizzes attached to a lesson or a topic
    ByParent(ContentId),
    /// Quizzes attached directly to a course, not through a lesson or topic
    ByCourseDirect(ContentId),
}

/// Source of the course hierarchy
pub trait ContentHierarchyProvider {
    /// Every course the platform offers
    fn list_courses(&self) -> Vec<ContentId>;

    /// Lessons of a course visible to a student, in course order
    fn list_lessons(&self, course: ContentId, student: StudentId) -> Vec<ContentId>;

    /// Topics of a lesson within a course, in lesson order
    fn list_topics(&self, lesson: ContentId, course: ContentId) -> Vec<ContentId>;

    /// Quizzes matching a filter
    fn list_quizzes(&self, filter: QuizFilter) -> Vec<ContentId>;

    /// Certificate awarded on completing a course, if any
    fn course_certificate(&self, _course: ContentId) -> Option<u64> {
        None
    }

    /// Quiz engine id of a quiz, if any
    fn quiz_pro_id(&self, _quiz: ContentId) -> Option<u64> {
        None
    }
}

/// One node of the hierarchy together with its ancestry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentNode {
    /// A course
    Course {
        /// Course id
        id: ContentId,
    },
    /// A lesson of a course
    Lesson {
        /// Owning course
        course: ContentId,
        /// Lesson id
        id: ContentId,
    },
    /// A topic of a lesson
    Topic {
        /// Owning course
        course: ContentId,
        /// Owning lesson
        lesson: ContentId,
        /// Topic id
        id: ContentId,
    },
    /// A quiz attached to a lesson, a topic, or directly to the course
    Quiz {
        /// Owning course
        course: ContentId,
        /// Lesson or topic the quiz hangs off, `None` for course-level quizzes
        parent: Option<ContentId>,
        /// Quiz id
        id: ContentId,
    },
}

impl ContentNode {
    /// Kind of the node
    pub fn kind(&self) -> ContentKind {
        match self {
            ContentNode::Course { .. } => ContentKind::Course,
            ContentNode::Lesson { .. } => ContentKind::Lesson,
            ContentNode::Topic { .. } => ContentKind::Topic,
            ContentNode::Quiz { .. } => ContentKind::Quiz,
        }
    }

    /// Id of the node itself
    pub fn id(&self) -> ContentId {
        match *self {
            ContentNode::Course { id }
            | ContentNode::Lesson { id, .. }
            | ContentNode::Topic { id, .. }
            | ContentNode::Quiz { id, .. } => id,
        }
    }

    /// Course the node belongs to
    pub fn course(&self) -> ContentId {
        match *self {
            ContentNode::Course { id } => id,
            ContentNode::Lesson { course, .. }
            | ContentNode::Topic { course, .. }
            | ContentNode::Quiz { course, .. } => course,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct LessonOutline {
    quizzes: Vec<ContentId>,
    topics: Vec<(ContentId, Vec<ContentId>)>,
}

#[derive(Debug, Clone, Default)]
struct CourseOutline {
    lessons_by_student: HashMap<StudentId, Vec<ContentId>>,
    lessons: HashMap<ContentId, LessonOutline>,
    direct_quizzes: Vec<ContentId>,
}

/// Parent/child adjacency of the selected courses, fetched once
#[derive(Debug, Clone, Default)]
pub struct ContentTree {
    courses: BTreeMap<ContentId, CourseOutline>,
}

impl ContentTree {
    /// Query the provider for every course, lesson list, topic and quiz
    /// needed to simulate `students` across `courses`
    ///
    /// Lesson lists are fetched per student because visibility may differ;
    /// topics and quizzes are fetched once per lesson.
    pub fn build<P: ContentHierarchyProvider + ?Sized>(
        provider: &P,
        courses: &BTreeSet<ContentId>,
        students: &BTreeSet<StudentId>,
    ) -> Self {
        let mut tree = ContentTree::default();

        for &course in courses {
            let mut outline = CourseOutline {
                direct_quizzes: provider.list_quizzes(QuizFilter::ByCourseDirect(course)),
                ..Default::default()
            };

            for &student in students {
                let lessons = provider.list_lessons(course, student);
                for &lesson in &lessons {
                    if outline.lessons.contains_key(&lesson) {
                        continue;
                    }
                    let topics = provider
                        .list_topics(lesson, course)
                        .into_iter()
                        .map(|topic| (topic, provider.list_quizzes(QuizFilter::ByParent(topic))))
                        .collect();
                    outline.lessons.insert(
                        lesson,
                        LessonOutline {
                            quizzes: provider.list_quizzes(QuizFilter::ByParent(lesson)),
                            topics,
                        },
                    );
                }
                outline.lessons_by_student.insert(student, lessons);
            }

            debug!(
                "Loaded outline for {}: {} lessons, {} course-level quizzes",
                course,
                outline.lessons.len(),
                outline.direct_quizzes.len()
            );
            tree.courses.insert(course, outline);
        }

        tree
    }

    /// Number of courses in the tree
    pub fn course_count(&self) -> usize {
        self.courses.len()
    }

    /// Nodes of one course in the order a student works through them
    ///
    /// The course itself comes first, then each lesson followed by its quizzes
    /// and its topics (each topic followed by its own quizzes), and finally the
    /// course-level quizzes. Course-level quizzes are listed even when a lesson
    /// or topic already carried them; the caller decides whether to skip them.
    pub fn walk(&self, course: ContentId, student: StudentId) -> Vec<ContentNode> {
        let mut nodes = vec![ContentNode::Course { id: course }];
        let Some(outline) = self.courses.get(&course) else {
            return nodes;
        };

        let lessons = outline.lessons_by_student.get(&student).map(Vec::as_slice).unwrap_or(&[]);
        for &lesson in lessons {
            nodes.push(ContentNode::Lesson { course, id: lesson });
            let Some(lesson_outline) = outline.lessons.get(&lesson) else {
                continue;
            };
            for &quiz in &lesson_outline.quizzes {
                nodes.push(ContentNode::Quiz { course, parent: Some(lesson), id: quiz });
            }
            for (topic, quizzes) in &lesson_outline.topics {
                nodes.push(ContentNode::Topic { course, lesson, id: *topic });
                for &quiz in quizzes {
                    nodes.push(ContentNode::Quiz { course, parent: Some(*topic), id: quiz });
                }
            }
        }

        for &quiz in &outline.direct_quizzes {
            nodes.push(ContentNode::Quiz { course, parent: None, id: quiz });
        }

        nodes
    }
}
