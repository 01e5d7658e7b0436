use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        content::ContentTree,
        document::{CourseView, Document},
    },
    store::DocumentStore,
};

/// Lesson ids a course refers to, in order and with repeats.
///
/// Only top-level blocks count: a `lesson` block names one lesson in its
/// `lesson_id` field, a `group` block lists several in `lesson_ids`. A root
/// stored as a string is parsed first.
pub fn referenced_lessons(content: &Value) -> Vec<String> {
    let tree = match ContentTree::from(content.clone()) {
        ContentTree::Text(text) => match ContentTree::parse_text(&text) {
            Some(parsed) => parsed,
            None => return Vec::new(),
        },
        other => other,
    };

    let mut ids = Vec::new();
    for block in tree.top_level_blocks() {
        if block.is_kind("lesson") {
            if let Some(id) = block.field("lesson_id").and_then(Value::as_str) {
                ids.push(id.to_string());
            }
        } else if block.is_kind("group") {
            if let Some(Value::Array(items)) = block.field("lesson_ids") {
                ids.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
            }
        }
    }
    ids
}

/// Sums the durations of the lessons each course embeds.
#[derive(Clone)]
pub struct DurationAggregator {
    documents: Arc<dyn DocumentStore>,
}

impl DurationAggregator {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    /// One lookup per tenant for every lesson referenced by its courses.
    /// Unknown, foreign or unparsable lesson ids count as zero minutes.
    pub async fn compute_durations(&self, courses: Vec<Document>) -> AppResult<Vec<CourseView>> {
        let per_course: Vec<Vec<Uuid>> = courses
            .iter()
            .map(|course| {
                referenced_lessons(&course.content)
                    .iter()
                    .filter_map(|id| Uuid::parse_str(id).ok())
                    .collect()
            })
            .collect();

        let mut wanted: HashMap<Uuid, HashSet<Uuid>> = HashMap::new();
        for (course, lessons) in courses.iter().zip(&per_course) {
            if !lessons.is_empty() {
                wanted
                    .entry(course.tenant_id)
                    .or_default()
                    .extend(lessons.iter().copied());
            }
        }

        let mut durations: HashMap<(Uuid, Uuid), i32> = HashMap::new();
        for (tenant_id, lessons) in wanted {
            let lessons: Vec<Uuid> = lessons.into_iter().collect();
            let found = self.documents.lesson_durations(tenant_id, &lessons).await?;
            durations.extend(found.into_iter().map(|(id, d)| ((tenant_id, id), d)));
        }

        Ok(courses
            .into_iter()
            .zip(per_course)
            .map(|(course, lessons)| {
                let duration = lessons
                    .iter()
                    .map(|id| {
                        let minutes = durations.get(&(course.tenant_id, *id));
                        i64::from(minutes.copied().unwrap_or(0))
                    })
                    .sum();
                CourseView { course, duration }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::document::DocumentKind,
        testutil::{document, MemoryDocuments},
    };
    use serde_json::json;

    fn lesson(docs: &MemoryDocuments, tenant: Uuid, minutes: i32) -> Uuid {
        let mut doc = document(tenant, json!([]));
        doc.duration = Some(minutes);
        docs.insert(DocumentKind::Lesson, doc).id
    }

    #[test]
    fn test_referenced_lessons_keeps_repeats_and_order() {
        let content = json!([
            { "type": "lesson", "props": {}, "lesson_id": "L1" },
            { "type": "paragraph", "lesson_id": "ignored" },
            { "type": "group", "lesson_ids": ["L2", "L2", 3] },
            { "type": "lesson" }
        ]);
        assert_eq!(referenced_lessons(&content), vec!["L1", "L2", "L2"]);
    }

    #[test]
    fn test_nested_references_are_not_followed() {
        let content = json!([{
            "type": "section",
            "children": [{ "type": "lesson", "lesson_id": "L1" }]
        }]);
        assert!(referenced_lessons(&content).is_empty());
        assert!(referenced_lessons(&json!({ "type": "lesson", "lesson_id": "L1" })).is_empty());
    }

    #[test]
    fn test_string_root_is_parsed() {
        let content = Value::String(json!([{ "type": "lesson", "lesson_id": "L9" }]).to_string());
        assert_eq!(referenced_lessons(&content), vec!["L9"]);
        assert!(referenced_lessons(&json!("plain prose")).is_empty());
    }

    #[tokio::test]
    async fn test_repeated_lesson_is_counted_each_time() {
        let docs = Arc::new(MemoryDocuments::default());
        let tenant = Uuid::new_v4();
        let l1 = lesson(&docs, tenant, 10);
        let l2 = lesson(&docs, tenant, 5);
        let course = document(
            tenant,
            json!([
                { "type": "lesson", "props": {}, "lesson_id": l1.to_string() },
                { "type": "group", "lesson_ids": [l2.to_string(), l2.to_string()] }
            ]),
        );

        let views = DurationAggregator::new(docs)
            .compute_durations(vec![course])
            .await
            .unwrap();

        assert_eq!(views[0].duration, 20);
    }

    #[tokio::test]
    async fn test_missing_and_empty_courses_are_zero() {
        let docs = Arc::new(MemoryDocuments::default());
        let tenant = Uuid::new_v4();
        let real = lesson(&docs, tenant, 7);
        let courses = vec![
            document(tenant, json!([])),
            document(
                tenant,
                json!([
                    { "type": "lesson", "lesson_id": Uuid::new_v4().to_string() },
                    { "type": "lesson", "lesson_id": "not-a-uuid" },
                    { "type": "lesson", "lesson_id": real.to_string() }
                ]),
            ),
            document(tenant, Value::Null),
        ];

        let views = DurationAggregator::new(docs)
            .compute_durations(courses)
            .await
            .unwrap();

        let durations: Vec<i64> = views.iter().map(|v| v.duration).collect();
        assert_eq!(durations, vec![0, 7, 0]);
    }

    #[tokio::test]
    async fn test_other_tenants_lessons_count_as_zero() {
        let docs = Arc::new(MemoryDocuments::default());
        let mine = Uuid::new_v4();
        let theirs = Uuid::new_v4();
        let own = lesson(&docs, mine, 4);
        let foreign = lesson(&docs, theirs, 60);
        let refs = json!([
            { "type": "lesson", "lesson_id": own.to_string() },
            { "type": "lesson", "lesson_id": foreign.to_string() }
        ]);

        let views = DurationAggregator::new(docs)
            .compute_durations(vec![document(mine, refs.clone()), document(theirs, refs)])
            .await
            .unwrap();

        assert_eq!(views[0].duration, 4);
        assert_eq!(views[1].duration, 60);
    }
}
