use tracing::{Level, Span};

/// Span for a long-lived background task owned by a component instance.
///
/// `instance` distinguishes tasks of sibling instances in the same process.
pub fn task_span(name: &'static str, instance: u64) -> Span {
    tracing::span!(Level::INFO, "task", name = %name, instance)
}

/// Child span for a single unit of work inside a task (one drain pass, ...).
pub fn child_span(name: &'static str) -> Span {
    tracing::span!(Level::DEBUG, "work", name = %name)
}
