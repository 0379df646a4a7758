pub mod context;
pub mod error;
pub mod graph;
pub mod task;

// Re-export commonly used types
pub use context::Context;
pub use error::{GraphError, Result};
pub use graph::{Edge, Graph, GraphBuilder};
pub use task::{NextAction, Task, TaskResult};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct AppendTask {
        id: String,
        next_action: NextAction,
    }

    #[async_trait]
    impl Task for AppendTask {
        fn id(&self) -> &str {
            &self.id
        }

        async fn run(&self, context: Context) -> Result<TaskResult> {
            let mut trail: Vec<String> = context.get("trail").await.unwrap_or_default();
            trail.push(self.id.clone());
            context.set("trail", trail).await;

            Ok(TaskResult::new(
                Some(format!("{} done", self.id)),
                self.next_action.clone(),
            ))
        }
    }

    fn task(id: &str, next_action: NextAction) -> Arc<AppendTask> {
        Arc::new(AppendTask {
            id: id.to_string(),
            next_action,
        })
    }

    struct FailingTask;

    #[async_trait]
    impl Task for FailingTask {
        async fn run(&self, _context: Context) -> Result<TaskResult> {
            Err(GraphError::TaskExecutionFailed("boom".to_string()))
        }
    }

    #[tokio::test]
    async fn test_continue_follows_edges_until_end() {
        let graph = GraphBuilder::new("linear")
            .add_task(task("first", NextAction::Continue))
            .add_task(task("second", NextAction::Continue))
            .add_task(task("third", NextAction::End))
            .add_edge("first", "second")
            .add_edge("second", "third")
            .build();

        let context = Context::new();
        let result = graph.execute_from_start(context.clone()).await.unwrap();

        assert_eq!(result.task_id, "third");
        assert_eq!(result.next_action, NextAction::End);
        let trail: Vec<String> = context.get("trail").await.unwrap();
        assert_eq!(trail, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_continue_without_edge_stops() {
        let graph = GraphBuilder::new("single")
            .add_task(task("only", NextAction::Continue))
            .build();

        let result = graph.execute("only", Context::new()).await.unwrap();
        assert_eq!(result.task_id, "only");
        assert_eq!(result.response.as_deref(), Some("only done"));
    }

    #[tokio::test]
    async fn test_goto_jumps_and_unknown_target_errors() {
        let graph = GraphBuilder::new("jump")
            .add_task(task("start", NextAction::GoTo("last".to_string())))
            .add_task(task("skipped", NextAction::Continue))
            .add_task(task("last", NextAction::End))
            .add_edge("start", "skipped")
            .build();

        let context = Context::new();
        graph.execute("start", context.clone()).await.unwrap();
        let trail: Vec<String> = context.get("trail").await.unwrap();
        assert_eq!(trail, vec!["start", "last"]);

        let broken = GraphBuilder::new("broken")
            .add_task(task("start", NextAction::GoTo("missing".to_string())))
            .build();
        let err = broken.execute("start", Context::new()).await.unwrap_err();
        assert!(matches!(err, GraphError::TaskNotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn test_task_failure_propagates_and_default_id_is_type_name() {
        let failing = Arc::new(FailingTask);
        let failing_id = failing.id().to_string();
        assert!(failing_id.ends_with("FailingTask"));

        let graph = GraphBuilder::new("failing").add_task(failing).build();
        assert_eq!(graph.start_task_id(), Some(failing_id.as_str()));

        let err = graph.execute_from_start(Context::new()).await.unwrap_err();
        assert!(matches!(err, GraphError::TaskExecutionFailed(msg) if msg == "boom"));
    }

    #[tokio::test]
    async fn test_context_require_reports_missing_key() {
        let context = Context::new();
        context.set("present", 42u32).await;

        let present: u32 = context.require("present").await.unwrap();
        assert_eq!(present, 42);

        let missing = context.require::<String>("absent").await.unwrap_err();
        assert!(matches!(missing, GraphError::ContextError(_)));

        assert!(context.remove("present").await.is_some());
        assert!(context.get::<u32>("present").await.is_none());
    }
}
