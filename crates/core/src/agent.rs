//! The assistant seam consumed by the request handler.

use async_trait::async_trait;

/// Anything that can turn a natural-language query into a textual answer.
///
/// The handler treats implementations as opaque: whatever reasoning, tool use
/// or network traffic happens inside `run` is not its concern, and any error
/// is propagated unchanged.
#[async_trait]
pub trait Assistant: Send + Sync {
    async fn run(&self, query: &str) -> crate::Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Upper;

    #[async_trait]
    impl Assistant for Upper {
        async fn run(&self, query: &str) -> crate::Result<String> {
            Ok(query.to_uppercase())
        }
    }

    #[tokio::test]
    async fn assistant_is_object_safe() {
        let assistant: Arc<dyn Assistant> = Arc::new(Upper);
        assert_eq!(assistant.run("hi").await.unwrap(), "HI");
    }
}
