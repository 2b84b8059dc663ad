//! Identity stage.

use crate::config::CallOptions;
use crate::runnable::Runnable;
use crate::Result;
use async_trait::async_trait;

/// Returns its input unchanged. Useful inside a [`RunnableMap`] to carry the
/// original input next to transformed values.
///
/// [`RunnableMap`]: crate::compose::RunnableMap
#[derive(Debug, Clone, Copy, Default)]
pub struct RunnablePassthrough;

#[async_trait]
impl<T: Send + 'static> Runnable<T, T> for RunnablePassthrough {
    async fn run(&self, input: T, _options: CallOptions) -> Result<T> {
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passthrough_is_identity() {
        let output = RunnablePassthrough
            .invoke(vec![1, 2, 3], CallOptions::new())
            .await
            .unwrap();
        assert_eq!(output, vec![1, 2, 3]);
        assert_eq!(Runnable::<i32, i32>::name(&RunnablePassthrough), "RunnablePassthrough");
    }
}
