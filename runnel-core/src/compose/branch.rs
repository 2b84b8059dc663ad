//! Conditional dispatch on the input.

use super::step_options;
use crate::config::CallOptions;
use crate::runnable::{BoxRunnable, RunStream, Runnable};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

type Predicate<I> = Arc<dyn Fn(&I) -> bool + Send + Sync>;

/// Runs the stage paired with the first accepting predicate, or the default.
///
/// Predicates are checked in insertion order before any stage starts, and
/// checking stops at the first match.
pub struct RunnableBranch<I, O> {
    branches: Vec<(Predicate<I>, BoxRunnable<I, O>)>,
    default: BoxRunnable<I, O>,
}

impl<I, O> RunnableBranch<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Create a branch that always runs `default`
    pub fn new(default: impl Runnable<I, O>) -> Self {
        Self {
            branches: Vec::new(),
            default: Arc::new(default),
        }
    }

    /// Add a conditional arm, checked after the ones already added
    pub fn when<P>(mut self, predicate: P, stage: impl Runnable<I, O>) -> Self
    where
        P: Fn(&I) -> bool + Send + Sync + 'static,
    {
        self.branches.push((Arc::new(predicate), Arc::new(stage)));
        self
    }

    fn select(&self, input: &I) -> (&BoxRunnable<I, O>, String) {
        self.branches
            .iter()
            .enumerate()
            .find(|(_, (predicate, _))| predicate(input))
            .map(|(index, (_, stage))| (stage, format!("branch:{}", index + 1)))
            .unwrap_or_else(|| (&self.default, "branch:default".to_string()))
    }
}

#[async_trait]
impl<I, O> Runnable<I, O> for RunnableBranch<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    async fn run(&self, input: I, options: CallOptions) -> Result<O> {
        let (stage, tag) = self.select(&input);
        stage.invoke(input, step_options(&options, tag)).await
    }

    fn streams_natively(&self) -> bool {
        true
    }

    async fn run_stream(&self, input: I, options: CallOptions) -> Result<RunStream<O>> {
        let (stage, tag) = self.select(&input);
        stage.stream(input, step_options(&options, tag)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::RunnableLambda;
    use std::sync::Mutex;

    fn recording(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> RunnableLambda<i32, String> {
        let log = log.clone();
        RunnableLambda::from_fn(name, move |x: i32| {
            log.lock().unwrap().push(name);
            Ok(format!("{}:{}", name, x))
        })
    }

    #[tokio::test]
    async fn test_first_matching_arm_runs_alone() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let branch = RunnableBranch::new(recording("s3", &log))
            .when(|_: &i32| false, recording("s1", &log))
            .when(|_: &i32| true, recording("s2", &log));

        let output = branch.invoke(7, CallOptions::new()).await.unwrap();
        assert_eq!(output, "s2:7");
        assert_eq!(*log.lock().unwrap(), vec!["s2"]);
    }

    #[tokio::test]
    async fn test_default_when_nothing_matches() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let branch = RunnableBranch::new(recording("fallback", &log))
            .when(|x: &i32| *x > 100, recording("big", &log))
            .when(|x: &i32| *x < 0, recording("negative", &log));

        let output = branch.invoke(5, CallOptions::new()).await.unwrap();
        assert_eq!(output, "fallback:5");
        assert_eq!(*log.lock().unwrap(), vec!["fallback"]);
    }

    #[tokio::test]
    async fn test_predicates_short_circuit() {
        let checked = Arc::new(Mutex::new(Vec::new()));
        let (first, second) = (checked.clone(), checked.clone());
        let log = Arc::new(Mutex::new(Vec::new()));

        let branch = RunnableBranch::new(recording("default", &log))
            .when(
                move |_: &i32| {
                    first.lock().unwrap().push(1);
                    true
                },
                recording("one", &log),
            )
            .when(
                move |_: &i32| {
                    second.lock().unwrap().push(2);
                    true
                },
                recording("two", &log),
            );

        branch.invoke(0, CallOptions::new()).await.unwrap();
        assert_eq!(*checked.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_selected_arm_sees_branch_tag() {
        let tags = RunnableLambda::new("tags", |_: i32, options: CallOptions| async move {
            Ok(options.config.tags.join(","))
        });
        let branch = RunnableBranch::new(RunnableLambda::from_fn("none", |_: i32| Ok(String::new())))
            .when(|_: &i32| true, tags);

        let output = branch.invoke(1, CallOptions::new()).await.unwrap();
        assert_eq!(output, "branch:1");
    }
}
