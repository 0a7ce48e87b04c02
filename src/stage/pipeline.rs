use super::{CollectionIoEvent, IoContext};
use crate::core::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{Level, event};

/// One step of a collection operation.
///
/// A stage receives the shared context plus the current payload and returns
/// the next payload. `Ok(None)` means "nothing to continue with" and ends the
/// operation with an empty result.
#[async_trait]
pub trait Stage<I, O>: Send + Sync
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn name(&self) -> &'static str;

    async fn run(&self, event: CollectionIoEvent<I>) -> Result<Option<O>>;
}

#[async_trait]
impl<I, O, S> Stage<I, O> for Arc<S>
where
    I: Send + 'static,
    O: Send + 'static,
    S: Stage<I, O> + ?Sized,
{
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn run(&self, event: CollectionIoEvent<I>) -> Result<Option<O>> {
        (**self).run(event).await
    }
}

/// Two stages run back to back with the context carried across.
struct Chain<I, M, O> {
    first: Arc<dyn Stage<I, M>>,
    second: Arc<dyn Stage<M, O>>,
}

#[async_trait]
impl<I, M, O> Stage<I, O> for Chain<I, M, O>
where
    I: Send + 'static,
    M: Send + 'static,
    O: Send + 'static,
{
    fn name(&self) -> &'static str {
        self.second.name()
    }

    async fn run(&self, event: CollectionIoEvent<I>) -> Result<Option<O>> {
        let context = event.context().clone();

        let Some(intermediate) = self.first.run(event).await? else {
            event!(Level::TRACE, stage = self.first.name(), "stage ended the pipeline");
            return Ok(None);
        };

        context.ensure_active()?;
        event!(Level::TRACE, stage = self.second.name(), "running stage");
        self.second
            .run(CollectionIoEvent::new(context, intermediate))
            .await
    }
}

/// An ordered, typed sequence of stages.
///
/// Stages run in declaration order; an error or an empty result short-circuits
/// the rest. Stages only ever see the payload change - the scope and the
/// cancellation token are owned by the pipeline and handed on as is.
pub struct Pipeline<I, O> {
    head: Arc<dyn Stage<I, O>>,
    stages: Vec<&'static str>,
}

impl<I, O> Clone for Pipeline<I, O> {
    fn clone(&self) -> Self {
        Self {
            head: Arc::clone(&self.head),
            stages: self.stages.clone(),
        }
    }
}

impl<I, O> Pipeline<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    pub fn start<S>(stage: S) -> Self
    where
        S: Stage<I, O> + 'static,
    {
        let name = stage.name();
        Self {
            head: Arc::new(stage),
            stages: vec![name],
        }
    }

    pub fn then<P, S>(self, stage: S) -> Pipeline<I, P>
    where
        P: Send + 'static,
        S: Stage<O, P> + 'static,
    {
        let mut stages = self.stages;
        stages.push(stage.name());
        Pipeline {
            head: Arc::new(Chain {
                first: self.head,
                second: Arc::new(stage) as Arc<dyn Stage<O, P>>,
            }),
            stages,
        }
    }

    /// Stage names in execution order.
    pub fn stages(&self) -> &[&'static str] {
        &self.stages
    }

    pub async fn execute(&self, context: IoContext, input: I) -> Result<Option<O>> {
        context.ensure_active()?;
        self.head.run(CollectionIoEvent::new(context, input)).await
    }
}
