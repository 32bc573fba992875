//! Concrete stage types wired together by [`Pipeline`](super::Pipeline).
//!
//! Each stage owns its downstream sink; nothing points back upstream.

use super::{BoundedQueue, Sink, Transform};
use crate::error::Result;

pub(crate) type Downstream<'a, T> = Box<dyn Sink<T> + 'a>;

pub(crate) fn boxed<'a, T, S>(sink: S) -> Downstream<'a, T>
where
    S: Sink<T> + 'a,
{
    Box::new(sink)
}

/// Adapts a closure into a terminal sink.
pub struct FnSink<F>(pub F);

impl<T, F> Sink<T> for FnSink<F>
where
    F: FnMut(T) -> Result<()>,
{
    fn consume(&mut self, item: T) -> Result<()> {
        (self.0)(item)
    }
}

pub(crate) struct Map<'a, C, F> {
    pub(crate) f: F,
    pub(crate) down: Downstream<'a, C>,
}

impl<B, C, F> Sink<B> for Map<'_, C, F>
where
    F: FnMut(B) -> C,
{
    fn consume(&mut self, item: B) -> Result<()> {
        self.down.consume((self.f)(item))
    }
}

pub(crate) struct Filter<'a, B, P> {
    pub(crate) pred: P,
    pub(crate) down: Downstream<'a, B>,
}

impl<B, P> Sink<B> for Filter<'_, B, P>
where
    P: FnMut(&B) -> bool,
{
    fn consume(&mut self, item: B) -> Result<()> {
        if (self.pred)(&item) {
            self.down.consume(item)
        } else {
            Ok(())
        }
    }
}

pub(crate) struct DropWhile<'a, B, P> {
    /// `None` once the predicate has failed for the first time.
    pub(crate) pred: Option<P>,
    pub(crate) down: Downstream<'a, B>,
}

impl<B, P> Sink<B> for DropWhile<'_, B, P>
where
    P: FnMut(&B) -> bool,
{
    fn consume(&mut self, item: B) -> Result<()> {
        if let Some(pred) = self.pred.as_mut() {
            if pred(&item) {
                return Ok(());
            }
            self.pred = None;
        }
        self.down.consume(item)
    }
}

pub(crate) struct Take<'a, B> {
    pub(crate) remaining: usize,
    pub(crate) down: Downstream<'a, B>,
}

impl<B> Sink<B> for Take<'_, B> {
    fn consume(&mut self, item: B) -> Result<()> {
        if self.remaining == 0 {
            return Ok(());
        }
        self.remaining -= 1;
        self.down.consume(item)
    }
}

pub(crate) struct Skip<'a, B> {
    pub(crate) remaining: usize,
    pub(crate) down: Downstream<'a, B>,
}

impl<B> Sink<B> for Skip<'_, B> {
    fn consume(&mut self, item: B) -> Result<()> {
        if self.remaining > 0 {
            self.remaining -= 1;
            return Ok(());
        }
        self.down.consume(item)
    }
}

pub(crate) struct Head<'a, B, F> {
    pub(crate) first: Option<F>,
    pub(crate) down: Downstream<'a, B>,
}

impl<B, F> Sink<B> for Head<'_, B, F>
where
    F: FnOnce(B) -> Result<()>,
{
    fn consume(&mut self, item: B) -> Result<()> {
        match self.first.take() {
            Some(first) => first(item),
            None => self.down.consume(item),
        }
    }
}

pub(crate) struct Buffered<'a, A, C, T> {
    pub(crate) transform: T,
    pub(crate) queue: BoundedQueue<A>,
    pub(crate) down: Downstream<'a, C>,
}

impl<A, C, T> Sink<A> for Buffered<'_, A, C, T>
where
    T: Transform<A, C>,
{
    fn consume(&mut self, item: A) -> Result<()> {
        self.queue.push(item)?;
        for out in self.transform.transform(&mut self.queue)? {
            self.down.consume(out)?;
        }
        Ok(())
    }
}
