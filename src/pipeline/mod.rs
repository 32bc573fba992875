//! Push-based, synchronous stream pipelines.
//!
//! A [`Pipeline<A, B>`] describes how a stream of `A` turns into a stream of
//! `B`. Combinators take the pipeline by value and return a new one, so a
//! description is never mutated once built. Nothing runs until the pipeline
//! is terminated with [`Pipeline::into_sink`] or [`Pipeline::for_each`],
//! which wires the chain of owned stages from the sink upward and hands back
//! the entry point.
//!
//! Every [`Sink::consume`] call on the entry point drives the full downstream
//! cascade before it returns. There is no parallelism and no suspension; the
//! only buffering happens inside [`then`](Pipeline::then) stages, whose
//! [`BoundedQueue`] turns an over-full buffer into
//! [`Error::BufferOverflow`](crate::Error::BufferOverflow).
//!
//! ## Example
//!
//! ```
//! use xlsx_sst::pipeline::Pipeline;
//!
//! let mut seen = Vec::new();
//! {
//!     let mut sink = Pipeline::<u32>::new()
//!         .filter(|n| n % 2 == 0)
//!         .map(|n| n * 10)
//!         .take(2)
//!         .for_each(|n| {
//!             seen.push(n);
//!             Ok(())
//!         });
//!     for n in 1..=10 {
//!         sink.consume(n)?;
//!     }
//! }
//! assert_eq!(seen, vec![20, 40]);
//! # Ok::<(), xlsx_sst::Error>(())
//! ```

mod queue;
mod stages;

pub use queue::BoundedQueue;
pub use stages::FnSink;

use crate::error::Result;
use stages::{Buffered, DropWhile, Filter, Head, Map, Skip, Take, boxed};

/// Receiving end of a stage.
pub trait Sink<T> {
    fn consume(&mut self, item: T) -> Result<()>;
}

impl<T, S> Sink<T> for Box<S>
where
    S: Sink<T> + ?Sized,
{
    fn consume(&mut self, item: T) -> Result<()> {
        (**self).consume(item)
    }
}

/// Stateful multi-element step plugged in with [`Pipeline::then`].
///
/// The stage enqueues each upstream element before calling `transform`; the
/// implementation pops whatever it is ready to handle and returns the
/// elements to pass downstream, possibly none.
pub trait Transform<A, B> {
    fn transform(&mut self, input: &mut BoundedQueue<A>) -> Result<Vec<B>>;
}

impl<A, B, T> Transform<A, B> for &mut T
where
    T: Transform<A, B> + ?Sized,
{
    fn transform(&mut self, input: &mut BoundedQueue<A>) -> Result<Vec<B>> {
        (**self).transform(input)
    }
}

type Wire<'a, A, B> = Box<dyn FnOnce(Box<dyn Sink<B> + 'a>) -> Box<dyn Sink<A> + 'a> + 'a>;

/// Description of a chain of stages from `A` to `B`.
pub struct Pipeline<'a, A, B = A> {
    wire: Wire<'a, A, B>,
}

impl<'a, A: 'a> Pipeline<'a, A, A> {
    /// The identity pipeline.
    pub fn new() -> Self {
        Self {
            wire: Box::new(|down: Box<dyn Sink<A> + 'a>| down),
        }
    }
}

impl<'a, A: 'a> Default for Pipeline<'a, A, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, A: 'a, B: 'a> Pipeline<'a, A, B> {
    fn stage<C, S>(self, build: S) -> Pipeline<'a, A, C>
    where
        C: 'a,
        S: FnOnce(Box<dyn Sink<C> + 'a>) -> Box<dyn Sink<B> + 'a> + 'a,
    {
        let wire = self.wire;
        Pipeline {
            wire: Box::new(move |down: Box<dyn Sink<C> + 'a>| wire(build(down))),
        }
    }

    /// Transform each element.
    pub fn map<C, F>(self, f: F) -> Pipeline<'a, A, C>
    where
        C: 'a,
        F: FnMut(B) -> C + 'a,
    {
        self.stage(move |down| boxed(Map { f, down }))
    }

    /// Forward only the elements for which `pred` holds.
    pub fn filter<P>(self, pred: P) -> Pipeline<'a, A, B>
    where
        P: FnMut(&B) -> bool + 'a,
    {
        self.stage(move |down| boxed(Filter { pred, down }))
    }

    /// Discard elements until `pred` first fails, then forward everything.
    ///
    /// `pred` is not called again after its first `false`.
    pub fn drop_while<P>(self, pred: P) -> Pipeline<'a, A, B>
    where
        P: FnMut(&B) -> bool + 'a,
    {
        self.stage(move |down| {
            boxed(DropWhile {
                pred: Some(pred),
                down,
            })
        })
    }

    /// Forward the first `n` elements and silently discard the rest.
    pub fn take(self, n: usize) -> Pipeline<'a, A, B> {
        self.stage(move |down| boxed(Take { remaining: n, down }))
    }

    /// Discard the first `n` elements.
    pub fn drop(self, n: usize) -> Pipeline<'a, A, B> {
        self.stage(move |down| boxed(Skip { remaining: n, down }))
    }

    /// Hand the first element to `first` instead of forwarding it.
    pub fn head<F>(self, first: F) -> Pipeline<'a, A, B>
    where
        F: FnOnce(B) -> Result<()> + 'a,
    {
        self.stage(move |down| {
            boxed(Head {
                first: Some(first),
                down,
            })
        })
    }

    /// Run `transform` over a bounded queue of `capacity` elements.
    pub fn then<C, T>(self, transform: T, capacity: usize) -> Pipeline<'a, A, C>
    where
        C: 'a,
        T: Transform<B, C> + 'a,
    {
        self.stage(move |down| {
            boxed(Buffered {
                transform,
                queue: BoundedQueue::new(capacity),
                down,
            })
        })
    }

    /// Terminate the pipeline and return its entry point.
    pub fn into_sink<S>(self, sink: S) -> Box<dyn Sink<A> + 'a>
    where
        S: Sink<B> + 'a,
    {
        (self.wire)(boxed(sink))
    }

    /// Terminate the pipeline with a closure.
    pub fn for_each<F>(self, f: F) -> Box<dyn Sink<A> + 'a>
    where
        F: FnMut(B) -> Result<()> + 'a,
    {
        self.into_sink(FnSink(f))
    }
}
