//! Data sources and the pull contract.
//!
//! Everything in a pipeline consumes values through [`Producer`]: a
//! pull either yields the next value, signals end of stream with
//! `Ok(None)`, or fails. [`DataSource`] adds connection lifecycle on
//! top of the pull contract; [`Connected`] guarantees disconnection on
//! every exit path.

use serde_json::Value;

use crate::error::PipelineResult;

mod integers;
mod registry;
mod values;

pub use integers::Integers;
pub use registry::{SourceRegistry, SourceSpec};
pub use values::Values;

/// A pull-based producer of JSON values.
pub trait Producer {
    /// Pulls the next value, or `Ok(None)` at end of stream.
    fn pull(&mut self) -> PipelineResult<Option<Value>>;
}

/// A producer with an explicit connection lifecycle.
///
/// Sources must be connected before the owning pipeline is driven and
/// disconnected afterward; use [`Connected`] to scope that lifecycle.
pub trait DataSource: Producer {
    /// Acquires whatever resources the source needs to produce values.
    fn connect(&mut self) -> PipelineResult<()>;

    /// Releases the source's resources.
    fn disconnect(&mut self) -> PipelineResult<()>;
}

impl Producer for Box<dyn DataSource> {
    fn pull(&mut self) -> PipelineResult<Option<Value>> {
        (**self).pull()
    }
}

impl DataSource for Box<dyn DataSource> {
    fn connect(&mut self) -> PipelineResult<()> {
        (**self).connect()
    }

    fn disconnect(&mut self) -> PipelineResult<()> {
        (**self).disconnect()
    }
}

/// Connection guard around a [`DataSource`].
///
/// Connects on open and disconnects on drop, so the source is released
/// on every exit path, including failures mid-drain.
pub struct Connected<S: DataSource> {
    source: S,
}

impl<S: DataSource> Connected<S> {
    /// Connects the source and wraps it in the guard.
    pub fn open(mut source: S) -> PipelineResult<Self> {
        source.connect()?;
        Ok(Self { source })
    }
}

impl<S: DataSource> Producer for Connected<S> {
    fn pull(&mut self) -> PipelineResult<Option<Value>> {
        self.source.pull()
    }
}

impl<S: DataSource> Drop for Connected<S> {
    fn drop(&mut self) {
        if let Err(error) = self.source.disconnect() {
            tracing::warn!(
                target: crate::TRACING_TARGET,
                error = %error,
                "source disconnect failed"
            );
        }
    }
}

/// Adapts any iterator of values into a producer.
///
/// Handy for raw in-memory sequences and tests.
pub struct IterProducer<I> {
    iter: I,
}

impl<I: Iterator<Item = Value>> IterProducer<I> {
    /// Wraps an iterable of values.
    pub fn new(iter: impl IntoIterator<Item = Value, IntoIter = I>) -> Self {
        Self {
            iter: iter.into_iter(),
        }
    }
}

impl<I: Iterator<Item = Value>> Producer for IterProducer<I> {
    fn pull(&mut self) -> PipelineResult<Option<Value>> {
        Ok(self.iter.next())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::error::PipelineError;

    /// Source that records its lifecycle transitions.
    struct Tracked {
        connected: Rc<RefCell<Vec<&'static str>>>,
        fail_pull: bool,
    }

    impl Producer for Tracked {
        fn pull(&mut self) -> PipelineResult<Option<Value>> {
            if self.fail_pull {
                return Err(PipelineError::Source("pull failed".into()));
            }
            Ok(None)
        }
    }

    impl DataSource for Tracked {
        fn connect(&mut self) -> PipelineResult<()> {
            self.connected.borrow_mut().push("connect");
            Ok(())
        }

        fn disconnect(&mut self) -> PipelineResult<()> {
            self.connected.borrow_mut().push("disconnect");
            Ok(())
        }
    }

    #[test]
    fn test_connected_guard_releases_on_drop() {
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let source = Tracked {
                connected: Rc::clone(&log),
                fail_pull: false,
            };
            let mut guard = Connected::open(source).expect("open failed");
            assert_eq!(guard.pull().expect("pull failed"), None);
        }
        assert_eq!(*log.borrow(), vec!["connect", "disconnect"]);
    }

    #[test]
    fn test_connected_guard_releases_on_failure() {
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let source = Tracked {
                connected: Rc::clone(&log),
                fail_pull: true,
            };
            let mut guard = Connected::open(source).expect("open failed");
            assert!(guard.pull().is_err());
        }
        assert_eq!(*log.borrow(), vec!["connect", "disconnect"]);
    }

    #[test]
    fn test_iter_producer_drains_in_order() {
        let mut producer = IterProducer::new(vec![json!(1), json!(2)]);
        assert_eq!(producer.pull().expect("pull failed"), Some(json!(1)));
        assert_eq!(producer.pull().expect("pull failed"), Some(json!(2)));
        assert_eq!(producer.pull().expect("pull failed"), None);
        // end of stream is stable
        assert_eq!(producer.pull().expect("pull failed"), None);
    }
}
