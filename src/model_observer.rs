//! Synchronous structural-change callbacks for view adapters.

use crate::protocol::{ModelChange, RowParent};

type Observer = Box<dyn FnMut(&ModelChange)>;

/// Fan-out list of observers attached to one model.
#[derive(Default)]
pub struct ModelObservers {
    observers: Vec<Observer>,
}

impl ModelObservers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(&ModelChange) + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    pub fn notify(&mut self, change: ModelChange) {
        for observer in &mut self.observers {
            observer(&change);
        }
    }

    /// Brackets an insertion. `mutate` must not fail; callers validate first.
    pub fn insert_rows<T>(
        &mut self,
        parent: RowParent,
        first: usize,
        last: usize,
        mutate: impl FnOnce() -> T,
    ) -> T {
        self.notify(ModelChange::RowsAboutToBeInserted {
            parent,
            first,
            last,
        });
        let result = mutate();
        self.notify(ModelChange::RowsInserted {
            parent,
            first,
            last,
        });
        result
    }

    pub fn remove_rows<T>(
        &mut self,
        parent: RowParent,
        first: usize,
        last: usize,
        mutate: impl FnOnce() -> T,
    ) -> T {
        self.notify(ModelChange::RowsAboutToBeRemoved {
            parent,
            first,
            last,
        });
        let result = mutate();
        self.notify(ModelChange::RowsRemoved {
            parent,
            first,
            last,
        });
        result
    }

    pub fn reset<T>(&mut self, mutate: impl FnOnce() -> T) -> T {
        self.notify(ModelChange::ModelAboutToBeReset);
        let result = mutate();
        self.notify(ModelChange::ModelReset);
        result
    }
}

impl std::fmt::Debug for ModelObservers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelObservers")
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Test helper recording every change in order.
#[cfg(test)]
pub(crate) fn recording_observer(
    observers: &mut ModelObservers,
) -> std::rc::Rc<std::cell::RefCell<Vec<ModelChange>>> {
    let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = std::rc::Rc::clone(&log);
    observers.subscribe(move |change| sink.borrow_mut().push(change.clone()));
    log
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_rows_brackets_the_mutation() {
        let mut observers = ModelObservers::new();
        let log = recording_observer(&mut observers);
        let mut rows = vec![1, 3];
        observers.insert_rows(RowParent::Root, 1, 1, || rows.insert(1, 2));

        assert_eq!(rows, vec![1, 2, 3]);
        assert_eq!(
            *log.borrow(),
            vec![
                ModelChange::RowsAboutToBeInserted {
                    parent: RowParent::Root,
                    first: 1,
                    last: 1
                },
                ModelChange::RowsInserted {
                    parent: RowParent::Root,
                    first: 1,
                    last: 1
                },
            ]
        );
    }
}
