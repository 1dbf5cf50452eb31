type Callback<T> = Box<dyn FnOnce(Option<T>) + Send>;

/// Delivers a result to a callback exactly once.
///
/// If the completion is dropped without `complete` being called (the continuation
/// holding it was cancelled or never spawned), the callback receives `None`.
pub struct Completion<T> {
    callback: Option<Callback<T>>,
}

impl<T> Completion<T> {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(Option<T>) + Send + 'static,
    {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    pub fn complete(mut self, value: Option<T>) {
        if let Some(callback) = self.callback.take() {
            callback(value);
        }
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback(None);
        }
    }
}
