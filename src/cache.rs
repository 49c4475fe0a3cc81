use std::time::{Duration, Instant};

/// Holds one loaded value for at most `ttl`. Changes made to the backing file
/// by someone else are only seen once the entry expires.
#[derive(Debug)]
pub struct TimedCache<T> {
    ttl: Duration,
    entry: Option<(Instant, T)>,
}

impl<T> TimedCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None }
    }

    pub fn get_or_try_load<E, F>(&mut self, load: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.get_or_try_load_at(Instant::now(), load)
    }

    fn get_or_try_load_at<E, F>(&mut self, now: Instant, load: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let entry = match self.entry.take() {
            Some((at, value)) if now.duration_since(at) < self.ttl => (at, value),
            stale => match load() {
                Ok(value) => (now, value),
                Err(e) => {
                    self.entry = stale;
                    return Err(e);
                }
            },
        };
        Ok(&self.entry.insert(entry).1)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}
