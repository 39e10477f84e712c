//! Reactive state cell
//!
//! An owned value whose changes are broadcast to any number of readers.
//! Built on `tokio::sync::watch`: writers never block, readers always see the
//! latest value and can `.changed().await` for the next one.

use tokio::sync::watch;

/// Owned value with change notification
#[derive(Debug)]
pub struct Observable<T> {
    tx: watch::Sender<T>,
}

impl<T> Observable<T> {
    pub fn new(value: T) -> Self {
        let (tx, _) = watch::channel(value);
        Self { tx }
    }

    /// Replace the value and notify subscribers
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Mutate in place; subscribers are notified only when `f` returns true
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut T) -> bool,
    {
        self.tx.send_if_modified(f)
    }

    /// New read-only view
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    /// Borrow the current value
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.tx.borrow())
    }
}

impl<T: Clone> Observable<T> {
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }
}

impl<T: PartialEq> Observable<T> {
    /// Store `value` only if it differs; returns whether it changed
    pub fn set_if_changed(&self, value: T) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }
}

impl<T: Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set() {
        let cell = Observable::new(1);
        assert_eq!(cell.get(), 1);
        cell.set(5);
        assert_eq!(cell.get(), 5);
    }

    #[test]
    fn test_set_if_changed_reports_change() {
        let cell = Observable::new(String::from("idle"));
        let mut rx = cell.subscribe();

        assert!(!cell.set_if_changed(String::from("idle")));
        assert!(!rx.has_changed().unwrap());

        assert!(cell.set_if_changed(String::from("busy")));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), "busy");
    }

    #[test]
    fn test_update_in_place() {
        let cell = Observable::new(vec![1, 2]);
        let changed = cell.update(|v| {
            v.push(3);
            true
        });
        assert!(changed);
        assert_eq!(cell.with(|v| v.len()), 3);
    }

    #[tokio::test]
    async fn test_subscriber_wakes_on_change() {
        let cell = Observable::new(0u8);
        let mut rx = cell.subscribe();

        let waiter = tokio::spawn(async move {
            rx.changed().await.unwrap();
            *rx.borrow()
        });

        tokio::task::yield_now().await;
        cell.set(42);
        assert_eq!(waiter.await.unwrap(), 42);
    }
}
