use std::sync::{Arc, Mutex, PoisonError, Weak};

/// The live subsystem. Dropping the last `Arc` tears it down.
#[derive(Debug)]
struct Subsystem {
    _private: (),
}

impl Subsystem {
    fn start() -> Subsystem {
        // Nothing to bring up on unix; the socket calls are always available.
        log::debug!("Network subsystem started");
        Subsystem { _private: () }
    }
}

impl Drop for Subsystem {
    fn drop(&mut self) {
        log::debug!("Network subsystem stopped");
    }
}

static SUBSYSTEM: Mutex<Weak<Subsystem>> = Mutex::new(Weak::new());

/// A shared reference to the process-wide networking subsystem.
///
/// The subsystem is started by the first call to [`Network::acquire`] and
/// torn down when the last `Network` is dropped. Acquiring while a reference
/// is alive hands out the same subsystem. Every [`Socket`](crate::Socket)
/// holds a `Network` for its whole life, so the subsystem is guaranteed to be
/// up while any socket object exists.
#[derive(Debug, Clone)]
pub struct Network {
    inner: Arc<Subsystem>,
}

impl Network {
    /// Returns a reference to the running subsystem, starting it if needed.
    pub fn acquire() -> Network {
        let mut slot = SUBSYSTEM.lock().unwrap_or_else(PoisonError::into_inner);
        let inner = match slot.upgrade() {
            Some(inner) => inner,
            None => {
                let inner = Arc::new(Subsystem::start());
                *slot = Arc::downgrade(&inner);
                inner
            }
        };
        Network { inner }
    }

    /// Returns `true` if some `Network` reference is alive in this process.
    pub fn is_active() -> bool {
        SUBSYSTEM
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .strong_count()
            > 0
    }

    /// Returns `true` if both references point to the same running subsystem.
    pub fn same_subsystem(&self, other: &Network) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_is_shared() {
        let first = Network::acquire();
        let second = Network::acquire();
        assert!(first.same_subsystem(&second));
        assert!(first.same_subsystem(&second.clone()));
        assert!(Network::is_active());
    }
}
