use std::{cell::Cell, rc::Rc};

/// Cooperative cancellation flag for one in-flight load.
///
/// Clones share the flag. Two tokens are equal only if they are clones of
/// the same token, which is how a completing load checks that it is still
/// the request its loader is waiting for.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Rc<Cell<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Rc::new(Cell::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for CancellationToken {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cancelled, &other.cancelled)
    }
}

impl Eq for CancellationToken {}

#[cfg(test)]
mod tests {
    use super::CancellationToken;

    #[test]
    fn test_identity_equality() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert_eq!(token, clone);
        assert_ne!(token, CancellationToken::new());

        clone.cancel();
        assert!(token.is_cancelled());
    }
}
