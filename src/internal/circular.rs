//! Dependency cycle detection infrastructure.

use std::cell::RefCell;

use crate::error::{DiError, DiResult};
use crate::label::Label;

// Per-thread resolution stack. Entries are tagged with the owning container so
// that equal labels resolved by different containers never look like a cycle.
thread_local! {
    static RESOLUTION_STACK: RefCell<Vec<(u64, Label)>> = const { RefCell::new(Vec::new()) };
}

/// Guard for one entry of the resolution stack.
///
/// The entry is popped when the guard drops, on success, error and unwind alike.
pub(crate) struct StackGuard {
    container: u64,
}

impl StackGuard {
    /// Pushes `label`, failing if it is already being constructed by the same container.
    pub(crate) fn enter(container: u64, label: &Label, max_depth: usize) -> DiResult<Self> {
        RESOLUTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();

            if stack.iter().any(|(id, l)| *id == container && l == label) {
                let mut path: Vec<String> = stack
                    .iter()
                    .filter(|(id, _)| *id == container)
                    .map(|(_, l)| l.display_name().to_string())
                    .collect();
                path.push(label.display_name().to_string());
                tracing::warn!(path = %path.join(" -> "), "dependency cycle detected");
                return Err(DiError::DependencyCycle(path));
            }

            if stack.len() >= max_depth {
                return Err(DiError::DepthExceeded(stack.len()));
            }

            stack.push((container, label.clone()));
            Ok(())
        })?;

        Ok(Self { container })
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        RESOLUTION_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert_eq!(popped.map(|(id, _)| id), Some(self.container));
        });
    }
}

/// Number of entries currently on this thread's stack.
#[cfg(test)]
pub(crate) fn depth() -> usize {
    RESOLUTION_STACK.with(|stack| stack.borrow().len())
}
