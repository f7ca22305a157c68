use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Routes SIGINT and SIGTERM into the interrupt flag instead of killing the
/// process, so the runner can report where it stopped.
pub fn install() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::SeqCst))
}

pub fn interrupt_pending() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_installs_once_and_starts_clear() {
        install().expect("first install");
        assert!(matches!(install(), Err(ctrlc::Error::MultipleHandlers)));
        assert!(!interrupt_pending());
    }
}
