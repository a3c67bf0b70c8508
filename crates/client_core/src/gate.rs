use std::sync::atomic::{AtomicBool, Ordering};

/// Admits one in-flight action per control.
#[derive(Debug, Default)]
pub struct ActionGate {
    busy: AtomicBool,
}

impl ActionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the gate busy and returns `true` when it was idle.
    pub fn try_acquire(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn release(&self) {
        self.busy.store(false, Ordering::Release);
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Scoped form of [`try_acquire`](Self::try_acquire); the gate reopens
    /// when the returned pass is dropped.
    pub fn try_enter(&self) -> Option<GatePass<'_>> {
        self.try_acquire().then_some(GatePass { gate: self })
    }
}

#[must_use = "the gate is released as soon as the pass is dropped"]
pub struct GatePass<'a> {
    gate: &'a ActionGate,
}

impl Drop for GatePass<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}
