//! Drag-and-drop wiring for the file upload form.

use std::{
    path::PathBuf,
    sync::atomic::{AtomicBool, Ordering},
    sync::Arc,
};

use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragEvent {
    Enter,
    Over,
    Leave,
    Drop(Vec<PathBuf>),
}

/// Receives dropped files as if they had been picked in the file input.
pub trait FileSelection: Send + Sync {
    fn files_selected(&self, files: Vec<PathBuf>);
}

pub struct DropZone {
    target: Arc<dyn FileSelection>,
    highlighted: AtomicBool,
}

impl DropZone {
    pub fn new(target: Arc<dyn FileSelection>) -> Self {
        Self {
            target,
            highlighted: AtomicBool::new(false),
        }
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighted.load(Ordering::Relaxed)
    }

    /// Returns whether the zone is highlighted after the event.
    pub fn handle(&self, event: DragEvent) -> bool {
        match event {
            DragEvent::Enter | DragEvent::Over => {
                self.highlighted.store(true, Ordering::Relaxed);
            }
            DragEvent::Leave => {
                self.highlighted.store(false, Ordering::Relaxed);
            }
            DragEvent::Drop(files) => {
                self.highlighted.store(false, Ordering::Relaxed);
                if files.is_empty() {
                    debug!("drop without files ignored");
                } else {
                    debug!(count = files.len(), "files dropped");
                    self.target.files_selected(files);
                }
            }
        }
        self.is_highlighted()
    }
}
