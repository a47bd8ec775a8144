#![forbid(unsafe_code)]

//! Free-drag repositioning of the tour popover.
//!
//! The renderer recreates the popover markup on every step, so the
//! controller is re-attached after each highlight. Attaching always detaches
//! the previous popover first. On press the popover leaves the renderer's
//! positioning and is pinned with `position: fixed` at its current box;
//! moves apply the pointer delta to that origin.

use guidepost_core::geometry::{Point, Rect};
use guidepost_core::renderer::PopoverParts;
use guidepost_core::surface::{self, HostResult, HostSurface};
use guidepost_core::ElementHandle;

/// Attribute placed on the active drag handle.
pub const HANDLE_ATTRIBUTE: &str = "data-guidepost-drag-handle";

/// Pointer input forwarded by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Down { target: ElementHandle, at: Point },
    Move { at: Point },
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Attachment {
    popover: ElementHandle,
    handle: ElementHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Drag {
    pointer_origin: Point,
    box_origin: Rect,
}

/// Drag state of the current popover.
#[derive(Debug, Default)]
pub struct DragController {
    attached: Option<Attachment>,
    drag: Option<Drag>,
}

impl DragController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to a popover, using its header as handle when it has one.
    pub fn attach(&mut self, surface: &mut dyn HostSurface, parts: PopoverParts) {
        if self.attached.is_some_and(|a| a.popover == parts.root) {
            return;
        }
        self.detach(surface);
        let handle = parts.header.unwrap_or(parts.root);
        if let Err(err) = surface.set_attribute(handle, HANDLE_ATTRIBUTE, "") {
            tracing::debug!(error = %err, "popover vanished before drag attach");
            return;
        }
        self.attached = Some(Attachment {
            popover: parts.root,
            handle,
        });
    }

    /// Drop the current attachment and any drag in progress.
    pub fn detach(&mut self, surface: &mut dyn HostSurface) {
        self.drag = None;
        if let Some(attachment) = self.attached.take() {
            // The old popover is usually gone already.
            let _ = surface.remove_attribute(attachment.handle, HANDLE_ATTRIBUTE);
        }
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached.is_some()
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Feed a pointer event. Returns whether the controller consumed it.
    pub fn pointer(&mut self, surface: &mut dyn HostSurface, event: PointerEvent) -> bool {
        let Some(attachment) = self.attached else {
            return false;
        };
        match event {
            PointerEvent::Down { target, at } => {
                if target != attachment.handle {
                    return false;
                }
                let Some(rect) = surface.bounding_rect(attachment.popover) else {
                    return false;
                };
                if let Err(err) = pin(surface, attachment.popover, rect.origin()) {
                    tracing::debug!(error = %err, "failed to pin popover");
                    return false;
                }
                self.drag = Some(Drag {
                    pointer_origin: at,
                    box_origin: rect,
                });
                true
            }
            PointerEvent::Move { at } => {
                let Some(drag) = self.drag else {
                    return false;
                };
                let (dx, dy) = at.delta_from(drag.pointer_origin);
                let moved = drag.box_origin.translate(dx, dy).origin();
                if let Err(err) = place(surface, attachment.popover, moved) {
                    tracing::debug!(error = %err, "popover vanished mid-drag");
                    self.drag = None;
                }
                true
            }
            PointerEvent::Up => self.drag.take().is_some(),
        }
    }
}

fn pin(surface: &mut dyn HostSurface, popover: ElementHandle, at: Point) -> HostResult<()> {
    surface::set_inline_property(surface, popover, "position", "fixed", false)?;
    surface::set_inline_property(surface, popover, "transform", "none", false)?;
    surface::set_inline_property(surface, popover, "margin", "0", false)?;
    place(surface, popover, at)
}

fn place(surface: &mut dyn HostSurface, popover: ElementHandle, at: Point) -> HostResult<()> {
    surface::set_inline_property(surface, popover, "left", &format!("{}px", at.x), false)?;
    surface::set_inline_property(surface, popover, "top", &format!("{}px", at.y), false)
}
