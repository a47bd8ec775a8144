#![forbid(unsafe_code)]

//! In-memory host UI tree.
//!
//! [`FakeSurface`] is a cheap, clonable handle to a shared element table.
//! Tests keep one clone to arrange and inspect state through inherent
//! helpers (`put_*`, `*_of`, `shown`) while the engine mutates another clone
//! through [`HostSurface`]. Only trait writes are counted by
//! [`FakeSurface::write_count`].
//!
//! The style model is deliberately small:
//!
//! - a class in the hiding set (default `hidden`) computes `display: none`
//!   unless an `!important` inline `display` overrides it;
//! - inline `display`, `visibility` and `opacity` otherwise win;
//! - an element or any ancestor with `display: none` has a zero box;
//! - an inline `position: fixed` with `left`/`top` in px moves the box.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use guidepost_core::ElementHandle;
use guidepost_core::geometry::Rect;
use guidepost_core::style::{ComputedVisibility, HideProperty, InlineStyle};
use guidepost_core::surface::{self, HostError, HostResult, HostSurface};
use serde_json::{Value, json};

/// Callback run after a trait `click` on an element.
pub type ClickHandler = Rc<dyn Fn(&FakeSurface, ElementHandle)>;

/// Default viewport of a fresh surface.
pub const DEFAULT_VIEWPORT: Rect = Rect::new(0, 0, 1280, 800);

#[derive(Debug, Clone)]
struct Node {
    locators: Vec<String>,
    parent: Option<ElementHandle>,
    rect: Rect,
    style: Option<String>,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    attached: bool,
    reject_writes: bool,
    clicks: usize,
}

impl Node {
    fn new(locator: &str, parent: Option<ElementHandle>, rect: Rect) -> Self {
        Self {
            locators: vec![locator.to_string()],
            parent,
            rect,
            style: None,
            classes: Vec::new(),
            attributes: BTreeMap::new(),
            attached: true,
            reject_writes: false,
            clicks: 0,
        }
    }

    fn inline(&self) -> InlineStyle {
        InlineStyle::parse(self.style.as_deref().unwrap_or(""))
    }
}

struct Dom {
    location: String,
    nodes: BTreeMap<ElementHandle, Node>,
    next_id: u64,
    fields: HashMap<String, String>,
    viewport: Rect,
    hiding_classes: Vec<String>,
    click_handlers: HashMap<ElementHandle, Vec<ClickHandler>>,
    writes: usize,
    scrolls: usize,
}

impl Dom {
    fn live(&self, el: ElementHandle) -> Option<&Node> {
        self.nodes.get(&el).filter(|n| n.attached)
    }

    fn live_mut(&mut self, el: ElementHandle) -> HostResult<&mut Node> {
        self.nodes
            .get_mut(&el)
            .filter(|n| n.attached)
            .ok_or(HostError::Detached(el))
    }

    fn insert(&mut self, node: Node) -> ElementHandle {
        let el = ElementHandle(self.next_id);
        self.next_id += 1;
        self.nodes.insert(el, node);
        el
    }

    fn computed(&self, el: ElementHandle) -> Option<ComputedVisibility> {
        let node = self.live(el)?;
        let inline = node.inline();
        let class_hidden = node
            .classes
            .iter()
            .any(|c| self.hiding_classes.contains(c));
        let mut computed = ComputedVisibility::default();
        if class_hidden {
            computed.display = "none".into();
        }
        if let Some(decl) = inline.get("display") {
            if !class_hidden || decl.important {
                computed.display = decl.value.clone();
            }
        }
        if let Some(value) = inline.value("visibility") {
            computed.visibility = value.to_string();
        }
        if let Some(value) = inline.value("opacity") {
            computed.opacity = value.trim().parse().unwrap_or(1.0);
        }
        Some(computed)
    }

    fn rendered(&self, el: ElementHandle) -> bool {
        let mut cursor = Some(el);
        while let Some(id) = cursor {
            let Some(computed) = self.computed(id) else {
                return false;
            };
            if computed.hides_via(HideProperty::Display) {
                return false;
            }
            cursor = self.nodes.get(&id).and_then(|n| n.parent);
        }
        true
    }

    fn rect(&self, el: ElementHandle) -> Option<Rect> {
        let node = self.live(el)?;
        if !self.rendered(el) {
            return Some(Rect::default());
        }
        let inline = node.inline();
        let mut rect = node.rect;
        if inline.value("position") == Some("fixed") {
            if let Some(x) = inline.value("left").and_then(parse_px) {
                rect.x = x;
            }
            if let Some(y) = inline.value("top").and_then(parse_px) {
                rect.y = y;
            }
        }
        Some(rect)
    }

    fn is_descendant(&self, el: ElementHandle, ancestor: ElementHandle) -> bool {
        let mut cursor = self.nodes.get(&el).and_then(|n| n.parent);
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            cursor = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    fn matching<'a>(&'a self, locator: &'a str) -> impl Iterator<Item = ElementHandle> + 'a {
        self.nodes
            .iter()
            .filter(move |(_, n)| n.attached && n.locators.iter().any(|l| l == locator))
            .map(|(el, _)| *el)
    }
}

fn parse_px(value: &str) -> Option<i32> {
    value.trim().strip_suffix("px")?.trim().parse().ok()
}

/// Shared in-memory host surface.
#[derive(Clone)]
pub struct FakeSurface {
    dom: Rc<RefCell<Dom>>,
}

impl FakeSurface {
    /// Empty surface at `location`.
    #[must_use]
    pub fn new(location: &str) -> Self {
        Self {
            dom: Rc::new(RefCell::new(Dom {
                location: location.to_string(),
                nodes: BTreeMap::new(),
                next_id: 1,
                fields: HashMap::new(),
                viewport: DEFAULT_VIEWPORT,
                hiding_classes: vec!["hidden".to_string()],
                click_handlers: HashMap::new(),
                writes: 0,
                scrolls: 0,
            })),
        }
    }

    pub fn set_location(&self, location: &str) {
        self.dom.borrow_mut().location = location.to_string();
    }

    /// Add a top-level element.
    pub fn add(&self, locator: &str, rect: Rect) -> ElementHandle {
        self.dom.borrow_mut().insert(Node::new(locator, None, rect))
    }

    /// Add an element under `parent`.
    pub fn add_child(&self, parent: ElementHandle, locator: &str, rect: Rect) -> ElementHandle {
        self.dom
            .borrow_mut()
            .insert(Node::new(locator, Some(parent), rect))
    }

    /// Make `locator` resolve to `el` as well.
    pub fn alias(&self, el: ElementHandle, locator: &str) {
        if let Some(node) = self.dom.borrow_mut().nodes.get_mut(&el) {
            node.locators.push(locator.to_string());
        }
    }

    /// Set the value a form field reports.
    pub fn set_field(&self, locator: &str, value: &str) {
        self.dom
            .borrow_mut()
            .fields
            .insert(locator.to_string(), value.to_string());
    }

    pub fn put_attribute(&self, el: ElementHandle, name: &str, value: &str) {
        if let Some(node) = self.dom.borrow_mut().nodes.get_mut(&el) {
            node.attributes.insert(name.to_string(), value.to_string());
        }
    }

    #[must_use]
    pub fn attr(&self, el: ElementHandle, name: &str) -> Option<String> {
        self.dom
            .borrow()
            .nodes
            .get(&el)
            .and_then(|n| n.attributes.get(name).cloned())
    }

    /// Replace the raw `style` attribute (`None` removes it).
    pub fn put_style(&self, el: ElementHandle, style: Option<&str>) {
        if let Some(node) = self.dom.borrow_mut().nodes.get_mut(&el) {
            node.style = style.map(str::to_string);
        }
    }

    /// Raw `style` attribute, verbatim.
    #[must_use]
    pub fn style_of(&self, el: ElementHandle) -> Option<String> {
        self.dom.borrow().nodes.get(&el).and_then(|n| n.style.clone())
    }

    pub fn put_classes(&self, el: ElementHandle, classes: &[&str]) {
        if let Some(node) = self.dom.borrow_mut().nodes.get_mut(&el) {
            node.classes = classes.iter().map(|c| c.to_string()).collect();
        }
    }

    #[must_use]
    pub fn classes_of(&self, el: ElementHandle) -> Vec<String> {
        self.dom
            .borrow()
            .nodes
            .get(&el)
            .map(|n| n.classes.clone())
            .unwrap_or_default()
    }

    /// Hide an element the way host code would: an inline `display: none`.
    pub fn hide(&self, el: ElementHandle) {
        if let Some(node) = self.dom.borrow_mut().nodes.get_mut(&el) {
            let mut inline = node.inline();
            inline.set("display", "none", false);
            node.style = Some(inline.to_css_text());
        }
    }

    pub fn set_rect(&self, el: ElementHandle, rect: Rect) {
        if let Some(node) = self.dom.borrow_mut().nodes.get_mut(&el) {
            node.rect = rect;
        }
    }

    pub fn set_viewport(&self, viewport: Rect) {
        self.dom.borrow_mut().viewport = viewport;
    }

    /// Box the element currently reports.
    #[must_use]
    pub fn bounding_rect_of(&self, el: ElementHandle) -> Option<Rect> {
        self.dom.borrow().rect(el)
    }

    /// Remove an element and its descendants from the tree.
    pub fn detach(&self, el: ElementHandle) {
        let mut dom = self.dom.borrow_mut();
        let doomed: Vec<ElementHandle> = dom
            .nodes
            .keys()
            .copied()
            .filter(|id| *id == el || dom.is_descendant(*id, el))
            .collect();
        for id in doomed {
            if let Some(node) = dom.nodes.get_mut(&id) {
                node.attached = false;
            }
        }
    }

    /// Run `handler` after every trait click on `el`.
    pub fn on_click(&self, el: ElementHandle, handler: impl Fn(&FakeSurface, ElementHandle) + 'static) {
        self.dom
            .borrow_mut()
            .click_handlers
            .entry(el)
            .or_default()
            .push(Rc::new(handler));
    }

    #[must_use]
    pub fn clicks(&self, el: ElementHandle) -> usize {
        self.dom.borrow().nodes.get(&el).map_or(0, |n| n.clicks)
    }

    #[must_use]
    pub fn scroll_count(&self) -> usize {
        self.dom.borrow().scrolls
    }

    /// Rendered with a non-empty box.
    #[must_use]
    pub fn shown(&self, el: ElementHandle) -> bool {
        surface::is_visible(self, el)
    }

    /// Successful writes made through [`HostSurface`].
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.dom.borrow().writes
    }

    /// Make every later trait write to `el` fail with `Rejected`.
    pub fn reject_writes(&self, el: ElementHandle) {
        if let Some(node) = self.dom.borrow_mut().nodes.get_mut(&el) {
            node.reject_writes = true;
        }
    }

    /// Inline state of every attached element, for before/after comparison.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        let dom = self.dom.borrow();
        let elements: Vec<Value> = dom
            .nodes
            .iter()
            .filter(|(_, n)| n.attached)
            .map(|(el, n)| {
                json!({
                    "element": el.raw(),
                    "locators": n.locators,
                    "style": n.style,
                    "classes": n.classes,
                    "attributes": n.attributes,
                })
            })
            .collect();
        json!({ "location": dom.location, "elements": elements })
    }

    fn write<R>(&self, el: ElementHandle, f: impl FnOnce(&mut Node) -> R) -> HostResult<R> {
        let mut dom = self.dom.borrow_mut();
        let node = dom.live_mut(el)?;
        if node.reject_writes {
            return Err(HostError::Rejected(format!("writes to {el} are blocked")));
        }
        let out = f(node);
        dom.writes += 1;
        Ok(out)
    }
}

impl HostSurface for FakeSurface {
    fn location(&self) -> String {
        self.dom.borrow().location.clone()
    }

    fn resolve(&self, locator: &str) -> Option<ElementHandle> {
        self.dom.borrow().matching(locator).next()
    }

    fn resolve_within(&self, scope: ElementHandle, locator: &str) -> Option<ElementHandle> {
        let dom = self.dom.borrow();
        dom.live(scope)?;
        let found = dom.matching(locator).find(|el| dom.is_descendant(*el, scope));
        found
    }

    fn count(&self, locator: &str) -> usize {
        self.dom.borrow().matching(locator).count()
    }

    fn is_attached(&self, el: ElementHandle) -> bool {
        self.dom.borrow().live(el).is_some()
    }

    fn computed_visibility(&self, el: ElementHandle) -> Option<ComputedVisibility> {
        self.dom.borrow().computed(el)
    }

    fn bounding_rect(&self, el: ElementHandle) -> Option<Rect> {
        self.dom.borrow().rect(el)
    }

    fn viewport(&self) -> Rect {
        self.dom.borrow().viewport
    }

    fn inline_style(&self, el: ElementHandle) -> HostResult<Option<String>> {
        let dom = self.dom.borrow();
        let node = dom.live(el).ok_or(HostError::Detached(el))?;
        Ok(node.style.clone())
    }

    fn set_inline_style(&mut self, el: ElementHandle, text: Option<&str>) -> HostResult<()> {
        self.write(el, |node| node.style = text.map(str::to_string))
    }

    fn class_list(&self, el: ElementHandle) -> HostResult<Vec<String>> {
        let dom = self.dom.borrow();
        let node = dom.live(el).ok_or(HostError::Detached(el))?;
        Ok(node.classes.clone())
    }

    fn set_class_list(&mut self, el: ElementHandle, classes: &[String]) -> HostResult<()> {
        self.write(el, |node| node.classes = classes.to_vec())
    }

    fn attribute(&self, el: ElementHandle, name: &str) -> Option<String> {
        self.dom
            .borrow()
            .live(el)
            .and_then(|n| n.attributes.get(name).cloned())
    }

    fn set_attribute(&mut self, el: ElementHandle, name: &str, value: &str) -> HostResult<()> {
        self.write(el, |node| {
            node.attributes.insert(name.to_string(), value.to_string());
        })
    }

    fn remove_attribute(&mut self, el: ElementHandle, name: &str) -> HostResult<()> {
        self.write(el, |node| {
            node.attributes.remove(name);
        })
    }

    fn click(&mut self, el: ElementHandle) -> HostResult<()> {
        let handlers = {
            let mut dom = self.dom.borrow_mut();
            dom.live_mut(el)?.clicks += 1;
            dom.click_handlers.get(&el).cloned().unwrap_or_default()
        };
        for handler in handlers {
            handler(self, el);
        }
        Ok(())
    }

    fn field_value(&self, locator: &str) -> Option<String> {
        self.dom.borrow().fields.get(locator).cloned()
    }

    fn scroll_into_view(&mut self, el: ElementHandle) -> HostResult<()> {
        let mut dom = self.dom.borrow_mut();
        let rect = dom.rect(el).ok_or(HostError::Detached(el))?;
        let dy = dom.viewport.y.saturating_sub(rect.y);
        for node in dom.nodes.values_mut() {
            node.rect = node.rect.translate(0, dy);
        }
        dom.scrolls += 1;
        tracing::trace!(element = %el, dy, "scrolled into view");
        Ok(())
    }
}

impl fmt::Debug for FakeSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dom = self.dom.borrow();
        f.debug_struct("FakeSurface")
            .field("location", &dom.location)
            .field("elements", &dom.nodes.len())
            .field("writes", &dom.writes)
            .finish()
    }
}
